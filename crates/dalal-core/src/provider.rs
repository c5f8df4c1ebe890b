//! Provider traits for fetching upstream data.
//!
//! This module defines the core provider traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`SnapshotProvider`] - Lightweight and full quote representations
//! - [`HistoryProvider`] - Daily closing prices
//! - [`MarketDataProvider`] - Anything implementing both of the above
//!
//! Providers are treated as unreliable: every method may fail on any call,
//! and callers are expected to retry.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::{DataError, Result},
    period::HistoryPeriod,
    types::{RawFields, Series, Symbol},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "Yahoo Finance").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// Provider for point-in-time quote data.
///
/// Field names in the returned [`RawFields`] are provider-specific; the
/// normalizer maps them onto a [`Snapshot`](crate::types::Snapshot).
#[async_trait]
pub trait SnapshotProvider: DataProvider {
    /// Fetches the cheap, reduced representation of a quote.
    ///
    /// Providers without one keep the default, which reports
    /// [`DataError::NotSupported`] so callers go straight to [`fetch_info`].
    ///
    /// [`fetch_info`]: SnapshotProvider::fetch_info
    async fn fetch_fast_info(&self, symbol: &Symbol) -> Result<RawFields> {
        Err(DataError::NotSupported(format!(
            "{} has no lightweight quote for {symbol}",
            self.name()
        )))
    }

    /// Fetches the full quote representation.
    async fn fetch_info(&self, symbol: &Symbol) -> Result<RawFields>;
}

/// Provider for historical closing prices.
#[async_trait]
pub trait HistoryProvider: DataProvider {
    /// Fetches daily closes for `symbol` covering `period`, oldest first.
    async fn fetch_history(&self, symbol: &Symbol, period: HistoryPeriod) -> Result<Series>;
}

/// A provider serving both snapshots and history.
///
/// Blanket-implemented, so it only exists to be named as
/// `Arc<dyn MarketDataProvider>`.
pub trait MarketDataProvider: SnapshotProvider + HistoryProvider {}

impl<T: SnapshotProvider + HistoryProvider + ?Sized> MarketDataProvider for T {}
