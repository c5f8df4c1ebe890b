#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the dalal market-data layer.
//!
//! This crate provides the foundational abstractions shared by the cache,
//! the fetcher and the upstream adapters:
//!
//! - [`SnapshotProvider`](provider::SnapshotProvider) - Point-in-time quote data
//! - [`HistoryProvider`](provider::HistoryProvider) - Daily closing prices
//! - [`MarketDataProvider`](provider::MarketDataProvider) - Both of the above
//! - [`Snapshot`](types::Snapshot) and [`Series`](types::Series) - Normalized results

/// Error types for data operations.
pub mod error;
/// Fetch mode and history period definitions.
pub mod period;
/// Provider traits for fetching upstream data.
pub mod provider;
/// Core data types (Symbol, Snapshot, Series, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{DataError, Result};
pub use period::{FetchMode, HistoryPeriod};
pub use provider::{DataProvider, HistoryProvider, MarketDataProvider, SnapshotProvider};
pub use types::{PricePoint, RawFields, RawQuote, Series, Snapshot, Symbol};
