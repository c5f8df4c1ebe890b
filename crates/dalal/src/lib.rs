#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Cached, retrying market data for a stock dashboard.
//!
//! This crate wires the pieces of the workspace together. It re-exports the
//! core types and traits, the caches, and (behind the `yahoo` feature) the
//! Yahoo Finance provider, and provides [`MarketData`] for querying them.
//!
//! # Features
//!
//! - `yahoo` (default) - Yahoo Finance provider
//!
//! # Example
//!
//! ```rust,ignore
//! use dalal::{Config, MarketData, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> dalal::Result<()> {
//!     let market = MarketData::yahoo(Config::default())?;
//!
//!     let detail = market.detail(&Symbol::new("TCS.NS")).await;
//!     println!("{:?}", detail.snapshot.price);
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use dalal_core::*;

// Caches
pub use dalal_cache::{QuoteCache, TtlCache};

// Providers
#[cfg(feature = "yahoo")]
pub use dalal_yahoo::YahooProvider;

pub mod config;
pub use config::{BackoffPolicy, Config};

mod fetcher;
pub use fetcher::{BackoffFetcher, FetchFailure, FetchOutcome, Payload, RetryState};

pub mod normalize;
pub use normalize::{apply_series_fallback, normalize};

mod service;
pub use service::{Detail, MarketData, PAGE_SIZE, QueryOptions, SearchScope};

#[cfg(test)]
mod mock;
