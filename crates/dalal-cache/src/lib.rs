#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Caching for dalal market data.
//!
//! This crate provides:
//!
//! - [`TtlCache`] - Generic key-value cache with one time-to-live
//! - [`QuoteCache`] - The snapshot and history caches a deployment shares

/// Generic TTL cache implementation.
pub mod memory;
/// Snapshot and history cache bundle.
pub mod quote;

pub use memory::TtlCache;
pub use quote::QuoteCache;
