//! Fetch mode and history period definitions.
//!
//! This module defines [`FetchMode`] for the two kinds of upstream call and
//! [`HistoryPeriod`] for the span of closing prices requested.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which upstream operation a fetch performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Point-in-time snapshot (price, market cap, ratios).
    Info,
    /// Historical closing prices. Heavier on the upstream.
    History,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::History => f.write_str("history"),
        }
    }
}

/// Span of history requested from a provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    /// One month of daily closes.
    OneMonth,
    /// Three months of daily closes.
    ThreeMonths,
    /// Six months of daily closes.
    #[default]
    SixMonths,
    /// One year of daily closes.
    OneYear,
    /// Five years of daily closes.
    FiveYears,
}

impl HistoryPeriod {
    /// Returns the range token used by chart-style APIs ("1mo", "6mo", ...).
    #[must_use]
    pub const fn as_range(&self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_range())
    }
}
