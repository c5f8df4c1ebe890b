//! Core data types for market data.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Symbol`] - Trading symbol/ticker
//! - [`RawQuote`] - Unnormalized quote fields as returned by a provider
//! - [`Snapshot`] - Normalized point-in-time summary for one symbol
//! - [`PricePoint`] - One daily close
//! - [`Series`] - Chronological closes with helper methods

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trading symbol/ticker.
///
/// Symbols are automatically uppercased on creation, so `"tcs.ns"` and
/// `"TCS.NS"` name the same cache entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Creates a new symbol from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Field map exactly as a provider returned it.
pub type RawFields = serde_json::Map<String, serde_json::Value>;

/// The representations obtained for one snapshot fetch.
///
/// At least one side is present in anything a fetch hands back; the
/// normalizer reads `fast` before `full` for every field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    /// Lightweight representation, if the provider offered one.
    pub fast: Option<RawFields>,
    /// Full representation, fetched only when `fast` was unavailable.
    pub full: Option<RawFields>,
}

impl RawQuote {
    /// Wraps a lightweight representation.
    #[must_use]
    pub const fn from_fast(fields: RawFields) -> Self {
        Self {
            fast: Some(fields),
            full: None,
        }
    }

    /// Wraps a full representation.
    #[must_use]
    pub const fn from_full(fields: RawFields) -> Self {
        Self {
            fast: None,
            full: Some(fields),
        }
    }

    /// Returns true if neither representation carries any field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fast.as_ref().is_none_or(|m| m.is_empty())
            && self.full.as_ref().is_none_or(|m| m.is_empty())
    }
}

/// Normalized point-in-time summary for one symbol.
///
/// Every upstream-sourced field is optional except `market_cap_cr`, which
/// is `0.0` when unknown so snapshots always sort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stock symbol.
    pub symbol: Symbol,
    /// Display name, when the provider supplied one.
    pub name: Option<String>,
    /// Last traded (or last closing) price.
    pub price: Option<f64>,
    /// Market capitalization in crore (1 crore = 10,000,000), 2 decimals.
    pub market_cap_cr: f64,
    /// Trailing price-to-earnings ratio.
    pub pe_ratio: Option<f64>,
    /// 52-week high price.
    pub week_52_high: Option<f64>,
    /// 52-week low price.
    pub week_52_low: Option<f64>,
    /// Previous session's close.
    pub previous_close: Option<f64>,
    /// Current session's open.
    pub open: Option<f64>,
    /// Percent change on the day.
    pub percent_change: Option<f64>,
}

impl Snapshot {
    /// The "no data" value stored when every fetch attempt failed.
    #[must_use]
    pub fn placeholder(symbol: Symbol) -> Self {
        Self {
            symbol,
            ..Default::default()
        }
    }

    /// Name to render: the provider's name, or the symbol when there is none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.symbol.as_str())
    }

    /// Returns true if any field came from the provider.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.name.is_some()
            || self.price.is_some()
            || self.market_cap_cr != 0.0
            || self.pe_ratio.is_some()
            || self.week_52_high.is_some()
            || self.week_52_low.is_some()
            || self.previous_close.is_some()
            || self.open.is_some()
            || self.percent_change.is_some()
    }

    /// Case-insensitive substring match on the symbol or the name.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.symbol.as_str().to_lowercase().contains(&needle)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
    }
}

/// One daily closing price.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Trading date.
    pub date: NaiveDate,
    /// Closing price on that date.
    pub close: f64,
}

impl PricePoint {
    /// Creates a new price point.
    #[must_use]
    pub const fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Chronological closing prices with no duplicate dates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<PricePoint>,
}

impl Series {
    /// Creates an empty series.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Builds a series from points in any order.
    ///
    /// Points are sorted by date; when a date repeats, the later point in
    /// the input wins.
    #[must_use]
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        // Stable sort keeps input order within a date, so the last one is the latest.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if there are no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns an iterator over the points, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Returns the points as a slice, oldest first.
    #[must_use]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Most recent closing price.
    #[must_use]
    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// First and last date covered.
    #[must_use]
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.points.first()?.date, self.points.last()?.date))
    }

    /// Percent change from the first close to the last.
    #[must_use]
    pub fn change_percent(&self) -> Option<f64> {
        let first = self.points.first()?.close;
        let last = self.points.last()?.close;
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }
}

impl IntoIterator for Series {
    type Item = PricePoint;
    type IntoIter = std::vec::IntoIter<PricePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl FromIterator<PricePoint> for Series {
    fn from_iter<I: IntoIterator<Item = PricePoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}
