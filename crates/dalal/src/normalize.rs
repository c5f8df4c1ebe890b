//! Reconciles provider quote fields into a [`Snapshot`].
//!
//! Providers name the same value differently in their lightweight and full
//! representations. Each normalized field has a [`Lookup`]: an ordered list
//! of `(representation, field name)` candidates plus an extractor. The
//! first candidate whose value extracts wins; a field with no usable
//! candidate stays `None` and never fails the record.

use dalal_core::{RawFields, RawQuote, Series, Snapshot, Symbol};
use serde_json::Value;

/// One crore (10,000,000), the unit market cap is displayed in.
pub const CRORE: f64 = 10_000_000.0;

/// Which representation of a quote a field is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// The lightweight representation.
    Fast,
    /// The full representation.
    Full,
}

/// Ordered candidates for one normalized field.
#[derive(Clone, Copy, Debug)]
pub struct Lookup<T> {
    /// Candidate fields, highest priority first.
    pub candidates: &'static [(Source, &'static str)],
    /// Turns a raw value into the field's type, or rejects it.
    pub extract: fn(&Value) -> Option<T>,
}

impl<T> Lookup<T> {
    /// Returns the first candidate value that extracts.
    pub fn resolve(&self, raw: &RawQuote) -> Option<T> {
        self.candidates.iter().find_map(|(source, name)| {
            let fields: &RawFields = match source {
                Source::Fast => raw.fast.as_ref()?,
                Source::Full => raw.full.as_ref()?,
            };
            fields.get(*name).and_then(self.extract)
        })
    }
}

/// JSON numbers only; strings and nulls are not parsed.
fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Last price, falling back to the last close.
pub const PRICE: Lookup<f64> = Lookup {
    candidates: &[
        (Source::Fast, "lastPrice"),
        (Source::Fast, "lastClose"),
        (Source::Full, "currentPrice"),
        (Source::Full, "regularMarketPrice"),
    ],
    extract: number,
};

/// Display name.
pub const NAME: Lookup<String> = Lookup {
    candidates: &[
        (Source::Fast, "shortName"),
        (Source::Full, "longName"),
        (Source::Full, "shortName"),
    ],
    extract: text,
};

/// Market cap in the listing currency's base unit.
pub const MARKET_CAP: Lookup<f64> = Lookup {
    candidates: &[(Source::Fast, "marketCap"), (Source::Full, "marketCap")],
    extract: number,
};

/// Trailing P/E.
pub const PE_RATIO: Lookup<f64> = Lookup {
    candidates: &[(Source::Fast, "trailingPE"), (Source::Full, "trailingPE")],
    extract: number,
};

/// 52-week high.
pub const WEEK_52_HIGH: Lookup<f64> = Lookup {
    candidates: &[(Source::Fast, "yearHigh"), (Source::Full, "fiftyTwoWeekHigh")],
    extract: number,
};

/// 52-week low.
pub const WEEK_52_LOW: Lookup<f64> = Lookup {
    candidates: &[(Source::Fast, "yearLow"), (Source::Full, "fiftyTwoWeekLow")],
    extract: number,
};

/// Previous session's close.
pub const PREVIOUS_CLOSE: Lookup<f64> = Lookup {
    candidates: &[
        (Source::Fast, "previousClose"),
        (Source::Full, "previousClose"),
        (Source::Full, "regularMarketPreviousClose"),
    ],
    extract: number,
};

/// Current session's open.
pub const OPEN: Lookup<f64> = Lookup {
    candidates: &[
        (Source::Fast, "open"),
        (Source::Full, "open"),
        (Source::Full, "regularMarketOpen"),
    ],
    extract: number,
};

/// Percent change on the day.
pub const PERCENT_CHANGE: Lookup<f64> = Lookup {
    candidates: &[
        (Source::Fast, "changePercent"),
        (Source::Full, "regularMarketChangePercent"),
    ],
    extract: number,
};

/// Converts a raw market cap to crore, rounded to 2 decimal places.
#[must_use]
pub fn to_crore(market_cap: f64) -> f64 {
    (market_cap / CRORE * 100.0).round() / 100.0
}

/// Builds a [`Snapshot`] for `symbol` from whatever `raw` carries.
#[must_use]
pub fn normalize(symbol: Symbol, raw: &RawQuote) -> Snapshot {
    Snapshot {
        symbol,
        name: NAME.resolve(raw),
        price: PRICE.resolve(raw),
        market_cap_cr: MARKET_CAP.resolve(raw).map_or(0.0, to_crore),
        pe_ratio: PE_RATIO.resolve(raw),
        week_52_high: WEEK_52_HIGH.resolve(raw),
        week_52_low: WEEK_52_LOW.resolve(raw),
        previous_close: PREVIOUS_CLOSE.resolve(raw),
        open: OPEN.resolve(raw),
        percent_change: PERCENT_CHANGE.resolve(raw),
    }
}

/// Fills a missing price from the most recent close in `series`.
pub fn apply_series_fallback(snapshot: &mut Snapshot, series: &Series) {
    if snapshot.price.is_none() {
        snapshot.price = series.last_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::fields;
    use chrono::NaiveDate;
    use dalal_core::PricePoint;
    use serde_json::json;

    fn fast(value: Value) -> RawQuote {
        RawQuote::from_fast(fields(value))
    }

    #[test]
    fn test_first_priority_price_wins() {
        let raw = fast(json!({ "lastPrice": 105.2, "lastClose": 100.0 }));
        assert_eq!(PRICE.resolve(&raw), Some(105.2));
    }

    #[test]
    fn test_price_falls_through_candidates() {
        let raw = fast(json!({ "lastPrice": null, "lastClose": 100.0 }));
        assert_eq!(PRICE.resolve(&raw), Some(100.0));

        let raw = RawQuote::from_full(fields(json!({ "regularMarketPrice": 98.5 })));
        assert_eq!(PRICE.resolve(&raw), Some(98.5));

        let raw = RawQuote {
            fast: Some(fields(json!({ "marketCap": 1 }))),
            full: Some(fields(json!({ "currentPrice": 97.0, "regularMarketPrice": 98.5 }))),
        };
        assert_eq!(PRICE.resolve(&raw), Some(97.0));

        assert_eq!(PRICE.resolve(&RawQuote::default()), None);
    }

    #[test]
    fn test_market_cap_in_crore() {
        let raw = fast(json!({ "marketCap": 19_961_234_567_890_i64 }));
        let snap = normalize(Symbol::new("RELIANCE.NS"), &raw);
        assert_eq!(snap.market_cap_cr, 1_996_123.46);
    }

    #[test]
    fn test_missing_market_cap_is_zero() {
        let snap = normalize(Symbol::new("DMART.NS"), &fast(json!({ "lastPrice": 4700.0 })));
        assert_eq!(snap.market_cap_cr, 0.0);
        assert_eq!(snap.price, Some(4700.0));
    }

    #[test]
    fn test_percent_change_only_from_numbers() {
        let raw = fast(json!({ "changePercent": "1.25%" }));
        assert_eq!(PERCENT_CHANGE.resolve(&raw), None);

        let raw = fast(json!({ "changePercent": null }));
        assert_eq!(PERCENT_CHANGE.resolve(&raw), None);

        let raw = fast(json!({ "changePercent": -2 }));
        assert_eq!(PERCENT_CHANGE.resolve(&raw), Some(-2.0));
    }

    #[test]
    fn test_numeric_strings_are_not_coerced() {
        let raw = fast(json!({ "lastPrice": "105.2", "marketCap": "1000000000" }));
        let snap = normalize(Symbol::new("TITAN.NS"), &raw);
        assert_eq!(snap.price, None);
        assert_eq!(snap.market_cap_cr, 0.0);
    }

    #[test]
    fn test_full_quote_normalizes() {
        let raw = RawQuote::from_full(fields(json!({
            "longName": "Tata Consultancy Services Limited",
            "shortName": "TCS",
            "currentPrice": 3890.5,
            "marketCap": 14_080_000_000_000_i64,
            "trailingPE": 30.12,
            "fiftyTwoWeekHigh": 4592.25,
            "fiftyTwoWeekLow": 3311.0,
            "regularMarketPreviousClose": 3875.0,
            "open": 3880.0,
            "regularMarketChangePercent": 0.4
        })));

        let snap = normalize(Symbol::new("TCS.NS"), &raw);
        assert_eq!(snap.name.as_deref(), Some("Tata Consultancy Services Limited"));
        assert_eq!(snap.price, Some(3890.5));
        assert_eq!(snap.market_cap_cr, 1_408_000.0);
        assert_eq!(snap.pe_ratio, Some(30.12));
        assert_eq!(snap.week_52_high, Some(4592.25));
        assert_eq!(snap.week_52_low, Some(3311.0));
        assert_eq!(snap.previous_close, Some(3875.0));
        assert_eq!(snap.open, Some(3880.0));
        assert_eq!(snap.percent_change, Some(0.4));
    }

    #[test]
    fn test_blank_name_is_absent() {
        let snap = normalize(Symbol::new("LT.NS"), &fast(json!({ "shortName": "  " })));
        assert_eq!(snap.name, None);
        assert_eq!(snap.display_name(), "LT.NS");
    }

    #[test]
    fn test_series_fallback_only_when_price_missing() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let series = Series::from_points(vec![
            PricePoint::new(day(1), 250.0),
            PricePoint::new(day(4), 255.5),
        ]);

        let mut snap = Snapshot::placeholder(Symbol::new("POWERGRID.NS"));
        apply_series_fallback(&mut snap, &series);
        assert_eq!(snap.price, Some(255.5));

        let mut priced = normalize(Symbol::new("POWERGRID.NS"), &fast(json!({ "lastPrice": 260.0 })));
        apply_series_fallback(&mut priced, &series);
        assert_eq!(priced.price, Some(260.0));

        let mut empty = Snapshot::placeholder(Symbol::new("POWERGRID.NS"));
        apply_series_fallback(&mut empty, &Series::new());
        assert_eq!(empty.price, None);
    }
}
