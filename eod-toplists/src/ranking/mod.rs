//! Row normalization and universe ranking.

pub mod normalize;
pub mod ranker;

pub use normalize::{normalize, NormalizedRow};
pub use ranker::{rank, ListKind, RankPolicy, RankedLists};

use serde::{Deserialize, Serialize};

/// One ticker's latest session, with derived traded value and change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    /// Exchange code without provider suffix
    pub ticker: String,
    /// Display label; empty when unmapped
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub open: Option<f64>,
    pub close: f64,
    pub volume: f64,
    /// `volume × close`
    pub dollar_volume: f64,
    /// Fraction, not percent (0.012 is +1.2%)
    #[serde(default)]
    pub pct_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,
}

impl QuoteRow {
    /// Build a row, deriving traded value and change from `prev_close`.
    pub fn new(
        ticker: impl Into<String>,
        open: Option<f64>,
        close: f64,
        volume: f64,
        prev_close: Option<f64>,
    ) -> Self {
        let pct_change = prev_close
            .filter(|p| p.is_finite() && *p != 0.0)
            .map(|p| (close - p) / p);

        Self {
            ticker: ticker.into(),
            name: String::new(),
            open: open.filter(|o| o.is_finite()),
            close,
            volume,
            dollar_volume: volume * close,
            pct_change,
            themes: Vec::new(),
        }
    }

    /// Name when known, otherwise the ticker.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.ticker
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_row_derivations() {
        let row = QuoteRow::new("7203", Some(2990.0), 3000.0, 1_000_000.0, Some(2900.0));
        assert!((row.dollar_volume - 3_000_000_000.0).abs() < 1e-6);
        let pct = row.pct_change.unwrap();
        assert!((pct - (3000.0 - 2900.0) / 2900.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_prev_close_leaves_pct_undefined() {
        let row = QuoteRow::new("X", None, 10.0, 5.0, Some(0.0));
        assert!(row.pct_change.is_none());
        let row = QuoteRow::new("X", None, 10.0, 5.0, None);
        assert!(row.pct_change.is_none());
    }

    #[test]
    fn test_label_falls_back_to_ticker() {
        let mut row = QuoteRow::new("7203", None, 1.0, 1.0, None);
        assert_eq!(row.label(), "7203");
        row.name = "トヨタ自動車".into();
        assert_eq!(row.label(), "トヨタ自動車");
    }

    #[test]
    fn test_legacy_row_deserializes() {
        let row: QuoteRow = serde_json::from_str(
            r#"{"ticker":"AAPL","date":"2024-06-03","open":190.1,"close":192.0,
                "volume":1000,"dollar_volume":192000.0,"pct_change":null}"#,
        )
        .unwrap();
        assert_eq!(row.ticker, "AAPL");
        assert!(row.name.is_empty());
        assert!(row.pct_change.is_none());
        assert!(row.themes.is_empty());
    }
}
