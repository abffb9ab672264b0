//! Market data acquisition.
//!
//! - [`provider`] - the quote-provider seam and its error type
//! - [`yahoo`] - public chart endpoint adapter
//! - [`universe`] - ticker universe input and exchange symbol mapping

pub mod provider;
pub mod universe;
pub mod yahoo;

pub use provider::{ProviderError, QuoteProvider};
pub use universe::{load_universe, MarketSpec};
pub use yahoo::YahooChartProvider;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily session as returned by a provider.
///
/// Every numeric field may be missing or non-finite; the normalizer decides
/// which sessions are usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl DailyBar {
    pub fn new(date: NaiveDate, open: Option<f64>, close: Option<f64>, volume: Option<f64>) -> Self {
        Self {
            date,
            open,
            close,
            volume,
        }
    }
}

/// Daily history for one provider symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolHistory {
    /// Provider symbol (with exchange suffix)
    pub symbol: String,
    pub bars: Vec<DailyBar>,
}
