//! Row normalizer: raw provider bars → one [`QuoteRow`] per ticker.

use chrono::NaiveDate;

use super::QuoteRow;
use crate::data::DailyBar;

/// A normalized row together with the session it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row: QuoteRow,
    pub session: NaiveDate,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Reduce a ticker's history to its latest valid session.
///
/// A session is valid when its close is finite. Returns `None` when fewer
/// than two valid sessions exist or the latest one has no finite volume.
pub fn normalize(ticker: &str, bars: &[DailyBar]) -> Option<NormalizedRow> {
    let mut valid: Vec<&DailyBar> = bars.iter().filter(|b| finite(b.close).is_some()).collect();
    if valid.len() < 2 {
        return None;
    }
    valid.sort_by_key(|b| b.date);

    let last = valid[valid.len() - 1];
    let prev = valid[valid.len() - 2];

    let close = finite(last.close)?;
    let volume = finite(last.volume)?;

    Some(NormalizedRow {
        row: QuoteRow::new(ticker, last.open, close, volume, prev.close),
        session: last.date,
    })
}
