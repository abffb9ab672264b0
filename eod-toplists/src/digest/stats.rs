//! Summary statistics over the capped universe.

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::ranking::QuoteRow;

/// Advancers, decliners and the rest.
///
/// `flat = total − up − down`, so rows with an undefined change count as flat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadth {
    pub up: usize,
    pub down: usize,
    pub flat: usize,
    pub total: usize,
}

/// Distribution of defined percentage changes (fractions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PctStats {
    /// Number of rows with a defined change
    pub n: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p95: Option<f64>,
    pub p05: Option<f64>,
}

/// Counts of defined changes by magnitude band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bands {
    /// `|x| < 2%`
    pub within_2: usize,
    /// `2% ≤ x < 5%`
    pub up_2_to_5: usize,
    /// `−5% < x ≤ −2%`
    pub down_2_to_5: usize,
    /// `x ≥ 5%`
    pub up_5_plus: usize,
    /// `x ≤ −5%`
    pub down_5_plus: usize,
}

/// Share of universe totals held by the leading names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub value_top10: Option<f64>,
    pub value_top50: Option<f64>,
    pub volume_top10: Option<f64>,
}

/// Everything the narrative and fallback are built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestStats {
    pub date: String,
    pub breadth: Breadth,
    pub pct: PctStats,
    pub bands: Bands,
    pub concentration: Concentration,
}

/// Linear-interpolated percentile of an ascending slice.
///
/// Uses `k = (n − 1) × p` and interpolates between the neighbours of `k`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let k = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = k.floor() as usize;
    let hi = k.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = k - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(sorted: &[f64]) -> Option<f64> {
    percentile(sorted, 0.5)
}

/// Sum of the first `n` of `values` sorted descending, over the total.
fn top_share(mut values: Vec<f64>, n: usize) -> Option<f64> {
    let total: f64 = values.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    values.sort_by(|a, b| b.total_cmp(a));
    let top: f64 = values.iter().take(n).sum();
    Some(top / total)
}

impl Bands {
    fn classify(values: &[f64]) -> Self {
        let mut bands = Self::default();
        for &x in values {
            if x.abs() < 0.02 {
                bands.within_2 += 1;
            } else if x >= 0.05 {
                bands.up_5_plus += 1;
            } else if x >= 0.02 {
                bands.up_2_to_5 += 1;
            } else if x <= -0.05 {
                bands.down_5_plus += 1;
            } else {
                bands.down_2_to_5 += 1;
            }
        }
        bands
    }
}

impl DigestStats {
    /// Statistics over the bundle's capped universe.
    pub fn compute(bundle: &Bundle) -> Self {
        Self::from_rows(&bundle.date, &bundle.lists.universe_by_value)
    }

    pub fn from_rows(date: &str, rows: &[QuoteRow]) -> Self {
        let up = rows.iter().filter(|r| r.pct_change.is_some_and(|p| p > 0.0)).count();
        let down = rows.iter().filter(|r| r.pct_change.is_some_and(|p| p < 0.0)).count();
        let breadth = Breadth {
            up,
            down,
            flat: rows.len() - up - down,
            total: rows.len(),
        };

        let mut values: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.pct_change)
            .filter(|p| p.is_finite())
            .collect();
        values.sort_by(f64::total_cmp);

        let mean = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };

        let pct = PctStats {
            n: values.len(),
            mean,
            median: median(&values),
            p95: percentile(&values, 0.95),
            p05: percentile(&values, 0.05),
        };

        let dollar: Vec<f64> = rows.iter().map(|r| r.dollar_volume).collect();
        let volume: Vec<f64> = rows.iter().map(|r| r.volume).collect();
        let concentration = Concentration {
            value_top10: top_share(dollar.clone(), 10),
            value_top50: top_share(dollar, 50),
            volume_top10: top_share(volume, 10),
        };

        Self {
            date: date.to_string(),
            breadth,
            pct,
            bands: Bands::classify(&values),
            concentration,
        }
    }
}
