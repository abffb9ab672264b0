//! Universe ranker.
//!
//! All orderings use stable sorts, so ties keep input order and the same
//! input always yields the same lists.

use eod_common::{Config, Market};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::QuoteRow;

/// Sizes and thresholds for one ranking pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankPolicy {
    pub top_n: usize,
    pub universe_cap: usize,
    /// Minimum close for gainer/loser eligibility
    pub price_floor: f64,
}

impl RankPolicy {
    /// Default policy for a market: top 10, universe 600, market floor.
    pub fn for_market(market: Market) -> Self {
        Self {
            top_n: 10,
            universe_cap: 600,
            price_floor: market.default_price_floor(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            top_n: config.ranking.top_n,
            universe_cap: config.ranking.universe_cap,
            price_floor: config.price_floor(),
        }
    }
}

/// The five ranked lists of a run.
///
/// Legacy bundle keys are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedLists {
    #[serde(rename = "universe_by_dollar", alias = "universe_top600_by_dollar", default)]
    pub universe_by_value: Vec<QuoteRow>,

    #[serde(rename = "top_dollar_value", alias = "top10_dollar_value", default)]
    pub top_by_value: Vec<QuoteRow>,

    #[serde(rename = "top_volume", alias = "top10_volume", default)]
    pub top_by_volume: Vec<QuoteRow>,

    #[serde(rename = "top_gainers", alias = "top10_gainers_ge10", default)]
    pub top_gainers: Vec<QuoteRow>,

    #[serde(rename = "top_losers", alias = "top10_losers_ge10", default)]
    pub top_losers: Vec<QuoteRow>,
}

/// Identifies one of the ranked lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Universe,
    TopValue,
    TopVolume,
    Gainers,
    Losers,
}

impl ListKind {
    pub const ALL: [ListKind; 5] = [
        Self::Universe,
        Self::TopValue,
        Self::TopVolume,
        Self::Gainers,
        Self::Losers,
    ];

    /// CSV file name for this list.
    pub fn file_name(&self, top_n: usize, universe_cap: usize) -> String {
        match self {
            Self::Universe => format!("universe_top{}_by_dollar.csv", universe_cap),
            Self::TopValue => format!("top{}_dollar_value.csv", top_n),
            Self::TopVolume => format!("top{}_volume.csv", top_n),
            Self::Gainers => format!("top{}_gainers_ge_minprice.csv", top_n),
            Self::Losers => format!("top{}_losers_ge_minprice.csv", top_n),
        }
    }
}

impl RankedLists {
    pub fn get(&self, kind: ListKind) -> &[QuoteRow] {
        match kind {
            ListKind::Universe => &self.universe_by_value,
            ListKind::TopValue => &self.top_by_value,
            ListKind::TopVolume => &self.top_by_volume,
            ListKind::Gainers => &self.top_gainers,
            ListKind::Losers => &self.top_losers,
        }
    }

    /// Every row of every list, for in-place enrichment.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut QuoteRow> {
        self.universe_by_value
            .iter_mut()
            .chain(self.top_by_value.iter_mut())
            .chain(self.top_by_volume.iter_mut())
            .chain(self.top_gainers.iter_mut())
            .chain(self.top_losers.iter_mut())
    }

    pub fn is_empty(&self) -> bool {
        ListKind::ALL.iter().all(|k| self.get(*k).is_empty())
    }
}

fn by_value_desc(a: &QuoteRow, b: &QuoteRow) -> Ordering {
    b.dollar_volume.total_cmp(&a.dollar_volume)
}

fn pct(row: &QuoteRow) -> f64 {
    row.pct_change.unwrap_or(0.0)
}

/// Rank normalized rows into the five lists.
///
/// Volume ranking runs over the full input rather than the capped universe;
/// the gainer/loser pool requires a defined change and `close >= price_floor`.
pub fn rank(rows: &[QuoteRow], policy: &RankPolicy) -> RankedLists {
    let mut by_value = rows.to_vec();
    by_value.sort_by(by_value_desc);
    by_value.truncate(policy.universe_cap);

    let top_by_value = by_value.iter().take(policy.top_n).cloned().collect();

    let mut by_volume = rows.to_vec();
    by_volume.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    by_volume.truncate(policy.top_n);

    let pool: Vec<QuoteRow> = rows
        .iter()
        .filter(|r| r.pct_change.is_some() && r.close >= policy.price_floor)
        .cloned()
        .collect();

    let mut gainers = pool.clone();
    gainers.sort_by(|a, b| pct(b).total_cmp(&pct(a)));
    gainers.truncate(policy.top_n);

    let mut losers = pool;
    losers.sort_by(|a, b| pct(a).total_cmp(&pct(b)));
    losers.truncate(policy.top_n);

    RankedLists {
        universe_by_value: by_value,
        top_by_value,
        top_by_volume: by_volume,
        top_gainers: gainers,
        top_losers: losers,
    }
}
