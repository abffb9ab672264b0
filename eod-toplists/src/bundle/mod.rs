//! Bundle assembly.
//!
//! A bundle is the single artifact handed from the fetch stage to the digest
//! stage: ranked lists plus the context needed to interpret them. It is
//! written once and only read afterward.

pub mod writer;

pub use writer::{write_table, BundleWriter, TableSchema};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::data::MarketSpec;
use crate::enrich::ThemeStat;
use crate::ranking::{ListKind, RankPolicy, RankedLists};

/// File name of the JSON bundle inside a run directory.
pub const BUNDLE_FILE: &str = "bundle.json";

/// Run parameters recorded in the bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleParams {
    #[serde(default, alias = "min_price_jpy")]
    pub price_floor: f64,
    #[serde(default)]
    pub top_n: usize,
    #[serde(default)]
    pub universe_cap: usize,
    #[serde(default, alias = "batch")]
    pub batch_size: usize,
}

impl BundleParams {
    pub fn new(policy: &RankPolicy, batch_size: usize) -> Self {
        Self {
            price_floor: policy.price_floor,
            top_n: policy.top_n,
            universe_cap: policy.universe_cap,
            batch_size,
        }
    }
}

/// Row counts per list, plus the number of rows before capping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleCounts {
    #[serde(default)]
    pub universe_total: usize,
    #[serde(default, alias = "universe_top600_by_dollar")]
    pub universe_by_dollar: usize,
    #[serde(default)]
    pub top_dollar_value: usize,
    #[serde(default)]
    pub top_volume: usize,
    #[serde(default)]
    pub top_gainers: usize,
    #[serde(default)]
    pub top_losers: usize,
}

fn default_market() -> String {
    "US".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Ranked lists with their run context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Date label (YYYY-MM-DD)
    pub date: String,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub params: BundleParams,
    #[serde(default)]
    pub counts: BundleCounts,
    pub lists: RankedLists,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<ThemeStat>,
    #[serde(default)]
    pub source_note: String,
}

impl Bundle {
    /// Assemble a bundle. No date arithmetic happens here; `date_label` is
    /// used as given.
    pub fn assemble(
        lists: RankedLists,
        date_label: impl Into<String>,
        market: &MarketSpec,
        params: BundleParams,
        themes: Vec<ThemeStat>,
    ) -> Self {
        let counts = BundleCounts {
            universe_total: lists.universe_by_value.len(),
            universe_by_dollar: lists.universe_by_value.len(),
            top_dollar_value: lists.top_by_value.len(),
            top_volume: lists.top_by_volume.len(),
            top_gainers: lists.top_gainers.len(),
            top_losers: lists.top_losers.len(),
        };

        Self {
            date: date_label.into(),
            market: market.tag().to_string(),
            currency: market.currency().to_string(),
            params,
            counts,
            lists,
            themes,
            source_note: String::new(),
        }
    }

    /// Record how many rows survived normalization (before the universe cap).
    pub fn with_universe_total(mut self, total: usize) -> Self {
        self.counts.universe_total = total;
        self
    }

    pub fn with_source_note(mut self, note: impl Into<String>) -> Self {
        self.source_note = note.into();
        self
    }

    pub fn is_jpy(&self) -> bool {
        self.currency.eq_ignore_ascii_case("JPY")
    }

    /// Universe cap, falling back to the observed universe size for bundles
    /// written without parameters.
    pub fn universe_cap(&self) -> usize {
        if self.params.universe_cap > 0 {
            self.params.universe_cap
        } else {
            self.lists.universe_by_value.len()
        }
    }

    /// Top-N size, falling back to the longest top list.
    pub fn top_n(&self) -> usize {
        if self.params.top_n > 0 {
            return self.params.top_n;
        }
        ListKind::ALL[1..]
            .iter()
            .map(|k| self.lists.get(*k).len())
            .max()
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize bundle")
    }

    /// Read a bundle file, accepting legacy key names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read bundle {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse bundle {}", path.display()))
    }
}
