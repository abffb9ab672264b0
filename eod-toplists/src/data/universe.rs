//! Ticker universe input and symbol mapping.

use anyhow::{Context, Result};
use eod_common::Market;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Large-cap JPX codes used when no tickers file is present.
const JP_SEED: &[&str] = &[
    "7203", "6758", "9984", "9432", "9983", "8306", "8035", "6861", "4063", "4502", "6954",
    "7974", "8591", "8766", "6367", "7267", "7269", "7751", "7735", "7201",
];

/// Large-cap US tickers used when no tickers file is present.
const US_SEED: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "AVGO", "JPM", "V", "UNH", "XOM",
    "LLY", "MA", "COST", "HD", "PG", "JNJ", "NFLX", "AMD",
];

/// Exchange-specific symbol conventions for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketSpec {
    pub market: Market,
}

impl MarketSpec {
    pub fn new(market: Market) -> Self {
        Self { market }
    }

    /// Market tag written into the bundle ("JP", "US")
    pub fn tag(&self) -> &'static str {
        self.market.tag()
    }

    pub fn currency(&self) -> &'static str {
        self.market.currency()
    }

    /// Exchange code → provider symbol (`7203` → `7203.T`).
    pub fn to_symbol(&self, code: &str) -> String {
        let suffix = self.market.symbol_suffix();
        if suffix.is_empty() || code.ends_with(suffix) {
            code.to_string()
        } else {
            format!("{}{}", code, suffix)
        }
    }

    /// Provider symbol → exchange code (`7203.T` → `7203`).
    pub fn from_symbol<'a>(&self, symbol: &'a str) -> &'a str {
        let suffix = self.market.symbol_suffix();
        if suffix.is_empty() {
            return symbol;
        }
        symbol.strip_suffix(suffix).unwrap_or(symbol)
    }

    /// Built-in fallback universe.
    pub fn seed_codes(&self) -> &'static [&'static str] {
        match self.market {
            Market::Jp => JP_SEED,
            Market::Us => US_SEED,
        }
    }
}

impl From<Market> for MarketSpec {
    fn from(market: Market) -> Self {
        Self::new(market)
    }
}

/// Parse a newline-delimited code list, skipping blanks and `#` comments.
pub fn parse_universe(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the ticker universe for a market.
///
/// A missing file falls back to the built-in seed list with a warning; an
/// unreadable file is an error.
pub fn load_universe(path: &Path, spec: &MarketSpec) -> Result<Vec<String>> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            market = spec.tag(),
            seed = spec.seed_codes().len(),
            "Tickers file not found, using built-in seed list"
        );
        return Ok(spec.seed_codes().iter().map(|c| c.to_string()).collect());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tickers file {}", path.display()))?;
    let codes = parse_universe(&content);
    info!(path = %path.display(), tickers = codes.len(), "Loaded ticker universe");
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jp_symbol_mapping() {
        let spec = MarketSpec::new(Market::Jp);
        assert_eq!(spec.to_symbol("7203"), "7203.T");
        assert_eq!(spec.to_symbol("7203.T"), "7203.T");
        assert_eq!(spec.from_symbol("7203.T"), "7203");
        assert_eq!(spec.from_symbol("7203"), "7203");
    }

    #[test]
    fn test_us_symbol_mapping_is_identity() {
        let spec = MarketSpec::new(Market::Us);
        assert_eq!(spec.to_symbol("AAPL"), "AAPL");
        assert_eq!(spec.from_symbol("BRK-B"), "BRK-B");
    }

    #[test]
    fn test_parse_universe_skips_comments_and_blanks() {
        let codes = parse_universe("# prime\n7203\n\n  6758  \n# end\n9984\n");
        assert_eq!(codes, vec!["7203", "6758", "9984"]);
    }

    #[test]
    fn test_missing_file_uses_seed() {
        let spec = MarketSpec::new(Market::Jp);
        let codes = load_universe(Path::new("/nonexistent/tickers.txt"), &spec).unwrap();
        assert_eq!(codes.len(), 20);
        assert_eq!(codes[0], "7203");
    }

    #[test]
    fn test_load_universe_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.txt");
        fs::write(&path, "AAPL\nMSFT\n").unwrap();

        let codes = load_universe(&path, &MarketSpec::new(Market::Us)).unwrap();
        assert_eq!(codes, vec!["AAPL", "MSFT"]);
    }
}
