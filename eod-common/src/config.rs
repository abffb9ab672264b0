//! Configuration management for the top-lists pipeline.
//!
//! The configuration lives at `~/.eod-toplists/config.json` (plus an optional
//! `secrets.json` next to it). Every field has a default, so running without
//! any file is valid.
//!
//! # Configuration Priority
//!
//! 1. Command-line flags (passed to [`Config::load`] as env-style pairs)
//! 2. Environment variables
//! 3. Explicit config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `EOD_MARKET` → market.market (`jp` | `us`)
//! - `EOD_TICKERS_FILE` / `EOD_NAMES_FILE` / `EOD_THEMES_FILE` → market.*_path
//! - `EOD_DATE_POLICY` → market.date_policy (`last-session` | `close-cutoff`)
//! - `EOD_BATCH_SIZE` (alias `JPX_BATCH`) → fetch.batch_size
//! - `EOD_BATCH_DELAY_SECS` (alias `JPX_SLEEP`) → fetch.batch_delay_secs
//! - `EOD_COOLDOWN_SECS` → fetch.cooldown_secs
//! - `EOD_LOOKBACK_DAYS` → fetch.lookback_days
//! - `EOD_PRICE_FLOOR` (alias `MIN_PRICE_JPY`, JP only) → ranking.price_floor
//! - `EOD_UNIVERSE_CAP` → ranking.universe_cap
//! - `EOD_TOP_N` → ranking.top_n
//! - `EOD_THEME_LEADERS` → ranking.theme_leaders
//! - `EOD_OUT_DIR` → output.root
//! - `OPENAI_API_KEY` → narrative.api_key
//! - `OPENAI_MODEL` → narrative.model
//! - `OPENAI_MAX_OUTPUT_TOKENS` → narrative.max_output_tokens
//! - `OPENAI_BASE_URL` → narrative.base_url
//! - `EOD_LOG_LEVEL` / `EOD_LOG_FORMAT` → observability.*

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config_loader::{load_json_file, load_layered_config};
use crate::error::{Error, Result, ResultExt};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".eod-toplists"),
        |dirs| dirs.home_dir().join(".eod-toplists"),
    )
}

// ============================================================================
// Market
// ============================================================================

/// Market regime a run is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Tokyo Stock Exchange (JPX), JPY-denominated
    #[default]
    Jp,
    /// US listed equities, USD-denominated
    Us,
}

impl Market {
    /// Tag written into the bundle.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Jp => "JP",
            Self::Us => "US",
        }
    }

    /// ISO currency code of traded value.
    pub fn currency(&self) -> &'static str {
        match self {
            Self::Jp => "JPY",
            Self::Us => "USD",
        }
    }

    /// Provider symbol suffix (e.g. `7203` → `7203.T`).
    pub fn symbol_suffix(&self) -> &'static str {
        match self {
            Self::Jp => ".T",
            Self::Us => "",
        }
    }

    /// Minimum close for gainer/loser eligibility when not configured.
    pub fn default_price_floor(&self) -> f64 {
        match self {
            Self::Jp => 1000.0,
            Self::Us => 10.0,
        }
    }

    /// Whether ranked tables carry a `name` column by default.
    pub fn default_include_name(&self) -> bool {
        matches!(self, Self::Jp)
    }

    fn default_out_dir(&self) -> &'static str {
        match self {
            Self::Jp => "out_jpx",
            Self::Us => "out",
        }
    }

    fn default_tickers_path(&self) -> &'static str {
        match self {
            Self::Jp => "data/jpx_tickers.txt",
            Self::Us => "data/us_tickers.txt",
        }
    }

    fn default_names_path(&self) -> Option<&'static str> {
        match self {
            Self::Jp => Some("data/jpx_names.csv"),
            Self::Us => None,
        }
    }

    fn default_date_policy(&self) -> DatePolicyKind {
        match self {
            Self::Jp => DatePolicyKind::CloseCutoff,
            Self::Us => DatePolicyKind::LastSession,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jp => write!(f, "jp"),
            Self::Us => write!(f, "us"),
        }
    }
}

impl FromStr for Market {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jp" | "jpx" | "japan" => Ok(Self::Jp),
            "us" | "usa" => Ok(Self::Us),
            other => Err(Error::InvalidInput(format!("Unknown market: {}", other))),
        }
    }
}

/// Which strategy resolves the calendar date a run is labelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatePolicyKind {
    /// Always the latest observed session date
    LastSession,
    /// Exchange-local "today" once the close cutoff has passed
    CloseCutoff,
}

impl fmt::Display for DatePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastSession => write!(f, "last-session"),
            Self::CloseCutoff => write!(f, "close-cutoff"),
        }
    }
}

impl FromStr for DatePolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "last-session" | "session" => Ok(Self::LastSession),
            "close-cutoff" | "cutoff" => Ok(Self::CloseCutoff),
            other => Err(Error::InvalidInput(format!("Unknown date policy: {}", other))),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Market selection and input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub market: Market,

    /// Newline-delimited ticker codes
    #[serde(default)]
    pub tickers_path: Option<String>,

    /// Ticker → name/theme lookup (headered CSV)
    #[serde(default)]
    pub names_path: Option<String>,

    /// Ordered theme keyword rules (JSON); built-in rules when unset
    #[serde(default)]
    pub themes_path: Option<String>,

    /// Theme tagging on/off
    #[serde(default = "default_true")]
    pub themes_enabled: bool,

    /// Include the `name` column in CSV output (market default when unset)
    #[serde(default)]
    pub include_name: Option<bool>,

    #[serde(default)]
    pub date_policy: Option<DatePolicyKind>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            market: Market::default(),
            tickers_path: None,
            names_path: None,
            themes_path: None,
            themes_enabled: true,
            include_name: None,
            date_policy: None,
        }
    }
}

/// Batch fetch pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between successful batches (seconds)
    #[serde(default = "default_batch_delay_secs")]
    pub batch_delay_secs: f64,

    /// Pause after a failed batch (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    /// History window requested per symbol (calendar days)
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Quote endpoint base URL
    #[serde(default = "default_quote_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_secs: default_batch_delay_secs(),
            cooldown_secs: default_cooldown_secs(),
            lookback_days: default_lookback_days(),
            base_url: default_quote_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.batch_delay_secs.max(0.0))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs.max(0.0))
    }
}

/// The ranking policy surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_universe_cap")]
    pub universe_cap: usize,

    /// Minimum close for gainers/losers (market default when unset)
    #[serde(default)]
    pub price_floor: Option<f64>,

    /// Leaders listed per theme aggregate
    #[serde(default = "default_theme_leaders")]
    pub theme_leaders: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            universe_cap: default_universe_cap(),
            price_floor: None,
            theme_leaders: default_theme_leaders(),
        }
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory; a `<date>/` subdirectory is created per run
    #[serde(default)]
    pub root: Option<String>,
}

/// Narrative-generation collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_narrative_base_url")]
    pub base_url: String,

    /// Total attempts before falling back
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff step (seconds); attempt k waits k × step
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: f64,

    #[serde(default = "default_narrative_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            base_url: default_narrative_base_url(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_narrative_timeout_secs(),
        }
    }
}

impl NarrativeConfig {
    /// API key, if one is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_secs.max(0.0))
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_delay_secs() -> f64 {
    0.6
}

fn default_cooldown_secs() -> f64 {
    2.0
}

fn default_lookback_days() -> u32 {
    5
}

fn default_quote_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_top_n() -> usize {
    10
}

fn default_universe_cap() -> usize {
    600
}

fn default_theme_leaders() -> usize {
    5
}

fn default_model() -> String {
    "gpt-5".to_string()
}

fn default_max_output_tokens() -> u32 {
    2800
}

fn default_narrative_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> f64 {
    2.0
}

fn default_narrative_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration passed explicitly into the pipeline entry points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub narrative: NarrativeConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory or an explicit file,
    /// then apply `.env`, process environment and command-line overrides.
    ///
    /// `cli` holds `(env key, value)` pairs from command-line flags; they win
    /// over the environment.
    pub fn load(explicit: Option<&Path>, cli: &[(&str, String)]) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let value = load_layered_config(&config_dir())?;
                serde_json::from_value(value).context("Invalid configuration")?
            }
        };

        dotenvy::dotenv().ok();
        config.apply_overrides(|key| {
            cli.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var(key).ok())
        });
        config.validate()?;

        Ok(config)
    }

    /// Load from a specific file path; the file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let value = load_json_file(path)?.ok_or_else(|| {
            Error::Config(format!("Config file not found: {}", path.display()))
        })?;
        serde_json::from_value(value).context(format!("Invalid configuration in {}", path.display()))
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(market) = parsed::<Market>(get(&["EOD_MARKET"]), "EOD_MARKET") {
            self.market.market = market;
        }
        if let Some(path) = get(&["EOD_TICKERS_FILE"]) {
            self.market.tickers_path = Some(path);
        }
        if let Some(path) = get(&["EOD_NAMES_FILE"]) {
            self.market.names_path = Some(path);
        }
        if let Some(path) = get(&["EOD_THEMES_FILE"]) {
            self.market.themes_path = Some(path);
        }
        if let Some(policy) =
            parsed::<DatePolicyKind>(get(&["EOD_DATE_POLICY"]), "EOD_DATE_POLICY")
        {
            self.market.date_policy = Some(policy);
        }

        if let Some(n) = parsed::<usize>(get(&["EOD_BATCH_SIZE", "JPX_BATCH"]), "EOD_BATCH_SIZE") {
            self.fetch.batch_size = n;
        }
        if let Some(s) =
            parsed::<f64>(get(&["EOD_BATCH_DELAY_SECS", "JPX_SLEEP"]), "EOD_BATCH_DELAY_SECS")
        {
            self.fetch.batch_delay_secs = s;
        }
        if let Some(s) = parsed::<f64>(get(&["EOD_COOLDOWN_SECS"]), "EOD_COOLDOWN_SECS") {
            self.fetch.cooldown_secs = s;
        }
        if let Some(d) = parsed::<u32>(get(&["EOD_LOOKBACK_DAYS"]), "EOD_LOOKBACK_DAYS") {
            self.fetch.lookback_days = d;
        }

        // MIN_PRICE_JPY is a yen floor and only applies to JP runs
        let floor = parsed::<f64>(get(&["EOD_PRICE_FLOOR"]), "EOD_PRICE_FLOOR").or_else(|| {
            if self.market.market == Market::Jp {
                parsed::<f64>(get(&["MIN_PRICE_JPY"]), "MIN_PRICE_JPY")
            } else {
                None
            }
        });
        if let Some(p) = floor {
            self.ranking.price_floor = Some(p);
        }
        if let Some(n) = parsed::<usize>(get(&["EOD_UNIVERSE_CAP"]), "EOD_UNIVERSE_CAP") {
            self.ranking.universe_cap = n;
        }
        if let Some(n) = parsed::<usize>(get(&["EOD_TOP_N"]), "EOD_TOP_N") {
            self.ranking.top_n = n;
        }
        if let Some(n) = parsed::<usize>(get(&["EOD_THEME_LEADERS"]), "EOD_THEME_LEADERS") {
            self.ranking.theme_leaders = n;
        }

        if let Some(root) = get(&["EOD_OUT_DIR"]) {
            self.output.root = Some(root);
        }

        if let Some(key) = get(&["OPENAI_API_KEY"]) {
            self.narrative.api_key = Some(key);
        }
        if let Some(model) = get(&["OPENAI_MODEL"]) {
            self.narrative.model = model;
        }
        if let Some(n) =
            parsed::<u32>(get(&["OPENAI_MAX_OUTPUT_TOKENS"]), "OPENAI_MAX_OUTPUT_TOKENS")
        {
            self.narrative.max_output_tokens = n;
        }
        if let Some(url) = get(&["OPENAI_BASE_URL"]) {
            self.narrative.base_url = url;
        }

        if let Some(level) = get(&["EOD_LOG_LEVEL"]) {
            self.observability.log_level = level;
        }
        if let Some(format) = get(&["EOD_LOG_FORMAT"]) {
            self.observability.log_format = format;
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.batch_size == 0 {
            return Err(Error::Config("fetch.batch_size must be positive".into()));
        }
        if self.ranking.top_n == 0 {
            return Err(Error::Config("ranking.top_n must be positive".into()));
        }
        if self.ranking.universe_cap == 0 {
            return Err(Error::Config("ranking.universe_cap must be positive".into()));
        }
        if let Some(floor) = self.ranking.price_floor {
            if !floor.is_finite() || floor < 0.0 {
                return Err(Error::Config(format!(
                    "ranking.price_floor must be a non-negative number, got {}",
                    floor
                )));
            }
        }
        if self.narrative.max_attempts == 0 {
            return Err(Error::Config("narrative.max_attempts must be positive".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Market-resolved accessors
    // ------------------------------------------------------------------

    pub fn price_floor(&self) -> f64 {
        self.ranking
            .price_floor
            .unwrap_or_else(|| self.market.market.default_price_floor())
    }

    pub fn include_name(&self) -> bool {
        self.market
            .include_name
            .unwrap_or_else(|| self.market.market.default_include_name())
    }

    pub fn date_policy(&self) -> DatePolicyKind {
        self.market
            .date_policy
            .unwrap_or_else(|| self.market.market.default_date_policy())
    }

    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(
            self.output
                .root
                .as_deref()
                .unwrap_or_else(|| self.market.market.default_out_dir()),
        )
    }

    pub fn tickers_path(&self) -> PathBuf {
        PathBuf::from(
            self.market
                .tickers_path
                .as_deref()
                .unwrap_or_else(|| self.market.market.default_tickers_path()),
        )
    }

    pub fn names_path(&self) -> Option<PathBuf> {
        self.market
            .names_path
            .as_deref()
            .or_else(|| self.market.market.default_names_path())
            .map(PathBuf::from)
    }

    pub fn themes_path(&self) -> Option<PathBuf> {
        self.market.themes_path.as_deref().map(PathBuf::from)
    }
}

/// Parse an override value, logging and ignoring values that don't parse.
fn parsed<T: FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let raw = value?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable override");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
