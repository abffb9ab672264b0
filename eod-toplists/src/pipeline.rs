//! Fetch pipeline: batched collection, ranking, enrichment and bundle output.
//!
//! Batches are fetched one after another. A failed batch is logged, followed
//! by a cooldown, and the run carries on; only a run that yields no rows at
//! all is an error.

use chrono::{DateTime, NaiveDate, Utc};
use eod_common::{Config, FetchConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bundle::{Bundle, BundleParams, BundleWriter, TableSchema};
use crate::data::{load_universe, MarketSpec, ProviderError, QuoteProvider};
use crate::date_policy::DateLabelPolicy;
use crate::digest::{Digest, DigestComposer, DIGEST_FILE};
use crate::enrich::{aggregate_themes, Enricher, NameTable, ThemeRuleSet};
use crate::error::RunError;
use crate::ranking::{normalize, rank, QuoteRow, RankPolicy};

/// Batch pacing for the fetch engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub cooldown: Duration,
    pub lookback_days: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl FetchSettings {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
            cooldown: config.cooldown(),
            lookback_days: config.lookback_days,
        }
    }

    /// Pause after a failed batch: the configured cooldown, stretched to any
    /// `Retry-After` the provider sent.
    pub fn cooldown_after(&self, error: &ProviderError) -> Duration {
        error
            .retry_after()
            .map_or(self.cooldown, |wait| wait.max(self.cooldown))
    }
}

/// Rows gathered across all batches.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub rows: Vec<QuoteRow>,
    /// Latest session date seen in any normalized row
    pub latest_session: Option<NaiveDate>,
    pub batches_ok: usize,
    pub batches_failed: usize,
}

// ============================================================================
// Fetch Engine
// ============================================================================

/// Drives a [`QuoteProvider`] over the universe in sequential batches.
pub struct FetchEngine<P: QuoteProvider> {
    provider: P,
    market: MarketSpec,
    settings: FetchSettings,
}

impl<P: QuoteProvider> FetchEngine<P> {
    pub fn new(provider: P, market: MarketSpec, settings: FetchSettings) -> Self {
        Self {
            provider,
            market,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch and normalize every code. Never fails; see [`Collected`].
    pub async fn collect(&self, codes: &[String]) -> Collected {
        let symbols: Vec<String> = codes.iter().map(|c| self.market.to_symbol(c)).collect();
        let batches: Vec<&[String]> = symbols.chunks(self.settings.batch_size.max(1)).collect();
        let total = batches.len();
        let mut out = Collected::default();

        for (i, batch) in batches.into_iter().enumerate() {
            let has_more = i + 1 < total;

            match self
                .provider
                .fetch_daily(batch, self.settings.lookback_days)
                .await
            {
                Ok(histories) => {
                    let before = out.rows.len();
                    for history in histories {
                        let code = self.market.from_symbol(&history.symbol);
                        if let Some(normalized) = normalize(code, &history.bars) {
                            out.latest_session = out.latest_session.max(Some(normalized.session));
                            out.rows.push(normalized.row);
                        }
                    }
                    out.batches_ok += 1;
                    debug!(
                        batch = i + 1,
                        of = total,
                        rows = out.rows.len() - before,
                        "Batch fetched"
                    );
                    if has_more {
                        tokio::time::sleep(self.settings.batch_delay).await;
                    }
                }
                Err(e) => {
                    out.batches_failed += 1;
                    let cooldown = self.settings.cooldown_after(&e);
                    warn!(
                        batch = i + 1,
                        of = total,
                        provider = self.provider.name(),
                        error = %e,
                        cooldown_secs = cooldown.as_secs_f64(),
                        "Batch failed, cooling down"
                    );
                    if has_more {
                        tokio::time::sleep(cooldown).await;
                    }
                }
            }
        }

        info!(
            provider = self.provider.name(),
            symbols = symbols.len(),
            rows = out.rows.len(),
            batches_ok = out.batches_ok,
            batches_failed = out.batches_failed,
            latest_session = ?out.latest_session,
            "Fetch complete"
        );
        out
    }
}

// ============================================================================
// Run
// ============================================================================

/// Outcome of a successful fetch run.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub bundle: Bundle,
    /// Directory the bundle was written to
    pub dir: PathBuf,
}

/// Build the enricher configured for this run.
pub fn build_enricher(config: &Config) -> Result<Enricher, RunError> {
    let names = match config.names_path() {
        Some(path) => NameTable::load(&path)?,
        None => NameTable::default(),
    };
    let rules = if config.market.themes_enabled {
        Some(ThemeRuleSet::load(config.themes_path().as_deref())?)
    } else {
        None
    };
    Ok(Enricher::new(names, rules))
}

/// Rank, enrich and label collected rows.
pub fn assemble_bundle(
    collected: Collected,
    config: &Config,
    enricher: &Enricher,
    source_note: &str,
    now: DateTime<Utc>,
) -> Result<Bundle, RunError> {
    if collected.rows.is_empty() {
        return Err(RunError::NoData(format!(
            "0 rows across {} batches ({} failed)",
            collected.batches_ok + collected.batches_failed,
            collected.batches_failed
        )));
    }
    let Some(latest) = collected.latest_session else {
        return Err(RunError::NoData("no session date observed".into()));
    };

    let market = MarketSpec::new(config.market.market);
    let policy = RankPolicy::from_config(config);

    let mut lists = rank(&collected.rows, &policy);
    enricher.enrich(&mut lists);

    let themes = if enricher.themes_enabled() {
        aggregate_themes(&lists.universe_by_value, config.ranking.theme_leaders)
    } else {
        Vec::new()
    };

    let label = DateLabelPolicy::for_market(config.date_policy(), config.market.market)
        .resolve(latest, now);

    Ok(Bundle::assemble(
        lists,
        label,
        &market,
        BundleParams::new(&policy, config.fetch.batch_size),
        themes,
    )
    .with_universe_total(collected.rows.len())
    .with_source_note(source_note))
}

/// Fetch the configured universe and write the bundle.
///
/// Nothing is written when the run yields no data.
pub async fn run_fetch<P: QuoteProvider>(
    config: &Config,
    provider: P,
    now: DateTime<Utc>,
) -> Result<FetchReport, RunError> {
    let market = MarketSpec::new(config.market.market);
    let codes = load_universe(&config.tickers_path(), &market)?;
    let enricher = build_enricher(config)?;

    info!(
        market = market.tag(),
        tickers = codes.len(),
        batch_size = config.fetch.batch_size,
        "Starting fetch"
    );

    let engine = FetchEngine::new(provider, market, FetchSettings::from_config(&config.fetch));
    let collected = engine.collect(&codes).await;

    let note = format!(
        "{} daily bars; dollar_volume = close × volume; free public data, may be delayed or incomplete",
        engine.provider().name()
    );
    let bundle = assemble_bundle(collected, config, &enricher, &note, now)?;

    let writer = BundleWriter::new(config.output_root(), TableSchema::new(config.include_name()));
    let dir = writer.write(&bundle)?;

    Ok(FetchReport { bundle, dir })
}

/// Outcome of a fetch followed by a digest.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub fetch: FetchReport,
    pub digest: Digest,
    pub digest_path: PathBuf,
}

/// Fetch, then compose and write the digest.
///
/// Narrative credentials are checked before the provider is called, so a
/// missing key costs no fetch work. `out` defaults to `digest.md` in the
/// bundle directory.
pub async fn run_fetch_and_digest<P: QuoteProvider>(
    config: &Config,
    provider: P,
    no_llm: bool,
    out: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let composer = DigestComposer::from_config(&config.narrative, no_llm)?;

    let fetch = run_fetch(config, provider, now).await?;
    let digest = composer.compose(&fetch.bundle).await;
    let path = out.map_or_else(|| fetch.dir.join(DIGEST_FILE), Path::to_path_buf);
    let digest_path = digest.save_to_file(&path)?;

    info!(
        path = %digest_path.display(),
        bytes = digest.markdown.len(),
        fallback = digest.used_fallback(),
        "Digest written"
    );
    Ok(RunReport {
        fetch,
        digest,
        digest_path,
    })
}
