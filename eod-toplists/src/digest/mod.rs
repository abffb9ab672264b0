//! Digest composition.
//!
//! ```text
//! Bundle ──▶ DigestStats ──┬──▶ payload ──▶ NarrativeGenerator ──┐
//!                          │                  (retry, backoff)   ├──▶ DigestReport ──▶ digest.md
//!                          └──────────────▶ fallback template ───┘
//! ```
//!
//! The generator is optional. When it is absent, keeps failing, or returns
//! blank text, the fallback narrative is used instead, so the document always
//! carries the same section headings.

pub mod fallback;
pub mod narrative;
pub mod report;
pub mod stats;

pub use fallback::{fallback_narrative, SECTION_HEADINGS};
pub use narrative::{NarrativeError, NarrativeGenerator, OpenAiNarrator};
pub use report::{md_table, DigestReport};
pub use stats::{percentile, Breadth, DigestStats, PctStats};

use anyhow::{Context, Result};
use eod_common::NarrativeConfig;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::bundle::Bundle;
use crate::error::RunError;
use crate::ranking::QuoteRow;

/// Default digest file name, next to the bundle.
pub const DIGEST_FILE: &str = "digest.md";

/// Rows of the universe included in the payload as context.
const PAYLOAD_UNIVERSE_ROWS: usize = 40;

/// Attempt count and linear backoff for the narrative call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Attempt `k` (1-based) that fails waits `k × backoff_step`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &NarrativeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step(),
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Where the narrative of a digest came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeSource {
    Generated { generator: String },
    Fallback,
}

/// A composed digest.
#[derive(Debug, Clone)]
pub struct Digest {
    pub markdown: String,
    pub stats: DigestStats,
    pub source: NarrativeSource,
}

impl Digest {
    pub fn used_fallback(&self) -> bool {
        self.source == NarrativeSource::Fallback
    }

    /// Write the Markdown, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create digest directory")?;
        }
        std::fs::write(path, &self.markdown)
            .with_context(|| format!("Failed to write digest {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}

/// Turns a bundle into a Markdown digest.
pub struct DigestComposer {
    generator: Option<Arc<dyn NarrativeGenerator>>,
    retry: RetryPolicy,
}

impl DigestComposer {
    pub fn new(generator: Option<Arc<dyn NarrativeGenerator>>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    /// Fallback-only composer.
    pub fn offline() -> Self {
        Self::new(None, RetryPolicy::default())
    }

    /// Composer for a run. With `no_llm` the narrative service is skipped;
    /// otherwise a usable API key is required up front.
    pub fn from_config(
        config: &NarrativeConfig,
        no_llm: bool,
    ) -> std::result::Result<Self, RunError> {
        if no_llm {
            return Ok(Self::offline());
        }
        let narrator = OpenAiNarrator::from_config(config).map_err(|e| {
            RunError::MissingCredentials(format!("{} (use --no-llm to skip)", e))
        })?;
        Ok(Self::new(
            Some(Arc::new(narrator)),
            RetryPolicy::from_config(config),
        ))
    }

    /// Name of the configured generator, if any.
    pub fn generator_name(&self) -> Option<&str> {
        self.generator.as_ref().map(|g| g.name())
    }

    pub async fn compose(&self, bundle: &Bundle) -> Digest {
        let stats = DigestStats::compute(bundle);

        let generated = match &self.generator {
            Some(generator) => {
                let system = system_instruction(bundle);
                let payload = build_payload(bundle, &stats);
                self.generate_with_retry(generator.as_ref(), &system, &payload)
                    .await
                    .map(|text| (text, generator.name().to_string()))
            }
            None => None,
        };

        let (narrative, source) = match generated {
            Some((text, name)) => (text, NarrativeSource::Generated { generator: name }),
            None => (fallback_narrative(&stats, bundle), NarrativeSource::Fallback),
        };

        info!(date = %bundle.date, source = ?source, "Digest composed");
        let markdown = DigestReport::new(bundle, &narrative).to_markdown();
        Digest {
            markdown,
            stats,
            source,
        }
    }

    /// `None` once attempts are exhausted or the generator returned nothing.
    async fn generate_with_retry(
        &self,
        generator: &dyn NarrativeGenerator,
        system: &str,
        payload: &Value,
    ) -> Option<String> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match generator.generate(system, payload).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(generator = generator.name(), attempt, "Narrative generated");
                    return Some(text);
                }
                Ok(_) | Err(NarrativeError::Empty) => {
                    warn!(generator = generator.name(), attempt, "Narrative empty, using fallback");
                    return None;
                }
                Err(e) => {
                    warn!(
                        generator = generator.name(),
                        attempt,
                        max_attempts,
                        error = %e,
                        "Narrative generation failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        warn!(generator = generator.name(), "Narrative attempts exhausted, using fallback");
        None
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// System instruction naming the sections the narrative must contain.
pub fn system_instruction(bundle: &Bundle) -> String {
    let region = if bundle.is_jpy() { "日本株" } else { "米国株" };
    let headings = SECTION_HEADINGS
        .iter()
        .map(|h| format!("## {}", h))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "あなたは{region}マーケットの客観的な日次レポート執筆アシスタントです。\n\
         入力JSON（集計統計・トップリスト・テーマ集計）だけを根拠に、簡潔で事実ベースの日本語で書いてください。\n\
         出力はMarkdownのみ。次の小見出しをこの順にすべて含め、本文は小見出しから始めてください:\n\
         {headings}\n\
         個別銘柄は「銘柄名（コード）」表記。表は書かないでください（下部に別表があります）。\n\
         絵文字や誇張表現は使わないでください。"
    )
}

fn compact_rows(rows: &[QuoteRow], limit: usize) -> Vec<Value> {
    rows.iter()
        .take(limit)
        .map(|r| {
            json!({
                "ticker": r.ticker,
                "name": r.name,
                "close": r.close,
                "volume": r.volume,
                "dollar_volume": r.dollar_volume,
                "pct_change": r.pct_change,
                "themes": r.themes,
            })
        })
        .collect()
}

/// Structured payload handed to the generator.
pub fn build_payload(bundle: &Bundle, stats: &DigestStats) -> Value {
    let n = bundle.top_n();
    let lists = &bundle.lists;
    json!({
        "date": bundle.date,
        "market": bundle.market,
        "currency": bundle.currency,
        "price_floor": bundle.params.price_floor,
        "stats": stats,
        "top_lists": {
            "top_dollar_value": compact_rows(&lists.top_by_value, n),
            "top_volume": compact_rows(&lists.top_by_volume, n),
            "top_gainers": compact_rows(&lists.top_gainers, n),
            "top_losers": compact_rows(&lists.top_losers, n),
        },
        "universe_top40_by_dollar": compact_rows(&lists.universe_by_value, PAYLOAD_UNIVERSE_ROWS),
        "themes": bundle.themes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleParams;
    use crate::data::MarketSpec;
    use crate::ranking::{rank, RankPolicy};
    use async_trait::async_trait;
    use eod_common::Market;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        fail_times: u32,
        reply: &'static str,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(fail_times: u32, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                fail_times,
                reply,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl NarrativeGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _system: &str, _payload: &Value) -> Result<String, NarrativeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(NarrativeError::Network("boom".into()))
            } else {
                Ok(self.reply.to_string())
            }
        }
    }

    fn no_wait(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_step: Duration::ZERO,
        }
    }

    fn bundle() -> Bundle {
        let policy = RankPolicy::for_market(Market::Jp);
        let rows = vec![
            QuoteRow::new("7203", None, 3000.0, 1000.0, Some(2900.0)),
            QuoteRow::new("6758", None, 12000.0, 100.0, Some(12500.0)),
        ];
        Bundle::assemble(
            rank(&rows, &policy),
            "2024-06-04",
            &MarketSpec::new(Market::Jp),
            BundleParams::new(&policy, 100),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_offline_uses_fallback() {
        let digest = DigestComposer::offline().compose(&bundle()).await;
        assert!(digest.used_fallback());
        for heading in SECTION_HEADINGS {
            assert!(digest.markdown.contains(heading));
        }
        assert!(digest.markdown.contains("### 売買代金 Top10"));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let generator = Scripted::new(2, "## 市況ダイジェスト\n- generated");
        let composer = DigestComposer::new(Some(generator.clone()), no_wait(3));
        let digest = composer.compose(&bundle()).await;

        assert_eq!(
            digest.source,
            NarrativeSource::Generated {
                generator: "scripted".into()
            }
        );
        assert!(digest.markdown.contains("- generated"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fall_back() {
        let generator = Scripted::new(u32::MAX, "");
        let composer = DigestComposer::new(Some(generator.clone()), no_wait(3));
        let digest = composer.compose(&bundle()).await;

        assert!(digest.used_fallback());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_blank_reply_falls_back_without_retry() {
        let generator = Scripted::new(0, "   \n");
        let composer = DigestComposer::new(Some(generator.clone()), no_wait(3));
        let digest = composer.compose(&bundle()).await;

        assert!(digest.used_fallback());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_save_to_file_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-06-04").join("digest.md");
        let digest = DigestComposer::offline().compose(&bundle()).await;

        let written = digest.save_to_file(&path).unwrap();
        assert_eq!(written, path);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# 取引代金上位600日本株"));
    }

    #[test]
    fn test_from_config_without_key_is_missing_credentials() {
        let config = NarrativeConfig::default();
        let err = DigestComposer::from_config(&config, false).err().unwrap();
        assert!(matches!(err, RunError::MissingCredentials(_)));
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_from_config_no_llm_skips_key_check() {
        let config = NarrativeConfig::default();
        let composer = DigestComposer::from_config(&config, true).unwrap();
        assert_eq!(composer.generator_name(), None);
    }

    #[test]
    fn test_from_config_with_key_uses_service() {
        let mut config = NarrativeConfig::default();
        config.api_key = Some("sk-test".into());
        config.max_attempts = 5;
        let composer = DigestComposer::from_config(&config, false).unwrap();
        assert_eq!(composer.generator_name(), Some("openai"));
        assert_eq!(composer.retry.max_attempts, 5);
    }

    #[test]
    fn test_from_config_invalid_key_is_missing_credentials() {
        let mut config = NarrativeConfig::default();
        config.api_key = Some("sk-a\nb".into());
        let err = DigestComposer::from_config(&config, false).err().unwrap();
        assert!(matches!(err, RunError::MissingCredentials(_)));
    }

    #[test]
    fn test_linear_backoff() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn test_payload_shape() {
        let b = bundle();
        let stats = DigestStats::compute(&b);
        let payload = build_payload(&b, &stats);

        assert_eq!(payload["date"], "2024-06-04");
        assert_eq!(payload["currency"], "JPY");
        assert_eq!(payload["stats"]["breadth"]["up"], 1);
        assert_eq!(payload["top_lists"]["top_dollar_value"][0]["ticker"], "7203");
        assert!(payload["themes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_system_instruction_lists_headings() {
        let system = system_instruction(&bundle());
        for heading in SECTION_HEADINGS {
            assert!(system.contains(&format!("## {}", heading)));
        }
        assert!(system.contains("日本株"));
    }
}
