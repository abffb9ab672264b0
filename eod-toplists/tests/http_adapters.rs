//! HTTP adapter tests against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use eod_common::NarrativeConfig;
use eod_toplists::data::{ProviderError, QuoteProvider, YahooChartProvider};
use eod_toplists::digest::{NarrativeError, NarrativeGenerator, OpenAiNarrator};
use eod_toplists::{DigestComposer, NarrativeSource, RetryPolicy};

// ============================================================================
// Quote provider
// ============================================================================

fn chart_body() -> serde_json::Value {
    json!({
        "chart": {
            "result": [{
                "meta": { "gmtoffset": -14400 },
                "timestamp": [1717421400, 1717507800],
                "indicators": { "quote": [{
                    "open": [192.9, 194.6],
                    "close": [194.0, 194.4],
                    "volume": [50080500, 47471400]
                }]}
            }],
            "error": null
        }
    })
}

fn provider(server: &MockServer) -> YahooChartProvider {
    YahooChartProvider::new(server.uri(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_chart_fetch_skips_unknown_symbols() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .and(query_param("interval", "1d"))
        .and(query_param("range", "10d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ZZZZ"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let symbols = vec!["AAPL".to_string(), "ZZZZ".to_string()];
    let histories = provider(&server).fetch_daily(&symbols, 10).await.unwrap();

    assert_eq!(histories.len(), 1);
    let aapl = &histories[0];
    assert_eq!(aapl.symbol, "AAPL");
    assert_eq!(aapl.bars.len(), 2);
    assert_eq!(aapl.bars[1].date.to_string(), "2024-06-04");
    assert_eq!(aapl.bars[1].close, Some(194.4));
    assert_eq!(aapl.bars[1].volume, Some(47_471_400.0));
}

#[tokio::test]
async fn test_chart_empty_result_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/DELISTED"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "chart": { "result": null } })),
        )
        .mount(&server)
        .await;

    let histories = provider(&server)
        .fetch_daily(&["DELISTED".to_string()], 10)
        .await
        .unwrap();
    assert!(histories.is_empty());
}

#[tokio::test]
async fn test_chart_server_error_fails_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = provider(&server)
        .fetch_daily(&["AAPL".to_string()], 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
    assert_eq!(err.retry_after(), None);
}

#[tokio::test]
async fn test_chart_rate_limit_reports_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .fetch_daily(&["AAPL".to_string()], 10)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: Some(30)
        }
    ));
    assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
}

// ============================================================================
// Narrative service
// ============================================================================

fn narrative_config(server: &MockServer) -> NarrativeConfig {
    let mut config = NarrativeConfig::default();
    config.api_key = Some("sk-test".into());
    config.base_url = server.uri();
    config
}

#[tokio::test]
async fn test_responses_api_output_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-5" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "output_text": "## 市況ダイジェスト\n- 本文" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let narrator = OpenAiNarrator::from_config(&narrative_config(&server)).unwrap();
    let text = narrator
        .generate("system", &json!({ "date": "2024-06-04" }))
        .await
        .unwrap();
    assert_eq!(text, "## 市況ダイジェスト\n- 本文");
}

#[tokio::test]
async fn test_responses_api_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let narrator = OpenAiNarrator::from_config(&narrative_config(&server)).unwrap();
    let err = narrator.generate("system", &json!({})).await.unwrap_err();
    match err {
        NarrativeError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_responses_api_without_text_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output": [] })))
        .mount(&server)
        .await;

    let narrator = OpenAiNarrator::from_config(&narrative_config(&server)).unwrap();
    let err = narrator.generate("system", &json!({})).await.unwrap_err();
    assert!(matches!(err, NarrativeError::Empty));
}

#[tokio::test]
async fn test_composer_recovers_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "output_text": "## 市況ダイジェスト\n- 2回目" })),
        )
        .mount(&server)
        .await;

    let narrator = OpenAiNarrator::from_config(&narrative_config(&server)).unwrap();
    let composer = DigestComposer::new(
        Some(Arc::new(narrator)),
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::ZERO,
        },
    );

    let dir = tempfile::tempdir().unwrap();
    let bundle = eod_toplists::Bundle::load(&fixture_bundle(dir.path())).unwrap();
    let digest = composer.compose(&bundle).await;

    assert_eq!(
        digest.source,
        NarrativeSource::Generated {
            generator: "openai".into()
        }
    );
    assert!(digest.markdown.contains("- 2回目"));
}

/// Minimal bundle on disk, in the legacy field layout.
fn fixture_bundle(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("bundle.json");
    let raw = json!({
        "date": "2024-06-04",
        "market": "JP",
        "currency": "JPY",
        "params": { "min_price_jpy": 1000.0, "top_n": 10, "universe_cap": 600, "batch": 100 },
        "counts": { "universe_total": 1 },
        "lists": {
            "universe_top600_by_dollar": [
                { "ticker": "7203", "close": 3000.0, "volume": 1000.0,
                  "dollar_volume": 3000000.0, "pct_change": 0.01 }
            ],
            "top10_dollar_value": [
                { "ticker": "7203", "close": 3000.0, "volume": 1000.0,
                  "dollar_volume": 3000000.0, "pct_change": 0.01 }
            ]
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();
    path
}
