//! The bundled `data/` files load and tag as expected.

use std::path::PathBuf;

use eod_common::Market;
use eod_toplists::data::{load_universe, MarketSpec};
use eod_toplists::{Enricher, NameTable, QuoteRow, ThemeRuleSet};

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("data")
}

fn enricher() -> Enricher {
    let names = NameTable::load(&data_dir().join("jpx_names.csv")).unwrap();
    let rules = ThemeRuleSet::load(Some(&data_dir().join("theme_rules.json"))).unwrap();
    Enricher::new(names, Some(rules))
}

fn annotated(code: &str) -> QuoteRow {
    let mut row = QuoteRow::new(code, None, 1000.0, 1.0, Some(990.0));
    enricher().annotate(&mut row);
    row
}

#[test]
fn test_universe_files() {
    let jp = load_universe(&data_dir().join("jpx_tickers.txt"), &MarketSpec::new(Market::Jp)).unwrap();
    assert_eq!(jp.len(), 20);
    assert_eq!(jp[0], "7203");

    let us = load_universe(&data_dir().join("us_tickers.txt"), &MarketSpec::new(Market::Us)).unwrap();
    assert_eq!(us.len(), 10);
    assert!(us.iter().all(|t| !t.starts_with('#')));
}

#[test]
fn test_names_table() {
    let names = NameTable::load(&data_dir().join("jpx_names.csv")).unwrap();
    assert_eq!(names.len(), 20);
    assert_eq!(names.get("7203").unwrap().name, "トヨタ自動車");
    assert_eq!(names.get("6367").unwrap().theme, None);
    assert_eq!(names.get("9101").unwrap().theme.as_deref(), Some("海運・物流"));
}

#[test]
fn test_keyword_tags() {
    let row = annotated("7203");
    assert_eq!(row.name, "トヨタ自動車");
    assert_eq!(row.themes, vec!["自動車・部品"]);

    assert_eq!(annotated("8035").themes, vec!["半導体・製造装置"]);
    assert_eq!(annotated("7011").themes, vec!["重工・防衛"]);
    assert!(annotated("6367").themes.is_empty());
}

#[test]
fn test_manual_theme_is_not_duplicated() {
    assert_eq!(annotated("9101").themes, vec!["海運・物流"]);
    assert_eq!(annotated("8766").themes, vec!["金融"]);
}

#[test]
fn test_manual_theme_comes_first() {
    // ソニーグループ matches no keyword rule; the manual tag stands alone
    assert_eq!(annotated("6758").themes, vec!["ゲーム・コンテンツ"]);
    // 本田技研工業: manual tag and keyword rule agree
    assert_eq!(annotated("7267").themes, vec!["自動車・部品"]);
}
