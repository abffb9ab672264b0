//! Keyword theme rules and per-theme aggregation.
//!
//! Rules are an ordered list of `{ tag, keywords[] }`. Each tag is tested on
//! its own against the full display name with case-sensitive substring
//! matching, so a name can carry several tags. Tag order follows declaration
//! order.

use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::ranking::QuoteRow;

/// Built-in rules for Japanese and English issuer names.
const BUILTIN_RULES: &[(&str, &[&str])] = &[
    ("金融", &["銀行", "フィナンシャル", "証券", "信託", "Bank", "Financial"]),
    (
        "半導体・製造装置",
        &["半導体", "ウエハ", "露光", "EUV", "チップ", "エレクトロン", "Semiconductor"],
    ),
    ("電機・エレクトロニクス", &["電機", "電子", "エレクトロ", "Electric"]),
    ("自動車・部品", &["自動車", "四輪", "二輪", "タイヤ", "Motor"]),
    ("通信", &["通信", "テレコム", "モバイル", "携帯", "Telecom"]),
    ("総合商社", &["商事", "物産", "丸紅", "伊藤忠", "豊田通商"]),
    ("素材・金属", &["製鉄", "鉄鋼", "非鉄", "金属", "アルミ", "Steel"]),
    ("化学", &["化学", "樹脂", "塗料", "繊維", "Chemical"]),
    ("食品・飲料", &["食品", "飲料", "ビール", "菓子", "Foods"]),
    ("小売・アパレル", &["小売", "百貨", "コンビニ", "リテイリング", "アパレル", "衣料"]),
    ("ゲーム・コンテンツ", &["ゲーム", "エンタ", "任天堂", "バンダイ", "Entertainment"]),
    ("機械・重工", &["重工", "造船", "機械", "産業機器", "ロボット"]),
    ("海運・物流", &["海運", "汽船", "物流", "港湾", "倉庫"]),
    ("建設", &["建設", "清水", "鹿島", "大成", "西松"]),
    ("不動産", &["不動産", "地所", "リート", "レジデンス"]),
    ("公益・電力ガス", &["電力", "ガス", "水道"]),
    ("ヘルスケア", &["医薬", "製薬", "メディカル", "ヘルスケア", "バイオ", "Pharma"]),
    ("SI・ITサービス", &["情報サービス", "システム", "ソフトウェア", "Software"]),
];

/// One tag and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    tag: String,
    matcher: AhoCorasick,
}

/// Ordered, compiled theme rules.
#[derive(Debug, Clone, Default)]
pub struct ThemeRuleSet {
    rules: Vec<CompiledRule>,
}

impl ThemeRuleSet {
    /// Compile rules; blank keywords are dropped so they can't match everything.
    pub fn new(rules: Vec<ThemeRule>) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let keywords: Vec<&str> = rule
                .keywords
                .iter()
                .map(String::as_str)
                .filter(|k| !k.is_empty())
                .collect();
            if rule.tag.trim().is_empty() || keywords.is_empty() {
                continue;
            }
            let matcher = AhoCorasick::new(&keywords)
                .with_context(|| format!("Invalid keywords for theme '{}'", rule.tag))?;
            compiled.push(CompiledRule {
                tag: rule.tag,
                matcher,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn builtin_rules() -> Vec<ThemeRule> {
        BUILTIN_RULES
            .iter()
            .map(|(tag, keywords)| ThemeRule {
                tag: tag.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect()
    }

    /// The rule set shipped with the crate.
    pub fn builtin() -> Self {
        Self::new(Self::builtin_rules()).unwrap_or_else(|e| {
            warn!(error = %e, "Built-in theme rules failed to compile");
            Self::default()
        })
    }

    /// Parse a JSON array of `{ "tag": ..., "keywords": [...] }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<ThemeRule> = serde_json::from_str(json).context("Invalid theme rules")?;
        Self::new(rules)
    }

    /// Load rules from a file, or the built-in set when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read theme rules {}", path.display()))?;
        let set = Self::from_json(&content)
            .with_context(|| format!("Failed to load theme rules {}", path.display()))?;
        info!(path = %path.display(), rules = set.len(), "Loaded theme rules");
        Ok(set)
    }

    /// Tags whose keywords occur in `name`, in declaration order.
    pub fn tags_for(&self, name: &str) -> Vec<String> {
        if name.is_empty() {
            return Vec::new();
        }
        self.rules
            .iter()
            .filter(|r| r.matcher.is_match(name))
            .map(|r| r.tag.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// A leading member of a theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeLeader {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    pub dollar_volume: f64,
    #[serde(default)]
    pub pct_change: Option<f64>,
}

/// Aggregate traded value for one theme tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeStat {
    pub tag: String,
    pub count: usize,
    pub dollar_volume: f64,
    /// Fraction of the universe's total traded value
    pub share: f64,
    #[serde(default)]
    pub leaders: Vec<ThemeLeader>,
}

/// Group rows by theme tag.
///
/// Share is relative to the traded value of all `rows`. Tags with no members
/// are omitted; the result is sorted by share, descending, ties in first-seen
/// order.
pub fn aggregate_themes(rows: &[QuoteRow], leaders_k: usize) -> Vec<ThemeStat> {
    let total: f64 = rows.iter().map(|r| r.dollar_volume).sum();

    let mut groups: Vec<(String, Vec<&QuoteRow>)> = Vec::new();
    for row in rows {
        for tag in &row.themes {
            match groups.iter_mut().find(|(t, _)| t == tag) {
                Some((_, members)) => members.push(row),
                None => groups.push((tag.clone(), vec![row])),
            }
        }
    }

    let mut stats: Vec<ThemeStat> = groups
        .into_iter()
        .map(|(tag, mut members)| {
            let value: f64 = members.iter().map(|r| r.dollar_volume).sum();
            members.sort_by(|a, b| b.dollar_volume.total_cmp(&a.dollar_volume));
            let leaders = members
                .iter()
                .take(leaders_k)
                .map(|r| ThemeLeader {
                    ticker: r.ticker.clone(),
                    name: r.name.clone(),
                    dollar_volume: r.dollar_volume,
                    pct_change: r.pct_change,
                })
                .collect();

            ThemeStat {
                tag,
                count: members.len(),
                dollar_volume: value,
                share: if total > 0.0 { value / total } else { 0.0 },
                leaders,
            }
        })
        .collect();

    stats.sort_by(|a, b| b.share.total_cmp(&a.share));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn themed(ticker: &str, dv: f64, themes: &[&str]) -> QuoteRow {
        let mut row = QuoteRow::new(ticker, None, dv, 1.0, Some(dv));
        row.themes = themes.iter().map(|t| t.to_string()).collect();
        row
    }

    #[test]
    fn test_tags_follow_declaration_order() {
        let set = ThemeRuleSet::new(vec![
            ThemeRule {
                tag: "A".into(),
                keywords: vec!["銀行".into()],
            },
            ThemeRule {
                tag: "B".into(),
                keywords: vec!["証券".into(), "フィナンシャル".into()],
            },
        ])
        .unwrap();

        assert_eq!(set.tags_for("三菱UFJフィナンシャル銀行"), vec!["A", "B"]);
        assert_eq!(set.tags_for("野村證券"), Vec::<String>::new());
        assert!(set.tags_for("").is_empty());
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let set = ThemeRuleSet::from_json(r#"[{"tag": "chips", "keywords": ["Semiconductor"]}]"#)
            .unwrap();
        assert_eq!(set.tags_for("Taiwan Semiconductor"), vec!["chips"]);
        assert!(set.tags_for("taiwan semiconductor").is_empty());
    }

    #[test]
    fn test_blank_keywords_are_dropped() {
        let set = ThemeRuleSet::from_json(r#"[{"tag": "all", "keywords": [""]}]"#).unwrap();
        assert!(set.is_empty());
        assert!(set.tags_for("anything").is_empty());
    }

    #[test]
    fn test_builtin_rules_compile() {
        let set = ThemeRuleSet::builtin();
        assert_eq!(set.len(), BUILTIN_RULES.len());
        assert_eq!(set.tags_for("トヨタ自動車"), vec!["自動車・部品"]);
        assert!(set.tags_for("東京エレクトロン").contains(&"半導体・製造装置".to_string()));
    }

    #[test]
    fn test_load_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.json");
        fs::write(&path, r#"[{"tag": "EV", "keywords": ["Tesla"]}]"#).unwrap();

        let set = ThemeRuleSet::load(Some(&path)).unwrap();
        assert_eq!(set.tags_for("Tesla Inc"), vec!["EV"]);
        assert!(ThemeRuleSet::load(None).unwrap().len() > 1);
    }

    #[test]
    fn test_aggregate_themes() {
        let rows = vec![
            themed("A", 500.0, &["chips"]),
            themed("B", 300.0, &["banks"]),
            themed("C", 100.0, &["chips", "banks"]),
            themed("D", 100.0, &[]),
        ];
        let stats = aggregate_themes(&rows, 1);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].tag, "chips");
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].dollar_volume - 600.0).abs() < 1e-9);
        assert!((stats[0].share - 0.6).abs() < 1e-12);
        assert_eq!(stats[0].leaders.len(), 1);
        assert_eq!(stats[0].leaders[0].ticker, "A");

        assert_eq!(stats[1].tag, "banks");
        assert!((stats[1].share - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_themes_empty() {
        assert!(aggregate_themes(&[], 5).is_empty());
        let rows = vec![themed("A", 0.0, &["x"])];
        let stats = aggregate_themes(&rows, 5);
        assert_eq!(stats[0].share, 0.0);
    }
}
