//! Offline narrative, rendered from statistics and the top lists alone.

use super::report::{display_label, fmt_pct, fmt_signed_pct};
use super::stats::DigestStats;
use crate::bundle::Bundle;
use crate::ranking::QuoteRow;

/// Section headings every narrative (generated or not) must contain, in order.
pub const SECTION_HEADINGS: [&str; 4] = ["市況ダイジェスト", "テーマ/セクター感", "需給・フロー", "リスク"];

const EXAMPLES: usize = 5;
const THEMES_SHOWN: usize = 5;

fn labels(rows: &[QuoteRow], n: usize) -> String {
    let joined = rows
        .iter()
        .take(n)
        .map(display_label)
        .collect::<Vec<_>>()
        .join("、");
    if joined.is_empty() {
        "該当なし".to_string()
    } else {
        joined
    }
}

fn labels_with_change(rows: &[QuoteRow], n: usize) -> String {
    let joined = rows
        .iter()
        .take(n)
        .map(|r| format!("{} {}", display_label(r), fmt_signed_pct(r.pct_change)))
        .collect::<Vec<_>>()
        .join("、");
    if joined.is_empty() {
        "該当なし".to_string()
    } else {
        joined
    }
}

/// Deterministic Markdown covering every heading in [`SECTION_HEADINGS`].
pub fn fallback_narrative(stats: &DigestStats, bundle: &Bundle) -> String {
    let b = &stats.breadth;
    let p = &stats.pct;
    let bands = &stats.bands;
    let conc = &stats.concentration;
    let lists = &bundle.lists;

    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("## {}", SECTION_HEADINGS[0]));
    lines.push(format!(
        "- 銘柄騰落: 上昇 {} / 下落 {} / 変わらず {}（計 {}）",
        b.up, b.down, b.flat, b.total
    ));
    match (p.mean, p.median) {
        (Some(mean), Some(median)) => lines.push(format!(
            "- 平均騰落率 {} / 中央値 {}",
            fmt_signed_pct(Some(mean)),
            fmt_signed_pct(Some(median))
        )),
        _ => lines.push("- 騰落率を算出できる銘柄がありません".to_string()),
    }
    lines.push(format!(
        "- 分布: ±2%未満 {} / +2〜5% {} / −2〜−5% {} / +5%以上 {} / −5%以下 {}",
        bands.within_2, bands.up_2_to_5, bands.down_2_to_5, bands.up_5_plus, bands.down_5_plus
    ));
    if let (Some(p95), Some(p05)) = (p.p95, p.p05) {
        lines.push(format!(
            "- パーセンタイル: p95 {} / p05 {}",
            fmt_signed_pct(Some(p95)),
            fmt_signed_pct(Some(p05))
        ));
    }
    lines.push(String::new());

    lines.push(format!("## {}", SECTION_HEADINGS[1]));
    if bundle.themes.is_empty() {
        lines.push(format!("- 売買代金上位の主役: {}", labels(&lists.top_by_value, 10)));
    } else {
        for theme in bundle.themes.iter().take(THEMES_SHOWN) {
            let leaders = theme
                .leaders
                .iter()
                .map(|l| {
                    if l.name.is_empty() {
                        l.ticker.clone()
                    } else {
                        format!("{}（{}）", l.name, l.ticker)
                    }
                })
                .collect::<Vec<_>>()
                .join("、");
            lines.push(format!(
                "- {}: 代金シェア {}（{}銘柄、{}）",
                theme.tag,
                fmt_pct(Some(theme.share)),
                theme.count,
                leaders
            ));
        }
    }
    lines.push(String::new());

    lines.push(format!("## {}", SECTION_HEADINGS[2]));
    lines.push(format!(
        "- 売買代金集中度: 上位10 {} / 上位50 {}",
        fmt_pct(conc.value_top10),
        fmt_pct(conc.value_top50)
    ));
    lines.push(format!("- 出来高集中度: 上位10 {}", fmt_pct(conc.volume_top10)));
    lines.push(format!(
        "- 売買代金上位: {}",
        labels_with_change(&lists.top_by_value, EXAMPLES)
    ));
    lines.push(format!(
        "- 出来高上位: {}",
        labels_with_change(&lists.top_by_volume, EXAMPLES)
    ));
    lines.push(String::new());

    lines.push(format!("## {}", SECTION_HEADINGS[3]));
    lines.push(format!(
        "- ±5%以上の変動: 上昇 {} / 下落 {}。急変銘柄は反動に注意。",
        bands.up_5_plus, bands.down_5_plus
    ));
    if let (Some(p95), Some(p05)) = (p.p95, p.p05) {
        lines.push(format!(
            "- 騰落率のばらつき（p95−p05）: {:.2}pt",
            (p95 - p05) * 100.0
        ));
    }
    match conc.value_top10 {
        Some(share) if share >= 0.5 => lines.push(format!(
            "- 売買代金が上位10銘柄に集中（{}）。主力株の値動きが全体を左右しやすい。",
            fmt_pct(Some(share))
        )),
        Some(share) => lines.push(format!(
            "- 売買代金の上位10銘柄シェアは {}。",
            fmt_pct(Some(share))
        )),
        None => lines.push("- 売買代金データがありません。".to_string()),
    }
    lines.push(format!(
        "- 値上がり上位: {} / 値下がり上位: {}",
        labels_with_change(&lists.top_gainers, 3),
        labels_with_change(&lists.top_losers, 3)
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleParams;
    use crate::data::MarketSpec;
    use crate::enrich::{ThemeLeader, ThemeStat};
    use crate::ranking::{rank, RankPolicy, RankedLists};
    use eod_common::Market;

    fn bundle_of(rows: &[QuoteRow]) -> Bundle {
        let policy = RankPolicy::for_market(Market::Us);
        Bundle::assemble(
            rank(rows, &policy),
            "2024-06-04",
            &MarketSpec::new(Market::Us),
            BundleParams::new(&policy, 100),
            Vec::new(),
        )
    }

    #[test]
    fn test_all_headings_present() {
        let rows = vec![
            QuoteRow::new("AAPL", None, 200.0, 1000.0, Some(190.0)),
            QuoteRow::new("MSFT", None, 400.0, 500.0, Some(420.0)),
        ];
        let bundle = bundle_of(&rows);
        let stats = DigestStats::compute(&bundle);
        let md = fallback_narrative(&stats, &bundle);

        for heading in SECTION_HEADINGS {
            assert!(md.contains(&format!("## {}", heading)), "missing {}", heading);
        }
        assert!(md.contains("上昇 1 / 下落 1 / 変わらず 0（計 2）"));
        assert!(md.contains("AAPL"));
    }

    #[test]
    fn test_empty_bundle_still_renders() {
        let bundle = Bundle::assemble(
            RankedLists::default(),
            "2024-06-04",
            &MarketSpec::new(Market::Jp),
            BundleParams::default(),
            Vec::new(),
        );
        let stats = DigestStats::compute(&bundle);
        let md = fallback_narrative(&stats, &bundle);

        for heading in SECTION_HEADINGS {
            assert!(md.contains(heading));
        }
        assert!(md.contains("騰落率を算出できる銘柄がありません"));
        assert!(md.contains("該当なし"));
    }

    #[test]
    fn test_theme_section_uses_aggregates() {
        let rows = vec![QuoteRow::new("8035", None, 30000.0, 10.0, Some(29000.0))];
        let mut bundle = bundle_of(&rows);
        bundle.themes = vec![ThemeStat {
            tag: "半導体".into(),
            count: 1,
            dollar_volume: 300_000.0,
            share: 1.0,
            leaders: vec![ThemeLeader {
                ticker: "8035".into(),
                name: "東京エレクトロン".into(),
                dollar_volume: 300_000.0,
                pct_change: Some(0.03),
            }],
        }];

        let md = fallback_narrative(&DigestStats::compute(&bundle), &bundle);
        assert!(md.contains("- 半導体: 代金シェア 100.00%（1銘柄、東京エレクトロン（8035））"));
    }

    #[test]
    fn test_deterministic() {
        let rows = vec![QuoteRow::new("AAPL", None, 200.0, 1000.0, Some(190.0))];
        let bundle = bundle_of(&rows);
        let stats = DigestStats::compute(&bundle);
        assert_eq!(
            fallback_narrative(&stats, &bundle),
            fallback_narrative(&stats, &bundle)
        );
    }
}
