//! Markdown digest rendering.
//!
//! Layout: title line, narrative (generated or fallback), then one table per
//! top-N list. Traded value is shown in 億円 for JPY bundles and in millions
//! for USD bundles.

use crate::bundle::Bundle;
use crate::ranking::{ListKind, QuoteRow};

// ============================================================================
// Number formatting
// ============================================================================

/// Insert thousands separators into a plain decimal string.
fn group_thousands(s: &str) -> String {
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

pub(crate) fn fmt_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    group_thousands(&format!("{:.*}", decimals, value))
}

/// Fraction → `"1.23%"`; `"-"` when undefined.
pub(crate) fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}%", v * 100.0),
        _ => "-".to_string(),
    }
}

/// Signed variant for narrative text: `"+1.23%"`.
pub(crate) fn fmt_signed_pct(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2}%", v * 100.0),
        _ => "-".to_string(),
    }
}

/// Traded value in display units.
pub(crate) fn fmt_value(value: f64, jpy: bool) -> String {
    if jpy {
        format!("{}億円", fmt_number(value / 1e8, 1))
    } else {
        format!("{}M", fmt_number(value / 1e6, 1))
    }
}

/// Price floor as shown in table titles (`¥1,000`, `$10`).
pub(crate) fn fmt_floor(value: f64, jpy: bool) -> String {
    let decimals = if value.fract() == 0.0 { 0 } else { 2 };
    let symbol = if jpy { "¥" } else { "$" };
    format!("{}{}", symbol, fmt_number(value, decimals))
}

/// `name（code）` when a name is known, otherwise the bare ticker.
pub(crate) fn display_label(row: &QuoteRow) -> String {
    if row.name.is_empty() || row.name == row.ticker {
        row.ticker.clone()
    } else {
        format!("{}（{}）", row.name, row.ticker)
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Fixed-format Markdown table for one list.
pub fn md_table(title: &str, rows: &[QuoteRow], jpy: bool, limit: usize) -> String {
    let value_header = if jpy { "代金" } else { "$Vol" };
    let price_decimals = if jpy { 0 } else { 2 };

    let mut out = String::new();
    out.push_str(&format!("### {}\n\n", title));
    out.push_str(&format!("| Ticker | Close | Vol | {} | %Chg |\n", value_header));
    out.push_str("|---|---:|---:|---:|---:|\n");
    for row in rows.iter().take(limit) {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            display_label(row),
            fmt_number(row.close, price_decimals),
            fmt_number(row.volume, 0),
            fmt_value(row.dollar_volume, jpy),
            fmt_pct(row.pct_change),
        ));
    }
    out.push('\n');
    out
}

/// Title and table headings for a bundle.
pub fn title(bundle: &Bundle) -> String {
    let region = if bundle.is_jpy() { "日本株" } else { "米国株" };
    format!(
        "取引代金上位{}{} デイリー要約 | {}",
        bundle.universe_cap(),
        region,
        bundle.date
    )
}

fn table_title(kind: ListKind, bundle: &Bundle) -> String {
    let n = bundle.top_n();
    let floor = fmt_floor(bundle.params.price_floor, bundle.is_jpy());
    match kind {
        ListKind::TopValue => format!("売買代金 Top{}", n),
        ListKind::TopVolume => format!("出来高 Top{}", n),
        ListKind::Gainers => format!("値上がり Top{}（終値≥{}）", n, floor),
        ListKind::Losers => format!("値下がり Top{}（終値≥{}）", n, floor),
        ListKind::Universe => format!("売買代金上位{}", bundle.universe_cap()),
    }
}

// ============================================================================
// Report
// ============================================================================

/// A rendered digest document.
pub struct DigestReport<'a> {
    bundle: &'a Bundle,
    narrative: &'a str,
}

impl<'a> DigestReport<'a> {
    pub fn new(bundle: &'a Bundle, narrative: &'a str) -> Self {
        Self { bundle, narrative }
    }

    pub fn to_markdown(&self) -> String {
        let jpy = self.bundle.is_jpy();
        let limit = self.bundle.top_n();

        let mut md = String::new();
        md.push_str(&format!("# {}\n\n", title(self.bundle)));
        md.push_str(self.narrative.trim());
        md.push_str("\n\n");

        for kind in [
            ListKind::TopValue,
            ListKind::TopVolume,
            ListKind::Gainers,
            ListKind::Losers,
        ] {
            md.push_str(&md_table(
                &table_title(kind, self.bundle),
                self.bundle.lists.get(kind),
                jpy,
                limit,
            ));
        }

        md
    }
}
