//! Ticker → display name lookup.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Name and optional manual theme for one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    /// Manual theme tag; `None` when blank or `-`
    pub theme: Option<String>,
}

/// Lookup table loaded from a headered CSV.
///
/// Recognized columns (case-insensitive): `ticker` or `code` (required),
/// `name`, `name_ja` or `jp_name`, and an optional `theme`.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: HashMap<String, NameEntry>,
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|want| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(want))
    })
}

impl NameTable {
    /// Load from `path`; a missing file yields an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Names file not found, names will be empty");
            return Ok(Self::default());
        }

        let file =
            fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to read names from {}", path.display()))?;
        info!(path = %path.display(), names = table.len(), "Loaded name table");
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let Some(code_col) = find_column(&headers, &["ticker", "code"]) else {
            bail!("names CSV needs a 'ticker' or 'code' column");
        };
        let name_col = find_column(&headers, &["name", "name_ja", "jp_name"]);
        let theme_col = find_column(&headers, &["theme"]);

        let mut entries = HashMap::new();
        for record in rdr.records() {
            let record = record?;
            let code = record.get(code_col).unwrap_or("").trim();
            if code.is_empty() {
                continue;
            }
            let field = |col: Option<usize>| {
                col.and_then(|c| record.get(c))
                    .map(str::trim)
                    .unwrap_or("")
                    .to_string()
            };
            let theme = field(theme_col);
            let theme = (!theme.is_empty() && theme != "-").then_some(theme);

            entries.entry(code.to_string()).or_insert(NameEntry {
                name: field(name_col),
                theme,
            });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, ticker: &str) -> Option<&NameEntry> {
        self.entries.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
