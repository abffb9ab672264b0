//! Bundle writer: one CSV per ranked list plus `bundle.json`.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Bundle, BUNDLE_FILE};
use crate::ranking::{ListKind, QuoteRow};

/// Column layout of the ranked-list CSVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub include_name: bool,
}

impl TableSchema {
    pub fn new(include_name: bool) -> Self {
        Self { include_name }
    }

    /// Fixed header order: `ticker,[name],open,close,volume,dollar_volume,pct_change`.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = vec!["ticker"];
        if self.include_name {
            cols.push("name");
        }
        cols.extend(["open", "close", "volume", "dollar_volume", "pct_change"]);
        cols
    }

    fn record(&self, row: &QuoteRow) -> Vec<String> {
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

        let mut record = vec![row.ticker.clone()];
        if self.include_name {
            record.push(row.name.clone());
        }
        record.push(opt(row.open));
        record.push(row.close.to_string());
        record.push(row.volume.to_string());
        record.push(row.dollar_volume.to_string());
        record.push(opt(row.pct_change));
        record
    }
}

/// Write rows as CSV. Missing optional values become empty fields.
pub fn write_table<W: io::Write>(writer: W, rows: &[QuoteRow], schema: &TableSchema) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(schema.columns())?;
    for row in rows {
        csv.write_record(schema.record(row))?;
    }
    csv.flush()?;
    Ok(())
}

/// Persists a bundle under `<root>/<date>/`.
#[derive(Debug, Clone)]
pub struct BundleWriter {
    root: PathBuf,
    schema: TableSchema,
}

impl BundleWriter {
    pub fn new(root: impl Into<PathBuf>, schema: TableSchema) -> Self {
        Self {
            root: root.into(),
            schema,
        }
    }

    /// Directory a bundle with this date label is written to.
    pub fn run_dir(&self, date_label: &str) -> PathBuf {
        self.root.join(date_label)
    }

    /// Write every list and the JSON bundle; returns the run directory.
    pub fn write(&self, bundle: &Bundle) -> Result<PathBuf> {
        let dir = self.run_dir(&bundle.date);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let top_n = bundle.top_n();
        let cap = bundle.universe_cap();
        for kind in ListKind::ALL {
            let path = dir.join(kind.file_name(top_n, cap));
            self.write_csv(&path, bundle.lists.get(kind))?;
        }

        let json_path = dir.join(BUNDLE_FILE);
        fs::write(&json_path, bundle.to_json()?)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        info!(
            dir = %dir.display(),
            universe = bundle.counts.universe_by_dollar,
            "Bundle written"
        );
        Ok(dir)
    }

    fn write_csv(&self, path: &Path, rows: &[QuoteRow]) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_table(io::BufWriter::new(file), rows, &self.schema)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), rows = rows.len(), "Wrote table");
        Ok(())
    }
}
