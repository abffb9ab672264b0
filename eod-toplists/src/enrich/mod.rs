//! Name and theme enrichment.
//!
//! Every row of every ranked list gets the same treatment: a display name
//! from the [`NameTable`] (empty when unmapped) and, when theme support is
//! enabled, an ordered list of theme tags. A manual theme from the name table
//! comes first, followed by keyword matches.

pub mod names;
pub mod themes;

pub use names::{NameEntry, NameTable};
pub use themes::{aggregate_themes, ThemeLeader, ThemeRule, ThemeRuleSet, ThemeStat};

use crate::ranking::{QuoteRow, RankedLists};

/// Applies names and theme tags to ranked rows.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    names: NameTable,
    /// `None` disables theme tagging
    rules: Option<ThemeRuleSet>,
}

impl Enricher {
    pub fn new(names: NameTable, rules: Option<ThemeRuleSet>) -> Self {
        Self { names, rules }
    }

    pub fn themes_enabled(&self) -> bool {
        self.rules.is_some()
    }

    /// Annotate one row in place.
    pub fn annotate(&self, row: &mut QuoteRow) {
        let entry = self.names.get(&row.ticker);
        if let Some(entry) = entry {
            row.name = entry.name.clone();
        }

        let Some(rules) = &self.rules else {
            return;
        };

        let mut tags: Vec<String> = entry.and_then(|e| e.theme.clone()).into_iter().collect();
        for tag in rules.tags_for(&row.name) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        row.themes = tags;
    }

    /// Annotate every list consistently.
    pub fn enrich(&self, lists: &mut RankedLists) {
        for row in lists.rows_mut() {
            self.annotate(row);
        }
    }
}
