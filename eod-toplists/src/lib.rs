//! EOD Top-Lists Library
//!
//! Daily end-of-day reporting for JPX or US equities: fetch the two most recent
//! sessions per ticker, derive traded value and percentage change, rank into
//! top-N lists, persist a bundle, and compose a Markdown market digest.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │   Quote    │──▶│    Row     │──▶│  Universe  │──▶│   Bundle   │──▶│   Digest   │
//! │  Provider  │   │ Normalizer │   │   Ranker   │   │  Assembler │   │  Composer  │
//! └────────────┘   └────────────┘   └─────┬──────┘   └────────────┘   └─────┬──────┘
//!   (batched,                             │                                  │
//!    sequential)                   ┌──────┴──────┐                   ┌───────┴───────┐
//!                                  │ Name/Theme  │                   │ Narrative LLM │
//!                                  │  Enricher   │                   │  or fallback  │
//!                                  └─────────────┘                   └───────────────┘
//! ```
//!
//! Data flows one way: raw quotes → normalized rows → ranked lists → bundle →
//! digest. Per-ticker defects are dropped silently, per-batch failures are
//! absorbed with a cooldown, and only whole-run emptiness or missing
//! narrative credentials surface as [`RunError`].

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bundle;
pub mod data;
pub mod date_policy;
pub mod digest;
pub mod enrich;
pub mod error;
pub mod pipeline;
pub mod ranking;

pub use bundle::{Bundle, BundleWriter, TableSchema};
pub use date_policy::DateLabelPolicy;
pub use digest::{Digest, DigestComposer, DigestStats, NarrativeSource, RetryPolicy};
pub use enrich::{Enricher, NameTable, ThemeRuleSet, ThemeStat};
pub use error::RunError;
pub use pipeline::{FetchEngine, FetchReport, FetchSettings, RunReport};
pub use ranking::{QuoteRow, RankPolicy, RankedLists};
