//! EOD Common - Shared configuration, errors and logging for the top-lists pipeline.
//!
//! This crate provides:
//! - Configuration types, layered loading and environment overrides
//! - The shared error type
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;

pub use config::{
    Config, DatePolicyKind, FetchConfig, Market, MarketConfig, NarrativeConfig,
    ObservabilityConfig, OutputConfig, RankingConfig,
};
pub use error::{Error, Result};
pub use logging::init_logging;

