//! Quote provider abstraction.
//!
//! The fetch engine only sees this trait, so the quote source can be swapped
//! (or mocked in tests) without touching batching or normalization.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::SymbolHistory;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors that fail a whole batch.
///
/// A symbol that simply has no data is not an error: providers leave it out
/// of the returned histories instead.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Provider is temporarily unavailable (5xx)
    Unavailable(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Pause the provider asked for, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

// ============================================================================
// Quote Provider Trait
// ============================================================================

/// A source of daily history for a batch of symbols.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider name used in logs and the bundle source note
    fn name(&self) -> &str;

    /// Fetch daily bars for every symbol in the batch.
    ///
    /// # Arguments
    /// * `symbols` - Provider symbols (e.g. "7203.T", "AAPL")
    /// * `lookback_days` - Calendar days of history to request
    ///
    /// Symbols with no data are omitted from the result. Any error fails the
    /// whole batch.
    async fn fetch_daily(
        &self,
        symbols: &[String],
        lookback_days: u32,
    ) -> Result<Vec<SymbolHistory>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");

        let err = ProviderError::Unavailable("503".into());
        assert_eq!(err.to_string(), "Provider unavailable: 503");
    }

    #[test]
    fn test_retry_after_only_from_rate_limit() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

        let err = ProviderError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.retry_after(), None);
        assert_eq!(ProviderError::Network("timeout".into()).retry_after(), None);
    }
}
