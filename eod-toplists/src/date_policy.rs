//! Run date labelling.
//!
//! The label comes from one of two strategies. `LastSession` always uses the
//! latest observed session. `CloseCutoff` switches to the exchange-local
//! calendar day once the close has passed, so a run just after the close is
//! filed under today even when the provider has not published today's bar
//! yet. The cutoff is read on the exchange's own wall clock, daylight saving
//! included.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use eod_common::{DatePolicyKind, Market};

/// Strategy for choosing a run's date label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabelPolicy {
    LastSession,
    CloseCutoff { tz: Tz, hour: u32, minute: u32 },
}

impl DateLabelPolicy {
    /// Tokyo close: 16:00 Asia/Tokyo.
    pub const JP_CLOSE: Self = Self::CloseCutoff {
        tz: chrono_tz::Asia::Tokyo,
        hour: 16,
        minute: 0,
    };

    /// New York close: 16:00 America/New_York (EST or EDT).
    pub const US_CLOSE: Self = Self::CloseCutoff {
        tz: chrono_tz::America::New_York,
        hour: 16,
        minute: 0,
    };

    pub fn for_market(kind: DatePolicyKind, market: Market) -> Self {
        match (kind, market) {
            (DatePolicyKind::LastSession, _) => Self::LastSession,
            (DatePolicyKind::CloseCutoff, Market::Jp) => Self::JP_CLOSE,
            (DatePolicyKind::CloseCutoff, Market::Us) => Self::US_CLOSE,
        }
    }

    /// Resolve the label as `YYYY-MM-DD`.
    pub fn resolve(&self, latest_session: NaiveDate, now: DateTime<Utc>) -> String {
        self.resolve_date(latest_session, now).format("%Y-%m-%d").to_string()
    }

    pub fn resolve_date(&self, latest_session: NaiveDate, now: DateTime<Utc>) -> NaiveDate {
        match *self {
            Self::LastSession => latest_session,
            Self::CloseCutoff { tz, hour, minute } => {
                let local = now.with_timezone(&tz);
                let today = local.date_naive();
                let after_close = (local.hour(), local.minute()) >= (hour, minute);

                if after_close && today >= latest_session {
                    today
                } else {
                    latest_session
                }
            }
        }
    }
}
