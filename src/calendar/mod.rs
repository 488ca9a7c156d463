//! Calendar availability port.
//!
//! The external calendar provider is the source of truth for whether a
//! member is free. This module defines the narrow capability the
//! allocation engine needs; the adapter implementing it owns OAuth,
//! calendar-identity resolution (a [`CalendarRef::Linked`] member
//! resolves through its agent profile, a [`CalendarRef::Standalone`]
//! member through its own credentials), and timezone interpretation of
//! the wall-clock instants it is handed.
//!
//! Provider failures are surfaced distinctly from "busy" so callers can
//! log them without conflating the two; during a search or a scan they
//! degrade to "skip this member".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CalendarRef, SlotInterval};

/// A busy interval reported by the provider, in the same local
/// wall-clock timezone as the query that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    /// Inclusive start of the busy period.
    pub start: chrono::NaiveDateTime,
    /// Exclusive end of the busy period.
    pub end: chrono::NaiveDateTime,
}

impl BusyInterval {
    /// Whether this busy period overlaps the given slot.
    #[must_use]
    pub fn blocks(&self, slot: &SlotInterval) -> bool {
        slot.overlaps(&SlotInterval {
            start: self.start,
            end: self.end,
        })
    }
}

/// Why an availability query could not be answered.
///
/// These are expected operational conditions, not programming errors:
/// the search treats any of them as "not free" for that one member and
/// moves on.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// The member's calendar reference could not be resolved to a
    /// connected calendar.
    #[error("no calendar connected")]
    NoCalendar,

    /// Credentials were rejected or expired upstream.
    #[error("calendar auth failed: {0}")]
    Auth(String),

    /// The provider returned an error or was unreachable.
    #[error("calendar provider error: {0}")]
    Provider(String),

    /// The query exceeded its deadline.
    #[error("calendar query timed out")]
    Timeout,
}

/// Abstract capability "is member M free for this interval?".
///
/// All times are wall-clock values in `timezone` (an IANA name such as
/// `Europe/Rome`); the adapter passes the name through to the provider
/// rather than converting locally.
#[async_trait]
pub trait AvailabilityPort: Send + Sync {
    /// Returns the busy periods for `calendar` within `window`,
    /// expressed in `timezone` local time.
    ///
    /// # Errors
    ///
    /// Returns a [`CalendarError`] when the calendar cannot be resolved
    /// or the provider cannot be queried.
    async fn free_busy(
        &self,
        calendar: &CalendarRef,
        window: SlotInterval,
        timezone: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    /// Whether `calendar` is free for the whole of `slot`.
    ///
    /// The default implementation asks for the busy periods within the
    /// slot and reports free when none were returned, which matches how
    /// freebusy-style provider APIs behave.
    ///
    /// # Errors
    ///
    /// Returns a [`CalendarError`] when the calendar cannot be resolved
    /// or the provider cannot be queried.
    async fn is_free(
        &self,
        calendar: &CalendarRef,
        slot: SlotInterval,
        timezone: &str,
    ) -> Result<bool, CalendarError> {
        let busy = self.free_busy(calendar, slot, timezone).await?;
        Ok(busy.iter().all(|b| !b.blocks(&slot)))
    }
}
