//! Assignment audit records and allocation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssignmentId, CalendarRef, MemberId, PoolId};

/// Immutable record of one allocation decision.
///
/// Created exactly once per successful allocation and never updated or
/// deleted; the full table is the fairness audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Assignment identifier.
    pub id: AssignmentId,
    /// Pool the decision was made in.
    pub pool_id: PoolId,
    /// Member that received the slot.
    pub member_id: MemberId,
    /// External booking, once confirmed. Allocation can precede
    /// booking confirmation, so this starts out empty.
    pub booking_id: Option<Uuid>,
    /// Human-readable strategy trace (see [`Selection::reason`]).
    pub reason: String,
    /// Fairness-debt score at selection time.
    pub score: f64,
    /// Instant the assignment was committed.
    pub assigned_at: DateTime<Utc>,
}

/// A successful allocation decision, not yet recorded.
///
/// Returned by the allocation search; the caller finalizes the external
/// booking against `calendar` and then records the decision via
/// [`record_assignment`](crate::service::AllocationService::record_assignment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    /// Pool the decision was made in.
    pub pool_id: PoolId,
    /// Winning member.
    pub member_id: MemberId,
    /// Winning member's display name.
    pub display_name: String,
    /// Calendar the external booking should be written to.
    pub calendar: CalendarRef,
    /// Strategy trace naming the strategy, the member, and the
    /// counters that drove the decision. Reconstructible from the same
    /// inputs, e.g. `strict_round_robin: Anna selected (weight=50,
    /// total=3, today=1)`.
    pub reason: String,
    /// `weight / (total_bookings_count + 1)`: higher weight and lower
    /// historical load both raise the score.
    pub score: f64,
}

/// Result of an allocation attempt against a pool.
///
/// The two empty-handed outcomes are deliberately distinct: no eligible
/// members calls for adding capacity (or unpausing someone), while all
/// busy calls for offering a different slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// A free member was found in ranked order.
    Selected(Selection),
    /// Every member was filtered out (inactive, paused, uncalendared,
    /// or at its daily cap).
    NoEligibleMembers,
    /// Eligible members exist but none are free for the requested slot.
    AllBusy,
}

impl SelectionOutcome {
    /// Returns the selection, if one was made.
    #[must_use]
    pub fn selected(self) -> Option<Selection> {
        match self {
            Self::Selected(s) => Some(s),
            Self::NoEligibleMembers | Self::AllBusy => None,
        }
    }
}
