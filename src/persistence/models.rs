//! Store-boundary models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{MemberId, PoolId, Selection};

/// An assignment about to be committed.
///
/// Built from a [`Selection`] once the caller decides to go through
/// with it; `booking_id` may still be unknown at that point (allocation
/// can precede booking confirmation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    /// Pool the decision was made in.
    pub pool_id: PoolId,
    /// Member that received the slot.
    pub member_id: MemberId,
    /// External booking, if already confirmed.
    pub booking_id: Option<Uuid>,
    /// Strategy trace copied from the selection.
    pub reason: String,
    /// Fairness-debt score copied from the selection.
    pub score: f64,
}

impl NewAssignment {
    /// Builds the row for a selection and optional booking reference.
    #[must_use]
    pub fn from_selection(selection: &Selection, booking_id: Option<Uuid>) -> Self {
        Self {
            pool_id: selection.pool_id,
            member_id: selection.member_id,
            booking_id,
            reason: selection.reason.clone(),
            score: selection.score,
        }
    }
}
