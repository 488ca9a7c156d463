//! Persistence layer: pool, member, and assignment storage.
//!
//! [`RotaStore`] is the async trait the services run against. The
//! production implementation is [`PostgresStore`] (sqlx); tests use the
//! in-process [`MemoryStore`], which honors the same transactional
//! contract for [`RotaStore::record_assignment`].

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Assignment, AssignmentId, Candidate, Member, MemberId, Pool, PoolId};
use crate::error::RotaError;
use models::NewAssignment;

/// Storage contract for pools, members, and the assignment audit trail.
///
/// # Counter invariant
///
/// `total_bookings_count` and `last_assigned_at` are mutated only by
/// [`record_assignment`](Self::record_assignment) (and explicitly
/// zeroed by [`reset_member_counters`](Self::reset_member_counters)).
/// The insert of the assignment row and the counter update form one
/// durable unit, and the increment is performed store-side rather than
/// read-modify-write in application code, so concurrent assignments to
/// the same member cannot lose updates.
#[async_trait]
pub trait RotaStore: Send + Sync {
    /// Creates a pool.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn create_pool(&self, pool: &Pool) -> Result<(), RotaError>;

    /// Looks up a pool by ID, returning `None` when it is missing or
    /// soft-disabled.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn find_active_pool(&self, pool_id: PoolId) -> Result<Option<Pool>, RotaError>;

    /// Resolves the active pool owned by an operator, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn find_pool_by_owner(&self, owner_id: Uuid) -> Result<Option<Pool>, RotaError>;

    /// Resolves the active pool an agent is routed through, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn find_pool_for_agent(&self, agent_id: Uuid) -> Result<Option<Pool>, RotaError>;

    /// Routes an agent through a pool (or clears the route with `None`).
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn route_agent(&self, agent_id: Uuid, pool_id: Option<PoolId>) -> Result<(), RotaError>;

    /// Soft-disables a pool and detaches every agent routed through it.
    /// The pool row is never deleted: assignments reference it forever.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::PoolNotFound`] if the pool does not exist,
    /// or [`RotaError::Persistence`] on storage failure.
    async fn disable_pool(&self, pool_id: PoolId) -> Result<(), RotaError>;

    /// Adds a member to its pool.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::InvalidRequest`] for a non-positive weight,
    /// or [`RotaError::Persistence`] on storage failure.
    async fn add_member(&self, member: &Member) -> Result<(), RotaError>;

    /// Removes a member. Past assignments keep referencing the member
    /// ID for the audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::MemberNotFound`] if the member does not
    /// exist, or [`RotaError::Persistence`] on storage failure.
    async fn remove_member(&self, member_id: MemberId) -> Result<(), RotaError>;

    /// Pauses or resumes a member. Pausing preserves counters.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::MemberNotFound`] if the member does not
    /// exist, or [`RotaError::Persistence`] on storage failure.
    async fn set_member_paused(&self, member_id: MemberId, paused: bool) -> Result<(), RotaError>;

    /// Zeroes `total_bookings_count` and clears `last_assigned_at`,
    /// restarting the member's fairness history (e.g. after a long
    /// pause). Past assignment rows are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::MemberNotFound`] if the member does not
    /// exist, or [`RotaError::Persistence`] on storage failure.
    async fn reset_member_counters(&self, member_id: MemberId) -> Result<(), RotaError>;

    /// Loads every member of a pool as a [`Candidate`] snapshot, with
    /// `today_bookings_count` computed as the number of assignments at
    /// or after `day_start`. Ordered by ascending all-time count, then
    /// ascending `last_assigned_at` with never-assigned members first,
    /// so downstream tie-breaks are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn load_candidates(
        &self,
        pool_id: PoolId,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, RotaError>;

    /// Inserts the assignment row and applies the member counter update
    /// as one durable unit (see the trait-level counter invariant).
    /// Not idempotent: callers must invoke it once per logical booking.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::MemberNotFound`] if the member no longer
    /// exists, or [`RotaError::Persistence`] on storage failure.
    async fn record_assignment(&self, new: &NewAssignment) -> Result<AssignmentId, RotaError>;

    /// Returns all assignment rows for a member, oldest first. Used by
    /// audit views and by the counter-consistency checks.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on storage failure.
    async fn assignments_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Assignment>, RotaError>;
}
