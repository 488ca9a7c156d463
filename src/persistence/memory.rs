//! In-memory store for tests and examples.
//!
//! Honors the same contract as the Postgres store: counter updates and
//! assignment inserts happen under one lock acquisition, so the
//! transactional counter invariant holds, and candidates come back in
//! the same order the SQL query would produce them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::RotaStore;
use super::models::NewAssignment;
use crate::domain::{Assignment, AssignmentId, Candidate, Member, MemberId, Pool, PoolId};
use crate::error::RotaError;

#[derive(Debug, Default)]
struct Inner {
    pools: HashMap<PoolId, Pool>,
    /// Insertion order preserved for deterministic candidate loading.
    members: Vec<Member>,
    assignments: Vec<Assignment>,
    routes: HashMap<Uuid, Option<PoolId>>,
}

/// Thread-safe in-process implementation of [`RotaStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a member row, for assertions on counters.
    #[must_use]
    pub fn member(&self, member_id: MemberId) -> Option<Member> {
        self.lock().members.iter().find(|m| m.id == member_id).cloned()
    }

    /// Total number of assignment rows across all pools.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.lock().assignments.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panicking test; propagate the data.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RotaStore for MemoryStore {
    async fn create_pool(&self, pool: &Pool) -> Result<(), RotaError> {
        self.lock().pools.insert(pool.id, pool.clone());
        Ok(())
    }

    async fn find_active_pool(&self, pool_id: PoolId) -> Result<Option<Pool>, RotaError> {
        Ok(self
            .lock()
            .pools
            .get(&pool_id)
            .filter(|p| p.is_active)
            .cloned())
    }

    async fn find_pool_by_owner(&self, owner_id: Uuid) -> Result<Option<Pool>, RotaError> {
        Ok(self
            .lock()
            .pools
            .values()
            .find(|p| p.owner_id == owner_id && p.is_active)
            .cloned())
    }

    async fn find_pool_for_agent(&self, agent_id: Uuid) -> Result<Option<Pool>, RotaError> {
        let inner = self.lock();
        let Some(Some(pool_id)) = inner.routes.get(&agent_id) else {
            return Ok(None);
        };
        Ok(inner.pools.get(pool_id).filter(|p| p.is_active).cloned())
    }

    async fn route_agent(&self, agent_id: Uuid, pool_id: Option<PoolId>) -> Result<(), RotaError> {
        self.lock().routes.insert(agent_id, pool_id);
        Ok(())
    }

    async fn disable_pool(&self, pool_id: PoolId) -> Result<(), RotaError> {
        let mut inner = self.lock();
        let Some(pool) = inner.pools.get_mut(&pool_id) else {
            return Err(RotaError::PoolNotFound(pool_id));
        };
        pool.is_active = false;
        for route in inner.routes.values_mut() {
            if *route == Some(pool_id) {
                *route = None;
            }
        }
        Ok(())
    }

    async fn add_member(&self, member: &Member) -> Result<(), RotaError> {
        if member.weight == 0 {
            return Err(RotaError::InvalidRequest(
                "member weight must be positive".to_string(),
            ));
        }
        self.lock().members.push(member.clone());
        Ok(())
    }

    async fn remove_member(&self, member_id: MemberId) -> Result<(), RotaError> {
        let mut inner = self.lock();
        let before = inner.members.len();
        inner.members.retain(|m| m.id != member_id);
        if inner.members.len() == before {
            return Err(RotaError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn set_member_paused(&self, member_id: MemberId, paused: bool) -> Result<(), RotaError> {
        let mut inner = self.lock();
        let Some(member) = inner.members.iter_mut().find(|m| m.id == member_id) else {
            return Err(RotaError::MemberNotFound(member_id));
        };
        member.is_paused = paused;
        Ok(())
    }

    async fn reset_member_counters(&self, member_id: MemberId) -> Result<(), RotaError> {
        let mut inner = self.lock();
        let Some(member) = inner.members.iter_mut().find(|m| m.id == member_id) else {
            return Err(RotaError::MemberNotFound(member_id));
        };
        member.total_bookings_count = 0;
        member.last_assigned_at = None;
        Ok(())
    }

    async fn load_candidates(
        &self,
        pool_id: PoolId,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, RotaError> {
        let inner = self.lock();
        let mut candidates: Vec<Candidate> = inner
            .members
            .iter()
            .filter(|m| m.pool_id == pool_id)
            .map(|m| {
                let today = inner
                    .assignments
                    .iter()
                    .filter(|a| a.member_id == m.id && a.assigned_at >= day_start)
                    .count() as u64;
                Candidate::from_member(m, today)
            })
            .collect();
        // Same ordering as the SQL query: ascending all-time count,
        // never-assigned members first within ties.
        candidates.sort_by_key(|c| {
            (
                c.total_bookings_count,
                c.last_assigned_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            )
        });
        Ok(candidates)
    }

    async fn record_assignment(&self, new: &NewAssignment) -> Result<AssignmentId, RotaError> {
        let mut inner = self.lock();
        let now = Utc::now();
        let Some(member) = inner.members.iter_mut().find(|m| m.id == new.member_id) else {
            return Err(RotaError::MemberNotFound(new.member_id));
        };
        member.total_bookings_count += 1;
        member.last_assigned_at = Some(now);

        let assignment = Assignment {
            id: AssignmentId::new(),
            pool_id: new.pool_id,
            member_id: new.member_id,
            booking_id: new.booking_id,
            reason: new.reason.clone(),
            score: new.score,
            assigned_at: now,
        };
        let id = assignment.id;
        inner.assignments.push(assignment);
        Ok(id)
    }

    async fn assignments_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Assignment>, RotaError> {
        Ok(self
            .lock()
            .assignments
            .iter()
            .filter(|a| a.member_id == member_id)
            .cloned()
            .collect())
    }
}
