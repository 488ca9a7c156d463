//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::RotaStore;
use super::models::NewAssignment;
use crate::config::RotaConfig;
use crate::domain::{
    Assignment, AssignmentId, CalendarRef, Candidate, Member, MemberId, Pool, PoolId, Strategy,
};
use crate::error::RotaError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the configured URL and pool sizing, then runs
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] if the connection or a
    /// migration fails.
    pub async fn connect(config: &RotaConfig) -> Result<Self, RotaError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;

        Ok(Self { pool })
    }
}

/// Splits a [`CalendarRef`] into its two nullable columns.
fn calendar_columns(calendar: &CalendarRef) -> (Option<Uuid>, Option<&str>) {
    match calendar {
        CalendarRef::Linked { agent_id } => (Some(*agent_id), None),
        CalendarRef::Standalone { credentials_ref } => (None, Some(credentials_ref.as_str())),
        CalendarRef::Unconnected => (None, None),
    }
}

/// Rebuilds a [`CalendarRef`] from its two nullable columns. The
/// linked form wins if both are somehow set.
fn calendar_from_columns(agent_id: Option<Uuid>, credentials_ref: Option<String>) -> CalendarRef {
    match (agent_id, credentials_ref) {
        (Some(agent_id), _) => CalendarRef::Linked { agent_id },
        (None, Some(credentials_ref)) => CalendarRef::Standalone { credentials_ref },
        (None, None) => CalendarRef::Unconnected,
    }
}

type PoolRow = (Uuid, Uuid, String, String, bool);

/// The strategy column only ever holds [`Pool::strategy_label`] values,
/// so anything else in it is a corrupted row, not user input.
fn pool_from_row((id, owner_id, name, strategy, is_active): PoolRow) -> Result<Pool, RotaError> {
    let strategy = match Strategy::parse(&strategy) {
        Some(s) => Some(s),
        None if strategy == "unspecified" => None,
        None => {
            return Err(RotaError::Internal(format!(
                "pool {id} has unrecognized strategy {strategy:?}"
            )));
        }
    };
    Ok(Pool {
        id: PoolId::from_uuid(id),
        owner_id,
        name,
        strategy,
        is_active,
    })
}

#[async_trait]
impl RotaStore for PostgresStore {
    async fn create_pool(&self, pool: &Pool) -> Result<(), RotaError> {
        sqlx::query(
            "INSERT INTO pools (id, owner_id, name, strategy, is_active) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(pool.id.as_uuid())
        .bind(pool.owner_id)
        .bind(&pool.name)
        .bind(pool.strategy_label())
        .bind(pool.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn find_active_pool(&self, pool_id: PoolId) -> Result<Option<Pool>, RotaError> {
        let row = sqlx::query_as::<_, PoolRow>(
            "SELECT id, owner_id, name, strategy, is_active FROM pools \
             WHERE id = $1 AND is_active",
        )
        .bind(pool_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        row.map(pool_from_row).transpose()
    }

    async fn find_pool_by_owner(&self, owner_id: Uuid) -> Result<Option<Pool>, RotaError> {
        let row = sqlx::query_as::<_, PoolRow>(
            "SELECT id, owner_id, name, strategy, is_active FROM pools \
             WHERE owner_id = $1 AND is_active LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        row.map(pool_from_row).transpose()
    }

    async fn find_pool_for_agent(&self, agent_id: Uuid) -> Result<Option<Pool>, RotaError> {
        let row = sqlx::query_as::<_, PoolRow>(
            "SELECT p.id, p.owner_id, p.name, p.strategy, p.is_active \
             FROM agent_routes r JOIN pools p ON p.id = r.pool_id \
             WHERE r.agent_id = $1 AND p.is_active",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        row.map(pool_from_row).transpose()
    }

    async fn route_agent(&self, agent_id: Uuid, pool_id: Option<PoolId>) -> Result<(), RotaError> {
        sqlx::query(
            "INSERT INTO agent_routes (agent_id, pool_id) VALUES ($1, $2) \
             ON CONFLICT (agent_id) DO UPDATE SET pool_id = EXCLUDED.pool_id",
        )
        .bind(agent_id)
        .bind(pool_id.map(|p| *p.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn disable_pool(&self, pool_id: PoolId) -> Result<(), RotaError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;

        let updated = sqlx::query("UPDATE pools SET is_active = false WHERE id = $1")
            .bind(pool_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;
        if updated.rows_affected() == 0 {
            return Err(RotaError::PoolNotFound(pool_id));
        }

        sqlx::query("UPDATE agent_routes SET pool_id = NULL WHERE pool_id = $1")
            .bind(pool_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn add_member(&self, member: &Member) -> Result<(), RotaError> {
        if member.weight == 0 {
            return Err(RotaError::InvalidRequest(
                "member weight must be positive".to_string(),
            ));
        }
        let (agent_id, credentials_ref) = calendar_columns(&member.calendar);
        sqlx::query(
            "INSERT INTO members (id, pool_id, display_name, agent_id, credentials_ref, \
             weight, max_daily_bookings, is_active, is_paused, total_bookings_count, \
             last_assigned_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(member.id.as_uuid())
        .bind(member.pool_id.as_uuid())
        .bind(&member.display_name)
        .bind(agent_id)
        .bind(credentials_ref)
        .bind(i64::from(member.weight))
        .bind(i64::from(member.max_daily_bookings))
        .bind(member.is_active)
        .bind(member.is_paused)
        .bind(i64::try_from(member.total_bookings_count).unwrap_or(i64::MAX))
        .bind(member.last_assigned_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn remove_member(&self, member_id: MemberId) -> Result<(), RotaError> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(member_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(RotaError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn set_member_paused(&self, member_id: MemberId, paused: bool) -> Result<(), RotaError> {
        let result = sqlx::query("UPDATE members SET is_paused = $2 WHERE id = $1")
            .bind(member_id.as_uuid())
            .bind(paused)
            .execute(&self.pool)
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(RotaError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn reset_member_counters(&self, member_id: MemberId) -> Result<(), RotaError> {
        let result = sqlx::query(
            "UPDATE members SET total_bookings_count = 0, last_assigned_at = NULL \
             WHERE id = $1",
        )
        .bind(member_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(RotaError::MemberNotFound(member_id));
        }
        Ok(())
    }

    async fn load_candidates(
        &self,
        pool_id: PoolId,
        day_start: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, RotaError> {
        type CandidateRow = (
            Uuid,
            String,
            Option<Uuid>,
            Option<String>,
            i64,
            i64,
            bool,
            bool,
            i64,
            Option<DateTime<Utc>>,
            i64,
        );
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT m.id, m.display_name, m.agent_id, m.credentials_ref, m.weight, \
             m.max_daily_bookings, m.is_active, m.is_paused, m.total_bookings_count, \
             m.last_assigned_at, \
             (SELECT COUNT(*) FROM assignments a \
              WHERE a.member_id = m.id AND a.assigned_at >= $2) AS today_bookings_count \
             FROM members m WHERE m.pool_id = $1 \
             ORDER BY m.total_bookings_count ASC, m.last_assigned_at ASC NULLS FIRST",
        )
        .bind(pool_id.as_uuid())
        .bind(day_start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    id,
                    display_name,
                    agent_id,
                    credentials_ref,
                    weight,
                    max_daily,
                    is_active,
                    is_paused,
                    total,
                    last_assigned_at,
                    today,
                )| {
                    Candidate {
                        member_id: MemberId::from_uuid(id),
                        display_name,
                        calendar: calendar_from_columns(agent_id, credentials_ref),
                        weight: u32::try_from(weight).unwrap_or(0),
                        max_daily_bookings: u32::try_from(max_daily).unwrap_or(0),
                        is_active,
                        is_paused,
                        total_bookings_count: u64::try_from(total).unwrap_or(0),
                        last_assigned_at,
                        today_bookings_count: u64::try_from(today).unwrap_or(0),
                    }
                },
            )
            .collect())
    }

    async fn record_assignment(&self, new: &NewAssignment) -> Result<AssignmentId, RotaError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;

        // Store-side increment; never read-modify-write in application
        // code, so concurrent assignments cannot lose updates.
        let updated = sqlx::query(
            "UPDATE members SET total_bookings_count = total_bookings_count + 1, \
             last_assigned_at = now() WHERE id = $1",
        )
        .bind(new.member_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;
        if updated.rows_affected() == 0 {
            return Err(RotaError::MemberNotFound(new.member_id));
        }

        let assignment_id = AssignmentId::new();
        sqlx::query(
            "INSERT INTO assignments (id, pool_id, member_id, booking_id, reason, score) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(assignment_id.as_uuid())
        .bind(new.pool_id.as_uuid())
        .bind(new.member_id.as_uuid())
        .bind(new.booking_id)
        .bind(&new.reason)
        .bind(new.score)
        .execute(&mut *tx)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RotaError::Persistence(e.to_string()))?;
        Ok(assignment_id)
    }

    async fn assignments_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<Assignment>, RotaError> {
        type AssignmentRow = (Uuid, Uuid, Uuid, Option<Uuid>, String, f64, DateTime<Utc>);
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT id, pool_id, member_id, booking_id, reason, score, assigned_at \
             FROM assignments WHERE member_id = $1 ORDER BY assigned_at ASC",
        )
        .bind(member_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RotaError::Persistence(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, pool_id, member_id, booking_id, reason, score, assigned_at)| Assignment {
                    id: AssignmentId::from_uuid(id),
                    pool_id: PoolId::from_uuid(pool_id),
                    member_id: MemberId::from_uuid(member_id),
                    booking_id,
                    reason,
                    score,
                    assigned_at,
                },
            )
            .collect())
    }
}
