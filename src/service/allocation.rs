//! Allocation engine: eligibility, ranking, sequential availability
//! search, and assignment recording.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::time::timeout;
use uuid::Uuid;

use crate::calendar::AvailabilityPort;
use crate::config::RotaConfig;
use crate::domain::eligibility::eligible_candidates;
use crate::domain::strategy::rank;
use crate::domain::{
    AssignmentId, Candidate, Pool, PoolId, Selection, SelectionOutcome, SlotInterval,
};
use crate::error::RotaError;
use crate::persistence::RotaStore;
use crate::persistence::models::NewAssignment;

/// Start of the current day as a UTC instant; assignments at or after
/// this instant count toward today's caps.
#[must_use]
pub fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Orchestrates one allocation: load candidates, filter, rank, walk the
/// ranked list against the availability port, and record the decision.
///
/// The availability check and the eventual external booking write are
/// not one atomic unit (the calendar is a third-party system), so two
/// concurrent requests for overlapping slots can both select the same
/// member. Recording is transactionally safe either way; callers that
/// need stronger guarantees must serialize per pool or per member
/// around the check-then-record sequence.
#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn RotaStore>,
    calendar: Arc<dyn AvailabilityPort>,
    availability_timeout: Duration,
    default_duration_minutes: u32,
    default_timezone: String,
}

impl fmt::Debug for AllocationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationService")
            .field("availability_timeout", &self.availability_timeout)
            .finish_non_exhaustive()
    }
}

impl AllocationService {
    /// Creates a new allocation service.
    #[must_use]
    pub fn new(
        store: Arc<dyn RotaStore>,
        calendar: Arc<dyn AvailabilityPort>,
        config: &RotaConfig,
    ) -> Self {
        Self {
            store,
            calendar,
            availability_timeout: config.availability_timeout(),
            default_duration_minutes: config.default_duration_minutes,
            default_timezone: config.default_timezone.clone(),
        }
    }

    /// Selects the member that should receive the requested slot.
    ///
    /// Candidates are evaluated strictly in ranked order, one
    /// availability query at a time: ranking order is the fairness
    /// contract, so the first *ranked* free member wins, never the
    /// first query to come back. A provider failure or timeout for one
    /// member demotes that member to "not free" and the walk continues.
    ///
    /// `duration_minutes` and `timezone` fall back to the configured
    /// defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::PoolNotFound`] when the pool is missing or
    /// disabled, or [`RotaError::Persistence`] on store failure. An
    /// empty pool or a fully-busy pool is an [`Ok`] outcome, not an
    /// error.
    pub async fn select_member(
        &self,
        pool_id: PoolId,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: Option<u32>,
        timezone: Option<&str>,
    ) -> Result<SelectionOutcome, RotaError> {
        let duration_minutes = duration_minutes.unwrap_or(self.default_duration_minutes);
        let timezone = timezone.unwrap_or(&self.default_timezone);
        let pool = self
            .store
            .find_active_pool(pool_id)
            .await?
            .ok_or(RotaError::PoolNotFound(pool_id))?;

        tracing::info!(
            %pool_id,
            pool = %pool.name,
            strategy = pool.strategy_label(),
            %date,
            %time,
            duration_minutes,
            "selecting member for slot"
        );

        let day_start = utc_day_start(Utc::now());
        let candidates = self.store.load_candidates(pool_id, day_start).await?;
        let eligible = eligible_candidates(&candidates);
        if eligible.is_empty() {
            tracing::info!(%pool_id, members = candidates.len(), "no eligible members");
            return Ok(SelectionOutcome::NoEligibleMembers);
        }

        let ranked = rank(pool.strategy, &eligible);
        for (position, c) in ranked.iter().enumerate() {
            tracing::debug!(
                rank = position + 1,
                member = %c.display_name,
                weight = c.weight,
                total = c.total_bookings_count,
                today = c.today_bookings_count,
                "ranked candidate"
            );
        }

        let slot = SlotInterval::for_slot(date, time, duration_minutes);
        for candidate in &ranked {
            if self.candidate_is_free(candidate, slot, timezone).await {
                let selection = build_selection(&pool, candidate);
                tracing::info!(
                    %pool_id,
                    member = %selection.display_name,
                    score = selection.score,
                    reason = %selection.reason,
                    "member selected"
                );
                return Ok(SelectionOutcome::Selected(selection));
            }
        }

        tracing::info!(%pool_id, %date, %time, "all eligible members busy");
        Ok(SelectionOutcome::AllBusy)
    }

    /// One bounded availability query; failures demote to "not free".
    async fn candidate_is_free(
        &self,
        candidate: &Candidate,
        slot: SlotInterval,
        timezone: &str,
    ) -> bool {
        tracing::debug!(member = %candidate.display_name, "checking calendar availability");
        let query = self.calendar.is_free(&candidate.calendar, slot, timezone);
        match timeout(self.availability_timeout, query).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                tracing::debug!(member = %candidate.display_name, "busy, trying next");
                false
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    member = %candidate.display_name,
                    %error,
                    "availability check failed; skipping member"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    member = %candidate.display_name,
                    "availability check timed out; skipping member"
                );
                false
            }
        }
    }

    /// Persists a selection: inserts the audit row and applies the
    /// member counter update as one durable unit. Not idempotent —
    /// call exactly once per logical booking.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::MemberNotFound`] if the member was removed
    /// between selection and recording, or [`RotaError::Persistence`]
    /// on store failure.
    pub async fn record_assignment(
        &self,
        selection: &Selection,
        booking_id: Option<Uuid>,
    ) -> Result<AssignmentId, RotaError> {
        tracing::info!(
            pool_id = %selection.pool_id,
            member_id = %selection.member_id,
            booking_id = ?booking_id,
            "recording assignment"
        );
        let new = NewAssignment::from_selection(selection, booking_id);
        let id = self.store.record_assignment(&new).await?;
        tracing::debug!(assignment_id = %id, "assignment recorded");
        Ok(id)
    }

    /// Resolves the active pool owned by an operator, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on store failure.
    pub async fn pool_for_owner(&self, owner_id: Uuid) -> Result<Option<Pool>, RotaError> {
        self.store.find_pool_by_owner(owner_id).await
    }

    /// Resolves the active pool an agent is routed through, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on store failure.
    pub async fn pool_for_agent(&self, agent_id: Uuid) -> Result<Option<Pool>, RotaError> {
        self.store.find_pool_for_agent(agent_id).await
    }
}

/// Assembles the selection for a free candidate: fairness-debt score
/// and the reconstructible reason string.
fn build_selection(pool: &Pool, candidate: &Candidate) -> Selection {
    let score = f64::from(candidate.weight) / (candidate.total_bookings_count + 1) as f64;
    let reason = format!(
        "{}: {} selected (weight={}, total={}, today={})",
        pool.strategy_label(),
        candidate.display_name,
        candidate.weight,
        candidate.total_bookings_count,
        candidate.today_bookings_count,
    );
    Selection {
        pool_id: pool.id,
        member_id: candidate.member_id,
        display_name: candidate.display_name.clone(),
        calendar: candidate.calendar.clone(),
        reason,
        score,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::calendar::{BusyInterval, CalendarError};
    use crate::domain::{CalendarRef, Member, Strategy};
    use crate::persistence::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted availability port: per-calendar free/busy/error
    /// verdicts, recording the order calendars were queried in.
    #[derive(Default)]
    struct ScriptedPort {
        busy: HashMap<CalendarRef, bool>,
        failing: Vec<CalendarRef>,
        queried: Mutex<Vec<CalendarRef>>,
        windows: Mutex<Vec<(SlotInterval, String)>>,
    }

    impl ScriptedPort {
        fn queried(&self) -> Vec<CalendarRef> {
            match self.queried.lock() {
                Ok(g) => g.clone(),
                Err(p) => p.into_inner().clone(),
            }
        }

        fn windows(&self) -> Vec<(SlotInterval, String)> {
            match self.windows.lock() {
                Ok(g) => g.clone(),
                Err(p) => p.into_inner().clone(),
            }
        }
    }

    #[async_trait]
    impl AvailabilityPort for ScriptedPort {
        async fn free_busy(
            &self,
            calendar: &CalendarRef,
            window: SlotInterval,
            timezone: &str,
        ) -> Result<Vec<BusyInterval>, CalendarError> {
            if let Ok(mut queried) = self.queried.lock() {
                queried.push(calendar.clone());
            }
            if let Ok(mut windows) = self.windows.lock() {
                windows.push((window, timezone.to_string()));
            }
            if self.failing.contains(calendar) {
                return Err(CalendarError::Provider("upstream 503".to_string()));
            }
            if self.busy.get(calendar).copied().unwrap_or(false) {
                Ok(vec![BusyInterval {
                    start: window.start,
                    end: window.end,
                }])
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn cred(name: &str) -> CalendarRef {
        CalendarRef::Standalone {
            credentials_ref: format!("cred-{name}"),
        }
    }

    async fn seed_pool(
        store: &MemoryStore,
        strategy: Strategy,
        members: &[(&str, u32, u64)],
    ) -> (Pool, Vec<Member>) {
        let pool = Pool::new(Uuid::new_v4(), "test-pool", strategy);
        let Ok(()) = store.create_pool(&pool).await else {
            panic!("create pool failed");
        };
        let mut out = Vec::new();
        for (name, weight, total) in members {
            let mut member = Member::new(pool.id, *name, cred(name));
            member.weight = *weight;
            member.total_bookings_count = *total;
            let Ok(()) = store.add_member(&member).await else {
                panic!("add member failed");
            };
            out.push(member);
        }
        (pool, out)
    }

    fn service(store: Arc<MemoryStore>, port: Arc<ScriptedPort>) -> AllocationService {
        AllocationService::new(store, port, &RotaConfig::default())
    }

    fn slot_args() -> (NaiveDate, NaiveTime) {
        let Some(date) = NaiveDate::from_ymd_opt(2026, 3, 2) else {
            panic!("valid date");
        };
        let Some(time) = NaiveTime::from_hms_opt(10, 0, 0) else {
            panic!("valid time");
        };
        (date, time)
    }

    #[tokio::test]
    async fn lowest_total_wins_under_strict_rotation() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(
            &store,
            Strategy::StrictRotation,
            &[("m1", 50, 3), ("m2", 50, 1)],
        )
        .await;
        let port = Arc::new(ScriptedPort::default());
        let svc = service(Arc::clone(&store), Arc::clone(&port));

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await else {
            panic!("select failed");
        };
        let Some(selection) = outcome.selected() else {
            panic!("expected a selection");
        };
        assert_eq!(selection.display_name, "m2");
        // Only the winner was queried.
        assert_eq!(port.queried(), vec![cred("m2")]);
    }

    #[tokio::test]
    async fn busy_first_choice_falls_through_in_ranked_order() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(
            &store,
            Strategy::StrictRotation,
            &[("m1", 50, 0), ("m2", 50, 5)],
        )
        .await;
        let mut port = ScriptedPort::default();
        port.busy.insert(cred("m1"), true);
        let port = Arc::new(port);
        let svc = service(Arc::clone(&store), Arc::clone(&port));

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await else {
            panic!("select failed");
        };
        let Some(selection) = outcome.selected() else {
            panic!("expected a selection");
        };
        // The reason names the member that actually won, not the one
        // that ranked first.
        assert_eq!(selection.display_name, "m2");
        assert!(selection.reason.contains("m2"));
        assert!(!selection.reason.contains("m1 selected"));
        assert_eq!(port.queried(), vec![cred("m1"), cred("m2")]);
    }

    #[tokio::test]
    async fn provider_failure_skips_candidate() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(
            &store,
            Strategy::StrictRotation,
            &[("m1", 50, 0), ("m2", 50, 5)],
        )
        .await;
        let mut port = ScriptedPort::default();
        port.failing.push(cred("m1"));
        let port = Arc::new(port);
        let svc = service(Arc::clone(&store), Arc::clone(&port));

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await else {
            panic!("select failed");
        };
        let Some(selection) = outcome.selected() else {
            panic!("expected a selection");
        };
        assert_eq!(selection.display_name, "m2");
    }

    #[tokio::test]
    async fn all_busy_is_an_outcome_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(
            &store,
            Strategy::StrictRotation,
            &[("m1", 50, 0), ("m2", 50, 0)],
        )
        .await;
        let mut port = ScriptedPort::default();
        port.busy.insert(cred("m1"), true);
        port.busy.insert(cred("m2"), true);
        let port = Arc::new(port);
        let svc = service(Arc::clone(&store), port);

        let (date, time) = slot_args();
        let outcome = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await;
        assert!(matches!(outcome, Ok(SelectionOutcome::AllBusy)));
    }

    #[tokio::test]
    async fn empty_pool_reports_no_eligible_members() {
        let store = Arc::new(MemoryStore::new());
        let (pool, members) =
            seed_pool(&store, Strategy::StrictRotation, &[("m1", 50, 0)]).await;
        let Some(first) = members.first() else {
            panic!("seeded member missing");
        };
        let Ok(()) = store.set_member_paused(first.id, true).await else {
            panic!("pause failed");
        };
        let port = Arc::new(ScriptedPort::default());
        let svc = service(Arc::clone(&store), Arc::clone(&port));

        let (date, time) = slot_args();
        let outcome = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await;
        assert!(matches!(outcome, Ok(SelectionOutcome::NoEligibleMembers)));
        assert!(port.queried().is_empty());
    }

    #[tokio::test]
    async fn missing_pool_is_a_hard_error() {
        let store = Arc::new(MemoryStore::new());
        let port = Arc::new(ScriptedPort::default());
        let svc = service(store, port);

        let (date, time) = slot_args();
        let outcome = svc
            .select_member(PoolId::new(), date, time, Some(60), Some("Europe/Rome"))
            .await;
        assert!(matches!(outcome, Err(RotaError::PoolNotFound(_))));
    }

    #[tokio::test]
    async fn timed_out_candidate_is_skipped() {
        struct SlowPort;

        #[async_trait]
        impl AvailabilityPort for SlowPort {
            async fn free_busy(
                &self,
                _calendar: &CalendarRef,
                _window: SlotInterval,
                _timezone: &str,
            ) -> Result<Vec<BusyInterval>, CalendarError> {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Vec::new())
            }
        }

        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(&store, Strategy::StrictRotation, &[("m1", 50, 0)]).await;

        let config = RotaConfig {
            availability_timeout_secs: 0,
            ..RotaConfig::default()
        };
        let svc = AllocationService::new(Arc::clone(&store) as Arc<dyn RotaStore>, Arc::new(SlowPort), &config);

        let (date, time) = slot_args();
        let outcome = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await;
        assert!(matches!(outcome, Ok(SelectionOutcome::AllBusy)));
    }

    #[tokio::test]
    async fn reason_is_reconstructible_from_inputs() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(&store, Strategy::Weighted, &[("anna", 70, 4)]).await;
        let port = Arc::new(ScriptedPort::default());
        let svc = service(Arc::clone(&store), port);

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await else {
            panic!("select failed");
        };
        let Some(selection) = outcome.selected() else {
            panic!("expected a selection");
        };
        assert_eq!(
            selection.reason,
            "weighted: anna selected (weight=70, total=4, today=0)"
        );
        assert!((selection.score - 70.0 / 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn omitted_duration_and_timezone_use_configured_defaults() {
        let store = Arc::new(MemoryStore::new());
        let (pool, _) = seed_pool(&store, Strategy::StrictRotation, &[("m1", 50, 0)]).await;
        let port = Arc::new(ScriptedPort::default());

        let config = RotaConfig {
            default_duration_minutes: 30,
            default_timezone: "America/New_York".to_string(),
            ..RotaConfig::default()
        };
        let svc = AllocationService::new(
            Arc::clone(&store) as Arc<dyn RotaStore>,
            Arc::clone(&port) as Arc<dyn AvailabilityPort>,
            &config,
        );

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, None, None).await else {
            panic!("select failed");
        };
        assert!(outcome.selected().is_some());

        let windows = port.windows();
        let Some((window, timezone)) = windows.first() else {
            panic!("port was not queried");
        };
        assert_eq!(*window, SlotInterval::for_slot(date, time, 30));
        assert_eq!(timezone, "America/New_York");
    }

    #[tokio::test]
    async fn record_assignment_updates_counters_once() {
        let store = Arc::new(MemoryStore::new());
        let (pool, members) =
            seed_pool(&store, Strategy::StrictRotation, &[("anna", 50, 0)]).await;
        let port = Arc::new(ScriptedPort::default());
        let svc = service(Arc::clone(&store), port);

        let (date, time) = slot_args();
        let Ok(outcome) = svc.select_member(pool.id, date, time, Some(60), Some("Europe/Rome")).await else {
            panic!("select failed");
        };
        let Some(selection) = outcome.selected() else {
            panic!("expected a selection");
        };
        let booking = Uuid::new_v4();
        let Ok(_) = svc.record_assignment(&selection, Some(booking)).await else {
            panic!("record failed");
        };

        let Some(member) = members.first() else {
            panic!("seeded member missing");
        };
        let Some(stored) = store.member(member.id) else {
            panic!("member missing");
        };
        assert_eq!(stored.total_bookings_count, 1);
        let Ok(rows) = store.assignments_for_member(member.id).await else {
            panic!("load failed");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().and_then(|a| a.booking_id), Some(booking));
    }

    #[test]
    fn utc_day_start_truncates_to_midnight() {
        use chrono::TimeZone;
        let Some(now) = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 12).single() else {
            panic!("valid instant");
        };
        let Some(midnight) = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).single() else {
            panic!("valid instant");
        };
        assert_eq!(utc_day_start(now), midnight);
    }
}
