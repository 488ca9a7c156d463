//! Pool statistics and the multi-day slot availability scan.
//!
//! Both reuse the allocation layer's primitives: the candidate
//! snapshots from the store and the availability port's range query.
//! Statistics are pure aggregation (no calendar calls); the scanner
//! fetches one free/busy report per member for the whole range and
//! enumerates slots locally.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::calendar::AvailabilityPort;
use crate::config::RotaConfig;
use crate::domain::slots::business_slots;
use crate::domain::{Candidate, MemberId, PoolId, SlotInterval};
use crate::error::RotaError;
use crate::persistence::RotaStore;
use crate::service::allocation::utc_day_start;

/// One member's slice of the fairness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberShare {
    /// Member identifier.
    pub member_id: MemberId,
    /// Display name.
    pub display_name: String,
    /// Configured traffic weight.
    pub weight: u32,
    /// All-time assignment count.
    pub total_bookings: u64,
    /// Assignments recorded today.
    pub today_bookings: u64,
    /// Daily cap (`0` = uncapped).
    pub max_daily: u32,
    /// Rounded percentage of the pool's all-time assignments; `0` for
    /// every member when the pool has no assignments at all.
    pub share_percent: u32,
    /// Whether a calendar is connected.
    pub has_calendar: bool,
    /// Active flag.
    pub is_active: bool,
    /// Paused flag.
    pub is_paused: bool,
}

/// Pool-wide fairness report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    /// All members, regardless of state.
    pub total_members: usize,
    /// Members that are active and not paused.
    pub active_members: usize,
    /// Members with a connected calendar.
    pub with_calendar: usize,
    /// Sum of all-time assignment counts.
    pub total_bookings: u64,
    /// Sum of today's assignment counts.
    pub today_bookings: u64,
    /// Per-member distribution, ordered by descending weight.
    pub distribution: Vec<MemberShare>,
}

/// Availability density of one candidate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    /// Slot date.
    pub date: NaiveDate,
    /// Slot start time.
    pub time: NaiveTime,
    /// Number of members free for the whole slot.
    pub available_members: u32,
}

/// Read-side service over the same store and calendar port as the
/// allocation engine.
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn RotaStore>,
    calendar: Arc<dyn AvailabilityPort>,
    availability_timeout: Duration,
    default_duration_minutes: u32,
    default_timezone: String,
}

impl fmt::Debug for ReportingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingService")
            .field("availability_timeout", &self.availability_timeout)
            .finish_non_exhaustive()
    }
}

impl ReportingService {
    /// Creates a new reporting service.
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

    /// Full member listing with today's counts, ordered by descending
    /// weight. Includes paused and inactive members so operators see
    /// the whole roster.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on store failure.
    pub async fn member_overview(&self, pool_id: PoolId) -> Result<Vec<Candidate>, RotaError> {
        let day_start = utc_day_start(Utc::now());
        let mut members = self.store.load_candidates(pool_id, day_start).await?;
        members.sort_by(|a, b| b.weight.cmp(&a.weight));
        Ok(members)
    }

    /// Aggregates the pool's counters into a fairness report. Works on
    /// disabled pools too, since the audit trail outlives them.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on store failure.
    pub async fn pool_stats(&self, pool_id: PoolId) -> Result<PoolStats, RotaError> {
        let members = self.member_overview(pool_id).await?;

        let total_bookings: u64 = members.iter().map(|m| m.total_bookings_count).sum();
        let today_bookings: u64 = members.iter().map(|m| m.today_bookings_count).sum();

        let distribution = members
            .iter()
            .map(|m| MemberShare {
                member_id: m.member_id,
                display_name: m.display_name.clone(),
                weight: m.weight,
                total_bookings: m.total_bookings_count,
                today_bookings: m.today_bookings_count,
                max_daily: m.max_daily_bookings,
                share_percent: share_percent(m.total_bookings_count, total_bookings),
                has_calendar: m.has_calendar(),
                is_active: m.is_active,
                is_paused: m.is_paused,
            })
            .collect();

        Ok(PoolStats {
            total_members: members.len(),
            active_members: members
                .iter()
                .filter(|m| m.is_active && !m.is_paused)
                .count(),
            with_calendar: members.iter().filter(|m| m.has_calendar()).count(),
            total_bookings,
            today_bookings,
            distribution,
        })
    }

    /// Scans `[start_date, end_date]` for bookable slots: weekdays,
    /// hourly within business hours, counting how many members are
    /// free per slot. One free/busy fetch per member covers the whole
    /// range. A member whose calendar cannot be queried is excluded
    /// from the counts rather than failing the scan.
    ///
    /// Output is sorted ascending by date, then time; slots where no
    /// member is free are omitted. `duration_minutes` and `timezone`
    /// fall back to the configured defaults when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RotaError::Persistence`] on store failure.
    pub async fn available_slots(
        &self,
        pool_id: PoolId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_minutes: Option<u32>,
        timezone: Option<&str>,
    ) -> Result<Vec<SlotAvailability>, RotaError> {
        let duration_minutes = duration_minutes.unwrap_or(self.default_duration_minutes);
        let timezone = timezone.unwrap_or(&self.default_timezone);
        let day_start = utc_day_start(Utc::now());
        let members: Vec<Candidate> = self
            .store
            .load_candidates(pool_id, day_start)
            .await?
            .into_iter()
            .filter(|m| m.is_active && !m.is_paused && m.has_calendar())
            .collect();

        if members.is_empty() {
            return Ok(Vec::new());
        }

        let window = SlotInterval {
            start: start_date.and_time(NaiveTime::MIN),
            end: end_date
                .succ_opt()
                .unwrap_or(end_date)
                .and_time(NaiveTime::MIN),
        };
        let grid = business_slots(start_date, end_date);
        let mut counts: BTreeMap<(NaiveDate, NaiveTime), u32> = BTreeMap::new();

        for member in &members {
            let query = self.calendar.free_busy(&member.calendar, window, timezone);
            let busy = match timeout(self.availability_timeout, query).await {
                Ok(Ok(busy)) => busy,
                Ok(Err(error)) => {
                    tracing::warn!(
                        member = %member.display_name,
                        %error,
                        "could not fetch free/busy; excluding member from scan"
                    );
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        member = %member.display_name,
                        "free/busy fetch timed out; excluding member from scan"
                    );
                    continue;
                }
            };

            for &(date, time) in &grid {
                let slot = SlotInterval::for_slot(date, time, duration_minutes);
                if busy.iter().any(|b| b.blocks(&slot)) {
                    continue;
                }
                *counts.entry((date, time)).or_insert(0) += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|((date, time), available_members)| SlotAvailability {
                date,
                time,
                available_members,
            })
            .collect())
    }
}

/// `round(100 * member_total / pool_total)`, with an empty pool defined
/// as zero for every member.
fn share_percent(member_total: u64, pool_total: u64) -> u32 {
    if pool_total == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (100.0 * member_total as f64 / pool_total as f64).round() as u32;
    pct
}
