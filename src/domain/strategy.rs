//! Strategy ranker: pure, deterministic ordering of eligible members.
//!
//! `rank` has no side effects and produces the same order for the same
//! inputs, which makes tie-breaks reproducible in tests. All sorts are
//! stable, so candidates that compare equal keep their input order.

use chrono::{DateTime, Utc};

use super::member::Candidate;
use super::pool::Strategy;

/// Orders eligible candidates according to the pool's strategy.
///
/// - `StrictRotation`: ascending all-time count; ties broken by
///   ascending `last_assigned_at`, where a member that was never
///   assigned sorts before any that was.
/// - `Weighted`: descending fairness deficit, where
///   `deficit = weight / Σweight − total / Σtotal` (denominators
///   guarded against zero). A single-shot approximation of weighted
///   fair queuing: it biases long-run share toward the configured
///   weights without needing to converge exactly.
/// - `AvailabilityFirst`: ascending today count, ties broken by
///   ascending all-time count.
/// - `None` (unknown or unset strategy): input order unchanged.
#[must_use]
pub fn rank(strategy: Option<Strategy>, candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ranked = candidates.to_vec();
    match strategy {
        Some(Strategy::StrictRotation) => {
            ranked.sort_by_key(|c| (c.total_bookings_count, last_assigned_key(c)));
        }
        Some(Strategy::Weighted) => {
            let total_weight: u64 = candidates.iter().map(|c| u64::from(c.weight)).sum();
            let total_weight = total_weight.max(1) as f64;
            let total_assigned: u64 = candidates.iter().map(|c| c.total_bookings_count).sum();
            let total_assigned = total_assigned.max(1) as f64;

            ranked.sort_by(|a, b| {
                let a_deficit = deficit(a, total_weight, total_assigned);
                let b_deficit = deficit(b, total_weight, total_assigned);
                b_deficit.total_cmp(&a_deficit)
            });
        }
        Some(Strategy::AvailabilityFirst) => {
            ranked.sort_by_key(|c| (c.today_bookings_count, c.total_bookings_count));
        }
        None => {}
    }
    ranked
}

/// Expected share minus actual share of traffic.
fn deficit(c: &Candidate, total_weight: f64, total_assigned: f64) -> f64 {
    f64::from(c.weight) / total_weight - c.total_bookings_count as f64 / total_assigned
}

/// Never-assigned members win strict-rotation ties.
fn last_assigned_key(c: &Candidate) -> DateTime<Utc> {
    c.last_assigned_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
}
