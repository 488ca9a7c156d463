//! Eligibility filter: which pool members may receive an assignment
//! right now.
//!
//! The rules are applied in a fixed order and each exclusion is logged
//! individually so operators can see exactly why a member was skipped.
//! An empty result is a valid outcome ("no eligible members"), not an
//! error.

use std::fmt;

use super::member::Candidate;

/// Why a candidate was excluded from allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Member is deactivated.
    Inactive,
    /// Member is temporarily paused (counters preserved).
    Paused,
    /// No calendar connected, so the member cannot be verified free.
    NoCalendar,
    /// Daily cap reached.
    DailyCapReached {
        /// Assignments recorded today.
        today: u64,
        /// Configured cap.
        cap: u32,
    },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Paused => write!(f, "paused"),
            Self::NoCalendar => write!(f, "no calendar"),
            Self::DailyCapReached { today, cap } => {
                write!(f, "daily cap {today}/{cap}")
            }
        }
    }
}

/// Returns the first matching exclusion rule for a candidate, or
/// `None` if it is eligible. Rules are checked in order: active state,
/// calendar presence, daily cap. A cap of `0` means uncapped.
#[must_use]
pub fn exclusion_reason(candidate: &Candidate) -> Option<ExclusionReason> {
    if !candidate.is_active {
        return Some(ExclusionReason::Inactive);
    }
    if candidate.is_paused {
        return Some(ExclusionReason::Paused);
    }
    if !candidate.has_calendar() {
        return Some(ExclusionReason::NoCalendar);
    }
    if candidate.max_daily_bookings > 0
        && candidate.today_bookings_count >= u64::from(candidate.max_daily_bookings)
    {
        return Some(ExclusionReason::DailyCapReached {
            today: candidate.today_bookings_count,
            cap: candidate.max_daily_bookings,
        });
    }
    None
}

/// Filters a candidate list down to the eligible members, logging each
/// exclusion. Preserves input order.
#[must_use]
pub fn eligible_candidates(candidates: &[Candidate]) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| match exclusion_reason(c) {
            Some(reason) => {
                tracing::debug!(
                    member_id = %c.member_id,
                    member = %c.display_name,
                    %reason,
                    "member skipped"
                );
                false
            }
            None => true,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CalendarRef, Member, PoolId};

    fn candidate(name: &str) -> Candidate {
        let member = Member::new(
            PoolId::new(),
            name,
            CalendarRef::Standalone {
                credentials_ref: format!("cred-{name}"),
            },
        );
        Candidate::from_member(&member, 0)
    }

    #[test]
    fn fresh_member_is_eligible() {
        assert_eq!(exclusion_reason(&candidate("a")), None);
    }

    #[test]
    fn inactive_wins_over_other_rules() {
        let mut c = candidate("a");
        c.is_active = false;
        c.is_paused = true;
        c.calendar = CalendarRef::Unconnected;
        assert_eq!(exclusion_reason(&c), Some(ExclusionReason::Inactive));
    }

    #[test]
    fn paused_member_is_excluded() {
        let mut c = candidate("a");
        c.is_paused = true;
        assert_eq!(exclusion_reason(&c), Some(ExclusionReason::Paused));
    }

    #[test]
    fn uncalendared_member_is_excluded() {
        let mut c = candidate("a");
        c.calendar = CalendarRef::Unconnected;
        assert_eq!(exclusion_reason(&c), Some(ExclusionReason::NoCalendar));
    }

    #[test]
    fn member_at_daily_cap_is_excluded() {
        let mut c = candidate("a");
        c.max_daily_bookings = 2;
        c.today_bookings_count = 2;
        assert_eq!(
            exclusion_reason(&c),
            Some(ExclusionReason::DailyCapReached { today: 2, cap: 2 })
        );
    }

    #[test]
    fn member_under_cap_is_eligible() {
        let mut c = candidate("a");
        c.max_daily_bookings = 2;
        c.today_bookings_count = 1;
        assert_eq!(exclusion_reason(&c), None);
    }

    #[test]
    fn zero_cap_means_uncapped() {
        let mut c = candidate("a");
        c.max_daily_bookings = 0;
        c.today_bookings_count = 500;
        assert_eq!(exclusion_reason(&c), None);
    }

    #[test]
    fn filter_preserves_order_and_empty_is_valid() {
        let a = candidate("a");
        let mut b = candidate("b");
        b.is_paused = true;
        let c = candidate("c");

        let eligible = eligible_candidates(&[a.clone(), b.clone(), c.clone()]);
        let names: Vec<&str> = eligible.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);

        let none = eligible_candidates(&[b]);
        assert!(none.is_empty());
    }
}
