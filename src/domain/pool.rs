//! Allocation pool entity and ranking strategies.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PoolId;

/// How a pool orders its eligible members when allocating a slot.
///
/// Exactly one strategy is active per pool at any time. Changing the
/// strategy affects future allocations only; recorded assignments keep
/// the reason string of the strategy that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Classic round-robin: fewest all-time assignments first, ties
    /// broken by who waited longest since their last assignment.
    StrictRotation,
    /// Weighted fair share: the member furthest under its configured
    /// share of total traffic is tried first.
    Weighted,
    /// Short-term balancing: fewest assignments today first, ignoring
    /// historical totals except as a tie-break.
    AvailabilityFirst,
}

impl Strategy {
    /// Parses the stored strategy string. Unknown or empty strings
    /// yield `None`, which ranks candidates in their input order.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict_round_robin" => Some(Self::StrictRotation),
            "weighted" => Some(Self::Weighted),
            "availability_first" => Some(Self::AvailabilityFirst),
            _ => None,
        }
    }

    /// Returns the stable string form used in storage and in
    /// assignment reason strings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StrictRotation => "strict_round_robin",
            Self::Weighted => "weighted",
            Self::AvailabilityFirst => "availability_first",
        }
    }
}

/// A named allocation group owned by one operator.
///
/// Pools are soft-disabled rather than deleted: assignments reference
/// them forever, so `is_active = false` is the terminal state. Disabling
/// a pool also detaches any agent route pointing at it (see
/// [`crate::persistence::RotaStore::disable_pool`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier.
    pub id: PoolId,
    /// Operator that owns this pool (external identity).
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Active ranking strategy; `None` when unset (ranking then
    /// preserves input order).
    pub strategy: Option<Strategy>,
    /// Whether the pool accepts allocations.
    pub is_active: bool,
}

impl Pool {
    /// Creates an active pool with the given strategy.
    #[must_use]
    pub fn new(owner_id: Uuid, name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            id: PoolId::new(),
            owner_id,
            name: name.into(),
            strategy: Some(strategy),
            is_active: true,
        }
    }

    /// Human-readable strategy label for reason strings and logs.
    #[must_use]
    pub fn strategy_label(&self) -> &'static str {
        self.strategy.map_or("unspecified", |s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_strategies() {
        assert_eq!(
            Strategy::parse("strict_round_robin"),
            Some(Strategy::StrictRotation)
        );
        assert_eq!(Strategy::parse("weighted"), Some(Strategy::Weighted));
        assert_eq!(
            Strategy::parse("availability_first"),
            Some(Strategy::AvailabilityFirst)
        );
    }

    #[test]
    fn parse_unknown_is_none() {
        assert_eq!(Strategy::parse("least_loaded"), None);
        assert_eq!(Strategy::parse(""), None);
    }

    #[test]
    fn as_str_round_trips() {
        for s in [
            Strategy::StrictRotation,
            Strategy::Weighted,
            Strategy::AvailabilityFirst,
        ] {
            assert_eq!(Strategy::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn strategy_label_falls_back() {
        let mut pool = Pool::new(Uuid::new_v4(), "sales", Strategy::Weighted);
        assert_eq!(pool.strategy_label(), "weighted");
        pool.strategy = None;
        assert_eq!(pool.strategy_label(), "unspecified");
    }
}
