//! Pool members and the calendar reference they allocate against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MemberId, PoolId};

/// Default relative traffic share for a new member.
pub const DEFAULT_WEIGHT: u32 = 50;

/// Default daily assignment cap for a new member.
pub const DEFAULT_MAX_DAILY_BOOKINGS: u32 = 10;

/// Which calendar a member's availability is checked against.
///
/// Members come in two interchangeable variants: *linked* members route
/// through an external agent profile that owns its own calendar
/// credentials, while *standalone* members carry a credentials
/// reference directly. The availability port resolves either form to a
/// concrete calendar client; filtering and ranking never branch on the
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarRef {
    /// Routed through an external agent identity.
    Linked {
        /// Agent profile that holds the calendar credentials.
        agent_id: Uuid,
    },
    /// Member owns its calendar credentials directly.
    Standalone {
        /// Opaque handle to the stored credentials.
        credentials_ref: String,
    },
    /// No calendar connected; the member can never be verified free.
    Unconnected,
}

impl CalendarRef {
    /// Whether a calendar is connected at all. Unconnected members are
    /// excluded from allocation before any provider call is made.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Unconnected)
    }
}

/// One allocatable unit inside a pool.
///
/// `total_bookings_count` is the monotonic all-time assignment count.
/// It always equals the number of assignment rows referencing this
/// member and is mutated only through the store's transactional
/// [`record_assignment`](crate::persistence::RotaStore::record_assignment),
/// never directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Member identifier.
    pub id: MemberId,
    /// Pool this member belongs to. A member belongs to exactly one pool.
    pub pool_id: PoolId,
    /// Display name for reason strings, stats, and logs.
    pub display_name: String,
    /// Calendar this member allocates against.
    pub calendar: CalendarRef,
    /// Relative share of traffic under the weighted strategy (positive).
    pub weight: u32,
    /// Daily assignment cap; `0` disables the cap.
    pub max_daily_bookings: u32,
    /// Whether the member participates in allocation at all.
    pub is_active: bool,
    /// Temporary opt-out; counters are preserved while paused.
    pub is_paused: bool,
    /// All-time assignment count (see struct docs).
    pub total_bookings_count: u64,
    /// Instant of the most recent assignment, if any.
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl Member {
    /// Creates an active, unpaused member with default weight and cap.
    #[must_use]
    pub fn new(pool_id: PoolId, display_name: impl Into<String>, calendar: CalendarRef) -> Self {
        Self {
            id: MemberId::new(),
            pool_id,
            display_name: display_name.into(),
            calendar,
            weight: DEFAULT_WEIGHT,
            max_daily_bookings: DEFAULT_MAX_DAILY_BOOKINGS,
            is_active: true,
            is_paused: false,
            total_bookings_count: 0,
            last_assigned_at: None,
        }
    }
}

/// Per-member snapshot used by the eligibility filter and rankers.
///
/// Both member variants are merged into this one candidate shape; the
/// only calendar-related fact the filter needs is whether one is
/// connected. `today_bookings_count` is computed by the store at load
/// time as the number of assignments since the start of the current
/// day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Member identifier.
    pub member_id: MemberId,
    /// Display name.
    pub display_name: String,
    /// Calendar reference, handed to the availability port as-is.
    pub calendar: CalendarRef,
    /// Relative traffic share.
    pub weight: u32,
    /// Daily cap (`0` = uncapped).
    pub max_daily_bookings: u32,
    /// Active flag at snapshot time.
    pub is_active: bool,
    /// Paused flag at snapshot time.
    pub is_paused: bool,
    /// All-time assignment count at snapshot time.
    pub total_bookings_count: u64,
    /// Most recent assignment instant at snapshot time.
    pub last_assigned_at: Option<DateTime<Utc>>,
    /// Assignments recorded since the start of the current day.
    pub today_bookings_count: u64,
}

impl Candidate {
    /// Builds a snapshot from a member plus its computed daily count.
    #[must_use]
    pub fn from_member(member: &Member, today_bookings_count: u64) -> Self {
        Self {
            member_id: member.id,
            display_name: member.display_name.clone(),
            calendar: member.calendar.clone(),
            weight: member.weight,
            max_daily_bookings: member.max_daily_bookings,
            is_active: member.is_active,
            is_paused: member.is_paused,
            total_bookings_count: member.total_bookings_count,
            last_assigned_at: member.last_assigned_at,
            today_bookings_count,
        }
    }

    /// Whether a calendar is connected.
    #[must_use]
    pub const fn has_calendar(&self) -> bool {
        self.calendar.is_connected()
    }
}
