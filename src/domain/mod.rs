//! Domain layer: entities, eligibility rules, ranking strategies, and
//! slot arithmetic.
//!
//! Everything in this module is pure, synchronous computation. The
//! suspend points of an allocation (store reads/writes, calendar
//! queries) live in [`crate::persistence`] and [`crate::calendar`].

pub mod assignment;
pub mod eligibility;
pub mod ids;
pub mod member;
pub mod pool;
pub mod slots;
pub mod strategy;

pub use assignment::{Assignment, Selection, SelectionOutcome};
pub use ids::{AssignmentId, MemberId, PoolId};
pub use member::{CalendarRef, Candidate, Member};
pub use pool::{Pool, Strategy};
pub use slots::SlotInterval;
