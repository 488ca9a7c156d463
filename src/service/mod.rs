//! Service layer: allocation and reporting orchestration.
//!
//! [`AllocationService`] runs the filter → rank → search → record
//! pipeline; [`ReportingService`] aggregates fairness statistics and
//! scans slot availability over the same store and calendar port.

pub mod allocation;
pub mod reporting;

pub use allocation::AllocationService;
pub use reporting::{MemberShare, PoolStats, ReportingService, SlotAvailability};
