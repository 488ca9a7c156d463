//! # booking-rota
//!
//! Fair-rotation allocation engine for appointment booking pools.
//!
//! Given an incoming slot request, this crate decides *who* in a pool
//! of interchangeable members should receive it, balancing long-run
//! fairness against real-time calendar availability, and records that
//! decision in an immutable audit trail. It does not decide whether a
//! booking should happen, send confirmations, or manage calendar OAuth
//! — those belong to the surrounding platform.
//!
//! ## Architecture
//!
//! ```text
//! Caller (booking workflow, HTTP layer)
//!     │
//!     ├── AllocationService (service/)
//!     │       filter → rank → sequential availability search → record
//!     ├── ReportingService (service/)
//!     │       fairness stats, multi-day slot scan
//!     │
//!     ├── Eligibility / Strategy / Slots (domain/, pure)
//!     │
//!     ├── AvailabilityPort (calendar/, external provider)
//!     └── RotaStore (persistence/, PostgreSQL or in-memory)
//! ```
//!
//! ## Known limitation
//!
//! The availability check and the eventual external booking write are
//! not one atomic transaction: two concurrent requests for overlapping
//! slots can both select the same member, and the conflict surfaces
//! only if the external booking write later fails. Callers needing
//! stronger guarantees must serialize per pool or per member around
//! the check-then-record sequence; counter updates themselves are
//! store-atomic and never lost.

pub mod calendar;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
