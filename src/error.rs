//! Central error type for the allocation engine.
//!
//! [`RotaError`] covers hard failures only. Empty-handed allocation
//! outcomes ("no eligible members", "all busy") are modeled by
//! [`crate::domain::SelectionOutcome`], and per-member calendar
//! failures by [`crate::calendar::CalendarError`]; neither aborts an
//! allocation.

use crate::domain::{MemberId, PoolId};

/// Hard errors from the allocation engine.
///
/// # Error Code Ranges
///
/// | Range     | Category        |
/// |-----------|-----------------|
/// | 1000–1999 | Validation      |
/// | 2000–2999 | Not Found       |
/// | 3000–3999 | Server / Store  |
#[derive(Debug, thiserror::Error)]
pub enum RotaError {
    /// Pool missing or soft-disabled. No allocation is possible via
    /// this pool and retrying will not help.
    #[error("pool not found or inactive: {0}")]
    PoolNotFound(PoolId),

    /// Member with the given ID does not exist.
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    /// Request validation failed (malformed pool or parameters). These
    /// are programming errors on the caller's side and fail loudly.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal invariant violation, such as a stored row holding a
    /// value no code path writes.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RotaError {
    /// Returns the stable numeric code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::PoolNotFound(_) => 2001,
            Self::MemberNotFound(_) => 2002,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RotaError::PoolNotFound(PoolId::new()).error_code(), 2001);
        assert_eq!(
            RotaError::MemberNotFound(MemberId::new()).error_code(),
            2002
        );
        assert_eq!(
            RotaError::InvalidRequest("bad".to_string()).error_code(),
            1001
        );
        assert_eq!(
            RotaError::Persistence("down".to_string()).error_code(),
            3001
        );
    }

    #[test]
    fn display_names_the_entity() {
        let id = PoolId::new();
        let msg = RotaError::PoolNotFound(id).to_string();
        assert!(msg.contains(&id.to_string()));
    }
}
