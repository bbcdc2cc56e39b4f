use std::time::Duration;

use super::guard::RejectReason;

/// Failure of a persistence or audit collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store's exclusion constraint refused an overlapping slot.
    #[error("slot already taken for this owner")]
    SlotTaken,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("db error: {0}")]
    Backend(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        // 23P01 exclusion_violation
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some("23P01") {
                return StoreError::SlotTaken;
            }
        }
        StoreError::Backend(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    Conflict(RejectReason),
    /// Absent and out-of-scope records are indistinguishable.
    #[error("record not found")]
    NotFound,
    #[error("dependency failure: {0}")]
    Dependency(#[source] StoreError),
}

impl ScheduleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ScheduleError::Validation(msg.into())
    }
}

impl From<StoreError> for ScheduleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken => ScheduleError::Conflict(RejectReason::Overlap),
            other => ScheduleError::Dependency(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn backend_failure_keeps_the_sqlx_cause() {
        let err = ScheduleError::from(StoreError::from(sqlx::Error::PoolTimedOut));
        let store = err.source().expect("store error");
        let cause = store.source().expect("sqlx error");
        assert!(matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::PoolTimedOut)
        ));
    }
}
