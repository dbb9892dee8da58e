//! Shared Diesel and pool error mapping for persistence adapters.
//!
//! Every adapter maps infrastructure failures the same way: pool checkout
//! problems become connection errors, everything else becomes a query
//! error. Unique-violation races get translated back into the same domain
//! conflicts the decision functions produce, so a race loser observes the
//! identical failure as a sequential loser.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;

use crate::domain::Error as DomainError;

use super::pool::PoolError;

/// Map a pool failure through the adapter's connection-error constructor.
pub(crate) fn map_pool_error<E>(error: PoolError, connection: impl FnOnce(String) -> E) -> E {
    connection(error.to_string())
}

/// Map a Diesel failure through the adapter's query-error constructor.
pub(crate) fn map_diesel_error<E>(error: DieselError, query: impl FnOnce(String) -> E) -> E {
    query(error.to_string())
}

/// Translate a unique-violation into the invariant conflict its index
/// protects, if the error is one.
///
/// The partial unique indexes behind the engine's invariants are the second
/// line of defence against check-then-act races; when one fires, the caller
/// should see the same conflict the precondition check would have raised.
pub(crate) fn unique_violation_conflict(error: &DieselError) -> Option<DomainError> {
    let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = error else {
        return None;
    };

    let conflict = match info.constraint_name() {
        Some("uniq_active_assignment_per_card") => {
            DomainError::conflict("card already has an active assignment")
                .with_details(json!({ "reason": "active_assignment_exists" }))
        }
        Some("uniq_open_time_log_per_user") => {
            DomainError::conflict("a timer is already running for this user")
                .with_details(json!({ "reason": "active_timer_exists" }))
        }
        Some("uniq_pending_overtime_per_requester") => {
            DomainError::conflict("an overtime request for this card is already pending")
                .with_details(json!({ "reason": "duplicate_pending" }))
        }
        _ => DomainError::conflict("a concurrent write already claimed this resource"),
    };
    Some(conflict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let err = map_pool_error(PoolError::checkout("refused"), |message| message);
        assert!(err.contains("refused"));
    }

    #[rstest]
    fn diesel_errors_become_query_errors() {
        let err = map_diesel_error(DieselError::NotFound, |message| message);
        assert!(err.contains("record not found"));
    }

    #[rstest]
    fn non_unique_violations_are_not_conflicts() {
        assert_eq!(unique_violation_conflict(&DieselError::NotFound), None);
    }
}
