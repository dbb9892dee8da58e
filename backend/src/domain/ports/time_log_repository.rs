//! Port for transactional timer start/stop operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::card::Card;
use crate::domain::time_tracking::TimeLog;
use crate::domain::user::UserId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by time log repository adapters.
    pub enum TimeLogRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "time log repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "time log repository query failed: {message}",
        /// A precondition rejected the operation before any write.
        Rejected { error: Error } =>
            "timer operation rejected: {error}",
    }
}

/// Start a timer for a user against a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTimerCommand {
    /// Card to log against.
    pub card_id: Uuid,
    /// The starter.
    pub user_id: UserId,
    /// Timer start instant.
    pub now: DateTime<Utc>,
}

/// Result of a committed timer start.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTimerOutcome {
    /// The running session row.
    pub log: TimeLog,
    /// The card after the start: `IN_PROGRESS` and claimed by the starter.
    pub card: Card,
    /// Whether the start changed the worker of record.
    pub claimed: bool,
}

/// Stop a running timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimerCommand {
    /// Session to close.
    pub time_log_id: Uuid,
    /// The caller; must own the session.
    pub user_id: UserId,
    /// Timer stop instant.
    pub now: DateTime<Utc>,
}

/// Result of a committed timer stop.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTimerOutcome {
    /// The closed session row.
    pub log: TimeLog,
    /// Project of the session's card, for channel fan-out.
    pub project_id: Uuid,
}

/// Port for transactional timer operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeLogRepository: Send + Sync {
    /// Start a session atomically: insert the open row and move the card to
    /// `IN_PROGRESS` under the starter.
    async fn start(
        &self,
        command: StartTimerCommand,
    ) -> Result<StartTimerOutcome, TimeLogRepositoryError>;

    /// Close a session atomically.
    async fn stop(
        &self,
        command: StopTimerCommand,
    ) -> Result<StopTimerOutcome, TimeLogRepositoryError>;
}
