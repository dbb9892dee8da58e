//! Port for the overtime request/resolve workflow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::overtime::{ApprovalAction, OvertimeApproval};
use crate::domain::user::UserId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by overtime repository adapters.
    pub enum OvertimeRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "overtime repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "overtime repository query failed: {message}",
        /// A precondition rejected the operation before any write.
        Rejected { error: Error } =>
            "overtime operation rejected: {error}",
    }
}

/// File an overtime request for a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOvertimeCommand {
    /// Card the request concerns.
    pub card_id: Uuid,
    /// The requesting assignee.
    pub requested_by: UserId,
    /// Why the work ran over.
    pub reason: String,
    /// Request instant.
    pub now: DateTime<Utc>,
}

/// Result of a committed overtime request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOvertimeOutcome {
    /// The pending approval row.
    pub approval: OvertimeApproval,
    /// Project of the card, for locating the leaders to notify.
    pub project_id: Uuid,
    /// Card title, for the notification text.
    pub card_title: String,
}

/// Resolve a pending overtime request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOvertimeCommand {
    /// The request to resolve.
    pub approval_id: Uuid,
    /// Approve or reject.
    pub action: ApprovalAction,
    /// Who resolves.
    pub acting_user: UserId,
    /// Optional notes for the requester.
    pub notes: Option<String>,
    /// Resolution instant.
    pub now: DateTime<Utc>,
}

/// Result of a committed resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOvertimeOutcome {
    /// The resolved approval row.
    pub approval: OvertimeApproval,
    /// Project of the card.
    pub project_id: Uuid,
    /// Card title, for the notification text.
    pub card_title: String,
}

/// Port for overtime approval persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OvertimeRepository: Send + Sync {
    /// Look up the project a pending approval belongs to, for
    /// authorization.
    async fn find_project_of_approval(
        &self,
        approval_id: Uuid,
    ) -> Result<Option<Uuid>, OvertimeRepositoryError>;

    /// File a request atomically, enforcing the single-pending rule.
    async fn request(
        &self,
        command: RequestOvertimeCommand,
    ) -> Result<RequestOvertimeOutcome, OvertimeRepositoryError>;

    /// Resolve a pending request atomically.
    async fn resolve(
        &self,
        command: ResolveOvertimeCommand,
    ) -> Result<ResolveOvertimeOutcome, OvertimeRepositoryError>;
}
