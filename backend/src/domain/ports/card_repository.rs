//! Port for transactional card mutations.
//!
//! Each method is one atomic operation: the adapter loads the precondition
//! snapshot, runs the matching decision function from the domain, and
//! applies the resulting plan, all inside a single transaction. A rejected
//! precondition surfaces as [`CardRepositoryError::Rejected`] with the
//! domain error intact and leaves no writes behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::assignment::CardAssignment;
use crate::domain::card::{Card, CardUpdate, ChangedFields};
use crate::domain::user::UserId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by card repository adapters.
    pub enum CardRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "card repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "card repository query failed: {message}",
        /// A precondition rejected the operation before any write.
        Rejected { error: Error } =>
            "card operation rejected: {error}",
    }
}

/// Assign, reassign, or unassign a card in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignCardCommand {
    /// Card to (re)assign.
    pub card_id: Uuid,
    /// New worker of record, `None` to unassign.
    pub assignee: Option<UserId>,
    /// Who performs the assignment.
    pub acting_user: UserId,
    /// Whether the acting user is a system admin (relaxes the observer
    /// rule).
    pub acting_is_admin: bool,
    /// Free-form justification recorded on the assignment row.
    pub reason: Option<String>,
    /// Operation timestamp.
    pub now: DateTime<Utc>,
}

/// Result of a committed assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignCardOutcome {
    /// The card after the assignment, pointer and status included.
    pub card: Card,
    /// The new active assignment row, absent for an unassign.
    pub assignment: Option<CardAssignment>,
    /// Whether a finished card was reopened by the handover.
    pub reopened: bool,
}

/// Apply a typed update to a card in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCardCommand {
    /// Card to update.
    pub card_id: Uuid,
    /// The typed commands to apply.
    pub update: CardUpdate,
    /// Who performs the update.
    pub acting_user: UserId,
    /// Whether the acting user is a system admin.
    pub acting_is_admin: bool,
    /// Operation timestamp.
    pub now: DateTime<Utc>,
}

/// Result of a committed update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCardOutcome {
    /// The card after the update.
    pub card: Card,
    /// What actually changed.
    pub changed: ChangedFields,
}

/// Summary of a card removed together with its child records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedCard {
    /// The removed card.
    pub card_id: Uuid,
    /// Project the card belonged to, for board-channel fan-out.
    pub project_id: Uuid,
    /// Title at deletion time, for notifications.
    pub title: String,
}

/// Port for transactional card mutations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Load a card by id.
    async fn find_card(&self, card_id: Uuid) -> Result<Option<Card>, CardRepositoryError>;

    /// Execute an assign/reassign/unassign atomically.
    async fn assign(
        &self,
        command: AssignCardCommand,
    ) -> Result<AssignCardOutcome, CardRepositoryError>;

    /// Execute a typed card update atomically.
    async fn update(
        &self,
        command: UpdateCardCommand,
    ) -> Result<UpdateCardOutcome, CardRepositoryError>;

    /// Delete a card and cascade its child records.
    async fn delete(&self, card_id: Uuid) -> Result<DeletedCard, CardRepositoryError>;
}
