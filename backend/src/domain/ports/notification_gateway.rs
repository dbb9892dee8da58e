//! Port for notification fan-out.
//!
//! The engine decides *who* gets told *what*; storage and delivery
//! (push, email) belong to the external collaborator behind this port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::user::UserId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by notification adapters.
    pub enum NotificationGatewayError {
        /// The gateway is unreachable.
        Unavailable { message: String } =>
            "notification gateway unavailable: {message}",
        /// Recording the notification failed.
        Query { message: String } =>
            "notification gateway query failed: {message}",
    }
}

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A card was assigned to the recipient.
    CardAssigned,
    /// A card the recipient cares about changed.
    CardUpdated,
    /// A card reached `DONE`.
    CardCompleted,
    /// An assignee asked to keep working past a deadline.
    OvertimeRequested,
    /// A leader resolved the recipient's overtime request.
    OvertimeResolved,
}

impl NotificationKind {
    /// Stable string form stored by persistence adapters.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CardAssigned => "card_assigned",
            Self::CardUpdated => "card_updated",
            Self::CardCompleted => "card_completed",
            Self::OvertimeRequested => "overtime_requested",
            Self::OvertimeResolved => "overtime_resolved",
        }
    }
}

/// One fan-out call: the same content for every listed recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Deduplicated recipients, never including the acting user.
    pub recipients: Vec<UserId>,
    /// What happened.
    pub kind: NotificationKind,
    /// Card the notification concerns.
    pub card_id: Uuid,
    /// Card title at event time.
    pub title: String,
    /// Display name of whoever acted.
    pub acting_user_name: String,
    /// Optional extra line (e.g. approver notes).
    pub detail: Option<String>,
}

/// Port for delivering notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Fan a notification out to its recipients.
    async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationGatewayError>;
}

/// Fixture gateway for tests that do not observe notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureNotificationGateway;

#[async_trait]
impl NotificationGateway for FixtureNotificationGateway {
    async fn notify(&self, _request: NotificationRequest) -> Result<(), NotificationGatewayError> {
        Ok(())
    }
}
