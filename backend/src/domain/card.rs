//! Cards and the typed commands that mutate them.
//!
//! A card is one unit of work on a board. Mutations arrive as typed
//! commands (`StatusChange`, `AssigneeChange`, `CardFieldEdit`) rather than
//! a loose partial-update object, so each command carries exactly the
//! preconditions it needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;
use super::user::UserId;

/// Lifecycle state of a card.
///
/// Transitions are unrestricted in direction; the gating preconditions live
/// in [`crate::domain::work_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    /// Not started.
    Todo,
    /// Actively worked on.
    InProgress,
    /// Awaiting review.
    Review,
    /// Finished; the only terminal state for exclusivity checks.
    Done,
}

impl CardStatus {
    /// Stable string form stored in the datastore.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "REVIEW" => Ok(Self::Review),
            "DONE" => Ok(Self::Done),
            other => Err(Error::internal(format!("unknown card status '{other}'"))),
        }
    }

    /// Whether the card counts as finished for exclusivity checks.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Scheduling priority of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardPriority {
    /// Background work.
    Low,
    /// Default priority.
    Medium,
    /// Needs attention first.
    High,
}

impl CardPriority {
    /// Stable string form stored in the datastore.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(Error::internal(format!("unknown card priority '{other}'"))),
        }
    }
}

/// One unit of work on a board.
///
/// `assignee_id` is a denormalised pointer to the `assigned_to` of the
/// unique active assignment for this card. It is never written on its own:
/// every mutation that touches it goes through the single apply path that
/// also rewrites the assignment rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Card {
    /// Stable identifier.
    pub id: Uuid,
    /// Board this card sits on.
    pub board_id: Uuid,
    /// Project scoping all membership and exclusivity checks.
    pub project_id: Uuid,
    /// Short summary line.
    pub title: String,
    /// Optional long-form description.
    pub description: Option<String>,
    /// Scheduling priority.
    pub priority: CardPriority,
    /// Lifecycle state.
    pub status: CardStatus,
    /// Soft target date shown on the board.
    pub due_date: Option<DateTime<Utc>>,
    /// Hard deadline gating the overtime workflow.
    pub deadline: Option<DateTime<Utc>>,
    /// Current worker of record, if any.
    pub assignee_id: Option<UserId>,
    /// Who created the card.
    pub created_by: UserId,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Plain field edits with no cross-entity preconditions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct CardFieldEdit {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New priority.
    pub priority: Option<CardPriority>,
    /// New due date.
    pub due_date: Option<DateTime<Utc>>,
    /// New deadline.
    pub deadline: Option<DateTime<Utc>>,
}

impl CardFieldEdit {
    /// Whether the edit changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.deadline.is_none()
    }
}

/// Command moving a card to a new lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct StatusChange {
    /// Target state.
    pub to: CardStatus,
}

/// Command changing the worker of record, `None` meaning unassign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct AssigneeChange {
    /// Target assignee.
    pub to: Option<UserId>,
}

/// A typed card update: at most one command per mutable concern.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardUpdate {
    /// Plain field edits.
    pub edit: Option<CardFieldEdit>,
    /// Lifecycle transition.
    pub status: Option<StatusChange>,
    /// Worker-of-record change.
    pub assignee: Option<AssigneeChange>,
}

impl CardUpdate {
    /// Whether the update contains no command at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edit.as_ref().is_none_or(CardFieldEdit::is_empty)
            && self.status.is_none()
            && self.assignee.is_none()
    }

    /// Whether the update only changes the lifecycle state.
    ///
    /// Used by authorization: the current assignee may move their own card
    /// between states but may not touch other fields.
    #[must_use]
    pub fn is_status_only(&self) -> bool {
        self.status.is_some()
            && self.assignee.is_none()
            && self.edit.as_ref().is_none_or(CardFieldEdit::is_empty)
    }
}

/// Which parts of a card an applied update actually changed.
///
/// Drives the notification fan-out and the realtime payloads after commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedFields {
    /// Any plain field (title, description, priority, dates) changed.
    pub fields: bool,
    /// The lifecycle state changed.
    pub status: bool,
    /// The update moved the card into `DONE`.
    pub completed: bool,
    /// The worker of record changed.
    pub assignee: bool,
}

impl ChangedFields {
    /// Whether nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.fields || self.status || self.assignee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CardStatus::Todo, "TODO")]
    #[case(CardStatus::InProgress, "IN_PROGRESS")]
    #[case(CardStatus::Review, "REVIEW")]
    #[case(CardStatus::Done, "DONE")]
    fn status_round_trips(#[case] status: CardStatus, #[case] text: &str) {
        assert_eq!(status.as_str(), text);
        assert_eq!(CardStatus::parse(text).expect("parses status"), status);
    }

    #[rstest]
    #[case(CardPriority::Low, "LOW")]
    #[case(CardPriority::Medium, "MEDIUM")]
    #[case(CardPriority::High, "HIGH")]
    fn priority_round_trips(#[case] priority: CardPriority, #[case] text: &str) {
        assert_eq!(priority.as_str(), text);
        assert_eq!(CardPriority::parse(text).expect("parses priority"), priority);
    }

    #[rstest]
    fn unknown_status_is_rejected() {
        let err = CardStatus::parse("ARCHIVED").expect_err("unknown status fails");
        assert!(err.to_string().contains("ARCHIVED"));
    }

    #[rstest]
    fn only_done_is_terminal() {
        assert!(CardStatus::Done.is_done());
        assert!(!CardStatus::Review.is_done());
    }

    #[rstest]
    fn empty_update_is_detected() {
        let update = CardUpdate::default();
        assert!(update.is_empty());

        let update = CardUpdate {
            edit: Some(CardFieldEdit::default()),
            ..CardUpdate::default()
        };
        assert!(update.is_empty());
    }

    #[rstest]
    fn status_only_update_is_detected() {
        let update = CardUpdate {
            status: Some(StatusChange {
                to: CardStatus::Review,
            }),
            ..CardUpdate::default()
        };
        assert!(update.is_status_only());

        let update = CardUpdate {
            status: Some(StatusChange {
                to: CardStatus::Review,
            }),
            assignee: Some(AssigneeChange { to: None }),
            ..CardUpdate::default()
        };
        assert!(!update.is_status_only());
    }
}
