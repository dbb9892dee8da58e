//! Time-logging sessions and the start/stop protocol.
//!
//! One running timer per user, globally. Starting a timer couples to the
//! card: the starter claims the card and it moves to `IN_PROGRESS` in the
//! same transaction, so a timer can never run against work that is not the
//! starter's current focus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;
use super::assignment::{AssignmentPlan, BlockingCard, CandidateSnapshot, ensure_assignable};
use super::card::{Card, CardStatus};
use super::user::UserId;

/// One work session against a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeLog {
    /// Stable identifier.
    pub id: Uuid,
    /// Card the session was logged against.
    pub card_id: Uuid,
    /// Who logged the session.
    pub user_id: UserId,
    /// When the session started.
    pub start_time: DateTime<Utc>,
    /// When the session ended; `None` while the timer is running.
    pub end_time: Option<DateTime<Utc>>,
    /// Session length. Historical field name: the stored value is in
    /// seconds, floored to a whole number and never negative.
    pub duration_minutes: Option<i64>,
}

impl TimeLog {
    /// Whether the timer is still running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Transactional snapshot backing a timer-start decision.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSnapshot {
    /// The would-be starter.
    pub user_id: UserId,
    /// The starter's membership in the card's project, if any.
    pub membership: Option<super::membership::ProjectMember>,
    /// Whether the starter has a running timer anywhere in the system.
    pub has_open_log: bool,
    /// Active assignments of the starter to other non-`DONE` cards in the
    /// same project.
    pub other_assignments: Vec<BlockingCard>,
}

/// Writes a store adapter must apply to start a timer.
#[derive(Debug, Clone, PartialEq)]
pub struct StartPlan {
    /// The session row to insert, with a running (open) end time.
    pub log: NewTimeLog,
    /// Assignment rewrite claiming the card for the starter, present when
    /// the starter was not already the worker of record. Applied through
    /// the same path as a direct assignment so the denormalised pointer
    /// stays consistent.
    pub claim: Option<AssignmentPlan>,
}

/// Field values for a freshly started session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTimeLog {
    /// Card the session runs against.
    pub card_id: Uuid,
    /// The starter.
    pub user_id: UserId,
    /// Timer start instant.
    pub start_time: DateTime<Utc>,
}

/// Decide a timer start against the transactional snapshot.
///
/// Rejections, in order: a running timer anywhere (`active_timer_exists`),
/// a finished card (`card_already_done`), no membership in the card's
/// project (`not_a_project_member`), and the single-focus rules — another
/// `IN_PROGRESS` card in the project, or (for non-assignees) any other
/// assigned card in the project.
pub fn decide_start(
    card: &Card,
    snapshot: &StartSnapshot,
    now: DateTime<Utc>,
) -> Result<StartPlan, Error> {
    if snapshot.has_open_log {
        return Err(
            Error::conflict("a timer is already running for this user")
                .with_details(json!({ "reason": "active_timer_exists" })),
        );
    }

    if card.status == CardStatus::Done {
        return Err(
            Error::invalid_state("time cannot be logged against a finished card")
                .with_details(json!({ "reason": "card_already_done" })),
        );
    }

    if snapshot.membership.is_none() {
        return Err(
            Error::forbidden("only project members may log time on this card")
                .with_details(json!({ "reason": "not_a_project_member" })),
        );
    }

    let in_progress_elsewhere = snapshot
        .other_assignments
        .iter()
        .any(|other| other.status == CardStatus::InProgress);
    if in_progress_elsewhere {
        return Err(Error::conflict(format!(
            "user {} already has a card in progress in this project",
            snapshot.user_id
        ))
        .with_details(json!({ "reason": "card_in_progress_elsewhere" })));
    }

    let is_assignee = card.assignee_id == Some(snapshot.user_id);
    if !is_assignee && !snapshot.other_assignments.is_empty() {
        return Err(Error::conflict(format!(
            "user {} is already assigned other work in this project",
            snapshot.user_id
        ))
        .with_details(json!({
            "reason": "other_card_assigned",
            "blockingCards": snapshot.other_assignments,
        })));
    }

    // Starting the timer claims the card for the starter.
    let claim = if is_assignee {
        None
    } else {
        let candidate = CandidateSnapshot {
            user_id: snapshot.user_id,
            membership: snapshot.membership.clone(),
            blocking: Vec::new(),
        };
        let member = ensure_assignable(&candidate, false)?;
        Some(AssignmentPlan {
            assignee: Some(snapshot.user_id),
            project_member_id: Some(member.id),
            new_status: None,
        })
    };

    Ok(StartPlan {
        log: NewTimeLog {
            card_id: card.id,
            user_id: snapshot.user_id,
            start_time: now,
        },
        claim,
    })
}

/// Validate that a caller may stop a session.
pub fn decide_stop(log: &TimeLog, caller: UserId) -> Result<(), Error> {
    if log.user_id != caller {
        return Err(
            Error::forbidden("only the owner of a time log may stop it")
                .with_details(json!({ "reason": "not_owner" })),
        );
    }
    if !log.is_running() {
        return Err(Error::invalid_state("time log is already stopped")
            .with_details(json!({ "reason": "already_stopped" })));
    }
    Ok(())
}

/// Close a running session at `now`.
///
/// The recorded duration is whole seconds, floored, clamped to zero for
/// pathological clock steps.
#[must_use]
pub fn close(log: &TimeLog, now: DateTime<Utc>) -> TimeLog {
    let elapsed = (now - log.start_time).num_seconds().max(0);
    TimeLog {
        end_time: Some(now),
        duration_minutes: Some(elapsed),
        ..log.clone()
    }
}

#[cfg(test)]
#[path = "time_tracking_tests.rs"]
mod tests;
