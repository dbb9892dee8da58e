//! Card lifecycle decisions and their cross-entity preconditions.
//!
//! Transitions between the four states are unrestricted in direction; what
//! is gated is *committing* a transition whose preconditions do not hold:
//! finishing a card nobody ever logged time on, or handing active work to
//! someone who already has some. Like the assignment logic, the decision
//! function is pure and runs inside the store adapter's transaction.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::Error;
use super::assignment::{AssignmentPlan, CandidateSnapshot, decide_assign_for_update};
use super::card::{Card, CardStatus, CardUpdate, ChangedFields};

/// Transactional snapshot backing a card update decision.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateContext {
    /// Number of time log rows recorded against the card, running or not.
    pub time_log_count: i64,
    /// Whether the card's project is marked completed, which relaxes the
    /// one-task-per-user rule.
    pub project_completed: bool,
    /// Whether the acting user is a system admin.
    pub acting_is_admin: bool,
    /// Snapshot of the new assignee when the update changes the worker of
    /// record to a concrete user.
    pub candidate: Option<CandidateSnapshot>,
}

/// Writes a store adapter must apply to execute a card update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// The card with every accepted command applied and `updated_at`
    /// refreshed; the adapter persists this row as-is.
    pub card: Card,
    /// Assignment-row rewrite, present iff the update changes the worker of
    /// record. Applied through the same path as a direct assignment.
    pub assignment: Option<AssignmentPlan>,
    /// What actually changed, for fan-out and realtime payloads.
    pub changed: ChangedFields,
}

/// Decide a card update against the transactional snapshot.
///
/// Gates, in order:
/// - a transition into `DONE` requires at least one time log row
///   (`no_time_logged`), running or closed;
/// - a transition into `IN_PROGRESS` that simultaneously assigns a user
///   fails when that user already has a different `IN_PROGRESS` card
///   (`assignee_already_active`);
/// - any assignee change re-runs the unfinished-work check used by direct
///   assignment, unless the project is completed.
pub fn decide_update(
    card: &Card,
    update: &CardUpdate,
    ctx: &UpdateContext,
    now: DateTime<Utc>,
) -> Result<UpdatePlan, Error> {
    if update.is_empty() {
        return Err(Error::invalid_request("update contains no changes"));
    }

    let target_status = update.status.map(|change| change.to);

    if let Some(CardStatus::Done) = target_status
        && card.status != CardStatus::Done
        && ctx.time_log_count == 0
    {
        return Err(Error::invalid_state(
            "card cannot be completed before any time has been logged",
        )
        .with_details(json!({ "reason": "no_time_logged" })));
    }

    let assignment = match update.assignee {
        None => None,
        Some(change) => Some(decide_assignee_change(
            change.to.is_some(),
            target_status,
            ctx,
        )?),
    };

    let mut next = card.clone();
    if let Some(edit) = &update.edit {
        if let Some(title) = &edit.title {
            next.title.clone_from(title);
        }
        if let Some(description) = &edit.description {
            next.description = Some(description.clone());
        }
        if let Some(priority) = edit.priority {
            next.priority = priority;
        }
        if let Some(due_date) = edit.due_date {
            next.due_date = Some(due_date);
        }
        if let Some(deadline) = edit.deadline {
            next.deadline = Some(deadline);
        }
    }
    if let Some(status) = target_status {
        next.status = status;
    }
    if let Some(plan) = &assignment {
        next.assignee_id = plan.assignee;
    }

    let changed = ChangedFields {
        fields: fields_differ(card, &next),
        status: next.status != card.status,
        completed: next.status == CardStatus::Done && card.status != CardStatus::Done,
        assignee: next.assignee_id != card.assignee_id,
    };
    next.updated_at = now;

    Ok(UpdatePlan {
        card: next,
        assignment,
        changed,
    })
}

fn decide_assignee_change(
    has_candidate: bool,
    target_status: Option<CardStatus>,
    ctx: &UpdateContext,
) -> Result<AssignmentPlan, Error> {
    if !has_candidate {
        return Ok(AssignmentPlan {
            assignee: None,
            project_member_id: None,
            new_status: None,
        });
    }

    let snapshot = ctx.candidate.as_ref().ok_or_else(|| {
        Error::internal("assignee change requires a candidate snapshot from the store")
    })?;

    if target_status == Some(CardStatus::InProgress) && snapshot.has_card_in_progress() {
        return Err(Error::conflict(format!(
            "user {} already has a card in progress",
            snapshot.user_id
        ))
        .with_details(json!({ "reason": "assignee_already_active" })));
    }

    decide_assign_for_update(snapshot, ctx.acting_is_admin, ctx.project_completed)
}

fn fields_differ(before: &Card, after: &Card) -> bool {
    before.title != after.title
        || before.description != after.description
        || before.priority != after.priority
        || before.due_date != after.due_date
        || before.deadline != after.deadline
}

#[cfg(test)]
#[path = "work_status_tests.rs"]
mod tests;
