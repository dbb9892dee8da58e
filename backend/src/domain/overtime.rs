//! Overtime approvals: continuing work past a card's deadline.
//!
//! A secondary, advisory state machine: `PENDING` resolves to `APPROVED` or
//! `REJECTED`, both terminal. Resolution never blocks or unblocks time
//! tracking or status transitions; the value is the leader-visible audit
//! trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;
use super::card::Card;
use super::user::UserId;

/// Lifecycle state of an overtime request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Awaiting a leader's decision.
    Pending,
    /// Granted; terminal.
    Approved,
    /// Declined; terminal.
    Rejected,
}

impl ApprovalStatus {
    /// Stable string form stored in the datastore.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(Error::internal(format!(
                "unknown approval status '{other}'"
            ))),
        }
    }
}

/// A leader's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Resolve to [`ApprovalStatus::Approved`].
    Approve,
    /// Resolve to [`ApprovalStatus::Rejected`].
    Reject,
}

impl ApprovalAction {
    /// The terminal status this action resolves to.
    #[must_use]
    pub const fn resolved_status(&self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// A request to keep working on a card past its deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OvertimeApproval {
    /// Stable identifier.
    pub id: Uuid,
    /// Card the request concerns.
    pub card_id: Uuid,
    /// The assignee asking to continue.
    pub requested_by: UserId,
    /// Why the work ran over.
    pub reason: String,
    /// Whole days past the deadline at request time, rounded up.
    pub days_overdue: i64,
    /// Request lifecycle state.
    pub status: ApprovalStatus,
    /// When the request was filed.
    pub requested_at: DateTime<Utc>,
    /// Who resolved the request.
    pub approver_id: Option<UserId>,
    /// Free-form notes from the approver.
    pub approver_notes: Option<String>,
    /// When the request was resolved.
    pub responded_at: Option<DateTime<Utc>>,
}

/// Field values for a freshly filed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOvertimeApproval {
    /// Card the request concerns.
    pub card_id: Uuid,
    /// The requesting assignee.
    pub requested_by: UserId,
    /// Why the work ran over.
    pub reason: String,
    /// Whole days past the deadline, rounded up; always positive.
    pub days_overdue: i64,
    /// Request instant.
    pub requested_at: DateTime<Utc>,
}

/// Whole days a deadline has been missed by, rounded up.
///
/// Zero or negative means the deadline has not passed yet.
#[must_use]
pub fn days_overdue(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - deadline).num_seconds();
    let days = seconds / 86_400;
    if seconds % 86_400 > 0 { days + 1 } else { days }
}

/// Decide an overtime request against the transactional snapshot.
///
/// Only the card's current assignee may file, the card must carry a
/// deadline that has already passed, and at most one `PENDING` request may
/// exist per (card, requester) pair.
pub fn decide_request(
    card: &Card,
    requested_by: UserId,
    reason: &str,
    has_pending: bool,
    now: DateTime<Utc>,
) -> Result<NewOvertimeApproval, Error> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::invalid_request("an overtime request needs a reason"));
    }

    if card.assignee_id != Some(requested_by) {
        return Err(
            Error::forbidden("only the card's current assignee may request overtime")
                .with_details(json!({ "reason": "not_assignee" })),
        );
    }

    let Some(deadline) = card.deadline else {
        return Err(Error::invalid_state("card has no deadline")
            .with_details(json!({ "reason": "no_deadline" })));
    };

    let days = days_overdue(deadline, now);
    if days <= 0 {
        return Err(Error::invalid_state("card deadline has not passed yet")
            .with_details(json!({ "reason": "not_overdue" })));
    }

    if has_pending {
        return Err(
            Error::conflict("an overtime request for this card is already pending")
                .with_details(json!({ "reason": "duplicate_pending" })),
        );
    }

    Ok(NewOvertimeApproval {
        card_id: card.id,
        requested_by,
        reason: reason.to_owned(),
        days_overdue: days,
        requested_at: now,
    })
}

/// Decide a resolution against the stored request.
///
/// Fails once the request has left `PENDING`; otherwise returns the
/// resolved record to persist.
pub fn decide_resolve(
    approval: &OvertimeApproval,
    action: ApprovalAction,
    approver: UserId,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<OvertimeApproval, Error> {
    if approval.status != ApprovalStatus::Pending {
        return Err(Error::conflict(format!(
            "overtime request was already resolved as {}",
            approval.status.as_str()
        ))
        .with_details(json!({ "reason": "already_resolved" })));
    }

    Ok(OvertimeApproval {
        status: action.resolved_status(),
        approver_id: Some(approver),
        approver_notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned),
        responded_at: Some(now),
        ..approval.clone()
    })
}

#[cfg(test)]
#[path = "overtime_tests.rs"]
mod tests;
