//! Assignment records and the assign/overwrite decision logic.
//!
//! An assignment is a historical record: reassigning never deletes rows, it
//! deactivates them. The decision function here is pure; store adapters run
//! it inside the same transaction that loads the snapshot and applies the
//! plan, so no precondition can be invalidated between check and write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Error;
use super::card::{Card, CardStatus};
use super::membership::{ProjectMember, ProjectRole};
use super::user::UserId;

/// Historical record of one user being assigned to one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CardAssignment {
    /// Stable identifier.
    pub id: Uuid,
    /// Card the assignment belongs to.
    pub card_id: Uuid,
    /// The worker of record.
    pub assigned_to: UserId,
    /// Who performed the assignment.
    pub assigned_by: UserId,
    /// Membership row of the assignee at assignment time.
    pub project_member_id: Uuid,
    /// Free-form justification supplied by the assigner.
    pub reason: Option<String>,
    /// Whether this is the card's current assignment.
    pub is_active: bool,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
    /// When the assignment was superseded, if it has been.
    pub unassigned_at: Option<DateTime<Utc>>,
}

/// A card blocking a candidate from taking on new work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BlockingCard {
    /// The blocking card.
    pub id: Uuid,
    /// Its title, for a useful error message.
    pub title: String,
    /// Its current status.
    pub status: CardStatus,
}

/// Everything the decision logic needs to know about an assignment candidate.
///
/// Loaded by the store adapter inside the operation's transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSnapshot {
    /// The candidate.
    pub user_id: UserId,
    /// The candidate's membership in the card's project, if any.
    pub membership: Option<ProjectMember>,
    /// Active assignments of the candidate to other non-`DONE` cards in the
    /// same project.
    pub blocking: Vec<BlockingCard>,
}

impl CandidateSnapshot {
    /// Whether the candidate already works an `IN_PROGRESS` card elsewhere
    /// in the project.
    #[must_use]
    pub fn has_card_in_progress(&self) -> bool {
        self.blocking
            .iter()
            .any(|card| card.status == CardStatus::InProgress)
    }
}

/// Writes a store adapter must apply to execute an assignment.
///
/// Applying the plan is the single write path for both `cards.assignee_id`
/// and the assignment rows: deactivate every currently active row for the
/// card, then insert the new active row if an assignee is given, then set
/// the denormalised pointer to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    /// New worker of record, `None` to leave the card unassigned.
    pub assignee: Option<UserId>,
    /// Membership row backing the new assignment.
    pub project_member_id: Option<Uuid>,
    /// Status rewrite required by the plan (`DONE` cards reopen to `TODO`
    /// when handed to a new assignee).
    pub new_status: Option<CardStatus>,
}

/// Reject a candidate who still has unfinished work in the project.
///
/// Shared verbatim between direct assignment and assignee changes applied
/// through a card update, so both paths enumerate the blocking cards the
/// same way.
pub fn ensure_no_unfinished_work(
    candidate: UserId,
    blocking: &[BlockingCard],
) -> Result<(), Error> {
    if blocking.is_empty() {
        return Ok(());
    }
    Err(Error::conflict(format!(
        "user {candidate} already has {} unfinished card(s) in this project",
        blocking.len()
    ))
    .with_details(json!({
        "reason": "assignee_has_unfinished_work",
        "blockingCards": blocking,
    })))
}

/// Validate that a candidate may be assigned work in the card's project.
///
/// Membership is mandatory; observers may only be assigned by a system
/// admin.
pub fn ensure_assignable(
    snapshot: &CandidateSnapshot,
    acting_is_admin: bool,
) -> Result<&ProjectMember, Error> {
    let member = snapshot.membership.as_ref().ok_or_else(|| {
        Error::invalid_request(format!(
            "user {} is not a member of this project",
            snapshot.user_id
        ))
        .with_details(json!({ "reason": "assignee_not_member" }))
    })?;

    if member.role == ProjectRole::Observer && !acting_is_admin {
        return Err(Error::invalid_request(format!(
            "user {} is an observer and cannot be assigned work",
            snapshot.user_id
        ))
        .with_details(json!({ "reason": "assignee_is_observer" })));
    }

    Ok(member)
}

/// Decide an assign/unassign request against the transactional snapshot.
///
/// On success the returned plan deactivates every active assignment row for
/// the card (not just the newest one; stale actives from interrupted writes
/// are swept too) and, when a candidate is given, hands the card over.
pub fn decide_assign(
    card: &Card,
    candidate: Option<&CandidateSnapshot>,
    acting_is_admin: bool,
) -> Result<AssignmentPlan, Error> {
    let Some(snapshot) = candidate else {
        return Ok(AssignmentPlan {
            assignee: None,
            project_member_id: None,
            new_status: None,
        });
    };

    let member = ensure_assignable(snapshot, acting_is_admin)?;
    ensure_no_unfinished_work(snapshot.user_id, &snapshot.blocking)?;

    // Handing a finished card to someone reopens it.
    let new_status = (card.status == CardStatus::Done).then_some(CardStatus::Todo);

    Ok(AssignmentPlan {
        assignee: Some(snapshot.user_id),
        project_member_id: Some(member.id),
        new_status,
    })
}

/// Decide an assignee change applied through a card update.
///
/// Same eligibility rules as [`decide_assign`], except the unfinished-work
/// rule is relaxed once the project is completed and a `DONE` card is not
/// reopened (the update sets its own status explicitly).
pub fn decide_assign_for_update(
    snapshot: &CandidateSnapshot,
    acting_is_admin: bool,
    project_completed: bool,
) -> Result<AssignmentPlan, Error> {
    let member = ensure_assignable(snapshot, acting_is_admin)?;
    if !project_completed {
        ensure_no_unfinished_work(snapshot.user_id, &snapshot.blocking)?;
    }
    Ok(AssignmentPlan {
        assignee: Some(snapshot.user_id),
        project_member_id: Some(member.id),
        new_status: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::CardPriority;
    use rstest::{fixture, rstest};

    fn card_with_status(status: CardStatus) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Ship the release".to_owned(),
            description: None,
            priority: CardPriority::Medium,
            status,
            due_date: None,
            deadline: None,
            assignee_id: None,
            created_by: UserId::random(),
            created_at: now,
            updated_at: now,
        }
    }

    fn member_snapshot(card: &Card, role: ProjectRole) -> CandidateSnapshot {
        let user_id = UserId::random();
        CandidateSnapshot {
            user_id,
            membership: Some(ProjectMember {
                id: Uuid::new_v4(),
                project_id: card.project_id,
                user_id,
                role,
                joined_at: Utc::now(),
            }),
            blocking: Vec::new(),
        }
    }

    #[fixture]
    fn card() -> Card {
        card_with_status(CardStatus::Todo)
    }

    #[rstest]
    fn unassign_always_produces_a_bare_plan(card: Card) {
        let plan = decide_assign(&card, None, false).expect("unassign succeeds");
        assert_eq!(plan.assignee, None);
        assert_eq!(plan.project_member_id, None);
        assert_eq!(plan.new_status, None);
    }

    #[rstest]
    fn assigning_a_developer_succeeds(card: Card) {
        let snapshot = member_snapshot(&card, ProjectRole::Developer);
        let plan = decide_assign(&card, Some(&snapshot), false).expect("assign succeeds");
        assert_eq!(plan.assignee, Some(snapshot.user_id));
        assert!(plan.project_member_id.is_some());
        assert_eq!(plan.new_status, None);
    }

    #[rstest]
    fn non_member_is_rejected(card: Card) {
        let snapshot = CandidateSnapshot {
            user_id: UserId::random(),
            membership: None,
            blocking: Vec::new(),
        };
        let err = decide_assign(&card, Some(&snapshot), false).expect_err("non-member fails");
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
        assert_eq!(
            err.details().and_then(|d| d.get("reason")),
            Some(&serde_json::json!("assignee_not_member"))
        );
    }

    #[rstest]
    fn observer_is_rejected_unless_admin_is_acting(card: Card) {
        let snapshot = member_snapshot(&card, ProjectRole::Observer);

        let err = decide_assign(&card, Some(&snapshot), false).expect_err("observer fails");
        assert_eq!(
            err.details().and_then(|d| d.get("reason")),
            Some(&serde_json::json!("assignee_is_observer"))
        );

        let plan = decide_assign(&card, Some(&snapshot), true).expect("admin may assign observer");
        assert_eq!(plan.assignee, Some(snapshot.user_id));
    }

    #[rstest]
    fn unfinished_work_is_enumerated_in_the_conflict(card: Card) {
        let mut snapshot = member_snapshot(&card, ProjectRole::Developer);
        snapshot.blocking = vec![
            BlockingCard {
                id: Uuid::new_v4(),
                title: "Fix the build".to_owned(),
                status: CardStatus::InProgress,
            },
            BlockingCard {
                id: Uuid::new_v4(),
                title: "Write the docs".to_owned(),
                status: CardStatus::Review,
            },
        ];

        let err = decide_assign(&card, Some(&snapshot), false).expect_err("busy assignee fails");
        assert_eq!(err.code(), crate::domain::ErrorCode::Conflict);
        let blocking = err
            .details()
            .and_then(|d| d.get("blockingCards"))
            .and_then(serde_json::Value::as_array)
            .expect("blocking cards listed");
        assert_eq!(blocking.len(), 2);
        assert_eq!(
            blocking.first().and_then(|card| card.get("title")),
            Some(&serde_json::json!("Fix the build"))
        );
    }

    #[rstest]
    fn reassigning_a_done_card_reopens_it() {
        let card = card_with_status(CardStatus::Done);
        let snapshot = member_snapshot(&card, ProjectRole::Designer);

        let plan = decide_assign(&card, Some(&snapshot), false).expect("assign succeeds");
        assert_eq!(plan.new_status, Some(CardStatus::Todo));
    }

    #[rstest]
    fn unassigning_a_done_card_leaves_it_done() {
        let card = card_with_status(CardStatus::Done);
        let plan = decide_assign(&card, None, false).expect("unassign succeeds");
        assert_eq!(plan.new_status, None);
    }

    #[rstest]
    fn in_progress_elsewhere_is_visible_on_the_snapshot(card: Card) {
        let mut snapshot = member_snapshot(&card, ProjectRole::Developer);
        assert!(!snapshot.has_card_in_progress());

        snapshot.blocking.push(BlockingCard {
            id: Uuid::new_v4(),
            title: "Other work".to_owned(),
            status: CardStatus::InProgress,
        });
        assert!(snapshot.has_card_in_progress());
    }
}
