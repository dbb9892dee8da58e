//! Regression coverage for card update decisions.

use chrono::{Duration, Utc};
use rstest::{fixture, rstest};
use uuid::Uuid;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::assignment::BlockingCard;
use crate::domain::card::{AssigneeChange, CardFieldEdit, CardPriority, StatusChange};
use crate::domain::membership::{ProjectMember, ProjectRole};
use crate::domain::user::UserId;

fn build_card(status: CardStatus) -> Card {
    let now = Utc::now();
    Card {
        id: Uuid::new_v4(),
        board_id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        title: "Ship the release".to_owned(),
        description: Some("cut and tag".to_owned()),
        priority: CardPriority::Medium,
        status,
        due_date: None,
        deadline: None,
        assignee_id: None,
        created_by: UserId::random(),
        created_at: now - Duration::hours(2),
        updated_at: now - Duration::hours(1),
    }
}

fn candidate_for(card: &Card) -> CandidateSnapshot {
    let user_id = UserId::random();
    CandidateSnapshot {
        user_id,
        membership: Some(ProjectMember {
            id: Uuid::new_v4(),
            project_id: card.project_id,
            user_id,
            role: ProjectRole::Developer,
            joined_at: Utc::now(),
        }),
        blocking: Vec::new(),
    }
}

fn bare_context() -> UpdateContext {
    UpdateContext {
        time_log_count: 0,
        project_completed: false,
        acting_is_admin: false,
        candidate: None,
    }
}

fn status_update(to: CardStatus) -> CardUpdate {
    CardUpdate {
        status: Some(StatusChange { to }),
        ..CardUpdate::default()
    }
}

#[fixture]
fn card() -> Card {
    build_card(CardStatus::Todo)
}

#[rstest]
fn empty_update_is_rejected(card: Card) {
    let err = decide_update(&card, &CardUpdate::default(), &bare_context(), Utc::now())
        .expect_err("empty update fails");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
fn completing_without_time_logged_is_rejected(card: Card) {
    let err = decide_update(
        &card,
        &status_update(CardStatus::Done),
        &bare_context(),
        Utc::now(),
    )
    .expect_err("completion without time fails");
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(
        err.details().and_then(|d| d.get("reason")),
        Some(&serde_json::json!("no_time_logged"))
    );
}

#[rstest]
fn a_single_running_log_satisfies_the_completion_gate(card: Card) {
    let ctx = UpdateContext {
        time_log_count: 1,
        ..bare_context()
    };
    let plan = decide_update(&card, &status_update(CardStatus::Done), &ctx, Utc::now())
        .expect("completion succeeds");
    assert_eq!(plan.card.status, CardStatus::Done);
    assert!(plan.changed.status);
    assert!(plan.changed.completed);
}

#[rstest]
fn restating_done_skips_the_completion_gate() {
    let card = build_card(CardStatus::Done);
    let plan = decide_update(
        &card,
        &status_update(CardStatus::Done),
        &bare_context(),
        Utc::now(),
    )
    .expect("no transition, no gate");
    assert!(!plan.changed.status);
    assert!(!plan.changed.completed);
}

#[rstest]
fn reopening_a_done_card_is_unrestricted() {
    let card = build_card(CardStatus::Done);
    let plan = decide_update(
        &card,
        &status_update(CardStatus::Todo),
        &bare_context(),
        Utc::now(),
    )
    .expect("reopen succeeds");
    assert_eq!(plan.card.status, CardStatus::Todo);
    assert!(plan.changed.status);
    assert!(!plan.changed.completed);
}

#[rstest]
fn starting_work_while_assigning_a_busy_user_is_rejected(card: Card) {
    let mut candidate = candidate_for(&card);
    candidate.blocking.push(BlockingCard {
        id: Uuid::new_v4(),
        title: "Other card".to_owned(),
        status: CardStatus::InProgress,
    });
    let update = CardUpdate {
        status: Some(StatusChange {
            to: CardStatus::InProgress,
        }),
        assignee: Some(AssigneeChange {
            to: Some(candidate.user_id),
        }),
        ..CardUpdate::default()
    };
    let ctx = UpdateContext {
        candidate: Some(candidate),
        ..bare_context()
    };

    let err = decide_update(&card, &update, &ctx, Utc::now()).expect_err("busy assignee fails");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(
        err.details().and_then(|d| d.get("reason")),
        Some(&serde_json::json!("assignee_already_active"))
    );
}

#[rstest]
fn assignee_change_re_runs_the_unfinished_work_check(card: Card) {
    let mut candidate = candidate_for(&card);
    candidate.blocking.push(BlockingCard {
        id: Uuid::new_v4(),
        title: "Half-done work".to_owned(),
        status: CardStatus::Review,
    });
    let update = CardUpdate {
        assignee: Some(AssigneeChange {
            to: Some(candidate.user_id),
        }),
        ..CardUpdate::default()
    };
    let ctx = UpdateContext {
        candidate: Some(candidate),
        ..bare_context()
    };

    let err = decide_update(&card, &update, &ctx, Utc::now()).expect_err("unfinished work blocks");
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(
        err.details().and_then(|d| d.get("reason")),
        Some(&serde_json::json!("assignee_has_unfinished_work"))
    );
}

#[rstest]
fn completed_projects_relax_the_unfinished_work_rule(card: Card) {
    let mut candidate = candidate_for(&card);
    let candidate_id = candidate.user_id;
    candidate.blocking.push(BlockingCard {
        id: Uuid::new_v4(),
        title: "Half-done work".to_owned(),
        status: CardStatus::Review,
    });
    let update = CardUpdate {
        assignee: Some(AssigneeChange {
            to: Some(candidate_id),
        }),
        ..CardUpdate::default()
    };
    let ctx = UpdateContext {
        project_completed: true,
        candidate: Some(candidate),
        ..bare_context()
    };

    let plan = decide_update(&card, &update, &ctx, Utc::now()).expect("relaxed rule allows it");
    assert_eq!(plan.card.assignee_id, Some(candidate_id));
    assert!(plan.changed.assignee);
}

#[rstest]
fn unassigning_clears_the_worker_of_record() {
    let mut card = build_card(CardStatus::InProgress);
    card.assignee_id = Some(UserId::random());
    let update = CardUpdate {
        assignee: Some(AssigneeChange { to: None }),
        ..CardUpdate::default()
    };

    let plan = decide_update(&card, &update, &bare_context(), Utc::now()).expect("unassign");
    assert_eq!(plan.card.assignee_id, None);
    assert!(plan.changed.assignee);
    let assignment = plan.assignment.expect("assignment rewrite planned");
    assert_eq!(assignment.assignee, None);
}

#[rstest]
fn assignee_change_without_snapshot_is_an_internal_error(card: Card) {
    let update = CardUpdate {
        assignee: Some(AssigneeChange {
            to: Some(UserId::random()),
        }),
        ..CardUpdate::default()
    };

    let err = decide_update(&card, &update, &bare_context(), Utc::now())
        .expect_err("missing snapshot is a wiring bug");
    assert_eq!(err.code(), ErrorCode::InternalError);
}

#[rstest]
fn field_edits_apply_and_mark_fields_changed(card: Card) {
    let now = Utc::now();
    let update = CardUpdate {
        edit: Some(CardFieldEdit {
            title: Some("Ship it properly".to_owned()),
            priority: Some(CardPriority::High),
            deadline: Some(now + Duration::days(3)),
            ..CardFieldEdit::default()
        }),
        ..CardUpdate::default()
    };

    let plan = decide_update(&card, &update, &bare_context(), now).expect("edit succeeds");
    assert_eq!(plan.card.title, "Ship it properly");
    assert_eq!(plan.card.priority, CardPriority::High);
    assert_eq!(plan.card.deadline, Some(now + Duration::days(3)));
    assert_eq!(plan.card.updated_at, now);
    assert!(plan.changed.fields);
    assert!(!plan.changed.status);
    assert!(!plan.changed.assignee);
}
