//! Regression coverage for the overtime approval service.

use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use rstest::rstest;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::membership::{ProjectContext, ProjectMember, ProjectRole};
use crate::domain::overtime::{ApprovalStatus, OvertimeApproval};
use crate::domain::ports::{
    MockMembershipRepository, MockNotificationGateway, MockOvertimeRepository,
    OvertimeRepositoryError,
};
use crate::domain::user::{GlobalRole, UserId};

struct FixtureClock(DateTime<Utc>);

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn pending_approval(card_id: Uuid, requested_by: UserId) -> OvertimeApproval {
    OvertimeApproval {
        id: Uuid::new_v4(),
        card_id,
        requested_by,
        reason: "blocked on review".to_owned(),
        days_overdue: 3,
        status: ApprovalStatus::Pending,
        requested_at: Utc::now(),
        approver_id: None,
        approver_notes: None,
        responded_at: None,
    }
}

fn service_with(
    overtime_repo: MockOvertimeRepository,
    membership_repo: MockMembershipRepository,
    notifier: MockNotificationGateway,
) -> OvertimeService<MockOvertimeRepository, MockMembershipRepository, MockNotificationGateway> {
    OvertimeService::new(
        Arc::new(overtime_repo),
        Arc::new(membership_repo),
        Arc::new(notifier),
        Arc::new(FixtureClock(Utc::now())),
    )
}

#[rstest]
#[tokio::test]
async fn request_notifies_the_creator_and_leaders_once_each() {
    let requester = UserId::random();
    let actor = Actor {
        user_id: requester,
        global_role: GlobalRole::Member,
    };
    let creator = UserId::random();
    let leader = UserId::random();
    let project_id = Uuid::new_v4();
    let card_id = Uuid::new_v4();
    let approval = pending_approval(card_id, requester);

    let mut overtime_repo = MockOvertimeRepository::new();
    {
        let approval = approval.clone();
        overtime_repo
            .expect_request()
            .withf(move |command| {
                command.card_id == card_id && command.requested_by == requester
            })
            .times(1)
            .return_once(move |_| {
                Ok(RequestOvertimeOutcome {
                    approval,
                    project_id,
                    card_title: "Ship the release".to_owned(),
                })
            });
    }

    let mut membership_repo = MockMembershipRepository::new();
    membership_repo
        .expect_project_context()
        .return_once(move |_| {
            Ok(Some(ProjectContext {
                project_id,
                creator_id: creator,
                completed: false,
            }))
        });
    membership_repo
        .expect_list_leaders()
        // The creator also holds the leader role; fan-out must dedupe.
        .return_once(move |_| Ok(vec![leader, creator]));
    membership_repo
        .expect_display_name()
        .return_once(|_| Ok(Some("Devin".to_owned())));

    let mut notifier = MockNotificationGateway::new();
    notifier
        .expect_notify()
        .withf(move |request| {
            request.kind == NotificationKind::OvertimeRequested
                && request.recipients == vec![creator, leader]
                && request
                    .detail
                    .as_deref()
                    .is_some_and(|detail| detail.contains("3 day(s) overdue"))
        })
        .times(1)
        .return_once(|_| Ok(()));

    let service = service_with(overtime_repo, membership_repo, notifier);
    let outcome = service
        .request(actor, card_id, "blocked on review".to_owned())
        .await
        .expect("request succeeds");
    assert_eq!(outcome.approval.status, ApprovalStatus::Pending);
    assert_eq!(outcome.approval.days_overdue, 3);
}

#[rstest]
#[tokio::test]
async fn request_surfaces_a_store_rejection() {
    let actor = Actor {
        user_id: UserId::random(),
        global_role: GlobalRole::Member,
    };
    let mut overtime_repo = MockOvertimeRepository::new();
    overtime_repo.expect_request().return_once(|_| {
        Err(OvertimeRepositoryError::rejected(
            crate::domain::Error::invalid_state("card deadline has not passed yet"),
        ))
    });

    let service = service_with(
        overtime_repo,
        MockMembershipRepository::new(),
        MockNotificationGateway::new(),
    );
    let err = service
        .request(actor, Uuid::new_v4(), "late".to_owned())
        .await
        .expect_err("rejection propagates");
    assert_eq!(err.code(), ErrorCode::InvalidState);
}

#[rstest]
#[tokio::test]
async fn resolve_requires_leader_grade_capabilities() {
    let actor = Actor {
        user_id: UserId::random(),
        global_role: GlobalRole::Member,
    };
    let project_id = Uuid::new_v4();

    let mut overtime_repo = MockOvertimeRepository::new();
    overtime_repo
        .expect_find_project_of_approval()
        .return_once(move |_| Ok(Some(project_id)));
    overtime_repo.expect_resolve().times(0);

    let mut membership_repo = MockMembershipRepository::new();
    membership_repo
        .expect_project_context()
        .return_once(move |_| {
            Ok(Some(ProjectContext {
                project_id,
                creator_id: UserId::random(),
                completed: false,
            }))
        });
    membership_repo
        .expect_find_membership()
        .return_once(|_, _| Ok(None));

    let service = service_with(
        overtime_repo,
        membership_repo,
        MockNotificationGateway::new(),
    );
    let err = service
        .resolve(
            actor,
            Uuid::new_v4(),
            ApprovalAction::Approve,
            None,
        )
        .await
        .expect_err("plain member may not resolve");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn resolve_fails_for_an_unknown_approval() {
    let actor = Actor {
        user_id: UserId::random(),
        global_role: GlobalRole::Admin,
    };
    let mut overtime_repo = MockOvertimeRepository::new();
    overtime_repo
        .expect_find_project_of_approval()
        .return_once(|_| Ok(None));

    let service = service_with(
        overtime_repo,
        MockMembershipRepository::new(),
        MockNotificationGateway::new(),
    );
    let err = service
        .resolve(actor, Uuid::new_v4(), ApprovalAction::Reject, None)
        .await
        .expect_err("unknown approval fails");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn a_leader_resolution_notifies_the_requester() {
    let leader_id = UserId::random();
    let actor = Actor {
        user_id: leader_id,
        global_role: GlobalRole::Leader,
    };
    let requester = UserId::random();
    let project_id = Uuid::new_v4();
    let card_id = Uuid::new_v4();
    let approval_id = Uuid::new_v4();

    let mut resolved = pending_approval(card_id, requester);
    resolved.id = approval_id;
    resolved.status = ApprovalStatus::Rejected;
    resolved.approver_id = Some(leader_id);
    resolved.approver_notes = Some("reassign instead".to_owned());
    resolved.responded_at = Some(Utc::now());

    let mut overtime_repo = MockOvertimeRepository::new();
    overtime_repo
        .expect_find_project_of_approval()
        .return_once(move |_| Ok(Some(project_id)));
    {
        let resolved = resolved.clone();
        overtime_repo
            .expect_resolve()
            .withf(move |command| {
                command.approval_id == approval_id
                    && command.action == ApprovalAction::Reject
                    && command.notes.as_deref() == Some("reassign instead")
            })
            .times(1)
            .return_once(move |_| {
                Ok(ResolveOvertimeOutcome {
                    approval: resolved,
                    project_id,
                    card_title: "Ship the release".to_owned(),
                })
            });
    }

    let mut membership_repo = MockMembershipRepository::new();
    membership_repo
        .expect_project_context()
        .return_once(move |_| {
            Ok(Some(ProjectContext {
                project_id,
                creator_id: UserId::random(),
                completed: false,
            }))
        });
    membership_repo.expect_find_membership().return_once(move |_, _| {
        Ok(Some(ProjectMember {
            id: Uuid::new_v4(),
            project_id,
            user_id: leader_id,
            role: ProjectRole::Leader,
            joined_at: Utc::now(),
        }))
    });
    membership_repo
        .expect_display_name()
        .return_once(|_| Ok(Some("Lena".to_owned())));

    let mut notifier = MockNotificationGateway::new();
    notifier
        .expect_notify()
        .withf(move |request| {
            request.kind == NotificationKind::OvertimeResolved
                && request.recipients == vec![requester]
                && request
                    .detail
                    .as_deref()
                    .is_some_and(|detail| detail.starts_with("REJECTED"))
        })
        .times(1)
        .return_once(|_| Ok(()));

    let service = service_with(overtime_repo, membership_repo, notifier);
    let outcome = service
        .resolve(
            actor,
            approval_id,
            ApprovalAction::Reject,
            Some("reassign instead".to_owned()),
        )
        .await
        .expect("resolution succeeds");
    assert_eq!(outcome.approval.status, ApprovalStatus::Rejected);
    assert_eq!(outcome.approval.approver_id, Some(leader_id));
}
