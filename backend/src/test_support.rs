//! In-memory port adapters for integration tests.
//!
//! [`InMemoryStore`] implements the engine's store ports over a single
//! mutex-guarded state, executing the same decision functions the Diesel
//! adapters run inside their transactions: one lock acquisition per
//! operation gives the same read-check-write atomicity. Recording doubles
//! capture broadcasts and notifications for assertions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Error as DomainError;
use crate::domain::assignment::{
    AssignmentPlan, BlockingCard, CandidateSnapshot, CardAssignment, decide_assign,
};
use crate::domain::card::{Card, CardPriority, CardStatus};
use crate::domain::events::OutboxEvent;
use crate::domain::membership::{ProjectContext, ProjectMember, ProjectRole};
use crate::domain::overtime::{ApprovalStatus, OvertimeApproval, decide_request, decide_resolve};
use crate::domain::ports::{
    AssignCardCommand, AssignCardOutcome, CardRepository, CardRepositoryError, DeletedCard,
    EventPublishError, EventPublisher, MembershipRepository, MembershipRepositoryError,
    NotificationGateway, NotificationGatewayError, NotificationRequest, OvertimeRepository,
    OvertimeRepositoryError, RequestOvertimeCommand, RequestOvertimeOutcome,
    ResolveOvertimeCommand, ResolveOvertimeOutcome, StartTimerCommand, StartTimerOutcome,
    StopTimerCommand, StopTimerOutcome, TimeLogRepository, TimeLogRepositoryError,
    UpdateCardCommand, UpdateCardOutcome,
};
use crate::domain::time_tracking::{StartSnapshot, TimeLog, close, decide_start, decide_stop};
use crate::domain::user::{GlobalRole, User, UserId};
use crate::domain::work_status::{UpdateContext, decide_update};

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    projects: HashMap<Uuid, ProjectContext>,
    members: Vec<ProjectMember>,
    cards: HashMap<Uuid, Card>,
    assignments: Vec<CardAssignment>,
    time_logs: HashMap<Uuid, TimeLog>,
    approvals: HashMap<Uuid, OvertimeApproval>,
}

/// In-memory store implementing every persistence port.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed a user and return their id.
    pub fn seed_user(&self, display_name: &str, global_role: GlobalRole) -> UserId {
        let id = UserId::random();
        self.lock().users.insert(
            id,
            User {
                id,
                display_name: display_name.to_owned(),
                global_role,
            },
        );
        id
    }

    /// Seed a project and return its id.
    pub fn seed_project(&self, creator_id: UserId, completed: bool) -> Uuid {
        let project_id = Uuid::new_v4();
        self.lock().projects.insert(
            project_id,
            ProjectContext {
                project_id,
                creator_id,
                completed,
            },
        );
        project_id
    }

    /// Seed a membership and return its row id.
    pub fn seed_member(&self, project_id: Uuid, user_id: UserId, role: ProjectRole) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().members.push(ProjectMember {
            id,
            project_id,
            user_id,
            role,
            joined_at: Utc::now(),
        });
        id
    }

    /// Seed a card and return its id.
    pub fn seed_card(&self, project_id: Uuid, title: &str, created_by: UserId) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.lock().cards.insert(
            id,
            Card {
                id,
                board_id: Uuid::new_v4(),
                project_id,
                title: title.to_owned(),
                description: None,
                priority: CardPriority::Medium,
                status: CardStatus::Todo,
                due_date: None,
                deadline: None,
                assignee_id: None,
                created_by,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Mutate a seeded card in place.
    pub fn with_card(&self, card_id: Uuid, mutate: impl FnOnce(&mut Card)) {
        if let Some(card) = self.lock().cards.get_mut(&card_id) {
            mutate(card);
        }
    }

    /// Read a card back.
    #[must_use]
    pub fn card(&self, card_id: Uuid) -> Option<Card> {
        self.lock().cards.get(&card_id).cloned()
    }

    /// Read a time log back.
    #[must_use]
    pub fn time_log(&self, log_id: Uuid) -> Option<TimeLog> {
        self.lock().time_logs.get(&log_id).cloned()
    }

    /// Active assignment rows for a card.
    #[must_use]
    pub fn active_assignments(&self, card_id: Uuid) -> Vec<CardAssignment> {
        self.lock()
            .assignments
            .iter()
            .filter(|a| a.card_id == card_id && a.is_active)
            .cloned()
            .collect()
    }

    /// All assignment rows for a card, oldest first.
    #[must_use]
    pub fn assignment_history(&self, card_id: Uuid) -> Vec<CardAssignment> {
        self.lock()
            .assignments
            .iter()
            .filter(|a| a.card_id == card_id)
            .cloned()
            .collect()
    }
}

fn blocking_cards(state: &State, project_id: Uuid, user: UserId, exclude: Uuid) -> Vec<BlockingCard> {
    state
        .assignments
        .iter()
        .filter(|a| a.is_active && a.assigned_to == user)
        .filter_map(|a| state.cards.get(&a.card_id))
        .filter(|card| {
            card.project_id == project_id && card.id != exclude && card.status != CardStatus::Done
        })
        .map(|card| BlockingCard {
            id: card.id,
            title: card.title.clone(),
            status: card.status,
        })
        .collect()
}

fn candidate_snapshot(
    state: &State,
    project_id: Uuid,
    user: UserId,
    exclude: Uuid,
) -> CandidateSnapshot {
    CandidateSnapshot {
        user_id: user,
        membership: state
            .members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user)
            .cloned(),
        blocking: blocking_cards(state, project_id, user, exclude),
    }
}

fn apply_assignment_plan(
    state: &mut State,
    card_id: Uuid,
    plan: &AssignmentPlan,
    assigned_by: UserId,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Option<CardAssignment> {
    for assignment in state
        .assignments
        .iter_mut()
        .filter(|a| a.card_id == card_id && a.is_active)
    {
        assignment.is_active = false;
        assignment.unassigned_at = Some(now);
    }

    let (Some(assignee), Some(project_member_id)) = (plan.assignee, plan.project_member_id) else {
        return None;
    };

    let assignment = CardAssignment {
        id: Uuid::new_v4(),
        card_id,
        assigned_to: assignee,
        assigned_by,
        project_member_id,
        reason: reason.map(str::to_owned),
        is_active: true,
        assigned_at: now,
        unassigned_at: None,
    };
    state.assignments.push(assignment.clone());
    Some(assignment)
}

#[async_trait]
impl CardRepository for InMemoryStore {
    async fn find_card(&self, card_id: Uuid) -> Result<Option<Card>, CardRepositoryError> {
        Ok(self.lock().cards.get(&card_id).cloned())
    }

    async fn assign(
        &self,
        command: AssignCardCommand,
    ) -> Result<AssignCardOutcome, CardRepositoryError> {
        let mut state = self.lock();
        let Some(card) = state.cards.get(&command.card_id).cloned() else {
            return Err(CardRepositoryError::rejected(DomainError::not_found(
                format!("card {} not found", command.card_id),
            )));
        };

        let candidate = command
            .assignee
            .map(|user| candidate_snapshot(&state, card.project_id, user, card.id));

        let plan = decide_assign(&card, candidate.as_ref(), command.acting_is_admin)
            .map_err(CardRepositoryError::rejected)?;

        let assignment = apply_assignment_plan(
            &mut state,
            card.id,
            &plan,
            command.acting_user,
            command.reason.as_deref(),
            command.now,
        );

        let reopened = plan.new_status.is_some();
        let card = {
            let card = state
                .cards
                .get_mut(&command.card_id)
                .unwrap_or_else(|| unreachable!("card existed above"));
            card.assignee_id = plan.assignee;
            if let Some(status) = plan.new_status {
                card.status = status;
            }
            card.updated_at = command.now;
            card.clone()
        };

        Ok(AssignCardOutcome {
            card,
            assignment,
            reopened,
        })
    }

    async fn update(
        &self,
        command: UpdateCardCommand,
    ) -> Result<UpdateCardOutcome, CardRepositoryError> {
        let mut state = self.lock();
        let Some(card) = state.cards.get(&command.card_id).cloned() else {
            return Err(CardRepositoryError::rejected(DomainError::not_found(
                format!("card {} not found", command.card_id),
            )));
        };

        let project_completed = state
            .projects
            .get(&card.project_id)
            .is_some_and(|p| p.completed);
        let time_log_count = i64::try_from(
            state
                .time_logs
                .values()
                .filter(|log| log.card_id == card.id)
                .count(),
        )
        .unwrap_or(i64::MAX);
        let candidate = command
            .update
            .assignee
            .and_then(|change| change.to)
            .map(|user| candidate_snapshot(&state, card.project_id, user, card.id));

        let ctx = UpdateContext {
            time_log_count,
            project_completed,
            acting_is_admin: command.acting_is_admin,
            candidate,
        };
        let plan = decide_update(&card, &command.update, &ctx, command.now)
            .map_err(CardRepositoryError::rejected)?;

        if let Some(assignment) = &plan.assignment {
            apply_assignment_plan(
                &mut state,
                card.id,
                assignment,
                command.acting_user,
                None,
                command.now,
            );
        }
        state.cards.insert(card.id, plan.card.clone());

        Ok(UpdateCardOutcome {
            card: plan.card,
            changed: plan.changed,
        })
    }

    async fn delete(&self, card_id: Uuid) -> Result<DeletedCard, CardRepositoryError> {
        let mut state = self.lock();
        let Some(card) = state.cards.remove(&card_id) else {
            return Err(CardRepositoryError::rejected(DomainError::not_found(
                format!("card {card_id} not found"),
            )));
        };

        state.assignments.retain(|a| a.card_id != card_id);
        state.time_logs.retain(|_, log| log.card_id != card_id);
        state.approvals.retain(|_, a| a.card_id != card_id);

        Ok(DeletedCard {
            card_id,
            project_id: card.project_id,
            title: card.title,
        })
    }
}

#[async_trait]
impl TimeLogRepository for InMemoryStore {
    async fn start(
        &self,
        command: StartTimerCommand,
    ) -> Result<StartTimerOutcome, TimeLogRepositoryError> {
        let mut state = self.lock();
        let Some(card) = state.cards.get(&command.card_id).cloned() else {
            return Err(TimeLogRepositoryError::rejected(DomainError::not_found(
                format!("card {} not found", command.card_id),
            )));
        };

        let snapshot = StartSnapshot {
            user_id: command.user_id,
            membership: state
                .members
                .iter()
                .find(|m| m.project_id == card.project_id && m.user_id == command.user_id)
                .cloned(),
            has_open_log: state
                .time_logs
                .values()
                .any(|log| log.user_id == command.user_id && log.is_running()),
            other_assignments: blocking_cards(&state, card.project_id, command.user_id, card.id),
        };

        let plan = decide_start(&card, &snapshot, command.now)
            .map_err(TimeLogRepositoryError::rejected)?;

        let claimed = plan.claim.is_some();
        if let Some(claim) = &plan.claim {
            apply_assignment_plan(
                &mut state,
                card.id,
                claim,
                command.user_id,
                Some("timer-start"),
                command.now,
            );
        }

        let log = TimeLog {
            id: Uuid::new_v4(),
            card_id: plan.log.card_id,
            user_id: plan.log.user_id,
            start_time: plan.log.start_time,
            end_time: None,
            duration_minutes: None,
        };
        state.time_logs.insert(log.id, log.clone());

        let card = {
            let card = state
                .cards
                .get_mut(&command.card_id)
                .unwrap_or_else(|| unreachable!("card existed above"));
            card.status = CardStatus::InProgress;
            card.assignee_id = Some(command.user_id);
            card.updated_at = command.now;
            card.clone()
        };

        Ok(StartTimerOutcome { log, card, claimed })
    }

    async fn stop(
        &self,
        command: StopTimerCommand,
    ) -> Result<StopTimerOutcome, TimeLogRepositoryError> {
        let mut state = self.lock();
        let Some(log) = state.time_logs.get(&command.time_log_id).cloned() else {
            return Err(TimeLogRepositoryError::rejected(DomainError::not_found(
                format!("time log {} not found", command.time_log_id),
            )));
        };

        decide_stop(&log, command.user_id).map_err(TimeLogRepositoryError::rejected)?;
        let closed = close(&log, command.now);
        state.time_logs.insert(closed.id, closed.clone());

        let project_id = state
            .cards
            .get(&closed.card_id)
            .map(|card| card.project_id)
            .unwrap_or_default();

        Ok(StopTimerOutcome {
            log: closed,
            project_id,
        })
    }
}

#[async_trait]
impl OvertimeRepository for InMemoryStore {
    async fn find_project_of_approval(
        &self,
        approval_id: Uuid,
    ) -> Result<Option<Uuid>, OvertimeRepositoryError> {
        let state = self.lock();
        Ok(state
            .approvals
            .get(&approval_id)
            .and_then(|approval| state.cards.get(&approval.card_id))
            .map(|card| card.project_id))
    }

    async fn request(
        &self,
        command: RequestOvertimeCommand,
    ) -> Result<RequestOvertimeOutcome, OvertimeRepositoryError> {
        let mut state = self.lock();
        let Some(card) = state.cards.get(&command.card_id).cloned() else {
            return Err(OvertimeRepositoryError::rejected(DomainError::not_found(
                format!("card {} not found", command.card_id),
            )));
        };

        let has_pending = state.approvals.values().any(|a| {
            a.card_id == command.card_id
                && a.requested_by == command.requested_by
                && a.status == ApprovalStatus::Pending
        });

        let new_request = decide_request(
            &card,
            command.requested_by,
            &command.reason,
            has_pending,
            command.now,
        )
        .map_err(OvertimeRepositoryError::rejected)?;

        let approval = OvertimeApproval {
            id: Uuid::new_v4(),
            card_id: new_request.card_id,
            requested_by: new_request.requested_by,
            reason: new_request.reason,
            days_overdue: new_request.days_overdue,
            status: ApprovalStatus::Pending,
            requested_at: new_request.requested_at,
            approver_id: None,
            approver_notes: None,
            responded_at: None,
        };
        state.approvals.insert(approval.id, approval.clone());

        Ok(RequestOvertimeOutcome {
            approval,
            project_id: card.project_id,
            card_title: card.title,
        })
    }

    async fn resolve(
        &self,
        command: ResolveOvertimeCommand,
    ) -> Result<ResolveOvertimeOutcome, OvertimeRepositoryError> {
        let mut state = self.lock();
        let Some(approval) = state.approvals.get(&command.approval_id).cloned() else {
            return Err(OvertimeRepositoryError::rejected(DomainError::not_found(
                format!("overtime request {} not found", command.approval_id),
            )));
        };

        let resolved = decide_resolve(
            &approval,
            command.action,
            command.acting_user,
            command.notes.as_deref(),
            command.now,
        )
        .map_err(OvertimeRepositoryError::rejected)?;
        state.approvals.insert(resolved.id, resolved.clone());

        let (project_id, card_title) = state
            .cards
            .get(&resolved.card_id)
            .map(|card| (card.project_id, card.title.clone()))
            .unwrap_or_default();

        Ok(ResolveOvertimeOutcome {
            approval: resolved,
            project_id,
            card_title,
        })
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn project_context(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectContext>, MembershipRepositoryError> {
        Ok(self.lock().projects.get(&project_id).cloned())
    }

    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: UserId,
    ) -> Result<Option<ProjectMember>, MembershipRepositoryError> {
        Ok(self
            .lock()
            .members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_leaders(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<UserId>, MembershipRepositoryError> {
        Ok(self
            .lock()
            .members
            .iter()
            .filter(|m| m.project_id == project_id && m.role == ProjectRole::Leader)
            .map(|m| m.user_id)
            .collect())
    }

    async fn display_name(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, MembershipRepositoryError> {
        Ok(self
            .lock()
            .users
            .get(&user_id)
            .map(|user| user.display_name.clone()))
    }
}

/// Event publisher recording everything it is handed.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OutboxEvent>>,
}

impl RecordingPublisher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<OutboxEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, events: Vec<OutboxEvent>) -> Result<(), EventPublishError> {
        match self.events.lock() {
            Ok(mut guard) => guard.extend(events),
            Err(mut poisoned) => poisoned.get_mut().extend(events),
        }
        Ok(())
    }
}

/// Notification gateway recording every fan-out.
#[derive(Default)]
pub struct RecordingNotifier {
    requests: Mutex<Vec<NotificationRequest>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything notified so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<NotificationRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationGatewayError> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(mut poisoned) => poisoned.get_mut().push(request),
        }
        Ok(())
    }
}
