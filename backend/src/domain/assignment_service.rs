//! Assignment domain service.
//!
//! Authorizes the caller, drives the transactional assign operation, then
//! emits realtime events and the assignee notification after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::Error;
use super::card::Card;
use super::events::{ChannelKey, EVENT_CARD_ASSIGNED, EVENT_CARD_UPDATED, OutboxEvent};
use super::membership::Capabilities;
use super::ports::{
    AssignCardCommand, AssignCardOutcome, CardRepository, CardRepositoryError, EventPublisher,
    MembershipRepository, MembershipRepositoryError, NotificationGateway, NotificationKind,
    NotificationRequest,
};
use super::user::{Actor, UserId};

/// Inbound request to assign, reassign, or unassign a card.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignCardRequest {
    /// Card to (re)assign.
    pub card_id: Uuid,
    /// New worker of record, `None` to unassign.
    pub assignee: Option<UserId>,
    /// Free-form justification recorded on the assignment row.
    pub reason: Option<String>,
}

/// Assignment service: the single entry point for changing a card's worker
/// of record directly.
pub struct AssignmentService<C, M, P, N> {
    card_repo: Arc<C>,
    membership_repo: Arc<M>,
    publisher: Arc<P>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<C, M, P, N> Clone for AssignmentService<C, M, P, N> {
    fn clone(&self) -> Self {
        Self {
            card_repo: Arc::clone(&self.card_repo),
            membership_repo: Arc::clone(&self.membership_repo),
            publisher: Arc::clone(&self.publisher),
            notifier: Arc::clone(&self.notifier),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Map a card repository failure into a domain error.
pub(super) fn map_card_repository_error(error: CardRepositoryError) -> Error {
    match error {
        CardRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("card repository unavailable: {message}"))
        }
        CardRepositoryError::Query { message } => {
            Error::internal(format!("card repository error: {message}"))
        }
        CardRepositoryError::Rejected { error } => error,
    }
}

/// Map a membership repository failure into a domain error.
pub(super) fn map_membership_error(error: MembershipRepositoryError) -> Error {
    match error {
        MembershipRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("membership repository unavailable: {message}"))
        }
        MembershipRepositoryError::Query { message } => {
            Error::internal(format!("membership repository error: {message}"))
        }
    }
}

impl<C, M, P, N> AssignmentService<C, M, P, N> {
    /// Create a new service over its driven ports.
    pub fn new(
        card_repo: Arc<C>,
        membership_repo: Arc<M>,
        publisher: Arc<P>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            card_repo,
            membership_repo,
            publisher,
            notifier,
            clock,
        }
    }
}

impl<C, M, P, N> AssignmentService<C, M, P, N>
where
    C: CardRepository,
    M: MembershipRepository,
    P: EventPublisher,
    N: NotificationGateway,
{
    /// Assign, reassign, or unassign a card.
    ///
    /// Requires leader-grade capabilities in the card's project. The
    /// transactional store enforces candidate eligibility and the
    /// one-task-per-user rule; this method wraps it with authorization and
    /// post-commit fan-out.
    pub async fn assign(
        &self,
        actor: Actor,
        request: AssignCardRequest,
    ) -> Result<AssignCardOutcome, Error> {
        let card = self.load_card(request.card_id).await?;
        let capabilities = self.capabilities_for(&actor, card.project_id).await?;
        if !capabilities.can_assign {
            return Err(Error::forbidden(
                "only the project leader, creator, or an admin may assign cards",
            ));
        }

        let now = self.clock.utc();
        let outcome = self
            .card_repo
            .assign(AssignCardCommand {
                card_id: request.card_id,
                assignee: request.assignee,
                acting_user: actor.user_id,
                acting_is_admin: actor.is_admin(),
                reason: request.reason,
                now,
            })
            .await
            .map_err(map_card_repository_error)?;

        self.publish_assignment_events(&actor, &outcome, now).await;
        self.notify_new_assignee(&actor, &outcome).await;

        Ok(outcome)
    }

    async fn load_card(&self, card_id: Uuid) -> Result<Card, Error> {
        self.card_repo
            .find_card(card_id)
            .await
            .map_err(map_card_repository_error)?
            .ok_or_else(|| Error::not_found(format!("card {card_id} not found")))
    }

    async fn capabilities_for(
        &self,
        actor: &Actor,
        project_id: Uuid,
    ) -> Result<Capabilities, Error> {
        let context = self
            .membership_repo
            .project_context(project_id)
            .await
            .map_err(map_membership_error)?
            .ok_or_else(|| Error::internal(format!("project {project_id} missing for card")))?;
        let membership = self
            .membership_repo
            .find_membership(project_id, actor.user_id)
            .await
            .map_err(map_membership_error)?;
        Ok(Capabilities::evaluate(actor, &context, membership.as_ref()))
    }

    async fn publish_assignment_events(
        &self,
        actor: &Actor,
        outcome: &AssignCardOutcome,
        at: DateTime<Utc>,
    ) {
        let card_data = json!({
            "card": outcome.card,
            "assignment": outcome.assignment,
            "reopened": outcome.reopened,
        });
        let events = vec![
            OutboxEvent::new(
                ChannelKey::Card(outcome.card.id),
                EVENT_CARD_ASSIGNED,
                actor.user_id,
                at,
                card_data,
            ),
            OutboxEvent::new(
                ChannelKey::Project(outcome.card.project_id),
                EVENT_CARD_UPDATED,
                actor.user_id,
                at,
                json!({ "card": outcome.card }),
            ),
        ];
        if let Err(error) = self.publisher.publish(events).await {
            warn!(%error, card_id = %outcome.card.id, "assignment event publish failed");
        }
    }

    async fn notify_new_assignee(&self, actor: &Actor, outcome: &AssignCardOutcome) {
        let Some(assignment) = &outcome.assignment else {
            return;
        };
        if assignment.assigned_to == actor.user_id {
            return;
        }

        let acting_user_name = display_name_or_id(&*self.membership_repo, actor.user_id).await;
        let request = NotificationRequest {
            recipients: vec![assignment.assigned_to],
            kind: NotificationKind::CardAssigned,
            card_id: outcome.card.id,
            title: outcome.card.title.clone(),
            acting_user_name,
            detail: assignment.reason.clone(),
        };
        if let Err(error) = self.notifier.notify(request).await {
            warn!(%error, card_id = %outcome.card.id, "assignment notification failed");
        }
    }
}

/// Resolve a display name, falling back to the raw identifier.
pub(super) async fn display_name_or_id<M: MembershipRepository>(
    membership_repo: &M,
    user_id: UserId,
) -> String {
    match membership_repo.display_name(user_id).await {
        Ok(Some(name)) => name,
        Ok(None) => user_id.to_string(),
        Err(error) => {
            warn!(%error, %user_id, "display name lookup failed");
            user_id.to_string()
        }
    }
}

#[cfg(test)]
#[path = "assignment_service_tests.rs"]
mod tests;
