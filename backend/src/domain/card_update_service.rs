//! Card update and delete domain service.
//!
//! Owns the lifecycle side of the engine: typed updates with their gating
//! preconditions, deletion with cascade, and the per-field notification
//! fan-out after commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::Error;
use super::assignment_service::{
    display_name_or_id, map_card_repository_error, map_membership_error,
};
use super::card::{Card, CardUpdate};
use super::events::{
    ChannelKey, EVENT_CARD_DELETED, EVENT_CARD_UPDATED, OutboxEvent,
};
use super::membership::{Capabilities, ProjectContext};
use super::ports::{
    CardRepository, DeletedCard, EventPublisher, MembershipRepository, NotificationGateway,
    NotificationKind, NotificationRequest, UpdateCardCommand, UpdateCardOutcome,
};
use super::user::{Actor, UserId};

/// Card lifecycle service.
pub struct CardUpdateService<C, M, P, N> {
    card_repo: Arc<C>,
    membership_repo: Arc<M>,
    publisher: Arc<P>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<C, M, P, N> Clone for CardUpdateService<C, M, P, N> {
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

impl<C, M, P, N> CardUpdateService<C, M, P, N> {
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

impl<C, M, P, N> CardUpdateService<C, M, P, N>
where
    C: CardRepository,
    M: MembershipRepository,
    P: EventPublisher,
    N: NotificationGateway,
{
    /// Apply a typed update to a card.
    ///
    /// Leader-grade callers may apply any command; the card's current
    /// assignee may apply a status-only update to their own card. The
    /// transactional store enforces the completion and exclusivity gates.
    pub async fn update(
        &self,
        actor: Actor,
        card_id: Uuid,
        update: CardUpdate,
    ) -> Result<UpdateCardOutcome, Error> {
        if update.is_empty() {
            return Err(Error::invalid_request("update contains no changes"));
        }

        let card = self.load_card(card_id).await?;
        let (context, capabilities) = self.capabilities_for(&actor, card.project_id).await?;
        let own_status_change = update.is_status_only()
            && capabilities.is_member
            && card.assignee_id == Some(actor.user_id);
        if !capabilities.can_edit_card && !own_status_change {
            return Err(Error::forbidden(
                "not permitted to change this card",
            ));
        }

        let now = self.clock.utc();
        let outcome = self
            .card_repo
            .update(UpdateCardCommand {
                card_id,
                update,
                acting_user: actor.user_id,
                acting_is_admin: actor.is_admin(),
                now,
            })
            .await
            .map_err(map_card_repository_error)?;

        self.publish_update_events(&actor, &outcome.card, now).await;
        self.notify_for_changes(&actor, &context, &outcome).await;

        Ok(outcome)
    }

    /// Delete a card, cascading its assignments, time logs, and approvals.
    pub async fn delete(&self, actor: Actor, card_id: Uuid) -> Result<DeletedCard, Error> {
        let card = self.load_card(card_id).await?;
        let (_, capabilities) = self.capabilities_for(&actor, card.project_id).await?;
        if !capabilities.can_delete_card {
            return Err(Error::forbidden(
                "only the project leader, creator, or an admin may delete cards",
            ));
        }

        let deleted = self
            .card_repo
            .delete(card_id)
            .await
            .map_err(map_card_repository_error)?;

        let now = self.clock.utc();
        let event = OutboxEvent::new(
            ChannelKey::Project(deleted.project_id),
            EVENT_CARD_DELETED,
            actor.user_id,
            now,
            json!({ "cardId": deleted.card_id, "title": deleted.title }),
        );
        if let Err(error) = self.publisher.publish(vec![event]).await {
            warn!(%error, card_id = %deleted.card_id, "delete event publish failed");
        }

        Ok(deleted)
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
    ) -> Result<(ProjectContext, Capabilities), Error> {
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
        let capabilities = Capabilities::evaluate(actor, &context, membership.as_ref());
        Ok((context, capabilities))
    }

    async fn publish_update_events(&self, actor: &Actor, card: &Card, at: DateTime<Utc>) {
        let data = json!({ "card": card });
        let events = vec![
            OutboxEvent::new(
                ChannelKey::Card(card.id),
                EVENT_CARD_UPDATED,
                actor.user_id,
                at,
                data.clone(),
            ),
            OutboxEvent::new(
                ChannelKey::Project(card.project_id),
                EVENT_CARD_UPDATED,
                actor.user_id,
                at,
                data,
            ),
        ];
        if let Err(error) = self.publisher.publish(events).await {
            warn!(%error, card_id = %card.id, "card update event publish failed");
        }
    }

    /// Fan notifications out based on which fields changed: a handover
    /// tells the new assignee, a completion tells the creator and leaders,
    /// anything else tells the current assignee.
    async fn notify_for_changes(
        &self,
        actor: &Actor,
        context: &ProjectContext,
        outcome: &UpdateCardOutcome,
    ) {
        let changed = outcome.changed;
        if changed.is_empty() {
            return;
        }

        let (kind, recipients) = if changed.completed {
            let mut recipients = vec![context.creator_id];
            match self.membership_repo.list_leaders(context.project_id).await {
                Ok(leaders) => recipients.extend(leaders),
                Err(error) => {
                    warn!(%error, project_id = %context.project_id, "leader lookup failed");
                }
            }
            (NotificationKind::CardCompleted, recipients)
        } else if changed.assignee {
            let Some(assignee) = outcome.card.assignee_id else {
                return;
            };
            (NotificationKind::CardAssigned, vec![assignee])
        } else {
            let Some(assignee) = outcome.card.assignee_id else {
                return;
            };
            (NotificationKind::CardUpdated, vec![assignee])
        };

        let recipients = dedup_recipients(recipients, actor.user_id);
        if recipients.is_empty() {
            return;
        }

        let acting_user_name = display_name_or_id(&*self.membership_repo, actor.user_id).await;
        let request = NotificationRequest {
            recipients,
            kind,
            card_id: outcome.card.id,
            title: outcome.card.title.clone(),
            acting_user_name,
            detail: None,
        };
        if let Err(error) = self.notifier.notify(request).await {
            warn!(%error, card_id = %outcome.card.id, "card update notification failed");
        }
    }
}

/// Deduplicate recipients and drop the acting user.
pub(super) fn dedup_recipients(recipients: Vec<UserId>, acting_user: UserId) -> Vec<UserId> {
    let mut seen = std::collections::HashSet::new();
    recipients
        .into_iter()
        .filter(|id| *id != acting_user && seen.insert(*id))
        .collect()
}

#[cfg(test)]
#[path = "card_update_service_tests.rs"]
mod tests;
