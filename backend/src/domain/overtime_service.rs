//! Overtime approval domain service.
//!
//! Files and resolves overtime requests, notifying the leadership on
//! request and the requester on resolution. The workflow is advisory: a
//! resolution changes nothing outside the approval row and the
//! notification trail.

use std::sync::Arc;

use mockable::Clock;
use tracing::warn;
use uuid::Uuid;

use super::Error;
use super::assignment_service::{display_name_or_id, map_membership_error};
use super::card_update_service::dedup_recipients;
use super::membership::Capabilities;
use super::overtime::ApprovalAction;
use super::ports::{
    MembershipRepository, NotificationGateway, NotificationKind, NotificationRequest,
    OvertimeRepository, OvertimeRepositoryError, RequestOvertimeCommand, RequestOvertimeOutcome,
    ResolveOvertimeCommand, ResolveOvertimeOutcome,
};
use super::user::Actor;

/// Map an overtime repository failure into a domain error.
fn map_overtime_error(error: OvertimeRepositoryError) -> Error {
    match error {
        OvertimeRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("overtime repository unavailable: {message}"))
        }
        OvertimeRepositoryError::Query { message } => {
            Error::internal(format!("overtime repository error: {message}"))
        }
        OvertimeRepositoryError::Rejected { error } => error,
    }
}

/// Overtime approval service.
pub struct OvertimeService<O, M, N> {
    overtime_repo: Arc<O>,
    membership_repo: Arc<M>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<O, M, N> Clone for OvertimeService<O, M, N> {
    fn clone(&self) -> Self {
        Self {
            overtime_repo: Arc::clone(&self.overtime_repo),
            membership_repo: Arc::clone(&self.membership_repo),
            notifier: Arc::clone(&self.notifier),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<O, M, N> OvertimeService<O, M, N> {
    /// Create a new service over its driven ports.
    pub fn new(
        overtime_repo: Arc<O>,
        membership_repo: Arc<M>,
        notifier: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            overtime_repo,
            membership_repo,
            notifier,
            clock,
        }
    }
}

impl<O, M, N> OvertimeService<O, M, N>
where
    O: OvertimeRepository,
    M: MembershipRepository,
    N: NotificationGateway,
{
    /// File an overtime request for a card the caller is assigned to.
    ///
    /// The transactional store enforces the assignee, deadline, overdue,
    /// and single-pending rules; on success the project creator and
    /// leaders are notified.
    pub async fn request(
        &self,
        actor: Actor,
        card_id: Uuid,
        reason: String,
    ) -> Result<RequestOvertimeOutcome, Error> {
        let now = self.clock.utc();
        let outcome = self
            .overtime_repo
            .request(RequestOvertimeCommand {
                card_id,
                requested_by: actor.user_id,
                reason,
                now,
            })
            .await
            .map_err(map_overtime_error)?;

        self.notify_leadership(&actor, &outcome).await;
        Ok(outcome)
    }

    /// Resolve a pending overtime request.
    ///
    /// Requires leader-grade capabilities in the request's project; the
    /// original requester is notified of the outcome.
    pub async fn resolve(
        &self,
        actor: Actor,
        approval_id: Uuid,
        action: ApprovalAction,
        notes: Option<String>,
    ) -> Result<ResolveOvertimeOutcome, Error> {
        let project_id = self
            .overtime_repo
            .find_project_of_approval(approval_id)
            .await
            .map_err(map_overtime_error)?
            .ok_or_else(|| Error::not_found(format!("overtime request {approval_id} not found")))?;

        let capabilities = self.capabilities_for(&actor, project_id).await?;
        if !capabilities.can_manage_approvals {
            return Err(Error::forbidden(
                "only the project leader, creator, or an admin may resolve overtime requests",
            ));
        }

        let now = self.clock.utc();
        let outcome = self
            .overtime_repo
            .resolve(ResolveOvertimeCommand {
                approval_id,
                action,
                acting_user: actor.user_id,
                notes,
                now,
            })
            .await
            .map_err(map_overtime_error)?;

        self.notify_requester(&actor, &outcome).await;
        Ok(outcome)
    }

    async fn capabilities_for(&self, actor: &Actor, project_id: Uuid) -> Result<Capabilities, Error> {
        let context = self
            .membership_repo
            .project_context(project_id)
            .await
            .map_err(map_membership_error)?
            .ok_or_else(|| Error::internal(format!("project {project_id} missing for approval")))?;
        let membership = self
            .membership_repo
            .find_membership(project_id, actor.user_id)
            .await
            .map_err(map_membership_error)?;
        Ok(Capabilities::evaluate(actor, &context, membership.as_ref()))
    }

    async fn notify_leadership(&self, actor: &Actor, outcome: &RequestOvertimeOutcome) {
        let mut recipients = Vec::new();
        match self
            .membership_repo
            .project_context(outcome.project_id)
            .await
        {
            Ok(Some(context)) => recipients.push(context.creator_id),
            Ok(None) => {}
            Err(error) => {
                warn!(%error, project_id = %outcome.project_id, "project lookup failed");
            }
        }
        match self.membership_repo.list_leaders(outcome.project_id).await {
            Ok(leaders) => recipients.extend(leaders),
            Err(error) => {
                warn!(%error, project_id = %outcome.project_id, "leader lookup failed");
            }
        }

        let recipients = dedup_recipients(recipients, actor.user_id);
        if recipients.is_empty() {
            return;
        }

        let acting_user_name = display_name_or_id(&*self.membership_repo, actor.user_id).await;
        let request = NotificationRequest {
            recipients,
            kind: NotificationKind::OvertimeRequested,
            card_id: outcome.approval.card_id,
            title: outcome.card_title.clone(),
            acting_user_name,
            detail: Some(format!(
                "{} day(s) overdue: {}",
                outcome.approval.days_overdue, outcome.approval.reason
            )),
        };
        if let Err(error) = self.notifier.notify(request).await {
            warn!(%error, card_id = %outcome.approval.card_id, "overtime request notification failed");
        }
    }

    async fn notify_requester(&self, actor: &Actor, outcome: &ResolveOvertimeOutcome) {
        let recipients = dedup_recipients(vec![outcome.approval.requested_by], actor.user_id);
        if recipients.is_empty() {
            return;
        }

        let acting_user_name = display_name_or_id(&*self.membership_repo, actor.user_id).await;
        let detail = match &outcome.approval.approver_notes {
            Some(notes) => format!("{}: {notes}", outcome.approval.status.as_str()),
            None => outcome.approval.status.as_str().to_owned(),
        };
        let request = NotificationRequest {
            recipients,
            kind: NotificationKind::OvertimeResolved,
            card_id: outcome.approval.card_id,
            title: outcome.card_title.clone(),
            acting_user_name,
            detail: Some(detail),
        };
        if let Err(error) = self.notifier.notify(request).await {
            warn!(%error, card_id = %outcome.approval.card_id, "overtime resolution notification failed");
        }
    }
}

#[cfg(test)]
#[path = "overtime_service_tests.rs"]
mod tests;
