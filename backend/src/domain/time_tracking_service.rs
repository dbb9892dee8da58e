//! Time tracking domain service.
//!
//! Thin orchestration over the transactional store: the start/stop
//! preconditions all live in the decision functions the store runs inside
//! its transaction. The service contributes timestamps and the post-commit
//! realtime events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::Error;
use super::events::{
    ChannelKey, EVENT_CARD_UPDATED, EVENT_TIMELOG_STARTED, EVENT_TIMELOG_STOPPED, OutboxEvent,
};
use super::ports::{
    EventPublisher, StartTimerCommand, StartTimerOutcome, StopTimerCommand, StopTimerOutcome,
    TimeLogRepository, TimeLogRepositoryError,
};
use super::user::Actor;

/// Map a time log repository failure into a domain error.
fn map_time_log_error(error: TimeLogRepositoryError) -> Error {
    match error {
        TimeLogRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("time log repository unavailable: {message}"))
        }
        TimeLogRepositoryError::Query { message } => {
            Error::internal(format!("time log repository error: {message}"))
        }
        TimeLogRepositoryError::Rejected { error } => error,
    }
}

/// Time tracking service.
pub struct TimeTrackingService<T, P> {
    time_log_repo: Arc<T>,
    publisher: Arc<P>,
    clock: Arc<dyn Clock>,
}

impl<T, P> Clone for TimeTrackingService<T, P> {
    fn clone(&self) -> Self {
        Self {
            time_log_repo: Arc::clone(&self.time_log_repo),
            publisher: Arc::clone(&self.publisher),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<T, P> TimeTrackingService<T, P> {
    /// Create a new service over its driven ports.
    pub fn new(time_log_repo: Arc<T>, publisher: Arc<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            time_log_repo,
            publisher,
            clock,
        }
    }
}

impl<T, P> TimeTrackingService<T, P>
where
    T: TimeLogRepository,
    P: EventPublisher,
{
    /// Start a timer against a card.
    ///
    /// On success the card is `IN_PROGRESS` under the caller and a running
    /// session row exists; both happened in one transaction.
    pub async fn start(&self, actor: Actor, card_id: Uuid) -> Result<StartTimerOutcome, Error> {
        let now = self.clock.utc();
        let outcome = self
            .time_log_repo
            .start(StartTimerCommand {
                card_id,
                user_id: actor.user_id,
                now,
            })
            .await
            .map_err(map_time_log_error)?;

        self.publish_started(&actor, &outcome, now).await;
        Ok(outcome)
    }

    /// Stop a running timer owned by the caller.
    pub async fn stop(&self, actor: Actor, time_log_id: Uuid) -> Result<StopTimerOutcome, Error> {
        let now = self.clock.utc();
        let outcome = self
            .time_log_repo
            .stop(StopTimerCommand {
                time_log_id,
                user_id: actor.user_id,
                now,
            })
            .await
            .map_err(map_time_log_error)?;

        let event = OutboxEvent::new(
            ChannelKey::Card(outcome.log.card_id),
            EVENT_TIMELOG_STOPPED,
            actor.user_id,
            now,
            json!({ "timeLog": outcome.log }),
        );
        if let Err(error) = self.publisher.publish(vec![event]).await {
            warn!(%error, time_log_id = %outcome.log.id, "timer stop event publish failed");
        }

        Ok(outcome)
    }

    async fn publish_started(&self, actor: &Actor, outcome: &StartTimerOutcome, at: DateTime<Utc>) {
        let events = vec![
            OutboxEvent::new(
                ChannelKey::Card(outcome.card.id),
                EVENT_TIMELOG_STARTED,
                actor.user_id,
                at,
                json!({ "timeLog": outcome.log, "card": outcome.card }),
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
            warn!(%error, card_id = %outcome.card.id, "timer start event publish failed");
        }
    }
}

#[cfg(test)]
#[path = "time_tracking_service_tests.rs"]
mod tests;
