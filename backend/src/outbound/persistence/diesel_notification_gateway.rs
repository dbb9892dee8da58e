//! PostgreSQL-backed `NotificationGateway` implementation.
//!
//! Persists one notification row per recipient, then appends the same
//! payload to each recipient's history channel. Delivery channels beyond
//! that (push, email) are someone else's job.

use std::sync::Arc;

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::events::{ChannelKey, EVENT_NOTIFICATION, OutboxEvent};
use crate::domain::ports::{
    EventPublisher, NotificationGateway, NotificationGatewayError, NotificationRequest,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::NewNotificationRow;
use super::pool::DbPool;
use super::schema::notifications;

/// Diesel-backed implementation of the notification gateway port.
#[derive(Clone)]
pub struct DieselNotificationGateway<P> {
    pool: DbPool,
    publisher: Arc<P>,
}

impl<P> DieselNotificationGateway<P> {
    /// Create a new gateway with the given pool and broadcast publisher.
    pub const fn new(pool: DbPool, publisher: Arc<P>) -> Self {
        Self { pool, publisher }
    }
}

fn connection_error(error: super::pool::PoolError) -> NotificationGatewayError {
    map_pool_error(error, NotificationGatewayError::unavailable)
}

fn query_error(error: diesel::result::Error) -> NotificationGatewayError {
    map_diesel_error(error, NotificationGatewayError::query)
}

#[async_trait]
impl<P> NotificationGateway for DieselNotificationGateway<P>
where
    P: EventPublisher,
{
    async fn notify(&self, request: NotificationRequest) -> Result<(), NotificationGatewayError> {
        if request.recipients.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let rows: Vec<NewNotificationRow<'_>> = request
            .recipients
            .iter()
            .map(|recipient| NewNotificationRow {
                id: Uuid::new_v4(),
                recipient_id: *recipient.as_uuid(),
                kind: request.kind.as_str(),
                card_id: request.card_id,
                title: &request.title,
                acting_user_name: &request.acting_user_name,
                detail: request.detail.as_deref(),
            })
            .collect();

        diesel::insert_into(notifications::table)
            .values(&rows)
            .execute(&mut conn)
            .await
            .map_err(query_error)?;

        let events: Vec<OutboxEvent> = request
            .recipients
            .iter()
            .map(|recipient| OutboxEvent {
                channel: ChannelKey::User(*recipient),
                name: EVENT_NOTIFICATION,
                payload: json!({
                    "event": EVENT_NOTIFICATION,
                    "kind": request.kind,
                    "cardId": request.card_id,
                    "title": request.title,
                    "actingUserName": request.acting_user_name,
                    "detail": request.detail,
                    "nonce": Uuid::new_v4(),
                }),
            })
            .collect();
        if let Err(error) = self.publisher.publish(events).await {
            // Rows are committed; history channels catch up on reconnect.
            warn!(%error, "notification broadcast failed");
        }

        Ok(())
    }
}
