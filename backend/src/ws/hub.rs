//! In-process broadcast hub implementing the event publisher port.
//!
//! Channels come in two flavours: live-state channels retain the latest
//! payload per event name (publishing overwrites), user channels append a
//! bounded history. Subscribers receive the retained state on entry, so a
//! late joiner converges without a full reload.

use std::collections::HashMap;
use std::sync::Mutex;

use actix::Recipient;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::domain::events::OutboxEvent;
use crate::domain::ports::{EventPublishError, EventPublisher};

use super::messages::ChannelFrame;

/// Retained notification frames per user channel.
const HISTORY_LIMIT: usize = 256;

#[derive(Default)]
struct HubState {
    /// Latest payload per (topic, event name) for live-state channels.
    retained: HashMap<String, HashMap<&'static str, String>>,
    /// Appended payloads for history channels.
    history: HashMap<String, Vec<String>>,
    /// Active subscribers per topic.
    subscribers: HashMap<String, HashMap<Uuid, Recipient<ChannelFrame>>>,
}

/// Process-wide broadcast hub.
#[derive(Default)]
pub struct EventHub {
    state: Mutex<HubState>,
}

impl EventHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a socket to a topic and return the retained payloads the
    /// subscriber should replay to converge.
    pub fn subscribe(
        &self,
        topic: &str,
        subscriber_id: Uuid,
        recipient: Recipient<ChannelFrame>,
    ) -> Vec<String> {
        let mut state = self.lock_state();
        state
            .subscribers
            .entry(topic.to_owned())
            .or_default()
            .insert(subscriber_id, recipient);

        let mut snapshot: Vec<String> = state
            .retained
            .get(topic)
            .map(|by_event| by_event.values().cloned().collect())
            .unwrap_or_default();
        if let Some(history) = state.history.get(topic) {
            snapshot.extend(history.iter().cloned());
        }
        snapshot
    }

    /// Remove a socket from one topic.
    pub fn unsubscribe(&self, topic: &str, subscriber_id: Uuid) {
        let mut state = self.lock_state();
        if let Some(by_id) = state.subscribers.get_mut(topic) {
            by_id.remove(&subscriber_id);
            if by_id.is_empty() {
                state.subscribers.remove(topic);
            }
        }
    }

    /// Remove a socket from every topic it joined.
    pub fn unsubscribe_all(&self, subscriber_id: Uuid) {
        let mut state = self.lock_state();
        state.subscribers.retain(|_, by_id| {
            by_id.remove(&subscriber_id);
            !by_id.is_empty()
        });
    }

    fn dispatch(&self, event: &OutboxEvent) {
        let topic = event.channel.topic();
        let payload = event.payload.to_string();

        let mut state = self.lock_state();
        if event.channel.is_history() {
            let history = state.history.entry(topic.clone()).or_default();
            history.push(payload.clone());
            if history.len() > HISTORY_LIMIT {
                let excess = history.len() - HISTORY_LIMIT;
                history.drain(..excess);
            }
        } else {
            state
                .retained
                .entry(topic.clone())
                .or_default()
                .insert(event.name, payload.clone());
        }

        if let Some(by_id) = state.subscribers.get(&topic) {
            for recipient in by_id.values() {
                recipient.do_send(ChannelFrame {
                    topic: topic.clone(),
                    payload: payload.clone(),
                });
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("event hub state mutex poisoned; continuing with inner state");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventHub {
    async fn publish(&self, events: Vec<OutboxEvent>) -> Result<(), EventPublishError> {
        for event in &events {
            self.dispatch(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{
        ChannelKey, EVENT_CARD_UPDATED, EVENT_NOTIFICATION, EVENT_TIMELOG_STARTED,
    };
    use crate::domain::user::UserId;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    fn event(channel: ChannelKey, name: &'static str, marker: &str) -> OutboxEvent {
        OutboxEvent::new(
            channel,
            name,
            UserId::random(),
            Utc::now(),
            json!({ "marker": marker }),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn live_channels_retain_only_the_latest_payload_per_event() {
        let hub = EventHub::new();
        let card_id = Uuid::new_v4();

        hub.publish(vec![
            event(ChannelKey::Card(card_id), EVENT_CARD_UPDATED, "first"),
            event(ChannelKey::Card(card_id), EVENT_CARD_UPDATED, "second"),
            event(ChannelKey::Card(card_id), EVENT_TIMELOG_STARTED, "timer"),
        ])
        .await
        .expect("publish succeeds");

        let state = hub.lock_state();
        let by_event = state
            .retained
            .get(&format!("card:{card_id}"))
            .expect("topic retained");
        assert_eq!(by_event.len(), 2);
        assert!(
            by_event
                .get(EVENT_CARD_UPDATED)
                .is_some_and(|payload| payload.contains("second"))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn user_channels_append_history() {
        let hub = EventHub::new();
        let user = UserId::random();

        hub.publish(vec![
            event(ChannelKey::User(user), EVENT_NOTIFICATION, "first"),
            event(ChannelKey::User(user), EVENT_NOTIFICATION, "second"),
        ])
        .await
        .expect("publish succeeds");

        let state = hub.lock_state();
        let history = state
            .history
            .get(&format!("user:{user}"))
            .expect("history kept");
        assert_eq!(history.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn history_is_bounded() {
        let hub = EventHub::new();
        let user = UserId::random();

        for i in 0..(HISTORY_LIMIT + 10) {
            hub.publish(vec![event(
                ChannelKey::User(user),
                EVENT_NOTIFICATION,
                &i.to_string(),
            )])
            .await
            .expect("publish succeeds");
        }

        let state = hub.lock_state();
        let history = state
            .history
            .get(&format!("user:{user}"))
            .expect("history kept");
        assert_eq!(history.len(), HISTORY_LIMIT);
    }

    #[rstest]
    #[actix_rt::test]
    async fn unsubscribe_all_clears_every_topic() {
        use actix::Actor;

        // A subscriber that drops every frame; the bookkeeping is what is
        // under test here.
        struct Probe;
        impl Actor for Probe {
            type Context = actix::Context<Self>;
        }
        impl actix::Handler<ChannelFrame> for Probe {
            type Result = ();
            fn handle(&mut self, _msg: ChannelFrame, _ctx: &mut Self::Context) {}
        }

        let hub = EventHub::new();
        let subscriber = Uuid::new_v4();
        let recipient = Probe.start().recipient();

        let snapshot = hub.subscribe("card:a", subscriber, recipient.clone());
        assert!(snapshot.is_empty());
        hub.subscribe("project:b", subscriber, recipient);

        hub.unsubscribe_all(subscriber);
        let state = hub.lock_state();
        assert!(state.subscribers.is_empty());
    }
}
