//! Port for the keyed realtime broadcast mechanism.
//!
//! Publishing happens strictly after the datastore commit and is
//! best-effort: services log a failed publish and still return success to
//! the caller, because persisted consistency outranks realtime delivery.

use async_trait::async_trait;

use crate::domain::events::OutboxEvent;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by broadcast adapters.
    pub enum EventPublishError {
        /// The broadcast mechanism is unreachable.
        Unavailable { message: String } =>
            "event broadcast unavailable: {message}",
    }
}

/// Port for publishing post-commit events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a batch of events in order.
    async fn publish(&self, events: Vec<OutboxEvent>) -> Result<(), EventPublishError>;
}

/// Fixture publisher for tests that do not observe broadcasts.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEventPublisher;

#[async_trait]
impl EventPublisher for FixtureEventPublisher {
    async fn publish(&self, _events: Vec<OutboxEvent>) -> Result<(), EventPublishError> {
        Ok(())
    }
}
