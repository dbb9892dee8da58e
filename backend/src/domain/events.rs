//! Realtime events emitted after a commit.
//!
//! Services derive a list of [`OutboxEvent`] values from a committed
//! outcome and hand them to the publisher port. The transactional core
//! never talks to the broadcast mechanism directly, which keeps it free of
//! pub-sub I/O and independently testable.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use super::user::UserId;

/// Latest snapshot of a card, keyed by card id.
pub const EVENT_CARD_UPDATED: &str = "card:updated";
/// A card changed hands.
pub const EVENT_CARD_ASSIGNED: &str = "card:assigned";
/// A card was removed from the board.
pub const EVENT_CARD_DELETED: &str = "card:deleted";
/// A timer started against a card.
pub const EVENT_TIMELOG_STARTED: &str = "timelog:started";
/// A timer stopped.
pub const EVENT_TIMELOG_STOPPED: &str = "timelog:stopped";
/// A notification landed in a user's history channel.
pub const EVENT_NOTIFICATION: &str = "notification";

/// Key identifying one broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Per-card live state; retains the latest value per event name.
    Card(Uuid),
    /// Per-project board convergence; retains the latest value per event
    /// name.
    Project(Uuid),
    /// Per-user notification history; appends.
    User(UserId),
}

impl ChannelKey {
    /// Stable topic string used by the broadcast layer.
    #[must_use]
    pub fn topic(&self) -> String {
        match self {
            Self::Card(id) => format!("card:{id}"),
            Self::Project(id) => format!("project:{id}"),
            Self::User(id) => format!("user:{id}"),
        }
    }

    /// Whether the channel appends history instead of retaining the latest
    /// value per event name.
    #[must_use]
    pub const fn is_history(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// One (channel, event, payload) record produced after a commit.
///
/// The payload is a full snapshot, not a delta; consumers overwrite their
/// local state with it. The embedded `nonce` makes two publishes of the
/// same logical event distinguishable to passive listeners, and
/// `actingUserId` lets consumers drop events they already applied
/// optimistically.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Channel to publish on.
    pub channel: ChannelKey,
    /// Event name, e.g. `card:updated`.
    pub name: &'static str,
    /// Enveloped JSON payload.
    pub payload: Value,
}

impl OutboxEvent {
    /// Build an event with the standard envelope around `data`.
    #[must_use]
    pub fn new(
        channel: ChannelKey,
        name: &'static str,
        acting_user: UserId,
        at: DateTime<Utc>,
        data: Value,
    ) -> Self {
        let payload = json!({
            "event": name,
            "actingUserId": acting_user,
            "at": at.to_rfc3339(),
            "nonce": Uuid::new_v4(),
            "data": data,
        });
        Self {
            channel,
            name,
            payload,
        }
    }
}
