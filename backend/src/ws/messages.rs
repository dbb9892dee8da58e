//! WebSocket message types exchanged with board viewers.

use actix::Message;
use serde::Deserialize;

/// One broadcast frame pushed to a subscribed socket.
///
/// The payload is the enveloped JSON produced by the domain outbox; the
/// socket forwards it verbatim.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct ChannelFrame {
    /// Topic the frame belongs to, e.g. `card:<uuid>`.
    pub topic: String,
    /// Serialised event payload.
    pub payload: String,
}

/// Commands a client may send over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCommand {
    /// Subscribe to a topic; the retained snapshot is replayed on entry.
    Subscribe {
        /// Topic to subscribe to.
        topic: String,
    },
    /// Unsubscribe from a topic.
    Unsubscribe {
        /// Topic to leave.
        topic: String,
    },
}
