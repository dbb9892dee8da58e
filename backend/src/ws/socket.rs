//! WebSocket actor for board viewers.
//!
//! Clients subscribe to card, project, and user topics; the socket replays
//! the retained snapshot on entry and forwards every subsequent frame.
//! Self-echo suppression is the client's job: payloads carry the acting
//! user id.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web_actors::ws::{self, CloseCode, CloseReason, Message, ProtocolError};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::hub::EventHub;
use super::messages::{ChannelFrame, ClientCommand};

/// Time between heartbeats to the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Maximum allowed time between messages from the client before considering
/// it disconnected.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One connected board viewer.
pub struct BoardSocket {
    hub: Arc<EventHub>,
    subscriber_id: Uuid,
    last_heartbeat: Instant,
}

impl BoardSocket {
    /// Create a socket bound to the process-wide hub.
    #[must_use]
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            hub,
            subscriber_id: Uuid::new_v4(),
            last_heartbeat: Instant::now(),
        }
    }

    fn handle_command(&self, command: ClientCommand, ctx: &mut ws::WebsocketContext<Self>) {
        match command {
            ClientCommand::Subscribe { topic } => {
                let recipient = ctx.address().recipient();
                let snapshot = self.hub.subscribe(&topic, self.subscriber_id, recipient);
                for payload in snapshot {
                    ctx.text(payload);
                }
            }
            ClientCommand::Unsubscribe { topic } => {
                self.hub.unsubscribe(&topic, self.subscriber_id);
            }
        }
    }
}

impl Actor for BoardSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.last_heartbeat = Instant::now();
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                info!("WebSocket heartbeat timeout; closing connection");
                ctx.close(Some(CloseReason {
                    code: CloseCode::Normal,
                    description: Some("heartbeat timeout".into()),
                }));
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.hub.unsubscribe_all(self.subscriber_id);
    }
}

impl StreamHandler<Result<Message, ProtocolError>> for BoardSocket {
    fn handle(&mut self, msg: Result<Message, ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => self.handle_command(command, ctx),
                    Err(err) => {
                        let error_msg = json!({
                            "error": format!("unrecognised command: {err}"),
                        });
                        ctx.text(error_msg.to_string());
                    }
                }
            }
            Ok(Message::Pong(_) | Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(Message::Nop | Message::Continuation(_)) => {}
            Err(err) => {
                warn!(error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

impl Handler<ChannelFrame> for BoardSocket {
    type Result = ();

    fn handle(&mut self, msg: ChannelFrame, ctx: &mut Self::Context) {
        ctx.text(msg.payload);
    }
}
