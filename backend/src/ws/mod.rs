//! WebSocket entry and routing.

use std::sync::Arc;

use actix_web::web::{Data, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use actix_web_actors::ws;
use tracing::error;

pub mod hub;
pub mod messages;
pub mod socket;

pub use hub::EventHub;

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    req: HttpRequest,
    stream: Payload,
    hub: Data<Arc<EventHub>>,
) -> actix_web::Result<HttpResponse> {
    let actor = socket::BoardSocket::new(Arc::clone(hub.get_ref()));
    ws::start(actor, &req, stream).map_err(|e| {
        error!(error = %e, "WebSocket upgrade failed");
        actix_web::error::ErrorInternalServerError("WebSocket upgrade failed")
    })
}
