//! Time tracking API handlers: start and stop timers.

use actix_session::Session;
use actix_web::{HttpResponse, post, web};
use serde_json::json;
use uuid::Uuid;

use crate::server::AppServices;

use super::error::{ApiError, ApiResult};
use super::identity::current_actor;

/// Start a timer against a card.
#[utoipa::path(
    post,
    path = "/api/cards/{card_id}/time-logs",
    params(("card_id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 201, description = "Running time log and claimed card"),
        (status = 403, description = "Not a project member", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
        (status = 409, description = "Timer or focus conflict", body = ApiError),
        (status = 422, description = "Card already done", body = ApiError)
    ),
    tags = ["time-logs"],
    operation_id = "startTimer"
)]
#[post("/api/cards/{card_id}/time-logs")]
pub async fn start_timer(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;

    let outcome = services
        .time_tracking
        .start(actor, path.into_inner())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Created().json(json!({
        "timeLog": outcome.log,
        "card": outcome.card,
        "claimed": outcome.claimed,
    })))
}

/// Stop a running timer owned by the caller.
#[utoipa::path(
    post,
    path = "/api/time-logs/{log_id}/stop",
    params(("log_id" = Uuid, Path, description = "Time log identifier")),
    responses(
        (status = 200, description = "Closed time log"),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Time log not found", body = ApiError),
        (status = 422, description = "Already stopped", body = ApiError)
    ),
    tags = ["time-logs"],
    operation_id = "stopTimer"
)]
#[post("/api/time-logs/{log_id}/stop")]
pub async fn stop_timer(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;

    let outcome = services
        .time_tracking
        .stop(actor, path.into_inner())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({ "timeLog": outcome.log })))
}
