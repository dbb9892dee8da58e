//! Overtime approval API handlers: request and resolve.

use actix_session::Session;
use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::overtime::ApprovalAction;
use crate::server::AppServices;

use super::error::{ApiError, ApiResult};
use super::identity::current_actor;

/// Request body for filing an overtime request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestOvertimeBody {
    /// Why the work ran over.
    pub reason: String,
}

/// File an overtime request for an overdue card.
#[utoipa::path(
    post,
    path = "/api/cards/{card_id}/overtime-requests",
    request_body = RequestOvertimeBody,
    params(("card_id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 201, description = "Pending overtime request"),
        (status = 400, description = "Missing reason", body = ApiError),
        (status = 403, description = "Not the assignee", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
        (status = 409, description = "Request already pending", body = ApiError),
        (status = 422, description = "No deadline or not overdue", body = ApiError)
    ),
    tags = ["overtime"],
    operation_id = "requestOvertime"
)]
#[post("/api/cards/{card_id}/overtime-requests")]
pub async fn request_overtime(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<RequestOvertimeBody>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;

    let outcome = services
        .overtime
        .request(actor, path.into_inner(), body.into_inner().reason)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Created().json(json!({ "approval": outcome.approval })))
}

/// Request body for resolving an overtime request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveOvertimeBody {
    /// Approve or reject.
    pub action: ApprovalAction,
    /// Optional notes for the requester.
    pub notes: Option<String>,
}

/// Resolve a pending overtime request.
#[utoipa::path(
    post,
    path = "/api/overtime-requests/{approval_id}/resolve",
    request_body = ResolveOvertimeBody,
    params(("approval_id" = Uuid, Path, description = "Overtime request identifier")),
    responses(
        (status = 200, description = "Resolved overtime request"),
        (status = 403, description = "Not authorized", body = ApiError),
        (status = 404, description = "Request not found", body = ApiError),
        (status = 409, description = "Already resolved", body = ApiError)
    ),
    tags = ["overtime"],
    operation_id = "resolveOvertime"
)]
#[post("/api/overtime-requests/{approval_id}/resolve")]
pub async fn resolve_overtime(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<ResolveOvertimeBody>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;
    let body = body.into_inner();

    let outcome = services
        .overtime
        .resolve(actor, path.into_inner(), body.action, body.notes)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({ "approval": outcome.approval })))
}
