//! Card API handlers: assign, update, delete.

use actix_session::Session;
use actix_web::{HttpResponse, delete, patch, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::UserId;
use crate::domain::card::{
    AssigneeChange, CardFieldEdit, CardPriority, CardStatus, CardUpdate, StatusChange,
};
use crate::server::AppServices;

use super::error::{ApiError, ApiResult};
use super::identity::current_actor;

/// Request body for assigning a card.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCardBody {
    /// New worker of record; omit or null to unassign.
    pub assignee_id: Option<UserId>,
    /// Free-form justification recorded on the assignment.
    pub reason: Option<String>,
}

/// Assign, reassign, or unassign a card.
#[utoipa::path(
    post,
    path = "/api/cards/{card_id}/assign",
    request_body = AssignCardBody,
    params(("card_id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 200, description = "Updated card and active assignment"),
        (status = 400, description = "Assignee not eligible", body = ApiError),
        (status = 403, description = "Not authorized", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
        (status = 409, description = "Assignee has unfinished work", body = ApiError)
    ),
    tags = ["cards"],
    operation_id = "assignCard"
)]
#[post("/api/cards/{card_id}/assign")]
pub async fn assign_card(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<AssignCardBody>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;
    let body = body.into_inner();

    let outcome = services
        .assignment
        .assign(
            actor,
            crate::domain::assignment_service::AssignCardRequest {
                card_id: path.into_inner(),
                assignee: body.assignee_id,
                reason: body.reason,
            },
        )
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({
        "card": outcome.card,
        "assignment": outcome.assignment,
        "reopened": outcome.reopened,
    })))
}

/// Deserialize a field that distinguishes "absent" from "null".
fn tri_state<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Request body for updating a card.
///
/// Each present field is one command; absent fields are untouched. The
/// `assignee_id` field is tri-state: absent leaves the worker of record
/// alone, null unassigns, a value reassigns.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCardBody {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New priority.
    pub priority: Option<CardPriority>,
    /// New due date.
    pub due_date: Option<DateTime<Utc>>,
    /// New deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Lifecycle transition.
    pub status: Option<CardStatus>,
    /// Worker-of-record change; null unassigns.
    #[serde(default, deserialize_with = "tri_state")]
    #[schema(value_type = Option<Uuid>)]
    pub assignee_id: Option<Option<UserId>>,
}

impl From<UpdateCardBody> for CardUpdate {
    fn from(body: UpdateCardBody) -> Self {
        let edit = CardFieldEdit {
            title: body.title,
            description: body.description,
            priority: body.priority,
            due_date: body.due_date,
            deadline: body.deadline,
        };
        Self {
            edit: (!edit.is_empty()).then_some(edit),
            status: body.status.map(|to| StatusChange { to }),
            assignee: body.assignee_id.map(|to| AssigneeChange { to }),
        }
    }
}

/// Apply a typed update to a card.
#[utoipa::path(
    patch,
    path = "/api/cards/{card_id}",
    request_body = UpdateCardBody,
    params(("card_id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 200, description = "Updated card"),
        (status = 403, description = "Not authorized", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError),
        (status = 409, description = "Exclusivity conflict", body = ApiError),
        (status = 422, description = "Invalid state transition", body = ApiError)
    ),
    tags = ["cards"],
    operation_id = "updateCard"
)]
#[patch("/api/cards/{card_id}")]
pub async fn update_card(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCardBody>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;
    let update = CardUpdate::from(body.into_inner());

    let outcome = services
        .card_update
        .update(actor, path.into_inner(), update)
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({ "card": outcome.card })))
}

/// Delete a card and its child records.
#[utoipa::path(
    delete,
    path = "/api/cards/{card_id}",
    params(("card_id" = Uuid, Path, description = "Card identifier")),
    responses(
        (status = 200, description = "Deletion confirmation"),
        (status = 403, description = "Not authorized", body = ApiError),
        (status = 404, description = "Card not found", body = ApiError)
    ),
    tags = ["cards"],
    operation_id = "deleteCard"
)]
#[delete("/api/cards/{card_id}")]
pub async fn delete_card(
    session: Session,
    services: web::Data<AppServices>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let actor = current_actor(&session)?;

    let deleted = services
        .card_update
        .delete(actor, path.into_inner())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(json!({
        "deleted": true,
        "cardId": deleted.card_id,
    })))
}
