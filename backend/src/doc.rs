//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for
//! the REST API: all HTTP endpoints, the shared error envelope, and the
//! session cookie security scheme. Swagger UI serves the document in debug
//! builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::approvals::{RequestOvertimeBody, ResolveOvertimeBody};
use crate::api::cards::{AssignCardBody, UpdateCardBody};
use crate::api::error::ApiError;
use crate::api::identity::LoginRequest;
use crate::domain::ErrorCode;
use crate::domain::card::{Card, CardPriority, CardStatus};
use crate::domain::overtime::{ApprovalAction, ApprovalStatus, OvertimeApproval};
use crate::domain::time_tracking::TimeLog;

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/login.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Work assignment backend API",
        description = "HTTP interface for the team work-assignment engine: \
            card assignment, lifecycle updates, time tracking, and overtime \
            approvals."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::api::identity::login,
        crate::api::cards::assign_card,
        crate::api::cards::update_card,
        crate::api::cards::delete_card,
        crate::api::time_logs::start_timer,
        crate::api::time_logs::stop_timer,
        crate::api::approvals::request_overtime,
        crate::api::approvals::resolve_overtime,
        crate::api::health::ready,
        crate::api::health::live,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        Card,
        CardStatus,
        CardPriority,
        TimeLog,
        OvertimeApproval,
        ApprovalStatus,
        ApprovalAction,
        AssignCardBody,
        UpdateCardBody,
        RequestOvertimeBody,
        ResolveOvertimeBody,
        LoginRequest,
    )),
    tags(
        (name = "cards", description = "Assignment and lifecycle operations"),
        (name = "time-logs", description = "Timer start and stop"),
        (name = "overtime", description = "Overtime approval workflow"),
        (name = "session", description = "Session shims"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    //! Tests verifying OpenAPI document structure.

    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn openapi_document_lists_every_engine_operation() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/cards/{card_id}/assign",
            "/api/cards/{card_id}",
            "/api/cards/{card_id}/time-logs",
            "/api/time-logs/{log_id}/stop",
            "/api/cards/{card_id}/overtime-requests",
            "/api/overtime-requests/{approval_id}/resolve",
        ] {
            assert!(
                paths.iter().any(|path| *path == expected),
                "missing path {expected}"
            );
        }
    }

    #[test]
    fn openapi_error_schema_is_registered() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        assert!(schemas.contains_key("ApiError"));
        assert!(schemas.contains_key("Card"));
    }
}
