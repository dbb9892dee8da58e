//! Session-backed caller identity.
//!
//! Session issuance belongs to the external auth system; this module only
//! reads the `user_id` and `global_role` the session carries and exposes a
//! development login shim for local use.

use actix_session::Session;
use actix_web::{HttpResponse, post, web};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{Actor, GlobalRole, UserId};

use super::error::{ApiError, ApiResult};

const SESSION_USER_ID: &str = "user_id";
const SESSION_GLOBAL_ROLE: &str = "global_role";

/// Resolve the acting user from the session.
///
/// # Errors
///
/// Returns an unauthorized [`ApiError`] when the session carries no
/// identity.
pub fn current_actor(session: &Session) -> ApiResult<Actor> {
    let user_id = session
        .get::<UserId>(SESSION_USER_ID)
        .map_err(|_| ApiError::unauthorized("session is unreadable"))?
        .ok_or_else(|| ApiError::unauthorized("not signed in"))?;
    let global_role = session
        .get::<String>(SESSION_GLOBAL_ROLE)
        .map_err(|_| ApiError::unauthorized("session is unreadable"))?
        .as_deref()
        .map_or(Ok(GlobalRole::Member), GlobalRole::parse)
        .map_err(|_| ApiError::unauthorized("session role is unreadable"))?;

    Ok(Actor {
        user_id,
        global_role,
    })
}

/// Request body for the development login shim.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// The user to impersonate.
    pub user_id: UserId,
    /// System-wide role to act with.
    pub global_role: GlobalRole,
}

/// Seed the session with an identity.
///
/// Development shim standing in for the external auth system.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 204, description = "Session established"),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tags = ["session"],
    operation_id = "login"
)]
#[post("/api/login")]
pub async fn login(
    session: Session,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    session
        .insert(SESSION_USER_ID, body.user_id)
        .map_err(|err| ApiError::from(actix_web::Error::from(err)))?;
    session
        .insert(SESSION_GLOBAL_ROLE, body.global_role.as_str())
        .map_err(|err| ApiError::from(actix_web::Error::from(err)))?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};
    use uuid::Uuid;

    async fn whoami(session: Session) -> ApiResult<HttpResponse> {
        let actor = current_actor(&session)?;
        Ok(HttpResponse::Ok().json(serde_json::json!({
            "userId": actor.user_id,
            "isAdmin": actor.is_admin(),
        })))
    }

    macro_rules! test_app {
        () => {{
            use actix_session::{SessionMiddleware, storage::CookieSessionStore};
            use actix_web::cookie::Key;

            App::new()
                .wrap(SessionMiddleware::builder(
                    CookieSessionStore::default(),
                    Key::from(&[0u8; 64]),
                )
                .cookie_secure(false)
                .build())
                .service(login)
                .route("/whoami", web::get().to(whoami))
        }};
    }

    #[actix_web::test]
    async fn missing_session_is_unauthorized() {
        let app = test::init_service(test_app!()).await;
        let req = test::TestRequest::get().uri("/whoami").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn login_establishes_an_identity() {
        let app = test::init_service(test_app!()).await;
        let user_id = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(serde_json::json!({
                "user_id": user_id,
                "global_role": "ADMIN",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), actix_web::http::StatusCode::NO_CONTENT);

        let cookie = res
            .response()
            .cookies()
            .next()
            .expect("session cookie set")
            .into_owned();

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(cookie)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body.get("userId"), Some(&serde_json::json!(user_id)));
        assert_eq!(body.get("isAdmin"), Some(&serde_json::json!(true)));
    }
}
