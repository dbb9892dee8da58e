//! HTTP API handlers and error mapping.

use actix_web::web;

pub mod approvals;
pub mod cards;
pub mod error;
pub mod health;
pub mod identity;
pub mod time_logs;

pub use error::{ApiError, ApiResult};

/// Register every API route on the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(identity::login)
        .service(cards::assign_card)
        .service(cards::update_card)
        .service(cards::delete_card)
        .service(time_logs::start_timer)
        .service(time_logs::stop_timer)
        .service(approvals::request_overtime)
        .service(approvals::resolve_overtime)
        .service(health::ready)
        .service(health::live);
}
