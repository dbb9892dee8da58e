//! Backend library for the team work-assignment engine.
//!
//! Layered hexagonally: `domain` holds the consistency engine and its
//! ports, `outbound` the PostgreSQL adapters, `api` and `ws` the inbound
//! HTTP and realtime adapters, `server` the wiring.

pub mod api;
pub mod doc;
pub mod domain;
pub mod middleware;
pub mod outbound;
pub mod server;
pub mod ws;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
/// Request-scoped tracing middleware.
pub use middleware::trace::Trace;
