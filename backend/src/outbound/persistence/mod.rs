//! PostgreSQL persistence adapters for the engine's driven ports.

mod diesel_card_repository;
mod diesel_membership_repository;
mod diesel_notification_gateway;
mod diesel_overtime_repository;
mod diesel_time_log_repository;
mod error_mapping;
mod models;
mod pool;
pub mod schema;

pub use diesel_card_repository::DieselCardRepository;
pub use diesel_membership_repository::DieselMembershipRepository;
pub use diesel_notification_gateway::DieselNotificationGateway;
pub use diesel_overtime_repository::DieselOvertimeRepository;
pub use diesel_time_log_repository::DieselTimeLogRepository;
pub use pool::{DbPool, PoolConfig, PoolError};

use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

/// Embedded SQL migrations, applied at startup.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors raised while applying embedded migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Could not connect to the database.
    #[error("failed to connect for migrations: {message}")]
    Connection {
        /// Underlying connection failure.
        message: String,
    },
    /// A migration failed to apply.
    #[error("failed to run migrations: {message}")]
    Apply {
        /// Underlying migration failure.
        message: String,
    },
}

/// Apply pending migrations against `database_url`.
///
/// The migration harness is synchronous, so the work runs on a blocking
/// thread.
pub async fn run_migrations(database_url: &str) -> Result<(), MigrationError> {
    let database_url = database_url.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut conn =
            PgConnection::establish(&database_url).map_err(|err| MigrationError::Connection {
                message: err.to_string(),
            })?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|_| ())
            .map_err(|err| MigrationError::Apply {
                message: err.to_string(),
            })
    })
    .await
    .map_err(|err| MigrationError::Apply {
        message: format!("migration task panicked: {err}"),
    })?
}
