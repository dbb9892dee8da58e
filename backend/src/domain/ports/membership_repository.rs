//! Port for reading project context and membership.
//!
//! Read-only: membership management itself is an external collaborator.
//! The engine reads this data once per request to compute capabilities and
//! to locate notification recipients.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::membership::{ProjectContext, ProjectMember};
use crate::domain::user::UserId;

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by membership repository adapters.
    pub enum MembershipRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "membership repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "membership repository query failed: {message}",
    }
}

/// Port for project context and membership reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Load the project slice authorization needs.
    async fn project_context(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectContext>, MembershipRepositoryError>;

    /// Load one user's membership in a project.
    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: UserId,
    ) -> Result<Option<ProjectMember>, MembershipRepositoryError>;

    /// Users holding the leader role in a project.
    async fn list_leaders(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<UserId>, MembershipRepositoryError>;

    /// Display name of a user, for notification text.
    async fn display_name(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, MembershipRepositoryError>;
}
