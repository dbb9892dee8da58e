//! PostgreSQL-backed `MembershipRepository` implementation using Diesel ORM.
//!
//! Read-only lookups for authorization context and notification fan-out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::membership::{ProjectContext, ProjectMember, ProjectRole};
use crate::domain::ports::{MembershipRepository, MembershipRepositoryError};
use crate::domain::user::UserId;

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::pool::DbPool;
use super::schema::{project_members, projects, users};

/// Diesel-backed implementation of the membership repository port.
#[derive(Clone)]
pub struct DieselMembershipRepository {
    pool: DbPool,
}

impl DieselMembershipRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn connection_error(error: super::pool::PoolError) -> MembershipRepositoryError {
    map_pool_error(error, MembershipRepositoryError::connection)
}

fn query_error(error: diesel::result::Error) -> MembershipRepositoryError {
    map_diesel_error(error, MembershipRepositoryError::query)
}

#[async_trait]
impl MembershipRepository for DieselMembershipRepository {
    async fn project_context(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectContext>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let row = projects::table
            .filter(projects::id.eq(project_id))
            .select((projects::creator_id, projects::completed))
            .first::<(Uuid, bool)>(&mut conn)
            .await
            .optional()
            .map_err(query_error)?;

        Ok(row.map(|(creator_id, completed)| ProjectContext {
            project_id,
            creator_id: UserId::from_uuid(creator_id),
            completed,
        }))
    }

    async fn find_membership(
        &self,
        project_id: Uuid,
        user_id: UserId,
    ) -> Result<Option<ProjectMember>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let row = project_members::table
            .filter(project_members::project_id.eq(project_id))
            .filter(project_members::user_id.eq(user_id.as_uuid()))
            .select((
                project_members::id,
                project_members::role,
                project_members::joined_at,
            ))
            .first::<(Uuid, String, DateTime<Utc>)>(&mut conn)
            .await
            .optional()
            .map_err(query_error)?;

        row.map(|(id, role, joined_at)| {
            Ok(ProjectMember {
                id,
                project_id,
                user_id,
                role: ProjectRole::parse(&role)
                    .map_err(|err| MembershipRepositoryError::query(err.to_string()))?,
                joined_at,
            })
        })
        .transpose()
    }

    async fn list_leaders(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<UserId>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let rows = project_members::table
            .filter(project_members::project_id.eq(project_id))
            .filter(project_members::role.eq(ProjectRole::Leader.as_str()))
            .select(project_members::user_id)
            .load::<Uuid>(&mut conn)
            .await
            .map_err(query_error)?;

        Ok(rows.into_iter().map(UserId::from_uuid).collect())
    }

    async fn display_name(
        &self,
        user_id: UserId,
    ) -> Result<Option<String>, MembershipRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        users::table
            .filter(users::id.eq(user_id.as_uuid()))
            .select(users::display_name)
            .first::<String>(&mut conn)
            .await
            .optional()
            .map_err(query_error)
    }
}
