//! PostgreSQL-backed `OvertimeRepository` implementation using Diesel ORM.
//!
//! Requests lock the card row so the assignee/deadline snapshot cannot
//! change between check and insert; resolutions lock the approval row so a
//! request resolves at most once. The partial unique index on pending
//! requests backs the single-pending invariant.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::Error as DomainError;
use crate::domain::overtime::{
    ApprovalStatus, OvertimeApproval, decide_request, decide_resolve,
};
use crate::domain::ports::{
    OvertimeRepository, OvertimeRepositoryError, RequestOvertimeCommand, RequestOvertimeOutcome,
    ResolveOvertimeCommand, ResolveOvertimeOutcome,
};
use crate::domain::user::UserId;

use super::diesel_card_repository::lock_card;
use super::error_mapping::{map_diesel_error, map_pool_error, unique_violation_conflict};
use super::models::{NewOvertimeApprovalRow, OvertimeApprovalRow};
use super::pool::DbPool;
use super::schema::{cards, overtime_approvals};

/// Diesel-backed implementation of the overtime repository port.
#[derive(Clone)]
pub struct DieselOvertimeRepository {
    pool: DbPool,
}

impl DieselOvertimeRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn connection_error(error: super::pool::PoolError) -> OvertimeRepositoryError {
    map_pool_error(error, OvertimeRepositoryError::connection)
}

fn query_error(error: diesel::result::Error) -> OvertimeRepositoryError {
    if let Some(conflict) = unique_violation_conflict(&error) {
        return OvertimeRepositoryError::rejected(conflict);
    }
    map_diesel_error(error, OvertimeRepositoryError::query)
}

fn row_to_approval(row: OvertimeApprovalRow) -> Result<OvertimeApproval, DomainError> {
    Ok(OvertimeApproval {
        id: row.id,
        card_id: row.card_id,
        requested_by: UserId::from_uuid(row.requested_by),
        reason: row.reason,
        days_overdue: row.days_overdue,
        status: ApprovalStatus::parse(&row.status)?,
        requested_at: row.requested_at,
        approver_id: row.approver_id.map(UserId::from_uuid),
        approver_notes: row.approver_notes,
        responded_at: row.responded_at,
    })
}

#[async_trait]
impl OvertimeRepository for DieselOvertimeRepository {
    async fn find_project_of_approval(
        &self,
        approval_id: Uuid,
    ) -> Result<Option<Uuid>, OvertimeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        overtime_approvals::table
            .inner_join(cards::table.on(cards::id.eq(overtime_approvals::card_id)))
            .filter(overtime_approvals::id.eq(approval_id))
            .select(cards::project_id)
            .first::<Uuid>(&mut conn)
            .await
            .optional()
            .map_err(query_error)
    }

    async fn request(
        &self,
        command: RequestOvertimeCommand,
    ) -> Result<RequestOvertimeOutcome, OvertimeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let RequestOvertimeCommand {
            card_id,
            requested_by,
            reason,
            now,
        } = command;

        let result = conn
            .transaction::<Result<RequestOvertimeOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let Some(card) = lock_card(conn, card_id).await? else {
                            return Ok(Err(DomainError::not_found(format!(
                                "card {card_id} not found"
                            ))));
                        };

                        let pending = overtime_approvals::table
                            .filter(overtime_approvals::card_id.eq(card_id))
                            .filter(
                                overtime_approvals::requested_by.eq(requested_by.as_uuid()),
                            )
                            .filter(
                                overtime_approvals::status.eq(ApprovalStatus::Pending.as_str()),
                            )
                            .count()
                            .get_result::<i64>(conn)
                            .await?;

                        let new_request = match decide_request(
                            &card,
                            requested_by,
                            &reason,
                            pending > 0,
                            now,
                        ) {
                            Ok(request) => request,
                            Err(err) => return Ok(Err(err)),
                        };

                        let inserted = diesel::insert_into(overtime_approvals::table)
                            .values(&NewOvertimeApprovalRow {
                                id: Uuid::new_v4(),
                                card_id,
                                requested_by: *requested_by.as_uuid(),
                                reason: &new_request.reason,
                                days_overdue: new_request.days_overdue,
                                status: ApprovalStatus::Pending.as_str(),
                                requested_at: new_request.requested_at,
                            })
                            .returning(OvertimeApprovalRow::as_returning())
                            .get_result::<OvertimeApprovalRow>(conn)
                            .await?;

                        Ok(row_to_approval(inserted).map(|approval| RequestOvertimeOutcome {
                            approval,
                            project_id: card.project_id,
                            card_title: card.title,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(OvertimeRepositoryError::rejected)
    }

    async fn resolve(
        &self,
        command: ResolveOvertimeCommand,
    ) -> Result<ResolveOvertimeOutcome, OvertimeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let ResolveOvertimeCommand {
            approval_id,
            action,
            acting_user,
            notes,
            now,
        } = command;

        let result = conn
            .transaction::<Result<ResolveOvertimeOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let row = overtime_approvals::table
                            .filter(overtime_approvals::id.eq(approval_id))
                            .for_update()
                            .select(OvertimeApprovalRow::as_select())
                            .first::<OvertimeApprovalRow>(conn)
                            .await
                            .optional()?;

                        let Some(row) = row else {
                            return Ok(Err(DomainError::not_found(format!(
                                "overtime request {approval_id} not found"
                            ))));
                        };
                        let approval = match row_to_approval(row) {
                            Ok(approval) => approval,
                            Err(err) => return Ok(Err(err)),
                        };

                        let resolved = match decide_resolve(
                            &approval,
                            action,
                            acting_user,
                            notes.as_deref(),
                            now,
                        ) {
                            Ok(resolved) => resolved,
                            Err(err) => return Ok(Err(err)),
                        };

                        diesel::update(
                            overtime_approvals::table
                                .filter(overtime_approvals::id.eq(approval_id)),
                        )
                        .set((
                            overtime_approvals::status.eq(resolved.status.as_str()),
                            overtime_approvals::approver_id
                                .eq(resolved.approver_id.map(|id| *id.as_uuid())),
                            overtime_approvals::approver_notes
                                .eq(resolved.approver_notes.clone()),
                            overtime_approvals::responded_at.eq(resolved.responded_at),
                        ))
                        .execute(conn)
                        .await?;

                        let (project_id, card_title) = cards::table
                            .filter(cards::id.eq(resolved.card_id))
                            .select((cards::project_id, cards::title))
                            .first::<(Uuid, String)>(conn)
                            .await?;

                        Ok(Ok(ResolveOvertimeOutcome {
                            approval: resolved,
                            project_id,
                            card_title,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(OvertimeRepositoryError::rejected)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for row conversion and error mapping.

    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    fn row_conversion_parses_the_status() {
        let row = OvertimeApprovalRow {
            id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            reason: "blocked on review".to_owned(),
            days_overdue: 3,
            status: "PENDING".to_owned(),
            requested_at: Utc::now(),
            approver_id: None,
            approver_notes: None,
            responded_at: None,
        };
        let approval = row_to_approval(row).expect("valid row converts");
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert_eq!(approval.days_overdue, 3);
    }

    #[rstest]
    fn row_conversion_rejects_unknown_status() {
        let row = OvertimeApprovalRow {
            id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            reason: "blocked".to_owned(),
            days_overdue: 1,
            status: "WITHDRAWN".to_owned(),
            requested_at: Utc::now(),
            approver_id: None,
            approver_notes: None,
            responded_at: None,
        };
        let err = row_to_approval(row).expect_err("unknown status fails");
        assert!(err.to_string().contains("WITHDRAWN"));
    }

    #[rstest]
    fn pool_errors_map_to_connection_errors() {
        let err = connection_error(super::super::pool::PoolError::checkout("refused"));
        assert!(matches!(err, OvertimeRepositoryError::Connection { .. }));
    }
}
