//! PostgreSQL-backed `TimeLogRepository` implementation using Diesel ORM.
//!
//! Timer start locks the card row, loads the start snapshot, runs the
//! domain decision, and applies the session insert plus the card claim in
//! one transaction. The partial unique index on open logs backs the
//! one-running-timer invariant against races on different cards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::Error as DomainError;
use crate::domain::membership::{ProjectMember, ProjectRole};
use crate::domain::ports::{
    StartTimerCommand, StartTimerOutcome, StopTimerCommand, StopTimerOutcome, TimeLogRepository,
    TimeLogRepositoryError,
};
use crate::domain::time_tracking::{StartSnapshot, TimeLog, close, decide_start, decide_stop};
use crate::domain::user::UserId;

use super::diesel_card_repository::load_blocking_cards;
use super::error_mapping::{map_diesel_error, map_pool_error, unique_violation_conflict};
use super::models::{NewTimeLogRow, TimeLogRow};
use super::pool::DbPool;
use super::schema::{card_assignments, cards, project_members, time_logs};

/// Diesel-backed implementation of the time log repository port.
#[derive(Clone)]
pub struct DieselTimeLogRepository {
    pool: DbPool,
}

impl DieselTimeLogRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn connection_error(error: super::pool::PoolError) -> TimeLogRepositoryError {
    map_pool_error(error, TimeLogRepositoryError::connection)
}

fn query_error(error: diesel::result::Error) -> TimeLogRepositoryError {
    if let Some(conflict) = unique_violation_conflict(&error) {
        return TimeLogRepositoryError::rejected(conflict);
    }
    map_diesel_error(error, TimeLogRepositoryError::query)
}

fn row_to_time_log(row: TimeLogRow) -> TimeLog {
    TimeLog {
        id: row.id,
        card_id: row.card_id,
        user_id: UserId::from_uuid(row.user_id),
        start_time: row.start_time,
        end_time: row.end_time,
        duration_minutes: row.duration_minutes,
    }
}

/// Load everything `decide_start` needs, inside the transaction.
async fn load_start_snapshot(
    conn: &mut AsyncPgConnection,
    project_id: Uuid,
    card_id: Uuid,
    user: UserId,
) -> Result<StartSnapshot, diesel::result::Error> {
    let membership = project_members::table
        .filter(project_members::project_id.eq(project_id))
        .filter(project_members::user_id.eq(user.as_uuid()))
        .select((
            project_members::id,
            project_members::role,
            project_members::joined_at,
        ))
        .first::<(Uuid, String, DateTime<Utc>)>(conn)
        .await
        .optional()?
        .map(|(id, role, joined_at)| {
            Ok::<_, diesel::result::Error>(ProjectMember {
                id,
                project_id,
                user_id: user,
                role: ProjectRole::parse(&role).map_err(|err| {
                    diesel::result::Error::DeserializationError(err.to_string().into())
                })?,
                joined_at,
            })
        })
        .transpose()?;

    let open_logs = time_logs::table
        .filter(time_logs::user_id.eq(user.as_uuid()))
        .filter(time_logs::end_time.is_null())
        .count()
        .get_result::<i64>(conn)
        .await?;

    let other_assignments = load_blocking_cards(conn, project_id, user, card_id).await?;

    Ok(StartSnapshot {
        user_id: user,
        membership,
        has_open_log: open_logs > 0,
        other_assignments,
    })
}

#[async_trait]
impl TimeLogRepository for DieselTimeLogRepository {
    async fn start(
        &self,
        command: StartTimerCommand,
    ) -> Result<StartTimerOutcome, TimeLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let StartTimerCommand {
            card_id,
            user_id,
            now,
        } = command;

        let result = conn
            .transaction::<Result<StartTimerOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let Some(mut card) =
                            super::diesel_card_repository::lock_card(conn, card_id).await?
                        else {
                            return Ok(Err(DomainError::not_found(format!(
                                "card {card_id} not found"
                            ))));
                        };

                        let snapshot =
                            load_start_snapshot(conn, card.project_id, card_id, user_id).await?;

                        let plan = match decide_start(&card, &snapshot, now) {
                            Ok(plan) => plan,
                            Err(err) => return Ok(Err(err)),
                        };

                        let claimed = plan.claim.is_some();
                        if let Some(claim) = &plan.claim {
                            // Same write path as a direct assignment.
                            diesel::update(
                                card_assignments::table
                                    .filter(card_assignments::card_id.eq(card_id))
                                    .filter(card_assignments::is_active.eq(true)),
                            )
                            .set((
                                card_assignments::is_active.eq(false),
                                card_assignments::unassigned_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;

                            if let (Some(assignee), Some(project_member_id)) =
                                (claim.assignee, claim.project_member_id)
                            {
                                diesel::insert_into(card_assignments::table)
                                    .values(&super::models::NewCardAssignmentRow {
                                        id: Uuid::new_v4(),
                                        card_id,
                                        assigned_to: *assignee.as_uuid(),
                                        assigned_by: *user_id.as_uuid(),
                                        project_member_id,
                                        reason: Some("timer-start"),
                                        is_active: true,
                                        assigned_at: now,
                                    })
                                    .execute(conn)
                                    .await?;
                            }
                        }

                        let inserted = diesel::insert_into(time_logs::table)
                            .values(&NewTimeLogRow {
                                id: Uuid::new_v4(),
                                card_id,
                                user_id: *user_id.as_uuid(),
                                start_time: plan.log.start_time,
                            })
                            .returning(TimeLogRow::as_returning())
                            .get_result::<TimeLogRow>(conn)
                            .await?;

                        card.status = crate::domain::card::CardStatus::InProgress;
                        card.assignee_id = Some(user_id);
                        card.updated_at = now;
                        diesel::update(cards::table.filter(cards::id.eq(card_id)))
                            .set((
                                cards::status.eq(card.status.as_str()),
                                cards::assignee_id.eq(Some(*user_id.as_uuid())),
                                cards::updated_at.eq(now),
                            ))
                            .execute(conn)
                            .await?;

                        Ok(Ok(StartTimerOutcome {
                            log: row_to_time_log(inserted),
                            card,
                            claimed,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(TimeLogRepositoryError::rejected)
    }

    async fn stop(
        &self,
        command: StopTimerCommand,
    ) -> Result<StopTimerOutcome, TimeLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let StopTimerCommand {
            time_log_id,
            user_id,
            now,
        } = command;

        let result = conn
            .transaction::<Result<StopTimerOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let row = time_logs::table
                            .filter(time_logs::id.eq(time_log_id))
                            .for_update()
                            .select(TimeLogRow::as_select())
                            .first::<TimeLogRow>(conn)
                            .await
                            .optional()?;

                        let Some(row) = row else {
                            return Ok(Err(DomainError::not_found(format!(
                                "time log {time_log_id} not found"
                            ))));
                        };
                        let log = row_to_time_log(row);

                        if let Err(err) = decide_stop(&log, user_id) {
                            return Ok(Err(err));
                        }
                        let closed = close(&log, now);

                        diesel::update(time_logs::table.filter(time_logs::id.eq(time_log_id)))
                            .set((
                                time_logs::end_time.eq(closed.end_time),
                                time_logs::duration_minutes.eq(closed.duration_minutes),
                            ))
                            .execute(conn)
                            .await?;

                        let project_id = cards::table
                            .filter(cards::id.eq(closed.card_id))
                            .select(cards::project_id)
                            .first::<Uuid>(conn)
                            .await?;

                        Ok(Ok(StopTimerOutcome {
                            log: closed,
                            project_id,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(TimeLogRepositoryError::rejected)
    }
}
