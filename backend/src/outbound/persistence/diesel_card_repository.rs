//! PostgreSQL-backed `CardRepository` implementation using Diesel ORM.
//!
//! Each operation runs one transaction: lock the card row (`FOR UPDATE`),
//! load the precondition snapshot, run the pure decision function, apply
//! the returned plan. The card row lock serialises all mutations of one
//! card, and the partial unique indexes catch the races it cannot cover.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::Error as DomainError;
use crate::domain::assignment::{
    AssignmentPlan, BlockingCard, CandidateSnapshot, CardAssignment, decide_assign,
};
use crate::domain::card::{Card, CardPriority, CardStatus};
use crate::domain::membership::{ProjectMember, ProjectRole};
use crate::domain::ports::{
    AssignCardCommand, AssignCardOutcome, CardRepository, CardRepositoryError, DeletedCard,
    UpdateCardCommand, UpdateCardOutcome,
};
use crate::domain::user::UserId;
use crate::domain::work_status::{UpdateContext, decide_update};

use super::error_mapping::{map_diesel_error, map_pool_error, unique_violation_conflict};
use super::models::{CardAssignmentRow, CardRow, CardWriteback, NewCardAssignmentRow};
use super::pool::DbPool;
use super::schema::{card_assignments, cards, project_members, projects, time_logs};

/// Diesel-backed implementation of the card repository port.
#[derive(Clone)]
pub struct DieselCardRepository {
    pool: DbPool,
}

impl DieselCardRepository {
    /// Create a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn connection_error(error: super::pool::PoolError) -> CardRepositoryError {
    map_pool_error(error, CardRepositoryError::connection)
}

fn query_error(error: diesel::result::Error) -> CardRepositoryError {
    if let Some(conflict) = unique_violation_conflict(&error) {
        return CardRepositoryError::rejected(conflict);
    }
    map_diesel_error(error, CardRepositoryError::query)
}

/// Convert a database row into a domain card.
pub(crate) fn row_to_card(row: CardRow) -> Result<Card, DomainError> {
    Ok(Card {
        id: row.id,
        board_id: row.board_id,
        project_id: row.project_id,
        title: row.title,
        description: row.description,
        priority: CardPriority::parse(&row.priority)?,
        status: CardStatus::parse(&row.status)?,
        due_date: row.due_date,
        deadline: row.deadline,
        assignee_id: row.assignee_id.map(UserId::from_uuid),
        created_by: UserId::from_uuid(row.created_by),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_to_assignment(row: CardAssignmentRow) -> CardAssignment {
    CardAssignment {
        id: row.id,
        card_id: row.card_id,
        assigned_to: UserId::from_uuid(row.assigned_to),
        assigned_by: UserId::from_uuid(row.assigned_by),
        project_member_id: row.project_member_id,
        reason: row.reason,
        is_active: row.is_active,
        assigned_at: row.assigned_at,
        unassigned_at: row.unassigned_at,
    }
}

fn writeback_for(card: &Card) -> CardWriteback<'_> {
    CardWriteback {
        title: &card.title,
        description: card.description.as_deref(),
        priority: card.priority.as_str(),
        status: card.status.as_str(),
        due_date: card.due_date,
        deadline: card.deadline,
        assignee_id: card.assignee_id.map(|id| *id.as_uuid()),
        updated_at: card.updated_at,
    }
}

/// Lock and load the card row for the duration of the transaction.
pub(crate) async fn lock_card(
    conn: &mut AsyncPgConnection,
    card_id: Uuid,
) -> Result<Option<Card>, diesel::result::Error> {
    let row = cards::table
        .filter(cards::id.eq(card_id))
        .for_update()
        .select(CardRow::as_select())
        .first::<CardRow>(conn)
        .await
        .optional()?;

    match row.map(row_to_card) {
        None => Ok(None),
        Some(Ok(card)) => Ok(Some(card)),
        // A malformed row is a data bug; surface it as a serialization
        // failure rather than pretending the card is absent.
        Some(Err(err)) => Err(diesel::result::Error::DeserializationError(
            err.to_string().into(),
        )),
    }
}

/// Load a candidate's membership and blocking cards inside the transaction.
async fn load_candidate_snapshot(
    conn: &mut AsyncPgConnection,
    project_id: Uuid,
    candidate: UserId,
    exclude_card: Uuid,
) -> Result<CandidateSnapshot, diesel::result::Error> {
    let membership = project_members::table
        .filter(project_members::project_id.eq(project_id))
        .filter(project_members::user_id.eq(candidate.as_uuid()))
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
                user_id: candidate,
                role: ProjectRole::parse(&role).map_err(|err| {
                    diesel::result::Error::DeserializationError(err.to_string().into())
                })?,
                joined_at,
            })
        })
        .transpose()?;

    let blocking = load_blocking_cards(conn, project_id, candidate, exclude_card).await?;

    Ok(CandidateSnapshot {
        user_id: candidate,
        membership,
        blocking,
    })
}

/// Active assignments of a user to other non-`DONE` cards in a project.
pub(crate) async fn load_blocking_cards(
    conn: &mut AsyncPgConnection,
    project_id: Uuid,
    user: UserId,
    exclude_card: Uuid,
) -> Result<Vec<BlockingCard>, diesel::result::Error> {
    let rows = card_assignments::table
        .inner_join(cards::table.on(cards::id.eq(card_assignments::card_id)))
        .filter(card_assignments::assigned_to.eq(user.as_uuid()))
        .filter(card_assignments::is_active.eq(true))
        .filter(cards::project_id.eq(project_id))
        .filter(cards::id.ne(exclude_card))
        .filter(cards::status.ne(CardStatus::Done.as_str()))
        .select((cards::id, cards::title, cards::status))
        .load::<(Uuid, String, String)>(conn)
        .await?;

    rows.into_iter()
        .map(|(id, title, status)| {
            Ok(BlockingCard {
                id,
                title,
                status: CardStatus::parse(&status).map_err(|err| {
                    diesel::result::Error::DeserializationError(err.to_string().into())
                })?,
            })
        })
        .collect()
}

/// Apply an assignment plan: the single write path for assignment rows.
///
/// Deactivates *every* active row for the card — interrupted writes may
/// have left more than one — then inserts the new active row if the plan
/// assigns someone.
async fn apply_assignment_plan(
    conn: &mut AsyncPgConnection,
    card_id: Uuid,
    plan: &AssignmentPlan,
    assigned_by: UserId,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<CardAssignment>, diesel::result::Error> {
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

    let (Some(assignee), Some(project_member_id)) = (plan.assignee, plan.project_member_id) else {
        return Ok(None);
    };

    let new_row = NewCardAssignmentRow {
        id: Uuid::new_v4(),
        card_id,
        assigned_to: *assignee.as_uuid(),
        assigned_by: *assigned_by.as_uuid(),
        project_member_id,
        reason,
        is_active: true,
        assigned_at: now,
    };
    let inserted = diesel::insert_into(card_assignments::table)
        .values(&new_row)
        .returning(CardAssignmentRow::as_returning())
        .get_result::<CardAssignmentRow>(conn)
        .await?;

    Ok(Some(row_to_assignment(inserted)))
}

#[async_trait]
impl CardRepository for DieselCardRepository {
    async fn find_card(&self, card_id: Uuid) -> Result<Option<Card>, CardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let row = cards::table
            .filter(cards::id.eq(card_id))
            .select(CardRow::as_select())
            .first::<CardRow>(&mut conn)
            .await
            .optional()
            .map_err(query_error)?;

        row.map(row_to_card)
            .transpose()
            .map_err(|err| CardRepositoryError::query(err.to_string()))
    }

    async fn assign(
        &self,
        command: AssignCardCommand,
    ) -> Result<AssignCardOutcome, CardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let AssignCardCommand {
            card_id,
            assignee,
            acting_user,
            acting_is_admin,
            reason,
            now,
        } = command;

        let result = conn
            .transaction::<Result<AssignCardOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let Some(mut card) = lock_card(conn, card_id).await? else {
                            return Ok(Err(DomainError::not_found(format!(
                                "card {card_id} not found"
                            ))));
                        };

                        let candidate = match assignee {
                            Some(user) => Some(
                                load_candidate_snapshot(conn, card.project_id, user, card_id)
                                    .await?,
                            ),
                            None => None,
                        };

                        let plan = match decide_assign(&card, candidate.as_ref(), acting_is_admin)
                        {
                            Ok(plan) => plan,
                            Err(err) => return Ok(Err(err)),
                        };

                        let assignment = apply_assignment_plan(
                            conn,
                            card_id,
                            &plan,
                            acting_user,
                            reason.as_deref(),
                            now,
                        )
                        .await?;

                        let reopened = plan.new_status.is_some();
                        card.assignee_id = plan.assignee;
                        if let Some(status) = plan.new_status {
                            card.status = status;
                        }
                        card.updated_at = now;

                        diesel::update(cards::table.filter(cards::id.eq(card_id)))
                            .set(writeback_for(&card))
                            .execute(conn)
                            .await?;

                        Ok(Ok(AssignCardOutcome {
                            card,
                            assignment,
                            reopened,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(CardRepositoryError::rejected)
    }

    async fn update(
        &self,
        command: UpdateCardCommand,
    ) -> Result<UpdateCardOutcome, CardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;
        let UpdateCardCommand {
            card_id,
            update,
            acting_user,
            acting_is_admin,
            now,
        } = command;

        let result = conn
            .transaction::<Result<UpdateCardOutcome, DomainError>, diesel::result::Error, _>(
                |conn| {
                    async move {
                        let Some(card) = lock_card(conn, card_id).await? else {
                            return Ok(Err(DomainError::not_found(format!(
                                "card {card_id} not found"
                            ))));
                        };

                        let project_completed = projects::table
                            .filter(projects::id.eq(card.project_id))
                            .select(projects::completed)
                            .first::<bool>(conn)
                            .await?;

                        let time_log_count = time_logs::table
                            .filter(time_logs::card_id.eq(card_id))
                            .count()
                            .get_result::<i64>(conn)
                            .await?;

                        let candidate = match update.assignee.and_then(|change| change.to) {
                            Some(user) => Some(
                                load_candidate_snapshot(conn, card.project_id, user, card_id)
                                    .await?,
                            ),
                            None => None,
                        };

                        let ctx = UpdateContext {
                            time_log_count,
                            project_completed,
                            acting_is_admin,
                            candidate,
                        };
                        let plan = match decide_update(&card, &update, &ctx, now) {
                            Ok(plan) => plan,
                            Err(err) => return Ok(Err(err)),
                        };

                        if let Some(assignment) = &plan.assignment {
                            apply_assignment_plan(
                                conn,
                                card_id,
                                assignment,
                                acting_user,
                                None,
                                now,
                            )
                            .await?;
                        }

                        diesel::update(cards::table.filter(cards::id.eq(card_id)))
                            .set(writeback_for(&plan.card))
                            .execute(conn)
                            .await?;

                        Ok(Ok(UpdateCardOutcome {
                            card: plan.card,
                            changed: plan.changed,
                        }))
                    }
                    .scope_boxed()
                },
            )
            .await
            .map_err(query_error)?;

        result.map_err(CardRepositoryError::rejected)
    }

    async fn delete(&self, card_id: Uuid) -> Result<DeletedCard, CardRepositoryError> {
        let mut conn = self.pool.get().await.map_err(connection_error)?;

        let result = conn
            .transaction::<Result<DeletedCard, DomainError>, diesel::result::Error, _>(|conn| {
                async move {
                    let Some(card) = lock_card(conn, card_id).await? else {
                        return Ok(Err(DomainError::not_found(format!(
                            "card {card_id} not found"
                        ))));
                    };

                    // Child rows first; the card row last.
                    diesel::delete(time_logs::table.filter(time_logs::card_id.eq(card_id)))
                        .execute(conn)
                        .await?;
                    diesel::delete(
                        card_assignments::table.filter(card_assignments::card_id.eq(card_id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::delete(
                        super::schema::overtime_approvals::table
                            .filter(super::schema::overtime_approvals::card_id.eq(card_id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::delete(cards::table.filter(cards::id.eq(card_id)))
                        .execute(conn)
                        .await?;

                    Ok(Ok(DeletedCard {
                        card_id,
                        project_id: card.project_id,
                        title: card.title,
                    }))
                }
                .scope_boxed()
            })
            .await
            .map_err(query_error)?;

        result.map_err(CardRepositoryError::rejected)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for row conversion and error mapping.

    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_row() -> CardRow {
        let now = Utc::now();
        CardRow {
            id: Uuid::new_v4(),
            board_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Ship the release".to_owned(),
            description: None,
            priority: "MEDIUM".to_owned(),
            status: "IN_PROGRESS".to_owned(),
            due_date: None,
            deadline: Some(now),
            assignee_id: Some(Uuid::new_v4()),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    fn row_conversion_maps_enums_and_ids(valid_row: CardRow) {
        let assignee = valid_row.assignee_id;
        let card = row_to_card(valid_row).expect("valid row converts");
        assert_eq!(card.status, CardStatus::InProgress);
        assert_eq!(card.priority, CardPriority::Medium);
        assert_eq!(card.assignee_id.map(|id| *id.as_uuid()), assignee);
    }

    #[rstest]
    fn row_conversion_rejects_unknown_status(mut valid_row: CardRow) {
        valid_row.status = "ARCHIVED".to_owned();
        let err = row_to_card(valid_row).expect_err("unknown status fails");
        assert!(err.to_string().contains("ARCHIVED"));
    }

    #[rstest]
    fn pool_errors_map_to_connection_errors() {
        let err = connection_error(super::super::pool::PoolError::checkout("refused"));
        assert!(matches!(err, CardRepositoryError::Connection { .. }));
    }

    #[rstest]
    fn diesel_not_found_maps_to_query_error() {
        let err = query_error(diesel::result::Error::NotFound);
        assert!(matches!(err, CardRepositoryError::Query { .. }));
    }
}
