//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{card_assignments, cards, notifications, overtime_approvals, time_logs};

/// Row struct for reading from the cards table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = cards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CardRow {
    pub id: Uuid,
    pub board_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset struct for persisting a decided card update.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = cards)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct CardWriteback<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub priority: &'a str,
    pub status: &'a str,
    pub due_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Row struct for reading from the card_assignments table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = card_assignments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CardAssignmentRow {
    pub id: Uuid,
    pub card_id: Uuid,
    pub assigned_to: Uuid,
    pub assigned_by: Uuid,
    pub project_member_id: Uuid,
    pub reason: Option<String>,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
}

/// Insertable struct for creating new assignment records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = card_assignments)]
pub(crate) struct NewCardAssignmentRow<'a> {
    pub id: Uuid,
    pub card_id: Uuid,
    pub assigned_to: Uuid,
    pub assigned_by: Uuid,
    pub project_member_id: Uuid,
    pub reason: Option<&'a str>,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Row struct for reading from the time_logs table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = time_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TimeLogRow {
    pub id: Uuid,
    pub card_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
}

/// Insertable struct for creating new time log records.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = time_logs)]
pub(crate) struct NewTimeLogRow {
    pub id: Uuid,
    pub card_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
}

/// Row struct for reading from the overtime_approvals table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = overtime_approvals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OvertimeApprovalRow {
    pub id: Uuid,
    pub card_id: Uuid,
    pub requested_by: Uuid,
    pub reason: String,
    pub days_overdue: i64,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub approver_id: Option<Uuid>,
    pub approver_notes: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Insertable struct for creating new overtime requests.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = overtime_approvals)]
pub(crate) struct NewOvertimeApprovalRow<'a> {
    pub id: Uuid,
    pub card_id: Uuid,
    pub requested_by: Uuid,
    pub reason: &'a str,
    pub days_overdue: i64,
    pub status: &'a str,
    pub requested_at: DateTime<Utc>,
}

/// Insertable struct for persisting notification fan-out.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub(crate) struct NewNotificationRow<'a> {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: &'a str,
    pub card_id: Uuid,
    pub title: &'a str,
    pub acting_user_name: &'a str,
    pub detail: Option<&'a str>,
}
