//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are
//! used by Diesel for compile-time query validation and type-safe SQL
//! generation. When migrations change the schema, regenerate or update
//! these definitions to match.

diesel::table! {
    /// User accounts, managed by the external account system.
    users (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Name rendered in notifications and board views.
        display_name -> Varchar,
        /// System-wide role: ADMIN, LEADER, or MEMBER.
        global_role -> Varchar,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Projects scoping membership and exclusivity checks.
    projects (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Project name.
        name -> Varchar,
        /// Who created the project.
        creator_id -> Uuid,
        /// Completed projects relax the one-task-per-user rule.
        completed -> Bool,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Boards grouping cards within a project.
    boards (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Board name.
        name -> Varchar,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Membership join table giving a user a role in one project.
    ///
    /// Partial unique indexes enforce at most one LEADER per project and at
    /// most one LEADER membership per user system-wide.
    project_members (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// The project.
        project_id -> Uuid,
        /// The member.
        user_id -> Uuid,
        /// Project role: LEADER, DEVELOPER, DESIGNER, or OBSERVER.
        role -> Varchar,
        /// When the membership was granted.
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    /// Units of work on a board.
    ///
    /// `assignee_id` denormalises the active assignment's `assigned_to`;
    /// both are rewritten in the same transaction, never independently.
    cards (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Board the card sits on.
        board_id -> Uuid,
        /// Project scoping the card.
        project_id -> Uuid,
        /// Short summary line.
        title -> Varchar,
        /// Optional long-form description.
        description -> Nullable<Text>,
        /// Priority: LOW, MEDIUM, or HIGH.
        priority -> Varchar,
        /// Status: TODO, IN_PROGRESS, REVIEW, or DONE.
        status -> Varchar,
        /// Soft target date.
        due_date -> Nullable<Timestamptz>,
        /// Hard deadline gating the overtime workflow.
        deadline -> Nullable<Timestamptz>,
        /// Current worker of record.
        assignee_id -> Nullable<Uuid>,
        /// Who created the card.
        created_by -> Uuid,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Historical assignment records; deactivated, never deleted.
    ///
    /// A partial unique index on `(card_id) WHERE is_active` backs the
    /// one-active-assignment-per-card invariant under concurrent writes.
    card_assignments (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// The card.
        card_id -> Uuid,
        /// The worker of record.
        assigned_to -> Uuid,
        /// Who performed the assignment.
        assigned_by -> Uuid,
        /// Membership row of the assignee at assignment time.
        project_member_id -> Uuid,
        /// Free-form justification.
        reason -> Nullable<Text>,
        /// Whether this is the card's current assignment.
        is_active -> Bool,
        /// When the assignment was made.
        assigned_at -> Timestamptz,
        /// When the assignment was superseded.
        unassigned_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Work sessions; an open row (`end_time IS NULL`) is a running timer.
    ///
    /// A partial unique index on `(user_id) WHERE end_time IS NULL` backs
    /// the one-running-timer-per-user invariant under concurrent writes.
    time_logs (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// The card the session ran against.
        card_id -> Uuid,
        /// Who logged the session.
        user_id -> Uuid,
        /// When the session started.
        start_time -> Timestamptz,
        /// When the session ended; NULL while running.
        end_time -> Nullable<Timestamptz>,
        /// Session length. Historical column name; the value is seconds.
        duration_minutes -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Requests to keep working past a card's deadline.
    ///
    /// A partial unique index on `(card_id, requested_by) WHERE status =
    /// 'PENDING'` backs the single-pending-request invariant.
    overtime_approvals (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// The card.
        card_id -> Uuid,
        /// The requesting assignee.
        requested_by -> Uuid,
        /// Why the work ran over.
        reason -> Text,
        /// Whole days past the deadline at request time.
        days_overdue -> Int8,
        /// Status: PENDING, APPROVED, or REJECTED.
        status -> Varchar,
        /// When the request was filed.
        requested_at -> Timestamptz,
        /// Who resolved the request.
        approver_id -> Nullable<Uuid>,
        /// Free-form notes from the approver.
        approver_notes -> Nullable<Text>,
        /// When the request was resolved.
        responded_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Persisted notification fan-out records; delivery is external.
    notifications (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Who the notification is for.
        recipient_id -> Uuid,
        /// What happened, e.g. card_assigned.
        kind -> Varchar,
        /// Card the notification concerns; no FK so history survives
        /// card deletion.
        card_id -> Uuid,
        /// Card title at event time.
        title -> Varchar,
        /// Display name of whoever acted.
        acting_user_name -> Varchar,
        /// Optional extra line.
        detail -> Nullable<Text>,
        /// Whether the recipient has seen it.
        read -> Bool,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(boards -> projects (project_id));
diesel::joinable!(cards -> boards (board_id));
diesel::joinable!(cards -> projects (project_id));
diesel::joinable!(card_assignments -> cards (card_id));
diesel::joinable!(time_logs -> cards (card_id));
diesel::joinable!(overtime_approvals -> cards (card_id));
diesel::joinable!(project_members -> projects (project_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    projects,
    boards,
    project_members,
    cards,
    card_assignments,
    time_logs,
    overtime_approvals,
    notifications,
);
