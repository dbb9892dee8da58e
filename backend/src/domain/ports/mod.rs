//! Driven ports of the work-assignment engine.
//!
//! Traits the domain services depend on, implemented by outbound adapters
//! (PostgreSQL, the WebSocket hub) and mocked or replaced in tests. Store
//! ports expose whole transactional operations: the atomicity contract —
//! precondition reads and dependent writes in one transaction — lives
//! behind the port boundary.

pub(crate) mod macros;

mod card_repository;
mod event_publisher;
mod membership_repository;
mod notification_gateway;
mod overtime_repository;
mod time_log_repository;

pub use card_repository::{
    AssignCardCommand, AssignCardOutcome, CardRepository, CardRepositoryError, DeletedCard,
    UpdateCardCommand, UpdateCardOutcome,
};
#[cfg(test)]
pub use card_repository::MockCardRepository;
pub use event_publisher::{EventPublishError, EventPublisher, FixtureEventPublisher};
#[cfg(test)]
pub use event_publisher::MockEventPublisher;
pub use membership_repository::{MembershipRepository, MembershipRepositoryError};
#[cfg(test)]
pub use membership_repository::MockMembershipRepository;
pub use notification_gateway::{
    FixtureNotificationGateway, NotificationGateway, NotificationGatewayError, NotificationKind,
    NotificationRequest,
};
#[cfg(test)]
pub use notification_gateway::MockNotificationGateway;
pub use overtime_repository::{
    OvertimeRepository, OvertimeRepositoryError, RequestOvertimeCommand, RequestOvertimeOutcome,
    ResolveOvertimeCommand, ResolveOvertimeOutcome,
};
#[cfg(test)]
pub use overtime_repository::MockOvertimeRepository;
pub use time_log_repository::{
    StartTimerCommand, StartTimerOutcome, StopTimerCommand, StopTimerOutcome, TimeLogRepository,
    TimeLogRepositoryError,
};
#[cfg(test)]
pub use time_log_repository::MockTimeLogRepository;
