//! Service wiring: pool, adapters, domain services, broadcast hub.

use std::sync::Arc;

use mockable::DefaultClock;

use crate::domain::assignment_service::AssignmentService;
use crate::domain::card_update_service::CardUpdateService;
use crate::domain::overtime_service::OvertimeService;
use crate::domain::time_tracking_service::TimeTrackingService;
use crate::outbound::persistence::{
    DbPool, DieselCardRepository, DieselMembershipRepository, DieselNotificationGateway,
    DieselOvertimeRepository, DieselTimeLogRepository,
};
use crate::ws::EventHub;

/// Assignment service over the PostgreSQL adapters.
pub type PgAssignmentService = AssignmentService<
    DieselCardRepository,
    DieselMembershipRepository,
    EventHub,
    DieselNotificationGateway<EventHub>,
>;

/// Card update service over the PostgreSQL adapters.
pub type PgCardUpdateService = CardUpdateService<
    DieselCardRepository,
    DieselMembershipRepository,
    EventHub,
    DieselNotificationGateway<EventHub>,
>;

/// Time tracking service over the PostgreSQL adapters.
pub type PgTimeTrackingService = TimeTrackingService<DieselTimeLogRepository, EventHub>;

/// Overtime service over the PostgreSQL adapters.
pub type PgOvertimeService =
    OvertimeService<DieselOvertimeRepository, DieselMembershipRepository, DieselNotificationGateway<EventHub>>;

/// Everything the HTTP layer needs, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    /// Assignment operations.
    pub assignment: PgAssignmentService,
    /// Card update and delete operations.
    pub card_update: PgCardUpdateService,
    /// Timer start/stop operations.
    pub time_tracking: PgTimeTrackingService,
    /// Overtime request/resolve operations.
    pub overtime: PgOvertimeService,
    /// Broadcast hub shared with the WebSocket entry point.
    pub hub: Arc<EventHub>,
}

/// Wire the full service graph over a database pool.
#[must_use]
pub fn build_services(pool: DbPool) -> AppServices {
    let hub = Arc::new(EventHub::new());
    let clock = Arc::new(DefaultClock);

    let card_repo = Arc::new(DieselCardRepository::new(pool.clone()));
    let membership_repo = Arc::new(DieselMembershipRepository::new(pool.clone()));
    let time_log_repo = Arc::new(DieselTimeLogRepository::new(pool.clone()));
    let overtime_repo = Arc::new(DieselOvertimeRepository::new(pool.clone()));
    let notifier = Arc::new(DieselNotificationGateway::new(pool, Arc::clone(&hub)));

    AppServices {
        assignment: AssignmentService::new(
            Arc::clone(&card_repo),
            Arc::clone(&membership_repo),
            Arc::clone(&hub),
            Arc::clone(&notifier),
            clock.clone(),
        ),
        card_update: CardUpdateService::new(
            card_repo,
            Arc::clone(&membership_repo),
            Arc::clone(&hub),
            Arc::clone(&notifier),
            clock.clone(),
        ),
        time_tracking: TimeTrackingService::new(time_log_repo, Arc::clone(&hub), clock.clone()),
        overtime: OvertimeService::new(overtime_repo, membership_repo, notifier, clock),
        hub,
    }
}
