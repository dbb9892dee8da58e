//! Regression coverage for the time tracking service.

use chrono::{DateTime, Duration, Local, Utc};
use mockable::Clock;
use rstest::rstest;

use super::*;
use crate::domain::ErrorCode;
use crate::domain::card::{Card, CardPriority, CardStatus};
use crate::domain::events::ChannelKey as EventChannel;
use crate::domain::ports::{MockEventPublisher, MockTimeLogRepository, TimeLogRepositoryError};
use crate::domain::time_tracking::TimeLog;
use crate::domain::user::{GlobalRole, UserId};

struct FixtureClock(DateTime<Utc>);

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

fn make_actor() -> Actor {
    Actor {
        user_id: UserId::random(),
        global_role: GlobalRole::Member,
    }
}

fn running_card(user_id: UserId) -> Card {
    let now = Utc::now();
    Card {
        id: Uuid::new_v4(),
        board_id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        title: "Ship the release".to_owned(),
        description: None,
        priority: CardPriority::Medium,
        status: CardStatus::InProgress,
        due_date: None,
        deadline: None,
        assignee_id: Some(user_id),
        created_by: UserId::random(),
        created_at: now,
        updated_at: now,
    }
}

fn open_log(card_id: Uuid, user_id: UserId, started: DateTime<Utc>) -> TimeLog {
    TimeLog {
        id: Uuid::new_v4(),
        card_id,
        user_id,
        start_time: started,
        end_time: None,
        duration_minutes: None,
    }
}

fn service_with(
    repo: MockTimeLogRepository,
    publisher: MockEventPublisher,
    now: DateTime<Utc>,
) -> TimeTrackingService<MockTimeLogRepository, MockEventPublisher> {
    TimeTrackingService::new(
        Arc::new(repo),
        Arc::new(publisher),
        Arc::new(FixtureClock(now)),
    )
}

#[rstest]
#[tokio::test]
async fn start_publishes_on_the_card_and_project_channels() {
    let actor = make_actor();
    let now = Utc::now();
    let card = running_card(actor.user_id);
    let card_id = card.id;
    let project_id = card.project_id;
    let log = open_log(card_id, actor.user_id, now);

    let mut repo = MockTimeLogRepository::new();
    {
        let outcome = StartTimerOutcome {
            log: log.clone(),
            card: card.clone(),
            claimed: true,
        };
        repo.expect_start()
            .withf(move |command| command.card_id == card_id && command.now == now)
            .times(1)
            .return_once(move |_| Ok(outcome));
    }

    let mut publisher = MockEventPublisher::new();
    publisher
        .expect_publish()
        .withf(move |events| {
            events.len() == 2
                && events[0].name == EVENT_TIMELOG_STARTED
                && events[0].channel == EventChannel::Card(card_id)
                && events[1].name == EVENT_CARD_UPDATED
                && events[1].channel == EventChannel::Project(project_id)
        })
        .times(1)
        .return_once(|_| Ok(()));

    let service = service_with(repo, publisher, now);
    let outcome = service
        .start(actor, card_id)
        .await
        .expect("start succeeds");
    assert!(outcome.log.is_running());
    assert_eq!(outcome.card.status, CardStatus::InProgress);
}

#[rstest]
#[tokio::test]
async fn start_surfaces_a_store_rejection() {
    let actor = make_actor();
    let mut repo = MockTimeLogRepository::new();
    repo.expect_start().return_once(|_| {
        Err(TimeLogRepositoryError::rejected(
            crate::domain::Error::conflict("a timer is already running for this user"),
        ))
    });

    let service = service_with(repo, MockEventPublisher::new(), Utc::now());
    let err = service
        .start(actor, Uuid::new_v4())
        .await
        .expect_err("rejection propagates");
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[rstest]
#[tokio::test]
async fn stop_publishes_only_the_stopped_event() {
    let actor = make_actor();
    let started = Utc::now() - Duration::seconds(65);
    let now = started + Duration::seconds(65);
    let card_id = Uuid::new_v4();
    let mut log = open_log(card_id, actor.user_id, started);
    log.end_time = Some(now);
    log.duration_minutes = Some(65);
    let log_id = log.id;

    let mut repo = MockTimeLogRepository::new();
    {
        let log = log.clone();
        repo.expect_stop()
            .withf(move |command| command.time_log_id == log_id && command.now == now)
            .times(1)
            .return_once(move |_| {
                Ok(StopTimerOutcome {
                    log,
                    project_id: Uuid::new_v4(),
                })
            });
    }

    let mut publisher = MockEventPublisher::new();
    publisher
        .expect_publish()
        .withf(move |events| {
            events.len() == 1
                && events[0].name == EVENT_TIMELOG_STOPPED
                && events[0].channel == EventChannel::Card(card_id)
        })
        .times(1)
        .return_once(|_| Ok(()));

    let service = service_with(repo, publisher, now);
    let outcome = service.stop(actor, log_id).await.expect("stop succeeds");
    assert_eq!(outcome.log.duration_minutes, Some(65));
}

#[rstest]
#[tokio::test]
async fn a_failed_publish_does_not_fail_the_stop() {
    let actor = make_actor();
    let now = Utc::now();
    let log = open_log(Uuid::new_v4(), actor.user_id, now - Duration::seconds(5));

    let mut repo = MockTimeLogRepository::new();
    {
        let log = log.clone();
        repo.expect_stop().return_once(move |_| {
            Ok(StopTimerOutcome {
                log,
                project_id: Uuid::new_v4(),
            })
        });
    }

    let mut publisher = MockEventPublisher::new();
    publisher.expect_publish().return_once(|_| {
        Err(crate::domain::ports::EventPublishError::unavailable(
            "hub gone",
        ))
    });

    let service = service_with(repo, publisher, now);
    service
        .stop(actor, log.id)
        .await
        .expect("commit wins over broadcast");
}
