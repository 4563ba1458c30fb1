use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use queue_cell::*;
use shared_models::{Appointment, AppointmentStatus};
use super::{MockFailingStore, QueueTestUtils};

/// Books a completed appointment and records its observed wait and duration.
async fn complete_with_actuals(
    utils: &QueueTestUtils,
    service_id: Uuid,
    hour: u32,
    wait_minutes: i64,
    duration_minutes: i64,
) -> Appointment {
    let appointment = utils.book(Some(service_id), hour, 0, AppointmentStatus::Completed).await;
    utils
        .store
        .create_queue_entry(QueueHistoryEntry::new(&appointment, 15))
        .await
        .expect("Failed to create queue entry");

    let started = appointment.scheduled_start() + Duration::minutes(wait_minutes);
    utils
        .store
        .update_queue_entry(appointment.id, |entry| {
            entry.mark_started(started);
            entry.mark_finished(started + Duration::minutes(duration_minutes));
        })
        .await
        .expect("Failed to update queue entry");

    appointment
}

fn completed_row(service_id: Uuid) -> AppointmentWithHistory {
    let appointment = Appointment::new(
        Uuid::new_v4(),
        Some(service_id),
        QueueTestUtils::new().date,
        QueueTestUtils::at(9, 0),
    )
    .with_status(AppointmentStatus::Completed);

    let mut entry = QueueHistoryEntry::new(&appointment, 5);
    entry.actual_wait_minutes = Some(12);
    entry.service_duration_minutes = Some(25);

    AppointmentWithHistory {
        appointment,
        history: Some(entry),
    }
}

#[tokio::test]
async fn test_recompute_aggregates_per_service() {
    let utils = QueueTestUtils::new();
    let cleaning = utils.create_service("Cleaning", "30 minutes").await;
    let implant = utils.create_service("Implant", "90 minutes").await;

    complete_with_actuals(&utils, cleaning, 9, 10, 30).await;
    complete_with_actuals(&utils, cleaning, 10, 25, 35).await;
    complete_with_actuals(&utils, cleaning, 11, 4, 28).await;
    complete_with_actuals(&utils, implant, 14, 40, 95).await;
    // Still waiting, so not part of the day's statistics.
    utils.book(Some(cleaning), 16, 0, AppointmentStatus::Confirmed).await;

    let report = utils.aggregator().recompute(utils.date, None).await;

    assert!(report.is_clean());
    assert_eq!(report.updated.len(), 2);

    let stats = utils
        .store
        .get_statistics(cleaning, utils.date)
        .await
        .unwrap()
        .expect("Cleaning statistics should exist");
    assert_eq!(stats.total_appointments, 3);
    assert_eq!(stats.completed_appointments, 3);
    assert_eq!(stats.average_wait_minutes, 13);
    assert_eq!(stats.min_wait_minutes, 4);
    assert_eq!(stats.max_wait_minutes, 25);
    assert_eq!(stats.average_service_duration_minutes, 31);

    let implant_stats = utils.store.get_statistics(implant, utils.date).await.unwrap().unwrap();
    assert_eq!(implant_stats.average_wait_minutes, 40);
    assert_eq!(implant_stats.average_service_duration_minutes, 95);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Filling", "40 minutes").await;
    complete_with_actuals(&utils, service, 9, 8, 40).await;
    complete_with_actuals(&utils, service, 10, 12, 45).await;

    let aggregator = utils.aggregator();
    aggregator.recompute(utils.date, Some(service)).await;
    let first = utils.store.get_statistics(service, utils.date).await.unwrap();

    aggregator.recompute(utils.date, Some(service)).await;
    let second = utils.store.get_statistics(service, utils.date).await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(utils.store.statistics_rows().await.len(), 1);
}

#[tokio::test]
async fn test_no_recorded_actuals_uses_defaults() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Whitening", "45 minutes").await;

    let no_show = utils.book(Some(service), 9, 0, AppointmentStatus::Completed).await;
    utils
        .store
        .create_queue_entry(QueueHistoryEntry::new(&no_show, 0))
        .await
        .unwrap();
    utils.store.update_queue_entry(no_show.id, |e| e.mark_no_show()).await.unwrap();
    utils.book(Some(service), 10, 0, AppointmentStatus::Completed).await;

    let report = utils.aggregator().recompute(utils.date, None).await;

    assert_eq!(
        report.updated,
        vec![QueueStatistics {
            service_id: service,
            appointment_date: utils.date,
            total_appointments: 2,
            completed_appointments: 0,
            average_wait_minutes: 0,
            min_wait_minutes: 0,
            max_wait_minutes: 0,
            average_service_duration_minutes: 30,
        }]
    );
}

#[tokio::test]
async fn test_service_filter_limits_recompute() {
    let utils = QueueTestUtils::new();
    let cleaning = utils.create_service("Cleaning", "30 minutes").await;
    let braces = utils.create_service("Braces", "2 hours").await;
    complete_with_actuals(&utils, cleaning, 9, 5, 30).await;
    complete_with_actuals(&utils, braces, 10, 20, 120).await;

    let report = utils.aggregator().recompute(utils.date, Some(braces)).await;

    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].service_id, braces);
    assert!(utils.store.get_statistics(cleaning, utils.date).await.unwrap().is_none());
}

#[tokio::test]
async fn test_appointments_without_service_are_skipped() {
    let utils = QueueTestUtils::new();
    utils.book(None, 9, 0, AppointmentStatus::Completed).await;

    let report = utils.aggregator().recompute(utils.date, None).await;

    assert!(report.is_clean());
    assert!(report.updated.is_empty());
    assert!(utils.store.statistics_rows().await.is_empty());
}

#[tokio::test]
async fn test_recompute_today_uses_clock() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;
    complete_with_actuals(&utils, service, 9, 6, 30).await;

    let aggregator = utils.aggregator();
    assert_eq!(aggregator.today(), utils.date);

    let report = aggregator.recompute_today().await;

    assert_eq!(report.appointment_date, utils.date);
    assert_eq!(report.updated.len(), 1);

    let scoped = aggregator.recompute(aggregator.today(), Some(service)).await;
    assert_eq!(scoped.appointment_date, utils.date);
    assert_eq!(scoped.updated, report.updated);
}

#[tokio::test]
async fn test_statistics_feed_next_estimate() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;
    complete_with_actuals(&utils, service, 9, 20, 30).await;
    complete_with_actuals(&utils, service, 10, 40, 30).await;
    utils.aggregator().recompute(utils.date, None).await;

    let next_day = utils.date.succ_opt().unwrap();
    utils.book_on(next_day, Some(service), 9, 0, AppointmentStatus::Confirmed).await;
    utils.book_on(next_day, Some(service), 10, 0, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(next_day, QueueTestUtils::at(10, 0), Some(service))
        .await;

    // base 35, history 30: 26.25 + 7.5
    assert_eq!(outcome.estimate().historical_average_minutes, 30);
    assert_eq!(outcome.minutes(), 34);
}

#[tokio::test]
async fn test_one_failed_upsert_does_not_block_others() {
    let failing = Uuid::new_v4();
    let healthy = Uuid::new_v4();
    let rows = vec![completed_row(failing), completed_row(healthy), completed_row(healthy)];

    let mut store = MockFailingStore::new();
    store
        .expect_appointments_with_history()
        .times(1)
        .returning(move |_, _, _| Ok(rows.clone()));
    store
        .expect_upsert_statistics()
        .times(2)
        .returning(move |stats| {
            if stats.service_id == failing {
                Err(super::unavailable())
            } else {
                Ok(())
            }
        });

    let store = Arc::new(store);
    let aggregator = StatisticsAggregator::new(store.clone(), store, &QueueConfig::default());
    let report = aggregator.recompute(QueueTestUtils::new().date, None).await;

    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].service_id, healthy);
    assert_eq!(report.updated[0].total_appointments, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].service_id, Some(failing));
}

#[tokio::test]
async fn test_load_failure_is_reported() {
    let mut store = MockFailingStore::new();
    store
        .expect_appointments_with_history()
        .returning(|_, _, _| Err(super::unavailable()));
    store.expect_upsert_statistics().never();

    let store = Arc::new(store);
    let aggregator = StatisticsAggregator::new(store.clone(), store, &QueueConfig::default());
    let report = aggregator.recompute(QueueTestUtils::new().date, None).await;

    assert!(report.updated.is_empty());
    assert_matches!(report.failures.as_slice(), [AggregationFailure { service_id: None, .. }]);
}
