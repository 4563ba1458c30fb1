use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use uuid::Uuid;

use queue_cell::*;
use shared_models::AppointmentStatus;
use super::{MockFailingStore, QueueTestUtils};

#[tokio::test]
async fn test_three_ahead_off_peak_without_history() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;

    for hour in [8, 9] {
        utils.book(Some(service), hour, 0, AppointmentStatus::Confirmed).await;
    }
    utils.book(Some(service), 9, 30, AppointmentStatus::Completed).await;
    utils.book(Some(service), 10, 0, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(10, 0), Some(service))
        .await;

    assert_matches!(outcome, EstimateOutcome::Computed(_));
    let estimate = outcome.estimate();
    assert_eq!(estimate.queue_count, 3);
    assert_eq!(estimate.service_duration_minutes, 30);
    assert_eq!(estimate.historical_average_minutes, 0);
    assert!(!estimate.peak_applied);
    assert_eq!(outcome.minutes(), 105);
}

#[tokio::test]
async fn test_empty_queue_estimates_zero() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Whitening", "45 minutes").await;
    utils.book(Some(service), 13, 0, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(13, 0), Some(service))
        .await;

    assert_eq!(outcome.minutes(), 0);
    assert!(!outcome.is_degraded());
}

#[tokio::test]
async fn test_queue_ignores_cancelled_later_and_other_services() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Filling", "40 minutes").await;
    let other = utils.create_service("Implant", "90 minutes").await;

    utils.book(Some(service), 8, 0, AppointmentStatus::Cancelled).await;
    utils.book(Some(other), 8, 30, AppointmentStatus::Confirmed).await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Confirmed).await;
    utils.book(Some(service), 10, 0, AppointmentStatus::Pending).await;
    utils.book(Some(service), 11, 0, AppointmentStatus::Pending).await;
    utils.book_on(utils.date.pred_opt().unwrap(), Some(service), 8, 0, AppointmentStatus::Completed).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(10, 0), Some(service))
        .await;

    assert_eq!(outcome.estimate().queue_count, 1);
    assert_eq!(outcome.minutes(), 45);
}

#[tokio::test]
async fn test_peak_hour_applies_multiplier() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;

    for minute in [0, 10, 20, 30] {
        utils.book(Some(service), 12, minute, AppointmentStatus::Confirmed).await;
    }
    utils.book(Some(service), 13, 0, AppointmentStatus::Pending).await;
    utils.book(Some(service), 15, 0, AppointmentStatus::Pending).await;

    let estimator = utils.estimator();

    let at_one = estimator
        .estimate(utils.date, QueueTestUtils::at(13, 0), Some(service))
        .await;
    assert!(at_one.estimate().peak_applied);
    assert_eq!(at_one.estimate().queue_count, 4);
    assert_eq!(at_one.minutes(), 210); // 4 * 35 * 1.5

    let at_three = estimator
        .estimate(utils.date, QueueTestUtils::at(15, 0), Some(service))
        .await;
    assert!(!at_three.estimate().peak_applied);
    assert_eq!(at_three.minutes(), 175); // 5 * 35
}

#[tokio::test]
async fn test_history_is_blended_in() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Gum treatment", "20 minutes").await;

    for hour in [8, 9, 10, 11] {
        utils.book(Some(service), hour, 0, AppointmentStatus::Confirmed).await;
    }
    utils.book(Some(service), 11, 30, AppointmentStatus::Pending).await;

    utils.seed_statistics(service, 1, 40, 5).await;
    utils.seed_statistics(service, 7, 60, 3).await;
    // Ignored: no completions, and outside the lookback window.
    utils.seed_statistics(service, 2, 500, 0).await;
    utils.seed_statistics(service, 45, 500, 8).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(11, 30), Some(service))
        .await;

    assert_eq!(outcome.estimate().base_wait_minutes, 100);
    assert_eq!(outcome.estimate().historical_average_minutes, 50);
    assert_eq!(outcome.minutes(), 88);
}

#[tokio::test]
async fn test_lookback_window_is_inclusive() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Extraction", "35 minutes").await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Pending).await;

    utils.seed_statistics(service, 30, 20, 2).await;
    utils.seed_statistics(service, 31, 100, 2).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(9, 0), Some(service))
        .await;

    assert_eq!(outcome.estimate().historical_average_minutes, 20);
    assert_eq!(outcome.minutes(), 5);

    let short = QueueConfig { lookback_days: 7, ..QueueConfig::default() };
    let outcome = utils
        .estimator_with(short)
        .estimate(utils.date, QueueTestUtils::at(9, 0), Some(service))
        .await;

    assert_eq!(outcome.minutes(), 0);
}

#[tokio::test]
async fn test_unbounded_lookback_reaches_all_history() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Extraction", "35 minutes").await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Pending).await;

    utils.seed_statistics(service, 30, 20, 2).await;
    utils.seed_statistics(service, 31, 100, 2).await;

    let unbounded = QueueConfig { lookback_days: u32::MAX, ..QueueConfig::default() };
    let outcome = utils
        .estimator_with(unbounded)
        .estimate(utils.date, QueueTestUtils::at(9, 0), Some(service))
        .await;

    assert!(!outcome.is_degraded());
    assert_eq!(outcome.estimate().historical_average_minutes, 60);
    assert_eq!(outcome.minutes(), 15);
}

#[tokio::test]
async fn test_unknown_service_falls_back_to_default_duration() {
    let utils = QueueTestUtils::new();
    let ghost = Uuid::new_v4();

    utils.book(Some(ghost), 9, 0, AppointmentStatus::Confirmed).await;
    utils.book(Some(ghost), 10, 0, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(10, 0), Some(ghost))
        .await;

    assert_eq!(outcome.fallback_reasons(), &[FallbackReason::ServiceNotFound(ghost)]);
    assert_eq!(outcome.estimate().service_duration_minutes, 30);
    assert_eq!(outcome.minutes(), 35);
}

#[tokio::test]
async fn test_unreadable_duration_is_reported() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Consultation", "depends on the case").await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Confirmed).await;
    utils.book(Some(service), 9, 30, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(9, 30), Some(service))
        .await;

    assert_matches!(
        outcome.fallback_reasons(),
        [FallbackReason::DurationUnparseable(text)] if text == "depends on the case"
    );
    assert_eq!(outcome.minutes(), 35);
}

#[tokio::test]
async fn test_missing_service_reference_counts_whole_day() {
    let utils = QueueTestUtils::new();
    let braces = utils.create_service("Braces", "2 hours").await;
    let cleaning = utils.create_service("Cleaning", "30 minutes").await;

    utils.book(Some(braces), 8, 0, AppointmentStatus::Confirmed).await;
    utils.book(Some(cleaning), 8, 30, AppointmentStatus::Confirmed).await;
    utils.book(None, 9, 0, AppointmentStatus::Pending).await;

    let outcome = utils
        .estimator()
        .estimate(utils.date, QueueTestUtils::at(9, 0), None)
        .await;

    assert_eq!(outcome.fallback_reasons(), &[FallbackReason::ServiceUnspecified]);
    assert_eq!(outcome.estimate().queue_count, 2);
    assert_eq!(outcome.minutes(), 70);
}

#[tokio::test]
async fn test_custom_buffer_is_used() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Confirmed).await;
    utils.book(Some(service), 10, 0, AppointmentStatus::Pending).await;

    let config = QueueConfig { buffer_minutes: 15, ..QueueConfig::default() };
    let outcome = utils
        .estimator_with(config)
        .estimate(utils.date, QueueTestUtils::at(10, 0), Some(service))
        .await;

    assert_eq!(outcome.minutes(), 45);
}

#[tokio::test]
async fn test_record_queue_entry_persists_estimate() {
    let utils = QueueTestUtils::new();
    let service = utils.create_service("Cleaning", "30 minutes").await;
    utils.book(Some(service), 9, 0, AppointmentStatus::Confirmed).await;

    let appointment = shared_models::Appointment::new(
        Uuid::new_v4(),
        Some(service),
        utils.date,
        QueueTestUtils::at(9, 45),
    )
    .with_queue_number(2);
    utils.store.insert_appointment(appointment.clone()).await;

    let estimator = utils.estimator();
    let entry = estimator
        .record_queue_entry(&appointment)
        .await
        .expect("Failed to record queue entry");

    assert_eq!(entry.appointment_id, appointment.id);
    assert_eq!(entry.estimated_wait_minutes, 35);
    assert_eq!(entry.queue_position, Some(2));
    assert_eq!(entry.scheduled_start_time, utils.date.and_time(QueueTestUtils::at(9, 45)));
    assert_eq!(utils.store.queue_entry(appointment.id).await, Some(entry));

    let duplicate = estimator.record_queue_entry(&appointment).await;
    assert_matches!(duplicate, Err(QueueError::DuplicateEntry(id)) if id == appointment.id);
}

#[tokio::test]
async fn test_store_failures_degrade_to_zero() {
    let mut store = MockFailingStore::new();
    store
        .expect_count_appointments()
        .returning(|_, _, _, _| Err(super::unavailable()));
    store
        .expect_service_duration()
        .returning(|_| Err(super::unavailable()));
    store
        .expect_average_wait_between()
        .returning(|_, _, _| Err(super::unavailable()));

    let store = Arc::new(store);
    let estimator = WaitEstimator::new(store.clone(), store, QueueConfig::default());

    let outcome = estimator
        .estimate(
            NaiveDate::from_ymd_opt(2026, 4, 15).unwrap(),
            QueueTestUtils::at(13, 0),
            Some(Uuid::new_v4()),
        )
        .await;

    assert_eq!(outcome.minutes(), 0);
    assert_matches!(
        outcome.fallback_reasons(),
        [
            FallbackReason::QueueCountFailed(_),
            FallbackReason::ServiceLookupFailed(_),
            FallbackReason::HistoryLookupFailed(_),
        ]
    );
}

#[tokio::test]
async fn test_history_failure_keeps_count_based_estimate() {
    let mut store = MockFailingStore::new();
    store
        .expect_count_appointments()
        .returning(|_, _, _, _| Ok(3));
    store
        .expect_service_duration()
        .returning(|_| Ok(Some("1 hour".to_string())));
    store
        .expect_average_wait_between()
        .returning(|_, _, _| Err(super::unavailable()));

    let store = Arc::new(store);
    let estimator = WaitEstimator::new(store.clone(), store, QueueConfig::default());

    let outcome = estimator
        .estimate(
            NaiveDate::from_ymd_opt(2026, 4, 15).unwrap(),
            QueueTestUtils::at(10, 0),
            Some(Uuid::new_v4()),
        )
        .await;

    assert_eq!(outcome.minutes(), 130); // 2 * (60 + 5)
    assert_matches!(outcome.fallback_reasons(), [FallbackReason::HistoryLookupFailed(_)]);
}
