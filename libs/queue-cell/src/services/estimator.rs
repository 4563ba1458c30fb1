use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::QueueConfig;
use shared_models::{Appointment, AppointmentStatus};

use crate::services::duration::parse_duration;
use crate::services::store::{AppointmentStore, StatisticsStore};
use crate::{EstimateOutcome, FallbackReason, QueueError, QueueHistoryEntry, WaitEstimate};

/// Predicts how long a newly booked patient will wait past their slot.
///
/// The queue count is read as a point-in-time snapshot, so two bookings racing
/// for adjacent slots can both see the same count and receive the same
/// estimate. Estimates are advisory and no locking is attempted.
pub struct WaitEstimator {
    appointments: Arc<dyn AppointmentStore>,
    statistics: Arc<dyn StatisticsStore>,
    config: QueueConfig,
}

impl WaitEstimator {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        statistics: Arc<dyn StatisticsStore>,
        config: QueueConfig,
    ) -> Self {
        Self {
            appointments,
            statistics,
            config,
        }
    }

    /// Estimates the wait for a candidate appointment.
    ///
    /// Never fails: every lookup that goes wrong is replaced by its default and
    /// reported through [`EstimateOutcome::Degraded`].
    #[instrument(skip(self))]
    pub async fn estimate(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service_id: Option<Uuid>,
    ) -> EstimateOutcome {
        let mut reasons = Vec::new();

        let queue_count = self.queue_count(date, time, service_id, &mut reasons).await;
        let service_duration = self.service_duration(service_id, &mut reasons).await;
        let historical_average = match service_id {
            Some(id) => self.historical_average(id, date, &mut reasons).await,
            None => 0,
        };

        let estimate = compute_wait(
            &self.config,
            queue_count,
            service_duration,
            historical_average,
            time.hour(),
        );

        info!(
            "Estimated wait for service {:?} on {} at {}: {} minutes (queue: {}, historical: {})",
            service_id, date, time, estimate.minutes, queue_count, historical_average
        );

        if !reasons.is_empty() {
            warn!("Wait estimate degraded: {:?}", reasons);
        }

        EstimateOutcome::from_parts(estimate, reasons)
    }

    /// Estimates the appointment's wait and stores its queue-history entry.
    ///
    /// The store rejects a second entry for the same appointment with
    /// [`QueueError::DuplicateEntry`].
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn record_queue_entry(
        &self,
        appointment: &Appointment,
    ) -> Result<QueueHistoryEntry, QueueError> {
        let outcome = self
            .estimate(
                appointment.appointment_date,
                appointment.appointment_time,
                appointment.service_id,
            )
            .await;

        let entry = QueueHistoryEntry::new(appointment, outcome.minutes());

        match self.appointments.create_queue_entry(entry).await {
            Ok(created) => {
                info!(
                    "Queue history recorded for appointment {} ({} minutes estimated)",
                    appointment.id, created.estimated_wait_minutes
                );
                Ok(created)
            }
            Err(e) => {
                error!("Failed to record queue history for appointment {}: {}", appointment.id, e);
                Err(e)
            }
        }
    }

    async fn queue_count(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service_id: Option<Uuid>,
        reasons: &mut Vec<FallbackReason>,
    ) -> u32 {
        match self
            .appointments
            .count_appointments(date, time, &AppointmentStatus::ACTIVE, service_id)
            .await
        {
            // The candidate itself is part of the count.
            Ok(count) => count.saturating_sub(1),
            Err(e) => {
                error!("Queue count failed for {} {}: {}", date, time, e);
                reasons.push(FallbackReason::QueueCountFailed(e.to_string()));
                0
            }
        }
    }

    async fn service_duration(
        &self,
        service_id: Option<Uuid>,
        reasons: &mut Vec<FallbackReason>,
    ) -> u32 {
        let default = self.config.default_service_minutes;

        let Some(service_id) = service_id else {
            reasons.push(FallbackReason::ServiceUnspecified);
            return default;
        };

        match self.appointments.service_duration(service_id).await {
            Ok(Some(text)) => parse_duration(&text).unwrap_or_else(|| {
                debug!("Unreadable duration '{}' for service {}", text, service_id);
                reasons.push(FallbackReason::DurationUnparseable(text));
                default
            }),
            Ok(None) => {
                reasons.push(FallbackReason::ServiceNotFound(service_id));
                default
            }
            Err(e) => {
                error!("Service lookup failed for {}: {}", service_id, e);
                reasons.push(FallbackReason::ServiceLookupFailed(e.to_string()));
                default
            }
        }
    }

    async fn historical_average(
        &self,
        service_id: Uuid,
        date: NaiveDate,
        reasons: &mut Vec<FallbackReason>,
    ) -> u32 {
        // Clamped at the calendar's start instead of overflowing.
        let from = date
            .checked_sub_days(Days::new(u64::from(self.config.lookback_days)))
            .unwrap_or(NaiveDate::MIN);

        match self.statistics.average_wait_between(service_id, from, date).await {
            // Truncated, and early (negative) averages count as no history.
            Ok(Some(average)) if average > 0.0 => average.trunc() as u32,
            Ok(_) => 0,
            Err(e) => {
                error!("Historical average lookup failed for {}: {}", service_id, e);
                reasons.push(FallbackReason::HistoryLookupFailed(e.to_string()));
                0
            }
        }
    }
}

/// Combines the estimate's terms.
///
/// The blend uses a fixed historical weight with no regard for how many days
/// of history back the average, so a single noisy day moves estimates as much
/// as a month of data.
pub fn compute_wait(
    config: &QueueConfig,
    queue_count: u32,
    service_duration_minutes: u32,
    historical_average_minutes: u32,
    hour: u32,
) -> WaitEstimate {
    let per_appointment = u64::from(service_duration_minutes) + u64::from(config.buffer_minutes);
    let mut base = u64::from(queue_count).saturating_mul(per_appointment);

    let peak_applied = config.is_peak_hour(hour);
    if peak_applied {
        base = (base as f64 * config.peak_multiplier).trunc() as u64;
    }
    let base = base.min(u64::from(u32::MAX)) as u32;

    let minutes = if historical_average_minutes > 0 {
        let weight = config.blend_weight;
        let blended =
            f64::from(base) * (1.0 - weight) + f64::from(historical_average_minutes) * weight;
        blended.round().max(0.0) as u32
    } else {
        base
    };

    WaitEstimate {
        minutes,
        queue_count,
        service_duration_minutes,
        historical_average_minutes,
        base_wait_minutes: base,
        peak_applied,
    }
}
