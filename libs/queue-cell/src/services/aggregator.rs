use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use shared_config::QueueConfig;
use shared_models::AppointmentStatus;

use crate::services::clock::{Clock, SystemClock};
use crate::services::store::{AppointmentStore, StatisticsStore};
use crate::{AggregationFailure, AggregationReport, AppointmentWithHistory, QueueStatistics};

/// Rolls a day's completed appointments up into per-service statistics.
///
/// Rows are upserted by (service, date), so re-running a day is safe. Two runs
/// for the same pair race on the upsert and the last write wins.
pub struct StatisticsAggregator {
    appointments: Arc<dyn AppointmentStore>,
    statistics: Arc<dyn StatisticsStore>,
    clock: Arc<dyn Clock>,
    default_service_minutes: u32,
}

impl StatisticsAggregator {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        statistics: Arc<dyn StatisticsStore>,
        config: &QueueConfig,
    ) -> Self {
        Self::with_clock(appointments, statistics, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        appointments: Arc<dyn AppointmentStore>,
        statistics: Arc<dyn StatisticsStore>,
        config: &QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            appointments,
            statistics,
            clock,
            default_service_minutes: config.default_service_minutes,
        }
    }

    /// The day a run without an explicit date covers, per the injected clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn recompute_today(&self) -> AggregationReport {
        self.recompute(self.today(), None).await
    }

    /// Recomputes statistics for `date`, for one service or all of them.
    ///
    /// Each service is upserted on its own; a failed upsert is logged and
    /// reported without stopping the rest.
    #[instrument(skip(self))]
    pub async fn recompute(&self, date: NaiveDate, service_id: Option<Uuid>) -> AggregationReport {
        let mut report = AggregationReport::new(date);

        let rows = match self
            .appointments
            .appointments_with_history(date, &[AppointmentStatus::Completed], service_id)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to load completed appointments for {}: {}", date, e);
                report.failures.push(AggregationFailure {
                    service_id,
                    error: e.to_string(),
                });
                return report;
            }
        };

        let mut groups: BTreeMap<Uuid, Vec<AppointmentWithHistory>> = BTreeMap::new();
        for row in rows {
            match row.appointment.service_id {
                Some(id) => groups.entry(id).or_default().push(row),
                None => debug!("Skipping appointment {} without a service", row.appointment.id),
            }
        }

        for (service_id, group) in groups {
            let statistics = summarize(service_id, date, &group, self.default_service_minutes);

            match self.statistics.upsert_statistics(&statistics).await {
                Ok(()) => {
                    debug!(
                        "Service {} on {}: {} completed of {}, average wait {} minutes",
                        service_id,
                        date,
                        statistics.completed_appointments,
                        statistics.total_appointments,
                        statistics.average_wait_minutes
                    );
                    report.updated.push(statistics);
                }
                Err(e) => {
                    error!("Failed to upsert statistics for service {} on {}: {}", service_id, date, e);
                    report.failures.push(AggregationFailure {
                        service_id: Some(service_id),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Queue statistics updated for {}: {} services, {} failures",
            date,
            report.updated.len(),
            report.failures.len()
        );

        report
    }
}

/// Builds one service's statistics row from its completed appointments.
///
/// Only entries with recorded actuals contribute to the averages; the rest
/// still count toward `total_appointments`.
pub fn summarize(
    service_id: Uuid,
    date: NaiveDate,
    group: &[AppointmentWithHistory],
    default_service_minutes: u32,
) -> QueueStatistics {
    let waits: Vec<i32> = group
        .iter()
        .filter_map(|row| row.history.as_ref()?.actual_wait_minutes)
        .collect();
    let durations: Vec<i32> = group
        .iter()
        .filter_map(|row| row.history.as_ref()?.service_duration_minutes)
        .collect();

    let default_duration = i32::try_from(default_service_minutes).unwrap_or(i32::MAX);

    QueueStatistics {
        service_id,
        appointment_date: date,
        total_appointments: group.len() as u32,
        completed_appointments: waits.len() as u32,
        average_wait_minutes: floor_mean(&waits).unwrap_or(0),
        min_wait_minutes: waits.iter().copied().min().unwrap_or(0),
        max_wait_minutes: waits.iter().copied().max().unwrap_or(0),
        average_service_duration_minutes: floor_mean(&durations).unwrap_or(default_duration),
    }
}

fn floor_mean(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    Some(sum.div_euclid(values.len() as i64) as i32)
}
