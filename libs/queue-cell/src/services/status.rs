use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, instrument};
use uuid::Uuid;

use shared_models::AppointmentStatus;

use crate::services::clock::Clock;
use crate::services::store::AppointmentStore;
use crate::{QueueStatusReport, ServiceQueueStatus};

/// Live view of a day's queue for the front desk.
pub struct QueueMonitor {
    appointments: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl QueueMonitor {
    pub fn new(appointments: Arc<dyn AppointmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { appointments, clock }
    }

    /// Per-service active appointment counts and mean recorded estimates.
    /// Defaults to today; a store failure yields an empty report carrying the
    /// error text.
    #[instrument(skip(self))]
    pub async fn current_queue_status(&self, date: Option<NaiveDate>) -> QueueStatusReport {
        let date = date.unwrap_or_else(|| self.clock.today());
        let generated_at = self.clock.now();

        let rows = match self
            .appointments
            .appointments_with_history(date, &AppointmentStatus::ACTIVE, None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to load queue status for {}: {}", date, e);
                return QueueStatusReport {
                    date,
                    services: Vec::new(),
                    generated_at,
                    error: Some(e.to_string()),
                };
            }
        };

        let mut per_service: BTreeMap<Option<Uuid>, (u32, Vec<u32>)> = BTreeMap::new();
        for row in &rows {
            let (count, estimates) = per_service.entry(row.appointment.service_id).or_default();
            *count += 1;
            if let Some(entry) = &row.history {
                estimates.push(entry.estimated_wait_minutes);
            }
        }

        let services = per_service
            .into_iter()
            .map(|(service_id, (queue_count, estimates))| ServiceQueueStatus {
                service_id,
                queue_count,
                average_estimated_wait_minutes: if estimates.is_empty() {
                    None
                } else {
                    let total: u64 = estimates.iter().map(|&m| u64::from(m)).sum();
                    Some(total as f64 / estimates.len() as f64)
                },
            })
            .collect();

        QueueStatusReport {
            date,
            services,
            generated_at,
            error: None,
        }
    }
}
