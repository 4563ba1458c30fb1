use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, ClinicService};

use crate::services::store::{AppointmentStore, StatisticsStore};
use crate::{AppointmentWithHistory, QueueError, QueueHistoryEntry, QueueStatistics};

#[derive(Default)]
struct MemoryState {
    appointments: Vec<Appointment>,
    services: HashMap<Uuid, ClinicService>,
    /// Keyed by appointment id, which keeps entries one-to-one.
    history: HashMap<Uuid, QueueHistoryEntry>,
    statistics: HashMap<(Uuid, NaiveDate), QueueStatistics>,
}

/// Process-local store backing both the appointment and statistics contracts.
#[derive(Default)]
pub struct InMemoryQueueStore {
    state: RwLock<MemoryState>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_service(&self, service: ClinicService) {
        let mut state = self.state.write().await;
        state.services.insert(service.id, service);
    }

    pub async fn insert_appointment(&self, appointment: Appointment) {
        let mut state = self.state.write().await;
        state.appointments.retain(|a| a.id != appointment.id);
        state.appointments.push(appointment);
    }

    pub async fn set_appointment_status(&self, appointment_id: Uuid, status: AppointmentStatus) -> bool {
        let mut state = self.state.write().await;
        match state.appointments.iter_mut().find(|a| a.id == appointment_id) {
            Some(appointment) => {
                appointment.status = status;
                true
            }
            None => false,
        }
    }

    pub async fn queue_entry(&self, appointment_id: Uuid) -> Option<QueueHistoryEntry> {
        self.state.read().await.history.get(&appointment_id).cloned()
    }

    /// Applies an observed change (call-in, finish, no-show) to an entry.
    pub async fn update_queue_entry<F>(
        &self,
        appointment_id: Uuid,
        update: F,
    ) -> Result<QueueHistoryEntry, QueueError>
    where
        F: FnOnce(&mut QueueHistoryEntry),
    {
        let mut state = self.state.write().await;
        let entry = state
            .history
            .get_mut(&appointment_id)
            .ok_or(QueueError::EntryNotFound(appointment_id))?;

        update(entry);
        Ok(entry.clone())
    }

    pub async fn statistics_rows(&self) -> Vec<QueueStatistics> {
        let mut rows: Vec<_> = self.state.read().await.statistics.values().cloned().collect();
        rows.sort_by_key(|row| (row.appointment_date, row.service_id));
        rows
    }
}

#[async_trait]
impl AppointmentStore for InMemoryQueueStore {
    async fn count_appointments(
        &self,
        date: NaiveDate,
        up_to: NaiveTime,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<u32, QueueError> {
        let state = self.state.read().await;
        let count = state
            .appointments
            .iter()
            .filter(|a| a.appointment_date == date && a.appointment_time <= up_to)
            .filter(|a| statuses.contains(&a.status))
            .filter(|a| service_id.is_none() || a.service_id == service_id)
            .count();

        Ok(count as u32)
    }

    async fn service_duration(&self, service_id: Uuid) -> Result<Option<String>, QueueError> {
        let state = self.state.read().await;
        Ok(state.services.get(&service_id).map(|s| s.duration.clone()))
    }

    async fn create_queue_entry(
        &self,
        entry: QueueHistoryEntry,
    ) -> Result<QueueHistoryEntry, QueueError> {
        let mut state = self.state.write().await;
        if state.history.contains_key(&entry.appointment_id) {
            return Err(QueueError::DuplicateEntry(entry.appointment_id));
        }

        debug!("Storing queue history for appointment {}", entry.appointment_id);
        state.history.insert(entry.appointment_id, entry.clone());
        Ok(entry)
    }

    async fn appointments_with_history(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentWithHistory>, QueueError> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .appointments
            .iter()
            .filter(|a| a.appointment_date == date && statuses.contains(&a.status))
            .filter(|a| service_id.is_none() || a.service_id == service_id)
            .map(|a| AppointmentWithHistory {
                appointment: a.clone(),
                history: state.history.get(&a.id).cloned(),
            })
            .collect();

        rows.sort_by_key(|row| row.appointment.appointment_time);
        Ok(rows)
    }
}

#[async_trait]
impl StatisticsStore for InMemoryQueueStore {
    async fn average_wait_between(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<f64>, QueueError> {
        let state = self.state.read().await;
        let waits: Vec<f64> = state
            .statistics
            .values()
            .filter(|s| s.service_id == service_id)
            .filter(|s| s.appointment_date >= from && s.appointment_date <= to)
            .filter(|s| s.completed_appointments > 0)
            .map(|s| f64::from(s.average_wait_minutes))
            .collect();

        if waits.is_empty() {
            return Ok(None);
        }
        Ok(Some(waits.iter().sum::<f64>() / waits.len() as f64))
    }

    async fn upsert_statistics(&self, statistics: &QueueStatistics) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        state.statistics.insert(
            (statistics.service_id, statistics.appointment_date),
            statistics.clone(),
        );
        Ok(())
    }

    async fn get_statistics(
        &self,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<QueueStatistics>, QueueError> {
        let state = self.state.read().await;
        Ok(state.statistics.get(&(service_id, date)).cloned())
    }
}
