use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use shared_models::AppointmentStatus;

use crate::{AppointmentWithHistory, QueueError, QueueHistoryEntry, QueueStatistics};

/// Read access to bookings plus the queue-history table that hangs off them.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments on `date` scheduled at or before `up_to` whose status is
    /// in `statuses`, optionally limited to one service.
    async fn count_appointments(
        &self,
        date: NaiveDate,
        up_to: NaiveTime,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<u32, QueueError>;

    /// Nominal duration text of a service, `None` if the service is unknown.
    async fn service_duration(&self, service_id: Uuid) -> Result<Option<String>, QueueError>;

    /// Persists a new entry. Fails with [`QueueError::DuplicateEntry`] when the
    /// appointment already has one.
    async fn create_queue_entry(
        &self,
        entry: QueueHistoryEntry,
    ) -> Result<QueueHistoryEntry, QueueError>;

    async fn appointments_with_history(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentWithHistory>, QueueError>;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Mean of `average_wait_minutes` over rows for `service_id` dated within
    /// `[from, to]` that recorded at least one completion. `None` when no row
    /// qualifies.
    async fn average_wait_between(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<f64>, QueueError>;

    /// Inserts or replaces the row keyed by (service, date).
    async fn upsert_statistics(&self, statistics: &QueueStatistics) -> Result<(), QueueError>;

    async fn get_statistics(
        &self,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<QueueStatistics>, QueueError>;
}
