use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};
use shared_models::AppointmentStatus;

use crate::services::store::{AppointmentStore, StatisticsStore};
use crate::{AppointmentWithHistory, QueueError, QueueHistoryEntry, QueueStatistics};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const SERVICES_PATH: &str = "/rest/v1/services";
const QUEUE_HISTORY_PATH: &str = "/rest/v1/queue_history";
const QUEUE_STATISTICS_PATH: &str = "/rest/v1/queue_statistics";

#[derive(Debug, Deserialize)]
struct DurationRow {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct AverageWaitRow {
    average_wait_minutes: i32,
}

/// Appointment and statistics stores backed by the clinic's PostgREST API.
pub struct SupabaseQueueStore {
    client: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseQueueStore {
    pub fn new(client: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { client, auth_token }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

fn status_filter(statuses: &[AppointmentStatus]) -> String {
    let list: Vec<&str> = statuses.iter().map(AppointmentStatus::as_str).collect();
    format!("status=in.({})", list.join(","))
}

fn service_filter(service_id: Option<Uuid>) -> String {
    service_id
        .map(|id| format!("&service_id=eq.{}", id))
        .unwrap_or_default()
}

#[async_trait]
impl AppointmentStore for SupabaseQueueStore {
    async fn count_appointments(
        &self,
        date: NaiveDate,
        up_to: NaiveTime,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<u32, QueueError> {
        let path = format!(
            "{}?select=id&appointment_date=eq.{}&appointment_time=lte.{}&{}{}",
            APPOINTMENTS_PATH,
            date,
            up_to.format("%H:%M:%S"),
            status_filter(statuses),
            service_filter(service_id),
        );

        let rows: Vec<Value> = self.client.request(Method::GET, &path, self.token(), None).await?;
        debug!("{} appointments in queue up to {} on {}", rows.len(), up_to, date);
        Ok(rows.len() as u32)
    }

    async fn service_duration(&self, service_id: Uuid) -> Result<Option<String>, QueueError> {
        let path = format!("{}?select=duration&id=eq.{}", SERVICES_PATH, service_id);

        let rows: Vec<DurationRow> = self.client.request(Method::GET, &path, self.token(), None).await?;
        Ok(rows.into_iter().next().map(|row| row.duration))
    }

    async fn create_queue_entry(
        &self,
        entry: QueueHistoryEntry,
    ) -> Result<QueueHistoryEntry, QueueError> {
        let appointment_id = entry.appointment_id;
        let body = serde_json::to_value(&entry)?;

        let created: Vec<QueueHistoryEntry> = self
            .client
            .request_with_prefer(
                Method::POST,
                QUEUE_HISTORY_PATH,
                self.token(),
                Some(body),
                Some("return=representation"),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => QueueError::DuplicateEntry(appointment_id),
                other => QueueError::DatabaseError(other),
            })?;

        created.into_iter().next().ok_or_else(|| {
            QueueError::StoreError(format!(
                "Queue history insert for appointment {} returned no row",
                appointment_id
            ))
        })
    }

    async fn appointments_with_history(
        &self,
        date: NaiveDate,
        statuses: &[AppointmentStatus],
        service_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentWithHistory>, QueueError> {
        let path = format!(
            "{}?select=*,queue_history(*)&appointment_date=eq.{}&{}{}&order=appointment_time.asc",
            APPOINTMENTS_PATH,
            date,
            status_filter(statuses),
            service_filter(service_id),
        );

        let rows = self.client.request(Method::GET, &path, self.token(), None).await?;
        Ok(rows)
    }
}

#[async_trait]
impl StatisticsStore for SupabaseQueueStore {
    async fn average_wait_between(
        &self,
        service_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<f64>, QueueError> {
        let path = format!(
            "{}?select=average_wait_minutes&service_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&completed_appointments=gt.0",
            QUEUE_STATISTICS_PATH, service_id, from, to,
        );

        let rows: Vec<AverageWaitRow> = self.client.request(Method::GET, &path, self.token(), None).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let total: i64 = rows.iter().map(|row| i64::from(row.average_wait_minutes)).sum();
        Ok(Some(total as f64 / rows.len() as f64))
    }

    async fn upsert_statistics(&self, statistics: &QueueStatistics) -> Result<(), QueueError> {
        let path = format!("{}?on_conflict=service_id,appointment_date", QUEUE_STATISTICS_PATH);
        let body = serde_json::to_value(statistics)?;

        self.client
            .execute(
                Method::POST,
                &path,
                self.token(),
                Some(body),
                Some("resolution=merge-duplicates,return=minimal"),
            )
            .await?;
        Ok(())
    }

    async fn get_statistics(
        &self,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<QueueStatistics>, QueueError> {
        let path = format!(
            "{}?select=*&service_id=eq.{}&appointment_date=eq.{}",
            QUEUE_STATISTICS_PATH, service_id, date,
        );

        let rows: Vec<QueueStatistics> = self.client.request(Method::GET, &path, self.token(), None).await?;
        Ok(rows.into_iter().next())
    }
}
