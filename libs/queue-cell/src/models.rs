use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::Appointment;

/// How long before the scheduled start a patient is asked to arrive.
pub const ARRIVAL_LEAD_MINUTES: i64 = 15;

/// Predicted and observed queue timing for a single appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueHistoryEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub scheduled_start_time: NaiveDateTime,
    pub estimated_wait_minutes: u32,
    #[serde(default)]
    pub actual_start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub actual_end_time: Option<NaiveDateTime>,
    /// Negative when the patient was seen ahead of schedule.
    #[serde(default)]
    pub actual_wait_minutes: Option<i32>,
    #[serde(default)]
    pub service_duration_minutes: Option<i32>,
    #[serde(default)]
    pub queue_position: Option<i32>,
    #[serde(default)]
    pub is_no_show: bool,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueueHistoryEntry {
    pub fn new(appointment: &Appointment, estimated_wait_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            scheduled_start_time: appointment.scheduled_start(),
            estimated_wait_minutes,
            actual_start_time: None,
            actual_end_time: None,
            actual_wait_minutes: None,
            service_duration_minutes: None,
            queue_position: appointment.queue_number,
            is_no_show: false,
            cancellation_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Records when the patient was called in and derives the actual wait.
    pub fn mark_started(&mut self, at: NaiveDateTime) {
        self.actual_start_time = Some(at);
        self.actual_wait_minutes = Some(minutes_between(self.scheduled_start_time, at));
        self.is_no_show = false;

        if let Some(end) = self.actual_end_time {
            self.service_duration_minutes = Some(minutes_between(at, end));
        }
    }

    /// Records when treatment ended. The duration is only derived once a
    /// start time is known.
    pub fn mark_finished(&mut self, at: NaiveDateTime) {
        self.actual_end_time = Some(at);

        if let Some(start) = self.actual_start_time {
            self.service_duration_minutes = Some(minutes_between(start, at));
        }
    }

    pub fn mark_no_show(&mut self) {
        self.is_no_show = true;
    }

    pub fn cancel(&mut self, reason: impl Into<String>) {
        self.cancellation_reason = Some(reason.into());
    }

    pub fn has_actuals(&self) -> bool {
        self.actual_wait_minutes.is_some()
    }

    pub fn approximate_call_time(&self) -> NaiveDateTime {
        self.scheduled_start_time + Duration::minutes(i64::from(self.estimated_wait_minutes))
    }

    pub fn recommended_arrival_time(&self) -> NaiveDateTime {
        self.scheduled_start_time - Duration::minutes(ARRIVAL_LEAD_MINUTES)
    }
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i32 {
    let minutes = (to - from).num_minutes();
    minutes.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Per-service, per-day aggregate of recorded queue timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatistics {
    pub service_id: Uuid,
    pub appointment_date: NaiveDate,
    pub total_appointments: u32,
    pub completed_appointments: u32,
    pub average_wait_minutes: i32,
    pub min_wait_minutes: i32,
    pub max_wait_minutes: i32,
    pub average_service_duration_minutes: i32,
}

/// An appointment joined to its queue history, if one was recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentWithHistory {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(default, rename = "queue_history")]
    pub history: Option<QueueHistoryEntry>,
}

/// The terms that produced a wait estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitEstimate {
    pub minutes: u32,
    /// Appointments ahead of the candidate in the same day.
    pub queue_count: u32,
    pub service_duration_minutes: u32,
    pub historical_average_minutes: u32,
    pub base_wait_minutes: u32,
    pub peak_applied: bool,
}

impl WaitEstimate {
    pub fn zero(service_duration_minutes: u32) -> Self {
        Self {
            minutes: 0,
            queue_count: 0,
            service_duration_minutes,
            historical_average_minutes: 0,
            base_wait_minutes: 0,
            peak_applied: false,
        }
    }
}

/// Why a term of the estimate was replaced by its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    ServiceUnspecified,
    ServiceNotFound(Uuid),
    DurationUnparseable(String),
    ServiceLookupFailed(String),
    QueueCountFailed(String),
    HistoryLookupFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EstimateOutcome {
    Computed(WaitEstimate),
    Degraded {
        estimate: WaitEstimate,
        reasons: Vec<FallbackReason>,
    },
}

impl EstimateOutcome {
    pub fn from_parts(estimate: WaitEstimate, reasons: Vec<FallbackReason>) -> Self {
        if reasons.is_empty() {
            EstimateOutcome::Computed(estimate)
        } else {
            EstimateOutcome::Degraded { estimate, reasons }
        }
    }

    pub fn estimate(&self) -> &WaitEstimate {
        match self {
            EstimateOutcome::Computed(estimate) => estimate,
            EstimateOutcome::Degraded { estimate, .. } => estimate,
        }
    }

    pub fn minutes(&self) -> u32 {
        self.estimate().minutes
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, EstimateOutcome::Degraded { .. })
    }

    pub fn fallback_reasons(&self) -> &[FallbackReason] {
        match self {
            EstimateOutcome::Computed(_) => &[],
            EstimateOutcome::Degraded { reasons, .. } => reasons,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationFailure {
    /// `None` when the day's appointments could not be loaded at all.
    pub service_id: Option<Uuid>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationReport {
    pub appointment_date: NaiveDate,
    pub updated: Vec<QueueStatistics>,
    pub failures: Vec<AggregationFailure>,
}

impl AggregationReport {
    pub fn new(appointment_date: NaiveDate) -> Self {
        Self {
            appointment_date,
            updated: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceQueueStatus {
    pub service_id: Option<Uuid>,
    pub queue_count: u32,
    /// Mean of the recorded estimates; `None` when no entry was recorded.
    pub average_estimated_wait_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueStatusReport {
    pub date: NaiveDate,
    pub services: Vec<ServiceQueueStatus>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
