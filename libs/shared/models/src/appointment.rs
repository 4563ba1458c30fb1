use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that occupy a place in the day's queue.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

/// A booked visit as owned by the booking subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(default)]
    pub booking_id: Option<String>,
    pub patient_id: Uuid,
    /// Cleared when the referenced service is deleted.
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    /// Sequence number assigned when the booking was accepted.
    #[serde(default)]
    pub queue_number: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn new(
        patient_id: Uuid,
        service_id: Option<Uuid>,
        appointment_date: NaiveDate,
        appointment_time: NaiveTime,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id: Some(format!(
                "BK-{}-{}",
                appointment_date.format("%Y%m%d"),
                &Uuid::new_v4().simple().to_string()[..4]
            )),
            patient_id,
            service_id,
            appointment_date,
            appointment_time,
            status: AppointmentStatus::Pending,
            queue_number: None,
            notes: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_queue_number(mut self, queue_number: i32) -> Self {
        self.queue_number = Some(queue_number);
        self
    }

    pub fn scheduled_start(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }
}
