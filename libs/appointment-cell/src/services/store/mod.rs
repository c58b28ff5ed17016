//! Appointment persistence.
//!
//! Both backends guarantee that no two active appointments of one doctor
//! on one date overlap, even under concurrent writers. The in-memory store
//! performs check and write in one critical section; the Supabase store
//! relies on the `appointments_no_overlap` exclusion constraint.

mod memory;
mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_utils::time::TimeRange;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, CancelledBy, RemindersSent,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The interval intersects another active appointment.
    #[error("Appointment overlaps an existing booking")]
    Conflict,

    /// The row was not in the expected status when the write landed.
    #[error("Appointment changed concurrently")]
    Stale,

    #[error("Appointment not found")]
    NotFound,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict { .. } => StoreError::Conflict,
            DatabaseError::NotFound(_) => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// `Stale` needs the action being attempted to be reported properly, so
/// callers that issue conditional writes handle it before converting.
impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppointmentError::SlotUnavailable,
            StoreError::NotFound => AppointmentError::NotFound("Appointment".to_string()),
            StoreError::Stale | StoreError::Backend(_) => AppointmentError::Database(err.to_string()),
        }
    }
}

/// Partial update applied by status transitions and detail edits.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_visit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_call_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelledBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders_sent: Option<RemindersSent>,
}

impl AppointmentPatch {
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(reason) = &self.reason_for_visit {
            appointment.reason_for_visit = reason.clone();
        }
        if let Some(symptoms) = &self.symptoms {
            appointment.symptoms = symptoms.clone();
        }
        if let Some(notes) = &self.notes {
            appointment.notes = Some(notes.clone());
        }
        if let Some(room) = &self.video_room_id {
            appointment.video_room_id = Some(room.clone());
        }
        if let Some(link) = &self.video_call_link {
            appointment.video_call_link = Some(link.clone());
        }
        if let Some(by) = self.cancelled_by {
            appointment.cancelled_by = Some(by);
        }
        if let Some(reason) = &self.cancellation_reason {
            appointment.cancellation_reason = Some(reason.clone());
        }
        if let Some(at) = self.cancelled_at {
            appointment.cancelled_at = Some(at);
        }
        if let Some(diagnosis) = &self.diagnosis {
            appointment.diagnosis = Some(diagnosis.clone());
        }
        if let Some(follow_up) = self.follow_up_required {
            appointment.follow_up_required = follow_up;
        }
        if let Some(date) = self.follow_up_date {
            appointment.follow_up_date = Some(date);
        }
        if let Some(notes) = &self.doctor_notes {
            appointment.doctor_notes = Some(notes.clone());
        }
        if let Some(reminders) = self.reminders_sent {
            appointment.reminders_sent = reminders;
        }
        appointment.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persist a new appointment unless its slot is taken.
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError>;

    async fn find_by_id(&self, id: Uuid, auth_token: Option<&str>) -> Result<Option<Appointment>, StoreError>;

    /// Pending and confirmed appointments of a doctor on a date, ordered by start.
    async fn find_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Apply `patch` only if the appointment is still in `expected` status.
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError>;

    /// Move an appointment to a new date and interval unless that slot is
    /// taken by another appointment. Reminder flags are reset.
    async fn reschedule_if_free(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        date: NaiveDate,
        slot: TimeRange,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError>;

    /// Newest first.
    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Confirmed appointments with `from <= scheduled_date <= to`.
    async fn list_confirmed_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError>;
}
