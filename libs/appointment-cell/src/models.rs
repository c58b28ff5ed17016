// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use patient_cell::models::PatientError;
use shared_models::error::AppError;
use shared_utils::time::{hhmm, TimeError, TimeRange};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub appointment_number: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm::lenient")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm::lenient")]
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub reason_for_visit: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub payment_amount: Option<f64>,
    pub video_room_id: Option<String>,
    pub video_call_link: Option<String>,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub doctor_notes: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminders_sent: RemindersSent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// Pending and confirmed appointments hold their slot.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Start instant, taking the naive date and time as UTC.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.scheduled_date.and_time(self.start_time).and_utc()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    InPerson,
    Telemedicine,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "in-person"),
            AppointmentType::Telemedicine => write!(f, "telemedicine"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    System,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemindersSent {
    pub day_before: bool,
    pub hour_before: bool,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason_for_visit: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentDetailsRequest {
    pub reason_for_visit: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub doctor_notes: Option<String>,
}

/// Filters for listing appointments. Patients and doctors are always
/// narrowed to their own appointments; the id filters only apply to admins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub day_of_week: String,
    pub consultation_duration: u32,
    pub available_slots: Vec<TimeRange>,
    pub booked_slots: Vec<TimeRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub requested_slot: TimeRange,
    pub conflicting_appointments: Vec<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Operations an actor can attempt on an existing appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Confirm,
    UpdateDetails,
    Cancel,
    Reschedule,
    Complete,
    MarkNoShow,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::View => "view",
            Action::Confirm => "confirm",
            Action::UpdateDetails => "update",
            Action::Cancel => "cancel",
            Action::Reschedule => "reschedule",
            Action::Complete => "complete",
            Action::MarkNoShow => "mark as no-show",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Requested time slot is not available")]
    SlotUnavailable,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStateTransition { from: AppointmentStatus, action: Action },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<TimeError> for AppointmentError {
    fn from(err: TimeError) -> Self {
        AppointmentError::ValidationError(err.to_string())
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::NotFound("Doctor".to_string()),
            DoctorError::NotADoctor => AppointmentError::AccessDenied(err.to_string()),
            DoctorError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            DoctorError::Unavailable(msg) => AppointmentError::UpstreamUnavailable(msg),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppointmentError::NotFound("Patient".to_string()),
            PatientError::Unavailable(msg) => AppointmentError::UpstreamUnavailable(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::AccessDenied(msg) => AppError::Forbidden(msg),
            AppointmentError::SlotUnavailable => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidStateTransition { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::UpstreamUnavailable(msg) => AppError::ExternalService(msg),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AppointmentValidationRules {
    pub reject_past_dates: bool,
    pub enforce_doctor_availability: bool,
}

impl Default for AppointmentValidationRules {
    fn default() -> Self {
        Self {
            reject_past_dates: true,
            enforce_doctor_availability: true,
        }
    }
}
