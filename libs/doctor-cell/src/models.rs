// libs/doctor-cell/src/models.rs
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_utils::time::TimeRange;

pub const DEFAULT_CONSULTATION_MINUTES: u32 = 30;
pub const MIN_CONSULTATION_MINUTES: u32 = 5;
pub const MAX_CONSULTATION_MINUTES: u32 = 240;

/// A bookable unit of a doctor's day. Computed on demand, never stored.
pub type Slot = TimeRange;

// ==============================================================================
// DOCTOR SCHEDULE
// ==============================================================================

/// The part of a doctor profile the scheduling core reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub availability: WeeklyAvailability,
    pub consultation_duration: Option<u32>,
    pub is_accepting_patients: bool,
    pub is_available_for_telemedicine: bool,
    #[serde(default)]
    pub consultation_fee: f64,
    #[serde(default)]
    pub total_patients: u64,
}

impl DoctorSchedule {
    pub fn new(id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            availability: WeeklyAvailability::default(),
            consultation_duration: None,
            is_accepting_patients: true,
            is_available_for_telemedicine: true,
            consultation_fee: 0.0,
            total_patients: 0,
        }
    }

    pub fn slot_minutes(&self) -> u32 {
        self.consultation_duration
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_CONSULTATION_MINUTES)
    }
}

/// Recurring weekly windows, keyed by lower-case weekday name on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyAvailability {
    #[serde(default)]
    pub monday: Vec<TimeRange>,
    #[serde(default)]
    pub tuesday: Vec<TimeRange>,
    #[serde(default)]
    pub wednesday: Vec<TimeRange>,
    #[serde(default)]
    pub thursday: Vec<TimeRange>,
    #[serde(default)]
    pub friday: Vec<TimeRange>,
    #[serde(default)]
    pub saturday: Vec<TimeRange>,
    #[serde(default)]
    pub sunday: Vec<TimeRange>,
}

impl WeeklyAvailability {
    pub fn windows_for(&self, day: Weekday) -> &[TimeRange] {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn windows_for_mut(&mut self, day: Weekday) -> &mut Vec<TimeRange> {
        match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &[TimeRange])> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .map(move |day| (day, self.windows_for(day)))
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub availability: Option<WeeklyAvailability>,
    pub consultation_duration: Option<u32>,
    pub is_available_for_telemedicine: Option<bool>,
    pub is_accepting_patients: Option<bool>,
}

impl UpdateScheduleRequest {
    pub fn is_empty(&self) -> bool {
        self.availability.is_none()
            && self.consultation_duration.is_none()
            && self.is_available_for_telemedicine.is_none()
            && self.is_accepting_patients.is_none()
    }

    pub fn apply_to(&self, schedule: &mut DoctorSchedule) {
        if let Some(availability) = &self.availability {
            schedule.availability = availability.clone();
        }
        if let Some(duration) = self.consultation_duration {
            schedule.consultation_duration = Some(duration);
        }
        if let Some(telemedicine) = self.is_available_for_telemedicine {
            schedule.is_available_for_telemedicine = telemedicine;
        }
        if let Some(accepting) = self.is_accepting_patients {
            schedule.is_accepting_patients = accepting;
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Only doctors can manage a schedule")]
    NotADoctor,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DatabaseError> for DoctorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => DoctorError::NotFound,
            other => DoctorError::Unavailable(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::NotADoctor => AppError::Forbidden(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Unavailable(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_duration_defaults_to_thirty_minutes() {
        let mut schedule = DoctorSchedule::new(Uuid::new_v4(), "user-1");
        assert_eq!(schedule.slot_minutes(), 30);

        schedule.consultation_duration = Some(45);
        assert_eq!(schedule.slot_minutes(), 45);
    }

    #[test]
    fn weekly_availability_reads_partial_maps() {
        let availability: WeeklyAvailability = serde_json::from_value(json!({
            "monday": [{ "start": "09:00", "end": "12:00" }]
        }))
        .unwrap();

        assert_eq!(availability.windows_for(Weekday::Mon).len(), 1);
        assert!(availability.windows_for(Weekday::Sun).is_empty());
    }

    #[test]
    fn update_request_only_touches_given_fields() {
        let mut schedule = DoctorSchedule::new(Uuid::new_v4(), "user-1");
        let request = UpdateScheduleRequest {
            is_accepting_patients: Some(false),
            ..Default::default()
        };

        request.apply_to(&mut schedule);
        assert!(!schedule.is_accepting_patients);
        assert!(schedule.is_available_for_telemedicine);
        assert_eq!(schedule.consultation_duration, None);
    }
}
