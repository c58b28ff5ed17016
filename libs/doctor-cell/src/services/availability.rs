// libs/doctor-cell/src/services/availability.rs

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use shared_utils::time::{format_time, weekday_name, TimeError, TimeRange};

use crate::models::{
    DoctorError, Slot, UpdateScheduleRequest, WeeklyAvailability, MAX_CONSULTATION_MINUTES,
    MIN_CONSULTATION_MINUTES,
};

/// Weekday name and the doctor's windows for `date`.
pub fn resolve_day_windows(availability: &WeeklyAvailability, date: NaiveDate) -> (&'static str, &[TimeRange]) {
    let weekday = date.weekday();
    (weekday_name(weekday), availability.windows_for(weekday))
}

/// Cut every window into back-to-back slots of `duration` minutes.
///
/// A trailing remainder shorter than `duration` is dropped. Slots never
/// cross midnight. The result is ordered by start time with duplicates
/// from overlapping windows collapsed.
pub fn generate_slots(windows: &[TimeRange], duration: u32) -> Result<Vec<Slot>, TimeError> {
    if duration == 0 {
        return Err(TimeError::ZeroDuration);
    }

    let mut slots = Vec::new();

    for window in windows {
        let mut cursor = window.start;

        loop {
            let slot = match TimeRange::starting_at(cursor, duration) {
                Ok(slot) => slot,
                Err(TimeError::CrossesMidnight { .. }) => break,
                Err(e) => return Err(e),
            };

            if slot.end > window.end {
                break;
            }

            slots.push(slot);
            cursor = slot.end;
        }
    }

    slots.sort();
    slots.dedup();

    Ok(slots)
}

/// Candidates that do not intersect any booked interval.
pub fn remove_booked(candidates: Vec<Slot>, booked: &[TimeRange]) -> Vec<Slot> {
    candidates
        .into_iter()
        .filter(|slot| !booked.iter().any(|taken| slot.overlaps(taken)))
        .collect()
}

/// Slots for `date` before removing bookings.
pub fn candidate_slots_for(
    availability: &WeeklyAvailability,
    date: NaiveDate,
    duration: u32,
) -> Result<Vec<Slot>, TimeError> {
    let (day, windows) = resolve_day_windows(availability, date);
    debug!("Generating {}-minute slots for {} ({} windows)", duration, day, windows.len());
    generate_slots(windows, duration)
}

pub fn is_within_availability(availability: &WeeklyAvailability, date: NaiveDate, range: &TimeRange) -> bool {
    let (_, windows) = resolve_day_windows(availability, date);
    windows.iter().any(|window| window.contains(range))
}

pub fn validate_schedule_update(request: &UpdateScheduleRequest) -> Result<(), DoctorError> {
    if request.is_empty() {
        return Err(DoctorError::ValidationError("No fields to update".to_string()));
    }

    if let Some(duration) = request.consultation_duration {
        if !(MIN_CONSULTATION_MINUTES..=MAX_CONSULTATION_MINUTES).contains(&duration) {
            return Err(DoctorError::ValidationError(format!(
                "Consultation duration must be between {} and {} minutes",
                MIN_CONSULTATION_MINUTES, MAX_CONSULTATION_MINUTES
            )));
        }
    }

    if let Some(availability) = &request.availability {
        for (day, windows) in availability.iter() {
            if let Some(window) = windows.iter().find(|w| w.start >= w.end) {
                return Err(DoctorError::ValidationError(format!(
                    "Window {}-{} on {} must start before it ends",
                    format_time(window.start),
                    format_time(window.end),
                    weekday_name(day)
                )));
            }
        }
    }

    Ok(())
}
