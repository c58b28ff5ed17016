use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use shared_utils::time::TimeRange;

use crate::models::Appointment;

/// Active appointments of `doctor_id` on `date` whose interval intersects
/// `candidate`, skipping `exclude` (the appointment being moved).
pub fn find_conflicts<'a>(
    existing: &'a [Appointment],
    doctor_id: Uuid,
    date: NaiveDate,
    candidate: &TimeRange,
    exclude: Option<Uuid>,
) -> Vec<&'a Appointment> {
    let conflicts: Vec<&Appointment> = existing
        .iter()
        .filter(|apt| apt.doctor_id == doctor_id && apt.scheduled_date == date)
        .filter(|apt| apt.is_active())
        .filter(|apt| Some(apt.id) != exclude)
        .filter(|apt| apt.slot().overlaps(candidate))
        .collect();

    if !conflicts.is_empty() {
        warn!(
            "Conflict detected for doctor {} on {} - {} conflicting appointments",
            doctor_id,
            date,
            conflicts.len()
        );
    }

    conflicts
}

pub fn has_conflict(
    existing: &[Appointment],
    doctor_id: Uuid,
    date: NaiveDate,
    candidate: &TimeRange,
    exclude: Option<Uuid>,
) -> bool {
    !find_conflicts(existing, doctor_id, date, candidate, exclude).is_empty()
}

/// Booked intervals for display, ordered by start.
pub fn booked_slots(existing: &[Appointment]) -> Vec<TimeRange> {
    let mut booked: Vec<TimeRange> = existing
        .iter()
        .filter(|apt| apt.is_active())
        .map(Appointment::slot)
        .collect();
    booked.sort();
    booked
}
