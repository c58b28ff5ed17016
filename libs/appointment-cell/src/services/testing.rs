use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use shared_utils::time::{parse_time, TimeRange};

use crate::models::{Appointment, AppointmentStatus, AppointmentType, RemindersSent};

pub(crate) fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 1, 5).unwrap()
}

/// An appointment on Monday 2099-01-05 with fresh patient and doctor ids.
pub(crate) fn appointment_at(start: &str, minutes: u32, status: AppointmentStatus) -> Appointment {
    let slot = TimeRange::starting_at(parse_time(start).unwrap(), minutes).unwrap();
    let now = Utc::now();

    Appointment {
        id: Uuid::new_v4(),
        appointment_number: "APT-TEST00001".to_string(),
        patient_id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        appointment_type: AppointmentType::InPerson,
        status,
        scheduled_date: test_date(),
        start_time: slot.start,
        end_time: slot.end,
        duration_minutes: minutes,
        reason_for_visit: "Checkup".to_string(),
        symptoms: Vec::new(),
        notes: None,
        payment_amount: None,
        video_room_id: None,
        video_call_link: None,
        diagnosis: None,
        follow_up_required: false,
        follow_up_date: None,
        doctor_notes: None,
        cancelled_by: None,
        cancellation_reason: None,
        cancelled_at: None,
        reminders_sent: RemindersSent::default(),
        created_at: now,
        updated_at: now,
    }
}
