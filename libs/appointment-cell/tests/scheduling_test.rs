use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use appointment_cell::models::{
    Action, AppointmentError, AppointmentStatus, AppointmentType, BookAppointmentRequest, CancelAppointmentRequest,
    CompleteAppointmentRequest, RescheduleAppointmentRequest,
};
use appointment_cell::services::{
    Actor, AppointmentBookingService, InMemoryAppointmentStore, LogNotifier, NotificationService,
};
use doctor_cell::models::DoctorSchedule;
use doctor_cell::services::{DoctorDirectory, InMemoryDoctorDirectory};
use patient_cell::models::PatientProfile;
use patient_cell::services::InMemoryPatientDirectory;
use shared_models::auth::Role;
use shared_utils::test_utils::TestConfig;
use shared_utils::time::{parse_time, TimeRange};

const MONDAY: (i32, u32, u32) = (2099, 1, 5);

struct Clinic {
    service: Arc<AppointmentBookingService>,
    doctors: Arc<InMemoryDoctorDirectory>,
    doctor: Actor,
    other_doctor: Actor,
    alice: Actor,
    bob: Actor,
}

fn t(value: &str) -> NaiveTime {
    parse_time(value).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(MONDAY.0, MONDAY.1, MONDAY.2).unwrap()
}

async fn clinic() -> Clinic {
    let doctor_id = Uuid::new_v4();
    let other_doctor_id = Uuid::new_v4();

    let doctors = Arc::new(InMemoryDoctorDirectory::new());
    for (id, user) in [(doctor_id, "dr-house"), (other_doctor_id, "dr-wilson")] {
        let mut schedule = DoctorSchedule::new(id, user);
        schedule.availability.monday = vec![TimeRange::new(t("09:00"), t("12:00"))];
        schedule.consultation_duration = Some(30);
        doctors.insert(schedule).await;
    }

    let patients = Arc::new(InMemoryPatientDirectory::new());
    let alice = PatientProfile { id: Uuid::new_v4(), user_id: "alice".to_string() };
    let bob = PatientProfile { id: Uuid::new_v4(), user_id: "bob".to_string() };
    patients.insert(alice.clone()).await;
    patients.insert(bob.clone()).await;

    let service = AppointmentBookingService::new(
        &TestConfig::default().to_app_config(),
        Arc::new(InMemoryAppointmentStore::new()),
        doctors.clone(),
        patients,
        NotificationService::new(Arc::new(LogNotifier)),
    );

    Clinic {
        service: Arc::new(service),
        doctors,
        doctor: Actor::new("dr-house", Role::Doctor, Some(doctor_id)),
        other_doctor: Actor::new("dr-wilson", Role::Doctor, Some(other_doctor_id)),
        alice: Actor::new("alice", Role::Patient, Some(alice.id)),
        bob: Actor::new("bob", Role::Patient, Some(bob.id)),
    }
}

fn booking(clinic: &Clinic, start: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: clinic.doctor.profile_id.unwrap(),
        scheduled_date: monday(),
        start_time: t(start),
        appointment_type: AppointmentType::InPerson,
        reason_for_visit: "Annual physical".to_string(),
        symptoms: vec![],
        notes: None,
    }
}

#[tokio::test]
async fn monday_morning_end_to_end() {
    let clinic = clinic().await;
    let doctor_id = clinic.doctor.profile_id.unwrap();

    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();
    assert_eq!(apt.status, AppointmentStatus::Pending);
    assert_eq!(apt.end_time, t("09:30"));

    let confirmed = clinic.service.confirm(&clinic.doctor, apt.id, None).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    assert_matches!(
        clinic.service.book_appointment(&clinic.bob, booking(&clinic, "09:00"), None).await,
        Err(AppointmentError::SlotUnavailable)
    );

    let before = clinic.doctors.get_schedule(doctor_id, None).await.unwrap().total_patients;
    let completed = clinic
        .service
        .complete(&clinic.doctor, apt.id, CompleteAppointmentRequest::default(), None)
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let after = clinic.doctors.get_schedule(doctor_id, None).await.unwrap().total_patients;
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn concurrent_identical_bookings_have_one_winner() {
    let clinic = clinic().await;

    let attempts = [clinic.alice.clone(), clinic.bob.clone()].map(|patient| {
        let service = clinic.service.clone();
        let request = booking(&clinic, "10:00");
        tokio::spawn(async move { service.book_appointment(&patient, request, None).await })
    });

    let mut results = Vec::new();
    for attempt in attempts {
        results.push(attempt.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppointmentError::SlotUnavailable)))
            .count(),
        1
    );
}

#[tokio::test]
async fn overlapping_and_adjacent_requests() {
    let clinic = clinic().await;
    assert_ok!(clinic.service.book_appointment(&clinic.alice, booking(&clinic, "09:00"), None).await);

    // Back-to-back is allowed, partial overlap is not.
    assert_ok!(clinic.service.book_appointment(&clinic.bob, booking(&clinic, "09:30"), None).await);
    assert_matches!(
        clinic.service.book_appointment(&clinic.bob, booking(&clinic, "10:15"), None).await,
        Ok(_)
    );
    assert_matches!(
        clinic.service.book_appointment(&clinic.alice, booking(&clinic, "10:30"), None).await,
        Err(AppointmentError::SlotUnavailable)
    );
}

#[tokio::test]
async fn cancelled_slot_can_be_booked_again() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "11:00"), None)
        .await
        .unwrap();

    let cancelled = clinic
        .service
        .cancel(&clinic.alice, apt.id, CancelAppointmentRequest { reason: None }, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert_ok!(clinic.service.book_appointment(&clinic.bob, booking(&clinic, "11:00"), None).await);
}

#[tokio::test]
async fn reschedule_to_own_interval_is_a_no_op_move() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();

    let same = RescheduleAppointmentRequest {
        scheduled_date: apt.scheduled_date,
        start_time: apt.start_time,
    };
    let moved = clinic.service.reschedule(&clinic.alice, apt.id, same, None).await.unwrap();
    assert_eq!(moved.slot(), apt.slot());
    assert_eq!(moved.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn reschedule_into_taken_slot_fails_and_leaves_appointment_untouched() {
    let clinic = clinic().await;
    let mine = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();
    clinic
        .service
        .book_appointment(&clinic.bob, booking(&clinic, "10:00"), None)
        .await
        .unwrap();

    let onto_bob = RescheduleAppointmentRequest {
        scheduled_date: monday(),
        start_time: t("10:00"),
    };
    assert_matches!(
        clinic.service.reschedule(&clinic.doctor, mine.id, onto_bob, None).await,
        Err(AppointmentError::SlotUnavailable)
    );

    let unchanged = clinic.service.get_appointment(&clinic.alice, mine.id, None).await.unwrap();
    assert_eq!(unchanged.start_time, t("09:00"));
}

#[tokio::test]
async fn complete_on_pending_is_an_invalid_transition() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();

    assert_matches!(
        clinic
            .service
            .complete(&clinic.doctor, apt.id, CompleteAppointmentRequest::default(), None)
            .await,
        Err(AppointmentError::InvalidStateTransition {
            from: AppointmentStatus::Pending,
            action: Action::Complete
        })
    );
}

#[tokio::test]
async fn foreign_doctor_is_denied_regardless_of_status() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();

    assert_matches!(
        clinic.service.confirm(&clinic.other_doctor, apt.id, None).await,
        Err(AppointmentError::AccessDenied(_))
    );

    clinic.service.confirm(&clinic.doctor, apt.id, None).await.unwrap();
    // Now in a state where confirm is invalid, but authorization still wins.
    assert_matches!(
        clinic.service.confirm(&clinic.other_doctor, apt.id, None).await,
        Err(AppointmentError::AccessDenied(_))
    );
    assert_matches!(
        clinic.service.get_appointment(&clinic.bob, apt.id, None).await,
        Err(AppointmentError::AccessDenied(_))
    );
}

#[tokio::test]
async fn completed_appointments_cannot_be_cancelled() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();
    clinic.service.confirm(&clinic.doctor, apt.id, None).await.unwrap();
    clinic
        .service
        .complete(&clinic.doctor, apt.id, CompleteAppointmentRequest::default(), None)
        .await
        .unwrap();

    let err = assert_err!(
        clinic
            .service
            .cancel(&clinic.alice, apt.id, CancelAppointmentRequest::default(), None)
            .await
    );
    assert_eq!(
        err,
        AppointmentError::InvalidStateTransition {
            from: AppointmentStatus::Completed,
            action: Action::Cancel
        }
    );
}

#[tokio::test]
async fn no_show_requires_confirmation_and_frees_nothing_twice() {
    let clinic = clinic().await;
    let apt = clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "09:00"), None)
        .await
        .unwrap();

    assert_matches!(
        clinic.service.mark_no_show(&clinic.doctor, apt.id, None).await,
        Err(AppointmentError::InvalidStateTransition { .. })
    );
    assert_matches!(
        clinic.service.mark_no_show(&clinic.alice, apt.id, None).await,
        Err(AppointmentError::AccessDenied(_))
    );

    clinic.service.confirm(&clinic.doctor, apt.id, None).await.unwrap();
    let admin = Actor::new("ops", Role::Admin, None);
    let marked = clinic.service.mark_no_show(&admin, apt.id, None).await.unwrap();
    assert_eq!(marked.status, AppointmentStatus::NoShow);

    // A no-show no longer holds the slot.
    assert_ok!(clinic.service.book_appointment(&clinic.bob, booking(&clinic, "09:00"), None).await);
}

#[tokio::test]
async fn availability_lists_free_and_booked_slots() {
    let clinic = clinic().await;
    let doctor_id = clinic.doctor.profile_id.unwrap();
    clinic
        .service
        .book_appointment(&clinic.alice, booking(&clinic, "10:00"), None)
        .await
        .unwrap();

    let availability = clinic.service.available_slots(doctor_id, monday(), None).await.unwrap();
    assert_eq!(availability.day_of_week, "monday");
    assert_eq!(availability.consultation_duration, 30);
    assert_eq!(availability.available_slots.len(), 5);
    assert!(!availability.available_slots.contains(&TimeRange::new(t("10:00"), t("10:30"))));
    assert_eq!(availability.booked_slots, vec![TimeRange::new(t("10:00"), t("10:30"))]);

    let tuesday = monday().succ_opt().unwrap();
    let empty = clinic.service.available_slots(doctor_id, tuesday, None).await.unwrap();
    assert!(empty.available_slots.is_empty());
}

#[tokio::test]
async fn unknown_doctor_blocks_booking() {
    let clinic = clinic().await;
    let mut request = booking(&clinic, "09:00");
    request.doctor_id = Uuid::new_v4();

    assert_matches!(
        clinic.service.book_appointment(&clinic.alice, request, None).await,
        Err(AppointmentError::NotFound(what)) if what == "Doctor"
    );
}
