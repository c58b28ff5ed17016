// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::DoctorSchedule;
use doctor_cell::services::availability::{generate_slots, is_within_availability, remove_booked, resolve_day_windows};
use doctor_cell::services::DoctorDirectory;
use patient_cell::services::PatientDirectory;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_utils::time::TimeRange;

use crate::models::{
    Action, Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, AppointmentType,
    AppointmentValidationRules, AvailabilityResponse, BookAppointmentRequest, CancelAppointmentRequest,
    CompleteAppointmentRequest, ConflictCheckResponse, RemindersSent, RescheduleAppointmentRequest,
    UpdateAppointmentDetailsRequest,
};
use crate::services::conflict::{booked_slots, find_conflicts, has_conflict};
use crate::services::lifecycle::{check_transition, Actor};
use crate::services::notification::{NotificationKind, NotificationService, Recipient};
use crate::services::numbering::generate_appointment_number;
use crate::services::store::{AppointmentPatch, AppointmentStore, StoreError};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientDirectory>,
    notifications: NotificationService,
    telemedicine_base_url: String,
    validation_rules: AppointmentValidationRules,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        patients: Arc<dyn PatientDirectory>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            doctors,
            patients,
            notifications,
            telemedicine_base_url: config.telemedicine_base_url.trim_end_matches('/').to_string(),
            validation_rules: AppointmentValidationRules::default(),
        }
    }

    pub fn with_validation_rules(mut self, rules: AppointmentValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    /// Link the authenticated user to their patient or doctor profile.
    pub async fn resolve_actor(&self, user: &User, auth_token: Option<&str>) -> Result<Actor, AppointmentError> {
        let role = user
            .platform_role()
            .ok_or_else(|| AppointmentError::AccessDenied("User has no recognized role".to_string()))?;

        let profile_id = match role {
            Role::Patient => Some(
                self.patients
                    .find_by_user_id(&user.id, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::NotFound("Patient profile".to_string()))?
                    .id,
            ),
            Role::Doctor => Some(
                self.doctors
                    .find_by_user_id(&user.id, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::NotFound("Doctor profile".to_string()))?
                    .id,
            ),
            Role::Admin => None,
        };

        debug!("Resolved user {} as {} with profile {:?}", user.id, role, profile_id);
        Ok(Actor::new(user.id.clone(), role, profile_id))
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, actor, request, auth_token), fields(doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        actor: &Actor,
        request: BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = match (actor.role, actor.profile_id) {
            (Role::Patient, Some(id)) => id,
            _ => {
                return Err(AppointmentError::AccessDenied(
                    "Only patients can book appointments".to_string(),
                ))
            }
        };

        if request.reason_for_visit.trim().is_empty() {
            return Err(AppointmentError::ValidationError("Reason for visit is required".to_string()));
        }

        let doctor = self.doctors.get_schedule(request.doctor_id, auth_token).await?;

        if !doctor.is_accepting_patients {
            return Err(AppointmentError::ValidationError(
                "Doctor is not accepting new patients".to_string(),
            ));
        }
        if request.appointment_type == AppointmentType::Telemedicine && !doctor.is_available_for_telemedicine {
            return Err(AppointmentError::ValidationError(
                "Doctor is not available for telemedicine".to_string(),
            ));
        }

        let slot = TimeRange::starting_at(request.start_time, doctor.slot_minutes())?;
        self.validate_requested_slot(&doctor, request.scheduled_date, &slot)?;

        let existing = self
            .store
            .find_active_for_doctor_on(doctor.id, request.scheduled_date, auth_token)
            .await?;
        if has_conflict(&existing, doctor.id, request.scheduled_date, &slot, None) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            appointment_number: generate_appointment_number(now),
            patient_id,
            doctor_id: doctor.id,
            appointment_type: request.appointment_type,
            status: AppointmentStatus::Pending,
            scheduled_date: request.scheduled_date,
            start_time: slot.start,
            end_time: slot.end,
            duration_minutes: slot.duration_minutes(),
            reason_for_visit: request.reason_for_visit.trim().to_string(),
            symptoms: request.symptoms,
            notes: request.notes,
            payment_amount: Some(doctor.consultation_fee),
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
        };

        let created = self.store.insert_if_free(appointment, auth_token).await?;
        info!(
            "Appointment {} booked for patient {} with doctor {} on {} at {}",
            created.appointment_number, created.patient_id, created.doctor_id, created.scheduled_date, created.start_time
        );

        self.notifications
            .notify(NotificationKind::Created, &created, &[Recipient::Patient, Recipient::Doctor]);

        Ok(created)
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id, auth_token).await?;
        check_transition(actor, &appointment, Action::View)?;
        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        actor: &Actor,
        mut query: AppointmentSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        match (actor.role, actor.profile_id) {
            (Role::Patient, Some(id)) => {
                query.patient_id = Some(id);
                query.doctor_id = None;
            }
            (Role::Doctor, Some(id)) => {
                query.doctor_id = Some(id);
                query.patient_id = None;
            }
            (Role::Admin, _) => {}
            _ => return Err(AppointmentError::AccessDenied("No profile linked to this user".to_string())),
        }

        if let (Some(from), Some(to)) = (query.from_date, query.to_date) {
            if from > to {
                return Err(AppointmentError::ValidationError(
                    "from_date must not be after to_date".to_string(),
                ));
            }
        }
        query.limit = Some(query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE));

        Ok(self.store.list(&query, auth_token).await?)
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        let doctor = self.doctors.get_schedule(doctor_id, auth_token).await?;
        let duration = doctor.slot_minutes();
        let (day_of_week, windows) = resolve_day_windows(&doctor.availability, date);

        let candidates = generate_slots(windows, duration)?;
        let existing = self.store.find_active_for_doctor_on(doctor_id, date, auth_token).await?;
        let booked = booked_slots(&existing);
        let available = remove_booked(candidates, &booked);

        debug!(
            "Doctor {} on {} ({}): {} available, {} booked",
            doctor_id,
            date,
            day_of_week,
            available.len(),
            booked.len()
        );

        Ok(AvailabilityResponse {
            doctor_id,
            date,
            day_of_week: day_of_week.to_string(),
            consultation_duration: duration,
            available_slots: available,
            booked_slots: booked,
        })
    }

    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let doctor = self.doctors.get_schedule(doctor_id, auth_token).await?;
        let slot = TimeRange::starting_at(start_time, doctor.slot_minutes())?;

        let existing = self.store.find_active_for_doctor_on(doctor_id, date, auth_token).await?;
        let conflicting: Vec<Uuid> = find_conflicts(&existing, doctor_id, date, &slot, exclude_appointment_id)
            .into_iter()
            .map(|apt| apt.id)
            .collect();

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting.is_empty(),
            requested_slot: slot,
            conflicting_appointments: conflicting,
        })
    }

    // ==============================================================================
    // LIFECYCLE
    // ==============================================================================

    #[instrument(skip(self, actor, auth_token))]
    pub async fn confirm(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, auth_token).await?;
        let to = check_transition(actor, &current, Action::Confirm)?;

        let mut patch = AppointmentPatch::status(to);
        if current.appointment_type == AppointmentType::Telemedicine {
            let room_id = Uuid::new_v4().to_string();
            patch.video_call_link = Some(format!("{}/{}", self.telemedicine_base_url, room_id));
            patch.video_room_id = Some(room_id);
        }

        let confirmed = self.write_if_unchanged(&current, Action::Confirm, &patch, auth_token).await?;
        info!("Appointment {} confirmed by doctor {}", confirmed.id, confirmed.doctor_id);

        self.notifications
            .notify(NotificationKind::Confirmed, &confirmed, &[Recipient::Patient, Recipient::Doctor]);

        Ok(confirmed)
    }

    pub async fn update_details(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: UpdateAppointmentDetailsRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        if request.reason_for_visit.is_none() && request.symptoms.is_none() && request.notes.is_none() {
            return Err(AppointmentError::ValidationError("No fields to update".to_string()));
        }
        if matches!(&request.reason_for_visit, Some(reason) if reason.trim().is_empty()) {
            return Err(AppointmentError::ValidationError("Reason for visit cannot be empty".to_string()));
        }

        let current = self.load(appointment_id, auth_token).await?;
        check_transition(actor, &current, Action::UpdateDetails)?;

        let patch = AppointmentPatch {
            reason_for_visit: request.reason_for_visit.map(|reason| reason.trim().to_string()),
            symptoms: request.symptoms,
            notes: request.notes,
            ..Default::default()
        };

        self.write_if_unchanged(&current, Action::UpdateDetails, &patch, auth_token).await
    }

    #[instrument(skip(self, actor, request, auth_token))]
    pub async fn cancel(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, auth_token).await?;
        let to = check_transition(actor, &current, Action::Cancel)?;

        let patch = AppointmentPatch {
            status: Some(to),
            cancelled_by: Some(actor.cancelled_by()),
            cancellation_reason: request.reason.filter(|reason| !reason.trim().is_empty()),
            cancelled_at: Some(Utc::now()),
            ..Default::default()
        };

        let cancelled = self.write_if_unchanged(&current, Action::Cancel, &patch, auth_token).await?;
        info!("Appointment {} cancelled by {:?}", cancelled.id, cancelled.cancelled_by);

        self.notifications
            .notify(NotificationKind::Cancelled, &cancelled, counterparties(actor.role));

        Ok(cancelled)
    }

    #[instrument(skip(self, actor, request, auth_token))]
    pub async fn reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, auth_token).await?;
        check_transition(actor, &current, Action::Reschedule)?;

        let doctor = self.doctors.get_schedule(current.doctor_id, auth_token).await?;
        let slot = TimeRange::starting_at(request.start_time, doctor.slot_minutes())?;
        self.validate_requested_slot(&doctor, request.scheduled_date, &slot)?;

        let existing = self
            .store
            .find_active_for_doctor_on(current.doctor_id, request.scheduled_date, auth_token)
            .await?;
        if has_conflict(&existing, current.doctor_id, request.scheduled_date, &slot, Some(current.id)) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let moved = match self
            .store
            .reschedule_if_free(current.id, current.status, request.scheduled_date, slot, auth_token)
            .await
        {
            Ok(moved) => moved,
            Err(StoreError::Stale) => return Err(self.concurrent_change(current.id, Action::Reschedule, auth_token).await),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Appointment {} moved from {} {} to {} {}",
            moved.id, current.scheduled_date, current.start_time, moved.scheduled_date, moved.start_time
        );

        self.notifications
            .notify(NotificationKind::Rescheduled, &moved, counterparties(actor.role));

        Ok(moved)
    }

    #[instrument(skip(self, actor, request, auth_token))]
    pub async fn complete(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, auth_token).await?;
        let to = check_transition(actor, &current, Action::Complete)?;

        if let Some(follow_up) = request.follow_up_date {
            if follow_up <= current.scheduled_date {
                return Err(AppointmentError::ValidationError(
                    "Follow-up date must be after the appointment date".to_string(),
                ));
            }
        }

        let patch = AppointmentPatch {
            status: Some(to),
            diagnosis: request.diagnosis,
            follow_up_required: Some(request.follow_up_required || request.follow_up_date.is_some()),
            follow_up_date: request.follow_up_date,
            doctor_notes: request.doctor_notes,
            ..Default::default()
        };

        let completed = self.write_if_unchanged(&current, Action::Complete, &patch, auth_token).await?;

        match self.doctors.increment_total_patients(completed.doctor_id, auth_token).await {
            Ok(total) => info!("Appointment {} completed; doctor {} has seen {} patients", completed.id, completed.doctor_id, total),
            Err(e) => error!(
                "Appointment {} completed but patient counter for doctor {} was not incremented: {}",
                completed.id, completed.doctor_id, e
            ),
        }

        Ok(completed)
    }

    pub async fn mark_no_show(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id, auth_token).await?;
        let to = check_transition(actor, &current, Action::MarkNoShow)?;

        let updated = self
            .write_if_unchanged(&current, Action::MarkNoShow, &AppointmentPatch::status(to), auth_token)
            .await?;
        info!("Appointment {} marked as no-show", updated.id);
        Ok(updated)
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn load(&self, appointment_id: Uuid, auth_token: Option<&str>) -> Result<Appointment, AppointmentError> {
        self.store
            .find_by_id(appointment_id, auth_token)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))
    }

    fn validate_requested_slot(
        &self,
        doctor: &DoctorSchedule,
        date: NaiveDate,
        slot: &TimeRange,
    ) -> Result<(), AppointmentError> {
        if self.validation_rules.reject_past_dates && date < Utc::now().date_naive() {
            return Err(AppointmentError::ValidationError(
                "Cannot schedule appointments in the past".to_string(),
            ));
        }

        if self.validation_rules.enforce_doctor_availability
            && !is_within_availability(&doctor.availability, date, slot)
        {
            return Err(AppointmentError::ValidationError(
                "Requested time is outside the doctor's availability".to_string(),
            ));
        }

        Ok(())
    }

    async fn write_if_unchanged(
        &self,
        current: &Appointment,
        action: Action,
        patch: &AppointmentPatch,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        match self.store.update_if_status(current.id, current.status, patch, auth_token).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::Stale) => Err(self.concurrent_change(current.id, action, auth_token).await),
            Err(e) => Err(e.into()),
        }
    }

    /// The row moved between our read and write. Report the action
    /// against whatever status won.
    async fn concurrent_change(&self, appointment_id: Uuid, action: Action, auth_token: Option<&str>) -> AppointmentError {
        warn!("Appointment {} changed concurrently during {}", appointment_id, action);
        match self.load(appointment_id, auth_token).await {
            Ok(latest) => AppointmentError::InvalidStateTransition {
                from: latest.status,
                action,
            },
            Err(e) => e,
        }
    }
}

/// Who hears about a change made by `role`.
fn counterparties(role: Role) -> &'static [Recipient] {
    match role {
        Role::Patient => &[Recipient::Doctor],
        Role::Doctor => &[Recipient::Patient],
        Role::Admin => &[Recipient::Patient, Recipient::Doctor],
    }
}
