// libs/appointment-cell/src/services/lifecycle.rs
//! Who may do what to an appointment, and what status it ends up in.
//!
//! Authorization and state validity are separate questions so callers can
//! report "not allowed" (403) apart from "not possible right now" (400).
//! [`authorize`] is always evaluated first.

use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{Action, Appointment, AppointmentError, AppointmentStatus, CancelledBy};

/// The caller as seen by the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    /// Patient or doctor profile id linked to the user. Admins have none.
    pub profile_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, profile_id: Option<Uuid>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            profile_id,
        }
    }

    /// The actor is the patient or the doctor assigned to `appointment`.
    pub fn owns(&self, appointment: &Appointment) -> bool {
        match (self.role, self.profile_id) {
            (Role::Patient, Some(id)) => appointment.patient_id == id,
            (Role::Doctor, Some(id)) => appointment.doctor_id == id,
            _ => false,
        }
    }

    pub fn cancelled_by(&self) -> CancelledBy {
        match self.role {
            Role::Patient => CancelledBy::Patient,
            Role::Doctor => CancelledBy::Doctor,
            Role::Admin => CancelledBy::System,
        }
    }
}

fn is_permitted(role: Role, is_owner: bool, action: Action) -> bool {
    match action {
        Action::View => is_owner || role == Role::Admin,
        Action::Confirm | Action::Complete => role == Role::Doctor && is_owner,
        Action::UpdateDetails => role == Role::Patient && is_owner,
        Action::Cancel | Action::Reschedule => role == Role::Admin || is_owner,
        Action::MarkNoShow => role == Role::Admin || (role == Role::Doctor && is_owner),
    }
}

/// Status after `action` is applied to an appointment in `from`.
pub fn next_status(from: AppointmentStatus, action: Action) -> Result<AppointmentStatus, AppointmentError> {
    use AppointmentStatus::*;

    let to = match (from, action) {
        (status, Action::View) => Some(status),
        (Pending, Action::Confirm) => Some(Confirmed),
        (Pending, Action::UpdateDetails) => Some(Pending),
        (Pending | Confirmed, Action::Cancel) => Some(Cancelled),
        (Pending | Confirmed, Action::Reschedule) => Some(from),
        (Confirmed, Action::Complete) => Some(Completed),
        (Confirmed, Action::MarkNoShow) => Some(NoShow),
        _ => None,
    };

    to.ok_or_else(|| {
        warn!("Invalid status transition attempted: {} on {}", action, from);
        AppointmentError::InvalidStateTransition { from, action }
    })
}

pub fn authorize(role: Role, is_owner: bool, action: Action) -> Result<(), AppointmentError> {
    if is_permitted(role, is_owner, action) {
        Ok(())
    } else {
        let who = if is_owner { format!("assigned {}", role) } else { role.to_string() };
        Err(AppointmentError::AccessDenied(format!("{} cannot {} this appointment", who, action)))
    }
}

pub fn can_transition(role: Role, is_owner: bool, from: AppointmentStatus, action: Action) -> bool {
    is_permitted(role, is_owner, action) && next_status(from, action).is_ok()
}

/// Authorize `actor` for `action` on `appointment`, then resolve the target status.
pub fn check_transition(
    actor: &Actor,
    appointment: &Appointment,
    action: Action,
) -> Result<AppointmentStatus, AppointmentError> {
    authorize(actor.role, actor.owns(appointment), action)?;
    let to = next_status(appointment.status, action)?;
    debug!("Transition {} -> {} via {} for appointment {}", appointment.status, to, action, appointment.id);
    Ok(to)
}
