// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::time::hhmm;

use crate::models::{
    AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest, CompleteAppointmentRequest,
    RescheduleAppointmentRequest, UpdateAppointmentDetailsRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::Actor;

pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
}

impl AppointmentCellState {
    pub fn new(config: Arc<AppConfig>, booking: Arc<AppointmentBookingService>) -> Self {
        Self { config, booking }
    }

    async fn actor(&self, user: &User, token: &str) -> Result<Actor, AppError> {
        Ok(self.booking.resolve_actor(user, Some(token)).await?)
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub exclude_appointment_id: Option<Uuid>,
}

fn respond(appointment: impl serde::Serialize, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "appointment": appointment,
        "message": message
    }))
}

// ==============================================================================
// BOOKING AND READS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state.booking.book_appointment(&actor, request, Some(token)).await?;

    Ok(respond(appointment, "Appointment booked successfully"))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointments = state.booking.list_appointments(&actor, query, Some(token)).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state.booking.get_appointment(&actor, appointment_id, Some(token)).await?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppointmentCellState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let availability = state
        .booking
        .available_slots(doctor_id, query.date, Some(auth.token()))
        .await?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<ConflictCheckQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let result = state
        .booking
        .check_conflicts(
            query.doctor_id,
            query.date,
            query.start_time,
            query.exclude_appointment_id,
            Some(auth.token()),
        )
        .await?;

    Ok(Json(json!(result)))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentDetailsRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state
        .booking
        .update_details(&actor, appointment_id, request, Some(token))
        .await?;

    Ok(respond(appointment, "Appointment updated successfully"))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state.booking.confirm(&actor, appointment_id, Some(token)).await?;

    Ok(respond(appointment, "Appointment confirmed successfully"))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state
        .booking
        .cancel(&actor, appointment_id, request, Some(token))
        .await?;

    Ok(respond(appointment, "Appointment cancelled successfully"))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state
        .booking
        .reschedule(&actor, appointment_id, request, Some(token))
        .await?;

    Ok(respond(appointment, "Appointment rescheduled successfully"))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state
        .booking
        .complete(&actor, appointment_id, request, Some(token))
        .await?;

    Ok(respond(appointment, "Appointment completed successfully"))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = state.actor(&user, token).await?;

    let appointment = state.booking.mark_no_show(&actor, appointment_id, Some(token)).await?;

    Ok(respond(appointment, "Appointment marked as no-show"))
}
