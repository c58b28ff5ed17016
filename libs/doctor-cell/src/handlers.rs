use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{DoctorError, UpdateScheduleRequest};
use crate::services::availability::validate_schedule_update;
use crate::services::DoctorDirectory;

pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn DoctorDirectory>,
}

impl DoctorCellState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { config, directory }
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.directory.get_schedule(doctor_id, None).await?;

    Ok(Json(json!({
        "doctor": doctor,
        "consultation_duration": doctor.slot_minutes()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_my_availability(
    State(state): State<Arc<DoctorCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.platform_role() != Some(Role::Doctor) {
        return Err(DoctorError::NotADoctor.into());
    }

    validate_schedule_update(&request)?;

    let doctor = state
        .directory
        .find_by_user_id(&user.id, Some(token))
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    let updated = state.directory.update_schedule(doctor.id, &request, Some(token)).await?;
    info!("Doctor {} updated their availability", updated.id);

    Ok(Json(json!({
        "success": true,
        "doctor": updated,
        "message": "Availability updated successfully"
    })))
}
