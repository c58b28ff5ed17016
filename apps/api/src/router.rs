use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;

use crate::state::Backends;

pub fn create_router(config: Arc<AppConfig>, backends: &Backends) -> Router {
    Router::new()
        .route("/", get(|| async { "SmartCare API is running!" }))
        .nest("/doctors", doctor_routes(backends.doctor_state(config.clone())))
        .nest("/appointments", appointment_routes(backends.appointment_state(config)))
}
