use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DoctorCellState};

pub fn doctor_routes(state: Arc<DoctorCellState>) -> Router {
    let public_routes = Router::new().route("/{doctor_id}", get(handlers::get_doctor_schedule));

    let protected_routes = Router::new()
        .route("/availability", put(handlers::update_my_availability))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
