// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    // Every appointment operation requires authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/availability/{doctor_id}", get(handlers::get_available_slots))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).put(handlers::update_appointment),
        )
        .route("/{appointment_id}/confirm", put(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", put(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", put(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", put(handlers::mark_no_show))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
