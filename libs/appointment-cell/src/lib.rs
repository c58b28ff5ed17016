pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::AppointmentCellState;
pub use models::*;
pub use router::appointment_routes;
