pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::DoctorCellState;
pub use models::*;
pub use services::*;
