pub mod router;
pub mod seed;
pub mod state;
