pub mod directory;

pub use directory::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
