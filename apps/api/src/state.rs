use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tracing::{info, warn};

use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore, LogNotifier, NotificationDispatcher,
    NotificationService, ReminderJob, SupabaseAppointmentStore, WebhookNotifier,
};
use appointment_cell::AppointmentCellState;
use doctor_cell::services::{DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
use doctor_cell::DoctorCellState;
use patient_cell::services::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
use shared_config::{AppConfig, StorageBackend};

use crate::seed::MemorySeed;

/// Collaborators shared by every cell, chosen once from configuration.
#[derive(Clone)]
pub struct Backends {
    pub doctors: Arc<dyn DoctorDirectory>,
    pub patients: Arc<dyn PatientDirectory>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: NotificationService,
}

impl Backends {
    /// Fails when the in-memory backend is selected without a seed file,
    /// since nothing could be booked against empty directories.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let doctors: Arc<dyn DoctorDirectory>;
        let patients: Arc<dyn PatientDirectory>;
        let appointments: Arc<dyn AppointmentStore>;

        match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                doctors = Arc::new(SupabaseDoctorDirectory::new(config));
                patients = Arc::new(SupabasePatientDirectory::new(config));
                appointments = Arc::new(SupabaseAppointmentStore::new(config));
            }
            StorageBackend::Memory => {
                let Some(path) = config.memory_seed_path.as_deref() else {
                    bail!("STORAGE_BACKEND=memory requires MEMORY_SEED_PATH with doctor and patient profiles");
                };
                let seed = MemorySeed::load(path)?;
                warn!(
                    "Using in-memory storage seeded with {} doctors and {} patients from {}; data is lost on restart",
                    seed.doctors.len(),
                    seed.patients.len(),
                    path
                );
                doctors = Arc::new(InMemoryDoctorDirectory::with_doctors(seed.doctors));
                patients = Arc::new(InMemoryPatientDirectory::with_patients(seed.patients));
                appointments = Arc::new(InMemoryAppointmentStore::new());
            }
        }

        let dispatcher: Arc<dyn NotificationDispatcher> = match &config.notification_webhook_url {
            Some(url) => {
                info!("Appointment notifications posted to {}", url);
                Arc::new(WebhookNotifier::new(url.clone())?)
            }
            None => {
                warn!("NOTIFICATION_WEBHOOK_URL not set, notifications are only logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            doctors,
            patients,
            appointments,
            notifications: NotificationService::new(dispatcher),
        })
    }

    pub fn doctor_state(&self, config: Arc<AppConfig>) -> Arc<DoctorCellState> {
        Arc::new(DoctorCellState::new(config, self.doctors.clone()))
    }

    pub fn appointment_state(&self, config: Arc<AppConfig>) -> Arc<AppointmentCellState> {
        let booking = AppointmentBookingService::new(
            &config,
            self.appointments.clone(),
            self.doctors.clone(),
            self.patients.clone(),
            self.notifications.clone(),
        );
        Arc::new(AppointmentCellState::new(config, Arc::new(booking)))
    }

    /// The reminder job reads across all patients, so it uses the service
    /// role key when one is configured.
    pub fn reminder_job(&self, config: &AppConfig) -> ReminderJob {
        ReminderJob::new(
            self.appointments.clone(),
            self.notifications.clone(),
            config.supabase_service_role_key.clone(),
            Duration::from_secs(config.reminder_interval_seconds),
        )
    }
}
