use std::env;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: Option<String>,
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// JSON file with the doctor and patient profiles the in-memory backend starts from.
    pub memory_seed_path: Option<String>,
    pub notification_webhook_url: Option<String>,
    pub telemedicine_base_url: String,
    pub reminder_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let storage_backend = match env::var("STORAGE_BACKEND").ok().as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("supabase") => StorageBackend::Supabase,
            Some(other) => {
                warn!("Unknown STORAGE_BACKEND '{}', falling back to supabase", other);
                StorageBackend::Supabase
            }
            None if supabase_url.is_empty() => {
                warn!("STORAGE_BACKEND not set and Supabase is unconfigured, using in-memory storage");
                StorageBackend::Memory
            }
            None => StorageBackend::Supabase,
        };

        let config = Self {
            supabase_url,
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            storage_backend,
            memory_seed_path: env::var("MEMORY_SEED_PATH")
                .ok()
                .filter(|path| !path.is_empty()),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            telemedicine_base_url: env::var("TELEMEDICINE_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("TELEMEDICINE_BASE_URL not set, using default");
                    "https://meet.smartcare.health/room".to_string()
                }),
            reminder_interval_seconds: env::var("REMINDER_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .unwrap_or(60),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let auth_ready = !self.supabase_jwt_secret.is_empty();
        match self.storage_backend {
            StorageBackend::Memory => auth_ready,
            StorageBackend::Supabase => {
                auth_ready
                    && !self.supabase_url.is_empty()
                    && !self.supabase_anon_key.is_empty()
            }
        }
    }

    pub fn is_notification_webhook_configured(&self) -> bool {
        self.notification_webhook_url.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: None,
            port: 3000,
            storage_backend: StorageBackend::Memory,
            memory_seed_path: None,
            notification_webhook_url: None,
            telemedicine_base_url: "https://meet.smartcare.health/room".to_string(),
            reminder_interval_seconds: 60,
        }
    }
}
