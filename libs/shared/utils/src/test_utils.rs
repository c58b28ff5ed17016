use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, StorageBackend};
use shared_models::auth::User;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_backend: StorageBackend,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase client at a wiremock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            storage_backend: StorageBackend::Supabase,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            storage_backend: self.storage_backend,
            telemedicine_base_url: "https://meet.test/room".to_string(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role,
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    /// Token shaped like Supabase issues it: generic `role`, platform role in app_metadata.
    pub fn create_supabase_style_token(user: &TestUser, secret: &str) -> String {
        let now = Utc::now();
        Self::sign(
            json!({
                "sub": user.id,
                "email": user.email,
                "role": "authenticated",
                "app_metadata": { "role": user.role },
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser) -> String {
        format!("Bearer {}", Self::create_test_token(user, TEST_JWT_SECRET, Some(1)))
    }

    fn sign(payload: Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature_encoded)
    }
}

/// PostgREST-shaped rows for wiremock stubs.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_schedule_row(doctor_id: &str, user_id: &str) -> Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "availability": {
                "monday": [{ "start": "09:00", "end": "12:00" }],
                "tuesday": [],
                "wednesday": [{ "start": "14:00", "end": "17:00" }],
                "thursday": [],
                "friday": [],
                "saturday": [],
                "sunday": []
            },
            "consultation_duration": 30,
            "is_accepting_patients": true,
            "is_available_for_telemedicine": true,
            "consultation_fee": 50.0,
            "total_patients": 0
        })
    }

    pub fn patient_row(patient_id: &str, user_id: &str) -> Value {
        json!({
            "id": patient_id,
            "user_id": user_id
        })
    }

    pub fn appointment_row(appointment_id: &str, patient_id: &str, doctor_id: &str, status: &str) -> Value {
        json!({
            "id": appointment_id,
            "appointment_number": "APT-LQ2Z9K3MABCDE",
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_type": "in-person",
            "status": status,
            "scheduled_date": "2099-01-05",
            "start_time": "09:00:00",
            "end_time": "09:30:00",
            "duration_minutes": 30,
            "reason_for_visit": "Persistent cough",
            "symptoms": ["cough"],
            "notes": null,
            "payment_amount": 50.0,
            "video_room_id": null,
            "video_call_link": null,
            "diagnosis": null,
            "follow_up_required": false,
            "follow_up_date": null,
            "doctor_notes": null,
            "cancelled_by": null,
            "cancellation_reason": null,
            "cancelled_at": null,
            "reminders_sent": { "day_before": false, "hour_before": false },
            "created_at": "2098-12-01T00:00:00Z",
            "updated_at": "2098-12-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
