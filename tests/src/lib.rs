//! In-process harness for exercising the full API router.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::services::{InMemoryAppointmentStore, LogNotifier, NotificationService};
use doctor_cell::models::DoctorSchedule;
use doctor_cell::services::InMemoryDoctorDirectory;
use patient_cell::models::PatientProfile;
use patient_cell::services::InMemoryPatientDirectory;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use smartcare_api::router::create_router;
use smartcare_api::state::Backends;

pub struct TestApp {
    pub router: Router,
    pub doctors: Arc<InMemoryDoctorDirectory>,
    pub patients: Arc<InMemoryPatientDirectory>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = TestConfig::default().to_arc();
        let doctors = Arc::new(InMemoryDoctorDirectory::new());
        let patients = Arc::new(InMemoryPatientDirectory::new());

        let backends = Backends {
            doctors: doctors.clone(),
            patients: patients.clone(),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            notifications: NotificationService::new(Arc::new(LogNotifier)),
        };

        Self {
            router: create_router(config, &backends),
            doctors,
            patients,
        }
    }

    /// Register a doctor profile with an empty weekly schedule.
    pub async fn add_doctor(&self, user: &TestUser) -> Uuid {
        let id = Uuid::new_v4();
        self.doctors.insert(DoctorSchedule::new(id, user.id.clone())).await;
        id
    }

    pub async fn add_patient(&self, user: &TestUser) -> Uuid {
        let id = Uuid::new_v4();
        self.patients
            .insert(PatientProfile {
                id,
                user_id: user.id.clone(),
            })
            .await;
        id
    }

    pub async fn call(&self, method: &str, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header("authorization", JwtTestUtils::bearer(user));
        }
        let body = match body {
            Some(value) => {
                request = request.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
