use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{PatientError, PatientProfile};

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<PatientProfile>, PatientError>;

    async fn get(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<PatientProfile, PatientError>;
}

pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_one(&self, filter: &str, auth_token: Option<&str>) -> Result<Option<PatientProfile>, PatientError> {
        let path = format!("/rest/v1/patients?{}&select=id,user_id&limit=1", filter);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| PatientError::Unavailable(format!("Failed to parse patient: {}", e)))
            })
            .transpose()
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<PatientProfile>, PatientError> {
        debug!("Resolving patient profile for user {}", user_id);
        self.fetch_one(&format!("user_id=eq.{}", urlencoding::encode(user_id)), auth_token)
            .await
    }

    async fn get(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<PatientProfile, PatientError> {
        self.fetch_one(&format!("id=eq.{}", patient_id), auth_token)
            .await?
            .ok_or(PatientError::NotFound)
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, PatientProfile>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = PatientProfile>) -> Self {
        Self {
            patients: RwLock::new(patients.into_iter().map(|patient| (patient.id, patient)).collect()),
        }
    }

    pub async fn insert(&self, patient: PatientProfile) {
        self.patients.write().await.insert(patient.id, patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_by_user_id(
        &self,
        user_id: &str,
        _auth_token: Option<&str>,
    ) -> Result<Option<PatientProfile>, PatientError> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .find(|patient| patient.user_id == user_id)
            .cloned())
    }

    async fn get(&self, patient_id: Uuid, _auth_token: Option<&str>) -> Result<PatientProfile, PatientError> {
        self.patients
            .read()
            .await
            .get(&patient_id)
            .cloned()
            .ok_or(PatientError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn resolves_profile_from_user_id() {
        let mock_server = MockServer::start().await;
        let patient_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(query_param("user_id", "eq.user-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::patient_row(&patient_id.to_string(), "user-42")
            ])))
            .mount(&mock_server)
            .await;

        let config = TestConfig::with_supabase(&mock_server.uri()).to_app_config();
        let directory = SupabasePatientDirectory::new(&config);

        let profile = directory.find_by_user_id("user-42", Some("token")).await.unwrap();
        assert_eq!(profile.map(|p| p.id), Some(patient_id));
    }

    #[tokio::test]
    async fn missing_profile_is_none_but_get_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let config = TestConfig::with_supabase(&mock_server.uri()).to_app_config();
        let directory = SupabasePatientDirectory::new(&config);

        assert!(directory.find_by_user_id("nobody", None).await.unwrap().is_none());
        assert!(matches!(
            directory.get(Uuid::new_v4(), None).await,
            Err(PatientError::NotFound)
        ));
    }

    #[tokio::test]
    async fn in_memory_lookup() {
        let directory = InMemoryPatientDirectory::new();
        let profile = PatientProfile {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
        };
        directory.insert(profile.clone()).await;

        assert_eq!(directory.find_by_user_id("user-1", None).await.unwrap(), Some(profile.clone()));
        assert_eq!(directory.get(profile.id, None).await.unwrap(), profile);
    }
}
