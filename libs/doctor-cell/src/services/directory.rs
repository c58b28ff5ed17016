// libs/doctor-cell/src/services/directory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorError, DoctorSchedule, UpdateScheduleRequest};

/// Read/write access to the scheduling-relevant part of doctor profiles.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_schedule(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<DoctorSchedule, DoctorError>;

    async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<DoctorSchedule>, DoctorError>;

    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        request: &UpdateScheduleRequest,
        auth_token: Option<&str>,
    ) -> Result<DoctorSchedule, DoctorError>;

    /// Atomically bump the completed-consultation counter, returning the new value.
    async fn increment_total_patients(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<u64, DoctorError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch_one(&self, filter: &str, auth_token: Option<&str>) -> Result<Option<DoctorSchedule>, DoctorError> {
        let path = format!("/rest/v1/doctors?{}&limit=1", filter);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DoctorError::Unavailable(format!("Failed to parse doctor: {}", e))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    #[instrument(skip(self, auth_token))]
    async fn get_schedule(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<DoctorSchedule, DoctorError> {
        debug!("Fetching schedule for doctor {}", doctor_id);
        self.fetch_one(&format!("id=eq.{}", doctor_id), auth_token)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    #[instrument(skip(self, auth_token))]
    async fn find_by_user_id(
        &self,
        user_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<DoctorSchedule>, DoctorError> {
        self.fetch_one(&format!("user_id=eq.{}", urlencoding::encode(user_id)), auth_token)
            .await
    }

    #[instrument(skip(self, request, auth_token))]
    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        request: &UpdateScheduleRequest,
        auth_token: Option<&str>,
    ) -> Result<DoctorSchedule, DoctorError> {
        let mut update = Map::new();
        if let Some(availability) = &request.availability {
            update.insert("availability".to_string(), json!(availability));
        }
        if let Some(duration) = request.consultation_duration {
            update.insert("consultation_duration".to_string(), json!(duration));
        }
        if let Some(telemedicine) = request.is_available_for_telemedicine {
            update.insert("is_available_for_telemedicine".to_string(), json!(telemedicine));
        }
        if let Some(accepting) = request.is_accepting_patients {
            update.insert("is_accepting_patients".to_string(), json!(accepting));
        }

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                auth_token,
                Some(Value::Object(update)),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        let schedule: DoctorSchedule = serde_json::from_value(row)
            .map_err(|e| DoctorError::Unavailable(format!("Failed to parse doctor: {}", e)))?;

        info!("Schedule updated for doctor {}", doctor_id);
        Ok(schedule)
    }

    #[instrument(skip(self, auth_token))]
    async fn increment_total_patients(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<u64, DoctorError> {
        let total: Option<u64> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/increment_doctor_total_patients",
                auth_token,
                Some(json!({ "doctor_id": doctor_id })),
            )
            .await?;

        // The function returns NULL when no row matched.
        total.ok_or(DoctorError::NotFound)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, DoctorSchedule>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = DoctorSchedule>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|schedule| (schedule.id, schedule)).collect()),
        }
    }

    pub async fn insert(&self, schedule: DoctorSchedule) {
        self.doctors.write().await.insert(schedule.id, schedule);
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn get_schedule(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<DoctorSchedule, DoctorError> {
        self.doctors
            .read()
            .await
            .get(&doctor_id)
            .cloned()
            .ok_or(DoctorError::NotFound)
    }

    async fn find_by_user_id(
        &self,
        user_id: &str,
        _auth_token: Option<&str>,
    ) -> Result<Option<DoctorSchedule>, DoctorError> {
        Ok(self
            .doctors
            .read()
            .await
            .values()
            .find(|doctor| doctor.user_id == user_id)
            .cloned())
    }

    async fn update_schedule(
        &self,
        doctor_id: Uuid,
        request: &UpdateScheduleRequest,
        _auth_token: Option<&str>,
    ) -> Result<DoctorSchedule, DoctorError> {
        let mut doctors = self.doctors.write().await;
        let schedule = doctors.get_mut(&doctor_id).ok_or(DoctorError::NotFound)?;
        request.apply_to(schedule);
        Ok(schedule.clone())
    }

    async fn increment_total_patients(&self, doctor_id: Uuid, _auth_token: Option<&str>) -> Result<u64, DoctorError> {
        let mut doctors = self.doctors.write().await;
        let schedule = doctors.get_mut(&doctor_id).ok_or(DoctorError::NotFound)?;
        schedule.total_patients += 1;
        Ok(schedule.total_patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let directory = Arc::new(InMemoryDoctorDirectory::new());
        let doctor = DoctorSchedule::new(Uuid::new_v4(), "doctor-user");
        let doctor_id = doctor.id;
        directory.insert(doctor).await;

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.increment_total_patients(doctor_id, None).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let schedule = directory.get_schedule(doctor_id, None).await.unwrap();
        assert_eq!(schedule.total_patients, 20);
    }

    #[tokio::test]
    async fn lookup_by_user_id() {
        let directory = InMemoryDoctorDirectory::new();
        directory.insert(DoctorSchedule::new(Uuid::new_v4(), "doctor-user")).await;

        assert!(directory.find_by_user_id("doctor-user", None).await.unwrap().is_some());
        assert!(directory.find_by_user_id("someone-else", None).await.unwrap().is_none());
        assert!(matches!(
            directory.get_schedule(Uuid::new_v4(), None).await,
            Err(DoctorError::NotFound)
        ));
    }
}
