use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::time::{format_time, TimeRange};

use crate::models::{Appointment, AppointmentSearchQuery, AppointmentStatus, RemindersSent};

use super::{AppointmentPatch, AppointmentStore, StoreError};

const TABLE: &str = "/rest/v1/appointments";

/// PostgREST-backed store. Overlaps are rejected by the database's
/// exclusion constraint; status changes are conditional on the current
/// status so concurrent transitions cannot both apply.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| StoreError::Backend(format!("Failed to parse appointments: {}", e)))
    }

    async fn get_rows(&self, path: &str, auth_token: Option<&str>) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, auth_token, None).await?;
        Self::parse_rows(rows)
    }

    async fn patch_if_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        body: Value,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", TABLE, id, expected);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                auth_token,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        // No row matched the status filter: someone else moved it first.
        match Self::parse_rows(rows)?.into_iter().next() {
            Some(appointment) => Ok(appointment),
            None => {
                warn!("Conditional update on appointment {} matched no row in status {}", id, expected);
                Err(StoreError::Stale)
            }
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    #[instrument(skip(self, appointment, auth_token), fields(appointment_id = %appointment.id))]
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(format!("Failed to encode appointment: {}", e)))?;

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                auth_token,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let created = Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create appointment".to_string()))?;

        info!("Appointment {} stored", created.id);
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid, auth_token: Option<&str>) -> Result<Option<Appointment>, StoreError> {
        debug!("Fetching appointment: {}", id);
        let path = format!("{}?id=eq.{}", TABLE, id);
        Ok(self.get_rows(&path, auth_token).await?.into_iter().next())
    }

    async fn find_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&scheduled_date=eq.{}&status=in.(pending,confirmed)&order=start_time.asc",
            TABLE, doctor_id, date
        );
        self.get_rows(&path, auth_token).await
    }

    #[instrument(skip(self, patch, auth_token))]
    async fn update_if_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut body = serde_json::to_value(patch)
            .map_err(|e| StoreError::Backend(format!("Failed to encode update: {}", e)))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        self.patch_if_status(id, expected, body, auth_token).await
    }

    #[instrument(skip(self, auth_token))]
    async fn reschedule_if_free(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        date: NaiveDate,
        slot: TimeRange,
        auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let body = json!({
            "scheduled_date": date,
            "start_time": format_time(slot.start),
            "end_time": format_time(slot.end),
            "duration_minutes": slot.duration_minutes(),
            "reminders_sent": RemindersSent::default(),
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_if_status(id, expected, body, auth_token).await
    }

    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("scheduled_date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("scheduled_date=lte.{}", to_date));
        }
        query_parts.push("order=scheduled_date.desc,start_time.desc".to_string());
        if let Some(limit) = query.limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("{}?{}", TABLE, query_parts.join("&"));
        self.get_rows(&path, auth_token).await
    }

    async fn list_confirmed_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "{}?status=eq.confirmed&scheduled_date=gte.{}&scheduled_date=lte.{}&order=scheduled_date.asc,start_time.asc",
            TABLE, from, to
        );
        self.get_rows(&path, auth_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::models::AppointmentError;
    use crate::services::testing::appointment_at;

    fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
        SupabaseAppointmentStore::new(&TestConfig::with_supabase(&server.uri()).to_app_config())
    }

    #[tokio::test]
    async fn exclusion_violation_is_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
                "conflicting key value violates exclusion constraint \"appointments_no_overlap\"",
                "23P01",
            )))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .insert_if_free(appointment_at("09:00", 30, AppointmentStatus::Pending), None)
            .await;
        assert_matches!(result, Err(StoreError::Conflict));
    }

    #[tokio::test]
    async fn duplicate_number_is_not_reported_as_a_taken_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"appointments_appointment_number_key\"",
                "23505",
            )))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .insert_if_free(appointment_at("09:00", 30, AppointmentStatus::Pending), None)
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Backend(_));
        assert_matches!(AppointmentError::from(err), AppointmentError::Database(_));
    }

    #[tokio::test]
    async fn empty_conditional_patch_is_stale() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", id)))
            .and(query_param("status", "eq.pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let result = store_for(&server)
            .update_if_status(
                id,
                AppointmentStatus::Pending,
                &AppointmentPatch::status(AppointmentStatus::Confirmed),
                Some("token"),
            )
            .await;
        assert_matches!(result, Err(StoreError::Stale));
    }

    #[tokio::test]
    async fn postgres_time_columns_are_read() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        let row = MockSupabaseResponses::appointment_row(
            &id.to_string(),
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            "no-show",
        );

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
            .mount(&server)
            .await;

        let found = store_for(&server).find_by_id(id, None).await.unwrap().unwrap();
        assert_eq!(found.status, AppointmentStatus::NoShow);
        assert_eq!(format_time(found.start_time), "09:00");
        assert_eq!(found.duration_minutes, 30);
    }

    #[tokio::test]
    async fn active_lookup_filters_by_status_set() {
        let server = MockServer::start().await;
        let doctor_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
            .and(query_param("scheduled_date", "eq.2099-01-05"))
            .and(query_param("status", "in.(pending,confirmed)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2099, 1, 5).unwrap();
        let found = store_for(&server)
            .find_active_for_doctor_on(doctor_id, date, None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
