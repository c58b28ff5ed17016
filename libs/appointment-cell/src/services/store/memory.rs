use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use shared_utils::time::TimeRange;

use crate::models::{Appointment, AppointmentSearchQuery, AppointmentStatus, RemindersSent};
use crate::services::conflict::has_conflict;

use super::{AppointmentPatch, AppointmentStore, StoreError};

/// Process-local store. Every read-check-write runs under a single lock,
/// which makes booking and rescheduling serializable.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(apt: &Appointment, query: &AppointmentSearchQuery) -> bool {
    query.patient_id.map_or(true, |id| apt.patient_id == id)
        && query.doctor_id.map_or(true, |id| apt.doctor_id == id)
        && query.status.map_or(true, |status| apt.status == status)
        && query.from_date.map_or(true, |from| apt.scheduled_date >= from)
        && query.to_date.map_or(true, |to| apt.scheduled_date <= to)
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_if_free(
        &self,
        appointment: Appointment,
        _auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.lock().await;

        let existing: Vec<Appointment> = appointments.values().cloned().collect();
        if has_conflict(
            &existing,
            appointment.doctor_id,
            appointment.scheduled_date,
            &appointment.slot(),
            None,
        ) {
            return Err(StoreError::Conflict);
        }

        debug!("Storing appointment {}", appointment.id);
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid, _auth_token: Option<&str>) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.lock().await.get(&id).cloned())
    }

    async fn find_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        _auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .await
            .values()
            .filter(|apt| apt.doctor_id == doctor_id && apt.scheduled_date == date && apt.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|apt| apt.start_time);
        Ok(found)
    }

    async fn update_if_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &AppointmentPatch,
        _auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments.get_mut(&id).ok_or(StoreError::NotFound)?;

        if appointment.status != expected {
            return Err(StoreError::Stale);
        }

        patch.apply_to(appointment);
        Ok(appointment.clone())
    }

    async fn reschedule_if_free(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        date: NaiveDate,
        slot: TimeRange,
        _auth_token: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.lock().await;

        let current = appointments.get(&id).ok_or(StoreError::NotFound)?;
        if current.status != expected {
            return Err(StoreError::Stale);
        }
        let doctor_id = current.doctor_id;

        let existing: Vec<Appointment> = appointments.values().cloned().collect();
        if has_conflict(&existing, doctor_id, date, &slot, Some(id)) {
            return Err(StoreError::Conflict);
        }

        let appointment = appointments.get_mut(&id).ok_or(StoreError::NotFound)?;
        appointment.scheduled_date = date;
        appointment.start_time = slot.start;
        appointment.end_time = slot.end;
        appointment.duration_minutes = slot.duration_minutes();
        appointment.reminders_sent = RemindersSent::default();
        appointment.updated_at = Utc::now();

        Ok(appointment.clone())
    }

    async fn list(
        &self,
        query: &AppointmentSearchQuery,
        _auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .await
            .values()
            .filter(|apt| matches_query(apt, query))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            b.scheduled_date
                .cmp(&a.scheduled_date)
                .then_with(|| b.start_time.cmp(&a.start_time))
        });

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_confirmed_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        _auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .appointments
            .lock()
            .await
            .values()
            .filter(|apt| apt.status == AppointmentStatus::Confirmed)
            .filter(|apt| apt.scheduled_date >= from && apt.scheduled_date <= to)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::testing::appointment_at;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn identical_concurrent_bookings_yield_one_winner() {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let template = appointment_at("09:00", 30, AppointmentStatus::Pending);

        let attempts: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                let mut apt = template.clone();
                apt.id = Uuid::new_v4();
                apt.patient_id = Uuid::new_v4();
                tokio::spawn(async move { store.insert_if_free(apt, None).await })
            })
            .collect();

        let mut wins = 0;
        let mut conflicts = 0;
        for attempt in futures::future::join_all(attempts).await {
            match attempt.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::Conflict) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 9);
    }

    #[tokio::test]
    async fn conditional_update_detects_stale_status() {
        let store = InMemoryAppointmentStore::new();
        let apt = store
            .insert_if_free(appointment_at("09:00", 30, AppointmentStatus::Pending), None)
            .await
            .unwrap();

        let confirm = AppointmentPatch::status(AppointmentStatus::Confirmed);
        store.update_if_status(apt.id, AppointmentStatus::Pending, &confirm, None).await.unwrap();

        assert_matches!(
            store.update_if_status(apt.id, AppointmentStatus::Pending, &confirm, None).await,
            Err(StoreError::Stale)
        );
        assert_matches!(
            store.update_if_status(Uuid::new_v4(), AppointmentStatus::Pending, &confirm, None).await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn reschedule_onto_own_slot_succeeds_and_onto_other_fails() {
        let store = InMemoryAppointmentStore::new();
        let first = store
            .insert_if_free(appointment_at("09:00", 30, AppointmentStatus::Pending), None)
            .await
            .unwrap();

        let mut second = appointment_at("10:00", 30, AppointmentStatus::Pending);
        second.doctor_id = first.doctor_id;
        let second = store.insert_if_free(second, None).await.unwrap();

        let same = store
            .reschedule_if_free(first.id, first.status, first.scheduled_date, first.slot(), None)
            .await
            .unwrap();
        assert_eq!(same.slot(), first.slot());

        assert_matches!(
            store
                .reschedule_if_free(first.id, first.status, second.scheduled_date, second.slot(), None)
                .await,
            Err(StoreError::Conflict)
        );
    }

    #[tokio::test]
    async fn list_applies_filters_and_paging() {
        let store = InMemoryAppointmentStore::new();
        let a = appointment_at("09:00", 30, AppointmentStatus::Pending);
        let mut b = appointment_at("10:00", 30, AppointmentStatus::Confirmed);
        b.patient_id = a.patient_id;
        let c = appointment_at("11:00", 30, AppointmentStatus::Pending);

        for apt in [a.clone(), b.clone(), c] {
            store.insert_if_free(apt, None).await.unwrap();
        }

        let mine = AppointmentSearchQuery {
            patient_id: Some(a.patient_id),
            ..Default::default()
        };
        let found = store.list(&mine, None).await.unwrap();
        assert_eq!(found.iter().map(|apt| apt.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let confirmed = AppointmentSearchQuery {
            patient_id: Some(a.patient_id),
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };
        assert_eq!(store.list(&confirmed, None).await.unwrap().len(), 1);

        let paged = AppointmentSearchQuery {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        };
        assert_eq!(store.list(&paged, None).await.unwrap().len(), 1);
    }
}
