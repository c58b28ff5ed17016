// libs/appointment-cell/src/services/reminders.rs
//! Periodic reminders for confirmed appointments.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, RemindersSent};
use crate::services::notification::{AppointmentNotification, NotificationKind, NotificationService, Recipient};
use crate::services::store::{AppointmentPatch, AppointmentStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderLead {
    DayBefore,
    HourBefore,
}

impl ReminderLead {
    /// Flags after this reminder went out. An hour-before reminder also
    /// settles the day-before one.
    pub fn mark(self, sent: RemindersSent) -> RemindersSent {
        match self {
            ReminderLead::DayBefore => RemindersSent { day_before: true, ..sent },
            ReminderLead::HourBefore => RemindersSent {
                day_before: true,
                hour_before: true,
            },
        }
    }
}

/// Confirmed appointments starting after `now` that are owed a reminder.
pub fn due_reminders(appointments: &[Appointment], now: DateTime<Utc>) -> Vec<(Uuid, ReminderLead)> {
    appointments
        .iter()
        .filter(|apt| apt.status == AppointmentStatus::Confirmed)
        .filter_map(|apt| {
            let until = apt.starts_at() - now;
            if until <= Duration::zero() {
                return None;
            }

            if until <= Duration::hours(1) && !apt.reminders_sent.hour_before {
                Some((apt.id, ReminderLead::HourBefore))
            } else if until <= Duration::hours(24) && !apt.reminders_sent.day_before {
                Some((apt.id, ReminderLead::DayBefore))
            } else {
                None
            }
        })
        .collect()
}

pub struct ReminderJob {
    store: Arc<dyn AppointmentStore>,
    notifications: NotificationService,
    service_token: Option<String>,
    interval: StdDuration,
}

impl ReminderJob {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        notifications: NotificationService,
        service_token: Option<String>,
        interval: StdDuration,
    ) -> Self {
        Self {
            store,
            notifications,
            service_token,
            interval,
        }
    }

    /// One polling pass. Returns how many reminders were delivered.
    pub async fn run_once(&self, now: DateTime<Utc>) -> usize {
        let token = self.service_token.as_deref();
        let today = now.date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);

        let appointments = match self.store.list_confirmed_between(today, tomorrow, token).await {
            Ok(appointments) => appointments,
            Err(e) => {
                error!("Reminder pass could not load appointments: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, lead) in due_reminders(&appointments, now) {
            let Some(apt) = appointments.iter().find(|apt| apt.id == id) else {
                continue;
            };

            let notification = AppointmentNotification::new(NotificationKind::Reminder(lead), Recipient::Patient, apt);
            if let Err(e) = self.notifications.send(&notification).await {
                warn!("Reminder for appointment {} not delivered: {}", id, e);
                continue;
            }

            let patch = AppointmentPatch {
                reminders_sent: Some(lead.mark(apt.reminders_sent)),
                ..Default::default()
            };
            match self.store.update_if_status(id, AppointmentStatus::Confirmed, &patch, token).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!("Reminder sent but flag not recorded for appointment {}: {}", id, e),
            }
        }

        if delivered > 0 {
            info!("Sent {} appointment reminders", delivered);
        }
        delivered
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Reminder job started, polling every {:?}", self.interval);

            loop {
                ticker.tick().await;
                debug!("Running reminder pass");
                self.run_once(Utc::now()).await;
            }
        })
    }
}
