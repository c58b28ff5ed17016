// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_utils::time::hhmm;

use crate::models::{Appointment, AppointmentType};
use crate::services::reminders::ReminderLead;

/// Upper bound on a single delivery, whatever the channel.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "event", content = "lead")]
pub enum NotificationKind {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled,
    Reminder(ReminderLead),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Patient,
    Doctor,
}

/// Event payload handed to a dispatcher. Recipients are profile ids; the
/// channel resolves contact details on its side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentNotification {
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub recipient_id: Uuid,
    pub appointment_id: Uuid,
    pub appointment_number: String,
    pub appointment_type: AppointmentType,
    pub scheduled_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub video_call_link: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl AppointmentNotification {
    pub fn new(kind: NotificationKind, recipient: Recipient, appointment: &Appointment) -> Self {
        let recipient_id = match recipient {
            Recipient::Patient => appointment.patient_id,
            Recipient::Doctor => appointment.doctor_id,
        };

        Self {
            kind,
            recipient,
            recipient_id,
            appointment_id: appointment.id,
            appointment_number: appointment.appointment_number.clone(),
            appointment_type: appointment.appointment_type,
            scheduled_date: appointment.scheduled_date,
            start_time: appointment.start_time,
            video_call_link: appointment.video_call_link.clone(),
            cancellation_reason: appointment.cancellation_reason.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Notification not delivered within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &AppointmentNotification) -> Result<(), NotificationError>;
}

/// Posts each event as JSON to a configured endpoint (email relay, queue bridge).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(DISPATCH_TIMEOUT).build()?;

        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn dispatch(&self, notification: &AppointmentNotification) -> Result<(), NotificationError> {
        debug!("Posting {:?} notification for appointment {}", notification.kind, notification.appointment_id);

        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Notification webhook failed: {} - {}", status, message);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Fallback used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(&self, notification: &AppointmentNotification) -> Result<(), NotificationError> {
        info!(
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            recipient_id = %notification.recipient_id,
            appointment = %notification.appointment_number,
            "Appointment notification"
        );
        Ok(())
    }
}

/// Best-effort fan-out. Dispatch failures are logged and never returned
/// to the caller of a scheduling operation.
#[derive(Clone)]
pub struct NotificationService {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl NotificationService {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Deliver one notification and report the outcome, bounded by
    /// [`DISPATCH_TIMEOUT`].
    pub async fn send(&self, notification: &AppointmentNotification) -> Result<(), NotificationError> {
        deliver(self.dispatcher.as_ref(), notification).await
    }

    /// Fire-and-forget fan-out on a background task. The handle is only
    /// useful to callers that want to wait for delivery.
    pub fn notify(&self, kind: NotificationKind, appointment: &Appointment, recipients: &[Recipient]) -> JoinHandle<()> {
        let notifications: Vec<AppointmentNotification> = recipients
            .iter()
            .map(|recipient| AppointmentNotification::new(kind, *recipient, appointment))
            .collect();
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let results = join_all(notifications.iter().map(|n| deliver(dispatcher.as_ref(), n))).await;

            for (notification, result) in notifications.iter().zip(results) {
                if let Err(e) = result {
                    warn!(
                        "Failed to notify {:?} about appointment {}: {}",
                        notification.recipient, notification.appointment_id, e
                    );
                }
            }
        })
    }
}

async fn deliver(
    dispatcher: &dyn NotificationDispatcher,
    notification: &AppointmentNotification,
) -> Result<(), NotificationError> {
    timeout(DISPATCH_TIMEOUT, dispatcher.dispatch(notification))
        .await
        .map_err(|_| NotificationError::TimedOut(DISPATCH_TIMEOUT))?
}
