pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notification;
pub mod numbering;
pub mod reminders;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use booking::AppointmentBookingService;
pub use lifecycle::Actor;
pub use notification::{LogNotifier, NotificationDispatcher, NotificationService, WebhookNotifier};
pub use reminders::ReminderJob;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
