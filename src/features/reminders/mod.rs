//! # Reminders Feature
//!
//! Daily "answer today's question" reminder: settings, delay arithmetic, the
//! deferred job queue and the scheduler that ties them together.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true

pub mod notifier;
pub mod queue;
pub mod schedule;
pub mod scheduler;

pub use notifier::{LogNotifier, Notification, Notifier, WebhookNotifier};
pub use queue::{DeferredJob, DeferredQueue};
pub use schedule::{next_fire_at, schedule, ReminderConfig};
pub use scheduler::{
    Clock, FireReport, ReminderScheduler, SchedulerDeps, SystemClock, REMINDER_JOB_KEY,
};
