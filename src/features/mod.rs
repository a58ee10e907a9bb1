//! # Features
//!
//! - **reminders**: daily question reminder scheduling
//! - **status**: streak and achievement read path
//! - **engagement**: likes and comments on answers

pub mod engagement;
pub mod reminders;
pub mod status;

pub use engagement::{AnswerEngagement, Comment, LikeState};
pub use reminders::{
    Clock, DeferredQueue, FireReport, LogNotifier, Notification, Notifier, ReminderConfig,
    ReminderScheduler, SchedulerDeps, SystemClock, WebhookNotifier,
};
pub use status::{load_status, UserStatus};
