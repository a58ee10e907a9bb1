// Core layer - configuration
pub mod core;

// Features layer - reminders, status, engagement
pub mod features;

// Infrastructure
pub mod database;
pub mod remote;

pub use core::Config;
pub use database::{Database, SettingsStore};
pub use remote::{HttpRecordStore, MemoryRecordStore, RecordStore};

pub use features::{
    // Engagement
    AnswerEngagement, Comment, LikeState,
    // Reminders
    Clock, DeferredQueue, FireReport, LogNotifier, Notification, Notifier, ReminderConfig,
    ReminderScheduler, SchedulerDeps, SystemClock, WebhookNotifier,
    // Status
    load_status, UserStatus,
};
