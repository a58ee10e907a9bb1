//! # Feature: Daily Question Reminder
//!
//! Keeps exactly one daily reminder job pending while reminders are enabled.
//! When the job fires it checks whether today's question was already answered,
//! notifies if not, and arms the next day's job whatever the check returned.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Cancelling or changing settings while a reminder fires suppresses it
//! - 1.1.0: Catch up on reminders that came due while the daemon was stopped
//! - 1.0.0: Initial release with replace-on-resubmit daily job

use super::notifier::{Notification, Notifier};
use super::queue::{DeferredJob, DeferredQueue};
use super::schedule::{next_fire_at, ReminderConfig, MIN_DELAY};
use crate::database::Database;
use crate::remote::{answered_today, RecordStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Slot name of the one pending reminder job
pub const REMINDER_JOB_KEY: &str = "daily_question_reminder";

/// Delay before firing a reminder that was missed while the daemon was stopped
pub const CATCH_UP_DELAY: Duration = Duration::from_secs(5);

/// Source of the current local time
pub trait Clock: Send + Sync + 'static {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// Wall clock in the machine's local time zone
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// What happened when the reminder fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireReport {
    /// `None` when the remote check failed or timed out
    pub answered: Option<bool>,
    pub notified: bool,
    /// Due time of the successor job, if one was armed
    pub next_due: Option<DateTime<Utc>>,
}

/// Collaborators the scheduler is built over
pub struct SchedulerDeps {
    pub queue: DeferredQueue,
    pub records: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub database: Database,
    pub user_id: String,
    /// Bound on the "answered today" lookup and on notification delivery
    pub remote_timeout: Duration,
}

pub struct ReminderScheduler<C: Clock> {
    clock: C,
    queue: DeferredQueue,
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    database: Database,
    user_id: String,
    remote_timeout: Duration,
    /// Held while arming or cancelling so a settings change and a firing job cannot interleave
    config: Mutex<ReminderConfig>,
    /// Bumped under the config lock whenever the pending job is replaced or dropped
    generation: AtomicU64,
    me: Weak<ReminderScheduler<C>>,
}

impl<C: Clock> ReminderScheduler<C> {
    pub fn new(clock: C, deps: SchedulerDeps) -> Arc<Self> {
        Arc::new_cyclic(|me| ReminderScheduler {
            clock,
            queue: deps.queue,
            records: deps.records,
            notifier: deps.notifier,
            database: deps.database,
            user_id: deps.user_id,
            remote_timeout: deps.remote_timeout,
            config: Mutex::new(ReminderConfig::default()),
            generation: AtomicU64::new(0),
            me: me.clone(),
        })
    }

    pub async fn config(&self) -> ReminderConfig {
        *self.config.lock().await
    }

    /// Due time of the pending reminder job
    pub fn pending_fire_at(&self) -> Option<DateTime<Utc>> {
        self.queue.pending(REMINDER_JOB_KEY)
    }

    /// Persist new settings and re-arm (or cancel) the reminder accordingly.
    ///
    /// Only a persistence failure is returned; a failure to arm is logged and
    /// retried on the next settings change.
    pub async fn update_settings(&self, config: ReminderConfig) -> Result<Option<DateTime<Utc>>> {
        let mut current = self.config.lock().await;
        config.save(&self.database).await?;
        *current = config;

        info!(
            "Reminder settings updated: {} at {:02}:{:02}",
            if config.enabled { "enabled" } else { "disabled" },
            config.hour,
            config.minute
        );
        Ok(self.apply(&config).await)
    }

    /// Arm the reminder from the current settings, replacing any pending job
    pub async fn rearm(&self) -> Option<DateTime<Utc>> {
        let config = self.config.lock().await;
        self.apply(&config).await
    }

    /// Drop the pending reminder job, if any.
    ///
    /// A reminder that is already firing finishes its answer check but neither
    /// notifies nor arms a successor.
    pub async fn cancel(&self) {
        let _config = self.config.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_pending().await;
    }

    /// Pick up settings written by another process. Re-arms only when they changed.
    pub async fn sync_settings(&self) -> Result<bool> {
        let loaded = ReminderConfig::load(&self.database).await?;
        let mut config = self.config.lock().await;
        if *config == loaded {
            return Ok(false);
        }
        *config = loaded;

        info!(
            "Reminder settings changed externally: {} at {:02}:{:02}",
            if loaded.enabled { "enabled" } else { "disabled" },
            loaded.hour,
            loaded.minute
        );
        self.apply(&loaded).await;
        Ok(true)
    }

    /// Load persisted settings and pick up where a previous run left off
    pub async fn restore(&self) -> Result<Option<DateTime<Utc>>> {
        let loaded = ReminderConfig::load(&self.database).await?;
        let mut config = self.config.lock().await;
        *config = loaded;

        if !loaded.enabled {
            return Ok(self.apply(&loaded).await);
        }

        let previous = match self.database.load_pending_job(REMINDER_JOB_KEY).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Could not read pending reminder ledger: {e:#}");
                None
            }
        };

        let now = self.clock.now().with_timezone(&Utc);
        if let Some(missed) = previous.filter(|due| *due <= now) {
            info!("Reminder due {missed} was missed while stopped, catching up");
            self.generation.fetch_add(1, Ordering::SeqCst);
            return Ok(self.enqueue(missed, CATCH_UP_DELAY).await);
        }

        Ok(self.apply(&loaded).await)
    }

    /// Handle a fired reminder job.
    ///
    /// An unresolved "answered today" check counts as not answered. Unless
    /// the reminder was cancelled or re-armed in the meantime, exactly one
    /// successor is armed.
    pub async fn on_fire(&self, due: DateTime<Utc>) -> FireReport {
        let generation = {
            let config = self.config.lock().await;
            if !config.enabled {
                debug!("Reminder fired after being disabled, ignoring");
                return FireReport {
                    answered: None,
                    notified: false,
                    next_due: None,
                };
            }
            self.generation.load(Ordering::SeqCst)
        };

        let answered = self.check_answered().await;

        let notified = if answered == Some(true) {
            info!("Today's question already answered by {}, no reminder needed", self.user_id);
            false
        } else if self.superseded(generation) {
            debug!("Reminder for {due} superseded during the answer check, not notifying");
            false
        } else {
            self.deliver(&Notification::daily_question()).await
        };

        let config = self.config.lock().await;
        let next_due = if config.enabled && !self.superseded(generation) {
            self.arm(&config, Some(due)).await
        } else {
            None
        };

        FireReport {
            answered,
            notified,
            next_due,
        }
    }

    fn superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    async fn check_answered(&self) -> Option<bool> {
        let lookup = answered_today(self.records.as_ref(), &self.user_id);
        match timeout(self.remote_timeout, lookup).await {
            Ok(Ok(answered)) => Some(answered),
            Ok(Err(e)) => {
                warn!("Could not check today's answer, reminding anyway: {e:#}");
                None
            }
            Err(_) => {
                warn!(
                    "Answer check timed out after {:?}, reminding anyway",
                    self.remote_timeout
                );
                None
            }
        }
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        match timeout(self.remote_timeout, self.notifier.notify(notification)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Failed to deliver reminder notification: {e:#}");
                false
            }
            Err(_) => {
                warn!("Reminder notification timed out after {:?}", self.remote_timeout);
                false
            }
        }
    }

    /// Caller holds the config lock
    async fn apply(&self, config: &ReminderConfig) -> Option<DateTime<Utc>> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if config.enabled {
            self.arm(config, None).await
        } else {
            self.cancel_pending().await;
            None
        }
    }

    /// Arm the next occurrence after `after` (or after now, whichever is later)
    async fn arm(
        &self,
        config: &ReminderConfig,
        after: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let (due, delay) = self.plan(config, after);
        self.enqueue(due, delay).await
    }

    fn plan(
        &self,
        config: &ReminderConfig,
        after: Option<DateTime<Utc>>,
    ) -> (DateTime<Utc>, Duration) {
        let now = self.clock.now();
        let anchor = match after {
            Some(previous) => {
                let previous = previous.with_timezone(&now.timezone());
                if previous > now {
                    previous
                } else {
                    now.clone()
                }
            }
            None => now.clone(),
        };

        let due = next_fire_at(config, &anchor);
        let due_utc = due.with_timezone(&Utc);
        let delay = due
            .signed_duration_since(now)
            .to_std()
            .ok()
            .filter(|delay| !delay.is_zero())
            .unwrap_or(MIN_DELAY);

        (due_utc, delay)
    }

    async fn enqueue(&self, due: DateTime<Utc>, delay: Duration) -> Option<DateTime<Utc>> {
        let job: Arc<dyn DeferredJob> = match self.me.upgrade() {
            Some(me) => me,
            None => {
                warn!("Reminder scheduler is shutting down, not arming");
                return None;
            }
        };

        if let Err(e) = self.queue.enqueue(REMINDER_JOB_KEY, due, delay, job) {
            warn!("Failed to arm daily reminder, will retry on next settings change: {e:#}");
            return None;
        }
        if let Err(e) = self.database.save_pending_job(REMINDER_JOB_KEY, due).await {
            warn!("Could not record pending reminder: {e:#}");
        }

        info!("⏰ Daily reminder armed for {due} (in {})", format_delay(delay));
        Some(due)
    }

    async fn cancel_pending(&self) {
        if self.queue.cancel(REMINDER_JOB_KEY) {
            info!("Daily reminder cancelled");
        }
        if let Err(e) = self.database.clear_pending_job(REMINDER_JOB_KEY).await {
            warn!("Could not clear pending reminder record: {e:#}");
        }
    }
}

#[async_trait]
impl<C: Clock> DeferredJob for ReminderScheduler<C> {
    async fn run(&self, fire_at: DateTime<Utc>) {
        let report = self.on_fire(fire_at).await;
        debug!("Reminder for {fire_at} handled: {report:?}");
    }
}

/// Format a delay as e.g. `5h 3m`
fn format_delay(delay: Duration) -> String {
    let total = delay.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
