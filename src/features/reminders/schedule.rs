//! # Reminder Schedule
//!
//! Persisted reminder settings and the wall-clock arithmetic that turns them
//! into the next fire time.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use crate::database::SettingsStore;
use anyhow::Result;
use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings key for the on/off toggle
pub const ENABLED_KEY: &str = "remindersEnabled";
/// Settings key for the hour of day (0-23)
pub const HOUR_KEY: &str = "reminderHour";
/// Settings key for the minute of hour (0-59)
pub const MINUTE_KEY: &str = "reminderMinute";

pub const DEFAULT_HOUR: u32 = 20;
pub const DEFAULT_MINUTE: u32 = 0;

/// Lower bound on any computed delay
pub const MIN_DELAY: Duration = Duration::from_secs(1);

/// Longest DST gap we step across when a wall-clock time does not exist
const MAX_GAP_MINUTES: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: DEFAULT_HOUR,
            minute: DEFAULT_MINUTE,
        }
    }
}

impl ReminderConfig {
    /// Build a config, clamping hour and minute into range
    pub fn new(enabled: bool, hour: i64, minute: i64) -> Self {
        Self {
            enabled,
            hour: hour.clamp(0, 23) as u32,
            minute: minute.clamp(0, 59) as u32,
        }
    }

    /// Load from settings storage.
    ///
    /// Missing or unparsable values fall back to defaults and out-of-range
    /// values are clamped; only a storage failure is an error.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = Self::default();

        let enabled = match store.get_setting(ENABLED_KEY).await? {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!("Unreadable {ENABLED_KEY} value '{raw}', treating as disabled");
                defaults.enabled
            }),
            None => defaults.enabled,
        };
        let hour = read_component(store, HOUR_KEY, defaults.hour).await?;
        let minute = read_component(store, MINUTE_KEY, defaults.minute).await?;

        Ok(Self::new(enabled, hour, minute))
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        store
            .set_setting(ENABLED_KEY, if self.enabled { "true" } else { "false" })
            .await?;
        store.set_setting(HOUR_KEY, &self.hour.to_string()).await?;
        store.set_setting(MINUTE_KEY, &self.minute.to_string()).await?;
        Ok(())
    }

    pub fn time_of_day(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.min(23), self.minute.min(59), 0)
            .unwrap_or_default()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

async fn read_component(store: &dyn SettingsStore, key: &str, default: u32) -> Result<i64> {
    let value = match store.get_setting(key).await? {
        Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
            warn!("Unreadable {key} value '{raw}', using {default}");
            default as i64
        }),
        None => default as i64,
    };
    Ok(value)
}

/// Next instant strictly after `now` whose local time is the configured hour:minute.
///
/// `now` exactly on the configured minute counts as already passed, so the
/// result is the following day.
pub fn next_fire_at<Tz: TimeZone>(config: &ReminderConfig, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let time = config.time_of_day();
    let today = now.date_naive();

    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        let candidate = resolve_wall_clock(date.and_time(time), |local| {
            tz.from_local_datetime(local)
        });
        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
    }

    now.clone() + chrono::Duration::days(1)
}

/// Delay from `now` until the next configured occurrence. Always positive.
pub fn schedule<Tz: TimeZone>(config: &ReminderConfig, now: &DateTime<Tz>) -> Duration {
    let next = next_fire_at(config, now);
    next.signed_duration_since(now.clone())
        .to_std()
        .ok()
        .filter(|delay| !delay.is_zero())
        .unwrap_or(MIN_DELAY)
}

/// Map a local wall-clock time to an instant.
///
/// Ambiguous times (clocks going back) take the earliest instant. Times inside
/// a gap (clocks going forward) move to the first minute after the gap.
fn resolve_wall_clock<T, F>(local: NaiveDateTime, resolve: F) -> Option<T>
where
    F: Fn(&NaiveDateTime) -> LocalResult<T>,
{
    for minutes in 0..=MAX_GAP_MINUTES {
        let shifted = local + chrono::Duration::minutes(minutes);
        match resolve(&shifted) {
            LocalResult::Single(instant) => return Some(instant),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => continue,
        }
    }
    None
}
