//! # Local Database
//!
//! Sqlite-backed key-value settings and the ledger of pending deferred jobs.
//! The ledger lets a restarted daemon notice reminders that came due while it
//! was not running.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sqlite::{Connection, State};
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS pending_jobs (
        key TEXT PRIMARY KEY NOT NULL,
        fire_at TEXT NOT NULL
    );
";

/// Read/write access to persisted key-value settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path`. `:memory:` gives a private in-memory database.
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("Failed to open database at {path}"))?;
        connection
            .execute(SCHEMA)
            .context("Failed to initialize database schema")?;

        info!("Database ready at {path}");

        Ok(Database {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT value FROM settings WHERE key = ?")?;
        statement.bind((1, key))?;

        if let State::Row = statement.next()? {
            Ok(Some(statement.read::<String, _>(0)?))
        } else {
            Ok(None)
        }
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")?;
        statement.bind((1, key))?;
        statement.bind((2, value))?;
        statement.next()?;

        debug!("Setting {key} = {value}");
        Ok(())
    }

    pub async fn remove_setting(&self, key: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM settings WHERE key = ?")?;
        statement.bind((1, key))?;
        statement.next()?;
        Ok(())
    }

    /// Record the fire time of the job pending under `key`, replacing any previous row
    pub async fn save_pending_job(&self, key: &str, fire_at: DateTime<Utc>) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("INSERT OR REPLACE INTO pending_jobs (key, fire_at) VALUES (?, ?)")?;
        statement.bind((1, key))?;
        statement.bind((2, fire_at.to_rfc3339().as_str()))?;
        statement.next()?;
        Ok(())
    }

    pub async fn load_pending_job(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT fire_at FROM pending_jobs WHERE key = ?")?;
        statement.bind((1, key))?;

        if let State::Row = statement.next()? {
            let raw = statement.read::<String, _>(0)?;
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
                Err(e) => {
                    // A corrupt row only loses the catch-up; the job is re-armed anyway
                    warn!("Ignoring unreadable pending job time for {key} ({raw}): {e}");
                    Ok(None)
                }
            }
        } else {
            Ok(None)
        }
    }

    pub async fn clear_pending_job(&self, key: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM pending_jobs WHERE key = ?")?;
        statement.bind((1, key))?;
        statement.next()?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Database::get_setting(self, key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        Database::set_setting(self, key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_settings_roundtrip_and_overwrite() {
        let db = Database::new(":memory:").await.unwrap();

        assert_eq!(db.get_setting("reminderHour").await.unwrap(), None);

        db.set_setting("reminderHour", "9").await.unwrap();
        db.set_setting("reminderHour", "21").await.unwrap();
        assert_eq!(
            db.get_setting("reminderHour").await.unwrap().as_deref(),
            Some("21")
        );

        db.remove_setting("reminderHour").await.unwrap();
        assert_eq!(db.get_setting("reminderHour").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pending_job_ledger() {
        let db = Database::new(":memory:").await.unwrap();
        let fire_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        assert_eq!(db.load_pending_job("job").await.unwrap(), None);

        db.save_pending_job("job", fire_at).await.unwrap();
        assert_eq!(db.load_pending_job("job").await.unwrap(), Some(fire_at));

        let later = fire_at + chrono::Duration::days(1);
        db.save_pending_job("job", later).await.unwrap();
        assert_eq!(db.load_pending_job("job").await.unwrap(), Some(later));

        db.clear_pending_job("job").await.unwrap();
        db.clear_pending_job("job").await.unwrap();
        assert_eq!(db.load_pending_job("job").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_settings_store_trait_object() {
        let db = Database::new(":memory:").await.unwrap();
        let store: &dyn SettingsStore = &db;
        store.set_setting("remindersEnabled", "true").await.unwrap();
        assert_eq!(
            store.get_setting("remindersEnabled").await.unwrap().as_deref(),
            Some("true")
        );
    }
}
