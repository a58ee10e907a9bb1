//! # Feature: Streak & Achievements
//!
//! Reads the streak counter and achievement flags from the user's record.
//! The record is maintained elsewhere; nothing here writes to it.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use crate::remote::{RecordStore, USERS_COLLECTION};
use anyhow::Result;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const STREAK_FIELD: &str = "streak";
pub const ACHIEVEMENTS_FIELD: &str = "achievements";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStatus {
    /// Consecutive days with an answer
    pub streak: u32,
    /// Achievement key -> unlocked
    pub achievements: BTreeMap<String, bool>,
}

impl UserStatus {
    /// Build from a raw user document, defaulting anything missing or malformed
    pub fn from_document(document: &Value) -> Self {
        let streak = document
            .get(STREAK_FIELD)
            .map(parse_streak)
            .unwrap_or_default();

        let achievements = document
            .get(ACHIEVEMENTS_FIELD)
            .and_then(Value::as_object)
            .map(|flags| {
                flags
                    .iter()
                    .filter_map(|(key, value)| value.as_bool().map(|on| (key.clone(), on)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            streak,
            achievements,
        }
    }

    /// Keys of unlocked achievements, sorted
    pub fn unlocked(&self) -> Vec<&str> {
        self.achievements
            .iter()
            .filter(|(_, unlocked)| **unlocked)
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

fn parse_streak(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                // Some clients write whole numbers as floats
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

/// Load the streak and achievements for `user_id`.
///
/// A missing document yields the zero status; only a failed read is an error.
pub async fn load_status(store: &dyn RecordStore, user_id: &str) -> Result<UserStatus> {
    let status = match store.get(USERS_COLLECTION, user_id).await? {
        Some(document) => UserStatus::from_document(&document),
        None => {
            debug!("No user record for {user_id}, reporting empty status");
            UserStatus::default()
        }
    };
    Ok(status)
}
