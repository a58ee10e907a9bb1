//! # Status Feature
//!
//! Read-only view of a user's answer streak and unlocked achievements.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod streak;

pub use streak::{load_status, UserStatus};
