//! # Core Module
//!
//! Configuration shared by the library and the reminder daemon.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod config;

pub use config::Config;
