//! # Remote Record Store
//!
//! Document storage keyed by `(collection, id)`. The hosted store is an external
//! collaborator; this module only defines the seam and two backends.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release with HTTP and in-memory backends

pub mod http;
pub mod memory;

pub use http::HttpRecordStore;
pub use memory::MemoryRecordStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Collection holding one document per user
pub const USERS_COLLECTION: &str = "users";

/// Collection holding one document per answer
pub const ANSWERS_COLLECTION: &str = "answers";

/// Field on the user document set once today's question has been answered
pub const ANSWERED_TODAY_FIELD: &str = "answeredToday";

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a document, `None` when it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Create or overwrite a document
    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()>;
}

/// Whether the user has answered today's question.
///
/// A missing document or field reads as `false`.
pub async fn answered_today(store: &dyn RecordStore, user_id: &str) -> Result<bool> {
    let answered = store
        .get(USERS_COLLECTION, user_id)
        .await?
        .and_then(|doc| doc.get(ANSWERED_TODAY_FIELD).and_then(Value::as_bool))
        .unwrap_or(false);
    Ok(answered)
}
