//! # Feature: Answer Likes & Comments
//!
//! Read-modify-write updates on answer records. Updates to the same answer
//! from this process are serialised; concurrent writers on other devices are
//! the record store's concern.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use crate::remote::{RecordStore, ANSWERS_COLLECTION};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LIKES_FIELD: &str = "likes";
pub const COMMENTS_FIELD: &str = "comments";

/// Longest comment accepted, in characters
pub const MAX_COMMENT_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    /// Whether the acting user now likes the answer
    pub liked: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

pub struct AnswerEngagement {
    store: Arc<dyn RecordStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AnswerEngagement {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Run `work` while holding the lock for `answer_id`.
    ///
    /// The lock entry is dropped once no other task holds or waits on it.
    async fn serialized<T>(
        &self,
        answer_id: &str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let lock = self
            .locks
            .entry(answer_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        self.locks
            .remove_if(answer_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn load_answer(&self, answer_id: &str) -> Result<Map<String, Value>> {
        match self.store.get(ANSWERS_COLLECTION, answer_id).await? {
            Some(Value::Object(fields)) => Ok(fields),
            Some(_) => Err(anyhow!("Answer {answer_id} is not a document")),
            None => Err(anyhow!("Answer {answer_id} not found")),
        }
    }

    /// Like the answer, or remove the like if `user_id` already liked it
    pub async fn toggle_like(&self, answer_id: &str, user_id: &str) -> Result<LikeState> {
        self.serialized(answer_id, self.apply_toggle_like(answer_id, user_id))
            .await
    }

    async fn apply_toggle_like(&self, answer_id: &str, user_id: &str) -> Result<LikeState> {
        let mut answer = self.load_answer(answer_id).await?;
        let mut likes = string_list(answer.get(LIKES_FIELD));

        let liked = match likes.iter().position(|id| id == user_id) {
            Some(index) => {
                likes.remove(index);
                false
            }
            None => {
                likes.push(user_id.to_string());
                true
            }
        };
        let count = likes.len();

        answer.insert(
            LIKES_FIELD.to_string(),
            Value::Array(likes.into_iter().map(Value::String).collect()),
        );
        self.store
            .put(ANSWERS_COLLECTION, answer_id, Value::Object(answer))
            .await?;

        debug!(
            "{user_id} {} answer {answer_id} ({count} likes)",
            if liked { "liked" } else { "unliked" }
        );
        Ok(LikeState { liked, count })
    }

    /// Current like state of the answer for `user_id`
    pub async fn like_state(&self, answer_id: &str, user_id: &str) -> Result<LikeState> {
        let answer = self.load_answer(answer_id).await?;
        let likes = string_list(answer.get(LIKES_FIELD));
        Ok(LikeState {
            liked: likes.iter().any(|id| id == user_id),
            count: likes.len(),
        })
    }

    /// Append a comment to the answer
    pub async fn add_comment(&self, answer_id: &str, user_id: &str, text: &str) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("Comment cannot be empty"));
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(anyhow!(
                "Comment too long (max {MAX_COMMENT_LEN} characters)"
            ));
        }

        self.serialized(answer_id, self.append_comment(answer_id, user_id, text))
            .await
    }

    async fn append_comment(&self, answer_id: &str, user_id: &str, text: &str) -> Result<Comment> {
        let mut answer = self.load_answer(answer_id).await?;
        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        let mut comments = match answer.remove(COMMENTS_FIELD) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                warn!("Answer {answer_id} has a malformed comments field, resetting it");
                Vec::new()
            }
            None => Vec::new(),
        };
        comments.push(serde_json::to_value(&comment)?);
        answer.insert(COMMENTS_FIELD.to_string(), Value::Array(comments));

        self.store
            .put(ANSWERS_COLLECTION, answer_id, Value::Object(answer))
            .await?;

        info!("💬 {user_id} commented on answer {answer_id}");
        Ok(comment)
    }

    /// Comments on the answer in posting order, skipping unreadable entries
    pub async fn comments(&self, answer_id: &str) -> Result<Vec<Comment>> {
        let answer = self.load_answer(answer_id).await?;
        let comments = answer
            .get(COMMENTS_FIELD)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<Comment>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(comments)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRecordStore;
    use serde_json::json;

    async fn engagement_with_answer(document: Value) -> (AnswerEngagement, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        store
            .put(ANSWERS_COLLECTION, "a1", document)
            .await
            .unwrap();
        (AnswerEngagement::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_toggle_like_adds_then_removes() {
        let (engagement, store) =
            engagement_with_answer(json!({ "text": "Pancakes", "likes": ["u2"] })).await;

        let state = engagement.toggle_like("a1", "u1").await.unwrap();
        assert_eq!(state, LikeState { liked: true, count: 2 });

        let state = engagement.toggle_like("a1", "u1").await.unwrap();
        assert_eq!(state, LikeState { liked: false, count: 1 });

        let doc = store.get(ANSWERS_COLLECTION, "a1").await.unwrap().unwrap();
        assert_eq!(doc["likes"], json!(["u2"]));
        assert_eq!(doc["text"], "Pancakes");
    }

    #[tokio::test]
    async fn test_toggle_like_on_missing_answer_fails() {
        let (engagement, _) = engagement_with_answer(json!({})).await;
        assert!(engagement.toggle_like("missing", "u1").await.is_err());
        assert!(engagement.locks.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_likes_are_not_lost() {
        let (engagement, _) = engagement_with_answer(json!({ "likes": [] })).await;
        let engagement = Arc::new(engagement);

        let mut handles = Vec::new();
        for i in 0..20 {
            let engagement = engagement.clone();
            handles.push(tokio::spawn(async move {
                engagement
                    .toggle_like("a1", &format!("user{i}"))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let state = engagement.like_state("a1", "user3").await.unwrap();
        assert!(state.liked);
        assert_eq!(state.count, 20);
        assert!(engagement.locks.is_empty());
    }

    #[tokio::test]
    async fn test_add_comment_appends_and_validates() {
        let (engagement, _) = engagement_with_answer(json!({ "text": "Tea" })).await;

        assert!(engagement.add_comment("a1", "u1", "   ").await.is_err());
        let too_long = "x".repeat(MAX_COMMENT_LEN + 1);
        assert!(engagement.add_comment("a1", "u1", &too_long).await.is_err());

        let first = engagement.add_comment("a1", "u1", " Same here! ").await.unwrap();
        let second = engagement.add_comment("a1", "u2", "Coffee > tea").await.unwrap();
        assert_eq!(first.text, "Same here!");

        let comments = engagement.comments("a1").await.unwrap();
        assert_eq!(comments, vec![first, second]);
        assert!(engagement.locks.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_comment_entries_are_skipped() {
        let (engagement, _) =
            engagement_with_answer(json!({ "comments": [{ "bogus": true }, 3] })).await;

        assert!(engagement.comments("a1").await.unwrap().is_empty());
        engagement.add_comment("a1", "u1", "hello").await.unwrap();
        assert_eq!(engagement.comments("a1").await.unwrap().len(), 1);
    }
}
