//! # Engagement Feature
//!
//! Likes and comments on answers.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod answers;

pub use answers::{AnswerEngagement, Comment, LikeState, MAX_COMMENT_LEN};
