//! Input relation rows consumed by the graph builder.
//!
//! Fields are optional so that a row with a missing id survives
//! deserialization and can be skipped and counted downstream.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::error::{ErrorCode, SocialRankError};

#[derive(Error, Debug)]
pub enum RelationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid relation document: {0}")]
    Json(#[from] serde_json::Error),
}

impl SocialRankError for RelationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            RelationError::Io(_) => ErrorCode::NotFound,
            RelationError::Json(_) => ErrorCode::InvalidArgument,
        }
    }
}

/// `friends(follower, followed)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRow {
    #[serde(default, deserialize_with = "opt_id")]
    pub follower: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub followed: Option<String>,
}

impl FriendRow {
    pub fn new(follower: impl Into<String>, followed: impl Into<String>) -> Self {
        Self {
            follower: Some(follower.into()),
            followed: Some(followed.into()),
        }
    }
}

/// `likes(user_id, post_id)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRow {
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id")]
    pub post_id: Option<String>,
}

impl LikeRow {
    pub fn new(user_id: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            post_id: Some(post_id.into()),
        }
    }
}

/// `hashtags(user_id, hashtag)` where `hashtag` is a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagInterestRow {
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub hashtag: Option<String>,
}

impl HashtagInterestRow {
    pub fn new(user_id: impl Into<String>, hashtag: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            hashtag: Some(hashtag.into()),
        }
    }
}

/// `posts(post_id, hashtags)` where `hashtags` is a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHashtagRow {
    #[serde(default, deserialize_with = "opt_id")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub hashtags: Option<String>,
}

impl PostHashtagRow {
    pub fn new(post_id: impl Into<String>, hashtags: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            hashtags: Some(hashtags.into()),
        }
    }
}

/// The four relations read for a single ranking run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    #[serde(default)]
    pub friends: Vec<FriendRow>,
    #[serde(default)]
    pub likes: Vec<LikeRow>,
    #[serde(default)]
    pub hashtags: Vec<HashtagInterestRow>,
    #[serde(default)]
    pub posts: Vec<PostHashtagRow>,
}

impl RelationSnapshot {
    pub fn from_json(json: &str) -> Result<Self, RelationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RelationError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn row_count(&self) -> usize {
        self.friends.len() + self.likes.len() + self.hashtags.len() + self.posts.len()
    }
}

/// Splits a comma-separated tag list, trimming each tag and dropping blanks.
pub fn split_tags(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Relational ids arrive either as strings or as integer keys.
fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    }))
}
