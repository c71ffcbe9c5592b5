use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const POST_PREFIX: &str = "post:";
pub const HASHTAG_PREFIX: &str = "hashtag:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    User,
    Post,
    Hashtag,
}

impl NodeKind {
    /// Classifies a raw node identifier by its reserved prefix.
    pub fn of(raw: &str) -> Self {
        if raw.starts_with(POST_PREFIX) {
            NodeKind::Post
        } else if raw.starts_with(HASHTAG_PREFIX) {
            NodeKind::Hashtag
        } else {
            NodeKind::User
        }
    }
}

/// Graph node identifier. The node type travels inside the string as a
/// reserved prefix; user ids carry no prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn user(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn post(id: impl AsRef<str>) -> Self {
        Self(format!("{}{}", POST_PREFIX, id.as_ref()))
    }

    pub fn hashtag(tag: impl AsRef<str>) -> Self {
        Self(format!("{}{}", HASHTAG_PREFIX, tag.as_ref()))
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::of(&self.0)
    }

    pub fn is_user(&self) -> bool {
        self.kind() == NodeKind::User
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entity id without its type prefix.
    pub fn local_id(&self) -> &str {
        match self.kind() {
            NodeKind::Post => &self.0[POST_PREFIX.len()..],
            NodeKind::Hashtag => &self.0[HASHTAG_PREFIX.len()..],
            NodeKind::User => &self.0,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One directed half of a logical relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
}

/// Rank mass held by a node on behalf of `origin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub origin: NodeId,
    pub weight: f64,
}

/// One row of the `post_rankings` table.
#[derive(
    Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq, Serialize, Deserialize,
)]
#[archive(check_bytes)]
pub struct FeedEntry {
    pub user_id: String,
    pub post_id: String,
    pub weight: f64,
}

impl FeedEntry {
    pub fn new(user_id: impl Into<String>, post_id: impl Into<String>, weight: f64) -> Self {
        Self {
            user_id: user_id.into(),
            post_id: post_id.into(),
            weight,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.user_id.clone(), self.post_id.clone())
    }
}

/// One row of the `recommendations` table.
#[derive(
    Archive, RkyvDeserialize, RkyvSerialize, Debug, Clone, PartialEq, Eq, Serialize, Deserialize,
)]
#[archive(check_bytes)]
pub struct Recommendation {
    pub person: String,
    pub recommendation: String,
    pub strength: u64,
}

impl Recommendation {
    pub fn new(person: impl Into<String>, recommendation: impl Into<String>, strength: u64) -> Self {
        Self {
            person: person.into(),
            recommendation: recommendation.into(),
            strength,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.person.clone(), self.recommendation.clone())
    }
}
