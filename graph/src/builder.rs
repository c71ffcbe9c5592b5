//! Turns the four input relations into a bidirectional edge multiset.

use socialrank_core::model::{Edge, NodeId, NodeKind};
use socialrank_core::relations::{
    split_tags, FriendRow, HashtagInterestRow, LikeRow, PostHashtagRow, RelationSnapshot,
};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Friends,
    Likes,
    Hashtags,
    Posts,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Friends => "friends",
            Relation::Likes => "likes",
            Relation::Hashtags => "hashtags",
            Relation::Posts => "posts",
        };
        f.write_str(s)
    }
}

/// A row that could not be turned into edges. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("{relation} row is missing `{field}`")]
    MissingField {
        relation: Relation,
        field: &'static str,
    },
    #[error("{relation} row has an empty tag list")]
    EmptyTagList { relation: Relation },
    #[error("{relation} row id `{id}` uses a reserved node prefix")]
    ReservedPrefix { relation: Relation, id: String },
}

impl MalformedRecord {
    pub fn relation(&self) -> Relation {
        match self {
            MalformedRecord::MissingField { relation, .. }
            | MalformedRecord::EmptyTagList { relation }
            | MalformedRecord::ReservedPrefix { relation, .. } => *relation,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationCounts {
    pub rows: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub relations: BTreeMap<Relation, RelationCounts>,
}

impl BuildReport {
    pub fn rows(&self) -> u64 {
        self.relations.values().map(|c| c.rows).sum()
    }

    pub fn malformed(&self) -> u64 {
        self.relations.values().map(|c| c.malformed).sum()
    }

    pub fn malformed_in(&self, relation: Relation) -> u64 {
        self.relations
            .get(&relation)
            .map(|c| c.malformed)
            .unwrap_or(0)
    }
}

/// Directed edges; every logical relationship appears once per direction.
/// Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    edges: Vec<Edge>,
}

impl EdgeSet {
    pub fn from_edges(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Outgoing destinations per source, in a deterministic source order.
    pub fn grouped_by_source(&self) -> BTreeMap<&NodeId, Vec<&NodeId>> {
        let mut grouped: BTreeMap<&NodeId, Vec<&NodeId>> = BTreeMap::new();
        for edge in &self.edges {
            grouped.entry(&edge.source).or_default().push(&edge.target);
        }
        grouped
    }
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    edges: Vec<Edge>,
    report: BuildReport,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the edge set for a full snapshot in one call.
    pub fn from_snapshot(snapshot: &RelationSnapshot) -> (EdgeSet, BuildReport) {
        let mut builder = Self::new();
        builder.add_snapshot(snapshot);
        builder.finish()
    }

    pub fn add_snapshot(&mut self, snapshot: &RelationSnapshot) {
        for row in &snapshot.friends {
            let result = self.add_friend(row);
            self.record(Relation::Friends, result);
        }
        for row in &snapshot.likes {
            let result = self.add_like(row);
            self.record(Relation::Likes, result);
        }
        for row in &snapshot.hashtags {
            let result = self.add_hashtag_interest(row);
            self.record(Relation::Hashtags, result);
        }
        for row in &snapshot.posts {
            let result = self.add_post_hashtags(row);
            self.record(Relation::Posts, result);
        }
    }

    fn record(&mut self, relation: Relation, result: Result<(), MalformedRecord>) {
        let counts = self.report.relations.entry(relation).or_default();
        counts.rows += 1;
        if let Err(record) = result {
            counts.malformed += 1;
            warn!("Skipping malformed row: {}", record);
        }
    }

    /// `(follower, followed)` becomes `followed -> follower` and `follower -> followed`.
    pub fn add_friend(&mut self, row: &FriendRow) -> Result<(), MalformedRecord> {
        let follower = user_id(Relation::Friends, "follower", row.follower.as_deref())?;
        let followed = user_id(Relation::Friends, "followed", row.followed.as_deref())?;
        self.push_pair(followed, follower);
        Ok(())
    }

    pub fn add_like(&mut self, row: &LikeRow) -> Result<(), MalformedRecord> {
        let user = user_id(Relation::Likes, "user_id", row.user_id.as_deref())?;
        let post = required(Relation::Likes, "post_id", row.post_id.as_deref())?;
        self.push_pair(user, NodeId::post(post));
        Ok(())
    }

    pub fn add_hashtag_interest(&mut self, row: &HashtagInterestRow) -> Result<(), MalformedRecord> {
        let user = user_id(Relation::Hashtags, "user_id", row.user_id.as_deref())?;
        let tags = tag_list(Relation::Hashtags, "hashtag", row.hashtag.as_deref())?;
        for tag in tags {
            self.push_pair(user.clone(), NodeId::hashtag(tag));
        }
        Ok(())
    }

    pub fn add_post_hashtags(&mut self, row: &PostHashtagRow) -> Result<(), MalformedRecord> {
        let post = NodeId::post(required(Relation::Posts, "post_id", row.post_id.as_deref())?);
        let tags = tag_list(Relation::Posts, "hashtags", row.hashtags.as_deref())?;
        for tag in tags {
            self.push_pair(post.clone(), NodeId::hashtag(tag));
        }
        Ok(())
    }

    fn push_pair(&mut self, a: NodeId, b: NodeId) {
        self.edges.push(Edge::new(a.clone(), b.clone()));
        self.edges.push(Edge::new(b, a));
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn finish(self) -> (EdgeSet, BuildReport) {
        info!(
            "Built graph: {} edges from {} rows ({} malformed)",
            self.edges.len(),
            self.report.rows(),
            self.report.malformed()
        );
        (EdgeSet::from_edges(self.edges), self.report)
    }
}

fn required<'a>(
    relation: Relation,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, MalformedRecord> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MalformedRecord::MissingField { relation, field }),
    }
}

fn user_id(
    relation: Relation,
    field: &'static str,
    value: Option<&str>,
) -> Result<NodeId, MalformedRecord> {
    let id = required(relation, field, value)?;
    if NodeKind::of(id) != NodeKind::User {
        return Err(MalformedRecord::ReservedPrefix {
            relation,
            id: id.to_string(),
        });
    }
    Ok(NodeId::user(id))
}

fn tag_list<'a>(
    relation: Relation,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<Vec<&'a str>, MalformedRecord> {
    let list = value.ok_or(MalformedRecord::MissingField { relation, field })?;
    let tags = split_tags(list);
    if tags.is_empty() {
        return Err(MalformedRecord::EmptyTagList { relation });
    }
    Ok(tags)
}
