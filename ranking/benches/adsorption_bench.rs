use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graph::{EdgeWeighter, GraphBuilder, GraphIndex};
use ranking::{AdsorptionEngine, FollowGraph, FriendRecommender};
use socialrank_core::config::RankingConfig;
use socialrank_core::relations::{FriendRow, HashtagInterestRow, LikeRow, PostHashtagRow, RelationSnapshot};

const USERS: usize = 500;
const POSTS: usize = 2_000;
const TAGS: usize = 50;

/// Deterministic synthetic network; ids are spread with small multiplicative hashes.
fn synthetic_snapshot() -> RelationSnapshot {
    let mut snapshot = RelationSnapshot::default();
    for u in 0..USERS {
        for k in 1..=8 {
            let followed = (u * 31 + k * 17) % USERS;
            if followed != u {
                snapshot.friends.push(FriendRow::new(u.to_string(), followed.to_string()));
            }
        }
        for k in 0..6 {
            let post = (u * 13 + k * 101) % POSTS;
            snapshot.likes.push(LikeRow::new(u.to_string(), post.to_string()));
        }
        let tags = format!("t{},t{}", u % TAGS, (u * 7) % TAGS);
        snapshot.hashtags.push(HashtagInterestRow::new(u.to_string(), tags));
    }
    for p in 0..POSTS {
        snapshot
            .posts
            .push(PostHashtagRow::new(p.to_string(), format!("t{}", p % TAGS)));
    }
    snapshot
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let snapshot = synthetic_snapshot();
    let (edges, _) = GraphBuilder::from_snapshot(&snapshot);
    let weighted = EdgeWeighter::default().weigh(&edges).unwrap();
    let index = GraphIndex::build(&weighted);

    c.bench_function("graph build + weigh", |b| {
        b.iter(|| {
            let (edges, _) = GraphBuilder::from_snapshot(black_box(&snapshot));
            EdgeWeighter::default().weigh(&edges).unwrap()
        })
    });

    let engine = AdsorptionEngine::new(RankingConfig::new(0.0, 5));
    c.bench_function("adsorption 5 generations", |b| {
        b.iter(|| engine.run(black_box(&index)).unwrap())
    });

    let (follows, _) = FollowGraph::from_rows(&snapshot.friends);
    c.bench_function("friend recommendations", |b| {
        b.iter(|| FriendRecommender::default().recommend(black_box(&follows)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
