#![allow(missing_docs)]

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use jsonapi::{JsonApi, JsonApiModel};
use std::hint::black_box;

#[derive(JsonApiModel, Default, Clone, Debug)]
struct BenchComment {
    #[jsonapi(primary = "comments")]
    id: u64,
    #[jsonapi(attr = "body")]
    body: String,
}

#[derive(JsonApiModel, Default, Clone, Debug)]
struct BenchPost {
    #[jsonapi(primary = "posts")]
    id: u64,
    #[jsonapi(attr = "title")]
    title: String,
    #[jsonapi(attr = "tags")]
    tags: Vec<String>,
    #[jsonapi(relation = "comments")]
    comments: Vec<BenchComment>,
}

// Every post shares half of its comments with the previous one.
fn generate_posts(count: u64) -> Vec<BenchPost> {
    (0..count)
        .map(|i| BenchPost {
            id: i,
            title: format!("post {i}"),
            tags: vec!["rust".into(), "jsonapi".into()],
            comments: (i * 4..i * 4 + 8)
                .map(|c| BenchComment {
                    id: c,
                    body: format!("comment {c}"),
                })
                .collect(),
        })
        .collect()
}

// --- BENCHMARKS ---

fn bench_marshal(c: &mut Criterion) {
    let posts = generate_posts(1_000);

    let mut group = c.benchmark_group("Marshal");
    group.throughput(Throughput::Elements(posts.len() as u64));

    group.bench_function("side_loaded_many", |b| {
        b.iter(|| JsonApi::marshal_many(black_box(&posts)).expect("marshal failed"));
    });

    group.bench_function("embedded_one", |b| {
        b.iter(|| JsonApi::marshal_embedded(black_box(&posts[0])).expect("marshal failed"));
    });

    group.finish();
}

fn bench_unmarshal(c: &mut Criterion) {
    let posts = generate_posts(1_000);
    let bytes = JsonApi::marshal_many(&posts).expect("marshal failed");

    let mut group = c.benchmark_group("Unmarshal");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("side_loaded_many", |b| {
        b.iter(|| JsonApi::unmarshal_many::<BenchPost>(black_box(&bytes)).expect("unmarshal failed"));
    });

    group.finish();
}

criterion_group!(benches, bench_marshal, bench_unmarshal);
criterion_main!(benches);
