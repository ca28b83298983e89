//! Performance benchmarks for the query planner
//!
//! Run with: `cargo bench -p catalog-core`
//!
//! These benchmarks measure:
//! - Greedy filter demotion for oversized OR filters
//! - End-to-end listing with an in-memory post-filter

use catalog_core::config::CatalogConfig;
use catalog_core::db::{InMemoryStore, NodeStore};
use catalog_core::services::query_service::plan_filters;
use catalog_core::services::{Caller, QueryRequest, QueryService};
use catalog_core::{ContentNode, NodeKind};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn tags(count: usize) -> Vec<Value> {
    (0..count).map(|i| json!(format!("t{}", i))).collect()
}

fn oversized_request() -> QueryRequest {
    QueryRequest::new(NodeKind::Lesson)
        .filter_any("tags", tags(12))
        .filter_any("subjects", (0..4).map(|i| json!(format!("s{}", i))).collect())
        .filter_any("type", vec![json!("text"), json!("video")])
        .filter("promoted", json!(false))
}

/// Store with `count` listed lessons spread over tags and subjects
async fn seeded_store(count: usize) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..count {
        let node = ContentNode::with_id(
            format!("Lesson_{:04}", i),
            json!({
                "tags": [format!("t{}", i % 16)],
                "subjects": [format!("s{}", i % 5)],
                "type": if i % 3 == 0 { "video" } else { "text" },
            }),
        )
        .unwrap()
        .listed(true);
        store.put_node(node).await.unwrap();
    }
    store
}

/// Benchmark: demotion of a filter set three times over budget
fn bench_plan_filters(c: &mut Criterion) {
    let filters = oversized_request().filters;

    c.bench_function("plan_filters_oversized", |b| {
        b.iter(|| plan_filters(black_box(filters.clone()), 30))
    });
}

/// Benchmark: planned query plus post-filter over 1000 lessons
fn bench_budgeted_query(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = rt.block_on(seeded_store(1000));
    let service = QueryService::new(store, Arc::new(CatalogConfig::default()));
    let request = oversized_request().page_size(100);

    let mut group = c.benchmark_group("budgeted_query");
    group.sample_size(20);
    group.bench_function("1000_lessons", |b| {
        b.iter(|| {
            rt.block_on(async {
                let nodes = service
                    .query(black_box(&request), Caller::Public)
                    .await
                    .unwrap();
                black_box(nodes)
            })
        })
    });
    group.finish();
}

criterion_group!(benches, bench_plan_filters, bench_budgeted_query);
criterion_main!(benches);
