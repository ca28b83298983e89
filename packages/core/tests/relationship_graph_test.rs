//! Integration tests for the content graph
//!
//! Tests cover:
//! - The course/topic association scenario end to end through `Catalog`
//! - The bidirectional invariant after mixed edit sequences
//! - Idempotent disassociation
//! - Conflict retries, retry exhaustion and store outages

use anyhow::Result;
use async_trait::async_trait;
use catalog_core::{
    db::{
        CommitRequest, InMemorySearchIndex, InMemoryStore, NodeStore, StoreError, StoreQuery,
        StoreResult,
    },
    models::{schema::RELATIONS, Checkpoint, ContentNode, NodeKind},
    services::{Catalog, CatalogError, CreateNodeParams, Direction},
    CatalogConfig,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Test helper: Create a catalog over fresh in-memory adapters
fn create_test_catalog(config: CatalogConfig) -> Result<(Arc<InMemoryStore>, Catalog)> {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    let catalog = Catalog::new(store.clone(), Arc::new(InMemorySearchIndex::new()), config)?;
    Ok((store, catalog))
}

async fn create(catalog: &Catalog, kind: NodeKind, identifier: &str) -> Result<ContentNode> {
    let node = catalog
        .nodes()
        .create_node(CreateNodeParams {
            identifier: Some(identifier.to_string()),
            listed: true,
            ..CreateNodeParams::new(kind, json!({"name": identifier}))
        })
        .await?;
    Ok(node)
}

/// Check both directions of every declared relation across all stored nodes
async fn assert_graph_consistent(store: &InMemoryStore) -> Result<()> {
    for relation in RELATIONS {
        let parents = store
            .query_nodes(&StoreQuery::new(relation.parent_kind))
            .await?;
        let children = store
            .query_nodes(&StoreQuery::new(relation.child_kind))
            .await?;

        for parent in &parents {
            for child in &children {
                let forward = parent.id_list(relation.child_list).contains(&child.id);
                let backward = child.id_list(relation.parent_list).contains(&parent.id);
                assert_eq!(
                    forward, backward,
                    "edge {} -> {} is one-sided ({} / {})",
                    parent.id, child.id, relation.child_list, relation.parent_list
                );
            }
        }
    }
    Ok(())
}

// =========================================================================
// Scenario
// =========================================================================

#[tokio::test]
async fn test_course_topic_scenario() -> Result<()> {
    let (store, catalog) = create_test_catalog(CatalogConfig::default())?;
    let relationships = catalog.relationships();

    create(&catalog, NodeKind::Course, "A").await?;
    create(&catalog, NodeKind::Topic, "T").await?;
    create(&catalog, NodeKind::Topic, "T2").await?;

    let (course, topic) = relationships.associate("Course_A", "Topic_T", Some(0)).await?;
    assert_eq!(course.id_list("topics"), vec!["Topic_T"]);
    assert_eq!(topic.id_list("courses"), vec!["Course_A"]);

    let (course, _) = relationships.associate("Course_A", "Topic_T2", Some(0)).await?;
    assert_eq!(course.id_list("topics"), vec!["Topic_T2", "Topic_T"]);

    let (course, topic) = relationships.disassociate("Course_A", "Topic_T").await?;
    assert_eq!(course.id_list("topics"), vec!["Topic_T2"]);
    assert!(topic.id_list("courses").is_empty());

    // What the operations returned is what the store holds
    let stored = store.get_node("Course_A").await?.expect("course exists");
    assert_eq!(stored.id_list("topics"), vec!["Topic_T2"]);
    assert_graph_consistent(&store).await
}

#[tokio::test]
async fn test_position_is_clamped_to_append() -> Result<()> {
    let (_store, catalog) = create_test_catalog(CatalogConfig::default())?;
    create(&catalog, NodeKind::Topic, "T").await?;
    for name in ["L1", "L2", "L3"] {
        create(&catalog, NodeKind::Lesson, name).await?;
    }

    let relationships = catalog.relationships();
    relationships.associate("Topic_T", "Lesson_L1", None).await?;
    relationships.associate("Topic_T", "Lesson_L2", Some(1)).await?;
    let (topic, _) = relationships.associate("Topic_T", "Lesson_L3", Some(7)).await?;

    assert_eq!(
        topic.id_list("lessons"),
        vec!["Lesson_L1", "Lesson_L2", "Lesson_L3"]
    );
    Ok(())
}

#[tokio::test]
async fn test_children_follow_reorder() -> Result<()> {
    let (_store, catalog) = create_test_catalog(CatalogConfig::default())?;
    create(&catalog, NodeKind::Topic, "T").await?;
    for name in ["L1", "L2", "L3"] {
        create(&catalog, NodeKind::Lesson, name).await?;
        catalog
            .relationships()
            .associate("Topic_T", &format!("Lesson_{}", name), None)
            .await?;
    }

    catalog
        .relationships()
        .reorder("Topic_T", "Lesson_L3", Direction::Up)
        .await?;
    // Not a child of this topic: written back unchanged
    create(&catalog, NodeKind::Lesson, "stray").await?;
    catalog
        .relationships()
        .reorder("Topic_T", "Lesson_stray", Direction::Down)
        .await?;

    let children = catalog
        .relationships()
        .children("Topic_T", NodeKind::Lesson)
        .await?;
    let ids: Vec<&str> = children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["Lesson_L1", "Lesson_L3", "Lesson_L2"]);
    Ok(())
}

// =========================================================================
// Invariant and idempotence
// =========================================================================

#[tokio::test]
async fn test_invariant_holds_after_mixed_edits() -> Result<()> {
    let (store, catalog) = create_test_catalog(CatalogConfig::default())?;
    let relationships = catalog.relationships();

    for name in ["A", "B"] {
        create(&catalog, NodeKind::Course, name).await?;
    }
    for name in ["T1", "T2", "T3"] {
        create(&catalog, NodeKind::Topic, name).await?;
    }
    for name in ["L1", "L2"] {
        create(&catalog, NodeKind::Lesson, name).await?;
    }

    relationships.associate("Course_A", "Topic_T1", None).await?;
    relationships.associate("Course_A", "Topic_T2", Some(0)).await?;
    relationships.associate("Course_B", "Topic_T2", None).await?;
    relationships.associate("Topic_T2", "Lesson_L1", None).await?;
    relationships.associate("Course_A", "Lesson_L1", None).await?;
    relationships.disassociate("Course_A", "Topic_T1").await?;
    relationships.associate("Topic_T3", "Lesson_L2", None).await?;
    relationships.disassociate("Topic_T2", "Lesson_L2").await?;
    relationships.reorder("Course_A", "Topic_T2", Direction::Down).await?;

    assert_graph_consistent(&store).await?;

    let parents = relationships.parents("Topic_T2", NodeKind::Course).await?;
    assert_eq!(parents.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_disassociate_twice_is_idempotent() -> Result<()> {
    let (store, catalog) = create_test_catalog(CatalogConfig::default())?;
    create(&catalog, NodeKind::Course, "A").await?;
    create(&catalog, NodeKind::Topic, "T").await?;
    create(&catalog, NodeKind::Topic, "U").await?;
    catalog.relationships().associate("Course_A", "Topic_T", None).await?;
    catalog.relationships().associate("Course_A", "Topic_U", None).await?;

    let (once_parent, once_child) = catalog
        .relationships()
        .disassociate("Course_A", "Topic_T")
        .await?;
    let (twice_parent, twice_child) = catalog
        .relationships()
        .disassociate("Course_A", "Topic_T")
        .await?;

    assert_eq!(once_parent.properties, twice_parent.properties);
    assert_eq!(once_child.properties, twice_child.properties);
    assert_eq!(twice_parent.id_list("topics"), vec!["Topic_U"]);
    assert_graph_consistent(&store).await
}

#[tokio::test]
async fn test_client_errors_are_distinct() -> Result<()> {
    let (_store, catalog) = create_test_catalog(CatalogConfig::default())?;
    create(&catalog, NodeKind::Course, "A").await?;
    create(&catalog, NodeKind::Lesson, "L").await?;

    let err = catalog
        .relationships()
        .associate("Lesson_L", "Course_A", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedRelationship { .. }));
    assert!(err.is_client_error());

    let err = catalog
        .relationships()
        .associate("Course_missing", "Lesson_L", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NodeNotFound { .. }));
    Ok(())
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_associations_all_land() -> Result<()> {
    let config = CatalogConfig {
        transaction_attempts: 20,
        ..CatalogConfig::default()
    };
    let (store, catalog) = create_test_catalog(config)?;
    create(&catalog, NodeKind::Course, "A").await?;
    for i in 0..10 {
        create(&catalog, NodeKind::Topic, &format!("T{}", i)).await?;
    }

    let relationships = catalog.relationships().clone();
    let mut handles = Vec::new();
    for i in 0..10 {
        let relationships = relationships.clone();
        handles.push(tokio::spawn(async move {
            relationships
                .associate("Course_A", &format!("Topic_T{}", i), None)
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let course = store.get_node("Course_A").await?.expect("course exists");
    assert_eq!(course.id_list("topics").len(), 10);
    assert_graph_consistent(&store).await
}

/// Store whose commits always lose the race
struct AlwaysConflictingStore {
    inner: InMemoryStore,
    commits: AtomicUsize,
}

#[async_trait]
impl NodeStore for AlwaysConflictingStore {
    async fn get_node(&self, id: &str) -> StoreResult<Option<ContentNode>> {
        self.inner.get_node(id).await
    }

    async fn query_nodes(&self, query: &StoreQuery) -> StoreResult<Vec<ContentNode>> {
        self.inner.query_nodes(query).await
    }

    async fn commit(&self, request: CommitRequest) -> StoreResult<Vec<ContentNode>> {
        if request.expected.is_empty() {
            // Seeding writes go through
            return self.inner.commit(request).await;
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::conflict(request.expected.into_iter().map(|(id, _)| id)))
    }

    async fn delete_node(&self, id: &str) -> StoreResult<bool> {
        self.inner.delete_node(id).await
    }

    async fn load_checkpoint(&self, name: &str) -> StoreResult<Option<Checkpoint>> {
        self.inner.load_checkpoint(name).await
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> StoreResult<Checkpoint> {
        self.inner.save_checkpoint(checkpoint).await
    }
}

#[tokio::test]
async fn test_exhausted_retries_surface_concurrent_modification() -> Result<()> {
    init_tracing();
    let store = Arc::new(AlwaysConflictingStore {
        inner: InMemoryStore::new(),
        commits: AtomicUsize::new(0),
    });
    store
        .put_node(ContentNode::with_id("Course_A", json!({}))?)
        .await?;
    store
        .put_node(ContentNode::with_id("Topic_T", json!({}))?)
        .await?;

    let catalog = Catalog::new(
        store.clone(),
        Arc::new(InMemorySearchIndex::new()),
        CatalogConfig::default(),
    )?;
    let err = catalog
        .relationships()
        .associate("Course_A", "Topic_T", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::ConcurrentModification { attempts: 3, .. }
    ));
    assert!(err.is_retryable());
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);

    // Nothing was half-applied
    let course = store.get_node("Course_A").await?.expect("course exists");
    assert!(course.id_list("topics").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_store_outage_propagates() -> Result<()> {
    let (store, catalog) = create_test_catalog(CatalogConfig::default())?;
    create(&catalog, NodeKind::Course, "A").await?;
    create(&catalog, NodeKind::Topic, "T").await?;

    store.set_available(false);
    let err = catalog
        .relationships()
        .associate("Course_A", "Topic_T", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert!(!err.is_client_error());
    Ok(())
}
