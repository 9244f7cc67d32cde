//! End-to-end scenarios across classification, encryption, scoring and the
//! temporal knowledge graph, exercised through the public API only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use memoryx::classifier::{keyword_fallback, Classification, Classifier};
use memoryx::config::Config;
use memoryx::crypto::InMemoryDekRegistry;
use memoryx::embedding::Embedder;
use memoryx::error::Result;
use memoryx::temporal::PeriodEnd;
use memoryx::types::{AddMemoryInput, SearchFilters, Sector, UpdateMemoryInput};
use memoryx::vector_store::InMemoryVectorStore;
use memoryx::MemoryService;

use chrono::{TimeZone, Utc};

/// Classifier that always fails, forcing the keyword fallback (§4.3 scenario).
struct AlwaysDegradedClassifier;

#[async_trait]
impl Classifier for AlwaysDegradedClassifier {
    async fn classify(&self, title: Option<&str>, content: &str) -> Classification {
        keyword_fallback(title, content)
    }
}

/// Deterministic embedder so similarity comparisons in tests are stable.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let has_rust = lower.contains("rust") as i32 as f32;
        let has_vue = lower.contains("vue") as i32 as f32;
        Ok(vec![has_rust, has_vue, 1.0])
    }

    fn dims(&self) -> usize {
        3
    }
}

async fn build_service(config: Config) -> MemoryService {
    MemoryService::new(
        config,
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(AlwaysDegradedClassifier),
        Arc::new(HashEmbedder),
        Arc::new(InMemoryDekRegistry::new()),
    )
    .await
    .unwrap()
}

fn input(content: &str) -> AddMemoryInput {
    AddMemoryInput {
        content: content.to_string(),
        title: None,
        project_id: None,
        namespace: None,
        memory_types: None,
        user_preference: false,
        valid_from: None,
        valid_until: None,
        extra_metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn encrypted_write_then_read_recovers_plaintext() {
    let mut config = Config::default();
    config.master_key = Some("integration-test-master-key".to_string());
    let service = build_service(config).await;

    let added = service.add(input("the deployment runbook uses rustup"), "alice").await.unwrap();
    assert!(added.is_encrypted);

    let fetched = service.get_by_id(&added.id, "alice").await.unwrap().unwrap();
    assert_eq!(fetched.content, "the deployment runbook uses rustup");
    assert!(fetched.is_encrypted);
}

#[tokio::test]
async fn llm_outage_falls_back_to_keyword_classification() {
    let service = build_service(Config::default()).await;

    let added = service.add(input("Step 1: install rustup, step 2: run cargo build"), "bob").await.unwrap();

    assert_eq!(added.sectors.primary, Sector::Procedural);
}

#[tokio::test]
async fn sector_mismatch_applies_scoring_penalty() {
    let service = build_service(Config::default()).await;

    // The keyword fallback classifies this as semantic; querying for a
    // different sector should trigger the mismatch penalty, not a boost.
    service.add(input("we use rust and vue together"), "carol").await.unwrap();

    let filters = SearchFilters {
        sectors: vec![Sector::Procedural],
        ..Default::default()
    };
    let response = service.search("rust vue", "carol", filters, 5, true).await.unwrap();

    assert_eq!(response.total_found, 1);
    let explanation = response.results[0].explanation.as_ref().unwrap();
    assert!(explanation.sector_boost < 1.0);
}

#[tokio::test]
async fn cross_user_memories_are_isolated_in_search() {
    let service = build_service(Config::default()).await;
    service.add(input("alice's private note"), "alice").await.unwrap();
    service.add(input("dave's private note"), "dave").await.unwrap();

    let response = service
        .search("private note", "alice", SearchFilters::default(), 10, false)
        .await
        .unwrap();

    assert_eq!(response.total_found, 1);
    assert_eq!(response.results[0].content, "alice's private note");
}

#[tokio::test]
async fn supersession_marks_old_memory_non_current_and_links_both_ways() {
    let service = build_service(Config::default()).await;

    let first = service
        .add_with_temporal(input("we use vue 2"), "erin", "tech_stack", None)
        .await
        .unwrap();

    let second = service
        .add_with_temporal(input("we use vue 3 now"), "erin", "tech_stack", Some(&first.id))
        .await
        .unwrap();

    let timeline = service.get_timeline("tech_stack", "erin", None).await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert!(!timeline[0].is_current);
    assert!(timeline[1].is_current);
    assert_eq!(timeline[1].memory_id, second.id);
}

#[tokio::test]
async fn backdated_supersession_resolves_gap_from_successors_valid_from() {
    let service = build_service(Config::default()).await;

    let vue2_start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let vue3_start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let mut vue2 = input("we use vue 2");
    vue2.valid_from = Some(vue2_start);
    let first = service.add_with_temporal(vue2, "erin", "tech_stack", None).await.unwrap();

    let mut vue3 = input("we use vue 3 now");
    vue3.valid_from = Some(vue3_start);
    service
        .add_with_temporal(vue3, "erin", "tech_stack", Some(&first.id))
        .await
        .unwrap();

    let timeline = service.get_timeline("tech_stack", "erin", None).await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].period.from, vue2_start);
    assert_eq!(timeline[0].period.to, PeriodEnd::Until(vue3_start));
    assert_eq!(timeline[1].period.from, vue3_start);
    assert_eq!(timeline[1].period.to, PeriodEnd::Present);
}

#[tokio::test]
async fn update_then_delete_removes_memory() {
    let service = build_service(Config::default()).await;
    let added = service.add(input("draft note"), "frank").await.unwrap();

    service
        .update(
            &added.id,
            "frank",
            UpdateMemoryInput {
                content: Some("final note".to_string()),
                metadata: None,
                project_id: None,
            },
        )
        .await
        .unwrap();

    let fetched = service.get_by_id(&added.id, "frank").await.unwrap().unwrap();
    assert_eq!(fetched.content, "final note");

    service.delete(&added.id, "frank").await.unwrap();
    assert!(service.get_by_id(&added.id, "frank").await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_dry_run_never_mutates_store() {
    let service = build_service(Config::default()).await;
    let added = service.add(input("ancient memory"), "grace").await.unwrap();

    let report = service.cleanup(Some(-1), Some(100.0), true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.deleted_count, 0);

    assert!(service.get_by_id(&added.id, "grace").await.unwrap().is_some());
}
