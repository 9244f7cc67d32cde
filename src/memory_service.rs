//! Orchestrator tying classification, embedding, encryption, scoring and
//! storage together into the public memory API (§4.1, §5)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::crypto::{DekRegistry, EncryptionManager};
use crate::embedding::Embedder;
use crate::error::{MemoryError, Result};
use crate::scoring::{CompositeScorer, ScoringInput};
use crate::temporal::{self, TimelineEntry};
use crate::types::{
    AddMemoryInput, AddMemoryResult, CleanupReport, Memory, RecalculateReport, SearchFilters,
    SearchFiltersEcho, SearchResponse, SearchResultItem, Sector, SectorSummary, UpdateMemoryInput,
};
use crate::vector_store::{StoreFilter, VectorPoint, VectorStore};

const INDEXED_FIELDS: &[&str] = &[
    "user_id",
    "project_id",
    "sector_primary",
    "temporal_is_current",
    "memory_types",
    "created_at",
    "is_encrypted",
];

const DEFAULT_CLEANUP_DAYS: i64 = 365;
const DEFAULT_CLEANUP_SCORE_THRESHOLD: f32 = 0.3;
const CLEANUP_SAMPLE_SIZE: usize = 5;
const CLEANUP_BATCH_SIZE: usize = 100;
const SEARCH_OVERFETCH_FACTOR: usize = 2;

/// Reserved `extra_metadata` key holding the last score `recalculate_scores`
/// wrote, so later passes can tell whether a memory actually changed (§4.1).
const CACHED_SCORE_KEY: &str = "cached_score";
/// Reserved `extra_metadata` key excluding a memory from `cleanup` (§4.1).
const PINNED_KEY: &str = "pinned";

pub struct MemoryService {
    vector_store: Arc<dyn VectorStore>,
    classifier: Arc<dyn Classifier>,
    embedder: Arc<dyn Embedder>,
    dek_registry: Arc<dyn DekRegistry>,
    encryption: Option<EncryptionManager>,
    scorer: CompositeScorer,
}

impl MemoryService {
    /// Builds the service and ensures the backing collection/indexes exist.
    pub async fn new(
        config: Config,
        vector_store: Arc<dyn VectorStore>,
        classifier: Arc<dyn Classifier>,
        embedder: Arc<dyn Embedder>,
        dek_registry: Arc<dyn DekRegistry>,
    ) -> Result<Self> {
        let encryption = config
            .master_key
            .as_deref()
            .and_then(EncryptionManager::new);

        if encryption.is_some() {
            tracing::info!("envelope encryption enabled");
        }

        vector_store.ensure_collection(config.vector_store.embedding_dims).await?;
        vector_store.ensure_indexes(INDEXED_FIELDS).await?;

        Ok(Self {
            vector_store,
            classifier,
            embedder,
            dek_registry,
            encryption,
            scorer: CompositeScorer::new(),
        })
    }

    /// Returns the per-user DEK, creating and registering one if absent.
    /// `None` means encryption is disabled process-wide (§4.2).
    async fn get_or_create_dek(&self, user_id: &str) -> Result<Option<crate::crypto::Dek>> {
        let Some(encryption) = &self.encryption else {
            return Ok(None);
        };

        if let Some(row) = self.dek_registry.get_active(user_id).await? {
            return Ok(Some(encryption.unwrap_dek(&row.encrypted_dek)?));
        }

        let dek = encryption.generate_dek();
        let wrapped = encryption.wrap_dek(&dek)?;
        self.dek_registry.insert(user_id, wrapped).await?;

        // Re-read: a concurrent first-write may have won the race (§6), and
        // both callers must agree on the same DEK.
        let row = self
            .dek_registry
            .get_active(user_id)
            .await?
            .ok_or_else(|| MemoryError::Internal("DEK registry insert did not persist a row".to_string()))?;
        Ok(Some(encryption.unwrap_dek(&row.encrypted_dek)?))
    }

    /// Encrypts `content` for `user_id` if encryption is enabled and a DEK
    /// is available; falls back to plaintext storage otherwise (§4.2).
    async fn encrypt_for_user(&self, content: &str, user_id: &str) -> Result<(Option<String>, Option<String>, bool)> {
        let Some(encryption) = &self.encryption else {
            return Ok((None, None, false));
        };

        let dek = match self.get_or_create_dek(user_id).await {
            Ok(Some(dek)) => dek,
            Ok(None) => return Ok((None, None, false)),
            Err(e) => {
                tracing::warn!("failed to obtain DEK for user {user_id}: {e}, storing plaintext");
                return Ok((None, None, false));
            }
        };

        match encryption.encrypt_content(content, &dek) {
            Ok(payload) => Ok((Some(payload.ciphertext_b64), Some(payload.nonce_b64), true)),
            Err(e) => {
                tracing::warn!("encryption failed: {e}, storing plaintext");
                Ok((None, None, false))
            }
        }
    }

    /// Decrypts a memory's content for display, substituting the §4.2
    /// sentinels when decryption cannot proceed.
    async fn decrypt_for_user(&self, memory: &Memory, user_id: &str) -> String {
        if !memory.is_encrypted {
            return memory.content.clone().unwrap_or_default();
        }

        let (Some(ciphertext_b64), Some(nonce_b64)) = (&memory.content_ciphertext, &memory.content_nonce) else {
            tracing::warn!("memory {} marked encrypted but missing ciphertext/nonce", memory.id);
            return memory.content.clone().unwrap_or_default();
        };

        let Some(encryption) = &self.encryption else {
            return crate::crypto::DECRYPT_UNAVAILABLE_SENTINEL.to_string();
        };

        let dek = match self.get_or_create_dek(user_id).await {
            Ok(Some(dek)) => dek,
            _ => return crate::crypto::DECRYPT_UNAVAILABLE_SENTINEL.to_string(),
        };

        let payload = crate::crypto::EncryptedPayload {
            ciphertext_b64: ciphertext_b64.clone(),
            nonce_b64: nonce_b64.clone(),
        };

        match encryption.decrypt_content(&payload, &dek) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!("decryption failed for memory {}: {e}", memory.id);
                crate::crypto::DECRYPT_FAILED_SENTINEL.to_string()
            }
        }
    }

    /// Embeds `text`, degrading to a zero-vector of the configured dimension
    /// on provider failure rather than failing the whole write (§4.1: "the
    /// record is still written so it remains searchable by filters").
    async fn embed_or_degrade(&self, text: &str) -> Vec<f32> {
        match self.embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("embedding degraded to zero-vector: {e}");
                vec![0.0; self.embedder.dims()]
            }
        }
    }

    fn memory_to_point(memory: &Memory) -> Result<VectorPoint> {
        let payload = serde_json::to_value(memory)?;
        Ok(VectorPoint {
            id: memory.id.clone(),
            vector: memory.embedding.clone(),
            payload,
            score: None,
        })
    }

    fn point_to_memory(point: VectorPoint) -> Result<Memory> {
        let mut memory: Memory = serde_json::from_value(point.payload)?;
        if !point.vector.is_empty() {
            memory.embedding = point.vector;
        }
        Ok(memory)
    }

    /// Classifies, embeds, encrypts and stores a new memory (§4.1).
    pub async fn add(&self, input: AddMemoryInput, user_id: &str) -> Result<AddMemoryResult> {
        if input.content.trim().is_empty() {
            return Err(MemoryError::InvalidArgument("content must not be empty".to_string()));
        }

        let classification = self.classifier.classify(input.title.as_deref(), &input.content).await;

        let embed_input = match &input.title {
            Some(title) => format!("{title}\n{}", input.content),
            None => input.content.clone(),
        };
        let embedding = self.embed_or_degrade(&embed_input).await;

        let id = Uuid::now_v7().to_string();
        let (ciphertext, nonce, is_encrypted) = self.encrypt_for_user(&input.content, user_id).await?;

        let title = input
            .title
            .or(classification.generated_title)
            .unwrap_or_else(|| input.content.chars().take(50).collect());

        let now = Utc::now();
        let memory = Memory {
            id: id.clone(),
            user_id: user_id.to_string(),
            project_id: input.project_id.unwrap_or_else(|| "default".to_string()),
            namespace: input.namespace.unwrap_or_else(|| "general".to_string()),
            title: title.clone(),
            content_plaintext: input.content.clone(),
            content_ciphertext: ciphertext,
            content_nonce: nonce,
            content: if is_encrypted { None } else { Some(input.content.clone()) },
            is_encrypted,
            embedding,
            memory_types: input.memory_types.unwrap_or_else(|| vec!["general".to_string()]),
            user_preference: input.user_preference,
            sector_primary: classification.primary_sector,
            sector_secondary: classification.secondary_sectors,
            sector_confidence: classification.confidence,
            semantic_tags: classification.semantic_tags,
            temporal_valid_from: input.valid_from.unwrap_or(now),
            temporal_valid_until: input.valid_until,
            temporal_is_current: true,
            temporal_entity: None,
            supersedes: None,
            superseded_by: None,
            created_at: now,
            updated_at: None,
            access_count: 0,
            last_accessed: None,
            score_updated_at: None,
            extra_metadata: input.extra_metadata,
        };

        memory.validate_invariants().map_err(MemoryError::InvalidArgument)?;

        self.vector_store.upsert(Self::memory_to_point(&memory)?).await?;

        Ok(AddMemoryResult {
            id,
            title,
            sectors: SectorSummary {
                primary: memory.sector_primary,
                secondary: memory.sector_secondary,
                confidence: memory.sector_confidence,
            },
            project_id: memory.project_id,
            created_at: memory.created_at,
            is_encrypted: memory.is_encrypted,
        })
    }

    /// Adds a memory as part of a temporal entity's history, superseding an
    /// earlier fact if one is named (§4.5). The new record is written first;
    /// the predecessor is only updated afterward (§5 ordering). The
    /// predecessor update retries a few times, and on permanent failure the
    /// new record's `temporal_is_current` is cleared rather than risk two
    /// simultaneously-current entries for the entity (§4.5).
    pub async fn add_with_temporal(
        &self,
        mut input: AddMemoryInput,
        user_id: &str,
        entity: &str,
        supersedes: Option<&str>,
    ) -> Result<AddMemoryResult> {
        if let Some(old_id) = supersedes {
            let point = self
                .vector_store
                .retrieve(old_id)
                .await?
                .ok_or_else(|| MemoryError::NotFound(old_id.to_string()))?;
            let old = Self::point_to_memory(point)?;
            if old.user_id != user_id {
                return Err(MemoryError::AccessDenied(old_id.to_string()));
            }
            if old.superseded_by.is_some() {
                return Err(MemoryError::Conflict(format!(
                    "{old_id} is already superseded by a different record"
                )));
            }
        }

        input
            .extra_metadata
            .insert("temporal_entity".to_string(), serde_json::json!(entity));
        if let Some(old_id) = supersedes {
            input
                .extra_metadata
                .insert("supersedes".to_string(), serde_json::json!(old_id));
        }

        let result = self.add(input, user_id).await?;

        // Stamp the new record's temporal_entity/supersedes fields directly,
        // since `add` doesn't know about entity linkage.
        self.vector_store
            .set_payload(
                &result.id,
                serde_json::json!({
                    "temporal_entity": entity,
                    "supersedes": supersedes,
                }),
            )
            .await?;

        if let Some(old_id) = supersedes {
            const SUPERSESSION_RETRY_ATTEMPTS: usize = 3;
            let mut last_err = None;

            for attempt in 0..SUPERSESSION_RETRY_ATTEMPTS {
                let point = match self.vector_store.retrieve(old_id).await {
                    Ok(Some(p)) => p,
                    Ok(None) => {
                        last_err = Some(MemoryError::NotFound(old_id.to_string()));
                        break;
                    }
                    Err(e) => {
                        last_err = Some(e);
                        continue;
                    }
                };
                let mut old = match Self::point_to_memory(point) {
                    Ok(m) => m,
                    Err(e) => {
                        last_err = Some(e);
                        continue;
                    }
                };
                temporal::mark_superseded(&mut old, &result.id);

                match self
                    .vector_store
                    .set_payload(
                        old_id,
                        serde_json::json!({
                            "temporal_is_current": false,
                            "temporal_valid_until": old.temporal_valid_until,
                            "superseded_by": result.id,
                        }),
                    )
                    .await
                {
                    Ok(()) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "supersession update attempt {}/{SUPERSESSION_RETRY_ATTEMPTS} failed for {old_id}: {e}",
                            attempt + 1
                        );
                        last_err = Some(e);
                    }
                }
            }

            if let Some(e) = last_err {
                tracing::warn!(
                    "permanently failed to mark {old_id} superseded, clearing temporal_is_current on {} so the entity has no current fact: {e}",
                    result.id
                );
                if let Err(e) = self
                    .vector_store
                    .set_payload(&result.id, serde_json::json!({"temporal_is_current": false}))
                    .await
                {
                    tracing::warn!("failed to clear temporal_is_current on {}: {e}", result.id);
                }
            }
        }

        Ok(result)
    }

    /// Reconstructs the timeline of an entity's evolution (§4.6).
    pub async fn get_timeline(&self, entity: &str, user_id: &str, project_id: Option<&str>) -> Result<Vec<TimelineEntry>> {
        let mut filter = StoreFilter::default();
        filter.must_equal.insert("user_id".to_string(), serde_json::json!(user_id));
        filter.must_equal.insert("temporal_entity".to_string(), serde_json::json!(entity));
        if let Some(project_id) = project_id {
            filter.must_equal.insert("project_id".to_string(), serde_json::json!(project_id));
        }

        let points = self.vector_store.scroll(&filter, 1000).await?;
        let mut memories: Vec<Memory> = points
            .into_iter()
            .filter_map(|p| Self::point_to_memory(p).ok())
            .collect();

        // `content_plaintext` is never persisted (§3); recover it so
        // `build_timeline` can render a preview.
        for memory in &mut memories {
            memory.content_plaintext = self.decrypt_for_user(memory, user_id).await;
        }

        Ok(temporal::build_timeline(&memories))
    }

    /// Finds what was true about `entity` at `timestamp` (§4.6).
    pub async fn query_at_time(
        &self,
        entity: &str,
        timestamp: DateTime<Utc>,
        user_id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<TimelineEntry>> {
        let timeline = self.get_timeline(entity, user_id, project_id).await?;
        Ok(temporal::query_at_time(&timeline, timestamp).cloned())
    }

    /// Searches memories by semantic similarity, applying the composite
    /// score and decrypting results for display (§4.1, §4.5).
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        filters: SearchFilters,
        limit: usize,
        with_explanation: bool,
    ) -> Result<SearchResponse> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut store_filter = StoreFilter::default();
        store_filter.must_equal.insert("user_id".to_string(), serde_json::json!(user_id));
        if let Some(project_id) = &filters.project_id {
            store_filter.must_equal.insert("project_id".to_string(), serde_json::json!(project_id));
        }
        if filters.only_current {
            store_filter.must_equal.insert("temporal_is_current".to_string(), serde_json::json!(true));
        }

        let overfetch = (limit * SEARCH_OVERFETCH_FACTOR).max(limit);
        let points = self.vector_store.search(&query_embedding, overfetch, &store_filter).await?;

        let now = Utc::now();
        let mut scored = Vec::with_capacity(points.len());

        for point in points {
            let vector_similarity = point.score.unwrap_or(0.0);
            let memory = match Self::point_to_memory(point) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("failed to deserialize search hit: {e}");
                    continue;
                }
            };

            if !filters.memory_types.is_empty()
                && !filters.memory_types.iter().any(|t| memory.memory_types.contains(t))
            {
                continue;
            }

            let explanation = self.scorer.calculate_score(
                &ScoringInput {
                    vector_similarity,
                    sector_primary: memory.sector_primary,
                    sector_secondary: &memory.sector_secondary,
                    created_at: memory.created_at,
                    access_count: memory.access_count,
                },
                &filters.sectors,
                now,
            );

            let content = self.decrypt_for_user(&memory, user_id).await;

            scored.push(SearchResultItem {
                id: memory.id,
                title: memory.title,
                content,
                score: explanation.final_score,
                project_id: memory.project_id,
                sectors: SectorSummary {
                    primary: memory.sector_primary,
                    secondary: memory.sector_secondary,
                    confidence: memory.sector_confidence,
                },
                memory_types: memory.memory_types,
                semantic_tags: memory.semantic_tags,
                created_at: memory.created_at,
                temporal_is_current: memory.temporal_is_current,
                temporal_valid_from: memory.temporal_valid_from,
                is_encrypted: memory.is_encrypted,
                explanation: if with_explanation { Some(explanation) } else { None },
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total_found = scored.len();
        scored.truncate(limit);

        Ok(SearchResponse {
            query: query.to_string(),
            total_found,
            filters: SearchFiltersEcho {
                project_id: filters.project_id,
                sectors: filters.sectors,
                memory_types: filters.memory_types,
                only_current: filters.only_current,
            },
            results: scored,
        })
    }

    /// Fetches a single memory by id, verifying ownership and recording an
    /// access (§4.1).
    pub async fn get_by_id(&self, id: &str, user_id: &str) -> Result<Option<SearchResultItem>> {
        let Some(point) = self.vector_store.retrieve(id).await? else {
            return Ok(None);
        };
        let memory = Self::point_to_memory(point)?;

        if memory.user_id != user_id {
            return Ok(None);
        }

        let content = self.decrypt_for_user(&memory, user_id).await;
        let now = Utc::now();

        if let Err(e) = self
            .vector_store
            .set_payload(
                id,
                serde_json::json!({
                    "access_count": memory.access_count + 1,
                    "last_accessed": now,
                }),
            )
            .await
        {
            tracing::warn!("failed to record access for memory {id}: {e}");
        }

        Ok(Some(SearchResultItem {
            id: memory.id,
            title: memory.title,
            content,
            score: 0.0,
            project_id: memory.project_id,
            sectors: SectorSummary {
                primary: memory.sector_primary,
                secondary: memory.sector_secondary,
                confidence: memory.sector_confidence,
            },
            memory_types: memory.memory_types,
            semantic_tags: memory.semantic_tags,
            created_at: memory.created_at,
            temporal_is_current: memory.temporal_is_current,
            temporal_valid_from: memory.temporal_valid_from,
            is_encrypted: memory.is_encrypted,
            explanation: None,
        }))
    }

    /// Lists all memories for a user, optionally scoped to a project (§4.1).
    pub async fn get_all(&self, user_id: &str, project_id: Option<&str>, limit: usize) -> Result<Vec<Memory>> {
        let mut filter = StoreFilter::default();
        filter.must_equal.insert("user_id".to_string(), serde_json::json!(user_id));
        if let Some(project_id) = project_id {
            filter.must_equal.insert("project_id".to_string(), serde_json::json!(project_id));
        }

        let points = self.vector_store.scroll(&filter, limit).await?;
        Ok(points.into_iter().filter_map(|p| Self::point_to_memory(p).ok()).collect())
    }

    /// Applies a content/metadata patch to an existing memory, re-embedding
    /// and re-encrypting content when it changes (§4.1).
    pub async fn update(&self, id: &str, user_id: &str, patch: UpdateMemoryInput) -> Result<()> {
        let point = self.vector_store.retrieve(id).await?.ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let mut memory = Self::point_to_memory(point)?;

        if memory.user_id != user_id {
            return Err(MemoryError::AccessDenied(id.to_string()));
        }

        if let Some(content) = &patch.content {
            let embed_input = format!("{}\n{content}", memory.title);
            memory.embedding = self.embed_or_degrade(&embed_input).await;

            let (ciphertext, nonce, is_encrypted) = self.encrypt_for_user(content, user_id).await?;
            memory.content_plaintext = content.clone();
            memory.content_ciphertext = ciphertext;
            memory.content_nonce = nonce;
            memory.content = if is_encrypted { None } else { Some(content.clone()) };
            memory.is_encrypted = is_encrypted;
        }

        if let Some(metadata) = patch.metadata {
            memory.extra_metadata = metadata;
        }
        if let Some(project_id) = patch.project_id {
            memory.project_id = project_id;
        }

        memory.updated_at = Some(Utc::now());
        memory.validate_invariants().map_err(MemoryError::InvalidArgument)?;

        self.vector_store.upsert(Self::memory_to_point(&memory)?).await?;
        Ok(())
    }

    /// Deletes a memory after verifying ownership (§4.1).
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<()> {
        let point = self.vector_store.retrieve(id).await?.ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let memory = Self::point_to_memory(point)?;

        if memory.user_id != user_id {
            return Err(MemoryError::AccessDenied(id.to_string()));
        }

        self.vector_store.delete(&[id.to_string()]).await
    }

    /// Scans all memories and removes ones that are old, low-scoring and
    /// not pinned, optionally as a dry run (§4.1, §5).
    pub async fn cleanup(&self, days_threshold: Option<i64>, score_threshold: Option<f32>, dry_run: bool) -> Result<CleanupReport> {
        let days_threshold = days_threshold.unwrap_or(DEFAULT_CLEANUP_DAYS);
        let score_threshold = score_threshold.unwrap_or(DEFAULT_CLEANUP_SCORE_THRESHOLD);
        let now = Utc::now();

        let points = self.vector_store.scroll(&StoreFilter::default(), usize::MAX.min(10_000)).await?;

        let mut candidates = Vec::new();
        for point in points {
            let memory = match Self::point_to_memory(point) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let pinned = memory
                .extra_metadata
                .get(PINNED_KEY)
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if pinned {
                continue;
            }

            let age_days = (now - memory.created_at).num_days();
            if age_days < days_threshold {
                continue;
            }

            let explanation = self.scorer.calculate_score(
                &ScoringInput {
                    vector_similarity: 1.0,
                    sector_primary: memory.sector_primary,
                    sector_secondary: &memory.sector_secondary,
                    created_at: memory.created_at,
                    access_count: memory.access_count,
                },
                &[],
                now,
            );

            if explanation.final_score < score_threshold {
                candidates.push(memory.id);
            }
        }

        let total_found = candidates.len();
        let sample = candidates.iter().take(CLEANUP_SAMPLE_SIZE).cloned().collect();

        let mut deleted_count = 0;
        if !dry_run {
            // §4.1: deletes happen "in batches of 100" rather than one
            // round-trip per candidate.
            for batch in candidates.chunks(CLEANUP_BATCH_SIZE) {
                if let Err(e) = self.vector_store.delete(batch).await {
                    tracing::warn!("cleanup failed to delete a batch of {} memories: {e}", batch.len());
                    continue;
                }
                deleted_count += batch.len();
            }
        }

        Ok(CleanupReport {
            dry_run,
            days_threshold,
            score_threshold,
            total_found,
            deleted_count,
            sample,
        })
    }

    /// Recomputes the time-decay component of each memory's cached score,
    /// writing back only when it moved by more than the rounding threshold (§4.1, §5).
    pub async fn recalculate_scores(&self, batch_size: usize) -> Result<RecalculateReport> {
        let now = Utc::now();
        let points = self.vector_store.scroll(&StoreFilter::default(), batch_size).await?;

        let mut total_processed = 0;
        let mut updated_count = 0;

        for point in points {
            let memory = match Self::point_to_memory(point) {
                Ok(m) => m,
                Err(_) => continue,
            };
            total_processed += 1;

            let explanation = self.scorer.calculate_score(
                &ScoringInput {
                    vector_similarity: 1.0,
                    sector_primary: memory.sector_primary,
                    sector_secondary: &memory.sector_secondary,
                    created_at: memory.created_at,
                    access_count: memory.access_count,
                },
                &[],
                now,
            );

            let previous = memory
                .extra_metadata
                .get(CACHED_SCORE_KEY)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0) as f32;

            if (explanation.final_score - previous).abs() > 0.01 {
                // `set_payload` merges only at the top level, so the whole
                // `extra_metadata` object has to be resent with the new key
                // folded in, or a concurrent pinned/important flag would be
                // silently dropped.
                let mut extra_metadata = memory.extra_metadata.clone();
                extra_metadata.insert(CACHED_SCORE_KEY.to_string(), serde_json::json!(explanation.final_score));

                if let Err(e) = self
                    .vector_store
                    .set_payload(
                        &memory.id,
                        serde_json::json!({
                            "extra_metadata": extra_metadata,
                            "score_updated_at": now,
                        }),
                    )
                    .await
                {
                    tracing::warn!("failed to write recalculated score for {}: {e}", memory.id);
                    continue;
                }
                updated_count += 1;
            }
        }

        Ok(RecalculateReport {
            total_processed,
            updated_count,
            unchanged_count: total_processed - updated_count,
        })
    }
}
