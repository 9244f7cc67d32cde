//! Thin typed driver over an external, backend-agnostic vector store (§4.6)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::VectorStoreConfig;
use crate::embedding::cosine_similarity;
use crate::error::{MemoryError, Result};

/// One stored point: an id, its embedding, and an arbitrary JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
    /// Populated on search results; `None` for scroll/retrieve.
    #[serde(default)]
    pub score: Option<f32>,
}

/// Filter passed to `search`/`scroll`, translated into the backend's native
/// filter DSL by each implementation.
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub must_equal: HashMap<String, serde_json::Value>,
    pub must_be_in: HashMap<String, Vec<serde_json::Value>>,
}

/// Backend-agnostic vector store contract (§4.6). Implementations wrap a
/// specific backend's wire protocol; callers never see that protocol.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, dims: usize) -> Result<()>;
    async fn ensure_indexes(&self, fields: &[&str]) -> Result<()>;
    async fn upsert(&self, point: VectorPoint) -> Result<()>;
    async fn search(&self, vector: &[f32], limit: usize, filter: &StoreFilter) -> Result<Vec<VectorPoint>>;
    async fn scroll(&self, filter: &StoreFilter, limit: usize) -> Result<Vec<VectorPoint>>;
    async fn retrieve(&self, id: &str) -> Result<Option<VectorPoint>>;
    async fn set_payload(&self, id: &str, payload: serde_json::Value) -> Result<()>;
    /// Deletes every id in one request, matching the driver's batch-oriented
    /// contract (§4.6: `delete(ids)`) so callers like `cleanup` can delete in
    /// batches instead of one round-trip per id.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}

fn filter_matches(payload: &serde_json::Value, filter: &StoreFilter) -> bool {
    for (key, expected) in &filter.must_equal {
        if payload.get(key) != Some(expected) {
            return false;
        }
    }
    for (key, candidates) in &filter.must_be_in {
        match payload.get(key) {
            Some(actual) if candidates.contains(actual) => {}
            _ => return false,
        }
    }
    true
}

/// HTTP/JSON client for a Qdrant-compatible vector store REST API (§4.6,
/// §6). Mirrors the request/response shape of Qdrant's collections and
/// points endpoints without depending on a Qdrant-specific SDK crate.
pub struct HttpVectorStore {
    client: reqwest::Client,
    config: VectorStoreConfig,
}

impl HttpVectorStore {
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.base_url(),
            self.config.collection,
            suffix
        )
    }

    fn build_qdrant_filter(filter: &StoreFilter) -> Option<serde_json::Value> {
        if filter.must_equal.is_empty() && filter.must_be_in.is_empty() {
            return None;
        }

        let mut must = Vec::new();
        for (key, value) in &filter.must_equal {
            must.push(serde_json::json!({"key": key, "match": {"value": value}}));
        }
        for (key, values) in &filter.must_be_in {
            must.push(serde_json::json!({"key": key, "match": {"any": values}}));
        }

        Some(serde_json::json!({"must": must}))
    }
}

#[derive(Debug, Deserialize)]
struct QdrantPointHit {
    id: serde_json::Value,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct QdrantResultEnvelope<T> {
    result: T,
}

impl From<QdrantPointHit> for VectorPoint {
    fn from(hit: QdrantPointHit) -> Self {
        VectorPoint {
            id: hit.id.as_str().map(str::to_string).unwrap_or_else(|| hit.id.to_string()),
            vector: hit.vector.unwrap_or_default(),
            payload: hit.payload,
            score: hit.score,
        }
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let response = self
            .client
            .put(self.collection_url(""))
            .json(&serde_json::json!({
                "vectors": {"size": dims, "distance": "Cosine"}
            }))
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 409 {
            return Err(MemoryError::StorageUnavailable(format!(
                "failed to ensure collection: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn ensure_indexes(&self, fields: &[&str]) -> Result<()> {
        for field in fields {
            let response = self
                .client
                .put(self.collection_url("/index"))
                .json(&serde_json::json!({"field_name": field, "field_schema": "keyword"}))
                .send()
                .await?;

            if !response.status().is_success() {
                tracing::warn!("failed to ensure index on {field}: {}", response.status());
            }
        }
        Ok(())
    }

    async fn upsert(&self, point: VectorPoint) -> Result<()> {
        let response = self
            .client
            .put(self.collection_url("/points"))
            .json(&serde_json::json!({
                "points": [{
                    "id": point.id,
                    "vector": point.vector,
                    "payload": point.payload,
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "upsert failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &StoreFilter) -> Result<Vec<VectorPoint>> {
        let mut body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });

        if let Some(qdrant_filter) = Self::build_qdrant_filter(filter) {
            body["filter"] = qdrant_filter;
        }

        let response = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "search failed: {}",
                response.status()
            )));
        }

        let envelope: QdrantResultEnvelope<Vec<QdrantPointHit>> = response.json().await?;
        Ok(envelope.result.into_iter().map(Into::into).collect())
    }

    async fn scroll(&self, filter: &StoreFilter, limit: usize) -> Result<Vec<VectorPoint>> {
        let mut body = serde_json::json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });

        if let Some(qdrant_filter) = Self::build_qdrant_filter(filter) {
            body["filter"] = qdrant_filter;
        }

        let response = self
            .client
            .post(self.collection_url("/points/scroll"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "scroll failed: {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct ScrollResult {
            points: Vec<QdrantPointHit>,
        }

        let envelope: QdrantResultEnvelope<ScrollResult> = response.json().await?;
        Ok(envelope.result.points.into_iter().map(Into::into).collect())
    }

    async fn retrieve(&self, id: &str) -> Result<Option<VectorPoint>> {
        let response = self
            .client
            .get(self.collection_url(&format!("/points/{id}")))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "retrieve failed: {}",
                response.status()
            )));
        }

        let envelope: QdrantResultEnvelope<QdrantPointHit> = response.json().await?;
        Ok(Some(envelope.result.into()))
    }

    async fn set_payload(&self, id: &str, payload: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url("/points/payload"))
            .json(&serde_json::json!({
                "payload": payload,
                "points": [id],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "set_payload failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url("/points/delete"))
            .json(&serde_json::json!({"points": ids}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MemoryError::StorageUnavailable(format!(
                "delete failed: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// In-memory `VectorStore` used by tests (§4.6, §8 scenario coverage).
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: Mutex<HashMap<String, VectorPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, _dims: usize) -> Result<()> {
        Ok(())
    }

    async fn ensure_indexes(&self, _fields: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, point: VectorPoint) -> Result<()> {
        self.points.lock().unwrap().insert(point.id.clone(), point);
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize, filter: &StoreFilter) -> Result<Vec<VectorPoint>> {
        let points = self.points.lock().unwrap();
        let mut scored: Vec<VectorPoint> = points
            .values()
            .filter(|p| filter_matches(&p.payload, filter))
            .map(|p| {
                let mut clone = p.clone();
                clone.score = Some(cosine_similarity(vector, &p.vector));
                clone
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn scroll(&self, filter: &StoreFilter, limit: usize) -> Result<Vec<VectorPoint>> {
        let points = self.points.lock().unwrap();
        let mut matched: Vec<VectorPoint> = points
            .values()
            .filter(|p| filter_matches(&p.payload, filter))
            .cloned()
            .collect();
        matched.truncate(limit);
        Ok(matched)
    }

    async fn retrieve(&self, id: &str) -> Result<Option<VectorPoint>> {
        Ok(self.points.lock().unwrap().get(id).cloned())
    }

    async fn set_payload(&self, id: &str, payload: serde_json::Value) -> Result<()> {
        let mut points = self.points.lock().unwrap();
        if let Some(point) = points.get_mut(id) {
            if let (Some(existing), Some(incoming)) = (point.payload.as_object_mut(), payload.as_object()) {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            Ok(())
        } else {
            Err(MemoryError::NotFound(id.to_string()))
        }
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut points = self.points.lock().unwrap();
        for id in ids {
            points.remove(id);
        }
        Ok(())
    }
}
