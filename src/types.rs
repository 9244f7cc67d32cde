//! Core types for the memory core (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Opaque memory identifier (UUIDv7, see §4.1 and `DESIGN.md`)
pub type MemoryId = String;

/// Closed set of cognitive sectors (§4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Episodic,
    Semantic,
    Procedural,
    Emotional,
    Reflective,
}

impl Sector {
    pub const ALL: [Sector; 5] = [
        Sector::Episodic,
        Sector::Semantic,
        Sector::Procedural,
        Sector::Emotional,
        Sector::Reflective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Episodic => "episodic",
            Sector::Semantic => "semantic",
            Sector::Procedural => "procedural",
            Sector::Emotional => "emotional",
            Sector::Reflective => "reflective",
        }
    }

    /// Short human definition used as LLM prompt input (§4.3)
    pub fn definition(&self) -> &'static str {
        match self {
            Sector::Episodic => "Specific events, conversations, meetings, what happened",
            Sector::Semantic => "Facts, knowledge, tech stack, user preferences, configurations",
            Sector::Procedural => "Steps, workflows, how-to guides, operations, deployment",
            Sector::Emotional => "Feelings, satisfaction, complaints, excitement, frustration",
            Sector::Reflective => "Insights, patterns, lessons learned, recommendations",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sector {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "episodic" => Ok(Sector::Episodic),
            "semantic" => Ok(Sector::Semantic),
            "procedural" => Ok(Sector::Procedural),
            "emotional" => Ok(Sector::Emotional),
            "reflective" => Ok(Sector::Reflective),
            _ => Err(()),
        }
    }
}

fn default_project_id() -> String {
    "default".to_string()
}

fn default_namespace() -> String {
    "general".to_string()
}

fn default_memory_types() -> Vec<String> {
    vec!["general".to_string()]
}

/// A memory record, stored as a single vector point (§3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub user_id: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub title: String,

    /// In-flight plaintext; never persisted to the vector store payload.
    #[serde(skip_serializing, default)]
    pub content_plaintext: String,

    /// Present iff `is_encrypted`.
    pub content_ciphertext: Option<String>,
    /// Present iff `is_encrypted`.
    pub content_nonce: Option<String>,
    /// Legacy plaintext storage (present iff `!is_encrypted`).
    pub content: Option<String>,
    pub is_encrypted: bool,

    pub embedding: Vec<f32>,

    #[serde(default = "default_memory_types")]
    pub memory_types: Vec<String>,
    #[serde(default)]
    pub user_preference: bool,

    pub sector_primary: Sector,
    #[serde(default)]
    pub sector_secondary: Vec<Sector>,
    pub sector_confidence: f32,
    #[serde(default)]
    pub semantic_tags: Vec<String>,

    pub temporal_valid_from: DateTime<Utc>,
    pub temporal_valid_until: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub temporal_is_current: bool,
    pub temporal_entity: Option<String>,
    pub supersedes: Option<MemoryId>,
    pub superseded_by: Option<MemoryId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub score_updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub extra_metadata: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl Memory {
    /// Invariant checks from §3 / §8 property 1; used by tests and as a
    /// defensive assertion point before upsert.
    pub fn validate_invariants(&self) -> Result<(), String> {
        if self.sector_secondary.len() > 2 {
            return Err("sector_secondary must have at most 2 entries".to_string());
        }
        if self.sector_secondary.contains(&self.sector_primary) {
            return Err("sector_secondary must not contain sector_primary".to_string());
        }
        if self.semantic_tags.len() > 10 {
            return Err("semantic_tags must have at most 10 entries".to_string());
        }
        if self.sector_confidence < 0.0 || self.sector_confidence > 1.0 {
            return Err("sector_confidence must be in [0,1]".to_string());
        }
        if self.is_encrypted && (self.content_ciphertext.is_none() || self.content_nonce.is_none()) {
            return Err("is_encrypted requires content_ciphertext and content_nonce".to_string());
        }
        if let Some(until) = self.temporal_valid_until {
            if self.temporal_valid_from > until {
                return Err("temporal_valid_from must be <= temporal_valid_until".to_string());
            }
        }
        Ok(())
    }
}

/// Input to `MemoryService::add` (§4.1)
#[derive(Debug, Clone, Default)]
pub struct AddMemoryInput {
    pub content: String,
    pub title: Option<String>,
    pub project_id: Option<String>,
    pub namespace: Option<String>,
    pub memory_types: Option<Vec<String>>,
    pub user_preference: bool,
    /// When the fact became true. Defaults to the insertion time; set
    /// explicitly to backdate historical facts (§4.5).
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub extra_metadata: HashMap<String, serde_json::Value>,
}

/// Result of `MemoryService::add`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoryResult {
    pub id: MemoryId,
    pub title: String,
    pub sectors: SectorSummary,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub is_encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorSummary {
    pub primary: Sector,
    pub secondary: Vec<Sector>,
    pub confidence: f32,
}

/// Filters accepted by `MemoryService::search` (§4.1)
#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub project_id: Option<String>,
    pub sectors: Vec<Sector>,
    pub memory_types: Vec<String>,
    pub only_current: bool,
}

impl Default for SearchFilters {
    /// §4.1 documents `search`'s own default as `only_current=true`; a
    /// derived `Default` would silently give the opposite.
    fn default() -> Self {
        Self {
            project_id: None,
            sectors: Vec::new(),
            memory_types: Vec::new(),
            only_current: true,
        }
    }
}

/// A single scored, decrypted search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub id: MemoryId,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub project_id: String,
    pub sectors: SectorSummary,
    pub memory_types: Vec<String>,
    pub semantic_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub temporal_is_current: bool,
    pub temporal_valid_from: DateTime<Utc>,
    pub is_encrypted: bool,
    pub explanation: Option<crate::scoring::ScoreExplanation>,
}

/// Response of `MemoryService::search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_found: usize,
    pub filters: SearchFiltersEcho,
    pub results: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFiltersEcho {
    pub project_id: Option<String>,
    pub sectors: Vec<Sector>,
    pub memory_types: Vec<String>,
    pub only_current: bool,
}

/// Patch accepted by `MemoryService::update`
#[derive(Debug, Clone, Default)]
pub struct UpdateMemoryInput {
    pub content: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub project_id: Option<String>,
}

/// Result of a dry-run or real `cleanup` pass (§4.1)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub days_threshold: i64,
    pub score_threshold: f32,
    pub total_found: usize,
    pub deleted_count: usize,
    pub sample: Vec<MemoryId>,
}

/// Result of a `recalculate_scores` pass (§4.1)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecalculateReport {
    pub total_processed: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_round_trips_through_str() {
        for s in Sector::ALL {
            assert_eq!(s.as_str().parse::<Sector>().unwrap(), s);
        }
    }

    #[test]
    fn invalid_sector_secondary_rejected() {
        let mut memory = sample_memory();
        memory.sector_secondary = vec![Sector::Semantic];
        memory.sector_primary = Sector::Semantic;
        assert!(memory.validate_invariants().is_err());
    }

    fn sample_memory() -> Memory {
        Memory {
            id: "id".into(),
            user_id: "u1".into(),
            project_id: "default".into(),
            namespace: "general".into(),
            title: "t".into(),
            content_plaintext: "c".into(),
            content_ciphertext: None,
            content_nonce: None,
            content: Some("c".into()),
            is_encrypted: false,
            embedding: vec![0.0; 4],
            memory_types: vec!["general".into()],
            user_preference: false,
            sector_primary: Sector::Semantic,
            sector_secondary: vec![],
            sector_confidence: 0.5,
            semantic_tags: vec![],
            temporal_valid_from: Utc::now(),
            temporal_valid_until: None,
            temporal_is_current: true,
            temporal_entity: None,
            supersedes: None,
            superseded_by: None,
            created_at: Utc::now(),
            updated_at: None,
            access_count: 0,
            last_accessed: None,
            score_updated_at: None,
            extra_metadata: HashMap::new(),
        }
    }
}
