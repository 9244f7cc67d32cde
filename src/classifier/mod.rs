//! LLM-powered cognitive sector classification, with a keyword fallback (§4.3)

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::types::Sector;

const PROMPT_CONTENT_CHARS: usize = 800;
const LLM_TIMEOUT: Duration = Duration::from_secs(300);

/// Normalized classification result, whether it came from the LLM or the
/// keyword fallback (§4.3 "Normalization ... also defines the fallback's contract").
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub primary_sector: Sector,
    pub secondary_sectors: Vec<Sector>,
    pub confidence: f32,
    pub semantic_tags: Vec<String>,
    pub generated_title: Option<String>,
}

/// Raw JSON shape returned by the LLM (`{response: "<json>"}` from Ollama).
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    primary_sector: Option<String>,
    #[serde(default)]
    secondary_sectors: Vec<String>,
    confidence: Option<f32>,
    #[serde(default)]
    semantic_tags: Vec<String>,
    generated_title: Option<String>,
}

/// Classifier interface so the Memory Service can be tested against a fake.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, title: Option<&str>, content: &str) -> Classification;
}

/// Ollama-backed LLM classifier (§4.3, §6).
pub struct LlmClassifier {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client, config }
    }

    fn build_prompt(&self, title: Option<&str>, content: &str) -> String {
        let sector_desc: String = Sector::ALL
            .iter()
            .map(|s| format!("  - {}: {}", s.as_str(), s.definition()))
            .collect::<Vec<_>>()
            .join("\n");

        let snippet: String = content.chars().take(PROMPT_CONTENT_CHARS).collect();

        format!(
            "Analyze the following memory and classify it into cognitive sectors.\n\n\
             Memory Title: {}\n\
             Memory Content:\n{}\n\n\
             Sector Definitions:\n{}\n\n\
             Tasks:\n\
             1. Determine PRIMARY sector (most relevant one)\n\
             2. Determine SECONDARY sectors (0-2 additional relevant sectors)\n\
             3. Extract 5-10 semantic keywords/tags\n\
             4. If title is empty/missing, generate a concise title (<50 chars)\n\
             5. Assign confidence score (0.0-1.0)\n\n\
             Response (JSON only):",
            title.unwrap_or("N/A"),
            snippet,
            sector_desc
        )
    }

    async fn call_llm(&self, title: Option<&str>, content: &str) -> Result<RawClassification> {
        let prompt = self.build_prompt(title, content);

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&serde_json::json!({
                "model": self.config.model,
                "prompt": prompt,
                "format": "json",
                "stream": false,
                "options": {"temperature": 0.1},
            }))
            .send()
            .await?;

        let body: OllamaGenerateResponse = response.json().await?;
        let raw: RawClassification = serde_json::from_str(&body.response)?;
        Ok(raw)
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, title: Option<&str>, content: &str) -> Classification {
        match self.call_llm(title, content).await {
            Ok(raw) => normalize(raw, title, content),
            Err(e) => {
                tracing::warn!("classification failed, falling back to keywords: {}", e);
                keyword_fallback(title, content)
            }
        }
    }
}

/// Applies the §4.3 normalization rules to a raw LLM response.
fn normalize(raw: RawClassification, title: Option<&str>, content: &str) -> Classification {
    let primary_sector = raw
        .primary_sector
        .as_deref()
        .and_then(|s| s.parse::<Sector>().ok())
        .unwrap_or(Sector::Semantic);

    let mut seen = HashSet::new();
    let secondary_sectors: Vec<Sector> = raw
        .secondary_sectors
        .iter()
        .filter_map(|s| s.parse::<Sector>().ok())
        .filter(|s| *s != primary_sector && seen.insert(*s))
        .take(2)
        .collect();

    let confidence = raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

    let semantic_tags = if raw.semantic_tags.is_empty() {
        extract_keywords(content)
    } else {
        raw.semantic_tags.into_iter().take(10).collect()
    };

    let generated_title = match (title, raw.generated_title) {
        (None, None) => Some(content.chars().take(50).collect()),
        (None, Some(t)) => Some(t),
        (Some(_), generated) => generated,
    };

    Classification {
        primary_sector,
        secondary_sectors,
        confidence,
        semantic_tags,
        generated_title,
    }
}

/// Keyword-based fallback used on LLM error or JSON parse failure (§4.3).
pub fn keyword_fallback(title: Option<&str>, content: &str) -> Classification {
    let lower = content.to_lowercase();

    let primary_sector = if contains_any(&lower, &["step", "how to", "guide", "deploy", "install"]) {
        Sector::Procedural
    } else if contains_any(&lower, &["like", "love", "hate", "frustrated", "happy"]) {
        Sector::Emotional
    } else if contains_any(&lower, &["yesterday", "meeting", "discussed", "we talked"]) {
        Sector::Episodic
    } else if contains_any(&lower, &["should", "recommend", "lesson", "insight"]) {
        Sector::Reflective
    } else {
        Sector::Semantic
    };

    Classification {
        primary_sector,
        secondary_sectors: Vec::new(),
        confidence: 0.5,
        semantic_tags: extract_keywords(content),
        generated_title: title.map(str::to_string).or_else(|| Some(content.chars().take(50).collect())),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

const STOP_WORDS: &[&str] = &["the", "a", "an", "is", "are", "was", "were", "be", "been"];

/// Distinct lowercase words longer than 4 chars, excluding stop words, capped at 10 (§4.3).
fn extract_keywords(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for word in content.to_lowercase().split_whitespace() {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.len() > 4 && !STOP_WORDS.contains(&cleaned.as_str()) && seen.insert(cleaned.clone()) {
            tags.push(cleaned);
            if tags.len() == 10 {
                break;
            }
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_classifies_procedural_content() {
        let result = keyword_fallback(None, "Step 1: install the agent");
        assert_eq!(result.primary_sector, Sector::Procedural);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn fallback_classifies_emotional_content() {
        let result = keyword_fallback(None, "I really love this feature");
        assert_eq!(result.primary_sector, Sector::Emotional);
    }

    #[test]
    fn fallback_defaults_to_semantic() {
        let result = keyword_fallback(None, "The sky is blue today");
        assert_eq!(result.primary_sector, Sector::Semantic);
    }

    #[test]
    fn normalize_clamps_out_of_range_confidence() {
        let raw = RawClassification {
            primary_sector: Some("semantic".to_string()),
            secondary_sectors: vec![],
            confidence: Some(1.5),
            semantic_tags: vec!["docker".to_string()],
            generated_title: None,
        };
        let result = normalize(raw, Some("title"), "content");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn normalize_falls_back_to_semantic_on_unknown_sector() {
        let raw = RawClassification {
            primary_sector: Some("unknown".to_string()),
            ..Default::default()
        };
        let result = normalize(raw, Some("t"), "some content here");
        assert_eq!(result.primary_sector, Sector::Semantic);
    }

    #[test]
    fn normalize_dedupes_and_excludes_primary_from_secondary() {
        let raw = RawClassification {
            primary_sector: Some("semantic".to_string()),
            secondary_sectors: vec![
                "semantic".to_string(),
                "procedural".to_string(),
                "procedural".to_string(),
                "emotional".to_string(),
            ],
            confidence: Some(0.8),
            semantic_tags: vec!["a".to_string()],
            generated_title: None,
        };
        let result = normalize(raw, Some("t"), "content");
        assert_eq!(result.secondary_sectors, vec![Sector::Procedural, Sector::Emotional]);
    }

    #[test]
    fn normalize_generates_title_only_when_both_missing() {
        let raw = RawClassification::default();
        let result = normalize(raw, None, "a fairly long piece of content to truncate for a title");
        assert!(result.generated_title.is_some());
        assert!(result.generated_title.unwrap().len() <= 50);
    }
}
