//! Composite relevance scoring: vector x sector x time x access (§4.5)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Sector;

const RECENT_DAYS: i64 = 7;
const RECENT_BOOST: f32 = 1.2;

const MONTH_DAYS: i64 = 30;
const MONTH_BOOST: f32 = 1.1;

const OLD_DAYS: i64 = 365;
const OLD_PENALTY: f32 = 0.8;

const PRIMARY_MATCH_BOOST: f32 = 1.2;
const SECONDARY_MATCH_BOOST: f32 = 1.1;
const SECTOR_MISMATCH_PENALTY: f32 = 0.8;

const MAX_ACCESS_BOOST: f32 = 1.2;
const ACCESS_DECAY: f32 = 0.02;

/// Per-factor breakdown of a composite score, returned alongside results so
/// callers can explain why a memory ranked where it did (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreExplanation {
    pub vector_similarity: f32,
    pub sector_boost: f32,
    pub time_boost: f32,
    pub access_boost: f32,
    pub final_score: f32,
    pub summary: String,
}

/// Inputs the scorer needs about one candidate memory.
pub struct ScoringInput<'a> {
    pub vector_similarity: f32,
    pub sector_primary: Sector,
    pub sector_secondary: &'a [Sector],
    pub created_at: DateTime<Utc>,
    pub access_count: i64,
}

/// Stateless composite scoring engine (§4.5).
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeScorer;

impl CompositeScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate_score(&self, input: &ScoringInput<'_>, query_sectors: &[Sector], now: DateTime<Utc>) -> ScoreExplanation {
        let sector_boost = self.sector_boost(input.sector_primary, input.sector_secondary, query_sectors);
        let time_boost = self.time_boost(input.created_at, now);
        let access_boost = self.access_boost(input.access_count);

        let final_score = input.vector_similarity * sector_boost * time_boost * access_boost;

        let summary = explain(input.vector_similarity, sector_boost, time_boost, access_boost);

        ScoreExplanation {
            vector_similarity: input.vector_similarity,
            sector_boost,
            time_boost,
            access_boost,
            final_score,
            summary,
        }
    }

    /// Primary match: +20%. Secondary match: +10%. Otherwise: -20%. No
    /// requested sectors at all: neutral (§4.5).
    fn sector_boost(&self, primary: Sector, secondary: &[Sector], query_sectors: &[Sector]) -> f32 {
        if query_sectors.is_empty() {
            return 1.0;
        }

        if query_sectors.contains(&primary) {
            PRIMARY_MATCH_BOOST
        } else if query_sectors.iter().any(|s| secondary.contains(s)) {
            SECONDARY_MATCH_BOOST
        } else {
            SECTOR_MISMATCH_PENALTY
        }
    }

    /// Younger than 7 days: +20%. Younger than 30 days: +10%. Older than a
    /// year: -20%. Otherwise neutral (§4.5).
    fn time_boost(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let days_old = (now - created_at).num_days();

        if days_old < RECENT_DAYS {
            RECENT_BOOST
        } else if days_old < MONTH_DAYS {
            MONTH_BOOST
        } else if days_old > OLD_DAYS {
            OLD_PENALTY
        } else {
            1.0
        }
    }

    /// Linear boost capped at 1.2x (§4.5).
    fn access_boost(&self, access_count: i64) -> f32 {
        let boost = 1.0 + (access_count as f32 * ACCESS_DECAY);
        boost.min(MAX_ACCESS_BOOST)
    }
}

fn explain(vector_similarity: f32, sector_boost: f32, time_boost: f32, access_boost: f32) -> String {
    let mut parts = Vec::new();

    if vector_similarity > 0.8 {
        parts.push("high semantic similarity");
    } else if vector_similarity > 0.5 {
        parts.push("moderate semantic match");
    } else {
        parts.push("weak semantic match");
    }

    if sector_boost > 1.1 {
        parts.push("matches requested cognitive sector");
    } else if sector_boost < 1.0 {
        parts.push("sector mismatch");
    }

    if time_boost > 1.1 {
        parts.push("recently created");
    } else if time_boost < 1.0 {
        parts.push("older memory");
    }

    if access_boost > 1.1 {
        parts.push("frequently accessed");
    }

    if parts.is_empty() {
        "standard relevance".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_input(created_at: DateTime<Utc>) -> ScoringInput<'static> {
        ScoringInput {
            vector_similarity: 0.9,
            sector_primary: Sector::Semantic,
            sector_secondary: &[],
            created_at,
            access_count: 0,
        }
    }

    #[test]
    fn no_query_sectors_is_neutral() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now);
        let explanation = scorer.calculate_score(&input, &[], now);
        assert_eq!(explanation.sector_boost, 1.0);
    }

    #[test]
    fn primary_match_boosts_score() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now - Duration::days(100));
        let explanation = scorer.calculate_score(&input, &[Sector::Semantic], now);
        assert_eq!(explanation.sector_boost, PRIMARY_MATCH_BOOST);
    }

    #[test]
    fn mismatch_penalizes_score() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now - Duration::days(100));
        let explanation = scorer.calculate_score(&input, &[Sector::Procedural], now);
        assert_eq!(explanation.sector_boost, SECTOR_MISMATCH_PENALTY);
    }

    #[test]
    fn recent_memory_gets_recent_boost() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now - Duration::days(1));
        let explanation = scorer.calculate_score(&input, &[], now);
        assert_eq!(explanation.time_boost, RECENT_BOOST);
    }

    #[test]
    fn old_memory_gets_penalty() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now - Duration::days(400));
        let explanation = scorer.calculate_score(&input, &[], now);
        assert_eq!(explanation.time_boost, OLD_PENALTY);
    }

    #[test]
    fn access_boost_caps_at_max() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let mut input = base_input(now - Duration::days(100));
        input.access_count = 1000;
        let explanation = scorer.calculate_score(&input, &[], now);
        assert_eq!(explanation.access_boost, MAX_ACCESS_BOOST);
    }

    #[test]
    fn final_score_is_product_of_factors() {
        let scorer = CompositeScorer::new();
        let now = Utc::now();
        let input = base_input(now - Duration::days(100));
        let explanation = scorer.calculate_score(&input, &[], now);
        let expected = explanation.vector_similarity
            * explanation.sector_boost
            * explanation.time_boost
            * explanation.access_boost;
        assert!((explanation.final_score - expected).abs() < 1e-6);
    }
}
