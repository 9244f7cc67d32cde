//! Temporal knowledge graph: validity periods, supersession, timelines (§4.6)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Memory;

/// The end of a timeline period: either an explicit timestamp or "still valid".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodEnd {
    Until(DateTime<Utc>),
    Present,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePeriod {
    pub from: DateTime<Utc>,
    pub to: PeriodEnd,
}

/// One entry in an entity's reconstructed timeline (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub memory_id: String,
    pub title: String,
    pub content_preview: String,
    pub period: TimelinePeriod,
    pub is_current: bool,
    pub sector: crate::types::Sector,
}

const CONTENT_PREVIEW_CHARS: usize = 200;

/// Builds a chronological timeline for one entity out of its memories.
///
/// Each entry's period ends at its own `valid_until`, or at the next entry's
/// `valid_from` if it has none, or remains open ("present") if it is last
/// (§4.6). Callers are expected to have already filtered `memories` down to
/// one `temporal_entity`.
pub fn build_timeline(memories: &[Memory]) -> Vec<TimelineEntry> {
    let mut sorted: Vec<&Memory> = memories.iter().collect();
    sorted.sort_by_key(|m| m.temporal_valid_from);

    let mut timeline = Vec::with_capacity(sorted.len());

    for (i, memory) in sorted.iter().enumerate() {
        let to = if let Some(until) = memory.temporal_valid_until {
            PeriodEnd::Until(until)
        } else if let Some(next) = sorted.get(i + 1) {
            PeriodEnd::Until(next.temporal_valid_from)
        } else {
            PeriodEnd::Present
        };

        let preview: String = memory.content_plaintext.chars().take(CONTENT_PREVIEW_CHARS).collect();

        timeline.push(TimelineEntry {
            memory_id: memory.id.clone(),
            title: memory.title.clone(),
            content_preview: preview,
            period: TimelinePeriod {
                from: memory.temporal_valid_from,
                to,
            },
            is_current: memory.temporal_is_current,
            sector: memory.sector_primary,
        });
    }

    timeline
}

/// Finds the timeline entry valid at `timestamp`, scanning from newest to
/// oldest so the most recent applicable fact wins (§4.6).
pub fn query_at_time(timeline: &[TimelineEntry], timestamp: DateTime<Utc>) -> Option<&TimelineEntry> {
    timeline.iter().rev().find(|entry| {
        if entry.period.from > timestamp {
            return false;
        }
        match entry.period.to {
            PeriodEnd::Present => true,
            PeriodEnd::Until(until) => until >= timestamp,
        }
    })
}

/// Whether `memory`'s validity period covers `timestamp` (§4.6).
pub fn is_valid_at(memory: &Memory, timestamp: DateTime<Utc>) -> bool {
    if memory.temporal_valid_from > timestamp {
        return false;
    }
    match memory.temporal_valid_until {
        Some(until) => until >= timestamp,
        None => true,
    }
}

/// The most recent current entry in a timeline, if any (§4.6).
pub fn current_value(timeline: &[TimelineEntry]) -> Option<&TimelineEntry> {
    timeline.last().filter(|entry| entry.is_current)
}

/// Applies the supersession side effects to the memory being replaced.
///
/// The new record is written before this patch lands on the predecessor
/// (§5 ordering): a reader racing the write sees either the old record alone
/// or both, never a window with neither current. `temporal_valid_until` is
/// left untouched when the caller never set one explicitly; `build_timeline`
/// fills that gap from the successor's `valid_from` (§4.6), which is the
/// actual point the fact stopped holding rather than whenever this call ran.
pub fn mark_superseded(old: &mut Memory, superseded_by: &str) {
    old.temporal_is_current = false;
    old.superseded_by = Some(superseded_by.to_string());
}
