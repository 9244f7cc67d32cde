//! DEK Registry interface (§4.2, §6): external metadata-store table keyed by user_id.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One row of the external DEK registry table.
#[derive(Debug, Clone)]
pub struct DekRow {
    pub encrypted_dek: Vec<u8>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Per-user DEK lookup/creation against an external metadata store (§4.2).
///
/// Implementations must tolerate contention between two simultaneous
/// first-writes for the same user by treating `insert` as upsert (§6).
#[async_trait]
pub trait DekRegistry: Send + Sync {
    async fn get_active(&self, user_id: &str) -> Result<Option<DekRow>>;
    async fn insert(&self, user_id: &str, encrypted_dek: Vec<u8>) -> Result<()>;
    async fn update(&self, user_id: &str, encrypted_dek: Vec<u8>, updated_at: DateTime<Utc>) -> Result<()>;
}

/// In-memory `DekRegistry` used by tests and as a drop-in before a
/// relational-store-backed implementation is wired into the embedding
/// application (see `SPEC_FULL.md` §4.2).
#[derive(Default)]
pub struct InMemoryDekRegistry {
    rows: Mutex<HashMap<String, DekRow>>,
}

impl InMemoryDekRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DekRegistry for InMemoryDekRegistry {
    async fn get_active(&self, user_id: &str) -> Result<Option<DekRow>> {
        Ok(self.rows.lock().unwrap().get(user_id).cloned())
    }

    async fn insert(&self, user_id: &str, encrypted_dek: Vec<u8>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        // Upsert semantics: a racing first-write must not clobber an
        // already-active row with a different key (§6 contention note).
        rows.entry(user_id.to_string()).or_insert(DekRow {
            encrypted_dek,
            is_active: true,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn update(&self, user_id: &str, encrypted_dek: Vec<u8>, updated_at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        rows.insert(
            user_id.to_string(),
            DekRow {
                encrypted_dek,
                is_active: true,
                updated_at,
            },
        );
        Ok(())
    }
}
