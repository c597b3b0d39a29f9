//! Core record type for the memory vault

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single conversation record held by the vault.
///
/// Records are immutable once stored: there is no update path, and the id
/// and timestamp are assigned by the service, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier, assigned at store time
    pub id: Uuid,
    /// The stored conversation text
    pub content: String,
    /// Embedding vector; length always equals the configured dimension
    pub embedding: Vec<f32>,
    /// Free-form key/value annotations (user_id, session_id, model, ...)
    pub metadata: HashMap<String, String>,
    /// Coarse labels for secondary filtering
    pub tags: BTreeSet<String>,
    /// Assigned from the service clock at store time; strictly increasing
    /// per process
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a new record with a fresh id.
    ///
    /// `created_at` comes from the service's monotonic clock rather than a
    /// raw wall-clock read, so recency ordering holds under concurrent
    /// writers.
    pub fn new(
        content: String,
        embedding: Vec<f32>,
        metadata: HashMap<String, String>,
        tags: BTreeSet<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            embedding,
            metadata,
            tags,
            created_at,
        }
    }
}
