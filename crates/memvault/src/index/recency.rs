//! Chronological index of record ids
//!
//! Append-mostly time-ordered list backing GetRecentMemories. Timestamps
//! come from the service's monotonic clock, but two concurrent store
//! commits can still publish out of allocation order; a late arrival is
//! inserted at its sorted position so `recent` never yields out-of-order
//! timestamps.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    id: Uuid,
    created_at: DateTime<Utc>,
}

/// Ordered index of record ids by creation time.
#[derive(Default)]
pub struct RecencyLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl RecencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly committed id.
    pub async fn append(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        let entry = LedgerEntry { id, created_at };

        match entries.last() {
            Some(last) if last.created_at > created_at => {
                // Raced by a concurrent writer: insert at sorted position
                let pos = entries.partition_point(|e| e.created_at <= created_at);
                entries.insert(pos, entry);
            }
            _ => entries.push(entry),
        }
    }

    /// The most recent `limit` ids, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Uuid> {
        let entries = self.entries.read().await;
        entries.iter().rev().take(limit).map(|e| e.id).collect()
    }

    /// Number of ledger entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
