//! Memory service orchestration
//!
//! Ties the vault and the three derived indexes together behind the
//! Store / Search / Recent / Get operations. Every request validates its
//! input before any mutation; the vault commit precedes all index
//! publication, so a reader can never observe an index entry whose record
//! is not durably retrievable.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::VaultKey;
use crate::error::{MemvaultError, Result};
use crate::index::{LinearScanIndex, MetadataCatalog, MetadataFilter, RecencyLedger, ScoredId, VectorSearch};
use crate::memory::{MemoryRecord, MonotonicClock};
use crate::vault::VaultStore;

/// Candidate over-fetch factor when a metadata filter will thin the
/// result set before the limit is applied.
const FILTERED_CANDIDATE_MULTIPLIER: usize = 3;

/// A search result: the hydrated record plus its similarity score.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub record: MemoryRecord,
    pub similarity_score: f32,
}

/// Component record counts, for the stats endpoint and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceStats {
    /// Records in the vault log
    pub total_records: u64,
    /// Embeddings in the vector index
    pub indexed_vectors: u64,
    /// Records in the metadata catalog
    pub cataloged_records: u64,
    /// Entries in the recency ledger
    pub ledger_entries: u64,
}

/// The memory service core. One instance per process; shared across
/// request handlers behind an `Arc`.
pub struct MemoryService {
    dimension: usize,
    vault: Arc<VaultStore>,
    vector: Arc<dyn VectorSearch>,
    catalog: Arc<MetadataCatalog>,
    ledger: Arc<RecencyLedger>,
    clock: MonotonicClock,
}

impl MemoryService {
    /// Open the vault at `vault_path` and rebuild the derived indexes from
    /// its log, using the exact linear-scan vector index.
    pub async fn open(vault_path: &Path, key: VaultKey, dimension: usize) -> Result<Self> {
        Self::open_with_index(vault_path, key, dimension, Arc::new(LinearScanIndex::new())).await
    }

    /// Open with a custom vector search strategy.
    pub async fn open_with_index(
        vault_path: &Path,
        key: VaultKey,
        dimension: usize,
        vector: Arc<dyn VectorSearch>,
    ) -> Result<Self> {
        let vault = Arc::new(VaultStore::open(vault_path, key, dimension).await?);
        let catalog = Arc::new(MetadataCatalog::new());
        let ledger = Arc::new(RecencyLedger::new());

        let records = vault.replay().await?;
        let count = records.len();
        let mut newest = DateTime::<Utc>::MIN_UTC;
        for record in records {
            newest = newest.max(record.created_at);
            vector
                .insert(record.id, record.embedding, record.created_at)
                .await;
            catalog.index(record.id, record.metadata, record.tags);
            ledger.append(record.id, record.created_at).await;
        }
        if count > 0 {
            tracing::info!("Rebuilt indexes from vault log: {count} records");
        }

        Ok(Self {
            dimension,
            vault,
            vector,
            catalog,
            ledger,
            // Seed past the newest stored record so timestamps stay
            // monotonic across restarts
            clock: MonotonicClock::starting_after(newest),
        })
    }

    /// Store a record. Returns the assigned id.
    ///
    /// Validation happens before any mutation. The vault write is durable
    /// before the derived indexes learn about the record, and index
    /// publication is infallible in-memory work, so a failure at any stage
    /// leaves no partial state behind.
    pub async fn store(
        &self,
        content: String,
        embedding: Vec<f32>,
        metadata: HashMap<String, String>,
        tags: Vec<String>,
    ) -> Result<Uuid> {
        if content.trim().is_empty() {
            return Err(MemvaultError::InvalidInput(
                "content cannot be empty".to_string(),
            ));
        }
        self.validate_vector("embedding", &embedding)?;

        let tags: BTreeSet<String> = tags.into_iter().collect();
        let record = MemoryRecord::new(content, embedding, metadata, tags, self.clock.now());
        let id = record.id;

        self.vault.put(&record).await?;

        // Publication runs on a detached task: an RPC cancelled between the
        // durable write and the index updates still converges to a fully
        // visible record instead of a half-indexed one.
        let vector = Arc::clone(&self.vector);
        let catalog = Arc::clone(&self.catalog);
        let ledger = Arc::clone(&self.ledger);
        let publish = tokio::spawn(async move {
            let MemoryRecord {
                id,
                embedding,
                metadata,
                tags,
                created_at,
                ..
            } = record;
            vector.insert(id, embedding, created_at).await;
            catalog.index(id, metadata, tags);
            ledger.append(id, created_at).await;
        });
        publish.await.map_err(|e| {
            tracing::error!("index publication for {id} panicked: {e}");
            MemvaultError::Internal(format!("index publication failed: {e}"))
        })?;

        tracing::debug!("Stored memory {id}");
        Ok(id)
    }

    /// Semantic search: vector candidates, metadata post-filter, hydrate.
    ///
    /// Results keep the vector index ordering: score descending, ties by
    /// earliest creation. No score falls below `threshold` and no more
    /// than `limit` matches are returned.
    pub async fn search(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchMatch>> {
        self.validate_vector("query embedding", query)?;
        if limit == 0 {
            return Err(MemvaultError::InvalidInput(
                "limit must be positive".to_string(),
            ));
        }
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(MemvaultError::InvalidInput(format!(
                "similarity threshold {threshold} is outside [-1, 1]"
            )));
        }

        let fetch = if filter.is_empty() {
            limit
        } else {
            limit.saturating_mul(FILTERED_CANDIDATE_MULTIPLIER)
        };
        let candidates = self.vector.search(query, fetch, threshold).await;

        let survivors: Vec<ScoredId> = candidates
            .into_iter()
            .filter(|hit| self.catalog.matches(hit.id, filter))
            .take(limit)
            .collect();

        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = survivors.iter().map(|hit| hit.id).collect();
        let mut records = self.vault.get_many(&ids).await?;

        let mut matches = Vec::with_capacity(survivors.len());
        for hit in survivors {
            match records.remove(&hit.id) {
                Some(record) => matches.push(SearchMatch {
                    record,
                    similarity_score: hit.score,
                }),
                // Vault-before-index commit order makes this unreachable;
                // tolerate it rather than fail the whole search
                None => tracing::warn!("search hit {} missing from vault", hit.id),
            }
        }
        Ok(matches)
    }

    /// The most recently stored records, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        if limit == 0 {
            return Err(MemvaultError::InvalidInput(
                "limit must be positive".to_string(),
            ));
        }

        let ids = self.ledger.recent(limit).await;
        let mut records = self.vault.get_many(&ids).await?;
        Ok(ids.iter().filter_map(|id| records.remove(id)).collect())
    }

    /// Direct lookup by id.
    pub async fn get(&self, id: Uuid) -> Result<MemoryRecord> {
        self.vault.get(id).await
    }

    /// Component record counts.
    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            total_records: self.vault.len().await as u64,
            indexed_vectors: self.vector.len().await as u64,
            cataloged_records: self.catalog.len() as u64,
            ledger_entries: self.ledger.len().await as u64,
        }
    }

    /// The service-wide embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn validate_vector(&self, label: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemvaultError::InvalidInput(format!(
                "{label} has {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MemvaultError::InvalidInput(format!(
                "{label} contains non-finite values"
            )));
        }
        Ok(())
    }
}
