//! Vector similarity index
//!
//! Candidate generation for semantic search. The index holds only record
//! ids, embeddings, and timestamps; it is derived from the vault log and
//! rebuilt from it at startup, never a source of truth.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A scored candidate from a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f32,
}

/// Candidate generation strategy for semantic search.
///
/// The contract is exact regardless of the underlying search strategy:
/// results ordered by descending score, ties broken by earliest
/// `created_at` then id, no score below `threshold`, at most `limit`
/// entries. An approximate implementation may miss candidates (and must
/// document its recall bound) but may never violate the ordering contract.
///
/// Parameter validation (dimension, positive limit, threshold range)
/// happens in the service layer before the index is consulted.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn insert(&self, id: Uuid, embedding: Vec<f32>, created_at: DateTime<Utc>);

    async fn search(&self, query: &[f32], limit: usize, threshold: f32) -> Vec<ScoredId>;

    async fn len(&self) -> usize;
}

/// Exact search: score every entry, sort, truncate.
///
/// Linear in the number of records, which is the correctness-first
/// baseline; swap in an approximate index behind [`VectorSearch`] when
/// scale demands it.
#[derive(Default)]
pub struct LinearScanIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

struct IndexEntry {
    id: Uuid,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
}

impl LinearScanIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorSearch for LinearScanIndex {
    async fn insert(&self, id: Uuid, embedding: Vec<f32>, created_at: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries.push(IndexEntry {
            id,
            embedding,
            created_at,
        });
    }

    async fn search(&self, query: &[f32], limit: usize, threshold: f32) -> Vec<ScoredId> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(ScoredId, DateTime<Utc>)> = entries
            .iter()
            .filter_map(|entry| {
                let score = cosine_similarity(query, &entry.embedding);
                (score >= threshold).then_some((
                    ScoredId {
                        id: entry.id,
                        score,
                    },
                    entry.created_at,
                ))
            })
            .collect();

        scored.sort_by(|(a, a_created), (b, b_created)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a_created.cmp(b_created))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        scored.into_iter().map(|(hit, _)| hit).collect()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Cosine similarity in [-1.0, 1.0].
///
/// Mismatched lengths and zero-magnitude vectors score 0.0 rather than
/// panicking; the service validates dimensions before searching.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(offset_secs)
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_score_descending() {
        let index = LinearScanIndex::new();
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        index.insert(far, vec![0.2, 1.0, 0.0], ts(0)).await;
        index.insert(near, vec![1.0, 0.1, 0.0], ts(1)).await;

        let hits = index.search(&[1.0, 0.0, 0.0], 10, -1.0).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, near);
        assert_eq!(hits[1].id, far);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_applies_threshold() {
        let index = LinearScanIndex::new();
        index.insert(Uuid::new_v4(), vec![1.0, 0.0, 0.0], ts(0)).await;
        index.insert(Uuid::new_v4(), vec![0.0, 1.0, 0.0], ts(1)).await;

        let hits = index.search(&[1.0, 0.0, 0.0], 10, 0.5).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score >= 0.5);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let index = LinearScanIndex::new();
        for i in 0..5 {
            index.insert(Uuid::new_v4(), vec![1.0, 0.0, 0.0], ts(i)).await;
        }

        let hits = index.search(&[1.0, 0.0, 0.0], 3, -1.0).await;
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_ties_break_by_earliest_created_at() {
        let index = LinearScanIndex::new();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        // Same embedding, so identical scores
        index.insert(newer, vec![1.0, 0.0], ts(10)).await;
        index.insert(older, vec![1.0, 0.0], ts(0)).await;

        let hits = index.search(&[1.0, 0.0], 10, 0.0).await;
        assert_eq!(hits[0].id, older);
        assert_eq!(hits[1].id, newer);
    }

    #[tokio::test]
    async fn test_search_empty_index_returns_nothing() {
        let index = LinearScanIndex::new();
        assert!(index.search(&[1.0, 0.0], 5, -1.0).await.is_empty());
    }
}
