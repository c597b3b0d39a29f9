//! Integration tests for the memory service
//!
//! Covers the store/search/recent contracts end to end: validation before
//! mutation, ranking invariants, filter correctness, recency ordering,
//! index rebuild across restart, and store/search atomicity.

use std::collections::HashMap;
use std::sync::Arc;

use memvault_server::crypto::VaultKey;
use memvault_server::error::MemvaultError;
use memvault_server::index::MetadataFilter;
use memvault_server::service::MemoryService;
use memvault_server::testing::{hash_embedding, unit_embedding};
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

async fn create_test_service(dimension: usize) -> (MemoryService, VaultKey, TempDir) {
    let dir = tempdir().unwrap();
    let key = VaultKey::generate();
    let service = MemoryService::open(&dir.path().join("vault.log"), key.clone(), dimension)
        .await
        .unwrap();
    (service, key, dir)
}

fn no_filter() -> MetadataFilter {
    MetadataFilter::new()
}

mod store_tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_get_roundtrip() {
        let (service, _key, _dir) = create_test_service(8).await;

        let embedding = hash_embedding("roundtrip", 8);
        let id = service
            .store(
                "What is RAG?".to_string(),
                embedding.clone(),
                HashMap::from([("user_id".to_string(), "user_123".to_string())]),
                vec!["chat".to_string()],
            )
            .await
            .unwrap();

        let record = service.get(id).await.unwrap();
        assert_eq!(record.content, "What is RAG?");
        assert_eq!(record.embedding, embedding);
        assert_eq!(record.metadata["user_id"], "user_123");
        assert!(record.tags.contains("chat"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected_without_persisting() {
        // Service configured for dimension 4; caller sends 3 components
        let (service, _key, _dir) = create_test_service(4).await;

        let result = service
            .store(
                "wrong dimension".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::new(),
                Vec::new(),
            )
            .await;
        assert!(matches!(result, Err(MemvaultError::InvalidInput(_))));

        // Nothing was persisted anywhere
        let stats = service.stats().await;
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.indexed_vectors, 0);
        assert_eq!(stats.ledger_entries, 0);
        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(MemvaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let (service, _key, _dir) = create_test_service(4).await;

        let result = service
            .store("   ".to_string(), vec![0.0; 4], HashMap::new(), Vec::new())
            .await;
        assert!(matches!(result, Err(MemvaultError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_non_finite_embedding_is_rejected() {
        let (service, _key, _dir) = create_test_service(3).await;

        let result = service
            .store(
                "bad vector".to_string(),
                vec![1.0, f32::NAN, 0.0],
                HashMap::new(),
                Vec::new(),
            )
            .await;
        assert!(matches!(result, Err(MemvaultError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_duplicate_tags_collapse() {
        let (service, _key, _dir) = create_test_service(3).await;

        let id = service
            .store(
                "tagged".to_string(),
                unit_embedding(3, 0),
                HashMap::new(),
                vec!["chat".to_string(), "chat".to_string(), "rag".to_string()],
            )
            .await
            .unwrap();

        let record = service.get(id).await.unwrap();
        assert_eq!(record.tags.len(), 2);
    }
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_exact_match_scores_near_one() {
        let (service, _key, _dir) = create_test_service(3).await;

        service
            .store(
                "the only record".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::new(),
                Vec::new(),
            )
            .await
            .unwrap();

        let matches = service
            .search(&[1.0, 0.0, 0.0], 5, 0.99, &no_filter())
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert!((matches[0].similarity_score - 1.0).abs() < 1e-5);
        assert_eq!(matches[0].record.content, "the only record");
    }

    #[tokio::test]
    async fn test_threshold_excludes_orthogonal_records() {
        let (service, _key, _dir) = create_test_service(3).await;

        let aligned = service
            .store(
                "aligned".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::new(),
                Vec::new(),
            )
            .await
            .unwrap();
        service
            .store(
                "orthogonal".to_string(),
                vec![0.0, 1.0, 0.0],
                HashMap::new(),
                Vec::new(),
            )
            .await
            .unwrap();

        let matches = service
            .search(&[1.0, 0.0, 0.0], 10, 0.5, &no_filter())
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.id, aligned);
    }

    #[tokio::test]
    async fn test_results_are_ordered_and_bounded() {
        let (service, _key, _dir) = create_test_service(2).await;

        // Angles fanning away from the x axis give distinct scores
        for i in 0..6 {
            let angle = (i as f32) * 0.2;
            service
                .store(
                    format!("record {i}"),
                    vec![angle.cos(), angle.sin()],
                    HashMap::new(),
                    Vec::new(),
                )
                .await
                .unwrap();
        }

        let limit = 4;
        let threshold = 0.6;
        let matches = service
            .search(&[1.0, 0.0], limit, threshold, &no_filter())
            .await
            .unwrap();

        assert!(matches.len() <= limit);
        assert!(!matches.is_empty());
        for window in matches.windows(2) {
            assert!(window[0].similarity_score >= window[1].similarity_score);
        }
        for m in &matches {
            assert!(m.similarity_score >= threshold);
        }
    }

    #[tokio::test]
    async fn test_metadata_filter_restricts_results() {
        let (service, _key, _dir) = create_test_service(3).await;

        let alice = service
            .store(
                "alice's memory".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::from([("user_id".to_string(), "alice".to_string())]),
                Vec::new(),
            )
            .await
            .unwrap();
        service
            .store(
                "bob's memory".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::from([("user_id".to_string(), "bob".to_string())]),
                Vec::new(),
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().with("user_id", "alice");
        let matches = service
            .search(&[1.0, 0.0, 0.0], 10, 0.5, &filter)
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.id, alice);
        assert_eq!(matches[0].record.metadata["user_id"], "alice");
    }

    #[tokio::test]
    async fn test_tag_filter_restricts_results() {
        let (service, _key, _dir) = create_test_service(3).await;

        let tagged = service
            .store(
                "technical note".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::new(),
                vec!["technical".to_string()],
            )
            .await
            .unwrap();
        service
            .store(
                "small talk".to_string(),
                vec![1.0, 0.0, 0.0],
                HashMap::new(),
                vec!["casual".to_string()],
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().with_tag("technical");
        let matches = service
            .search(&[1.0, 0.0, 0.0], 10, 0.5, &filter)
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.id, tagged);
    }

    #[tokio::test]
    async fn test_filtered_search_still_fills_the_limit() {
        let (service, _key, _dir) = create_test_service(2).await;

        // Interleave wanted and unwanted records at similar scores so a
        // naive limit-then-filter pass would come up short
        for i in 0..4 {
            let user = if i % 2 == 0 { "alice" } else { "bob" };
            let angle = (i as f32) * 0.05;
            service
                .store(
                    format!("record {i}"),
                    vec![angle.cos(), angle.sin()],
                    HashMap::from([("user_id".to_string(), user.to_string())]),
                    Vec::new(),
                )
                .await
                .unwrap();
        }

        let filter = MetadataFilter::new().with("user_id", "alice");
        let matches = service.search(&[1.0, 0.0], 2, 0.0, &filter).await.unwrap();

        assert_eq!(matches.len(), 2);
        for m in &matches {
            assert_eq!(m.record.metadata["user_id"], "alice");
        }
    }

    #[tokio::test]
    async fn test_invalid_search_parameters() {
        let (service, _key, _dir) = create_test_service(3).await;

        // Query dimension mismatch
        assert!(matches!(
            service.search(&[1.0, 0.0], 5, 0.5, &no_filter()).await,
            Err(MemvaultError::InvalidInput(_))
        ));
        // Non-positive limit
        assert!(matches!(
            service
                .search(&[1.0, 0.0, 0.0], 0, 0.5, &no_filter())
                .await,
            Err(MemvaultError::InvalidInput(_))
        ));
        // Threshold outside [-1, 1]
        assert!(matches!(
            service
                .search(&[1.0, 0.0, 0.0], 5, 1.5, &no_filter())
                .await,
            Err(MemvaultError::InvalidInput(_))
        ));
        // Non-finite threshold
        assert!(matches!(
            service
                .search(&[1.0, 0.0, 0.0], 5, f32::NAN, &no_filter())
                .await,
            Err(MemvaultError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_search_empty_service_returns_nothing() {
        let (service, _key, _dir) = create_test_service(3).await;

        let matches = service
            .search(&[1.0, 0.0, 0.0], 5, 0.0, &no_filter())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}

mod recency_tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let (service, _key, _dir) = create_test_service(3).await;

        let mut ids = Vec::new();
        for i in 0..3 {
            let id = service
                .store(
                    format!("memory {i}"),
                    unit_embedding(3, i % 3),
                    HashMap::new(),
                    Vec::new(),
                )
                .await
                .unwrap();
            ids.push(id);
        }

        let recent = service.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, ids[2]);
        assert_eq!(recent[1].id, ids[1]);
        assert!(recent[0].created_at > recent[1].created_at);
    }

    #[tokio::test]
    async fn test_recent_limit_bounds_result() {
        let (service, _key, _dir) = create_test_service(3).await;

        for i in 0..5 {
            service
                .store(
                    format!("memory {i}"),
                    unit_embedding(3, 0),
                    HashMap::new(),
                    Vec::new(),
                )
                .await
                .unwrap();
        }

        assert_eq!(service.recent(3).await.unwrap().len(), 3);
        assert_eq!(service.recent(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_recent_rejects_zero_limit() {
        let (service, _key, _dir) = create_test_service(3).await;
        assert!(matches!(
            service.recent(0).await,
            Err(MemvaultError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let (service, _key, _dir) = create_test_service(3).await;

        for i in 0..10 {
            service
                .store(
                    format!("memory {i}"),
                    unit_embedding(3, 0),
                    HashMap::new(),
                    Vec::new(),
                )
                .await
                .unwrap();
        }

        let recent = service.recent(10).await.unwrap();
        for window in recent.windows(2) {
            assert!(window[0].created_at > window[1].created_at);
        }
    }
}

mod restart_tests {
    use super::*;

    #[tokio::test]
    async fn test_indexes_rebuild_from_vault_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.log");
        let key = VaultKey::generate();

        let stored = {
            let service = MemoryService::open(&path, key.clone(), 3).await.unwrap();
            service
                .store(
                    "survives restart".to_string(),
                    vec![1.0, 0.0, 0.0],
                    HashMap::from([("user_id".to_string(), "alice".to_string())]),
                    vec!["durable".to_string()],
                )
                .await
                .unwrap()
        };

        let service = MemoryService::open(&path, key, 3).await.unwrap();

        let stats = service.stats().await;
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.indexed_vectors, 1);
        assert_eq!(stats.cataloged_records, 1);
        assert_eq!(stats.ledger_entries, 1);

        // Search works against the rebuilt indexes, filters included
        let filter = MetadataFilter::new()
            .with("user_id", "alice")
            .with_tag("durable");
        let matches = service
            .search(&[1.0, 0.0, 0.0], 5, 0.9, &filter)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.id, stored);
    }

    #[tokio::test]
    async fn test_clock_stays_monotonic_across_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.log");
        let key = VaultKey::generate();

        let before = {
            let service = MemoryService::open(&path, key.clone(), 3).await.unwrap();
            let id = service
                .store(
                    "first life".to_string(),
                    unit_embedding(3, 0),
                    HashMap::new(),
                    Vec::new(),
                )
                .await
                .unwrap();
            service.get(id).await.unwrap().created_at
        };

        let service = MemoryService::open(&path, key, 3).await.unwrap();
        let id = service
            .store(
                "second life".to_string(),
                unit_embedding(3, 1),
                HashMap::new(),
                Vec::new(),
            )
            .await
            .unwrap();

        let after = service.get(id).await.unwrap().created_at;
        assert!(after > before);

        let recent = service.recent(2).await.unwrap();
        assert_eq!(recent[0].content, "second life");
        assert_eq!(recent[1].content, "first life");
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_search_results_are_always_retrievable() {
        let (service, _key, _dir) = create_test_service(4).await;
        let service = Arc::new(service);

        let mut writers = Vec::new();
        for w in 0..4 {
            let service = Arc::clone(&service);
            writers.push(tokio::spawn(async move {
                for i in 0..25 {
                    service
                        .store(
                            format!("writer {w} record {i}"),
                            hash_embedding(&format!("{w}-{i}"), 4),
                            HashMap::new(),
                            Vec::new(),
                        )
                        .await
                        .unwrap();
                }
            }));
        }

        let mut searchers = Vec::new();
        for s in 0..4 {
            let service = Arc::clone(&service);
            searchers.push(tokio::spawn(async move {
                let query = hash_embedding(&format!("query {s}"), 4);
                for _ in 0..25 {
                    let matches = service.search(&query, 50, -1.0, &no_filter()).await.unwrap();
                    // Any id surfaced by search must be durably retrievable
                    for m in &matches {
                        service.get(m.record.id).await.unwrap();
                    }
                }
            }));
        }

        for handle in writers.into_iter().chain(searchers) {
            handle.await.unwrap();
        }

        let stats = service.stats().await;
        assert_eq!(stats.total_records, 100);
        assert_eq!(stats.indexed_vectors, 100);
        assert_eq!(stats.ledger_entries, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores_keep_recency_ordered() {
        let (service, _key, _dir) = create_test_service(4).await;
        let service = Arc::new(service);

        let mut writers = Vec::new();
        for w in 0..8 {
            let service = Arc::clone(&service);
            writers.push(tokio::spawn(async move {
                for i in 0..10 {
                    service
                        .store(
                            format!("w{w} r{i}"),
                            hash_embedding(&format!("{w}/{i}"), 4),
                            HashMap::new(),
                            Vec::new(),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in writers {
            handle.await.unwrap();
        }

        let recent = service.recent(80).await.unwrap();
        assert_eq!(recent.len(), 80);
        for window in recent.windows(2) {
            assert!(window[0].created_at >= window[1].created_at);
        }
    }
}
