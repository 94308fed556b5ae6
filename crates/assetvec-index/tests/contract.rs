//! Contract tests shared by every locally runnable backend.
//!
//! Each backend gets the same suite through the `VectorIndex` trait:
//! in-process and flat directly, sqlite-vec against a temp database file.
//!
//! ```bash
//! cargo test --package assetvec-index --test contract
//! ```

use assetvec_config::{FlatSettings, SqliteSettings};
use assetvec_index::{
    FlatIndex, IndexError, InProcessIndex, SqliteVecIndex, VectorIndex,
};
use tempfile::TempDir;

/// Dimension used by every contract test
const DIM: usize = 3;

async fn in_process(_dir: &TempDir) -> Box<dyn VectorIndex> {
    Box::new(InProcessIndex::new(DIM))
}

async fn flat(dir: &TempDir) -> Box<dyn VectorIndex> {
    let settings = FlatSettings {
        directory: dir.path().join("flat"),
        file_prefix: "project".to_string(),
    };
    Box::new(FlatIndex::new(&settings, DIM))
}

async fn sqlite_vec(dir: &TempDir) -> Box<dyn VectorIndex> {
    let settings = SqliteSettings {
        path: dir.path().join("vectors.db"),
        collection_prefix: "project".to_string(),
    };
    Box::new(
        SqliteVecIndex::open(&settings, DIM)
            .await
            .expect("Failed to open sqlite-vec database"),
    )
}

macro_rules! contract_suite {
    ($name:ident, $factory:ident) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn add_then_search_returns_asset_first() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[0.2, 0.4, 0.1]).await.unwrap();
                index.add_or_update("p1", "b", &[0.9, 0.0, 0.3]).await.unwrap();

                let hits = index.search("p1", &[0.2, 0.4, 0.1], 2).await.unwrap();
                assert_eq!(hits.first().map(String::as_str), Some("a"));
            }

            #[tokio::test]
            async fn removed_asset_never_returned() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "b", &[0.0, 1.0, 0.0]).await.unwrap();
                index.remove("p1", "a").await.unwrap();

                let hits = index.search("p1", &[1.0, 0.0, 0.0], 10).await.unwrap();
                assert_eq!(hits, vec!["b"]);

                // Second remove is a no-op
                index.remove("p1", "a").await.unwrap();
            }

            #[tokio::test]
            async fn last_write_wins() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "b", &[0.0, 0.0, 1.0]).await.unwrap();
                index.add_or_update("p1", "a", &[0.0, 1.0, 0.0]).await.unwrap();

                let hits = index.search("p1", &[0.0, 1.0, 0.0], 1).await.unwrap();
                assert_eq!(hits, vec!["a"]);

                let all = index.search("p1", &[0.0, 1.0, 0.0], 10).await.unwrap();
                assert_eq!(all.len(), 2);
            }

            #[tokio::test]
            async fn top_n_is_clamped_to_stored_count() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "b", &[0.0, 1.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "c", &[0.0, 0.0, 1.0]).await.unwrap();

                let hits = index.search("p1", &[1.0, 1.0, 1.0], 50).await.unwrap();
                assert_eq!(hits.len(), 3);
            }

            #[tokio::test]
            async fn unknown_project_is_empty() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                let hits = index.search("never-written", &[1.0, 0.0, 0.0], 5).await.unwrap();
                assert!(hits.is_empty());
                index.remove("never-written", "a").await.unwrap();
            }

            #[tokio::test]
            async fn trivial_searches_are_empty() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;
                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();

                assert!(index.search("p1", &[], 5).await.unwrap().is_empty());
                assert!(index.search("p1", &[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn nearest_first_scenario() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "b", &[0.0, 1.0, 0.0]).await.unwrap();
                index.add_or_update("p1", "c", &[0.9, 0.1, 0.0]).await.unwrap();

                let hits = index.search("p1", &[1.0, 0.0, 0.0], 2).await.unwrap();
                assert_eq!(hits, vec!["a", "c"]);
            }

            #[tokio::test]
            async fn dimension_mismatch_leaves_entries() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();

                let err = index.add_or_update("p1", "a", &[1.0, 2.0]).await.unwrap_err();
                assert!(matches!(
                    err,
                    IndexError::DimensionMismatch { expected: 3, actual: 2 }
                ));

                let err = index.search("p1", &[1.0, 2.0], 5).await.unwrap_err();
                assert!(matches!(err, IndexError::DimensionMismatch { .. }));

                let hits = index.search("p1", &[1.0, 0.0, 0.0], 5).await.unwrap();
                assert_eq!(hits, vec!["a"]);
            }

            #[tokio::test]
            async fn empty_ids_rejected() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                assert!(matches!(
                    index.add_or_update("", "a", &[1.0, 0.0, 0.0]).await,
                    Err(IndexError::InvalidArgument(_))
                ));
                assert!(matches!(
                    index.add_or_update("p1", "", &[1.0, 0.0, 0.0]).await,
                    Err(IndexError::InvalidArgument(_))
                ));
                assert!(matches!(
                    index.remove("p1", "").await,
                    Err(IndexError::InvalidArgument(_))
                ));
            }

            #[tokio::test]
            async fn projects_are_isolated() {
                let dir = TempDir::new().unwrap();
                let index = $factory(&dir).await;

                index.add_or_update("brand-a", "x", &[1.0, 0.0, 0.0]).await.unwrap();
                index.add_or_update("brand-b", "y", &[1.0, 0.0, 0.0]).await.unwrap();

                assert_eq!(
                    index.search("brand-a", &[1.0, 0.0, 0.0], 5).await.unwrap(),
                    vec!["x"]
                );
                assert_eq!(
                    index.search("brand-b", &[1.0, 0.0, 0.0], 5).await.unwrap(),
                    vec!["y"]
                );
            }

            #[tokio::test]
            async fn concurrent_writes_to_distinct_assets() {
                let dir = TempDir::new().unwrap();
                let index = std::sync::Arc::new($factory(&dir).await);

                let mut handles = Vec::new();
                for i in 0..8 {
                    let index = std::sync::Arc::clone(&index);
                    handles.push(tokio::spawn(async move {
                        index
                            .add_or_update("p1", &format!("asset-{}", i), &[i as f32, 1.0, 0.0])
                            .await
                    }));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }

                let hits = index.search("p1", &[0.0, 1.0, 0.0], 20).await.unwrap();
                assert_eq!(hits.len(), 8);
                assert_eq!(hits[0], "asset-0");
            }
        }
    };
}

contract_suite!(in_process_contract, in_process);
contract_suite!(flat_contract, flat);
contract_suite!(sqlite_vec_contract, sqlite_vec);

#[tokio::test]
async fn flat_label_invariants_after_repeated_writes() {
    let dir = TempDir::new().unwrap();
    let settings = FlatSettings {
        directory: dir.path().join("flat"),
        file_prefix: "project".to_string(),
    };
    let index = FlatIndex::new(&settings, DIM);

    const WRITES: u64 = 7;
    for i in 0..WRITES {
        index
            .add_or_update("p1", "hero", &[i as f32, 0.0, 1.0])
            .await
            .unwrap();
    }

    let mapping = index.mapping("p1").await.unwrap();
    assert!(mapping.next_label >= WRITES);
    assert_eq!(mapping.id_to_label.len(), 1);
    assert_eq!(mapping.label_to_id.len(), 1);
    let label = mapping.label_for("hero").unwrap();
    assert_eq!(mapping.asset_for(label), Some("hero"));
    assert_eq!(index.stored("p1").await.unwrap(), 1);
}

#[tokio::test]
async fn flat_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let settings = FlatSettings {
        directory: dir.path().join("flat"),
        file_prefix: "project".to_string(),
    };

    {
        let index = FlatIndex::new(&settings, DIM);
        index.add_or_update("p1", "a", &[1.0, 0.0, 0.0]).await.unwrap();
        index.add_or_update("p1", "a", &[0.0, 0.0, 1.0]).await.unwrap();
    }

    let index = FlatIndex::new(&settings, DIM);
    assert_eq!(index.search("p1", &[0.0, 0.0, 1.0], 5).await.unwrap(), vec!["a"]);

    index.add_or_update("p1", "b", &[0.0, 1.0, 0.0]).await.unwrap();
    let mapping = index.mapping("p1").await.unwrap();
    assert_eq!(mapping.label_for("b"), Some(2));
}
