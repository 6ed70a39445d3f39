//! Scenario tests for the data provider
//!
//! These exercise the provider against a real snapshot directory. End-to-end
//! tests through the public API live in the top-level tests directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::app::models::{DatasetRef, Entity, EntityType};
use crate::errors::ProviderError;

use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AdverseEvent {
    subject: String,
    term: String,
}

impl Entity for AdverseEvent {
    const NAME: &'static str = "adverse-events";
    const VERSION: u32 = 1;
}

type LoaderFuture = BoxFuture<'static, anyhow::Result<Vec<AdverseEvent>>>;

fn events_for(dataset: &DatasetRef) -> Vec<AdverseEvent> {
    ["A", "B", "C"]
        .iter()
        .map(|subject| AdverseEvent {
            subject: format!("{}-{}", dataset.id, subject),
            term: "nausea".to_string(),
        })
        .collect()
}

/// Loader that counts its invocations and optionally takes `delay` to answer
fn counting_loader(
    calls: Arc<AtomicUsize>,
    delay: Duration,
) -> impl Fn(&DatasetRef) -> LoaderFuture + Clone + Send + Sync + 'static {
    move |dataset: &DatasetRef| {
        calls.fetch_add(1, Ordering::SeqCst);
        let records = events_for(dataset);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(records)
        }
        .boxed()
    }
}

async fn create_test_provider(temp_dir: &TempDir, config: ProviderConfig) -> Arc<DataProvider> {
    Arc::new(DataProvider::open(temp_dir.path(), config).await.unwrap())
}

fn ae() -> EntityType {
    AdverseEvent::entity_type()
}

fn snapshot_files_in(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_first_call_loads_and_writes_one_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    let events = provider
        .get_data(&ae(), &dataset, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();

    assert_eq!(*events, events_for(&dataset));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot_files_in(&temp_dir.path().join("study").join("D1")), 1);
    assert!(provider
        .store()
        .exists(&provider.store().path_for(&ae(), &dataset).unwrap())
        .await);
}

#[tokio::test]
async fn test_second_call_is_served_from_memory() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    let first = provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    let second = provider.get_data(&ae(), &dataset, loader).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    let stats = provider.stats();
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.disk_reads, 1);
    assert_eq!(stats.known_datasets, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_invoke_loader_once() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let provider = Arc::clone(&provider);
            let dataset = dataset.clone();
            let loader = counting_loader(calls.clone(), Duration::from_millis(100));
            tokio::spawn(async move { provider.get_data(&ae(), &dataset, loader).await })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let events = result.unwrap().unwrap();
        assert_eq!(events.len(), 3);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_dataset_does_not_delay_another() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let slow = {
        let provider = Arc::clone(&provider);
        let loader = counting_loader(calls.clone(), Duration::from_millis(500));
        tokio::spawn(async move {
            provider
                .get_data(&ae(), &DatasetRef::new("study", "SLOW"), loader)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    provider
        .get_data(
            &ae(),
            &DatasetRef::new("study", "FAST"),
            counting_loader(calls.clone(), Duration::ZERO),
        )
        .await
        .unwrap();
    assert!(start.elapsed() < Duration::from_millis(250));

    slow.await.unwrap().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_then_get_reloads_once() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    let removed = provider.invalidate_all().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(provider.memory().len(), 0);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    provider.get_data(&ae(), &dataset, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidate_all_waits_for_in_flight_load() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    let load = {
        let provider = Arc::clone(&provider);
        let dataset = dataset.clone();
        let loader = counting_loader(calls.clone(), Duration::from_millis(200));
        tokio::spawn(async move { provider.get_data(&ae(), &dataset, loader).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // the in-flight load finishes before the clear starts, so nothing survives it
    provider.invalidate_all().await.unwrap();
    load.await.unwrap().unwrap();

    let path = provider.store().path_for(&ae(), &dataset).unwrap();
    assert!(!provider.store().exists(&path).await);
    assert_eq!(provider.memory().resident_count(), 0);
}

#[tokio::test]
async fn test_invalidate_dataset_then_get_reloads_once() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    assert_eq!(provider.invalidate_dataset(&dataset).await.unwrap(), 1);
    assert_eq!(provider.memory().resident_count(), 0);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    provider.get_data(&ae(), &dataset, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidate_dataset_waits_for_in_flight_load() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    let load = {
        let provider = Arc::clone(&provider);
        let dataset = dataset.clone();
        let loader = counting_loader(calls.clone(), Duration::from_millis(200));
        tokio::spawn(async move { provider.get_data(&ae(), &dataset, loader).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // the clear runs only after the load has written its snapshot
    let removed = provider.invalidate_dataset(&dataset).await.unwrap();
    let events = load.await.unwrap().unwrap();

    assert_eq!(removed, 1);
    assert_eq!(*events, events_for(&dataset));
    let path = provider.store().path_for(&ae(), &dataset).unwrap();
    assert!(!provider.store().exists(&path).await);
    assert_eq!(provider.memory().resident_count(), 0);
}

#[tokio::test]
async fn test_failed_clear_still_drops_memory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("snapshots");
    let provider = DataProvider::open(&root, ProviderConfig::default())
        .await
        .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    provider
        .get_data(&ae(), &dataset, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(provider.memory().resident_count(), 1);

    // a file where the root directory was makes listing the root fail
    std::fs::remove_dir_all(&root).unwrap();
    std::fs::write(&root, b"not a directory").unwrap();

    let err = provider.invalidate_all().await.unwrap_err();
    assert!(matches!(err, ProviderError::Invalidation { .. }));
    assert_eq!(provider.memory().resident_count(), 0);
}

#[tokio::test]
async fn test_loader_may_read_another_entity_of_same_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let config = ProviderConfig::default().with_lock_timeout(Duration::from_millis(100));
    let provider = create_test_provider(&temp_dir, config).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let subjects = EntityType::new("affected-subjects", 1);

    let loader = {
        let provider = Arc::clone(&provider);
        let calls = calls.clone();
        move |d: &DatasetRef| {
            let provider = Arc::clone(&provider);
            let loader = counting_loader(calls.clone(), Duration::ZERO);
            let d = d.clone();
            async move {
                let events = provider.get_data(&ae(), &d, loader).await?;
                Ok::<_, anyhow::Error>(
                    events
                        .iter()
                        .map(|event| event.subject.clone())
                        .collect::<Vec<String>>(),
                )
            }
        }
    };

    let affected = tokio::time::timeout(
        Duration::from_secs(3),
        provider.get_data(&subjects, &dataset, loader),
    )
    .await
    .expect("nested load of the same dataset completes")
    .unwrap();

    assert_eq!(affected.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stats().lock_timeouts, 0);
    assert_eq!(snapshot_files_in(&temp_dir.path().join("study").join("D1")), 2);

    // the nested collection went through the normal tiers
    let events = provider
        .get_data(&ae(), &dataset, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(*events, events_for(&dataset));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nested_load_is_not_blocked_by_queued_invalidation() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let subjects = EntityType::new("affected-subjects", 1);

    let outer = {
        let provider = Arc::clone(&provider);
        let dataset = dataset.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            let loader = {
                let provider = Arc::clone(&provider);
                move |d: &DatasetRef| {
                    let provider = Arc::clone(&provider);
                    let loader = counting_loader(calls.clone(), Duration::ZERO);
                    let d = d.clone();
                    async move {
                        // give the invalidation time to queue on the global lock
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        let events = provider.get_data(&ae(), &d, loader).await?;
                        Ok::<_, anyhow::Error>(
                            events
                                .iter()
                                .map(|event| event.subject.clone())
                                .collect::<Vec<String>>(),
                        )
                    }
                }
            };
            provider.get_data(&subjects, &dataset, loader).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let invalidation = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.invalidate_all().await })
    };

    let affected = tokio::time::timeout(Duration::from_secs(3), outer)
        .await
        .expect("nested load completes while an invalidation is queued")
        .unwrap()
        .unwrap();
    assert_eq!(affected.len(), 3);

    assert_eq!(invalidation.await.unwrap().unwrap(), 2);
    assert_eq!(provider.memory().resident_count(), 0);
}

#[tokio::test]
async fn test_invalidate_namespace_spares_other_namespaces() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = counting_loader(calls.clone(), Duration::ZERO);
    let study = DatasetRef::new("study", "D1");
    let pooled = DatasetRef::new("pooled", "D1");

    provider.get_data(&ae(), &study, loader.clone()).await.unwrap();
    provider.get_data(&ae(), &pooled, loader.clone()).await.unwrap();

    assert_eq!(provider.invalidate_namespace("study").await.unwrap(), 1);

    provider.get_data(&ae(), &pooled, loader.clone()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    provider.get_data(&ae(), &study, loader).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert!(provider.invalidate_namespace("..").await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidate_dataset_leaves_other_datasets_running() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let d1 = DatasetRef::new("study", "D1");
    let d2 = DatasetRef::new("study", "D2");

    provider
        .get_data(&ae(), &d1, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();

    let slow = {
        let provider = Arc::clone(&provider);
        let d2 = d2.clone();
        let loader = counting_loader(calls.clone(), Duration::from_millis(400));
        tokio::spawn(async move { provider.get_data(&ae(), &d2, loader).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    assert_eq!(provider.invalidate_dataset(&d1).await.unwrap(), 1);
    assert!(start.elapsed() < Duration::from_millis(200));
    assert!(!slow.is_finished());

    slow.await.unwrap().unwrap();
    let d2_path = provider.store().path_for(&ae(), &d2).unwrap();
    assert!(provider.store().exists(&d2_path).await);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_regenerated() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    let path = provider.store().path_for(&ae(), &dataset).unwrap();
    std::fs::write(&path, b"\xde\xad\xbe\xef not a snapshot").unwrap();
    provider.memory().reclaim_all();

    let events = provider.get_data(&ae(), &dataset, loader).await.unwrap();

    assert_eq!(*events, events_for(&dataset));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(provider.stats().corruption_recoveries, 1);
    let reread: Vec<AdverseEvent> = provider.store().read(&path, &ae(), &dataset).await.unwrap();
    assert_eq!(reread, events_for(&dataset));
}

#[tokio::test]
async fn test_version_bump_uses_new_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    let v1_path = provider.store().path_for(&ae(), &dataset).unwrap();
    let v1_bytes = std::fs::read(&v1_path).unwrap();

    let v2 = ae().with_version(2);
    provider.get_data(&v2, &dataset, loader).await.unwrap();
    let v2_path = provider.store().path_for(&v2, &dataset).unwrap();

    assert_ne!(v1_path, v2_path);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read(&v1_path).unwrap(), v1_bytes);
    assert!(provider.store().exists(&v2_path).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lock_timeout_is_retried_transparently() {
    let temp_dir = TempDir::new().unwrap();
    let config = ProviderConfig::default().with_lock_timeout(Duration::from_millis(30));
    let provider = create_test_provider(&temp_dir, config).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");

    let holder = {
        let provider = Arc::clone(&provider);
        let dataset = dataset.clone();
        let loader = counting_loader(calls.clone(), Duration::from_millis(200));
        tokio::spawn(async move { provider.get_data(&ae(), &dataset, loader).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiter = provider
        .get_data(&ae(), &dataset, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();

    let held = holder.await.unwrap().unwrap();
    assert_eq!(*waiter, *held);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(provider.stats().lock_timeouts >= 1);
}

#[tokio::test]
async fn test_reclaimed_memory_falls_back_to_disk() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = counting_loader(calls.clone(), Duration::ZERO);

    provider.get_data(&ae(), &dataset, loader.clone()).await.unwrap();
    assert_eq!(provider.memory().reclaim_all(), 1);

    let events = provider.get_data(&ae(), &dataset, loader).await.unwrap();

    assert_eq!(*events, events_for(&dataset));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stats().disk_reads, 2);
}

#[tokio::test]
async fn test_empty_collection_is_read_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "EMPTY");
    let loader = {
        let calls = calls.clone();
        move |_: &DatasetRef| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(Vec::<AdverseEvent>::new()) }
        }
    };

    assert!(provider.get_data(&ae(), &dataset, &loader).await.unwrap().is_empty());
    assert!(provider.get_data(&ae(), &dataset, &loader).await.unwrap().is_empty());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.stats().disk_reads, 2);
    assert_eq!(provider.stats().memory_hits, 0);
}

#[tokio::test]
async fn test_unreadable_after_regeneration_is_fatal() {
    #[derive(Debug, Serialize, Deserialize)]
    struct OneWay {
        id: u32,
        // never written, always required on read
        #[serde(skip_serializing)]
        secret: String,
    }

    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let dataset = DatasetRef::new("study", "D1");
    let loader = {
        let calls = calls.clone();
        move |_: &DatasetRef| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Ok::<_, anyhow::Error>(vec![OneWay {
                    id: 1,
                    secret: "hidden".to_string(),
                }])
            }
        }
    };

    let err = provider
        .get_data(&EntityType::new("one-way", 1), &dataset, loader)
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(err.is_fatal());
    match err {
        ProviderError::Fatal {
            dataset,
            entity_type,
            ..
        } => {
            assert_eq!(dataset, "study/D1");
            assert_eq!(entity_type, "one-way v1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unwritable_dataset_directory_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    std::fs::write(temp_dir.path().join("study"), b"a file where a directory belongs").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let err = provider
        .get_data(
            &ae(),
            &DatasetRef::new("study", "D1"),
            counting_loader(calls.clone(), Duration::ZERO),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Fatal { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_loader_error_passes_through_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let dataset = DatasetRef::new("study", "D1");

    let err = provider
        .get_data(&ae(), &dataset, |_| async {
            Err::<Vec<AdverseEvent>, _>(anyhow::anyhow!("warehouse unavailable"))
        })
        .await
        .unwrap_err();

    assert!(err.is_upstream());
    assert!(!err.is_fatal());
    assert_eq!(err.to_string(), "warehouse unavailable");
    let path = provider.store().path_for(&ae(), &dataset).unwrap();
    assert!(!provider.store().exists(&path).await);

    // a later request with a healthy loader succeeds
    let calls = Arc::new(AtomicUsize::new(0));
    provider
        .get_data(&ae(), &dataset, counting_loader(calls.clone(), Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_identifiers_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
    let calls = Arc::new(AtomicUsize::new(0));

    let err = provider
        .get_data(
            &ae(),
            &DatasetRef::new("study", "../escape"),
            counting_loader(calls.clone(), Duration::ZERO),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Store(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_typed_get_uses_entity_type() {
    tokio_test::block_on(async {
        let temp_dir = TempDir::new().unwrap();
        let provider = create_test_provider(&temp_dir, ProviderConfig::default()).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let dataset = DatasetRef::new("study", "D1");

        let events: Arc<Vec<AdverseEvent>> = provider
            .get(&dataset, counting_loader(calls.clone(), Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(events.len(), 3);
        let path = provider.store().path_for(&ae(), &dataset).unwrap();
        assert!(path.ends_with("adverse-events_v1_study_dataset_D1.snap"));
    });
}
