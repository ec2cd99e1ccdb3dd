//! Integration tests for region downloads, expiry and eviction.

mod common;

use chrono::Duration as ChronoDuration;
use common::{region_request, FakeTileSource, Harness};
use std::time::Duration;
use offgrid_core::{OffgridError, RegionStatus, SearchOptions};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_download() {
    let harness = Harness::new(FakeTileSource::gated(4)).await;
    let regions = harness.session.regions().clone();

    let requests: Vec<_> = (0..8)
        .map(|_| {
            let regions = regions.clone();
            tokio::spawn(async move { regions.request_download(region_request("r1")).await })
        })
        .collect();
    let mut tasks = Vec::new();
    for request in requests {
        tasks.push(request.await.unwrap().unwrap());
    }

    let stats = regions.stats();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.coalesced, 7);

    harness.tiles.release_all();
    let mut finished = Vec::new();
    for task in tasks {
        finished.push(task.wait().await.unwrap());
    }

    assert!(finished.iter().all(|d| *d == finished[0]));
    assert_eq!(finished[0].status, RegionStatus::Ready);
    assert_eq!(harness.tiles.fetch_count(), 1);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_one() {
    let harness = Harness::new(FakeTileSource::open(5)).await;

    let mut seen = Vec::new();
    let descriptor = harness
        .session
        .regions()
        .download(region_request("r1"), |p| seen.push(p))
        .await
        .unwrap();

    assert_eq!(descriptor.status, RegionStatus::Ready);
    assert_eq!(descriptor.size_bytes, Some(5 * 4));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_ready_region_is_a_cache_hit() {
    let harness = Harness::new(FakeTileSource::open(2)).await;
    let regions = harness.session.regions();
    regions.download(region_request("r1"), |_| {}).await.unwrap();

    let task = regions.request_download(region_request("r1")).await.unwrap();
    assert!(task.is_finished());
    assert_eq!(task.progress(), 1.0);
    let descriptor = task.wait().await.unwrap();

    assert_eq!(descriptor.status, RegionStatus::Ready);
    assert_eq!(regions.stats().cache_hits, 1);
    assert_eq!(harness.tiles.fetch_count(), 1);
}

#[tokio::test]
async fn test_expires_at_is_completion_plus_ttl() {
    let harness = Harness::new(FakeTileSource::open(1)).await;
    let descriptor = harness
        .session
        .regions()
        .download(region_request("r1"), |_| {})
        .await
        .unwrap();

    assert_eq!(
        descriptor.expires_at,
        descriptor.created_at + ChronoDuration::hours(1)
    );
    assert!(descriptor.expires_at > descriptor.created_at);
}

#[tokio::test]
async fn test_sole_caller_cancel_marks_failed_and_allows_retry() {
    let harness = Harness::new(FakeTileSource::gated(3)).await;
    let regions = harness.session.regions();

    let task = regions.request_download(region_request("r1")).await.unwrap();
    let result = task.cancel().await;
    assert!(matches!(result, Err(OffgridError::RegionCancelled { .. })));

    let failed = regions.get("r1").unwrap().unwrap();
    assert_eq!(failed.status, RegionStatus::Failed);
    assert!(failed.last_error.is_some());

    let retry = regions.request_download(region_request("r1")).await.unwrap();
    let status = regions.get("r1").unwrap().unwrap().status;
    assert!(matches!(status, RegionStatus::Pending | RegionStatus::Downloading));

    harness.tiles.release_all();
    let ready = retry.wait().await.unwrap();
    assert_eq!(ready.status, RegionStatus::Ready);
    assert_eq!(regions.stats().started, 2);
}

#[tokio::test]
async fn test_cancel_with_other_callers_only_detaches() {
    let harness = Harness::new(FakeTileSource::gated(3)).await;
    let regions = harness.session.regions();

    let leaving = regions.request_download(region_request("r1")).await.unwrap();
    let staying = regions.request_download(region_request("r1")).await.unwrap();

    let result = leaving.cancel().await;
    assert!(matches!(result, Err(OffgridError::RegionCancelled { .. })));
    assert_ne!(
        regions.get("r1").unwrap().unwrap().status,
        RegionStatus::Failed
    );

    harness.tiles.release_all();
    let descriptor = staying.wait().await.unwrap();
    assert_eq!(descriptor.status, RegionStatus::Ready);
}

#[tokio::test]
async fn test_dropping_a_task_keeps_the_download_running() {
    let harness = Harness::new(FakeTileSource::gated(2)).await;
    let regions = harness.session.regions();

    drop(regions.request_download(region_request("r1")).await.unwrap());
    harness.tiles.release_all();

    let task = regions.request_download(region_request("r1")).await.unwrap();
    let descriptor = task.wait().await.unwrap();
    assert_eq!(descriptor.status, RegionStatus::Ready);
    assert_eq!(harness.tiles.fetch_count(), 1);
}

#[tokio::test]
async fn test_source_failure_is_recorded() {
    let harness = Harness::new(FakeTileSource::open(2)).await;
    harness.tiles.fail_with("tile server unreachable");

    let result = harness
        .session
        .regions()
        .download(region_request("r1"), |_| {})
        .await;
    match result {
        Err(OffgridError::DownloadFailed { region_id, message }) => {
            assert_eq!(region_id, "r1");
            assert!(message.contains("tile server unreachable"));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let descriptor = harness.session.regions().get("r1").unwrap().unwrap();
    assert_eq!(descriptor.status, RegionStatus::Failed);
    assert!(!harness.session.regions().is_live("r1").unwrap());
}

#[tokio::test]
async fn test_expired_region_is_hidden_without_a_sweep() {
    let harness = Harness::new(FakeTileSource::open(1)).await;
    harness.ready_region("r1").await;
    let regions = harness.session.regions();
    let index = harness.session.index();

    assert!(regions.is_live("r1").unwrap());
    assert_eq!(
        index.search("main", &SearchOptions::default()).unwrap().len(),
        2
    );

    harness.clock.advance(ChronoDuration::hours(2));

    assert!(!regions.is_live("r1").unwrap());
    assert!(regions.get("r1").unwrap().is_none());
    assert!(regions.list().unwrap().is_empty());
    assert!(index
        .search("main", &SearchOptions::default())
        .unwrap()
        .is_empty());
    // Still stored until the sweep runs.
    assert!(index.count_for_region("r1").unwrap() > 0);

    let swept = regions.sweep_expired_now().await.unwrap();
    assert_eq!(swept, vec!["r1".to_string()]);
    assert_eq!(index.count_for_region("r1").unwrap(), 0);
}

#[tokio::test]
async fn test_expired_region_is_downloaded_again() {
    let harness = Harness::new(FakeTileSource::open(1)).await;
    let regions = harness.session.regions();
    regions.download(region_request("r1"), |_| {}).await.unwrap();

    harness.clock.advance(ChronoDuration::hours(2));
    let descriptor = regions.download(region_request("r1"), |_| {}).await.unwrap();

    assert_eq!(descriptor.status, RegionStatus::Ready);
    assert_eq!(harness.tiles.fetch_count(), 2);
    assert!(regions.is_live("r1").unwrap());
}

#[tokio::test]
async fn test_evict_cascades_to_tiles_and_search_data() {
    let harness = Harness::new(FakeTileSource::open(2)).await;
    harness.ready_region("r1").await;
    harness.ready_region("r2").await;
    let regions = harness.session.regions();
    let tile_dir = regions.artifacts().region_dir("r1");
    assert!(tile_dir.exists());

    assert!(regions.evict("r1").await.unwrap());

    assert!(regions.get("r1").unwrap().is_none());
    assert!(!tile_dir.exists());
    assert_eq!(harness.session.index().count_for_region("r1").unwrap(), 0);
    assert!(harness.session.index().count_for_region("r2").unwrap() > 0);

    // Unknown or already-evicted ids are a no-op.
    assert!(!regions.evict("r1").await.unwrap());
    assert!(!regions.evict("never-existed").await.unwrap());
}

#[tokio::test]
async fn test_evict_stops_an_in_flight_download() {
    let harness = Harness::new(FakeTileSource::gated(3)).await;
    let regions = harness.session.regions();

    let task = regions.request_download(region_request("r1")).await.unwrap();
    let evicted = regions.evict("r1").await.unwrap();
    assert!(evicted);

    let result = task.wait().await;
    assert!(matches!(result, Err(OffgridError::RegionCancelled { .. })));
    assert!(regions.get("r1").unwrap().is_none());
}

#[tokio::test]
async fn test_interrupted_downloads_fail_on_reopen() {
    let harness = Harness::new(FakeTileSource::gated(3)).await;
    let task = harness
        .session
        .regions()
        .request_download(region_request("r1"))
        .await
        .unwrap();

    // A second cache over the same store sees the row mid-download.
    let reopened = offgrid_core::RegionCache::new(
        harness.session.regions().store().clone(),
        offgrid_core::TileArtifactStore::new(harness.temp.path().join("tiles-2")),
        harness.tiles.clone(),
    )
    .unwrap();
    let descriptor = reopened.get("r1").unwrap().unwrap();
    assert_eq!(descriptor.status, RegionStatus::Failed);
    assert_eq!(descriptor.last_error.as_deref(), Some("interrupted"));

    drop(task);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let harness = Harness::new(FakeTileSource::open(1)).await;
    let regions = harness.session.regions();

    let result = regions.request_download(region_request("")).await;
    assert!(matches!(result, Err(OffgridError::InvalidInput { .. })));
    assert_eq!(harness.tiles.fetch_count(), 0);
}

#[tokio::test]
async fn test_out_of_range_ttl_leaves_the_cache_usable() {
    let harness = Harness::new(FakeTileSource::open(1)).await;
    let regions = harness.session.regions();

    let huge = region_request("big").with_ttl(Duration::from_secs(1_000_000_000_000_000));
    let result = regions.request_download(huge).await;
    assert!(matches!(result, Err(OffgridError::InvalidInput { .. })));
    assert!(regions.get("big").unwrap().is_none());

    let short = region_request("blink").with_ttl(Duration::from_millis(500));
    let result = regions.request_download(short).await;
    assert!(matches!(result, Err(OffgridError::InvalidInput { .. })));

    let descriptor = regions.download(region_request("other"), |_| {}).await.unwrap();
    assert_eq!(descriptor.status, RegionStatus::Ready);
}
