//! Integration tests for the prefetch system.
//!
//! These tests verify the complete prefetch flow including:
//! - Viewports showing streaming instances (targets → retrieval → decode)
//! - Weighted service of several viewports
//! - Retrieval failures and released instances (verified via stats counters)
//!
//! Run with: `cargo test --test prefetch_integration`

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{FakeArchive, FRAME_SIZE};
use framecache::eviction::{EvictionRegistry, MemoryEvictionRegistry};
use framecache::instance::StreamingInstance;
use framecache::prefetch::{
    NeverPostProcess, PrefetchScheduler, PrefetchTarget, SchedulerConfig, WindowSize,
};
use framecache::retrieval::{RetrievalClient, RetryPolicy};

// ============================================================================
// Helpers
// ============================================================================

fn open(archive: &Arc<FakeArchive>, key: &str) -> StreamingInstance {
    open_with(archive, key, MemoryEvictionRegistry::shared(usize::MAX))
}

fn open_with(
    archive: &Arc<FakeArchive>,
    key: &str,
    registry: Arc<MemoryEvictionRegistry>,
) -> StreamingInstance {
    let client = RetrievalClient::new(key, archive.clone()).with_policies(
        RetryPolicy::header_default(),
        RetryPolicy::frame_default()
            .with_max_attempts(Some(1))
            .with_delays(Duration::from_millis(1), Duration::from_millis(1)),
    );
    StreamingInstance::open_default(Arc::new(client), registry).unwrap()
}

fn scheduler(window: WindowSize) -> PrefetchScheduler {
    PrefetchScheduler::new(SchedulerConfig {
        window,
        retrieval_threads: 2,
        post_process_threads: 1,
        ..Default::default()
    })
    .unwrap()
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_prefetch_decodes_window_around_current_frame() {
    let archive = FakeArchive::new(&[("a", 30)]).shared();
    let instance = open(&archive, "a");
    let scheduler = scheduler(WindowSize::Radius(3));
    let viewport = scheduler.add_viewport();
    scheduler
        .set_content(viewport, instance.frame_targets(), 15)
        .unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| instance.store().loaded_frames().len() == 7));
    scheduler.stop();

    assert_eq!(instance.store().loaded_frames(), (12..=18).collect::<Vec<_>>());
    assert_eq!(archive.frame_calls(), 7);
    // Displaying a prefetched frame does not touch the transport again
    instance.get_pixel_buffer(15).unwrap();
    assert_eq!(archive.frame_calls(), 7);
}

#[test]
fn test_retrieve_only_leaves_decoding_to_first_access() {
    let archive = FakeArchive::new(&[("a", 10)]).shared();
    let instance = open(&archive, "a");
    let scheduler = scheduler(WindowSize::Radius(1))
        .with_post_process_condition(Arc::new(NeverPostProcess))
        .unwrap();
    let viewport = scheduler.add_viewport();
    scheduler.set_content(viewport, instance.frame_targets(), 0).unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| scheduler.stats().post_process_skipped == 2));
    scheduler.stop();

    assert!(instance.client().is_frame_cached(0));
    assert!(instance.client().is_frame_cached(1));
    assert!(instance.store().loaded_frames().is_empty());
    instance.get_pixel_buffer(1).unwrap();
    assert_eq!(archive.frame_calls(), 2);
}

#[test]
fn test_retrieve_only_prefetch_stays_within_budget() {
    let archive = FakeArchive::new(&[("a", 50)]).shared();
    let registry = MemoryEvictionRegistry::shared(0);
    let instance = open_with(&archive, "a", registry.clone());
    let scheduler = scheduler(WindowSize::Unbounded)
        .with_post_process_condition(Arc::new(NeverPostProcess))
        .unwrap();
    let viewport = scheduler.add_viewport();
    scheduler.set_content(viewport, instance.frame_targets(), 0).unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| scheduler.stats().post_process_skipped == 50));
    scheduler.stop();

    assert_eq!(instance.client().cached_frame_count(), 50);
    assert_eq!(registry.current_bytes(), 50 * FRAME_SIZE);

    registry.evict_if_over_limit();

    assert_eq!(instance.client().cached_frame_count(), 0);
    assert_eq!(registry.current_bytes(), 0);
    instance.get_pixel_buffer(7).unwrap();
    assert_eq!(archive.frame_calls(), 51);
}

#[test]
fn test_every_viewport_is_served() {
    let archive = FakeArchive::new(&[("a", 50), ("b", 50)]).shared();
    let a = open(&archive, "a");
    let b = open(&archive, "b");
    let scheduler = scheduler(WindowSize::Radius(5));
    let left = scheduler.add_viewport();
    let right = scheduler.add_viewport();
    scheduler.set_content(left, a.frame_targets(), 25).unwrap();
    scheduler.set_content(right, b.frame_targets(), 0).unwrap();
    scheduler.select_viewport(right).unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| {
        a.store().loaded_frames().len() == 11 && b.store().loaded_frames().len() == 6
    }));
    scheduler.stop();

    let stats = scheduler.stats();
    assert_eq!(stats.dispatched, 17);
    assert_eq!(stats.post_process_completed, 17);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_navigation_refocuses_prefetch() {
    let archive = FakeArchive::new(&[("a", 100)]).shared();
    let instance = open(&archive, "a");
    let scheduler = scheduler(WindowSize::Radius(2));
    let viewport = scheduler.add_viewport();
    scheduler.set_content(viewport, instance.frame_targets(), 10).unwrap();
    scheduler.start().unwrap();
    assert!(wait_for(|| instance.store().loaded_frames().len() == 5));

    scheduler.navigate(viewport, 80).unwrap();

    assert!(wait_for(|| (78..=82).all(|n| instance.store().is_loaded(n))));
    scheduler.stop();
    assert_eq!(instance.store().loaded_frames().len(), 10);
}

#[test]
fn test_retrieval_failures_are_counted_not_fatal() {
    let archive = FakeArchive::new(&[("a", 10)]).shared();
    let instance = open(&archive, "a");
    archive.fail_frame("a", 4, 1);
    archive.fail_frame("a", 6, 1);
    let scheduler = scheduler(WindowSize::Radius(1));
    let viewport = scheduler.add_viewport();
    scheduler.set_content(viewport, instance.frame_targets(), 5).unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| {
        let stats = scheduler.stats();
        stats.retrievals_failed == 2 && stats.post_process_completed == 1
    }));
    scheduler.stop();

    assert_eq!(instance.store().loaded_frames(), vec![5]);
    assert!(instance.client().has_failed(4));
}

#[test]
fn test_targets_of_released_instance_skip_decoding() {
    let archive = FakeArchive::new(&[("a", 10)]).shared();
    let instance = open(&archive, "a");
    let targets: Vec<Arc<dyn PrefetchTarget>> = instance.frame_targets();
    drop(instance);

    let scheduler = scheduler(WindowSize::Radius(1));
    let viewport = scheduler.add_viewport();
    scheduler.set_content(viewport, targets, 3).unwrap();
    scheduler.start().unwrap();

    assert!(wait_for(|| scheduler.stats().post_process_failed == 3));
    scheduler.stop();
    assert_eq!(scheduler.stats().retrievals_completed, 3);
}
