//! Streaming retrieval client with failure memoization.

use super::retry::{retry, RetryFailure};
use super::{
    Header, RawFrame, RetrievalError, RetrievalStats, RetrievalStatsSnapshot, RetrievalTarget,
    RetryClock, RetryPolicy, SystemClock, Transport,
};
use crate::eviction::{
    ContainerId, Evictable, EvictionRegistry, NoOpEvictionRegistry, RegenerationCost,
    Registration,
};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Outcome of a retrieval, remembered until released.
#[derive(Debug)]
enum Slot<T> {
    Empty,
    Loaded(T),
    Failed(RetrievalError),
}

type FrameSlot = Slot<RawFrame>;

type SharedRegistry = Arc<RwLock<Arc<dyn EvictionRegistry>>>;

/// Retrieval state of one frame.
///
/// Registered with the eviction registry while it holds pixels, so raw
/// frames count against the memory budget and can be reclaimed.
struct FrameCell {
    id: ContainerId,
    slot: Mutex<FrameSlot>,
    registry: SharedRegistry,
    self_ref: Weak<FrameCell>,
}

impl FrameCell {
    fn new(registry: SharedRegistry) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            id: ContainerId::next(),
            slot: Mutex::new(Slot::Empty),
            registry,
            self_ref: self_ref.clone(),
        })
    }

    fn registry(&self) -> Arc<dyn EvictionRegistry> {
        Arc::clone(&self.registry.read())
    }

    fn register_with(&self, registry: &dyn EvictionRegistry, size_bytes: usize) {
        let target: Weak<dyn Evictable> = self.self_ref.clone();
        registry.register(
            self.id,
            Registration {
                size_bytes,
                last_access: Instant::now(),
                cost: RegenerationCost::Expensive,
                target,
            },
        );
    }

    fn register(&self, size_bytes: usize) {
        self.register_with(self.registry().as_ref(), size_bytes);
    }

    fn touch(&self) {
        self.registry().touch(self.id, Instant::now());
    }

    fn unregister(&self) {
        self.registry().unregister(self.id);
    }

    fn loaded_size(&self) -> Option<usize> {
        match &*self.slot.lock() {
            Slot::Loaded(frame) => Some(frame.data.len()),
            _ => None,
        }
    }
}

impl Evictable for FrameCell {
    /// Drop held pixels. A remembered failure is kept.
    fn unload(&self) {
        {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Loaded(_)) {
                *slot = Slot::Empty;
            }
        }
        self.unregister();
    }
}

/// Retrieves the header and frame pixels of one instance over a [`Transport`].
///
/// Each result is remembered: a success is returned again without a round
/// trip, and a failure is returned again without touching the transport
/// until the frame is released with [`unload_frame`](Self::unload_frame),
/// [`reset`](Self::reset) or [`prime_frame_pixels`](Self::prime_frame_pixels).
///
/// Retrieval is serialized per frame: concurrent callers asking for the same
/// frame wait for one transfer, while different frames transfer in parallel.
///
/// Retrieved pixels are registered with an [`EvictionRegistry`] (none until
/// [`set_eviction_registry`](Self::set_eviction_registry) is called) at
/// [`RegenerationCost::Expensive`]. An evicted frame is fetched again on its
/// next request.
pub struct RetrievalClient {
    instance_key: String,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn RetryClock>,
    header_policy: RetryPolicy,
    frame_policy: RetryPolicy,
    header: Mutex<Slot<Header>>,
    frames: DashMap<u32, Arc<FrameCell>>,
    registry: SharedRegistry,
    stats: RetrievalStats,
}

impl RetrievalClient {
    /// Create a client with the default retry policies and the system clock.
    pub fn new(instance_key: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            instance_key: instance_key.into(),
            transport,
            clock: Arc::new(SystemClock),
            header_policy: RetryPolicy::header_default(),
            frame_policy: RetryPolicy::frame_default(),
            header: Mutex::new(Slot::Empty),
            frames: DashMap::new(),
            registry: Arc::new(RwLock::new(Arc::new(NoOpEvictionRegistry))),
            stats: RetrievalStats::default(),
        }
    }

    pub fn with_policies(mut self, header_policy: RetryPolicy, frame_policy: RetryPolicy) -> Self {
        self.header_policy = header_policy;
        self.frame_policy = frame_policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn RetryClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Account retrieved pixels in `registry`.
    ///
    /// Frames already held move over from the previous registry.
    pub fn set_eviction_registry(&self, registry: Arc<dyn EvictionRegistry>) {
        let previous = std::mem::replace(&mut *self.registry.write(), Arc::clone(&registry));
        for cell in self.cells() {
            if let Some(size) = cell.loaded_size() {
                previous.unregister(cell.id);
                cell.register_with(registry.as_ref(), size);
            }
        }
    }

    fn cells(&self) -> Vec<Arc<FrameCell>> {
        self.frames.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    fn failure(&self, target: RetrievalTarget, failure: RetryFailure) -> RetrievalError {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            instance = %self.instance_key,
            %target,
            attempts = failure.attempts,
            error = %failure.last_error,
            "Retrieval gave up"
        );
        RetrievalError::Transport {
            instance_key: self.instance_key.clone(),
            target,
            attempts: failure.attempts,
            source: failure.last_error,
        }
    }

    /// Retrieve the complete header, retrying transient failures.
    pub fn retrieve_full_header(&self) -> Result<Header, RetrievalError> {
        let mut slot = self.header.lock();
        match &*slot {
            Slot::Loaded(header) => {
                RetrievalStats::bump(&self.stats.cache_hits);
                return Ok(header.clone());
            }
            Slot::Failed(error) => {
                RetrievalStats::bump(&self.stats.memoized_failures);
                return Err(error.clone());
            }
            Slot::Empty => {}
        }

        let result = retry(
            &self.header_policy,
            self.clock.as_ref(),
            "header",
            || {
                RetrievalStats::bump(&self.stats.attempts);
                self.transport.load_header(&self.instance_key, true)
            },
            || RetrievalStats::bump(&self.stats.retries),
        );

        match result {
            Ok(header) => {
                self.stats
                    .bytes_retrieved
                    .fetch_add(header.attributes.len() as u64, Ordering::Relaxed);
                debug!(instance = %self.instance_key, frame_count = header.frame_count, "Header retrieved");
                *slot = Slot::Loaded(header.clone());
                Ok(header)
            }
            Err(failure) => {
                let error = self.failure(RetrievalTarget::Header, failure);
                *slot = Slot::Failed(error.clone());
                Err(error)
            }
        }
    }

    fn frame_cell(&self, frame_number: u32) -> Arc<FrameCell> {
        let entry = self
            .frames
            .entry(frame_number)
            .or_insert_with(|| FrameCell::new(Arc::clone(&self.registry)));
        Arc::clone(entry.value())
    }

    /// Retrieve the raw pixels of one frame, retrying transient failures.
    pub fn retrieve_frame_pixels(&self, frame_number: u32) -> Result<RawFrame, RetrievalError> {
        let cell = self.frame_cell(frame_number);
        let mut slot = cell.slot.lock();
        match &*slot {
            Slot::Loaded(frame) => {
                RetrievalStats::bump(&self.stats.cache_hits);
                cell.touch();
                trace!(instance = %self.instance_key, frame = frame_number, "Raw frame hit");
                return Ok(frame.clone());
            }
            Slot::Failed(error) => {
                RetrievalStats::bump(&self.stats.memoized_failures);
                return Err(error.clone());
            }
            Slot::Empty => {}
        }

        let result = retry(
            &self.frame_policy,
            self.clock.as_ref(),
            "frame",
            || {
                RetrievalStats::bump(&self.stats.attempts);
                self.transport
                    .load_frame_pixels(&self.instance_key, frame_number)
            },
            || RetrievalStats::bump(&self.stats.retries),
        );

        match result {
            Ok(data) => {
                self.stats
                    .bytes_retrieved
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                trace!(instance = %self.instance_key, frame = frame_number, size = data.len(), "Raw frame retrieved");
                cell.register(data.len());
                let frame = RawFrame { frame_number, data };
                *slot = Slot::Loaded(frame.clone());
                Ok(frame)
            }
            Err(failure) => {
                let error = self.failure(RetrievalTarget::Frame(frame_number), failure);
                *slot = Slot::Failed(error.clone());
                Err(error)
            }
        }
    }

    /// Supply pixels for a frame obtained elsewhere, clearing any failure.
    pub fn prime_frame_pixels(&self, frame_number: u32, data: Bytes) {
        let cell = self.frame_cell(frame_number);
        let mut slot = cell.slot.lock();
        cell.register(data.len());
        *slot = Slot::Loaded(RawFrame { frame_number, data });
    }

    /// Forget the pixels or failure remembered for a frame.
    pub fn unload_frame(&self, frame_number: u32) {
        if let Some((_, cell)) = self.frames.remove(&frame_number) {
            cell.unregister();
            trace!(instance = %self.instance_key, frame = frame_number, "Raw frame released");
        }
    }

    /// Forget the header and every frame.
    pub fn reset(&self) {
        *self.header.lock() = Slot::Empty;
        for cell in self.cells() {
            cell.unregister();
        }
        self.frames.clear();
        debug!(instance = %self.instance_key, "Retrieval client reset");
    }

    /// Whether pixels for the frame are held.
    pub fn is_frame_cached(&self, frame_number: u32) -> bool {
        self.existing_slot(frame_number)
            .map(|cell| matches!(*cell.slot.lock(), Slot::Loaded(_)))
            .unwrap_or(false)
    }

    /// Number of frames whose pixels are held.
    pub fn cached_frame_count(&self) -> usize {
        self.cells()
            .iter()
            .filter(|cell| cell.loaded_size().is_some())
            .count()
    }

    /// Whether a failure is remembered for the frame.
    pub fn has_failed(&self, frame_number: u32) -> bool {
        self.existing_slot(frame_number)
            .map(|cell| matches!(*cell.slot.lock(), Slot::Failed(_)))
            .unwrap_or(false)
    }

    // Cloned out so the map shard is not held while waiting on a transfer
    fn existing_slot(&self, frame_number: u32) -> Option<Arc<FrameCell>> {
        self.frames.get(&frame_number).map(|cell| Arc::clone(cell.value()))
    }

    pub fn stats(&self) -> RetrievalStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for RetrievalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalClient")
            .field("instance_key", &self.instance_key)
            .field("frames", &self.frames.len())
            .finish()
    }
}
