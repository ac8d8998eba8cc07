//! Weighted multi-viewport prefetch scheduler.
//!
//! # Threads
//!
//! ```text
//!  add_viewport / navigate / set_content / select_viewport / notify
//!                         │ (bump generation, mark dirty, signal)
//!                         ▼
//!               ┌───────────────────┐
//!               │ coordinator thread│  rebuilds dirty queues, drains one
//!               └─────────┬─────────┘  weighted round, blocks when idle
//!                         ▼
//!               retrieval WorkerPool ──► post-process WorkerPool
//! ```
//!
//! Each viewport carries a generation counter, bumped on every navigation or
//! content change. Entries remember the generation they were built for, and
//! every stage drops entries whose generation is no longer current.

use super::strategy::{build_queue, drain_round};
use super::{
    AllFramesEligible, AlwaysPostProcess, FrameEligibility, PostProcessCondition, PrefetchError,
    PrefetchStats, PrefetchStatsSnapshot, PrefetchTarget, QueueEntry, SchedulerConfig,
    SelectionStrategy, ViewportEvent, ViewportId, ViewportState, WindowStrategy, WorkerPool,
};
use super::viewport::transition;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Pending rebuild reason for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Navigated,
    ContentChanged,
}

struct Viewport {
    id: ViewportId,
    content: Vec<Arc<dyn PrefetchTarget>>,
    current: usize,
    generation: u64,
    pending: Option<Change>,
    state: ViewportState,
}

impl Viewport {
    fn new(id: ViewportId) -> Self {
        Self {
            id,
            content: Vec::new(),
            current: 0,
            generation: 0,
            pending: None,
            state: ViewportState::Idle,
        }
    }
}

struct CoordinatorState {
    viewports: Vec<Viewport>,
    selected: Option<ViewportId>,
    config: SchedulerConfig,
    strategy: Arc<dyn SelectionStrategy>,
    /// Set by `notify()` and viewport mutations, cleared by the coordinator.
    signalled: bool,
}

impl CoordinatorState {
    fn viewport_mut(&mut self, id: ViewportId) -> Result<&mut Viewport, PrefetchError> {
        self.viewports
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(PrefetchError::UnknownViewport(id))
    }

    fn has_work(&self) -> bool {
        self.viewports.iter().any(|v| !v.state.is_idle())
    }
}

/// State shared between the scheduler handle, the coordinator and workers.
struct Shared {
    state: Mutex<CoordinatorState>,
    changed: Condvar,
    generations: DashMap<ViewportId, u64>,
    eligibility: Arc<dyn FrameEligibility>,
    post_condition: Arc<dyn PostProcessCondition>,
    stats: PrefetchStats,
}

impl Shared {
    fn is_current(&self, entry: &QueueEntry) -> bool {
        self.generations
            .get(&entry.viewport)
            .map(|g| *g == entry.generation)
            .unwrap_or(false)
    }

    fn signal(&self, state: &mut CoordinatorState) {
        state.signalled = true;
        self.changed.notify_all();
    }

    /// Rebuild the queue of every viewport with a pending change.
    fn rebuild_pending(&self, state: &mut CoordinatorState) {
        let strategy = Arc::clone(&state.strategy);
        for viewport in state.viewports.iter_mut() {
            let Some(change) = viewport.pending.take() else {
                continue;
            };
            let built = build_queue(
                strategy.as_ref(),
                self.eligibility.as_ref(),
                viewport.id,
                viewport.generation,
                &viewport.content,
                viewport.current,
            );
            PrefetchStats::add(&self.stats.ineligible_dropped, built.ineligible as u64);
            let event = match change {
                Change::Navigated => ViewportEvent::Navigated { queue: built.queue },
                Change::ContentChanged => ViewportEvent::ContentChanged { queue: built.queue },
            };
            viewport.state = transition(std::mem::take(&mut viewport.state), event);
            trace!(
                viewport = %viewport.id,
                generation = viewport.generation,
                queued = viewport.state.pending(),
                "Viewport queue rebuilt"
            );
        }
    }
}

/// Threads owned by a running scheduler.
struct Running {
    cancel: CancellationToken,
    coordinator: JoinHandle<()>,
    retrieval: Arc<WorkerPool>,
    post_process: Arc<WorkerPool>,
}

/// Prefetches frames for several viewports, favouring the selected one.
///
/// Each viewport displays a list of [`PrefetchTarget`]s and a current index.
/// Frames around the current index are queued by the [`SelectionStrategy`]
/// and drained in weighted rounds: `selected_weight` entries from the
/// selected viewport, then `unselected_weight` from each other viewport.
///
/// # Example
///
/// ```ignore
/// let scheduler = PrefetchScheduler::new(SchedulerConfig::default())?;
/// let viewport = scheduler.add_viewport();
/// scheduler.set_content(viewport, instance.frame_targets(), 0)?;
/// scheduler.start()?;
/// scheduler.navigate(viewport, 12)?;
/// ```
pub struct PrefetchScheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
    started: AtomicBool,
}

impl PrefetchScheduler {
    /// Create a stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SchedulerConfig) -> Result<Self, PrefetchError> {
        config.validate()?;
        let strategy: Arc<dyn SelectionStrategy> = Arc::new(WindowStrategy::new(config.window));
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CoordinatorState {
                    viewports: Vec::new(),
                    selected: None,
                    config,
                    strategy,
                    signalled: false,
                }),
                changed: Condvar::new(),
                generations: DashMap::new(),
                eligibility: Arc::new(AllFramesEligible),
                post_condition: Arc::new(AlwaysPostProcess),
                stats: PrefetchStats::default(),
            }),
            running: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Fail with [`PrefetchError::ConfigurationLocked`] once `start()` has run.
    fn ensure_configurable(&self, setting: &str) -> Result<(), PrefetchError> {
        if self.started.load(Ordering::SeqCst) {
            error!(setting, "Prefetch scheduler configuration changed after start; ignoring");
            return Err(PrefetchError::ConfigurationLocked);
        }
        Ok(())
    }

    fn shared_mut(&mut self, setting: &str) -> Result<&mut Shared, PrefetchError> {
        self.ensure_configurable(setting)?;
        Arc::get_mut(&mut self.shared).ok_or_else(|| {
            error!(setting, "Prefetch scheduler state is shared; configuration locked");
            PrefetchError::ConfigurationLocked
        })
    }

    /// Use a custom eligibility predicate.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError::ConfigurationLocked`] once `start()` has been called.
    pub fn with_eligibility(
        mut self,
        eligibility: Arc<dyn FrameEligibility>,
    ) -> Result<Self, PrefetchError> {
        self.shared_mut("eligibility")?.eligibility = eligibility;
        Ok(self)
    }

    /// Use a custom post-process condition.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError::ConfigurationLocked`] once `start()` has been called.
    pub fn with_post_process_condition(
        mut self,
        condition: Arc<dyn PostProcessCondition>,
    ) -> Result<Self, PrefetchError> {
        self.shared_mut("post_process_condition")?.post_condition = condition;
        Ok(self)
    }

    /// Replace the window strategy with a custom selection strategy.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError::ConfigurationLocked`] once `start()` has been called.
    pub fn with_strategy(self, strategy: Arc<dyn SelectionStrategy>) -> Result<Self, PrefetchError> {
        self.ensure_configurable("strategy")?;
        self.shared.state.lock().strategy = strategy;
        Ok(self)
    }

    /// Current configuration.
    pub fn config(&self) -> SchedulerConfig {
        self.shared.state.lock().config.clone()
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// - [`PrefetchError::ConfigurationLocked`] once `start()` has been called
    /// - [`PrefetchError::InvalidConfig`] if the configuration is invalid
    pub fn configure(&self, config: SchedulerConfig) -> Result<(), PrefetchError> {
        self.ensure_configurable("config")?;
        config.validate()?;
        let mut state = self.shared.state.lock();
        state.strategy = Arc::new(WindowStrategy::new(config.window));
        state.config = config;
        Ok(())
    }

    /// Register a new viewport with no content.
    pub fn add_viewport(&self) -> ViewportId {
        let id = ViewportId::next();
        let mut state = self.shared.state.lock();
        state.viewports.push(Viewport::new(id));
        self.shared.generations.insert(id, 0);
        if state.selected.is_none() {
            state.selected = Some(id);
        }
        self.shared.signal(&mut state);
        debug!(viewport = %id, "Viewport added");
        id
    }

    /// Remove a viewport; its queued entries become stale.
    pub fn remove_viewport(&self, id: ViewportId) -> Result<(), PrefetchError> {
        let mut state = self.shared.state.lock();
        let position = state
            .viewports
            .iter()
            .position(|v| v.id == id)
            .ok_or(PrefetchError::UnknownViewport(id))?;
        state.viewports.remove(position);
        self.shared.generations.remove(&id);
        if state.selected == Some(id) {
            state.selected = state.viewports.first().map(|v| v.id);
        }
        self.shared.signal(&mut state);
        debug!(viewport = %id, "Viewport removed");
        Ok(())
    }

    /// Make `id` the selected viewport.
    ///
    /// A newly selected viewport has its queue rebuilt so its window is
    /// drained again at the selected weight.
    pub fn select_viewport(&self, id: ViewportId) -> Result<(), PrefetchError> {
        let mut state = self.shared.state.lock();
        state.viewport_mut(id)?;
        if state.selected == Some(id) {
            return Ok(());
        }
        state.selected = Some(id);
        self.invalidate(&mut state, id, Change::Navigated)
    }

    pub fn selected_viewport(&self) -> Option<ViewportId> {
        self.shared.state.lock().selected
    }

    /// Replace the content shown by a viewport.
    pub fn set_content(
        &self,
        id: ViewportId,
        content: Vec<Arc<dyn PrefetchTarget>>,
        current: usize,
    ) -> Result<(), PrefetchError> {
        self.update(id, Change::ContentChanged, |viewport| {
            viewport.content = content;
            viewport.current = current;
        })
    }

    /// Move a viewport to another frame of its content.
    pub fn navigate(&self, id: ViewportId, current: usize) -> Result<(), PrefetchError> {
        self.update(id, Change::Navigated, |viewport| {
            viewport.current = current;
        })
    }

    fn update<F>(&self, id: ViewportId, change: Change, apply: F) -> Result<(), PrefetchError>
    where
        F: FnOnce(&mut Viewport),
    {
        let mut state = self.shared.state.lock();
        apply(state.viewport_mut(id)?);
        self.invalidate(&mut state, id, change)
    }

    /// Bump the generation of a viewport and mark its queue for rebuild.
    fn invalidate(
        &self,
        state: &mut CoordinatorState,
        id: ViewportId,
        change: Change,
    ) -> Result<(), PrefetchError> {
        let viewport = state.viewport_mut(id)?;
        viewport.generation += 1;
        // A content change outranks a later navigation in the same batch
        if viewport.pending != Some(Change::ContentChanged) {
            viewport.pending = Some(change);
        }
        let generation = viewport.generation;
        self.shared.generations.insert(id, generation);
        self.shared.signal(state);
        trace!(viewport = %id, generation, ?change, "Viewport changed");
        Ok(())
    }

    /// Wake the coordinator, e.g. after frames became eligible again.
    pub fn notify(&self) {
        let mut state = self.shared.state.lock();
        for viewport in state.viewports.iter_mut() {
            if viewport.pending.is_none() {
                viewport.pending = Some(Change::Navigated);
            }
        }
        self.shared.signal(&mut state);
    }

    /// Entries queued across all viewports.
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.viewports.iter().map(|v| v.state.pending()).sum()
    }

    /// Start the coordinator and worker pools. Idempotent while running.
    ///
    /// # Errors
    ///
    /// Returns [`PrefetchError::Spawn`] if a thread cannot be spawned.
    pub fn start(&self) -> Result<(), PrefetchError> {
        let mut running = self.running.lock();
        if running.is_some() {
            warn!("Prefetch scheduler already running");
            return Ok(());
        }
        self.started.store(true, Ordering::SeqCst);

        let config = self.config();
        let spawn_error = |name: &str, source| PrefetchError::Spawn {
            name: name.to_string(),
            source,
        };

        let retrieval = Arc::new(
            WorkerPool::new("prefetch-retrieve", config.retrieval_threads, config.queue_capacity)
                .map_err(|e| spawn_error("prefetch-retrieve", e))?,
        );
        let post_process = Arc::new(
            WorkerPool::new("prefetch-post", config.post_process_threads, config.queue_capacity)
                .map_err(|e| spawn_error("prefetch-post", e))?,
        );

        let cancel = CancellationToken::new();
        let coordinator = {
            let shared = Arc::clone(&self.shared);
            let cancel = cancel.clone();
            let retrieval = Arc::clone(&retrieval);
            let post_process = Arc::clone(&post_process);
            thread::Builder::new()
                .name("prefetch-coordinator".to_string())
                .spawn(move || run_coordinator(shared, cancel, retrieval, post_process))
                .map_err(|e| spawn_error("prefetch-coordinator", e))?
        };

        info!(
            retrieval_threads = config.retrieval_threads,
            post_process_threads = config.post_process_threads,
            selected_weight = config.selected_weight,
            unselected_weight = config.unselected_weight,
            window = %config.window,
            "Prefetch scheduler started"
        );

        *running = Some(Running {
            cancel,
            coordinator,
            retrieval,
            post_process,
        });
        Ok(())
    }

    /// Stop the coordinator, let in-flight work finish and join all threads.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.cancel.cancel();
        {
            let mut state = self.shared.state.lock();
            self.shared.signal(&mut state);
        }
        // Unblocks a coordinator waiting on a full retrieval queue
        running.retrieval.close();
        if running.coordinator.join().is_err() {
            error!("Prefetch coordinator panicked");
        }
        let discarded = running.retrieval.shutdown() + running.post_process.shutdown();
        info!(discarded, "Prefetch scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn stats(&self) -> PrefetchStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Coordinator thread body.
fn run_coordinator(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    retrieval: Arc<WorkerPool>,
    post_process: Arc<WorkerPool>,
) {
    debug!("Prefetch coordinator running");
    loop {
        let round = {
            let mut state = shared.state.lock();
            loop {
                if cancel.is_cancelled() {
                    debug!("Prefetch coordinator cancelled");
                    return;
                }
                state.signalled = false;
                shared.rebuild_pending(&mut state);
                if state.has_work() {
                    break;
                }
                while !state.signalled && !cancel.is_cancelled() {
                    shared.changed.wait(&mut state);
                }
            }

            let selected = state.selected;
            let (selected_weight, unselected_weight) =
                (state.config.selected_weight, state.config.unselected_weight);
            let round = drain_round(
                state.viewports.iter_mut().map(|v| (v.id, &mut v.state)),
                selected,
                selected_weight,
                unselected_weight,
            );
            PrefetchStats::add(&shared.stats.rounds, 1);
            round
        };

        for entry in round {
            if !shared.is_current(&entry) {
                PrefetchStats::add(&shared.stats.stale_skipped, 1);
                continue;
            }
            let job = {
                let shared = Arc::clone(&shared);
                let post_process = Arc::clone(&post_process);
                move || retrieve_entry(&shared, &post_process, entry)
            };
            if !retrieval.submit(job) {
                debug!("Retrieval pool closed, coordinator exiting");
                return;
            }
            PrefetchStats::add(&shared.stats.dispatched, 1);
        }
    }
}

/// Retrieval worker job.
fn retrieve_entry(shared: &Arc<Shared>, post_process: &Arc<WorkerPool>, entry: QueueEntry) {
    if !shared.is_current(&entry) {
        PrefetchStats::add(&shared.stats.stale_skipped, 1);
        return;
    }

    if let Err(e) = entry.target.retrieve() {
        PrefetchStats::add(&shared.stats.retrievals_failed, 1);
        warn!(
            viewport = %entry.viewport,
            target = %entry.target.describe(),
            error = %e,
            "Prefetch retrieval failed"
        );
        return;
    }
    PrefetchStats::add(&shared.stats.retrievals_completed, 1);

    if !shared.post_condition.should_post_process(entry.target.as_ref()) {
        PrefetchStats::add(&shared.stats.post_process_skipped, 1);
        return;
    }

    let job = {
        let shared = Arc::clone(shared);
        move || post_process_entry(&shared, entry)
    };
    if !post_process.submit(job) {
        trace!("Post-process pool closed, dropping entry");
    }
}

/// Post-processing worker job.
fn post_process_entry(shared: &Arc<Shared>, entry: QueueEntry) {
    if !shared.is_current(&entry) {
        PrefetchStats::add(&shared.stats.stale_skipped, 1);
        return;
    }

    match entry.target.post_process() {
        Ok(()) => PrefetchStats::add(&shared.stats.post_process_completed, 1),
        Err(e) => {
            PrefetchStats::add(&shared.stats.post_process_failed, 1);
            warn!(
                viewport = %entry.viewport,
                target = %entry.target.describe(),
                error = %e,
                "Prefetch post-processing failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefetch::{NeverPostProcess, WindowSize};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct CountingTarget {
        frame: u32,
        retrieved: Arc<AtomicUsize>,
        processed: Arc<AtomicUsize>,
    }

    impl PrefetchTarget for CountingTarget {
        fn frame_number(&self) -> u32 {
            self.frame
        }

        fn retrieve(&self) -> Result<(), PrefetchError> {
            self.retrieved.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn post_process(&self) -> Result<(), PrefetchError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn content(len: u32) -> (Vec<Arc<dyn PrefetchTarget>>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let retrieved = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicUsize::new(0));
        let targets = (0..len)
            .map(|frame| {
                Arc::new(CountingTarget {
                    frame,
                    retrieved: Arc::clone(&retrieved),
                    processed: Arc::clone(&processed),
                }) as Arc<dyn PrefetchTarget>
            })
            .collect();
        (targets, retrieved, processed)
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

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SchedulerConfig {
            selected_weight: 0,
            ..Default::default()
        };
        assert!(matches!(
            PrefetchScheduler::new(config),
            Err(PrefetchError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_configure_before_start() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        let config = SchedulerConfig {
            window: WindowSize::Radius(3),
            ..Default::default()
        };
        scheduler.configure(config.clone()).unwrap();
        assert_eq!(scheduler.config(), config);
    }

    #[test]
    fn test_configure_after_start_is_locked() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.start().unwrap();

        let result = scheduler.configure(SchedulerConfig::default());
        assert!(matches!(result, Err(PrefetchError::ConfigurationLocked)));

        scheduler.stop();
        assert!(matches!(
            scheduler.configure(SchedulerConfig::default()),
            Err(PrefetchError::ConfigurationLocked)
        ));
    }

    #[test]
    fn test_strategy_before_start_is_used() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default())
            .unwrap()
            .with_strategy(Arc::new(WindowStrategy::new(WindowSize::Radius(0))))
            .unwrap();
        let viewport = scheduler.add_viewport();
        let (targets, retrieved, processed) = content(10);
        scheduler.set_content(viewport, targets, 4).unwrap();
        scheduler.start().unwrap();

        assert!(wait_for(|| processed.load(Ordering::SeqCst) == 1));
        thread::sleep(Duration::from_millis(50));
        scheduler.stop();
        assert_eq!(retrieved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_builders_after_start_are_locked() {
        let started = || {
            let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
            scheduler.start().unwrap();
            scheduler
        };

        let result = started().with_strategy(Arc::new(WindowStrategy::new(WindowSize::Unbounded)));
        assert!(matches!(result, Err(PrefetchError::ConfigurationLocked)));

        let nothing: Arc<dyn FrameEligibility> = Arc::new(|_: &dyn PrefetchTarget| false);
        let result = started().with_eligibility(nothing);
        assert!(matches!(result, Err(PrefetchError::ConfigurationLocked)));

        let result = started().with_post_process_condition(Arc::new(NeverPostProcess));
        assert!(matches!(result, Err(PrefetchError::ConfigurationLocked)));
    }

    #[test]
    fn test_builders_stay_locked_after_stop() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.start().unwrap();
        scheduler.stop();

        let result = scheduler.with_post_process_condition(Arc::new(NeverPostProcess));
        assert!(matches!(result, Err(PrefetchError::ConfigurationLocked)));
    }

    #[test]
    fn test_selection_change_requeues_window() {
        let config = SchedulerConfig {
            window: WindowSize::Radius(1),
            ..Default::default()
        };
        let scheduler = PrefetchScheduler::new(config)
            .unwrap()
            .with_post_process_condition(Arc::new(NeverPostProcess))
            .unwrap();
        let left = scheduler.add_viewport();
        let right = scheduler.add_viewport();
        let (left_targets, left_retrieved, _) = content(10);
        let (right_targets, right_retrieved, _) = content(10);
        scheduler.set_content(left, left_targets, 5).unwrap();
        scheduler.set_content(right, right_targets, 5).unwrap();
        scheduler.start().unwrap();

        assert!(wait_for(|| left_retrieved.load(Ordering::SeqCst) == 3
            && right_retrieved.load(Ordering::SeqCst) == 3));

        scheduler.select_viewport(right).unwrap();
        assert!(wait_for(|| right_retrieved.load(Ordering::SeqCst) == 6));

        // Reselecting the selected viewport changes nothing
        scheduler.select_viewport(right).unwrap();
        thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        assert_eq!(right_retrieved.load(Ordering::SeqCst), 6);
        assert_eq!(left_retrieved.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unknown_viewport() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        let id = scheduler.add_viewport();
        scheduler.remove_viewport(id).unwrap();

        assert!(matches!(
            scheduler.navigate(id, 1),
            Err(PrefetchError::UnknownViewport(v)) if v == id
        ));
        assert!(scheduler.select_viewport(id).is_err());
    }

    #[test]
    fn test_first_viewport_is_selected() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        let a = scheduler.add_viewport();
        let b = scheduler.add_viewport();
        assert_eq!(scheduler.selected_viewport(), Some(a));

        scheduler.select_viewport(b).unwrap();
        assert_eq!(scheduler.selected_viewport(), Some(b));
        scheduler.remove_viewport(b).unwrap();
        assert_eq!(scheduler.selected_viewport(), Some(a));
    }

    #[test]
    fn test_prefetches_window_of_running_viewport() {
        let config = SchedulerConfig {
            window: WindowSize::Radius(2),
            ..Default::default()
        };
        let scheduler = PrefetchScheduler::new(config).unwrap();
        let viewport = scheduler.add_viewport();
        let (targets, retrieved, processed) = content(20);
        scheduler.set_content(viewport, targets, 10).unwrap();
        scheduler.start().unwrap();

        assert!(wait_for(|| processed.load(Ordering::SeqCst) == 5));
        scheduler.stop();

        assert_eq!(retrieved.load(Ordering::SeqCst), 5);
        let stats = scheduler.stats();
        assert_eq!(stats.dispatched, 5);
        assert_eq!(stats.retrievals_completed, 5);
        assert_eq!(stats.post_process_completed, 5);
    }

    #[test]
    fn test_post_process_condition_is_respected() {
        let config = SchedulerConfig {
            window: WindowSize::Radius(1),
            ..Default::default()
        };
        let scheduler = PrefetchScheduler::new(config)
            .unwrap()
            .with_post_process_condition(Arc::new(NeverPostProcess))
            .unwrap();
        let viewport = scheduler.add_viewport();
        let (targets, retrieved, processed) = content(10);
        scheduler.set_content(viewport, targets, 5).unwrap();
        scheduler.start().unwrap();

        assert!(wait_for(|| retrieved.load(Ordering::SeqCst) == 3));
        assert!(wait_for(|| scheduler.stats().post_process_skipped == 3));
        scheduler.stop();
        assert_eq!(processed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ineligible_frames_are_not_fetched() {
        let config = SchedulerConfig {
            window: WindowSize::Unbounded,
            ..Default::default()
        };
        let even_only: Arc<dyn FrameEligibility> =
            Arc::new(|t: &dyn PrefetchTarget| t.frame_number() % 2 == 0);
        let scheduler = PrefetchScheduler::new(config)
            .unwrap()
            .with_eligibility(even_only)
            .unwrap();
        let viewport = scheduler.add_viewport();
        let (targets, retrieved, _) = content(10);
        scheduler.set_content(viewport, targets, 0).unwrap();
        scheduler.start().unwrap();

        assert!(wait_for(|| retrieved.load(Ordering::SeqCst) == 5));
        scheduler.stop();
        assert_eq!(scheduler.stats().ineligible_dropped, 5);
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let scheduler = PrefetchScheduler::new(SchedulerConfig::default()).unwrap();
        scheduler.start().unwrap();
        scheduler.start().unwrap();
        assert!(scheduler.is_running());

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        scheduler.start().unwrap();
        assert!(scheduler.is_running());
    }

    #[test]
    fn test_pending_counts_queued_entries() {
        let config = SchedulerConfig {
            window: WindowSize::Radius(2),
            ..Default::default()
        };
        let scheduler = PrefetchScheduler::new(config).unwrap();
        let viewport = scheduler.add_viewport();
        let (targets, _, _) = content(20);
        scheduler.set_content(viewport, targets, 10).unwrap();

        // Queues are built by the coordinator, which has not started
        assert_eq!(scheduler.pending(), 0);
    }

    /// Retrieval blocks until the gate opens; records frames that ran.
    struct GatedTarget {
        frame: u32,
        gate: Arc<(Mutex<bool>, Condvar)>,
        entered: Arc<AtomicUsize>,
        ran: Arc<Mutex<Vec<u32>>>,
    }

    impl PrefetchTarget for GatedTarget {
        fn frame_number(&self) -> u32 {
            self.frame
        }

        fn retrieve(&self) -> Result<(), PrefetchError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let (open, wake) = &*self.gate;
            let mut open = open.lock();
            while !*open {
                wake.wait(&mut open);
            }
            drop(open);
            self.ran.lock().push(self.frame);
            Ok(())
        }

        fn post_process(&self) -> Result<(), PrefetchError> {
            Ok(())
        }
    }

    #[test]
    fn test_navigation_skips_entries_of_old_window() {
        let config = SchedulerConfig {
            retrieval_threads: 1,
            post_process_threads: 1,
            queue_capacity: 1,
            window: WindowSize::Radius(5),
            ..Default::default()
        };
        let scheduler = PrefetchScheduler::new(config)
            .unwrap()
            .with_post_process_condition(Arc::new(NeverPostProcess))
            .unwrap();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let entered = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(Mutex::new(Vec::new()));
        let targets: Vec<Arc<dyn PrefetchTarget>> = (0..20)
            .map(|frame| {
                Arc::new(GatedTarget {
                    frame,
                    gate: Arc::clone(&gate),
                    entered: Arc::clone(&entered),
                    ran: Arc::clone(&ran),
                }) as Arc<dyn PrefetchTarget>
            })
            .collect();
        let viewport = scheduler.add_viewport();
        scheduler.set_content(viewport, targets, 10).unwrap();
        scheduler.start().unwrap();

        // Frame 10 is running, frame 11 is queued and the coordinator holds 9
        assert!(wait_for(|| entered.load(Ordering::SeqCst) == 1
            && scheduler.stats().dispatched == 2));
        scheduler.navigate(viewport, 0).unwrap();
        {
            let (open, wake) = &*gate;
            *open.lock() = true;
            wake.notify_all();
        }

        assert!(wait_for(|| ran.lock().len() == 7));
        thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        let mut frames = ran.lock().clone();
        frames.sort_unstable();
        assert_eq!(frames, vec![0, 1, 2, 3, 4, 5, 10]);
        assert_eq!(scheduler.stats().stale_skipped, 2);
    }
}
