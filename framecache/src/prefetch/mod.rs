//! Background prefetching of frames around each viewport's visible frame.
//!
//! ```text
//! viewport change ──► SelectionStrategy (window around current frame)
//!                          │ queue per viewport, tagged with generation
//!                          ▼
//!                  PrefetchScheduler coordinator
//!                          │ weighted round: selected 3, others 2 each
//!                          ▼
//!          retrieval pool ──► post-process pool ──► frame buffers ready
//! ```
//!
//! # Components
//!
//! - [`window`]: alternating window construction (`10, 11, 9, 12, 8, ...`)
//! - [`ViewportState`] / [`transition`]: per-viewport queue lifecycle
//! - [`drain_round`]: the weighted, fair scheduling round
//! - [`WorkerPool`]: bounded thread pools with backpressure
//! - [`PrefetchScheduler`]: the coordinator tying it together

mod condition;
mod config;
mod error;
mod pool;
mod scheduler;
mod stats;
mod strategy;
mod viewport;
pub mod window;

pub use condition::{
    AllFramesEligible, AlwaysPostProcess, FrameEligibility, NeverPostProcess,
    PostProcessCondition, PrefetchTarget,
};
pub use config::{
    SchedulerConfig, DEFAULT_POST_PROCESS_THREADS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RETRIEVAL_THREADS, DEFAULT_SELECTED_WEIGHT, DEFAULT_UNSELECTED_WEIGHT,
};
pub use error::PrefetchError;
pub use pool::WorkerPool;
pub use scheduler::PrefetchScheduler;
pub use stats::{PrefetchStats, PrefetchStatsSnapshot};
pub use strategy::{build_queue, drain_round, BuiltQueue, SelectionStrategy, WindowStrategy};
pub use viewport::{transition, QueueEntry, ViewportEvent, ViewportId, ViewportState};
pub use window::{window_indices, WindowSize};
