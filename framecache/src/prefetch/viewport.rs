//! Per-viewport prefetch queue state.

use super::PrefetchTarget;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a viewport registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(u64);

impl ViewportId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport-{}", self.0)
    }
}

/// A frame waiting to be prefetched for a viewport.
///
/// Valid only while the viewport's generation still equals `generation`.
#[derive(Clone)]
pub struct QueueEntry {
    pub viewport: ViewportId,
    pub generation: u64,
    pub target: Arc<dyn PrefetchTarget>,
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEntry")
            .field("viewport", &self.viewport)
            .field("generation", &self.generation)
            .field("frame", &self.target.frame_number())
            .finish()
    }
}

/// Prefetch state of one viewport.
#[derive(Debug, Default)]
pub enum ViewportState {
    /// Nothing left to prefetch.
    #[default]
    Idle,
    /// Frames waiting to be prefetched, in priority order.
    Windowed { queue: VecDeque<QueueEntry> },
}

/// Something that happened to a viewport.
#[derive(Debug)]
pub enum ViewportEvent {
    /// The visible frame changed; carries the rebuilt queue.
    Navigated { queue: VecDeque<QueueEntry> },
    /// The displayed content was replaced; carries the rebuilt queue.
    ContentChanged { queue: VecDeque<QueueEntry> },
    /// Every queued entry has been handed out.
    Drained,
}

/// Next state of a viewport after `event`.
///
/// Navigation and content changes replace the queue wholesale; nothing from
/// the previous window survives.
pub fn transition(state: ViewportState, event: ViewportEvent) -> ViewportState {
    match (state, event) {
        (_, ViewportEvent::Navigated { queue }) | (_, ViewportEvent::ContentChanged { queue }) => {
            if queue.is_empty() {
                ViewportState::Idle
            } else {
                ViewportState::Windowed { queue }
            }
        }
        (_, ViewportEvent::Drained) => ViewportState::Idle,
    }
}

impl ViewportState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Entries still queued.
    pub fn pending(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Windowed { queue } => queue.len(),
        }
    }

    /// Remove up to `n` entries from the front of the queue.
    ///
    /// Moves to [`Idle`](Self::Idle) once the queue is empty.
    pub fn take(&mut self, n: usize) -> Vec<QueueEntry> {
        let taken: Vec<QueueEntry> = match self {
            Self::Idle => return Vec::new(),
            Self::Windowed { queue } => {
                let count = n.min(queue.len());
                queue.drain(..count).collect()
            }
        };
        if self.pending() == 0 {
            *self = transition(std::mem::take(self), ViewportEvent::Drained);
        }
        taken
    }
}
