//! Selection strategies and the weighted scheduling round.

use super::window::{window_indices, WindowSize};
use super::{FrameEligibility, PrefetchTarget, QueueEntry, ViewportId, ViewportState};
use std::collections::VecDeque;
use std::sync::Arc;

/// Chooses which frames of a viewport's content to prefetch, and in what
/// order.
pub trait SelectionStrategy: Send + Sync {
    /// Content indices to prefetch, most urgent first.
    fn select(&self, current: usize, len: usize) -> Vec<usize>;

    /// Human-readable description of this strategy for logging.
    fn description(&self) -> String;
}

/// Alternating window around the current frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowStrategy {
    size: WindowSize,
}

impl WindowStrategy {
    pub fn new(size: WindowSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> WindowSize {
        self.size
    }
}

impl SelectionStrategy for WindowStrategy {
    fn select(&self, current: usize, len: usize) -> Vec<usize> {
        window_indices(current, len, self.size)
    }

    fn description(&self) -> String {
        format!("window({})", self.size)
    }
}

/// Result of building a viewport queue.
#[derive(Debug, Default)]
pub struct BuiltQueue {
    pub queue: VecDeque<QueueEntry>,
    /// Frames dropped by the eligibility predicate.
    pub ineligible: usize,
}

/// Build the prefetch queue of one viewport.
pub fn build_queue(
    strategy: &dyn SelectionStrategy,
    eligibility: &dyn FrameEligibility,
    viewport: ViewportId,
    generation: u64,
    content: &[Arc<dyn PrefetchTarget>],
    current: usize,
) -> BuiltQueue {
    let mut built = BuiltQueue::default();
    for index in strategy.select(current, content.len()) {
        let Some(target) = content.get(index) else {
            continue;
        };
        if eligibility.is_eligible(target.as_ref()) {
            built.queue.push_back(QueueEntry {
                viewport,
                generation,
                target: Arc::clone(target),
            });
        } else {
            built.ineligible += 1;
        }
    }
    built
}

/// Take one scheduling round from the viewport queues.
///
/// Up to `selected_weight` entries come from the selected viewport first,
/// then up to `unselected_weight` from each other viewport in the order
/// given. Every viewport is visited once per round.
pub fn drain_round<'a, I>(
    queues: I,
    selected: Option<ViewportId>,
    selected_weight: usize,
    unselected_weight: usize,
) -> Vec<QueueEntry>
where
    I: IntoIterator<Item = (ViewportId, &'a mut ViewportState)>,
{
    let mut queues: Vec<(ViewportId, &'a mut ViewportState)> = queues.into_iter().collect();
    let mut round = Vec::new();

    if let Some(position) = selected.and_then(|id| queues.iter().position(|(v, _)| *v == id)) {
        let (_, state) = queues.remove(position);
        round.extend(state.take(selected_weight));
    }
    for (_, state) in queues {
        round.extend(state.take(unselected_weight));
    }
    round
}
