//! Prefetch seams: what to fetch, whether to fetch it, whether to finish it.

use super::PrefetchError;

/// One frame the scheduler can prefetch.
///
/// Retrieval runs on the retrieval pool; post-processing (decoding into the
/// final buffer) runs afterwards on the post-processing pool.
pub trait PrefetchTarget: Send + Sync {
    /// Frame number within its content.
    fn frame_number(&self) -> u32;

    /// Fetch the frame's raw data.
    fn retrieve(&self) -> Result<(), PrefetchError>;

    /// Turn retrieved data into its final, ready-to-display form.
    fn post_process(&self) -> Result<(), PrefetchError>;

    /// Label used in log messages.
    fn describe(&self) -> String {
        format!("frame {}", self.frame_number())
    }
}

/// Decides whether a frame is worth queueing at all.
///
/// Implemented for closures, so `|t: &dyn PrefetchTarget| t.frame_number() % 2 == 0`
/// can be passed directly.
pub trait FrameEligibility: Send + Sync {
    fn is_eligible(&self, target: &dyn PrefetchTarget) -> bool;
}

impl<F> FrameEligibility for F
where
    F: Fn(&dyn PrefetchTarget) -> bool + Send + Sync,
{
    fn is_eligible(&self, target: &dyn PrefetchTarget) -> bool {
        self(target)
    }
}

/// Every frame is eligible.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFramesEligible;

impl FrameEligibility for AllFramesEligible {
    fn is_eligible(&self, _target: &dyn PrefetchTarget) -> bool {
        true
    }
}

/// Decides whether a retrieved frame should also be post-processed.
pub trait PostProcessCondition: Send + Sync {
    fn should_post_process(&self, target: &dyn PrefetchTarget) -> bool;

    /// Human-readable description of this condition for logging.
    fn description(&self) -> &str;
}

/// Post-process every retrieved frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPostProcess;

impl PostProcessCondition for AlwaysPostProcess {
    fn should_post_process(&self, _target: &dyn PrefetchTarget) -> bool {
        true
    }

    fn description(&self) -> &str {
        "always"
    }
}

/// Retrieve only; leave decoding to the first real access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverPostProcess;

impl PostProcessCondition for NeverPostProcess {
    fn should_post_process(&self, _target: &dyn PrefetchTarget) -> bool {
        false
    }

    fn description(&self) -> &str {
        "never"
    }
}
