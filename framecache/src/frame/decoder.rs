//! The decoding collaborator behind a frame store.

use crate::eviction::RegenerationCost;
use bytes::Bytes;
use thiserror::Error;

/// Failure reported by a [`FrameDecoder`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Produces the buffers of a frame on demand.
///
/// Called with the frame's lock held, so implementations must never call
/// back into the store that owns them.
pub trait FrameDecoder: Send + Sync {
    /// Number of frames in the instance. Frame numbers are `0..frame_count`.
    fn frame_count(&self) -> u32;

    /// Decode the normalized pixel buffer of a frame.
    fn create_pixel_buffer(&self, frame_number: u32) -> Result<Bytes, DecodeError>;

    /// Decode one overlay plane of a frame.
    fn create_overlay_buffer(&self, frame_number: u32, overlay_index: u16)
        -> Result<Bytes, DecodeError>;

    /// How expensive this decoder's buffers are to regenerate.
    fn regeneration_cost(&self) -> RegenerationCost {
        RegenerationCost::Medium
    }

    /// Release any upstream resources held for a frame that was unloaded.
    fn release(&self, _frame_number: u32) {}
}
