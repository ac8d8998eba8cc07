//! Frame store error types.

use super::{BufferKind, DecodeError};
use thiserror::Error;

/// Errors returned by frame buffer accessors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The decoder failed. Repeated until the frame is unloaded.
    #[error("failed to decode {kind} buffer of frame {frame}: {source}")]
    Decode {
        frame: u32,
        kind: BufferKind,
        #[source]
        source: DecodeError,
    },

    /// The store was disposed.
    #[error("frame store for '{identifier}' has been disposed")]
    Disposed { identifier: String },

    /// Frame number outside `0..frame_count`.
    #[error("frame {frame} is out of range (instance has {frame_count} frames)")]
    FrameOutOfRange { frame: u32, frame_count: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FrameError::Decode {
            frame: 3,
            kind: BufferKind::Pixel,
            source: DecodeError::new("truncated stream"),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode pixel buffer of frame 3: truncated stream"
        );

        let err = FrameError::FrameOutOfRange {
            frame: 12,
            frame_count: 10,
        };
        assert!(err.to_string().contains("12"));
    }
}
