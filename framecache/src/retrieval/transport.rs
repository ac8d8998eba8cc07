//! Network transport abstraction.

use bytes::Bytes;
use thiserror::Error;

/// Study header of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Instance the header describes.
    pub instance_key: String,
    /// Number of frames in the instance.
    pub frame_count: u32,
    /// Whether every attribute was loaded (as opposed to a summary).
    pub complete: bool,
    /// Encoded attribute payload, opaque to this crate.
    pub attributes: Bytes,
}

/// Undecoded pixel bytes of one frame as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub frame_number: u32,
    pub data: Bytes,
}

/// Transport-level failure. All variants are treated as transient.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Source of headers and frame pixels, typically a remote image archive.
///
/// Calls block until the transfer finishes. Implementations may fail
/// transiently; the retrieval client retries.
pub trait Transport: Send + Sync {
    /// Load the header of an instance.
    ///
    /// With `force_complete` the transport must return every attribute
    /// rather than a cached summary.
    fn load_header(&self, instance_key: &str, force_complete: bool) -> Result<Header, TransportError>;

    /// Load the raw pixel bytes of one frame.
    fn load_frame_pixels(&self, instance_key: &str, frame_number: u32) -> Result<Bytes, TransportError>;
}
