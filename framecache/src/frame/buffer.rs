//! Decoded frame buffers and their keys.

use crate::eviction::RegenerationCost;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Which buffer of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferKind {
    /// Normalized pixel data.
    Pixel,
    /// One overlay plane, by overlay index.
    Overlay(u16),
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixel => write!(f, "pixel"),
            Self::Overlay(index) => write!(f, "overlay {}", index),
        }
    }
}

/// Globally unique address of one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    /// Instance identifier.
    pub identifier: Arc<str>,
    /// Zero-based frame number within the instance.
    pub frame_number: u32,
    /// Pixel or overlay.
    pub kind: BufferKind,
}

impl FrameKey {
    pub fn new(identifier: impl Into<Arc<str>>, frame_number: u32, kind: BufferKind) -> Self {
        Self {
            identifier: identifier.into(),
            frame_number,
            kind,
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.identifier, self.frame_number, self.kind)
    }
}

/// An immutable decoded buffer plus its eviction metadata.
///
/// The bytes are reference counted, so handing them to a consumer is a cheap
/// clone and stays valid after the buffer is unloaded from its frame.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Bytes,
    last_accessed: Instant,
    cost: RegenerationCost,
}

impl FrameBuffer {
    pub fn new(data: Bytes, cost: RegenerationCost) -> Self {
        Self {
            data,
            last_accessed: Instant::now(),
            cost,
        }
    }

    /// Buffer contents.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn cost(&self) -> RegenerationCost {
        self.cost
    }

    /// Record an access and return the bytes.
    pub(crate) fn touch(&mut self) -> Bytes {
        self.last_accessed = Instant::now();
        self.data.clone()
    }
}
