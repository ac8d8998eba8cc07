//! Lazily populated per-instance frame store.

use super::{FrameData, FrameDecoder, FrameError, FrameLock};
use crate::eviction::EvictionRegistry;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Buffer store for all frames of one instance.
///
/// Frames are materialized on first access and registered with the shared
/// eviction registry. Different frames are independent: a caller decoding
/// frame 3 never blocks a caller reading frame 4.
pub struct FrameDataStore {
    identifier: Arc<str>,
    decoder: Arc<dyn FrameDecoder>,
    registry: Arc<dyn EvictionRegistry>,
    frames: DashMap<u32, Arc<FrameData>>,
    disposed: AtomicBool,
}

impl FrameDataStore {
    pub fn new(
        identifier: impl Into<Arc<str>>,
        decoder: Arc<dyn FrameDecoder>,
        registry: Arc<dyn EvictionRegistry>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            decoder,
            registry,
            frames: DashMap::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn frame_count(&self) -> u32 {
        self.decoder.frame_count()
    }

    fn disposed_error(&self) -> FrameError {
        FrameError::Disposed {
            identifier: self.identifier.to_string(),
        }
    }

    /// Get (creating if needed) the buffer set for a frame.
    pub fn frame(&self, frame_number: u32) -> Result<Arc<FrameData>, FrameError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(self.disposed_error());
        }
        let frame_count = self.decoder.frame_count();
        if frame_number >= frame_count {
            return Err(FrameError::FrameOutOfRange {
                frame: frame_number,
                frame_count,
            });
        }

        let frame = self
            .frames
            .entry(frame_number)
            .or_insert_with(|| {
                FrameData::new(
                    Arc::clone(&self.identifier),
                    frame_number,
                    Arc::clone(&self.decoder),
                    Arc::clone(&self.registry),
                )
            })
            .clone();

        // Raced with dispose(): the frame may have been inserted after the sweep
        if self.disposed.load(Ordering::Acquire) {
            frame.dispose();
            return Err(self.disposed_error());
        }
        Ok(frame)
    }

    /// Get the pixel buffer of a frame, decoding it on first access.
    pub fn get_pixel_buffer(&self, frame_number: u32) -> Result<Bytes, FrameError> {
        self.frame(frame_number)?.get_pixel_buffer()
    }

    /// Get one overlay buffer of a frame, decoding it on first access.
    pub fn get_overlay_buffer(&self, frame_number: u32, overlay_index: u16) -> Result<Bytes, FrameError> {
        self.frame(frame_number)?.get_overlay_buffer(overlay_index)
    }

    /// Pin a frame against eviction.
    pub fn lock_frame(&self, frame_number: u32) -> Result<FrameLock, FrameError> {
        Ok(self.frame(frame_number)?.lock())
    }

    /// Unload one frame. Returns `false` if it is locked.
    pub fn unload_frame(&self, frame_number: u32) -> bool {
        let frame = self.frames.get(&frame_number).map(|f| Arc::clone(f.value()));
        match frame {
            Some(frame) => frame.unload(),
            None => {
                self.decoder.release(frame_number);
                true
            }
        }
    }

    /// Unload every unlocked frame. Returns the number of frames unloaded.
    pub fn unload(&self) -> usize {
        let frames: Vec<Arc<FrameData>> = self.frames.iter().map(|f| Arc::clone(f.value())).collect();
        let unloaded = frames.iter().filter(|frame| frame.unload()).count();
        debug!(identifier = %self.identifier, unloaded, total = frames.len(), "Store unloaded");
        unloaded
    }

    /// Drop all buffers and unregister every frame, ignoring locks.
    ///
    /// Every later access fails with [`FrameError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let frames: Vec<Arc<FrameData>> = self.frames.iter().map(|f| Arc::clone(f.value())).collect();
        for frame in &frames {
            frame.dispose();
        }
        self.frames.clear();
        debug!(identifier = %self.identifier, frames = frames.len(), "Store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether any buffer of the frame is resident.
    pub fn is_loaded(&self, frame_number: u32) -> bool {
        self.frames
            .get(&frame_number)
            .map(|f| f.is_loaded())
            .unwrap_or(false)
    }

    /// Frame numbers with at least one resident buffer, ascending.
    pub fn loaded_frames(&self) -> Vec<u32> {
        let mut loaded: Vec<u32> = self
            .frames
            .iter()
            .filter(|f| f.is_loaded())
            .map(|f| *f.key())
            .collect();
        loaded.sort_unstable();
        loaded
    }

    /// Bytes currently resident across all frames.
    pub fn memory_usage(&self) -> usize {
        self.frames.iter().map(|f| f.size_bytes()).sum()
    }
}

impl Drop for FrameDataStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for FrameDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDataStore")
            .field("identifier", &self.identifier)
            .field("frames", &self.frames.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
