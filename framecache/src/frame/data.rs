//! Per-frame buffer set with lazy creation and eviction.

use super::{BufferKind, DecodeError, FrameBuffer, FrameDecoder, FrameError};
use crate::eviction::{ContainerId, Evictable, EvictionRegistry, Registration};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, trace};

#[derive(Default)]
struct FrameState {
    pixel: Option<FrameBuffer>,
    overlays: BTreeMap<u16, FrameBuffer>,
    failures: HashMap<BufferKind, DecodeError>,
    lock_count: usize,
    registered: bool,
    disposed: bool,
}

impl FrameState {
    fn buffer_mut(&mut self, kind: BufferKind) -> Option<&mut FrameBuffer> {
        match kind {
            BufferKind::Pixel => self.pixel.as_mut(),
            BufferKind::Overlay(index) => self.overlays.get_mut(&index),
        }
    }

    fn insert(&mut self, kind: BufferKind, buffer: FrameBuffer) {
        match kind {
            BufferKind::Pixel => self.pixel = Some(buffer),
            BufferKind::Overlay(index) => {
                self.overlays.insert(index, buffer);
            }
        }
    }

    fn size_bytes(&self) -> usize {
        self.pixel.as_ref().map(FrameBuffer::size_bytes).unwrap_or(0)
            + self.overlays.values().map(FrameBuffer::size_bytes).sum::<usize>()
    }

    fn last_accessed(&self) -> Option<Instant> {
        self.pixel
            .iter()
            .chain(self.overlays.values())
            .map(FrameBuffer::last_accessed)
            .max()
    }

    fn is_loaded(&self) -> bool {
        self.pixel.is_some() || !self.overlays.is_empty()
    }

    fn clear(&mut self) {
        self.pixel = None;
        self.overlays.clear();
        self.failures.clear();
    }
}

/// The pixel buffer and overlay buffers of one frame.
///
/// Buffers are created on first access by the store's [`FrameDecoder`] while
/// the frame's lock is held, so concurrent readers of the same frame decode
/// once. The whole set is registered with the eviction registry as a single
/// container and can be unloaded at any time; the next access regenerates.
pub struct FrameData {
    identifier: Arc<str>,
    frame_number: u32,
    container: ContainerId,
    decoder: Arc<dyn FrameDecoder>,
    registry: Arc<dyn EvictionRegistry>,
    state: Mutex<FrameState>,
    self_ref: Weak<FrameData>,
}

impl FrameData {
    pub(crate) fn new(
        identifier: Arc<str>,
        frame_number: u32,
        decoder: Arc<dyn FrameDecoder>,
        registry: Arc<dyn EvictionRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            identifier,
            frame_number,
            container: ContainerId::next(),
            decoder,
            registry,
            state: Mutex::new(FrameState::default()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Container id under which this frame registers for eviction.
    pub fn container_id(&self) -> ContainerId {
        self.container
    }

    /// Get the pixel buffer, decoding it on first access.
    pub fn get_pixel_buffer(&self) -> Result<Bytes, FrameError> {
        self.get_or_create(BufferKind::Pixel, || {
            self.decoder.create_pixel_buffer(self.frame_number)
        })
    }

    /// Get one overlay buffer, decoding it on first access.
    pub fn get_overlay_buffer(&self, overlay_index: u16) -> Result<Bytes, FrameError> {
        self.get_or_create(BufferKind::Overlay(overlay_index), || {
            self.decoder
                .create_overlay_buffer(self.frame_number, overlay_index)
        })
    }

    fn get_or_create<F>(&self, kind: BufferKind, create: F) -> Result<Bytes, FrameError>
    where
        F: FnOnce() -> Result<Bytes, DecodeError>,
    {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(FrameError::Disposed {
                identifier: self.identifier.to_string(),
            });
        }

        if let Some(buffer) = state.buffer_mut(kind) {
            let bytes = buffer.touch();
            self.registry.touch(self.container, Instant::now());
            trace!(identifier = %self.identifier, frame = self.frame_number, %kind, "Buffer hit");
            return Ok(bytes);
        }

        if let Some(failure) = state.failures.get(&kind) {
            return Err(FrameError::Decode {
                frame: self.frame_number,
                kind,
                source: failure.clone(),
            });
        }

        match create() {
            Ok(bytes) => {
                let cost = self.decoder.regeneration_cost();
                state.insert(kind, FrameBuffer::new(bytes.clone(), cost));
                self.register(&mut state);
                debug!(
                    identifier = %self.identifier,
                    frame = self.frame_number,
                    %kind,
                    size_bytes = bytes.len(),
                    "Buffer created"
                );
                Ok(bytes)
            }
            Err(source) => {
                debug!(
                    identifier = %self.identifier,
                    frame = self.frame_number,
                    %kind,
                    error = %source,
                    "Buffer decode failed"
                );
                state.failures.insert(kind, source.clone());
                Err(FrameError::Decode {
                    frame: self.frame_number,
                    kind,
                    source,
                })
            }
        }
    }

    /// Register (or refresh) the container with the current total size.
    fn register(&self, state: &mut FrameState) {
        let target: Weak<dyn Evictable> = self.self_ref.clone();
        self.registry.register(
            self.container,
            Registration {
                size_bytes: state.size_bytes(),
                last_access: state.last_accessed().unwrap_or_else(Instant::now),
                cost: self.decoder.regeneration_cost(),
                target,
            },
        );
        state.registered = true;
    }

    fn unregister(&self, state: &mut FrameState) {
        if state.registered {
            self.registry.unregister(self.container);
            state.registered = false;
        }
    }

    /// Drop every buffer of this frame and any memoized decode failure.
    ///
    /// Returns `false` (and keeps the buffers) while the frame is locked.
    /// The frame stays usable; the next access regenerates.
    pub fn unload(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            return true;
        }
        if state.lock_count > 0 {
            trace!(identifier = %self.identifier, frame = self.frame_number, "Unload refused, frame locked");
            return false;
        }
        let was_loaded = state.is_loaded();
        state.clear();
        self.unregister(&mut state);
        drop(state);

        self.decoder.release(self.frame_number);
        if was_loaded {
            debug!(identifier = %self.identifier, frame = self.frame_number, "Frame unloaded");
        }
        true
    }

    /// Drop every buffer regardless of locks and refuse further access.
    pub(crate) fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.clear();
        self.unregister(&mut state);
        drop(state);

        self.decoder.release(self.frame_number);
    }

    /// Pin this frame against eviction until the guard is dropped.
    pub fn lock(&self) -> FrameLock {
        self.state.lock().lock_count += 1;
        self.registry.lock(self.container);
        FrameLock {
            frame: self.self_ref.clone(),
            registry: Arc::clone(&self.registry),
            container: self.container,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().lock_count > 0
    }

    /// Whether any buffer of this frame is currently resident.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().is_loaded()
    }

    /// Bytes currently held by this frame.
    pub fn size_bytes(&self) -> usize {
        self.state.lock().size_bytes()
    }
}

impl Evictable for FrameData {
    fn unload(&self) {
        FrameData::unload(self);
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameData")
            .field("identifier", &self.identifier)
            .field("frame_number", &self.frame_number)
            .field("container", &self.container)
            .finish()
    }
}

/// RAII guard keeping a frame pinned against eviction.
#[must_use = "the frame is unlocked as soon as the guard is dropped"]
pub struct FrameLock {
    frame: Weak<FrameData>,
    registry: Arc<dyn EvictionRegistry>,
    container: ContainerId,
}

impl FrameLock {
    pub fn container_id(&self) -> ContainerId {
        self.container
    }
}

impl Drop for FrameLock {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.upgrade() {
            let mut state = frame.state.lock();
            state.lock_count = state.lock_count.saturating_sub(1);
        }
        self.registry.unlock(self.container);
    }
}

impl std::fmt::Debug for FrameLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLock")
            .field("container", &self.container)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::{MemoryEvictionRegistry, NoOpEvictionRegistry};
    use crate::frame::testing::CountingDecoder;

    fn frame_with(
        decoder: Arc<CountingDecoder>,
        registry: Arc<dyn EvictionRegistry>,
    ) -> Arc<FrameData> {
        FrameData::new(Arc::from("inst"), 1, decoder, registry)
    }

    #[test]
    fn test_pixel_buffer_decoded_once() {
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder.clone(), Arc::new(NoOpEvictionRegistry));

        let first = frame.get_pixel_buffer().unwrap();
        let second = frame.get_pixel_buffer().unwrap();

        assert_eq!(first, second);
        assert_eq!(decoder.pixel_calls(), 1);
    }

    #[test]
    fn test_unload_regenerates_equal_content() {
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder.clone(), Arc::new(NoOpEvictionRegistry));

        let before = frame.get_pixel_buffer().unwrap();
        let overlay = frame.get_overlay_buffer(0).unwrap();
        assert!(frame.unload());
        assert!(!frame.is_loaded());
        assert_eq!(decoder.releases(), 1);

        assert_eq!(frame.get_pixel_buffer().unwrap(), before);
        assert_eq!(frame.get_overlay_buffer(0).unwrap(), overlay);
        assert_eq!(decoder.pixel_calls(), 2);
        assert_eq!(decoder.overlay_calls(), 2);
    }

    #[test]
    fn test_decode_failure_memoized_until_unload() {
        let decoder = Arc::new(CountingDecoder::new(4));
        decoder.fail_pixels(true);
        let frame = frame_with(decoder.clone(), Arc::new(NoOpEvictionRegistry));

        let first = frame.get_pixel_buffer().unwrap_err();
        let second = frame.get_pixel_buffer().unwrap_err();
        assert_eq!(first, second);
        assert_eq!(decoder.pixel_calls(), 1);

        decoder.fail_pixels(false);
        frame.unload();
        assert!(frame.get_pixel_buffer().is_ok());
        assert_eq!(decoder.pixel_calls(), 2);
    }

    #[test]
    fn test_registration_tracks_total_size() {
        let registry = MemoryEvictionRegistry::shared(1 << 20);
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder, registry.clone());

        let pixel = frame.get_pixel_buffer().unwrap();
        let overlay = frame.get_overlay_buffer(3).unwrap();
        assert_eq!(registry.current_bytes(), pixel.len() + overlay.len());
        assert_eq!(frame.size_bytes(), pixel.len() + overlay.len());

        frame.unload();
        assert_eq!(registry.current_bytes(), 0);
        assert!(!registry.is_registered(frame.container_id()));
    }

    #[test]
    fn test_locked_frame_refuses_unload() {
        let registry = MemoryEvictionRegistry::shared(0);
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder.clone(), registry.clone());
        frame.get_pixel_buffer().unwrap();

        let guard = frame.lock();
        assert!(frame.is_locked());
        assert_eq!(registry.evict_if_over_limit(), 0);
        assert!(!frame.unload());
        assert!(frame.is_loaded());

        drop(guard);
        assert!(!frame.is_locked());
        assert_eq!(registry.evict_if_over_limit(), 1);
        assert!(!frame.is_loaded());
    }

    #[test]
    fn test_eviction_callback_unloads_frame() {
        let registry = MemoryEvictionRegistry::shared(1);
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder.clone(), registry.clone());
        frame.get_pixel_buffer().unwrap();

        registry.evict_if_over_limit();
        assert!(!frame.is_loaded());

        frame.get_pixel_buffer().unwrap();
        assert_eq!(decoder.pixel_calls(), 2);
    }

    #[test]
    fn test_dispose_ignores_locks() {
        let registry = MemoryEvictionRegistry::shared(1 << 20);
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder, registry.clone());
        frame.get_pixel_buffer().unwrap();
        let _guard = frame.lock();

        frame.dispose();
        assert!(!frame.is_loaded());
        assert_eq!(registry.current_bytes(), 0);
        assert!(matches!(
            frame.get_pixel_buffer(),
            Err(FrameError::Disposed { .. })
        ));
    }

    #[test]
    fn test_lock_guard_outlives_frame() {
        let registry = MemoryEvictionRegistry::shared(1 << 20);
        let decoder = Arc::new(CountingDecoder::new(4));
        let frame = frame_with(decoder, registry.clone());
        let guard = frame.lock();
        let id = guard.container_id();

        drop(frame);
        assert!(registry.is_locked(id));
        drop(guard);
        assert!(!registry.is_locked(id));
    }
}
