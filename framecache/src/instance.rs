//! Network-streamed instances.
//!
//! A [`StreamingInstance`] is the data source shared through the
//! [`ReferenceCache`](crate::source::ReferenceCache): it owns the
//! [`RetrievalClient`] for one instance and a [`FrameDataStore`] whose
//! decoder pulls raw frames through that client. Decoded buffers and the
//! client's raw frames are accounted in the same eviction registry.
//!
//! ```text
//! get_pixel_buffer(n) ─► FrameDataStore ─► StreamingFrameDecoder
//!                                              │ retrieve_frame_pixels(n)
//!                                              ▼
//!                                        RetrievalClient ─► Transport
//!                                              │ RawFrame
//!                                              ▼
//!                                        PixelNormalizer ─► pixel buffer
//! ```

use crate::eviction::{EvictionRegistry, RegenerationCost};
use crate::frame::{DecodeError, FrameDataStore, FrameDecoder, FrameError, FrameLock};
use crate::prefetch::{PrefetchError, PrefetchTarget};
use crate::retrieval::{Header, RawFrame, RetrievalClient, RetrievalError, RetrievalStatsSnapshot};
use crate::source::{DataSource, DisposeError};
use bytes::Bytes;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Converts raw transport pixels into the normalized pixel buffer.
pub trait PixelNormalizer: Send + Sync {
    fn normalize(&self, header: &Header, raw: &RawFrame) -> Result<Bytes, DecodeError>;
}

/// Returns raw pixels unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughNormalizer;

impl PixelNormalizer for PassthroughNormalizer {
    fn normalize(&self, _header: &Header, raw: &RawFrame) -> Result<Bytes, DecodeError> {
        Ok(raw.data.clone())
    }
}

/// Extracts overlay planes from a frame.
pub trait OverlayExtractor: Send + Sync {
    fn extract(&self, header: &Header, raw: &RawFrame, overlay_index: u16) -> Result<Bytes, DecodeError>;
}

/// Extractor for instances without overlays.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverlays;

impl OverlayExtractor for NoOverlays {
    fn extract(&self, _header: &Header, raw: &RawFrame, overlay_index: u16) -> Result<Bytes, DecodeError> {
        Err(DecodeError::new(format!(
            "frame {} has no overlay {}",
            raw.frame_number, overlay_index
        )))
    }
}

fn decode_error(error: RetrievalError) -> DecodeError {
    DecodeError::new(error.to_string())
}

/// [`FrameDecoder`] backed by a [`RetrievalClient`].
pub struct StreamingFrameDecoder {
    client: Arc<RetrievalClient>,
    header: Header,
    normalizer: Arc<dyn PixelNormalizer>,
    overlays: Arc<dyn OverlayExtractor>,
}

impl StreamingFrameDecoder {
    pub fn new(
        client: Arc<RetrievalClient>,
        header: Header,
        normalizer: Arc<dyn PixelNormalizer>,
        overlays: Arc<dyn OverlayExtractor>,
    ) -> Self {
        Self {
            client,
            header,
            normalizer,
            overlays,
        }
    }
}

impl FrameDecoder for StreamingFrameDecoder {
    fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    fn create_pixel_buffer(&self, frame_number: u32) -> Result<Bytes, DecodeError> {
        let raw = self
            .client
            .retrieve_frame_pixels(frame_number)
            .map_err(decode_error)?;
        self.normalizer.normalize(&self.header, &raw)
    }

    fn create_overlay_buffer(&self, frame_number: u32, overlay_index: u16) -> Result<Bytes, DecodeError> {
        let raw = self
            .client
            .retrieve_frame_pixels(frame_number)
            .map_err(decode_error)?;
        self.overlays.extract(&self.header, &raw, overlay_index)
    }

    fn regeneration_cost(&self) -> RegenerationCost {
        RegenerationCost::Medium
    }

    fn release(&self, frame_number: u32) {
        self.client.unload_frame(frame_number);
    }
}

/// One instance streamed from a remote archive.
pub struct StreamingInstance {
    client: Arc<RetrievalClient>,
    header: Header,
    store: Arc<FrameDataStore>,
}

impl StreamingInstance {
    /// Retrieve the header and set up the frame store.
    ///
    /// # Errors
    ///
    /// Returns the retrieval error if the header cannot be retrieved.
    pub fn open(
        client: Arc<RetrievalClient>,
        registry: Arc<dyn EvictionRegistry>,
        normalizer: Arc<dyn PixelNormalizer>,
        overlays: Arc<dyn OverlayExtractor>,
    ) -> Result<Self, RetrievalError> {
        let header = client.retrieve_full_header()?;
        client.set_eviction_registry(Arc::clone(&registry));
        let decoder = StreamingFrameDecoder::new(
            Arc::clone(&client),
            header.clone(),
            normalizer,
            overlays,
        );
        let store = FrameDataStore::new(client.instance_key(), Arc::new(decoder), registry);
        debug!(instance = %client.instance_key(), frames = header.frame_count, "Instance opened");
        Ok(Self {
            client,
            header,
            store: Arc::new(store),
        })
    }

    /// Open with passthrough pixels and no overlays.
    pub fn open_default(
        client: Arc<RetrievalClient>,
        registry: Arc<dyn EvictionRegistry>,
    ) -> Result<Self, RetrievalError> {
        Self::open(
            client,
            registry,
            Arc::new(PassthroughNormalizer),
            Arc::new(NoOverlays),
        )
    }

    pub fn instance_key(&self) -> &str {
        self.client.instance_key()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    pub fn client(&self) -> &Arc<RetrievalClient> {
        &self.client
    }

    pub fn store(&self) -> &FrameDataStore {
        &self.store
    }

    pub fn get_pixel_buffer(&self, frame_number: u32) -> Result<Bytes, FrameError> {
        self.store.get_pixel_buffer(frame_number)
    }

    pub fn get_overlay_buffer(&self, frame_number: u32, overlay_index: u16) -> Result<Bytes, FrameError> {
        self.store.get_overlay_buffer(frame_number, overlay_index)
    }

    pub fn lock_frame(&self, frame_number: u32) -> Result<FrameLock, FrameError> {
        self.store.lock_frame(frame_number)
    }

    /// Unload a frame's buffers and its retrieved raw pixels.
    pub fn unload_frame(&self, frame_number: u32) -> bool {
        self.store.unload_frame(frame_number)
    }

    /// Prefetch target for one frame.
    pub fn frame_target(&self, frame_number: u32) -> Arc<dyn PrefetchTarget> {
        Arc::new(StreamingFrameTarget {
            frame_number,
            client: Arc::clone(&self.client),
            store: Arc::downgrade(&self.store),
        })
    }

    /// Prefetch targets for every frame, in frame order.
    pub fn frame_targets(&self) -> Vec<Arc<dyn PrefetchTarget>> {
        (0..self.frame_count()).map(|n| self.frame_target(n)).collect()
    }

    pub fn retrieval_stats(&self) -> RetrievalStatsSnapshot {
        self.client.stats()
    }
}

impl DataSource for StreamingInstance {
    fn dispose(&self) -> Result<(), DisposeError> {
        self.store.dispose();
        self.client.reset();
        debug!(instance = %self.instance_key(), "Instance disposed");
        Ok(())
    }
}

impl std::fmt::Debug for StreamingInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingInstance")
            .field("instance_key", &self.instance_key())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

/// Prefetch target for one frame of a [`StreamingInstance`].
///
/// Holds the store weakly so queued prefetch work never keeps a released
/// instance's buffers alive.
struct StreamingFrameTarget {
    frame_number: u32,
    client: Arc<RetrievalClient>,
    store: Weak<FrameDataStore>,
}

impl PrefetchTarget for StreamingFrameTarget {
    fn frame_number(&self) -> u32 {
        self.frame_number
    }

    fn retrieve(&self) -> Result<(), PrefetchError> {
        self.client
            .retrieve_frame_pixels(self.frame_number)
            .map(|_| ())
            .map_err(|e| PrefetchError::task(self.frame_number, e.to_string()))
    }

    fn post_process(&self) -> Result<(), PrefetchError> {
        let store = self
            .store
            .upgrade()
            .ok_or_else(|| PrefetchError::task(self.frame_number, "instance released"))?;
        store
            .get_pixel_buffer(self.frame_number)
            .map(|_| ())
            .map_err(|e| PrefetchError::task(self.frame_number, e.to_string()))
    }

    fn describe(&self) -> String {
        format!("{} frame {}", self.client.instance_key(), self.frame_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::{MemoryEvictionRegistry, NoOpEvictionRegistry};
    use crate::retrieval::{ManualClock, Transport, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeArchive {
        frames: u32,
        frame_calls: AtomicUsize,
        fail_frames: bool,
    }

    impl FakeArchive {
        fn new(frames: u32) -> Arc<Self> {
            Arc::new(Self {
                frames,
                frame_calls: AtomicUsize::new(0),
                fail_frames: false,
            })
        }
    }

    impl Transport for FakeArchive {
        fn load_header(&self, instance_key: &str, force_complete: bool) -> Result<Header, TransportError> {
            Ok(Header {
                instance_key: instance_key.to_string(),
                frame_count: self.frames,
                complete: force_complete,
                attributes: Bytes::new(),
            })
        }

        fn load_frame_pixels(&self, _instance_key: &str, frame_number: u32) -> Result<Bytes, TransportError> {
            self.frame_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_frames {
                return Err(TransportError::Timeout);
            }
            Ok(Bytes::from(vec![frame_number as u8; 128]))
        }
    }

    /// Inverts every byte so normalized buffers differ from raw ones.
    struct Invert;

    impl PixelNormalizer for Invert {
        fn normalize(&self, _header: &Header, raw: &RawFrame) -> Result<Bytes, DecodeError> {
            Ok(raw.data.iter().map(|b| !b).collect::<Vec<u8>>().into())
        }
    }

    fn open(archive: Arc<FakeArchive>, registry: Arc<dyn EvictionRegistry>) -> StreamingInstance {
        let client = RetrievalClient::new("1.2.3.4", archive).with_clock(Arc::new(ManualClock::new()));
        StreamingInstance::open(
            Arc::new(client),
            registry,
            Arc::new(Invert),
            Arc::new(NoOverlays),
        )
        .unwrap()
    }

    #[test]
    fn test_pixel_buffer_is_normalized() {
        let instance = open(FakeArchive::new(4), Arc::new(NoOpEvictionRegistry));
        let pixels = instance.get_pixel_buffer(2).unwrap();
        assert_eq!(pixels.len(), 128);
        assert!(pixels.iter().all(|&b| b == !2u8));
        assert_eq!(instance.frame_count(), 4);
    }

    #[test]
    fn test_unload_releases_raw_pixels() {
        let archive = FakeArchive::new(4);
        let instance = open(archive.clone(), Arc::new(NoOpEvictionRegistry));

        instance.get_pixel_buffer(1).unwrap();
        assert!(instance.client().is_frame_cached(1));

        assert!(instance.unload_frame(1));
        assert!(!instance.client().is_frame_cached(1));

        instance.get_pixel_buffer(1).unwrap();
        assert_eq!(archive.frame_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_eviction_releases_raw_pixels() {
        let registry = MemoryEvictionRegistry::shared(64);
        let instance = open(FakeArchive::new(4), registry.clone());
        instance.get_pixel_buffer(0).unwrap();

        assert_eq!(registry.evict_if_over_limit(), 1);
        assert!(!instance.store().is_loaded(0));
        assert!(!instance.client().is_frame_cached(0));
    }

    #[test]
    fn test_missing_overlay_is_a_decode_error() {
        let instance = open(FakeArchive::new(2), Arc::new(NoOpEvictionRegistry));
        assert!(matches!(
            instance.get_overlay_buffer(0, 1),
            Err(FrameError::Decode { .. })
        ));
    }

    #[test]
    fn test_retrieval_failure_surfaces_as_decode_error() {
        let archive = Arc::new(FakeArchive {
            frames: 2,
            frame_calls: AtomicUsize::new(0),
            fail_frames: true,
        });
        let instance = open(archive.clone(), Arc::new(NoOpEvictionRegistry));

        let err = instance.get_pixel_buffer(0).unwrap_err();
        assert!(matches!(err, FrameError::Decode { frame: 0, .. }));
        // Memoized at both layers
        instance.get_pixel_buffer(0).unwrap_err();
        assert_eq!(archive.frame_calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_frame_target_prefetches() {
        let archive = FakeArchive::new(3);
        let instance = open(archive.clone(), Arc::new(NoOpEvictionRegistry));
        let target = instance.frame_target(2);

        target.retrieve().unwrap();
        assert!(instance.client().is_frame_cached(2));
        assert!(!instance.store().is_loaded(2));

        target.post_process().unwrap();
        assert!(instance.store().is_loaded(2));
        assert_eq!(archive.frame_calls.load(Ordering::SeqCst), 1);
        assert_eq!(target.describe(), "1.2.3.4 frame 2");
    }

    #[test]
    fn test_dispose_rejects_access_and_targets() {
        let instance = open(FakeArchive::new(3), Arc::new(NoOpEvictionRegistry));
        let target = instance.frame_target(0);
        instance.get_pixel_buffer(0).unwrap();

        instance.dispose().unwrap();
        assert!(matches!(
            instance.get_pixel_buffer(0),
            Err(FrameError::Disposed { .. })
        ));
        assert!(target.post_process().is_err());
    }

    #[test]
    fn test_frame_targets_cover_all_frames() {
        let instance = open(FakeArchive::new(5), Arc::new(NoOpEvictionRegistry));
        let frames: Vec<u32> = instance.frame_targets().iter().map(|t| t.frame_number()).collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
    }
}
