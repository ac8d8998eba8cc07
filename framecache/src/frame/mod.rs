//! Per-frame lazy buffer store with eviction.
//!
//! A [`FrameDataStore`] owns one [`FrameData`] per frame of an instance. Each
//! frame holds a pixel buffer and any number of overlay buffers, created on
//! first access by a [`FrameDecoder`] and cached until the eviction registry
//! (or the caller) unloads them.
//!
//! ```text
//! get_pixel_buffer(n) ──► FrameDataStore ──► FrameData[n] ──lock──► cached?
//!                                                 │                   │ no
//!                                                 │                   ▼
//!                                                 │             FrameDecoder
//!                                                 ▼
//!                                        EvictionRegistry (register / touch)
//! ```

mod buffer;
mod data;
mod decoder;
mod error;
mod store;

pub use buffer::{BufferKind, FrameBuffer, FrameKey};
pub use data::{FrameData, FrameLock};
pub use decoder::{DecodeError, FrameDecoder};
pub use error::FrameError;
pub use store::FrameDataStore;
