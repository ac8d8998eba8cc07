//! framecache - shared frame data for multi-frame image viewers
//!
//! This library provides the memory-management core of a viewer that streams
//! multi-frame images from a remote archive:
//!
//! - [`source`]: reference-counted sharing of expensive data sources
//! - [`eviction`]: a memory budget with cost-aware LRU eviction
//! - [`frame`]: per-frame decoded buffers with lazy creation and locking
//! - [`retrieval`]: header and frame retrieval with retry and memoization
//! - [`prefetch`]: a two-stage background prefetch scheduler
//! - [`instance`]: the streaming data source tying the above together
//!
//! # Example
//!
//! ```ignore
//! use framecache::eviction::MemoryEvictionRegistry;
//! use framecache::instance::StreamingInstance;
//! use framecache::retrieval::RetrievalClient;
//! use framecache::source::ReferenceCache;
//!
//! let registry = MemoryEvictionRegistry::shared(512 * 1024 * 1024);
//! let cache = ReferenceCache::new();
//! let handle = cache.try_acquire_with("1.2.840.1", || {
//!     let client = Arc::new(RetrievalClient::new("1.2.840.1", transport.clone()));
//!     StreamingInstance::open_default(client, registry.clone())
//! })?;
//! let pixels = handle.source()?.get_pixel_buffer(0)?;
//! ```

pub mod config;
pub mod daemon;
pub mod eviction;
pub mod frame;
pub mod instance;
pub mod logging;
pub mod prefetch;
pub mod retrieval;
pub mod source;

/// Version of the framecache library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
