//! Memory-pressure eviction of cached frame buffers.
//!
//! Every frame buffer set registers itself with an [`EvictionRegistry`],
//! reporting its size, when it was last accessed and how expensive it is to
//! regenerate. The registry may call back [`Evictable::unload`] on any
//! registrant, from any thread, to reclaim memory; the registrant regenerates
//! its content transparently on the next access.
//!
//! The registry is injected into each store as `Arc<dyn EvictionRegistry>`,
//! so tests can substitute a recording fake and applications can share a
//! single [`MemoryEvictionRegistry`] for the process lifetime.

mod daemon;
mod memory;
mod r#trait;
mod types;

pub use daemon::EvictionDaemon;
pub use memory::MemoryEvictionRegistry;
pub use r#trait::{Evictable, EvictionRegistry, NoOpEvictionRegistry};
pub use types::{ContainerId, EvictionStats, RegenerationCost, Registration};
