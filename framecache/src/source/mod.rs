//! Reference-counted cache of expensive data sources.
//!
//! Many consumers (frames, viewports, prefetch workers) share one data source
//! per instance without any of them being its clear owner. The
//! [`ReferenceCache`] keeps a weak registry `identifier → DataSourceItem` and
//! hands out [`ReferenceHandle`]s; the data source is disposed exactly once,
//! when the last handle (clones included) is released.
//!
//! ```text
//! acquire("1.2.3") ──► registry lock ──► live item? ──yes──► add_ref ──► handle
//!                                            │
//!                                            no
//!                                            ▼
//!                                   register candidate ──► handle
//!
//! handle dropped ──► item lock: count -= 1 ──► zero? ──► dispose source
//!                                                       └─► remove from registry
//! ```
//!
//! Handles release in `Drop`, so the last release normally removes the row.
//! A leaked handle (`mem::forget`) keeps its item alive and its row live.
//! Sweeping covers rows that outlive their item, such as when a source's
//! `dispose()` panics before the row is removed: the next `acquire` after a
//! dirty mark sweeps, and a [`RegistrySweeper`] thread sweeps periodically.

mod error;
mod handle;
mod item;
mod registry;
mod sweeper;
mod r#trait;

pub use error::{DisposeError, SourceError};
pub use handle::ReferenceHandle;
pub use item::DataSourceItem;
pub use r#trait::DataSource;
pub use registry::{ReferenceCache, ReferenceCacheStats};
pub use sweeper::RegistrySweeper;
