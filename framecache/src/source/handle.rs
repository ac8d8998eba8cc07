//! RAII reference handle to a cached data source.

use super::item::DataSourceItem;
use super::{DataSource, SourceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A counted reference to a data source held by the cache.
///
/// Each handle contributes one to the item's reference count. Dropping the
/// handle, or calling [`dispose`](Self::dispose), gives it back; disposal is
/// idempotent, so an explicit `dispose()` followed by `Drop` decrements once.
///
/// # Example
///
/// ```
/// use framecache::source::{DataSource, DisposeError, ReferenceCache};
///
/// struct Study;
/// impl DataSource for Study {
///     fn dispose(&self) -> Result<(), DisposeError> {
///         Ok(())
///     }
/// }
///
/// let cache = ReferenceCache::new();
/// let first = cache.acquire("1.2.3", Study);
/// let second = first.try_clone().unwrap();
/// assert_eq!(second.ref_count(), 2);
///
/// first.dispose();
/// assert!(first.source().is_err());
/// assert!(second.source().is_ok());
/// ```
pub struct ReferenceHandle<S: DataSource> {
    item: Arc<DataSourceItem<S>>,
    released: AtomicBool,
}

impl<S: DataSource> ReferenceHandle<S> {
    /// Wrap an item whose count was already incremented for this handle.
    pub(super) fn new(item: Arc<DataSourceItem<S>>) -> Self {
        Self {
            item,
            released: AtomicBool::new(false),
        }
    }

    /// Instance identifier of the referenced source.
    pub fn identifier(&self) -> &str {
        self.item.identifier()
    }

    /// Borrow the data source.
    ///
    /// # Errors
    ///
    /// [`SourceError::Disposed`] if this handle was disposed.
    pub fn source(&self) -> Result<&S, SourceError> {
        self.ensure_live()?;
        Ok(self.item.source())
    }

    /// Create another handle to the same source.
    ///
    /// Increments the reference count; the data source is not rebuilt.
    ///
    /// # Errors
    ///
    /// [`SourceError::Disposed`] if this handle was already disposed.
    pub fn try_clone(&self) -> Result<Self, SourceError> {
        self.ensure_live()?;
        if !self.item.add_ref() {
            return Err(self.disposed_error());
        }
        Ok(Self::new(Arc::clone(&self.item)))
    }

    /// Release this handle's reference.
    ///
    /// Safe to call more than once; only the first call decrements.
    pub fn dispose(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.item.release();
        }
    }

    /// Whether this handle has been released.
    pub fn is_disposed(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Current number of outstanding handles for the source.
    pub fn ref_count(&self) -> usize {
        self.item.ref_count()
    }

    /// Whether two handles refer to the same underlying item.
    pub fn same_source(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.item, &other.item)
    }

    fn ensure_live(&self) -> Result<(), SourceError> {
        if self.is_disposed() || self.item.is_disposed() {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    fn disposed_error(&self) -> SourceError {
        SourceError::Disposed {
            identifier: self.item.identifier().to_string(),
        }
    }
}

impl<S: DataSource> Drop for ReferenceHandle<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: DataSource> std::fmt::Debug for ReferenceHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("identifier", &self.identifier())
            .field("released", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::item::detached;
    use crate::source::DisposeError;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource(Arc<AtomicUsize>);

    impl DataSource for CountingSource {
        fn dispose(&self) -> Result<(), DisposeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handle_for(identifier: &str) -> (ReferenceHandle<CountingSource>, Arc<AtomicUsize>) {
        let disposals = Arc::new(AtomicUsize::new(0));
        let item = detached(identifier, CountingSource(Arc::clone(&disposals)));
        assert!(item.add_ref());
        (ReferenceHandle::new(item), disposals)
    }

    #[test]
    fn test_double_dispose_decrements_once() {
        let (handle, disposals) = handle_for("a");
        let clone = handle.try_clone().unwrap();
        assert_eq!(handle.ref_count(), 2);

        handle.dispose();
        handle.dispose();
        assert_eq!(clone.ref_count(), 1);
        assert_eq!(disposals.load(Ordering::SeqCst), 0);

        drop(handle);
        assert_eq!(clone.ref_count(), 1);

        drop(clone);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_after_dispose_fails_fast() {
        let (handle, _) = handle_for("gone");
        handle.dispose();

        let err = handle.source().err().unwrap();
        assert_eq!(
            err,
            SourceError::Disposed {
                identifier: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_clone_after_dispose_fails() {
        let (handle, _) = handle_for("gone");
        handle.dispose();
        assert!(handle.try_clone().is_err());
    }

    #[test]
    fn test_clones_share_source() {
        let (handle, _) = handle_for("shared");
        let clone = handle.try_clone().unwrap();
        assert!(handle.same_source(&clone));
        assert_eq!(clone.identifier(), "shared");
    }
}
