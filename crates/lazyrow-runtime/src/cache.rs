#![forbid(unsafe_code)]

//! The shared widget cache: index → rendered handle.
//!
//! The cache is the one structure that survives across passes. It is never
//! replaced wholesale — each pass diffs its target range against it,
//! reusing what overlaps, memoizing what it renders, and evicting what fell
//! outside the pass's final range. After any *completed* pass the cached
//! index set is exactly that pass's visible range; a cancelled or failed
//! pass may leave the set wider or gapped, which the next pass repairs.

use lazyrow_core::VisibleRange;
use rustc_hash::FxHashMap;

/// Index-keyed store of rendered widget handles.
#[derive(Debug, Clone)]
pub struct WindowCache<W> {
    widgets: FxHashMap<usize, W>,
}

impl<W> Default for WindowCache<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> WindowCache<W> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            widgets: FxHashMap::default(),
        }
    }

    /// Number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Whether no handles are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Whether a handle exists for `index`.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.widgets.contains_key(&index)
    }

    /// Cached handle for `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&W> {
        self.widgets.get(&index)
    }

    /// Memoize a freshly rendered handle.
    pub fn insert(&mut self, index: usize, widget: W) {
        self.widgets.insert(index, widget);
    }

    /// Overlap between the cached window and `target`: the sub-range of
    /// `target` delimited by the smallest and largest cached index inside
    /// it. `None` when no cached index falls inside the target.
    ///
    /// With the contiguous cache every completed pass leaves behind, this
    /// is exactly `intersection(cachedRange, target)`. After an aborted
    /// pass the cache may have gaps inside the overlap; callers skip those.
    #[must_use]
    pub fn overlap_with(&self, target: &VisibleRange) -> Option<VisibleRange> {
        let mut bounds: Option<(usize, usize)> = None;
        for &index in self.widgets.keys() {
            if target.contains(index) {
                bounds = Some(match bounds {
                    None => (index, index),
                    Some((lo, hi)) => (lo.min(index), hi.max(index)),
                });
            }
        }
        bounds.map(|(lo, hi)| VisibleRange::new(lo, hi))
    }

    /// Evict every entry outside `target`, dropping the handles.
    /// Returns how many entries were released.
    pub fn evict_outside(&mut self, target: &VisibleRange) -> usize {
        let before = self.widgets.len();
        self.widgets.retain(|&index, _| target.contains(index));
        before - self.widgets.len()
    }

    /// Drop every cached handle.
    pub fn clear(&mut self) {
        self.widgets.clear();
    }

    /// Cached entries in ascending index order, handles cloned.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(usize, W)>
    where
        W: Clone,
    {
        let mut entries: Vec<(usize, W)> = self
            .widgets
            .iter()
            .map(|(&index, widget)| (index, widget.clone()))
            .collect();
        entries.sort_unstable_by_key(|&(index, _)| index);
        entries
    }

    /// Cached indices in ascending order.
    #[must_use]
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.widgets.keys().copied().collect();
        indices.sort_unstable();
        indices
    }
}
