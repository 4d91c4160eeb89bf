#![forbid(unsafe_code)]

//! One windowing pass: an immutable snapshot plus the cache diff it drives.
//!
//! A pass is built at trigger time from the state the trigger saw — a copy
//! of the position table, the resolved target range, the scroll direction —
//! and never changes afterwards. Execution walks three steps against the
//! shared cache:
//!
//! 1. **Bulk redisplay** — one mutation that clears the displayed list and
//!    re-shows, in order, every still-cached widget overlapping the target.
//! 2. **Incremental insertion** — one mutation per newly exposed row,
//!    rendering on cache miss, spacers recomputed before each insert so the
//!    scrollable extent never jumps.
//! 3. **Eviction** — cache entries outside the target are released.
//!
//! The cancellation token is polled between steps; a mutation that already
//! reached the viewport always completes, nothing later runs. The cache
//! mutex is held only across individual lookups and writes, never across a
//! viewport round trip, so readers on the UI thread cannot end up waiting
//! on a pass that is itself waiting on the UI thread.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use lazyrow_core::{PositionTable, Row, VisibleRange};
use tracing::{debug, trace};

use crate::cache::WindowCache;
use crate::collab::{CollaboratorError, InsertEdge, RowRenderer, Viewport};
use crate::scheduler::CompletionListener;

const CACHE_POISONED: &str = "window cache lock poisoned";

/// Which way the viewport moved; decides insertion order and edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Viewport moved down (or a height update forced a top-down sweep):
    /// new widgets are appended at the trailing edge in ascending order.
    Down,
    /// Viewport moved up: new widgets are prepended at the leading edge in
    /// descending order.
    Up,
}

/// Failure inside a pass step. Logged by the scheduler; never retried.
#[derive(Debug)]
pub enum PassError {
    /// The renderer failed to build the widget for a row.
    Renderer {
        /// Row that was being rendered.
        index: usize,
        /// Collaborator's own error.
        source: CollaboratorError,
    },
    /// The viewport rejected a mutation.
    Viewport {
        /// Which mutation failed.
        step: &'static str,
        /// Collaborator's own error.
        source: CollaboratorError,
    },
}

impl std::fmt::Display for PassError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Renderer { index, source } => {
                write!(f, "renderer failed for row {index}: {source}")
            }
            Self::Viewport { step, source } => {
                write!(f, "viewport rejected {step}: {source}")
            }
        }
    }
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Renderer { source, .. } | Self::Viewport { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// Terminal state of a pass that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassOutcome {
    /// All steps ran; the scheduler may notify the completion listener.
    Completed,
    /// The token was observed set between steps; never notified.
    Cancelled,
}

/// Immutable snapshot of everything one windowing pass needs.
///
/// All parts are owned by construction — a partially specified pass cannot
/// exist. The snapshot is dropped when the pass completes, errors, is
/// cancelled, or is superseded while still queued.
pub struct Pass<W> {
    table: PositionTable,
    target: VisibleRange,
    direction: ScrollDirection,
    renderer: Arc<dyn RowRenderer<Widget = W>>,
    viewport: Arc<dyn Viewport<Widget = W>>,
    cancel: Arc<AtomicBool>,
    listener: Option<CompletionListener>,
}

impl<W> std::fmt::Debug for Pass<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("target", &self.target)
            .field("direction", &self.direction)
            .field("rows", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl<W: Clone + Send> Pass<W> {
    /// Snapshot a pass from the state visible at trigger time.
    #[must_use]
    pub fn new(
        table: PositionTable,
        target: VisibleRange,
        direction: ScrollDirection,
        renderer: Arc<dyn RowRenderer<Widget = W>>,
        viewport: Arc<dyn Viewport<Widget = W>>,
    ) -> Self {
        Self {
            table,
            target,
            direction,
            renderer,
            viewport,
            cancel: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }

    /// The row range this pass will materialize.
    #[must_use]
    pub fn target(&self) -> VisibleRange {
        self.target
    }

    /// The direction this pass inserts toward.
    #[must_use]
    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    pub(crate) fn set_listener(&mut self, listener: Option<CompletionListener>) {
        self.listener = listener;
    }

    pub(crate) fn take_listener(&mut self) -> Option<CompletionListener> {
        self.listener.take()
    }

    pub(crate) fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Row lookup for indices the resolver already bounded to the table.
    fn row(&self, index: usize) -> Row {
        self.table.rows()[index]
    }

    /// Execute the diff against the shared cache.
    pub(crate) fn run(self, cache: &Mutex<WindowCache<W>>) -> Result<PassOutcome, PassError> {
        if self.cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        let total = self.table.total_height();
        let (overlap, reused) = {
            let cache = cache.lock().expect(CACHE_POISONED);
            let overlap = cache.overlap_with(&self.target);
            let mut reused = Vec::new();
            if let Some(overlap) = overlap {
                for index in overlap.indices() {
                    // Gaps are possible only after an aborted pass; the bulk
                    // step never renders, so they stay missing until a later
                    // pass inserts them afresh.
                    if let Some(widget) = cache.get(index) {
                        reused.push(widget.clone());
                    }
                }
            }
            (overlap, reused)
        };
        debug!(
            range = %self.target,
            direction = ?self.direction,
            overlap = ?overlap,
            "windowing pass started"
        );

        self.redisplay_overlap(overlap, reused, total)?;
        if self.cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        if self.insert_missing(cache, overlap, total)? == StepState::Cancelled {
            return Ok(PassOutcome::Cancelled);
        }

        if self.cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        let released = cache
            .lock()
            .expect(CACHE_POISONED)
            .evict_outside(&self.target);
        trace!(released, "evicted rows outside the visible window");

        if self.cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        Ok(PassOutcome::Completed)
    }

    /// Bulk pre-display: clear the list, re-show overlapping cached widgets
    /// in ascending order, and size the spacers around them.
    fn redisplay_overlap(
        &self,
        overlap: Option<VisibleRange>,
        reused: Vec<W>,
        total: u64,
    ) -> Result<(), PassError> {
        let reused_count = reused.len();
        self.viewport
            .replace_all(reused)
            .map_err(|source| PassError::Viewport {
                step: "replace_all",
                source,
            })?;
        if let Some(overlap) = overlap {
            let leading = self.row(overlap.first()).position;
            let trailing = total - self.row(overlap.last()).end();
            self.viewport
                .set_spacers(leading, trailing)
                .map_err(|source| PassError::Viewport {
                    step: "set_spacers",
                    source,
                })?;
        }
        trace!(reused = reused_count, "bulk redisplay applied");
        Ok(())
    }

    /// Incremental insertion of every target index outside the overlap.
    fn insert_missing(
        &self,
        cache: &Mutex<WindowCache<W>>,
        overlap: Option<VisibleRange>,
        total: u64,
    ) -> Result<StepState, PassError> {
        let in_overlap = |index: usize| overlap.is_some_and(|o| o.contains(index));
        match self.direction {
            ScrollDirection::Down => {
                for index in self.target.indices() {
                    if in_overlap(index) {
                        continue;
                    }
                    if self.cancelled() {
                        return Ok(StepState::Cancelled);
                    }
                    let leading = self.row(self.target.first()).position;
                    let trailing = total - self.row(index).end();
                    self.insert_one(cache, index, leading, trailing, InsertEdge::Trailing)?;
                }
            }
            ScrollDirection::Up => {
                for index in self.target.indices().rev() {
                    if in_overlap(index) {
                        continue;
                    }
                    if self.cancelled() {
                        return Ok(StepState::Cancelled);
                    }
                    let leading = self.row(index).position;
                    let trailing = total - self.row(self.target.last()).end();
                    self.insert_one(cache, index, leading, trailing, InsertEdge::Leading)?;
                }
            }
        }
        Ok(StepState::Ran)
    }

    /// One synchronous UI round trip: spacers first, then the widget.
    ///
    /// The renderer runs outside the cache lock; the single-worker
    /// discipline means no other writer can race the memoization.
    fn insert_one(
        &self,
        cache: &Mutex<WindowCache<W>>,
        index: usize,
        leading: u64,
        trailing: u64,
        edge: InsertEdge,
    ) -> Result<(), PassError> {
        let cached = cache.lock().expect(CACHE_POISONED).get(index).cloned();
        let widget = match cached {
            Some(widget) => widget,
            None => {
                let widget = self
                    .renderer
                    .render_row(index)
                    .map_err(|source| PassError::Renderer { index, source })?;
                cache
                    .lock()
                    .expect(CACHE_POISONED)
                    .insert(index, widget.clone());
                widget
            }
        };
        self.viewport
            .set_spacers(leading, trailing)
            .map_err(|source| PassError::Viewport {
                step: "set_spacers",
                source,
            })?;
        self.viewport
            .insert_widget(widget, edge)
            .map_err(|source| PassError::Viewport {
                step: "insert_widget",
                source,
            })?;
        trace!(index, ?edge, leading, trailing, "row inserted");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepState {
    Ran,
    Cancelled,
}
