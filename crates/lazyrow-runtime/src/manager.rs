#![forbid(unsafe_code)]

//! Composition root: wires the table, resolver, scheduler, and collaborators
//! behind the public API the host application drives.
//!
//! The manager lives on the host's UI thread. It owns the position table
//! exclusively, remembers just enough scroll state to gate redundant
//! updates, and turns the events it receives — height registrations and
//! settled scroll changes — into windowing passes.
//!
//! Two behaviors worth knowing up front:
//!
//! - A scroll event only triggers a pass when the viewport's vertical span
//!   actually left the span remembered from the last update. A viewport
//!   that shrank in place, or a width-only change, does not re-window.
//! - An in-place height update always triggers a top-down (`Down`) pass,
//!   regardless of where the viewport last moved. Rows newly exposed
//!   *above* the cached window by such an update are therefore appended at
//!   the trailing edge until the next settled scroll re-windows; this
//!   matches the long-standing behavior of the engine this one replaces.

use std::sync::Arc;

use lazyrow_core::{PositionTable, RowOutOfRange, UpdateOutcome, resolve_range};
use tracing::{debug, trace};

use crate::collab::{CollaboratorError, RowRenderer, Viewport};
use crate::pass::{Pass, ScrollDirection};
use crate::scheduler::UpdateScheduler;

/// Failure from [`RowWindowManager::scroll_to_index`].
#[derive(Debug)]
pub enum ScrollToIndexError {
    /// The index does not address an existing row.
    OutOfRange(RowOutOfRange),
    /// The viewport rejected the scroll mutation.
    Viewport(CollaboratorError),
}

impl std::fmt::Display for ScrollToIndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange(err) => write!(f, "cannot scroll: {err}"),
            Self::Viewport(err) => write!(f, "viewport rejected scroll: {err}"),
        }
    }
}

impl std::error::Error for ScrollToIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::OutOfRange(err) => Some(err),
            Self::Viewport(err) => Some(err.as_ref() as &(dyn std::error::Error + 'static)),
        }
    }
}

/// The vertical window the viewport showed when the last pass was gated.
#[derive(Debug, Clone, Copy)]
struct ViewedSpan {
    offset: u64,
    extent: u32,
}

impl ViewedSpan {
    fn end(&self) -> u64 {
        self.offset + u64::from(self.extent)
    }

    /// Whether `other` lies entirely inside this span. Width never enters
    /// the comparison.
    fn contains(&self, other: &ViewedSpan) -> bool {
        self.offset <= other.offset && other.end() <= self.end()
    }
}

/// Entry point of the lazyrow engine.
///
/// Construct one with the host's renderer and viewport, then drive it from
/// the UI thread: register row heights with
/// [`set_row_height`](Self::set_row_height), forward settled scroll events
/// to [`notify_scroll_changed`](Self::notify_scroll_changed), and the
/// manager keeps the materialized window in step with the viewport.
pub struct RowWindowManager<W: Clone + Send + 'static> {
    renderer: Arc<dyn RowRenderer<Widget = W>>,
    viewport: Arc<dyn Viewport<Widget = W>>,
    table: PositionTable,
    scheduler: UpdateScheduler<W>,
    last_scroll_offset: u64,
    viewed_span: Option<ViewedSpan>,
}

impl<W: Clone + Send + 'static> RowWindowManager<W> {
    /// Wire the engine to the host's collaborators.
    #[must_use]
    pub fn new<R, V>(renderer: Arc<R>, viewport: Arc<V>) -> Self
    where
        R: RowRenderer<Widget = W> + 'static,
        V: Viewport<Widget = W> + 'static,
    {
        Self {
            renderer,
            viewport,
            table: PositionTable::new(),
            scheduler: UpdateScheduler::new(),
            last_scroll_offset: 0,
            viewed_span: None,
        }
    }

    /// Number of rows whose heights have been registered.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table.len()
    }

    /// Total height of the registered content.
    #[must_use]
    pub fn total_height(&self) -> u64 {
        self.table.total_height()
    }

    /// Register or update the height a row needs to be fully displayed.
    ///
    /// `index == row_count()` registers a new row at the end of the list;
    /// indices beyond that are silently ignored; negative heights are
    /// clamped to zero. An in-place update reflows every later row and
    /// immediately schedules a top-down windowing pass so the display
    /// reflects the shifted positions.
    pub fn set_row_height(&mut self, index: usize, height: i32) {
        match self.table.update(index, height) {
            UpdateOutcome::Updated => {
                debug!(index, height, "row height changed; re-windowing top-down");
                self.trigger_pass(ScrollDirection::Down);
            }
            UpdateOutcome::Appended => {
                trace!(index, height, "row height registered");
            }
            UpdateOutcome::Ignored => {
                trace!(index, height, rows = self.table.len(), "height update ignored");
            }
        }
    }

    /// Forward a scroll event from the host's viewport.
    ///
    /// Events with `actively_dragging` set are ignored outright — the
    /// engine reacts once the gesture settles. A settled event triggers a
    /// pass only when the viewport's vertical span moved outside the span
    /// remembered from the last update; the scroll direction is inferred
    /// from the offset delta (an unchanged offset counts as `Down`).
    pub fn notify_scroll_changed(&mut self, offset: u64, actively_dragging: bool) {
        if actively_dragging {
            trace!(offset, "scroll event ignored while dragging");
            return;
        }
        let direction = if offset >= self.last_scroll_offset {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        };
        self.last_scroll_offset = offset;
        if self.needs_display_update(offset) {
            self.trigger_pass(direction);
        } else {
            trace!(offset, "viewport still inside the last windowed span");
        }
    }

    /// Explicitly request a windowing pass with a caller-chosen direction.
    pub fn request_visible_update(&self, direction: ScrollDirection) {
        self.trigger_pass(direction);
    }

    /// Forget everything: cancel any in-flight pass, drop the cache and
    /// the height table, empty the display, and scroll back to the top.
    pub fn clear_state(&mut self) -> Result<(), CollaboratorError> {
        debug!("clearing engine state");
        self.scheduler.reset();
        self.table.reset();
        self.last_scroll_offset = 0;
        self.viewed_span = None;
        self.viewport.replace_all(Vec::new())?;
        self.viewport.set_spacers(0, 0)?;
        self.viewport.scroll_to(0)?;
        Ok(())
    }

    /// Move the viewport so row `index` sits at its top edge.
    ///
    /// Unlike the permissive height registration, an invalid index here is
    /// an explicit error and no scroll mutation is attempted. The scroll
    /// itself re-windows through the host's usual scroll-changed event.
    pub fn scroll_to_index(&self, index: usize) -> Result<(), ScrollToIndexError> {
        let position = self
            .table
            .position_of(index)
            .map_err(ScrollToIndexError::OutOfRange)?;
        self.viewport
            .scroll_to(position)
            .map_err(ScrollToIndexError::Viewport)
    }

    /// Visit the currently materialized widgets in ascending row order.
    pub fn for_each_displayed_widget<F>(&self, mut visitor: F)
    where
        F: FnMut(usize, &W),
    {
        for (index, widget) in self.scheduler.cached_widgets() {
            visitor(index, &widget);
        }
    }

    /// Register a closure notified every time a pass runs to completion.
    /// Cancelled and abandoned passes never notify.
    pub fn set_completion_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.scheduler.set_completion_listener(Some(Arc::new(listener)));
    }

    /// Remove the completion listener.
    pub fn clear_completion_listener(&self) {
        self.scheduler.set_completion_listener(None);
    }

    fn needs_display_update(&mut self, offset: u64) -> bool {
        let current = ViewedSpan {
            offset,
            extent: self.viewport.extent_height(),
        };
        match &self.viewed_span {
            Some(previous) if previous.contains(&current) => false,
            _ => {
                self.viewed_span = Some(current);
                true
            }
        }
    }

    fn trigger_pass(&self, direction: ScrollDirection) {
        let offset = self.viewport.scroll_offset();
        let extent = self.viewport.extent_height();
        match resolve_range(&self.table, offset, extent) {
            Some(range) => {
                debug!(
                    %range,
                    ?direction,
                    offset,
                    extent,
                    width = self.viewport.content_width(),
                    "triggering windowing pass"
                );
                self.scheduler.trigger(Pass::new(
                    self.table.clone(),
                    range,
                    direction,
                    Arc::clone(&self.renderer),
                    Arc::clone(&self.viewport),
                ));
            }
            None => {
                debug!(offset, extent, "nothing to window; cancelling in-flight pass");
                self.scheduler.cancel_in_flight();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InsertEdge, RowRenderer, Viewport};
    use std::sync::Mutex;
    use std::sync::mpsc::{Receiver, channel};
    use std::time::Duration;

    struct CountingRenderer {
        rendered: Mutex<Vec<usize>>,
    }

    impl CountingRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                rendered: Mutex::new(Vec::new()),
            })
        }

        fn rendered(&self) -> Vec<usize> {
            self.rendered.lock().unwrap().clone()
        }
    }

    impl RowRenderer for CountingRenderer {
        type Widget = usize;

        fn render_row(&self, index: usize) -> Result<usize, CollaboratorError> {
            self.rendered.lock().unwrap().push(index);
            Ok(index)
        }
    }

    /// Viewport double with host-settable geometry and a mutation journal.
    struct FakeViewport {
        offset: Mutex<u64>,
        extent: Mutex<u32>,
        displayed: Mutex<Vec<usize>>,
        scrolled_to: Mutex<Vec<u64>>,
        insert_edges: Mutex<Vec<InsertEdge>>,
    }

    impl FakeViewport {
        fn new(extent: u32) -> Arc<Self> {
            Arc::new(Self {
                offset: Mutex::new(0),
                extent: Mutex::new(extent),
                displayed: Mutex::new(Vec::new()),
                scrolled_to: Mutex::new(Vec::new()),
                insert_edges: Mutex::new(Vec::new()),
            })
        }

        fn set_offset(&self, offset: u64) {
            *self.offset.lock().unwrap() = offset;
        }

        fn displayed(&self) -> Vec<usize> {
            self.displayed.lock().unwrap().clone()
        }
    }

    impl Viewport for FakeViewport {
        type Widget = usize;

        fn scroll_offset(&self) -> u64 {
            *self.offset.lock().unwrap()
        }

        fn extent_height(&self) -> u32 {
            *self.extent.lock().unwrap()
        }

        fn content_width(&self) -> u32 {
            480
        }

        fn replace_all(&self, widgets: Vec<usize>) -> Result<(), CollaboratorError> {
            *self.displayed.lock().unwrap() = widgets;
            Ok(())
        }

        fn insert_widget(&self, widget: usize, edge: InsertEdge) -> Result<(), CollaboratorError> {
            let mut displayed = self.displayed.lock().unwrap();
            match edge {
                InsertEdge::Leading => displayed.insert(0, widget),
                InsertEdge::Trailing => displayed.push(widget),
            }
            self.insert_edges.lock().unwrap().push(edge);
            Ok(())
        }

        fn set_spacers(&self, _leading: u64, _trailing: u64) -> Result<(), CollaboratorError> {
            Ok(())
        }

        fn scroll_to(&self, offset: u64) -> Result<(), CollaboratorError> {
            self.scrolled_to.lock().unwrap().push(offset);
            Ok(())
        }
    }

    fn manager_with(
        renderer: &Arc<CountingRenderer>,
        viewport: &Arc<FakeViewport>,
    ) -> (RowWindowManager<usize>, Receiver<()>) {
        let manager = RowWindowManager::new(Arc::clone(renderer), Arc::clone(viewport));
        let (tx, rx) = channel();
        manager.set_completion_listener(move || {
            let _ = tx.send(());
        });
        (manager, rx)
    }

    fn await_pass(completions: &Receiver<()>) {
        completions
            .recv_timeout(Duration::from_secs(2))
            .expect("expected a pass to complete");
    }

    fn assert_no_pass(completions: &Receiver<()>) {
        assert!(
            completions.recv_timeout(Duration::from_millis(200)).is_err(),
            "no pass should have run"
        );
    }

    #[test]
    fn first_settled_scroll_windows_the_visible_rows() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        viewport.set_offset(25);
        manager.notify_scroll_changed(25, false);
        await_pass(&completions);

        assert_eq!(viewport.displayed(), vec![1, 2, 3]);
        assert_eq!(renderer.rendered(), vec![1, 2, 3]);
    }

    #[test]
    fn appending_heights_does_not_trigger_a_pass() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);

        for h in [10, 20, 30] {
            manager.set_row_height(manager.row_count(), h);
        }
        assert_no_pass(&completions);
        assert_eq!(manager.row_count(), 3);
        assert_eq!(manager.total_height(), 60);
    }

    #[test]
    fn in_place_update_reflows_and_rewindows_top_down() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }
        viewport.set_offset(25);
        manager.notify_scroll_changed(25, false);
        await_pass(&completions);

        manager.set_row_height(0, 5);
        await_pass(&completions);

        // Positions shifted to [0, 5, 25, 55, 95]; viewport [25, 65) now
        // clips rows 2..=3; rows 1..=3 were cached so 2..=3 are reused.
        assert_eq!(manager.total_height(), 145);
        assert_eq!(viewport.displayed(), vec![2, 3]);
    }

    #[test]
    fn out_of_range_update_is_a_silent_no_op() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }
        let total = manager.total_height();

        manager.set_row_height(6, 10);

        assert_no_pass(&completions);
        assert_eq!(manager.row_count(), 5);
        assert_eq!(manager.total_height(), total);
    }

    #[test]
    fn drag_events_are_ignored_until_settle() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        viewport.set_offset(25);
        manager.notify_scroll_changed(25, true);
        assert_no_pass(&completions);

        manager.notify_scroll_changed(25, false);
        await_pass(&completions);
        assert_eq!(viewport.displayed(), vec![1, 2, 3]);
    }

    #[test]
    fn settled_event_inside_the_remembered_span_does_not_rewindow() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        manager.notify_scroll_changed(0, false);
        await_pass(&completions);

        // Same offset again: span unchanged, gate holds.
        manager.notify_scroll_changed(0, false);
        assert_no_pass(&completions);
    }

    #[test]
    fn scrolling_up_prepends_at_the_leading_edge() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        viewport.set_offset(60);
        manager.notify_scroll_changed(60, false);
        await_pass(&completions);
        assert_eq!(viewport.displayed(), vec![3, 4]);

        viewport.set_offset(15);
        manager.notify_scroll_changed(15, false);
        await_pass(&completions);

        // Viewport [15, 55) clips rows 1..=2; nothing cached overlaps, so
        // both arrive by prepending in descending order.
        assert_eq!(viewport.displayed(), vec![1, 2]);
        assert!(
            viewport
                .insert_edges
                .lock()
                .unwrap()
                .iter()
                .rev()
                .take(2)
                .all(|edge| *edge == InsertEdge::Leading)
        );
    }

    #[test]
    fn scroll_to_one_past_the_last_row_is_an_explicit_error() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, _completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        let err = manager.scroll_to_index(5).unwrap_err();
        assert!(matches!(
            err,
            ScrollToIndexError::OutOfRange(RowOutOfRange { index: 5, len: 5 })
        ));
        assert!(viewport.scrolled_to.lock().unwrap().is_empty());
    }

    #[test]
    fn scroll_to_valid_index_moves_to_its_position() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, _completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }

        manager.scroll_to_index(3).unwrap();
        assert_eq!(viewport.scrolled_to.lock().unwrap().clone(), vec![60]);
    }

    #[test]
    fn clear_state_empties_everything_and_scrolls_home() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);
        for h in [10, 20, 30, 40, 50] {
            manager.set_row_height(manager.row_count(), h);
        }
        manager.notify_scroll_changed(0, false);
        await_pass(&completions);

        manager.clear_state().unwrap();

        assert_eq!(manager.row_count(), 0);
        assert_eq!(manager.total_height(), 0);
        assert!(viewport.displayed().is_empty());
        assert_eq!(viewport.scrolled_to.lock().unwrap().clone(), vec![0]);
        let mut visited = Vec::new();
        manager.for_each_displayed_widget(|index, _| visited.push(index));
        assert!(visited.is_empty());

        // The engine is reusable after a reset.
        for h in [15, 25] {
            manager.set_row_height(manager.row_count(), h);
        }
        manager.notify_scroll_changed(0, false);
        await_pass(&completions);
        assert_eq!(viewport.displayed(), vec![0, 1]);
    }

    #[test]
    fn empty_table_scroll_event_runs_no_pass() {
        let renderer = CountingRenderer::new();
        let viewport = FakeViewport::new(40);
        let (mut manager, completions) = manager_with(&renderer, &viewport);

        manager.notify_scroll_changed(0, false);
        assert_no_pass(&completions);
        assert!(viewport.displayed().is_empty());
    }
}
