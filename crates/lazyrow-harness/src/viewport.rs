#![forbid(unsafe_code)]

//! Recording viewport double.
//!
//! Applies engine mutations to an in-memory display list and journals them
//! in arrival order. Geometry is host-settable so a test can script a
//! scroll before forwarding the settled event. Mutations are applied
//! synchronously on the calling (worker) thread, which satisfies the
//! viewport contract trivially: by the time a call returns, the mutation
//! is visible to every observer of this double.

use std::sync::Mutex;

use lazyrow_runtime::{CollaboratorError, InsertEdge, Viewport};

use crate::renderer::WidgetStub;

/// One journaled viewport mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportMutation {
    /// The displayed list was replaced wholesale (indices shown).
    ReplaceAll(Vec<usize>),
    /// A widget was inserted at an edge.
    Insert {
        /// Row index of the inserted widget.
        index: usize,
        /// Edge it arrived at.
        edge: InsertEdge,
    },
    /// Spacer heights were applied.
    Spacers {
        /// Filler height above the displayed widgets.
        leading: u64,
        /// Filler height below the displayed widgets.
        trailing: u64,
    },
    /// The viewport was asked to move.
    ScrollTo(u64),
}

type InsertHook = Box<dyn Fn(usize) + Send + Sync>;

/// Viewport double with settable geometry and a mutation journal.
pub struct RecordingViewport {
    offset: Mutex<u64>,
    extent: Mutex<u32>,
    width: Mutex<u32>,
    displayed: Mutex<Vec<WidgetStub>>,
    journal: Mutex<Vec<ViewportMutation>>,
    insert_hook: Mutex<Option<InsertHook>>,
}

impl std::fmt::Debug for RecordingViewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingViewport")
            .field("offset", &self.scroll_offset())
            .field("extent", &self.extent_height())
            .field("displayed", &self.displayed_indices())
            .finish_non_exhaustive()
    }
}

impl RecordingViewport {
    /// Viewport showing `extent` pixels starting at offset 0.
    #[must_use]
    pub fn new(extent: u32) -> Self {
        Self {
            offset: Mutex::new(0),
            extent: Mutex::new(extent),
            width: Mutex::new(640),
            displayed: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            insert_hook: Mutex::new(None),
        }
    }

    /// Script the viewport to a new scroll offset (as if the user scrolled).
    pub fn set_offset(&self, offset: u64) {
        *self.offset.lock().expect("viewport geometry poisoned") = offset;
    }

    /// Script a viewport resize.
    pub fn set_extent(&self, extent: u32) {
        *self.extent.lock().expect("viewport geometry poisoned") = extent;
    }

    /// Install a hook invoked at the start of every widget insertion, on
    /// the worker thread. A blocking hook holds the pass mid-mutation —
    /// that is how cancellation-timing tests take control of a pass.
    pub fn set_insert_hook<F>(&self, hook: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        *self.insert_hook.lock().expect("insert hook poisoned") = Some(Box::new(hook));
    }

    /// Indices of the displayed widgets, in display order.
    #[must_use]
    pub fn displayed_indices(&self) -> Vec<usize> {
        self.displayed
            .lock()
            .expect("display list poisoned")
            .iter()
            .map(|w| w.index)
            .collect()
    }

    /// The displayed widget stubs, in display order.
    #[must_use]
    pub fn displayed_widgets(&self) -> Vec<WidgetStub> {
        self.displayed.lock().expect("display list poisoned").clone()
    }

    /// Every mutation the engine applied, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<ViewportMutation> {
        self.journal.lock().expect("journal poisoned").clone()
    }

    /// The most recently applied spacer pair, if any.
    #[must_use]
    pub fn last_spacers(&self) -> Option<(u64, u64)> {
        self.journal
            .lock()
            .expect("journal poisoned")
            .iter()
            .rev()
            .find_map(|m| match m {
                ViewportMutation::Spacers { leading, trailing } => Some((*leading, *trailing)),
                _ => None,
            })
    }

    /// Offsets the engine scrolled to, in order.
    #[must_use]
    pub fn scroll_requests(&self) -> Vec<u64> {
        self.journal
            .lock()
            .expect("journal poisoned")
            .iter()
            .filter_map(|m| match m {
                ViewportMutation::ScrollTo(offset) => Some(*offset),
                _ => None,
            })
            .collect()
    }

    fn record(&self, mutation: ViewportMutation) {
        self.journal.lock().expect("journal poisoned").push(mutation);
    }
}

impl Viewport for RecordingViewport {
    type Widget = WidgetStub;

    fn scroll_offset(&self) -> u64 {
        *self.offset.lock().expect("viewport geometry poisoned")
    }

    fn extent_height(&self) -> u32 {
        *self.extent.lock().expect("viewport geometry poisoned")
    }

    fn content_width(&self) -> u32 {
        *self.width.lock().expect("viewport geometry poisoned")
    }

    fn replace_all(&self, widgets: Vec<WidgetStub>) -> Result<(), CollaboratorError> {
        let indices = widgets.iter().map(|w| w.index).collect();
        *self.displayed.lock().expect("display list poisoned") = widgets;
        self.record(ViewportMutation::ReplaceAll(indices));
        Ok(())
    }

    fn insert_widget(&self, widget: WidgetStub, edge: InsertEdge) -> Result<(), CollaboratorError> {
        if let Some(hook) = &*self.insert_hook.lock().expect("insert hook poisoned") {
            hook(widget.index);
        }
        {
            let mut displayed = self.displayed.lock().expect("display list poisoned");
            match edge {
                InsertEdge::Leading => displayed.insert(0, widget),
                InsertEdge::Trailing => displayed.push(widget),
            }
        }
        self.record(ViewportMutation::Insert {
            index: widget.index,
            edge,
        });
        Ok(())
    }

    fn set_spacers(&self, leading: u64, trailing: u64) -> Result<(), CollaboratorError> {
        self.record(ViewportMutation::Spacers { leading, trailing });
        Ok(())
    }

    fn scroll_to(&self, offset: u64) -> Result<(), CollaboratorError> {
        self.set_offset(offset);
        self.record(ViewportMutation::ScrollTo(offset));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_preserves_mutation_order() {
        let viewport = RecordingViewport::new(100);
        let w = |index| WidgetStub { index, revision: 0 };

        viewport.replace_all(vec![w(1), w(2)]).unwrap();
        viewport.set_spacers(10, 50).unwrap();
        viewport.insert_widget(w(3), InsertEdge::Trailing).unwrap();
        viewport.insert_widget(w(0), InsertEdge::Leading).unwrap();

        assert_eq!(viewport.displayed_indices(), vec![0, 1, 2, 3]);
        assert_eq!(
            viewport.journal(),
            vec![
                ViewportMutation::ReplaceAll(vec![1, 2]),
                ViewportMutation::Spacers { leading: 10, trailing: 50 },
                ViewportMutation::Insert { index: 3, edge: InsertEdge::Trailing },
                ViewportMutation::Insert { index: 0, edge: InsertEdge::Leading },
            ]
        );
        assert_eq!(viewport.last_spacers(), Some((10, 50)));
    }

    #[test]
    fn scroll_to_moves_the_scripted_offset() {
        let viewport = RecordingViewport::new(100);
        viewport.scroll_to(60).unwrap();
        assert_eq!(viewport.scroll_offset(), 60);
        assert_eq!(viewport.scroll_requests(), vec![60]);
    }
}
