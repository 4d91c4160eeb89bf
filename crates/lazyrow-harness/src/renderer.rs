#![forbid(unsafe_code)]

//! Scripted renderer double.
//!
//! Handles are plain value stubs, so "the widget for row 3 from the second
//! render" is distinguishable from the first — which is what cache-reuse
//! assertions need.

use std::sync::Mutex;

use lazyrow_runtime::{CollaboratorError, RowRenderer};
use rustc_hash::FxHashMap;

/// Cheap cloneable stand-in for a toolkit widget handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetStub {
    /// Row index the handle was rendered for.
    pub index: usize,
    /// How many times this index had been rendered before, starting at 0.
    /// A reused cache handle keeps its revision; a re-render bumps it.
    pub revision: u32,
}

/// Renderer that journals invocations and can be scripted to fail.
#[derive(Debug, Default)]
pub struct ScriptedRenderer {
    state: Mutex<RendererState>,
}

#[derive(Debug, Default)]
struct RendererState {
    revisions: FxHashMap<usize, u32>,
    log: Vec<usize>,
    fail_on: Option<usize>,
}

impl ScriptedRenderer {
    /// Renderer that succeeds for every index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that fails whenever `index` is requested.
    #[must_use]
    pub fn failing_on(index: usize) -> Self {
        Self {
            state: Mutex::new(RendererState {
                fail_on: Some(index),
                ..RendererState::default()
            }),
        }
    }

    /// Every rendered index, in invocation order.
    #[must_use]
    pub fn render_log(&self) -> Vec<usize> {
        self.state.lock().expect("renderer state poisoned").log.clone()
    }

    /// How many times `index` has been rendered.
    #[must_use]
    pub fn render_count(&self, index: usize) -> u32 {
        self.state
            .lock()
            .expect("renderer state poisoned")
            .revisions
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    /// Total renderer invocations across all indices.
    #[must_use]
    pub fn total_renders(&self) -> usize {
        self.state.lock().expect("renderer state poisoned").log.len()
    }
}

impl RowRenderer for ScriptedRenderer {
    type Widget = WidgetStub;

    fn render_row(&self, index: usize) -> Result<WidgetStub, CollaboratorError> {
        let mut state = self.state.lock().expect("renderer state poisoned");
        if state.fail_on == Some(index) {
            return Err(format!("scripted failure for row {index}").into());
        }
        let revision = state.revisions.entry(index).or_insert(0);
        let widget = WidgetStub {
            index,
            revision: *revision,
        };
        *revision += 1;
        state.log.push(index);
        Ok(widget)
    }
}
