#![forbid(unsafe_code)]

//! Deterministic collaborator doubles for exercising the lazyrow engine.
//!
//! Real hosts hand the engine a toolkit renderer and a scrollable surface;
//! tests hand it these instead. The [`renderer::ScriptedRenderer`] produces
//! stable stub handles and journals every invocation; the
//! [`viewport::RecordingViewport`] applies mutations to an in-memory display
//! list and journals them in arrival order, with host-settable geometry and
//! an optional insertion hook for holding a pass mid-mutation.
//!
//! The end-to-end scenario tests in `tests/` drive a full
//! `RowWindowManager` against these doubles.

pub mod renderer;
pub mod viewport;

pub use renderer::{ScriptedRenderer, WidgetStub};
pub use viewport::{RecordingViewport, ViewportMutation};
