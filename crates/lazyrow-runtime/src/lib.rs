#![forbid(unsafe_code)]

//! Windowing runtime: collaborator seams, passes, the widget cache, the
//! update scheduler, and the composition-root manager.
//!
//! # Role in lazyrow
//! `lazyrow-runtime` turns the geometry answers from `lazyrow-core` into UI
//! mutations. A windowing *pass* diffs the target visible range against the
//! widget cache left behind by the previous pass: widgets still visible are
//! redisplayed from the cache, newly exposed rows are rendered once and
//! inserted incrementally, and rows that scrolled away are evicted. Passes
//! run on a single background worker owned by the [`UpdateScheduler`]; a
//! new trigger cancels whatever pass is in flight.
//!
//! # Threading contract
//! The worker never touches the UI directly. Every mutation goes through
//! the [`Viewport`] collaborator, whose implementation must apply it on the
//! UI-owning thread before returning (invoke-and-wait). The worker blocks
//! on each mutation, so mutations from one pass are observed in program
//! order and at most one is pending at any moment. Cancellation is
//! cooperative: the running pass polls its token between steps, finishes
//! the mutation it already started, and stops.
//!
//! # Entry point
//! Hosts construct a [`RowWindowManager`] with their renderer and viewport
//! and drive it from their UI thread: register row heights, forward settled
//! scroll events, and optionally listen for pass completion.

pub mod cache;
pub mod collab;
pub mod manager;
pub mod pass;
pub mod scheduler;

pub use cache::WindowCache;
pub use collab::{CollaboratorError, InsertEdge, RowRenderer, Viewport};
pub use manager::{RowWindowManager, ScrollToIndexError};
pub use pass::{Pass, PassError, ScrollDirection};
pub use scheduler::{CompletionListener, UpdateScheduler};
