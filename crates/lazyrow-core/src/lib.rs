#![forbid(unsafe_code)]

//! Row geometry kernel: the position table and visible-range resolution.
//!
//! # Role in lazyrow
//! `lazyrow-core` owns the list's vertical geometry. Every row has a height
//! and a cumulative top offset; the resolver maps a viewport's scroll offset
//! and extent to the closed index range of rows intersecting it. Both pieces
//! are pure data structures so they can be snapshotted into a windowing pass
//! without dragging any runtime machinery along.
//!
//! # Primary responsibilities
//! - **PositionTable**: append/update/reset of per-row heights with the
//!   cumulative-position invariant maintained on every mutation.
//! - **resolve_range**: O(log n) offset-to-index mapping over the cumulative
//!   positions, preserving the "nearest row start at or below" edge rule.
//!
//! # How it fits in the system
//! `lazyrow-runtime` clones a [`table::PositionTable`] into each pass
//! snapshot, resolves the target [`resolve::VisibleRange`] at trigger time,
//! and uses the positions to size the leading/trailing spacers that stand in
//! for rows that are not materialized.

pub mod resolve;
pub mod table;

pub use resolve::{VisibleRange, resolve_range};
pub use table::{PositionTable, Row, RowOutOfRange, UpdateOutcome};
