#![forbid(unsafe_code)]

//! Ordered row-position table.
//!
//! The table stores one entry per registered row: its height and the
//! cumulative offset of its top edge. Positions are derived, never set
//! directly; every mutation re-establishes the invariant
//! `position[0] == 0` and `position[i] == position[i-1] + height[i-1]`.
//!
//! Heights arrive from the host as signed values and are clamped to zero on
//! entry. Positions and totals are widened to `u64` so long lists cannot
//! overflow the cumulative sums.

/// One registered row: its height and the offset of its top edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row {
    /// Row height in pixels. Never negative; clamped on entry.
    pub height: u32,
    /// Cumulative offset of the row's top edge from the top of the content.
    pub position: u64,
}

impl Row {
    /// Offset just past the row's bottom edge.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.position + u64::from(self.height)
    }
}

/// Result of a [`PositionTable::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The index addressed one past the last row; the call appended.
    Appended,
    /// An existing row's height was replaced and the suffix reflowed.
    Updated,
    /// The index was beyond the append slot; nothing changed.
    Ignored,
}

/// Lookup error for indices that do not address an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutOfRange {
    /// The offending index.
    pub index: usize,
    /// Table size at the time of the call.
    pub len: usize,
}

impl std::fmt::Display for RowOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row index {} out of range (table has {} rows)", self.index, self.len)
    }
}

impl std::error::Error for RowOutOfRange {}

/// Ordered sequence of rows with cumulative top offsets.
///
/// Empty at construction; grows by append; shrinks to empty only on
/// [`reset`](Self::reset). In-place height updates reflow every subsequent
/// row's position from its predecessor.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    rows: Vec<Row>,
}

impl PositionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Number of registered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in index order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Register a new row at the end of the list. O(1).
    ///
    /// Negative heights are clamped to zero. The new row's position is the
    /// previous last row's end, or zero for the first row.
    pub fn append(&mut self, height: i32) {
        let height = clamp_height(height);
        let position = self.total_height();
        self.rows.push(Row { height, position });
    }

    /// Replace the height of row `index`, reflowing every later position.
    ///
    /// `index == len` behaves as [`append`](Self::append). Indices beyond
    /// the append slot are ignored without error (permissive contract for
    /// height registration). An in-place replacement costs O(len − index).
    pub fn update(&mut self, index: usize, height: i32) -> UpdateOutcome {
        if index > self.rows.len() {
            return UpdateOutcome::Ignored;
        }
        if index == self.rows.len() {
            self.append(height);
            return UpdateOutcome::Appended;
        }
        self.rows[index].height = clamp_height(height);
        self.reflow_from(index + 1);
        UpdateOutcome::Updated
    }

    /// Drop every row; the table becomes empty.
    pub fn reset(&mut self) {
        self.rows.clear();
    }

    /// Top-edge offset of row `index`. O(1).
    pub fn position_of(&self, index: usize) -> Result<u64, RowOutOfRange> {
        self.row(index).map(|row| row.position)
    }

    /// Height of row `index`. O(1).
    pub fn height_of(&self, index: usize) -> Result<u32, RowOutOfRange> {
        self.row(index).map(|row| row.height)
    }

    /// Row `index`, or an out-of-range error.
    pub fn row(&self, index: usize) -> Result<Row, RowOutOfRange> {
        self.rows.get(index).copied().ok_or(RowOutOfRange {
            index,
            len: self.rows.len(),
        })
    }

    /// Total content height: the last row's end, or zero when empty. O(1).
    #[must_use]
    pub fn total_height(&self) -> u64 {
        self.rows.last().map_or(0, Row::end)
    }

    fn reflow_from(&mut self, first: usize) {
        for i in first..self.rows.len() {
            let prev = self.rows[i - 1];
            self.rows[i].position = prev.end();
        }
    }
}

fn clamp_height(height: i32) -> u32 {
    height.max(0) as u32
}
