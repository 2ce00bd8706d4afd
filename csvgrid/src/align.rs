//! Reconcile ragged rows with the resolved column grid.

use crate::source::{nonempty_width, RawRow};

/// Pads short rows and cuts long ones to a fixed width.
///
/// Within the lookahead window the width already covers every row, so only
/// padding happens there. Cutting drops data in two cases: the caller fixed
/// the column count, or a row past the window turned out wider than anything
/// sampled. The second case is counted in [`RowAligner::truncated_rows`].
#[derive(Debug, Clone)]
pub struct RowAligner {
    width: usize,
    explicit: bool,
    truncated_rows: usize,
}

impl RowAligner {
    /// Aligner for an inferred width.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            explicit: false,
            truncated_rows: 0,
        }
    }

    /// Aligner for a caller-supplied width; cutting is expected, not counted.
    pub fn explicit(width: usize) -> Self {
        Self {
            explicit: true,
            ..Self::new(width)
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows beyond the window that lost non-empty trailing fields.
    pub fn truncated_rows(&self) -> usize {
        self.truncated_rows
    }

    /// Bring `row` to exactly `width` fields.
    pub fn align(&mut self, mut row: RawRow) -> RawRow {
        if row.len() > self.width {
            if !self.explicit && nonempty_width(&row) > self.width {
                self.truncated_rows += 1;
                tracing::warn!(
                    width = self.width,
                    fields = row.len(),
                    "row wider than sampled width; excess fields dropped"
                );
            }
            row.truncate(self.width);
        } else {
            row.resize(self.width, String::new());
        }
        row
    }
}
