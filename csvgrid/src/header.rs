//! Offset and header resolution over the lookahead window.
//!
//! Leading all-blank rows are skipped; the first row with any content is the
//! anchor. Whether the anchor is a header is either forced by the caller or
//! decided by a [`HeaderPolicy`]. The column count comes from the widest row
//! seen in the window unless the caller fixes it.

use crate::guess::looks_numeric;
use crate::options::HeaderMode;
use crate::source::{is_blank_row, nonempty_width, RawRow};

// =============================================================================
// Header Policy
// =============================================================================

/// Decides whether an anchor row names the columns of the rows after it.
///
/// Must be deterministic. When in doubt, answer `true`.
pub trait HeaderPolicy: Send + Sync {
    fn is_header(&self, anchor: &[String], data_rows: &[RawRow]) -> bool;
}

/// Default policy: an all-text anchor whose values do not reappear below.
///
/// The anchor is rejected when any non-empty cell looks numeric, or when any
/// non-empty cell equals the value in the same column of a sampled data row.
/// Everything else counts as a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextHeaderPolicy;

impl HeaderPolicy for TextHeaderPolicy {
    fn is_header(&self, anchor: &[String], data_rows: &[RawRow]) -> bool {
        if anchor
            .iter()
            .any(|cell| !cell.trim().is_empty() && looks_numeric(cell))
        {
            return false;
        }
        let repeats = data_rows.iter().any(|row| {
            row.iter()
                .zip(anchor)
                .any(|(cell, name)| !cell.is_empty() && cell == name)
        });
        !repeats
    }
}

/// Policy that trusts every anchor row.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHeader;

impl HeaderPolicy for AlwaysHeader {
    fn is_header(&self, _anchor: &[String], _data_rows: &[RawRow]) -> bool {
        true
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Outcome of scanning the lookahead window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderResolution {
    /// Blank rows skipped before the anchor.
    pub offset: usize,
    /// Whether the anchor row was consumed as the header.
    pub has_header: bool,
    /// Number of columns to model.
    pub column_count: usize,
    /// One name per column; empty where there is no header cell.
    pub names: Vec<String>,
}

impl HeaderResolution {
    /// Index into the window of the first data row.
    pub fn data_start(&self) -> usize {
        self.offset + usize::from(self.has_header)
    }
}

/// Resolve offset, header and width from `window`.
///
/// Returns `None` when the window holds no non-blank row.
pub fn resolve_header(
    window: &[RawRow],
    mode: HeaderMode,
    explicit_columns: Option<usize>,
    policy: &dyn HeaderPolicy,
) -> Option<HeaderResolution> {
    let offset = window.iter().position(|row| !is_blank_row(row))?;
    let anchor = &window[offset];
    let below = &window[offset + 1..];

    let has_header = match mode.explicit() {
        Some(flag) => flag,
        None => policy.is_header(anchor, below),
    };

    // Trailing blank cells never create columns, except on the header row.
    let data = if has_header { below } else { &window[offset..] };
    let data_width = data.iter().map(|r| nonempty_width(r)).max().unwrap_or(0);
    let header_width = if has_header { anchor.len() } else { 0 };
    let column_count = explicit_columns.unwrap_or(header_width.max(data_width));

    let names = if has_header {
        header_names(anchor, column_count)
    } else {
        vec![String::new(); column_count]
    };

    tracing::debug!(offset, has_header, column_count, "resolved header");
    Some(HeaderResolution {
        offset,
        has_header,
        column_count,
        names,
    })
}

/// Trimmed anchor cells, padded with empty names or cut to `width`.
pub fn header_names(anchor: &[String], width: usize) -> Vec<String> {
    (0..width)
        .map(|i| anchor.get(i).map(|h| h.trim().to_string()).unwrap_or_default())
        .collect()
}
