//! Table assembly: names, per-column values and guessed types.

use serde::Serialize;

use crate::guess::{ColumnType, TypeGuesser};
use crate::source::RawRow;

/// Metadata for one column. Identity is the position; the name is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub guessed_type: ColumnType,
}

/// Rectangular result: every entry of `values` has the same length and there
/// is one per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<ColumnSpec>,
    pub values: Vec<Vec<String>>,
}

impl Table {
    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Values of the column at `index`.
    pub fn column(&self, index: usize) -> Option<&[String]> {
        self.values.get(index).map(Vec::as_slice)
    }

    /// Values of the first column called `name`.
    pub fn column_named(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| self.column(c.index))
    }

    /// Keep only the first `cap` rows of every column.
    pub fn truncate_rows(&mut self, cap: usize) {
        for column in &mut self.values {
            column.truncate(cap);
        }
    }
}

/// Collects aligned rows column by column, then guesses types once.
#[derive(Debug)]
pub struct TableBuilder {
    names: Vec<String>,
    values: Vec<Vec<String>>,
    cap: Option<usize>,
}

impl TableBuilder {
    pub fn new(names: Vec<String>, cap: Option<usize>) -> Self {
        let values = vec![Vec::new(); names.len()];
        Self { names, values, cap }
    }

    /// Rows accepted so far.
    pub fn row_count(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// False once the row cap is reached.
    pub fn wants_more(&self) -> bool {
        self.cap.map_or(true, |cap| self.row_count() < cap)
    }

    /// Append an aligned row. Its width must equal the column count.
    pub fn push(&mut self, row: RawRow) {
        debug_assert_eq!(row.len(), self.values.len());
        for (column, value) in self.values.iter_mut().zip(row) {
            column.push(value);
        }
    }

    /// Apply the cap and attach guessed types.
    pub fn finish(self, guesser: &TypeGuesser) -> Table {
        let mut table = Table {
            columns: Vec::new(),
            values: self.values,
        };
        if let Some(cap) = self.cap {
            table.truncate_rows(cap);
        }
        table.columns = self
            .names
            .into_iter()
            .enumerate()
            .map(|(index, name)| ColumnSpec {
                index,
                name,
                guessed_type: guesser.guess(&table.values[index]),
            })
            .collect();
        table
    }
}
