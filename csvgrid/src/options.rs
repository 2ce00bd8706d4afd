//! Caller-facing parse options and the effective-options echo.
//!
//! Options arrive either as a typed [`ParseOptions`] or as a JSON map with the
//! same keys. Diagnostic keys that only ever appear in the echo (`row_count`,
//! `schema`, `truncated_rows`) are ignored when read back as input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialect::Dialect;
use crate::error::ImportResult;
use crate::table::Table;

/// Map of resolved options returned alongside the tables.
///
/// Empty when the input had no usable rows.
pub type EffectiveOptions = Map<String, Value>;

// =============================================================================
// Header Mode
// =============================================================================

/// Whether the first non-blank row holds column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// Decide with the header policy.
    #[default]
    Auto,
    /// The anchor row is always the header.
    Present,
    /// The anchor row is always data.
    Absent,
}

impl HeaderMode {
    /// Explicit answer, if the caller gave one.
    pub fn explicit(self) -> Option<bool> {
        match self {
            HeaderMode::Auto => None,
            HeaderMode::Present => Some(true),
            HeaderMode::Absent => Some(false),
        }
    }
}

impl From<Option<bool>> for HeaderMode {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => HeaderMode::Auto,
            Some(true) => HeaderMode::Present,
            Some(false) => HeaderMode::Absent,
        }
    }
}

impl Serialize for HeaderMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.explicit().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HeaderMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(HeaderMode::from)
    }
}

// =============================================================================
// Parse Options
// =============================================================================

/// User overrides for a single parse. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Field separator.
    pub delimiter: Option<char>,
    /// Quote character.
    pub quote_character: Option<char>,
    /// Whether a doubled quote inside a quoted field is a literal quote.
    pub double_quote: Option<bool>,
    /// Row terminator, e.g. `"\r\n"`.
    pub line_terminator: Option<String>,
    /// Strip spaces immediately after a delimiter.
    pub skip_initial_space: Option<bool>,
    /// Header handling.
    #[serde(rename = "include_column_names_as_headers")]
    pub header_mode: HeaderMode,
    /// 1-based physical row to start reading from.
    pub start_with_row: Option<usize>,
    /// Maximum number of data rows to keep.
    pub row_count_cap: Option<usize>,
    /// Fixed number of columns; wider rows lose their excess fields.
    pub explicit_column_count: Option<usize>,
}

impl ParseOptions {
    /// Read options from a JSON map.
    pub fn from_map(map: &Map<String, Value>) -> ImportResult<Self> {
        Ok(serde_json::from_value(Value::Object(map.clone()))?)
    }

    /// Read options from JSON text.
    pub fn from_json(json: &str) -> ImportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when every dialect field was supplied, so sniffing can be skipped.
    pub fn has_full_dialect(&self) -> bool {
        self.delimiter.is_some()
            && self.quote_character.is_some()
            && self.double_quote.is_some()
            && self.line_terminator.is_some()
            && self.skip_initial_space.is_some()
    }
}

// =============================================================================
// Resolved Options
// =============================================================================

/// Column entry of the `schema` diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct SchemaEntry<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    type_name: &'static str,
}

/// Everything that was actually used for a parse, guessed or supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub delimiter: char,
    pub quote_character: char,
    pub double_quote: bool,
    pub line_terminator: String,
    pub skip_initial_space: bool,
    pub include_column_names_as_headers: bool,
    pub start_with_row: usize,
    pub row_count_cap: Option<usize>,
    pub explicit_column_count: Option<usize>,
}

impl ResolvedOptions {
    pub fn new(dialect: &Dialect, options: &ParseOptions, has_header: bool) -> Self {
        Self {
            delimiter: dialect.delimiter,
            quote_character: dialect.quote_character,
            double_quote: dialect.double_quote,
            line_terminator: dialect.line_terminator.clone(),
            skip_initial_space: dialect.skip_initial_space,
            include_column_names_as_headers: has_header,
            start_with_row: options.start_with_row.unwrap_or(1),
            row_count_cap: options.row_count_cap,
            explicit_column_count: options.explicit_column_count,
        }
    }

    /// Build the echo map, adding the diagnostic-only keys for `table`.
    pub fn to_map(&self, table: &Table, truncated_rows: usize) -> EffectiveOptions {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let schema: Vec<SchemaEntry<'_>> = table
            .columns
            .iter()
            .map(|c| SchemaEntry {
                name: &c.name,
                type_name: c.guessed_type.as_str(),
            })
            .collect();

        map.insert("row_count".into(), Value::from(table.row_count()));
        map.insert(
            "schema".into(),
            serde_json::to_value(schema).unwrap_or(Value::Array(Vec::new())),
        );
        map.insert("truncated_rows".into(), Value::from(truncated_rows));
        map
    }
}
