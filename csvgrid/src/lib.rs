//! # csvgrid - Robust delimited-text import
//!
//! csvgrid turns messy CSV-like files (unknown dialect, junk preamble rows,
//! ragged rows, maybe-a-header first line) into rectangular tables of string
//! columns with a guessed type per column, plus the configuration that was
//! actually used so a later import can replay it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Text File  │────▶│   Dialect   │────▶│   Header /  │────▶│    Table    │
//! │  (any enc)  │     │   sniffing  │     │  alignment  │     │ (+ options) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use csvgrid::{detect_and_parse, ParseOptions};
//!
//! let parsed = detect_and_parse("export.csv", &ParseOptions::default())?;
//! for table in &parsed.tables {
//!     for column in &table.columns {
//!         println!("{} ({})", column.name, column.guessed_type);
//!     }
//! }
//! // Feed the echoed options back to skip sniffing next time.
//! let replay = ParseOptions::from_map(&parsed.options)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error type shared by every stage
//! - [`options`] - User overrides and the echoed effective configuration
//! - [`encoding`] - Charset detection and decoding for files opened by path
//! - [`dialect`] - Delimiter, quote and line terminator sniffing
//! - [`source`] - Streaming raw row tokenizer
//! - [`header`] - Offset, header and column count resolution
//! - [`align`] - Padding and truncation of ragged rows
//! - [`guess`] - Column type guessing
//! - [`table`] - Table assembly
//! - [`pipeline`] - End-to-end import

// Core modules
pub mod error;
pub mod options;

// Input
pub mod encoding;
pub mod dialect;
pub mod source;

// Shaping
pub mod header;
pub mod align;
pub mod guess;
pub mod table;

// Orchestration
pub mod pipeline;

// =============================================================================
// Re-exports - Errors and options
// =============================================================================

pub use error::{ImportError, ImportResult};

pub use options::{EffectiveOptions, HeaderMode, ParseOptions, ResolvedOptions};

// =============================================================================
// Re-exports - Dialect and rows
// =============================================================================

pub use dialect::{detect_dialect, detect_line_terminator, sniff_delimiter, Dialect};

pub use encoding::{decode_content, detect_encoding, DecodingReader};

pub use source::{RawRow, RawRowSource};

// =============================================================================
// Re-exports - Tables
// =============================================================================

pub use header::{resolve_header, AlwaysHeader, HeaderPolicy, HeaderResolution, TextHeaderPolicy};

pub use align::RowAligner;

pub use guess::{ColumnType, TypeGuesser};

pub use table::{ColumnSpec, Table, TableBuilder};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    detect_and_parse,
    parse_open_stream,
    parse_str,
    Importer,
    ParsedFile,
    DEFAULT_LOOKAHEAD_ROWS,
    DEFAULT_SAMPLE_BYTES,
};
