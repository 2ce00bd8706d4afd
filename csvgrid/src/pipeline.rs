//! End-to-end import: sniff, resolve the header, align, guess, assemble.
//!
//! Only a bounded prefix of the input is ever buffered: `sample_bytes` for
//! dialect sniffing (replayed in front of the rest of the stream rather than
//! re-read) and `lookahead_rows` rows for header and width resolution.
//! Everything after that is streamed straight into the table.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvgrid::{parse_open_stream, ParseOptions};
//!
//! let text = "name1,name2,name3\na1,b1,c1\na2,b2\na3";
//! let parsed = parse_open_stream(text.as_bytes(), &ParseOptions::default())?;
//!
//! let table = &parsed.tables[0];
//! assert_eq!(table.column_named("name2").unwrap(), ["b1", "b2", ""]);
//! ```

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::Serialize;

use crate::align::RowAligner;
use crate::dialect::{detect_dialect, Dialect};
use crate::encoding::{decode_content, detect_encoding, lookup, strip_bom, DecodingReader};
use crate::error::{ImportError, ImportResult};
use crate::guess::TypeGuesser;
use crate::header::{resolve_header, HeaderPolicy, TextHeaderPolicy};
use crate::options::{EffectiveOptions, ParseOptions, ResolvedOptions};
use crate::source::{is_blank_row, RawRowSource};
use crate::table::{Table, TableBuilder};

/// Bytes read up front for dialect sniffing.
pub const DEFAULT_SAMPLE_BYTES: usize = 64 * 1024;

/// Rows buffered for header and width resolution.
pub const DEFAULT_LOOKAHEAD_ROWS: usize = 1000;

/// Step used when a full sample has to grow to reach its first line break.
const LINE_EXTENSION_BYTES: usize = 8 * 1024;

// =============================================================================
// Parsed File
// =============================================================================

/// Resolved configuration plus one table per sheet.
///
/// Delimited text always yields at most one table. No usable rows gives an
/// empty options map and no tables at all, which is different from a table
/// with zero rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedFile {
    pub options: EffectiveOptions,
    pub tables: Vec<Table>,
}

impl ParsedFile {
    /// The no-usable-rows sentinel.
    pub fn empty() -> Self {
        Self {
            options: EffectiveOptions::new(),
            tables: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_parts(self) -> (EffectiveOptions, Vec<Table>) {
        (self.options, self.tables)
    }
}

// =============================================================================
// Importer
// =============================================================================

/// Import engine with its tunables. Cheap to build; holds no per-file state.
///
/// ```rust,ignore
/// let importer = Importer::new()
///     .lookahead_rows(200)
///     .header_policy(AlwaysHeader);
/// let parsed = importer.detect_and_parse("export.csv", &ParseOptions::default())?;
/// ```
pub struct Importer {
    sample_bytes: usize,
    lookahead_rows: usize,
    encoding: Option<String>,
    header_policy: Box<dyn HeaderPolicy>,
    guesser: TypeGuesser,
}

impl Default for Importer {
    fn default() -> Self {
        Self {
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            lookahead_rows: DEFAULT_LOOKAHEAD_ROWS,
            encoding: None,
            header_policy: Box::new(TextHeaderPolicy),
            guesser: TypeGuesser::default(),
        }
    }
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("sample_bytes", &self.sample_bytes)
            .field("lookahead_rows", &self.lookahead_rows)
            .field("encoding", &self.encoding)
            .field("guesser", &self.guesser)
            .finish_non_exhaustive()
    }
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes sampled for dialect sniffing.
    pub fn sample_bytes(mut self, bytes: usize) -> Self {
        self.sample_bytes = bytes.max(1);
        self
    }

    /// Rows buffered to resolve header and column count.
    pub fn lookahead_rows(mut self, rows: usize) -> Self {
        self.lookahead_rows = rows.max(1);
        self
    }

    /// Force the file encoding used by [`Importer::detect_and_parse`].
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Replace the header heuristic.
    pub fn header_policy(mut self, policy: impl HeaderPolicy + 'static) -> Self {
        self.header_policy = Box::new(policy);
        self
    }

    /// Replace the type-guess configuration.
    pub fn type_guesser(mut self, guesser: TypeGuesser) -> Self {
        self.guesser = guesser;
        self
    }

    /// Open `path`, decode it and run the whole pipeline.
    pub fn detect_and_parse<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ParseOptions,
    ) -> ImportResult<ParsedFile> {
        let mut file = File::open(path.as_ref())?;
        let sample = read_sample(&mut file, self.sample_bytes)?;

        let label = match &self.encoding {
            Some(label) => label.clone(),
            None => detect_encoding(&sample),
        };
        tracing::debug!(path = %path.as_ref().display(), encoding = %label, "opened file");

        let stream = Cursor::new(sample).chain(file);
        match lookup(&label, self.encoding.is_some())? {
            None => self.parse_open_stream(stream, options),
            Some(encoding) => self.parse_open_stream(DecodingReader::new(stream, encoding), options),
        }
    }

    /// Run the pipeline over an already-open UTF-8 stream.
    pub fn parse_open_stream<R: Read>(
        &self,
        mut reader: R,
        options: &ParseOptions,
    ) -> ImportResult<ParsedFile> {
        validate(options)?;

        let mut sample = read_sample(&mut reader, self.sample_bytes)?;
        if sample.len() >= self.sample_bytes && options.line_terminator.is_none() {
            extend_to_line_break(&mut reader, &mut sample)?;
        }
        if sample.starts_with(crate::encoding::UTF8_BOM) {
            sample = strip_bom(&sample).to_vec();
        }

        let dialect = match self.sniff_sample(&sample, options) {
            Ok(dialect) => dialect,
            Err(ImportError::UndetectableDialect) => {
                tracing::debug!("no line structure in sample; treating input as empty");
                return Ok(ParsedFile::empty());
            }
            Err(e) => return Err(e),
        };

        let skip = options.start_with_row.unwrap_or(1) - 1;
        let mut source = RawRowSource::skipping_rows(Cursor::new(sample).chain(reader), &dialect, skip)?;

        // Blank leading rows are skipped while streaming so the window starts
        // at the anchor row however long the preamble is.
        let mut skipped = 0;
        let mut window = Vec::new();
        for row in source.by_ref() {
            let row = row?;
            if is_blank_row(&row) {
                skipped += 1;
                continue;
            }
            window.push(row);
            break;
        }
        for row in source.by_ref().take(self.lookahead_rows.saturating_sub(1)) {
            window.push(row?);
        }

        let Some(resolution) = resolve_header(
            &window,
            options.header_mode,
            options.explicit_column_count,
            self.header_policy.as_ref(),
        ) else {
            tracing::debug!(skipped, "no non-blank rows; returning empty result");
            return Ok(ParsedFile::empty());
        };
        tracing::debug!(
            offset = skipped + resolution.offset,
            has_header = resolution.has_header,
            columns = resolution.column_count,
            "resolved layout"
        );

        let mut aligner = match options.explicit_column_count {
            Some(n) => RowAligner::explicit(n),
            None => RowAligner::new(resolution.column_count),
        };
        let mut builder = TableBuilder::new(resolution.names.clone(), options.row_count_cap);

        for row in window.drain(resolution.data_start()..) {
            if !builder.wants_more() {
                break;
            }
            builder.push(aligner.align(row));
        }
        while builder.wants_more() {
            match source.next() {
                Some(row) => builder.push(aligner.align(row?)),
                None => break,
            }
        }

        let table = builder.finish(&self.guesser);
        let resolved = ResolvedOptions::new(&dialect, options, resolution.has_header);
        Ok(ParsedFile {
            options: resolved.to_map(&table, aligner.truncated_rows()),
            tables: vec![table],
        })
    }

    /// Resolve the dialect of `path` without parsing it.
    ///
    /// `None` when the file has no line structure to sniff.
    pub fn sniff_path<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ParseOptions,
    ) -> ImportResult<Option<Dialect>> {
        let mut file = File::open(path.as_ref())?;
        let mut sample = read_sample(&mut file, self.sample_bytes)?;
        if sample.len() >= self.sample_bytes && options.line_terminator.is_none() {
            extend_to_line_break(&mut file, &mut sample)?;
        }
        let label = match &self.encoding {
            Some(label) => label.clone(),
            None => detect_encoding(&sample),
        };
        let text = decode_content(&sample, &label, self.encoding.is_some())?;
        match self.sniff_sample(text.as_bytes(), options) {
            Ok(dialect) => Ok(Some(dialect)),
            Err(ImportError::UndetectableDialect) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Detect the dialect on the sample, ignoring a trailing partial line when
    /// the sample filled its whole budget.
    fn sniff_sample(&self, sample: &[u8], options: &ParseOptions) -> ImportResult<Dialect> {
        let text = String::from_utf8_lossy(sample);
        let mut sniff: &str = &text;
        if sample.len() >= self.sample_bytes {
            if let Some(end) = sniff.rfind(&['\n', '\r'][..]) {
                sniff = &sniff[..=end];
            }
        }
        detect_dialect(sniff, options)
    }
}

/// Reject overrides that can never be honoured.
fn validate(options: &ParseOptions) -> ImportResult<()> {
    if options.start_with_row == Some(0) {
        return Err(ImportError::InvalidOption(
            "start_with_row is 1-based and must be at least 1".into(),
        ));
    }
    if options.explicit_column_count == Some(0) {
        return Err(ImportError::InvalidOption(
            "explicit_column_count must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Read up to `limit` bytes without consuming more of `reader`.
fn read_sample<R: Read>(reader: &mut R, limit: usize) -> ImportResult<Vec<u8>> {
    let mut sample = Vec::with_capacity(limit.min(DEFAULT_SAMPLE_BYTES));
    reader.by_ref().take(limit as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Grow a full sample until it holds a complete line break or the input ends.
///
/// A first line longer than the sample budget would otherwise look like input
/// without any line structure.
fn extend_to_line_break<R: Read>(reader: &mut R, sample: &mut Vec<u8>) -> ImportResult<()> {
    let mut scanned = 0;
    loop {
        if let Some(pos) = sample[scanned..].iter().position(|&b| b == b'\n' || b == b'\r') {
            // A trailing CR may be the first half of CRLF.
            if scanned + pos + 1 == sample.len() && sample[scanned + pos] == b'\r' {
                reader.by_ref().take(1).read_to_end(sample)?;
            }
            return Ok(());
        }
        scanned = sample.len();
        let read = reader
            .by_ref()
            .take(LINE_EXTENSION_BYTES as u64)
            .read_to_end(sample)?;
        if read == 0 {
            return Ok(());
        }
    }
}

// =============================================================================
// Free functions
// =============================================================================

/// Open `path` and import it with the default [`Importer`].
pub fn detect_and_parse<P: AsRef<Path>>(path: P, options: &ParseOptions) -> ImportResult<ParsedFile> {
    Importer::default().detect_and_parse(path, options)
}

/// Import an already-open stream with the default [`Importer`].
pub fn parse_open_stream<R: Read>(reader: R, options: &ParseOptions) -> ImportResult<ParsedFile> {
    Importer::default().parse_open_stream(reader, options)
}

/// Import in-memory text with the default [`Importer`].
pub fn parse_str(text: &str, options: &ParseOptions) -> ImportResult<ParsedFile> {
    parse_open_stream(text.as_bytes(), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guess::ColumnType;
    use crate::header::AlwaysHeader;
    use crate::options::HeaderMode;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::io::Write;

    fn parse(text: &str) -> ParsedFile {
        parse_str(text, &ParseOptions::default()).unwrap()
    }

    fn parse_with(text: &str, options: ParseOptions) -> ParsedFile {
        parse_str(text, &options).unwrap()
    }

    fn check_col(table: &Table, index: usize, name: &str, ty: ColumnType, values: &[&str]) {
        assert_eq!(table.columns[index].name, name, "name of column {}", index);
        assert_eq!(table.columns[index].index, index);
        assert_eq!(table.columns[index].guessed_type, ty, "type of column {}", index);
        assert_eq!(table.values[index], values, "values of column {}", index);
    }

    fn check_num_cols(table: &Table, expected: usize) {
        assert_eq!(table.columns.len(), expected);
        assert_eq!(table.values.len(), expected);
    }

    fn option<'a>(parsed: &'a ParsedFile, key: &str) -> &'a Value {
        &parsed.options[key]
    }

    #[test]
    fn test_header_defaulting() {
        let parsed = parse("name1,name2,name3\na1,b1,c1\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &["a1"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b1"]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1"]);
    }

    #[test]
    fn test_effective_options_echo() {
        let parsed = parse("name1,name2,name3\na1,b1,c1\n");
        let mut options = parsed.options.clone();
        assert_eq!(options.remove("row_count"), Some(json!(1)));
        assert_eq!(
            options.remove("schema"),
            Some(json!([
                {"name": "name1", "type": "text"},
                {"name": "name2", "type": "text"},
                {"name": "name3", "type": "text"}
            ]))
        );
        assert_eq!(options.remove("truncated_rows"), Some(json!(0)));
        assert_eq!(
            Value::Object(options),
            json!({
                "delimiter": ",",
                "quote_character": "\"",
                "double_quote": true,
                "line_terminator": "\n",
                "skip_initial_space": false,
                "include_column_names_as_headers": true,
                "start_with_row": 1,
                "row_count_cap": null,
                "explicit_column_count": null
            })
        );
    }

    #[test]
    fn test_ragged_short_rows() {
        let parsed = parse("name1, name2, name3\na1,b1,c1\na2,b2\na3\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b1", "b2", ""]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1", "", ""]);
        assert_eq!(option(&parsed, "skip_initial_space"), &json!(false));
    }

    #[test]
    fn test_rows_wider_than_header() {
        let parsed = parse("name1\na1,b1\na2,b2,c2\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2"]);
        check_col(table, 1, "", ColumnType::Text, &["b1", "b2"]);
        check_col(table, 2, "", ColumnType::Text, &["", "c2"]);
    }

    #[test]
    fn test_offset_rows_skipped() {
        let parsed = parse(",,,,,,,\nname1,name2,name3\na1,b1,c1\na2,b2,c2\na3,b3,c3,d4\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 4);
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b1", "b2", "b3"]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1", "c2", "c3"]);
        check_col(table, 3, "", ColumnType::Text, &["", "", "d4"]);
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(true));
    }

    #[test]
    fn test_numeric_first_row_is_data() {
        let parsed = parse("4,b1,c1\n4,b2,c2\n4,b3,c3\n");
        let table = &parsed.tables[0];
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(false));
        check_num_cols(table, 3);
        check_col(table, 0, "", ColumnType::Integer, &["4", "4", "4"]);
        check_col(table, 1, "", ColumnType::Text, &["b1", "b2", "b3"]);
        check_col(table, 2, "", ColumnType::Text, &["c1", "c2", "c3"]);
    }

    #[test]
    fn test_partially_empty_headers() {
        let parsed = parse(",,-,-\nb,a,a,a,a\nb,a,a,a,a\nb,a,a,a,a\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 5);
        check_col(table, 0, "", ColumnType::Text, &["b", "b", "b"]);
        check_col(table, 1, "", ColumnType::Text, &["a", "a", "a"]);
        check_col(table, 2, "-", ColumnType::Text, &["a", "a", "a"]);
        check_col(table, 3, "-", ColumnType::Text, &["a", "a", "a"]);
        check_col(table, 4, "", ColumnType::Text, &["a", "a", "a"]);

        let parsed = parse("-,-,-,-,-,-\nb,a,a,a,a\nb,a,a,a,a\nb,a,a,a,a\n");
        let table = &parsed.tables[0];
        check_num_cols(table, 6);
        check_col(table, 0, "-", ColumnType::Text, &["b", "b", "b"]);
        check_col(table, 5, "-", ColumnType::Text, &["", "", ""]);
    }

    #[test]
    fn test_user_delimiter_beats_sniffing() {
        let text = "name1,;name2,;name3\na1,;b1,;c1\na2,;b2,;c2\na3,;b3,;c3\n";
        let options = ParseOptions {
            delimiter: Some(';'),
            line_terminator: Some("\r\n".into()),
            quote_character: Some('"'),
            ..Default::default()
        };
        let parsed = parse_with(text, options);
        assert_eq!(option(&parsed, "delimiter"), &json!(";"));
        assert_eq!(option(&parsed, "line_terminator"), &json!("\r\n"));
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1,", ColumnType::Text, &["a1,", "a2,", "a3,"]);
        check_col(table, 1, "name2,", ColumnType::Text, &["b1,", "b2,", "b3,"]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1", "c2", "c3"]);

        // Sniffing prefers ',' over ';'.
        let parsed = parse(text);
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, ";name2", ColumnType::Text, &[";b1", ";b2", ";b3"]);
        check_col(table, 2, ";name3", ColumnType::Text, &[";c1", ";c2", ";c3"]);
    }

    #[test]
    fn test_one_line_file() {
        let parsed = parse("2,name2,name3\n");
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(false));
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "", ColumnType::Integer, &["2"]);
        check_col(table, 1, "", ColumnType::Text, &["name2"]);
        check_col(table, 2, "", ColumnType::Text, &["name3"]);

        let parsed = parse("name1,name2,name3\n");
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(true));
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &[]);
        check_col(table, 2, "name3", ColumnType::Text, &[]);
        assert_eq!(option(&parsed, "row_count"), &json!(0));
    }

    #[test]
    fn test_empty_input_sentinel() {
        for text in ["", "\n\n\n", ",,\n,,\n"] {
            let parsed = parse(text);
            assert!(parsed.is_empty(), "{:?}", text);
            assert_eq!(parsed.clone().into_parts(), (EffectiveOptions::new(), Vec::new()));
        }
    }

    #[test]
    fn test_text_without_line_break_is_empty() {
        assert!(parse("a,b,c").is_empty());

        let options = ParseOptions {
            line_terminator: Some("\n".into()),
            ..Default::default()
        };
        let parsed = parse_with("a,b,c", options);
        assert_eq!(parsed.tables[0].column_count(), 3);
    }

    #[test]
    fn test_row_count_cap() {
        let text = "name1,name2,name3\na1,b1,c1\na2,b2,c2\na3,b3,c3\n";

        let parsed = parse_with(text, ParseOptions { row_count_cap: Some(2), ..Default::default() });
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b1", "b2"]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1", "c2"]);
        assert_eq!(option(&parsed, "row_count_cap"), &json!(2));
        assert_eq!(option(&parsed, "row_count"), &json!(2));

        let parsed = parse_with(text, ParseOptions { row_count_cap: Some(10), ..Default::default() });
        check_col(&parsed.tables[0], 0, "name1", ColumnType::Text, &["a1", "a2", "a3"]);
    }

    #[test]
    fn test_row_count_cap_without_header() {
        let text = ",,\n,,\na1,1,c1\na2,2,c2\na3,3,c3\n";

        let parsed = parse(text);
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(false));
        let table = &parsed.tables[0];
        check_col(table, 0, "", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, "", ColumnType::Integer, &["1", "2", "3"]);

        let parsed = parse_with(text, ParseOptions { row_count_cap: Some(2), ..Default::default() });
        let table = &parsed.tables[0];
        check_col(table, 0, "", ColumnType::Text, &["a1", "a2"]);
        check_col(table, 1, "", ColumnType::Integer, &["1", "2"]);
        check_col(table, 2, "", ColumnType::Text, &["c1", "c2"]);
    }

    #[test]
    fn test_explicit_header_flag() {
        let text = "name1,name2,name3\na1,1,c1\na2,2,c2\na3,3,c3\n";

        let parsed = parse_with(text, ParseOptions { header_mode: HeaderMode::Absent, ..Default::default() });
        assert_eq!(option(&parsed, "include_column_names_as_headers"), &json!(false));
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "", ColumnType::Text, &["name1", "a1", "a2", "a3"]);
        check_col(table, 1, "", ColumnType::Text, &["name2", "1", "2", "3"]);
        check_col(table, 2, "", ColumnType::Text, &["name3", "c1", "c2", "c3"]);

        let parsed = parse_with(text, ParseOptions { header_mode: HeaderMode::Present, ..Default::default() });
        let table = &parsed.tables[0];
        check_col(table, 0, "name1", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, "name2", ColumnType::Integer, &["1", "2", "3"]);
        check_col(table, 2, "name3", ColumnType::Text, &["c1", "c2", "c3"]);
    }

    #[test]
    fn test_explicit_header_flag_after_offset() {
        let text = ",,,\n,,,\nn1,2,n3\na1,1,c1,d1\na2,4,c2\na3,5,c3\n";

        let parsed = parse_with(text, ParseOptions { header_mode: HeaderMode::Absent, ..Default::default() });
        let table = &parsed.tables[0];
        check_num_cols(table, 4);
        check_col(table, 0, "", ColumnType::Text, &["n1", "a1", "a2", "a3"]);
        check_col(table, 1, "", ColumnType::Integer, &["2", "1", "4", "5"]);
        check_col(table, 2, "", ColumnType::Text, &["n3", "c1", "c2", "c3"]);
        check_col(table, 3, "", ColumnType::Text, &["", "d1", "", ""]);

        let parsed = parse_with(text, ParseOptions { header_mode: HeaderMode::Present, ..Default::default() });
        let table = &parsed.tables[0];
        check_num_cols(table, 4);
        check_col(table, 0, "n1", ColumnType::Text, &["a1", "a2", "a3"]);
        check_col(table, 1, "2", ColumnType::Integer, &["1", "4", "5"]);
        check_col(table, 2, "n3", ColumnType::Text, &["c1", "c2", "c3"]);
        check_col(table, 3, "", ColumnType::Text, &["d1", "", ""]);
    }

    #[test]
    fn test_type_guess_keeps_values() {
        let parsed = parse("int1,label\n-1234123,a\n,b\n,c\n");
        let table = &parsed.tables[0];
        check_col(table, 0, "int1", ColumnType::Integer, &["-1234123", "", ""]);
    }

    #[test]
    fn test_mixed_types_per_column() {
        let text = "FIRST_NAME,PHONE,VALUE,DATE\n\
                    John,201-343-3434,45,2018-02-27 16:08:39 +0000\n\
                    Tim,201.343.3434,4545,2018-02-27 16:08:39 +0100\n\
                    Jenny,2013433434,0,2018-02-27 16:08:39 -0100\n\
                    Lily,(201)343-3434,4,\n";
        let table = &parse(text).tables[0];
        check_col(table, 0, "FIRST_NAME", ColumnType::Text, &["John", "Tim", "Jenny", "Lily"]);
        check_col(
            table,
            1,
            "PHONE",
            ColumnType::Text,
            &["201-343-3434", "201.343.3434", "2013433434", "(201)343-3434"],
        );
        check_col(table, 2, "VALUE", ColumnType::Integer, &["45", "4545", "0", "4"]);
        assert_eq!(table.columns[3].guessed_type, ColumnType::DateTime);
        assert_eq!(table.values[3][3], "");
    }

    #[test]
    fn test_explicit_column_count_drops_excess() {
        let options = ParseOptions { explicit_column_count: Some(2), ..Default::default() };
        let parsed = parse_with("a,b,c\n1,2,3,4\n5\n", options);
        let table = &parsed.tables[0];
        check_num_cols(table, 2);
        check_col(table, 0, "a", ColumnType::Integer, &["1", "5"]);
        check_col(table, 1, "b", ColumnType::Integer, &["2", ""]);
        assert_eq!(option(&parsed, "explicit_column_count"), &json!(2));
        assert_eq!(option(&parsed, "truncated_rows"), &json!(0));
    }

    #[test]
    fn test_explicit_column_count_can_widen() {
        let options = ParseOptions { explicit_column_count: Some(4), ..Default::default() };
        let table = &parse_with("a,b\n1,2\n", options).tables[0];
        check_num_cols(table, 4);
        check_col(table, 3, "", ColumnType::Text, &[""]);
    }

    #[test]
    fn test_row_past_lookahead_is_truncated_and_counted() {
        let importer = Importer::new().lookahead_rows(2);
        let parsed = importer
            .parse_open_stream("h1,h2\na,b\nc,d,e\n".as_bytes(), &ParseOptions::default())
            .unwrap();
        let table = &parsed.tables[0];
        check_num_cols(table, 2);
        check_col(table, 0, "h1", ColumnType::Text, &["a", "c"]);
        check_col(table, 1, "h2", ColumnType::Text, &["b", "d"]);
        assert_eq!(option(&parsed, "truncated_rows"), &json!(1));
    }

    #[test]
    fn test_long_preamble_beyond_lookahead() {
        let mut text = ",,\n".repeat(50);
        text.push_str("x,y\n1,2\n");
        let importer = Importer::new().lookahead_rows(5);
        let parsed = importer
            .parse_open_stream(text.as_bytes(), &ParseOptions::default())
            .unwrap();
        check_col(&parsed.tables[0], 0, "x", ColumnType::Integer, &["1"]);
    }

    #[test]
    fn test_start_with_row() {
        let options = ParseOptions { start_with_row: Some(2), ..Default::default() };
        let parsed = parse_with("report generated today\nname1,name2\na,b\n", options);
        assert_eq!(option(&parsed, "start_with_row"), &json!(2));
        let table = &parsed.tables[0];
        check_col(table, 0, "name1", ColumnType::Text, &["a"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b"]);
    }

    #[test]
    fn test_start_with_row_counts_blank_lines() {
        let options = ParseOptions { start_with_row: Some(3), ..Default::default() };
        let parsed = parse_with("junk\n\nname1,name2\na,b\n", options);
        let table = &parsed.tables[0];
        check_num_cols(table, 2);
        check_col(table, 0, "name1", ColumnType::Text, &["a"]);
        check_col(table, 1, "name2", ColumnType::Text, &["b"]);
    }

    #[test]
    fn test_start_with_row_past_end_is_empty() {
        let options = ParseOptions { start_with_row: Some(10), ..Default::default() };
        assert!(parse_with("a,b\n1,2\n", options).is_empty());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ParseOptions { start_with_row: Some(0), ..Default::default() };
        assert!(matches!(parse_str("a\n", &options), Err(ImportError::InvalidOption(_))));

        let options = ParseOptions { explicit_column_count: Some(0), ..Default::default() };
        assert!(matches!(parse_str("a\n", &options), Err(ImportError::InvalidOption(_))));
    }

    #[test]
    fn test_skip_initial_space() {
        let options = ParseOptions { skip_initial_space: Some(true), ..Default::default() };
        let parsed = parse_with("a, b\nx, \"y, z\"\n", options);
        assert_eq!(option(&parsed, "skip_initial_space"), &json!(true));
        check_col(&parsed.tables[0], 1, "b", ColumnType::Text, &["y, z"]);
    }

    #[test]
    fn test_quoted_multiline_values() {
        let table = &parse("id,notes\r\n1,\"first\r\nsecond\"\r\n2,plain\r\n").tables[0];
        check_col(table, 1, "notes", ColumnType::Text, &["first\r\nsecond", "plain"]);
    }

    #[test]
    fn test_backslash_escaped_quotes() {
        let parsed = parse("a,b\n1,\"say \\\"hi\\\" ok\"\n");
        assert_eq!(option(&parsed, "double_quote"), &json!(false));
        let table = &parsed.tables[0];
        check_col(table, 0, "a", ColumnType::Integer, &["1"]);
        check_col(table, 1, "b", ColumnType::Text, &["say \"hi\" ok"]);
    }

    #[test]
    fn test_ragged_rows_with_spaces_split_on_comma() {
        let parsed = parse("first name,last name,age\nJohn Smith,Doe\nJane Roe\n");
        assert_eq!(option(&parsed, "delimiter"), &json!(","));
        let table = &parsed.tables[0];
        check_num_cols(table, 3);
        check_col(table, 0, "first name", ColumnType::Text, &["John Smith", "Jane Roe"]);
        check_col(table, 1, "last name", ColumnType::Text, &["Doe", ""]);
        check_col(table, 2, "age", ColumnType::Text, &["", ""]);
    }

    #[test]
    fn test_first_line_longer_than_sample() {
        let wide = "x".repeat(70_000);
        let parsed = parse(&format!("{},h2\n1,2\n", wide));
        let table = &parsed.tables[0];
        check_num_cols(table, 2);
        assert_eq!(table.columns[0].name, wide);
        check_col(table, 1, "h2", ColumnType::Integer, &["2"]);
        assert_eq!(option(&parsed, "line_terminator"), &json!("\n"));
    }

    #[test]
    fn test_tiny_sample_budget_keeps_crlf() {
        let text = "name1,name2\r\na,b\r\n";
        let importer = Importer::new().sample_bytes(12);
        let parsed = importer.parse_open_stream(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(option(&parsed, "line_terminator"), &json!("\r\n"));
        check_col(&parsed.tables[0], 1, "name2", ColumnType::Text, &["b"]);

        let importer = Importer::new().sample_bytes(4);
        let parsed = importer.parse_open_stream(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed, parse(text));
    }

    #[test]
    fn test_malformed_quoting_surfaces() {
        let err = parse_str("a,b\n1,\"open\n2,3\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedQuoting { line: 2 }));
    }

    #[test]
    fn test_bom_is_not_part_of_first_name() {
        let table = &parse("\u{feff}id,name\n1,x\n").tables[0];
        assert_eq!(table.columns[0].name, "id");
    }

    #[test]
    fn test_pluggable_header_policy() {
        let importer = Importer::new().header_policy(AlwaysHeader);
        let parsed = importer
            .parse_open_stream("1,2\n3,4\n".as_bytes(), &ParseOptions::default())
            .unwrap();
        check_col(&parsed.tables[0], 0, "1", ColumnType::Integer, &["3"]);
    }

    #[test]
    fn test_effective_options_replay() {
        let text = "x;y\n1;2\n3;4\n";
        let first = parse(text);
        let replayed = ParseOptions::from_map(&first.options).unwrap();
        assert_eq!(replayed.delimiter, Some(';'));
        assert!(replayed.has_full_dialect());
        assert_eq!(parse_with(text, replayed), first);
    }

    #[test]
    fn test_detect_and_parse_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"name;city\nAlice;Paris\nBob;Lyon\n").unwrap();

        let parsed = detect_and_parse(file.path(), &ParseOptions::default()).unwrap();
        assert_eq!(option(&parsed, "delimiter"), &json!(";"));
        check_col(&parsed.tables[0], 1, "city", ColumnType::Text, &["Paris", "Lyon"]);
    }

    #[test]
    fn test_detect_and_parse_latin1() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"nom;ville\nSoci\xe9t\xe9;Paris\n").unwrap();

        let parsed = Importer::new()
            .encoding("iso-8859-1")
            .detect_and_parse(file.path(), &ParseOptions::default())
            .unwrap();
        check_col(&parsed.tables[0], 0, "nom", ColumnType::Text, &["Société"]);
    }

    #[test]
    fn test_sniff_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"a\tb\n1\t2\n").unwrap();
        let dialect = Importer::new()
            .sniff_path(file.path(), &ParseOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(dialect.delimiter, '\t');
        assert_eq!(dialect.line_terminator, "\n");
    }

    #[test]
    fn test_small_sample_budget() {
        let text = "name1,name2\na1,b1\na2,b2\na3,b3\n";
        let importer = Importer::new().sample_bytes(16);
        let parsed = importer.parse_open_stream(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(parsed, parse(text));
    }

    fn ragged_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(prop::collection::vec("[a-z0-9]{1,4}", 1..6), 1..20)
    }

    proptest! {
        #[test]
        fn prop_parsing_is_idempotent(rows in ragged_rows()) {
            let text: String = rows.iter().map(|r| r.join(",") + "\n").collect();
            prop_assert_eq!(parse(&text), parse(&text));
        }

        #[test]
        fn prop_table_is_rectangular_and_lossless(rows in ragged_rows()) {
            let text: String = rows.iter().map(|r| r.join(",") + "\n").collect();
            let parsed = parse(&text);
            let table = &parsed.tables[0];
            let has_header = parsed.options["include_column_names_as_headers"] == json!(true);
            let data = if has_header { &rows[1..] } else { &rows[..] };

            prop_assert_eq!(table.columns.len(), table.values.len());
            for column in &table.values {
                prop_assert_eq!(column.len(), data.len());
            }
            for (r, row) in data.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    prop_assert_eq!(&table.values[c][r], value);
                }
            }
        }
    }
}
