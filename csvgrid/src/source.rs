//! Raw row source: a single forward pass of field sequences over a stream.
//!
//! Tokenizing is delegated to the `csv` crate in flexible mode, so rows keep
//! whatever width they have on disk. A thin reader in front of it tracks quote
//! state, which lets an unterminated quote at end of stream surface as
//! [`ImportError::MalformedQuoting`] and implements `skip_initial_space`,
//! backslash escapes and skipping leading physical rows.

use std::io::{self, Read};

use crate::dialect::Dialect;
use crate::error::{ImportResult, UnterminatedQuote};

/// Fields of one physical row, in order. Width varies from row to row.
pub type RawRow = Vec<String>;

/// True when every field of `row` is blank.
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|f| f.trim().is_empty())
}

/// Number of fields up to and including the last non-blank one.
pub fn nonempty_width(row: &[String]) -> usize {
    row.iter()
        .rposition(|f| !f.trim().is_empty())
        .map_or(0, |i| i + 1)
}

// =============================================================================
// Raw Row Source
// =============================================================================

/// Lazy, finite, non-restartable sequence of [`RawRow`]s.
///
/// Reopen the stream to make another pass. Undecodable UTF-8 is replaced
/// rather than rejected.
pub struct RawRowSource<R: Read> {
    reader: csv::Reader<QuoteTracker<R>>,
    record: csv::ByteRecord,
    finished: bool,
}

impl<R: Read> RawRowSource<R> {
    pub fn new(input: R, dialect: &Dialect) -> ImportResult<Self> {
        Self::skipping_rows(input, dialect, 0)
    }

    /// Like [`RawRowSource::new`], but drops the first `skip` physical rows.
    ///
    /// Blank lines count as rows here, while line breaks inside quoted fields
    /// do not end one.
    pub fn skipping_rows(input: R, dialect: &Dialect, skip: usize) -> ImportResult<Self> {
        let tracker = QuoteTracker::new(input, dialect, skip)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(true)
            .delimiter(dialect.delimiter_byte()?)
            .quote(dialect.quote_byte()?)
            .double_quote(dialect.double_quote)
            .escape(dialect.escape_byte()?)
            .terminator(dialect.terminator()?)
            .from_reader(tracker);

        Ok(Self {
            reader,
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }
}

impl<R: Read> Iterator for RawRowSource<R> {
    type Item = ImportResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(Ok(self
                .record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect())),
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}

// =============================================================================
// Quote Tracker
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart { after_delimiter: bool },
    Unquoted,
    Quoted,
    EscapeInQuoted,
    QuoteInQuoted,
}

impl QuoteState {
    fn in_quotes(self) -> bool {
        matches!(self, QuoteState::Quoted | QuoteState::EscapeInQuoted)
    }
}

/// Byte filter mirroring the tokenizer's quote handling.
///
/// Passes bytes through unchanged except for leading rows being skipped and
/// spaces right after a delimiter when `skip_initial_space` is set. Reports an
/// open quote at end of input as an io error carrying [`UnterminatedQuote`].
struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    quote: u8,
    double_quote: bool,
    escape: Option<u8>,
    skip_initial_space: bool,
    // None means any of CR, LF.
    terminator: Option<u8>,
    state: QuoteState,
    prev_cr: bool,
    line: usize,
    quote_line: usize,
    skip_rows: usize,
}

impl<R: Read> QuoteTracker<R> {
    fn new(inner: R, dialect: &Dialect, skip_rows: usize) -> ImportResult<Self> {
        Ok(Self {
            inner,
            delimiter: dialect.delimiter_byte()?,
            quote: dialect.quote_byte()?,
            double_quote: dialect.double_quote,
            escape: dialect.escape_byte()?,
            skip_initial_space: dialect.skip_initial_space,
            terminator: dialect.terminator_byte()?,
            state: QuoteState::FieldStart {
                after_delimiter: false,
            },
            prev_cr: false,
            line: 1,
            quote_line: 1,
            skip_rows,
        })
    }

    fn is_terminator(&self, b: u8) -> bool {
        match self.terminator {
            None => b == b'\n' || b == b'\r',
            Some(t) => b == t,
        }
    }

    /// Advance over `b`. Returns whether the byte is kept and whether it
    /// ended a physical row.
    fn step(&mut self, b: u8) -> (bool, bool) {
        // CR, LF and CRLF each end one line.
        let line_break = match self.terminator {
            Some(t) => b == t,
            None => b == b'\r' || (b == b'\n' && !self.prev_cr),
        };
        self.prev_cr = b == b'\r';
        let quoted = self.state.in_quotes();

        let keep = match self.state {
            QuoteState::FieldStart { after_delimiter } => {
                if b == b' ' && after_delimiter && self.skip_initial_space {
                    return (false, false);
                }
                self.state = if b == self.quote {
                    self.quote_line = self.line;
                    QuoteState::Quoted
                } else {
                    self.boundary_or(b, QuoteState::Unquoted)
                };
                true
            }
            QuoteState::Unquoted => {
                self.state = self.boundary_or(b, QuoteState::Unquoted);
                true
            }
            QuoteState::Quoted => {
                if b == self.quote {
                    self.state = QuoteState::QuoteInQuoted;
                } else if Some(b) == self.escape {
                    self.state = QuoteState::EscapeInQuoted;
                }
                true
            }
            QuoteState::EscapeInQuoted => {
                self.state = QuoteState::Quoted;
                true
            }
            QuoteState::QuoteInQuoted => {
                self.state = if b == self.quote && self.double_quote {
                    QuoteState::Quoted
                } else {
                    self.boundary_or(b, QuoteState::Unquoted)
                };
                true
            }
        };
        if line_break {
            self.line += 1;
        }
        (keep, line_break && !quoted)
    }

    fn boundary_or(&self, b: u8, otherwise: QuoteState) -> QuoteState {
        if b == self.delimiter {
            QuoteState::FieldStart {
                after_delimiter: true,
            }
        } else if self.is_terminator(b) {
            QuoteState::FieldStart {
                after_delimiter: false,
            }
        } else {
            otherwise
        }
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                if self.state.in_quotes() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        UnterminatedQuote {
                            line: self.quote_line,
                        },
                    ));
                }
                return Ok(0);
            }

            let mut kept = 0;
            for i in 0..n {
                let b = buf[i];
                let skipping = self.skip_rows > 0;
                let (keep, row_end) = self.step(b);
                if skipping {
                    if row_end {
                        self.skip_rows -= 1;
                    }
                    continue;
                }
                if keep {
                    buf[kept] = b;
                    kept += 1;
                }
            }
            // A chunk made only of dropped bytes must not look like EOF.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}
