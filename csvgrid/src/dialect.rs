//! Dialect detection: delimiter, quote character and line terminator.
//!
//! Any field the caller supplies wins over a guess. When every field is
//! supplied the sample is not looked at at all.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{ImportError, ImportResult};
use crate::options::ParseOptions;

/// Candidate delimiters, most preferred first.
pub const DELIMITER_PREFERENCE: [char; 5] = [',', '\t', ';', ' ', ':'];

/// Share of sampled rows that must agree on a delimiter count.
const CONSISTENCY_THRESHOLD: f64 = 0.9;

pub const DEFAULT_QUOTE: char = '"';
pub const ESCAPE_CHARACTER: char = '\\';
pub const DEFAULT_LINE_TERMINATOR: &str = "\r\n";

/// Single-quoted fields bounded by a candidate delimiter or a line edge.
static SINGLE_QUOTED_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:^|[,\t; :])'[^'\r\n]*'(?:[,\t; :]|\r?$)").expect("valid quote pattern")
});

/// Double-quoted fields bounded by a candidate delimiter or a line edge.
static DOUBLE_QUOTED_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)(?:^|[,\t; :])"[^"\r\n]*"(?:[,\t; :]|\r?$)"#).expect("valid quote pattern")
});

// =============================================================================
// Dialect
// =============================================================================

/// Punctuation conventions for one parse. Immutable once resolved.
///
/// Inside quoted fields a quote is either doubled or, with `double_quote`
/// off, preceded by `escape_character`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialect {
    pub delimiter: char,
    pub quote_character: char,
    pub double_quote: bool,
    pub escape_character: Option<char>,
    pub line_terminator: String,
    pub skip_initial_space: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_character: DEFAULT_QUOTE,
            double_quote: true,
            escape_character: None,
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
            skip_initial_space: false,
        }
    }
}

impl Dialect {
    /// Delimiter as the tokenizer byte.
    pub fn delimiter_byte(&self) -> ImportResult<u8> {
        let byte = ascii_byte(self.delimiter, "delimiter")?;
        if matches!(byte, b'\r' | b'\n') {
            return Err(ImportError::InvalidOption(
                "delimiter cannot be a line break".into(),
            ));
        }
        if self.delimiter == self.quote_character {
            return Err(ImportError::InvalidOption(
                "delimiter and quote character must differ".into(),
            ));
        }
        Ok(byte)
    }

    /// Quote character as the tokenizer byte.
    pub fn quote_byte(&self) -> ImportResult<u8> {
        ascii_byte(self.quote_character, "quote character")
    }

    /// Escape character as the tokenizer byte.
    pub fn escape_byte(&self) -> ImportResult<Option<u8>> {
        self.escape_character
            .map(|c| ascii_byte(c, "escape character"))
            .transpose()
    }

    /// Explicit terminator byte, or `None` for the CR/LF family.
    pub fn terminator_byte(&self) -> ImportResult<Option<u8>> {
        match self.line_terminator.as_str() {
            "\r\n" | "\n" | "\r" => Ok(None),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => ascii_byte(c, "line terminator").map(Some),
                    _ => Err(ImportError::InvalidOption(format!(
                        "unsupported line terminator {:?}",
                        other
                    ))),
                }
            }
        }
    }

    /// Tokenizer terminator setting.
    pub fn terminator(&self) -> ImportResult<csv::Terminator> {
        Ok(match self.terminator_byte()? {
            None => csv::Terminator::CRLF,
            Some(byte) => csv::Terminator::Any(byte),
        })
    }

    fn validate(self) -> ImportResult<Self> {
        self.delimiter_byte()?;
        self.quote_byte()?;
        self.escape_byte()?;
        self.terminator_byte()?;
        Ok(self)
    }
}

fn ascii_byte(c: char, what: &str) -> ImportResult<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ImportError::InvalidOption(format!(
            "{} must be a single ASCII character, got {:?}",
            what, c
        )))
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Resolve the dialect for `sample`, filling in whatever `options` leaves open.
///
/// Fails with [`ImportError::UndetectableDialect`] when guessing is needed and
/// the sample is empty, or when the line terminator must be guessed and the
/// sample has no line break.
pub fn detect_dialect(sample: &str, options: &ParseOptions) -> ImportResult<Dialect> {
    if options.has_full_dialect() {
        let double_quote = options.double_quote.unwrap_or(true);
        let dialect = Dialect {
            delimiter: options.delimiter.unwrap_or(','),
            quote_character: options.quote_character.unwrap_or(DEFAULT_QUOTE),
            double_quote,
            escape_character: escape_for(double_quote),
            line_terminator: options
                .line_terminator
                .clone()
                .unwrap_or_else(|| DEFAULT_LINE_TERMINATOR.to_string()),
            skip_initial_space: options.skip_initial_space.unwrap_or(false),
        };
        return dialect.validate();
    }

    if sample.is_empty() {
        return Err(ImportError::UndetectableDialect);
    }

    let line_terminator = match &options.line_terminator {
        Some(t) => t.clone(),
        None => detect_line_terminator(sample)
            .ok_or(ImportError::UndetectableDialect)?
            .to_string(),
    };
    let quote_character = options
        .quote_character
        .unwrap_or_else(|| detect_quote(sample));
    let double_quote = options
        .double_quote
        .unwrap_or_else(|| detect_double_quote(sample, quote_character));
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| sniff_delimiter(sample, quote_character));

    let dialect = Dialect {
        delimiter,
        quote_character,
        double_quote,
        escape_character: escape_for(double_quote),
        line_terminator,
        skip_initial_space: options.skip_initial_space.unwrap_or(false),
    }
    .validate()?;

    tracing::debug!(
        delimiter = ?dialect.delimiter,
        quote = ?dialect.quote_character,
        terminator = ?dialect.line_terminator,
        "resolved dialect"
    );
    Ok(dialect)
}

/// Backslash escaping takes over when quotes are not doubled.
fn escape_for(double_quote: bool) -> Option<char> {
    if double_quote {
        None
    } else {
        Some(ESCAPE_CHARACTER)
    }
}

/// First line break sequence in `sample`.
pub fn detect_line_terminator(sample: &str) -> Option<&'static str> {
    let bytes = sample.as_bytes();
    let pos = bytes.iter().position(|&b| b == b'\r' || b == b'\n')?;
    Some(match (bytes[pos], bytes.get(pos + 1)) {
        (b'\r', Some(b'\n')) => "\r\n",
        (b'\r', _) => "\r",
        _ => "\n",
    })
}

/// Double quote unless single-quoted fields clearly dominate.
fn detect_quote(sample: &str) -> char {
    let single = SINGLE_QUOTED_FIELD.find_iter(sample).count();
    let double = DOUBLE_QUOTED_FIELD.find_iter(sample).count();
    if single > double {
        '\''
    } else {
        DEFAULT_QUOTE
    }
}

/// Doubled quotes stay on unless the sample only ever backslash-escapes.
fn detect_double_quote(sample: &str, quote: char) -> bool {
    let doubled: String = [quote, quote].iter().collect();
    let escaped: String = ['\\', quote].iter().collect();
    sample.contains(&doubled) || !sample.contains(&escaped)
}

/// Pick a delimiter by row-to-row consistency of its count.
///
/// The first candidate in [`DELIMITER_PREFERENCE`] order whose count agrees on
/// at least 90% of rows wins, however cleanly a later candidate splits. Ragged
/// samples where nothing is that consistent still go by preference order: the
/// first candidate whose modal count is non-zero, then the first one present
/// at all, then comma. A better score never lets a later candidate jump ahead.
pub fn sniff_delimiter(sample: &str, quote: char) -> char {
    let lines: Vec<&str> = logical_lines(sample, quote)
        .into_iter()
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return ',';
    }

    let mut fallback: Option<char> = None;
    for &candidate in &DELIMITER_PREFERENCE {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_unquoted(line, candidate, quote))
            .collect();
        let Some(consistency) = consistency(&counts) else {
            continue;
        };
        if consistency >= CONSISTENCY_THRESHOLD {
            return candidate;
        }
        fallback.get_or_insert(candidate);
    }
    fallback
        .or_else(|| {
            DELIMITER_PREFERENCE
                .into_iter()
                .find(|&c| lines.iter().any(|line| count_unquoted(line, c, quote) > 0))
        })
        .unwrap_or(',')
}

/// Share of rows matching the modal count, or `None` if the mode is zero.
fn consistency(counts: &[usize]) -> Option<f64> {
    let mut freq: std::collections::BTreeMap<usize, usize> = std::collections::BTreeMap::new();
    for &c in counts {
        *freq.entry(c).or_default() += 1;
    }
    // Larger counts win ties: iteration is ascending, so `>=` keeps the last.
    let (mode, hits) = freq
        .iter()
        .fold((0, 0), |acc, (&count, &hits)| if hits >= acc.1 { (count, hits) } else { acc });
    if mode == 0 {
        return None;
    }
    Some(hits as f64 / counts.len() as f64)
}

/// Split on line breaks that are outside quotes.
fn logical_lines(sample: &str, quote: char) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let mut chars = sample.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            in_quote = !in_quote;
        } else if !in_quote && (c == '\n' || c == '\r') {
            lines.push(&sample[start..i]);
            if c == '\r' && matches!(chars.peek(), Some((_, '\n'))) {
                chars.next();
                start = i + 2;
            } else {
                start = i + 1;
            }
        }
    }
    if start < sample.len() {
        lines.push(&sample[start..]);
    }
    lines
}

fn count_unquoted(line: &str, needle: char, quote: char) -> usize {
    let mut in_quote = false;
    let mut count = 0;
    for c in line.chars() {
        if c == quote {
            in_quote = !in_quote;
        } else if c == needle && !in_quote {
            count += 1;
        }
    }
    count
}
