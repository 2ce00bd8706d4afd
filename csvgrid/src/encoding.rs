//! Encoding detection and decoding for files opened by path.
//!
//! Streams handed to [`crate::parse_open_stream`] are taken as UTF-8 and
//! decoded lossily; this module only matters when the importer opens the file
//! itself. Other encodings are transcoded on the fly by [`DecodingReader`].

use std::io::{self, Read};

use encoding_rs::{CoderResult, Decoder, Encoding};

use crate::error::{ImportError, ImportResult};

/// Raw bytes pulled from the inner reader per decode step.
const DECODE_CHUNK: usize = 8 * 1024;

/// UTF-8 byte order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(UTF8_BOM) {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// True for labels that need no transcoding.
pub fn is_utf8(label: &str) -> bool {
    matches!(label.to_lowercase().as_str(), "utf-8" | "utf8" | "ascii")
}

/// Decode bytes with the encoding called `label`.
///
/// Malformed sequences are replaced. A label nobody knows is an error only
/// when `strict` is set; otherwise the bytes are read as lossy UTF-8.
pub fn decode_content(bytes: &[u8], label: &str, strict: bool) -> ImportResult<String> {
    if is_utf8(label) {
        return Ok(String::from_utf8_lossy(strip_bom(bytes)).into_owned());
    }
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => Ok(encoding.decode(bytes).0.into_owned()),
        None if strict => Err(ImportError::Encoding(format!(
            "unknown encoding '{}'",
            label
        ))),
        None => Ok(String::from_utf8_lossy(strip_bom(bytes)).into_owned()),
    }
}

/// Resolve `label` to a transcoding encoding.
///
/// `None` means the bytes can be read as (lossy) UTF-8 directly. A label
/// nobody knows is an error only when `strict` is set.
pub fn lookup(label: &str, strict: bool) -> ImportResult<Option<&'static Encoding>> {
    if is_utf8(label) {
        return Ok(None);
    }
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) if encoding == encoding_rs::UTF_8 => Ok(None),
        Some(encoding) => Ok(Some(encoding)),
        None if strict => Err(ImportError::Encoding(format!(
            "unknown encoding '{}'",
            label
        ))),
        None => {
            tracing::warn!(label, "unknown encoding; reading as UTF-8");
            Ok(None)
        }
    }
}

/// Drop a leading UTF-8 byte order mark.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

// =============================================================================
// Decoding Reader
// =============================================================================

/// Read adapter that transcodes `inner` to UTF-8 chunk by chunk.
///
/// Only one raw chunk and its decoded output are held at a time. Malformed
/// sequences are replaced.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    output: Vec<u8>,
    output_pos: usize,
    output_len: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self::with_chunk_size(inner, encoding, DECODE_CHUNK)
    }

    fn with_chunk_size(inner: R, encoding: &'static Encoding, chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            input: vec![0; chunk],
            input_pos: 0,
            input_len: 0,
            // Room for the worst-case expansion of a full chunk.
            output: vec![0; chunk * 3 + 16],
            output_pos: 0,
            output_len: 0,
            eof: false,
            finished: false,
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_pos < self.output_len {
                let n = buf.len().min(self.output_len - self.output_pos);
                buf[..n].copy_from_slice(&self.output[self.output_pos..self.output_pos + n]);
                self.output_pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }

            if self.input_pos == self.input_len && !self.eof {
                self.input_len = self.inner.read(&mut self.input)?;
                self.input_pos = 0;
                self.eof = self.input_len == 0;
            }

            let (result, read, written, _) = self.decoder.decode_to_utf8(
                &self.input[self.input_pos..self.input_len],
                &mut self.output,
                self.eof,
            );
            self.input_pos += read;
            self.output_pos = 0;
            self.output_len = written;
            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}
