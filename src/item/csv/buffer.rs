use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::ops::Range;

use encoding_rs::{CoderResult, Decoder, Encoding};
use log::{debug, error};

use crate::error::{CsvError, CsvResult};

/// Number of characters of buffer content quoted in traces and fault messages.
const EXCERPT_LENGTH: usize = 64;

/// A prefix match against the unconsumed part of the buffer.
///
/// `capture` is the text handed back to the caller, `end` is how many bytes
/// the match removes from the front of the buffer. Both are relative to
/// [`Buffer::remaining`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Match {
    pub capture: Range<usize>,
    pub end: usize,
}

impl Match {
    /// Captures `0..capture_end` and removes `0..end`.
    pub fn new(capture_end: usize, end: usize) -> Self {
        Self {
            capture: 0..capture_end,
            end,
        }
    }

    /// Removes `0..end` without capturing anything.
    pub fn skip(end: usize) -> Self {
        Self { capture: 0..0, end }
    }
}

/// Growable text accumulator fed from a byte source.
///
/// Decoded text is appended at the back and consumed from the front through
/// a cursor; the consumed prefix is compacted away on the next refill.
pub(crate) struct Buffer<R> {
    source: BufReader<R>,
    decoder: Decoder,
    text: String,
    pos: usize,
    threshold: usize,
    eof: bool,
    debug: bool,
}

impl<R: Read> Buffer<R> {
    pub fn new(rdr: R, encoding: &'static Encoding, threshold: usize, debug: bool) -> Self {
        let threshold = threshold.max(1);

        Self {
            source: BufReader::with_capacity(threshold, rdr),
            decoder: encoding.new_decoder_with_bom_removal(),
            text: String::with_capacity(threshold),
            pos: 0,
            threshold,
            eof: false,
            debug,
        }
    }

    /// Unconsumed text.
    pub fn remaining(&self) -> &str {
        &self.text[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.text.len()
    }

    /// Whether the source has reported exhaustion. Never goes back to `false`.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Source exhausted and every buffered character consumed.
    pub fn is_drained(&self) -> bool {
        self.eof && self.is_empty()
    }

    /// Pulls chunks until the refill threshold is met or the source is exhausted.
    pub fn ensure_filled(&mut self) -> CsvResult<()> {
        while !self.eof && self.text.len() - self.pos < self.threshold {
            self.read_chunk()?;
        }
        Ok(())
    }

    /// Pulls at least one more chunk, regardless of the threshold.
    ///
    /// Returns `false` when the source was already exhausted.
    pub fn fill_more(&mut self) -> CsvResult<bool> {
        let before = self.text.len() - self.pos;
        while !self.eof {
            self.read_chunk()?;
            if self.text.len() - self.pos > before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Removes the matched prefix and returns the captured text.
    ///
    /// A match that removes nothing would leave the tokenizer spinning on the
    /// same input and is reported as a [`CsvError::ParserFault`].
    pub fn consume(&mut self, m: Match, what: &str) -> CsvResult<String> {
        let remaining = self.remaining();
        if m.end == 0 || m.end > remaining.len() || m.capture.end > m.end {
            return Err(self.fault(format!(
                "Match on {} did not shrink the buffer ({:?})",
                what, m
            )));
        }

        let captured = remaining[m.capture.clone()].to_string();
        if self.debug {
            debug!(
                "csv_lazy: {} matched {:?}, buffer {} -> {}",
                what,
                excerpt(&remaining[..m.end]),
                remaining.len(),
                remaining.len() - m.end
            );
        }
        self.pos += m.end;

        Ok(captured)
    }

    /// Removes and returns everything left in the buffer.
    pub fn take_rest(&mut self, what: &str) -> CsvResult<String> {
        let length = self.text.len() - self.pos;
        self.consume(Match::new(length, length), what)
    }

    /// Builds a fault carrying an excerpt of the unconsumed text.
    pub fn fault(&self, message: String) -> CsvError {
        let remaining = self.remaining();
        let fault = format!(
            "{} ({} bytes left): {:?}",
            message,
            remaining.len(),
            excerpt(remaining)
        );
        error!("csv_lazy: {}", fault);
        CsvError::ParserFault(fault)
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn read_chunk(&mut self) -> CsvResult<()> {
        if self.pos > 0 {
            self.text.drain(..self.pos);
            self.pos = 0;
        }

        // An empty chunk is the end of input and flushes the decoder.
        let length = loop {
            match self.source.fill_buf() {
                Ok(chunk) => {
                    decode_into(&mut self.decoder, chunk, &mut self.text, chunk.is_empty());
                    break chunk.len();
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(CsvError::Io(error)),
            }
        };

        if length == 0 {
            self.eof = true;
            if self.debug {
                debug!("csv_lazy: end of input, {} bytes buffered", self.text.len());
            }
            return Ok(());
        }

        self.source.consume(length);

        if self.debug {
            debug!(
                "csv_lazy: read {} bytes, buffer is now {} bytes",
                length,
                self.text.len()
            );
        }
        Ok(())
    }
}

/// Decodes `bytes` onto the end of `text`, carrying split sequences over to the next call.
fn decode_into(decoder: &mut Decoder, mut bytes: &[u8], text: &mut String, last: bool) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len().saturating_mul(3).saturating_add(16));
        text.reserve(needed);

        let (result, read, _) = decoder.decode_to_string(bytes, text, last);
        bytes = &bytes[read..];

        match result {
            CoderResult::InputEmpty => return,
            CoderResult::OutputFull => continue,
        }
    }
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_LENGTH) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn buffer(input: &'static [u8], threshold: usize) -> Buffer<Cursor<&'static [u8]>> {
        Buffer::new(Cursor::new(input), encoding_rs::UTF_8, threshold, false)
    }

    #[test]
    fn ensure_filled_stops_at_threshold() -> CsvResult<()> {
        let mut buf = buffer(b"abcdefghij", 4);

        buf.ensure_filled()?;
        assert_eq!(buf.remaining(), "abcd");
        assert!(!buf.is_eof());

        buf.consume(Match::skip(2), "test")?;
        buf.ensure_filled()?;
        assert_eq!(buf.remaining(), "cdefgh");

        Ok(())
    }

    #[test]
    fn eof_is_set_once_source_is_exhausted() -> CsvResult<()> {
        let mut buf = buffer(b"ab", 16);

        buf.ensure_filled()?;
        assert_eq!(buf.remaining(), "ab");
        assert!(buf.is_eof());
        assert!(!buf.is_drained());
        assert!(!buf.fill_more()?);

        assert_eq!(buf.take_rest("test")?, "ab");
        assert!(buf.is_drained());

        Ok(())
    }

    #[test]
    fn consume_returns_capture_and_drops_match() -> CsvResult<()> {
        let mut buf = buffer(b"foo;bar", 64);
        buf.ensure_filled()?;

        assert_eq!(buf.consume(Match::new(3, 4), "col_sep")?, "foo");
        assert_eq!(buf.remaining(), "bar");

        Ok(())
    }

    #[test]
    fn match_that_does_not_shrink_is_a_fault() -> CsvResult<()> {
        let mut buf = buffer(b"foo", 64);
        buf.ensure_filled()?;

        let result = buf.consume(Match::skip(0), "nothing");
        assert!(matches!(result, Err(CsvError::ParserFault(_))));
        assert_eq!(buf.remaining(), "foo");

        Ok(())
    }

    #[test]
    fn multibyte_sequence_split_across_chunks_is_decoded() -> CsvResult<()> {
        // "é" is two bytes in UTF-8; a one-byte threshold splits it.
        let mut buf = buffer("aé;".as_bytes(), 1);

        buf.ensure_filled()?;
        assert_eq!(buf.remaining(), "a");
        assert!(buf.fill_more()?);
        assert_eq!(buf.remaining(), "aé");

        Ok(())
    }

    #[test]
    fn utf16_source_is_transcoded() -> CsvResult<()> {
        let bytes: &'static [u8] = &[0xFF, 0xFE, b'h', 0, b'i', 0];
        let mut buf = Buffer::new(Cursor::new(bytes), encoding_rs::UTF_16LE, 64, false);

        buf.ensure_filled()?;
        assert_eq!(buf.remaining(), "hi");

        Ok(())
    }
}
