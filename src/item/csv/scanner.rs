//! Column scanner: decides what the next token in the buffer is.
//!
//! Every decision is a prefix match against the unconsumed buffer. When the
//! buffer does not yet hold enough text to decide, the scan reports
//! [`ColumnScan::NeedMoreData`]; [`ColumnScanner::next_column`] then refills
//! the buffer and scans again. That retry never leaves this module.

use std::io::Read;

use log::debug;
use memchr::memmem::Finder;

use super::buffer::{Buffer, Match};
use super::options::ReaderOptions;
use super::unescape::{unescape, ESCAPE};
use crate::error::CsvResult;

/// Whether the row continues after a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowState {
    MoreInRow,
    EndOfRow,
}

/// Outcome of a single scan step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ColumnScan {
    Column(String, RowState),
    EndOfRow,
    NeedMoreData,
}

/// Outcome of matching "optional whitespace, then a delimiter".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    /// Delimiter found; the value is the length of whitespace plus delimiter.
    Matched(usize),
    /// Something other than whitespace precedes any delimiter.
    Rejected,
    /// Only whitespace, or a partial delimiter, up to the end of the buffer.
    Incomplete,
}

pub(crate) struct ColumnScanner {
    quote: String,
    col_sep: String,
    row_sep: String,
    quote_finder: Finder<'static>,
    col_finder: Finder<'static>,
    row_finder: Finder<'static>,
    debug: bool,
}

impl ColumnScanner {
    pub fn new(options: &ReaderOptions) -> Self {
        Self {
            quote_finder: Finder::new(options.quote_char.as_bytes()).into_owned(),
            col_finder: Finder::new(options.col_sep.as_bytes()).into_owned(),
            row_finder: Finder::new(options.row_sep.as_bytes()).into_owned(),
            quote: options.quote_char.clone(),
            col_sep: options.col_sep.clone(),
            row_sep: options.row_sep.clone(),
            debug: options.debug,
        }
    }

    /// Reads the next column, refilling the buffer until the scan can decide.
    ///
    /// Returns `None` as the column for a row boundary that carries no column.
    pub fn next_column<R: Read>(
        &self,
        buffer: &mut Buffer<R>,
    ) -> CsvResult<(Option<String>, RowState)> {
        buffer.ensure_filled()?;

        loop {
            match self.scan(buffer)? {
                ColumnScan::Column(text, state) => return Ok((Some(text), state)),
                ColumnScan::EndOfRow => return Ok((None, RowState::EndOfRow)),
                ColumnScan::NeedMoreData => {
                    if self.debug {
                        debug!("csv_lazy: need more data, refilling");
                    }
                    buffer.fill_more()?;
                }
            }
        }
    }

    /// One pass over the decision chain. First matching rule wins.
    pub fn scan<R: Read>(&self, buffer: &mut Buffer<R>) -> CsvResult<ColumnScan> {
        if buffer.is_empty() {
            return Ok(ColumnScan::EndOfRow);
        }

        let rest = buffer.remaining();

        if let Prefix::Matched(end) = self.after_whitespace(rest, &self.row_sep) {
            buffer.consume(Match::skip(end), "row_sep")?;
            return Ok(ColumnScan::EndOfRow);
        }

        if let Prefix::Matched(end) = self.after_whitespace(rest, &self.quote) {
            buffer.consume(Match::skip(end), "opening quote")?;
            return self.quoted_column(buffer);
        }

        let col = self.col_finder.find(rest.as_bytes());
        let row = self.row_finder.find(rest.as_bytes());

        match (col, row) {
            (Some(col), Some(row)) if row < col => self.unquoted_row_end(buffer, row),
            (Some(col), _) => {
                let text = buffer.consume(Match::new(col, col + self.col_sep.len()), "col_sep")?;
                Ok(ColumnScan::Column(text, RowState::MoreInRow))
            }
            (None, Some(row)) => self.unquoted_row_end(buffer, row),
            (None, None) if buffer.is_eof() => {
                let text = buffer.take_rest("end of input")?;
                Ok(ColumnScan::Column(text, RowState::EndOfRow))
            }
            (None, None) => Ok(ColumnScan::NeedMoreData),
        }
    }

    fn unquoted_row_end<R: Read>(
        &self,
        buffer: &mut Buffer<R>,
        row: usize,
    ) -> CsvResult<ColumnScan> {
        let text = buffer.consume(Match::new(row, row + self.row_sep.len()), "row_sep")?;
        Ok(ColumnScan::Column(text, RowState::EndOfRow))
    }

    /// Reads a quoted field; the opening quote has been consumed already.
    ///
    /// The lookahead close is retried on every refill, so its outcome does
    /// not depend on the buffer length. Quote by quote scanning only starts
    /// once the whole input is buffered.
    fn quoted_column<R: Read>(&self, buffer: &mut Buffer<R>) -> CsvResult<ColumnScan> {
        buffer.ensure_filled()?;

        let raw = loop {
            if let Some(close) = self.lookahead_close(buffer.remaining(), buffer.is_eof()) {
                break buffer.consume(close, "lookahead close")?;
            }
            if buffer.is_eof() {
                break self.read_to_closing_quote(buffer)?;
            }
            buffer.fill_more()?;
        };
        let text = unescape(&raw, &self.quote);

        loop {
            buffer.ensure_filled()?;
            let rest = buffer.remaining();

            let col = self.after_whitespace(rest, &self.col_sep);
            if let Prefix::Matched(end) = col {
                buffer.consume(Match::skip(end), "col_sep")?;
                return Ok(ColumnScan::Column(text, RowState::MoreInRow));
            }

            if buffer.is_drained() {
                return Ok(ColumnScan::Column(text, RowState::EndOfRow));
            }

            let row = self.after_whitespace(rest, &self.row_sep);
            if let Prefix::Matched(end) = row {
                buffer.consume(Match::skip(end), "row_sep")?;
                return Ok(ColumnScan::Column(text, RowState::EndOfRow));
            }

            if buffer.is_eof() && rest.chars().all(char::is_whitespace) {
                buffer.take_rest("trailing whitespace")?;
                return Ok(ColumnScan::Column(text, RowState::EndOfRow));
            }

            let undecided = col == Prefix::Incomplete || row == Prefix::Incomplete;
            if !undecided || !buffer.fill_more()? {
                return Err(buffer.fault("Unexpected data after closing quote".to_string()));
            }
        }
    }

    /// Finds the first unescaped quote that is followed by a boundary.
    ///
    /// Quotes not followed by a column separator, a row separator or the end
    /// of input are taken as field content.
    fn lookahead_close(&self, rest: &str, eof: bool) -> Option<Match> {
        self.quote_finder
            .find_iter(rest.as_bytes())
            .filter(|&idx| !is_escaped("", &rest[..idx]))
            .find(|&idx| {
                let after = &rest[idx + self.quote.len()..];
                matches!(self.after_whitespace(after, &self.col_sep), Prefix::Matched(_))
                    || matches!(self.after_whitespace(after, &self.row_sep), Prefix::Matched(_))
                    || (eof && after.chars().all(char::is_whitespace))
            })
            .map(|idx| Match::new(idx, idx + self.quote.len()))
    }

    /// Scans quote by quote, skipping escaped ones, until the closing quote.
    ///
    /// An unterminated field at end of input takes the rest of the buffer.
    fn read_to_closing_quote<R: Read>(&self, buffer: &mut Buffer<R>) -> CsvResult<String> {
        let mut raw = String::new();

        loop {
            let rest = buffer.remaining();

            match self.quote_finder.find(rest.as_bytes()) {
                Some(idx) => {
                    let escaped = is_escaped(&raw, &rest[..idx]);
                    raw.push_str(&buffer.consume(
                        Match::new(idx, idx + self.quote.len()),
                        "quote",
                    )?);

                    if !escaped {
                        return Ok(raw);
                    }
                    raw.push_str(&self.quote);
                }
                None if buffer.is_eof() => {
                    if !buffer.is_empty() {
                        raw.push_str(&buffer.take_rest("unterminated quote")?);
                    }
                    if self.debug {
                        debug!("csv_lazy: quoted field runs to end of input");
                    }
                    return Ok(raw);
                }
                None => {
                    buffer.fill_more()?;
                }
            }
        }
    }

    /// Matches `pattern` after optional whitespace, never skipping over a separator.
    fn after_whitespace(&self, rest: &str, pattern: &str) -> Prefix {
        let mut offset = 0;

        loop {
            let tail = &rest[offset..];

            if tail.starts_with(pattern) {
                return Prefix::Matched(offset + pattern.len());
            }
            if pattern.starts_with(tail) {
                return Prefix::Incomplete;
            }
            if tail.starts_with(self.col_sep.as_str())
                || tail.starts_with(self.row_sep.as_str())
            {
                return Prefix::Rejected;
            }

            match tail.chars().next() {
                Some(ch) if ch.is_whitespace() => offset += ch.len_utf8(),
                _ => return Prefix::Rejected,
            }
        }
    }
}

/// Whether a quote preceded by `prefix` + `segment` is escaped.
///
/// Exactly one escape character directly before the quote escapes it; two
/// of them are an escaped escape character and leave the quote closing.
fn is_escaped(prefix: &str, segment: &str) -> bool {
    let mut preceding = segment.chars().rev().chain(prefix.chars().rev());

    match (preceding.next(), preceding.next()) {
        (Some(ESCAPE), Some(ESCAPE)) => false,
        (Some(ESCAPE), _) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::CsvError;

    fn scanner(col_sep: &str, row_sep: &str) -> ColumnScanner {
        ColumnScanner::new(&ReaderOptions {
            col_sep: col_sep.to_string(),
            row_sep: row_sep.to_string(),
            ..ReaderOptions::default()
        })
    }

    fn buffer(input: &str, threshold: usize) -> Buffer<Cursor<Vec<u8>>> {
        Buffer::new(
            Cursor::new(input.as_bytes().to_vec()),
            encoding_rs::UTF_8,
            threshold,
            false,
        )
    }

    fn columns(
        scanner: &ColumnScanner,
        input: &str,
        threshold: usize,
    ) -> CsvResult<Vec<(Option<String>, RowState)>> {
        let mut buf = buffer(input, threshold);
        let mut columns = Vec::new();

        loop {
            buf.ensure_filled()?;
            if buf.is_drained() {
                return Ok(columns);
            }
            columns.push(scanner.next_column(&mut buf)?);
        }
    }

    fn col(text: &str, state: RowState) -> (Option<String>, RowState) {
        (Some(text.to_string()), state)
    }

    #[test]
    fn unquoted_columns_end_at_the_nearest_separator() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "1;2\n3;4", 4096)?;

        assert_eq!(
            result,
            vec![
                col("1", RowState::MoreInRow),
                col("2", RowState::EndOfRow),
                col("3", RowState::MoreInRow),
                col("4", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn tiny_threshold_yields_same_columns() -> CsvResult<()> {
        let input = "alpha;\"be;ta\";gamma\r\ndelta;\"eps\\\"ilon\"\r\n";
        let sc = scanner(";", "\r\n");

        assert_eq!(columns(&sc, input, 1)?, columns(&sc, input, 4096)?);
        Ok(())
    }

    #[test]
    fn blank_line_is_a_bare_row_end() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "a\n\nb", 4096)?;

        assert_eq!(
            result,
            vec![
                col("a", RowState::EndOfRow),
                (None, RowState::EndOfRow),
                col("b", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn quoted_column_may_contain_separators() -> CsvResult<()> {
        let result = columns(&scanner(",", "\n"), "\"a,b\nc\",d\n", 4096)?;

        assert_eq!(
            result,
            vec![col("a,b\nc", RowState::MoreInRow), col("d", RowState::EndOfRow)]
        );
        Ok(())
    }

    #[test]
    fn whitespace_around_quoted_column_is_tolerated() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "  \"5\"     \n  \"6\"  ;7", 4096)?;

        assert_eq!(
            result,
            vec![
                col("5", RowState::EndOfRow),
                col("6", RowState::MoreInRow),
                col("7", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn lookahead_keeps_stray_quotes_as_content() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "\"He said \"hi\" twice\";x\n", 4096)?;

        assert_eq!(
            result,
            vec![
                col("He said \"hi\" twice", RowState::MoreInRow),
                col("x", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn stray_quotes_do_not_depend_on_threshold() -> CsvResult<()> {
        let input = "\"He said \"hi\" twice\";x\n\"a \"long\" field spanning refills\"\n";
        let sc = scanner(";", "\n");
        let expected = vec![
            col("He said \"hi\" twice", RowState::MoreInRow),
            col("x", RowState::EndOfRow),
            col("a \"long\" field spanning refills", RowState::EndOfRow),
        ];

        for threshold in [1, 2, 8, 13, 4096] {
            assert_eq!(columns(&sc, input, threshold)?, expected, "threshold {}", threshold);
        }
        Ok(())
    }

    #[test]
    fn escaped_quote_before_separator_does_not_close() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "\"a\\\";b\";c\n", 4096)?;

        assert_eq!(
            result,
            vec![col("a\";b", RowState::MoreInRow), col("c", RowState::EndOfRow)]
        );
        Ok(())
    }

    #[test]
    fn escaped_backslash_before_quote_closes() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "\"dir\\\\\"  \n", 4096)?;

        assert_eq!(result, vec![col("dir\\", RowState::EndOfRow)]);
        Ok(())
    }

    #[test]
    fn unterminated_quote_takes_rest_of_input() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "1;\"never closed\nstill here", 4)?;

        assert_eq!(
            result,
            vec![
                col("1", RowState::MoreInRow),
                col("never closed\nstill here", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn tab_column_separator_is_not_skipped_as_whitespace() -> CsvResult<()> {
        let result = columns(&scanner("\t", "\n"), "1\t\t\"3\"\t4\n", 4096)?;

        assert_eq!(
            result,
            vec![
                col("1", RowState::MoreInRow),
                col("", RowState::MoreInRow),
                col("3", RowState::MoreInRow),
                col("4", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn whitespace_skip_does_not_cross_row_separator() -> CsvResult<()> {
        let result = columns(&scanner(";", "\n"), "\"a\"\n;b\n", 4096)?;

        assert_eq!(
            result,
            vec![
                col("a", RowState::EndOfRow),
                col("", RowState::MoreInRow),
                col("b", RowState::EndOfRow),
            ]
        );
        Ok(())
    }

    #[test]
    fn garbage_after_closing_quote_is_a_fault() {
        let result = columns(&scanner(";", "\n"), "\"a\" b;c\n", 4096);

        assert!(matches!(result, Err(CsvError::ParserFault(_))));
    }

    #[test]
    fn is_escaped_counts_backslashes() {
        assert!(is_escaped("", "abc\\"));
        assert!(!is_escaped("", "abc\\\\"));
        assert!(!is_escaped("", "abc"));
        assert!(is_escaped("abc\\", ""));
        assert!(!is_escaped("abc\\", "\\"));
        assert!(!is_escaped("", ""));
    }
}
