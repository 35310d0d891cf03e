use encoding_rs::Encoding;
use serde::Deserialize;

use crate::error::{CsvError, CsvResult};

/// Refill threshold used when none is configured.
pub const DEFAULT_BUFFER_LENGTH: usize = 4096;

/// Immutable configuration of a lazy CSV reader.
///
/// Options can be set through [`LazyCsvReaderBuilder`](super::csv_reader::LazyCsvReaderBuilder)
/// or loaded from a key/value document. Unknown keys are rejected.
///
/// # Examples
///
/// ```
/// use lazy_csv::item::csv::options::ReaderOptions;
///
/// let options = ReaderOptions::from_json(r#"{"col_sep": ",", "headers": true}"#).unwrap();
/// assert_eq!(options.col_sep, ",");
/// assert_eq!(options.quote_char, "\"");
/// assert!(options.headers);
///
/// assert!(ReaderOptions::from_json(r#"{"colsep": ","}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderOptions {
    /// Delimits quoted fields (default `"`).
    pub quote_char: String,
    /// Field boundary (default `;`).
    pub col_sep: String,
    /// Record boundary (default `\n`).
    pub row_sep: String,
    /// Turn the first row into keys of every following record.
    pub headers: bool,
    /// Refill threshold, in bytes of decoded text.
    pub buffer_length: usize,
    /// Character set of the source; decoded to UTF-8 before buffering.
    #[serde(alias = "encode")]
    pub encoding: Option<String>,
    /// Trace every match and buffer transition at `debug` level.
    pub debug: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            quote_char: "\"".to_string(),
            col_sep: ";".to_string(),
            row_sep: "\n".to_string(),
            headers: false,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            encoding: None,
            debug: false,
        }
    }
}

impl ReaderOptions {
    /// Parses options from a JSON object and validates them.
    pub fn from_json(json: &str) -> CsvResult<Self> {
        let options: ReaderOptions =
            serde_json::from_str(json).map_err(|e| CsvError::Configuration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Parses options from an already decoded JSON value and validates them.
    pub fn from_value(value: serde_json::Value) -> CsvResult<Self> {
        let options: ReaderOptions =
            serde_json::from_value(value).map_err(|e| CsvError::Configuration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Checks the invariants the tokenizer relies on.
    pub fn validate(&self) -> CsvResult<()> {
        if self.quote_char.trim().is_empty() {
            return Err(CsvError::Configuration(
                "No 'quote_char' was given".to_string(),
            ));
        }
        if self.col_sep.is_empty() {
            return Err(CsvError::Configuration("No 'col_sep' was given".to_string()));
        }
        if self.row_sep.is_empty() {
            return Err(CsvError::Configuration("No 'row_sep' was given".to_string()));
        }
        self.source_encoding()?;
        Ok(())
    }

    /// Resolves the configured encoding label, UTF-8 when none is set.
    pub fn source_encoding(&self) -> CsvResult<&'static Encoding> {
        match &self.encoding {
            None => Ok(encoding_rs::UTF_8),
            Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                CsvError::Configuration(format!("Unknown encoding: '{}'", label))
            }),
        }
    }
}
