//! Lazy CSV support: incremental tokenizing of tabular text streams.
//!
//! Rows are produced one at a time from any source implementing `Read`,
//! without loading the whole input into memory.
//!
//! # Module Architecture
//!
//! 1. **buffer**: decoded text window over the source, refilled on demand.
//! 2. **scanner**: decides, column by column, whether the buffer starts with
//!    a quoted field, an unquoted field or a row boundary, and asks for more
//!    input when it cannot tell yet.
//! 3. **unescape**: decodes backslash escapes inside quoted fields.
//! 4. **row**: assembles columns into rows and keys them by header.
//! 5. **csv_reader**: the `LazyCsvReader` and its builder, offering pull
//!    (`read_row`, `rows`, `ItemReader`) and push (`for_each`) traversal.
//!
//! # Corruption Tolerance
//!
//! - Whitespace before a row separator, around a quoted field and before
//!   the column separator that follows it is ignored.
//! - A quote inside a quoted field that is not followed by a separator is
//!   kept as content.
//! - `\"` inside a quoted field is a literal quote.
//!
//! Anything else that cannot be tokenized is reported as
//! [`CsvError::ParserFault`](crate::error::CsvError::ParserFault).
//!
//! # Examples
//!
//! ```
//! use lazy_csv::item::csv::csv_reader::LazyCsvReaderBuilder;
//!
//! let data = "\"Test1\";\"Test2 \\\"Wee\\\"\"\r\n";
//!
//! let reader = LazyCsvReaderBuilder::new()
//!     .row_sep("\r\n")
//!     .from_reader(data.as_bytes())
//!     .unwrap();
//!
//! let mut rows = Vec::new();
//! reader.for_each(|row| rows.push(row.into_fields())).unwrap();
//!
//! assert_eq!(rows, vec![vec!["Test1".to_string(), "Test2 \"Wee\"".to_string()]]);
//! ```

mod buffer;

/// A module providing the lazy reader and its builder.
pub mod csv_reader;

/// Reader configuration.
pub mod options;

/// Row shapes and row assembly.
pub mod row;

mod scanner;

/// Escape decoding for quoted fields.
pub mod unescape;
