use std::{
    fs::File,
    io::Read,
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use log::debug;

use super::{
    buffer::Buffer,
    options::ReaderOptions,
    row::{Row, RowAssembler},
    scanner::ColumnScanner,
};
use crate::{
    core::item::{ItemHandler, ItemReader, ItemReaderResult},
    error::{CsvError, CsvResult},
};

/// A lazy CSV reader that implements the `ItemReader` trait.
///
/// Rows are tokenized incrementally from any source implementing `Read`;
/// only a window of roughly `buffer_length` bytes is held in memory.
///
/// # Implementation Details
///
/// - The buffer and tokenizer state live behind a `Mutex`, so the reader can
///   be shared between threads. A traversal started with [`rows`](Self::rows)
///   or [`for_each`](Self::for_each) holds the lock until it finishes;
///   concurrent traversals are serialized, never interleaved.
/// - Traversals must not be nested on the same reader: calling `read_row`,
///   `rows` or `for_each` from inside a `rows()` loop or a `for_each` handler
///   blocks forever on the reader's own lock. [`row_count`](Self::row_count)
///   and [`headers`](Self::headers) do not take the lock and are safe to call
///   at any time.
/// - The stream is single pass: once the end has been reached every further
///   read returns `None`.
/// - A blank line is an empty row, except when it is the last line of the
///   input: a trailing blank line ends the stream.
/// - The reader never closes the source. Take it back with
///   [`into_inner`](Self::into_inner) or drop the reader.
///
/// # Examples
///
/// ```
/// use lazy_csv::item::csv::csv_reader::LazyCsvReaderBuilder;
/// use lazy_csv::core::item::ItemReader;
///
/// let data = "1;2;3\n4;\"5\";6";
///
/// let reader = LazyCsvReaderBuilder::new().from_reader(data.as_bytes()).unwrap();
///
/// let row = reader.read().unwrap().unwrap();
/// assert_eq!(row.as_fields().unwrap(), ["1", "2", "3"]);
///
/// let row = reader.read().unwrap().unwrap();
/// assert_eq!(row.get(1), Some("5"));
///
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct LazyCsvReader<R> {
    state: Mutex<RowAssembler<R>>,
    headers: Option<Vec<String>>,
    row_count: Arc<AtomicUsize>,
}

impl<R: Read> LazyCsvReader<R> {
    /// Reads the next row, or `None` at the end of the stream.
    pub fn read_row(&self) -> CsvResult<Option<Row>> {
        let mut state = self.lock()?;
        state.read_row(self.headers.as_deref())
    }

    /// Returns an iterator over the remaining rows.
    ///
    /// The iterator holds the reader's lock until it is dropped. It stops
    /// after the first error.
    ///
    /// # Examples
    ///
    /// ```
    /// use lazy_csv::item::csv::csv_reader::LazyCsvReaderBuilder;
    ///
    /// let reader = LazyCsvReaderBuilder::new()
    ///     .col_sep(",")
    ///     .headers(true)
    ///     .from_reader("name,age\nAlice,30\nBob,25\n".as_bytes())
    ///     .unwrap();
    ///
    /// let names: Vec<String> = reader
    ///     .rows()
    ///     .map(|row| row.unwrap().get_field("name").unwrap().to_string())
    ///     .collect();
    ///
    /// assert_eq!(names, ["Alice", "Bob"]);
    /// ```
    pub fn rows(&self) -> Rows<'_, R> {
        Rows {
            state: self.state.lock().ok(),
            headers: self.headers.as_deref(),
            done: false,
        }
    }

    /// Invokes `handler` for every remaining row, in order.
    ///
    /// Returns the number of rows handled.
    pub fn for_each<F>(&self, mut handler: F) -> CsvResult<usize>
    where
        F: FnMut(Row),
    {
        self.try_for_each(|row| {
            handler(row);
            Ok(())
        })
    }

    /// Like [`for_each`](Self::for_each), but stops at the first handler error and returns it.
    pub fn try_for_each<F>(&self, mut handler: F) -> CsvResult<usize>
    where
        F: FnMut(Row) -> CsvResult<()>,
    {
        self.handle_all(&mut handler)
    }

    /// Pushes every remaining row into `handler`, holding the lock throughout.
    pub fn handle_all<H>(&self, handler: &mut H) -> CsvResult<usize>
    where
        H: ItemHandler<Row>,
    {
        let mut state = self.lock()?;
        let mut count = 0;

        while let Some(row) = state.read_row(self.headers.as_deref())? {
            handler.handle(row)?;
            count += 1;
        }

        Ok(count)
    }

    /// Header keys captured from the first row, when headers are enabled.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Number of rows read so far, not counting the header row.
    pub fn row_count(&self) -> usize {
        self.row_count.load(Ordering::Relaxed)
    }

    /// Gives back the underlying source. Input already buffered is discarded.
    pub fn into_inner(self) -> CsvResult<R> {
        let state = self.state.into_inner().map_err(|_| CsvError::LockPoisoned)?;
        Ok(state.into_inner())
    }

    fn lock(&self) -> CsvResult<MutexGuard<'_, RowAssembler<R>>> {
        self.state.lock().map_err(|_| CsvError::LockPoisoned)
    }
}

impl<R: Read> ItemReader<Row> for LazyCsvReader<R> {
    /// Reads the next row from the CSV source.
    ///
    /// # Returns
    /// - `Ok(Some(row))` if a row is successfully read
    /// - `Ok(None)` if there are no more rows to read
    /// - `Err(CsvError)` if the source fails or the tokenizer hits a fault
    fn read(&self) -> ItemReaderResult<Row> {
        self.read_row()
    }
}

/// Iterator over the rows of a [`LazyCsvReader`], holding its lock.
pub struct Rows<'a, R> {
    state: Option<MutexGuard<'a, RowAssembler<R>>>,
    headers: Option<&'a [String]>,
    done: bool,
}

impl<R: Read> Iterator for Rows<'_, R> {
    type Item = CsvResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(state) = self.state.as_mut() else {
            self.done = true;
            return Some(Err(CsvError::LockPoisoned));
        };

        match state.read_row(self.headers) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for Rows<'_, R> {}

/// A builder for configuring lazy CSV reading.
///
/// # Default Configuration
///
/// - Quote character: `"`
/// - Column separator: `;`
/// - Row separator: `\n`
/// - Headers: disabled
/// - Buffer length: 4096
/// - Encoding: UTF-8
///
/// # Examples
///
/// ```
/// use lazy_csv::item::csv::csv_reader::LazyCsvReaderBuilder;
///
/// let data = "\"name\",age\r\n\"Kasper Johansen\",27\r\n";
///
/// let reader = LazyCsvReaderBuilder::new()
///     .col_sep(",")
///     .row_sep("\r\n")
///     .headers(true)
///     .from_reader(data.as_bytes())
///     .unwrap();
///
/// assert_eq!(reader.headers().unwrap(), ["name", "age"]);
///
/// let row = reader.read_row().unwrap().unwrap();
/// assert_eq!(row.get_field("name"), Some("Kasper Johansen"));
/// assert_eq!(row.get_field("age"), Some("27"));
/// ```
#[derive(Default)]
pub struct LazyCsvReaderBuilder {
    options: ReaderOptions,
}

impl LazyCsvReaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every option at once, e.g. with options loaded by
    /// [`ReaderOptions::from_json`].
    pub fn options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn quote_char(mut self, quote_char: &str) -> Self {
        self.options.quote_char = quote_char.to_string();
        self
    }

    pub fn col_sep(mut self, col_sep: &str) -> Self {
        self.options.col_sep = col_sep.to_string();
        self
    }

    pub fn row_sep(mut self, row_sep: &str) -> Self {
        self.options.row_sep = row_sep.to_string();
        self
    }

    /// Sets whether the first row holds the keys of every following row.
    pub fn headers(mut self, yes: bool) -> Self {
        self.options.headers = yes;
        self
    }

    /// Sets the refill threshold: the buffer is topped up from the source
    /// whenever less than `buffer_length` bytes of text remain.
    pub fn buffer_length(mut self, buffer_length: usize) -> Self {
        self.options.buffer_length = buffer_length;
        self
    }

    /// Sets the character set of the source, as an encoding label such as
    /// `"utf-16le"` or `"windows-1252"`.
    pub fn encoding(mut self, label: &str) -> Self {
        self.options.encoding = Some(label.to_string());
        self
    }

    pub fn debug(mut self, yes: bool) -> Self {
        self.options.debug = yes;
        self
    }

    /// Creates a `LazyCsvReader` from a reader.
    ///
    /// Options are validated first. With headers enabled the header row is
    /// consumed before this returns.
    pub fn from_reader<R: Read>(self, rdr: R) -> CsvResult<LazyCsvReader<R>> {
        let options = self.options;
        options.validate()?;

        let buffer = Buffer::new(
            rdr,
            options.source_encoding()?,
            options.buffer_length,
            options.debug,
        );
        let scanner = ColumnScanner::new(&options);
        let mut state = RowAssembler::new(buffer, scanner, options.debug);

        let headers = if options.headers {
            let headers = state.read_fields()?.unwrap_or_default();
            debug!("csv_lazy: Headers: {:?}", headers);
            Some(headers)
        } else {
            None
        };

        Ok(LazyCsvReader {
            row_count: state.row_counter(),
            state: Mutex::new(state),
            headers,
        })
    }

    /// Creates a `LazyCsvReader` from a file path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lazy_csv::item::csv::csv_reader::LazyCsvReaderBuilder;
    ///
    /// let reader = LazyCsvReaderBuilder::new()
    ///     .col_sep(",")
    ///     .from_path("data.csv")
    ///     .unwrap();
    ///
    /// let count = reader.for_each(|row| println!("{:?}", row)).unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> CsvResult<LazyCsvReader<File>> {
        let file = File::open(path)?;
        self.from_reader(file)
    }
}
