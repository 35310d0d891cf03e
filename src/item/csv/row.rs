use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use super::buffer::Buffer;
use super::scanner::{ColumnScanner, RowState};
use crate::error::CsvResult;

/// A row read from the stream.
///
/// Positional rows keep every scanned column. Records map header keys to
/// the column at the same position: columns beyond the header are dropped,
/// missing columns leave their key absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Row {
    Fields(Vec<String>),
    Record(IndexMap<String, String>),
}

impl Row {
    /// Builds a row from scanned columns, keyed by `headers` when present.
    pub fn from_fields(fields: Vec<String>, headers: Option<&[String]>) -> Self {
        match headers {
            Some(headers) => Row::Record(headers.iter().cloned().zip(fields).collect()),
            None => Row::Fields(fields),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Fields(fields) => fields.len(),
            Row::Record(record) => record.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column at `index`, in column order for both shapes.
    pub fn get(&self, index: usize) -> Option<&str> {
        match self {
            Row::Fields(fields) => fields.get(index).map(String::as_str),
            Row::Record(record) => record.get_index(index).map(|(_, value)| value.as_str()),
        }
    }

    /// Column under header `key`. Always `None` for positional rows.
    pub fn get_field(&self, key: &str) -> Option<&str> {
        match self {
            Row::Fields(_) => None,
            Row::Record(record) => record.get(key).map(String::as_str),
        }
    }

    pub fn as_fields(&self) -> Option<&[String]> {
        match self {
            Row::Fields(fields) => Some(fields),
            Row::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, String>> {
        match self {
            Row::Fields(_) => None,
            Row::Record(record) => Some(record),
        }
    }

    /// Column values in column order, dropping header keys.
    pub fn into_fields(self) -> Vec<String> {
        match self {
            Row::Fields(fields) => fields,
            Row::Record(record) => record.into_values().collect(),
        }
    }
}

/// Builds rows column by column from the buffer.
///
/// The row counter is shared so it can be read without taking the lock
/// that guards the assembler.
pub(crate) struct RowAssembler<R> {
    buffer: Buffer<R>,
    scanner: ColumnScanner,
    row_count: Arc<AtomicUsize>,
    finished: bool,
    debug: bool,
}

impl<R: Read> RowAssembler<R> {
    pub fn new(buffer: Buffer<R>, scanner: ColumnScanner, debug: bool) -> Self {
        Self {
            buffer,
            scanner,
            row_count: Arc::new(AtomicUsize::new(0)),
            finished: false,
            debug,
        }
    }

    /// Reads the columns of the next row.
    ///
    /// `None` marks the end of the stream: the source is exhausted and the
    /// buffer is drained, either before the row started or right after a
    /// blank final line. Any other blank line is an empty row. After the end
    /// of the stream, or after an error, this keeps returning `None`.
    pub fn read_fields(&mut self) -> CsvResult<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.scan_row();
        match &result {
            Ok(None) | Err(_) => self.finished = true,
            Ok(Some(_)) => {}
        }
        result
    }

    /// Reads the next row, keyed by `headers` when present.
    pub fn read_row(&mut self, headers: Option<&[String]>) -> CsvResult<Option<Row>> {
        let row = self
            .read_fields()?
            .map(|fields| Row::from_fields(fields, headers));

        if let Some(row) = &row {
            let number = self.row_count.fetch_add(1, Ordering::Relaxed) + 1;
            if self.debug {
                debug!("csv_lazy: Row {}: {:?}", number, row);
            }
        }
        Ok(row)
    }

    /// Rows handed out by [`read_row`](Self::read_row) so far. Stays
    /// readable while a traversal holds the assembler.
    pub fn row_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.row_count)
    }

    pub fn into_inner(self) -> R {
        self.buffer.into_inner()
    }

    fn scan_row(&mut self) -> CsvResult<Option<Vec<String>>> {
        self.buffer.ensure_filled()?;
        if self.buffer.is_drained() {
            return Ok(None);
        }

        let mut fields = Vec::new();
        loop {
            let (column, state) = self.scanner.next_column(&mut self.buffer)?;
            if let Some(column) = column {
                fields.push(column);
            }
            if state == RowState::EndOfRow {
                if fields.is_empty() {
                    self.buffer.ensure_filled()?;
                    if self.buffer.is_drained() {
                        return Ok(None);
                    }
                }
                return Ok(Some(fields));
            }
        }
    }
}
