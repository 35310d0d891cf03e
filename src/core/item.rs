use crate::error::CsvError;

/// Result of a single pull: `Ok(None)` marks the end of the stream.
pub type ItemReaderResult<R> = Result<Option<R>, CsvError>;

/// Pull-style source of items, read one at a time.
///
/// Implementors take `&self` and guard their own mutable state, so a reader
/// can be shared between threads.
pub trait ItemReader<R> {
    fn read(&self) -> ItemReaderResult<R>;
}

/// Push-style consumer of items, invoked once per item in stream order.
pub trait ItemHandler<R> {
    fn handle(&mut self, item: R) -> Result<(), CsvError>;
}

impl<R, F> ItemHandler<R> for F
where
    F: FnMut(R) -> Result<(), CsvError>,
{
    fn handle(&mut self, item: R) -> Result<(), CsvError> {
        self(item)
    }
}
