use thiserror::Error;

#[derive(Error, Debug)]
/// Lazy CSV error
pub enum CsvError {
    /// Invalid reader configuration, raised while the reader is built.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// An internal tokenizer invariant was violated. Never caused by data quality alone.
    #[error("ParserFault: {0}")]
    ParserFault(String),

    #[error("Io: {0}")]
    Io(#[from] std::io::Error),

    #[error("LockPoisoned: a traversal panicked while holding the reader")]
    LockPoisoned,
}

pub type CsvResult<T> = Result<T, CsvError>;
