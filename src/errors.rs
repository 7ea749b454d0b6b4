use thiserror::Error;

/// Error type for triple store operations.
///
/// Absence is never an error: lookups that find nothing return an empty
/// stream, `false` or zero.
#[derive(Debug, Error)]
pub enum TripleStoreError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
}

impl TripleStoreError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::ConnectionError(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::StorageError(msg.into())
    }

    pub fn encoding<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::EncodingError(msg.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::Unsupported(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::InvalidInput(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        TripleStoreError::TransactionError(msg.into())
    }
}
