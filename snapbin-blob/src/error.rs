use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations.
///
/// A missing key is not an error: stores report it through `Option` /
/// [`GetOutcome::NotFound`](crate::GetOutcome::NotFound).
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Short class name echoed to clients next to the message.
    pub fn name(&self) -> &'static str {
        match self {
            BlobError::Invalid { .. } => "InvalidRequest",
            BlobError::Backend { .. } => "BackendError",
            BlobError::Io { .. } => "IoError",
        }
    }

    /// The upstream message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            BlobError::Invalid { message } => message.clone(),
            BlobError::Backend { source } => source.to_string(),
            BlobError::Io { source } => source.to_string(),
        }
    }
}
