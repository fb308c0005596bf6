use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream ended before the record was complete")]
    UnexpectedEof,

    #[error("variable-length int is too long")]
    MalformedVInt,

    #[error("invalid string encoding: {0}")]
    InvalidString(String),

    #[error("unexpected byte [0x{0:02x}] for boolean")]
    InvalidBool(u8),

    #[error("list of {0} elements is too long for the stream format")]
    ListTooLong(usize),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("[{object}] expected an object")]
    NotAnObject { object: &'static str },

    #[error("[{object}] required field [{field}] is missing")]
    MissingField {
        object: &'static str,
        field: &'static str,
    },

    #[error("[{object}] failed to parse field [{field}]: expected {expected}")]
    WrongType {
        object: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl ResultsError {
    /// Map a short read to [`ResultsError::UnexpectedEof`], leaving other I/O failures alone.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(err)
        }
    }
}
