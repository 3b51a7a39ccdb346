//! Error types for the event log and indexer.

/// Error type for log operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying file I/O failed.
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed framing validation.
    ///
    /// Distinct from end-of-file: a truncated trailing record reads as
    /// EOF, while a record with bad framing surfaces here with the byte
    /// offset it started at.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the record start.
        offset: u64,
        /// What failed validation.
        reason: String,
    },

    /// An event was handed to the writer with an unusable channel name.
    #[error("invalid channel {channel:?}: {reason}")]
    InvalidChannel {
        /// The offending channel name.
        channel: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Serializing or loading an index artifact failed.
    #[error("index serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload decoder rejected a payload.
    #[error("payload decode failure: {0}")]
    Decode(String),
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, Error>;
