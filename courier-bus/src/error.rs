//! Error types for the message bus.

/// Error type for bus operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No transport factory is registered for the endpoint's scheme.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A subscription pattern failed to compile as a regex.
    #[error("invalid subscription pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as given to `subscribe`.
        pattern: String,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The subscription handle does not name a live subscription.
    #[error("unknown subscription handle {0}")]
    UnknownSubscription(u64),

    /// The operation is not valid in the engine's current mode.
    #[error("invalid mode: {0}")]
    InvalidMode(&'static str),

    /// The transport endpoint has been closed.
    #[error("transport endpoint closed")]
    Closed,

    /// A transport implementation reported a failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, Error>;
