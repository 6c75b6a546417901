//! Error types for tickwire.

use thiserror::Error;

/// Result type alias for tickwire operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that end a stream run.
///
/// Every variant is fatal to the current run. Stop requests and a natural end
/// of the stream are not errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// A non-empty stream segment was not a well-formed JSON object.
    #[error("Malformed stream data: {reason} (segment: {segment:?})")]
    MalformedStreamData {
        /// Why the segment was rejected.
        reason: String,
        /// The offending segment, truncated.
        segment: String,
    },

    /// A well-formed event carried a top-level key outside the known set.
    #[error("Unrecognized resource: {key}")]
    UnrecognizedResource {
        /// The offending top-level key.
        key: String,
    },

    /// The server sent a disconnect control event.
    #[error("Stream disconnected by server (code {code}): {message}")]
    StreamDisconnected {
        /// Remote reason code.
        code: i64,
        /// Remote human-readable message.
        message: String,
        /// Optional link to further documentation.
        more_info: Option<String>,
    },

    /// The connection could not be established, timed out, or broke.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// A client identity that cannot be used for streaming was bound.
    #[error("Invalid client binding: {0}")]
    InvalidClientBinding(String),
}

impl StreamError {
    /// Returns true if the server ended the stream with a disconnect event.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::StreamDisconnected { .. })
    }

    /// Returns true if the server sent an event with an unknown key.
    #[must_use]
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::UnrecognizedResource { .. })
    }

    /// Returns true if the byte stream could not be decoded.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedStreamData { .. })
    }

    /// Returns true for connection-level failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }

    /// Returns true if a transport timeout ended the run.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TransportFailure(TransportError::Timeout(_)))
    }
}

/// Connection-level failures reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connection establishment or an idle read timed out.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Reading the response body failed mid-stream.
    #[error("stream read failed: {0}")]
    Body(String),

    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),
}
