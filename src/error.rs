//! Error types for timestamping, PDF processing and validation.
//!
//! Every variant maps onto a stable [`ErrorCode`] so that callers (and the CLI)
//! can report failures as `Error [<CODE>]: <message>` regardless of where in the
//! pipeline they happened.

use std::fmt;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed underlying cause carried by wrapping variants.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable, user-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Endpoint unreachable, timed out, or non-2xx after retries
    NetworkError,
    /// Malformed ASN.1, empty body, missing status or token
    InvalidResponse,
    /// Unparsable PDF, object collision, encrypted or unsupported document
    PdfError,
    /// Circuit breaker open, no I/O attempted
    CircuitOpen,
    /// Document or imprint digest does not match
    HashMismatch,
    /// TSA answered with a rejection status
    TsaError,
    /// Session method called out of order
    InvalidState,
    /// Algorithm or feature not supported
    Unsupported,
    /// Anything else
    Unknown,
}

impl ErrorCode {
    /// Code string as printed by the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::PdfError => "PDF_ERROR",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::HashMismatch => "HASH_MISMATCH",
            ErrorCode::TsaError => "TSA_ERROR",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Unsupported => "UNSUPPORTED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types that can occur while timestamping or validating a PDF.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Invalid PDF structure
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// The document is encrypted (`/Encrypt` in the trailer)
    #[error("Encrypted PDF documents are not supported")]
    Encrypted,

    /// A newly registered object number would shadow an existing one
    #[error("Object number collision: {0} 0 obj is already defined in the document")]
    ObjectCollision(u32),

    /// Network failure after retries were exhausted
    #[error("Network error for {url}: {message}")]
    Network {
        /// Endpoint URL
        url: String,
        /// Last failure seen
        message: String,
        /// Underlying transport error, if any
        #[source]
        cause: Option<BoxedCause>,
    },

    /// Circuit breaker rejected the call without attempting I/O
    #[error("Circuit breaker open for {0}")]
    CircuitOpen(String),

    /// Malformed or unusable response from a TSA, OCSP responder or similar
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// TSA rejected the request
    #[error("TSA rejected request with status {status}: {message}")]
    TsaRejected {
        /// PKIStatus value
        status: u32,
        /// Status text and failure info
        message: String,
    },

    /// Digest mismatch (tamper detection or wrong imprint)
    #[error("Hash mismatch: {0}")]
    HashMismatch(String),

    /// ASN.1 / DER codec failure
    #[error("ASN.1 error: {0}")]
    Asn1(String),

    /// Certificate could not be parsed or used
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Cryptographic verification failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Operation invoked in the wrong session state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// Current state name
        state: &'static str,
    },

    /// Unsupported feature or algorithm
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all wrapping an underlying cause
    #[error("{message}")]
    Unknown {
        /// Description
        message: String,
        /// Underlying cause
        #[source]
        cause: Option<BoxedCause>,
    },
}

impl Error {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidHeader(_)
            | Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidPdf(_)
            | Error::Decode(_)
            | Error::Encrypted
            | Error::ObjectCollision(_) => ErrorCode::PdfError,
            Error::Network { .. } => ErrorCode::NetworkError,
            Error::CircuitOpen(_) => ErrorCode::CircuitOpen,
            Error::InvalidResponse(_) | Error::Asn1(_) => ErrorCode::InvalidResponse,
            Error::TsaRejected { .. } => ErrorCode::TsaError,
            Error::HashMismatch(_) => ErrorCode::HashMismatch,
            Error::InvalidState { .. } => ErrorCode::InvalidState,
            Error::Unsupported(_) => ErrorCode::Unsupported,
            Error::Certificate(_)
            | Error::Verification(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Unknown { .. } => ErrorCode::Unknown,
        }
    }

    /// Network failure without a typed cause.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            url: url.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Catch-all error wrapping a cause.
    pub fn unknown<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Unknown {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Whether a retry wrapper may try this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Asn1(err.to_string())
    }
}
