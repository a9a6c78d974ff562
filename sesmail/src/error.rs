//! Typed error handling for the transport.
//!
//! Every failure a caller can observe arrives through the result of its own
//! send, as a [`TransportError`]:
//! - Collection failures - the message body could not be read
//! - Submission failures - the remote raw-email call failed
//! - Configuration failures - the transport could not be built

use std::io;

use thiserror::Error;

/// Top-level error handed back for a send.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message byte source signalled a failure before end-of-data.
    #[error("Failed to read message: {0}")]
    Collection(#[from] CollectError),

    /// The remote submission failed.
    #[error("Email failed: {0}")]
    Submission(#[from] ClientError),

    /// The transport configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The task carrying this send stopped before producing an outcome,
    /// typically because the runtime is shutting down.
    #[error("Scheduler closed before the message was sent")]
    SchedulerClosed,
}

impl TransportError {
    /// Returns `true` if the message body could not be collected.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection(_))
    }

    /// Returns `true` if the remote call was made and failed.
    #[must_use]
    pub const fn is_submission(&self) -> bool {
        matches!(self, Self::Submission(_))
    }
}

/// Errors from draining a message byte source.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The source reported an I/O failure.
    #[error("Message source failed: {0}")]
    Source(#[from] io::Error),
}

/// Errors from the remote raw-email submission call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with an error.
    #[error("{code} ({status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a service answer: it could not be built,
    /// signed, dispatched or its response could not be read.
    #[error("Request failed: {0}")]
    Request(String),

    /// The client refused the message without a structured error.
    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    /// The service error code, when the failure came from the service itself.
    #[must_use]
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns `true` for throttling responses from the service.
    ///
    /// The scheduler never retries; this is exposed for callers that do.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(
            self.service_code(),
            Some(
                "Throttling"
                    | "ThrottlingException"
                    | "TooManyRequestsException"
                    | "MaxSendRate"
            )
        )
    }
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    /// The transport was built outside of a Tokio runtime.
    #[error("A Tokio runtime is required to run the transport")]
    RuntimeUnavailable,
}

/// Specialised `Result` type for transport operations.
pub type Result<T, E = TransportError> = std::result::Result<T, E>;
