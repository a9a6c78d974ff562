//! Amazon SES raw email transport with optional send throttling
//!
//! This crate provides:
//! - [`SesTransport`], accepting composed messages and submitting them through
//!   the SES v2 `SendEmail` API as raw content
//! - A FIFO scheduler pacing sends to a rate limit and capping concurrent
//!   submissions
//! - [`RawEmailClient`], the seam to the remote API, implemented by
//!   [`SesClient`]

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod message;
mod scheduler;
mod submission;
mod transport;

pub use client::{RawEmailClient, SendRawEmailRequest, SendRawEmailResponse, SesClient};
pub use config::{
    DEFAULT_REGION, HttpOptions, MAX_SEND_INTERVAL, Settings, ThrottlePolicy, TransportConfig,
};
pub use error::{ClientError, CollectError, ConfigError, TransportError};
pub use message::{ByteStream, Mail, Message, RawMessage, SentMessage};
pub use sesmail_common::Envelope;
pub use submission::Submitter;
pub use transport::{PendingSend, SesTransport};
