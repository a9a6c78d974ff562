//! The remote raw-email submission call
//!
//! [`RawEmailClient`] is the only seam between the transport and the network.
//! [`SesClient`] implements it with the AWS SDK for SES v2; tests and callers
//! with their own client plug in alternative implementations.

mod ses;

use std::fmt::Debug;

use async_trait::async_trait;

pub use ses::SesClient;

use crate::error::ClientError;

/// Parameters for one raw-email submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRawEmailRequest {
    /// The fully composed message
    pub raw_message: Vec<u8>,
    /// Explicit sender, overriding the one in the message
    pub source: Option<String>,
}

/// What the remote API said about an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRawEmailResponse {
    /// Provider-assigned identifier, unqualified
    pub message_id: Option<String>,
}

/// Submits raw messages to the remote API.
///
/// Implementations must tolerate concurrent calls; the transport issues up to
/// `max_connections` of them at once.
#[async_trait]
pub trait RawEmailClient: Send + Sync + Debug {
    /// Submit one message. Called exactly once per send.
    async fn send_raw_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendRawEmailResponse, ClientError>;
}
