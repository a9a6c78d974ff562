//! Messages handed to the transport and the result it hands back

use std::{fmt, io, num::NonZeroUsize, sync::Arc};

use futures_util::{StreamExt, stream::BoxStream};
use serde::Serialize;
use sesmail_common::{Envelope, tracing};

/// Chunks of a fully composed message, ending with end-of-data or an error.
pub type ByteStream = BoxStream<'static, io::Result<Vec<u8>>>;

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// A composed message the transport can read and address.
pub trait Message: Send + Sync + fmt::Debug + 'static {
    /// A fresh source producing the raw message bytes.
    fn read_stream(&self) -> ByteStream;

    /// The envelope to use when the [`Mail`] carries no precomputed one.
    fn envelope(&self) -> Envelope;
}

/// An already serialised message held in memory.
#[derive(Debug, Clone)]
pub struct RawMessage {
    data: Arc<[u8]>,
    chunk_size: usize,
}

impl RawMessage {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Size of the chunks produced by [`Message::read_stream`].
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size.get();
        self
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<&str> for RawMessage {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for RawMessage {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl Message for RawMessage {
    fn read_stream(&self) -> ByteStream {
        let data = Arc::clone(&self.data);
        let chunk_size = self.chunk_size;

        futures_util::stream::iter(
            (0..data.len())
                .step_by(chunk_size)
                .map(move |start| Ok(data[start..data.len().min(start + chunk_size)].to_vec())),
        )
        .boxed()
    }

    fn envelope(&self) -> Envelope {
        Envelope::from_message(&self.data).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Unable to derive envelope from message headers");
            Envelope::default()
        })
    }
}

/// A send request's payload: the message plus an optional precomputed envelope.
#[derive(Debug, Clone)]
pub struct Mail {
    envelope: Option<Envelope>,
    message: Arc<dyn Message>,
}

impl Mail {
    pub fn new(message: impl Message) -> Self {
        Self {
            envelope: None,
            message: Arc::new(message),
        }
    }

    /// Use `envelope` instead of asking the message for one.
    #[must_use]
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    #[must_use]
    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    /// The precomputed envelope if there is one, else the message's own.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        self.envelope
            .clone()
            .unwrap_or_else(|| self.message.envelope())
    }
}

impl From<RawMessage> for Mail {
    fn from(value: RawMessage) -> Self {
        Self::new(value)
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub envelope: Envelope,
    /// Remote identifier, qualified with the regional domain
    pub message_id: Option<String>,
}
