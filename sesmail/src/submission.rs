//! Collects a message and performs its single remote submission

use std::sync::Arc;

use sesmail_common::{incoming, outgoing};
use sesmail_tracing::traced;

use crate::{
    client::{RawEmailClient, SendRawEmailRequest},
    collector,
    error::Result,
    message::{Mail, SentMessage},
};

/// Domain appended to remote identifiers, after the region.
const MESSAGE_ID_DOMAIN: &str = "amazonses.com";

/// Wraps the remote raw-email call with the parameters every request carries.
#[derive(Debug, Clone)]
pub struct Submitter {
    client: Arc<dyn RawEmailClient>,
    region: String,
    source: Option<String>,
}

impl Submitter {
    pub fn new(client: Arc<dyn RawEmailClient>, region: impl Into<String>, source: Option<String>) -> Self {
        Self {
            client,
            region: region.into(),
            source,
        }
    }

    /// Collect `mail` and submit it.
    ///
    /// A failing byte source short-circuits before any remote call is made.
    ///
    /// # Errors
    ///
    /// [`crate::TransportError::Collection`] if the body could not be read,
    /// [`crate::TransportError::Submission`] if the remote call failed.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing(precision = "ms"))]
    pub async fn submit(&self, mail: &Mail) -> Result<SentMessage> {
        let raw = collector::collect(mail.message().read_stream()).await?;
        self.submit_raw(mail, raw).await
    }

    /// Submit an already collected body on behalf of `mail`.
    ///
    /// # Errors
    ///
    /// [`crate::TransportError::Submission`] if the remote call failed.
    pub async fn submit_raw(&self, mail: &Mail, raw: String) -> Result<SentMessage> {
        let request = SendRawEmailRequest {
            raw_message: raw.into_bytes(),
            source: self.source.clone(),
        };

        outgoing!(
            level = DEBUG,
            bytes = request.raw_message.len(),
            source = request.source.as_deref(),
            "Submitting raw message"
        );

        let response = self.client.send_raw_email(request).await?;
        let message_id = response.message_id.map(|id| self.qualify(&id));

        incoming!(
            level = DEBUG,
            message_id = message_id.as_deref(),
            "Raw message accepted"
        );

        Ok(SentMessage {
            envelope: mail.envelope(),
            message_id,
        })
    }

    /// `<id>@<region>.amazonses.com`
    fn qualify(&self, id: &str) -> String {
        format!("{id}@{}.{MESSAGE_ID_DOMAIN}", self.region)
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use futures_util::StreamExt;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use sesmail_common::Envelope;

    use super::*;
    use crate::{
        client::SendRawEmailResponse,
        error::ClientError,
        message::{ByteStream, Message, RawMessage},
    };

    #[derive(Debug, Default)]
    struct Recorder {
        requests: Mutex<Vec<SendRawEmailRequest>>,
        reply: Option<String>,
        reject: Option<String>,
    }

    #[async_trait]
    impl RawEmailClient for Recorder {
        async fn send_raw_email(
            &self,
            request: SendRawEmailRequest,
        ) -> Result<SendRawEmailResponse, ClientError> {
            self.requests.lock().push(request);
            match &self.reject {
                Some(reason) => Err(ClientError::Rejected(reason.clone())),
                None => Ok(SendRawEmailResponse {
                    message_id: self.reply.clone(),
                }),
            }
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Message for Broken {
        fn read_stream(&self) -> ByteStream {
            futures_util::stream::iter(vec![
                Ok(b"From: a@example.org\r\n".to_vec()),
                Err(io::Error::other("disk on fire")),
            ])
            .boxed()
        }

        fn envelope(&self) -> Envelope {
            Envelope::default()
        }
    }

    fn mail() -> Mail {
        Mail::new(RawMessage::from("message")).with_envelope(Envelope::new(
            Some("test@valid.sender".to_string()),
            vec!["test@valid.recipient".to_string()],
        ))
    }

    #[tokio::test]
    async fn test_message_id_is_region_qualified() {
        let client = Arc::new(Recorder {
            reply: Some("abc".to_string()),
            ..Default::default()
        });
        let submitter = Submitter::new(client.clone(), "eu-west-1", None);

        let sent = submitter.submit(&mail()).await.unwrap();
        assert_eq!(sent.message_id.as_deref(), Some("abc@eu-west-1.amazonses.com"));
        assert_eq!(sent.envelope.sender(), Some("test@valid.sender"));

        let requests = client.requests.lock();
        assert_eq!(
            *requests,
            vec![SendRawEmailRequest {
                raw_message: b"message".to_vec(),
                source: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_remote_id() {
        let submitter = Submitter::new(Arc::new(Recorder::default()), "us-east-1", None);

        let sent = submitter.submit(&mail()).await.unwrap();
        assert_eq!(sent.message_id, None);
    }

    #[tokio::test]
    async fn test_source_override_is_passed_through() {
        let client = Arc::new(Recorder::default());
        let submitter = Submitter::new(
            client.clone(),
            "us-east-1",
            Some("bounces@example.org".to_string()),
        );

        submitter.submit(&mail()).await.unwrap();
        assert_eq!(
            client.requests.lock()[0].source.as_deref(),
            Some("bounces@example.org")
        );
    }

    #[tokio::test]
    async fn test_rejection_is_normalised() {
        let client = Arc::new(Recorder {
            reject: Some("quota exceeded".to_string()),
            ..Default::default()
        });
        let submitter = Submitter::new(client, "us-east-1", None);

        let err = submitter.submit(&mail()).await.unwrap_err();
        assert!(err.is_submission());
        assert_eq!(err.to_string(), "Email failed: quota exceeded");
    }

    #[tokio::test]
    async fn test_collection_failure_skips_remote_call() {
        let client = Arc::new(Recorder::default());
        let submitter = Submitter::new(client.clone(), "us-east-1", None);

        let err = submitter.submit(&Mail::new(Broken)).await.unwrap_err();
        assert!(err.is_collection());
        assert!(client.requests.lock().is_empty());
    }
}
