use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_sesv2::{
    Client,
    config::http::HttpResponse,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::send_email::{SendEmailError, SendEmailOutput},
    primitives::Blob,
    types::{EmailContent, RawMessage},
};
use secrecy::ExposeSecret;
use sesmail_common::{incoming, outgoing};
use sesmail_tracing::traced;

use super::{RawEmailClient, SendRawEmailRequest, SendRawEmailResponse};
use crate::{
    config::{Credentials, Settings, TransportConfig},
    error::{ClientError, ConfigError},
};

/// Name reported by the SDK for credentials taken from the configuration.
const CREDENTIALS_SOURCE: &str = "sesmail";

/// Submits messages through the SES v2 `SendEmail` API with raw content.
#[derive(Debug, Clone)]
pub struct SesClient {
    client: Client,
}

impl SesClient {
    /// Wrap an SDK client the caller has already configured.
    #[must_use]
    pub const fn from_sdk(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from already normalised settings.
    ///
    /// Without explicit `credentials` the SDK's default provider chain is
    /// used. SDK retries are disabled: each send reaches the API once.
    pub async fn new(settings: &Settings, credentials: Option<Credentials>) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(settings.http.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.http.connect_timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts);

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint.as_str().trim_end_matches('/'));
        }

        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(aws_sdk_sesv2::config::Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key.expose_secret(),
                credentials
                    .session_token
                    .map(|token| token.expose_secret().to_string()),
                None,
                CREDENTIALS_SOURCE,
            ));
        }

        Self::from_sdk(Client::new(&loader.load().await))
    }

    /// Normalise `config`, pick up its credentials and build a client.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid.
    pub async fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        let settings = config.normalize()?;
        let credentials = config.credentials()?;

        Ok(Self::new(&settings, credentials).await)
    }

    #[must_use]
    pub const fn sdk(&self) -> &Client {
        &self.client
    }

    #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing(precision = "ms"))]
    async fn send_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendRawEmailResponse, ClientError> {
        let SendRawEmailRequest {
            raw_message,
            source,
        } = request;

        outgoing!(level = DEBUG, bytes = raw_message.len(), "SendEmail");

        let raw = RawMessage::builder()
            .data(Blob::new(raw_message))
            .build()
            .map_err(|err| ClientError::Request(err.to_string()))?;

        let output = self
            .client
            .send_email()
            .set_from_email_address(source)
            .content(EmailContent::builder().raw(raw).build())
            .send()
            .await
            .map_err(service_error)?;

        incoming!(
            level = DEBUG,
            message_id = output.message_id(),
            "SendEmail response"
        );

        Ok(response(&output))
    }
}

#[async_trait]
impl RawEmailClient for SesClient {
    async fn send_raw_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendRawEmailResponse, ClientError> {
        self.send_email(request).await
    }
}

fn response(output: &SendEmailOutput) -> SendRawEmailResponse {
    SendRawEmailResponse {
        message_id: output
            .message_id()
            .filter(|id| !id.is_empty())
            .map(str::to_string),
    }
}

/// Errors the service answered keep their code; everything else is flattened
/// into [`ClientError::Request`].
#[allow(clippy::needless_pass_by_value, reason = "Used with map_err")]
fn service_error(err: SdkError<SendEmailError, HttpResponse>) -> ClientError {
    let status = err.raw_response().map(|raw| raw.status().as_u16());

    match (err.code(), status) {
        (Some(code), Some(status)) => ClientError::Service {
            status,
            code: code.to_string(),
            message: err.message().unwrap_or_default().to_string(),
        },
        _ => ClientError::Request(DisplayErrorContext(&err).to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SesClient>();
    }

    #[test]
    fn test_response_message_id() {
        let output = SendEmailOutput::builder().message_id("0100018c-test").build();
        assert_eq!(response(&output).message_id.as_deref(), Some("0100018c-test"));

        let empty = SendEmailOutput::builder().message_id("").build();
        assert_eq!(response(&empty), SendRawEmailResponse::default());

        let missing = SendEmailOutput::builder().build();
        assert_eq!(response(&missing), SendRawEmailResponse::default());
    }

    #[tokio::test]
    async fn test_client_from_config() {
        let config = TransportConfig {
            region: Some("eu-west-1".to_string()),
            service_url: Some("http://127.0.0.1:4566".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".into()),
            ..Default::default()
        };

        let client = SesClient::from_config(&config).await.unwrap();
        let sdk = client.sdk().config();
        assert_eq!(sdk.region(), Some(&Region::new("eu-west-1")));
    }

    #[tokio::test]
    async fn test_client_rejects_unpaired_credentials() {
        let config = TransportConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            SesClient::from_config(&config).await,
            Err(ConfigError::InvalidConfiguration {
                field: "secret_access_key",
                ..
            })
        ));
    }
}
