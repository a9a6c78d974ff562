//! The public transport facade

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use sesmail_common::internal;
use tokio::{runtime::Handle, sync::oneshot};

use crate::{
    client::{RawEmailClient, SesClient},
    config::{Settings, ThrottlePolicy, TransportConfig},
    error::{ConfigError, Result, TransportError},
    message::{Mail, SentMessage},
    scheduler::{Outcome, Scheduler},
    submission::Submitter,
};

/// Sends composed messages through the SES raw-email API.
///
/// With a rate limit or connection cap configured, sends go through a FIFO
/// scheduler; otherwise each one is submitted as soon as it is handed over.
///
/// ```no_run
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use sesmail::{RawMessage, SesTransport, TransportConfig};
///
/// let transport = SesTransport::new(TransportConfig {
///     region: Some("eu-west-1".to_string()),
///     rate_limit: Some(14.0),
///     ..Default::default()
/// })
/// .await?;
///
/// let sent = transport
///     .send(RawMessage::from("From: a@example.org\r\nTo: b@example.org\r\n\r\nHi"))
///     .await?;
/// println!("{:?}", sent.message_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SesTransport {
    settings: Settings,
    submitter: Arc<Submitter>,
    scheduler: Option<Scheduler>,
    runtime: Handle,
}

impl SesTransport {
    pub const NAME: &'static str = "SES";
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Build a transport talking to SES through the AWS SDK.
    ///
    /// Sends are run on the Tokio runtime this is awaited on.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid or there is no current runtime.
    pub async fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let client = SesClient::from_config(&config).await?;
        Self::with_client(config, Arc::new(client))
    }

    /// Build a transport submitting through `client`.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid or there is no current runtime.
    pub fn with_client(
        config: TransportConfig,
        client: Arc<dyn RawEmailClient>,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::RuntimeUnavailable)?;
        let settings = config.normalize()?;

        let submitter = Arc::new(Submitter::new(
            client,
            settings.region.clone(),
            settings.source.clone(),
        ));

        let scheduler = settings
            .policy
            .is_active()
            .then(|| Scheduler::spawn(&runtime, Arc::clone(&submitter), settings.policy));

        internal!(
            level = INFO,
            region = %settings.region,
            endpoint = settings.endpoint.as_ref().map(url::Url::as_str),
            throttled = scheduler.is_some(),
            "SES transport ready"
        );

        Ok(Self {
            settings,
            submitter,
            scheduler,
            runtime,
        })
    }

    /// Hand `mail` over for sending.
    ///
    /// The send is accepted immediately and runs whether or not the returned
    /// future is awaited; awaiting it yields the outcome, exactly once.
    pub fn send(&self, mail: impl Into<Mail>) -> PendingSend {
        let mail = mail.into();

        let outcome = match &self.scheduler {
            Some(scheduler) => scheduler.enqueue(mail),
            None => {
                let (reply, outcome) = oneshot::channel();
                let submitter = Arc::clone(&self.submitter);

                self.runtime.spawn(async move {
                    if reply.send(submitter.submit(&mail).await).is_err() {
                        internal!("Caller stopped waiting for its send");
                    }
                });

                outcome
            }
        };

        PendingSend { outcome }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }

    #[must_use]
    pub const fn version(&self) -> &'static str {
        Self::VERSION
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.settings.region
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn policy(&self) -> ThrottlePolicy {
        self.settings.policy
    }

    /// Sends accepted but not yet started. Always zero when unthrottled.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::queued)
    }

    /// Sends started by the scheduler and awaiting the remote API.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.scheduler.as_ref().map_or(0, Scheduler::in_flight)
    }
}

/// The eventual outcome of [`SesTransport::send`].
#[derive(Debug)]
#[must_use = "the send runs regardless, but its outcome is only observable by awaiting this"]
pub struct PendingSend {
    outcome: oneshot::Receiver<Outcome>,
}

impl Future for PendingSend {
    type Output = Result<SentMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TransportError::SchedulerClosed)))
    }
}
