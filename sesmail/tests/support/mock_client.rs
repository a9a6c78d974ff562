//! In-process replacement for the remote raw-email API
//!
//! ```rust,no_run
//! use support::{MockSesClient, Reply};
//! use std::time::Duration;
//!
//! let client = MockSesClient::builder()
//!     .with_delay(Duration::from_millis(100))
//!     .with_reply(Reply::Reject("Throttled".to_string()))
//!     .build();
//! ```

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use sesmail::{ClientError, RawEmailClient, SendRawEmailRequest, SendRawEmailResponse};
use tokio::time::Instant;

/// What the mock answers to one call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Accept the message, returning this identifier
    Accept(Option<String>),
    /// Fail the call with [`ClientError::Rejected`]
    Reject(String),
    /// Never answer
    Hang,
}

/// One call as seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub raw_message: String,
    pub source: Option<String>,
    pub started: Instant,
    pub finished: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct MockSesClient {
    delay: Duration,
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockSesClient {
    pub fn builder() -> MockSesClientBuilder {
        MockSesClientBuilder::default()
    }

    /// Calls received so far, in the order they started.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Bodies received so far, in the order they started.
    pub fn bodies(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.raw_message.clone())
            .collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|call| call.started).collect()
    }

    /// Most calls that were awaiting an answer at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawEmailClient for MockSesClient {
    async fn send_raw_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendRawEmailResponse, ClientError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(Call {
                raw_message: String::from_utf8_lossy(&request.raw_message).into_owned(),
                source: request.source,
                started: Instant::now(),
                finished: None,
            });
            calls.len() - 1
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Reply::Accept(Some(format!("id-{index}"))));

        if matches!(reply, Reply::Hang) {
            std::future::pending::<()>().await;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock()[index].finished = Some(Instant::now());

        match reply {
            Reply::Accept(message_id) => Ok(SendRawEmailResponse { message_id }),
            Reply::Reject(reason) => Err(ClientError::Rejected(reason)),
            Reply::Hang => unreachable!("a hung call never answers"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockSesClientBuilder {
    delay: Duration,
    replies: VecDeque<Reply>,
}

impl MockSesClientBuilder {
    /// Time every call takes before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer the next unscripted call with `reply`; later calls are accepted
    /// with `id-<n>`
    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.replies.push_back(reply);
        self
    }

    pub fn build(self) -> Arc<MockSesClient> {
        Arc::new(MockSesClient {
            delay: self.delay,
            replies: Mutex::new(self.replies),
            ..Default::default()
        })
    }
}
