//! Throttled send scheduling
//!
//! A single task owns the FIFO queue and the [`Throttle`] deciding when its
//! head may start. Callers only hand requests over through a channel and wait
//! on a oneshot for the outcome, so every request completes exactly once and
//! no lock is shared between the task and its callers.
//!
//! The task wakes on three events:
//! - a new request arrived
//! - an in-flight submission completed
//! - the pacing deadline of a settled send passed
//!
//! Each wake re-evaluates the gate and the concurrency cap before releasing
//! more requests, so neither condition is checked by polling.

mod throttle;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use sesmail_common::{internal, tracing};
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
    task::JoinSet,
    time::{Instant, sleep_until},
};

use self::throttle::Throttle;
use crate::{
    config::ThrottlePolicy,
    error::{Result, TransportError},
    message::{Mail, SentMessage},
    submission::Submitter,
};

pub(crate) type Outcome = Result<SentMessage>;

/// A request waiting for its turn, with the channel its outcome goes to.
#[derive(Debug)]
struct Pending {
    mail: Mail,
    reply: oneshot::Sender<Outcome>,
}

/// Counters published by the scheduling task for diagnostics.
#[derive(Debug, Default)]
struct Stats {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
}

/// Handle to a running scheduling task.
///
/// The task stops once every handle is gone and the queue has drained.
#[derive(Debug)]
pub(crate) struct Scheduler {
    requests: mpsc::UnboundedSender<Pending>,
    stats: Arc<Stats>,
}

impl Scheduler {
    /// Start a scheduling task for `policy` on `runtime`.
    pub(crate) fn spawn(runtime: &Handle, submitter: Arc<Submitter>, policy: ThrottlePolicy) -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(Stats::default());

        runtime.spawn(run(receiver, submitter, policy, Arc::clone(&stats)));

        Self { requests, stats }
    }

    /// Append `mail` to the queue. Never blocks; the returned receiver yields
    /// the outcome once the send has run.
    pub(crate) fn enqueue(&self, mail: Mail) -> oneshot::Receiver<Outcome> {
        let (reply, outcome) = oneshot::channel();

        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        if let Err(mpsc::error::SendError(pending)) = self.requests.send(Pending { mail, reply }) {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            // Receiver may already be gone as well; nothing else to tell
            let _ = pending.reply.send(Err(TransportError::SchedulerClosed));
        }

        outcome
    }

    /// Requests accepted but not yet started.
    pub(crate) fn queued(&self) -> usize {
        self.stats.queued.load(Ordering::Relaxed)
    }

    /// Requests started and awaiting the remote API.
    pub(crate) fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Relaxed)
    }
}

async fn run(
    mut requests: mpsc::UnboundedReceiver<Pending>,
    submitter: Arc<Submitter>,
    policy: ThrottlePolicy,
    stats: Arc<Stats>,
) {
    internal!(
        level = DEBUG,
        rate_limit = policy.rate_limit(),
        max_connections = policy.max_concurrent().map(std::num::NonZeroUsize::get),
        "Scheduler started"
    );

    let mut throttle = Throttle::new(policy);
    let mut in_flight = JoinSet::new();
    let mut accepting = true;

    loop {
        while let Some(pending) = throttle.try_advance(Instant::now()) {
            stats.queued.fetch_sub(1, Ordering::Relaxed);
            stats.in_flight.fetch_add(1, Ordering::Relaxed);

            internal!(
                queued = throttle.queued(),
                in_flight = throttle.in_flight(),
                "Releasing send"
            );

            in_flight.spawn(dispatch(Arc::clone(&submitter), pending));
        }

        if !accepting && throttle.is_idle() {
            break;
        }

        let deadline = throttle.deadline();

        tokio::select! {
            request = requests.recv(), if accepting => match request {
                Some(pending) => throttle.enqueue(pending),
                None => accepting = false,
            },
            Some(joined) = in_flight.join_next() => {
                if let Err(err) = joined {
                    tracing::error!("Send task failed: {err}");
                }
                stats.in_flight.fetch_sub(1, Ordering::Relaxed);
                throttle.complete(Instant::now());
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                throttle.poll_gate(Instant::now());
            },
            else => {
                tracing::warn!(queued = throttle.queued(), "Scheduler has nothing left to wait on");
                break;
            }
        }
    }

    internal!(level = DEBUG, "Scheduler stopped");
}

/// Run one send to completion and hand its outcome to the caller.
async fn dispatch(submitter: Arc<Submitter>, pending: Pending) {
    let Pending { mail, reply } = pending;
    let outcome = submitter.submit(&mail).await;

    if let Err(err) = &outcome {
        internal!(level = DEBUG, "Send failed: {err}");
    }

    if reply.send(outcome).is_err() {
        internal!("Caller stopped waiting for its send");
    }
}
