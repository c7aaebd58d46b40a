//! Multicast delivery with per-recipient retry.
//!
//! A call proceeds in sequential rounds. Each round submits the recipients
//! still pending, records their outcomes in a [`ResultLedger`], and keeps
//! only recipients that failed with a retriable error code. Rounds that
//! produce no outcome at all (network failure) are retried as a whole.
//! Between rounds the sender sleeps according to its [`BackoffPolicy`]; the
//! sleep can be interrupted through a [`CancellationToken`].

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, cancellable_sleep};
use crate::config::SenderConfig;
use crate::error::{GcmError, Result};
use crate::ledger::ResultLedger;
use crate::message::Message;
use crate::outcome::{BatchOutcome, DeliveryResult, ErrorCode, RecipientOutcome};
use crate::transport::{BatchTransport, HttpTransport, RoundResult};

/// Retry budget used by [`Sender::is_registration_valid`].
pub const PROBE_RETRIES: u32 = 5;

/// State of one multicast call, threaded through its rounds.
#[derive(Debug)]
struct DeliveryState {
    pending: Vec<String>,
    ledger: ResultLedger,
    round_ids: Vec<i64>,
    attempt: u32,
}

impl DeliveryState {
    fn new(recipients: &[String]) -> Self {
        Self {
            pending: recipients.to_vec(),
            ledger: ResultLedger::new(),
            round_ids: Vec::new(),
            attempt: 0,
        }
    }

    /// Apply the result of the current round and decide whether another
    /// round should follow.
    fn record(&mut self, round: RoundResult, max_retries: u32) -> Result<bool> {
        match round {
            RoundResult::Indeterminate { reason } => {
                debug!(attempt = self.attempt, reason = %reason, "Round produced no outcome");
                Ok(self.attempt <= max_retries)
            }
            RoundResult::Terminal(e) => Err(e),
            RoundResult::Outcome(batch) => {
                debug!(
                    attempt = self.attempt,
                    multicast_id = batch.multicast_id,
                    "multicast_id for round"
                );
                self.round_ids.push(batch.multicast_id);
                self.pending = self.ledger.merge(&self.pending, batch)?;
                Ok(!self.pending.is_empty() && self.attempt <= max_retries)
            }
        }
    }

    fn finish(self, recipients: &[String]) -> Result<DeliveryResult> {
        if self.round_ids.is_empty() {
            return Err(GcmError::Unreachable {
                attempts: self.attempt,
            });
        }
        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                attempts = self.attempt,
                "Retry budget exhausted with recipients still failing"
            );
        }
        self.ledger.aggregate(recipients, &self.round_ids)
    }
}

/// Sends messages through a [`BatchTransport`], retrying transient failures.
///
/// A `Sender` holds no per-call state and can be shared between concurrent
/// calls.
#[derive(Debug, Clone)]
pub struct Sender<T = HttpTransport> {
    transport: T,
    backoff: BackoffPolicy,
}

impl Sender<HttpTransport> {
    /// Sender for the default endpoint using the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(&SenderConfig::new(api_key))
    }

    pub fn from_config(config: &SenderConfig) -> Result<Self> {
        Ok(Self::with_transport(
            HttpTransport::new(config)?,
            config.backoff(),
        ))
    }
}

impl<T: BatchTransport> Sender<T> {
    pub fn with_transport(transport: T, backoff: BackoffPolicy) -> Self {
        Self { transport, backoff }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    fn check_request(message: &Message, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            return Err(GcmError::invalid_argument("recipients must not be empty"));
        }
        message.validate()
    }

    /// Submit a single round without retrying.
    ///
    /// A round that produced no outcome is reported as
    /// [`GcmError::Unreachable`] with one attempt.
    pub async fn send_no_retry(
        &self,
        message: &Message,
        recipients: &[String],
    ) -> Result<BatchOutcome> {
        Self::check_request(message, recipients)?;
        match self.transport.submit(message, recipients).await {
            RoundResult::Outcome(batch) => Ok(batch),
            RoundResult::Indeterminate { reason } => {
                debug!(reason = %reason, "Round produced no outcome");
                Err(GcmError::Unreachable { attempts: 1 })
            }
            RoundResult::Terminal(e) => Err(e),
        }
    }

    /// Send `message` to every recipient, retrying up to `max_retries`
    /// additional rounds.
    ///
    /// Only recipients whose latest outcome is `Unavailable` or
    /// `InternalServerError` are resubmitted. The returned outcomes follow
    /// the order of `recipients`. Recipients still failing when the budget
    /// runs out keep their last error.
    pub async fn send_multicast(
        &self,
        message: &Message,
        recipients: &[String],
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> Result<DeliveryResult> {
        Self::check_request(message, recipients)?;

        let mut state = DeliveryState::new(recipients);
        loop {
            if cancel.is_cancelled() {
                return Err(GcmError::Cancelled);
            }
            state.attempt += 1;
            debug!(
                attempt = state.attempt,
                pending = state.pending.len(),
                message = %message,
                "Sending multicast round"
            );

            let round = tokio::select! {
                _ = cancel.cancelled() => return Err(GcmError::Cancelled),
                round = self.transport.submit(message, &state.pending) => round,
            };
            if !state.record(round, max_retries)? {
                break;
            }

            let delay = self.backoff.sleep_for_attempt(state.attempt);
            debug!(
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                "Backing off before next round"
            );
            cancellable_sleep(delay, cancel).await?;
        }

        let result = state.finish(recipients)?;
        info!(
            multicast_id = result.multicast_id,
            success = result.success,
            failure = result.failure,
            rounds = result.retry_multicast_ids.len() + 1,
            "Multicast delivery finished"
        );
        Ok(result)
    }

    /// Send `message` to a single recipient.
    pub async fn send(
        &self,
        message: &Message,
        recipient: &str,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> Result<RecipientOutcome> {
        let recipients = [recipient.to_string()];
        let result = self
            .send_multicast(message, &recipients, max_retries, cancel)
            .await?;

        let count = result.outcomes.len();
        let mut outcomes = result.outcomes.into_iter();
        match (outcomes.next(), count) {
            (Some(outcome), 1) => Ok(outcome),
            _ => Err(GcmError::internal(format!(
                "found {count} results in a single-recipient multicast, expected one"
            ))),
        }
    }

    /// Probe whether `recipient` is a valid registration using a dry-run
    /// message.
    pub async fn is_registration_valid(
        &self,
        recipient: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let outcome = self
            .send(&Message::dry_run_probe(), recipient, PROBE_RETRIES, cancel)
            .await?;
        Ok(outcome.error() != Some(&ErrorCode::InvalidRegistration))
    }
}
