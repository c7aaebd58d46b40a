//! gcm-sender: multicast push-notification delivery.
//!
//! This crate submits a [`Message`] to many recipients through a
//! multicast-capable HTTP gateway, tolerating per-recipient failures and
//! transient gateway unavailability.
//!
//! ## Core Types
//!
//! - [`Sender`] - Drives the retry loop and assembles the final result
//! - [`BatchTransport`] - One network round; [`HttpTransport`] is the reqwest implementation
//! - [`ResultLedger`] - Per-recipient outcomes across rounds
//! - [`BackoffPolicy`] - Exponential backoff with jitter between rounds
//!
//! ## Results
//!
//! - [`RecipientOutcome`] - Delivered or failed, per recipient
//! - [`DeliveryResult`] - Counts, round identifiers and ordered outcomes
//! - [`GcmError`] - Reasons a whole call fails
//!
//! ## Example
//!
//! ```no_run
//! use gcm_sender::{Message, Notification, Sender};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> gcm_sender::Result<()> {
//! let sender = Sender::new("server-api-key")?;
//! let message = Message::new()
//!     .with_data("score", "3-1")
//!     .with_notification(Notification::new("ic_goal").with_title("Goal!"));
//! let recipients = vec!["reg-1".to_string(), "reg-2".to_string()];
//!
//! let result = sender
//!     .send_multicast(&message, &recipients, 5, &CancellationToken::new())
//!     .await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod ledger;
pub mod message;
pub mod outcome;
pub mod sender;
pub mod transport;

pub use backoff::{BackoffPolicy, cancellable_sleep};
pub use config::{GCM_SEND_ENDPOINT, SenderConfig};
pub use error::{GcmError, Result};
pub use ledger::ResultLedger;
pub use message::{MAX_TIME_TO_LIVE, Message, Notification, Priority};
pub use outcome::{BatchOutcome, DeliveryResult, ErrorCode, RecipientOutcome};
pub use sender::{PROBE_RETRIES, Sender};
pub use transport::{BatchTransport, HttpTransport, RoundResult};
