//! One network round against the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::SenderConfig;
use crate::error::{GcmError, Result};
use crate::message::Message;
use crate::outcome::{BatchOutcome, ErrorCode, RecipientOutcome};

/// Classification of a single round.
#[derive(Debug)]
pub enum RoundResult {
    /// The gateway answered for every submitted recipient.
    Outcome(BatchOutcome),
    /// Network or transport failure; the whole round may be retried.
    Indeterminate { reason: String },
    /// The gateway rejected the request or violated the protocol. Never retried.
    Terminal(GcmError),
}

/// Delivery channel used by [`Sender`](crate::Sender).
///
/// Implementations submit exactly the given recipients, in order, with one
/// network call, and never look at per-recipient error codes.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn submit(&self, message: &Message, recipients: &[String]) -> RoundResult;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(flatten)]
    message: &'a Message,
    registration_ids: &'a [String],
}

#[derive(Deserialize)]
struct WireResponse {
    multicast_id: i64,
    success: u32,
    failure: u32,
    canonical_ids: u32,
    results: Vec<WireResult>,
}

#[derive(Deserialize)]
struct WireResult {
    message_id: Option<String>,
    registration_id: Option<String>,
    error: Option<String>,
}

impl WireResult {
    fn into_outcome(self) -> std::result::Result<RecipientOutcome, String> {
        match (self.message_id, self.error) {
            (Some(message_id), _) => Ok(RecipientOutcome::Delivered {
                message_id,
                canonical_registration_id: self.registration_id,
            }),
            (None, Some(error)) => Ok(RecipientOutcome::Failed {
                error: ErrorCode::from(error.as_str()),
            }),
            (None, None) => Err("result entry has neither message_id nor error".to_string()),
        }
    }
}

/// Build the JSON request body for one round.
pub fn encode_request(message: &Message, recipients: &[String]) -> Result<String> {
    let body = serde_json::to_string(&WireRequest {
        message,
        registration_ids: recipients,
    })
    .map_err(|e| GcmError::internal(format!("failed to encode request: {e}")))?;
    Ok(body)
}

/// Decode a 200 response body. Any decoding problem is a protocol violation.
pub fn decode_response(body: &str) -> Result<BatchOutcome> {
    let response: WireResponse =
        serde_json::from_str(body).map_err(|e| GcmError::malformed(e.to_string(), body))?;

    let outcomes = response
        .results
        .into_iter()
        .map(WireResult::into_outcome)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|reason| GcmError::malformed(reason, body))?;

    Ok(BatchOutcome {
        multicast_id: response.multicast_id,
        success: response.success,
        failure: response.failure,
        canonical_ids: response.canonical_ids,
        outcomes,
    })
}

/// HTTP transport posting JSON to the gateway endpoint.
///
/// Cloning is cheap and clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    auth_header: header::HeaderValue,
}

impl HttpTransport {
    pub fn new(config: &SenderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_client(client, config)
    }

    /// Use a preconfigured client (proxy, custom TLS, ...).
    pub fn with_client(client: Client, config: &SenderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GcmError::config("api key must not be empty"));
        }
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| GcmError::config(format!("invalid endpoint {}: {e}", config.endpoint)))?;
        if endpoint.scheme() != "https" {
            warn!(endpoint = %endpoint, "Gateway endpoint does not use https");
        }
        let mut auth_header = header::HeaderValue::from_str(&format!("key={}", config.api_key))
            .map_err(|e| GcmError::config(format!("invalid api key: {e}")))?;
        auth_header.set_sensitive(true);

        Ok(Self {
            client,
            endpoint,
            auth_header,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn submit(&self, message: &Message, recipients: &[String]) -> RoundResult {
        let body = match encode_request(message, recipients) {
            Ok(body) => body,
            Err(e) => return RoundResult::Terminal(e),
        };
        trace!(body = %body, "JSON request");
        debug!(endpoint = %self.endpoint, recipients = recipients.len(), "Posting to gateway");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, self.auth_header.clone())
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Gateway request failed");
                return RoundResult::Indeterminate {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "Failed to read error response");
                    "N/A".to_string()
                }
            };
            trace!(status = status.as_u16(), body = %body, "JSON error response");
            return RoundResult::Terminal(GcmError::InvalidRequest {
                status: status.as_u16(),
                body,
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to read gateway response");
                return RoundResult::Indeterminate {
                    reason: e.to_string(),
                };
            }
        };
        trace!(body = %body, "JSON response");

        match decode_response(&body) {
            Ok(outcome) => RoundResult::Outcome(outcome),
            Err(e) => {
                warn!(error = %e, "Error parsing gateway response");
                RoundResult::Terminal(e)
            }
        }
    }
}
