//! End-to-end tests against a fake gateway served by axum on a local port.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use gcm_sender::{
    ErrorCode, GcmError, Message, Notification, RecipientOutcome, Sender, SenderConfig,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const API_KEY: &str = "test-key";

#[derive(Clone, Copy)]
enum Mode {
    /// Answer per recipient according to the gateway rules below.
    Normal,
    /// Reject every request with the given status.
    Reject(StatusCode),
    /// Answer 200 with a body that is not a gateway response.
    Garbage,
}

/// Fake gateway.
///
/// Recipients starting with `bad-` are invalid registrations, recipients
/// starting with `flaky-` are `Unavailable` on their first submission, and
/// recipients starting with `stale-` are delivered with a canonical id.
struct Gateway {
    mode: Mode,
    requests: Mutex<Vec<Value>>,
    seen: Mutex<HashSet<String>>,
}

async fn handle(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let round = {
        let mut requests = gateway.requests.lock();
        requests.push(body.clone());
        requests.len() as i64
    };

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("key={API_KEY}").as_str());
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized".to_string());
    }

    match gateway.mode {
        Mode::Reject(status) => {
            return (status, "Field \"data\" must be a JSON array".to_string());
        }
        Mode::Garbage => return (StatusCode::OK, "<html>maintenance</html>".to_string()),
        Mode::Normal => {}
    }

    let ids: Vec<String> = body["registration_ids"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut success = 0;
    let mut failure = 0;
    let mut canonical = 0;
    let mut results = Vec::new();
    let mut seen = gateway.seen.lock();
    for id in &ids {
        let first_time = seen.insert(id.clone());
        if id.starts_with("bad-") {
            failure += 1;
            results.push(json!({ "error": "InvalidRegistration" }));
        } else if id.starts_with("flaky-") && first_time {
            failure += 1;
            results.push(json!({ "error": "Unavailable" }));
        } else if id.starts_with("stale-") {
            success += 1;
            canonical += 1;
            results.push(json!({
                "message_id": format!("{round}:{id}"),
                "registration_id": "fresh",
            }));
        } else {
            success += 1;
            results.push(json!({ "message_id": format!("{round}:{id}") }));
        }
    }

    let response = json!({
        "multicast_id": 1000 + round,
        "success": success,
        "failure": failure,
        "canonical_ids": canonical,
        "results": results,
    });
    (StatusCode::OK, response.to_string())
}

async fn spawn_gateway(mode: Mode) -> (SocketAddr, Arc<Gateway>) {
    let gateway = Arc::new(Gateway {
        mode,
        requests: Mutex::new(Vec::new()),
        seen: Mutex::new(HashSet::new()),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/gcm/send", post(handle))
        .with_state(gateway.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, gateway)
}

fn config(addr: SocketAddr) -> SenderConfig {
    SenderConfig {
        api_key: API_KEY.to_string(),
        endpoint: format!("http://{addr}/gcm/send"),
        timeout_secs: 5,
        initial_backoff_ms: 2,
        max_backoff_ms: 20,
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn multicast_retries_only_unavailable_recipients() {
    let (addr, gateway) = spawn_gateway(Mode::Normal).await;
    let sender = Sender::from_config(&config(addr)).unwrap();
    let recipients = ids(&["a", "flaky-b", "bad-c", "stale-d"]);

    let result = sender
        .send_multicast(&Message::new(), &recipients, 3, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.success, 3);
    assert_eq!(result.failure, 1);
    assert_eq!(result.canonical_ids, 1);
    assert_eq!(result.multicast_id, 1001);
    assert_eq!(result.retry_multicast_ids, vec![1002]);

    assert_eq!(result.outcomes[0], RecipientOutcome::delivered("1:a"));
    assert_eq!(result.outcomes[1], RecipientOutcome::delivered("2:flaky-b"));
    assert_eq!(
        result.outcomes[2].error(),
        Some(&ErrorCode::InvalidRegistration)
    );
    assert_eq!(result.outcomes[3].canonical_registration_id(), Some("fresh"));

    let requests = gateway.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["registration_ids"], json!(["flaky-b"]));
}

#[tokio::test]
async fn request_body_carries_message_fields() {
    let (addr, gateway) = spawn_gateway(Mode::Normal).await;
    let sender = Sender::from_config(&config(addr)).unwrap();
    let message = Message {
        time_to_live: Some(60),
        collapse_key: Some("news".to_string()),
        ..Default::default()
    }
    .with_data("story", "42")
    .with_notification(Notification {
        badge: Some(2),
        ..Notification::new("ic_news").with_title("Breaking")
    });

    sender
        .send(&message, "a", 0, &CancellationToken::new())
        .await
        .unwrap();

    let requests = gateway.requests.lock();
    let body = &requests[0];
    assert_eq!(body["registration_ids"], json!(["a"]));
    assert_eq!(body["time_to_live"], 60);
    assert_eq!(body["collapse_key"], "news");
    assert_eq!(body["data"], json!({ "story": "42" }));
    assert_eq!(body["notification"]["title"], "Breaking");
    assert_eq!(body["notification"]["badge"], "2");
    assert!(body.get("priority").is_none());
    assert!(body.get("dry_run").is_none());
}

#[tokio::test]
async fn non_200_status_is_terminal() {
    let (addr, gateway) = spawn_gateway(Mode::Reject(StatusCode::BAD_REQUEST)).await;
    let sender = Sender::from_config(&config(addr)).unwrap();

    let err = sender
        .send_multicast(&Message::new(), &ids(&["a", "b"]), 5, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        GcmError::InvalidRequest { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "Field \"data\" must be a JSON array");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(gateway.requests.lock().len(), 1);
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let (addr, _gateway) = spawn_gateway(Mode::Normal).await;
    let sender = Sender::from_config(&SenderConfig {
        api_key: "other".to_string(),
        ..config(addr)
    })
    .unwrap();

    let err = sender
        .send(&Message::new(), "a", 2, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn malformed_body_is_terminal() {
    let (addr, gateway) = spawn_gateway(Mode::Garbage).await;
    let sender = Sender::from_config(&config(addr)).unwrap();

    let err = sender
        .send_multicast(&Message::new(), &ids(&["a"]), 5, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GcmError::MalformedResponse { .. }));
    assert_eq!(gateway.requests.lock().len(), 1);
}

#[tokio::test]
async fn unreachable_gateway_exhausts_retries() {
    // Reserve a port, then close it so connections are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sender = Sender::from_config(&config(addr)).unwrap();
    let err = sender
        .send_multicast(&Message::new(), &ids(&["a"]), 2, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GcmError::Unreachable { attempts: 3 }));
}

#[tokio::test]
async fn probe_reports_registration_validity() {
    let (addr, gateway) = spawn_gateway(Mode::Normal).await;
    let sender = Sender::from_config(&config(addr)).unwrap();
    let cancel = CancellationToken::new();

    assert!(sender.is_registration_valid("good", &cancel).await.unwrap());
    assert!(!sender.is_registration_valid("bad-old", &cancel).await.unwrap());

    let requests = gateway.requests.lock();
    assert_eq!(requests.len(), 2);
    for request in requests.iter() {
        assert_eq!(request["dry_run"], true);
        assert!(request.get("data").is_none());
    }
}
