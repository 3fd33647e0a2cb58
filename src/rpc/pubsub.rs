/// Solana RPC pubsub client with a reconnect supervisor (SPEC_FULL.md §4.2,
/// §4.10, §9 resolved open question, §10.5).
///
/// Grounded on the teacher's `PumpWebSocketClient` connect/split pattern
/// (`src/client/websocket.rs`), generalized to multiple subscription kinds and
/// wrapped in an exponential-backoff-with-jitter reconnect loop instead of a
/// one-shot connect.
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::hud::SupervisorState;

use super::backoff::BackoffPolicy;

/// A decoded pubsub notification, already stripped of JSON-RPC envelope.
#[derive(Debug, Clone)]
pub enum PubsubEvent {
    Slot { slot: u64, parent: u64, root: u64 },
    Account { pubkey: String, raw: serde_json::Value },
    Logs { signature: String, err: Option<String> },
}

/// Callback invoked whenever the supervisor's state for this subscription changes.
pub trait SupervisorObserver: Send + Sync {
    fn on_state_change(&self, state: SupervisorState, attempt: u32);
}

pub struct NoopObserver;
impl SupervisorObserver for NoopObserver {
    fn on_state_change(&self, _state: SupervisorState, _attempt: u32) {}
}

/// Subscribes to `slotSubscribe` on `ws_url` and forwards decoded events on
/// `tx`, reconnecting forever with [`BackoffPolicy`] on any failure. Intended
/// to be spawned as a background task; returns only when `tx` is dropped.
pub async fn run_slot_subscription(
    ws_url: String,
    tx: mpsc::Sender<PubsubEvent>,
    observer: &(dyn SupervisorObserver + Send + Sync),
) {
    run_subscription(
        ws_url,
        tx,
        observer,
        "slotSubscribe",
        json!([]),
        parse_slot_notification,
    )
    .await
}

/// Subscribes to `accountSubscribe` for `pubkey`, forwarding decoded
/// [`PubsubEvent::Account`] notifications on `tx` (SPEC_FULL.md §4.7 step 7).
pub async fn run_account_subscription(
    ws_url: String,
    pubkey: String,
    tx: mpsc::Sender<PubsubEvent>,
    observer: &(dyn SupervisorObserver + Send + Sync),
) {
    let params = json!([pubkey.clone(), {"encoding": "jsonParsed", "commitment": "confirmed"}]);
    let pubkey_for_parse = pubkey.clone();
    run_subscription(ws_url, tx, observer, "accountSubscribe", params, move |text| {
        parse_account_notification(text, &pubkey_for_parse)
    })
    .await
}

/// Subscribes to `logsSubscribe` with a `mentions: [pubkey]` filter,
/// forwarding decoded [`PubsubEvent::Logs`] notifications on `tx`.
pub async fn run_logs_subscription(
    ws_url: String,
    pubkey: String,
    tx: mpsc::Sender<PubsubEvent>,
    observer: &(dyn SupervisorObserver + Send + Sync),
) {
    let params = json!([{"mentions": [pubkey]}, {"commitment": "confirmed"}]);
    run_subscription(
        ws_url,
        tx,
        observer,
        "logsSubscribe",
        params,
        parse_logs_notification,
    )
    .await
}

async fn run_subscription(
    ws_url: String,
    tx: mpsc::Sender<PubsubEvent>,
    observer: &(dyn SupervisorObserver + Send + Sync),
    method: &str,
    params: serde_json::Value,
    parse: impl Fn(&str) -> Option<PubsubEvent>,
) {
    let policy = BackoffPolicy::default();
    let mut attempt: u32 = 0;

    loop {
        observer.on_state_change(SupervisorState::Subscribing, attempt);
        match connect_and_stream(&ws_url, &tx, method, &params, &parse).await {
            Ok(()) => {
                // tx closed; caller is shutting down.
                observer.on_state_change(SupervisorState::Inactive, attempt);
                return;
            }
            Err(e) => {
                warn!(error = %e, attempt, method, "pubsub subscription dropped, reconnecting");
                observer.on_state_change(SupervisorState::Backoff, attempt);
                let delay = policy.delay(attempt);
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

async fn connect_and_stream(
    ws_url: &str,
    tx: &mpsc::Sender<PubsubEvent>,
    method: &str,
    params: &serde_json::Value,
    parse: impl Fn(&str) -> Option<PubsubEvent>,
) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(ws_url).await?;
    info!(ws_url, method, "pubsub connected");
    let (mut write, mut read) = ws_stream.split();

    let subscribe_req = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    write.send(Message::Text(subscribe_req.to_string())).await?;

    while let Some(msg) = read.next().await {
        let msg = msg?;
        let Message::Text(text) = msg else { continue };
        match parse(&text) {
            Some(event) => {
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
            None => debug!(text, method, "unrecognized pubsub frame"),
        }
    }
    anyhow::bail!("pubsub stream ended")
}

fn parse_slot_notification(text: &str) -> Option<PubsubEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let params = value.get("params")?;
    let result = params.get("result")?;
    Some(PubsubEvent::Slot {
        slot: result.get("slot")?.as_u64()?,
        parent: result.get("parent")?.as_u64().unwrap_or_default(),
        root: result.get("root")?.as_u64().unwrap_or_default(),
    })
}

/// `accountNotification` payloads do not echo the subscribed pubkey, so the
/// caller's `pubkey` is threaded through from the subscribe call instead.
fn parse_account_notification(text: &str, pubkey: &str) -> Option<PubsubEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let params = value.get("params")?;
    let result = params.get("result")?.get("value")?;
    Some(PubsubEvent::Account {
        pubkey: pubkey.to_string(),
        raw: result.clone(),
    })
}

fn parse_logs_notification(text: &str) -> Option<PubsubEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let params = value.get("params")?;
    let result = params.get("result")?.get("value")?;
    let signature = result.get("signature")?.as_str()?.to_string();
    let err = result
        .get("err")
        .filter(|e| !e.is_null())
        .map(|e| e.to_string());
    Some(PubsubEvent::Logs { signature, err })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_slot_notification() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "slotNotification",
            "params": {
                "result": { "slot": 100, "parent": 99, "root": 90 },
                "subscription": 0
            }
        })
        .to_string();
        let event = parse_slot_notification(&text).unwrap();
        match event {
            PubsubEvent::Slot { slot, parent, root } => {
                assert_eq!(slot, 100);
                assert_eq!(parent, 99);
                assert_eq!(root, 90);
            }
            _ => panic!("expected a slot event"),
        }
    }

    #[test]
    fn non_notification_frames_are_ignored() {
        let text = json!({"jsonrpc": "2.0", "result": 1, "id": 1}).to_string();
        assert!(parse_slot_notification(&text).is_none());
    }

    #[test]
    fn parses_account_notification() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "accountNotification",
            "params": {
                "result": { "context": {"slot": 1}, "value": {"lamports": 42} },
                "subscription": 1
            }
        })
        .to_string();
        let event = parse_account_notification(&text, "Wallet1").unwrap();
        match event {
            PubsubEvent::Account { pubkey, raw } => {
                assert_eq!(pubkey, "Wallet1");
                assert_eq!(raw.get("lamports").unwrap().as_u64(), Some(42));
            }
            _ => panic!("expected an account event"),
        }
    }

    #[test]
    fn parses_logs_notification_with_error() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": { "value": {"signature": "sig1", "err": {"InstructionError": [0, "Custom"]}, "logs": []} },
                "subscription": 2
            }
        })
        .to_string();
        let event = parse_logs_notification(&text).unwrap();
        match event {
            PubsubEvent::Logs { signature, err } => {
                assert_eq!(signature, "sig1");
                assert!(err.is_some());
            }
            _ => panic!("expected a logs event"),
        }
    }

    #[test]
    fn parses_logs_notification_without_error() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": { "value": {"signature": "sig2", "err": null, "logs": []} },
                "subscription": 2
            }
        })
        .to_string();
        let event = parse_logs_notification(&text).unwrap();
        match event {
            PubsubEvent::Logs { signature, err } => {
                assert_eq!(signature, "sig2");
                assert!(err.is_none());
            }
            _ => panic!("expected a logs event"),
        }
    }

    struct RecordingObserver {
        states: std::sync::Mutex<Vec<SupervisorState>>,
    }

    impl SupervisorObserver for RecordingObserver {
        fn on_state_change(&self, state: SupervisorState, _attempt: u32) {
            self.states.lock().unwrap().push(state);
        }
    }

    #[tokio::test]
    async fn failed_connect_reports_backoff_state() {
        let observer = RecordingObserver {
            states: std::sync::Mutex::new(Vec::new()),
        };
        let (tx, _rx) = mpsc::channel(4);
        // An invalid scheme fails connect_async immediately without a real
        // network attempt, letting this test run without external dependencies.
        let fut = run_slot_subscription("not-a-url".to_string(), tx, &observer);
        let _ = tokio::time::timeout(std::time::Duration::from_millis(50), fut).await;
        let states = observer.states.lock().unwrap();
        assert!(states.contains(&SupervisorState::Subscribing));
    }
}
