/// Composed hub operations: `runSwap`/`runTxMonitor` (SPEC_FULL.md §4.8
/// public operations), built on top of the single-flight lock and the
/// timeout-bounded worker dispatch in `lock.rs`/`worker.rs`.
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::errors::WarchestResult;
use crate::hud::{HubEvent, TxSide, TxSummary, TxSummaryStatus};

use super::lock::SingleFlightLock;
use super::worker::{dispatch_worker, write_detached_monitor_request, WorkerOutput};

/// Derives the named lock key a dispatch acquires: one in-flight operation
/// per `(worker, wallet, mint)` (§4.8 step 1).
pub fn lock_key(worker_name: &str, wallet: &str, mint: Option<&str>) -> String {
    match mint {
        Some(m) => format!("{worker_name}:{wallet}:{m}"),
        None => format!("{worker_name}:{wallet}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub output: WorkerOutput,
    pub events: Vec<HubEvent>,
}

/// Runs a swap worker under the named single-flight lock (§4.8 steps 1-3):
/// the child's stdout is newline-delimited JSON progress events (§9), parsed
/// and forwarded to `on_progress` in the order they were printed. When
/// `lock_wait` is set, a held lock for the same key is waited on up to
/// `timeout` before giving up; otherwise it is rejected with `Conflict`
/// immediately (§4.8 step 1). A worker that exits without ever emitting a
/// terminal `swap:summary` event (crash) gets one synthesized here so the
/// caller always sees a terminal outcome (§7/§8: worker crash never crashes
/// the service, it surfaces a failed `TxSummary` instead).
#[allow(clippy::too_many_arguments)]
pub async fn run_swap(
    lock: &SingleFlightLock,
    worker_name: &str,
    wallet: &str,
    mint: Option<&str>,
    side: Option<TxSide>,
    program: &str,
    args: &[String],
    timeout: Duration,
    lock_wait: bool,
    mut on_progress: impl FnMut(&HubEvent),
) -> WarchestResult<SwapOutcome> {
    let key = lock_key(worker_name, wallet, mint);
    let wait = lock_wait.then_some(timeout);
    let _guard = lock.acquire(&key, wait).await?;

    let output = dispatch_worker(program, args, timeout).await?;
    let mut events = parse_progress_lines(&output.stdout);

    let crashed = output.status_code != Some(0)
        && !events.iter().any(|e| e.event == "swap:summary");
    if crashed {
        let side_label = match side {
            Some(TxSide::Buy) => "buy",
            Some(TxSide::Sell) => "sell",
            Some(TxSide::Tx) | None => "swap",
        };
        events.push(HubEvent {
            request_id: worker_name.to_string(),
            alias: wallet.to_string(),
            event: "swap:summary".to_string(),
            ts: chrono::Utc::now(),
            data: Some(TxSummary {
                kind: "swap".to_string(),
                status: TxSummaryStatus::Failed,
                label: Some(format!("{side_label} swap crashed")),
                side,
                mint: mint.map(str::to_string),
                txid: None,
                explorer_url: None,
                duration_ms: None,
                tokens: None,
                sol: None,
                total_fees_sol: None,
                price_impact_pct: None,
                quote: None,
                err: None,
                err_message: Some(output.stderr.clone()),
                error_summary: None,
                block_time_iso: None,
            }),
        });
    }

    for event in &events {
        on_progress(event);
    }

    Ok(SwapOutcome { output, events })
}

#[derive(Debug, Clone, PartialEq)]
pub enum TxMonitorOutcome {
    Detached { request_id: String },
    Completed(WorkerOutput),
}

/// Runs (or detaches) a tx-monitor worker under the same single-flight
/// discipline as `run_swap` (§4.8 step 4). When `detached` is set, the
/// payload is written to `payload_dir` and the call returns immediately;
/// the request file is picked up by an out-of-process monitor and its
/// progress observed later through the hub-events log, not through this
/// call's return value.
pub async fn run_tx_monitor<T: Serialize>(
    lock: &SingleFlightLock,
    worker_name: &str,
    wallet: &str,
    mint: Option<&str>,
    payload_dir: &Path,
    payload: T,
    detached: bool,
    program: &str,
    args: &[String],
    timeout: Duration,
    lock_wait: bool,
) -> WarchestResult<TxMonitorOutcome> {
    let key = lock_key(worker_name, wallet, mint);
    let wait = lock_wait.then_some(timeout);
    let _guard = lock.acquire(&key, wait).await?;

    if detached {
        let request_id = write_detached_monitor_request(payload_dir, wallet, payload).await?;
        return Ok(TxMonitorOutcome::Detached { request_id });
    }

    let output = dispatch_worker(program, args, timeout).await?;
    Ok(TxMonitorOutcome::Completed(output))
}

fn parse_progress_lines(stdout: &str) -> Vec<HubEvent> {
    let mut events = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<HubEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => warn!(error = %e, line = trimmed, "skipping malformed progress line"),
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_includes_mint_when_present() {
        assert_eq!(lock_key("swap", "alpha", Some("mintA")), "swap:alpha:mintA");
        assert_eq!(lock_key("swap", "alpha", None), "swap:alpha");
    }

    #[tokio::test]
    async fn run_swap_forwards_progress_in_order() {
        let lock = SingleFlightLock::new();
        let event = HubEvent {
            request_id: "req1".to_string(),
            alias: "alpha".to_string(),
            event: "swap:summary".to_string(),
            ts: chrono::Utc::now(),
            data: Some(TxSummary {
                kind: "swap".to_string(),
                status: TxSummaryStatus::Ok,
                label: None,
                side: None,
                mint: None,
                txid: Some("sig1".to_string()),
                explorer_url: None,
                duration_ms: None,
                tokens: None,
                sol: None,
                total_fees_sol: None,
                price_impact_pct: None,
                quote: None,
                err: None,
                err_message: None,
                error_summary: None,
                block_time_iso: None,
            }),
        };
        let line = serde_json::to_string(&event).unwrap();
        let script = format!("echo '{line}'");

        let mut seen = Vec::new();
        let outcome = run_swap(
            &lock,
            "swap",
            "alpha",
            Some("mintA"),
            Some(TxSide::Buy),
            "sh",
            &["-c".to_string(), script],
            Duration::from_secs(5),
            false,
            |e| seen.push(e.request_id.clone()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(seen, vec!["req1".to_string()]);
        assert!(!lock.is_held("swap:alpha:mintA"));
    }

    #[tokio::test]
    async fn run_swap_rejects_concurrent_same_key_without_lock_wait() {
        let lock = SingleFlightLock::new();
        let _guard = lock.try_acquire("swap:alpha:mintA").unwrap();

        let err = run_swap(
            &lock,
            "swap",
            "alpha",
            Some("mintA"),
            Some(TxSide::Buy),
            "sh",
            &["-c".to_string(), "echo hi".to_string()],
            Duration::from_secs(5),
            false,
            |_| {},
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "ECONFLICT");
    }

    #[tokio::test]
    async fn run_swap_with_lock_wait_proceeds_once_the_holder_releases() {
        let lock = std::sync::Arc::new(SingleFlightLock::new());
        let guard = lock.try_acquire("swap:alpha:mintA").unwrap();

        let waiting_lock = std::sync::Arc::clone(&lock);
        let waiting = tokio::spawn(async move {
            run_swap(
                &waiting_lock,
                "swap",
                "alpha",
                Some("mintA"),
                Some(TxSide::Buy),
                "sh",
                &["-c".to_string(), "echo hi".to_string()],
                Duration::from_secs(5),
                true,
                |_| {},
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let outcome = waiting.await.unwrap().unwrap();
        assert!(outcome.events.is_empty());
    }

    #[tokio::test]
    async fn run_swap_synthesizes_a_crashed_summary_when_worker_exits_nonzero_silently() {
        let lock = SingleFlightLock::new();
        let outcome = run_swap(
            &lock,
            "swap",
            "alpha",
            Some("mintA"),
            Some(TxSide::Sell),
            "sh",
            &["-c".to_string(), "exit 1".to_string()],
            Duration::from_secs(5),
            false,
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.events.len(), 1);
        let summary = outcome.events[0].data.as_ref().unwrap();
        assert_eq!(summary.status, TxSummaryStatus::Failed);
        assert_eq!(summary.label.as_deref(), Some("sell swap crashed"));
    }

    #[tokio::test]
    async fn run_tx_monitor_detached_writes_request_and_returns_immediately() {
        let lock = SingleFlightLock::new();
        let dir = tempfile::tempdir().unwrap();

        let outcome = run_tx_monitor(
            &lock,
            "monitor",
            "alpha",
            None,
            dir.path(),
            serde_json::json!({"txid": "sig1"}),
            true,
            "sh",
            &["-c".to_string(), "sleep 5".to_string()],
            Duration::from_secs(5),
            false,
        )
        .await
        .unwrap();

        match outcome {
            TxMonitorOutcome::Detached { request_id } => assert!(!request_id.is_empty()),
            TxMonitorOutcome::Completed(_) => panic!("expected a detached outcome"),
        }
        assert!(!lock.is_held("monitor:alpha"));
    }
}
