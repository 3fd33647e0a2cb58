/// Hub worker dispatch: child-process execution with a timeout, detached
/// monitor requests, and applying replayed hub events back onto the HUD
/// store (SPEC_FULL.md §4.8 steps 4-6, C8).
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{WarchestError, WarchestResult};
use crate::hud::{AlertLevel, HubEvent, HudStore};

pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns `program` with `args`, waiting up to `timeout` for it to exit.
/// A timeout kills the child and surfaces `WarchestError::Timeout`.
pub async fn dispatch_worker(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> WarchestResult<WorkerOutput> {
    let mut command = Command::new(program);
    command.args(args);
    command.kill_on_drop(true);

    let child = command
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(WorkerOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => Err(WarchestError::unavailable(format!(
            "failed to spawn worker {program}: {e}"
        ))),
        Err(_) => Err(WarchestError::Timeout(timeout.as_millis() as u64)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetachedMonitorRequest<T: Serialize> {
    pub request_id: String,
    pub alias: String,
    pub payload: T,
}

/// Writes a detached monitor request file under `request_dir`, named by a
/// fresh request id, for a watcher process to pick up independently of this
/// process's lifetime (§4.8 step 5).
pub async fn write_detached_monitor_request<T: Serialize>(
    request_dir: &Path,
    alias: &str,
    payload: T,
) -> WarchestResult<String> {
    tokio::fs::create_dir_all(request_dir)
        .await
        .map_err(|e| WarchestError::unavailable(format!("creating request dir failed: {e}")))?;

    let request_id = Uuid::new_v4().to_string();
    let request = DetachedMonitorRequest {
        request_id: request_id.clone(),
        alias: alias.to_string(),
        payload,
    };
    let body = serde_json::to_vec_pretty(&request)
        .map_err(|e| WarchestError::integrity(format!("request serialization failed: {e}")))?;

    let path = request_dir.join(format!("{request_id}.json"));
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| WarchestError::unavailable(format!("writing request file failed: {e}")))?;

    info!(alias, request_id, path = %path.display(), "wrote detached monitor request");
    Ok(request_id)
}

/// Applies a single replayed [`HubEvent`] onto the HUD store: a recent-event
/// line is always pushed, a failed/timed-out terminal summary additionally
/// raises a service-level alert, and the terminal `swap:summary` event is
/// inserted or merged by txid into `service.transactions`, bounded at
/// `tx_cap` (§4.8 step 6, §8 testable property).
pub fn apply_hub_event_to_state(store: &HudStore, event: &HubEvent, tx_cap: usize) {
    let alias = event.alias.clone();
    let summary_text = match event.data.as_ref().and_then(|s| s.label.clone()) {
        Some(label) => label,
        None => event.event.clone(),
    };
    let is_failed = event.is_failure();
    let tx_row = event.to_transaction_row();
    let event = event.clone();

    store.mutate(move |snapshot| {
        if let Some(wallet) = snapshot.state.get_mut(&alias) {
            wallet.push_recent_event(summary_text.clone());
        } else {
            warn!(alias, "hub event for unknown alias, dropping state update");
        }
        if is_failed {
            let detail = event
                .data
                .as_ref()
                .and_then(|s| s.err_message.clone().or_else(|| s.error_summary.clone()))
                .unwrap_or_else(|| "hub operation failed".to_string());
            snapshot
                .service
                .push_alert(AlertLevel::Error, format!("[{alias}] {detail}"));
        }
        if let Some(row) = tx_row.clone() {
            snapshot.service.upsert_transaction(row, tx_cap);
        }
    });
}

/// Tails `path` from byte offset `from_offset`, returning any newly
/// appended, successfully-parsed [`HubEvent`] lines and the new offset.
/// Malformed lines are skipped with a warning rather than aborting the tail
/// (§4.8 step 6: one bad line must never wedge the whole log reader).
pub async fn tail_new_hub_events(
    path: &Path,
    from_offset: u64,
) -> WarchestResult<(Vec<HubEvent>, u64)> {
    use tokio::io::AsyncSeekExt;

    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), from_offset)),
        Err(e) => return Err(WarchestError::unavailable(format!("opening hub log failed: {e}"))),
    };

    file.seek(std::io::SeekFrom::Start(from_offset))
        .await
        .map_err(|e| WarchestError::unavailable(format!("seeking hub log failed: {e}")))?;

    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut bytes_read: u64 = 0;

    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| WarchestError::unavailable(format!("reading hub log failed: {e}")))?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<HubEvent>(trimmed) {
            Ok(event) => events.push(event),
            Err(e) => warn!(error = %e, line = trimmed, "skipping malformed hub event line"),
        }
    }

    Ok((events, from_offset + bytes_read))
}

pub fn request_file_path(request_dir: &Path, request_id: &str) -> PathBuf {
    request_dir.join(format!("{request_id}.json"))
}
