/// Health snapshot computation (SPEC_FULL.md §4.11, §10.5).
use chrono::Utc;

use crate::core::ChainStateView;
use crate::hud::HealthSnapshot;

const STALE_AFTER_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInputs {
    pub last_sol_ms: Option<i64>,
    pub last_token_ms: Option<i64>,
    pub last_data_api_ms: Option<i64>,
    pub wallet_count: usize,
    pub wallet_stale_count: usize,
}

/// Builds a [`HealthSnapshot`] from the chain-state singleton and the latest
/// per-channel timestamps tracked by the service loop. `uptime_sec` is
/// supplied by the caller since this module has no notion of process start.
pub fn compute_health(chain: ChainStateView, uptime_sec: u64, inputs: HealthInputs) -> HealthSnapshot {
    let now_ms = Utc::now().timestamp_millis();
    let ws_last_slot_age_ms = chain.last_slot_at_ms.map(|ts| now_ms - ts);

    HealthSnapshot {
        uptime_sec,
        rss_bytes: None,
        load_avg_1m: None,
        event_loop_lag_ms: 0,
        last_sol_ms: inputs.last_sol_ms,
        last_token_ms: inputs.last_token_ms,
        last_data_api_ms: inputs.last_data_api_ms,
        ws_slot: chain.slot,
        ws_root: chain.root,
        ws_last_slot_age_ms,
        wallet_count: inputs.wallet_count,
        wallet_stale_count: inputs.wallet_stale_count,
        updated_at: Some(Utc::now()),
    }
}

/// True when `last_activity_ms` (wall-clock millis) is older than the
/// staleness threshold relative to `now_ms`.
pub fn is_stale(last_activity_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(last_activity_ms) > STALE_AFTER_MS
}
