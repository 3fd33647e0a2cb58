/// HUD data model (SPEC_FULL.md §3).
///
/// Every numeric field that can become non-finite (division results, missing
/// upstream data) is represented as `Option<f64>` and scrubbed through
/// [`finite_or_none`] rather than ever carrying `NaN`/`inf` into a snapshot.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scrubs a computed float down to `None` whenever it is not finite.
pub fn finite_or_none(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSpec {
    pub alias: String,
    pub pubkey: String,
    pub color: Option<String>,
    pub wallet_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChangePct {
    #[serde(rename = "1m")]
    pub m1: Option<f64>,
    #[serde(rename = "5m")]
    pub m5: Option<f64>,
    #[serde(rename = "15m")]
    pub m15: Option<f64>,
    #[serde(rename = "30m")]
    pub m30: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TokenRow {
    pub symbol: Option<String>,
    pub mint: String,
    pub balance: f64,
    pub session_delta: f64,
    pub usd_estimate: Option<f64>,
    pub decimals: Option<u8>,
    pub price_usd: Option<f64>,
    pub change_pct: Option<ChangePct>,
    pub liquidity_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub holders: Option<u64>,
    pub risk_score: Option<f64>,
    pub top10_pct: Option<f64>,
    pub sniper_pct: Option<f64>,
    pub dev_pct: Option<f64>,
    pub risk_tags: Vec<String>,
}

/// Normalized PnL row (SPEC_FULL.md §3, §9). Constructed exclusively through
/// [`crate::db::normalize_pnl_row`], which is the single place that reconciles
/// the operational database's varied key spellings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PnlRow {
    pub mint: String,
    pub current_token_amount: f64,
    pub avg_cost_usd: Option<f64>,
    pub coin_price_usd: Option<f64>,
    pub entry_usd: Option<f64>,
    pub current_usd: Option<f64>,
    pub unrealized_pnl_usd: Option<f64>,
    pub realized_pnl_usd: Option<f64>,
    pub roi_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxSide {
    Buy,
    Sell,
    Tx,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    Confirmed,
    Failed,
    Processed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinSnapshot {
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRow {
    pub txid: String,
    pub side: TxSide,
    pub mint: Option<String>,
    pub tokens: Option<f64>,
    pub sol: Option<f64>,
    pub status_category: StatusCategory,
    pub status_emoji: String,
    pub err_message: Option<String>,
    pub coin: Option<CoinSnapshot>,
    pub observed_at: DateTime<Utc>,
    pub block_time_iso: Option<DateTime<Utc>>,
    pub slot: Option<u64>,
    pub explorer_url: Option<String>,
}

impl TransactionRow {
    /// The ordering key used everywhere transactions are sorted: newest first
    /// by `blockTimeIso`, falling back to `observedAt` (SPEC_FULL.md §3).
    pub fn order_key(&self) -> DateTime<Utc> {
        self.block_time_iso.unwrap_or(self.observed_at)
    }

    /// Shallow merge of a newer row into an existing one sharing the same
    /// `txid`, preferring non-null fields from `newer` (§4.8.6 / §9 resolution
    /// of the TransactionRow merge-by-txid open question).
    pub fn merge_from(&self, newer: &TransactionRow) -> TransactionRow {
        TransactionRow {
            txid: self.txid.clone(),
            side: newer.side,
            mint: newer.mint.clone().or_else(|| self.mint.clone()),
            tokens: newer.tokens.or(self.tokens),
            sol: newer.sol.or(self.sol),
            status_category: newer.status_category,
            status_emoji: if newer.status_emoji.is_empty() {
                self.status_emoji.clone()
            } else {
                newer.status_emoji.clone()
            },
            err_message: newer.err_message.clone().or_else(|| self.err_message.clone()),
            coin: newer.coin.clone().or_else(|| self.coin.clone()),
            observed_at: self.observed_at,
            block_time_iso: newer.block_time_iso.or(self.block_time_iso),
            slot: newer.slot.or(self.slot),
            explorer_url: newer.explorer_url.clone().or_else(|| self.explorer_url.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentEvent {
    pub ts: DateTime<Utc>,
    pub summary: String,
}

/// The coarse step a progress event taxonomy entry belongs to (SPEC_FULL.md
/// §4.8 progress event taxonomy table).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStep {
    Validate,
    Secret,
    Prepare,
    Submit,
    Monitor,
}

/// A step's derived state, folded deterministically over the event sequence:
/// `pending -> active -> done/failed` (§4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Active,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxSummaryStatus {
    Ok,
    Failed,
    Unknown,
    Timeout,
}

/// Terminal summary carried by the `swap:summary` progress event (§3, §4.8).
/// Keys may be null when unknown; `status='ok'` implies no error fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxSummary {
    pub kind: String,
    pub status: TxSummaryStatus,
    pub label: Option<String>,
    pub side: Option<TxSide>,
    pub mint: Option<String>,
    pub txid: Option<String>,
    pub explorer_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub tokens: Option<f64>,
    pub sol: Option<f64>,
    pub total_fees_sol: Option<f64>,
    pub price_impact_pct: Option<f64>,
    pub quote: Option<serde_json::Value>,
    pub err: Option<String>,
    pub err_message: Option<String>,
    pub error_summary: Option<String>,
    pub block_time_iso: Option<DateTime<Utc>>,
}

/// A structured progress event emitted by a hub worker child process and read
/// back off the append-only hub-events log (§4.8, C8). `event` is one of the
/// taxonomy names (`swap:validated`, `swap.build.start`, ...); `data` carries
/// a [`TxSummary`] only on the terminal `swap:summary` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubEvent {
    pub request_id: String,
    pub alias: String,
    pub event: String,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub data: Option<TxSummary>,
}

impl HubEvent {
    /// Builds the [`TransactionRow`] the terminal `swap:summary` event
    /// contributes to `service.transactions` (§4.8 step 6). Returns `None`
    /// for any other event, or a summary with no `txid`.
    pub fn to_transaction_row(&self) -> Option<TransactionRow> {
        if self.event != "swap:summary" {
            return None;
        }
        let summary = self.data.as_ref()?;
        let txid = summary.txid.clone()?;
        let status_category = match summary.status {
            TxSummaryStatus::Ok => StatusCategory::Confirmed,
            TxSummaryStatus::Failed | TxSummaryStatus::Timeout => StatusCategory::Failed,
            TxSummaryStatus::Unknown => StatusCategory::Processed,
        };
        let status_emoji = match status_category {
            StatusCategory::Confirmed => "\u{2705}".to_string(),
            StatusCategory::Failed => "\u{274c}".to_string(),
            StatusCategory::Processed => "\u{23f3}".to_string(),
        };
        Some(TransactionRow {
            txid,
            side: summary.side.unwrap_or(TxSide::Tx),
            mint: summary.mint.clone(),
            tokens: summary.tokens,
            sol: summary.sol,
            status_category,
            status_emoji,
            err_message: summary
                .err_message
                .clone()
                .or_else(|| summary.error_summary.clone()),
            coin: None,
            observed_at: self.ts,
            block_time_iso: summary.block_time_iso,
            slot: None,
            explorer_url: summary.explorer_url.clone(),
        })
    }

    /// `true` when this event's terminal summary (if any) reports a failure
    /// or timeout, used to decide whether to raise a service-level alert.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.data.as_ref().map(|s| s.status),
            Some(TxSummaryStatus::Failed) | Some(TxSummaryStatus::Timeout)
        )
    }
}

/// Folds an ordered sequence of [`HubEvent`]s into a per-step state, per the
/// taxonomy table and the `pending -> active -> done/failed` fold rule
/// (§4.8). A terminal `swap:summary` with `status='failed'` (or `'timeout'`)
/// forces `monitor -> failed`; `status='ok'` forces `monitor -> done`.
pub fn fold_progress_steps(events: &[HubEvent]) -> HashMap<ProgressStep, StepState> {
    let mut steps = HashMap::new();
    for step in [
        ProgressStep::Validate,
        ProgressStep::Secret,
        ProgressStep::Prepare,
        ProgressStep::Submit,
        ProgressStep::Monitor,
    ] {
        steps.insert(step, StepState::Pending);
    }

    for event in events {
        match event.event.as_str() {
            "swap:validated" => {
                steps.insert(ProgressStep::Validate, StepState::Done);
            }
            "swap:secret:resolved" => {
                steps.insert(ProgressStep::Secret, StepState::Done);
            }
            "swap:amount:resolve:start" | "swap:engine:start" | "swap.build.start" => {
                steps
                    .entry(ProgressStep::Prepare)
                    .and_modify(|s| *s = StepState::Active)
                    .or_insert(StepState::Active);
            }
            "swap:amount:resolve:done" => {
                steps.insert(ProgressStep::Prepare, StepState::Active);
            }
            "swap.build.done" => {
                steps.insert(ProgressStep::Prepare, StepState::Done);
            }
            "swap.send.start" | "swap.send.done" => {
                steps.insert(ProgressStep::Submit, StepState::Active);
            }
            "swap:submitted" => {
                steps.insert(ProgressStep::Submit, StepState::Done);
            }
            "swap:monitor:start" => {
                steps.insert(ProgressStep::Monitor, StepState::Active);
            }
            "swap:monitor:done" | "swap:monitor:detached" => {
                steps.insert(ProgressStep::Monitor, StepState::Done);
            }
            "swap:summary" => {
                if let Some(summary) = &event.data {
                    match summary.status {
                        TxSummaryStatus::Failed | TxSummaryStatus::Timeout => {
                            steps.insert(ProgressStep::Monitor, StepState::Failed);
                        }
                        TxSummaryStatus::Ok => {
                            steps.insert(ProgressStep::Monitor, StepState::Done);
                        }
                        TxSummaryStatus::Unknown => {}
                    }
                }
            }
            _ => {}
        }
    }

    steps
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletState {
    pub alias: String,
    pub pubkey: String,
    pub color: Option<String>,
    pub wallet_id: Option<i64>,
    pub start_sol_balance: Option<f64>,
    pub sol_balance: f64,
    pub sol_session_delta: f64,
    pub opened_at: DateTime<Utc>,
    pub last_activity_ts: DateTime<Utc>,
    pub start_token_balances: HashMap<String, f64>,
    pub tokens: Vec<TokenRow>,
    pub has_token22: Option<bool>,
    pub recent_events: Vec<RecentEvent>,
    pub pnl_by_mint: HashMap<String, PnlRow>,
}

pub const RECENT_EVENTS_CAP: usize = 5;

impl WalletState {
    pub fn new(spec: &WalletSpec) -> Self {
        let now = Utc::now();
        Self {
            alias: spec.alias.clone(),
            pubkey: spec.pubkey.clone(),
            color: spec.color.clone(),
            wallet_id: spec.wallet_id,
            start_sol_balance: None,
            sol_balance: 0.0,
            sol_session_delta: 0.0,
            opened_at: now,
            last_activity_ts: now,
            start_token_balances: HashMap::new(),
            tokens: Vec::new(),
            has_token22: None,
            recent_events: Vec::new(),
            pnl_by_mint: HashMap::new(),
        }
    }

    /// Sets the live SOL balance, seeding the session baseline on first sight
    /// and recomputing (never accumulating) `sol_session_delta` (§3 invariant,
    /// §8 testable property 9).
    pub fn set_sol_balance(&mut self, sol_balance: f64) {
        if self.start_sol_balance.is_none() {
            self.start_sol_balance = Some(sol_balance);
        }
        self.sol_balance = sol_balance;
        self.sol_session_delta = match self.start_sol_balance {
            Some(baseline) => sol_balance - baseline,
            None => 0.0,
        };
        self.last_activity_ts = Utc::now();
    }

    /// Seeds the sticky per-mint session baseline the first time a positive
    /// balance is observed for `mint` (§3 Lifecycle).
    pub fn seed_token_baseline(&mut self, mint: &str, ui_amount: f64) {
        if ui_amount > 0.0 {
            self.start_token_balances
                .entry(mint.to_string())
                .or_insert(ui_amount);
        }
    }

    /// Prepends a recent-event entry, truncating from the tail at the cap
    /// (§3 invariant, §8 testable property 2).
    pub fn push_recent_event(&mut self, summary: impl Into<String>) {
        self.recent_events.insert(
            0,
            RecentEvent {
                ts: Utc::now(),
                summary: summary.into(),
            },
        );
        self.recent_events.truncate(RECENT_EVENTS_CAP);
        self.last_activity_ts = Utc::now();
    }

    /// Re-sorts `tokens` so stable-tagged mints sort first, preserving
    /// relative order within each group (§3 invariant).
    pub fn sort_tokens(&mut self, is_stable: impl Fn(&str) -> bool) {
        self.tokens
            .sort_by_key(|t| if is_stable(&t.mint) { 0 } else { 1 });
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum SubscriptionKind {
    Slot,
    Account,
    Logs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SupervisorState {
    Inactive,
    Subscribing,
    Active,
    Backoff,
}

/// Per-subscription-kind reconnect supervisor surface (§9 resolved open
/// question, §10.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsSupervisorEntry {
    pub state: SupervisorState,
    pub attempt: u32,
    pub next_retry_at_ms: Option<i64>,
}

impl Default for WsSupervisorEntry {
    fn default() -> Self {
        Self {
            state: SupervisorState::Inactive,
            attempt: 0,
            next_retry_at_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub ts: DateTime<Utc>,
    pub level: AlertLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warn,
    Error,
}

pub const ALERTS_CAP: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HealthSnapshot {
    pub uptime_sec: u64,
    pub rss_bytes: Option<u64>,
    pub load_avg_1m: Option<f64>,
    pub event_loop_lag_ms: u64,
    pub last_sol_ms: Option<i64>,
    pub last_token_ms: Option<i64>,
    pub last_data_api_ms: Option<i64>,
    pub ws_slot: Option<u64>,
    pub ws_root: Option<u64>,
    pub ws_last_slot_age_ms: Option<i64>,
    pub wallet_count: usize,
    pub wallet_stale_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Service-level metadata riding alongside wallet state in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServiceSection {
    pub alerts: Vec<Alert>,
    pub health: HealthSnapshot,
    pub ws_supervisor: HashMap<String, WsSupervisorEntry>,
    pub transactions: Vec<TransactionRow>,
}

impl ServiceSection {
    pub fn push_alert(&mut self, level: AlertLevel, message: impl Into<String>) {
        self.alerts.insert(
            0,
            Alert {
                ts: Utc::now(),
                level,
                message: message.into(),
            },
        );
        self.alerts.truncate(ALERTS_CAP);
    }

    /// Inserts or merges a transaction row by `txid` (§4.8.6, §8 property 3),
    /// keeping the list sorted newest-first and bounded at `cap`.
    pub fn upsert_transaction(&mut self, row: TransactionRow, cap: usize) {
        if let Some(existing) = self.transactions.iter_mut().find(|t| t.txid == row.txid) {
            *existing = existing.merge_from(&row);
        } else {
            self.transactions.push(row);
        }
        self.transactions
            .sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        self.transactions.truncate(cap);
    }
}

/// Top-level HUD snapshot (SPEC_FULL.md §3, §4.5). `state` is keyed by alias
/// and is fixed at startup: no aliases are ever inserted after init.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HudSnapshot {
    pub state: HashMap<String, WalletState>,
    pub service: ServiceSection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(alias: &str) -> WalletSpec {
        WalletSpec {
            alias: alias.to_string(),
            pubkey: "Abc123".to_string(),
            color: None,
            wallet_id: Some(1),
        }
    }

    #[test]
    fn session_delta_is_recomputed_not_accumulated() {
        let mut wallet = WalletState::new(&spec("alpha"));
        wallet.set_sol_balance(10.0);
        assert_eq!(wallet.sol_session_delta, 0.0);
        wallet.set_sol_balance(12.5);
        assert_eq!(wallet.sol_session_delta, 2.5);
        wallet.set_sol_balance(9.0);
        assert_eq!(wallet.sol_session_delta, -1.0);
    }

    #[test]
    fn recent_events_are_capped_and_newest_first() {
        let mut wallet = WalletState::new(&spec("alpha"));
        for i in 0..8 {
            wallet.push_recent_event(format!("event-{i}"));
        }
        assert_eq!(wallet.recent_events.len(), RECENT_EVENTS_CAP);
        assert_eq!(wallet.recent_events[0].summary, "event-7");
        assert_eq!(wallet.recent_events[4].summary, "event-3");
    }

    #[test]
    fn token_baseline_is_sticky() {
        let mut wallet = WalletState::new(&spec("alpha"));
        wallet.seed_token_baseline("mintA", 100.0);
        wallet.seed_token_baseline("mintA", 5.0);
        assert_eq!(wallet.start_token_balances["mintA"], 100.0);
    }

    #[test]
    fn zero_balance_never_seeds_baseline() {
        let mut wallet = WalletState::new(&spec("alpha"));
        wallet.seed_token_baseline("mintA", 0.0);
        assert!(!wallet.start_token_balances.contains_key("mintA"));
    }

    #[test]
    fn transaction_upsert_merges_by_txid_preferring_newer_non_null() {
        let mut svc = ServiceSection::default();
        let base = TransactionRow {
            txid: "sig1".into(),
            side: TxSide::Buy,
            mint: Some("mintA".into()),
            tokens: Some(10.0),
            sol: Some(1.0),
            status_category: StatusCategory::Processed,
            status_emoji: "\u{23F3}".into(),
            err_message: None,
            coin: None,
            observed_at: Utc::now(),
            block_time_iso: None,
            slot: None,
            explorer_url: None,
        };
        svc.upsert_transaction(base.clone(), 10);

        let mut confirmed = base.clone();
        confirmed.status_category = StatusCategory::Confirmed;
        confirmed.status_emoji = "\u{2705}".into();
        confirmed.slot = Some(42);
        svc.upsert_transaction(confirmed, 10);

        assert_eq!(svc.transactions.len(), 1);
        let row = &svc.transactions[0];
        assert_eq!(row.status_category, StatusCategory::Confirmed);
        assert_eq!(row.slot, Some(42));
        assert_eq!(row.tokens, Some(10.0)); // preserved from the original event
    }

    #[test]
    fn transactions_cap_is_enforced() {
        let mut svc = ServiceSection::default();
        for i in 0..15 {
            svc.upsert_transaction(
                TransactionRow {
                    txid: format!("sig{i}"),
                    side: TxSide::Tx,
                    mint: None,
                    tokens: None,
                    sol: None,
                    status_category: StatusCategory::Processed,
                    status_emoji: String::new(),
                    err_message: None,
                    coin: None,
                    observed_at: Utc::now(),
                    block_time_iso: None,
                    slot: None,
                    explorer_url: None,
                },
                10,
            );
        }
        assert_eq!(svc.transactions.len(), 10);
    }

    #[test]
    fn finite_or_none_scrubs_nan_and_inf() {
        assert_eq!(finite_or_none(1.5), Some(1.5));
        assert_eq!(finite_or_none(f64::NAN), None);
        assert_eq!(finite_or_none(f64::INFINITY), None);
    }

    fn progress_event(name: &str) -> HubEvent {
        HubEvent {
            request_id: "req1".to_string(),
            alias: "alpha".to_string(),
            event: name.to_string(),
            ts: Utc::now(),
            data: None,
        }
    }

    fn terminal_summary(status: TxSummaryStatus) -> HubEvent {
        HubEvent {
            request_id: "req1".to_string(),
            alias: "alpha".to_string(),
            event: "swap:summary".to_string(),
            ts: Utc::now(),
            data: Some(TxSummary {
                kind: "swap".to_string(),
                status,
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
        }
    }

    #[test]
    fn fold_progress_steps_walks_the_full_taxonomy_to_done() {
        let events = vec![
            progress_event("swap:validated"),
            progress_event("swap:secret:resolved"),
            progress_event("swap:amount:resolve:start"),
            progress_event("swap:amount:resolve:done"),
            progress_event("swap:engine:start"),
            progress_event("swap.build.start"),
            progress_event("swap.build.done"),
            progress_event("swap.send.start"),
            progress_event("swap.send.done"),
            progress_event("swap:submitted"),
            progress_event("swap:monitor:start"),
            progress_event("swap:monitor:done"),
            terminal_summary(TxSummaryStatus::Ok),
        ];
        let steps = fold_progress_steps(&events);
        assert_eq!(steps[&ProgressStep::Validate], StepState::Done);
        assert_eq!(steps[&ProgressStep::Secret], StepState::Done);
        assert_eq!(steps[&ProgressStep::Prepare], StepState::Done);
        assert_eq!(steps[&ProgressStep::Submit], StepState::Done);
        assert_eq!(steps[&ProgressStep::Monitor], StepState::Done);
    }

    #[test]
    fn a_failed_terminal_summary_forces_monitor_to_failed() {
        let events = vec![progress_event("swap:monitor:start"), terminal_summary(TxSummaryStatus::Failed)];
        let steps = fold_progress_steps(&events);
        assert_eq!(steps[&ProgressStep::Monitor], StepState::Failed);
    }

    #[test]
    fn steps_not_yet_reached_stay_pending() {
        let events = vec![progress_event("swap:validated")];
        let steps = fold_progress_steps(&events);
        assert_eq!(steps[&ProgressStep::Validate], StepState::Done);
        assert_eq!(steps[&ProgressStep::Secret], StepState::Pending);
        assert_eq!(steps[&ProgressStep::Monitor], StepState::Pending);
    }

    #[test]
    fn to_transaction_row_ignores_non_summary_events() {
        assert!(progress_event("swap:monitor:start").to_transaction_row().is_none());
    }

    #[test]
    fn to_transaction_row_builds_a_row_from_a_terminal_summary() {
        let event = terminal_summary(TxSummaryStatus::Ok);
        let row = event.to_transaction_row().unwrap();
        assert_eq!(row.txid, "sig1");
        assert_eq!(row.status_category, StatusCategory::Confirmed);
    }
}
