/// Service lifecycle: startup sequence, periodic refresh timers, health
/// reporting, and graceful shutdown (SPEC_FULL.md §4.10, §4.11, C7).
///
/// Shaped after the teacher's `SystemOrchestrator` (`src/handlers/mod.rs`):
/// an `init`/`start`/`shutdown` lifecycle, components brought up in
/// dependency order, and a single status line summarizing the running
/// system.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::Config;
use crate::core::{ChainState, SlotEvent};
use crate::db::OperationalDb;
use crate::errors::{WarchestError, WarchestResult};
use crate::health::{compute_health, is_stale, HealthInputs};
use crate::hud::{HudSnapshot, HudStore, WalletSpec, WalletState};
use crate::hub::{apply_hub_event_to_state, tail_new_hub_events, SingleFlightLock};
use crate::hud::{SubscriptionKind, SupervisorState, WsSupervisorEntry};
use crate::pricing::PricingClient;
use crate::rpc::{
    run_account_subscription, run_logs_subscription, run_slot_subscription, PubsubEvent, RpcApi,
    SolanaRpcClient, SupervisorObserver,
};
use crate::scheduler::RefreshScheduler;
use crate::wallet_manager::WalletManager;

/// Writes reconnect-supervisor state changes into the HUD store's
/// `service.ws_supervisor` map, keyed by subscription kind and, for
/// per-wallet subscriptions, alias (SPEC_FULL.md §9, §10.5).
struct StoreSupervisorObserver {
    store: Arc<HudStore>,
    key: String,
}

impl StoreSupervisorObserver {
    fn new(store: Arc<HudStore>, kind: SubscriptionKind, alias: Option<&str>) -> Self {
        let kind_label = match kind {
            SubscriptionKind::Slot => "slot",
            SubscriptionKind::Account => "account",
            SubscriptionKind::Logs => "logs",
        };
        let key = match alias {
            Some(alias) => format!("{kind_label}:{alias}"),
            None => kind_label.to_string(),
        };
        Self { store, key }
    }
}

impl SupervisorObserver for StoreSupervisorObserver {
    fn on_state_change(&self, state: SupervisorState, attempt: u32) {
        let key = self.key.clone();
        let next_retry_at_ms = match state {
            SupervisorState::Backoff => Some(
                chrono::Utc::now().timestamp_millis()
                    + crate::rpc::BackoffPolicy::default().ceiling(attempt).as_millis() as i64,
            ),
            _ => None,
        };
        self.store.mutate(move |snapshot| {
            snapshot.service.ws_supervisor.insert(
                key,
                WsSupervisorEntry {
                    state,
                    attempt,
                    next_retry_at_ms,
                },
            );
        });
    }
}

/// Tracks the wall-clock millis of the most recent successful fetch on each
/// channel, feeding `health.rs`'s staleness computation.
#[derive(Default)]
struct LastSeen {
    sol: AtomicI64,
    token: AtomicI64,
    data_api: AtomicI64,
}

impl LastSeen {
    fn mark(counter: &AtomicI64) {
        counter.store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn get(counter: &AtomicI64) -> Option<i64> {
        let v = counter.load(Ordering::Relaxed);
        if v == 0 {
            None
        } else {
            Some(v)
        }
    }
}

pub struct Service {
    config: Config,
    store: Arc<HudStore>,
    db: Arc<OperationalDb>,
    wallet_manager: Arc<WalletManager>,
    scheduler: Arc<RefreshScheduler>,
    hub_lock: Arc<SingleFlightLock>,
    started_at: Instant,
    last_seen: Arc<LastSeen>,
    aliases: Vec<String>,
    wallet_pubkeys: HashMap<String, String>,
    daemon_mode: bool,
}

impl Service {
    /// Brings every collaborator up in dependency order: database, then
    /// registry resolution, then the initial snapshot, then the RPC client
    /// (§4.10 step-by-step startup sequence).
    pub async fn init(config: Config, args: CliArgs) -> WarchestResult<Self> {
        info!("initializing warchest hud service");

        if args.wallets.is_empty() {
            return Err(WarchestError::invalid_argument(
                "at least one --wallet must be provided",
            ));
        }

        // Absence of --hud/-hud selects daemon mode (§6).
        let daemon_mode = !args.hud;

        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| WarchestError::fatal(format!("failed to create data dir: {e}")))?;

        let db_url = format!("sqlite://{}/warchest.db?mode=rwc", config.data_dir.display());
        let db = Arc::new(OperationalDb::connect(&db_url).await?);

        let mut wallet_specs = Vec::with_capacity(args.wallets.len());
        for mut spec in args.wallets {
            // A registry conflict skips only this wallet rather than aborting
            // startup (§4.7 step 3: never mis-attribute, never abort on a
            // single bad spec when other wallets are still resolvable).
            match db.resolve_wallet_registry(&spec.alias, &spec.pubkey).await {
                Ok(wallet_id) => {
                    spec.wallet_id = Some(wallet_id);
                    wallet_specs.push(spec);
                }
                Err(e) => {
                    error!(alias = %spec.alias, error = %e, "skipping wallet with a registry conflict");
                }
            }
        }

        if wallet_specs.is_empty() {
            return Err(WarchestError::fatal(
                "no wallets resolved against the registry",
            ));
        }

        let mut state = HashMap::with_capacity(wallet_specs.len());
        let aliases: Vec<String> = wallet_specs.iter().map(|s| s.alias.clone()).collect();
        for spec in &wallet_specs {
            state.insert(spec.alias.clone(), WalletState::new(spec));
        }

        let store = Arc::new(HudStore::new(HudSnapshot {
            state,
            service: Default::default(),
        }));

        let rpc_url = config
            .rpc_http_url
            .clone()
            .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());
        let rpc: Arc<dyn RpcApi + Send + Sync> = Arc::new(SolanaRpcClient::new(rpc_url));
        let pricing = Arc::new(PricingClient::new(
            config
                .data_endpoint
                .clone()
                .unwrap_or_else(|| "https://data.solanatracker.io".to_string()),
        ));

        let last_seen = Arc::new(LastSeen::default());
        let wallet_manager = Arc::new(WalletManager::new(
            Arc::clone(&store),
            Arc::clone(&rpc),
            Arc::clone(&pricing),
            Arc::clone(&db),
            config.stable_mints.clone(),
        ));

        let manager_for_refresh = Arc::clone(&wallet_manager);
        let wallet_specs_by_alias: HashMap<String, String> = wallet_specs
            .iter()
            .map(|s| (s.alias.clone(), s.pubkey.clone()))
            .collect();
        let wallet_pubkeys = wallet_specs_by_alias.clone();
        let last_seen_for_refresh = Arc::clone(&last_seen);
        let scheduler = RefreshScheduler::new(config.log_refresh_debounce, move |alias| {
            let manager = Arc::clone(&manager_for_refresh);
            let pubkey = wallet_specs_by_alias.get(&alias).cloned();
            let last_seen = Arc::clone(&last_seen_for_refresh);
            Box::pin(async move {
                let Some(pubkey) = pubkey else { return };
                match manager.refresh_wallet(&alias, &pubkey).await {
                    Ok(()) => {
                        LastSeen::mark(&last_seen.sol);
                        LastSeen::mark(&last_seen.token);
                    }
                    Err(e) => warn!(alias, error = %e, "wallet refresh failed"),
                }
            })
        });

        Ok(Self {
            config,
            store,
            db,
            wallet_manager,
            scheduler,
            hub_lock: Arc::new(SingleFlightLock::new()),
            started_at: Instant::now(),
            last_seen,
            aliases,
            wallet_pubkeys,
            daemon_mode,
        })
    }

    pub fn store(&self) -> Arc<HudStore> {
        Arc::clone(&self.store)
    }

    pub fn hub_lock(&self) -> Arc<SingleFlightLock> {
        Arc::clone(&self.hub_lock)
    }

    /// Starts the background work: chain-state subscription, periodic
    /// refresh timers, and health reporting. Runs until the process receives
    /// a shutdown signal (§4.10).
    pub async fn run(self) -> WarchestResult<()> {
        write_pid_file(&self.config).await?;

        for alias in &self.aliases {
            self.scheduler.request_refresh(alias).await;
        }

        let ws_url = self
            .config
            .rpc_ws_url
            .clone()
            .unwrap_or_else(|| "wss://api.mainnet-beta.solana.com".to_string());
        let (slot_tx, mut slot_rx) = mpsc::channel(64);
        let observer = StoreSupervisorObserver::new(Arc::clone(&self.store), SubscriptionKind::Slot, None);
        let slot_task = tokio::spawn(async move {
            run_slot_subscription(ws_url, slot_tx, &observer).await;
        });

        let slot_consumer = tokio::spawn(async move {
            while let Some(event) = slot_rx.recv().await {
                if let PubsubEvent::Slot { slot, parent, root } = event {
                    ChainState::global().update_from_slot_event(SlotEvent {
                        slot: Some(slot),
                        parent: Some(parent),
                        root: Some(root),
                    });
                }
            }
        });

        let mut per_wallet_tasks = Vec::new();
        for alias in &self.aliases {
            let Some(pubkey) = self.wallet_pubkeys.get(alias).cloned() else {
                continue;
            };
            per_wallet_tasks.extend(self.spawn_wallet_subscriptions(alias.clone(), pubkey));
        }

        let sol_timer = self.spawn_refresh_timer(self.config.sol_refresh);
        let tokens_timer = self.spawn_refresh_timer(self.config.tokens_refresh);
        let health_timer = self.spawn_health_timer();
        let hub_tail_timer = self.spawn_hub_tail_timer();

        info!(aliases = ?self.aliases, "warchest hud service running");

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| WarchestError::fatal(format!("failed to listen for ctrl-c: {e}")))?;

        info!("shutdown signal received, stopping");
        slot_task.abort();
        slot_consumer.abort();
        sol_timer.abort();
        tokens_timer.abort();
        health_timer.abort();
        hub_tail_timer.abort();
        for task in per_wallet_tasks {
            task.abort();
        }
        remove_pid_file(&self.config).await;
        Ok(())
    }

    /// Opens the per-wallet account and logs subscriptions named in §4.7
    /// step 7: one `accountSubscribe` for live lamports and one
    /// `logsSubscribe` (mentions filter) feeding `WalletManager`. Each gets
    /// its own reconnect supervisor and its own forwarding task so a stall on
    /// one wallet's stream never blocks another's.
    fn spawn_wallet_subscriptions(
        &self,
        alias: String,
        pubkey: String,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let ws_url = self
            .config
            .rpc_ws_url
            .clone()
            .unwrap_or_else(|| "wss://api.mainnet-beta.solana.com".to_string());

        let (account_tx, mut account_rx) = mpsc::channel(32);
        let account_ws_url = ws_url.clone();
        let account_pubkey = pubkey.clone();
        let account_observer_alias = alias.clone();
        let account_store = Arc::clone(&self.store);
        let account_task = tokio::spawn(async move {
            let observer = StoreSupervisorObserver::new(
                account_store,
                SubscriptionKind::Account,
                Some(&account_observer_alias),
            );
            run_account_subscription(account_ws_url, account_pubkey, account_tx, &observer).await;
        });

        let manager = Arc::clone(&self.wallet_manager);
        let scheduler = Arc::clone(&self.scheduler);
        let account_alias = alias.clone();
        let account_consumer = tokio::spawn(async move {
            while let Some(event) = account_rx.recv().await {
                if let PubsubEvent::Account { .. } = event {
                    manager
                        .on_account_notification(&scheduler, &account_alias)
                        .await;
                }
            }
        });

        let (logs_tx, mut logs_rx) = mpsc::channel(32);
        let logs_ws_url = ws_url;
        let logs_pubkey = pubkey;
        let logs_observer_alias = alias.clone();
        let logs_store = Arc::clone(&self.store);
        let logs_task = tokio::spawn(async move {
            let observer = StoreSupervisorObserver::new(
                logs_store,
                SubscriptionKind::Logs,
                Some(&logs_observer_alias),
            );
            run_logs_subscription(logs_ws_url, logs_pubkey, logs_tx, &observer).await;
        });

        let manager = Arc::clone(&self.wallet_manager);
        let scheduler = Arc::clone(&self.scheduler);
        let logs_alias = alias;
        let logs_consumer = tokio::spawn(async move {
            while let Some(event) = logs_rx.recv().await {
                if let PubsubEvent::Logs { signature, err } = event {
                    manager
                        .on_log_notification(&scheduler, &logs_alias, &signature, err.as_deref())
                        .await;
                }
            }
        });

        vec![account_task, account_consumer, logs_task, logs_consumer]
    }

    fn spawn_refresh_timer(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let aliases = self.aliases.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for alias in &aliases {
                    scheduler.request_refresh(alias).await;
                }
            }
        })
    }

    /// Polls the hub-events log for lines appended by a detached worker
    /// process and folds each one onto the store (§4.8 step 6). The worker
    /// itself never touches `HudStore` directly: it only appends JSON lines,
    /// so this process stays the sole writer of shared state.
    fn spawn_hub_tail_timer(&self) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let path = self.config.hub_events_log.clone();
        let tx_cap = self.config.hud_max_tx;
        tokio::spawn(async move {
            let mut offset: u64 = 0;
            let mut ticker = tokio::time::interval(Duration::from_secs(2));
            loop {
                ticker.tick().await;
                match tail_new_hub_events(&path, offset).await {
                    Ok((events, new_offset)) => {
                        offset = new_offset;
                        for event in &events {
                            apply_hub_event_to_state(&store, event, tx_cap);
                        }
                    }
                    Err(e) => warn!(error = %e, "hub events tail failed"),
                }
            }
        })
    }

    fn spawn_health_timer(&self) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let interval = self.config.health_refresh;
        let started_at = self.started_at;
        let last_seen = Arc::clone(&self.last_seen);
        let status_file = self.config.status_file();
        let aliases = self.aliases.clone();
        let daemon_mode = self.daemon_mode;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let chain = ChainState::global().get();
                let now_ms = chrono::Utc::now().timestamp_millis();
                let snapshot_now = store.get_snapshot();
                let wallet_stale_count = snapshot_now
                    .state
                    .values()
                    .filter(|w| is_stale(w.last_activity_ts.timestamp_millis(), now_ms))
                    .count();
                let inputs = HealthInputs {
                    last_sol_ms: LastSeen::get(&last_seen.sol),
                    last_token_ms: LastSeen::get(&last_seen.token),
                    last_data_api_ms: LastSeen::get(&last_seen.data_api),
                    wallet_count: aliases.len(),
                    wallet_stale_count,
                };
                let health = compute_health(chain, started_at.elapsed().as_secs(), inputs);
                store.mutate(|snapshot| {
                    snapshot.service.health = health.clone();
                });
                if daemon_mode {
                    if let Err(e) = write_status_file(&status_file, &health).await {
                        error!(error = %e, "failed to write status file");
                    }
                }
            }
        })
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PidFile {
    pid: u32,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Writes `{pid, startedAt}` at mode 0644 (§6); present iff the service is
/// running, removed on graceful exit.
async fn write_pid_file(config: &Config) -> WarchestResult<()> {
    let body = PidFile {
        pid: std::process::id(),
        started_at: chrono::Utc::now(),
    };
    let json = serde_json::to_vec(&body)
        .map_err(|e| WarchestError::integrity(format!("pid file serialization failed: {e}")))?;
    let path = config.pid_file();
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| WarchestError::fatal(format!("failed to write pid file: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .await
            .map_err(|e| WarchestError::fatal(format!("failed to set pid file mode: {e}")))?;
    }
    Ok(())
}

async fn remove_pid_file(config: &Config) {
    if let Err(e) = tokio::fs::remove_file(config.pid_file()).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove pid file on shutdown");
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusFile {
    updated_at: chrono::DateTime<chrono::Utc>,
    health: crate::hud::HealthSnapshot,
}

/// Writes the minimal `{updatedAt, health}` status document (§4.7, §6),
/// written every health tick while in daemon mode only.
async fn write_status_file(
    path: &std::path::Path,
    health: &crate::hud::HealthSnapshot,
) -> WarchestResult<()> {
    let body = StatusFile {
        updated_at: chrono::Utc::now(),
        health: health.clone(),
    };
    let json = serde_json::to_vec_pretty(&body)
        .map_err(|e| WarchestError::integrity(format!("status serialization failed: {e}")))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| WarchestError::unavailable(format!("writing status file failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_file_round_trips_updated_at_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let health = crate::hud::HealthSnapshot::default();
        write_status_file(&path, &health).await.unwrap();
        let body = tokio::fs::read(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed.get("updatedAt").is_some());
        assert!(parsed.get("health").is_some());
    }

    #[tokio::test]
    async fn pid_file_is_written_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        write_pid_file(&config).await.unwrap();
        let body = tokio::fs::read_to_string(config.pid_file()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["pid"].as_u64().unwrap() as u32, std::process::id());
        assert!(parsed.get("startedAt").is_some());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = tokio::fs::metadata(config.pid_file()).await.unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o644);
        }
        remove_pid_file(&config).await;
        assert!(!config.pid_file().exists());
    }
}
