/// Environment-driven configuration for the warchest HUD service.
///
/// Mirrors the environment surface in SPEC_FULL.md §6 and the ambient-config
/// conventions described in §10.3: every override is read once at startup,
/// malformed numeric values fall back to the default (logged as a warning)
/// rather than aborting the process, and argv (`--wallet`, `--hud`) is parsed
/// independently by `cli` since it is a separate surface from the environment.
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default set of USD-pegged mints that sort first in token tables (GLOSSARY: Stable mint).
pub const DEFAULT_STABLE_MINTS: &[&str] = &[
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", // USDC
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", // USDT
    "USD1ttGY1N17NEEHLmELoaybftRBUSErhqYiQzvEmuB",  // USD1
];

#[derive(Debug, Clone)]
pub struct Config {
    pub sol_refresh: Duration,
    pub tokens_refresh: Duration,
    pub health_refresh: Duration,
    pub log_refresh_debounce: Duration,
    pub log_level: String,
    pub rpc_http_url: Option<String>,
    pub rpc_ws_url: Option<String>,
    pub data_endpoint: Option<String>,
    pub node_env: Option<String>,
    pub data_dir: PathBuf,
    pub hub_events_log: PathBuf,
    pub stable_mints: Vec<String>,
    pub hud_max_tx: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data/warchest");
        Self {
            sol_refresh: Duration::from_secs(15),
            tokens_refresh: Duration::from_secs(30),
            health_refresh: Duration::from_secs(5),
            log_refresh_debounce: Duration::from_millis(5),
            log_level: "info".to_string(),
            rpc_http_url: None,
            rpc_ws_url: None,
            data_endpoint: None,
            node_env: None,
            hub_events_log: data_dir.join("hub-events.log"),
            data_dir,
            stable_mints: DEFAULT_STABLE_MINTS.iter().map(|s| s.to_string()).collect(),
            hud_max_tx: 10,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to defaults
    /// for anything absent or malformed.
    pub fn load() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("WARCHEST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let hub_events_log = std::env::var("WARCHEST_HUB_EVENTS_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("hub-events.log"));

        let mut stable_mints = defaults.stable_mints.clone();
        if let Ok(extra) = std::env::var("WARCHEST_STABLE_MINTS") {
            for mint in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                stable_mints.push(mint.to_string());
            }
        }

        Self {
            sol_refresh: env_secs("HUD_SOL_REFRESH_SEC", defaults.sol_refresh),
            tokens_refresh: env_secs("HUD_TOKENS_REFRESH_SEC", defaults.tokens_refresh),
            health_refresh: defaults.health_refresh,
            log_refresh_debounce: env_millis(
                "WARCHEST_LOG_REFRESH_DEBOUNCE_MS",
                defaults.log_refresh_debounce,
            ),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            rpc_http_url: env_url("SOLANATRACKER_RPC_HTTP_URL"),
            rpc_ws_url: env_url("SOLANATRACKER_RPC_WS_URL"),
            data_endpoint: env_url("SOLANATRACKER_DATA_ENDPOINT"),
            node_env: std::env::var("NODE_ENV").ok(),
            hud_max_tx: env_usize("WARCHEST_HUD_MAX_TX", defaults.hud_max_tx),
            data_dir,
            hub_events_log,
            stable_mints,
        }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("warchest.pid")
    }

    pub fn status_file(&self) -> PathBuf {
        self.data_dir.join("status.json")
    }

    pub fn tx_monitor_request_dir(&self) -> PathBuf {
        self.data_dir.join("tx-monitor-requests")
    }

    pub fn is_stable_mint(&self, mint: &str) -> bool {
        self.stable_mints.iter().any(|m| m == mint)
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(name, raw, "malformed duration override, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(name, raw, "malformed duration override, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Reads an endpoint override, discarding it if it does not parse as a URL
/// rather than handing a malformed string down to the RPC/HTTP clients.
fn env_url(name: &str) -> Option<String> {
    let raw = std::env::var(name).ok()?;
    match url::Url::parse(&raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            warn!(name, raw, error = %e, "malformed url override, ignoring");
            None
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                warn!(name, raw, "malformed integer override, using default");
                default
            }
        },
        Err(_) => default,
    }
}
