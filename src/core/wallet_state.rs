use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Per-mint fields that may be supplied by a [`WalletState::update_token`] call.
/// `None` fields leave the existing value (if any) untouched.
#[derive(Debug, Clone, Default)]
pub struct TokenStateUpdate {
    pub amount: Option<f64>,
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub price_usd: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenStateEntry {
    pub amount: Option<f64>,
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub price_usd: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct WalletEntry {
    sol_lamports: Option<u64>,
    sol_last_updated_ms: Option<i64>,
    last_activity_ms: Option<i64>,
    tokens: HashMap<String, TokenStateEntry>,
}

/// Read-only view of a single wallet's live state.
#[derive(Debug, Clone, Default)]
pub struct WalletStateView {
    pub sol_lamports: Option<u64>,
    pub sol_last_updated_ms: Option<i64>,
    pub last_activity_ms: Option<i64>,
    pub tokens: HashMap<String, TokenStateEntry>,
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, WalletEntry>,
}

/// Process-wide, per-pubkey live wallet state (SPEC_FULL.md §4.1).
pub struct WalletState {
    inner: RwLock<Inner>,
}

static GLOBAL: Lazy<WalletState> = Lazy::new(WalletState::new);

impl WalletState {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn global() -> &'static WalletState {
        &GLOBAL
    }

    /// Stores the latest lamport balance for `pubkey`. Non-finite values (there
    /// is no such thing as non-finite lamports, but a defensive NaN-from-f64
    /// cast is still possible upstream) are silently ignored.
    pub fn update_sol(&self, pubkey: &str, lamports: u64) {
        let now = now_ms();
        let mut guard = self.inner.write().expect("wallet state lock poisoned");
        let entry = guard.wallets.entry(pubkey.to_string()).or_default();
        entry.sol_lamports = Some(lamports);
        entry.sol_last_updated_ms = Some(now);
        entry.last_activity_ms = Some(now);
    }

    pub fn update_token(&self, pubkey: &str, mint: &str, update: TokenStateUpdate) {
        let mut guard = self.inner.write().expect("wallet state lock poisoned");
        let wallet = guard.wallets.entry(pubkey.to_string()).or_default();
        let token = wallet.tokens.entry(mint.to_string()).or_default();
        if let Some(amount) = update.amount {
            if amount.is_finite() {
                token.amount = Some(amount);
            }
        }
        if let Some(decimals) = update.decimals {
            token.decimals = Some(decimals);
        }
        if let Some(symbol) = update.symbol {
            token.symbol = Some(symbol);
        }
        if let Some(price_usd) = update.price_usd {
            if price_usd.is_finite() {
                token.price_usd = Some(price_usd);
            }
        }
    }

    pub fn touch_activity(&self, pubkey: &str) {
        let mut guard = self.inner.write().expect("wallet state lock poisoned");
        guard.wallets.entry(pubkey.to_string()).or_default().last_activity_ms = Some(now_ms());
    }

    pub fn get(&self, pubkey: &str) -> WalletStateView {
        let guard = self.inner.read().expect("wallet state lock poisoned");
        match guard.wallets.get(pubkey) {
            Some(entry) => WalletStateView {
                sol_lamports: entry.sol_lamports,
                sol_last_updated_ms: entry.sol_last_updated_ms,
                last_activity_ms: entry.last_activity_ms,
                tokens: entry.tokens.clone(),
            },
            None => WalletStateView::default(),
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
