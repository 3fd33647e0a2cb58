/// Wallet manager: couples live-account notifications to the refresh
/// scheduler and folds fetched chain data back into the HUD store
/// (SPEC_FULL.md §4.9, C9).
///
/// Shaped after the teacher's `WalletHandler` (`src/handlers/wallet_handler.rs`):
/// a thin struct wrapping shared collaborators behind `Arc`, with async
/// methods that acquire only the lock they need and release it before
/// touching anything else.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::db::OperationalDb;
use crate::errors::WarchestResult;
use crate::hud::{HudStore, TokenRow};
use crate::pagination::fetch_all_token_accounts;
use crate::pricing::PricingClient;
use crate::rpc::RpcApi;
use crate::scheduler::RefreshScheduler;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

pub struct WalletManager {
    store: Arc<HudStore>,
    rpc: Arc<dyn RpcApi + Send + Sync>,
    pricing: Arc<PricingClient>,
    db: Arc<OperationalDb>,
    stable_mints: Vec<String>,
}

impl WalletManager {
    pub fn new(
        store: Arc<HudStore>,
        rpc: Arc<dyn RpcApi + Send + Sync>,
        pricing: Arc<PricingClient>,
        db: Arc<OperationalDb>,
        stable_mints: Vec<String>,
    ) -> Self {
        Self {
            store,
            rpc,
            pricing,
            db,
            stable_mints,
        }
    }

    /// A `logsNotification` arrived for `alias`'s pubkey: push a recent-event
    /// line immediately (so the HUD feels live even before the refresh lands)
    /// and request a debounced refresh via `scheduler` (kept as a caller-
    /// supplied parameter rather than a stored field, since the scheduler's
    /// own refresh closure is what constructs this manager in the first
    /// place; see `service::Service::init`).
    pub async fn on_log_notification(
        &self,
        scheduler: &RefreshScheduler,
        alias: &str,
        signature: &str,
        err: Option<&str>,
    ) {
        let summary = match err {
            Some(e) => format!("tx {signature} failed: {e}"),
            None => format!("tx {signature} observed"),
        };
        let alias_owned = alias.to_string();
        self.store.mutate(move |snapshot| {
            if let Some(wallet) = snapshot.state.get_mut(&alias_owned) {
                wallet.push_recent_event(summary);
            }
        });
        scheduler.request_refresh(alias).await;
    }

    /// An `accountNotification` arrived for `alias`'s owner account: the
    /// notification payload itself is not trusted as ground truth (§4.9),
    /// it only triggers a debounced re-fetch.
    pub async fn on_account_notification(&self, scheduler: &RefreshScheduler, alias: &str) {
        scheduler.request_refresh(alias).await;
    }

    /// Fetches the current SOL balance and full token inventory for `pubkey`
    /// and folds it into the store entry for `alias`.
    pub async fn refresh_wallet(&self, alias: &str, pubkey: &str) -> WarchestResult<()> {
        let lamports = self.rpc.get_sol_balance_lamports(pubkey).await?;
        let sol_balance = lamports as f64 / LAMPORTS_PER_SOL;

        let token_accounts = fetch_all_token_accounts(self.rpc.as_ref(), pubkey).await?;
        if token_accounts.truncated {
            warn!(alias, "token account fetch truncated at the page cap");
        }

        let mints: Vec<String> = token_accounts
            .accounts
            .iter()
            .map(|a| a.mint.clone())
            .collect();
        let market_data = self.pricing.fetch_batch(&mints).await.unwrap_or_default();

        // Metadata/market lookups happen here, outside the store's write lock,
        // so the mutate closure below only ever touches plain owned data.
        let symbols: HashMap<String, Option<String>> = mints
            .iter()
            .map(|mint| {
                let symbol = self
                    .pricing
                    .cached_metadata(mint)
                    .and_then(|meta| meta.symbol.clone());
                (mint.clone(), symbol)
            })
            .collect();

        let stable_mints = self.stable_mints.clone();
        let alias_owned = alias.to_string();
        let has_token22 = token_accounts.saw_token22;
        let accounts = token_accounts.accounts;
        let token_count = accounts.len();

        self.store.mutate(move |snapshot| {
            let Some(wallet) = snapshot.state.get_mut(&alias_owned) else {
                return;
            };
            wallet.set_sol_balance(sol_balance);
            wallet.has_token22 = Some(has_token22);

            let mut rows = Vec::with_capacity(accounts.len());
            for account in &accounts {
                wallet.seed_token_baseline(&account.mint, account.ui_amount);
                let baseline = wallet
                    .start_token_balances
                    .get(&account.mint)
                    .copied()
                    .unwrap_or(account.ui_amount);
                let market = market_data.get(&account.mint);
                let symbol = symbols.get(&account.mint).cloned().flatten();

                rows.push(TokenRow {
                    symbol,
                    mint: account.mint.clone(),
                    balance: account.ui_amount,
                    session_delta: account.ui_amount - baseline,
                    usd_estimate: market
                        .and_then(|m| m.price_usd)
                        .map(|price| price * account.ui_amount),
                    decimals: Some(account.decimals),
                    price_usd: market.and_then(|m| m.price_usd),
                    change_pct: market.and_then(|m| m.change_pct.clone()),
                    liquidity_usd: market.and_then(|m| m.liquidity_usd),
                    market_cap_usd: market.and_then(|m| m.market_cap_usd),
                    holders: market.and_then(|m| m.holders),
                    risk_score: market.and_then(|m| m.risk_score),
                    top10_pct: market.and_then(|m| m.top10_pct),
                    sniper_pct: market.and_then(|m| m.sniper_pct),
                    dev_pct: market.and_then(|m| m.dev_pct),
                    risk_tags: market.map(|m| m.risk_tags.clone()).unwrap_or_default(),
                });
            }
            wallet.tokens = rows;
            wallet.sort_tokens(|mint| stable_mints.iter().any(|m| m == mint));
        });

        info!(alias, sol_balance, token_count, "wallet refreshed");

        let wallet_id = self
            .store
            .get_snapshot()
            .state
            .get(alias)
            .and_then(|w| w.wallet_id);
        self.refresh_pnl(alias, wallet_id, &market_data).await;

        Ok(())
    }

    /// Runs after `refreshTokens` succeeds, in the same refresh tick
    /// (SPEC_FULL.md §4.6: "refreshTokens and refreshPnl in sequence"). A DB
    /// failure here never fails the overall refresh: the prior `pnlByMint` is
    /// preserved, a change is still emitted, and the error is only logged
    /// (§4.11 failure table).
    async fn refresh_pnl(
        &self,
        alias: &str,
        wallet_id: Option<i64>,
        market_data: &HashMap<String, crate::pricing::TokenMarketData>,
    ) {
        let Some(wallet_id) = wallet_id else {
            return;
        };

        let current_prices: HashMap<String, f64> = market_data
            .iter()
            .filter_map(|(mint, data)| data.price_usd.map(|price| (mint.clone(), price)))
            .collect();

        match self.db.load_pnl_rows(wallet_id, &current_prices).await {
            Ok(rows) => {
                let pnl_by_mint: HashMap<String, crate::hud::PnlRow> =
                    rows.into_iter().map(|row| (row.mint.clone(), row)).collect();
                let alias_owned = alias.to_string();
                self.store.mutate(move |snapshot| {
                    if let Some(wallet) = snapshot.state.get_mut(&alias_owned) {
                        wallet.pnl_by_mint = pnl_by_mint;
                    }
                });
            }
            Err(e) => {
                warn!(alias, error = %e, "pnl refresh failed, keeping prior pnlByMint");
                // Still emit a change so observers waiting on this tick unblock.
                self.store.mutate(|_| {});
            }
        }
    }
}
