/// Operational database adapter (SPEC_FULL.md §4.7, C "operational DB").
///
/// Grounded on the teacher's `BadgerDatabase`/`PnLCalculator` schema-creation
/// pattern (`src/database/analytics/pnl_calculator.rs`, `src/database/mod.rs`):
/// a single sqlite pool, `CREATE TABLE IF NOT EXISTS` run on connect rather
/// than a separate migration runner, and typed writer methods returning the
/// crate's own error type instead of `sqlx::Error` directly.
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::errors::{WarchestError, WarchestResult};
use crate::hud::PnlRow;

pub struct OperationalDb {
    pool: SqlitePool,
}

impl OperationalDb {
    pub async fn connect(database_url: &str) -> WarchestResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| WarchestError::fatal(format!("failed to open operational db: {e}")))?;

        let db = Self { pool };
        db.initialize_schema().await?;
        Ok(db)
    }

    async fn initialize_schema(&self) -> WarchestResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_registry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alias TEXT NOT NULL UNIQUE,
                pubkey TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| WarchestError::fatal(format!("wallet_registry schema: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sc_trade_events (
                id TEXT PRIMARY KEY,
                wallet_id INTEGER NOT NULL,
                mint TEXT NOT NULL,
                side TEXT NOT NULL,
                token_amount REAL NOT NULL,
                sol_amount REAL,
                price_usd REAL,
                recorded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| WarchestError::fatal(format!("sc_trade_events schema: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_positions (
                wallet_id INTEGER NOT NULL,
                mint TEXT NOT NULL,
                current_token_amount REAL NOT NULL DEFAULT 0.0,
                avg_cost_usd REAL,
                realized_pnl_usd REAL NOT NULL DEFAULT 0.0,
                PRIMARY KEY (wallet_id, mint)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| WarchestError::fatal(format!("token_positions schema: {e}")))?;

        Ok(())
    }

    /// Resolves `(alias, pubkey)` to a stable wallet row id, inserting a new
    /// row on first sight. An alias or pubkey already bound to a different
    /// counterpart is a conflict (§4.7 step 3): the registry never silently
    /// repoints an existing alias to a new wallet.
    pub async fn resolve_wallet_registry(&self, alias: &str, pubkey: &str) -> WarchestResult<i64> {
        if let Some(row) = sqlx::query("SELECT id, pubkey FROM wallet_registry WHERE alias = ?1")
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WarchestError::unavailable(format!("registry lookup failed: {e}")))?
        {
            let existing_pubkey: String = row.get("pubkey");
            if existing_pubkey != pubkey {
                return Err(WarchestError::conflict(format!(
                    "alias {alias} already bound to a different pubkey"
                )));
            }
            return Ok(row.get("id"));
        }

        if let Some(row) = sqlx::query("SELECT alias FROM wallet_registry WHERE pubkey = ?1")
            .bind(pubkey)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| WarchestError::unavailable(format!("registry lookup failed: {e}")))?
        {
            let existing_alias: String = row.get("alias");
            if existing_alias != alias {
                return Err(WarchestError::conflict(format!(
                    "pubkey {pubkey} already registered under alias {existing_alias}"
                )));
            }
        }

        let inserted = sqlx::query(
            "INSERT INTO wallet_registry (alias, pubkey, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(alias)
        .bind(pubkey)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| WarchestError::unavailable(format!("registry insert failed: {e}")))?;

        Ok(inserted.last_insert_rowid())
    }

    /// Records a single trade event for the hub log replay path and applies
    /// it to the running position for `(wallet_id, mint)` in one transaction
    /// (§4.7 step 2: record then apply are never observed independently).
    pub async fn record_sc_trade_event(
        &self,
        event_id: &str,
        wallet_id: i64,
        mint: &str,
        side: &str,
        token_amount: f64,
        sol_amount: Option<f64>,
        price_usd: Option<f64>,
    ) -> WarchestResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| WarchestError::unavailable(format!("begin tx failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sc_trade_events
                (id, wallet_id, mint, side, token_amount, sol_amount, price_usd, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(event_id)
        .bind(wallet_id)
        .bind(mint)
        .bind(side)
        .bind(token_amount)
        .bind(sol_amount)
        .bind(price_usd)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| WarchestError::unavailable(format!("trade event insert failed: {e}")))?;

        let signed_amount = if side == "sell" { -token_amount } else { token_amount };

        sqlx::query(
            r#"
            INSERT INTO token_positions (wallet_id, mint, current_token_amount, avg_cost_usd, realized_pnl_usd)
            VALUES (?1, ?2, ?3, ?4, 0.0)
            ON CONFLICT(wallet_id, mint) DO UPDATE SET
                current_token_amount = current_token_amount + ?3,
                avg_cost_usd = COALESCE(?4, avg_cost_usd)
            "#,
        )
        .bind(wallet_id)
        .bind(mint)
        .bind(signed_amount)
        .bind(price_usd)
        .execute(&mut *tx)
        .await
        .map_err(|e| WarchestError::unavailable(format!("position upsert failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| WarchestError::unavailable(format!("commit failed: {e}")))?;
        Ok(())
    }

    pub async fn load_pnl_rows(&self, wallet_id: i64, current_prices: &std::collections::HashMap<String, f64>) -> WarchestResult<Vec<PnlRow>> {
        let rows = sqlx::query(
            "SELECT mint, current_token_amount, avg_cost_usd, realized_pnl_usd FROM token_positions WHERE wallet_id = ?1",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WarchestError::unavailable(format!("pnl row load failed: {e}")))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mint: String = row.get("mint");
            let current_token_amount: f64 = row.get("current_token_amount");
            let avg_cost_usd: Option<f64> = row.get("avg_cost_usd");
            let realized_pnl_usd: Option<f64> = row.get("realized_pnl_usd");
            let coin_price_usd = current_prices.get(&mint).copied();
            out.push(derive_pnl_fields(
                mint,
                current_token_amount,
                avg_cost_usd,
                coin_price_usd,
                realized_pnl_usd,
            ));
        }
        Ok(out)
    }
}

/// Normalizes a raw PnL row coming from an upstream JSON blob that may spell
/// its keys in snake_case or camelCase (§3 data-model note, §9 resolved
/// ambiguity): accepts `coin_mint` / `coinMint` / `mint`, and
/// `current_token_amount` / `currentTokenAmount`.
pub fn normalize_pnl_row(raw: &Value) -> Option<PnlRow> {
    let mint = raw
        .get("coin_mint")
        .or_else(|| raw.get("coinMint"))
        .or_else(|| raw.get("mint"))
        .and_then(Value::as_str)?
        .to_string();

    let current_token_amount = raw
        .get("current_token_amount")
        .or_else(|| raw.get("currentTokenAmount"))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    // Only non-empty positions are kept (§3 invariant: `pnlByMint` only
    // contains mints with a current position).
    if current_token_amount <= 0.0 {
        return None;
    }

    let avg_cost_usd = raw
        .get("avg_cost_usd")
        .or_else(|| raw.get("avgCostUsd"))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite());

    let coin_price_usd = raw
        .get("coin_price_usd")
        .or_else(|| raw.get("coinPriceUsd"))
        .or_else(|| raw.get("priceUsd"))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite());

    let realized_pnl_usd = raw
        .get("realized_pnl_usd")
        .or_else(|| raw.get("realizedPnlUsd"))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite());

    Some(derive_pnl_fields(
        mint,
        current_token_amount,
        avg_cost_usd,
        coin_price_usd,
        realized_pnl_usd,
    ))
}

fn derive_pnl_fields(
    mint: String,
    current_token_amount: f64,
    avg_cost_usd: Option<f64>,
    coin_price_usd: Option<f64>,
    realized_pnl_usd: Option<f64>,
) -> PnlRow {
    let entry_usd = avg_cost_usd.map(|cost| cost * current_token_amount);
    let current_usd = coin_price_usd.map(|price| price * current_token_amount);
    let unrealized_pnl_usd = match (current_usd, entry_usd) {
        (Some(cur), Some(entry)) => Some(cur - entry),
        _ => None,
    };
    let roi_pct = match (unrealized_pnl_usd, entry_usd) {
        (Some(pnl), Some(entry)) if entry.abs() > f64::EPSILON => Some((pnl / entry) * 100.0),
        _ => None,
    };

    PnlRow {
        mint,
        current_token_amount,
        avg_cost_usd,
        coin_price_usd,
        entry_usd,
        current_usd,
        unrealized_pnl_usd,
        realized_pnl_usd,
        roi_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_snake_case_keys() {
        let raw = json!({
            "coin_mint": "mintA",
            "current_token_amount": 100.0,
            "avg_cost_usd": 0.01,
            "coin_price_usd": 0.02,
        });
        let row = normalize_pnl_row(&raw).unwrap();
        assert_eq!(row.mint, "mintA");
        assert_eq!(row.entry_usd, Some(1.0));
        assert_eq!(row.current_usd, Some(2.0));
        assert_eq!(row.unrealized_pnl_usd, Some(1.0));
        assert_eq!(row.roi_pct, Some(100.0));
    }

    #[test]
    fn normalizes_camel_case_keys() {
        let raw = json!({
            "coinMint": "mintB",
            "currentTokenAmount": 50.0,
            "avgCostUsd": 0.02,
            "priceUsd": 0.01,
        });
        let row = normalize_pnl_row(&raw).unwrap();
        assert_eq!(row.mint, "mintB");
        assert_eq!(row.entry_usd, Some(1.0));
        assert_eq!(row.current_usd, Some(0.5));
        assert_eq!(row.unrealized_pnl_usd, Some(-0.5));
    }

    #[test]
    fn falls_back_to_bare_mint_key() {
        let raw = json!({"mint": "mintC", "current_token_amount": 1.0});
        let row = normalize_pnl_row(&raw).unwrap();
        assert_eq!(row.mint, "mintC");
        assert!(row.entry_usd.is_none());
        assert!(row.roi_pct.is_none());
    }

    #[test]
    fn zero_or_negative_position_is_dropped() {
        let raw = json!({"mint": "mintE", "current_token_amount": 0.0});
        assert!(normalize_pnl_row(&raw).is_none());
        let raw = json!({"mint": "mintE", "current_token_amount": -5.0});
        assert!(normalize_pnl_row(&raw).is_none());
    }

    #[test]
    fn missing_mint_key_yields_none() {
        let raw = json!({"current_token_amount": 1.0});
        assert!(normalize_pnl_row(&raw).is_none());
    }

    #[test]
    fn zero_entry_never_divides_for_roi() {
        let raw = json!({"mint": "mintD", "current_token_amount": 1.0, "avg_cost_usd": 0.0, "coin_price_usd": 5.0});
        let row = normalize_pnl_row(&raw).unwrap();
        assert_eq!(row.entry_usd, Some(0.0));
        assert!(row.roi_pct.is_none());
    }
}
