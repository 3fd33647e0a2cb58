/// Token metadata and price client (SPEC_FULL.md §4.4, C4).
///
/// Batches price/metadata lookups against the configured data API and caches
/// per-mint metadata (symbol, decimals) indefinitely, since that data is
/// effectively immutable for a given mint, while price/liquidity/risk fields
/// are always refetched.
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::warn;

use crate::errors::{WarchestError, WarchestResult};
use crate::hud::ChangePct;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMarketData {
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

#[derive(Debug, Deserialize)]
struct DataApiTokenResponse {
    symbol: Option<String>,
    decimals: Option<u8>,
    #[serde(rename = "priceUsd")]
    price_usd: Option<f64>,
    #[serde(rename = "liquidityUsd")]
    liquidity_usd: Option<f64>,
    #[serde(rename = "marketCapUsd")]
    market_cap_usd: Option<f64>,
    holders: Option<u64>,
    #[serde(rename = "riskScore")]
    risk_score: Option<f64>,
    #[serde(rename = "top10Pct")]
    top10_pct: Option<f64>,
    #[serde(rename = "sniperPct")]
    sniper_pct: Option<f64>,
    #[serde(rename = "devPct")]
    dev_pct: Option<f64>,
    #[serde(rename = "riskTags", default)]
    risk_tags: Vec<String>,
    #[serde(rename = "change1m")]
    change_1m: Option<f64>,
    #[serde(rename = "change5m")]
    change_5m: Option<f64>,
    #[serde(rename = "change15m")]
    change_15m: Option<f64>,
    #[serde(rename = "change30m")]
    change_30m: Option<f64>,
}

pub struct PricingClient {
    http: reqwest::Client,
    endpoint: String,
    metadata_cache: DashMap<String, Arc<TokenMetadata>>,
}

impl PricingClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builder should not fail with static config"),
            endpoint: endpoint.into(),
            metadata_cache: DashMap::new(),
        }
    }

    pub fn cached_metadata(&self, mint: &str) -> Option<Arc<TokenMetadata>> {
        self.metadata_cache.get(mint).map(|entry| entry.clone())
    }

    /// Fetches market data (and metadata, which is cached) for a batch of
    /// mints. A failure for one mint does not fail the batch: the mint is
    /// simply omitted from the returned map and a warning is logged (§7
    /// propagation policy: this is a per-request path, not a startup
    /// precondition).
    pub async fn fetch_batch(
        &self,
        mints: &[String],
    ) -> WarchestResult<std::collections::HashMap<String, TokenMarketData>> {
        if mints.is_empty() {
            return Ok(std::collections::HashMap::new());
        }

        let url = format!("{}/tokens/multi", self.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("mints", mints.join(","))])
            .send()
            .await
            .map_err(|e| WarchestError::unavailable(format!("data api request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WarchestError::unavailable(format!(
                "data api returned status {}",
                response.status()
            )));
        }

        let body: std::collections::HashMap<String, DataApiTokenResponse> = response
            .json()
            .await
            .map_err(|e| WarchestError::integrity(format!("malformed data api body: {e}")))?;

        let mut out = std::collections::HashMap::new();
        for mint in mints {
            let Some(entry) = body.get(mint) else {
                warn!(mint, "data api omitted mint from batch response");
                continue;
            };

            self.metadata_cache.insert(
                mint.clone(),
                Arc::new(TokenMetadata {
                    symbol: entry.symbol.clone(),
                    decimals: entry.decimals,
                }),
            );

            out.insert(
                mint.clone(),
                TokenMarketData {
                    price_usd: entry.price_usd.filter(|v| v.is_finite()),
                    change_pct: Some(ChangePct {
                        m1: entry.change_1m.filter(|v| v.is_finite()),
                        m5: entry.change_5m.filter(|v| v.is_finite()),
                        m15: entry.change_15m.filter(|v| v.is_finite()),
                        m30: entry.change_30m.filter(|v| v.is_finite()),
                    }),
                    liquidity_usd: entry.liquidity_usd.filter(|v| v.is_finite()),
                    market_cap_usd: entry.market_cap_usd.filter(|v| v.is_finite()),
                    holders: entry.holders,
                    risk_score: entry.risk_score.filter(|v| v.is_finite()),
                    top10_pct: entry.top10_pct.filter(|v| v.is_finite()),
                    sniper_pct: entry.sniper_pct.filter(|v| v.is_finite()),
                    dev_pct: entry.dev_pct.filter(|v| v.is_finite()),
                    risk_tags: entry.risk_tags.clone(),
                },
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mint_list_short_circuits() {
        let client = PricingClient::new("https://example.invalid");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(client.fetch_batch(&[])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn metadata_cache_starts_empty() {
        let client = PricingClient::new("https://example.invalid");
        assert!(client.cached_metadata("mintA").is_none());
    }
}
