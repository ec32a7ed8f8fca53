//! Hyperliquid spot integration.
//!
//! Uses the public `/info` endpoint for spot metadata (`spotMeta`) and
//! mid-prices (`allMids`). Neither request needs authentication.
//!
//! Order submission goes through `/exchange` and requires an EIP-712
//! signed action, which this crate does not produce; `parse_order_response`
//! decodes that endpoint's answer for whichever gateway does the signing.
//!
//! Info API: https://api.hyperliquid.xyz/info

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::venue::{MarketDataSource, OrderOutcome, OrderStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Info API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct SpotMeta {
    #[serde(default)]
    pub tokens: Vec<SpotToken>,
    #[serde(default)]
    pub universe: Vec<SpotPair>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpotToken {
    pub name: String,
    #[serde(rename = "szDecimals")]
    pub sz_decimals: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpotPair {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Exchange API response types (order placement)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireOrderResponse {
    status: String,
    #[serde(default)]
    response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireOrderData {
    #[serde(default)]
    statuses: Vec<WireStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireStatus {
    Filled { filled: WireFill },
    Resting { resting: WireResting },
    Error { error: String },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct WireFill {
    #[serde(rename = "totalSz")]
    total_sz: String,
    #[serde(rename = "avgPx")]
    avg_px: String,
    oid: u64,
}

#[derive(Debug, Deserialize)]
struct WireResting {
    oid: u64,
}

/// Decode an `/exchange` order response into an `OrderOutcome`.
///
/// A non-`ok` status keeps the body in `raw` and leaves `statuses` empty.
pub fn parse_order_response(body: &str) -> Result<OrderOutcome> {
    let wire: WireOrderResponse =
        serde_json::from_str(body).context("Failed to parse order response")?;

    if wire.status != "ok" {
        return Ok(OrderOutcome {
            status: wire.status,
            statuses: Vec::new(),
            raw: body.to_string(),
        });
    }

    let data = wire
        .response
        .as_ref()
        .and_then(|r| r.get("data"))
        .cloned()
        .context("Order response missing response.data")?;
    let data: WireOrderData =
        serde_json::from_value(data).context("Failed to parse order statuses")?;

    let mut statuses = Vec::with_capacity(data.statuses.len());
    for status in data.statuses {
        statuses.push(match status {
            WireStatus::Filled { filled } => OrderStatus::Filled {
                oid: filled.oid,
                total_size: Decimal::from_str(&filled.total_sz)
                    .with_context(|| format!("Invalid totalSz: {}", filled.total_sz))?,
                average_price: Decimal::from_str(&filled.avg_px)
                    .with_context(|| format!("Invalid avgPx: {}", filled.avg_px))?,
            },
            WireStatus::Resting { resting } => OrderStatus::Resting { oid: resting.oid },
            WireStatus::Error { error } => OrderStatus::Error(error),
            WireStatus::Other(v) => OrderStatus::Error(format!("Unrecognised order status: {v}")),
        });
    }

    Ok(OrderOutcome {
        status: wire.status,
        statuses,
        raw: body.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HyperliquidInfoClient {
    http: Client,
    base_url: String,
}

impl HyperliquidInfoClient {
    pub fn new(base_url: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .context("Failed to build Hyperliquid HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(MAINNET_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn post_info<T: DeserializeOwned>(&self, request_type: &str) -> Result<T> {
        let url = format!("{}/info", self.base_url);
        debug!(request_type, "Querying Hyperliquid info API");

        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "type": request_type }))
            .send()
            .await
            .with_context(|| format!("Info request {request_type} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Info API error {status} for {request_type}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse {request_type} response"))
    }

    /// Fetch raw spot metadata.
    pub async fn spot_meta(&self) -> Result<SpotMeta> {
        self.post_info("spotMeta").await
    }

    /// Size decimals keyed by token name.
    ///
    /// Canonical pairs (`PURR/USDC`) are tradeable under their pair name;
    /// when no token carries that name they are added with zero decimals.
    pub fn size_decimals_from_meta(meta: &SpotMeta) -> HashMap<String, u32> {
        let mut decimals: HashMap<String, u32> = meta
            .tokens
            .iter()
            .map(|t| (t.name.clone(), t.sz_decimals))
            .collect();

        for pair in meta.universe.iter().filter(|p| p.name.contains('/')) {
            decimals.entry(pair.name.clone()).or_insert(0);
        }
        decimals
    }

    /// Parse the `allMids` map, dropping entries that are not decimals.
    pub fn parse_mids(raw: HashMap<String, String>) -> HashMap<String, Decimal> {
        raw.into_iter()
            .filter_map(|(symbol, px)| match Decimal::from_str(&px) {
                Ok(d) => Some((symbol, d)),
                Err(e) => {
                    warn!(symbol = %symbol, price = %px, error = %e, "Skipping unparseable mid");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for HyperliquidInfoClient {
    async fn fetch_market_meta(&self) -> Result<HashMap<String, u32>> {
        let meta = self.spot_meta().await?;
        let decimals = Self::size_decimals_from_meta(&meta);
        info!(
            tokens = meta.tokens.len(),
            pairs = meta.universe.len(),
            "Fetched spot metadata"
        );
        Ok(decimals)
    }

    async fn fetch_mids(&self) -> Result<HashMap<String, Decimal>> {
        let raw: HashMap<String, String> = self.post_info("allMids").await?;
        let mids = Self::parse_mids(raw);
        debug!(count = mids.len(), "Fetched mids");
        Ok(mids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
