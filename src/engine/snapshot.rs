//! Market snapshot.
//!
//! A read-only view of venue size metadata and mid-prices captured once per
//! swap run. Prices move between legs, so the orchestrator takes a fresh
//! price view with `reprice` before sizing the second leg; nothing is
//! cached across runs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::engine::precision;
use crate::types::{Asset, SwapError};
use crate::venue::MarketDataSource;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    size_decimals: HashMap<String, u32>,
    mids: HashMap<String, Decimal>,
    captured_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn from_parts(size_decimals: HashMap<String, u32>, mids: HashMap<String, Decimal>) -> Self {
        Self {
            size_decimals,
            mids,
            captured_at: Utc::now(),
        }
    }

    /// Fetch metadata and prices from the venue.
    pub async fn fetch(source: &dyn MarketDataSource) -> Result<Self, SwapError> {
        let size_decimals = source.fetch_market_meta().await.map_err(|e| {
            SwapError::MarketDataUnavailable(format!("metadata: {e:#}"))
        })?;
        let mids = fetch_mids(source).await?;

        debug!(
            assets = size_decimals.len(),
            prices = mids.len(),
            "Captured market snapshot"
        );
        Ok(Self::from_parts(size_decimals, mids))
    }

    /// Same metadata, freshly fetched prices.
    pub async fn reprice(&self, source: &dyn MarketDataSource) -> Result<Self, SwapError> {
        let mids = fetch_mids(source).await?;
        Ok(Self::from_parts(self.size_decimals.clone(), mids))
    }

    /// Resolve an asset's size decimals, by token name first and venue id second.
    pub fn size_decimals(&self, asset: &Asset) -> Result<u32, SwapError> {
        let decimals = self
            .size_decimals
            .get(&asset.name)
            .or_else(|| self.size_decimals.get(&asset.id))
            .copied()
            .ok_or_else(|| SwapError::InvalidPrecondition {
                asset: asset.id.clone(),
                reason: format!("no sizeDecimals published for {}", asset.name),
            })?;

        precision::validate_size_decimals(decimals).map_err(|e| {
            SwapError::InvalidPrecondition {
                asset: asset.id.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(decimals)
    }

    /// Mid-price for an asset. Zero means no market.
    pub fn price_of(&self, asset: &Asset) -> Result<Decimal, SwapError> {
        match self.mids.get(&asset.id) {
            Some(px) if *px > Decimal::ZERO => Ok(*px),
            _ => Err(SwapError::PriceNotFound {
                asset: asset.id.clone(),
            }),
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

async fn fetch_mids(source: &dyn MarketDataSource) -> Result<HashMap<String, Decimal>, SwapError> {
    source
        .fetch_mids()
        .await
        .map_err(|e| SwapError::MarketDataUnavailable(format!("mids: {e:#}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
