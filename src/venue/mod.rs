//! Venue and settlement collaborators.
//!
//! Defines the traits the swap core consumes and provides implementations for:
//! - Hyperliquid spot info API: size metadata and mid-prices over HTTP
//! - Paper trading: an order gateway that fills at live mids, and a dry-run
//!   settlement rail
//!
//! Order signing and ERC-20 broadcasting live outside this crate; anything
//! that can submit a market order or move tokens plugs in behind these traits.

pub mod hyperliquid;
pub mod paper;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::types::{Side, TransferReceipt};

// ---------------------------------------------------------------------------
// Order types
// ---------------------------------------------------------------------------

/// A market-taker order as handed to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    /// Venue symbol (`@107`, `PURR/USDC`).
    pub asset: String,
    pub side: Side,
    pub size: Decimal,
    /// Protective limit derived from the mid and the slippage tolerance.
    pub limit_price_hint: Option<Decimal>,
    pub slippage: Decimal,
}

/// One entry of the venue's per-order status list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderStatus {
    Filled {
        oid: u64,
        total_size: Decimal,
        average_price: Decimal,
    },
    /// Accepted onto the book without matching.
    Resting { oid: u64 },
    Error(String),
}

/// Venue answer to an order submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    /// Top-level venue status; anything other than `"ok"` is a rejection.
    pub status: String,
    pub statuses: Vec<OrderStatus>,
    /// Raw venue response body, kept for diagnostics.
    pub raw: String,
}

impl OrderOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Venue metadata and price feed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Size decimals keyed by token name, including synthetic pairs.
    async fn fetch_market_meta(&self) -> Result<HashMap<String, u32>>;

    /// Current mid-prices keyed by venue symbol.
    async fn fetch_mids(&self) -> Result<HashMap<String, Decimal>>;
}

/// Submits market-taker orders. One call places exactly one order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderOutcome>;
}

/// On-chain custody transfers.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettlementRail: Send + Sync {
    /// Move `amount` from the signer's wallet to the custodial settlement address.
    async fn transfer_in(&self, amount: Decimal, signer: &SecretString) -> Result<TransferReceipt>;

    /// Forward `amount` of the swapped asset to `destination`.
    async fn transfer_out(
        &self,
        amount: Decimal,
        destination: &str,
        signer: &SecretString,
    ) -> Result<TransferReceipt>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
