//! Paper trading collaborators.
//!
//! `PaperGateway` fills market orders at the live mid-price, honouring the
//! protective limit the way an IOC order would. `DryRunRail` logs transfers
//! and returns synthetic receipts. Both let the full deposit → swap → payout
//! flow run against real market data without moving funds.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::types::{Side, TransferReceipt, TransferStatus};
use crate::venue::{
    MarketDataSource, MarketOrder, OrderGateway, OrderOutcome, OrderStatus, SettlementRail,
};

/// Error text the venue uses when an IOC order finds no liquidity in range.
const NO_MATCH: &str = "Order could not immediately match against any resting orders.";

// ---------------------------------------------------------------------------
// Order gateway
// ---------------------------------------------------------------------------

pub struct PaperGateway {
    market_data: Arc<dyn MarketDataSource>,
    next_oid: AtomicU64,
}

impl PaperGateway {
    pub fn new(market_data: Arc<dyn MarketDataSource>) -> Self {
        Self {
            market_data,
            next_oid: AtomicU64::new(1),
        }
    }

    fn within_limit(order: &MarketOrder, price: Decimal) -> bool {
        match (order.limit_price_hint, order.side) {
            (None, _) => true,
            (Some(limit), Side::Buy) => price <= limit,
            (Some(limit), Side::Sell) => price >= limit,
        }
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderOutcome> {
        let mids = self.market_data.fetch_mids().await?;

        let Some(&mid) = mids.get(&order.asset).filter(|p| !p.is_zero()) else {
            let raw = serde_json::json!({
                "status": "err",
                "response": format!("Unknown or unpriced asset {}", order.asset),
            })
            .to_string();
            return Ok(OrderOutcome {
                status: "err".into(),
                statuses: Vec::new(),
                raw,
            });
        };

        if !Self::within_limit(order, mid) {
            let raw = serde_json::json!({
                "status": "ok",
                "response": {"type": "order", "data": {"statuses": [{"error": NO_MATCH}]}},
            })
            .to_string();
            return Ok(OrderOutcome {
                status: "ok".into(),
                statuses: vec![OrderStatus::Error(NO_MATCH.into())],
                raw,
            });
        }

        let oid = self.next_oid.fetch_add(1, Ordering::Relaxed);
        info!(
            asset = %order.asset,
            side = %order.side,
            size = %order.size,
            price = %mid,
            oid,
            "[PAPER] Filled market order"
        );

        let raw = serde_json::json!({
            "status": "ok",
            "response": {"type": "order", "data": {"statuses": [
                {"filled": {"totalSz": order.size.to_string(), "avgPx": mid.to_string(), "oid": oid}}
            ]}},
        })
        .to_string();

        Ok(OrderOutcome {
            status: "ok".into(),
            statuses: vec![OrderStatus::Filled {
                oid,
                total_size: order.size,
                average_price: mid,
            }],
            raw,
        })
    }
}

// ---------------------------------------------------------------------------
// Settlement rail
// ---------------------------------------------------------------------------

pub struct DryRunRail {
    settlement_address: String,
    next_block: AtomicU64,
}

impl DryRunRail {
    pub fn new(settlement_address: impl Into<String>) -> Self {
        Self {
            settlement_address: settlement_address.into(),
            next_block: AtomicU64::new(1),
        }
    }

    fn receipt(&self, amount: Decimal, destination: &str) -> TransferReceipt {
        TransferReceipt {
            status: TransferStatus::Confirmed,
            tx_hash: format!("dry-run-{}", uuid::Uuid::new_v4()),
            amount,
            destination: destination.to_string(),
            block_number: Some(self.next_block.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

#[async_trait]
impl SettlementRail for DryRunRail {
    async fn transfer_in(&self, amount: Decimal, _signer: &SecretString) -> Result<TransferReceipt> {
        info!(
            amount = %amount,
            to = %self.settlement_address,
            "[DRY RUN] Would transfer to settlement address"
        );
        Ok(self.receipt(amount, &self.settlement_address))
    }

    async fn transfer_out(
        &self,
        amount: Decimal,
        destination: &str,
        _signer: &SecretString,
    ) -> Result<TransferReceipt> {
        info!(amount = %amount, to = destination, "[DRY RUN] Would transfer to user");
        Ok(self.receipt(amount, destination))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
