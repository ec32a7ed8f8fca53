//! Shared types for the SWAPDESK service.
//!
//! These types form the data model used across all modules: assets,
//! swap requests, fills, results and the error taxonomy surfaced to
//! callers. Venue, engine and API modules depend on them without
//! depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// A tradeable spot asset.
///
/// `id` is the venue symbol used for prices and orders (`@107`,
/// `PURR/USDC`); `name` is the token name the venue keys its size
/// metadata by (`HYPE`, `PURR`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
}

impl Asset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Which half of the two-part swap an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Sell the source asset.
    First,
    /// Buy the destination asset.
    Second,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::First => write!(f, "first"),
            Leg::Second => write!(f, "second"),
        }
    }
}

/// Orchestrator state machine positions.
///
/// The failed exit is not a position: a run that stops early returns a
/// `SwapFailure` holding the last position it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapState {
    Init,
    Priced,
    FirstLegFilled,
    Repriced,
    SecondLegFilled,
    Done,
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapState::Init => "Init",
            SwapState::Priced => "Priced",
            SwapState::FirstLegFilled => "FirstLegFilled",
            SwapState::Repriced => "Repriced",
            SwapState::SecondLegFilled => "SecondLegFilled",
            SwapState::Done => "Done",
        };
        write!(f, "{s}")
    }
}

/// Outcome classification shared by swaps and settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Success,
    /// Some irreversible step completed but the flow did not finish.
    Partial,
    Failed,
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapStatus::Success => write!(f, "success"),
            SwapStatus::Partial => write!(f, "partial"),
            SwapStatus::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Venue fee rates as decimal fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker: Decimal,
    pub taker: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            maker: dec!(0.0004),
            taker: dec!(0.0007),
        }
    }
}

/// Default protective slippage for market-taker orders (1%).
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.01);

/// A request to turn `source_amount` of `source` into `destination`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub source: Asset,
    pub destination: Asset,
    pub source_amount: Decimal,
    pub fees: FeeSchedule,
    pub slippage: Decimal,
}

impl SwapRequest {
    pub fn new(source: Asset, destination: Asset, source_amount: Decimal) -> Self {
        Self {
            source,
            destination,
            source_amount,
            fees: FeeSchedule::default(),
            slippage: DEFAULT_SLIPPAGE,
        }
    }

    #[must_use]
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    #[must_use]
    pub fn with_slippage(mut self, slippage: Decimal) -> Self {
        self.slippage = slippage;
        self
    }

    /// Reject requests that cannot produce a meaningful swap.
    pub fn validate(&self) -> Result<(), SwapError> {
        let invalid = |reason: String| SwapError::InvalidPrecondition {
            asset: self.source.id.clone(),
            reason,
        };

        if self.source_amount <= Decimal::ZERO {
            return Err(invalid(format!(
                "source amount must be positive, got {}",
                self.source_amount
            )));
        }
        if self.source.id == self.destination.id {
            return Err(invalid("source and destination are the same asset".into()));
        }
        for (label, fee) in [("maker", self.fees.maker), ("taker", self.fees.taker)] {
            if fee < Decimal::ZERO || fee >= Decimal::ONE {
                return Err(invalid(format!("{label} fee {fee} outside [0, 1)")));
            }
        }
        if self.slippage <= Decimal::ZERO || self.slippage >= Decimal::ONE {
            return Err(invalid(format!("slippage {} outside (0, 1)", self.slippage)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fills and results
// ---------------------------------------------------------------------------

/// A confirmed venue fill. Only the leg executor creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    order_id: u64,
    asset: String,
    side: Side,
    filled_size: Decimal,
    average_price: Decimal,
    leg: Leg,
    filled_at: DateTime<Utc>,
}

impl Fill {
    pub(crate) fn new(
        order_id: u64,
        asset: impl Into<String>,
        side: Side,
        filled_size: Decimal,
        average_price: Decimal,
        leg: Leg,
    ) -> Self {
        Self {
            order_id,
            asset: asset.into(),
            side,
            filled_size,
            average_price,
            leg,
            filled_at: Utc::now(),
        }
    }

    pub fn order_id(&self) -> u64 {
        self.order_id
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn filled_size(&self) -> Decimal {
        self.filled_size
    }

    pub fn average_price(&self) -> Decimal {
        self.average_price
    }

    pub fn leg(&self) -> Leg {
        self.leg
    }

    pub fn filled_at(&self) -> DateTime<Utc> {
        self.filled_at
    }

    /// Quote-currency value of the fill, `None` past the decimal range.
    pub fn notional(&self) -> Option<Decimal> {
        self.filled_size.checked_mul(self.average_price)
    }
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order #{} {} {} {} @{}",
            self.order_id, self.side, self.filled_size, self.asset, self.average_price
        )
    }
}

/// A completed two-leg swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
    pub status: SwapStatus,
    pub source: Asset,
    pub destination: Asset,
    /// Source amount after size rounding.
    pub initial_size: Decimal,
    /// Pre-trade sanity estimate of the destination amount.
    pub expected_output: Decimal,
    pub first_fill: Fill,
    pub second_leg_size: Decimal,
    pub second_fill: Fill,
    /// Destination amount after taker fee deduction.
    pub net_output: Decimal,
    pub fees: FeeSchedule,
    pub elapsed_ms: u64,
}

impl SwapResult {
    pub fn order_ids(&self) -> [u64; 2] {
        [self.first_fill.order_id(), self.second_fill.order_id()]
    }
}

impl fmt::Display for SwapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Swapped {} {} for {} {} in {}ms",
            self.first_fill.filled_size(),
            self.source.name,
            self.net_output,
            self.destination.name,
            self.elapsed_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// On-chain transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Confirmed,
    Reverted,
}

/// Receipt returned by the settlement rail for a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub status: TransferStatus,
    pub tx_hash: String,
    pub amount: Decimal,
    pub destination: String,
    pub block_number: Option<u64>,
}

impl TransferReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == TransferStatus::Confirmed
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Swap orchestration errors. Leg variants carry the leg, the asset id and
/// the raw venue response so a failure can be diagnosed without re-running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SwapError {
    #[error("Invalid precondition ({asset}): {reason}")]
    InvalidPrecondition { asset: String, reason: String },

    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Price not found for {asset}")]
    PriceNotFound { asset: String },

    #[error("Order rejected on {leg} leg ({asset}): {response}")]
    OrderRejected {
        leg: Leg,
        asset: String,
        response: String,
    },

    #[error("Execution failed on {leg} leg ({asset}): {reason}")]
    LegExecutionFailed {
        leg: Leg,
        asset: String,
        reason: String,
    },

    #[error("No fill on {leg} leg ({asset}): {response}")]
    NoFill {
        leg: Leg,
        asset: String,
        response: String,
    },

    #[error("Non-positive output size for {asset}: {size}")]
    NonPositiveOutputSize { asset: String, size: Decimal },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),
}

impl SwapError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SwapError::InvalidPrecondition { .. } => "invalid_precondition",
            SwapError::MarketDataUnavailable(_) => "market_data_unavailable",
            SwapError::PriceNotFound { .. } => "price_not_found",
            SwapError::OrderRejected { .. } => "order_rejected",
            SwapError::LegExecutionFailed { .. } => "leg_execution_failed",
            SwapError::NoFill { .. } => "no_fill",
            SwapError::NonPositiveOutputSize { .. } => "non_positive_output_size",
            SwapError::TransferFailed(_) => "transfer_failed",
        }
    }
}

/// A swap run that stopped before `Done`.
///
/// `first_fill` is set when the first leg filled before the failure: the
/// account then holds the intermediate asset and needs reconciliation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Swap failed after reaching {reached}: {error}")]
pub struct SwapFailure {
    #[source]
    pub error: SwapError,
    /// Last state the run reached before failing.
    pub reached: SwapState,
    pub first_fill: Option<Fill>,
}

impl SwapFailure {
    pub fn status(&self) -> SwapStatus {
        if self.first_fill.is_some() {
            SwapStatus::Partial
        } else {
            SwapStatus::Failed
        }
    }

    /// Funds left in the intermediate asset, if any.
    pub fn exposure(&self) -> Option<&Fill> {
        self.first_fill.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
