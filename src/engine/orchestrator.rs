//! Swap orchestrator.
//!
//! Turns "amount X of asset A" into "amount Y of asset B" with two
//! sequential taker trades:
//!
//! ```text
//! Init → Priced → FirstLegFilled → Repriced → SecondLegFilled → Done
//!   └──────┴───────────┴──────────────┴──────────────┴──→ Failed
//! ```
//!
//! `Failed` is terminal and is the `SwapFailure` itself, which keeps the
//! last state reached before the error.
//!
//! The first leg sells the rounded source amount. The destination price is
//! then fetched again and the second leg buys what the first leg's proceeds
//! cover at that fresh price. The first error aborts the run; nothing is
//! unwound. A failure after the first fill leaves the proceeds in the
//! intermediate asset and is reported through `SwapFailure::first_fill`.
//!
//! All size and price arithmetic is checked: a rounded price of zero or a
//! product outside `Decimal` range is an `InvalidPrecondition`, never a panic.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use crate::engine::events::{SwapEvent, SwapObserver};
use crate::engine::executor::{LegExecutor, LegOrder};
use crate::engine::precision::{self, PrecisionError};
use crate::engine::snapshot::MarketSnapshot;
use crate::types::{
    Asset, Fill, Leg, Side, SwapError, SwapFailure, SwapRequest, SwapResult, SwapState,
    SwapStatus,
};
use crate::venue::{MarketDataSource, OrderGateway};

/// Pause between the legs. Settings may lengthen it but never shorten it.
pub const DEFAULT_LEG_COOLDOWN: Duration = Duration::from_secs(1);

/// Upper bound on a single order submission.
pub const DEFAULT_ORDER_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Timing knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub leg_cooldown: Duration,
    pub order_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            leg_cooldown: DEFAULT_LEG_COOLDOWN,
            order_timeout: DEFAULT_ORDER_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Run progress
// ---------------------------------------------------------------------------

/// Tracks how far a run got so a failure can report it.
#[derive(Debug)]
struct Progress {
    state: SwapState,
    first_fill: Option<Fill>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: SwapState::Init,
            first_fill: None,
        }
    }

    fn advance(&mut self, state: SwapState) {
        self.state = state;
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct SwapOrchestrator {
    market_data: Arc<dyn MarketDataSource>,
    executor: LegExecutor,
    observer: Arc<dyn SwapObserver>,
    settings: OrchestratorSettings,
}

impl SwapOrchestrator {
    pub fn new(
        market_data: Arc<dyn MarketDataSource>,
        gateway: Arc<dyn OrderGateway>,
        observer: Arc<dyn SwapObserver>,
        mut settings: OrchestratorSettings,
    ) -> Self {
        settings.leg_cooldown = settings.leg_cooldown.max(DEFAULT_LEG_COOLDOWN);
        Self {
            market_data,
            executor: LegExecutor::new(gateway, observer.clone(), settings.order_timeout),
            observer,
            settings,
        }
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    /// Run one swap to completion or to its first failure.
    #[instrument(
        skip(self, request),
        fields(source = %request.source.id, destination = %request.destination.id, amount = %request.source_amount)
    )]
    pub async fn run_swap(&self, request: &SwapRequest) -> Result<SwapResult, SwapFailure> {
        let started = Instant::now();
        let mut progress = Progress::new();

        match self.drive(request, &mut progress, started).await {
            Ok(result) => {
                info!(
                    net_output = %result.net_output,
                    orders = ?result.order_ids(),
                    elapsed_ms = result.elapsed_ms,
                    "{result}"
                );
                Ok(result)
            }
            Err(error) => {
                let failure = SwapFailure {
                    error,
                    reached: progress.state,
                    first_fill: progress.first_fill,
                };
                self.observer.record(&SwapEvent::Failed {
                    reached: failure.reached,
                    code: failure.error.code(),
                    reason: failure.error.to_string(),
                    exposed: failure.first_fill.is_some(),
                });
                Err(failure)
            }
        }
    }

    async fn drive(
        &self,
        request: &SwapRequest,
        progress: &mut Progress,
        started: Instant,
    ) -> Result<SwapResult, SwapError> {
        request.validate()?;
        let source = &request.source;
        let destination = &request.destination;
        let fees = request.fees;

        // Init → Priced
        let snapshot = MarketSnapshot::fetch(self.market_data.as_ref()).await?;
        let source_decimals = snapshot.size_decimals(source)?;
        let destination_decimals = snapshot.size_decimals(destination)?;

        let initial_size = precision::round_size(request.source_amount, source_decimals);
        if initial_size <= Decimal::ZERO {
            return Err(SwapError::InvalidPrecondition {
                asset: source.id.clone(),
                reason: format!(
                    "source amount {} rounds to {initial_size} at {source_decimals} decimals",
                    request.source_amount
                ),
            });
        }

        let source_price = snapshot.price_of(source)?;
        let destination_price = snapshot.price_of(destination)?;

        let rounded_source_price = round_price(source, source_price, source_decimals)?;
        let rounded_destination_price =
            round_price(destination, destination_price, destination_decimals)?;
        let fee_factor = (Decimal::ONE - fees.maker) * (Decimal::ONE - fees.taker);
        let expected_output = initial_size
            .checked_mul(rounded_source_price)
            .and_then(|notional| notional.checked_mul(fee_factor))
            .and_then(|net| net.checked_div(rounded_destination_price))
            .map(|output| precision::round_size(output, destination_decimals))
            .ok_or_else(|| out_of_range(source, "expected output"))?;

        progress.advance(SwapState::Priced);
        self.observer.record(&SwapEvent::Priced {
            source: source.id.clone(),
            destination: destination.id.clone(),
            initial_size,
            source_price,
            destination_price,
            expected_output,
        });

        // Priced → FirstLegFilled
        let sell_limit = round_price(
            source,
            source_price * (Decimal::ONE - request.slippage),
            source_decimals,
        )?;
        let first_fill = self
            .executor
            .execute_leg(&LegOrder {
                leg: Leg::First,
                asset: source,
                side: Side::Sell,
                size: initial_size,
                size_decimals: source_decimals,
                limit_price_hint: Some(sell_limit),
                slippage: request.slippage,
            })
            .await?;
        progress.first_fill = Some(first_fill.clone());
        progress.advance(SwapState::FirstLegFilled);

        // FirstLegFilled → Repriced
        let fresh = snapshot.reprice(self.market_data.as_ref()).await?;
        let fresh_destination_price = fresh.price_of(destination)?;

        let second_leg_size = first_fill
            .notional()
            .and_then(|proceeds| proceeds.checked_div(fresh_destination_price))
            .map(|size| precision::round_size(size, destination_decimals))
            .ok_or_else(|| out_of_range(destination, "second leg size"))?;
        if second_leg_size <= Decimal::ZERO {
            return Err(SwapError::NonPositiveOutputSize {
                asset: destination.id.clone(),
                size: second_leg_size,
            });
        }

        progress.advance(SwapState::Repriced);
        self.observer.record(&SwapEvent::Repriced {
            asset: destination.id.clone(),
            previous_price: destination_price,
            fresh_price: fresh_destination_price,
            second_leg_size,
        });

        self.observer.record(&SwapEvent::cooldown(self.settings.leg_cooldown));
        tokio::time::sleep(self.settings.leg_cooldown).await;

        // Repriced → SecondLegFilled
        let buy_ceiling = fresh_destination_price
            .checked_mul(Decimal::ONE + request.slippage)
            .ok_or_else(|| out_of_range(destination, "buy limit"))?;
        let buy_limit = round_price(destination, buy_ceiling, destination_decimals)?;
        let second_fill = self
            .executor
            .execute_leg(&LegOrder {
                leg: Leg::Second,
                asset: destination,
                side: Side::Buy,
                size: second_leg_size,
                size_decimals: destination_decimals,
                limit_price_hint: Some(buy_limit),
                slippage: request.slippage,
            })
            .await?;
        progress.advance(SwapState::SecondLegFilled);

        // SecondLegFilled → Done
        let net_output = second_fill.filled_size() * (Decimal::ONE - fees.taker);
        progress.advance(SwapState::Done);

        let result = SwapResult {
            status: SwapStatus::Success,
            source: source.clone(),
            destination: destination.clone(),
            initial_size,
            expected_output,
            first_fill,
            second_leg_size,
            second_fill,
            net_output,
            fees,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        self.observer.record(&SwapEvent::Completed {
            net_output,
            order_ids: result.order_ids(),
        });
        Ok(result)
    }
}

/// Round to the venue tick; a positive price that rounds to zero cannot be quoted.
fn round_price(asset: &Asset, value: Decimal, size_decimals: u32) -> Result<Decimal, SwapError> {
    let rounded = precision::round_price(value, size_decimals).map_err(|e: PrecisionError| {
        SwapError::InvalidPrecondition {
            asset: asset.id.clone(),
            reason: e.to_string(),
        }
    })?;
    if rounded <= Decimal::ZERO {
        return Err(SwapError::InvalidPrecondition {
            asset: asset.id.clone(),
            reason: format!("price {value} rounds to {rounded} at size decimals {size_decimals}"),
        });
    }
    Ok(rounded)
}

fn out_of_range(asset: &Asset, what: &str) -> SwapError {
    SwapError::InvalidPrecondition {
        asset: asset.id.clone(),
        reason: format!("{what} is outside the decimal range"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
