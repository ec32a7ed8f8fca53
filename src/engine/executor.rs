//! Leg executor.
//!
//! Places exactly one market-taker order for one leg of a swap, waits for
//! the venue's answer and turns it into a `Fill`. There is no retry loop:
//! any error status abandons the leg, and an accepted order without a fill
//! entry is reported as `NoFill` rather than folded into a rejection.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::engine::events::{SwapEvent, SwapObserver};
use crate::engine::precision;
use crate::types::{Asset, Fill, Leg, Side, SwapError};
use crate::venue::{MarketOrder, OrderGateway, OrderOutcome, OrderStatus};

// ---------------------------------------------------------------------------
// Leg order
// ---------------------------------------------------------------------------

/// Everything needed to place one leg.
#[derive(Debug, Clone)]
pub struct LegOrder<'a> {
    pub leg: Leg,
    pub asset: &'a Asset,
    pub side: Side,
    /// Must already satisfy `size_decimals`.
    pub size: Decimal,
    pub size_decimals: u32,
    pub limit_price_hint: Option<Decimal>,
    /// Fraction, e.g. 0.01 for 1%.
    pub slippage: Decimal,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct LegExecutor {
    gateway: Arc<dyn OrderGateway>,
    observer: Arc<dyn SwapObserver>,
    order_timeout: Duration,
}

impl LegExecutor {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        observer: Arc<dyn SwapObserver>,
        order_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            observer,
            order_timeout,
        }
    }

    /// Submit one order and return its fill.
    pub async fn execute_leg(&self, order: &LegOrder<'_>) -> Result<Fill, SwapError> {
        if order.size <= Decimal::ZERO || !precision::is_valid_size(order.size, order.size_decimals) {
            return Err(SwapError::InvalidPrecondition {
                asset: order.asset.id.clone(),
                reason: format!(
                    "size {} does not satisfy {} size decimals",
                    order.size, order.size_decimals
                ),
            });
        }

        let market_order = MarketOrder {
            asset: order.asset.id.clone(),
            side: order.side,
            size: order.size,
            limit_price_hint: order.limit_price_hint,
            slippage: order.slippage,
        };

        self.observer.record(&SwapEvent::LegSubmitted {
            leg: order.leg,
            asset: order.asset.id.clone(),
            side: order.side,
            size: order.size,
            limit_price: order.limit_price_hint,
        });

        let submission = self.gateway.submit_market_order(&market_order);
        let outcome = match tokio::time::timeout(self.order_timeout, submission).await {
            Err(_) => {
                return Err(SwapError::LegExecutionFailed {
                    leg: order.leg,
                    asset: order.asset.id.clone(),
                    reason: format!(
                        "order submission timed out after {}ms",
                        self.order_timeout.as_millis()
                    ),
                })
            }
            Ok(Err(e)) => {
                return Err(SwapError::LegExecutionFailed {
                    leg: order.leg,
                    asset: order.asset.id.clone(),
                    reason: format!("{e:#}"),
                })
            }
            Ok(Ok(outcome)) => outcome,
        };

        debug!(leg = %order.leg, asset = %order.asset.id, raw = %outcome.raw, "Order response");

        if !outcome.is_ok() {
            return Err(SwapError::OrderRejected {
                leg: order.leg,
                asset: order.asset.id.clone(),
                response: describe(&outcome),
            });
        }

        let fill = extract_fill(order, &outcome)?;

        self.observer.record(&SwapEvent::LegFilled {
            leg: fill.leg(),
            asset: fill.asset().to_string(),
            order_id: fill.order_id(),
            filled_size: fill.filled_size(),
            average_price: fill.average_price(),
        });

        Ok(fill)
    }
}

/// Any error entry fails the leg; otherwise the first non-empty fill wins.
fn extract_fill(order: &LegOrder<'_>, outcome: &OrderOutcome) -> Result<Fill, SwapError> {
    if let Some(reason) = outcome.statuses.iter().find_map(|s| match s {
        OrderStatus::Error(reason) => Some(reason),
        _ => None,
    }) {
        return Err(SwapError::LegExecutionFailed {
            leg: order.leg,
            asset: order.asset.id.clone(),
            reason: reason.clone(),
        });
    }

    outcome
        .statuses
        .iter()
        .find_map(|s| match s {
            OrderStatus::Filled {
                oid,
                total_size,
                average_price,
            } if *total_size > Decimal::ZERO => Some(Fill::new(
                *oid,
                order.asset.id.clone(),
                order.side,
                *total_size,
                *average_price,
                order.leg,
            )),
            _ => None,
        })
        .ok_or_else(|| SwapError::NoFill {
            leg: order.leg,
            asset: order.asset.id.clone(),
            response: describe(outcome),
        })
}

fn describe(outcome: &OrderOutcome) -> String {
    if outcome.raw.is_empty() {
        format!("status={} statuses={:?}", outcome.status, outcome.statuses)
    } else {
        outcome.raw.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::MemoryObserver;
    use crate::venue::MockOrderGateway;
    use rust_decimal_macros::dec;

    fn hype() -> Asset {
        Asset::new("@107", "HYPE")
    }

    fn sell_order(asset: &Asset) -> LegOrder<'_> {
        LegOrder {
            leg: Leg::First,
            asset,
            side: Side::Sell,
            size: dec!(2.41),
            size_decimals: 2,
            limit_price_hint: Some(dec!(37.818)),
            slippage: dec!(0.01),
        }
    }

    fn ok(statuses: Vec<OrderStatus>) -> OrderOutcome {
        OrderOutcome {
            status: "ok".into(),
            statuses,
            raw: String::new(),
        }
    }

    fn executor(gateway: MockOrderGateway) -> (LegExecutor, Arc<MemoryObserver>) {
        let observer = Arc::new(MemoryObserver::new());
        let exec = LegExecutor::new(Arc::new(gateway), observer.clone(), Duration::from_secs(5));
        (exec, observer)
    }

    #[tokio::test]
    async fn test_filled_order_produces_fill() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit_market_order()
            .withf(|o| o.asset == "@107" && o.side == Side::Sell && o.size == dec!(2.41))
            .times(1)
            .returning(|_| {
                Ok(ok(vec![OrderStatus::Filled {
                    oid: 42,
                    total_size: dec!(2.41),
                    average_price: dec!(38.1),
                }]))
            });
        let (exec, observer) = executor(gateway);
        let asset = hype();

        let fill = exec.execute_leg(&sell_order(&asset)).await.unwrap();

        assert_eq!(fill.order_id(), 42);
        assert_eq!(fill.filled_size(), dec!(2.41));
        assert_eq!(fill.average_price(), dec!(38.1));
        assert_eq!(fill.leg(), Leg::First);
        assert_eq!(observer.names(), vec!["leg_submitted", "leg_filled"]);
    }

    #[tokio::test]
    async fn test_rejected_order() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_submit_market_order().times(1).returning(|_| {
            Ok(OrderOutcome {
                status: "err".into(),
                statuses: Vec::new(),
                raw: r#"{"status":"err","response":"Insufficient spot balance"}"#.into(),
            })
        });
        let (exec, _) = executor(gateway);
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        match err {
            SwapError::OrderRejected { leg, asset, response } => {
                assert_eq!(leg, Leg::First);
                assert_eq!(asset, "@107");
                assert!(response.contains("Insufficient spot balance"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_fails_leg_even_with_fill() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_submit_market_order().times(1).returning(|_| {
            Ok(ok(vec![
                OrderStatus::Filled {
                    oid: 1,
                    total_size: dec!(1),
                    average_price: dec!(38),
                },
                OrderStatus::Error("Order has invalid size".into()),
            ]))
        });
        let (exec, _) = executor(gateway);
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        assert_eq!(
            err,
            SwapError::LegExecutionFailed {
                leg: Leg::First,
                asset: "@107".into(),
                reason: "Order has invalid size".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_accepted_without_fill_is_no_fill() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit_market_order()
            .times(1)
            .returning(|_| Ok(ok(vec![OrderStatus::Resting { oid: 3 }])));
        let (exec, observer) = executor(gateway);
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        assert!(matches!(err, SwapError::NoFill { leg: Leg::First, .. }));
        assert_eq!(observer.names(), vec!["leg_submitted"]);
    }

    #[tokio::test]
    async fn test_empty_status_list_is_no_fill() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit_market_order()
            .returning(|_| Ok(ok(Vec::new())));
        let (exec, _) = executor(gateway);
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        assert_eq!(err.code(), "no_fill");
    }

    #[tokio::test]
    async fn test_transport_error_is_leg_failure() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit_market_order()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("operation timed out")));
        let (exec, _) = executor(gateway);
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        assert!(matches!(err, SwapError::LegExecutionFailed { ref reason, .. } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_unrounded_size_is_rejected_before_submission() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_submit_market_order().never();
        let (exec, observer) = executor(gateway);
        let asset = hype();

        let mut order = sell_order(&asset);
        order.size = dec!(2.415);
        let err = exec.execute_leg(&order).await.unwrap_err();
        assert_eq!(err.code(), "invalid_precondition");
        assert!(observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_gateway_times_out() {
        struct SlowGateway;

        #[async_trait::async_trait]
        impl OrderGateway for SlowGateway {
            async fn submit_market_order(&self, _order: &MarketOrder) -> anyhow::Result<OrderOutcome> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ok(Vec::new()))
            }
        }

        let exec = LegExecutor::new(
            Arc::new(SlowGateway),
            Arc::new(MemoryObserver::new()),
            Duration::from_secs(30),
        );
        let asset = hype();

        let err = exec.execute_leg(&sell_order(&asset)).await.unwrap_err();
        assert!(matches!(err, SwapError::LegExecutionFailed { ref reason, .. } if reason.contains("30000ms")));
    }
}
