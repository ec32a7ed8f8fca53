//! Structured swap events.
//!
//! The orchestrator and leg executor report each step to an injected
//! `SwapObserver` instead of printing. `TracingObserver` forwards events to
//! the `tracing` subscriber; `MemoryObserver` keeps them for inspection.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{Leg, Side, SwapState};

/// One observable step of a swap run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapEvent {
    Priced {
        source: String,
        destination: String,
        initial_size: Decimal,
        source_price: Decimal,
        destination_price: Decimal,
        expected_output: Decimal,
    },
    LegSubmitted {
        leg: Leg,
        asset: String,
        side: Side,
        size: Decimal,
        limit_price: Option<Decimal>,
    },
    LegFilled {
        leg: Leg,
        asset: String,
        order_id: u64,
        filled_size: Decimal,
        average_price: Decimal,
    },
    Repriced {
        asset: String,
        previous_price: Decimal,
        fresh_price: Decimal,
        second_leg_size: Decimal,
    },
    Cooldown {
        millis: u64,
    },
    Completed {
        net_output: Decimal,
        order_ids: [u64; 2],
    },
    Failed {
        reached: SwapState,
        code: &'static str,
        reason: String,
        /// First leg filled before the failure.
        exposed: bool,
    },
}

impl SwapEvent {
    pub fn cooldown(duration: Duration) -> Self {
        SwapEvent::Cooldown {
            millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Short event name, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            SwapEvent::Priced { .. } => "priced",
            SwapEvent::LegSubmitted { .. } => "leg_submitted",
            SwapEvent::LegFilled { .. } => "leg_filled",
            SwapEvent::Repriced { .. } => "repriced",
            SwapEvent::Cooldown { .. } => "cooldown",
            SwapEvent::Completed { .. } => "completed",
            SwapEvent::Failed { .. } => "failed",
        }
    }
}

/// Sink for swap events. Must not block.
pub trait SwapObserver: Send + Sync {
    fn record(&self, event: &SwapEvent);
}

// ---------------------------------------------------------------------------
// Tracing observer
// ---------------------------------------------------------------------------

/// Emits one structured log record per event under `swapdesk::events`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SwapObserver for TracingObserver {
    fn record(&self, event: &SwapEvent) {
        match event {
            SwapEvent::Priced {
                source,
                destination,
                initial_size,
                source_price,
                destination_price,
                expected_output,
            } => info!(
                target: "swapdesk::events",
                event = event.name(),
                source = %source,
                destination = %destination,
                initial_size = %initial_size,
                source_price = %source_price,
                destination_price = %destination_price,
                expected_output = %expected_output,
                "Swap priced"
            ),
            SwapEvent::LegSubmitted { leg, asset, side, size, limit_price } => info!(
                target: "swapdesk::events",
                event = event.name(),
                leg = %leg,
                asset = %asset,
                side = %side,
                size = %size,
                limit_price = %limit_price.map(|p| p.to_string()).unwrap_or_else(|| "MARKET".into()),
                "Leg submitted"
            ),
            SwapEvent::LegFilled { leg, asset, order_id, filled_size, average_price } => info!(
                target: "swapdesk::events",
                event = event.name(),
                leg = %leg,
                asset = %asset,
                order_id,
                filled_size = %filled_size,
                average_price = %average_price,
                "Leg filled"
            ),
            SwapEvent::Repriced { asset, previous_price, fresh_price, second_leg_size } => info!(
                target: "swapdesk::events",
                event = event.name(),
                asset = %asset,
                previous_price = %previous_price,
                fresh_price = %fresh_price,
                second_leg_size = %second_leg_size,
                "Destination repriced"
            ),
            SwapEvent::Cooldown { millis } => info!(
                target: "swapdesk::events",
                event = event.name(),
                millis,
                "Cooling down before second leg"
            ),
            SwapEvent::Completed { net_output, order_ids } => info!(
                target: "swapdesk::events",
                event = event.name(),
                net_output = %net_output,
                first_order = order_ids[0],
                second_order = order_ids[1],
                "Swap completed"
            ),
            SwapEvent::Failed { reached, code, reason, exposed } => warn!(
                target: "swapdesk::events",
                event = event.name(),
                reached = %reached,
                code,
                reason = %reason,
                exposed,
                "Swap failed"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory observer
// ---------------------------------------------------------------------------

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<SwapEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SwapEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(SwapEvent::name).collect()
    }
}

impl SwapObserver for MemoryObserver {
    fn record(&self, event: &SwapEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fans events out to several observers.
pub struct ObserverSet(pub Vec<std::sync::Arc<dyn SwapObserver>>);

impl SwapObserver for ObserverSet {
    fn record(&self, event: &SwapEvent) {
        for observer in &self.0 {
            observer.record(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
