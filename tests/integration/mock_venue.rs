//! Scripted in-memory venue for integration testing.
//!
//! Serves fixed size metadata, a sequence of price views (one per
//! `fetch_mids` call, the last one repeating) and order answers. Orders
//! without a scripted answer fill in full at the current mid. Every call is
//! counted so tests can assert what was and was not submitted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use swapdesk::venue::{MarketDataSource, MarketOrder, OrderGateway, OrderOutcome, OrderStatus};

pub struct ScriptedVenue {
    size_decimals: HashMap<String, u32>,
    price_views: Vec<HashMap<String, Decimal>>,
    scripted: Mutex<VecDeque<OrderOutcome>>,
    orders: Mutex<Vec<MarketOrder>>,
    meta_calls: AtomicUsize,
    mids_calls: AtomicUsize,
    next_oid: AtomicU64,
    /// If set, all market data calls return this error.
    force_error: Mutex<Option<String>>,
}

impl ScriptedVenue {
    pub fn new(size_decimals: &[(&str, u32)], price_views: Vec<Vec<(&str, Decimal)>>) -> Self {
        Self {
            size_decimals: size_decimals
                .iter()
                .map(|(name, sz)| (name.to_string(), *sz))
                .collect(),
            price_views: price_views
                .into_iter()
                .map(|view| view.into_iter().map(|(id, px)| (id.to_string(), px)).collect())
                .collect(),
            scripted: Mutex::new(VecDeque::new()),
            orders: Mutex::new(Vec::new()),
            meta_calls: AtomicUsize::new(0),
            mids_calls: AtomicUsize::new(0),
            next_oid: AtomicU64::new(100),
            force_error: Mutex::new(None),
        }
    }

    /// Answer the next submitted order with `outcome`.
    pub fn script(&self, outcome: OrderOutcome) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    /// Force all subsequent market data calls to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn orders(&self) -> Vec<MarketOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn meta_calls(&self) -> usize {
        self.meta_calls.load(Ordering::SeqCst)
    }

    pub fn mids_calls(&self) -> usize {
        self.mids_calls.load(Ordering::SeqCst)
    }

    fn current_view(&self) -> HashMap<String, Decimal> {
        let seen = self.mids_calls.load(Ordering::SeqCst);
        let i = seen.saturating_sub(1).min(self.price_views.len().saturating_sub(1));
        self.price_views.get(i).cloned().unwrap_or_default()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!(msg.clone())),
            None => Ok(()),
        }
    }
}

pub fn filled(oid: u64, size: Decimal, price: Decimal) -> OrderOutcome {
    OrderOutcome {
        status: "ok".into(),
        statuses: vec![OrderStatus::Filled {
            oid,
            total_size: size,
            average_price: price,
        }],
        raw: String::new(),
    }
}

pub fn error_status(reason: &str) -> OrderOutcome {
    OrderOutcome {
        status: "ok".into(),
        statuses: vec![OrderStatus::Error(reason.to_string())],
        raw: format!(r#"{{"status":"ok","response":{{"type":"order","data":{{"statuses":[{{"error":"{reason}"}}]}}}}}}"#),
    }
}

#[async_trait]
impl MarketDataSource for ScriptedVenue {
    async fn fetch_market_meta(&self) -> Result<HashMap<String, u32>> {
        self.check_error()?;
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.size_decimals.clone())
    }

    async fn fetch_mids(&self) -> Result<HashMap<String, Decimal>> {
        self.check_error()?;
        self.mids_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_view())
    }
}

#[async_trait]
impl OrderGateway for ScriptedVenue {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderOutcome> {
        self.orders.lock().unwrap().push(order.clone());

        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return Ok(outcome);
        }

        let px = self
            .current_view()
            .get(&order.asset)
            .copied()
            .ok_or_else(|| anyhow!("no price for {}", order.asset))?;
        Ok(filled(self.next_oid.fetch_add(1, Ordering::SeqCst), order.size, px))
    }
}
