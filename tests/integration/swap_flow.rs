//! End-to-end swap and settlement scenarios.

use anyhow::anyhow;
use async_trait::async_trait;
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use swapdesk::engine::events::MemoryObserver;
use swapdesk::engine::orchestrator::{OrchestratorSettings, SwapOrchestrator};
use swapdesk::engine::settlement::{SettlementCoordinator, SettlementError, SettlementPlan};
use swapdesk::storage::SettlementJournal;
use swapdesk::types::{
    Asset, FeeSchedule, Side, SwapError, SwapRequest, SwapState, SwapStatus, TransferReceipt,
    TransferStatus,
};
use swapdesk::venue::SettlementRail;

use crate::mock_venue::{error_status, filled, ScriptedVenue};

mock! {
    pub Rail {}

    #[async_trait]
    impl SettlementRail for Rail {
        async fn transfer_in(&self, amount: Decimal, signer: &SecretString) -> anyhow::Result<TransferReceipt>;
        async fn transfer_out(
            &self,
            amount: Decimal,
            destination: &str,
            signer: &SecretString,
        ) -> anyhow::Result<TransferReceipt>;
    }
}

const USER: &str = "0x9FDBdA0A5e284c32744D2f17Ee5c74B284993463";
const SYSTEM: &str = "0x200000000000000000000000000000000000010C";

fn usdt() -> Asset {
    Asset::new("@166", "USDT0")
}

fn ubtc() -> Asset {
    Asset::new("@142", "UBTC")
}

fn confirmed(amount: Decimal, to: &str) -> TransferReceipt {
    TransferReceipt {
        status: TransferStatus::Confirmed,
        tx_hash: format!("0x{}", "cd".repeat(32)),
        amount,
        destination: to.to_string(),
        block_number: Some(42),
    }
}

fn settlement_venue() -> Arc<ScriptedVenue> {
    Arc::new(ScriptedVenue::new(
        &[("USDT0", 2), ("UBTC", 5)],
        vec![vec![("@166", dec!(1)), ("@142", dec!(100000))]],
    ))
}

fn orchestrator(venue: Arc<ScriptedVenue>, observer: Arc<MemoryObserver>) -> Arc<SwapOrchestrator> {
    Arc::new(SwapOrchestrator::new(
        venue.clone(),
        venue,
        observer,
        OrchestratorSettings::default(),
    ))
}

fn coordinator(venue: Arc<ScriptedVenue>, rail: MockRail) -> SettlementCoordinator {
    SettlementCoordinator::new(
        Arc::new(rail),
        orchestrator(venue, Arc::new(MemoryObserver::new())),
        SettlementPlan {
            source: usdt(),
            destination: ubtc(),
            fees: FeeSchedule::default(),
            slippage: dec!(0.01),
        },
    )
}

fn signer() -> SecretString {
    SecretString::new("0xsigner".to_string())
}

// ---------------------------------------------------------------------------
// Swap orchestrator
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_two_asset_swap_end_to_end() {
    let venue = Arc::new(ScriptedVenue::new(
        &[("AAA", 2), ("BBB", 0)],
        vec![vec![("@1", dec!(5.00)), ("@2", dec!(50.00))]],
    ));
    venue.script(filled(1, dec!(10.46), dec!(5.01)));
    venue.script(filled(2, dec!(1), dec!(50.1)));
    let observer = Arc::new(MemoryObserver::new());
    let orch = orchestrator(venue.clone(), observer.clone());

    let request = SwapRequest::new(Asset::new("@1", "AAA"), Asset::new("@2", "BBB"), dec!(10.456));
    let result = assert_ok!(orch.run_swap(&request).await);

    let orders = venue.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!((orders[0].side, orders[0].size), (Side::Sell, dec!(10.46)));
    assert_eq!((orders[1].side, orders[1].size), (Side::Buy, dec!(1)));
    assert_eq!(result.net_output, dec!(0.9993));
    assert_eq!(result.order_ids(), [1, 2]);
    // metadata once, prices before each leg
    assert_eq!(venue.meta_calls(), 1);
    assert_eq!(venue.mids_calls(), 2);
    assert_eq!(observer.names().last(), Some(&"completed"));
}

#[tokio::test(start_paused = true)]
async fn test_destination_price_vanishes_before_second_leg() {
    let venue = Arc::new(ScriptedVenue::new(
        &[("AAA", 2), ("BBB", 0)],
        vec![
            vec![("@1", dec!(5)), ("@2", dec!(50))],
            vec![("@1", dec!(5)), ("@2", Decimal::ZERO)],
        ],
    ));
    let orch = orchestrator(venue.clone(), Arc::new(MemoryObserver::new()));

    let request = SwapRequest::new(Asset::new("@1", "AAA"), Asset::new("@2", "BBB"), dec!(10.456));
    let failure = assert_err!(orch.run_swap(&request).await);

    assert_eq!(failure.error, SwapError::PriceNotFound { asset: "@2".into() });
    assert_eq!(failure.reached, SwapState::FirstLegFilled);
    assert_eq!(failure.status(), SwapStatus::Partial);
    // no second-leg submission
    assert_eq!(venue.orders().len(), 1);
}

#[tokio::test]
async fn test_market_data_outage_places_no_orders() {
    let venue = settlement_venue();
    venue.set_error("connection refused");
    let orch = orchestrator(venue.clone(), Arc::new(MemoryObserver::new()));

    let failure = assert_err!(orch.run_swap(&SwapRequest::new(usdt(), ubtc(), dec!(25))).await);
    assert_eq!(failure.error.code(), "market_data_unavailable");
    assert_eq!(failure.status(), SwapStatus::Failed);
    assert!(venue.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_swaps_take_their_own_snapshots() {
    let venue = settlement_venue();
    let orch = orchestrator(venue.clone(), Arc::new(MemoryObserver::new()));

    let a = SwapRequest::new(usdt(), ubtc(), dec!(25));
    let b = SwapRequest::new(usdt(), ubtc(), dec!(50));
    let (ra, rb) = tokio::join!(orch.run_swap(&a), orch.run_swap(&b));

    let ra = assert_ok!(ra);
    let rb = assert_ok!(rb);
    assert_eq!(ra.second_leg_size, dec!(0.00025));
    assert_eq!(rb.second_leg_size, dec!(0.0005));
    assert_eq!(venue.meta_calls(), 2);
    assert_eq!(venue.mids_calls(), 4);
    assert_eq!(venue.orders().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_configured_cooldown_is_respected() {
    let venue = settlement_venue();
    let orch = SwapOrchestrator::new(
        venue.clone(),
        venue.clone(),
        Arc::new(MemoryObserver::new()),
        OrchestratorSettings {
            leg_cooldown: Duration::from_secs(3),
            order_timeout: Duration::from_secs(30),
        },
    );

    let start = tokio::time::Instant::now();
    assert_ok!(orch.run_swap(&SwapRequest::new(usdt(), ubtc(), dec!(25))).await);
    assert!(start.elapsed() >= Duration::from_secs(3));
}

// ---------------------------------------------------------------------------
// Settlement coordinator
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_settlement_success_pays_net_output() {
    let venue = settlement_venue();
    let mut rail = MockRail::new();
    rail.expect_transfer_in()
        .times(1)
        .returning(|amount, _| Ok(confirmed(amount, SYSTEM)));
    rail.expect_transfer_out()
        .times(1)
        .returning(|amount, to, _| Ok(confirmed(amount, to)));
    let coord = coordinator(venue.clone(), rail);

    let report = assert_ok!(coord.run_settlement(dec!(25), USER, &signer()).await);
    assert_eq!(report.status, SwapStatus::Success);
    assert_eq!(report.deposit.destination, SYSTEM);
    assert_eq!(report.swap.net_output, dec!(0.00025) * (Decimal::ONE - dec!(0.0007)));
    assert!(report.payout_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_payout_failure_is_partial_not_failed() {
    let venue = settlement_venue();
    let mut rail = MockRail::new();
    rail.expect_transfer_in()
        .returning(|amount, _| Ok(confirmed(amount, SYSTEM)));
    rail.expect_transfer_out()
        .times(1)
        .returning(|_, _, _| Err(anyhow!("execution reverted")));
    let coord = coordinator(venue, rail);

    let report = assert_ok!(coord.run_settlement(dec!(25), USER, &signer()).await);
    assert_eq!(report.status, SwapStatus::Partial);
    assert_ne!(report.status, SwapStatus::Failed);
    assert_eq!(report.swap.status, SwapStatus::Success);
    assert_eq!(report.swap.order_ids().len(), 2);
    match report.payout_error() {
        Some(SwapError::TransferFailed(msg)) => assert!(msg.contains("execution reverted")),
        other => panic!("unexpected payout error: {other:?}"),
    }
}

#[tokio::test]
async fn test_deposit_failure_never_reaches_venue() {
    let venue = settlement_venue();
    let mut rail = MockRail::new();
    rail.expect_transfer_in()
        .times(1)
        .returning(|_, _| Err(anyhow!("insufficient funds for gas")));
    rail.expect_transfer_out().never();
    let coord = coordinator(venue.clone(), rail);

    let err = assert_err!(coord.run_settlement(dec!(25), USER, &signer()).await);
    assert!(matches!(err, SettlementError::Deposit(SwapError::TransferFailed(_))));
    assert_eq!(venue.meta_calls(), 0);
    assert!(venue.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_leg_failure_is_journalled_as_stranded() {
    let path = std::env::temp_dir().join(format!("swapdesk_it_{}.jsonl", uuid::Uuid::new_v4()));
    let journal = Arc::new(SettlementJournal::new(&path));

    let venue = settlement_venue();
    venue.script(filled(7, dec!(25), dec!(1)));
    venue.script(error_status("Insufficient spot balance"));
    let mut rail = MockRail::new();
    rail.expect_transfer_in()
        .returning(|amount, _| Ok(confirmed(amount, SYSTEM)));
    rail.expect_transfer_out().never();
    let coord = coordinator(venue, rail).with_journal(journal.clone());

    let err = assert_err!(coord.run_settlement(dec!(25), USER, &signer()).await);
    assert_eq!(err.status(), SwapStatus::Partial);
    assert_eq!(err.code(), "leg_execution_failed");

    let pending = journal.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, SwapStatus::Partial);
    assert_eq!(pending[0].stranded.as_ref().map(|f| f.order_id()), Some(7));
    assert!(pending[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("Insufficient spot balance")));

    std::fs::remove_file(&path).unwrap();
}
