//! Settlement coordinator.
//!
//! Drives the outer flow for one user:
//!
//! 1. deposit: transfer the source amount to the settlement address
//! 2. swap: one orchestrator run from the source to the destination asset
//! 3. payout: transfer the net output back to the user
//!
//! A failed deposit stops before any venue funds are at risk. A failed swap
//! is returned as is and no payout is attempted. A failed payout after a
//! completed swap is the one failure reported as a partial success: the
//! swap's effects are final and the report carries them next to the payout
//! error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::orchestrator::SwapOrchestrator;
use crate::storage::{SettlementJournal, SettlementRecord};
use crate::types::{
    Asset, FeeSchedule, SwapError, SwapFailure, SwapRequest, SwapResult, SwapStatus,
    TransferReceipt,
};
use crate::venue::SettlementRail;

/// What every settlement swaps, and at which rates.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementPlan {
    pub source: Asset,
    pub destination: Asset,
    pub fees: FeeSchedule,
    pub slippage: Decimal,
}

impl SettlementPlan {
    fn request(&self, amount: Decimal) -> SwapRequest {
        SwapRequest::new(self.source.clone(), self.destination.clone(), amount)
            .with_fees(self.fees)
            .with_slippage(self.slippage)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PayoutOutcome {
    Sent {
        receipt: TransferReceipt,
    },
    Failed {
        #[serde(serialize_with = "error_message")]
        error: SwapError,
    },
}

fn error_message<S: serde::Serializer>(error: &SwapError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// A settlement whose swap completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub id: Uuid,
    /// `Success`, or `Partial` when the payout failed.
    pub status: SwapStatus,
    pub user: String,
    pub amount: Decimal,
    pub deposit: TransferReceipt,
    pub swap: SwapResult,
    pub payout: PayoutOutcome,
    pub completed_at: DateTime<Utc>,
}

impl SettlementReport {
    pub fn payout_error(&self) -> Option<&SwapError> {
        match &self.payout {
            PayoutOutcome::Failed { error } => Some(error),
            PayoutOutcome::Sent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementError {
    #[error("Invalid settlement request: {0}")]
    InvalidRequest(String),

    /// Always `SwapError::TransferFailed`; no swap was attempted.
    #[error("Deposit failed: {0}")]
    Deposit(SwapError),

    #[error("{0}")]
    Swap(SwapFailure),
}

impl SettlementError {
    pub fn status(&self) -> SwapStatus {
        match self {
            SettlementError::InvalidRequest(_) | SettlementError::Deposit(_) => SwapStatus::Failed,
            SettlementError::Swap(failure) => failure.status(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::InvalidRequest(_) => "invalid_request",
            SettlementError::Deposit(e) => e.code(),
            SettlementError::Swap(failure) => failure.error.code(),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct SettlementCoordinator {
    rail: Arc<dyn SettlementRail>,
    orchestrator: Arc<SwapOrchestrator>,
    plan: SettlementPlan,
    journal: Option<Arc<SettlementJournal>>,
}

impl SettlementCoordinator {
    pub fn new(
        rail: Arc<dyn SettlementRail>,
        orchestrator: Arc<SwapOrchestrator>,
        plan: SettlementPlan,
    ) -> Self {
        Self {
            rail,
            orchestrator,
            plan,
            journal: None,
        }
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<SettlementJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn plan(&self) -> &SettlementPlan {
        &self.plan
    }

    pub async fn run_settlement(
        &self,
        amount: Decimal,
        user_address: &str,
        signer: &SecretString,
    ) -> Result<SettlementReport, SettlementError> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::InvalidRequest(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if !is_valid_address(user_address) {
            return Err(SettlementError::InvalidRequest(format!(
                "malformed user address {user_address}"
            )));
        }

        let id = Uuid::new_v4();

        // Step 1: deposit
        let deposit = match self.rail.transfer_in(amount, signer).await {
            Ok(receipt) if receipt.is_confirmed() => receipt,
            Ok(receipt) => {
                return Err(SettlementError::Deposit(SwapError::TransferFailed(format!(
                    "deposit {} not confirmed ({:?})",
                    receipt.tx_hash, receipt.status
                ))))
            }
            Err(e) => {
                return Err(SettlementError::Deposit(SwapError::TransferFailed(format!(
                    "deposit: {e:#}"
                ))))
            }
        };
        info!(%id, amount = %amount, tx = %deposit.tx_hash, "Deposit confirmed");

        // Step 2: swap
        let swap = match self.orchestrator.run_swap(&self.plan.request(amount)).await {
            Ok(result) => result,
            Err(failure) => {
                error!(%id, status = %failure.status(), error = %failure, "Swap failed after deposit");
                self.journal(SettlementRecord {
                    id,
                    recorded_at: Utc::now(),
                    user: user_address.to_string(),
                    amount,
                    status: failure.status(),
                    deposit_tx: deposit.tx_hash.clone(),
                    order_ids: failure.first_fill.iter().map(|f| f.order_id()).collect(),
                    net_output: None,
                    payout_tx: None,
                    stranded: failure.first_fill.clone(),
                    error: Some(failure.error.to_string()),
                })
                .await;
                return Err(SettlementError::Swap(failure));
            }
        };

        // Step 3: payout
        let payout = match self
            .rail
            .transfer_out(swap.net_output, user_address, signer)
            .await
        {
            Ok(receipt) if receipt.is_confirmed() => PayoutOutcome::Sent { receipt },
            Ok(receipt) => PayoutOutcome::Failed {
                error: SwapError::TransferFailed(format!(
                    "payout {} not confirmed ({:?})",
                    receipt.tx_hash, receipt.status
                )),
            },
            Err(e) => PayoutOutcome::Failed {
                error: SwapError::TransferFailed(format!("payout: {e:#}")),
            },
        };

        let status = match &payout {
            PayoutOutcome::Sent { receipt } => {
                info!(%id, amount = %swap.net_output, tx = %receipt.tx_hash, "Payout confirmed");
                SwapStatus::Success
            }
            PayoutOutcome::Failed { error } => {
                warn!(%id, amount = %swap.net_output, error = %error, "Payout failed; swap output held for manual payout");
                SwapStatus::Partial
            }
        };

        let report = SettlementReport {
            id,
            status,
            user: user_address.to_string(),
            amount,
            deposit,
            swap,
            payout,
            completed_at: Utc::now(),
        };
        self.journal(record_for(&report)).await;
        Ok(report)
    }

    /// A journal write failure must not change the settlement outcome.
    async fn journal(&self, record: SettlementRecord) {
        let Some(journal) = self.journal.clone() else {
            return;
        };
        let id = record.id;
        match tokio::task::spawn_blocking(move || journal.append(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(%id, error = %e, "Failed to journal settlement"),
            Err(e) => error!(%id, error = %e, "Journal write task failed"),
        }
    }
}

fn record_for(report: &SettlementReport) -> SettlementRecord {
    let (payout_tx, error) = match &report.payout {
        PayoutOutcome::Sent { receipt } => (Some(receipt.tx_hash.clone()), None),
        PayoutOutcome::Failed { error } => (None, Some(error.to_string())),
    };
    SettlementRecord {
        id: report.id,
        recorded_at: report.completed_at,
        user: report.user.clone(),
        amount: report.amount,
        status: report.status,
        deposit_tx: report.deposit.tx_hash.clone(),
        order_ids: report.swap.order_ids().to_vec(),
        net_output: Some(report.swap.net_output),
        payout_tx,
        stranded: None,
        error,
    }
}

/// `0x` followed by 40 hex digits.
pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
