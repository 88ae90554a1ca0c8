//! Transaction Broadcast Queue — the single choke point for every
//! chain-mutating call.
//!
//! All operations share one signing identity, and a transaction's nonce must
//! be assigned exactly once, in increasing order, for it to ever be
//! includable. Admission (nonce-assign-and-submit) runs under a mutex;
//! confirmation waits poll concurrently outside it, so a slow-confirming
//! transaction never blocks unrelated operations.

use chrono::Utc;
use dashmap::DashMap;
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::chain::traits::{ChainCall, LedgerClient, TxInclusion};
use crate::config::ExecutionConfig;
use crate::domain::{PendingTransaction, TxHandle, TxState};
use crate::error::{RentchainError, Result};

/// Outcome of one admitted operation, as observed by its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(TxReceiptData),
    Reverted(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceiptData {
    pub tx_hash: H256,
    /// For deploys, the created contract address
    pub contract_address: Option<Address>,
}

/// Queue counters and cursor snapshot for the system API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub timed_out: u64,
    pub replaced: u64,
    pub next_nonce: Option<u64>,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

/// Nonce cursor guarded by the admission mutex. `next: None` forces a
/// re-sync against the chain's reported pending nonce on the next admission.
struct NonceCursor {
    next: Option<u64>,
    consecutive_rejections: u32,
}

/// Bookkeeping for one admitted operation. The original call is retained so
/// a TimedOut attempt can be replaced with the same nonce at a higher fee.
struct TrackedOp {
    call: ChainCall,
    tx: PendingTransaction,
}

pub struct BroadcastQueue {
    ledger: Arc<dyn LedgerClient>,
    cursor: Mutex<NonceCursor>,
    pending: DashMap<TxHandle, TrackedOp>,
    halt: RwLock<Option<String>>,
    poll_interval: Duration,
    replacement_fee_bump_pct: u64,
    max_nonce_rejections: u32,
    submitted: AtomicU64,
    confirmed: AtomicU64,
    reverted: AtomicU64,
    timed_out: AtomicU64,
    replaced: AtomicU64,
}

impl BroadcastQueue {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &ExecutionConfig) -> Self {
        Self {
            ledger,
            cursor: Mutex::new(NonceCursor {
                next: None,
                consecutive_rejections: 0,
            }),
            pending: DashMap::new(),
            halt: RwLock::new(None),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            replacement_fee_bump_pct: config.replacement_fee_bump_pct,
            max_nonce_rejections: config.max_nonce_rejections,
            submitted: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            reverted: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        }
    }

    /// Admit a mutating operation: assign the next nonce, submit, record.
    ///
    /// Returns once the endpoint has accepted the submission. A business
    /// revert caught at submission is recorded against the handle and
    /// surfaces through [`await_outcome`](Self::await_outcome), never as an
    /// admission error; its nonce is not consumed.
    pub async fn enqueue(&self, call: ChainCall) -> Result<TxHandle> {
        if let Some(reason) = self.halt.read().await.clone() {
            return Err(RentchainError::QueueHalted(reason));
        }

        let mut cursor = self.cursor.lock().await;

        let nonce = match cursor.next {
            Some(n) => n,
            None => self.ledger.pending_nonce().await?,
        };

        let value = call.value();
        if !value.is_zero() {
            let balance = self.ledger.signer_balance().await?;
            if balance < value {
                return Err(RentchainError::SignerFailure(format!(
                    "signer balance {} below required payment {}",
                    balance, value
                )));
            }
        }

        let fee_per_gas = self.ledger.gas_price().await?;

        match self.ledger.submit(call.clone(), nonce, fee_per_gas).await {
            Ok(tx_hash) => {
                cursor.next = Some(nonce + 1);
                cursor.consecutive_rejections = 0;
                drop(cursor);

                let kind = call.kind();
                let handle = TxHandle::new();
                self.pending.insert(
                    handle,
                    TrackedOp {
                        tx: PendingTransaction {
                            handle,
                            nonce,
                            kind: call.kind(),
                            target: call.target(),
                            value,
                            fee_per_gas,
                            tx_hash: Some(tx_hash),
                            state: TxState::Submitted,
                            submitted_at: Utc::now(),
                            result_address: None,
                            error: None,
                            replacements: 0,
                        },
                        call,
                    },
                );
                self.submitted.fetch_add(1, Ordering::Relaxed);
                info!("Submitted {} tx {:?} with nonce {}", kind, tx_hash, nonce);
                Ok(handle)
            }
            Err(RentchainError::ChainRejected(reason)) => {
                // Refused before acceptance; the nonce was never consumed.
                drop(cursor);
                let handle = TxHandle::new();
                self.pending.insert(
                    handle,
                    TrackedOp {
                        tx: PendingTransaction {
                            handle,
                            nonce,
                            kind: call.kind(),
                            target: call.target(),
                            value,
                            fee_per_gas,
                            tx_hash: None,
                            state: TxState::Reverted,
                            submitted_at: Utc::now(),
                            result_address: None,
                            error: Some(reason.clone()),
                            replacements: 0,
                        },
                        call,
                    },
                );
                self.reverted.fetch_add(1, Ordering::Relaxed);
                warn!("Chain rejected {} at submission: {}", handle, reason);
                Ok(handle)
            }
            Err(RentchainError::NonceDesync(message)) => {
                cursor.next = None;
                cursor.consecutive_rejections += 1;
                let rejections = cursor.consecutive_rejections;
                drop(cursor);

                if rejections >= self.max_nonce_rejections {
                    let reason = format!(
                        "persistent nonce desynchronization after {} rejections: {}",
                        rejections, message
                    );
                    error!("Halting admission: {}", reason);
                    *self.halt.write().await = Some(reason);
                }
                Err(RentchainError::NonceDesync(message))
            }
            Err(e) => {
                // Unknown outcome; re-sync against chain truth next admission.
                cursor.next = None;
                Err(e)
            }
        }
    }

    /// Suspend until the chain includes the transaction or the timeout
    /// elapses. Timing out abandons the wait, not the transaction.
    pub async fn await_outcome(&self, handle: TxHandle, timeout: Duration) -> Result<TxOutcome> {
        let tx_hash = {
            let op = self
                .pending
                .get(&handle)
                .ok_or_else(|| RentchainError::NotFound(format!("transaction {}", handle)))?;
            match op.tx.state {
                TxState::Confirmed => {
                    return Ok(TxOutcome::Confirmed(TxReceiptData {
                        tx_hash: op.tx.tx_hash.unwrap_or_default(),
                        contract_address: op.tx.result_address,
                    }))
                }
                TxState::Reverted => {
                    return Ok(TxOutcome::Reverted(
                        op.tx.error.clone().unwrap_or_else(|| "reverted".into()),
                    ))
                }
                _ => op.tx.tx_hash.ok_or_else(|| {
                    RentchainError::Internal(format!("{} has no transaction hash", handle))
                })?,
            }
        };

        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.ledger.inclusion(tx_hash).await {
                Ok(Some(inclusion)) => return Ok(self.settle(handle, tx_hash, inclusion)),
                Ok(None) => {}
                // Transient RPC failure: keep polling until the deadline.
                Err(e) => warn!("Receipt check for {:?} failed: {}", tx_hash, e),
            }

            if Instant::now() >= deadline {
                if let Some(mut op) = self.pending.get_mut(&handle) {
                    op.tx.state = TxState::TimedOut;
                }
                self.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Confirmation wait for {:?} (nonce from {}) timed out",
                    tx_hash, handle
                );
                return Ok(TxOutcome::TimedOut);
            }
        }
    }

    /// Single non-blocking inclusion check, used by the reconciliation sweep
    /// to discover transactions that landed after their caller gave up.
    pub async fn check_inclusion(&self, handle: TxHandle) -> Result<Option<TxOutcome>> {
        let tx_hash = {
            let op = self
                .pending
                .get(&handle)
                .ok_or_else(|| RentchainError::NotFound(format!("transaction {}", handle)))?;
            match op.tx.state {
                TxState::Confirmed => {
                    return Ok(Some(TxOutcome::Confirmed(TxReceiptData {
                        tx_hash: op.tx.tx_hash.unwrap_or_default(),
                        contract_address: op.tx.result_address,
                    })))
                }
                TxState::Reverted => {
                    return Ok(Some(TxOutcome::Reverted(
                        op.tx.error.clone().unwrap_or_else(|| "reverted".into()),
                    )))
                }
                _ => match op.tx.tx_hash {
                    Some(hash) => hash,
                    None => return Ok(None),
                },
            }
        };

        Ok(self
            .ledger
            .inclusion(tx_hash)
            .await?
            .map(|inclusion| self.settle(handle, tx_hash, inclusion)))
    }

    /// Resubmit a TimedOut operation with the same nonce at a higher fee
    /// bid. Reusing the nonce is what rules out duplicate side effects if
    /// the original is eventually mined.
    pub async fn replace(&self, handle: TxHandle) -> Result<()> {
        let (call, nonce, old_fee) = {
            let op = self
                .pending
                .get(&handle)
                .ok_or_else(|| RentchainError::NotFound(format!("transaction {}", handle)))?;
            if op.tx.state != TxState::TimedOut {
                return Err(RentchainError::Validation(format!(
                    "only timed-out operations may be replaced; {} is {:?}",
                    handle, op.tx.state
                )));
            }
            (op.call.clone(), op.tx.nonce, op.tx.fee_per_gas)
        };

        let bumped = old_fee + old_fee * U256::from(self.replacement_fee_bump_pct) / U256::from(100);
        let market = self.ledger.gas_price().await?;
        let fee_per_gas = bumped.max(market);

        let tx_hash = self.ledger.submit(call, nonce, fee_per_gas).await?;

        if let Some(mut op) = self.pending.get_mut(&handle) {
            op.tx.tx_hash = Some(tx_hash);
            op.tx.state = TxState::Submitted;
            op.tx.submitted_at = Utc::now();
            op.tx.fee_per_gas = fee_per_gas;
            op.tx.replacements += 1;
        }
        self.replaced.fetch_add(1, Ordering::Relaxed);
        info!(
            "Replaced {} with tx {:?} (nonce {}, fee {})",
            handle, tx_hash, nonce, fee_per_gas
        );
        Ok(())
    }

    /// Operator-triggered re-sync of the nonce cursor against the chain.
    /// Clears a desynchronization halt.
    pub async fn resync_nonce(&self) -> Result<u64> {
        let mut cursor = self.cursor.lock().await;
        let next = self.ledger.pending_nonce().await?;
        cursor.next = Some(next);
        cursor.consecutive_rejections = 0;
        drop(cursor);

        *self.halt.write().await = None;
        info!("Nonce cursor re-synced to {}", next);
        Ok(next)
    }

    /// Deploy operations whose confirmation wait was abandoned. These may
    /// still land on chain as orphaned contracts.
    pub fn timed_out_deploys(&self) -> Vec<PendingTransaction> {
        self.pending
            .iter()
            .filter(|entry| {
                entry.tx.kind == crate::domain::OperationKind::Deploy
                    && entry.tx.state == TxState::TimedOut
            })
            .map(|entry| entry.tx.clone())
            .collect()
    }

    pub fn pending_snapshot(&self) -> Vec<PendingTransaction> {
        let mut txs: Vec<_> = self.pending.iter().map(|e| e.tx.clone()).collect();
        txs.sort_by_key(|tx| tx.nonce);
        txs
    }

    pub async fn stats(&self) -> QueueStats {
        let halt = self.halt.read().await.clone();
        let next_nonce = self.cursor.lock().await.next;
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            reverted: self.reverted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            next_nonce,
            halted: halt.is_some(),
            halt_reason: halt,
        }
    }

    pub async fn is_halted(&self) -> bool {
        self.halt.read().await.is_some()
    }

    fn settle(&self, handle: TxHandle, tx_hash: H256, inclusion: TxInclusion) -> TxOutcome {
        match inclusion {
            TxInclusion::Success { contract_address } => {
                if let Some(mut op) = self.pending.get_mut(&handle) {
                    op.tx.state = TxState::Confirmed;
                    op.tx.result_address = contract_address;
                }
                self.confirmed.fetch_add(1, Ordering::Relaxed);
                debug!("Confirmed tx {:?} for {}", tx_hash, handle);
                TxOutcome::Confirmed(TxReceiptData {
                    tx_hash,
                    contract_address,
                })
            }
            TxInclusion::Reverted { reason } => {
                if let Some(mut op) = self.pending.get_mut(&handle) {
                    op.tx.state = TxState::Reverted;
                    op.tx.error = Some(reason.clone());
                }
                self.reverted.fetch_add(1, Ordering::Relaxed);
                warn!("Tx {:?} for {} reverted: {}", tx_hash, handle, reason);
                TxOutcome::Reverted(reason)
            }
        }
    }
}
