//! Shared test support: a scripted in-memory ledger emulating the agreement
//! contract's semantics, plus component builders.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rentchain::chain::traits::{ChainCall, LedgerClient, TxInclusion};
use rentchain::chain::ReadAggregator;
use rentchain::config::ExecutionConfig;
use rentchain::coordinator::LifecycleCoordinator;
use rentchain::domain::OperationKind;
use rentchain::error::{RentchainError, Result};
use rentchain::queue::BroadcastQueue;
use rentchain::services::{ReconciliationSweep, SweepConfig};
use rentchain::store::MemoryStore;

#[derive(Debug, Clone)]
pub struct FakeContract {
    pub landlord: Address,
    pub renter: Address,
    pub content_hash: String,
    pub rent: U256,
    pub deposit: U256,
    pub duration_days: u64,
    pub active: bool,
    pub terminated: bool,
}

#[derive(Default)]
struct Inner {
    next_nonce: u64,
    balance: U256,
    contracts: HashMap<Address, FakeContract>,
    receipts: HashMap<H256, TxInclusion>,
    /// Receipts the chain has not yet made visible; the state change is
    /// applied (the tx will land), but inclusion() reports nothing.
    withheld: HashSet<H256>,
    withhold_receipts: bool,
    submissions: Vec<(OperationKind, u64)>,
    counter: u64,
}

/// In-memory ledger with the contract's business rules: activation requires
/// the exact rent + deposit payment and an inactive agreement, termination
/// is one-way, nonces must arrive in strict order.
pub struct FakeLedger {
    signer: Address,
    inner: Mutex<Inner>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            signer: Address::repeat_byte(0x51),
            inner: Mutex::new(Inner {
                balance: U256::MAX,
                ..Inner::default()
            }),
        }
    }

    pub fn set_balance(&self, balance: U256) {
        self.inner.lock().unwrap().balance = balance;
    }

    /// While set, newly submitted transactions land on chain but their
    /// receipts stay invisible, so confirmation waits time out.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.inner.lock().unwrap().withhold_receipts = withhold;
    }

    /// Make every withheld receipt visible.
    pub fn release_receipts(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.withheld.clear();
    }

    pub fn contract(&self, address: Address) -> Option<FakeContract> {
        self.inner.lock().unwrap().contracts.get(&address).cloned()
    }

    pub fn submissions(&self) -> Vec<(OperationKind, u64)> {
        self.inner.lock().unwrap().submissions.clone()
    }

    pub fn submission_count(&self, kind: OperationKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .submissions
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn read_contract<T>(
        &self,
        contract: Address,
        read: impl FnOnce(&FakeContract) -> T,
    ) -> Result<T> {
        self.inner
            .lock()
            .unwrap()
            .contracts
            .get(&contract)
            .map(read)
            .ok_or_else(|| RentchainError::Chain(format!("no contract at {:?}", contract)))
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn pending_nonce(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().next_nonce)
    }

    async fn signer_balance(&self) -> Result<U256> {
        Ok(self.inner.lock().unwrap().balance)
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(U256::from(1_000_000_000u64))
    }

    async fn submit(&self, call: ChainCall, nonce: u64, _fee_per_gas: U256) -> Result<H256> {
        let mut inner = self.inner.lock().unwrap();

        if nonce != inner.next_nonce {
            return Err(RentchainError::NonceDesync(format!(
                "nonce too low: expected {}, got {}",
                inner.next_nonce, nonce
            )));
        }

        let inclusion = match &call {
            ChainCall::Deploy(params) => {
                inner.counter += 1;
                let address = Address::from_low_u64_be(0xC0FFEE00 + inner.counter);
                inner.contracts.insert(
                    address,
                    FakeContract {
                        landlord: self.signer,
                        renter: params.renter,
                        content_hash: params.content_hash.clone(),
                        rent: params.rent_amount,
                        deposit: params.deposit_amount,
                        duration_days: params.duration_days,
                        active: false,
                        terminated: false,
                    },
                );
                TxInclusion::Success {
                    contract_address: Some(address),
                }
            }
            ChainCall::Activate { contract, value } => {
                let entry = inner.contracts.get_mut(contract).ok_or_else(|| {
                    RentchainError::Chain(format!("no contract at {:?}", contract))
                })?;
                if entry.terminated {
                    return Err(RentchainError::ChainRejected(
                        "execution reverted: Agreement terminated".into(),
                    ));
                }
                if entry.active {
                    return Err(RentchainError::ChainRejected(
                        "execution reverted: Agreement already active".into(),
                    ));
                }
                let expected = entry.rent + entry.deposit;
                if *value != expected {
                    return Err(RentchainError::ChainRejected(format!(
                        "execution reverted: Incorrect payment, expected {}",
                        expected
                    )));
                }
                entry.active = true;
                TxInclusion::Success {
                    contract_address: None,
                }
            }
            ChainCall::Terminate { contract } => {
                let entry = inner.contracts.get_mut(contract).ok_or_else(|| {
                    RentchainError::Chain(format!("no contract at {:?}", contract))
                })?;
                if entry.terminated {
                    return Err(RentchainError::ChainRejected(
                        "execution reverted: Agreement already terminated".into(),
                    ));
                }
                entry.terminated = true;
                entry.active = false;
                TxInclusion::Success {
                    contract_address: None,
                }
            }
        };

        inner.next_nonce += 1;
        inner.counter += 1;
        let tx_hash = H256::from_low_u64_be(inner.counter);
        inner.receipts.insert(tx_hash, inclusion);
        if inner.withhold_receipts {
            inner.withheld.insert(tx_hash);
        }
        inner.submissions.push((call.kind(), nonce));
        Ok(tx_hash)
    }

    async fn inclusion(&self, tx_hash: H256) -> Result<Option<TxInclusion>> {
        let inner = self.inner.lock().unwrap();
        if inner.withheld.contains(&tx_hash) {
            return Ok(None);
        }
        Ok(inner.receipts.get(&tx_hash).cloned())
    }

    async fn landlord(&self, contract: Address) -> Result<Address> {
        self.read_contract(contract, |c| c.landlord)
    }

    async fn renter(&self, contract: Address) -> Result<Address> {
        self.read_contract(contract, |c| c.renter)
    }

    async fn content_hash(&self, contract: Address) -> Result<String> {
        self.read_contract(contract, |c| c.content_hash.clone())
    }

    async fn rent_amount(&self, contract: Address) -> Result<U256> {
        self.read_contract(contract, |c| c.rent)
    }

    async fn deposit_amount(&self, contract: Address) -> Result<U256> {
        self.read_contract(contract, |c| c.deposit)
    }

    async fn duration_days(&self, contract: Address) -> Result<u64> {
        self.read_contract(contract, |c| c.duration_days)
    }

    async fn is_active(&self, contract: Address) -> Result<bool> {
        self.read_contract(contract, |c| c.active)
    }

    async fn is_terminated(&self, contract: Address) -> Result<bool> {
        self.read_contract(contract, |c| c.terminated)
    }
}

pub struct TestRig {
    pub ledger: Arc<FakeLedger>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<BroadcastQueue>,
    pub coordinator: Arc<LifecycleCoordinator>,
    pub sweep: Arc<ReconciliationSweep>,
}

pub fn test_rig() -> TestRig {
    let ledger = Arc::new(FakeLedger::new());
    let ledger_dyn: Arc<dyn LedgerClient> = ledger.clone();

    let exec = ExecutionConfig {
        confirmation_timeout_secs: 1,
        poll_interval_ms: 1,
        replacement_fee_bump_pct: 15,
        max_nonce_rejections: 3,
    };

    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(BroadcastQueue::new(ledger_dyn.clone(), &exec));
    let aggregator = Arc::new(ReadAggregator::new(ledger_dyn));
    let coordinator = Arc::new(LifecycleCoordinator::new(
        queue.clone(),
        store.clone(),
        aggregator,
        Duration::from_millis(50),
    ));
    let sweep = Arc::new(ReconciliationSweep::new(
        coordinator.clone(),
        store.clone(),
        queue.clone(),
        SweepConfig {
            interval_secs: 3600,
            max_listings_per_cycle: 50,
        },
    ));

    TestRig {
        ledger,
        store,
        queue,
        coordinator,
        sweep,
    }
}
