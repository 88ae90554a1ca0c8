//! Reconciliation background service
//!
//! This service periodically:
//! - reconciles non-Terminated listings against authoritative chain state,
//!   self-healing drift left by partial failures (crash between confirmation
//!   and store write, abandoned confirmation waits)
//! - re-checks timed-out deploy transactions for late inclusion and flags
//!   contracts that landed with no listing attached

use chrono::{DateTime, Utc};
use ethers::types::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::coordinator::LifecycleCoordinator;
use crate::queue::{BroadcastQueue, TxOutcome};
use crate::store::ListingStore;

/// Configuration for the reconciliation sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Interval between sweep cycles (seconds)
    pub interval_secs: u64,
    /// Maximum listings reconciled per cycle
    pub max_listings_per_cycle: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_listings_per_cycle: 50,
        }
    }
}

/// Sweep statistics
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    pub cycles: u64,
    pub listings_checked: u64,
    pub drift_corrections: u64,
    pub errors: u64,
    /// Contracts that landed on chain after their deploy wait was abandoned,
    /// with no listing to attach to. Flagged for manual cleanup.
    pub orphaned_contracts: Vec<Address>,
    pub last_cycle: Option<DateTime<Utc>>,
}

/// Reconciliation sweep service
pub struct ReconciliationSweep {
    coordinator: Arc<LifecycleCoordinator>,
    store: Arc<dyn ListingStore>,
    queue: Arc<BroadcastQueue>,
    config: SweepConfig,
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<SweepStats>>,
}

impl ReconciliationSweep {
    pub fn new(
        coordinator: Arc<LifecycleCoordinator>,
        store: Arc<dyn ListingStore>,
        queue: Arc<BroadcastQueue>,
        config: SweepConfig,
    ) -> Self {
        Self {
            coordinator,
            store,
            queue,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(SweepStats::default())),
        }
    }

    pub async fn get_stats(&self) -> SweepStats {
        self.stats.read().await.clone()
    }

    /// Run a single sweep cycle. Also usable as a one-shot from the CLI.
    pub async fn run_cycle(&self) {
        let candidates = match self.store.list_reconcilable().await {
            Ok(listings) => listings,
            Err(e) => {
                error!("Sweep could not list reconcilable listings: {}", e);
                self.stats.write().await.errors += 1;
                return;
            }
        };

        let total = candidates.len();
        let mut checked = 0u64;
        let mut corrected = 0u64;
        let mut errors = 0u64;

        for listing in candidates.into_iter().take(self.config.max_listings_per_cycle) {
            match self.coordinator.reconcile(listing.id).await {
                Ok(report) => {
                    checked += 1;
                    if let Some(drift) = report.drift {
                        warn!(
                            "Sweep corrected listing {}: {} -> {}",
                            listing.id, drift.from, drift.to
                        );
                        corrected += 1;
                    }
                }
                // An in-flight operation owns the listing right now; it will
                // settle the state itself or flag the listing again.
                Err(e) if e.kind() == "invalid_state_transition" => {
                    debug!("Sweep skipped listing {}: {}", listing.id, e);
                }
                Err(e) => {
                    warn!("Sweep failed to reconcile listing {}: {}", listing.id, e);
                    errors += 1;
                }
            }
        }

        if total > self.config.max_listings_per_cycle {
            debug!(
                "Sweep capped at {} of {} candidates this cycle",
                self.config.max_listings_per_cycle, total
            );
        }

        let orphans = self.scan_for_orphans().await;

        let mut stats = self.stats.write().await;
        stats.cycles += 1;
        stats.listings_checked += checked;
        stats.drift_corrections += corrected;
        stats.errors += errors;
        for orphan in orphans {
            if !stats.orphaned_contracts.contains(&orphan) {
                stats.orphaned_contracts.push(orphan);
            }
        }
        stats.last_cycle = Some(Utc::now());
    }

    /// Re-check abandoned deploy transactions. A deploy that landed after
    /// its caller gave up created a contract no listing points at.
    async fn scan_for_orphans(&self) -> Vec<Address> {
        let mut orphans = Vec::new();
        for tx in self.queue.timed_out_deploys() {
            match self.queue.check_inclusion(tx.handle).await {
                Ok(Some(TxOutcome::Confirmed(receipt))) => {
                    if let Some(contract) = receipt.contract_address {
                        error!(
                            "Orphaned agreement contract {:?} (deploy {} landed after \
                             its wait was abandoned); flagging for manual cleanup",
                            contract, tx.handle
                        );
                        orphans.push(contract);
                    }
                }
                Ok(Some(TxOutcome::Reverted(reason))) => {
                    debug!("Abandoned deploy {} reverted on chain: {}", tx.handle, reason);
                }
                Ok(Some(TxOutcome::TimedOut)) | Ok(None) => {}
                Err(e) => {
                    warn!("Orphan check for {} failed: {}", tx.handle, e);
                }
            }
        }
        orphans
    }

    /// Start the periodic sweep loop
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Reconciliation sweep already running");
            return;
        }

        info!(
            "Starting reconciliation sweep (interval: {}s, cap: {} listings/cycle)",
            self.config.interval_secs, self.config.max_listings_per_cycle
        );

        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(service.config.interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately; skip it so startup stays quiet
            ticker.tick().await;

            while service.running.load(Ordering::SeqCst) {
                ticker.tick().await;
                service.run_cycle().await;
            }
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Reconciliation sweep stopping");
    }
}
