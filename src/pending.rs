//! Ledger of submitted mint transactions awaiting a receipt

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::chain::TxStatus;
use crate::terminus::TokenContract;

#[derive(Debug, Clone)]
pub struct PendingMint {
    pub tx_hash: TxHash,
    pub pool_id: U256,
    pub recipients: Vec<Address>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub confirmed: usize,
    pub reverted: usize,
    pub pending: usize,
    pub lookup_failures: usize,
}

#[derive(Debug)]
struct Ledger {
    entries: VecDeque<PendingMint>,
    limit: usize,
}

/// Shared handle to a robot's ledger. Clones see the same entries, so the ledger
/// outlives a robot task that is restarted by the supervisor.
#[derive(Debug, Clone)]
pub struct PendingTransactions {
    ledger: Arc<Mutex<Ledger>>,
}

impl PendingTransactions {
    pub fn new(limit: usize) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                entries: VecDeque::new(),
                limit: limit.max(1),
            })),
        }
    }

    // Never held across an await
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Tracked hashes, oldest first
    pub fn tx_hashes(&self) -> Vec<TxHash> {
        self.lock().entries.iter().map(|e| e.tx_hash).collect()
    }

    /// Recipients of mints that have not settled yet
    pub fn unsettled_recipients(&self) -> HashSet<Address> {
        self.lock()
            .entries
            .iter()
            .flat_map(|e| e.recipients.iter().copied())
            .collect()
    }

    pub fn record(&self, tx_hash: TxHash, pool_id: U256, recipients: Vec<Address>) {
        let mut ledger = self.lock();
        if ledger.entries.len() >= ledger.limit {
            if let Some(dropped) = ledger.entries.pop_front() {
                warn!(
                    "Pending transaction ledger full, no longer tracking {} submitted at {}",
                    dropped.tx_hash, dropped.submitted_at
                );
            }
        }
        ledger.entries.push_back(PendingMint {
            tx_hash,
            pool_id,
            recipients,
            submitted_at: Utc::now(),
        });
    }

    /// Look up receipts of tracked transactions; settled ones leave the ledger.
    ///
    /// Entries are only removed after every lookup finished, so dropping this future
    /// part way leaves the ledger untouched.
    pub async fn reconcile(&self, contract: &dyn TokenContract) -> ReconcileSummary {
        let tracked: Vec<PendingMint> = self.lock().entries.iter().cloned().collect();
        let mut summary = ReconcileSummary::default();
        let mut settled = HashSet::new();

        for entry in &tracked {
            match contract.transaction_status(entry.tx_hash).await {
                Ok(TxStatus::Confirmed) => {
                    info!(
                        "Mint transaction {} for {} addresses at pool {} confirmed",
                        entry.tx_hash,
                        entry.recipients.len(),
                        entry.pool_id
                    );
                    summary.confirmed += 1;
                    settled.insert(entry.tx_hash);
                }
                Ok(TxStatus::Reverted) => {
                    error!(
                        "Mint transaction {} at pool {} reverted, recipients not minted: {:?}",
                        entry.tx_hash, entry.pool_id, entry.recipients
                    );
                    summary.reverted += 1;
                    settled.insert(entry.tx_hash);
                }
                Ok(TxStatus::Pending) => summary.pending += 1,
                Err(e) => {
                    warn!("Unable to check mint transaction {}: {}", entry.tx_hash, e);
                    summary.lookup_failures += 1;
                }
            }
        }

        if !settled.is_empty() {
            self.lock().entries.retain(|e| !settled.contains(&e.tx_hash));
        }
        summary
    }
}
