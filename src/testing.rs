//! Recording in-memory collaborators for unit tests

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backoff::{Backoff, BackoffPolicy};
use crate::chain::TxStatus;
use crate::entity::{EntityDirectory, EntityResponse, EntitySearchResponse};
use crate::error::{RobotError, RobotResult};
use crate::networks::GasPolicy;
use crate::pending::PendingTransactions;
use crate::robot::RobotRuntime;
use crate::signer::{TransactOpts, TransactionSigner};
use crate::terminus::TokenContract;

pub const MINT_TX_HASH: TxHash = TxHash::repeat_byte(0xaa);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Unavailable,
    Malformed,
}

#[derive(Default)]
pub struct MockDirectory {
    entities: Mutex<Vec<(String, String)>>,
    fetch_failure: Mutex<Option<FetchFailure>>,
    failing_touches: Mutex<HashSet<String>>,
    panics_remaining: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
    touch_delay: Mutex<Option<Duration>>,
    pub fetch_calls: AtomicUsize,
    pub touched: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn with_entities(entities: &[(&str, &str)]) -> Self {
        let directory = Self::default();
        directory.set_entities(entities);
        directory
    }

    pub fn set_entities(&self, entities: &[(&str, &str)]) {
        *self.entities.lock().unwrap() = entities
            .iter()
            .map(|(id, address)| (id.to_string(), address.to_string()))
            .collect();
    }

    pub fn fail_fetch(&self, failure: FetchFailure) {
        *self.fetch_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_touch(&self, entity_id: &str) {
        self.failing_touches.lock().unwrap().insert(entity_id.to_string());
    }

    /// Panic inside the next `count` fetches
    pub fn panic_on_fetch(&self, count: usize) {
        self.panics_remaining.store(count, Ordering::SeqCst);
    }

    /// Stall every fetch for `delay` before answering
    pub fn delay_fetch(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Stall every touch for `delay` before answering
    pub fn delay_touch(&self, delay: Duration) {
        *self.touch_delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn touched(&self) -> Vec<String> {
        self.touched.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityDirectory for MockDirectory {
    async fn fetch_untouched(&self, collection_id: &str, limit: usize) -> RobotResult<EntitySearchResponse> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.panics_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.panics_remaining.store(remaining - 1, Ordering::SeqCst);
            panic!("entity directory mock panic");
        }

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match *self.fetch_failure.lock().unwrap() {
            Some(FetchFailure::Unavailable) => {
                return Err(RobotError::DirectoryUnavailable("status 503".to_string()))
            }
            Some(FetchFailure::Malformed) => {
                return Err(RobotError::DirectoryMalformed("unexpected body".to_string()))
            }
            None => {}
        }

        // Touched entities drop out of the search like `!touch:true` does
        let touched: HashSet<String> = self.touched.lock().unwrap().iter().cloned().collect();
        let entities: Vec<EntityResponse> = self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|(entity_id, _)| !touched.contains(entity_id))
            .take(limit)
            .map(|(entity_id, address)| EntityResponse {
                entity_id: entity_id.clone(),
                collection_id: collection_id.to_string(),
                address: address.clone(),
                blockchain: "polygon".to_string(),
                name: entity_id.clone(),
                required_fields: Vec::new(),
                created_at: String::new(),
                updated_at: String::new(),
            })
            .collect();

        Ok(EntitySearchResponse {
            total_results: entities.len() as i64,
            offset: 0,
            next_offset: None,
            max_score: None,
            entities,
        })
    }

    async fn mark_touched(&self, _collection_id: &str, entity_id: &str) -> RobotResult<Vec<String>> {
        let delay = *self.touch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_touches.lock().unwrap().contains(entity_id) {
            return Err(RobotError::DirectoryUnavailable("touch rejected".to_string()));
        }
        self.touched.lock().unwrap().push(entity_id.to_string());
        Ok(vec!["touch:true".to_string()])
    }
}

#[derive(Debug, Clone)]
pub struct MintCall {
    pub auth: TransactOpts,
    pub pool_id: U256,
    pub to: Vec<Address>,
    pub amounts: Vec<U256>,
}

#[derive(Default)]
pub struct MockContract {
    balances: Mutex<HashMap<Address, U256>>,
    balance_error: Mutex<Option<String>>,
    mint_error: Mutex<Option<String>>,
    statuses: Mutex<HashMap<TxHash, Result<TxStatus, String>>>,
    status_delays: Mutex<HashMap<TxHash, Duration>>,
    pub balance_calls: AtomicUsize,
    pub mint_calls: Mutex<Vec<MintCall>>,
}

impl MockContract {
    pub fn set_balance(&self, address: Address, balance: u64) {
        self.balances.lock().unwrap().insert(address, U256::from(balance));
    }

    pub fn fail_balances(&self, message: &str) {
        *self.balance_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_mint(&self, message: &str) {
        *self.mint_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_status(&self, tx_hash: TxHash, status: Result<TxStatus, String>) {
        self.statuses.lock().unwrap().insert(tx_hash, status);
    }

    /// Stall receipt lookups of `tx_hash` for `delay`
    pub fn delay_status(&self, tx_hash: TxHash, delay: Duration) {
        self.status_delays.lock().unwrap().insert(tx_hash, delay);
    }

    pub fn balance_count(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn mints(&self) -> Vec<MintCall> {
        self.mint_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenContract for MockContract {
    async fn balance_of_batch(&self, accounts: &[Address], _pool_id: U256) -> RobotResult<Vec<U256>> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.balance_error.lock().unwrap().clone() {
            return Err(RobotError::ChainCall(message));
        }
        let balances = self.balances.lock().unwrap();
        Ok(accounts
            .iter()
            .map(|a| balances.get(a).copied().unwrap_or(U256::ZERO))
            .collect())
    }

    async fn pool_mint_batch(
        &self,
        auth: &TransactOpts,
        pool_id: U256,
        to: &[Address],
        amounts: &[U256],
    ) -> RobotResult<TxHash> {
        self.mint_calls.lock().unwrap().push(MintCall {
            auth: auth.clone(),
            pool_id,
            to: to.to_vec(),
            amounts: amounts.to_vec(),
        });
        if let Some(message) = self.mint_error.lock().unwrap().clone() {
            return Err(RobotError::ChainCall(message));
        }
        Ok(MINT_TX_HASH)
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> RobotResult<TxStatus> {
        let delay = self.status_delays.lock().unwrap().get(&tx_hash).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.statuses.lock().unwrap().get(&tx_hash) {
            Some(Ok(status)) => Ok(*status),
            Some(Err(message)) => Err(RobotError::ChainCall(message.clone())),
            None => Ok(TxStatus::Pending),
        }
    }
}

pub struct MockSigner {
    pub address: Address,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self {
            address: Address::repeat_byte(0x5e),
        }
    }
}

impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn authorize(&self, chain_id: u64) -> RobotResult<TransactOpts> {
        Ok(TransactOpts {
            from: self.address,
            chain_id,
            gas_price: None,
        })
    }
}

pub fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// Robot wired to the given mocks: polygon, pool 7, claim value 10, batch size 20.
pub fn robot(directory: Arc<MockDirectory>, contract: Arc<MockContract>) -> RobotRuntime {
    RobotRuntime {
        blockchain: "polygon".to_string(),
        chain_id: 137,
        gas_policy: GasPolicy::Market,
        collection_id: "collection-1".to_string(),
        pool_id: U256::from(7),
        value_to_claim: U256::from(10),
        batch_size: 20,
        directory,
        contract,
        signer: Arc::new(MockSigner::default()),
        backoff: Backoff::new(BackoffPolicy::default()),
        pending: PendingTransactions::new(16),
        minted_total: Arc::new(AtomicU64::new(0)),
    }
}
