//! Per-robot runtime state and its construction from configuration

use alloy::primitives::U256;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::chain::ChainClient;
use crate::config::{RobotConfig, Settings};
use crate::entity::EntityDirectory;
use crate::networks::{GasPolicy, NetworkRegistry};
use crate::pending::{PendingTransactions, ReconcileSummary};
use crate::signer::{KeystoreSigner, TransactionSigner};
use crate::terminus::{TerminusContract, TokenContract};

/// Everything one robot needs to run its cycles. Robots never share a runtime.
///
/// The pending ledger and the mint counter are shared handles: a clone kept by the
/// supervisor sees what the running task recorded, including after a panic.
#[derive(Clone)]
pub struct RobotRuntime {
    pub blockchain: String,
    pub chain_id: u64,
    pub gas_policy: GasPolicy,
    pub collection_id: String,
    pub pool_id: U256,
    pub value_to_claim: U256,
    pub batch_size: usize,
    pub directory: Arc<dyn EntityDirectory>,
    pub contract: Arc<dyn TokenContract>,
    pub signer: Arc<dyn TransactionSigner>,
    pub backoff: Backoff,
    pub pending: PendingTransactions,
    /// Addresses included in accepted mint transactions since start
    pub minted_total: Arc<AtomicU64>,
}

impl RobotRuntime {
    pub fn label(&self) -> String {
        format!("{}/pool-{}/{}", self.blockchain, self.pool_id, self.collection_id)
    }

    pub fn minted_total(&self) -> u64 {
        self.minted_total.load(Ordering::Relaxed)
    }

    pub fn record_minted(&self, count: usize) -> u64 {
        self.minted_total.fetch_add(count as u64, Ordering::Relaxed) + count as u64
    }

    pub async fn reconcile_pending(&self) -> ReconcileSummary {
        if self.pending.is_empty() {
            return ReconcileSummary::default();
        }
        self.pending.reconcile(self.contract.as_ref()).await
    }
}

/// Build a robot from its configuration, failing on anything that would make it unusable.
pub async fn build_robot(
    config: &RobotConfig,
    settings: &Settings,
    registry: &NetworkRegistry,
    directory: Arc<dyn EntityDirectory>,
    secrets_dir: &Path,
) -> Result<RobotRuntime> {
    let network = registry
        .resolve(&config.blockchain)
        .with_context(|| format!("Unable to resolve network for collection {}", config.collection_id))?;
    let contract_address = registry.terminus_address(&config.blockchain)?;

    let (keyfile_path, password_path) = KeystoreSigner::secret_paths(
        secrets_dir,
        &config.signer_keyfile_name,
        &config.signer_password_file_name,
    );
    let signer = KeystoreSigner::load(&keyfile_path, &password_path)
        .with_context(|| format!("Unable to load signer for collection {}", config.collection_id))?;

    let chain_id = network.chain_id;
    let gas_policy = network.gas_policy;
    let chain = ChainClient::new(network, signer.wallet())?;
    chain
        .connect()
        .await
        .with_context(|| format!("Unable to connect to {}", config.blockchain))?;

    let pool_id = U256::from(config.terminus_pool_id);
    let contract = TerminusContract::new(chain, contract_address);
    match contract.pool_usage(pool_id).await {
        Ok((supply, capacity)) => info!(
            "Terminus {} pool {}: supply {} of capacity {}",
            contract.contract_address(),
            pool_id,
            supply,
            capacity
        ),
        Err(e) => warn!("Unable to read pool {} usage: {}", pool_id, e),
    }

    info!(
        "Robot for collection {} ready on {} with signer {}",
        config.collection_id,
        config.blockchain,
        signer.address()
    );

    Ok(RobotRuntime {
        blockchain: config.blockchain.clone(),
        chain_id,
        gas_policy,
        collection_id: config.collection_id.clone(),
        pool_id,
        value_to_claim: U256::from(config.value_to_claim),
        batch_size: settings.batch_size,
        directory,
        contract: Arc::new(contract),
        signer: Arc::new(signer),
        backoff: Backoff::new(BackoffPolicy::from(settings)),
        pending: PendingTransactions::new(settings.pending_tx_limit),
        minted_total: Arc::new(AtomicU64::new(0)),
    })
}
