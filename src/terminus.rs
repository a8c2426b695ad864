use async_trait::async_trait;
use alloy::{
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
    sol,
};
use tracing::info;

use crate::chain::{ChainClient, TxStatus};
use crate::error::{RobotError, RobotResult};
use crate::signer::TransactOpts;

// Subset of the Terminus multi-token contract used by the robots
sol! {
    #[sol(rpc)]
    contract Terminus {
        function balanceOfBatch(address[] memory accounts, uint256[] memory ids) external view returns (uint256[] memory);

        function poolMintBatch(uint256 id, address[] memory toAddresses, uint256[] memory amounts) external;

        function terminusPoolCapacity(uint256 poolID) external view returns (uint256);

        function terminusPoolSupply(uint256 poolID) external view returns (uint256);
    }
}

/// Token contract operations the airdrop cycle depends on
#[async_trait]
pub trait TokenContract: Send + Sync {
    /// One balance per account, in input order
    async fn balance_of_batch(&self, accounts: &[Address], pool_id: U256) -> RobotResult<Vec<U256>>;

    /// Submit a batched mint and return its hash without waiting for a receipt
    async fn pool_mint_batch(
        &self,
        auth: &TransactOpts,
        pool_id: U256,
        to: &[Address],
        amounts: &[U256],
    ) -> RobotResult<TxHash>;

    async fn transaction_status(&self, tx_hash: TxHash) -> RobotResult<TxStatus>;
}

/// Terminus contract client over alloy bindings
pub struct TerminusContract {
    chain: ChainClient,
    instance: Terminus::TerminusInstance<DynProvider>,
}

impl TerminusContract {
    pub fn new(chain: ChainClient, contract_address: Address) -> Self {
        let instance = Terminus::new(contract_address, chain.provider());
        Self { chain, instance }
    }

    pub fn contract_address(&self) -> Address {
        *self.instance.address()
    }

    /// poolMintBatch transaction bound to the sender, chain and gas price of `auth`
    pub fn mint_request(
        &self,
        auth: &TransactOpts,
        pool_id: U256,
        to: &[Address],
        amounts: &[U256],
    ) -> TransactionRequest {
        let mut call = self
            .instance
            .poolMintBatch(pool_id, to.to_vec(), amounts.to_vec())
            .from(auth.from)
            .chain_id(auth.chain_id);
        if let Some(gas_price) = auth.gas_price {
            call = call.gas_price(gas_price);
        }
        call.into_transaction_request()
    }

    /// Current supply and capacity of a pool
    pub async fn pool_usage(&self, pool_id: U256) -> RobotResult<(U256, U256)> {
        let supply = self
            .instance
            .terminusPoolSupply(pool_id)
            .call()
            .await
            .map_err(|e| RobotError::ChainCall(format!("terminusPoolSupply failed: {}", e)))?;
        let capacity = self
            .instance
            .terminusPoolCapacity(pool_id)
            .call()
            .await
            .map_err(|e| RobotError::ChainCall(format!("terminusPoolCapacity failed: {}", e)))?;
        Ok((supply, capacity))
    }
}

#[async_trait]
impl TokenContract for TerminusContract {
    async fn balance_of_batch(&self, accounts: &[Address], pool_id: U256) -> RobotResult<Vec<U256>> {
        let ids = vec![pool_id; accounts.len()];
        let balances = self
            .instance
            .balanceOfBatch(accounts.to_vec(), ids)
            .call()
            .await
            .map_err(|e| RobotError::ChainCall(format!("balanceOfBatch failed: {}", e)))?;

        if balances.len() != accounts.len() {
            return Err(RobotError::ChainCall(format!(
                "balanceOfBatch returned {} balances for {} accounts",
                balances.len(),
                accounts.len()
            )));
        }

        Ok(balances)
    }

    async fn pool_mint_batch(
        &self,
        auth: &TransactOpts,
        pool_id: U256,
        to: &[Address],
        amounts: &[U256],
    ) -> RobotResult<TxHash> {
        if to.is_empty() {
            return Err(RobotError::ChainCall("poolMintBatch called with no recipients".to_string()));
        }
        // Validate input arrays have same length
        if to.len() != amounts.len() {
            return Err(RobotError::ChainCall("Array length mismatch".to_string()));
        }

        info!("Submitting poolMintBatch for {} addresses at pool {}", to.len(), pool_id);

        let request = self.mint_request(auth, pool_id, to, amounts);
        let pending_tx = self
            .chain
            .provider()
            .send_transaction(request)
            .await
            .map_err(|e| RobotError::ChainCall(format!("poolMintBatch failed: {}", e)))?;

        Ok(*pending_tx.tx_hash())
    }

    async fn transaction_status(&self, tx_hash: TxHash) -> RobotResult<TxStatus> {
        self.chain.transaction_status(tx_hash).await
    }
}
