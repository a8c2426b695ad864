//! Blockchain RPC connection shared by the contract proxy of one robot

use alloy::{
    network::{EthereumWallet, ReceiptResponse},
    primitives::TxHash,
    providers::{DynProvider, Provider, ProviderBuilder},
};
use tracing::info;

use crate::error::{RobotError, RobotResult};
use crate::networks::Network;

/// Outcome of a submitted transaction as seen by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
}

#[derive(Clone)]
pub struct ChainClient {
    network: Network,
    provider: DynProvider,
}

impl ChainClient {
    /// Build an HTTP provider with the recommended fillers and the robot's wallet.
    pub fn new(network: Network, wallet: EthereumWallet) -> RobotResult<Self> {
        let url: reqwest::Url = network
            .endpoint
            .parse()
            .map_err(|e| RobotError::Config(format!("Invalid RPC URL for {}: {}", network.name, e)))?;

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();

        Ok(Self { network, provider })
    }

    /// Check that the endpoint serves the expected chain and return its suggested gas price.
    pub async fn connect(&self) -> RobotResult<u128> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| RobotError::ChainCall(format!("Failed to get chain ID from {}: {}", self.network.name, e)))?;

        if chain_id != self.network.chain_id {
            return Err(RobotError::Config(format!(
                "Endpoint for {} reports chain ID {}, expected {}",
                self.network.name, chain_id, self.network.chain_id
            )));
        }

        let gas_price = self.suggested_gas_price().await?;
        info!(
            "Connected to {} (chain ID {}), suggested gas price {} wei",
            self.network.name, chain_id, gas_price
        );
        Ok(gas_price)
    }

    pub async fn suggested_gas_price(&self) -> RobotResult<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| RobotError::ChainCall(format!("Failed to fetch gas price: {}", e)))
    }

    pub async fn transaction_status(&self, tx_hash: TxHash) -> RobotResult<TxStatus> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RobotError::ChainCall(format!("Failed to get receipt for {}: {}", tx_hash, e)))?;

        Ok(match receipt {
            None => TxStatus::Pending,
            Some(receipt) if receipt.status() => TxStatus::Confirmed,
            Some(_) => TxStatus::Reverted,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn provider(&self) -> DynProvider {
        self.provider.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::GasPolicy;
    use crate::signer::KeystoreSigner;

    fn network(endpoint: &str) -> Network {
        Network {
            name: "polygon".to_string(),
            endpoint: endpoint.to_string(),
            chain_id: 137,
            gas_policy: GasPolicy::Market,
        }
    }

    fn wallet() -> EthereumWallet {
        KeystoreSigner::from_private_key("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
            .wallet()
    }

    #[tokio::test]
    async fn test_chain_client_creation() {
        let client = ChainClient::new(network("http://localhost:8545"), wallet());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().network().chain_id, 137);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_config_error() {
        let client = ChainClient::new(network("not a url"), wallet());
        assert!(matches!(client, Err(RobotError::Config(_))));
    }
}
