//! Static registry of supported blockchains: RPC endpoint, chain ID and fee model

use alloy::primitives::Address;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{RobotError, RobotResult};

pub const NODEBALANCER_ACCESS_ID_ENV: &str = "ENGINE_NODEBALANCER_ACCESS_ID";

/// How the gas price of a mint transaction is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPolicy {
    /// Let the provider fillers estimate fees
    Market,
    /// Chains whose fee model requires a zero gas price
    Zero,
}

impl GasPolicy {
    pub fn gas_price_override(&self) -> Option<u128> {
        match self {
            GasPolicy::Market => None,
            GasPolicy::Zero => Some(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub endpoint: String,
    pub chain_id: u64,
    pub gas_policy: GasPolicy,
}

struct NetworkSpec {
    name: &'static str,
    chain_id: u64,
    endpoint_env: &'static str,
    contract_env: &'static str,
    nodebalancer: bool,
    gas_policy: GasPolicy,
}

const NETWORKS: &[NetworkSpec] = &[
    NetworkSpec {
        name: "polygon",
        chain_id: 137,
        endpoint_env: "MOONSTREAM_POLYGON_WEB3_PROVIDER_URI",
        contract_env: "MOONSTREAM_TERMINUS_DIAMOND_CONTRACT_POLYGON_ADDRESS",
        nodebalancer: true,
        gas_policy: GasPolicy::Market,
    },
    NetworkSpec {
        name: "mumbai",
        chain_id: 80001,
        endpoint_env: "MOONSTREAM_MUMBAI_WEB3_PROVIDER_URI",
        contract_env: "MOONSTREAM_TERMINUS_DIAMOND_CONTRACT_MUMBAI_ADDRESS",
        nodebalancer: true,
        gas_policy: GasPolicy::Market,
    },
    NetworkSpec {
        name: "caldera",
        chain_id: 322,
        endpoint_env: "MOONSTREAM_CALDERA_WEB3_PROVIDER_URI",
        contract_env: "MOONSTREAM_TERMINUS_DIAMOND_CONTRACT_CALDERA_ADDRESS",
        nodebalancer: false,
        gas_policy: GasPolicy::Zero,
    },
];

/// Snapshot of the environment variables the registry depends on.
pub struct NetworkRegistry {
    vars: HashMap<&'static str, String>,
}

impl NetworkRegistry {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut vars = HashMap::new();
        let keys = NETWORKS
            .iter()
            .flat_map(|n| [n.endpoint_env, n.contract_env])
            .chain(std::iter::once(NODEBALANCER_ACCESS_ID_ENV));
        for key in keys {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                vars.insert(key, value);
            }
        }
        Self { vars }
    }

    pub fn supported() -> impl Iterator<Item = &'static str> {
        NETWORKS.iter().map(|n| n.name)
    }

    fn entry(blockchain: &str) -> RobotResult<&'static NetworkSpec> {
        NETWORKS
            .iter()
            .find(|n| n.name == blockchain)
            .ok_or_else(|| RobotError::Config(format!("Not supported blockchain: {}", blockchain)))
    }

    fn var(&self, key: &str) -> RobotResult<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| RobotError::Config(format!("Environment variable {} should be specified", key)))
    }

    pub fn resolve(&self, blockchain: &str) -> RobotResult<Network> {
        let entry = Self::entry(blockchain)?;
        let uri = self.var(entry.endpoint_env)?;

        let endpoint = if entry.nodebalancer {
            let access_id = self.var(NODEBALANCER_ACCESS_ID_ENV)?;
            format!("{}?access_id={}&data_source=blockchain", uri, access_id)
        } else {
            uri.to_string()
        };

        Ok(Network {
            name: entry.name.to_string(),
            endpoint,
            chain_id: entry.chain_id,
            gas_policy: entry.gas_policy,
        })
    }

    /// Terminus contract deployed on the given blockchain
    pub fn terminus_address(&self, blockchain: &str) -> RobotResult<Address> {
        let entry = Self::entry(blockchain)?;
        let raw = self.var(entry.contract_env)?;
        Address::from_str(raw).map_err(|e| {
            RobotError::Config(format!("Invalid Terminus {} contract address {}: {}", blockchain, raw, e))
        })
    }
}
