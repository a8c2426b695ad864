//! Keystore-backed transaction signer

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use std::path::{Path, PathBuf};

use crate::error::{RobotError, RobotResult};

pub const SECRETS_DIR_ENV: &str = "ENGINE_ROBOTS_SECRETS_DIR";

/// Authorization for one state-changing contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactOpts {
    pub from: Address,
    pub chain_id: u64,
    /// `None` leaves fee estimation to the provider
    pub gas_price: Option<u128>,
}

pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Produce a transaction authorization bound to `chain_id`
    fn authorize(&self, chain_id: u64) -> RobotResult<TransactOpts>;
}

#[derive(Clone)]
pub struct KeystoreSigner {
    signer: PrivateKeySigner,
}

impl KeystoreSigner {
    /// Resolve keyfile and password file names against the secrets directory.
    pub fn secret_paths(secrets_dir: &Path, keyfile_name: &str, password_file_name: &str) -> (PathBuf, PathBuf) {
        (secrets_dir.join(keyfile_name), secrets_dir.join(password_file_name))
    }

    /// Decrypt a Web3 secret-storage keyfile with the password from `password_path`.
    pub fn load(keyfile_path: &Path, password_path: &Path) -> RobotResult<Self> {
        let raw = std::fs::read_to_string(password_path).map_err(|e| {
            RobotError::Signer(format!("Unable to read password file {}: {}", password_path.display(), e))
        })?;
        let password = first_line(&raw);

        let signer = PrivateKeySigner::decrypt_keystore(keyfile_path, password).map_err(|e| {
            RobotError::Signer(format!("Unable to decrypt keyfile {}: {}", keyfile_path.display(), e))
        })?;

        Ok(Self { signer })
    }

    pub fn from_private_key(private_key: &str) -> RobotResult<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| RobotError::Signer(format!("Invalid private key: {}", e)))?;
        Ok(Self { signer })
    }

    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl TransactionSigner for KeystoreSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn authorize(&self, chain_id: u64) -> RobotResult<TransactOpts> {
        if chain_id == 0 {
            return Err(RobotError::Signer("Chain ID must be set to authorize a transaction".to_string()));
        }
        Ok(TransactOpts {
            from: self.signer.address(),
            chain_id,
            gas_price: None,
        })
    }
}

/// Password files hold the passphrase on the first line.
fn first_line(raw: &str) -> &str {
    raw.split('\n').next().unwrap_or_default().trim_end_matches('\r')
}
