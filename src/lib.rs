//! Airdrop robots: mint Terminus pool tokens to entity directory claimants with an empty balance.

pub mod backoff;
pub mod chain;
pub mod cli;
pub mod config;
pub mod cycle;
pub mod entity;
pub mod error;
pub mod networks;
pub mod pending;
pub mod robot;
pub mod scheduler;
pub mod signer;
pub mod terminus;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RobotError, RobotResult};
