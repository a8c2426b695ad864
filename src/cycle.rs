//! One fetch, filter, mint and touch pass of a robot

use alloy::primitives::{Address, TxHash, U256};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::entity::EntityResponse;
use crate::error::{RobotError, RobotResult};
use crate::robot::RobotRuntime;

/// Entities requested from the directory per cycle
pub const BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub entity_id: String,
    pub address: Address,
}

impl TryFrom<&EntityResponse> for Claimant {
    type Error = RobotError;

    fn try_from(entity: &EntityResponse) -> Result<Self, Self::Error> {
        let address = entity.address.trim().parse::<Address>().map_err(|e| {
            RobotError::DirectoryMalformed(format!(
                "Entity {} has invalid address {:?}: {}",
                entity.entity_id, entity.address, e
            ))
        })?;
        Ok(Self {
            entity_id: entity.entity_id.clone(),
            address,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entities returned by the directory
    pub candidates: usize,
    /// Addresses included in the mint batch
    pub minted: usize,
    pub touched: usize,
    pub touch_failures: usize,
    pub tx_hash: Option<TxHash>,
}

/// Addresses with an empty balance, first occurrence only.
fn empty_balance_addresses(claimants: &[Claimant], balances: &[U256]) -> Vec<Address> {
    let mut seen = HashSet::new();
    claimants
        .iter()
        .zip(balances)
        .filter(|(_, balance)| balance.is_zero())
        .map(|(claimant, _)| claimant.address)
        .filter(|address| seen.insert(*address))
        .collect()
}

/// Result of the fetch, balance and mint steps: entities still to be touched.
#[derive(Debug, Clone, Default)]
pub struct SubmittedBatch {
    report: CycleReport,
    entity_ids: Vec<String>,
}

/// Run one airdrop cycle for the robot.
pub async fn run_cycle(robot: &RobotRuntime) -> RobotResult<CycleReport> {
    let batch = submit_batch(robot).await?;
    Ok(touch_candidates(robot, batch).await)
}

/// Run one airdrop cycle, bounding everything up to the mint submission by `limit`.
///
/// Once a mint was accepted the touch pass always completes, so minted claimants are
/// not handed out again by the directory.
pub async fn run_cycle_within(robot: &RobotRuntime, limit: Duration) -> RobotResult<CycleReport> {
    let batch = tokio::time::timeout(limit, submit_batch(robot))
        .await
        .map_err(|_| RobotError::CycleTimeout(limit))??;
    Ok(touch_candidates(robot, batch).await)
}

/// Fetch untouched entities, check balances and submit the mint for empty ones.
///
/// Any failure returns before an entity is touched, so the same entities are picked up
/// again next cycle.
pub async fn submit_batch(robot: &RobotRuntime) -> RobotResult<SubmittedBatch> {
    let search = robot
        .directory
        .fetch_untouched(&robot.collection_id, robot.batch_size)
        .await?;

    if search.entities.is_empty() {
        debug!("No untouched entities in collection {}", robot.collection_id);
        return Ok(SubmittedBatch::default());
    }

    info!(
        "Received {} entities from collection {} ({} untouched in total)",
        search.entities.len(),
        robot.collection_id,
        search.total_results
    );

    let mut claimants = Vec::with_capacity(search.entities.len());
    let mut unusable = Vec::new();
    for entity in &search.entities {
        match Claimant::try_from(entity) {
            Ok(claimant) => claimants.push(claimant),
            Err(e) => {
                warn!("Skipping entity: {}", e);
                unusable.push(entity.entity_id.clone());
            }
        }
    }

    let mut report = CycleReport {
        candidates: search.entities.len(),
        ..CycleReport::default()
    };

    let mut recipients = Vec::new();
    if !claimants.is_empty() {
        let addresses: Vec<Address> = claimants.iter().map(|c| c.address).collect();
        let balances = robot.contract.balance_of_batch(&addresses, robot.pool_id).await?;
        if balances.len() != addresses.len() {
            return Err(RobotError::ChainCall(format!(
                "balanceOfBatch returned {} balances for {} accounts",
                balances.len(),
                addresses.len()
            )));
        }
        recipients = empty_balance_addresses(&claimants, &balances);
    }

    // A mint still awaiting its receipt already covers these addresses
    let unsettled = robot.pending.unsettled_recipients();
    if !unsettled.is_empty() {
        let before = recipients.len();
        recipients.retain(|address| !unsettled.contains(address));
        if recipients.len() < before {
            info!(
                "Skipping {} addresses with an unconfirmed mint in flight",
                before - recipients.len()
            );
        }
    }

    if !recipients.is_empty() {
        info!(
            "Ready to send tokens for {} addresses at pool {}",
            recipients.len(),
            robot.pool_id
        );

        let mut auth = robot.signer.authorize(robot.chain_id)?;
        if let Some(gas_price) = robot.gas_policy.gas_price_override() {
            auth.gas_price = Some(gas_price);
        }
        let amounts = vec![robot.value_to_claim; recipients.len()];

        let tx_hash = robot
            .contract
            .pool_mint_batch(&auth, robot.pool_id, &recipients, &amounts)
            .await?;

        info!(
            "Pending tx for poolMintBatch on blockchain {} at pool ID {}: {}",
            robot.blockchain, robot.pool_id, tx_hash
        );

        report.minted = recipients.len();
        report.tx_hash = Some(tx_hash);
        robot.record_minted(recipients.len());
        robot.pending.record(tx_hash, robot.pool_id, recipients);
    }

    let entity_ids = claimants
        .into_iter()
        .map(|c| c.entity_id)
        .chain(unusable)
        .collect();

    Ok(SubmittedBatch { report, entity_ids })
}

/// Mark every candidate of the batch as touched; failures are logged and skipped.
pub async fn touch_candidates(robot: &RobotRuntime, batch: SubmittedBatch) -> CycleReport {
    let SubmittedBatch { mut report, entity_ids } = batch;
    if entity_ids.is_empty() {
        return report;
    }

    for entity_id in &entity_ids {
        match robot.directory.mark_touched(&robot.collection_id, entity_id).await {
            Ok(_) => report.touched += 1,
            Err(e) => {
                warn!("Unable to touch entity {}: {}", entity_id, e);
                report.touch_failures += 1;
            }
        }
    }

    info!(
        "Marked {} of {} entities as touched, {} minted by this robot so far",
        report.touched,
        report.candidates,
        robot.minted_total()
    );

    report
}
