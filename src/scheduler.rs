//! Adaptive polling loop per robot and the supervisor that runs them all

use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::config::Settings;
use crate::cycle::run_cycle_within;
use crate::robot::RobotRuntime;

// Restart delays stop doubling past base * 2^10
const MAX_RESTART_EXPONENT: u32 = 10;

fn robot_span(robot: &RobotRuntime) -> Span {
    info_span!(
        "robot",
        blockchain = %robot.blockchain,
        pool_id = %robot.pool_id,
        collection_id = %robot.collection_id,
        signer = %robot.signer.address(),
    )
}

/// Resolves once shutdown was requested or every sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Run cycles for one robot until shutdown, sleeping for the current backoff in between.
///
/// Returns the final runtime state.
pub async fn run_robot(
    mut robot: RobotRuntime,
    cycle_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> RobotRuntime {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = run_cycle_within(&robot, cycle_timeout).await;

        match &outcome {
            Ok(report) if report.minted > 0 => info!(
                "Cycle minted to {} of {} candidates",
                report.minted, report.candidates
            ),
            Ok(report) if report.candidates > 0 => {
                info!("Cycle touched {} candidates, none eligible", report.touched)
            }
            Ok(_) => {}
            Err(e) if e.is_cycle_fatal() => error!("Airdrop cycle failed: {}", e),
            Err(e) => error!("Airdrop cycle misconfigured: {}", e),
        }
        robot
            .backoff
            .record(outcome.as_ref().ok().map(|report| report.minted));

        match tokio::time::timeout(cycle_timeout, robot.reconcile_pending()).await {
            Ok(summary) if summary.confirmed + summary.reverted > 0 => info!(
                "Settled {} confirmed and {} reverted mint transactions, {} still pending",
                summary.confirmed,
                summary.reverted,
                robot.pending.len()
            ),
            Ok(_) => {}
            Err(_) => warn!("Pending transaction reconciliation timed out"),
        }

        let delay = robot.backoff.delay();
        info!("Sleeping for {} seconds before next cycle", delay.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }

    info!("Robot {} stopped", robot.label());
    robot
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub cycle_timeout: Duration,
    pub max_restarts: u32,
    pub restart_base_delay: Duration,
}

impl From<&Settings> for SupervisorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            cycle_timeout: Duration::from_secs(settings.cycle_timeout_seconds),
            max_restarts: settings.max_restarts,
            restart_base_delay: Duration::from_secs(settings.restart_base_delay_seconds),
        }
    }
}

/// `base * 2^restarts` plus up to one `base` of random jitter
pub fn restart_delay(base: Duration, restarts: u32) -> Duration {
    let factor = 1u32 << restarts.min(MAX_RESTART_EXPONENT);
    let base_millis = base.as_millis() as u64;
    let jitter = if base_millis == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..base_millis)
    };
    base.saturating_mul(factor) + Duration::from_millis(jitter)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    pub stopped: usize,
    pub restarts: u32,
    /// Robots that exhausted their restarts
    pub abandoned: usize,
}

struct RobotSlot {
    initial: RobotRuntime,
    restarts: u32,
}

/// Runs every robot as its own task and restarts the ones that panic.
pub struct RobotSupervisor {
    settings: SupervisorSettings,
    shutdown: watch::Receiver<bool>,
    tasks: JoinSet<RobotRuntime>,
    slots: HashMap<task::Id, RobotSlot>,
}

impl RobotSupervisor {
    pub fn new(settings: SupervisorSettings, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            settings,
            shutdown,
            tasks: JoinSet::new(),
            slots: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn(&mut self, robot: RobotRuntime) {
        info!("Starting robot {}", robot.label());
        self.spawn_slot(
            RobotSlot {
                initial: robot,
                restarts: 0,
            },
            Duration::ZERO,
        );
    }

    fn spawn_slot(&mut self, slot: RobotSlot, delay: Duration) {
        let robot = slot.initial.clone();
        let span = robot_span(&robot);
        let cycle_timeout = self.settings.cycle_timeout;
        let mut shutdown = self.shutdown.clone();

        let handle = self.tasks.spawn(
            async move {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown_requested(&mut shutdown) => return robot,
                    }
                }
                run_robot(robot, cycle_timeout, shutdown).await
            }
            .instrument(span),
        );
        self.slots.insert(handle.id(), slot);
    }

    /// Drive all robots until every task has stopped.
    pub async fn run(mut self) -> SupervisorReport {
        let mut report = SupervisorReport::default();

        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, robot)) => {
                    self.slots.remove(&id);
                    info!(
                        "Robot {} exited after minting to {} addresses",
                        robot.label(),
                        robot.minted_total()
                    );
                    report.stopped += 1;
                }
                Err(err) => {
                    let Some(mut slot) = self.slots.remove(&err.id()) else {
                        continue;
                    };
                    let label = slot.initial.label();

                    if *self.shutdown.borrow() {
                        warn!("Robot {} terminated during shutdown: {}", label, err);
                        report.stopped += 1;
                        continue;
                    }
                    if slot.restarts >= self.settings.max_restarts {
                        error!(
                            "Robot {} terminated ({}), giving up after {} restarts",
                            label, err, slot.restarts
                        );
                        report.abandoned += 1;
                        continue;
                    }

                    let delay = restart_delay(self.settings.restart_base_delay, slot.restarts);
                    slot.restarts += 1;
                    report.restarts += 1;
                    warn!(
                        "Robot {} terminated ({}), restart {} of {} in {:?}",
                        label, err, slot.restarts, self.settings.max_restarts, delay
                    );
                    self.spawn_slot(slot, delay);
                }
            }
        }

        report
    }
}
