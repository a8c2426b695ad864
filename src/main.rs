use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airdrop_robots::cli::{Cli, Command};
use airdrop_robots::config::{generate_default_config, load_robot_configs, ConfigPlacement, Settings};
use airdrop_robots::entity::{EntityDirectory, HttpEntityClient, ENTITY_URL_ENV};
use airdrop_robots::networks::NetworkRegistry;
use airdrop_robots::robot::build_robot;
use airdrop_robots::scheduler::{RobotSupervisor, SupervisorSettings};
use airdrop_robots::signer::SECRETS_DIR_ENV;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Version => println!("v{}", env!("CARGO_PKG_VERSION")),
        Command::GenerateConfig { config } => {
            let placement = ConfigPlacement::prepare(config.as_deref())?;
            generate_default_config(&placement)?;
            println!("{}", placement.config_path.display());
        }
        Command::Run { config } => run(config.as_deref()).await?,
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("Environment variable {} should be specified", key))
}

async fn run(config_path: Option<&str>) -> Result<()> {
    // Settings::load reads .env, so it goes before any direct env lookup
    let settings = Settings::load().context("Unable to load runtime settings")?;

    let placement = ConfigPlacement::prepare(config_path)?;
    if !placement.config_exists {
        anyhow::bail!(
            "Config file {} not found, create it with generate-config",
            placement.config_path.display()
        );
    }
    let configs = load_robot_configs(&placement.config_path)?;
    if configs.is_empty() {
        warn!("No robots configured in {}", placement.config_path.display());
        return Ok(());
    }
    info!("Loaded configuration for {} robots", configs.len());

    let secrets_dir = PathBuf::from(required_env(SECRETS_DIR_ENV)?);
    let entity_url = required_env(ENTITY_URL_ENV)?;
    let registry = NetworkRegistry::from_env();

    let directory: Arc<dyn EntityDirectory> = Arc::new(HttpEntityClient::new(
        &entity_url,
        Duration::from_secs(settings.search_timeout_seconds),
        Duration::from_secs(settings.touch_timeout_seconds),
    ));

    // Every robot must build before any starts
    let mut robots = Vec::with_capacity(configs.len());
    for config in &configs {
        let robot = build_robot(config, &settings, &registry, directory.clone(), &secrets_dir)
            .await
            .with_context(|| {
                format!(
                    "Unable to start robot for collection {} on {}",
                    config.collection_id, config.blockchain
                )
            })?;
        robots.push(robot);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = RobotSupervisor::new(SupervisorSettings::from(&settings), shutdown_rx);
    for robot in robots {
        supervisor.spawn(robot);
    }
    info!("Spawned {} robots", supervisor.len());

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping robots");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Unable to listen for shutdown signal: {}", e);
                // Dropping the sender would stop every robot
                std::future::pending::<()>().await;
            }
        }
    });

    let report = supervisor.run().await;
    info!(
        "All robots stopped: {} exited, {} restarts, {} abandoned",
        report.stopped, report.restarts, report.abandoned
    );

    Ok(())
}
