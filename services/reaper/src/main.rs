//! fleetwarden reaper
//!
//! The reaper is the lifecycle daemon for warden-managed fleets. It
//! watches every instance carrying the management marker, refreshes the
//! idle marker for instances with an active workload, and reclaims the
//! ones that have been idle past their allowed life span.
//!
//! ## Architecture
//!
//! - **Reaper Worker**: the periodic idle-detection and reclamation cycle
//! - **Tag Ledger**: durable last-active timestamps stored as provider tags
//! - **Reclamation Policy**: stop-vs-terminate with a process-wide ceiling
//! - **Fleet Provider / Remote Probe**: trait-backed collaborators
//!   (in-memory in dev, a real compute provider in production)

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::{Table, Tabled};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_fleet::provision::{launch_fleet, LaunchSpec};
use warden_fleet::{FleetProvider, InMemoryFleet, ManagedInstance, RemoteProbe};
use warden_reaper::config::Config;
use warden_reaper::expiry::ExpiryClassifier;
use warden_reaper::ledger::TagLedger;
use warden_reaper::worker::ReaperWorker;

/// fleetwarden reaper - reclaim idle fleet instances.
#[derive(Debug, Parser)]
#[command(name = "reaper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the reclamation daemon.
    Run,

    /// Launch instances from the latest versioned image.
    Launch {
        /// Number of instances to create.
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Override the configured image naming pattern.
        #[arg(long)]
        image_pattern: Option<String>,
    },

    /// Show managed instances and their expiry classification.
    Status {
        /// Output format (table or json).
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to WARDEN_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let (provider, probe) = build_backend(&config).await?;

    match cli.command {
        Commands::Run => run_daemon(provider, probe, &config).await,
        Commands::Launch {
            count,
            image_pattern,
        } => launch(provider.as_ref(), &config, count, image_pattern.as_deref()).await,
        Commands::Status { format } => status(provider, &config, &format).await,
    }
}

/// Builds the provider/probe pair for the configured backend.
async fn build_backend(
    config: &Config,
) -> Result<(Arc<dyn FleetProvider>, Arc<dyn RemoteProbe>)> {
    match config.provider.as_str() {
        "memory" => {
            let fleet = Arc::new(InMemoryFleet::new(config.tags.clone()));
            if config.dev_mode {
                for name in ["fleet-server-v1", "fleet-server-v2"] {
                    fleet.add_image(name).await;
                }
                info!("Seeded in-memory fleet with dev images");
            }
            Ok((
                fleet.clone() as Arc<dyn FleetProvider>,
                fleet as Arc<dyn RemoteProbe>,
            ))
        }
        other => anyhow::bail!(
            "unsupported provider backend '{other}' (only 'memory' is bundled; \
             production deployments bind their own FleetProvider)"
        ),
    }
}

/// Runs the reaper worker until interrupted.
async fn run_daemon(
    provider: Arc<dyn FleetProvider>,
    probe: Arc<dyn RemoteProbe>,
    config: &Config,
) -> Result<()> {
    info!("Starting fleetwarden reaper");
    info!(
        check_interval_secs = config.check_interval.as_secs(),
        max_life_span_secs = config.max_life_span_secs,
        max_stopped = config.max_stopped,
        provider = %config.provider,
        "Configuration loaded"
    );

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut worker = ReaperWorker::new(provider, probe, config);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    // Wait for shutdown signal (Ctrl+C). No cleanup is required: durable
    // state lives in provider tags and cycles are idempotent.
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Reaper worker did not shut down in time");
    }

    info!("Reaper shutdown complete");
    Ok(())
}

/// Launches instances from the latest matching image.
async fn launch(
    provider: &dyn FleetProvider,
    config: &Config,
    count: u32,
    image_pattern: Option<&str>,
) -> Result<()> {
    let spec = LaunchSpec::new(
        image_pattern.unwrap_or(&config.image_pattern),
        count,
        config.instance_type.clone(),
    );

    let launched = match launch_fleet(provider, &spec).await {
        Ok(launched) => launched,
        Err(e) => {
            error!(error = %e, "Launch failed");
            return Err(e.into());
        }
    };

    println!(
        "{} launched {} instance(s)",
        "Success:".green().bold(),
        launched.len()
    );
    let rows: Vec<StatusRow> = launched.iter().map(StatusRow::plain).collect();
    println!("{}", Table::new(&rows));
    Ok(())
}

/// A row of `reaper status` output.
#[derive(Tabled, serde::Serialize)]
struct StatusRow {
    #[tabled(rename = "INSTANCE")]
    id: String,

    #[tabled(rename = "STATE")]
    state: String,

    #[tabled(rename = "LAUNCHED")]
    launched: String,

    #[tabled(rename = "UPTIME")]
    uptime: String,

    #[tabled(rename = "EXPIRED")]
    expired: String,
}

impl StatusRow {
    /// Row without a classification (used right after launch).
    fn plain(instance: &ManagedInstance) -> Self {
        Self {
            id: instance.id.to_string(),
            state: instance.state.to_string(),
            launched: instance.launch_time.to_rfc3339(),
            uptime: "-".to_string(),
            expired: "-".to_string(),
        }
    }
}

/// Prints every managed instance with its expiry classification.
async fn status(provider: Arc<dyn FleetProvider>, config: &Config, format: &str) -> Result<()> {
    let instances = provider.list_managed_instances().await?;

    // Classification only; no marker refresh and no reclamation here.
    let ledger = TagLedger::new(provider.clone(), config.tags.idle_key.clone());
    let classifier = ExpiryClassifier::new(ledger, config.max_life_span_secs);

    let now = chrono::Utc::now();
    let mut rows = Vec::with_capacity(instances.len());
    for instance in &instances {
        let (uptime, expired) = match classifier.classify(instance, now).await {
            Ok(decision) => (
                format!("{}s", decision.uptime.num_seconds()),
                if decision.expired {
                    "yes".red().bold().to_string()
                } else {
                    "no".green().to_string()
                },
            ),
            Err(e) => ("?".to_string(), e.to_string().yellow().to_string()),
        };

        rows.push(StatusRow {
            id: instance.id.to_string(),
            state: instance.state.to_string(),
            launched: instance.launch_time.to_rfc3339(),
            uptime,
            expired,
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("{}", "No managed instances found.".dimmed());
            } else {
                println!("{}", Table::new(&rows));
            }
        }
    }

    Ok(())
}
