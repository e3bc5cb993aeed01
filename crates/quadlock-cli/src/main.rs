//! quadlock - four-factor door controller
//!
//! Loads the controller configuration (writing a default file on first
//! run), composes the devices, opens the credential store and runs the
//! orchestrator until the console quits or Ctrl-C arrives. Either way the
//! door is locked before the process exits.

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use quadlock_controller::{ControllerConfig, Devices, HardwareMode, Orchestrator};
use quadlock_hardware::HardwareError;
use quadlock_storage::{CredentialStore, JsonFileBackend};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::console::Console;

#[derive(Debug, Parser)]
#[command(name = "quadlock", version, about = "Four-factor door access controller")]
struct Args {
    /// Controller configuration file; created with defaults if missing
    #[arg(short, long, default_value = "quadlock.json")]
    config: PathBuf,

    /// Use simulated devices regardless of the configured hardware mode
    #[arg(long)]
    simulate: bool,

    /// Override the credential file from the configuration
    #[arg(long)]
    credentials: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quadlock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting quadlock v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_or_create_config(&args.config)?;
    if args.simulate {
        config.hardware_mode = HardwareMode::Simulated;
    }
    if let Some(path) = args.credentials {
        config.credential_path = path;
    }

    let (devices, sim) = match config.hardware_mode {
        HardwareMode::Simulated => {
            warn!("Simulated hardware active, devices are driven from the console");
            Devices::simulated()
        }
        HardwareMode::Physical => {
            let e = HardwareError::initialization_failed(
                "no physical device drivers in this build, run with --simulate",
            );
            error!(error = %e, "Hardware initialization failed");
            return Err(e.into());
        }
    };

    let store = CredentialStore::open(JsonFileBackend::new(&config.credential_path))
        .await
        .with_context(|| {
            format!(
                "failed to open credentials at {}",
                config.credential_path.display()
            )
        })?;

    let controller = Orchestrator::spawn(config, devices, store).await?;
    let renderer = tokio::spawn(console::render_events(controller.clone()));
    let console = Console::new(controller.clone(), sim);

    tokio::select! {
        result = console.run() => {
            if let Err(e) = result {
                error!(error = %e, "Console failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    if let Err(e) = controller.request_exit().await {
        warn!(error = %e, "Controller already stopped");
    }
    controller.join().await?;
    renderer.await.ok();

    info!("Door locked, bye");
    Ok(())
}

fn load_or_create_config(path: &Path) -> Result<ControllerConfig> {
    if path.exists() {
        let config = ControllerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!(path = %path.display(), "Configuration loaded");
        return Ok(config);
    }

    let config = ControllerConfig::default();
    config
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Created default configuration");
    Ok(config)
}
