//! `emubridge` command line: serve emulator connections or inspect an action map.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use emubridge_runtime::{ActionMap, Bridge, BridgeConfig, BridgeServer, BridgeState};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "emubridge",
    version,
    about = "TCP bridge between an emulator script and a per-tick decision policy"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve emulator connections, choosing a random action on every UPDATE.
    Serve {
        /// Path to emubridge.toml
        #[arg(long)]
        config: PathBuf,
        /// Listen address, overrides `server.address`
        #[arg(long)]
        address: Option<String>,
    },
    /// Print the action map built from the `[[actions]]` tables.
    ActionMap {
        /// Path to emubridge.toml
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config, address } => serve(&config, address),
        Command::ActionMap { config } => print_action_map(&config),
    }
}

fn load_config(path: &Path) -> anyhow::Result<BridgeConfig> {
    let config = BridgeConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    init_tracing(&config.log_level);
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn serve(path: &Path, address: Option<String>) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if let Some(address) = address {
        config.server.address = address.into();
    }
    let bridge = Arc::new(Bridge::configure(&config).context("failed to configure bridge")?);
    if config.actions.is_empty() {
        info!("no [[actions]] configured, controls stay at their profile defaults");
    }
    bridge.on_update(random_policy(bridge.action_map().clone(), config.seed));

    let mut server = BridgeServer::start(Arc::clone(&bridge))
        .with_context(|| format!("failed to listen on {}", config.server.address))?;
    info!(
        "emubridge serving on {} with {} actions; close stdin (Ctrl-D) to stop",
        server.local_addr(),
        bridge.action_map().len()
    );
    for line in std::io::stdin().lock().lines() {
        if line?.trim() == "quit" {
            break;
        }
    }
    server.stop();
    let (actions, episodes) = bridge.with_state(|state| (state.actions(), state.episodes()));
    info!("emubridge stopped after {episodes} episodes, {actions} actions in the current one");
    Ok(())
}

fn random_policy(
    map: ActionMap,
    seed: Option<u64>,
) -> impl FnMut(&mut BridgeState) + Send + 'static {
    let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    move |state| {
        if let Some(assignment) = map.choose(&mut rng) {
            state.controls_mut().apply(assignment);
        }
        state.set_guessed(true);
    }
}

fn print_action_map(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let map = emubridge_runtime::build_action_map(&config.actions);
    for (id, assignment) in map.iter().enumerate() {
        let entries = assignment
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{id}: {entries}");
    }
    Ok(())
}
