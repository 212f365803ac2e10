//! Agent binary speaking the harness line protocol.
//!
//! Input (stdin): one JSON object per line,
//! `{"observation": {...}, "configuration": {...}}`.
//! Output (stdout): one JSON object per line mapping shipyard ids to
//! command strings (`SPAWN_n` / `LAUNCH_n_plan`); `{}` when there is
//! nothing to do. Logs go to stderr so stdout stays protocol-clean.
//!
//! ```bash
//! # Full planner
//! cargo run -p armada_agent
//!
//! # Deterministic fallback ladder (smoke tests, baselines)
//! cargo run -p armada_agent -- --fallback
//! ```

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use armada_core::board::GameConfig;
use armada_core::intent::Session;
use armada_core::turn::decide;

mod command;
mod fallback;
mod observation;

use observation::{Observation, RawConfig};

#[derive(Parser)]
#[command(name = "armada_agent")]
#[command(about = "Autonomous fleet agent for the toroidal grid game")]
#[command(version)]
struct Cli {
    /// Use the simple deterministic ladder instead of the full planner
    #[arg(long)]
    fallback: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum AgentError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("protocol: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("snapshot: {0}")]
    Snapshot(#[from] armada_core::error::ArmadaError),
}

/// One stdin line: the turn's observation plus the rule constants.
#[derive(Debug, Deserialize)]
struct TurnInput {
    observation: Observation,
    #[serde(default)]
    configuration: RawConfig,
}

fn main() -> Result<(), AgentError> {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout is for protocol output only.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<(), AgentError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut session = Session::default();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let commands = match turn_commands(cli, &mut session, &line) {
            Ok(commands) => commands,
            Err(AgentError::Protocol(err)) => {
                // Garbled input lines are transient decode noise; skip the
                // turn rather than killing the process mid-game.
                error!(%err, "undecodable turn input, sending no commands");
                HashMap::new()
            }
            Err(err) => {
                // A snapshot that decoded but does not describe a legal
                // board means the harness and agent disagree about the
                // game; no command we emit can be trusted.
                error!(%err, "invalid snapshot, refusing to continue");
                return Err(err);
            }
        };
        serde_json::to_writer(&mut stdout, &commands)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }
    Ok(())
}

fn turn_commands(
    cli: &Cli,
    session: &mut Session,
    line: &str,
) -> Result<HashMap<String, String>, AgentError> {
    let input: TurnInput = serde_json::from_str(line)?;
    let config: GameConfig = input.configuration.into();
    let obs = input.observation;
    info!(
        step = obs.step,
        remaining = obs.remaining_overage_time,
        "deciding turn"
    );

    let board = observation::to_board(&obs, &config)?;
    let actions = if cli.fallback {
        fallback::decide_fallback(&board, obs.player)
    } else {
        decide(&board, obs.player, session, obs.remaining_overage_time)
    };
    Ok(command::encode_all(&actions))
}
