use clap::{Parser, Subcommand};
use matchlink_cli::application::SimulationReport;
use matchlink_cli::{load_session_config, CliError, LogConfig, Result, Simulation, SimulationOptions};
use matchlink_p2p::{drive, LinkConditions, SessionConfig};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "matchlink")]
#[command(version, about = "Matchlink - host-authoritative P2P match sessions")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a host and joiners over a simulated network
    Simulate {
        /// Joiners besides the host
        #[arg(short = 'p', long, default_value_t = 3)]
        players: usize,

        /// Total player slots, host included
        #[arg(short = 's', long, default_value_t = 8)]
        slots: u8,

        /// Frames to run before reporting
        #[arg(short = 't', long, default_value_t = 300)]
        ticks: u64,

        /// Probability of losing an unordered packet
        #[arg(long, default_value_t = 0.0)]
        loss: f64,

        /// Probability of delivering an unordered packet twice
        #[arg(long, default_value_t = 0.0)]
        duplicate: f64,

        /// Probability of an unordered packet overtaking the previous one
        #[arg(long, default_value_t = 0.0)]
        reorder: f64,

        /// Seed for the impairment generator
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Frame length in milliseconds
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,

        /// Session config JSON file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective session config as JSON
    InspectConfig {
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = match (&cli.command, cli.verbose) {
        (_, true) => LogConfig::dev(),
        (Commands::InspectConfig { .. }, false) | (Commands::Simulate { json: true, .. }, false) => {
            LogConfig::quiet()
        }
        _ => LogConfig::default(),
    };
    log_config.init().map_err(CliError::Logging)?;

    match cli.command {
        Commands::Simulate {
            players,
            slots,
            ticks,
            loss,
            duplicate,
            reorder,
            seed,
            tick_ms,
            config,
            json,
        } => {
            let conditions = build_conditions(loss, duplicate, reorder)?;
            let session_config = load_session_config(config.as_deref())?;
            let options = SimulationOptions {
                players,
                slots,
                ticks,
                conditions,
                seed,
            };
            simulate(&options, session_config, Duration::from_millis(tick_ms.max(1)), json).await?;
        }
        Commands::InspectConfig { config } => {
            let session_config = load_session_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&session_config)?);
        }
    }

    Ok(())
}

fn build_conditions(loss: f64, duplicate: f64, reorder: f64) -> Result<LinkConditions> {
    for (name, value) in [("loss", loss), ("duplicate", duplicate), ("reorder", reorder)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(CliError::InvalidConfig(format!(
                "--{} must be between 0 and 1, got {}",
                name, value
            )));
        }
    }
    Ok(LinkConditions {
        loss,
        duplicate,
        reorder,
    })
}

async fn simulate(
    options: &SimulationOptions,
    config: SessionConfig,
    tick_interval: Duration,
    json: bool,
) -> Result<()> {
    let mut simulation = Simulation::new(options, config)?;
    let target = options.ticks;
    let mut announced = false;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; run to completion
            std::future::pending::<()>().await;
        }
    };

    let ran = drive(tick_interval, shutdown, |now| {
        simulation.step(now);
        if !announced && simulation.all_joined() {
            announced = true;
            info!("✅ Every joiner is in after {} ticks", simulation.ticks());
        }
        if simulation.ticks() >= target {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .await;

    if ran < target {
        warn!("Stopped early after {} of {} ticks", ran, target);
    }

    let report = simulation.report();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match report.divergence() {
        Some(reason) => Err(CliError::RosterDivergence(reason)),
        None => Ok(()),
    }
}

fn print_report(report: &SimulationReport) {
    println!("Ran {} ticks", report.ticks);
    println!(
        "Network: {} sent, {} lost, {} duplicated, {} reordered",
        report.network.packets_sent,
        report.network.packets_lost,
        report.network.packets_duplicated,
        report.network.packets_reordered
    );

    for participant in &report.participants {
        println!();
        println!(
            "{} ({}{})",
            participant.id,
            if participant.host { "host" } else { "joiner" },
            if participant.joined { "" } else { ", not joined" }
        );
        println!(
            "  events: {} sent, {} received",
            participant.events_sent, participant.events_received
        );
        for line in &participant.roster {
            let ping = line
                .ping_ms
                .map(|ms| format!("{} ms", ms))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<12} {:<12} slot {:<3} ping {}{}",
                line.id,
                line.name,
                line.spawn_index,
                ping,
                if line.host { "  [host]" } else { "" }
            );
        }
        for peer in &participant.peers {
            println!(
                "  peer {} ({}): {} msgs out / {} in, {} duplicate, {} stale, {} dropped before join",
                peer.peer,
                peer.player.as_deref().unwrap_or("?"),
                peer.stats.messages_sent,
                peer.stats.messages_received,
                peer.stats.dropped_duplicates,
                peer.stats.dropped_stale,
                peer.stats.dropped_before_join
            );
        }
    }

    println!();
    match report.divergence() {
        Some(reason) => println!("❌ Rosters diverged: {}", reason),
        None => println!("✅ All rosters match"),
    }
}
