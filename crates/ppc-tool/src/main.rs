//! ppc-tool - offline verification of proof-of-stake chain fixtures.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ppc_consensus::{Hash256, OutPoint};
use ppc_state::ChainState;
use ppc_tool::commands;
use ppc_tool::config::resolve_params;
use ppc_tool::fixture::ChainFixture;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Replay chain fixtures through the proof-of-stake kernel.
#[derive(Parser, Debug)]
#[command(name = "ppc-tool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Network to validate against (defaults to the fixture's network)
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// TOML file with network parameters, overrides --network
    #[arg(short, long, global = true)]
    params: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept every block and print modifiers and checksums
    Replay {
        /// Chain fixture (JSON)
        fixture: PathBuf,
    },
    /// Compare computed checksums against the checkpoint table
    Checkpoints {
        /// Chain fixture (JSON)
        fixture: PathBuf,
    },
    /// Find the first timestamp at which an output stakes on the fixture tip
    Search {
        /// Chain fixture (JSON)
        fixture: PathBuf,
        /// Transaction id of the output
        #[arg(long)]
        txid: Hash256,
        /// Output index
        #[arg(long)]
        vout: u32,
        /// First timestamp to try
        #[arg(long)]
        from: u32,
        /// Last timestamp to try
        #[arg(long)]
        to: u32,
        /// Compact target, hex
        #[arg(long, value_parser = parse_bits)]
        bits: u32,
    },
}

fn parse_bits(s: &str) -> Result<u32, std::num::ParseIntError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(digits, 16)
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let fixture_path = match &args.command {
        Command::Replay { fixture } | Command::Checkpoints { fixture } => fixture,
        Command::Search { fixture, .. } => fixture,
    };
    let fixture = ChainFixture::load(fixture_path)?;
    let params = resolve_params(args.params.as_deref(), args.network.as_deref(), fixture.network)?;
    info!(network = %params.network, blocks = fixture.blocks.len(), "Loaded fixture");

    match args.command {
        Command::Replay { .. } => {
            let state = ChainState::new(params);
            for row in commands::replay(&state, &fixture)? {
                println!("{}", row);
            }
        }
        Command::Checkpoints { .. } => {
            let reports = commands::checkpoints(&params, &fixture)?;
            for report in &reports {
                println!("{}", report);
            }
            if reports.iter().any(|r| r.computed.is_some() && !r.matches()) {
                bail!("Stake modifier checkpoint mismatch");
            }
        }
        Command::Search {
            txid,
            vout,
            from,
            to,
            bits,
            ..
        } => {
            let outpoint = OutPoint::new(txid, vout);
            match commands::search(&params, &fixture, outpoint, bits, from, to)? {
                Some((time, proof)) => println!("{} stakes at {} proof={}", outpoint, time, proof),
                None => println!("{} does not stake in {}..={}", outpoint, from, to),
            }
        }
    }

    Ok(())
}
