//! `boardsim`: assemble and run programs on a simulated board.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use assembler::config::DEFAULT_MAX_STEPS;
use assembler::report::{board_state, listing};
use assembler::{Board, BoardConfig, BoardError, MemorySize, RunLimits};
use clap::{Args, Parser, Subcommand};
use hardware::default_registries;
use sim_core::{DeviceDescriptor, Registries};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

/// Assemble and run programs on a simulated board.
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a program, run it to its end and print the board state.
    Run {
        #[clap(flatten)]
        board: BoardArgs,

        /// Give up after this many instructions.
        #[clap(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
    },
    /// Assemble a program and print its listing.
    Check {
        #[clap(flatten)]
        board: BoardArgs,
    },
    /// List the available architectures and devices.
    List,
}

#[derive(Args, Debug)]
struct BoardArgs {
    /// Assembly source file.
    source: PathBuf,

    /// Architecture name.
    #[clap(long, default_value = "6502")]
    arch: String,

    /// Memory size in bytes, or `max` for the whole address space.
    #[clap(long, default_value = "max")]
    memory: MemorySize,

    /// Device to attach, as NAME:PARAM:PARAM (repeatable).
    #[clap(long = "device", value_name = "SPEC")]
    devices: Vec<DeviceDescriptor>,
}

impl BoardArgs {
    fn config(&self) -> BoardConfig {
        BoardConfig {
            arch: self.arch.clone(),
            memory: self.memory,
            devices: self.devices.clone(),
        }
    }

    fn source(&self) -> Result<String, Fail> {
        fs::read_to_string(&self.source).map_err(|source| Fail::Read {
            path: self.source.clone(),
            source,
        })
    }
}

#[derive(Debug, Error)]
enum Fail {
    #[error("failed to initialise tracing filter: {0}")]
    Logging(String),
    #[error("{}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("program did not end within {0} steps")]
    StepLimit(u64),
}

fn init_logging(verbose: bool) -> Result<(), Fail> {
    let default = if verbose { "debug" } else { "warn" };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| Fail::Logging(e.to_string()))?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn run(args: &BoardArgs, max_steps: u64, registries: &Registries) -> Result<(), Fail> {
    let source = args.source()?;
    let mut board = Board::build(args.config(), registries)?;
    board.load(&source)?;
    let outcome = board.run(RunLimits { max_steps });
    print!("{}", board_state(&board));
    board.teardown();

    let outcome = outcome?;
    debug!(steps = outcome.steps, "run finished");
    if outcome.ended {
        Ok(())
    } else {
        Err(Fail::StepLimit(outcome.steps))
    }
}

fn check(args: &BoardArgs, registries: &Registries) -> Result<(), Fail> {
    let source = args.source()?;
    let mut board = Board::build(args.config(), registries)?;
    let loaded = board.load(&source);
    if let Some(program) = board.program() {
        print!("{}", listing(program, board.processor().address_size()));
    }
    board.teardown();
    loaded?;
    Ok(())
}

fn list(registries: &Registries) {
    println!("architectures:");
    for name in registries.architectures.names() {
        println!("  {name}");
    }
    println!("devices:");
    for name in registries.devices.names() {
        println!("  {name}");
    }
}

fn dispatch(cli: &Cli) -> Result<(), Fail> {
    init_logging(cli.verbose)?;
    let registries = default_registries();
    match &cli.command {
        Command::Run { board, max_steps } => run(board, *max_steps, &registries),
        Command::Check { board } => check(board, &registries),
        Command::List => {
            list(&registries);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
