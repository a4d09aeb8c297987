//! garnet entry point: UCI engine by default, annotation mode on demand.

mod annotate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "garnet", version, about = "UCI chess engine")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Annotate a file of FEN positions with shallow-search evaluations.
    Annotate {
        /// Input file with one FEN per line.
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Logging goes to stderr; stdout belongs to the UCI protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().mode {
        Some(Mode::Annotate { input }) => annotate::run(&input),
        None => {
            info!("garnet starting in UCI mode");
            garnet_uci::UciEngine::new().run();
            Ok(())
        }
    }
}
