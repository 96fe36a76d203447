//! fastakit: FASTA editing CLI
//!
//! One run = one action: case folding, list/pattern filtering, renaming,
//! circular rotation, cropping, splitting, reverse complement, or a length
//! report.

mod actions;
mod error;
mod kit;
mod selection;
mod seqio;

use anyhow::Result;
use clap::{ArgAction, Parser};
use log::LevelFilter;

/// fastakit CLI
#[derive(Parser, Debug)]
#[command(name = "fastakit")]
#[command(author, version, about = "Edit FASTA files one action at a time", long_about = None)]
struct Cli {
    #[command(flatten)]
    kit: kit::KitArgs,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    kit::run(cli.kit)
}
