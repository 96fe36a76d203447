//! FASTA editing run (`fastakit`).
//!
//! Loads the whole input into memory, builds the selection index, applies
//! **exactly one** action and writes the resulting records as unwrapped FASTA.
//!
//! ### Example
//! ```text
//! fastakit --in contigs.fa --list keep.tsv --action keep --out kept.fa
//! fastakit --in plasmid.fa --action crotate --pattern ATGACC > rotated.fa
//! ```

use crate::actions::{apply, Action, Outcome, Params};
use crate::selection::SelectionIndex;
use crate::seqio::{open_input, open_output, parse_fasta, write_fasta};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct KitArgs {
    /// Input FASTA, optionally .gz (stdin if not set or not a file)
    #[arg(short = 'i', long = "in", value_name = "FASTA")]
    pub input: Option<PathBuf>,

    /// Output FASTA; a .gz name is gzipped (stdout if not set or not writable)
    #[arg(short = 'o', long = "out", value_name = "FASTA")]
    pub output: Option<PathBuf>,

    /// Tab-separated list: record name, optional value (new name / selection)
    #[arg(short = 'l', long = "list", value_name = "TSV")]
    pub list: Option<PathBuf>,

    /// Action to perform; if given more than once only the first runs
    #[arg(short = 'a', long = "action", value_enum, required = true, value_name = "ACTION")]
    pub actions: Vec<Action>,

    /// First index for `pick`; offset for `ccrotate`; length for `croptail`; occurrence for `cutbefore`
    #[arg(long = "range_begin", alias = "range-begin", default_value_t = 0, value_name = "INT")]
    pub range_begin: usize,

    /// Last index for `pick`
    #[arg(long = "range_end", alias = "range-end", default_value_t = 0, value_name = "INT")]
    pub range_end: usize,

    /// Splitter for `srename`
    #[arg(long = "splitter", default_value = " ", value_name = "STR")]
    pub splitter: String,

    /// Token index (0-based) for `srename`
    #[arg(long = "token", default_value_t = 0, value_name = "INT")]
    pub token: usize,

    /// Prefix for `prename`
    #[arg(long = "prefix", default_value = "seq", value_name = "STR")]
    pub prefix: String,

    /// Pattern for `crotate`, `startswith`, `haspat`, `pickname`, `cutbefore`
    #[arg(long = "pattern", default_value = "", value_name = "STR")]
    pub pattern: String,
}

impl KitArgs {
    fn params(&self) -> Params {
        Params {
            range_begin: self.range_begin,
            range_end: self.range_end,
            splitter: self.splitter.clone(),
            token: self.token,
            prefix: self.prefix.clone(),
            pattern: self.pattern.clone(),
            list: self.list.clone(),
        }
    }
}

/// Write a `falength` report: one `name<TAB>length` line per record.
pub fn write_lengths<W: Write>(lengths: &[(String, usize)], mut out: W) -> Result<()> {
    for (name, len) in lengths {
        writeln!(out, "{}\t{}", name, len)?;
    }
    out.flush()?;
    Ok(())
}

/// Execute one toolkit run.
pub fn run(args: KitArgs) -> Result<()> {
    let action = *args.actions.first().ok_or_else(|| anyhow!("Provide an --action."))?;
    if args.actions.len() > 1 {
        log::warn!("Only the first action ({:?}) is executed; ignoring {:?}", action, &args.actions[1..]);
    }

    let reader = open_input(args.input.as_deref())?;
    let records = parse_fasta(reader).context("Failed to parse FASTA input")?;
    let n_in = records.len();
    log::info!("Read {} records", n_in);

    let index = match &args.list {
        Some(path) => SelectionIndex::load(path).unwrap_or_else(|e| {
            log::warn!("{}; acting on all entries", e);
            SelectionIndex::select_all(&records)
        }),
        None => SelectionIndex::select_all(&records),
    };
    log::debug!("Selection index holds {} names", index.len());

    match apply(action, records, &index, &args.params())? {
        Outcome::Lengths(lengths) => {
            write_lengths(&lengths, io::stdout().lock())?;
        }
        Outcome::Fasta(records) => {
            let mut out = open_output(args.output.as_deref());
            write_fasta(&records, &mut *out)?;
            log::info!("{:?}: wrote {} of {} records", action, records.len(), n_in);
        }
    }
    Ok(())
}
