//! Typed failures raised by the FASTA toolkit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KitError {
    #[error("Malformed FASTA: sequence data on line {line} before any '>' header")]
    MissingHeader { line: usize },

    #[error("Failed to load list file {}: {source}", path.display())]
    ListLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("srename: token {token} out of range for '{name}' ({tokens} tokens after split)")]
    TokenOutOfRange {
        name: String,
        token: usize,
        tokens: usize,
    },

    #[error("srename: splitter must not be empty")]
    EmptySplitter,

    #[error("{action}: a list file is required (--list)")]
    MissingList { action: &'static str },
}
