use crate::error::KitError;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A single FASTA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Full header text without the leading '>'
    pub name: String,
    /// Sequence bytes, line breaks removed
    pub seq: Vec<u8>,
    /// Sequence length, refreshed whenever the sequence is replaced
    pub length: usize,
}

impl Record {
    pub fn new(name: impl Into<String>, seq: Vec<u8>) -> Self {
        let length = seq.len();
        Record { name: name.into(), seq, length }
    }

    pub fn set_seq(&mut self, seq: Vec<u8>) {
        self.length = seq.len();
        self.seq = seq;
    }
}

fn is_gz(path: &Path) -> bool {
    path.extension().map(|e| e.eq_ignore_ascii_case("gz")).unwrap_or(false)
}

fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path)
        .with_context(|| format!("Failed to open input: {}", path.display()))?;
    if is_gz(path) {
        let gz = MultiGzDecoder::new(f);
        Ok(Box::new(BufReader::new(gz)))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Open the FASTA input. An unset path, or one that is not an existing file,
/// reads from stdin instead.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(p) if p.is_file() => open_maybe_gz(p),
        Some(p) => {
            log::debug!("Input {} is not a file; reading stdin", p.display());
            Ok(Box::new(BufReader::new(io::stdin())))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Open the FASTA output. Falls back to stdout (with a warning) when the path
/// cannot be created.
pub fn open_output(path: Option<&Path>) -> Box<dyn Write> {
    let stdout = || -> Box<dyn Write> { Box::new(BufWriter::new(io::stdout())) };
    let Some(p) = path else {
        return stdout();
    };
    match File::create(p) {
        Ok(f) if is_gz(p) => Box::new(BufWriter::new(GzEncoder::new(f, Compression::default()))),
        Ok(f) => Box::new(BufWriter::new(f)),
        Err(e) => {
            log::warn!("Unable to open output file {} ({}), writing to stdout instead", p.display(), e);
            stdout()
        }
    }
}

/// Parse FASTA text into records. Blank lines are skipped; multi-line
/// sequences are concatenated.
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = Vec::new();

    for (idx, line_res) in reader.lines().enumerate() {
        let line = line_res.with_context(|| format!("Failed to read FASTA line {}", idx + 1))?;
        let line = line.trim_end();
        if line.is_empty() { continue; }
        if let Some(header) = line.strip_prefix('>') {
            records.push(Record::new(header, Vec::new()));
        } else {
            let current = records
                .last_mut()
                .ok_or(KitError::MissingHeader { line: idx + 1 })?;
            current.seq.extend_from_slice(line.as_bytes());
        }
    }
    for rec in records.iter_mut() {
        rec.length = rec.seq.len();
    }
    Ok(records)
}

/// Write records as two-line FASTA blocks (no wrapping).
pub fn write_fasta<W: Write + ?Sized>(records: &[Record], out: &mut W) -> Result<()> {
    for rec in records {
        writeln!(out, ">{}", rec.name)?;
        out.write_all(&rec.seq)?;
        writeln!(out)?;
    }
    out.flush().context("Failed to flush FASTA output")?;
    Ok(())
}
