//! Record transformations, one per `--action`.
//!
//! Every transformation consumes the collection and returns the new one;
//! the caller rebinds. `falength` is the exception: it produces a length
//! report instead of a collection, and the run writes no FASTA output.

use crate::error::KitError;
use crate::selection::SelectionIndex;
use crate::seqio::Record;
use anyhow::{Context, Result};
use clap::ValueEnum;
use memchr::memmem;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Make sequences uppercase
    Upper,
    /// Make sequences lowercase
    Lower,
    /// Remove records selected by the list
    Remove,
    /// Keep only records selected by the list
    Keep,
    /// Rename records using the list's second column
    Lrename,
    /// Rename to the `--token`-th field of the name split on `--splitter`
    Srename,
    /// Rename sequentially to `--prefix` + 1-based counter
    Prename,
    /// Keep records at positions `--range_begin`..=`--range_end` (1-based)
    Pick,
    /// Rotate circular sequences to start at the first `--pattern` occurrence
    Crotate,
    /// Rotate circular sequences to start at offset `--range_begin`
    Ccrotate,
    /// Keep only the first `--range_begin` bases of each sequence
    Croptail,
    /// Split records before the `--range_begin`-th occurrence of `--pattern`
    Cutbefore,
    /// Keep records whose sequence starts with `--pattern`
    Startswith,
    /// Keep records whose sequence contains `--pattern`
    Haspat,
    /// Keep records whose name contains `--pattern`
    Pickname,
    /// Reverse-complement sequences
    Revcom,
    /// Print `name<TAB>length` to stdout instead of writing FASTA
    Falength,
    /// Rename records, in order, to the names listed in the list file
    Listrename,
    /// Reorder records to follow the list file
    Listsort,
}

/// Parameters shared by all actions; each action reads only what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub range_begin: usize,
    pub range_end: usize,
    pub splitter: String,
    pub token: usize,
    pub prefix: String,
    pub pattern: String,
    pub list: Option<PathBuf>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            range_begin: 0,
            range_end: 0,
            splitter: " ".to_string(),
            token: 0,
            prefix: "seq".to_string(),
            pattern: String::new(),
            list: None,
        }
    }
}

/// Result of running one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Records to serialize as FASTA
    Fasta(Vec<Record>),
    /// `(name, length)` pairs to report; no FASTA is written
    Lengths(Vec<(String, usize)>),
}

/// Run `action` over `records`.
pub fn apply(action: Action, records: Vec<Record>, index: &SelectionIndex, params: &Params) -> Result<Outcome> {
    log::debug!("Applying {:?} to {} records", action, records.len());
    let out = match action {
        Action::Upper => map_seq(records, |s| s.to_ascii_uppercase()),
        Action::Lower => map_seq(records, |s| s.to_ascii_lowercase()),
        Action::Remove => records.into_iter().filter(|r| !index.is_selected(&r.name)).collect(),
        Action::Keep => records.into_iter().filter(|r| index.is_selected(&r.name)).collect(),
        Action::Lrename => rename_from_index(records, index),
        Action::Srename => rename_split(records, &params.splitter, params.token)?,
        Action::Prename => rename_prefix(records, &params.prefix),
        Action::Pick => pick_range(records, params.range_begin, params.range_end),
        Action::Crotate => rotate_to_pattern(records, &params.pattern),
        Action::Ccrotate => rotate_to_offset(records, params.range_begin),
        Action::Croptail => crop_tail(records, params.range_begin),
        Action::Cutbefore => cut_before(records, &params.pattern, params.range_begin),
        Action::Startswith => {
            let pat = params.pattern.as_bytes();
            records
                .into_iter()
                .filter(|r| r.seq.len() >= pat.len() && r.seq[..pat.len()].eq_ignore_ascii_case(pat))
                .collect()
        }
        Action::Haspat => {
            let needle = params.pattern.as_bytes().to_ascii_lowercase();
            records
                .into_iter()
                .filter(|r| find_ignore_case(&r.seq, &needle).is_some())
                .collect()
        }
        Action::Pickname => records.into_iter().filter(|r| r.name.contains(params.pattern.as_str())).collect(),
        Action::Revcom => map_seq(records, revcom),
        Action::Falength => {
            return Ok(Outcome::Lengths(records.into_iter().map(|r| (r.name, r.length)).collect()));
        }
        Action::Listrename => rename_from_list(records, index),
        Action::Listsort => {
            let path = params.list.as_ref().ok_or(KitError::MissingList { action: "listsort" })?;
            let order = read_order(path)?;
            sort_by_list(records, &order)
        }
    };
    Ok(Outcome::Fasta(out))
}

fn map_seq<F>(records: Vec<Record>, f: F) -> Vec<Record>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    records
        .into_iter()
        .map(|mut r| {
            let seq = f(&r.seq);
            r.set_seq(seq);
            r
        })
        .collect()
}

/// Complement table: A<->T, G<->C in either case; anything else becomes N.
fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'T' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'a' => b't',
        b't' => b'a',
        b'g' => b'c',
        b'c' => b'g',
        _ => b'N',
    }
}

pub fn revcom(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Position of `needle` (already lowercase) in `hay`, ignoring ASCII case.
fn find_ignore_case(hay: &[u8], needle: &[u8]) -> Option<usize> {
    memmem::find(&hay.to_ascii_lowercase(), needle)
}

fn rotate_left(seq: &[u8], at: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    out.extend_from_slice(&seq[at..]);
    out.extend_from_slice(&seq[..at]);
    out
}

fn rename_from_index(records: Vec<Record>, index: &SelectionIndex) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut r| {
            let target = index.get_or_default(&r.name);
            if !target.is_empty() {
                r.name = target.to_string();
            }
            r
        })
        .collect()
}

fn rename_split(records: Vec<Record>, splitter: &str, token: usize) -> Result<Vec<Record>, KitError> {
    if splitter.is_empty() {
        return Err(KitError::EmptySplitter);
    }
    records
        .into_iter()
        .map(|mut r| {
            let picked = r.name.split(splitter).nth(token).map(str::to_string);
            match picked {
                Some(new_name) => {
                    r.name = new_name;
                    Ok(r)
                }
                None => Err(KitError::TokenOutOfRange {
                    tokens: r.name.split(splitter).count(),
                    name: r.name,
                    token,
                }),
            }
        })
        .collect()
}

fn rename_prefix(records: Vec<Record>, prefix: &str) -> Vec<Record> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, mut r)| {
            r.name = format!("{}{}", prefix, i + 1);
            r
        })
        .collect()
}

fn pick_range(records: Vec<Record>, from: usize, to: usize) -> Vec<Record> {
    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| (from..=to).contains(&(i + 1)))
        .map(|(_, r)| r)
        .collect()
}

fn rotate_to_pattern(records: Vec<Record>, pattern: &str) -> Vec<Record> {
    let needle = pattern.as_bytes().to_ascii_lowercase();
    records
        .into_iter()
        .map(|mut r| {
            if let Some(pos) = find_ignore_case(&r.seq, &needle).filter(|&p| p > 0) {
                let rotated = rotate_left(&r.seq, pos);
                r.set_seq(rotated);
            }
            r
        })
        .collect()
}

fn rotate_to_offset(records: Vec<Record>, offset: usize) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut r| {
            if offset > 0 && offset < r.seq.len() {
                let rotated = rotate_left(&r.seq, offset);
                r.set_seq(rotated);
            }
            r
        })
        .collect()
}

/// Byte offset just past the first `chars` UTF-8 characters of `seq`.
fn char_boundary(seq: &[u8], chars: usize) -> usize {
    seq.iter()
        .enumerate()
        .filter(|&(_, &b)| (b & 0xC0) != 0x80)
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(seq.len())
}

fn crop_tail(records: Vec<Record>, keep: usize) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut r| {
            let cut = char_boundary(&r.seq, keep);
            r.seq.truncate(cut);
            r.length = r.seq.len();
            r
        })
        .collect()
}

/// Split each record in two before the `nth` (1-based, non-overlapping)
/// occurrence of `pattern`; 0 counts as the first. Records with fewer
/// occurrences pass through.
fn cut_before(records: Vec<Record>, pattern: &str, nth: usize) -> Vec<Record> {
    if pattern.is_empty() {
        return records;
    }
    let skip = nth.saturating_sub(1);
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        let hit = memmem::find_iter(&r.seq, pattern.as_bytes()).nth(skip);
        match hit {
            Some(pos) => {
                out.push(Record::new(format!("{}_Left", r.name), r.seq[..pos].to_vec()));
                out.push(Record::new(format!("{}_Right", r.name), r.seq[pos..].to_vec()));
            }
            None => out.push(r),
        }
    }
    out
}

fn rename_from_list(records: Vec<Record>, index: &SelectionIndex) -> Vec<Record> {
    let mut names = index.names();
    records
        .into_iter()
        .map(|mut r| {
            if let Some(name) = names.next() {
                r.name = name.to_string();
            }
            r
        })
        .collect()
}

fn read_order(path: &Path) -> Result<Vec<String>> {
    let f = File::open(path).with_context(|| format!("Failed to open list file: {}", path.display()))?;
    BufReader::new(f)
        .lines()
        .map(|l| l.map(|l| l.trim_end().to_string()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to read list file: {}", path.display()))
}

/// Emit records in list order. A record matches a listed name when its stored
/// name is that name prefixed with '>', so headers read as `>>name` are the
/// ones that sort. Unlisted records are dropped; a record listed twice is
/// emitted twice.
fn sort_by_list(records: Vec<Record>, order: &[String]) -> Vec<Record> {
    let mut out = Vec::new();
    for name in order {
        let wanted = format!(">{}", name);
        out.extend(records.iter().filter(|r| r.name == wanted).cloned());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn recs(items: &[(&str, &str)]) -> Vec<Record> {
        items.iter().map(|(n, s)| Record::new(*n, s.as_bytes().to_vec())).collect()
    }

    fn run(action: Action, records: Vec<Record>, params: &Params) -> Vec<Record> {
        let index = SelectionIndex::select_all(&records);
        run_with(action, records, &index, params)
    }

    fn run_with(action: Action, records: Vec<Record>, index: &SelectionIndex, params: &Params) -> Vec<Record> {
        match apply(action, records, index, params).unwrap() {
            Outcome::Fasta(out) => out,
            Outcome::Lengths(_) => panic!("expected FASTA outcome"),
        }
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn seqs(records: &[Record]) -> Vec<&[u8]> {
        records.iter().map(|r| r.seq.as_slice()).collect()
    }

    fn list(text: &str) -> SelectionIndex {
        SelectionIndex::from_reader(Cursor::new(text)).unwrap()
    }

    #[test]
    fn case_folding_is_idempotent() {
        let p = Params::default();
        let input = recs(&[("a", "acGTnx"), ("b", "")]);
        let once = run(Action::Upper, input.clone(), &p);
        assert_eq!(seqs(&once), vec![&b"ACGTNX"[..], b""]);
        assert_eq!(run(Action::Upper, once.clone(), &p), once);

        let low = run(Action::Lower, input, &p);
        assert_eq!(seqs(&low), vec![&b"acgtnx"[..], b""]);
        assert_eq!(run(Action::Lower, low.clone(), &p), low);
    }

    #[test]
    fn keep_and_remove_partition_the_collection() {
        let p = Params::default();
        let input = recs(&[("a", "A"), ("b", "C"), ("c", "G"), ("d", "T")]);
        let index = list("a\t1\nc\tx\nd\n");
        let kept = run_with(Action::Keep, input.clone(), &index, &p);
        let removed = run_with(Action::Remove, input.clone(), &index, &p);
        assert_eq!(names(&kept), vec!["a", "c"]);
        assert_eq!(names(&removed), vec!["b", "d"]);

        let k: HashSet<_> = names(&kept).into_iter().collect();
        let r: HashSet<_> = names(&removed).into_iter().collect();
        assert!(k.is_disjoint(&r));
        let all: HashSet<_> = k.union(&r).copied().collect();
        let expected: HashSet<_> = names(&input).into_iter().collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn implicit_index_selects_everything() {
        let p = Params::default();
        let input = recs(&[("a", "A"), ("b", "C")]);
        assert_eq!(run(Action::Keep, input.clone(), &p), input);
        assert!(run(Action::Remove, input, &p).is_empty());
    }

    #[test]
    fn lrename_uses_second_column_only_when_present() {
        let p = Params::default();
        let index = list("a\talpha\nb\n");
        let out = run_with(Action::Lrename, recs(&[("a", "A"), ("b", "C"), ("c", "G")]), &index, &p);
        assert_eq!(names(&out), vec!["alpha", "b", "c"]);
    }

    #[test]
    fn prename_counts_from_one() {
        let p = Params { prefix: "ctg_".to_string(), ..Params::default() };
        let out = run(Action::Prename, recs(&[("x", "A"), ("y", "C")]), &p);
        assert_eq!(names(&out), vec!["ctg_1", "ctg_2"]);
        let out = run(Action::Prename, recs(&[("x", "A")]), &Params::default());
        assert_eq!(names(&out), vec!["seq1"]);
    }

    #[test]
    fn srename_picks_token() {
        let p = Params { splitter: "|".to_string(), token: 1, ..Params::default() };
        let out = run(Action::Srename, recs(&[("gi|123|ref", "A")]), &p);
        assert_eq!(names(&out), vec!["123"]);

        let out = run(Action::Srename, recs(&[("chr1 assembled", "A")]), &Params::default());
        assert_eq!(names(&out), vec!["chr1"]);
    }

    #[test]
    fn srename_token_out_of_range_is_an_error() {
        let p = Params { token: 3, ..Params::default() };
        let input = recs(&[("a b", "A")]);
        let index = SelectionIndex::select_all(&input);
        let err = apply(Action::Srename, input, &index, &p).unwrap_err();
        match err.downcast_ref::<KitError>() {
            Some(KitError::TokenOutOfRange { name, token, tokens }) => {
                assert_eq!(name, "a b");
                assert_eq!(*token, 3);
                assert_eq!(*tokens, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let p = Params { splitter: String::new(), ..Params::default() };
        let input = recs(&[("a b", "A")]);
        assert!(apply(Action::Srename, input, &index, &p).is_err());
    }

    #[test]
    fn pick_keeps_inclusive_range_in_order() {
        let input = recs(&[("1", "A"), ("2", "A"), ("3", "A"), ("4", "A"), ("5", "A")]);
        let p = Params { range_begin: 2, range_end: 4, ..Params::default() };
        assert_eq!(names(&run(Action::Pick, input.clone(), &p)), vec!["2", "3", "4"]);

        let p = Params { range_begin: 4, range_end: 2, ..Params::default() };
        assert!(run(Action::Pick, input.clone(), &p).is_empty());
        let p = Params { range_begin: 4, range_end: 99, ..Params::default() };
        assert_eq!(names(&run(Action::Pick, input.clone(), &p)), vec!["4", "5"]);
        assert!(run(Action::Pick, input, &Params::default()).is_empty());
    }

    #[test]
    fn crotate_starts_at_first_match_ignoring_case() {
        let p = Params { pattern: "atg".to_string(), ..Params::default() };
        let out = run(
            Action::Crotate,
            recs(&[("a", "ccATGgg"), ("b", "ATGcc"), ("c", "cccc")]),
            &p,
        );
        assert_eq!(seqs(&out), vec![&b"ATGggcc"[..], b"ATGcc", b"cccc"]);
    }

    #[test]
    fn ccrotate_uses_offset_within_bounds() {
        let input = recs(&[("a", "ABCDEF"), ("b", "AB")]);
        let p = Params { range_begin: 2, ..Params::default() };
        assert_eq!(seqs(&run(Action::Ccrotate, input.clone(), &p)), vec![&b"CDEFAB"[..], b"AB"]);
        assert_eq!(run(Action::Ccrotate, input, &Params::default())[0].seq, b"ABCDEF");
    }

    #[test]
    fn croptail_truncates_without_padding() {
        let input = recs(&[("a", "ACGTACGTAC")]);
        let p = Params { range_begin: 5, ..Params::default() };
        let out = run(Action::Croptail, input.clone(), &p);
        assert_eq!(out[0].seq, b"ACGTA");
        assert_eq!(out[0].length, 5);

        let p = Params { range_begin: 20, ..Params::default() };
        assert_eq!(run(Action::Croptail, input, &p)[0].seq, b"ACGTACGTAC");
    }

    #[test]
    fn croptail_counts_characters_not_bytes() {
        let p = Params { range_begin: 2, ..Params::default() };
        let out = run(Action::Croptail, recs(&[("u", "αβγ")]), &p);
        assert_eq!(String::from_utf8(out[0].seq.clone()).unwrap(), "αβ");
        assert_eq!(out[0].length, 4);
    }

    #[test]
    fn cutbefore_splits_at_nth_occurrence() {
        let p = Params { pattern: "AAA".to_string(), range_begin: 2, ..Params::default() };
        let out = run(Action::Cutbefore, recs(&[("r", "AAABBBAAACCC"), ("s", "AAAC")]), &p);
        assert_eq!(names(&out), vec!["r_Left", "r_Right", "s"]);
        assert_eq!(seqs(&out), vec![&b"AAABBB"[..], b"AAACCC", b"AAAC"]);

        let p = Params { pattern: "AAA".to_string(), range_begin: 1, ..Params::default() };
        let out = run(Action::Cutbefore, recs(&[("r", "BBAAAB")]), &p);
        assert_eq!(seqs(&out), vec![&b"BB"[..], b"AAAB"]);
    }

    #[test]
    fn cutbefore_default_count_splits_at_first_match() {
        let p = Params { pattern: "AAA".to_string(), ..Params::default() };
        let out = run(Action::Cutbefore, recs(&[("r", "BBAAAB"), ("s", "BBBB")]), &p);
        assert_eq!(names(&out), vec!["r_Left", "r_Right", "s"]);
        assert_eq!(seqs(&out), vec![&b"BB"[..], b"AAAB", b"BBBB"]);
    }

    #[test]
    fn cutbefore_counts_non_overlapping_matches() {
        let p = Params { pattern: "AA".to_string(), range_begin: 2, ..Params::default() };
        let out = run(Action::Cutbefore, recs(&[("r", "AAAB")]), &p);
        assert_eq!(names(&out), vec!["r"]);
    }

    #[test]
    fn pattern_filters() {
        let input = recs(&[("chr1", "ACGTTT"), ("plasmid", "ttACGT"), ("chr2", "AC")]);
        let p = Params { pattern: "acg".to_string(), ..Params::default() };
        assert_eq!(names(&run(Action::Startswith, input.clone(), &p)), vec!["chr1"]);
        assert_eq!(names(&run(Action::Haspat, input.clone(), &p)), vec!["chr1", "plasmid"]);

        let p = Params { pattern: "chr".to_string(), ..Params::default() };
        assert_eq!(names(&run(Action::Pickname, input.clone(), &p)), vec!["chr1", "chr2"]);
        let p = Params { pattern: "CHR".to_string(), ..Params::default() };
        assert!(run(Action::Pickname, input, &p).is_empty());
    }

    #[test]
    fn revcom_is_an_involution_only_for_acgt() {
        let p = Params::default();
        let clean = recs(&[("a", "AACGtg")]);
        let once = run(Action::Revcom, clean.clone(), &p);
        assert_eq!(once[0].seq, b"caCGTT");
        assert_eq!(run(Action::Revcom, once, &p), clean);

        let ambiguous = recs(&[("b", "ANRt")]);
        let once = run(Action::Revcom, ambiguous.clone(), &p);
        assert_eq!(once[0].seq, b"aNNT");
        let twice = run(Action::Revcom, once, &p);
        assert_eq!(twice[0].seq, b"ANNt");
        assert_ne!(twice, ambiguous);
    }

    #[test]
    fn falength_reports_lengths() {
        let input = recs(&[("a b", "ACGT"), ("c", "")]);
        let index = SelectionIndex::select_all(&input);
        let out = apply(Action::Falength, input, &index, &Params::default()).unwrap();
        assert_eq!(
            out,
            Outcome::Lengths(vec![("a b".to_string(), 4), ("c".to_string(), 0)])
        );
    }

    #[test]
    fn listrename_handles_length_mismatch() {
        let p = Params::default();
        let short = list("x\ny\n");
        let out = run_with(Action::Listrename, recs(&[("a", "A"), ("b", "C"), ("c", "G")]), &short, &p);
        assert_eq!(names(&out), vec!["x", "y", "c"]);

        let long = list("x\ny\nz\nw\n");
        let out = run_with(Action::Listrename, recs(&[("a", "A"), ("b", "C")]), &long, &p);
        assert_eq!(names(&out), vec!["x", "y"]);
    }

    #[test]
    fn listrename_keeps_positions_with_duplicate_names() {
        let p = Params::default();
        let out = run(Action::Listrename, recs(&[("a", "A"), ("a", "C"), ("b", "G")]), &p);
        assert_eq!(names(&out), vec!["a", "a", "b"]);

        let repeated = list("x\nx\ny\n");
        let out = run_with(Action::Listrename, recs(&[("a", "A"), ("b", "C"), ("c", "G")]), &repeated, &p);
        assert_eq!(names(&out), vec!["x", "x", "y"]);
    }

    #[test]
    fn listsort_matches_names_with_leading_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("order.txt");
        fs::write(&path, "b\na\nmissing\nb\n").unwrap();
        let p = Params { list: Some(path), ..Params::default() };

        let input = recs(&[(">a", "A"), (">b", "C"), ("b", "G"), (">c", "T")]);
        let out = run(Action::Listsort, input, &p);
        assert_eq!(names(&out), vec![">b", ">a", ">b"]);

        let plain = recs(&[("a", "A"), ("b", "C")]);
        assert!(run(Action::Listsort, plain, &p).is_empty());
    }

    #[test]
    fn listsort_without_list_is_an_error() {
        let input = recs(&[("a", "A")]);
        let index = SelectionIndex::select_all(&input);
        let err = apply(Action::Listsort, input, &index, &Params::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<KitError>(), Some(KitError::MissingList { .. })));
    }
}
