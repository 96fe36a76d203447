//! Selection index: record name -> associated value.
//!
//! An empty value means "not selected / no rename target". The key of every
//! line (or every record, repeats included) is also kept in order, so the
//! index doubles as a positional name list for `listrename`.

use crate::error::KitError;
use crate::seqio::Record;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Value stored for every record when no list file is given.
const SELECTED: &str = "1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionIndex {
    entries: IndexMap<String, String>,
    order: Vec<String>,
}

impl SelectionIndex {
    /// Select every record in the collection.
    pub fn select_all(records: &[Record]) -> Self {
        let entries = records
            .iter()
            .map(|r| (r.name.clone(), SELECTED.to_string()))
            .collect();
        let order = records.iter().map(|r| r.name.clone()).collect();
        SelectionIndex { entries, order }
    }

    /// Load a tab-separated list: `name[\tvalue]` per line. Later duplicates
    /// overwrite earlier values but keep the first position.
    pub fn load(path: &Path) -> Result<Self, KitError> {
        let to_err = |source: std::io::Error| KitError::ListLoad { path: path.to_path_buf(), source };
        let f = File::open(path).map_err(to_err)?;
        Self::from_reader(BufReader::new(f)).map_err(to_err)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut entries = IndexMap::new();
        let mut order = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.trim_end().split('\t');
            let key = fields.next().unwrap_or_default().to_string();
            let value = fields.next().unwrap_or_default().to_string();
            order.push(key.clone());
            entries.insert(key, value);
        }
        Ok(SelectionIndex { entries, order })
    }

    /// Value for `name`, or the empty default when absent. Never inserts.
    pub fn get_or_default(&self, name: &str) -> &str {
        self.entries.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn is_selected(&self, name: &str) -> bool {
        !self.get_or_default(name).is_empty()
    }

    /// Keys in list order, one per line; repeated keys appear repeatedly.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
