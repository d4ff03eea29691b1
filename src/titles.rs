//! Title ↔ row-id lookup tables.
//!
//! Datasets of embedded documents come with a sidecar table mapping each
//! document title to its row index. Queries go title → id (pick the query
//! vector); results come back id → title (print the neighbor table).

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Bidirectional title ↔ row-id map.
///
/// Both directions are unique: a duplicate title or a duplicate id is a
/// load error.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    by_title: HashMap<String, u32>,
    by_id: HashMap<u32, String>,
}

impl TitleIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one title/id pair.
    pub fn insert(&mut self, title: String, id: u32) -> Result<()> {
        if self.by_title.contains_key(&title) {
            return Err(Error::InvalidParameter(format!("duplicate title '{title}'")));
        }
        if let Some(existing) = self.by_id.get(&id) {
            return Err(Error::InvalidParameter(format!(
                "duplicate id {id} ('{existing}' and '{title}')"
            )));
        }
        self.by_id.insert(id, title.clone());
        self.by_title.insert(title, id);
        Ok(())
    }

    /// Load from a JSON object of `{"Title": id, ...}`.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let table: HashMap<String, u32> = serde_json::from_reader(reader)?;
        let mut index = Self::new();
        for (title, id) in table {
            index.insert(title, id)?;
        }
        Ok(index)
    }

    /// Load from tab-separated `title<TAB>id` lines.
    ///
    /// Blank lines are skipped. Titles may contain spaces; the id is the
    /// text after the last tab.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut index = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (title, id) = line.rsplit_once('\t').ok_or_else(|| {
                Error::Format(format!("line {}: expected 'title<TAB>id'", lineno + 1))
            })?;
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| Error::Format(format!("line {}: invalid id '{id}'", lineno + 1)))?;
            index.insert(title.to_string(), id)?;
        }
        Ok(index)
    }

    /// Load from a path, dispatching on the file extension (`.json` or
    /// `.tsv`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("tsv") | Some("txt") => Self::from_tsv(path),
            other => Err(Error::Unsupported(format!(
                "title table extension {other:?} (expected .json or .tsv)"
            ))),
        }
    }

    /// Row id for a title.
    #[must_use]
    pub fn id(&self, title: &str) -> Option<u32> {
        self.by_title.get(title).copied()
    }

    /// Title for a row id.
    #[must_use]
    pub fn title(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_both_directions() {
        let mut index = TitleIndex::new();
        index.insert("Abraham Lincoln".to_string(), 0).unwrap();
        index.insert("Water treatment".to_string(), 7).unwrap();

        assert_eq!(index.id("Water treatment"), Some(7));
        assert_eq!(index.title(0), Some("Abraham Lincoln"));
        assert_eq!(index.id("Computer science"), None);
        assert_eq!(index.title(3), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn duplicate_title_rejected() {
        let mut index = TitleIndex::new();
        index.insert("Anarchism".to_string(), 0).unwrap();
        let err = index.insert("Anarchism".to_string(), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut index = TitleIndex::new();
        index.insert("Anarchism".to_string(), 0).unwrap();
        let err = index.insert("Autism".to_string(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn tsv_loading() {
        let mut file = tempfile::NamedTempFile::with_suffix(".tsv").unwrap();
        writeln!(file, "Abraham Lincoln\t0").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Water treatment\t12").unwrap();
        file.flush().unwrap();

        let index = TitleIndex::load(file.path()).unwrap();
        assert_eq!(index.id("Abraham Lincoln"), Some(0));
        assert_eq!(index.id("Water treatment"), Some(12));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn tsv_bad_id_rejected() {
        let mut file = tempfile::NamedTempFile::with_suffix(".tsv").unwrap();
        writeln!(file, "Anarchism\tzero").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            TitleIndex::load(file.path()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn json_loading() {
        let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{"Abraham Lincoln": 0, "Water treatment": 12}}"#).unwrap();
        file.flush().unwrap();

        let index = TitleIndex::load(file.path()).unwrap();
        assert_eq!(index.title(12), Some("Water treatment"));
    }

    #[test]
    fn unknown_extension_rejected() {
        assert!(matches!(
            TitleIndex::load("titles.dat"),
            Err(Error::Unsupported(_))
        ));
    }
}
