//! External line metadata.
//!
//! Metadata lives in a JSON sidecar keyed by section name and line id,
//! so localization and tooling can annotate lines without touching the
//! scripts. The compiler folds each entry into its compiled line and
//! rejects entries that no longer match any line.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key/value pairs attached to one line.
pub type LineMeta = IndexMap<String, String>;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("invalid metadata file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

/// All metadata for a project: section name, then line id, then entries.
///
/// The store keeps insertion order throughout so saved files diff
/// cleanly under version control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    sections: IndexMap<String, IndexMap<String, LineMeta>>,
}

impl Metadata {
    /// Load a metadata file. A missing file is an empty store, so new
    /// projects work before anyone has annotated a line.
    pub fn load(path: &Path) -> Result<Self, MetaError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(MetaError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| MetaError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), MetaError> {
        let mut raw = serde_json::to_string_pretty(self)?;
        raw.push('\n');
        std::fs::write(path, raw).map_err(|source| MetaError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Insert or replace one entry.
    pub fn set(&mut self, section: &str, line_id: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .entry(line_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, section: &str, line_id: &str) -> Option<&LineMeta> {
        self.sections.get(section)?.get(line_id)
    }

    /// Remove and return the entries for one line. A section left empty
    /// by the removal is dropped, so the dangling check only sees real
    /// leftovers.
    pub fn take(&mut self, section: &str, line_id: &str) -> Option<LineMeta> {
        let lines = self.sections.get_mut(section)?;
        let meta = lines.shift_remove(line_id)?;
        if lines.is_empty() {
            self.sections.shift_remove(section);
        }
        Some(meta)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(|lines| lines.is_empty())
    }

    /// First (section, line id) pair still in the store, if any.
    pub fn first_dangling(&self) -> Option<(&str, &str)> {
        self.sections.iter().find_map(|(section, lines)| {
            let (line_id, _) = lines.first()?;
            Some((section.as_str(), line_id.as_str()))
        })
    }

    /// All entries, flattened to (section, line id, entries).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &LineMeta)> {
        self.sections.iter().flat_map(|(section, lines)| {
            lines
                .iter()
                .map(move |(line_id, meta)| (section.as_str(), line_id.as_str(), meta))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut meta = Metadata::default();
        meta.set("intro", "greet_1", "mood", "cheerful");
        meta.set("intro", "greet_1", "camera", "close");
        meta.set("intro", "greet_2", "mood", "flat");

        let entries = meta.get("intro", "greet_1").unwrap();
        assert_eq!(entries.get("mood").unwrap(), "cheerful");
        assert_eq!(entries.get("camera").unwrap(), "close");
        assert_eq!(meta.get("intro", "greet_2").unwrap().len(), 1);
        assert!(meta.get("intro", "missing").is_none());
        assert!(meta.get("outro", "greet_1").is_none());
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut meta = Metadata::default();
        meta.set("intro", "greet_1", "mood", "cheerful");
        meta.set("intro", "greet_1", "mood", "grim");
        assert_eq!(meta.get("intro", "greet_1").unwrap().get("mood").unwrap(), "grim");
    }

    #[test]
    fn take_removes_and_prunes() {
        let mut meta = Metadata::default();
        meta.set("intro", "greet_1", "mood", "cheerful");

        let taken = meta.take("intro", "greet_1").unwrap();
        assert_eq!(taken.get("mood").unwrap(), "cheerful");
        assert!(meta.take("intro", "greet_1").is_none());
        assert!(meta.is_empty());
        assert!(meta.first_dangling().is_none());
    }

    #[test]
    fn first_dangling_skips_empty_sections() {
        let mut meta: Metadata =
            serde_json::from_str(r#"{"intro": {}, "outro": {"bye_1": {"mood": "soft"}}}"#)
                .unwrap();
        assert_eq!(meta.first_dangling().unwrap(), ("outro", "bye_1"));
        meta.take("outro", "bye_1").unwrap();
        assert!(meta.first_dangling().is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let mut meta = Metadata::default();
        meta.set("intro", "greet_1", "mood", "cheerful");
        meta.set("outro", "bye_1", "mood", "soft");

        let raw = serde_json::to_string(&meta).unwrap();
        let back: Metadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, meta);

        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["intro"]["greet_1"]["mood"], "cheerful");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let meta = Metadata::load(Path::new("/nonexistent/banter.meta.json")).unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn iter_flattens_in_order() {
        let mut meta = Metadata::default();
        meta.set("intro", "greet_1", "mood", "cheerful");
        meta.set("intro", "greet_2", "mood", "flat");
        meta.set("outro", "bye_1", "mood", "soft");

        let keys: Vec<(&str, &str)> = meta.iter().map(|(s, l, _)| (s, l)).collect();
        assert_eq!(
            keys,
            vec![("intro", "greet_1"), ("intro", "greet_2"), ("outro", "bye_1")]
        );
    }
}
