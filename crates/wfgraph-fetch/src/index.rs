//! The manifest index: one `<filename>!<hash>` identifier per line.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A manifest identifier as listed in the index, e.g. `ExportWeapons_en.json!abc`.
///
/// The full identifier (hash included) addresses the manifest on the content
/// host; only the part before `!` names the local file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(String);

impl ManifestId {
    /// Parse one index line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(Self(line.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local file name: the identifier with its `!hash` suffix stripped.
    pub fn file_name(&self) -> &str {
        match self.0.split_once('!') {
            Some((name, _)) => name,
            None => &self.0,
        }
    }

    /// Whether [`ManifestId::file_name`] is safe to join onto a directory.
    pub fn has_plain_file_name(&self) -> bool {
        let name = self.file_name();
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains("..")
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free list of manifest identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIndex {
    ids: Vec<ManifestId>,
}

impl ManifestIndex {
    /// Parse decoded index text. Blank lines are skipped; a repeated
    /// identifier keeps its first position.
    pub fn parse(text: &str) -> Self {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for id in text.lines().filter_map(ManifestId::parse) {
            if seen.insert(id.clone()) {
                ids.push(id);
            } else {
                tracing::warn!(manifest = %id, "duplicate manifest identifier in index");
            }
        }
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestId> {
        self.ids.iter()
    }
}

impl<'a> IntoIterator for &'a ManifestIndex {
    type Item = &'a ManifestId;
    type IntoIter = std::slice::Iter<'a, ManifestId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
