//! Build manifest: source path → emitted file or inline data URI.
//!
//! ```json
//! {
//!   "assets/react.png": { "rule": "image", "inline": "data:image/png;base64,..." },
//!   "index.tsx": { "rule": "script-ts", "file": "js/index.1a2b3c4d.js" },
//!   "robots.txt": { "file": "robots.txt" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::StageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Matched rule; absent for passthrough copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Output-relative file name of an emitted artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// `data:` URI of an inlined artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
}

/// Manifest keyed by source path (forward slashes), sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn insert(&mut self, source: String, entry: ManifestEntry) {
        self.entries.insert(source, entry);
    }

    pub fn get(&self, source: &str) -> Option<&ManifestEntry> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<(), StageError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            StageError::io(path, std::io::Error::other(e))
        })?;
        fs::write(path, json + "\n").map_err(|e| StageError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_json_shape() {
        let mut manifest = Manifest::default();
        manifest.insert(
            "robots.txt".into(),
            ManifestEntry {
                rule: None,
                file: Some("robots.txt".into()),
                inline: None,
            },
        );
        manifest.insert(
            "assets/react.png".into(),
            ManifestEntry {
                rule: Some("image".into()),
                file: None,
                inline: Some("data:image/png;base64,AA==".into()),
            },
        );

        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(
            json,
            r#"{"assets/react.png":{"rule":"image","inline":"data:image/png;base64,AA=="},"robots.txt":{"file":"robots.txt"}}"#
        );
    }

    #[test]
    fn test_manifest_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::default();
        manifest.insert(
            "a.css".into(),
            ManifestEntry {
                rule: Some("style".into()),
                file: Some("css/a.css".into()),
                inline: None,
            },
        );
        manifest.write(&path).unwrap();

        let parsed: Manifest = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.get("a.css").and_then(|e| e.file.as_deref()), Some("css/a.css"));
    }
}
