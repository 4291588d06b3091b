//! `[resolve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [resolve]
//! alias = { "@" = "src" }   # "@/assets/logo.png" → "src/assets/logo.png"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Import-specifier prefix → directory (relative to project root).
    pub alias: BTreeMap<String, PathBuf>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            alias: BTreeMap::from([("@".to_string(), PathBuf::from("src"))]),
        }
    }
}

impl ResolveConfig {
    pub const FIELD_ALIAS: FieldPath = FieldPath::new("resolve.alias");

    /// Rewrite an aliased specifier into a path.
    ///
    /// The longest matching prefix wins and must end on a `/` boundary,
    /// so `@` does not capture `@scope/pkg/file.js` unless aliased as such.
    pub fn resolve(&self, specifier: &str) -> PathBuf {
        let hit = self
            .alias
            .iter()
            .filter(|(prefix, _)| {
                specifier == prefix.as_str()
                    || specifier
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len());

        match hit {
            Some((prefix, target)) => {
                let rest = specifier[prefix.len()..].trim_start_matches('/');
                if rest.is_empty() {
                    target.clone()
                } else {
                    target.join(rest)
                }
            }
            None => PathBuf::from(specifier),
        }
    }

    /// Normalize alias targets relative to root directory.
    pub fn normalize(&mut self, root: &Path) {
        for target in self.alias.values_mut() {
            *target = crate::utils::path::normalize_path(&root.join(&*target));
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for prefix in self.alias.keys() {
            if prefix.is_empty() || prefix.ends_with('/') {
                diag.error(
                    Self::FIELD_ALIAS,
                    format!("alias prefix '{prefix}' must be non-empty without a trailing '/'"),
                );
            }
        }
    }
}
