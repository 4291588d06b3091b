//! Extension predicates for asset rules.

use std::path::{Component, Path};

use serde::Serialize;

/// Case-sensitive extension predicate with optional path exclusions.
///
/// Extensions may be compound (`module.css`) so a more specific rule can
/// be declared ahead of a generic one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionMatcher {
    extensions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude: Vec<String>,
}

impl ExtensionMatcher {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    /// Reject paths containing any of these components (e.g. `node_modules`).
    pub fn excluding<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }
        candidate_suffixes(path)
            .iter()
            .any(|suffix| self.extensions.iter().any(|ext| ext == suffix))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        !self.exclude.is_empty()
            && path.components().any(|c| match c {
                Component::Normal(name) => {
                    let name = name.to_str();
                    self.exclude.iter().any(|x| name == Some(x.as_str()))
                }
                _ => false,
            })
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.extensions.is_empty() {
            return Err("no extensions to match".into());
        }
        for ext in &self.extensions {
            if ext.is_empty() {
                return Err("empty extension".into());
            }
            if ext.starts_with('.') || ext.ends_with('.') {
                return Err(format!("extension `{ext}` must not start or end with `.`"));
            }
            if ext.contains(['/', '\\']) {
                return Err(format!("extension `{ext}` must not contain a path separator"));
            }
        }
        if self.exclude.iter().any(String::is_empty) {
            return Err("empty exclude entry".into());
        }
        Ok(())
    }
}

/// Dotted suffixes of the file name, longest first.
///
/// `app.module.css` yields `module.css` then `css`. A leading dot marks a
/// hidden file, not an extension, so `.env` yields nothing.
pub fn candidate_suffixes(path: &Path) -> Vec<&str> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Vec::new();
    };
    let skip = usize::from(name.starts_with('.'));
    name.match_indices('.')
        .filter(|(i, _)| *i >= skip)
        .map(|(i, _)| &name[i + 1..])
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_suffixes() {
        assert_eq!(candidate_suffixes(Path::new("src/App.tsx")), ["tsx"]);
        assert_eq!(
            candidate_suffixes(Path::new("styles/app.module.css")),
            ["module.css", "css"]
        );
        assert!(candidate_suffixes(Path::new("Makefile")).is_empty());
        assert!(candidate_suffixes(Path::new(".env")).is_empty());
        assert_eq!(candidate_suffixes(Path::new(".eslintrc.js")), ["js"]);
        assert!(candidate_suffixes(Path::new("trailing.")).is_empty());
    }

    #[test]
    fn test_matches_case_sensitive() {
        let m = ExtensionMatcher::new(["png", "jpg"]);
        assert!(m.matches(Path::new("assets/react.png")));
        assert!(m.matches(Path::new("/abs/react.jpg")));
        assert!(!m.matches(Path::new("assets/react.PNG")));
        assert!(!m.matches(Path::new("assets/react.jpeg")));
    }

    #[test]
    fn test_compound_extension() {
        let modules = ExtensionMatcher::new(["module.css"]);
        let plain = ExtensionMatcher::new(["css"]);
        assert!(modules.matches(Path::new("a.module.css")));
        assert!(!modules.matches(Path::new("a.css")));
        assert!(plain.matches(Path::new("a.module.css")));
    }

    #[test]
    fn test_exclude() {
        let m = ExtensionMatcher::new(["js"]).excluding(["node_modules"]);
        assert!(m.matches(Path::new("src/index.js")));
        assert!(!m.matches(Path::new("node_modules/react/index.js")));
        assert!(!m.matches(Path::new("/repo/node_modules/x.js")));
        // Only whole components are excluded
        assert!(m.matches(Path::new("src/node_modules_shim.js")));
    }

    #[test]
    fn test_validate() {
        assert!(ExtensionMatcher::new(["css"]).validate().is_ok());
        assert!(ExtensionMatcher::new(Vec::<String>::new()).validate().is_err());
        assert!(ExtensionMatcher::new([".css"]).validate().is_err());
        assert!(ExtensionMatcher::new([""]).validate().is_err());
        assert!(ExtensionMatcher::new(["a/b"]).validate().is_err());
        assert!(
            ExtensionMatcher::new(["js"])
                .excluding([""])
                .validate()
                .is_err()
        );
    }
}
