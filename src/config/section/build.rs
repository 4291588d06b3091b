//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! mode = "production"         # Fallback when neither --mode nor ASSETLINE_MODE is set
//! source = "src"              # Directory scanned by `assetline build`
//! output = "build"            # Output directory
//! passthrough = true          # Copy files no rule matches (false = error)
//! inline_limit = 16384        # Default inline threshold for `inline = true` rules
//! hash_length = 8             # Length of a bare `[hash]` token
//! exclude = ["node_modules"]  # Path components never scanned
//! manifest = "manifest.json"  # Manifest file name inside output
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::core::BuildMode;
use crate::pipeline::{MAX_HASH_LENGTH, OutputScheme};

/// Field paths for `[build]` diagnostics.
pub struct BuildFields {
    pub mode: FieldPath,
    pub source: FieldPath,
    pub output: FieldPath,
    pub passthrough: FieldPath,
    pub inline_limit: FieldPath,
    pub hash_length: FieldPath,
    pub exclude: FieldPath,
    pub manifest: FieldPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Mode used when no CLI flag or environment value is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,

    /// Source directory.
    pub source: PathBuf,

    /// Build output directory.
    pub output: PathBuf,

    /// Copy unmatched files instead of failing with an unresolved asset.
    pub passthrough: bool,

    /// Inline threshold in bytes.
    pub inline_limit: u64,

    /// Default `[hash]` length.
    pub hash_length: usize,

    /// Path components skipped while scanning.
    pub exclude: Vec<String>,

    /// Manifest file name (relative to output).
    pub manifest: String,

    /// Clean output directory before building (CLI only).
    #[serde(skip)]
    pub clean: bool,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            mode: None,
            source: "src".into(),
            output: "build".into(),
            passthrough: true,
            inline_limit: OutputScheme::DEFAULT_INLINE_LIMIT,
            hash_length: OutputScheme::DEFAULT_HASH_LENGTH,
            exclude: vec!["node_modules".into()],
            manifest: "manifest.json".into(),
            clean: false,
        }
    }
}

impl BuildSectionConfig {
    pub const FIELDS: BuildFields = BuildFields {
        mode: FieldPath::new("build.mode"),
        source: FieldPath::new("build.source"),
        output: FieldPath::new("build.output"),
        passthrough: FieldPath::new("build.passthrough"),
        inline_limit: FieldPath::new("build.inline_limit"),
        hash_length: FieldPath::new("build.hash_length"),
        exclude: FieldPath::new("build.exclude"),
        manifest: FieldPath::new("build.manifest"),
    };

    /// Validate build configuration (after path normalization).
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !(1..=MAX_HASH_LENGTH).contains(&self.hash_length) {
            diag.error(
                Self::FIELDS.hash_length,
                format!(
                    "{} must be between 1 and {MAX_HASH_LENGTH}, got {}",
                    Self::FIELDS.hash_length,
                    self.hash_length
                ),
            );
        }

        if self.inline_limit == 0 {
            diag.error_with_hint(
                Self::FIELDS.inline_limit,
                format!("{} must be greater than 0", Self::FIELDS.inline_limit),
                "set `inline = false` on a rule to always emit files",
            );
        }

        if self.exclude.iter().any(|e| e.is_empty() || e.contains(['/', '\\'])) {
            diag.error(
                Self::FIELDS.exclude,
                "entries must be single path components like \"node_modules\"",
            );
        }

        if self.manifest.is_empty() || self.manifest.contains(['/', '\\']) {
            diag.error(
                Self::FIELDS.manifest,
                format!("invalid manifest file name '{}'", self.manifest),
            );
        }

        // `--clean` removes output: it must never contain the sources
        if self.source.starts_with(&self.output) {
            diag.error_with_hint(
                Self::FIELDS.output,
                format!(
                    "output '{}' contains source '{}'",
                    self.output.display(),
                    self.source.display()
                ),
                "choose a separate output directory",
            );
        }

        if !self.source.exists() {
            diag.hint(
                Self::FIELDS.source,
                format!("directory '{}' not found", self.source.display()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.mode, None);
        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert!(config.build.passthrough);
        assert_eq!(config.build.inline_limit, 16384);
        assert_eq!(config.build.hash_length, 8);
        assert_eq!(config.build.exclude, vec!["node_modules"]);
        assert_eq!(config.build.manifest, "manifest.json");
    }

    #[test]
    fn test_custom_build() {
        let config = test_parse_config(
            r#"
[build]
mode = "development"
source = "app"
output = "dist"
passthrough = false
inline_limit = 8192
hash_length = 12
"#,
        );
        assert_eq!(config.build.mode, Some(BuildMode::Development));
        assert_eq!(config.build.source, PathBuf::from("app"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert!(!config.build.passthrough);
        assert_eq!(config.build.inline_limit, 8192);
        assert_eq!(config.build.hash_length, 12);
    }

    #[test]
    fn test_validate_ranges() {
        let build = BuildSectionConfig {
            hash_length: 0,
            inline_limit: 0,
            manifest: "meta/manifest.json".into(),
            exclude: vec!["a/b".into()],
            ..BuildSectionConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert_eq!(diag.len(), 4);
    }

    #[test]
    fn test_validate_output_contains_source() {
        let build = BuildSectionConfig {
            source: "/site/src".into(),
            output: "/site".into(),
            ..BuildSectionConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        build.validate(&mut diag);
        assert!(
            diag.errors()
                .iter()
                .any(|e| e.field == BuildSectionConfig::FIELDS.output)
        );
    }
}
