//! Project configuration management for `assetline.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── resolve    # [resolve]
//! │   └── rules      # [[rules]] and the default preset
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # PackConfig (this file)
//! ```
//!
//! A missing config file is not an error: defaults and the preset rule
//! table apply, rooted at the current directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BuildSectionConfig, ResolveConfig, RuleConfig, preset_rules};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{Cli, ModeArgs};
use crate::log;
use crate::pipeline::{PipelineError, RuleSet};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing assetline.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildSectionConfig,

    /// Import aliases
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Rule table; `None` selects the preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleConfig>>,
}

impl PackConfig {
    /// Load configuration for the given CLI invocation.
    ///
    /// Searches upward from cwd for the config file. The project root is
    /// the config file's parent directory, or cwd when none is found.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let found = if cli.is_init() {
            None
        } else {
            find_config_file(&cwd, &cli.config)
        };

        let mut config = match &found {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        config.config_path = found.unwrap_or_else(|| cwd.join(&cli.config));
        if !cli.is_init() && !config.config_path.exists() {
            log!("config"; "{} not found, using default rules", cli.config.display());
        }

        let root = config
            .config_path
            .parent()
            .map_or_else(|| cwd.clone(), Path::to_path_buf);
        config.finalize(&root, cli);

        if !cli.is_init() {
            config.validate()?;
        }
        Ok(config)
    }

    /// Finalize configuration after loading.
    fn finalize(&mut self, root: &Path, cli: &Cli) {
        Self::update_option(&mut self.build.source, cli.source.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());
        if let Some(args) = cli.mode_args() {
            self.apply_mode_args(args);
        }
        if let crate::cli::Commands::Build { build_args } = &cli.command {
            self.build.clean = build_args.clean;
            Self::update_option(&mut self.build.inline_limit, build_args.inline_limit.as_ref());
        }
        crate::logger::set_verbose(cli.verbose);

        self.normalize_paths(root);
    }

    fn apply_mode_args(&mut self, args: &ModeArgs) {
        Self::update_option(&mut self.build.passthrough, args.passthrough.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize all paths relative to root directory.
    fn normalize_paths(&mut self, root: &Path) {
        use crate::utils::path::normalize_path;

        self.root = normalize_path(root);
        self.config_path = normalize_path(&self.config_path);
        self.build.source = normalize_path(&self.root.join(&self.build.source));
        self.build.output = normalize_path(&self.root.join(&self.build.output));
        self.resolve.normalize(&self.root);
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Configured rules, or the preset when `[[rules]]` is absent.
    pub fn rules(&self) -> Vec<RuleConfig> {
        self.rules.clone().unwrap_or_else(preset_rules)
    }

    /// Whether the preset rule table is in effect.
    pub fn uses_preset(&self) -> bool {
        self.rules.is_none()
    }

    /// Compile the rule table into a selector.
    pub fn rule_set(&self) -> Result<RuleSet, PipelineError> {
        let rules = self
            .rules()
            .iter()
            .enumerate()
            .map(|(i, rule)| rule.compile(i, &self.build))
            .collect::<Result<Vec<_>, _>>()?;

        let set = RuleSet::new(rules)?;
        Ok(if self.build.passthrough {
            set
        } else {
            set.without_passthrough()
        })
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.resolve.validate(&mut diag);
        self.validate_rules(&mut diag);

        diag.print_warnings();
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    fn validate_rules(&self, diag: &mut ConfigDiagnostics) {
        let rules = self.rules();
        let mut names = FxHashSet::default();
        let mut compiled = true;

        for (i, rule) in rules.iter().enumerate() {
            if !names.insert(rule.name.as_str()) {
                diag.warn(
                    RuleConfig::FIELDS.name,
                    format!("rule name `{}` is used more than once", rule.name),
                );
            }
            if let Err(e) = rule.compile(i, &self.build) {
                diag.error(RuleConfig::FIELDS.stages, e.to_string());
                compiled = false;
            }
            rule.lint(diag);
        }

        // Ordering checks need every rule to compile first
        if !compiled {
            return;
        }
        match self.rule_set() {
            Ok(set) => {
                for (rule, ext, earlier) in set.shadowed_extensions() {
                    diag.warn(
                        RuleConfig::FIELDS.extensions,
                        format!("`.{ext}` in rule `{rule}` is always taken by earlier rule `{earlier}`"),
                    );
                }
            }
            Err(e) => diag.error(RuleConfig::FIELDS.priority, e.to_string()),
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config text. Panics if there are unknown fields (to catch config
/// typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PackConfig {
    let (parsed, ignored) = PackConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BuildMode;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_from_str_invalid_toml() {
        let result = PackConfig::parse_with_ignored("[build\nsource = \"src\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\nsource = \"web\"\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = PackConfig::parse_with_ignored(content).unwrap();
        assert_eq!(config.build.source, PathBuf::from("web"));
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_unknown_rule_field_detected() {
        let content = "[[rules]]\nname = \"x\"\nextensions = [\"x\"]\ntest = \"/x$/\"\nstages = []";
        let (_, ignored) = PackConfig::parse_with_ignored(content).unwrap();
        assert_eq!(ignored.len(), 1);
        assert!(ignored[0].contains("test"));
    }

    #[test]
    fn test_preset_when_rules_absent() {
        let config = test_parse_config("");
        assert!(config.uses_preset());
        let set = config.rule_set().unwrap();
        assert_eq!(set.len(), 7);
        assert!(set.passthrough_enabled());

        let sel = set.select("src/index.less", BuildMode::Production).unwrap();
        assert_eq!(sel.stage_names(), ["less", "minify", "extract"]);
    }

    #[test]
    fn test_passthrough_disabled() {
        let config = test_parse_config("[build]\npassthrough = false");
        let set = config.rule_set().unwrap();
        assert!(matches!(
            set.select("README", BuildMode::Production),
            Err(PipelineError::UnresolvedAsset { .. })
        ));
    }

    #[test]
    fn test_explicit_priority_reorders() {
        let config = test_parse_config(
            r#"
[[rules]]
name = "css"
extensions = ["css"]
stages = [{ name = "copy" }]

[[rules]]
name = "css-modules"
extensions = ["module.css"]
priority = 0
stages = [{ name = "modules" }]
"#,
        );
        // Declaration index 0 collides with the explicit priority
        assert!(matches!(
            config.rule_set(),
            Err(PipelineError::MalformedRule { .. })
        ));

        let mut config = config;
        if let Some(rules) = config.rules.as_mut() {
            rules[0].priority = Some(10);
        }
        let set = config.rule_set().unwrap();
        let sel = set.select("a.module.css", BuildMode::Development).unwrap();
        assert_eq!(sel.label(), "css-modules");
        let sel = set.select("a.css", BuildMode::Development).unwrap();
        assert_eq!(sel.label(), "css");
    }

    #[test]
    fn test_validate_collects_rule_errors() {
        let mut config = test_parse_config(
            r#"
[[rules]]
name = "broken"
extensions = []
stages = [{ name = "copy" }]

[[rules]]
name = "prod-only"
extensions = ["x"]
stages = [{ name = "minify", when = "production" }]
"#,
        );
        config.build.source = PathBuf::from("/nonexistent/src");
        config.build.output = PathBuf::from("/nonexistent/build");

        let err = config.validate().unwrap_err();
        let Some(ConfigError::Diagnostics(diag)) = err.downcast_ref::<ConfigError>() else {
            panic!("expected diagnostics, got {err}");
        };
        assert_eq!(diag.errors().len(), 2);
    }

    #[test]
    fn test_load_applies_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("assetline.toml");
        fs::create_dir_all(dir.path().join("web")).unwrap();
        fs::write(
            &config_path,
            "[build]\nsource = \"web\"\ninline_limit = 100\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "assetline",
            "-C",
            config_path.to_str().unwrap(),
            "-o",
            "dist",
            "build",
            "--inline-limit",
            "2048",
            "--passthrough=false",
        ]);
        let config = PackConfig::load(&cli).unwrap();

        assert_eq!(config.build.inline_limit, 2048);
        assert!(!config.build.passthrough);
        assert!(config.build.source.ends_with("web"));
        assert!(config.build.output.ends_with("dist"));
        assert!(config.build.output.is_absolute());
        assert_eq!(config.root_relative(&config.build.source), PathBuf::from("web"));
    }

    #[test]
    fn test_serialized_preset_parses_back() {
        let config = PackConfig {
            rules: Some(preset_rules()),
            ..PackConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = test_parse_config(&text);
        assert_eq!(parsed.rules, Some(preset_rules()));
        assert_eq!(parsed.build.inline_limit, config.build.inline_limit);
    }
}
