//! `[[rules]]` configuration: the asset rule table.
//!
//! Rules are evaluated by `priority` (defaulting to declaration order) and
//! the first match wins. When no `[[rules]]` are given, [`preset_rules`]
//! applies.
//!
//! # Example
//!
//! ```toml
//! [[rules]]
//! name = "style-less"
//! extensions = ["less"]
//! filename = "css/[name].[hash:8].[ext]"
//! dev_filename = "css/[dir][name].[ext]"
//!
//! [[rules.stages]]
//! name = "less"
//! params = { ext = "css", command = ["lessc", "$ASSETLINE_INPUT", "$ASSETLINE_OUTPUT"] }
//!
//! [[rules.stages]]
//! name = "extract"
//! when = "production"
//!
//! [[rules.stages]]
//! name = "inject"
//! when = "development"
//! ```

use serde::{Deserialize, Serialize};

use super::BuildSectionConfig;
use crate::config::{ConfigDiagnostics, FieldPath};
use crate::pipeline::{
    AssetRule, ExtensionMatcher, OutputRule, OutputTemplate, PipelineError, StageCondition,
    TransformStage,
};

/// Field paths for `[[rules]]` diagnostics.
pub struct RuleFields {
    pub name: FieldPath,
    pub extensions: FieldPath,
    pub priority: FieldPath,
    pub filename: FieldPath,
    pub inline_limit: FieldPath,
    pub stages: FieldPath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name shown in logs and the manifest.
    pub name: String,

    /// Matched extensions, without the leading dot. Case-sensitive.
    pub extensions: Vec<String>,

    /// Path components that make this rule skip a file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Evaluation order; lower first. Defaults to the declaration index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,

    /// Output naming template.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Output naming template in development mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_filename: Option<String>,

    /// Inline artifacts below the size threshold as data URIs.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inline: bool,

    /// Per-rule inline threshold (defaults to `build.inline_limit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<u64>,

    /// Ordered transform stages.
    pub stages: Vec<TransformStage>,
}

fn default_filename() -> String {
    "[dir][name].[ext]".into()
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl RuleConfig {
    pub const FIELDS: RuleFields = RuleFields {
        name: FieldPath::new("rules.name"),
        extensions: FieldPath::new("rules.extensions"),
        priority: FieldPath::new("rules.priority"),
        filename: FieldPath::new("rules.filename"),
        inline_limit: FieldPath::new("rules.inline_limit"),
        stages: FieldPath::new("rules.stages"),
    };

    fn new(name: &str, extensions: &[&str], filename: &str) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
            exclude: Vec::new(),
            priority: None,
            filename: filename.into(),
            dev_filename: None,
            inline: false,
            inline_limit: None,
            stages: Vec::new(),
        }
    }

    fn dev(mut self, filename: &str) -> Self {
        self.dev_filename = Some(filename.into());
        self
    }

    fn exclude(mut self, component: &str) -> Self {
        self.exclude.push(component.into());
        self
    }

    fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    fn stage(mut self, stage: TransformStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Effective priority for the rule at `index`.
    pub fn priority_at(&self, index: usize) -> u32 {
        self.priority
            .unwrap_or_else(|| u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Compile into an [`AssetRule`], parsing templates with the build settings.
    pub fn compile(
        &self,
        index: usize,
        build: &BuildSectionConfig,
    ) -> Result<AssetRule, PipelineError> {
        let template = |field: &str, source: &str| {
            OutputTemplate::parse(source, build.hash_length)
                .map_err(|e| PipelineError::malformed(&self.name, format!("{field}: {e}")))
        };

        let mut output = OutputRule::new(template("filename", &self.filename)?);
        if let Some(dev) = &self.dev_filename {
            output = output.with_dev_filename(template("dev_filename", dev)?);
        }
        if self.inline {
            output = output.inline_below(self.inline_limit.unwrap_or(build.inline_limit));
        }

        let matcher =
            ExtensionMatcher::new(self.extensions.iter().cloned()).excluding(self.exclude.iter().cloned());

        AssetRule::new(
            self.name.clone(),
            self.priority_at(index),
            matcher,
            self.stages.clone(),
            output,
        )
    }

    /// Checks that do not prevent compiling but deserve attention.
    pub fn lint(&self, diag: &mut ConfigDiagnostics) {
        if self.inline_limit.is_some() && !self.inline {
            diag.warn(
                Self::FIELDS.inline_limit,
                format!("rule `{}`: inline_limit has no effect without `inline = true`", self.name),
            );
        }
        for stage in &self.stages {
            if let Some(command) = stage.command() {
                check_command(&self.name, &stage.name, &command, diag);
            }
        }
    }
}

/// Verify an external stage command is installed.
fn check_command(rule: &str, stage: &str, command: &[String], diag: &mut ConfigDiagnostics) {
    let cmd = &command[0];
    let is_package_runner = ["npx", "bunx", "pnpx", "yarn", "dlx"].contains(&cmd.as_str());

    if which::which(cmd).is_ok() {
        return;
    }
    if is_package_runner {
        // Package runners can download packages at runtime, just hint
        if command.len() > 1 {
            diag.hint(
                RuleConfig::FIELDS.stages,
                format!("`{}` via `{}`: ensure the package is installed", command[1], cmd),
            );
        }
    } else {
        diag.error_with_hint(
            RuleConfig::FIELDS.stages,
            format!("rule `{rule}` stage `{stage}`: `{cmd}` not found"),
            "install the command or remove the stage's `command` param",
        );
    }
}

// ============================================================================
// Preset
// ============================================================================

/// Default rule table, modelled on a typical React + TypeScript bundler setup.
pub fn preset_rules() -> Vec<RuleConfig> {
    use StageCondition::{Development, Production};

    let minify = || TransformStage::new("minify").when(Production);
    let extract = || TransformStage::new("extract").when(Production);
    let inject = || TransformStage::new("inject").when(Development);

    vec![
        RuleConfig::new("script-ts", &["ts", "tsx"], "js/[name].[hash:8].[ext]")
            .dev("js/[dir][name].[ext]")
            .stage(TransformStage::new("typecheck").param("background", true))
            .stage(
                TransformStage::new("transpile")
                    .param("ext", "js")
                    .param("presets", vec!["@babel/preset-typescript", "@babel/preset-react"]),
            )
            .stage(minify()),
        RuleConfig::new("script", &["js", "jsx", "mjs"], "js/[name].[hash:8].[ext]")
            .dev("js/[dir][name].[ext]")
            .exclude("node_modules")
            .stage(
                TransformStage::new("transpile")
                    .param("ext", "js")
                    .param("presets", vec!["@babel/preset-env", "@babel/preset-react"]),
            )
            .stage(minify()),
        RuleConfig::new("style-less", &["less"], "css/[name].[hash:8].[ext]")
            .dev("css/[dir][name].[ext]")
            .stage(TransformStage::new("less").param("ext", "css"))
            .stage(minify())
            .stage(extract())
            .stage(inject()),
        RuleConfig::new("style", &["css"], "css/[name].[hash:8].[ext]")
            .dev("css/[dir][name].[ext]")
            .stage(minify())
            .stage(extract())
            .stage(inject()),
        RuleConfig::new(
            "image",
            &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif"],
            "images/[name].[hash:8].[ext]",
        )
        .inline()
        .stage(TransformStage::new("asset")),
        RuleConfig::new(
            "font",
            &["woff", "woff2", "ttf", "otf", "eot"],
            "fonts/[name].[hash:8].[ext]",
        )
        .stage(TransformStage::new("resource")),
        RuleConfig::new("data", &["json"], "data/[dir][name].[ext]")
            .stage(TransformStage::new("json"))
            .stage(minify()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use crate::core::BuildMode;
    use crate::pipeline::AddressingMode;

    #[test]
    fn test_preset_compiles() {
        let build = BuildSectionConfig::default();
        let rules: Vec<_> = preset_rules()
            .iter()
            .enumerate()
            .map(|(i, r)| r.compile(i, &build).unwrap())
            .collect();
        assert_eq!(rules.len(), 7);
        assert_eq!(rules[0].priority, 0);
        assert_eq!(rules[6].priority, 6);
        assert_eq!(rules[4].output.inline_limit, Some(16384));
        assert_eq!(rules[5].output.inline_limit, None);

        // Only plain scripts skip vendored packages
        assert!(rules[0].matcher.exclude().is_empty());
        assert_eq!(rules[1].matcher.exclude(), ["node_modules"]);
    }

    #[test]
    fn test_rules_from_toml() {
        let config = test_parse_config(
            r#"
[[rules]]
name = "vector"
extensions = ["svg"]
filename = "svg/[name].[hash:6].[ext]"
inline = true
inline_limit = 2048

[[rules.stages]]
name = "svgo"
when = "production"

[[rules.stages]]
name = "asset"
"#,
        );
        let rules = config.rules.as_ref().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].stages.len(), 2);
        assert_eq!(rules[0].stages[0].when, StageCondition::Production);

        let rule = rules[0].compile(0, &config.build).unwrap();
        let scheme = rule.output.scheme(BuildMode::Production);
        assert_eq!(scheme.addressing(2047), AddressingMode::InlineDataUri);
        assert_eq!(scheme.addressing(2048), AddressingMode::EmittedFile);
        assert_eq!(rule.chain(BuildMode::Development).len(), 1);
    }

    #[test]
    fn test_default_filename() {
        let config = test_parse_config(
            r#"
[[rules]]
name = "text"
extensions = ["txt"]
stages = [{ name = "copy" }]
"#,
        );
        let rules = config.rules.unwrap();
        assert_eq!(rules[0].filename, "[dir][name].[ext]");
    }

    #[test]
    fn test_compile_malformed_template() {
        let build = BuildSectionConfig::default();
        let mut rule = RuleConfig::new("broken", &["x"], "[name].[chunkhash].[ext]")
            .stage(TransformStage::new("copy"));
        let err = rule.compile(0, &build).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRule { .. }));
        assert!(err.to_string().contains("filename"));

        rule.filename = "[name].[ext]".into();
        rule.dev_filename = Some("[name".into());
        let err = rule.compile(0, &build).unwrap_err();
        assert!(err.to_string().contains("dev_filename"));
    }

    #[test]
    fn test_compile_uses_build_hash_length() {
        let build = BuildSectionConfig {
            hash_length: 4,
            ..BuildSectionConfig::default()
        };
        let rule = RuleConfig::new("x", &["x"], "[name].[hash].[ext]")
            .stage(TransformStage::new("copy"))
            .compile(0, &build)
            .unwrap();
        let vars = crate::pipeline::NameParts {
            name: "a",
            ext: "x",
            dir: "",
            hash: "abcdef",
        };
        assert_eq!(rule.output.filename.render(&vars), "a.abcd.x");
    }

    #[test]
    fn test_lint_inline_limit_without_inline() {
        let mut rule = RuleConfig::new("x", &["x"], "[name].[ext]").stage(TransformStage::new("copy"));
        rule.inline_limit = Some(10);
        let mut diag = ConfigDiagnostics::new();
        rule.lint(&mut diag);
        assert_eq!(diag.warnings().len(), 1);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_lint_missing_command() {
        let rule = RuleConfig::new("x", &["x"], "[name].[ext]").stage(
            TransformStage::new("tool").param("command", vec!["assetline-no-such-tool-7f3a"]),
        );
        let mut diag = ConfigDiagnostics::new();
        rule.lint(&mut diag);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_preset_roundtrips_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Rules {
            rules: Vec<RuleConfig>,
        }
        let text = toml::to_string(&Rules {
            rules: preset_rules(),
        })
        .unwrap();
        let parsed: Rules = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rules, preset_rules());
    }
}
