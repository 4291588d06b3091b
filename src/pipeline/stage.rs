//! Transform stages and their mode predicates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::BuildMode;

/// Per-stage options, kept sorted so printed chains are stable.
pub type StageParams = BTreeMap<String, toml::Value>;

/// Predicate deciding whether a stage is part of the chain for a mode.
///
/// A stage whose predicate is false is dropped from the chain entirely,
/// not merely reconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCondition {
    #[default]
    Always,
    Production,
    Development,
}

impl StageCondition {
    #[inline]
    pub const fn applies(self, mode: BuildMode) -> bool {
        match self {
            Self::Always => true,
            Self::Production => matches!(mode, BuildMode::Production),
            Self::Development => matches!(mode, BuildMode::Development),
        }
    }

    pub const fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

/// One named processing step in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStage {
    pub name: String,

    #[serde(default, skip_serializing_if = "StageCondition::is_always")]
    pub when: StageCondition,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: StageParams,
}

impl TransformStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: StageCondition::Always,
            params: StageParams::new(),
        }
    }

    pub fn when(mut self, condition: StageCondition) -> Self {
        self.when = condition;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn applies(&self, mode: BuildMode) -> bool {
        self.when.applies(mode)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(toml::Value::as_str)
    }

    /// Boolean option, `false` when absent.
    pub fn param_flag(&self, key: &str) -> bool {
        self.params
            .get(key)
            .and_then(toml::Value::as_bool)
            .unwrap_or(false)
    }

    /// Extension the artifact carries after this stage (`ext = "css"`).
    pub fn output_ext(&self) -> Option<&str> {
        self.param_str("ext")
    }

    /// External command for this stage, if configured.
    ///
    /// Accepts `command = "tool"` or `command = ["tool", "arg", ...]`.
    pub fn command(&self) -> Option<Vec<String>> {
        let args: Vec<String> = match self.params.get("command")? {
            toml::Value::String(s) => vec![s.clone()],
            toml::Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => return None,
        };
        (!args.is_empty()).then_some(args)
    }

    /// Runs out of process without blocking the rest of the chain.
    pub fn is_background(&self) -> bool {
        self.param_flag("background")
    }

    /// Stage names must be non-empty identifiers (`a-z`, `0-9`, `-`, `_`).
    pub(crate) fn validate_name(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("stage with empty name".into());
        }
        let valid = self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(format!("invalid stage name `{}`", self.name));
        }
        Ok(())
    }
}

/// Keep the stages that apply under `mode`, preserving their order.
///
/// Filtering is idempotent: the predicates survive, so filtering an
/// already-filtered chain by the same mode yields the same chain.
pub fn filter_stages(stages: &[TransformStage], mode: BuildMode) -> Vec<TransformStage> {
    stages.iter().filter(|s| s.applies(mode)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_chain() -> Vec<TransformStage> {
        vec![
            TransformStage::new("less").param("ext", "css"),
            TransformStage::new("minify").when(StageCondition::Production),
            TransformStage::new("extract").when(StageCondition::Production),
            TransformStage::new("inject").when(StageCondition::Development),
        ]
    }

    fn names(stages: &[TransformStage]) -> Vec<&str> {
        stages.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_condition_applies() {
        assert!(StageCondition::Always.applies(BuildMode::Production));
        assert!(StageCondition::Always.applies(BuildMode::Development));
        assert!(StageCondition::Production.applies(BuildMode::Production));
        assert!(!StageCondition::Production.applies(BuildMode::Development));
        assert!(StageCondition::Development.applies(BuildMode::Development));
        assert!(!StageCondition::Development.applies(BuildMode::Production));
    }

    #[test]
    fn test_filter_preserves_order() {
        let chain = style_chain();
        assert_eq!(
            names(&filter_stages(&chain, BuildMode::Production)),
            ["less", "minify", "extract"]
        );
        assert_eq!(
            names(&filter_stages(&chain, BuildMode::Development)),
            ["less", "inject"]
        );
    }

    #[test]
    fn test_filter_idempotent() {
        let chain = style_chain();
        for mode in [BuildMode::Development, BuildMode::Production] {
            let once = filter_stages(&chain, mode);
            let twice = filter_stages(&once, mode);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_command_param() {
        let stage = TransformStage::new("less").param("command", vec!["lessc", "$ASSETLINE_INPUT"]);
        assert_eq!(
            stage.command(),
            Some(vec!["lessc".to_string(), "$ASSETLINE_INPUT".to_string()])
        );

        let stage = TransformStage::new("less").param("command", "lessc");
        assert_eq!(stage.command(), Some(vec!["lessc".to_string()]));

        let empty: Vec<&str> = Vec::new();
        let stage = TransformStage::new("less").param("command", empty);
        assert_eq!(stage.command(), None);
        assert_eq!(TransformStage::new("less").command(), None);
    }

    #[test]
    fn test_flags_and_ext() {
        let stage = TransformStage::new("typecheck").param("background", true);
        assert!(stage.is_background());
        assert!(!TransformStage::new("typecheck").is_background());

        let stage = TransformStage::new("transpile").param("ext", "js");
        assert_eq!(stage.output_ext(), Some("js"));
    }

    #[test]
    fn test_validate_name() {
        assert!(TransformStage::new("type-check_2").validate_name().is_ok());
        assert!(TransformStage::new("").validate_name().is_err());
        assert!(TransformStage::new("post css").validate_name().is_err());
    }

    #[test]
    fn test_stage_from_toml() {
        let stage: TransformStage = toml::from_str(
            r#"
name = "extract"
when = "production"
params = { chunk = "main" }
"#,
        )
        .unwrap();
        assert_eq!(stage.name, "extract");
        assert_eq!(stage.when, StageCondition::Production);
        assert_eq!(stage.param_str("chunk"), Some("main"));

        let stage: TransformStage = toml::from_str(r#"name = "copy""#).unwrap();
        assert_eq!(stage.when, StageCondition::Always);
        assert!(stage.params.is_empty());
    }
}
