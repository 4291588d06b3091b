//! Asset rules: pattern → stage chain → output policy.

use std::path::Path;

use serde::Serialize;

use super::matcher::ExtensionMatcher;
use super::output::{OutputScheme, OutputTemplate};
use super::stage::{TransformStage, filter_stages};
use super::PipelineError;
use crate::core::BuildMode;

/// Output naming for a rule, possibly different per mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRule {
    pub filename: OutputTemplate,
    /// Used in development mode when set (typically without a hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_filename: Option<OutputTemplate>,
    /// Size threshold for inline addressing; `None` always emits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<u64>,
}

impl OutputRule {
    pub fn new(filename: OutputTemplate) -> Self {
        Self {
            filename,
            dev_filename: None,
            inline_limit: None,
        }
    }

    pub fn with_dev_filename(mut self, template: OutputTemplate) -> Self {
        self.dev_filename = Some(template);
        self
    }

    pub fn inline_below(mut self, limit: u64) -> Self {
        self.inline_limit = Some(limit);
        self
    }

    pub fn scheme(&self, mode: BuildMode) -> OutputScheme {
        let template = match (&self.dev_filename, mode) {
            (Some(dev), BuildMode::Development) => dev.clone(),
            _ => self.filename.clone(),
        };
        OutputScheme {
            template,
            inline_limit: self.inline_limit,
        }
    }
}

/// A single entry of the rule table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRule {
    pub name: String,
    /// Lower values are consulted first.
    pub priority: u32,
    pub matcher: ExtensionMatcher,
    pub stages: Vec<TransformStage>,
    pub output: OutputRule,
}

impl AssetRule {
    /// Build a rule, rejecting empty patterns and unusable chains.
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        matcher: ExtensionMatcher,
        stages: Vec<TransformStage>,
        output: OutputRule,
    ) -> Result<Self, PipelineError> {
        let rule = Self {
            name: name.into(),
            priority,
            matcher,
            stages,
            output,
        };
        rule.validate()?;
        Ok(rule)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let fail = |reason: String| PipelineError::malformed(&self.name, reason);

        if self.name.trim().is_empty() {
            return Err(PipelineError::malformed("<unnamed>", "rule name is empty"));
        }
        self.matcher.validate().map_err(fail)?;

        if self.stages.is_empty() {
            return Err(fail("pipeline has no stages".into()));
        }
        for stage in &self.stages {
            stage.validate_name().map_err(fail)?;
        }
        for mode in BuildMode::ALL {
            if !self.stages.iter().any(|s| s.applies(mode)) {
                return Err(fail(format!("no stage applies in {mode} mode")));
            }
        }
        if self.output.inline_limit == Some(0) {
            return Err(fail("inline limit of 0 can never inline".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.matches(path)
    }

    /// Stages that apply under `mode`, in declaration order.
    pub fn chain(&self, mode: BuildMode) -> Vec<TransformStage> {
        filter_stages(&self.stages, mode)
    }
}
