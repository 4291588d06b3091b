//! Rule table and pipeline selection.

use std::path::Path;

use serde::Serialize;

use super::output::OutputScheme;
use super::rule::AssetRule;
use super::stage::TransformStage;
use super::PipelineError;
use crate::core::BuildMode;

/// Stage used for files no rule claims.
pub const PASSTHROUGH_STAGE: &str = "copy";

/// Result of selecting a pipeline for one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    /// Matched rule name, `None` for passthrough.
    pub rule: Option<String>,
    pub mode: BuildMode,
    pub chain: Vec<TransformStage>,
    pub output: OutputScheme,
}

impl Selection {
    pub fn is_passthrough(&self) -> bool {
        self.rule.is_none()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.chain.iter().any(|s| s.name == name)
    }

    /// Last stage of the chain.
    pub fn terminal(&self) -> Option<&TransformStage> {
        self.chain.last()
    }

    /// Display label: rule name or `passthrough`.
    pub fn label(&self) -> &str {
        self.rule.as_deref().unwrap_or("passthrough")
    }
}

/// Immutable, priority-ordered rule table.
///
/// Built once at configuration load and shared read-only between build
/// workers; selection takes `&self` and performs no I/O.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<AssetRule>,
    passthrough: Option<OutputScheme>,
}

impl RuleSet {
    /// Order rules by priority. Duplicate priorities are rejected since
    /// they leave first-match order undefined.
    pub fn new(mut rules: Vec<AssetRule>) -> Result<Self, PipelineError> {
        rules.sort_by_key(|r| r.priority);
        if let Some(pair) = rules.windows(2).find(|w| w[0].priority == w[1].priority) {
            return Err(PipelineError::malformed(
                &pair[1].name,
                format!(
                    "priority {} is already used by rule `{}`",
                    pair[1].priority, pair[0].name
                ),
            ));
        }
        Ok(Self {
            rules,
            passthrough: Some(OutputScheme::passthrough()),
        })
    }

    /// Replace the scheme used for unmatched files.
    pub fn with_passthrough(mut self, scheme: OutputScheme) -> Self {
        self.passthrough = Some(scheme);
        self
    }

    /// Fail with `UnresolvedAsset` for unmatched files instead of copying.
    pub fn without_passthrough(mut self) -> Self {
        self.passthrough = None;
        self
    }

    pub const fn passthrough_enabled(&self) -> bool {
        self.passthrough.is_some()
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[AssetRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule accepting `path`.
    pub fn find(&self, path: &Path) -> Option<&AssetRule> {
        self.rules.iter().find(|r| r.matches(path))
    }

    /// Select the stage chain and output scheme for `path` under `mode`.
    pub fn select(&self, path: impl AsRef<Path>, mode: BuildMode) -> Result<Selection, PipelineError> {
        let path = path.as_ref();

        if let Some(rule) = self.find(path) {
            return Ok(Selection {
                rule: Some(rule.name.clone()),
                mode,
                chain: rule.chain(mode),
                output: rule.output.scheme(mode),
            });
        }

        match &self.passthrough {
            Some(scheme) => Ok(Selection {
                rule: None,
                mode,
                chain: vec![TransformStage::new(PASSTHROUGH_STAGE)],
                output: scheme.clone(),
            }),
            None => Err(PipelineError::unresolved(path)),
        }
    }

    /// Extensions claimed by a rule that an earlier rule always takes.
    ///
    /// Returns `(shadowed_rule, extension, earlier_rule)`. An earlier `css`
    /// also takes a later `module.css`, since every `*.module.css` path has
    /// `css` as a candidate suffix. An earlier rule with exclusions does not
    /// fully shadow, so it is not reported.
    pub fn shadowed_extensions(&self) -> Vec<(&str, &str, &str)> {
        let covers = |earlier: &str, ext: &str| {
            ext == earlier
                || ext
                    .strip_suffix(earlier)
                    .is_some_and(|head| head.ends_with('.'))
        };

        let mut shadowed = Vec::new();
        for (i, rule) in self.rules.iter().enumerate() {
            for ext in rule.matcher.extensions() {
                let earlier = self.rules[..i].iter().find(|r| {
                    r.matcher.exclude().is_empty()
                        && r.matcher.extensions().iter().any(|e| covers(e.as_str(), ext.as_str()))
                });
                if let Some(earlier) = earlier {
                    shadowed.push((rule.name.as_str(), ext.as_str(), earlier.name.as_str()));
                }
            }
        }
        shadowed
    }
}
