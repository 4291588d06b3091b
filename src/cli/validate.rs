//! `assetline validate`: check the configuration against the source tree.
//!
//! Config errors are already reported while loading. This adds the check
//! that needs the files on disk: every source must resolve to a chain in
//! both modes.

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::{
    asset::scan_sources,
    config::PackConfig,
    core::BuildMode,
    log,
    pipeline::{PipelineError, RuleSet},
    utils::plural_count,
};

/// Files per rule label, plus sources nothing resolves.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub matched: BTreeMap<String, usize>,
    pub unresolved: Vec<String>,
}

/// Select every source under both modes.
pub fn check_sources(config: &PackConfig, rules: &RuleSet) -> ValidationReport {
    let mut report = ValidationReport::default();
    let files = scan_sources(&config.build.source, &config.build.output, &config.build.exclude);

    for path in &files {
        let relative = path.strip_prefix(&config.build.source).unwrap_or(path);
        for mode in BuildMode::ALL {
            match rules.select(relative, mode) {
                Ok(sel) if mode == BuildMode::Production => {
                    *report.matched.entry(sel.label().to_string()).or_default() += 1;
                }
                Ok(_) => {}
                Err(PipelineError::UnresolvedAsset { path }) => {
                    report.unresolved.push(path);
                    break;
                }
                Err(e) => {
                    report.unresolved.push(format!("{}: {e}", relative.display()));
                    break;
                }
            }
        }
    }
    report
}

/// Run the `validate` command.
pub fn validate_project(config: &PackConfig) -> Result<()> {
    let rules = config.rule_set()?;

    if !config.build.source.is_dir() {
        log!(
            "validate";
            "config ok, source '{}' not found so no files were checked",
            config.root_relative(&config.build.source).display()
        );
        return Ok(());
    }

    let report = check_sources(config, &rules);
    for (label, count) in &report.matched {
        log!("validate"; "{label}: {}", plural_count(*count, "file"));
    }

    if !report.unresolved.is_empty() {
        for path in &report.unresolved {
            log!("error"; "no rule matches {path}");
        }
        bail!(
            "{} unresolved (enable `build.passthrough` to copy them)",
            plural_count(report.unresolved.len(), "file")
        );
    }

    log!("validate"; "ok");
    Ok(())
}
