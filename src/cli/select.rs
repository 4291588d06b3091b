//! `assetline select`: show which chain and output scheme a path gets.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use crate::{
    config::PackConfig,
    core::BuildMode,
    log,
    pipeline::{AddressingMode, RuleSet, Selection},
    utils::plural_count,
};

/// One line of `select` output.
#[derive(Debug, Serialize)]
pub struct SelectReport {
    pub path: String,
    #[serde(flatten)]
    pub selection: Selection,
    /// Size used for addressing, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addressing: Option<AddressingMode>,
}

/// Expand `-` into paths read from stdin, one per line.
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if path.as_os_str() == "-" {
            for line in io::stdin().lock().lines() {
                let line = line?;
                let line = line.trim();
                if !line.is_empty() {
                    out.push(PathBuf::from(line));
                }
            }
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

/// Select for one path. Aliases are rewritten first; `size` falls back to
/// the file's size on disk.
pub fn select_one(
    rules: &RuleSet,
    config: &PackConfig,
    path: &Path,
    mode: BuildMode,
    size: Option<u64>,
) -> Result<SelectReport, crate::pipeline::PipelineError> {
    let display = path.to_string_lossy().into_owned();
    let resolved = config.resolve.resolve(&display);
    let selection = rules.select(&resolved, mode)?;

    let size = size.or_else(|| std::fs::metadata(&resolved).ok().map(|m| m.len()));
    let addressing = size.map(|s| selection.output.addressing(s));

    Ok(SelectReport {
        path: display,
        selection,
        size,
        addressing,
    })
}

fn print_report(report: &SelectReport) {
    let sel = &report.selection;
    let label = if sel.is_passthrough() {
        sel.label().if_supports_color(Stream::Stdout, |l| l.dimmed()).to_string()
    } else {
        sel.label().if_supports_color(Stream::Stdout, |l| l.bold()).to_string()
    };
    println!("{} {} {} [{}]", report.path, "->".if_supports_color(Stream::Stdout, |a| a.dimmed()), label, sel.mode);
    println!("  chain:  {}", sel.stage_names().join(" -> "));

    let mut output = format!("  output: {}", sel.output.template);
    if let Some(limit) = sel.output.inline_limit {
        output.push_str(&format!(" (inline below {limit} bytes)"));
    }
    println!("{output}");

    if let (Some(size), Some(addressing)) = (report.size, report.addressing) {
        println!("  size:   {size} bytes, {}", addressing.name());
    }
}

/// Run the `select` command.
pub fn run_select(
    config: &PackConfig,
    paths: &[PathBuf],
    mode: BuildMode,
    size: Option<u64>,
    json: bool,
) -> Result<()> {
    let rules = config.rule_set()?;
    let paths = expand_paths(paths)?;

    let mut reports = Vec::with_capacity(paths.len());
    let mut failed = 0;
    for path in &paths {
        match select_one(&rules, config, path, mode, size) {
            Ok(report) => reports.push(report),
            Err(e) => {
                failed += 1;
                log!("error"; "{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if failed > 0 {
        bail!("{} could not be resolved", plural_count(failed, "path"));
    }
    Ok(())
}
