//! `assetline build`: run every source file through its selected chain.
//!
//! Phases:
//! - **Init** - optional clean, output directory
//! - **Collect** - scan the source directory
//! - **Process** - parallel select + stage chain + addressing per file
//! - **Join** - wait for background stages
//! - **Finalize** - manifest, scratch cleanup, summary

use crate::{
    asset::{BackgroundJob, BuildContext, Manifest, Processed, StageError, process_file, scan_sources},
    config::PackConfig,
    core::{BuildMode, is_shutdown},
    log,
    logger::ProgressLine,
    pipeline::{AddressingMode, RuleSet},
    utils::plural_count,
};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

/// Scratch directory for external stages, inside the output directory.
const SCRATCH_DIR: &str = ".assetline";

/// Counts reported at the end of a build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub emitted: usize,
    pub inlined: usize,
    pub failed: usize,
    /// Stage names that ran without a command and passed through.
    pub delegated: BTreeSet<String>,
    pub manifest: Manifest,
}

/// Build all sources under `config.build.source`.
pub fn build_assets(config: &PackConfig, mode: BuildMode, quiet: bool) -> Result<BuildReport> {
    let rules = config.rule_set()?;
    let output = &config.build.output;
    init_output(output, config.build.clean)?;

    let files = scan_sources(&config.build.source, output, &config.build.exclude);
    if !quiet {
        log!(
            "build";
            "{} mode, {}, {}",
            mode,
            plural_count(rules.len(), "rule"),
            plural_count(files.len(), "file")
        );
    }

    let scratch = output.join(SCRATCH_DIR);
    let ctx = BuildContext {
        rules: &rules,
        mode,
        root: config.get_root(),
        source_dir: &config.build.source,
        output_dir: output,
        scratch_dir: &scratch,
    };

    let progress = (!quiet).then(|| create_progress(&files, &config.build.source, &rules, mode));
    let results = process_files(&files, &ctx, progress.as_ref());
    if let Some(p) = progress {
        p.finish();
    }

    let mut report = collect_results(config, results);
    if is_shutdown() {
        bail!("build interrupted");
    }

    let manifest_path = output.join(&config.build.manifest);
    report.manifest.write(&manifest_path)?;
    if scratch.exists() {
        fs::remove_dir_all(&scratch).ok();
    }

    if !quiet {
        log_build_result(&report, &manifest_path, config);
    }
    if report.failed > 0 {
        bail!("{} failed", plural_count(report.failed, "asset"));
    }
    Ok(report)
}

/// Create or clean the output directory.
fn init_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output).with_context(|| {
            format!("Failed to clear output directory: {}", output.display())
        })?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// One progress counter per rule label, in rule order.
fn create_progress(files: &[PathBuf], source: &Path, rules: &RuleSet, mode: BuildMode) -> ProgressLine {
    let mut counts: Vec<(String, usize)> = rules
        .rules()
        .iter()
        .map(|r| (r.name.clone(), 0))
        .chain(std::iter::once(("passthrough".to_string(), 0)))
        .collect();

    for path in files {
        let relative = path.strip_prefix(source).unwrap_or(path);
        let label = rules
            .select(relative, mode)
            .map(|s| s.label().to_string())
            .unwrap_or_else(|_| "passthrough".into());
        if let Some(entry) = counts.iter_mut().find(|(name, _)| *name == label) {
            entry.1 += 1;
        }
    }
    ProgressLine::new("build", &counts)
}

/// Process files in parallel, keeping going past failures.
fn process_files(
    files: &[PathBuf],
    ctx: &BuildContext<'_>,
    progress: Option<&ProgressLine>,
) -> Vec<(PathBuf, Result<Processed, StageError>)> {
    files
        .par_iter()
        .map(|path| {
            let result = process_file(path, ctx);
            if let (Some(p), Ok(done)) = (progress, &result) {
                p.inc(done.label());
            }
            (path.clone(), result)
        })
        .collect()
}

/// Emitted names claimed by more than one source with different content.
///
/// Returns `(file_name, sources)` with sources in scan order. Identical
/// bytes under one name are not a clash.
fn find_collisions(done: &[Processed]) -> Vec<(&str, Vec<&str>)> {
    let mut by_name: BTreeMap<&str, Vec<&Processed>> = BTreeMap::new();
    for p in done {
        if let Some(name) = p.file_name() {
            by_name.entry(name).or_default().push(p);
        }
    }

    by_name
        .into_iter()
        .filter(|(_, claims)| claims.iter().any(|p| p.hash != claims[0].hash))
        .map(|(name, claims)| (name, claims.into_iter().map(|p| p.source.as_str()).collect()))
        .collect()
}

/// Log failures, join background jobs and assemble the manifest.
fn collect_results(
    config: &PackConfig,
    results: Vec<(PathBuf, Result<Processed, StageError>)>,
) -> BuildReport {
    let mut report = BuildReport::default();
    let mut jobs: Vec<BackgroundJob> = Vec::new();
    let mut done = Vec::with_capacity(results.len());

    for (path, result) in results {
        match result {
            Ok(processed) => done.push(processed),
            Err(StageError::Interrupted) => {}
            Err(e) => {
                report.failed += 1;
                log!("error"; "{}: {:#}", config.root_relative(&path).display(), anyhow::Error::from(e));
            }
        }
    }

    // The surviving file holds only one source's bytes, so none of them get it
    let mut clashing = BTreeSet::new();
    for (name, sources) in find_collisions(&done) {
        log!(
            "error";
            "`{}` is emitted by {} with different content",
            name,
            sources.join(", ")
        );
        fs::remove_file(config.build.output.join(name)).ok();
        report.failed += sources.len();
        clashing.extend(sources.into_iter().map(str::to_string));
    }

    for mut processed in done {
        report.delegated.extend(processed.delegated.drain(..));
        jobs.append(&mut processed.jobs);
        if clashing.contains(&processed.source) {
            continue;
        }
        match processed.addressing.mode() {
            AddressingMode::InlineDataUri => report.inlined += 1,
            AddressingMode::EmittedFile => report.emitted += 1,
        }
        report.manifest.insert(processed.source.clone(), processed.manifest_entry());
    }

    if !jobs.is_empty() {
        crate::debug!("build"; "waiting for {}", plural_count(jobs.len(), "background stage"));
    }
    for job in jobs {
        if let Err(e) = job.wait() {
            report.failed += 1;
            log!("error"; "{}", e);
        }
    }
    report
}

fn log_build_result(report: &BuildReport, manifest: &Path, config: &PackConfig) {
    if !report.delegated.is_empty() {
        let names: Vec<_> = report.delegated.iter().map(String::as_str).collect();
        log!(
            "hint";
            "stages without a `command` passed files through unchanged: {}",
            names.join(", ")
        );
    }
    log!(
        "build";
        "{} emitted, {} inlined, manifest at {}",
        plural_count(report.emitted, "file"),
        report.inlined,
        config.root_relative(manifest).display()
    );
}
