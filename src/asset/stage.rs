//! Stage execution.
//!
//! Each stage of a selected chain runs in order over an in-memory
//! [`Artifact`]. A stage is resolved as:
//!
//! 1. a `command` param: run out of process (see [`super::external`])
//! 2. a built-in name:
//!
//! | Stage      | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `copy`     | none                                                    |
//! | `minify`   | minify JS/CSS/JSON, skipping `*.min.*` sources          |
//! | `json`     | reject invalid JSON                                     |
//! | `inject`   | wrap CSS in a script that appends a `<style>` element   |
//! | `extract`  | none; the artifact is emitted as a standalone file      |
//! | `asset`    | none; addressing follows the rule's inline threshold    |
//! | `resource` | none; always emitted                                    |
//!
//! 3. anything else is delegated to an external toolchain that is not
//!    configured here: the artifact passes through, taking the stage's
//!    `ext` param if it has one.

use std::path::Path;

use super::StageError;
use super::external::{BackgroundJob, run_command};
use super::minify;
use crate::core::BuildMode;
use crate::debug;
use crate::pipeline::TransformStage;

/// The file being transformed, as it flows through a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// Current extension without dot; stages may change it.
    pub ext: String,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, ext: impl Into<String>) -> Self {
        Self {
            bytes,
            ext: ext.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn text(&self, stage: &str) -> Result<&str, StageError> {
        std::str::from_utf8(&self.bytes).map_err(|_| StageError::NotText(stage.to_string()))
    }
}

/// Per-file execution context.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub mode: BuildMode,
    pub root: &'a Path,
    /// Source path, as shown to external commands and logs.
    pub source: &'a Path,
    /// Directory for external command scratch files.
    pub scratch: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Copy,
    Minify,
    Json,
    Inject,
    Extract,
    Asset,
    Resource,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "copy" => Self::Copy,
            "minify" => Self::Minify,
            "json" => Self::Json,
            "inject" => Self::Inject,
            "extract" => Self::Extract,
            "asset" => Self::Asset,
            "resource" => Self::Resource,
            _ => return None,
        })
    }
}

/// How a stage was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Builtin,
    External,
    Delegated,
}

/// Outcome of one stage.
pub struct StageRun {
    pub kind: StageKind,
    pub job: Option<BackgroundJob>,
}

/// Run one stage over `artifact`.
pub fn run_stage(
    stage: &TransformStage,
    artifact: &mut Artifact,
    ctx: &StageContext<'_>,
) -> Result<StageRun, StageError> {
    if let Some(command) = stage.command() {
        let job = run_command(stage, &command, artifact, ctx)?;
        return Ok(StageRun {
            kind: StageKind::External,
            job,
        });
    }

    let kind = match Builtin::from_name(&stage.name) {
        Some(builtin) => {
            run_builtin(builtin, artifact, ctx)?;
            StageKind::Builtin
        }
        None => {
            debug!("stage"; "`{}` delegated for {}", stage.name, ctx.source.display());
            StageKind::Delegated
        }
    };

    // An explicit `ext` renames the artifact for the rest of the chain
    if let Some(ext) = stage.output_ext() {
        artifact.ext = ext.to_string();
    }
    Ok(StageRun { kind, job: None })
}

fn run_builtin(
    builtin: Builtin,
    artifact: &mut Artifact,
    ctx: &StageContext<'_>,
) -> Result<(), StageError> {
    match builtin {
        Builtin::Copy | Builtin::Extract | Builtin::Asset | Builtin::Resource => {}
        Builtin::Minify => minify_artifact(artifact, ctx),
        Builtin::Json => {
            serde_json::from_slice::<serde_json::Value>(&artifact.bytes)
                .map_err(|e| StageError::InvalidJson(e.to_string()))?;
        }
        Builtin::Inject => {
            let css = artifact.text("inject")?;
            artifact.bytes = style_injector(css).into_bytes();
            artifact.ext = "js".into();
        }
    }
    Ok(())
}

/// Minify in place; failures keep the input.
fn minify_artifact(artifact: &mut Artifact, ctx: &StageContext<'_>) {
    let already_minified = ctx
        .source
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(".min."));
    if already_minified || !minify::supports(&artifact.ext) {
        return;
    }

    let Ok(text) = std::str::from_utf8(&artifact.bytes) else {
        return;
    };
    match minify::minify_by_ext(&artifact.ext, text) {
        Some(min) => artifact.bytes = min.into_bytes(),
        None => debug!("minify"; "kept {} as is: could not parse as {}", ctx.source.display(), artifact.ext),
    }
}

/// JS module that appends `css` to the document head.
pub fn style_injector(css: &str) -> String {
    // A JSON string is a valid JS string literal
    let literal = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".into());
    format!(
        "(function(){{var s=document.createElement(\"style\");s.textContent={literal};document.head.appendChild(s);}})();\n"
    )
}
