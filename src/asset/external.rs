//! External command stages.
//!
//! A stage with a `command` param runs out of process. The artifact is
//! written to a scratch file and the command sees these variables, both
//! in its environment and substituted into its arguments:
//!
//! | Variable            | Value                                     |
//! |---------------------|-------------------------------------------|
//! | `$ASSETLINE_INPUT`  | scratch file holding the current artifact |
//! | `$ASSETLINE_OUTPUT` | where the command should write its result |
//! | `$ASSETLINE_SOURCE` | original source file                      |
//! | `$ASSETLINE_MODE`   | `production` or `development`             |
//! | `$ASSETLINE_ROOT`   | project root                              |
//!
//! The result is read from `$ASSETLINE_OUTPUT` if the command wrote it,
//! otherwise from its stdout. A command that produces neither leaves the
//! artifact unchanged.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;

use super::StageError;
use super::stage::{Artifact, StageContext};
use crate::pipeline::TransformStage;

/// Scratch file counter, unique per process.
static SCRATCH_ID: AtomicUsize = AtomicUsize::new(0);

/// A background stage still running.
#[derive(Debug)]
pub struct BackgroundJob {
    pub stage: String,
    pub program: String,
    pub child: Child,
    input: PathBuf,
}

impl BackgroundJob {
    /// Wait for the command and clean up its scratch input.
    pub fn wait(mut self) -> Result<(), StageError> {
        let status = self.child.wait().map_err(|source| StageError::Spawn {
            stage: self.stage.clone(),
            program: self.program.clone(),
            source,
        })?;
        fs::remove_file(&self.input).ok();

        if status.success() {
            Ok(())
        } else {
            Err(StageError::Command {
                stage: self.stage,
                program: self.program,
                status: status.to_string(),
                detail: String::new(),
            })
        }
    }
}

/// Build `$ASSETLINE_*` variables for one invocation.
fn stage_vars(ctx: &StageContext<'_>, input: &Path, output: &Path) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert("ASSETLINE_INPUT".into(), input.display().to_string());
    vars.insert("ASSETLINE_OUTPUT".into(), output.display().to_string());
    vars.insert("ASSETLINE_SOURCE".into(), ctx.source.display().to_string());
    vars.insert("ASSETLINE_MODE".into(), ctx.mode.name().into());
    vars.insert("ASSETLINE_ROOT".into(), ctx.root.display().to_string());
    vars
}

/// Resolve `$ASSETLINE_*` variables in command arguments.
///
/// Longer names are substituted first so `$ASSETLINE_OUTPUT` never loses
/// to a shorter variable sharing its prefix.
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<_> = vars.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for key in &keys {
                result = result.replace(&format!("${key}"), &vars[*key]);
            }
            result
        })
        .collect()
}

fn scratch_paths(ctx: &StageContext<'_>, in_ext: &str, out_ext: &str) -> (PathBuf, PathBuf) {
    let id = SCRATCH_ID.fetch_add(1, Ordering::Relaxed);
    let with_ext = |stem: String, ext: &str| {
        if ext.is_empty() {
            ctx.scratch.join(stem)
        } else {
            ctx.scratch.join(format!("{stem}.{ext}"))
        }
    };
    (
        with_ext(format!("{id}.in"), in_ext),
        with_ext(format!("{id}.out"), out_ext),
    )
}

/// Run `command` for `stage` over `artifact`.
///
/// Background stages are spawned and returned as a job; the artifact is
/// left as is for the rest of the chain.
pub fn run_command(
    stage: &TransformStage,
    command: &[String],
    artifact: &mut Artifact,
    ctx: &StageContext<'_>,
) -> Result<Option<BackgroundJob>, StageError> {
    let out_ext = stage.output_ext().unwrap_or(&artifact.ext).to_string();
    let (input, output) = scratch_paths(ctx, &artifact.ext, &out_ext);

    fs::create_dir_all(ctx.scratch).map_err(|e| StageError::io(ctx.scratch, e))?;
    fs::write(&input, &artifact.bytes).map_err(|e| StageError::io(&input, e))?;

    let vars = stage_vars(ctx, &input, &output);
    let resolved = resolve_args(command, &vars);
    let Some((program, args)) = resolved.split_first() else {
        return Ok(None);
    };
    let program = program.clone();

    let mut cmd = Command::new(&program);
    cmd.args(args).current_dir(ctx.root).envs(&vars);

    let spawn_err = |source| StageError::Spawn {
        stage: stage.name.clone(),
        program: program.clone(),
        source,
    };

    if stage.is_background() {
        let child = cmd.stdin(Stdio::null()).spawn().map_err(spawn_err)?;
        return Ok(Some(BackgroundJob {
            stage: stage.name.clone(),
            program,
            child,
            input,
        }));
    }

    let result = cmd.stdin(Stdio::null()).output().map_err(spawn_err);
    fs::remove_file(&input).ok();
    let result = result?;

    if !result.status.success() {
        return Err(StageError::Command {
            stage: stage.name.clone(),
            program,
            status: result.status.to_string(),
            detail: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    if output.exists() {
        artifact.bytes = fs::read(&output).map_err(|e| StageError::io(&output, e))?;
        fs::remove_file(&output).ok();
        artifact.ext = out_ext;
    } else if !result.stdout.is_empty() {
        artifact.bytes = result.stdout;
        artifact.ext = out_ext;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_args() {
        let mut vars = FxHashMap::default();
        vars.insert("ASSETLINE_INPUT".to_string(), "/tmp/0.in.less".to_string());
        vars.insert("ASSETLINE_OUTPUT".to_string(), "/tmp/0.out.css".to_string());
        vars.insert("ASSETLINE_MODE".to_string(), "production".to_string());

        let args = vec![
            "lessc".to_string(),
            "$ASSETLINE_INPUT".to_string(),
            "--out=$ASSETLINE_OUTPUT".to_string(),
            "$HOME".to_string(),
        ];
        let resolved = resolve_args(&args, &vars);
        assert_eq!(
            resolved,
            ["lessc", "/tmp/0.in.less", "--out=/tmp/0.out.css", "$HOME"]
        );
    }
}

#[cfg(all(test, unix))]
mod unix_tests {
    use super::*;
    use crate::core::BuildMode;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> StageContext<'_> {
        StageContext {
            mode: BuildMode::Production,
            root: dir.path(),
            source: Path::new("src/index.less"),
            scratch: dir.path(),
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn test_command_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let stage = TransformStage::new("less").param("ext", "css");
        let mut artifact = Artifact::new(b"a { b: c }".to_vec(), "less");

        let job = run_command(
            &stage,
            &sh("tr a-z A-Z < \"$ASSETLINE_INPUT\" > \"$ASSETLINE_OUTPUT\""),
            &mut artifact,
            &ctx(&dir),
        )
        .unwrap();

        assert!(job.is_none());
        assert_eq!(artifact.bytes, b"A { B: C }");
        assert_eq!(artifact.ext, "css");
    }

    #[test]
    fn test_command_stdout_fallback() {
        let dir = TempDir::new().unwrap();
        let stage = TransformStage::new("banner");
        let mut artifact = Artifact::new(b"x".to_vec(), "js");

        run_command(
            &stage,
            &sh("printf '/*%s*/' \"$ASSETLINE_MODE\"; cat \"$ASSETLINE_INPUT\""),
            &mut artifact,
            &ctx(&dir),
        )
        .unwrap();
        assert_eq!(artifact.bytes, b"/*production*/x");
        assert_eq!(artifact.ext, "js");
    }

    #[test]
    fn test_command_failure() {
        let dir = TempDir::new().unwrap();
        let stage = TransformStage::new("lint");
        let mut artifact = Artifact::new(b"x".to_vec(), "js");

        let err = run_command(&stage, &sh("echo broken >&2; exit 3"), &mut artifact, &ctx(&dir))
            .unwrap_err();
        let StageError::Command { detail, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(detail, "broken");
        assert_eq!(artifact.bytes, b"x");
    }

    #[test]
    fn test_background_job() {
        let dir = TempDir::new().unwrap();
        let stage = TransformStage::new("typecheck").param("background", true);
        let mut artifact = Artifact::new(b"let a = 1".to_vec(), "ts");

        let job = run_command(&stage, &sh("exit 0"), &mut artifact, &ctx(&dir))
            .unwrap()
            .unwrap();
        assert!(job.wait().is_ok());
        assert_eq!(artifact.bytes, b"let a = 1");

        let job = run_command(&stage, &sh("exit 1"), &mut artifact, &ctx(&dir))
            .unwrap()
            .unwrap();
        assert!(job.wait().is_err());
    }

    #[test]
    fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let stage = TransformStage::new("tool");
        let mut artifact = Artifact::new(Vec::new(), "x");
        let err = run_command(
            &stage,
            &["assetline-no-such-program-7f3a".to_string()],
            &mut artifact,
            &ctx(&dir),
        )
        .unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }
}
