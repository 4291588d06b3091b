//! Per-file processing: select, run the chain, address, write.

use std::fs;
use std::path::Path;

use super::external::BackgroundJob;
use super::manifest::ManifestEntry;
use super::stage::{Artifact, StageContext, StageKind, run_stage};
use super::StageError;
use crate::core::{BuildMode, is_shutdown};
use crate::pipeline::{Addressing, NameParts, RuleSet};
use crate::utils::hash::ContentHash;
use crate::utils::mime;
use crate::utils::path::{dir_prefix, split_name, to_slash};

/// Everything a worker needs to process one file.
pub struct BuildContext<'a> {
    pub rules: &'a RuleSet,
    pub mode: BuildMode,
    pub root: &'a Path,
    pub source_dir: &'a Path,
    pub output_dir: &'a Path,
    pub scratch_dir: &'a Path,
}

/// Result of processing one source file.
#[derive(Debug)]
pub struct Processed {
    /// Source path relative to the source directory, forward slashes.
    pub source: String,
    /// Matched rule, or `None` for passthrough.
    pub rule: Option<String>,
    pub addressing: Addressing,
    pub inline: Option<String>,
    pub size: u64,
    /// Content hash of the final bytes, hex.
    pub hash: String,
    /// Stages run without a command and passed through.
    pub delegated: Vec<String>,
    pub jobs: Vec<BackgroundJob>,
}

impl Processed {
    pub fn manifest_entry(&self) -> ManifestEntry {
        let file = match &self.addressing {
            Addressing::Emitted { file_name } => Some(file_name.clone()),
            Addressing::Inline => None,
        };
        ManifestEntry {
            rule: self.rule.clone(),
            file,
            inline: self.inline.clone(),
        }
    }

    /// Output file name, when the artifact was written to disk.
    pub fn file_name(&self) -> Option<&str> {
        match &self.addressing {
            Addressing::Emitted { file_name } => Some(file_name.as_str()),
            Addressing::Inline => None,
        }
    }

    pub fn label(&self) -> &str {
        self.rule.as_deref().unwrap_or("passthrough")
    }
}

/// Process one source file under `ctx`.
pub fn process_file(path: &Path, ctx: &BuildContext<'_>) -> Result<Processed, StageError> {
    if is_shutdown() {
        return Err(StageError::Interrupted);
    }

    let relative = path.strip_prefix(ctx.source_dir).unwrap_or(path);
    let selection = ctx.rules.select(relative, ctx.mode)?;

    let file_name = relative
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let (stem, source_ext) = split_name(file_name);

    let bytes = fs::read(path).map_err(|e| StageError::io(path, e))?;
    let mut artifact = Artifact::new(bytes, source_ext);

    let stage_ctx = StageContext {
        mode: ctx.mode,
        root: ctx.root,
        source: relative,
        scratch: ctx.scratch_dir,
    };

    let mut jobs = Vec::new();
    let mut delegated = Vec::new();
    for stage in &selection.chain {
        let run = run_stage(stage, &mut artifact, &stage_ctx)?;
        if run.kind == StageKind::Delegated {
            delegated.push(stage.name.clone());
        }
        jobs.extend(run.job);
    }

    let hash = ContentHash::of(&artifact.bytes).to_hex();
    let dir = dir_prefix(relative);
    let vars = NameParts {
        name: stem,
        ext: &artifact.ext,
        dir: &dir,
        hash: &hash,
    };
    let size = artifact.size();
    let addressing = selection.output.resolve(size, &vars);

    let inline = match &addressing {
        Addressing::Inline => Some(mime::data_uri(&artifact.ext, &artifact.bytes)),
        Addressing::Emitted { file_name } => {
            write_output(&ctx.output_dir.join(file_name), &artifact.bytes)?;
            None
        }
    };

    Ok(Processed {
        source: to_slash(relative),
        rule: selection.rule,
        addressing,
        inline,
        size,
        hash,
        delegated,
        jobs,
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| StageError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildSectionConfig, preset_rules};
    use crate::pipeline::{AddressingMode, AssetRule, PipelineError};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn preset() -> RuleSet {
        let build = BuildSectionConfig::default();
        let rules: Vec<AssetRule> = preset_rules()
            .iter()
            .enumerate()
            .map(|(i, r)| r.compile(i, &build).unwrap())
            .collect();
        RuleSet::new(rules).unwrap()
    }

    struct Fixture {
        dir: TempDir,
        rules: RuleSet,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("src")).unwrap();
            Self {
                dir,
                rules: preset(),
            }
        }

        fn write(&self, rel: &str, bytes: &[u8]) -> PathBuf {
            let path = self.dir.path().join("src").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, bytes).unwrap();
            path
        }

        fn run(&self, path: &Path, mode: BuildMode) -> Result<Processed, StageError> {
            let root = self.dir.path();
            let source_dir = root.join("src");
            let output_dir = root.join("build");
            let scratch_dir = output_dir.join(".assetline");
            let ctx = BuildContext {
                rules: &self.rules,
                mode,
                root,
                source_dir: &source_dir,
                output_dir: &output_dir,
                scratch_dir: &scratch_dir,
            };
            process_file(path, &ctx)
        }

        fn output(&self, rel: &str) -> PathBuf {
            self.dir.path().join("build").join(rel)
        }
    }

    #[test]
    fn test_small_image_inlined() {
        let fx = Fixture::new();
        let path = fx.write("assets/react.png", &[0u8; 10_000]);
        let done = fx.run(&path, BuildMode::Production).unwrap();

        assert_eq!(done.rule.as_deref(), Some("image"));
        assert_eq!(done.addressing.mode(), AddressingMode::InlineDataUri);
        assert!(done.inline.as_deref().unwrap().starts_with("data:image/png;base64,"));
        assert!(!fx.output("images").exists());
        assert!(done.manifest_entry().file.is_none());
    }

    #[test]
    fn test_large_image_emitted_with_hash() {
        let fx = Fixture::new();
        let bytes = vec![7u8; 20_000];
        let path = fx.write("assets/react.png", &bytes);
        let done = fx.run(&path, BuildMode::Production).unwrap();

        let hash = ContentHash::of(&bytes).to_hex();
        let expected = format!("images/react.{}.png", &hash[..8]);
        assert_eq!(
            done.addressing,
            Addressing::Emitted {
                file_name: expected.clone()
            }
        );
        assert_eq!(fs::read(fx.output(&expected)).unwrap(), bytes);
    }

    #[test]
    fn test_style_dev_injects() {
        let fx = Fixture::new();
        let path = fx.write("styles/app.css", b"a { color: red }");
        let done = fx.run(&path, BuildMode::Development).unwrap();

        assert_eq!(
            done.addressing,
            Addressing::Emitted {
                file_name: "css/styles/app.js".into()
            }
        );
        let js = fs::read_to_string(fx.output("css/styles/app.js")).unwrap();
        assert!(js.contains("createElement(\"style\")"));
    }

    #[test]
    fn test_style_prod_minified() {
        let fx = Fixture::new();
        let path = fx.write("app.css", b"a {\n  color: #ff0000;\n}\n");
        let done = fx.run(&path, BuildMode::Production).unwrap();

        let Addressing::Emitted { file_name } = &done.addressing else {
            panic!("expected emitted file");
        };
        assert!(file_name.starts_with("css/app."));
        assert!(file_name.ends_with(".css"));
        assert_eq!(fs::read(fx.output(file_name)).unwrap(), b"a{color:red}");
    }

    #[test]
    fn test_less_delegated_renames() {
        let fx = Fixture::new();
        let path = fx.write("index.less", b"@c: red;");
        let done = fx.run(&path, BuildMode::Development).unwrap();

        assert_eq!(done.delegated, ["less"]);
        // less → css (delegated), inject → js
        assert_eq!(
            done.addressing,
            Addressing::Emitted {
                file_name: "css/index.js".into()
            }
        );
    }

    #[test]
    fn test_passthrough_copy() {
        let fx = Fixture::new();
        let path = fx.write("public/robots.txt", b"User-agent: *");
        let done = fx.run(&path, BuildMode::Production).unwrap();

        assert!(done.rule.is_none());
        assert_eq!(done.label(), "passthrough");
        assert_eq!(done.source, "public/robots.txt");
        assert_eq!(
            fs::read(fx.output("public/robots.txt")).unwrap(),
            b"User-agent: *"
        );
    }

    #[test]
    fn test_unresolved_without_passthrough() {
        let mut fx = Fixture::new();
        fx.rules = preset().without_passthrough();
        let path = fx.write("README", b"hi");
        let err = fx.run(&path, BuildMode::Production).unwrap_err();
        assert!(matches!(
            err,
            StageError::Pipeline(PipelineError::UnresolvedAsset { .. })
        ));
    }

    #[test]
    fn test_invalid_json_fails() {
        let fx = Fixture::new();
        let path = fx.write("utils/test.json", b"{ nope");
        assert!(matches!(
            fx.run(&path, BuildMode::Production),
            Err(StageError::InvalidJson(_))
        ));

        let path = fx.write("utils/ok.json", b"{\n  \"a\": 1\n}");
        let done = fx.run(&path, BuildMode::Production).unwrap();
        assert_eq!(fs::read(fx.output("data/utils/ok.json")).unwrap(), br#"{"a":1}"#);
        assert_eq!(done.manifest_entry().rule.as_deref(), Some("data"));
    }
}
