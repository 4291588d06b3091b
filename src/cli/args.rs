//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Asset classification and build pipeline selection
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Source directory path (relative to project root)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Config file path (default: assetline.toml)
    #[arg(short = 'C', long, global = true, default_value = "assetline.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write an assetline.toml with the default rule table
    #[command(visible_alias = "i")]
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the stage chain and output scheme selected for paths
    #[command(visible_alias = "s")]
    Select {
        /// Asset paths (aliases like `@/logo.png` are resolved).
        /// Use `-` to read paths from stdin.
        #[arg(required = true, value_hint = clap::ValueHint::AnyPath)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        mode: ModeArgs,

        /// Artifact size in bytes for addressing (default: file size on disk)
        #[arg(long)]
        size: Option<u64>,

        /// Print selections as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List the rule table in evaluation order
    #[command(visible_alias = "r")]
    Rules {
        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Run the selected pipelines over the source directory
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Check the configuration and rule table
    #[command(visible_alias = "v")]
    Validate,
}

/// Build mode and passthrough selection shared by commands that select.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ModeArgs {
    /// Build mode: production|prod or development|dev
    /// (overrides ASSETLINE_MODE and `build.mode`)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Copy files no rule matches instead of failing
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub passthrough: Option<bool>,
}

/// Build command arguments
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// Clean output directory completely before building
    #[arg(short, long)]
    pub clean: bool,

    /// Override the default inline threshold in bytes
    #[arg(short, long)]
    pub inline_limit: Option<u64>,
}

impl Cli {
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }

    /// Mode flags of the current command, if it takes any.
    pub const fn mode_args(&self) -> Option<&ModeArgs> {
        match &self.command {
            Commands::Select { mode, .. } | Commands::Rules { mode } => Some(mode),
            Commands::Build { build_args } => Some(&build_args.mode),
            Commands::Init { .. } | Commands::Validate => None,
        }
    }
}
