//! assetline - asset classification and build pipeline selection.

#![allow(dead_code)]

mod asset;
mod cli;
mod config;
mod core;
mod logger;
mod pipeline;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, ModeArgs};
use config::PackConfig;
use core::BuildMode;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PackConfig::load(&cli)?;

    match &cli.command {
        Commands::Init { force } => cli::init::write_config(&config.config_path, *force),
        Commands::Select {
            paths,
            mode,
            size,
            json,
        } => {
            let mode = resolve_mode(mode, &config)?;
            cli::select::run_select(&config, paths, mode, *size, *json)
        }
        Commands::Rules { mode } => {
            // Without an explicit mode, list both
            let explicit = mode.mode.is_some() || mode_from_env().is_some();
            let mode = explicit.then(|| resolve_mode(mode, &config)).transpose()?;
            cli::rules::run_rules(&config, mode)
        }
        Commands::Build { build_args } => {
            let mode = resolve_mode(&build_args.mode, &config)?;
            cli::build::build_assets(&config, mode, false).map(|_| ())
        }
        Commands::Validate => cli::validate::validate_project(&config),
    }
}

fn mode_from_env() -> Option<String> {
    std::env::var(BuildMode::ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// CLI flag, then `ASSETLINE_MODE`, then `build.mode`, then production.
fn resolve_mode(args: &ModeArgs, config: &PackConfig) -> Result<BuildMode> {
    let env = mode_from_env();
    Ok(BuildMode::resolve(
        args.mode.as_deref(),
        env.as_deref(),
        config.build.mode,
    )?)
}
