//! `assetline init`: write a config file with the default rule table.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::{PackConfig, preset_rules};
use crate::log;

const HEADER: &str = "\
# assetline configuration
#
# Rules are tried in priority order (declaration order by default) and the
# first match wins. Stages with `when` run only in that mode.
# Mode: --mode flag > ASSETLINE_MODE > build.mode > production

";

/// Config file contents: defaults plus the preset rules written out.
pub fn config_template() -> Result<String> {
    let config = PackConfig {
        rules: Some(preset_rules()),
        ..PackConfig::default()
    };
    let body = toml::to_string_pretty(&config).context("Failed to serialize default config")?;
    Ok(format!("{HEADER}{body}"))
}

/// Write the config file at `path`.
pub fn write_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "'{}' already exists, use --force to overwrite",
            path.display()
        );
    }
    fs::write(path, config_template()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log!("init"; "wrote {}", path.display());
    Ok(())
}
