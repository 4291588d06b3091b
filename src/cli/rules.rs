//! `assetline rules`: print the rule table in evaluation order.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use crate::config::PackConfig;
use crate::core::BuildMode;
use crate::pipeline::{AssetRule, TransformStage};

/// Stage list for display; conditional stages carry their condition
/// unless a single mode was asked for.
fn describe_chain(stages: &[TransformStage], annotate: bool) -> String {
    stages
        .iter()
        .map(|s| {
            if !annotate || s.when.is_always() {
                s.name.clone()
            } else {
                format!("{}({})", s.name, s.when.name())
            }
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Text block for one rule.
pub fn describe_rule(rule: &AssetRule, mode: Option<BuildMode>) -> String {
    let mut out = format!(
        "{:>3}  {}  .{}",
        rule.priority,
        rule.name.if_supports_color(Stream::Stdout, |n| n.bold()),
        rule.matcher.extensions().join(" .")
    );
    if !rule.matcher.exclude().is_empty() {
        out.push_str(&format!(" (excluding {})", rule.matcher.exclude().join(", ")));
    }

    let chain = match mode {
        Some(mode) => describe_chain(&rule.chain(mode), false),
        None => describe_chain(&rule.stages, true),
    };
    out.push_str(&format!("\n     chain:  {chain}"));

    let scheme = rule.output.scheme(mode.unwrap_or(BuildMode::Production));
    out.push_str(&format!("\n     output: {}", scheme.template));
    if mode.is_none()
        && let Some(dev) = &rule.output.dev_filename
    {
        out.push_str(&format!(" (development: {dev})"));
    }
    if let Some(limit) = scheme.inline_limit {
        out.push_str(&format!(", inline below {limit} bytes"));
    }
    out
}

/// Run the `rules` command. Without a mode, every stage is listed with
/// its condition.
pub fn run_rules(config: &PackConfig, mode: Option<BuildMode>) -> Result<()> {
    let rules = config.rule_set()?;

    let source = if config.uses_preset() { "preset" } else { "configured" };
    let label = source.if_supports_color(Stream::Stdout, |s| s.dimmed());
    match mode {
        Some(mode) => println!("{label} rules, {mode} mode"),
        None => println!("{label} rules"),
    }

    for rule in rules.rules() {
        println!("{}", describe_rule(rule, mode));
    }

    let fallback = if rules.passthrough_enabled() {
        "unmatched files are copied as is"
    } else {
        "unmatched files fail the build"
    };
    println!("{}", fallback.if_supports_color(Stream::Stdout, |s| s.dimmed()));
    Ok(())
}
