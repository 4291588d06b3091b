//! Output naming templates and addressing.
//!
//! A template such as `images/[name].[hash:8].[ext]` is parsed once at
//! configuration time; rendering is then infallible.
//!
//! | Token       | Renders                                           |
//! |-------------|---------------------------------------------------|
//! | `[name]`    | source file stem                                  |
//! | `[ext]`     | artifact extension after all stages (no dot)      |
//! | `[dir]`     | source-relative directory with trailing `/`       |
//! | `[hash]`    | content hash prefix of the default length         |
//! | `[hash:N]`  | content hash prefix of length N (1..=64)          |

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Longest hash prefix a template may request (blake3 hex digest).
pub const MAX_HASH_LENGTH: usize = 64;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([a-z]+)(?::([0-9]+))?\]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("empty output template")]
    Empty,
    #[error("unknown template token `[{0}]`")]
    UnknownToken(String),
    #[error("unbalanced `[` or `]` in `{0}`")]
    Unbalanced(String),
    #[error("hash length {0} out of range 1..={MAX_HASH_LENGTH}")]
    HashLength(usize),
    #[error("token `[{0}]` does not take a length")]
    UnexpectedLength(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Name,
    Ext,
    Dir,
    Hash(usize),
}

/// Parsed output naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    source: String,
    parts: Vec<Part>,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct NameParts<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub dir: &'a str,
    /// Full hex content hash; templates take a prefix.
    pub hash: &'a str,
}

impl OutputTemplate {
    /// Parse a template; a bare `[hash]` uses `default_hash_length`.
    pub fn parse(source: &str, default_hash_length: usize) -> Result<Self, TemplateError> {
        if source.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut parts = Vec::new();
        let mut last = 0;
        for caps in TOKEN.captures_iter(source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            Self::push_literal(&mut parts, &source[last..whole.start])?;
            last = whole.end;

            let token = &caps[1];
            let length = caps.get(2).map(|m| m.as_str().parse::<usize>());
            let part = match (token, length) {
                ("name", None) => Part::Name,
                ("ext", None) => Part::Ext,
                ("dir", None) => Part::Dir,
                ("hash", None) => Part::Hash(Self::check_hash_length(default_hash_length)?),
                ("hash", Some(Ok(n))) => Part::Hash(Self::check_hash_length(n)?),
                ("hash", Some(Err(_))) => return Err(TemplateError::HashLength(usize::MAX)),
                ("name" | "ext" | "dir", Some(_)) => {
                    return Err(TemplateError::UnexpectedLength(token.to_string()));
                }
                _ => return Err(TemplateError::UnknownToken(token.to_string())),
            };
            parts.push(part);
        }
        Self::push_literal(&mut parts, &source[last..])?;

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    fn push_literal(parts: &mut Vec<Part>, text: &str) -> Result<(), TemplateError> {
        if text.contains(['[', ']']) {
            return Err(TemplateError::Unbalanced(text.to_string()));
        }
        if !text.is_empty() {
            parts.push(Part::Literal(text.to_string()));
        }
        Ok(())
    }

    fn check_hash_length(n: usize) -> Result<usize, TemplateError> {
        if (1..=MAX_HASH_LENGTH).contains(&n) {
            Ok(n)
        } else {
            Err(TemplateError::HashLength(n))
        }
    }

    /// Copy-only default: keep the source-relative location.
    pub fn passthrough() -> Self {
        Self {
            source: "[dir][name].[ext]".into(),
            parts: vec![Part::Dir, Part::Name, Part::Literal(".".into()), Part::Ext],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether rendered names are content-hash qualified.
    pub fn has_hash(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Hash(_)))
    }

    pub fn render(&self, vars: &NameParts<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + vars.name.len());
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Name => out.push_str(vars.name),
                Part::Ext => out.push_str(vars.ext),
                Part::Dir => out.push_str(vars.dir),
                Part::Hash(n) => out.push_str(&vars.hash[..(*n).min(vars.hash.len())]),
            }
        }
        // Empty extension leaves a dangling dot behind `[name].[ext]`
        if vars.ext.is_empty() && out.ends_with('.') {
            out.pop();
        }
        out
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for OutputTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

// ============================================================================
// Addressing
// ============================================================================

/// How a finished artifact is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingMode {
    /// Embedded as a `data:` URI, no file written.
    InlineDataUri,
    /// Written to the output directory under the rendered name.
    EmittedFile,
}

impl AddressingMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::InlineDataUri => "inline-data-uri",
            Self::EmittedFile => "emitted-file",
        }
    }
}

/// Resolved addressing for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    Inline,
    Emitted { file_name: String },
}

impl Addressing {
    pub const fn mode(&self) -> AddressingMode {
        match self {
            Self::Inline => AddressingMode::InlineDataUri,
            Self::Emitted { .. } => AddressingMode::EmittedFile,
        }
    }
}

/// Naming and addressing policy for a chain's final artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputScheme {
    pub template: OutputTemplate,
    /// Inline threshold in bytes; `None` always emits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<u64>,
}

impl OutputScheme {
    pub const DEFAULT_INLINE_LIMIT: u64 = 16 * 1024;
    pub const DEFAULT_HASH_LENGTH: usize = 8;

    pub fn emitted(template: OutputTemplate) -> Self {
        Self {
            template,
            inline_limit: None,
        }
    }

    pub fn with_inline_limit(mut self, limit: u64) -> Self {
        self.inline_limit = Some(limit);
        self
    }

    pub fn passthrough() -> Self {
        Self::emitted(OutputTemplate::passthrough())
    }

    /// Sizes strictly below the threshold inline; the threshold itself emits.
    pub const fn addressing(&self, size: u64) -> AddressingMode {
        match self.inline_limit {
            Some(limit) if size < limit => AddressingMode::InlineDataUri,
            _ => AddressingMode::EmittedFile,
        }
    }

    pub fn resolve(&self, size: u64, vars: &NameParts<'_>) -> Addressing {
        match self.addressing(size) {
            AddressingMode::InlineDataUri => Addressing::Inline,
            AddressingMode::EmittedFile => Addressing::Emitted {
                file_name: self.template.render(vars),
            },
        }
    }
}
