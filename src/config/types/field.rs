//! Type-safe config field path.

use owo_colors::{OwoColorize, Stream};
use std::fmt;

/// A dotted path to a config field, used to label diagnostics.
///
/// Each section exposes its paths as a `FIELDS` constant:
///
/// ```ignore
/// diag.error(BuildSectionConfig::FIELDS.hash_length, "must be at least 1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(pub &'static str);

impl FieldPath {
    #[inline]
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = format!("`{}`", self.0);
        write!(f, "{}", path.if_supports_color(Stream::Stderr, |p| p.bright_blue()))
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        self.0
    }
}
