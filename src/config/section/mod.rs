//! Configuration section definitions.
//!
//! Each module corresponds to a section in `assetline.toml`:
//!
//! | Module    | TOML Section  | Purpose                                  |
//! |-----------|---------------|------------------------------------------|
//! | `build`   | `[build]`     | Paths, mode fallback, inline/hash limits |
//! | `resolve` | `[resolve]`   | Import-specifier aliases                 |
//! | `rules`   | `[[rules]]`   | Asset rule table                         |

pub mod build;
pub mod resolve;
pub mod rules;

pub use build::BuildSectionConfig;
pub use resolve::ResolveConfig;
pub use rules::{RuleConfig, preset_rules};
