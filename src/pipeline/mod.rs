//! Asset classification and transform-pipeline selection.
//!
//! ```text
//! path ──► RuleSet::select(path, mode)
//!            │
//!            ├─ first rule (by priority) whose extensions match
//!            │    └─ stages filtered by StageCondition ──► chain
//!            │    └─ OutputRule::scheme(mode)          ──► output
//!            │
//!            └─ no rule: passthrough `copy` chain, or UnresolvedAsset
//! ```
//!
//! Selection is a pure function of `(path, mode, rule set)`: it reads no
//! environment, touches no filesystem, and is safe to call from any number
//! of build workers at once.

mod error;
mod matcher;
mod output;
mod rule;
mod selector;
mod stage;

pub use error::PipelineError;
pub use matcher::{ExtensionMatcher, candidate_suffixes};
pub use output::{
    Addressing, AddressingMode, MAX_HASH_LENGTH, NameParts, OutputScheme, OutputTemplate,
    TemplateError,
};
pub use rule::{AssetRule, OutputRule};
pub use selector::{PASSTHROUGH_STAGE, RuleSet, Selection};
pub use stage::{StageCondition, StageParams, TransformStage, filter_stages};
