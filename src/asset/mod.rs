//! Build driver: runs selected stage chains over source files.
//!
//! ```text
//! scan ─► select (pipeline) ─► run stages ─► hash + address ─► write / inline
//!                                   │
//!                                   └─► background jobs (joined at the end)
//! ```

mod error;
mod external;
mod manifest;
pub mod minify;
mod process;
mod scan;
mod stage;

pub use error::StageError;
pub use external::BackgroundJob;
pub use manifest::{Manifest, ManifestEntry};
pub use process::{BuildContext, Processed, process_file};
pub use scan::scan_sources;
pub use stage::{Artifact, StageContext, StageKind, StageRun, run_stage, style_injector};
