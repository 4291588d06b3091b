//! Utility modules shared by the selector and the build driver.

pub mod hash;
pub mod mime;
pub mod path;
mod plural;

pub use plural::plural_count;
