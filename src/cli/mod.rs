//! Command-line interface module.

mod args;
pub mod build;
pub mod init;
pub mod rules;
pub mod select;
pub mod validate;

pub use args::{BuildArgs, Cli, Commands, ModeArgs};
