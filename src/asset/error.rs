//! Errors raised while running a stage chain over one file.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("stage `{stage}`: failed to start `{program}`")]
    Spawn {
        stage: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stage `{stage}`: `{program}` exited with {status}{}", fmt_detail(.detail))]
    Command {
        stage: String,
        program: String,
        status: String,
        detail: String,
    },

    #[error("stage `json`: invalid JSON: {0}")]
    InvalidJson(String),

    #[error("stage `{0}` needs UTF-8 input")]
    NotText(String),

    #[error("interrupted")]
    Interrupted,
}

fn fmt_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!("\n{detail}")
    }
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
