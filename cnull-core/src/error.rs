use thiserror::Error;

use crate::diagnostic::{FatalError, SourceError};
use crate::interpreter::RuntimeError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read file: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Fatal(#[from] FatalError),
    #[error("compilation failed with {0} error(s)")]
    CompilationFailed(usize),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
