//! Limits shared by the lexer, error handler and interpreter.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;

/// Read-only compiler limits. Every field is optional in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub max_string_literal_length: usize,
    pub max_comment_length: usize,
    pub max_identifier_length: usize,
    pub max_whitespace_length: usize,
    pub max_token_length: usize,
    pub max_errors_count: usize,
    /// Deepest nesting of expressions, blocks and `else if` chains.
    pub max_nesting_depth: usize,
    pub max_call_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            max_string_literal_length: 1000,
            max_comment_length: 1000,
            max_identifier_length: 128,
            max_whitespace_length: 1024,
            max_token_length: 256,
            max_errors_count: 20,
            max_nesting_depth: 256,
            max_call_depth: 512,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CoreError> {
        toml::from_str(text).map_err(|err| CoreError::Config(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path.as_ref())?;
        CompilerConfig::from_toml_str(&text)
    }
}
