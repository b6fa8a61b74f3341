//! Core compiler pipeline for the C? language.
//!
//! The pipeline is roughly:
//!
//!   source .cnull
//!     -> source     (characters with positions)
//!     -> lexer      (tokens)
//!     -> parser     (AST per module)
//!     -> semantics  (import resolution, function registry, type checking)
//!     -> interpreter
//!
//! The CLI and any other front-end should depend on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod position;
pub mod diagnostic;
pub mod error;
pub mod config;

// ---------------------------------------------------------------------
// Front-end: source reading, lexing and parsing
// ---------------------------------------------------------------------

pub mod source;
pub mod token;
pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types, modules, registry, type checking
// ---------------------------------------------------------------------

pub mod types;
pub mod dependency;
pub mod modules;
pub mod registry;
pub mod typecheck;
pub mod semantics;

// ---------------------------------------------------------------------
// Standard library and execution
// ---------------------------------------------------------------------

pub mod stdlib;
pub mod interpreter;

// ---------------------------------------------------------------------
// Compiler orchestration
// ---------------------------------------------------------------------

pub mod compiler;
mod stack;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{Compilation, compile_file, compile_file_with, compile_source, run_file};
pub use config::CompilerConfig;
pub use diagnostic::{ErrorHandler, FatalError, Report};
pub use error::CoreError;
pub use interpreter::{Console, Interpreter, QueuedConsole, RuntimeError, StdConsole};
pub use modules::{FileSystemModules, InMemoryModules, ModuleProvider};
