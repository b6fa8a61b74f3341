//! Diagnostics produced by every stage of the pipeline, and the
//! `ErrorHandler` that collects them.
//!
//! Lexical and syntax errors are accumulated until the configured
//! maximum is exceeded, at which point the handler hands back a
//! `FatalError`. Semantic errors are fatal on the first occurrence.

use core::cell::{Cell, Ref, RefCell};
use core::fmt;
use std::path::PathBuf;

use log::debug;
use thiserror::Error;

use crate::position::Position;

/// I/O level failures of the character source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("file `{}` was not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("file `{}` is not accessible: {reason}", .path.display())]
    FileInaccessible { path: PathBuf, reason: String },
    #[error("no character stream is attached to the source")]
    StreamNotInitialized,
    #[error("failed to read source: {0}")]
    Read(String),
    #[error("module `{name}` is ambiguous, it matches {}", display_paths(.paths))]
    AmbiguousModule { name: String, paths: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalError {
    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscapeSequence(char),
    #[error("literal is not terminated")]
    UnterminatedLiteral,
    #[error("literal may not span multiple lines")]
    LineBreakedLiteral,
    #[error("character literal is empty")]
    EmptyCharLiteral,
    #[error("character literal contains more than one character")]
    MultiCharacterLiteral,
    #[error("numeric literal is too large")]
    NumericOverflow,
    #[error("numeric literal may not start with a zero")]
    PrefixedZero,
    #[error("expected digits after the decimal point")]
    MissingFractionDigits,
    #[error("character `{0}` cannot start a token")]
    InvalidTokenStartCharacter(char),
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("identifier exceeds {0} characters")]
    IdentifierTooLong(usize),
    #[error("literal exceeds {0} characters")]
    LiteralTooLong(usize),
    #[error("comment exceeds {0} characters")]
    CommentTooLong(usize),
    #[error("whitespace run exceeds {0} characters")]
    WhitespaceTooLong(usize),
    #[error("token exceeds {0} characters")]
    TokenTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("expected an identifier")]
    ExpectedIdentifier,
    #[error("expected `{0}`")]
    MissingKeywordOrOperator(String),
    #[error("dictionary type arguments must be primitive types")]
    TypeNotPrimitive,
    #[error("expected a parameter")]
    ExpectedParameter,
    #[error("expected an argument")]
    ExpectedArgument,
    #[error("expected a string literal")]
    ExpectedStringLiteral,
    #[error("expected an expression")]
    ExpectedExpression,
    #[error("expected a block")]
    ExpectedBlock,
    #[error("try statement has no catch clause")]
    MissingCatchClause,
    #[error("expected `void` or a type")]
    InvalidReturnType,
    #[error("invalid {0} literal")]
    InvalidLiteral(&'static str),
    #[error("nesting is too deep (maximum {0} levels)")]
    NestingTooDeep(usize),
}

/// A lexical or syntax error, always positioned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationError {
    #[error("{position}: {error}")]
    Lexical {
        error: LexicalError,
        position: Position,
    },
    #[error("{position}: {error}")]
    Syntax {
        error: SyntaxError,
        position: Position,
    },
}

impl CompilationError {
    pub fn lexical(error: LexicalError, position: Position) -> Self {
        CompilationError::Lexical { error, position }
    }

    pub fn syntax(error: SyntaxError, position: Position) -> Self {
        CompilationError::Syntax { error, position }
    }

    pub fn position(&self) -> Position {
        match self {
            CompilationError::Lexical { position, .. }
            | CompilationError::Syntax { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("circular dependency: module `{module}` imports `{imported}`")]
    CircularDependency { module: String, imported: String },
    #[error("function `{0}` is already defined")]
    FunctionRedefinition(String),
    #[error("variable `{0}` is already defined")]
    VariableRedefinition(String),
    #[error("parameter `{parameter}` of `{function}` is declared more than once")]
    DuplicateParameterName { function: String, parameter: String },
    #[error("function `{function}` was not found in module `{module}`")]
    FunctionNotFound { module: String, function: String },
    #[error("module `{0}` was not found")]
    ModuleNotFound(String),
    #[error("standard library import of `{function}` has a missing or unknown submodule")]
    MissingSubmodule {
        function: String,
        submodule: Option<String>,
    },
    #[error("module `{0}` failed to compile")]
    ModuleCompilation(String),
    #[error("module `{0}` has no `Main` function")]
    MissingEntryPoint(String),
    #[error("`Main` must take no parameters and return `void` or `int`")]
    InvalidMainSignature,
    #[error("not every path of `{0}` returns a value")]
    MissingReturnStatement(String),
    #[error("only variables can be assigned to")]
    InvalidAssignmentTarget,
    #[error("variable `{0}` is not defined")]
    UndefinedVariable(String),
    #[error("`{0}` may only appear inside a loop")]
    InvalidContinueOrBreak(&'static str),
    #[error("void function `{0}` cannot return a value")]
    VoidFunctionReturnsValue(String),
    #[error("function `{0}` must return a value")]
    ReturnValueExpected(String),
    #[error("cannot use a value of type `{actual}` where `{expected}` is expected")]
    TypeMismatch { expected: String, actual: String },
    #[error("operator `{operator}` cannot be applied to `{left}` and `{right}`")]
    BinaryOperatorTypeMismatch {
        operator: &'static str,
        left: String,
        right: String,
    },
    #[error("operator `{operator}` cannot be applied to `{operand}`")]
    UnaryOperatorTypeMismatch {
        operator: &'static str,
        operand: String,
    },
    #[error("`{function}` expects {expected} arguments but received {actual}")]
    WrongArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("`{member}` is not a member of `{ty}`")]
    InvalidMemberAccess { member: String, ty: String },
}

/// A semantic error, scoped to the module it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub module: String,
    pub line: Option<usize>,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, module: impl Into<String>) -> Self {
        SemanticError {
            kind,
            module: module.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// The unwinding signal: the compilation cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation aborted: {reason}")]
pub struct FatalError {
    pub reason: String,
}

impl FatalError {
    pub fn new(reason: impl Into<String>) -> Self {
        FatalError {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Source(SourceError),
    Compilation(CompilationError),
    Semantic(SemanticError),
}

/// An entry of the error log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub module: Option<String>,
    pub diagnostic: Diagnostic,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "[{module}] ")?;
        }
        match &self.diagnostic {
            Diagnostic::Source(err) => write!(f, "{err}"),
            Diagnostic::Compilation(err) => write!(f, "{err}"),
            Diagnostic::Semantic(err) => match err.line {
                Some(line) => write!(f, "line {line}: {err}"),
                None => write!(f, "{err}"),
            },
        }
    }
}

/// Central sink for diagnostics.
///
/// Shared by reference between the lexer, parser and analyzer of a
/// single compilation; the whole pipeline runs on one thread.
#[derive(Debug)]
pub struct ErrorHandler {
    max_errors_count: usize,
    compilation_errors: Cell<usize>,
    current_module: RefCell<Option<String>>,
    reports: RefCell<Vec<Report>>,
}

impl ErrorHandler {
    pub fn new(max_errors_count: usize) -> Self {
        ErrorHandler {
            max_errors_count,
            compilation_errors: Cell::new(0),
            current_module: RefCell::new(None),
            reports: RefCell::new(Vec::new()),
        }
    }

    /// Module name attached to diagnostics raised from now on.
    pub fn set_current_module(&self, module: Option<String>) {
        *self.current_module.borrow_mut() = module;
    }

    pub fn raise_source_error(&self, err: SourceError) {
        self.record(Diagnostic::Source(err));
    }

    /// Record a lexical or syntax error. Fails once too many have been seen.
    pub fn raise_compilation_error(&self, err: CompilationError) -> Result<(), FatalError> {
        self.record(Diagnostic::Compilation(err));
        let count = self.compilation_errors.get() + 1;
        self.compilation_errors.set(count);
        if count > self.max_errors_count {
            return Err(FatalError::new(format!(
                "more than {} errors",
                self.max_errors_count
            )));
        }
        Ok(())
    }

    pub fn raise_fatal_compilation_error(&self, err: CompilationError) -> FatalError {
        let reason = err.to_string();
        self.record(Diagnostic::Compilation(err));
        self.compilation_errors.set(self.compilation_errors.get() + 1);
        FatalError::new(reason)
    }

    pub fn raise_semantic_error(&self, err: SemanticError) -> FatalError {
        let reason = err.to_string();
        self.record(Diagnostic::Semantic(err));
        FatalError::new(reason)
    }

    pub fn compilation_error_count(&self) -> usize {
        self.compilation_errors.get()
    }

    pub fn error_count(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn has_errors(&self) -> bool {
        !self.reports.borrow().is_empty()
    }

    pub fn reports(&self) -> Ref<'_, Vec<Report>> {
        self.reports.borrow()
    }

    pub fn take_reports(&self) -> Vec<Report> {
        core::mem::take(&mut *self.reports.borrow_mut())
    }

    fn record(&self, diagnostic: Diagnostic) {
        let module = match &diagnostic {
            Diagnostic::Semantic(err) => Some(err.module.clone()),
            _ => self.current_module.borrow().clone(),
        };
        let report = Report { module, diagnostic };
        debug!("{report}");
        self.reports.borrow_mut().push(report);
    }
}
