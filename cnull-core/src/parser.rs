//! Recursive-descent parser for C?.
//!
//! The parser keeps one token of lookahead (`current`). A production
//! that meets a token it cannot use reports a syntax error through the
//! `ErrorHandler` and returns `ParseSignal::UnexpectedToken`; the nearest
//! `production` wrapper turns that into `None` so the enclosing loop can
//! decide whether to recover or stop.

mod declarations;
mod expressions;
mod statements;

use core::mem;

use log::debug;

use crate::ast::Program;
use crate::config::CompilerConfig;
use crate::diagnostic::{CompilationError, ErrorHandler, FatalError, SyntaxError};
use crate::lexer::TokenSource;
use crate::position::Position;
use crate::stack::ensure_stack;
use crate::token::{Token, TokenKind};

/// Why a production was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseSignal {
    /// A required token was missing; the error has already been reported.
    UnexpectedToken,
    Fatal(FatalError),
}

impl From<FatalError> for ParseSignal {
    fn from(err: FatalError) -> Self {
        ParseSignal::Fatal(err)
    }
}

pub(crate) type ParseResult<T> = Result<T, ParseSignal>;

pub struct Parser<'h, T> {
    tokens: T,
    current: Token,
    handler: &'h ErrorHandler,
    depth: usize,
    max_nesting_depth: usize,
}

impl<'h, T: TokenSource> Parser<'h, T> {
    pub fn new(tokens: T, handler: &'h ErrorHandler) -> Self {
        Parser {
            tokens,
            current: Token::bare(TokenKind::End, Position::default()),
            handler,
            depth: 0,
            max_nesting_depth: CompilerConfig::default().max_nesting_depth,
        }
    }

    pub fn with_max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    /// Parse one whole module from the token source.
    ///
    /// Syntax errors are reported, not returned: the program holds every
    /// import and function that could be parsed. Only a fatal error (the
    /// error budget running out) fails the call.
    pub fn parse(&mut self, module_name: &str) -> Result<Program, FatalError> {
        debug!("parsing module {module_name}");
        self.depth = 0;
        self.current = self.tokens.next_token()?;

        let mut import_directives = Vec::new();
        while self.check(TokenKind::Import) {
            match self.production(Self::parse_import_directive)? {
                Some(directive) => import_directives.push(directive),
                None => break,
            }
        }

        let mut function_definitions = Vec::new();
        while !self.check(TokenKind::End) {
            match self.production(Self::parse_function_definition)? {
                Some(function) => function_definitions.push(function),
                None => break,
            }
        }

        Ok(Program {
            module_name: module_name.to_string(),
            import_directives,
            function_definitions,
        })
    }

    /// Run `parse`, swallowing `UnexpectedToken` into `None`.
    fn production<P>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> ParseResult<P>,
    ) -> Result<Option<P>, FatalError> {
        match parse(self) {
            Ok(production) => Ok(Some(production)),
            Err(ParseSignal::UnexpectedToken) => Ok(None),
            Err(ParseSignal::Fatal(err)) => Err(err),
        }
    }

    /// Run `parse` one nesting level deeper. Going past the limit aborts
    /// the compilation.
    fn nested<P>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<P>) -> ParseResult<P> {
        if self.depth >= self.max_nesting_depth {
            let error = CompilationError::syntax(
                SyntaxError::NestingTooDeep(self.max_nesting_depth),
                self.current.position,
            );
            return Err(ParseSignal::Fatal(
                self.handler.raise_fatal_compilation_error(error),
            ));
        }
        self.depth += 1;
        let result = ensure_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn advance(&mut self) -> Result<Token, FatalError> {
        let next = self.tokens.next_token()?;
        Ok(mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance()?);
        }
        Err(self.raise(
            SyntaxError::MissingKeywordOrOperator(kind.spelling().to_string()),
            self.current.position,
        ))
    }

    /// Like `expect`, but a missing token is only reported.
    fn expect_soft(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.check(kind) {
            self.advance()?;
        } else {
            self.report(
                SyntaxError::MissingKeywordOrOperator(kind.spelling().to_string()),
                self.current.position,
            )?;
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Position)> {
        if !self.check(TokenKind::Identifier) {
            return Err(self.raise(SyntaxError::ExpectedIdentifier, self.current.position));
        }
        let token = self.advance()?;
        match token.value {
            Some(crate::token::TokenValue::Str(name)) => Ok((name, token.position)),
            _ => Err(self.raise(SyntaxError::ExpectedIdentifier, token.position)),
        }
    }

    fn report(&self, error: SyntaxError, position: Position) -> Result<(), FatalError> {
        self.handler
            .raise_compilation_error(CompilationError::syntax(error, position))
    }

    fn raise(&self, error: SyntaxError, position: Position) -> ParseSignal {
        match self.report(error, position) {
            Ok(()) => ParseSignal::UnexpectedToken,
            Err(fatal) => ParseSignal::Fatal(fatal),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ast::Program;
    use crate::config::CompilerConfig;
    use crate::diagnostic::{CompilationError, Diagnostic, ErrorHandler, SyntaxError};
    use crate::lexer::{CommentFilter, Lexer};

    use super::Parser;

    pub fn parse_text(text: &str) -> (Program, ErrorHandler) {
        let handler = ErrorHandler::new(100);
        let program = {
            let lexer = Lexer::from_text(text, &handler, CompilerConfig::default());
            let mut parser = Parser::new(CommentFilter::new(lexer), &handler);
            parser.parse("Test").expect("parse should not abort")
        };
        (program, handler)
    }

    pub fn syntax_errors(handler: &ErrorHandler) -> Vec<SyntaxError> {
        handler
            .reports()
            .iter()
            .filter_map(|report| match &report.diagnostic {
                Diagnostic::Compilation(CompilationError::Syntax { error, .. }) => {
                    Some(error.clone())
                }
                _ => None,
            })
            .collect()
    }
}
