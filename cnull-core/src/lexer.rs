//! Lexer for C? source text.
//!
//! The lexer pulls characters from a `CodeSource` and produces one token
//! per call. The first character of a token picks the state that lexes
//! it (identifier/keyword, number, string, char, operator or comment).
//! Every failing state still consumes at least one character, reports
//! through the `ErrorHandler` and yields an `Unknown` token so scanning
//! can go on.

use std::collections::VecDeque;
use std::io::BufRead;

use log::trace;

use crate::config::CompilerConfig;
use crate::diagnostic::{CompilationError, ErrorHandler, FatalError, LexicalError};
use crate::position::Position;
use crate::source::CodeSource;
use crate::token::{
    Token, TokenKind, TokenValue, is_operator_start, keyword, single_character_operator,
    two_character_operator,
};

/// Anything the parser can pull tokens from.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Token, FatalError>;
}

pub struct Lexer<'h> {
    source: CodeSource<'h>,
    handler: &'h ErrorHandler,
    config: CompilerConfig,
    primed: bool,
}

impl<'h> Lexer<'h> {
    pub fn new(source: CodeSource<'h>, handler: &'h ErrorHandler, config: CompilerConfig) -> Self {
        Lexer {
            source,
            handler,
            config,
            primed: false,
        }
    }

    pub fn from_text(text: &str, handler: &'h ErrorHandler, config: CompilerConfig) -> Self {
        Lexer::new(CodeSource::from_text(text, handler), handler, config)
    }

    /// Switch to another module's stream and start over.
    pub fn attach(&mut self, reader: Box<dyn BufRead>) {
        self.source.attach(reader);
        self.primed = false;
    }

    /// Release the current stream. Reading afterwards reports
    /// `StreamNotInitialized` until another stream is attached.
    pub fn detach(&mut self) {
        self.source.detach();
        self.primed = false;
    }

    /// Lex everything up to and including the `End` token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, FatalError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::End;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn prime(&mut self) {
        if !self.primed {
            self.primed = true;
            self.source.move_to_next();
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), FatalError> {
        let start = self.source.position();
        let mut run = 0usize;
        let mut reported = false;
        while let Some(ch) = self.peek_char() {
            if !is_whitespace(ch) {
                break;
            }
            self.consume_char();
            run += 1;
            if run > self.config.max_whitespace_length && !reported {
                reported = true;
                self.report(
                    LexicalError::WhitespaceTooLong(self.config.max_whitespace_length),
                    start,
                )?;
            }
        }
        Ok(())
    }

    fn report(&self, error: LexicalError, position: Position) -> Result<(), FatalError> {
        self.handler
            .raise_compilation_error(CompilationError::lexical(error, position))
    }

    fn fail(&self, error: LexicalError, position: Position) -> Result<Token, FatalError> {
        self.report(error, position)?;
        Ok(Token::bare(TokenKind::Unknown, position))
    }

    fn lex_identifier_or_keyword(&mut self, start: Position) -> Result<Token, FatalError> {
        let mut text = String::new();
        let mut length = 0usize;
        while let Some(ch) = self.peek_char() {
            if !is_ident_continue(ch) {
                break;
            }
            self.consume_char();
            text.push(ch);
            length += 1;
        }

        if length > self.config.max_identifier_length {
            return self.fail(
                LexicalError::IdentifierTooLong(self.config.max_identifier_length),
                start,
            );
        }

        Ok(match keyword(&text) {
            Some(kind) => Token::bare(kind, start),
            None => Token::valued(TokenKind::Identifier, start, TokenValue::Str(text)),
        })
    }

    fn lex_number(&mut self, start: Position) -> Result<Token, FatalError> {
        if self.peek_char() == Some('0') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.skip_digits();
            return self.fail(LexicalError::PrefixedZero, start);
        }

        let mut length = 0usize;
        let mut integer_part: i32 = 0;
        let mut overflow = false;
        while let Some(digit) = self.peek_char().and_then(|c| c.to_digit(10)) {
            self.consume_char();
            length += 1;
            match integer_part
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit as i32))
            {
                Some(value) => integer_part = value,
                None => overflow = true,
            }
        }

        if self.peek_char() != Some('.') {
            if length > self.config.max_token_length {
                return self.fail(LexicalError::TokenTooLong(self.config.max_token_length), start);
            }
            if overflow {
                return self.fail(LexicalError::NumericOverflow, start);
            }
            return Ok(Token::valued(
                TokenKind::IntegerLiteral,
                start,
                TokenValue::Int(integer_part),
            ));
        }

        self.consume_char(); // '.'
        length += 1;
        let mut fraction = 0f64;
        let mut fraction_digits = 0i32;
        while let Some(digit) = self.peek_char().and_then(|c| c.to_digit(10)) {
            self.consume_char();
            length += 1;
            fraction_digits += 1;
            fraction = fraction * 10.0 + f64::from(digit);
        }

        if fraction_digits == 0 {
            return self.fail(LexicalError::MissingFractionDigits, start);
        }
        if length > self.config.max_token_length {
            return self.fail(LexicalError::TokenTooLong(self.config.max_token_length), start);
        }
        if overflow {
            return self.fail(LexicalError::NumericOverflow, start);
        }
        let value = f64::from(integer_part) + fraction / 10f64.powi(fraction_digits);
        Ok(Token::valued(
            TokenKind::FloatLiteral,
            start,
            TokenValue::Float(value),
        ))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
        }
    }

    fn lex_string(&mut self, start: Position) -> Result<Token, FatalError> {
        self.consume_char(); // opening quote

        let mut content = String::new();
        let mut length = 0usize;
        let mut failure: Option<(LexicalError, Position)> = None;
        loop {
            let position = self.source.position();
            match self.peek_char() {
                None => return self.fail(LexicalError::UnterminatedLiteral, start),
                Some('\n') => return self.fail(LexicalError::LineBreakedLiteral, start),
                Some('"') => {
                    self.consume_char();
                    break;
                }
                Some('\\') => {
                    self.consume_char();
                    match self.peek_char() {
                        None => return self.fail(LexicalError::UnterminatedLiteral, start),
                        Some('\n') => return self.fail(LexicalError::LineBreakedLiteral, start),
                        Some(escaped) => {
                            self.consume_char();
                            match unescape(escaped) {
                                Some(ch) => content.push(ch),
                                None => {
                                    failure.get_or_insert((
                                        LexicalError::InvalidEscapeSequence(escaped),
                                        position,
                                    ));
                                }
                            }
                        }
                    }
                }
                Some(ch) => {
                    self.consume_char();
                    content.push(ch);
                }
            }
            length += 1;
            if length > self.config.max_string_literal_length {
                failure.get_or_insert((
                    LexicalError::LiteralTooLong(self.config.max_string_literal_length),
                    start,
                ));
            }
        }

        if let Some((error, position)) = failure {
            return self.fail(error, position);
        }
        Ok(Token::valued(
            TokenKind::StringLiteral,
            start,
            TokenValue::Str(content),
        ))
    }

    fn lex_char(&mut self, start: Position) -> Result<Token, FatalError> {
        self.consume_char(); // opening apostrophe

        let position = self.source.position();
        let value = match self.peek_char() {
            None => return self.fail(LexicalError::UnterminatedLiteral, start),
            Some('\n') => return self.fail(LexicalError::LineBreakedLiteral, start),
            Some('\'') => {
                self.consume_char();
                return self.fail(LexicalError::EmptyCharLiteral, start);
            }
            Some('\\') => {
                self.consume_char();
                match self.peek_char() {
                    None => return self.fail(LexicalError::UnterminatedLiteral, start),
                    Some('\n') => return self.fail(LexicalError::LineBreakedLiteral, start),
                    Some(escaped) => {
                        self.consume_char();
                        unescape(escaped).ok_or(LexicalError::InvalidEscapeSequence(escaped))
                    }
                }
            }
            Some(ch) => {
                self.consume_char();
                Ok(ch)
            }
        };

        if self.peek_char() != Some('\'') {
            return self.skip_rest_of_char_literal(start);
        }
        self.consume_char();

        match value {
            Ok(ch) => Ok(Token::valued(TokenKind::CharLiteral, start, TokenValue::Char(ch))),
            Err(error) => self.fail(error, position),
        }
    }

    /// Too many characters between the apostrophes: find the closing one
    /// on the same line, or report the literal as unterminated.
    fn skip_rest_of_char_literal(&mut self, start: Position) -> Result<Token, FatalError> {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.consume_char();
            if ch == '\'' {
                return self.fail(LexicalError::MultiCharacterLiteral, start);
            }
        }
        self.fail(LexicalError::UnterminatedLiteral, start)
    }

    fn lex_operator(&mut self, start: Position) -> Result<Token, FatalError> {
        let Some(first) = self.peek_char() else {
            return Ok(Token::bare(TokenKind::End, start));
        };
        self.consume_char();

        if first == '/' && self.peek_char() == Some('/') {
            self.consume_char();
            return self.lex_comment(start);
        }

        if let Some(kind) = self
            .peek_char()
            .and_then(|second| two_character_operator(first, second))
        {
            self.consume_char();
            return Ok(Token::bare(kind, start));
        }

        match single_character_operator(first) {
            Some(kind) => Ok(Token::bare(kind, start)),
            None => self.fail(LexicalError::UnknownOperator(first.to_string()), start),
        }
    }

    /// Everything after `//` up to the end of the line.
    fn lex_comment(&mut self, start: Position) -> Result<Token, FatalError> {
        let mut text = String::new();
        let mut length = 0usize;
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.consume_char();
            text.push(ch);
            length += 1;
        }

        if length > self.config.max_comment_length {
            return self.fail(LexicalError::CommentTooLong(self.config.max_comment_length), start);
        }
        Ok(Token::valued(TokenKind::Comment, start, TokenValue::Str(text)))
    }

    fn peek_char(&self) -> Option<char> {
        self.source.current_character()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.next_character()
    }

    fn consume_char(&mut self) {
        self.source.move_to_next();
    }
}

impl TokenSource for Lexer<'_> {
    fn next_token(&mut self) -> Result<Token, FatalError> {
        self.prime();
        self.skip_whitespace()?;

        let start = self.source.position();
        let Some(ch) = self.peek_char() else {
            return Ok(Token::bare(TokenKind::End, start));
        };

        let token = if is_ident_start(ch) {
            self.lex_identifier_or_keyword(start)?
        } else if ch.is_ascii_digit() {
            self.lex_number(start)?
        } else if ch == '"' {
            self.lex_string(start)?
        } else if ch == '\'' {
            self.lex_char(start)?
        } else if is_operator_start(ch) {
            self.lex_operator(start)?
        } else {
            self.consume_char();
            self.fail(LexicalError::InvalidTokenStartCharacter(ch), start)?
        };

        trace!("token {:?} at {}", token.kind, token.position);
        Ok(token)
    }
}

/// Drops comment tokens so the parser never sees them.
pub struct CommentFilter<S> {
    inner: S,
}

impl<S: TokenSource> CommentFilter<S> {
    pub fn new(inner: S) -> Self {
        CommentFilter { inner }
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

}

impl<S: TokenSource> TokenSource for CommentFilter<S> {
    fn next_token(&mut self) -> Result<Token, FatalError> {
        loop {
            let token = self.inner.next_token()?;
            if token.kind != TokenKind::Comment {
                return Ok(token);
            }
        }
    }
}

/// Tokens lexed ahead of time. Once drained it keeps yielding `End`.
#[derive(Debug, Clone)]
pub struct TokenBuffer {
    tokens: VecDeque<Token>,
    end: Position,
}

impl TokenBuffer {
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        let tokens: VecDeque<Token> = tokens.into_iter().collect();
        let end = tokens
            .back()
            .map(|token| token.position)
            .unwrap_or_default();
        TokenBuffer { tokens, end }
    }
}

impl TokenSource for TokenBuffer {
    fn next_token(&mut self) -> Result<Token, FatalError> {
        Ok(self
            .tokens
            .pop_front()
            .unwrap_or_else(|| Token::bare(TokenKind::End, self.end)))
    }
}

fn unescape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        _ => None,
    }
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\u{000B}' | '\u{000C}')
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::KEYWORDS;

    fn lex_all(text: &str) -> (Vec<Token>, ErrorHandler) {
        let handler = ErrorHandler::new(100);
        let tokens = {
            let mut lexer = Lexer::from_text(text, &handler, CompilerConfig::default());
            lexer.tokenize().expect("lexing should not abort")
        };
        (tokens, handler)
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex_all(text).0.into_iter().map(|t| t.kind).collect()
    }

    fn lexical_errors(handler: &ErrorHandler) -> Vec<LexicalError> {
        handler
            .reports()
            .iter()
            .filter_map(|report| match &report.diagnostic {
                crate::diagnostic::Diagnostic::Compilation(CompilationError::Lexical {
                    error,
                    ..
                }) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_keyword_followed_by_terminator_is_a_keyword() {
        for (spelling, kind) in KEYWORDS {
            let (tokens, handler) = lex_all(&format!("{spelling};"));
            assert_eq!(tokens[0].kind, *kind, "keyword {spelling}");
            assert_eq!(tokens[1].kind, TokenKind::Semicolon);
            assert!(!handler.has_errors());
        }
    }

    #[test]
    fn keyword_prefix_is_an_identifier() {
        let (tokens, _) = lex_all("integer");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text(), Some("integer"));
    }

    #[test]
    fn lexes_maximum_integer() {
        let (tokens, handler) = lex_all("2147483647");
        assert_eq!(tokens[0].value, Some(TokenValue::Int(2_147_483_647)));
        assert!(!handler.has_errors());
    }

    #[test]
    fn rejects_overflowing_integer() {
        let (tokens, handler) = lex_all("2147483649");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].kind, TokenKind::End);
        assert_eq!(lexical_errors(&handler), vec![LexicalError::NumericOverflow]);
    }

    #[test]
    fn rejects_prefixed_zero() {
        for text in ["00", "012345"] {
            let (tokens, handler) = lex_all(text);
            assert_eq!(tokens[0].kind, TokenKind::Unknown, "input {text}");
            assert_eq!(tokens[1].kind, TokenKind::End, "input {text}");
            assert_eq!(lexical_errors(&handler), vec![LexicalError::PrefixedZero]);
        }
    }

    #[test]
    fn lexes_floats_and_lone_zero() {
        let (tokens, _) = lex_all("0 0.25 12.5");
        assert_eq!(tokens[0].value, Some(TokenValue::Int(0)));
        assert_eq!(tokens[1].value, Some(TokenValue::Float(0.25)));
        assert_eq!(tokens[2].value, Some(TokenValue::Float(12.5)));
    }

    #[test]
    fn resolves_escape_sequences_in_strings() {
        let (tokens, handler) = lex_all("\"some literal, \\n\\t\"");
        assert_eq!(
            tokens[0].value,
            Some(TokenValue::Str("some literal, \n\t".to_string()))
        );
        assert!(!handler.has_errors());
    }

    #[test]
    fn string_with_line_break_fails() {
        let (tokens, handler) = lex_all("\"broken\nliteral\"");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(
            lexical_errors(&handler)[0],
            LexicalError::LineBreakedLiteral
        );
    }

    #[test]
    fn invalid_escape_is_reported_at_the_backslash() {
        let (tokens, handler) = lex_all("\"ab\\q\" x");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        let reports = handler.reports();
        assert_eq!(
            reports[0].diagnostic,
            crate::diagnostic::Diagnostic::Compilation(CompilationError::lexical(
                LexicalError::InvalidEscapeSequence('q'),
                Position::new(1, 4)
            ))
        );
    }

    #[test]
    fn lexes_char_literals() {
        let (tokens, handler) = lex_all("'a' '\\n' '' 'ab'");
        assert_eq!(tokens[0].value, Some(TokenValue::Char('a')));
        assert_eq!(tokens[1].value, Some(TokenValue::Char('\n')));
        assert_eq!(tokens[2].kind, TokenKind::Unknown);
        assert_eq!(tokens[3].kind, TokenKind::Unknown);
        assert_eq!(
            lexical_errors(&handler),
            vec![
                LexicalError::EmptyCharLiteral,
                LexicalError::MultiCharacterLiteral
            ]
        );
    }

    #[test]
    fn prefers_two_character_operators() {
        assert_eq!(
            kinds("<= < == = != ! && ||"),
            vec![
                TokenKind::LessOrEqual,
                TokenKind::Less,
                TokenKind::Equal,
                TokenKind::Assignment,
                TokenKind::NotEqual,
                TokenKind::Bang,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn single_ampersand_is_unknown_operator() {
        let (tokens, handler) = lex_all("a & b");
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(
            lexical_errors(&handler),
            vec![LexicalError::UnknownOperator("&".to_string())]
        );
    }

    #[test]
    fn invalid_start_character_is_skipped() {
        let (tokens, handler) = lex_all("@x");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(
            lexical_errors(&handler),
            vec![LexicalError::InvalidTokenStartCharacter('@')]
        );
    }

    #[test]
    fn comments_run_to_end_of_line_and_are_filtered() {
        let (tokens, _) = lex_all("x // note\ny");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].text(), Some(" note"));

        let handler = ErrorHandler::new(10);
        let lexer = Lexer::from_text("x // note\ny", &handler, CompilerConfig::default());
        let mut filter = CommentFilter::new(lexer);
        let first = filter.next_token().expect("token");
        let second = filter.next_token().expect("token");
        assert_eq!(first.kind, TokenKind::Identifier);
        assert_eq!(second.kind, TokenKind::Identifier);
        assert_eq!(second.position, Position::new(2, 1));
    }

    #[test]
    fn tokens_carry_positions() {
        let (tokens, _) = lex_all("int x\n  = 5;");
        let positions: Vec<Position> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(
            positions[..4],
            [
                Position::new(1, 1),
                Position::new(1, 5),
                Position::new(2, 3),
                Position::new(2, 5)
            ]
        );
    }

    #[test]
    fn enforces_identifier_length() {
        let handler = ErrorHandler::new(10);
        let config = CompilerConfig {
            max_identifier_length: 4,
            ..CompilerConfig::default()
        };
        let mut lexer = Lexer::from_text("short toolong", &handler, config);
        let tokens = lexer.tokenize().expect("tokenize");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Unknown);
    }

    #[test]
    fn aborts_when_error_budget_is_exceeded() {
        let handler = ErrorHandler::new(2);
        let mut lexer = Lexer::from_text("@ @ @ @", &handler, CompilerConfig::default());
        assert!(lexer.tokenize().is_err());
        assert_eq!(handler.compilation_error_count(), 3);
    }

    #[test]
    fn attaching_restarts_lexing() {
        let handler = ErrorHandler::new(10);
        let mut lexer = Lexer::from_text("first", &handler, CompilerConfig::default());
        assert_eq!(lexer.next_token().expect("token").text(), Some("first"));
        lexer.attach(Box::new(std::io::Cursor::new(b"second".to_vec())));
        let token = lexer.next_token().expect("token");
        assert_eq!(token.text(), Some("second"));
        assert_eq!(token.position, Position::FIRST_CHARACTER);
    }

    #[test]
    fn detached_lexer_reports_missing_stream() {
        let handler = ErrorHandler::new(10);
        let mut lexer = Lexer::from_text("first", &handler, CompilerConfig::default());
        assert_eq!(lexer.next_token().expect("token").text(), Some("first"));
        lexer.detach();
        assert_eq!(handler.error_count(), 0);
        let token = lexer.next_token().expect("token");
        assert_eq!(token.kind, TokenKind::End);
        assert_eq!(handler.error_count(), 1);
    }
}
