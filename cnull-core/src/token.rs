//! Tokens produced by the lexer.

use core::fmt;

use crate::position::Position;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    End,
    Unknown,
    Comment,

    // Identifiers and literals
    Identifier,
    StringLiteral,
    IntegerLiteral,
    FloatLiteral,
    CharLiteral,

    // Keywords
    Import,
    Void,
    Int,
    Float,
    Bool,
    String,
    Char,
    Dict,
    If,
    Else,
    While,
    Try,
    Catch,
    Continue,
    Break,
    Throw,
    Return,
    True,
    False,
    Null,

    // Operators and punctuators
    Plus,              // +
    Minus,             // -
    Asterisk,          // *
    Slash,             // /
    Percent,           // %
    Less,              // <
    Greater,           // >
    LessOrEqual,       // <=
    GreaterOrEqual,    // >=
    Equal,             // ==
    NotEqual,          // !=
    Assignment,        // =
    Bang,              // !
    QuestionMark,      // ?
    And,               // &&
    Or,                // ||
    Dot,               // .
    Comma,             // ,
    Semicolon,         // ;
    LeftParenthesis,   // (
    RightParenthesis,  // )
    LeftBrace,         // {
    RightBrace,        // }
}

/// Keyword spellings, in declaration order.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("import", TokenKind::Import),
    ("void", TokenKind::Void),
    ("int", TokenKind::Int),
    ("float", TokenKind::Float),
    ("bool", TokenKind::Bool),
    ("string", TokenKind::String),
    ("char", TokenKind::Char),
    ("dict", TokenKind::Dict),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("try", TokenKind::Try),
    ("catch", TokenKind::Catch),
    ("continue", TokenKind::Continue),
    ("break", TokenKind::Break),
    ("throw", TokenKind::Throw),
    ("return", TokenKind::Return),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
];

/// Two-character operators, tried before the single-character ones.
pub const TWO_CHARACTER_OPERATORS: &[(&str, TokenKind)] = &[
    ("<=", TokenKind::LessOrEqual),
    (">=", TokenKind::GreaterOrEqual),
    ("==", TokenKind::Equal),
    ("!=", TokenKind::NotEqual),
    ("&&", TokenKind::And),
    ("||", TokenKind::Or),
];

pub const SINGLE_CHARACTER_OPERATORS: &[(char, TokenKind)] = &[
    ('+', TokenKind::Plus),
    ('-', TokenKind::Minus),
    ('*', TokenKind::Asterisk),
    ('/', TokenKind::Slash),
    ('%', TokenKind::Percent),
    ('<', TokenKind::Less),
    ('>', TokenKind::Greater),
    ('=', TokenKind::Assignment),
    ('!', TokenKind::Bang),
    ('?', TokenKind::QuestionMark),
    ('.', TokenKind::Dot),
    (',', TokenKind::Comma),
    (';', TokenKind::Semicolon),
    ('(', TokenKind::LeftParenthesis),
    (')', TokenKind::RightParenthesis),
    ('{', TokenKind::LeftBrace),
    ('}', TokenKind::RightBrace),
];

pub fn keyword(text: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find_map(|(spelling, kind)| (*spelling == text).then_some(*kind))
}

pub fn two_character_operator(first: char, second: char) -> Option<TokenKind> {
    TWO_CHARACTER_OPERATORS.iter().find_map(|(spelling, kind)| {
        let mut chars = spelling.chars();
        (chars.next() == Some(first) && chars.next() == Some(second)).then_some(*kind)
    })
}

pub fn single_character_operator(c: char) -> Option<TokenKind> {
    SINGLE_CHARACTER_OPERATORS
        .iter()
        .find_map(|(spelling, kind)| (*spelling == c).then_some(*kind))
}

/// Whether `c` can start an operator, punctuator or comment.
pub fn is_operator_start(c: char) -> bool {
    single_character_operator(c).is_some() || matches!(c, '&' | '|')
}

impl TokenKind {
    /// Source spelling of keywords and operators; used in diagnostics.
    pub fn spelling(self) -> &'static str {
        if let Some((spelling, _)) = KEYWORDS.iter().find(|(_, kind)| *kind == self) {
            return spelling;
        }
        if let Some((spelling, _)) = TWO_CHARACTER_OPERATORS.iter().find(|(_, kind)| *kind == self)
        {
            return spelling;
        }
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Assignment => "=",
            TokenKind::Bang => "!",
            TokenKind::QuestionMark => "?",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::LeftParenthesis => "(",
            TokenKind::RightParenthesis => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::End => "end of file",
            TokenKind::Unknown => "unknown token",
            TokenKind::Comment => "comment",
            TokenKind::Identifier => "identifier",
            TokenKind::StringLiteral => "string literal",
            TokenKind::IntegerLiteral => "integer literal",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::CharLiteral => "char literal",
            _ => "token",
        }
    }

    pub fn is_primitive_type(self) -> bool {
        matches!(
            self,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Bool
                | TokenKind::String
                | TokenKind::Char
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spelling())
    }
}

/// Literal payload of a valued token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Str(String),
    Int(i32),
    Float(f64),
    Char(char),
}

/// A single token with its kind, position and optional payload.
///
/// Identifiers, literals and comments carry a value; keywords and
/// operators are bare.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    pub value: Option<TokenValue>,
}

impl Token {
    pub fn bare(kind: TokenKind, position: Position) -> Self {
        Token {
            kind,
            position,
            value: None,
        }
    }

    pub fn valued(kind: TokenKind, position: Position, value: TokenValue) -> Self {
        Token {
            kind,
            position,
            value: Some(value),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(TokenValue::Str(text)) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_keywords() {
        assert_eq!(keyword("while"), Some(TokenKind::While));
        assert_eq!(keyword("While"), None);
    }

    #[test]
    fn spells_keywords_and_operators() {
        assert_eq!(TokenKind::Return.spelling(), "return");
        assert_eq!(TokenKind::NotEqual.spelling(), "!=");
        assert_eq!(TokenKind::Semicolon.to_string(), ";");
    }

    #[test]
    fn matches_two_character_operators() {
        assert_eq!(two_character_operator('&', '&'), Some(TokenKind::And));
        assert_eq!(two_character_operator('&', '|'), None);
    }
}
