//! Expressions, by precedence climbing over `BINARY_LEVELS`.

use crate::ast::{BinaryOperator, Expression, ExpressionKind, Literal, Member, UnaryOperator};
use crate::diagnostic::SyntaxError;
use crate::lexer::TokenSource;
use crate::token::{Token, TokenKind, TokenValue};

use super::{ParseResult, Parser};

/// Binary operators from loosest to tightest binding. All are left
/// associative.
const BINARY_LEVELS: &[&[(TokenKind, BinaryOperator)]] = &[
    &[(TokenKind::Or, BinaryOperator::Or)],
    &[(TokenKind::And, BinaryOperator::And)],
    &[
        (TokenKind::Equal, BinaryOperator::Equal),
        (TokenKind::NotEqual, BinaryOperator::NotEqual),
    ],
    &[
        (TokenKind::Less, BinaryOperator::Less),
        (TokenKind::Greater, BinaryOperator::Greater),
        (TokenKind::LessOrEqual, BinaryOperator::LessOrEqual),
        (TokenKind::GreaterOrEqual, BinaryOperator::GreaterOrEqual),
    ],
    &[
        (TokenKind::Plus, BinaryOperator::Add),
        (TokenKind::Minus, BinaryOperator::Subtract),
    ],
    &[
        (TokenKind::Asterisk, BinaryOperator::Multiply),
        (TokenKind::Slash, BinaryOperator::Divide),
        (TokenKind::Percent, BinaryOperator::Modulo),
    ],
];

fn binary_operator(level: usize, kind: TokenKind) -> Option<BinaryOperator> {
    BINARY_LEVELS[level]
        .iter()
        .find_map(|(token, operator)| (*token == kind).then_some(*operator))
}

fn unary_operator(kind: TokenKind) -> Option<UnaryOperator> {
    match kind {
        TokenKind::Bang => Some(UnaryOperator::BooleanNegation),
        TokenKind::Minus => Some(UnaryOperator::ArithmeticNegation),
        TokenKind::QuestionMark => Some(UnaryOperator::NullCheck),
        _ => None,
    }
}

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::CharLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::LeftParenthesis
    ) || unary_operator(kind).is_some()
}

impl<T: TokenSource> Parser<'_, T> {
    pub(super) fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(|parser| parser.parse_binary(0))
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<Expression> {
        if level == BINARY_LEVELS.len() {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(operator) = binary_operator(level, self.current.kind) {
            self.advance()?;
            let right = self.parse_binary(level + 1)?;
            let position = left.position;
            left = Expression::new(
                ExpressionKind::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let Some(operator) = unary_operator(self.current.kind) else {
            return self.parse_member_access();
        };
        let position = self.advance()?.position;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    /// memberAccess = primary {"." identifier [arguments]}
    fn parse_member_access(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_primary()?;
        while self.check(TokenKind::Dot) {
            self.advance()?;
            let (name, _) = self.expect_identifier()?;
            let member = if self.check(TokenKind::LeftParenthesis) {
                Member::Method {
                    name,
                    arguments: self.parse_arguments()?,
                }
            } else {
                Member::Property(name)
            };
            let position = expression.position;
            expression = Expression::new(
                ExpressionKind::MemberAccess {
                    parent: Box::new(expression),
                    member,
                },
                position,
            );
        }
        Ok(expression)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let position = self.current.position;
        let kind = match self.current.kind {
            TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::CharLiteral => {
                let token = self.advance()?;
                match literal_from_token(token) {
                    Ok(literal) => ExpressionKind::Literal(literal),
                    Err(expected) => {
                        return Err(self.raise(SyntaxError::InvalidLiteral(expected), position));
                    }
                }
            }
            TokenKind::True | TokenKind::False | TokenKind::Null => {
                let token = self.advance()?;
                ExpressionKind::Literal(match token.kind {
                    TokenKind::True => Literal::Bool(true),
                    TokenKind::False => Literal::Bool(false),
                    _ => Literal::Null,
                })
            }
            TokenKind::LeftParenthesis => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParenthesis)?;
                ExpressionKind::Parenthesised(Box::new(inner))
            }
            TokenKind::Identifier => {
                let (name, _) = self.expect_identifier()?;
                if self.check(TokenKind::LeftParenthesis) {
                    ExpressionKind::Call {
                        name,
                        arguments: self.parse_arguments()?,
                    }
                } else {
                    ExpressionKind::Identifier(name)
                }
            }
            _ => return Err(self.raise(SyntaxError::ExpectedExpression, position)),
        };
        Ok(Expression::new(kind, position))
    }

    /// arguments = "(" [expression {"," expression}] ")"
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(TokenKind::LeftParenthesis)?;
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                if !starts_expression(self.current.kind) {
                    return Err(self.raise(SyntaxError::ExpectedArgument, self.current.position));
                }
                arguments.push(self.parse_expression()?);
                if !self.check(TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        Ok(arguments)
    }
}

/// Literal carried by a literal token; `Err` names the expected payload.
fn literal_from_token(token: Token) -> Result<Literal, &'static str> {
    match (token.kind, token.value) {
        (TokenKind::IntegerLiteral, Some(TokenValue::Int(value))) => Ok(Literal::Int(value)),
        (TokenKind::IntegerLiteral, _) => Err("integer"),
        (TokenKind::FloatLiteral, Some(TokenValue::Float(value))) => Ok(Literal::Float(value)),
        (TokenKind::FloatLiteral, _) => Err("float"),
        (TokenKind::CharLiteral, Some(TokenValue::Char(value))) => Ok(Literal::Char(value)),
        (TokenKind::CharLiteral, _) => Err("char"),
        (_, Some(TokenValue::Str(value))) => Ok(Literal::String(value)),
        _ => Err("string"),
    }
}
