use log::trace;

use crate::ast::{BlockStatement, CatchClause, ElseBranch, IfStatement, Statement};
use crate::diagnostic::{FatalError, SyntaxError};
use crate::lexer::TokenSource;
use crate::token::{TokenKind, TokenValue};

use super::{ParseResult, Parser};

impl<T: TokenSource> Parser<'_, T> {
    /// block = "{" {statement} "}"
    ///
    /// A statement that fails to parse is dropped and the tokens up to and
    /// including the next `;` are skipped.
    pub(super) fn parse_block(&mut self) -> ParseResult<BlockStatement> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> ParseResult<BlockStatement> {
        if !self.check(TokenKind::LeftBrace) {
            return Err(self.raise(SyntaxError::ExpectedBlock, self.current.position));
        }
        let position = self.advance()?.position;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::End) {
            match self.production(Self::parse_statement)? {
                Some(statement) => statements.push(statement),
                None => self.skip_statement()?,
            }
        }
        self.expect(TokenKind::RightBrace)?;

        Ok(BlockStatement {
            statements,
            position,
        })
    }

    fn skip_statement(&mut self) -> Result<(), FatalError> {
        loop {
            match self.current.kind {
                TokenKind::RightBrace | TokenKind::End => return Ok(()),
                TokenKind::Semicolon => {
                    self.advance()?;
                    return Ok(());
                }
                _ => {
                    let skipped = self.advance()?;
                    trace!("skipping {:?} at {}", skipped.kind, skipped.position);
                }
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let position = self.current.position;
        match self.current.kind {
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::If => Ok(Statement::If(self.parse_if_statement()?)),
            TokenKind::While => {
                self.advance()?;
                let condition = self.parse_condition()?;
                let body = self.parse_block()?;
                Ok(Statement::While {
                    condition,
                    body,
                    position,
                })
            }
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Continue => {
                self.advance()?;
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::Continue(position))
            }
            TokenKind::Break => {
                self.advance()?;
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::Break(position))
            }
            TokenKind::Throw => {
                self.advance()?;
                let message = self.expect_string_literal()?;
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::Throw { message, position })
            }
            TokenKind::Return => {
                self.advance()?;
                let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RightBrace)
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::Return { value, position })
            }
            _ if self.at_type_start() => {
                let ty = self.parse_declarable_type()?;
                let (name, _) = self.expect_identifier()?;
                let initial_value = if self.check(TokenKind::Assignment) {
                    self.advance()?;
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::VariableDeclaration {
                    ty,
                    name,
                    initial_value,
                    position,
                })
            }
            _ => {
                let expression = self.parse_expression()?;
                let assigned_value = if self.check(TokenKind::Assignment) {
                    self.advance()?;
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                self.expect_soft(TokenKind::Semicolon)?;
                Ok(Statement::Expression {
                    expression,
                    assigned_value,
                    position,
                })
            }
        }
    }

    /// ifStatement = "if" "(" expression ")" block ["else" (ifStatement | block)]
    fn parse_if_statement(&mut self) -> ParseResult<IfStatement> {
        let position = self.expect(TokenKind::If)?.position;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;

        let else_branch = if self.check(TokenKind::Else) {
            self.advance()?;
            if self.check(TokenKind::If) {
                let nested = self.nested(Self::parse_if_statement)?;
                Some(ElseBranch::ElseIf(Box::new(nested)))
            } else {
                Some(ElseBranch::Else(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(IfStatement {
            condition,
            body,
            else_branch,
            position,
        })
    }

    /// tryStatement = "try" block "catch" [identifier] block
    fn parse_try_statement(&mut self) -> ParseResult<Statement> {
        let position = self.expect(TokenKind::Try)?.position;
        let body = self.parse_block()?;

        if !self.check(TokenKind::Catch) {
            return Err(self.raise(SyntaxError::MissingCatchClause, self.current.position));
        }
        let catch_position = self.advance()?.position;
        let variable = if self.check(TokenKind::Identifier) {
            Some(self.expect_identifier()?.0)
        } else {
            None
        };
        let catch_body = self.parse_block()?;

        Ok(Statement::Try {
            body,
            catch_clause: CatchClause {
                variable,
                body: catch_body,
                position: catch_position,
            },
            position,
        })
    }

    fn parse_condition(&mut self) -> ParseResult<crate::ast::Expression> {
        self.expect(TokenKind::LeftParenthesis)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParenthesis)?;
        Ok(condition)
    }

    fn expect_string_literal(&mut self) -> ParseResult<String> {
        if !self.check(TokenKind::StringLiteral) {
            return Err(self.raise(SyntaxError::ExpectedStringLiteral, self.current.position));
        }
        let token = self.advance()?;
        match token.value {
            Some(TokenValue::Str(text)) => Ok(text),
            _ => Err(self.raise(SyntaxError::InvalidLiteral("string"), token.position)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ElseBranch, ExpressionKind, Statement};
    use crate::diagnostic::SyntaxError;
    use crate::parser::test_support::{parse_text, syntax_errors};

    fn body_of(text: &str) -> Vec<Statement> {
        let (program, handler) = parse_text(&format!("void Main() {{ {text} }}"));
        assert!(!handler.has_errors(), "{:?}", handler.reports());
        program.function_definitions[0].body.statements.clone()
    }

    #[test]
    fn if_else_if_chain() {
        let statements = body_of("if (a) { } else if (b) { return; } else { break; }");
        let Statement::If(statement) = &statements[0] else {
            panic!("expected if");
        };
        let Some(ElseBranch::ElseIf(nested)) = &statement.else_branch else {
            panic!("expected else if");
        };
        assert!(matches!(nested.else_branch, Some(ElseBranch::Else(_))));
    }

    #[test]
    fn try_catch_with_and_without_variable() {
        let statements = body_of(
            "try { throw \"boom\"; } catch error { } try { } catch { continue; }",
        );
        let Statement::Try { body, catch_clause, .. } = &statements[0] else {
            panic!("expected try");
        };
        assert!(matches!(
            &body.statements[0],
            Statement::Throw { message, .. } if message == "boom"
        ));
        assert_eq!(catch_clause.variable.as_deref(), Some("error"));
        let Statement::Try { catch_clause, .. } = &statements[1] else {
            panic!("expected try");
        };
        assert_eq!(catch_clause.variable, None);
    }

    #[test]
    fn try_requires_catch() {
        let (_, handler) = parse_text("void Main() { try { } return; }");
        assert_eq!(syntax_errors(&handler), vec![SyntaxError::MissingCatchClause]);
    }

    #[test]
    fn throw_requires_string_literal() {
        let (_, handler) = parse_text("void Main() { throw 5; }");
        assert_eq!(syntax_errors(&handler), vec![SyntaxError::ExpectedStringLiteral]);
    }

    #[test]
    fn assignment_and_declarations() {
        let statements = body_of("int a; dict<int, int> d = null; a = 3; d.Put(1, a);");
        assert!(matches!(
            &statements[0],
            Statement::VariableDeclaration { initial_value: None, .. }
        ));
        assert!(matches!(
            &statements[2],
            Statement::Expression { assigned_value: Some(_), .. }
        ));
        let Statement::Expression {
            expression,
            assigned_value: None,
            ..
        } = &statements[3]
        else {
            panic!("expected call statement");
        };
        assert!(matches!(expression.kind, ExpressionKind::MemberAccess { .. }));
    }

    #[test]
    fn while_with_nested_block() {
        let statements = body_of("while (true) { { int x = 1; } }");
        let Statement::While { body, .. } = &statements[0] else {
            panic!("expected while");
        };
        assert!(matches!(body.statements[0], Statement::Block(_)));
    }

    #[test]
    fn unclosed_block_is_reported() {
        let (program, handler) = parse_text("void Main() { int a = 1;");
        assert!(program.function_definitions.is_empty());
        assert_eq!(
            syntax_errors(&handler),
            vec![SyntaxError::MissingKeywordOrOperator("}".into())]
        );
    }
}
