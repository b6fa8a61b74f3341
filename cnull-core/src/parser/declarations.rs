use crate::ast::{FunctionDefinition, ImportDirective, Parameter};
use crate::diagnostic::SyntaxError;
use crate::lexer::TokenSource;
use crate::token::TokenKind;
use crate::types::{DeclarableType, PrimitiveType, ReturnType};

use super::{ParseResult, Parser};

impl<T: TokenSource> Parser<'_, T> {
    /// importDirective = "import" identifier "." identifier ["." identifier] ";"
    pub(super) fn parse_import_directive(&mut self) -> ParseResult<ImportDirective> {
        let position = self.expect(TokenKind::Import)?.position;
        let (module_name, _) = self.expect_identifier()?;
        self.expect(TokenKind::Dot)?;
        let (second, _) = self.expect_identifier()?;

        let (submodule_name, function_name) = if self.check(TokenKind::Dot) {
            self.advance()?;
            let (function, _) = self.expect_identifier()?;
            (Some(second), function)
        } else {
            (None, second)
        };
        self.expect_soft(TokenKind::Semicolon)?;

        Ok(ImportDirective {
            module_name,
            function_name,
            submodule_name,
            position,
        })
    }

    /// functionDefinition = returnType identifier "(" [parameterList] ")" block
    pub(super) fn parse_function_definition(&mut self) -> ParseResult<FunctionDefinition> {
        let position = self.current.position;
        let return_type = self.parse_return_type()?;
        let (name, _) = self.expect_identifier()?;

        self.expect(TokenKind::LeftParenthesis)?;
        let parameters = if self.check(TokenKind::RightParenthesis) {
            Vec::new()
        } else {
            self.parse_parameter_list()?
        };
        self.expect(TokenKind::RightParenthesis)?;
        let body = self.parse_block()?;

        Ok(FunctionDefinition {
            return_type,
            name,
            parameters,
            body,
            position,
        })
    }

    fn parse_parameter_list(&mut self) -> ParseResult<Vec<Parameter>> {
        let mut parameters = vec![self.parse_parameter()?];
        while self.check(TokenKind::Comma) {
            self.advance()?;
            parameters.push(self.parse_parameter()?);
        }
        Ok(parameters)
    }

    fn parse_parameter(&mut self) -> ParseResult<Parameter> {
        if !self.at_type_start() {
            return Err(self.raise(SyntaxError::ExpectedParameter, self.current.position));
        }
        let position = self.current.position;
        let ty = self.parse_declarable_type()?;
        let (name, _) = self.expect_identifier()?;
        Ok(Parameter { ty, name, position })
    }

    fn parse_return_type(&mut self) -> ParseResult<ReturnType> {
        if self.check(TokenKind::Void) {
            self.advance()?;
            return Ok(ReturnType::Void);
        }
        if !self.at_type_start() {
            return Err(self.raise(SyntaxError::InvalidReturnType, self.current.position));
        }
        Ok(ReturnType::Value(self.parse_declarable_type()?))
    }

    pub(super) fn at_type_start(&self) -> bool {
        self.current.kind.is_primitive_type() || self.check(TokenKind::Dict)
    }

    /// type = primitiveType | "dict" "<" primitiveType "," primitiveType ">"
    pub(super) fn parse_declarable_type(&mut self) -> ParseResult<DeclarableType> {
        if !self.check(TokenKind::Dict) {
            return Ok(DeclarableType::Primitive(self.parse_primitive_type()?));
        }
        self.advance()?;
        self.expect(TokenKind::Less)?;
        let key = self.parse_primitive_type()?;
        self.expect(TokenKind::Comma)?;
        let value = self.parse_primitive_type()?;
        self.expect(TokenKind::Greater)?;
        Ok(DeclarableType::Dictionary { key, value })
    }

    fn parse_primitive_type(&mut self) -> ParseResult<PrimitiveType> {
        let primitive = match self.current.kind {
            TokenKind::Int => PrimitiveType::Int,
            TokenKind::Float => PrimitiveType::Float,
            TokenKind::Bool => PrimitiveType::Bool,
            TokenKind::String => PrimitiveType::String,
            TokenKind::Char => PrimitiveType::Char,
            _ => return Err(self.raise(SyntaxError::TypeNotPrimitive, self.current.position)),
        };
        self.advance()?;
        Ok(primitive)
    }
}
