//! Type checking of function bodies.
//!
//! Runs after the registry has been built, once per user-defined
//! function, with the registry table of the module the function lives
//! in. The first error found is returned; semantic errors are fatal.

use crate::ast::{
    BinaryOperator, BlockStatement, CatchClause, ElseBranch, Expression, ExpressionKind,
    FunctionDefinition, IfStatement, Literal, Member, Statement, UnaryOperator,
};
use crate::diagnostic::{SemanticError, SemanticErrorKind};
use crate::position::Position;
use crate::registry::FunctionsRegistry;
use crate::stack::ensure_stack;
use crate::types::{ReturnType, Type, common_type, is_assignable};

type CheckResult<T> = Result<T, SemanticError>;

/// Variables visible at some point of a function body.
///
/// A linear vector searched from the back; scopes are marks into it.
#[derive(Debug, Default)]
struct TypeEnv {
    entries: Vec<(String, Type)>,
    scopes: Vec<usize>,
}

impl TypeEnv {
    fn insert(&mut self, name: String, ty: Type) {
        self.entries.push((name, ty));
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.entries
            .iter()
            .rev()
            .find_map(|(n, t)| (n == name).then_some(*t))
    }

    fn push_scope(&mut self) {
        self.scopes.push(self.entries.len());
    }

    fn pop_scope(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.entries.truncate(mark);
        }
    }
}

/// Check `function`, registered in `module`, against `registry`.
pub fn check_function(
    registry: &FunctionsRegistry,
    module: &str,
    function: &FunctionDefinition,
) -> CheckResult<()> {
    TypeChecker {
        registry,
        module,
        function,
        env: TypeEnv::default(),
        loop_depth: 0,
    }
    .check()
}

struct TypeChecker<'a> {
    registry: &'a FunctionsRegistry,
    module: &'a str,
    function: &'a FunctionDefinition,
    env: TypeEnv,
    loop_depth: usize,
}

impl TypeChecker<'_> {
    fn check(mut self) -> CheckResult<()> {
        let function = self.function;
        for parameter in &function.parameters {
            if self.env.lookup(&parameter.name).is_some() {
                return Err(self.error(
                    SemanticErrorKind::DuplicateParameterName {
                        function: function.name.clone(),
                        parameter: parameter.name.clone(),
                    },
                    parameter.position,
                ));
            }
            self.env.insert(parameter.name.clone(), parameter.ty.into());
        }

        self.check_block(&function.body)?;

        if function.return_type != ReturnType::Void && !block_returns(&function.body) {
            return Err(self.error(
                SemanticErrorKind::MissingReturnStatement(function.name.clone()),
                function.position,
            ));
        }
        Ok(())
    }

    fn error(&self, kind: SemanticErrorKind, position: Position) -> SemanticError {
        SemanticError::new(kind, self.module).at_line(position.line)
    }

    fn mismatch(&self, expected: Type, actual: Type, position: Position) -> SemanticError {
        self.error(
            SemanticErrorKind::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            position,
        )
    }

    fn check_block(&mut self, block: &BlockStatement) -> CheckResult<()> {
        ensure_stack(|| {
            self.env.push_scope();
            let result = block
                .statements
                .iter()
                .try_for_each(|statement| self.check_statement(statement));
            self.env.pop_scope();
            result
        })
    }

    fn declare(&mut self, name: &str, ty: Type, position: Position) -> CheckResult<()> {
        if self.env.lookup(name).is_some() {
            return Err(self.error(
                SemanticErrorKind::VariableRedefinition(name.to_string()),
                position,
            ));
        }
        self.env.insert(name.to_string(), ty);
        Ok(())
    }

    fn check_statement(&mut self, statement: &Statement) -> CheckResult<()> {
        match statement {
            Statement::Block(block) => self.check_block(block),
            Statement::VariableDeclaration {
                ty,
                name,
                initial_value,
                position,
            } => {
                let declared = Type::from(*ty);
                if let Some(value) = initial_value {
                    self.expect_assignable(value, declared)?;
                }
                self.declare(name, declared, *position)
            }
            Statement::Expression {
                expression,
                assigned_value,
                position,
            } => match assigned_value {
                None => self.check_expression(expression).map(|_| ()),
                Some(value) => {
                    let ExpressionKind::Identifier(name) = &expression.kind else {
                        return Err(
                            self.error(SemanticErrorKind::InvalidAssignmentTarget, *position)
                        );
                    };
                    let target = self.lookup_variable(name, expression.position)?;
                    self.expect_assignable(value, target)
                }
            },
            Statement::If(statement) => self.check_if(statement),
            Statement::While {
                condition, body, ..
            } => {
                self.expect_condition(condition)?;
                self.loop_depth += 1;
                let result = self.check_block(body);
                self.loop_depth -= 1;
                result
            }
            Statement::Try {
                body, catch_clause, ..
            } => {
                self.check_block(body)?;
                self.check_catch(catch_clause)
            }
            Statement::Continue(position) => self.expect_in_loop("continue", *position),
            Statement::Break(position) => self.expect_in_loop("break", *position),
            Statement::Throw { .. } => Ok(()),
            Statement::Return { value, position } => self.check_return(value.as_ref(), *position),
        }
    }

    fn check_if(&mut self, statement: &IfStatement) -> CheckResult<()> {
        self.expect_condition(&statement.condition)?;
        self.check_block(&statement.body)?;
        match &statement.else_branch {
            None => Ok(()),
            Some(ElseBranch::ElseIf(nested)) => self.check_if(nested),
            Some(ElseBranch::Else(block)) => self.check_block(block),
        }
    }

    fn check_catch(&mut self, catch_clause: &CatchClause) -> CheckResult<()> {
        self.env.push_scope();
        let result = match &catch_clause.variable {
            Some(variable) => self
                .declare(variable, Type::String, catch_clause.position)
                .and_then(|()| self.check_block(&catch_clause.body)),
            None => self.check_block(&catch_clause.body),
        };
        self.env.pop_scope();
        result
    }

    fn check_return(&mut self, value: Option<&Expression>, position: Position) -> CheckResult<()> {
        let function = self.function;
        let name = &function.name;
        match (function.return_type, value) {
            (ReturnType::Void, None) => Ok(()),
            (ReturnType::Void, Some(_)) => Err(self.error(
                SemanticErrorKind::VoidFunctionReturnsValue(name.clone()),
                position,
            )),
            (ReturnType::Value(_), None) => Err(self.error(
                SemanticErrorKind::ReturnValueExpected(name.clone()),
                position,
            )),
            (ReturnType::Value(declared), Some(value)) => {
                self.expect_assignable(value, declared.into())
            }
        }
    }

    fn expect_in_loop(&self, keyword: &'static str, position: Position) -> CheckResult<()> {
        if self.loop_depth == 0 {
            return Err(self.error(SemanticErrorKind::InvalidContinueOrBreak(keyword), position));
        }
        Ok(())
    }

    fn expect_condition(&mut self, condition: &Expression) -> CheckResult<()> {
        let ty = self.check_expression(condition)?;
        if ty != Type::Bool {
            return Err(self.mismatch(Type::Bool, ty, condition.position));
        }
        Ok(())
    }

    fn expect_assignable(&mut self, value: &Expression, target: Type) -> CheckResult<()> {
        let ty = self.check_expression(value)?;
        if !is_assignable(ty, target) {
            return Err(self.mismatch(target, ty, value.position));
        }
        Ok(())
    }

    fn lookup_variable(&self, name: &str, position: Position) -> CheckResult<Type> {
        self.env.lookup(name).ok_or_else(|| {
            self.error(
                SemanticErrorKind::UndefinedVariable(name.to_string()),
                position,
            )
        })
    }

    fn check_expression(&mut self, expression: &Expression) -> CheckResult<Type> {
        ensure_stack(|| self.check_expression_kind(expression))
    }

    fn check_expression_kind(&mut self, expression: &Expression) -> CheckResult<Type> {
        let position = expression.position;
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::Int(_) => Type::Int,
                Literal::Float(_) => Type::Float,
                Literal::Bool(_) => Type::Bool,
                Literal::String(_) => Type::String,
                Literal::Char(_) => Type::Char,
                Literal::Null => Type::Null,
            }),
            ExpressionKind::Parenthesised(inner) => self.check_expression(inner),
            ExpressionKind::Identifier(name) => self.lookup_variable(name, position),
            ExpressionKind::Call { name, arguments } => {
                let Some(function) = self.registry.get(self.module, name) else {
                    return Err(self.error(
                        SemanticErrorKind::FunctionNotFound {
                            module: self.module.to_string(),
                            function: name.clone(),
                        },
                        position,
                    ));
                };
                let return_type = function.return_type();
                self.check_arguments(name, &function.parameter_types(), arguments, position)?;
                Ok(return_type)
            }
            ExpressionKind::Unary { operator, operand } => {
                let ty = self.check_expression(operand)?;
                let result = match operator {
                    UnaryOperator::BooleanNegation => (ty == Type::Bool).then_some(Type::Bool),
                    UnaryOperator::ArithmeticNegation => ty.is_numeric().then_some(ty),
                    UnaryOperator::NullCheck => (ty != Type::Void).then_some(Type::Bool),
                };
                result.ok_or_else(|| {
                    self.error(
                        SemanticErrorKind::UnaryOperatorTypeMismatch {
                            operator: operator.symbol(),
                            operand: ty.to_string(),
                        },
                        position,
                    )
                })
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.check_expression(left)?;
                let right = self.check_expression(right)?;
                binary_result(*operator, left, right).ok_or_else(|| {
                    self.error(
                        SemanticErrorKind::BinaryOperatorTypeMismatch {
                            operator: operator.symbol(),
                            left: left.to_string(),
                            right: right.to_string(),
                        },
                        position,
                    )
                })
            }
            ExpressionKind::MemberAccess { parent, member } => {
                let parent_type = self.check_expression(parent)?;
                self.check_member(parent_type, member, position)
            }
        }
    }

    fn check_arguments(
        &mut self,
        function: &str,
        parameters: &[Type],
        arguments: &[Expression],
        position: Position,
    ) -> CheckResult<()> {
        if parameters.len() != arguments.len() {
            return Err(self.error(
                SemanticErrorKind::WrongArgumentCount {
                    function: function.to_string(),
                    expected: parameters.len(),
                    actual: arguments.len(),
                },
                position,
            ));
        }
        for (argument, parameter) in arguments.iter().zip(parameters) {
            self.expect_assignable(argument, *parameter)?;
        }
        Ok(())
    }

    fn check_member(
        &mut self,
        parent: Type,
        member: &Member,
        position: Position,
    ) -> CheckResult<Type> {
        let invalid = |checker: &Self| {
            checker.error(
                SemanticErrorKind::InvalidMemberAccess {
                    member: member.name().to_string(),
                    ty: parent.to_string(),
                },
                position,
            )
        };

        match (parent, member) {
            (Type::String, Member::Property(name)) if name == "Length" => Ok(Type::Int),
            (Type::Dictionary { .. }, Member::Property(name)) if name == "Count" => Ok(Type::Int),
            (Type::Dictionary { key, value }, Member::Method { name, arguments }) => {
                let (key, value) = (Type::from(key), Type::from(value));
                let (parameters, result) = match name.as_str() {
                    "Contains" => (vec![key], Type::Bool),
                    "Get" => (vec![key], value),
                    "Put" => (vec![key, value], Type::Void),
                    "Remove" => (vec![key], Type::Void),
                    _ => return Err(invalid(self)),
                };
                self.check_arguments(name, &parameters, arguments, position)?;
                Ok(result)
            }
            _ => Err(invalid(self)),
        }
    }
}

/// Result type of `left <operator> right`, if the operands fit.
fn binary_result(operator: BinaryOperator, left: Type, right: Type) -> Option<Type> {
    match operator {
        BinaryOperator::Or | BinaryOperator::And => {
            (left == Type::Bool && right == Type::Bool).then_some(Type::Bool)
        }
        BinaryOperator::Add if left == Type::String || right == Type::String => {
            (left.is_primitive() && right.is_primitive()).then_some(Type::String)
        }
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => (left == right && left.is_numeric()).then_some(left),
        BinaryOperator::Modulo => (left == Type::Int && right == Type::Int).then_some(Type::Int),
        BinaryOperator::Less
        | BinaryOperator::Greater
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterOrEqual => (left == right
            && matches!(left, Type::Int | Type::Float | Type::Char))
        .then_some(Type::Bool),
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            common_type(left, right).map(|_| Type::Bool)
        }
    }
}

fn block_returns(block: &BlockStatement) -> bool {
    block.statements.iter().any(statement_returns)
}

/// Whether control never falls off the end of `statement`.
fn statement_returns(statement: &Statement) -> bool {
    match statement {
        Statement::Return { .. } | Statement::Throw { .. } => true,
        Statement::Block(block) => block_returns(block),
        Statement::If(statement) => if_returns(statement),
        Statement::Try {
            body, catch_clause, ..
        } => block_returns(body) && block_returns(&catch_clause.body),
        _ => false,
    }
}

fn if_returns(statement: &IfStatement) -> bool {
    block_returns(&statement.body)
        && match &statement.else_branch {
            None => false,
            Some(ElseBranch::ElseIf(nested)) => if_returns(nested),
            Some(ElseBranch::Else(block)) => block_returns(block),
        }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::parser::test_support::parse_text;
    use crate::registry::RegisteredFunction;

    fn check(text: &str) -> CheckResult<()> {
        let (program, handler) = parse_text(text);
        assert!(!handler.has_errors(), "{:?}", handler.reports());
        let mut registry = FunctionsRegistry::new("Test");
        for function in &program.function_definitions {
            registry
                .insert("Test", RegisteredFunction::local(Rc::new(function.clone())))
                .expect("insert");
        }
        program
            .function_definitions
            .iter()
            .try_for_each(|function| check_function(&registry, "Test", function))
    }

    fn kind(text: &str) -> SemanticErrorKind {
        check(text).expect_err("should fail").kind
    }

    #[test]
    fn well_typed_program() {
        check(
            "int Sum(int a, int b) { return a + b; }
             string Describe(dict<string, int> d) {
                 d.Put(\"k\", Sum(1, 2));
                 if (d.Contains(\"k\") && ?d) { return \"n=\" + d.Count; }
                 else { throw \"empty\"; }
             }
             void Main() {
                 int i = 0;
                 while (i < 10) { i = i + 1; if (i == 5) { break; } }
                 string s = null;
                 try { s = Describe(null); } catch message { s = message; }
             }",
        )
        .expect("well typed");
    }

    #[test]
    fn shadowing_is_rejected() {
        assert_eq!(
            kind("void F(int a) { { int a = 2; } }"),
            SemanticErrorKind::VariableRedefinition("a".into())
        );
    }

    #[test]
    fn sibling_blocks_may_reuse_names() {
        check("void F() { { int a = 1; } { int a = 2; } }").expect("sibling scopes");
    }

    #[test]
    fn duplicate_parameters() {
        assert!(matches!(
            kind("void F(int a, float a) { }"),
            SemanticErrorKind::DuplicateParameterName { .. }
        ));
    }

    #[test]
    fn undefined_variable_and_bad_target() {
        assert_eq!(
            kind("void F() { x = 1; }"),
            SemanticErrorKind::UndefinedVariable("x".into())
        );
        assert_eq!(
            kind("int G() { return 1; } void F() { G() = 1; }"),
            SemanticErrorKind::InvalidAssignmentTarget
        );
    }

    #[test]
    fn break_outside_loop() {
        assert_eq!(
            kind("void F() { break; }"),
            SemanticErrorKind::InvalidContinueOrBreak("break")
        );
    }

    #[test]
    fn return_rules() {
        assert_eq!(
            kind("void F() { return 1; }"),
            SemanticErrorKind::VoidFunctionReturnsValue("F".into())
        );
        assert_eq!(
            kind("int F() { return; }"),
            SemanticErrorKind::ReturnValueExpected("F".into())
        );
        assert_eq!(
            kind("int F(bool b) { if (b) { return 1; } }"),
            SemanticErrorKind::MissingReturnStatement("F".into())
        );
        check(
            "int F(bool b) {
                 if (b) { return 1; } else if (!b) { return 2; } else { throw \"x\"; }
             }",
        )
        .expect("all paths return");
        check("int F() { try { return 1; } catch { return 2; } }").expect("try returns");
    }

    #[test]
    fn no_implicit_numeric_conversion() {
        assert_eq!(
            kind("void F() { float f = 1; }"),
            SemanticErrorKind::TypeMismatch {
                expected: "float".into(),
                actual: "int".into()
            }
        );
        assert!(matches!(
            kind("void F() { int x = 1 + 2.0; }"),
            SemanticErrorKind::BinaryOperatorTypeMismatch { operator: "+", .. }
        ));
        assert!(matches!(
            kind("void F() { float x = 2.0 % 1.0; }"),
            SemanticErrorKind::BinaryOperatorTypeMismatch { operator: "%", .. }
        ));
    }

    #[test]
    fn conditions_must_be_bool() {
        assert!(matches!(
            kind("void F() { while (1) { } }"),
            SemanticErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn call_checks() {
        assert!(matches!(
            kind("void F() { G(); }"),
            SemanticErrorKind::FunctionNotFound { .. }
        ));
        assert!(matches!(
            kind("void G(int a) { } void F() { G(); }"),
            SemanticErrorKind::WrongArgumentCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
        assert!(matches!(
            kind("void G(int a) { } void F() { G('c'); }"),
            SemanticErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn member_access() {
        assert!(matches!(
            kind("void F(int a) { int b = a.Length; }"),
            SemanticErrorKind::InvalidMemberAccess { .. }
        ));
        assert!(matches!(
            kind("void F(dict<int, int> d) { d.Clear(); }"),
            SemanticErrorKind::InvalidMemberAccess { .. }
        ));
        assert!(matches!(
            kind("void F(dict<int, int> d) { d.Put(1); }"),
            SemanticErrorKind::WrongArgumentCount { .. }
        ));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = check("void F() {\n\n  int x = y;\n}").expect_err("undefined");
        assert_eq!(err.line, Some(3));
        assert_eq!(err.module, "Test");
    }
}
