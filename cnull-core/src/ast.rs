//! Abstract syntax tree built by the parser.
//!
//! Every node owns the `Position` it started at. The tree is immutable
//! once built; later stages only read it.

use crate::position::Position;
use crate::types::{DeclarableType, ReturnType};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub module_name: String,
    pub import_directives: Vec<ImportDirective>,
    pub function_definitions: Vec<FunctionDefinition>,
}

/// `import Module.Function;` or `import CNull.Submodule.Function;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    pub module_name: String,
    pub function_name: String,
    pub submodule_name: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub return_type: ReturnType,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: BlockStatement,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: DeclarableType,
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(BlockStatement),
    VariableDeclaration {
        ty: DeclarableType,
        name: String,
        initial_value: Option<Expression>,
        position: Position,
    },
    /// An expression evaluated for its effect, optionally assigned to:
    /// `target = value;` keeps `target` in `expression`.
    Expression {
        expression: Expression,
        assigned_value: Option<Expression>,
        position: Position,
    },
    If(IfStatement),
    While {
        condition: Expression,
        body: BlockStatement,
        position: Position,
    },
    Try {
        body: BlockStatement,
        catch_clause: CatchClause,
        position: Position,
    },
    Continue(Position),
    Break(Position),
    Throw {
        message: String,
        position: Position,
    },
    Return {
        value: Option<Expression>,
        position: Position,
    },
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::Block(block) => block.position,
            Statement::If(statement) => statement.position,
            Statement::Continue(position) | Statement::Break(position) => *position,
            Statement::VariableDeclaration { position, .. }
            | Statement::Expression { position, .. }
            | Statement::While { position, .. }
            | Statement::Try { position, .. }
            | Statement::Throw { position, .. }
            | Statement::Return { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub body: BlockStatement,
    pub else_branch: Option<ElseBranch>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    ElseIf(Box<IfStatement>),
    Else(BlockStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Variable receiving the thrown message, if named.
    pub variable: Option<String>,
    pub body: BlockStatement,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Literal(Literal),
    Parenthesised(Box<Expression>),
    Identifier(String),
    Call {
        name: String,
        arguments: Vec<Expression>,
    },
    /// `parent.member`; chains nest through `parent`.
    MemberAccess {
        parent: Box<Expression>,
        member: Member,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Expression { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property(String),
    Method {
        name: String,
        arguments: Vec<Expression>,
    },
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Property(name) | Member::Method { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `!`
    BooleanNegation,
    /// `-`
    ArithmeticNegation,
    /// `?`: true when the operand is not null.
    NullCheck,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::BooleanNegation => "!",
            UnaryOperator::ArithmeticNegation => "-",
            UnaryOperator::NullCheck => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f64),
    Bool(bool),
    String(String),
    Char(char),
    Null,
}
