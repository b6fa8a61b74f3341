//! Tree-walking interpreter over a resolved `FunctionsRegistry`.

use core::cell::RefCell;
use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::ast::{
    BinaryOperator, BlockStatement, ElseBranch, Expression, ExpressionKind, IfStatement, Literal,
    Member, Statement, UnaryOperator,
};
use crate::config::CompilerConfig;
use crate::registry::{FunctionEntry, FunctionsRegistry};
use crate::stack::ensure_stack;
use crate::types::DeclarableType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("null value used as {0}")]
    NullValue(String),
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot convert `{value}` to {target}")]
    InvalidConversion { value: String, target: String },
    #[error("index {index} is out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },
    #[error("key `{0}` is not in the dictionary")]
    MissingKey(String),
    #[error("{0}")]
    Thrown(String),
    #[error("call depth exceeded {0}")]
    CallDepthExceeded(usize),
    #[error("function `{function}` is not registered for module `{module}`")]
    UnknownFunction { module: String, function: String },
    #[error("variable `{0}` is not defined")]
    UndefinedVariable(String),
    #[error("module `{0}` has no `Main` function")]
    MissingEntryPoint(String),
    #[error("console error: {0}")]
    Io(String),
}

impl RuntimeError {
    /// Whether a `try`/`catch` may handle the error.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            RuntimeError::CallDepthExceeded(_)
                | RuntimeError::UnknownFunction { .. }
                | RuntimeError::UndefinedVariable(_)
                | RuntimeError::MissingEntryPoint(_)
                | RuntimeError::Io(_)
        )
    }

    /// Text bound to the variable of a `catch` clause.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Thrown(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<io::Error> for RuntimeError {
    fn from(err: io::Error) -> Self {
        RuntimeError::Io(err.to_string())
    }
}

/// Dictionary key. Floats are keyed by their bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictionaryKey {
    Int(i32),
    Float(u64),
    Bool(bool),
    String(String),
    Char(char),
}

impl fmt::Display for DictionaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryKey::Int(value) => write!(f, "{value}"),
            DictionaryKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            DictionaryKey::Bool(value) => write!(f, "{value}"),
            DictionaryKey::String(value) => f.write_str(value),
            DictionaryKey::Char(value) => write!(f, "{value}"),
        }
    }
}

pub type Dictionary = HashMap<DictionaryKey, Value>;

/// Runtime value. Dictionaries are shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Float(f64),
    Bool(bool),
    String(String),
    Char(char),
    Dictionary(Rc<RefCell<Dictionary>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn new_dictionary() -> Self {
        Value::Dictionary(Rc::new(RefCell::new(Dictionary::new())))
    }

    /// Value a declaration without initializer starts with.
    pub fn default_for(ty: DeclarableType) -> Self {
        match ty {
            DeclarableType::Dictionary { .. } => Value::new_dictionary(),
            DeclarableType::Primitive(_) => Value::Null,
        }
    }

    fn to_key(&self) -> Result<DictionaryKey, RuntimeError> {
        match self {
            Value::Int(value) => Ok(DictionaryKey::Int(*value)),
            Value::Float(value) => Ok(DictionaryKey::Float(value.to_bits())),
            Value::Bool(value) => Ok(DictionaryKey::Bool(*value)),
            Value::String(value) => Ok(DictionaryKey::String(value.clone())),
            Value::Char(value) => Ok(DictionaryKey::Char(*value)),
            Value::Null | Value::Dictionary(_) => {
                Err(RuntimeError::NullValue("dictionary key".into()))
            }
        }
    }

    fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Dictionary(a), Value::Dictionary(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Char(value) => write!(f, "{value}"),
            Value::Dictionary(dictionary) => write!(f, "dict({})", dictionary.borrow().len()),
        }
    }
}

/// Text input and output of a running program.
pub trait Console {
    fn write(&mut self, text: &str) -> Result<(), RuntimeError>;

    /// Next input line without its line break, `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>, RuntimeError>;
}

impl<T: Console + ?Sized> Console for &mut T {
    fn write(&mut self, text: &str) -> Result<(), RuntimeError> {
        (**self).write(text)
    }

    fn read_line(&mut self) -> Result<Option<String>, RuntimeError> {
        (**self).read_line()
    }
}

/// Process stdin/stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, text: &str) -> Result<(), RuntimeError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, RuntimeError> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Console fed from a queue of input lines, capturing all output.
#[derive(Debug, Default, Clone)]
pub struct QueuedConsole {
    input: VecDeque<String>,
    output: String,
}

impl QueuedConsole {
    pub fn new<I, S>(input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueuedConsole {
            input: input.into_iter().map(Into::into).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Console for QueuedConsole {
    fn write(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, RuntimeError> {
        Ok(self.input.pop_front())
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Variables of one function invocation.
struct Frame<'r> {
    module: &'r str,
    variables: Vec<(String, Value)>,
    scopes: Vec<usize>,
}

impl<'r> Frame<'r> {
    fn new(module: &'r str) -> Self {
        Frame {
            module,
            variables: Vec::new(),
            scopes: Vec::new(),
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        self.variables.push((name.to_string(), value));
    }

    fn slot(&mut self, name: &str) -> Result<&mut Value, RuntimeError> {
        self.variables
            .iter_mut()
            .rev()
            .find_map(|(n, value)| (n == name).then_some(value))
            .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))
    }

    fn push_scope(&mut self) {
        self.scopes.push(self.variables.len());
    }

    fn pop_scope(&mut self) {
        if let Some(mark) = self.scopes.pop() {
            self.variables.truncate(mark);
        }
    }

    fn mark(&self) -> (usize, usize) {
        (self.variables.len(), self.scopes.len())
    }

    fn restore(&mut self, (variables, scopes): (usize, usize)) {
        self.variables.truncate(variables);
        self.scopes.truncate(scopes);
    }
}

pub struct Interpreter<'r, C> {
    registry: &'r FunctionsRegistry,
    console: C,
    max_call_depth: usize,
    depth: usize,
}

impl<'r, C: Console> Interpreter<'r, C> {
    pub fn new(registry: &'r FunctionsRegistry, console: C, config: &CompilerConfig) -> Self {
        Interpreter {
            registry,
            console,
            max_call_depth: config.max_call_depth,
            depth: 0,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Call `Main` of the root module. Returns its result when it is an int.
    pub fn run(&mut self) -> Result<Option<i32>, RuntimeError> {
        let registry = self.registry;
        let root = registry.root_module();
        if registry.get(root, "Main").is_none() {
            return Err(RuntimeError::MissingEntryPoint(root.to_string()));
        }
        debug!("running {root}.Main");
        match self.call(root, "Main", Vec::new())? {
            Value::Int(code) => Ok(Some(code)),
            _ => Ok(None),
        }
    }

    fn call(
        &mut self,
        module: &'r str,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let registry = self.registry;
        let function = registry
            .get(module, name)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                module: module.to_string(),
                function: name.to_string(),
            })?;
        trace!("call {module}.{name}");

        match &function.entry {
            FunctionEntry::Standard(standard) => standard.invoke(&arguments, &mut self.console),
            FunctionEntry::User(definition) => {
                if self.depth >= self.max_call_depth {
                    return Err(RuntimeError::CallDepthExceeded(self.max_call_depth));
                }
                let mut frame = Frame::new(function.home_module(module));
                for (parameter, argument) in definition.parameters.iter().zip(arguments) {
                    frame.declare(&parameter.name, argument);
                }
                self.depth += 1;
                let flow = self.execute_block(&mut frame, &definition.body);
                self.depth -= 1;
                match flow? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Null),
                }
            }
        }
    }

    fn execute_block(
        &mut self,
        frame: &mut Frame<'r>,
        block: &'r BlockStatement,
    ) -> Result<Flow, RuntimeError> {
        ensure_stack(|| self.execute_statements(frame, block))
    }

    fn execute_statements(
        &mut self,
        frame: &mut Frame<'r>,
        block: &'r BlockStatement,
    ) -> Result<Flow, RuntimeError> {
        frame.push_scope();
        let mut flow = Flow::Normal;
        for statement in &block.statements {
            match self.execute(frame, statement) {
                Ok(Flow::Normal) => {}
                Ok(other) => {
                    flow = other;
                    break;
                }
                Err(err) => {
                    frame.pop_scope();
                    return Err(err);
                }
            }
        }
        frame.pop_scope();
        Ok(flow)
    }

    fn execute(
        &mut self,
        frame: &mut Frame<'r>,
        statement: &'r Statement,
    ) -> Result<Flow, RuntimeError> {
        match statement {
            Statement::Block(block) => self.execute_block(frame, block),
            Statement::VariableDeclaration {
                ty,
                name,
                initial_value,
                ..
            } => {
                let value = match initial_value {
                    Some(expression) => self.evaluate(frame, expression)?,
                    None => Value::default_for(*ty),
                };
                frame.declare(name, value);
                Ok(Flow::Normal)
            }
            Statement::Expression {
                expression,
                assigned_value,
                ..
            } => {
                match (assigned_value, &expression.kind) {
                    (Some(value), ExpressionKind::Identifier(name)) => {
                        let value = self.evaluate(frame, value)?;
                        *frame.slot(name)? = value;
                    }
                    _ => {
                        self.evaluate(frame, expression)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::If(statement) => self.execute_if(frame, statement),
            Statement::While {
                condition, body, ..
            } => {
                while self.condition(frame, condition)? {
                    match self.execute_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Try {
                body, catch_clause, ..
            } => {
                let mark = frame.mark();
                match self.execute_block(frame, body) {
                    Err(err) if err.is_catchable() => {
                        frame.restore(mark);
                        debug!("caught: {err}");
                        frame.push_scope();
                        if let Some(variable) = &catch_clause.variable {
                            frame.declare(variable, Value::String(err.message()));
                        }
                        let flow = self.execute_block(frame, &catch_clause.body);
                        frame.pop_scope();
                        flow
                    }
                    other => other,
                }
            }
            Statement::Continue(_) => Ok(Flow::Continue),
            Statement::Break(_) => Ok(Flow::Break),
            Statement::Throw { message, .. } => Err(RuntimeError::Thrown(message.clone())),
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.evaluate(frame, expression)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn execute_if(
        &mut self,
        frame: &mut Frame<'r>,
        statement: &'r IfStatement,
    ) -> Result<Flow, RuntimeError> {
        if self.condition(frame, &statement.condition)? {
            return self.execute_block(frame, &statement.body);
        }
        match &statement.else_branch {
            None => Ok(Flow::Normal),
            Some(ElseBranch::ElseIf(nested)) => self.execute_if(frame, nested),
            Some(ElseBranch::Else(block)) => self.execute_block(frame, block),
        }
    }

    fn condition(
        &mut self,
        frame: &mut Frame<'r>,
        condition: &'r Expression,
    ) -> Result<bool, RuntimeError> {
        match self.evaluate(frame, condition)? {
            Value::Bool(value) => Ok(value),
            _ => Err(RuntimeError::NullValue("condition".into())),
        }
    }

    fn evaluate(
        &mut self,
        frame: &mut Frame<'r>,
        expression: &'r Expression,
    ) -> Result<Value, RuntimeError> {
        ensure_stack(|| self.evaluate_kind(frame, expression))
    }

    fn evaluate_kind(
        &mut self,
        frame: &mut Frame<'r>,
        expression: &'r Expression,
    ) -> Result<Value, RuntimeError> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::Int(value) => Value::Int(*value),
                Literal::Float(value) => Value::Float(*value),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::String(value) => Value::String(value.clone()),
                Literal::Char(value) => Value::Char(*value),
                Literal::Null => Value::Null,
            }),
            ExpressionKind::Parenthesised(inner) => self.evaluate(frame, inner),
            ExpressionKind::Identifier(name) => frame.slot(name).map(|value| value.clone()),
            ExpressionKind::Call { name, arguments } => {
                let arguments = self.evaluate_all(frame, arguments)?;
                self.call(frame.module, name, arguments)
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.evaluate(frame, operand)?;
                match (operator, operand) {
                    (UnaryOperator::NullCheck, value) => Ok(Value::Bool(!value.is_null())),
                    (UnaryOperator::BooleanNegation, Value::Bool(value)) => Ok(Value::Bool(!value)),
                    (UnaryOperator::ArithmeticNegation, Value::Int(value)) => value
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(RuntimeError::IntegerOverflow),
                    (UnaryOperator::ArithmeticNegation, Value::Float(value)) => {
                        Ok(Value::Float(-value))
                    }
                    (operator, _) => Err(RuntimeError::NullValue(format!(
                        "operand of `{}`",
                        operator.symbol()
                    ))),
                }
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => self.evaluate_binary(frame, *operator, left, right),
            ExpressionKind::MemberAccess { parent, member } => {
                let parent = self.evaluate(frame, parent)?;
                self.evaluate_member(frame, parent, member)
            }
        }
    }

    fn evaluate_all(
        &mut self,
        frame: &mut Frame<'r>,
        expressions: &'r [Expression],
    ) -> Result<Vec<Value>, RuntimeError> {
        expressions
            .iter()
            .map(|expression| self.evaluate(frame, expression))
            .collect()
    }

    fn evaluate_binary(
        &mut self,
        frame: &mut Frame<'r>,
        operator: BinaryOperator,
        left: &'r Expression,
        right: &'r Expression,
    ) -> Result<Value, RuntimeError> {
        let left = self.evaluate(frame, left)?;
        match (operator, &left) {
            (BinaryOperator::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (BinaryOperator::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            _ => {}
        }
        let right = self.evaluate(frame, right)?;
        apply_binary(operator, left, right)
    }

    fn evaluate_member(
        &mut self,
        frame: &mut Frame<'r>,
        parent: Value,
        member: &'r Member,
    ) -> Result<Value, RuntimeError> {
        match (parent, member) {
            (Value::String(text), Member::Property(_)) => i32::try_from(text.chars().count())
                .map(Value::Int)
                .map_err(|_| RuntimeError::IntegerOverflow),
            (Value::Dictionary(dictionary), Member::Property(_)) => {
                i32::try_from(dictionary.borrow().len())
                    .map(Value::Int)
                    .map_err(|_| RuntimeError::IntegerOverflow)
            }
            (Value::Dictionary(dictionary), Member::Method { name, arguments }) => {
                let arguments = self.evaluate_all(frame, arguments)?;
                let key = arguments
                    .first()
                    .ok_or_else(|| RuntimeError::NullValue("dictionary key".into()))?
                    .to_key()?;
                let mut dictionary = dictionary.borrow_mut();
                match name.as_str() {
                    "Contains" => Ok(Value::Bool(dictionary.contains_key(&key))),
                    "Get" => dictionary
                        .get(&key)
                        .cloned()
                        .ok_or_else(|| RuntimeError::MissingKey(key.to_string())),
                    "Put" => {
                        let value = arguments.get(1).cloned().unwrap_or(Value::Null);
                        dictionary.insert(key, value);
                        Ok(Value::Null)
                    }
                    _ => {
                        dictionary.remove(&key);
                        Ok(Value::Null)
                    }
                }
            }
            (_, member) => Err(RuntimeError::NullValue(format!(
                "receiver of `{}`",
                member.name()
            ))),
        }
    }
}

fn apply_binary(
    operator: BinaryOperator,
    left: Value,
    right: Value,
) -> Result<Value, RuntimeError> {
    use BinaryOperator as Op;

    if matches!(operator, Op::Equal | Op::NotEqual) {
        let equal = left.same_as(&right);
        return Ok(Value::Bool(if operator == Op::Equal { equal } else { !equal }));
    }
    if left.is_null() || right.is_null() {
        return Err(RuntimeError::NullValue(format!(
            "operand of `{}`",
            operator.symbol()
        )));
    }

    let value = match (operator, left, right) {
        (Op::And, Value::Bool(a), Value::Bool(b)) => Value::Bool(a && b),
        (Op::Or, Value::Bool(a), Value::Bool(b)) => Value::Bool(a || b),
        (Op::Add, a @ Value::String(_), b) | (Op::Add, a, b @ Value::String(_)) => {
            Value::String(format!("{a}{b}"))
        }
        (Op::Add, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_add(b).ok_or(RuntimeError::IntegerOverflow)?)
        }
        (Op::Subtract, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_sub(b).ok_or(RuntimeError::IntegerOverflow)?)
        }
        (Op::Multiply, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_mul(b).ok_or(RuntimeError::IntegerOverflow)?)
        }
        (Op::Divide | Op::Modulo, Value::Int(_), Value::Int(0)) => {
            return Err(RuntimeError::DivisionByZero);
        }
        (Op::Divide, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_div(b).ok_or(RuntimeError::IntegerOverflow)?)
        }
        (Op::Modulo, Value::Int(a), Value::Int(b)) => {
            Value::Int(a.checked_rem(b).ok_or(RuntimeError::IntegerOverflow)?)
        }
        (Op::Add, Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Op::Subtract, Value::Float(a), Value::Float(b)) => Value::Float(a - b),
        (Op::Multiply, Value::Float(a), Value::Float(b)) => Value::Float(a * b),
        (Op::Divide, Value::Float(a), Value::Float(b)) => Value::Float(a / b),
        (Op::Less, a, b) => Value::Bool(compare(&a, &b)?.is_lt()),
        (Op::Greater, a, b) => Value::Bool(compare(&a, &b)?.is_gt()),
        (Op::LessOrEqual, a, b) => Value::Bool(compare(&a, &b)?.is_le()),
        (Op::GreaterOrEqual, a, b) => Value::Bool(compare(&a, &b)?.is_ge()),
        (operator, _, _) => {
            return Err(RuntimeError::NullValue(format!(
                "operand of `{}`",
                operator.symbol()
            )));
        }
    };
    Ok(value)
}

fn compare(left: &Value, right: &Value) -> Result<core::cmp::Ordering, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or_else(|| RuntimeError::NullValue("comparison operand".into()))
}
