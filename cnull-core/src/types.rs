//! Type system of C?.
//!
//! Declarable types are what a variable or parameter can be declared
//! as; `Type` is the wider set of types an expression can have during
//! checking, which also includes `null` and `void`.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
    String,
    Char,
}

/// A type that can be written in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarableType {
    Primitive(PrimitiveType),
    Dictionary {
        key: PrimitiveType,
        value: PrimitiveType,
    },
}

/// Declared result of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Value(DeclarableType),
}

/// Type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Char,
    Dictionary {
        key: PrimitiveType,
        value: PrimitiveType,
    },
    /// Type of the `null` literal; assignable to every declarable type.
    Null,
    /// Result of calling a void function.
    Void,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Type::Int | Type::Float | Type::Bool | Type::String | Type::Char
        )
    }
}

impl From<PrimitiveType> for Type {
    fn from(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Int => Type::Int,
            PrimitiveType::Float => Type::Float,
            PrimitiveType::Bool => Type::Bool,
            PrimitiveType::String => Type::String,
            PrimitiveType::Char => Type::Char,
        }
    }
}

impl From<DeclarableType> for Type {
    fn from(declared: DeclarableType) -> Self {
        match declared {
            DeclarableType::Primitive(primitive) => primitive.into(),
            DeclarableType::Dictionary { key, value } => Type::Dictionary { key, value },
        }
    }
}

impl From<ReturnType> for Type {
    fn from(declared: ReturnType) -> Self {
        match declared {
            ReturnType::Void => Type::Void,
            ReturnType::Value(declared) => declared.into(),
        }
    }
}

/// Whether a value of type `value` may be stored where `target` is expected.
///
/// * null is assignable to every type except void
/// * otherwise types must be equal
pub fn is_assignable(value: Type, target: Type) -> bool {
    if target == Type::Void || value == Type::Void {
        return false;
    }
    value == Type::Null || value == target
}

/// The type both operands of `==`/`!=` are compared at, if they are
/// comparable at all.
///
/// * common(null, T) = T
/// * common(T, null) = T
/// * common(T, T)    = T
pub fn common_type(a: Type, b: Type) -> Option<Type> {
    if a == Type::Void || b == Type::Void {
        return None;
    }
    if a == Type::Null {
        return Some(b);
    }
    if b == Type::Null {
        return Some(a);
    }
    (a == b).then_some(a)
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Bool => "bool",
            PrimitiveType::String => "string",
            PrimitiveType::Char => "char",
        })
    }
}

impl fmt::Display for DeclarableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Type::from(*self).fmt(f)
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Type::from(*self).fmt(f)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Char => f.write_str("char"),
            Type::Dictionary { key, value } => write!(f, "dict<{key}, {value}>"),
            Type::Null => f.write_str("null"),
            Type::Void => f.write_str("void"),
        }
    }
}
