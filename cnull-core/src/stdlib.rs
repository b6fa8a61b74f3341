//! Built-in functions importable from the reserved `CNull` module.
//!
//! Functions are grouped in submodules and imported as
//! `import CNull.Submodule.Function;`. The table below is the single
//! source of truth for their signatures; the analyzer checks calls
//! against it and the interpreter dispatches on `StandardFunctionKind`.

use crate::interpreter::{Console, RuntimeError, Value};
use crate::types::Type;

/// Name of the module that holds the standard library.
pub const STANDARD_LIBRARY_MODULE: &str = "CNull";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFunctionKind {
    Write,
    WriteLine,
    ReadLine,
    StringToInt,
    StringToFloat,
    IntToString,
    FloatToString,
    BoolToString,
    CharToString,
    IntToFloat,
    FloatToInt,
    Length,
    Substring,
    Contains,
    ToUpper,
    ToLower,
    CharAt,
}

/// Signature and implementation tag of one standard function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFunction {
    pub submodule: &'static str,
    pub name: &'static str,
    pub parameters: &'static [Type],
    pub return_type: Type,
    pub kind: StandardFunctionKind,
}

macro_rules! standard {
    ($submodule:literal, $name:ident, [$($parameter:ident),*] -> $ret:ident) => {
        StandardFunction {
            submodule: $submodule,
            name: stringify!($name),
            parameters: &[$(Type::$parameter),*],
            return_type: Type::$ret,
            kind: StandardFunctionKind::$name,
        }
    };
}

pub const STANDARD_FUNCTIONS: &[StandardFunction] = &[
    standard!("Console", Write, [String] -> Void),
    standard!("Console", WriteLine, [String] -> Void),
    standard!("Console", ReadLine, [] -> String),
    standard!("Converters", StringToInt, [String] -> Int),
    standard!("Converters", StringToFloat, [String] -> Float),
    standard!("Converters", IntToString, [Int] -> String),
    standard!("Converters", FloatToString, [Float] -> String),
    standard!("Converters", BoolToString, [Bool] -> String),
    standard!("Converters", CharToString, [Char] -> String),
    standard!("Converters", IntToFloat, [Int] -> Float),
    standard!("Converters", FloatToInt, [Float] -> Int),
    standard!("Strings", Length, [String] -> Int),
    standard!("Strings", Substring, [String, Int, Int] -> String),
    standard!("Strings", Contains, [String, String] -> Bool),
    standard!("Strings", ToUpper, [String] -> String),
    standard!("Strings", ToLower, [String] -> String),
    standard!("Strings", CharAt, [String, Int] -> Char),
];

/// Function table consulted when resolving `CNull` imports.
pub trait StandardLibrary {
    fn function(&self, submodule: &str, name: &str) -> Option<&'static StandardFunction>;

    fn has_submodule(&self, submodule: &str) -> bool;
}

/// The library backed by `STANDARD_FUNCTIONS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLibrary;

impl StandardLibrary for BuiltinLibrary {
    fn function(&self, submodule: &str, name: &str) -> Option<&'static StandardFunction> {
        STANDARD_FUNCTIONS
            .iter()
            .find(|function| function.submodule == submodule && function.name == name)
    }

    fn has_submodule(&self, submodule: &str) -> bool {
        STANDARD_FUNCTIONS
            .iter()
            .any(|function| function.submodule == submodule)
    }
}

impl StandardFunction {
    /// Run the function. Arguments have already been checked against
    /// `parameters` by the analyzer, but any of them may be null.
    pub fn invoke(
        &self,
        arguments: &[Value],
        console: &mut dyn Console,
    ) -> Result<Value, RuntimeError> {
        let argument = |index: usize| arguments.get(index).unwrap_or(&Value::Null);

        let result = match self.kind {
            StandardFunctionKind::Write => {
                console.write(self.string(argument(0))?)?;
                Value::Null
            }
            StandardFunctionKind::WriteLine => {
                console.write(self.string(argument(0))?)?;
                console.write("\n")?;
                Value::Null
            }
            StandardFunctionKind::ReadLine => match console.read_line()? {
                Some(line) => Value::String(line),
                None => Value::Null,
            },
            StandardFunctionKind::StringToInt => {
                let text = self.string(argument(0))?;
                Value::Int(
                    text.trim()
                        .parse()
                        .map_err(|_| conversion_error(text, Type::Int))?,
                )
            }
            StandardFunctionKind::StringToFloat => {
                let text = self.string(argument(0))?;
                Value::Float(
                    text.trim()
                        .parse()
                        .map_err(|_| conversion_error(text, Type::Float))?,
                )
            }
            StandardFunctionKind::IntToString
            | StandardFunctionKind::FloatToString
            | StandardFunctionKind::BoolToString
            | StandardFunctionKind::CharToString => {
                let value = argument(0);
                if value.is_null() {
                    return Err(self.null_argument());
                }
                Value::String(value.to_string())
            }
            StandardFunctionKind::IntToFloat => match argument(0) {
                Value::Int(value) => Value::Float(f64::from(*value)),
                _ => return Err(self.null_argument()),
            },
            StandardFunctionKind::FloatToInt => match argument(0) {
                Value::Float(value) => {
                    let truncated = value.trunc();
                    if !truncated.is_finite()
                        || truncated < f64::from(i32::MIN)
                        || truncated > f64::from(i32::MAX)
                    {
                        return Err(conversion_error(&value.to_string(), Type::Int));
                    }
                    Value::Int(truncated as i32)
                }
                _ => return Err(self.null_argument()),
            },
            StandardFunctionKind::Length => {
                let length = self.string(argument(0))?.chars().count();
                Value::Int(i32::try_from(length).map_err(|_| RuntimeError::IntegerOverflow)?)
            }
            StandardFunctionKind::Substring => {
                let chars: Vec<char> = self.string(argument(0))?.chars().collect();
                let start = self.index(argument(1), chars.len())?;
                let length = self.int(argument(2))?;
                let end = usize::try_from(length)
                    .ok()
                    .and_then(|length| start.checked_add(length))
                    .filter(|end| *end <= chars.len())
                    .ok_or(RuntimeError::IndexOutOfRange {
                        index: i64::from(length),
                        length: chars.len(),
                    })?;
                Value::String(chars[start..end].iter().collect())
            }
            StandardFunctionKind::Contains => {
                let haystack = self.string(argument(0))?;
                let needle = self.string(argument(1))?;
                Value::Bool(haystack.contains(needle))
            }
            StandardFunctionKind::ToUpper => {
                Value::String(self.string(argument(0))?.to_uppercase())
            }
            StandardFunctionKind::ToLower => {
                Value::String(self.string(argument(0))?.to_lowercase())
            }
            StandardFunctionKind::CharAt => {
                let chars: Vec<char> = self.string(argument(0))?.chars().collect();
                let index = self.index(argument(1), chars.len())?;
                match chars.get(index) {
                    Some(ch) => Value::Char(*ch),
                    None => {
                        return Err(RuntimeError::IndexOutOfRange {
                            index: index as i64,
                            length: chars.len(),
                        });
                    }
                }
            }
        };
        Ok(result)
    }

    fn string<'v>(&self, value: &'v Value) -> Result<&'v str, RuntimeError> {
        match value {
            Value::String(text) => Ok(text),
            _ => Err(self.null_argument()),
        }
    }

    fn int(&self, value: &Value) -> Result<i32, RuntimeError> {
        match value {
            Value::Int(value) => Ok(*value),
            _ => Err(self.null_argument()),
        }
    }

    fn index(&self, value: &Value, length: usize) -> Result<usize, RuntimeError> {
        let index = self.int(value)?;
        usize::try_from(index)
            .ok()
            .filter(|index| *index <= length)
            .ok_or(RuntimeError::IndexOutOfRange {
                index: i64::from(index),
                length,
            })
    }

    fn null_argument(&self) -> RuntimeError {
        RuntimeError::NullValue(format!("argument of {}", self.name))
    }
}

fn conversion_error(text: &str, target: Type) -> RuntimeError {
    RuntimeError::InvalidConversion {
        value: text.to_string(),
        target: target.to_string(),
    }
}
