//! Flattened symbol table of a whole program.
//!
//! Every module that takes part in the program gets a table of the
//! functions callable from it: its own definitions plus everything it
//! imports. Imported entries remember the module they came from.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::FunctionDefinition;
use crate::diagnostic::{SemanticError, SemanticErrorKind};
use crate::stdlib::StandardFunction;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionEntry {
    User(Rc<FunctionDefinition>),
    Standard(&'static StandardFunction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredFunction {
    pub entry: FunctionEntry,
    /// Module the function was imported from, if it was imported.
    pub external_module: Option<String>,
}

impl RegisteredFunction {
    pub fn local(definition: Rc<FunctionDefinition>) -> Self {
        RegisteredFunction {
            entry: FunctionEntry::User(definition),
            external_module: None,
        }
    }

    pub fn imported(entry: FunctionEntry, from: impl Into<String>) -> Self {
        RegisteredFunction {
            entry,
            external_module: Some(from.into()),
        }
    }

    pub fn name(&self) -> &str {
        match &self.entry {
            FunctionEntry::User(definition) => &definition.name,
            FunctionEntry::Standard(function) => function.name,
        }
    }

    pub fn parameter_types(&self) -> Vec<Type> {
        match &self.entry {
            FunctionEntry::User(definition) => definition
                .parameters
                .iter()
                .map(|parameter| parameter.ty.into())
                .collect(),
            FunctionEntry::Standard(function) => function.parameters.to_vec(),
        }
    }

    pub fn return_type(&self) -> Type {
        match &self.entry {
            FunctionEntry::User(definition) => definition.return_type.into(),
            FunctionEntry::Standard(function) => function.return_type,
        }
    }

    /// Module whose table resolves calls made from this function's body.
    pub fn home_module<'a>(&'a self, registered_in: &'a str) -> &'a str {
        self.external_module.as_deref().unwrap_or(registered_in)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionsRegistry {
    root_module: String,
    modules: BTreeMap<String, BTreeMap<String, RegisteredFunction>>,
}

impl FunctionsRegistry {
    pub fn new(root_module: impl Into<String>) -> Self {
        FunctionsRegistry {
            root_module: root_module.into(),
            modules: BTreeMap::new(),
        }
    }

    /// Module holding the entry point.
    pub fn root_module(&self) -> &str {
        &self.root_module
    }

    /// Add `function` to `module`'s table. A name can be registered only
    /// once per module.
    pub fn insert(
        &mut self,
        module: &str,
        function: RegisteredFunction,
    ) -> Result<(), SemanticError> {
        let table = self.modules.entry(module.to_string()).or_default();
        let name = function.name().to_string();
        if table.contains_key(&name) {
            return Err(SemanticError::new(
                SemanticErrorKind::FunctionRedefinition(name),
                module,
            ));
        }
        table.insert(name, function);
        Ok(())
    }

    pub fn get(&self, module: &str, function: &str) -> Option<&RegisteredFunction> {
        self.modules.get(module)?.get(function)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn functions(&self, module: &str) -> impl Iterator<Item = (&str, &RegisteredFunction)> {
        self.modules
            .get(module)
            .into_iter()
            .flat_map(|table| table.iter().map(|(name, function)| (name.as_str(), function)))
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BlockStatement;
    use crate::position::Position;
    use crate::stdlib::{BuiltinLibrary, StandardLibrary};
    use crate::types::ReturnType;

    fn definition(name: &str) -> Rc<FunctionDefinition> {
        Rc::new(FunctionDefinition {
            return_type: ReturnType::Void,
            name: name.to_string(),
            parameters: Vec::new(),
            body: BlockStatement {
                statements: Vec::new(),
                position: Position::default(),
            },
            position: Position::default(),
        })
    }

    #[test]
    fn redefinition_is_rejected() {
        let mut registry = FunctionsRegistry::new("Main");
        registry
            .insert("Main", RegisteredFunction::local(definition("Run")))
            .expect("first insert");
        let err = registry
            .insert(
                "Main",
                RegisteredFunction::imported(FunctionEntry::User(definition("Run")), "Other"),
            )
            .expect_err("duplicate");
        assert_eq!(err.kind, SemanticErrorKind::FunctionRedefinition("Run".into()));
        assert_eq!(err.module, "Main");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_name_in_different_modules() {
        let mut registry = FunctionsRegistry::new("Main");
        registry
            .insert("Main", RegisteredFunction::local(definition("Run")))
            .expect("insert");
        registry
            .insert("Other", RegisteredFunction::local(definition("Run")))
            .expect("insert");
        assert_eq!(registry.modules().collect::<Vec<_>>(), vec!["Main", "Other"]);
    }

    #[test]
    fn standard_entries_expose_their_signature() {
        let mut registry = FunctionsRegistry::new("Main");
        let write = BuiltinLibrary.function("Console", "Write").expect("Write");
        registry
            .insert(
                "Main",
                RegisteredFunction::imported(FunctionEntry::Standard(write), "CNull"),
            )
            .expect("insert");
        let entry = registry.get("Main", "Write").expect("registered");
        assert_eq!(entry.external_module.as_deref(), Some("CNull"));
        assert_eq!(entry.parameter_types(), vec![Type::String]);
        assert_eq!(entry.return_type(), Type::Void);
        assert_eq!(entry.home_module("Main"), "CNull");
    }
}
