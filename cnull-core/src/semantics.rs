//! Module resolution and semantic analysis.
//!
//! Starting from the root module, every import is followed: the target
//! module is parsed (once), its own functions are registered, and the
//! requested function is added to the importing module's table. Imports
//! of the reserved `CNull` module are served by the standard library.
//! When the whole graph is registered every user function is type
//! checked and the root module's `Main` is validated.
//!
//! Semantic errors are fatal: the first one aborts the analysis.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ImportDirective, Program};
use crate::config::CompilerConfig;
use crate::dependency::DependencyTree;
use crate::diagnostic::{ErrorHandler, FatalError, SemanticError, SemanticErrorKind};
use crate::lexer::{CommentFilter, Lexer};
use crate::modules::{ModuleProvider, ModuleStream};
use crate::parser::Parser;
use crate::position::Position;
use crate::registry::{FunctionEntry, FunctionsRegistry, RegisteredFunction};
use crate::source::CodeSource;
use crate::stdlib::{STANDARD_LIBRARY_MODULE, StandardLibrary};
use crate::typecheck::check_function;
use crate::types::{DeclarableType, PrimitiveType, ReturnType};

pub const ENTRY_POINT: &str = "Main";

pub struct SemanticAnalyzer<'a> {
    handler: &'a ErrorHandler,
    provider: &'a dyn ModuleProvider,
    library: &'a dyn StandardLibrary,
    parser: Parser<'a, CommentFilter<Lexer<'a>>>,
    parsed: HashMap<String, Rc<Program>>,
    processed: HashSet<String>,
    /// Modules in the order their registration finished.
    finished: Vec<String>,
    dependencies: DependencyTree<String>,
    registry: FunctionsRegistry,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(
        handler: &'a ErrorHandler,
        config: CompilerConfig,
        provider: &'a dyn ModuleProvider,
        library: &'a dyn StandardLibrary,
    ) -> Self {
        let lexer = Lexer::new(CodeSource::new(handler), handler, config);
        SemanticAnalyzer {
            handler,
            provider,
            library,
            parser: Parser::new(CommentFilter::new(lexer), handler)
                .with_max_nesting_depth(config.max_nesting_depth),
            parsed: HashMap::new(),
            processed: HashSet::new(),
            finished: Vec::new(),
            dependencies: DependencyTree::new(),
            registry: FunctionsRegistry::default(),
        }
    }

    /// Analyze the program rooted at `root`.
    ///
    /// `Ok(None)` means the root module had lexical or syntax errors; they
    /// are in the handler's reports. `Err` means the analysis was aborted.
    pub fn analyze(mut self, root: ModuleStream) -> Result<Option<FunctionsRegistry>, FatalError> {
        let Some(program) = self.parse_module(root)? else {
            return Ok(None);
        };
        let root_module = program.module_name.clone();
        self.registry = FunctionsRegistry::new(root_module.clone());
        self.dependencies.add_node(root_module.clone());

        self.register_module(program)?;
        self.check_bodies()?;
        self.check_entry_point(&root_module)?;

        info!(
            "analyzed {} module(s), {} function(s) registered",
            self.finished.len(),
            self.registry.len()
        );
        Ok(Some(self.registry))
    }

    fn parse_module(&mut self, stream: ModuleStream) -> Result<Option<Rc<Program>>, FatalError> {
        let ModuleStream {
            module_name,
            reader,
            ..
        } = stream;
        self.handler.set_current_module(Some(module_name.clone()));
        self.parser.tokens_mut().inner_mut().attach(reader);

        let errors_before = self.handler.error_count();
        let program = self.parser.parse(&module_name);
        self.parser.tokens_mut().inner_mut().detach();
        let program = program?;
        if self.handler.error_count() > errors_before {
            debug!("module {module_name} has errors");
            return Ok(None);
        }

        let program = Rc::new(program);
        self.parsed.insert(module_name, Rc::clone(&program));
        Ok(Some(program))
    }

    fn fail(&self, kind: SemanticErrorKind, module: &str, position: Position) -> FatalError {
        self.handler
            .raise_semantic_error(SemanticError::new(kind, module).at_line(position.line))
    }

    /// Register the functions of `program` and resolve its imports.
    fn register_module(&mut self, program: Rc<Program>) -> Result<(), FatalError> {
        let module = program.module_name.as_str();
        if !self.processed.insert(module.to_string()) {
            return Ok(());
        }
        debug!("registering module {module}");
        self.handler.set_current_module(Some(module.to_string()));

        for definition in &program.function_definitions {
            let function = RegisteredFunction::local(Rc::new(definition.clone()));
            if let Err(err) = self.registry.insert(module, function) {
                let err = err.at_line(definition.position.line);
                return Err(self.handler.raise_semantic_error(err));
            }
        }

        let mut pending = Vec::new();
        for (target, directives) in group_by_module(&program.import_directives) {
            // An edge to a module not in the graph yet cannot close a cycle.
            let known = self.dependencies.contains(&target.to_string());
            self.dependencies
                .add_dependency(module.to_string(), target.to_string());
            if known && self.dependencies.build().is_err() {
                return Err(self.fail(
                    SemanticErrorKind::CircularDependency {
                        module: module.to_string(),
                        imported: target.to_string(),
                    },
                    module,
                    directives[0].position,
                ));
            }

            if target == STANDARD_LIBRARY_MODULE {
                for directive in directives {
                    self.import_standard(module, directive)?;
                }
            } else {
                pending.extend(directives);
            }
        }

        while let Some(directive) = pending.pop() {
            self.import_user(module, directive)?;
        }

        self.finished.push(module.to_string());
        Ok(())
    }

    fn import_standard(
        &mut self,
        module: &str,
        directive: &ImportDirective,
    ) -> Result<(), FatalError> {
        let function_name = &directive.function_name;
        let submodule = match &directive.submodule_name {
            Some(submodule) if self.library.has_submodule(submodule) => submodule,
            other => {
                return Err(self.fail(
                    SemanticErrorKind::MissingSubmodule {
                        function: function_name.clone(),
                        submodule: other.clone(),
                    },
                    module,
                    directive.position,
                ));
            }
        };

        let Some(function) = self.library.function(submodule, function_name) else {
            return Err(self.fail(
                SemanticErrorKind::FunctionNotFound {
                    module: format!("{STANDARD_LIBRARY_MODULE}.{submodule}"),
                    function: function_name.clone(),
                },
                module,
                directive.position,
            ));
        };

        let entry = RegisteredFunction::imported(
            FunctionEntry::Standard(function),
            STANDARD_LIBRARY_MODULE,
        );
        self.insert_import(module, entry, directive)
    }

    fn import_user(&mut self, module: &str, directive: &ImportDirective) -> Result<(), FatalError> {
        let target = directive.module_name.as_str();
        if let Some(submodule) = &directive.submodule_name {
            return Err(self.fail(
                SemanticErrorKind::ModuleNotFound(format!("{target}.{submodule}")),
                module,
                directive.position,
            ));
        }

        let program = match self.parsed.get(target) {
            Some(program) => Rc::clone(program),
            None => self.load_module(module, directive)?,
        };
        self.register_module(program)?;
        self.handler.set_current_module(Some(module.to_string()));

        let entry = self
            .registry
            .get(target, &directive.function_name)
            .filter(|function| function.external_module.is_none())
            .map(|function| function.entry.clone());
        let Some(entry) = entry else {
            return Err(self.fail(
                SemanticErrorKind::FunctionNotFound {
                    module: target.to_string(),
                    function: directive.function_name.clone(),
                },
                module,
                directive.position,
            ));
        };
        self.insert_import(module, RegisteredFunction::imported(entry, target), directive)
    }

    fn load_module(
        &mut self,
        module: &str,
        directive: &ImportDirective,
    ) -> Result<Rc<Program>, FatalError> {
        let target = directive.module_name.as_str();
        let stream = match self.provider.open_module(target) {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                return Err(self.fail(
                    SemanticErrorKind::ModuleNotFound(target.to_string()),
                    module,
                    directive.position,
                ));
            }
            Err(err) => {
                let reason = err.to_string();
                self.handler.raise_source_error(err);
                return Err(FatalError::new(reason));
            }
        };
        debug!("loading module {target} imported by {module}");

        let stream = ModuleStream {
            module_name: target.to_string(),
            ..stream
        };
        match self.parse_module(stream)? {
            Some(program) => Ok(program),
            None => Err(self.fail(
                SemanticErrorKind::ModuleCompilation(target.to_string()),
                module,
                directive.position,
            )),
        }
    }

    fn insert_import(
        &mut self,
        module: &str,
        function: RegisteredFunction,
        directive: &ImportDirective,
    ) -> Result<(), FatalError> {
        self.registry
            .insert(module, function)
            .map_err(|err| self.handler.raise_semantic_error(err.at_line(directive.position.line)))
    }

    fn check_bodies(&self) -> Result<(), FatalError> {
        for module in &self.finished {
            let Some(program) = self.parsed.get(module) else {
                continue;
            };
            self.handler.set_current_module(Some(module.clone()));
            for definition in &program.function_definitions {
                check_function(&self.registry, module, definition)
                    .map_err(|err| self.handler.raise_semantic_error(err))?;
            }
        }
        Ok(())
    }

    fn check_entry_point(&self, root_module: &str) -> Result<(), FatalError> {
        let main = match self.registry.get(root_module, ENTRY_POINT) {
            Some(RegisteredFunction {
                entry: FunctionEntry::User(definition),
                external_module: None,
            }) => definition,
            _ => {
                return Err(self.handler.raise_semantic_error(SemanticError::new(
                    SemanticErrorKind::MissingEntryPoint(root_module.to_string()),
                    root_module,
                )));
            }
        };

        let returns_void_or_int = matches!(
            main.return_type,
            ReturnType::Void | ReturnType::Value(DeclarableType::Primitive(PrimitiveType::Int))
        );
        if !main.parameters.is_empty() || !returns_void_or_int {
            return Err(self.fail(
                SemanticErrorKind::InvalidMainSignature,
                root_module,
                main.position,
            ));
        }
        Ok(())
    }
}

/// Import directives grouped by target module, in order of first mention.
fn group_by_module(directives: &[ImportDirective]) -> Vec<(&str, Vec<&ImportDirective>)> {
    let mut groups: Vec<(&str, Vec<&ImportDirective>)> = Vec::new();
    for directive in directives {
        let target = directive.module_name.as_str();
        match groups.iter_mut().find(|(module, _)| *module == target) {
            Some((_, group)) => group.push(directive),
            None => groups.push((target, vec![directive])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::diagnostic::Diagnostic;
    use crate::modules::InMemoryModules;
    use crate::stdlib::BuiltinLibrary;

    fn root(text: &str) -> ModuleStream {
        ModuleStream {
            module_name: "App".to_string(),
            path: None,
            reader: Box::new(Cursor::new(text.as_bytes().to_vec())),
        }
    }

    fn analyze(
        text: &str,
        modules: &InMemoryModules,
        handler: &ErrorHandler,
    ) -> Result<Option<FunctionsRegistry>, FatalError> {
        SemanticAnalyzer::new(handler, CompilerConfig::default(), modules, &BuiltinLibrary)
            .analyze(root(text))
    }

    fn semantic_error(handler: &ErrorHandler) -> SemanticErrorKind {
        handler
            .reports()
            .iter()
            .find_map(|report| match &report.diagnostic {
                Diagnostic::Semantic(err) => Some(err.kind.clone()),
                _ => None,
            })
            .expect("a semantic error")
    }

    #[test]
    fn resolves_standard_and_user_imports() {
        let modules = InMemoryModules::new().with_module(
            "Helpers",
            "import CNull.Converters.IntToString;
             string Twice(int value) { return IntToString(value * 2); }",
        );
        let handler = ErrorHandler::new(10);
        let registry = analyze(
            "import CNull.Console.WriteLine;
             import Helpers.Twice;
             void Main() { WriteLine(Twice(21)); }",
            &modules,
            &handler,
        )
        .expect("no fatal error")
        .expect("registry");

        assert!(!handler.has_errors());
        assert_eq!(registry.root_module(), "App");
        let twice = registry.get("App", "Twice").expect("imported");
        assert_eq!(twice.external_module.as_deref(), Some("Helpers"));
        assert!(registry.get("Helpers", "Twice").is_some());
        assert_eq!(
            registry
                .get("Helpers", "IntToString")
                .and_then(|f| f.external_module.as_deref()),
            Some("CNull")
        );
        assert!(registry.get("App", "IntToString").is_none());
    }

    #[test]
    fn diamond_imports_are_processed_once() {
        let modules = InMemoryModules::new()
            .with_module("Left", "import Base.One; int L() { return One(); }")
            .with_module("Right", "import Base.One; int R() { return One(); }")
            .with_module("Base", "int One() { return 1; }");
        let handler = ErrorHandler::new(10);
        let registry = analyze(
            "import Left.L; import Right.R; int Main() { return L() + R(); }",
            &modules,
            &handler,
        )
        .expect("no fatal error")
        .expect("registry");
        assert_eq!(
            registry.modules().collect::<Vec<_>>(),
            vec!["App", "Base", "Left", "Right"]
        );
    }

    #[test]
    fn circular_imports_are_fatal() {
        let modules = InMemoryModules::new()
            .with_module("First", "import Second.B; void A() { B(); }")
            .with_module("Second", "import First.A; void B() { A(); }");
        let handler = ErrorHandler::new(10);
        let result = analyze("import First.A; void Main() { A(); }", &modules, &handler);
        assert!(result.is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::CircularDependency {
                module: "Second".into(),
                imported: "First".into()
            }
        );
    }

    #[test]
    fn self_import_is_circular() {
        let handler = ErrorHandler::new(10);
        let result = analyze(
            "import App.Main; void Main() { }",
            &InMemoryModules::new(),
            &handler,
        );
        assert!(result.is_err());
        assert!(matches!(
            semantic_error(&handler),
            SemanticErrorKind::CircularDependency { .. }
        ));
    }

    #[test]
    fn missing_module_and_function() {
        let handler = ErrorHandler::new(10);
        let result = analyze(
            "import Nowhere.F; void Main() { }",
            &InMemoryModules::new(),
            &handler,
        );
        assert!(result.is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::ModuleNotFound("Nowhere".into())
        );

        let modules = InMemoryModules::new().with_module("Lib", "void G() { }");
        let handler = ErrorHandler::new(10);
        assert!(analyze("import Lib.F; void Main() { }", &modules, &handler).is_err());
        assert!(matches!(
            semantic_error(&handler),
            SemanticErrorKind::FunctionNotFound { .. }
        ));
    }

    #[test]
    fn standard_library_errors() {
        let handler = ErrorHandler::new(10);
        let source = "import CNull.Write; void Main() { }";
        assert!(analyze(source, &InMemoryModules::new(), &handler).is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::MissingSubmodule {
                function: "Write".into(),
                submodule: None
            }
        );

        let handler = ErrorHandler::new(10);
        assert!(
            analyze(
                "import CNull.Console.Beep; void Main() { }",
                &InMemoryModules::new(),
                &handler
            )
            .is_err()
        );
        assert!(matches!(
            semantic_error(&handler),
            SemanticErrorKind::FunctionNotFound { .. }
        ));
    }

    #[test]
    fn imported_module_with_syntax_errors() {
        let modules = InMemoryModules::new().with_module("Broken", "void F( { }");
        let handler = ErrorHandler::new(10);
        assert!(analyze("import Broken.F; void Main() { }", &modules, &handler).is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::ModuleCompilation("Broken".into())
        );
        assert_eq!(handler.reports()[0].module.as_deref(), Some("Broken"));
    }

    #[test]
    fn root_with_syntax_errors_yields_no_registry() {
        let handler = ErrorHandler::new(10);
        let result = analyze("void Main() { int = 1; }", &InMemoryModules::new(), &handler);
        assert_eq!(result, Ok(None));
        assert_eq!(handler.error_count(), 1);
    }

    #[test]
    fn import_clashing_with_local_function() {
        let modules = InMemoryModules::new().with_module("Lib", "void Run() { }");
        let handler = ErrorHandler::new(10);
        let source = "import Lib.Run; void Run() { } void Main() { }";
        assert!(analyze(source, &modules, &handler).is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::FunctionRedefinition("Run".into())
        );
    }

    #[test]
    fn entry_point_checks() {
        let handler = ErrorHandler::new(10);
        assert!(analyze("void Start() { }", &InMemoryModules::new(), &handler).is_err());
        assert_eq!(
            semantic_error(&handler),
            SemanticErrorKind::MissingEntryPoint("App".into())
        );

        let handler = ErrorHandler::new(10);
        let source = "string Main() { return \"\"; }";
        assert!(analyze(source, &InMemoryModules::new(), &handler).is_err());
        assert_eq!(semantic_error(&handler), SemanticErrorKind::InvalidMainSignature);

        let handler = ErrorHandler::new(10);
        assert!(analyze("void Main(int a) { }", &InMemoryModules::new(), &handler).is_err());
        assert_eq!(semantic_error(&handler), SemanticErrorKind::InvalidMainSignature);
    }

    #[test]
    fn type_errors_in_imported_modules_are_reported() {
        let modules = InMemoryModules::new().with_module("Lib", "int F() { return true; }");
        let handler = ErrorHandler::new(10);
        assert!(analyze("import Lib.F; void Main() { F(); }", &modules, &handler).is_err());
        let reports = handler.reports();
        assert_eq!(reports[0].module.as_deref(), Some("Lib"));
        assert!(matches!(
            semantic_error(&handler),
            SemanticErrorKind::TypeMismatch { .. }
        ));
    }
}
