use std::io::Cursor;
use std::path::Path;

use log::{info, warn};

use crate::config::CompilerConfig;
use crate::diagnostic::{ErrorHandler, FatalError, Report};
use crate::error::CoreError;
use crate::interpreter::{Console, Interpreter};
use crate::modules::{FileSystemModules, ModuleProvider, ModuleStream};
use crate::registry::FunctionsRegistry;
use crate::semantics::SemanticAnalyzer;
use crate::stdlib::BuiltinLibrary;

/// Outcome of compiling one program.
#[derive(Debug)]
pub struct Compilation {
    /// Present only when the whole program compiled cleanly.
    pub registry: Option<FunctionsRegistry>,
    pub reports: Vec<Report>,
    /// Why the compilation stopped early, if it did.
    pub aborted: Option<FatalError>,
}

impl Compilation {
    pub fn succeeded(&self) -> bool {
        self.registry.is_some()
    }
}

/// Compile the program rooted at `root`, resolving imports with `provider`.
pub fn compile_stream(
    root: ModuleStream,
    provider: &dyn ModuleProvider,
    config: &CompilerConfig,
) -> Compilation {
    let handler = ErrorHandler::new(config.max_errors_count);
    let library = BuiltinLibrary;
    let root_module = root.module_name.clone();

    let (registry, aborted) =
        match SemanticAnalyzer::new(&handler, *config, provider, &library).analyze(root) {
            Ok(registry) => (registry, None),
            Err(fatal) => {
                warn!("{fatal}");
                (None, Some(fatal))
            }
        };

    let reports = handler.take_reports();
    match &registry {
        Some(registry) => info!(
            "compiled {root_module}: {} function(s) in {} module(s)",
            registry.len(),
            registry.modules().count()
        ),
        None => info!("{root_module} failed to compile with {} error(s)", reports.len()),
    }
    Compilation {
        registry,
        reports,
        aborted,
    }
}

pub fn compile_source(
    module_name: &str,
    text: &str,
    provider: &dyn ModuleProvider,
    config: &CompilerConfig,
) -> Compilation {
    let root = ModuleStream {
        module_name: module_name.to_string(),
        path: None,
        reader: Box::new(Cursor::new(text.as_bytes().to_vec())),
    };
    compile_stream(root, provider, config)
}

/// Compile a source file, looking up imported modules with `provider`.
pub fn compile_file_with(
    path: impl AsRef<Path>,
    provider: &dyn ModuleProvider,
    config: &CompilerConfig,
) -> Result<Compilation, CoreError> {
    let root = FileSystemModules::open_path(path)?;
    Ok(compile_stream(root, provider, config))
}

/// Compile a source file. Imported modules are searched for next to it.
pub fn compile_file(
    path: impl AsRef<Path>,
    config: &CompilerConfig,
) -> Result<Compilation, CoreError> {
    let path = path.as_ref();
    let root_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    compile_file_with(path, &FileSystemModules::new(root_dir), config)
}

/// Compile and run a source file. Returns the integer result of `Main`.
pub fn run_file(
    path: impl AsRef<Path>,
    config: &CompilerConfig,
    console: &mut dyn Console,
) -> Result<Option<i32>, CoreError> {
    let compilation = compile_file(path, config)?;
    let Some(registry) = compilation.registry else {
        if let Some(fatal) = compilation.aborted {
            if compilation.reports.is_empty() {
                return Err(fatal.into());
            }
        }
        return Err(CoreError::CompilationFailed(compilation.reports.len()));
    };
    Ok(Interpreter::new(&registry, console, config).run()?)
}
