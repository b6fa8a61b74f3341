use std::fs;
use std::path::Path;

use cnull_core::diagnostic::{Diagnostic, SemanticErrorKind, SourceError};
use cnull_core::registry::FunctionEntry;
use cnull_core::{
    CompilerConfig, CoreError, InMemoryModules, Interpreter, QueuedConsole, compile_file,
    compile_source, run_file,
};
use tempfile::tempdir;

const SUM_PROGRAM: &str = "\
import CNull.Console.Write;
import CNull.Console.ReadLine;
import CNull.Converters.StringToInt;

void Main() {
    Write(\"Result: \" + Sum());
}

int Sum() {
    int a = StringToInt(ReadLine());
    int b = StringToInt(ReadLine());
    return a + b;
}
";

fn write_module(dir: &Path, file: &str, text: &str) {
    if let Some(parent) = dir.join(file).parent() {
        fs::create_dir_all(parent).expect("create module dir");
    }
    fs::write(dir.join(file), text).expect("write module");
}

fn semantic_kinds(reports: &[cnull_core::Report]) -> Vec<SemanticErrorKind> {
    reports
        .iter()
        .filter_map(|report| match &report.diagnostic {
            Diagnostic::Semantic(err) => Some(err.kind.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn sum_program_registers_and_runs() {
    let config = CompilerConfig::default();
    let compilation = compile_source("Program", SUM_PROGRAM, &InMemoryModules::new(), &config);
    assert!(compilation.reports.is_empty(), "{:?}", compilation.reports);
    let registry = compilation.registry.expect("registry");

    for name in ["Main", "Sum"] {
        let function = registry.get("Program", name).expect(name);
        assert!(matches!(function.entry, FunctionEntry::User(_)));
        assert_eq!(function.external_module, None);
    }
    for name in ["Write", "ReadLine", "StringToInt"] {
        let function = registry.get("Program", name).expect(name);
        assert!(matches!(function.entry, FunctionEntry::Standard(_)));
        assert_eq!(function.external_module.as_deref(), Some("CNull"));
    }

    let mut interpreter = Interpreter::new(&registry, QueuedConsole::new(["14", "25"]), &config);
    assert_eq!(interpreter.run().expect("run"), None);
    assert!(interpreter.console().output().contains("39"));
}

#[test]
fn project_on_disk_resolves_nested_modules() {
    let dir = tempdir().expect("tempdir");
    write_module(
        dir.path(),
        "main.cnull",
        "import LeftSide.Left;\nimport RightSide.Right;\n\
         int Main() { return Left() + Right(); }",
    );
    write_module(
        dir.path(),
        "left-side.cnull",
        "import Base.Value;\nint Left() { return Value() + 1; }",
    );
    write_module(
        dir.path(),
        "nested/right_side.cnull",
        "import Base.Value;\nint Right() { return Value() * 2; }",
    );
    write_module(dir.path(), "nested/deeper/base.cnull", "int Value() { return 10; }");

    let compilation =
        compile_file(dir.path().join("main.cnull"), &CompilerConfig::default()).expect("compile");
    let registry = compilation.registry.expect("registry");
    assert_eq!(registry.root_module(), "Main");
    let modules: Vec<&str> = registry.modules().collect();
    assert_eq!(modules, vec!["Base", "LeftSide", "Main", "RightSide"]);
    assert_eq!(
        registry.get("LeftSide", "Value").and_then(|f| f.external_module.as_deref()),
        Some("Base")
    );

    let mut console = QueuedConsole::default();
    let result =
        run_file(dir.path().join("main.cnull"), &CompilerConfig::default(), &mut console)
            .expect("run");
    assert_eq!(result, Some(31));
}

#[test]
fn circular_imports_on_disk_are_rejected() {
    let dir = tempdir().expect("tempdir");
    write_module(dir.path(), "main.cnull", "import Ping.Ping;\nvoid Main() { Ping(); }");
    write_module(dir.path(), "ping.cnull", "import Pong.Pong;\nvoid Ping() { Pong(); }");
    write_module(dir.path(), "pong.cnull", "import Ping.Ping;\nvoid Pong() { Ping(); }");

    let compilation =
        compile_file(dir.path().join("main.cnull"), &CompilerConfig::default()).expect("compile");
    assert!(!compilation.succeeded());
    assert!(compilation.aborted.is_some());
    assert!(matches!(
        semantic_kinds(&compilation.reports).as_slice(),
        [SemanticErrorKind::CircularDependency { .. }]
    ));
}

#[test]
fn ambiguous_module_files_abort_the_import() {
    let dir = tempdir().expect("tempdir");
    write_module(dir.path(), "main.cnull", "import MyUtil.Helper;\nvoid Main() { Helper(); }");
    write_module(dir.path(), "my-util.cnull", "void Helper() { }");
    write_module(dir.path(), "nested/my_util.cnull", "void Helper() { }");

    let compilation =
        compile_file(dir.path().join("main.cnull"), &CompilerConfig::default()).expect("compile");
    assert!(compilation.aborted.is_some());
    assert!(compilation.reports.iter().any(|report| matches!(
        &report.diagnostic,
        Diagnostic::Source(SourceError::AmbiguousModule { name, paths })
            if name == "MyUtil" && paths.len() == 2
    )));
}

#[test]
fn broken_imported_module_reports_its_own_errors() {
    let dir = tempdir().expect("tempdir");
    write_module(dir.path(), "main.cnull", "import Util.Helper;\nvoid Main() { Helper(); }");
    write_module(dir.path(), "util.cnull", "void Helper() { int x = ; }");

    let compilation =
        compile_file(dir.path().join("main.cnull"), &CompilerConfig::default()).expect("compile");
    assert!(!compilation.succeeded());
    assert!(
        compilation
            .reports
            .iter()
            .any(|report| report.module.as_deref() == Some("Util")
                && matches!(report.diagnostic, Diagnostic::Compilation(_)))
    );
    assert_eq!(
        semantic_kinds(&compilation.reports),
        vec![SemanticErrorKind::ModuleCompilation("Util".into())]
    );
}

#[test]
fn thrown_errors_are_caught() {
    let source = "\
import CNull.Console.Write;

void Main() {
    try {
        Fail();
    } catch message {
        Write(message);
    }
}

void Fail() {
    throw \"boom\";
}
";
    let config = CompilerConfig::default();
    let compilation = compile_source("Program", source, &InMemoryModules::new(), &config);
    let registry = compilation.registry.expect("registry");
    let mut interpreter = Interpreter::new(&registry, QueuedConsole::default(), &config);
    interpreter.run().expect("run");
    assert_eq!(interpreter.into_console().output(), "boom");
}

#[test]
fn run_file_reports_compilation_failure() {
    let dir = tempdir().expect("tempdir");
    write_module(dir.path(), "main.cnull", "void Main() { Undefined(); }");
    let mut console = QueuedConsole::default();
    let err = run_file(dir.path().join("main.cnull"), &CompilerConfig::default(), &mut console)
        .expect_err("semantic error");
    assert!(matches!(err, CoreError::CompilationFailed(1)));
}
