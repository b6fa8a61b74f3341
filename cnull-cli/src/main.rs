use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cnull_core::compiler::compile_file_with;
use cnull_core::{CompilerConfig, FileSystemModules, Interpreter, StdConsole};
use log::{LevelFilter, debug};

/// Compile and run a C? program.
#[derive(Parser, Debug)]
#[command(name = "cnull", version, about, long_about = None)]
struct Cli {
    /// Root module of the program
    #[arg(value_name = "FILE")]
    input: PathBuf,

    #[arg(long, value_name = "PATH", help = "TOML file with compiler limits")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "N",
        help = "Abort after more than N lexical or syntax errors"
    )]
    max_errors: Option<usize>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory searched for imported modules (defaults to the directory of FILE)"
    )]
    module_dir: Option<PathBuf>,

    #[arg(long, help = "Stop after semantic analysis")]
    check: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    execute(cli)
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    if let Some(max_errors) = cli.max_errors {
        config.max_errors_count = max_errors;
    }
    Ok(config)
}

fn module_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.module_dir {
        return dir.clone();
    }
    match cli.input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let modules = FileSystemModules::new(module_dir(&cli));
    debug!("module directory: {}", modules.root().display());

    let compilation = compile_file_with(&cli.input, &modules, &config)
        .with_context(|| format!("failed to compile {}", cli.input.display()))?;
    for report in &compilation.reports {
        eprintln!("{report}");
    }
    let Some(registry) = compilation.registry else {
        if let Some(fatal) = compilation.aborted {
            eprintln!("{fatal}");
        }
        bail!(
            "compilation failed with {} error(s)",
            compilation.reports.len()
        );
    };

    if cli.check {
        println!("OK");
        return Ok(ExitCode::SUCCESS);
    }

    let result = Interpreter::new(&registry, StdConsole, &config)
        .run()
        .context("program terminated with an error")?;
    // Only the low byte reaches the parent process.
    Ok(ExitCode::from(result.unwrap_or(0) as u8))
}
