//! The `hql` command-line interface.
//!
//! Parses arguments, loads compile options and dispatches to the library.
//! Every handler returns an [`ExitCode`]-style status; errors are rendered
//! as miette reports on stderr.

use crate::cli::args::{Command, HqlArgs};
use crate::codegen::{CodeGenerator, IrJsonRenderer};
use crate::compile::Compiler;
use crate::config::CompileOptions;
use crate::errors::{print_error, HqlError, SourceContext};
use crate::macros;
use crate::syntax::parse;
use clap::Parser;
use std::path::Path;
use walkdir::WalkDir;

pub mod args;
pub mod output;

/// Status returned to the shell.
pub type ExitCode = i32;

/// Parses the process arguments and runs the command.
pub fn run() -> ExitCode {
    let args = HqlArgs::parse();
    init_logging(args.verbose);
    execute(args)
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("HQL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn execute(args: HqlArgs) -> ExitCode {
    let options = match &args.config {
        Some(path) => match CompileOptions::load(path) {
            Ok(options) => options,
            Err(error) => {
                print_error(error);
                return 2;
            }
        },
        None => CompileOptions::default(),
    };

    let result = match args.command {
        Command::Compile {
            file,
            target,
            pretty,
            output,
        } => {
            let mut options = options;
            if let Some(target) = target {
                options.target = target;
            }
            handle_compile(options, &file, pretty, output.as_deref())
        }
        Command::Expand { file } => handle_expand(options, &file),
        Command::Macrotrace { file } => handle_macrotrace(options, &file),
        Command::Ast { file, json } => handle_ast(&file, json),
        Command::Check { path } => handle_check(options, &path),
        Command::ListMacros => {
            output::print_macros(&macros::root().macro_names());
            Ok(0)
        }
    };

    result.unwrap_or_else(|error| {
        print_error(error);
        1
    })
}

fn handle_compile(
    options: CompileOptions,
    file: &Path,
    pretty: bool,
    out: Option<&Path>,
) -> Result<ExitCode, HqlError> {
    let target = options.target;
    let compiled = Compiler::new(options).compile_file(file)?;
    if let Some(summary) = compiled.failure_summary() {
        output::print_diagnostics(&compiled.diagnostics);
        output::print_summary(&summary, false);
        return Ok(1);
    }

    let rendered = IrJsonRenderer { pretty }.render(&compiled.ir, target)?;
    match out {
        Some(path) => std::fs::write(path, rendered + "\n")
            .map_err(|e| HqlError::io(path.display().to_string(), &e))?,
        None => println!("{}", rendered),
    }
    Ok(0)
}

fn handle_expand(options: CompileOptions, file: &Path) -> Result<ExitCode, HqlError> {
    let expanded = Compiler::new(options).expand_file(file)?;
    for form in &expanded.forms {
        println!("{}", form.value.pretty());
    }
    output::print_diagnostics(&expanded.diagnostics);
    Ok(if expanded.diagnostics.is_empty() { 0 } else { 1 })
}

fn handle_macrotrace(options: CompileOptions, file: &Path) -> Result<ExitCode, HqlError> {
    let expanded = Compiler::new(options).expand_file(file)?;
    output::print_trace(&expanded.trace);
    output::print_diagnostics(&expanded.diagnostics);
    Ok(if expanded.diagnostics.is_empty() { 0 } else { 1 })
}

fn handle_ast(file: &Path, json: bool) -> Result<ExitCode, HqlError> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| HqlError::io(file.display().to_string(), &e))?;
    let source = SourceContext::from_file(file.display().to_string(), text.as_str());
    let forms = parse(&text, &source)?;
    if json {
        let rendered = serde_json::to_string_pretty(&forms).map_err(|e| HqlError::Config {
            message: e.to_string(),
        })?;
        println!("{}", rendered);
    } else {
        for form in &forms {
            println!("{}", form.value.pretty());
        }
    }
    Ok(0)
}

fn handle_check(options: CompileOptions, path: &Path) -> Result<ExitCode, HqlError> {
    let files: Vec<_> = if path.is_dir() {
        WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "hql"))
            .map(|e| e.into_path())
            .collect()
    } else {
        vec![path.to_path_buf()]
    };

    let compiler = Compiler::new(options);
    let mut failed = 0;
    for file in &files {
        let display = file.display().to_string();
        match compiler.compile_file(file) {
            Ok(compiled) if compiled.is_clean() => output::print_status(&display, 0),
            Ok(compiled) => {
                failed += 1;
                output::print_status(&display, compiled.diagnostics.len());
                output::print_diagnostics(&compiled.diagnostics);
            }
            Err(error) => {
                failed += 1;
                output::print_status(&display, 1);
                print_error(error);
            }
        }
    }

    let summary = format!("{} file(s) checked, {} failed", files.len(), failed);
    output::print_summary(&summary, failed == 0);
    Ok(if failed == 0 { 0 } else { 1 })
}
