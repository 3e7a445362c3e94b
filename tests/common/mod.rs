//! Shared helpers for the integration tests.

#![allow(dead_code)]

use hql::lower::IrNode;
use hql::modules::MemoryLoader;
use hql::{CompileOptions, CompiledModule, Compiler, HqlError};
use std::path::Path;

pub const ENTRY: &str = "/app/main.hql";

/// Compiles `entry` out of an in-memory module tree.
pub fn compile_files(files: &[(&str, &str)], entry: &str) -> Result<CompiledModule, HqlError> {
    compile_files_with(files, entry, CompileOptions::default())
}

pub fn compile_files_with(
    files: &[(&str, &str)],
    entry: &str,
    options: CompileOptions,
) -> Result<CompiledModule, HqlError> {
    let mut loader = MemoryLoader::new();
    for (path, text) in files {
        loader.insert(path, *text);
    }
    Compiler::with_loader(options, loader).compile_file(Path::new(entry))
}

/// Compiles a single module that imports nothing local.
pub fn compile_str(src: &str) -> Result<CompiledModule, HqlError> {
    compile_files(&[(ENTRY, src)], ENTRY)
}

/// Body of a module that must compile without diagnostics.
pub fn lower_ok(src: &str) -> Vec<IrNode> {
    let compiled = compile_str(src).unwrap_or_else(|e| panic!("compile failed: {e}"));
    assert!(
        compiled.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        compiled
            .diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    );
    compiled.ir.body
}

pub fn num(n: f64) -> IrNode {
    IrNode::literal(hql::lower::IrLiteral::Number(n))
}

pub fn ident(name: &str) -> IrNode {
    IrNode::identifier(name)
}
