//! HQL compiler front end.
//!
//! Source text goes through the [`syntax`] reader, the [`macros`] expander,
//! the [`modules`] resolver and the [`lower`]er, producing an
//! [`IrModule`](lower::IrModule) for a [`codegen::CodeGenerator`].
//! [`compile::Compiler`] runs the whole pipeline; [`session::Session`] runs it
//! incrementally for interactive hosts.

pub use crate::compile::{compile_module, CompileStats, CompiledModule, Compiler, ExpandedModule};
pub use crate::config::{CompileOptions, TargetDialect};
pub use crate::errors::{HqlError, SourceContext};

pub mod ast;
pub mod cli;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod errors;
pub mod lower;
pub mod macros;
pub mod modules;
pub mod session;
pub mod syntax;
