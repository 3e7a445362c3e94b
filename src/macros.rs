//! # HQL Macro Expansion System
//!
//! This module is responsible for the purely syntactic transformation of the
//! AST before lowering. Macros receive their arguments unevaluated and return
//! a replacement form; the expander repeats this until no macro call remains.
//!
//! ## Core Principles
//!
//! - **Syntactic Only**: macros see nodes, never runtime values.
//! - **Lexical**: macro names resolve through an [`Environment`] chain rooted
//!   at the built-in core macros.
//! - **Inspectable**: expansion can be traced step by step, each step tagged
//!   with where its macro came from.
//!
//! ## Layout
//!
//! - [`env`]: environments, bindings and transformers
//! - [`expander`]: the fixed-point expander
//! - [`quasiquote`]: quasiquote templates with nesting levels
//! - [`eval`]: the macro-time evaluator used by user macros
//! - [`template`]: `defmacro` parsing and instantiation
//! - [`std`]: core macros of the root environment

pub mod env;
pub mod eval;
pub mod expander;
pub mod quasiquote;
pub mod std;
pub mod template;

pub use env::{
    Binding, Environment, MacroBinding, MacroCall, MacroFn, MacroProvenance, MacroTransformer,
    TransformError,
};
pub use expander::{expand, ExpansionStep, Expander, TopLevel, MAX_EXPANSION_DEPTH};
pub use quasiquote::eval_quasiquote;
pub use template::{is_macro_definition, parse_macro_definition, MacroTemplate};

use once_cell::sync::Lazy;

static ROOT: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    self::std::register_std_macros(&mut env);
    env
});

/// The root environment holding the core macros. Built on first use and
/// never mutated afterwards.
pub fn root() -> &'static Environment<'static> {
    &ROOT
}
