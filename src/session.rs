//! Incremental compilation for interactive hosts.
//!
//! A [`Session`] keeps one module environment alive across inputs: macros
//! defined by one input expand in the next, definitions stay callable and
//! imported modules stay cached.

use crate::compile::{collect_embedded, compile_forms, ModuleCompiler};
use crate::config::CompileOptions;
use crate::errors::{HqlError, SourceContext};
use crate::lower::ir::{EmbeddedModule, IrNode};
use crate::lower::Lowerer;
use crate::macros::{self, Environment, ExpansionStep, Expander, MacroProvenance};
use crate::modules::cache::ModuleCache;
use crate::modules::loader::{FsLoader, SourceLoader};
use crate::modules::specifier::ModuleKey;
use crate::syntax::parse;
use std::collections::HashSet;
use std::path::PathBuf;

/// IR produced by one input.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub body: Vec<IrNode>,
    pub diagnostics: Vec<HqlError>,
    /// Local modules first imported by this input.
    pub embedded: Vec<EmbeddedModule>,
    pub trace: Vec<ExpansionStep>,
}

pub struct Session {
    options: CompileOptions,
    loader: Box<dyn SourceLoader>,
    cache: ModuleCache,
    env: Environment<'static>,
    lowerer: Lowerer,
    /// Pseudo file that relative imports resolve against.
    origin: PathBuf,
    /// Modules already handed to the host in an earlier output.
    emitted: HashSet<ModuleKey>,
    inputs: usize,
}

impl Session {
    pub fn new(options: CompileOptions) -> Self {
        let origin = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("<session>.hql");
        Self::with_loader(options, FsLoader, origin)
    }

    pub fn with_loader(
        options: CompileOptions,
        loader: impl SourceLoader + 'static,
        origin: impl Into<PathBuf>,
    ) -> Self {
        let origin = origin.into();
        let source = SourceContext::from_file(origin.display().to_string(), "");
        let lowerer = Lowerer::new(source, options.pure_builtins.iter().cloned());
        let emitted = HashSet::from([ModuleKey::from_path(&origin)]);
        Self {
            options,
            loader: Box::new(loader),
            cache: ModuleCache::new(),
            env: macros::root().child(),
            lowerer,
            origin,
            emitted,
            inputs: 0,
        }
    }

    /// Compiles one input against everything defined so far.
    pub fn eval(&mut self, text: &str) -> Result<SessionOutput, HqlError> {
        self.inputs += 1;
        let source = SourceContext::from_file(format!("<input {}>", self.inputs), text);
        let forms = parse(text, &source)?;
        self.lowerer.set_source(source.clone());

        let mut expander = Expander::new(source.clone())
            .with_max_depth(self.options.max_expansion_depth)
            .with_trace(self.options.trace_expansion);
        let known = self.cache.completion_order().len();
        let mut diagnostics = Vec::new();

        let mut host = ModuleCompiler {
            loader: &*self.loader,
            options: &self.options,
            cache: &mut self.cache,
        };
        let body = compile_forms(
            &mut host,
            &forms,
            &self.origin,
            &source,
            &mut self.env,
            &mut expander,
            &mut self.lowerer,
            &mut diagnostics,
        )?;

        let fresh: Vec<ModuleKey> = self.cache.completion_order()[known..].to_vec();
        let embedded = collect_embedded(&self.cache, &mut self.emitted, &fresh);

        Ok(SessionOutput {
            body,
            diagnostics,
            embedded,
            trace: expander.take_trace(),
        })
    }

    /// Macros visible to the next input.
    pub fn macros(&self) -> Vec<(String, MacroProvenance)> {
        self.env.macro_names()
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::ir::IrLiteral;
    use crate::modules::loader::MemoryLoader;

    fn session() -> Session {
        let loader = MemoryLoader::new()
            .with_file("/app/util.hql", "(defn twice [x] (* x 2))\n(export twice)")
            .with_file(
                "/app/b.hql",
                "(import [twice] from \"./util.hql\")\n(defn quad [x] (twice (twice x)))\n(export quad)",
            );
        Session::with_loader(CompileOptions::default(), loader, "/app/repl.hql")
    }

    fn keys(output: &SessionOutput) -> Vec<&str> {
        output.embedded.iter().map(|m| m.key.as_str()).collect()
    }

    #[test]
    fn macros_and_definitions_persist_between_inputs() {
        let mut session = session();
        session.eval("(defmacro sq [x] `(* ~x ~x))").unwrap();
        session.eval("(def three 3)").unwrap();
        let out = session.eval("(sq three)").unwrap();
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.body,
            vec![IrNode::call(
                IrNode::identifier("*"),
                vec![IrNode::identifier("three"), IrNode::identifier("three")]
            )]
        );
        assert!(session
            .macros()
            .contains(&("sq".to_string(), MacroProvenance::User)));
    }

    #[test]
    fn imports_are_embedded_once() {
        let mut session = session();
        let first = session.eval(r#"(import [twice] from "./util.hql")"#).unwrap();
        assert_eq!(keys(&first), vec!["/app/util.hql"]);
        let second = session.eval(r#"(import [twice] from "./util.hql") (twice 4)"#).unwrap();
        assert!(second.embedded.is_empty());
        assert_eq!(session.cache().reads(), 1);
        assert!(matches!(
            second.body.last(),
            Some(IrNode::Call { args, .. }) if args == &vec![IrNode::literal(IrLiteral::Number(4.0))]
        ));
    }

    #[test]
    fn shared_dependency_is_not_embedded_again() {
        let mut session = session();
        let first = session.eval(r#"(import [twice] from "./util.hql")"#).unwrap();
        assert_eq!(keys(&first), vec!["/app/util.hql"]);
        let second = session.eval(r#"(import [quad] from "./b.hql") (quad 1)"#).unwrap();
        assert!(second.diagnostics.is_empty());
        assert_eq!(keys(&second), vec!["/app/b.hql"]);
        assert_eq!(session.cache().reads(), 2);
    }
}
