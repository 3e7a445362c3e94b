//! Lexical macro environments.
//!
//! An [`Environment`] maps names to [`Binding`]s and borrows its parent; it
//! never owns it. Lookup walks outward until a binding is found or an
//! explicit [`Binding::Unbound`] shadows the outer scopes. Bindings live in a
//! persistent `im::HashMap`, so extending a module environment with a new
//! macro is a cheap copy that leaves the original untouched.

use crate::ast::{AstNode, Span};
use crate::macros::template::MacroTemplate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// TRANSFORMERS
// ============================================================================

/// Failure raised by a transformer body, e.g. a malformed argument shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The unevaluated pieces of a macro invocation.
#[derive(Debug, Clone, Copy)]
pub struct MacroCall<'a> {
    pub name: &'a str,
    pub args: &'a [AstNode],
    pub span: Span,
}

/// A native transformer: receives the call and the environment it occurs in,
/// returns the replacement form.
pub type MacroFn = fn(&MacroCall<'_>, &Environment<'_>) -> Result<AstNode, TransformError>;

/// A macro definition, either a native function or a user template.
#[derive(Clone)]
pub enum MacroTransformer {
    Native(MacroFn),
    Template(Arc<MacroTemplate>),
}

impl std::fmt::Debug for MacroTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacroTransformer::Native(_) => f.write_str("Native(<fn>)"),
            MacroTransformer::Template(t) => f.debug_tuple("Template").field(&t.name).finish(),
        }
    }
}

impl MacroTransformer {
    pub fn invoke(
        &self,
        call: &MacroCall<'_>,
        env: &Environment<'_>,
    ) -> Result<AstNode, TransformError> {
        match self {
            MacroTransformer::Native(func) => func(call, env),
            MacroTransformer::Template(template) => template.instantiate(call, env),
        }
    }
}

/// Where a macro came from; recorded in expansion traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroProvenance {
    /// Built into the root environment
    Core,
    /// Defined in the module being compiled
    User,
    /// Exported by an imported module
    Imported,
}

#[derive(Debug, Clone)]
pub struct MacroBinding {
    pub transformer: MacroTransformer,
    pub provenance: MacroProvenance,
}

/// What a name means inside an environment.
#[derive(Debug, Clone)]
pub enum Binding {
    Macro(MacroBinding),
    /// Macro-time value; only the quasiquote evaluator reads these.
    Value(AstNode),
    /// Hides any binding of the same name in outer scopes.
    Unbound,
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Environment<'p> {
    bindings: im::HashMap<String, Binding>,
    parent: Option<&'p Environment<'p>>,
}

impl<'p> Environment<'p> {
    /// An empty environment with no parent.
    pub fn new() -> Self {
        Self {
            bindings: im::HashMap::new(),
            parent: None,
        }
    }

    /// A fresh scope whose lookups fall back to `self`.
    pub fn child(&self) -> Environment<'_> {
        Environment {
            bindings: im::HashMap::new(),
            parent: Some(self),
        }
    }

    /// Adds a binding to this scope. Only used while a scope is being built.
    pub fn define(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    /// Returns a copy of this scope with one more binding.
    pub fn with_binding(&self, name: impl Into<String>, binding: Binding) -> Self {
        Self {
            bindings: self.bindings.update(name.into(), binding),
            parent: self.parent,
        }
    }

    pub fn define_macro(
        &mut self,
        name: impl Into<String>,
        transformer: MacroTransformer,
        provenance: MacroProvenance,
    ) {
        self.define(
            name,
            Binding::Macro(MacroBinding {
                transformer,
                provenance,
            }),
        );
    }

    pub fn bind_value(&mut self, name: impl Into<String>, value: AstNode) {
        self.define(name, Binding::Value(value));
    }

    /// Walks the scope chain outward.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            match env.bindings.get(name) {
                Some(Binding::Unbound) => return None,
                Some(binding) => return Some(binding),
                None => scope = env.parent,
            }
        }
        None
    }

    pub fn lookup_macro(&self, name: &str) -> Option<&MacroBinding> {
        match self.lookup(name)? {
            Binding::Macro(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn lookup_value(&self, name: &str) -> Option<&AstNode> {
        match self.lookup(name)? {
            Binding::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_macro(&self, name: &str) -> bool {
        self.lookup_macro(name).is_some()
    }

    /// Every visible macro name with its provenance, sorted by name.
    pub fn macro_names(&self) -> Vec<(String, MacroProvenance)> {
        let mut seen = std::collections::BTreeMap::new();
        let mut scope = Some(self);
        while let Some(env) = scope {
            for (name, binding) in env.bindings.iter() {
                if seen.contains_key(name) {
                    continue;
                }
                let entry = match binding {
                    Binding::Macro(m) => Some(m.provenance),
                    _ => None,
                };
                seen.insert(name.clone(), entry);
            }
            scope = env.parent;
        }
        seen.into_iter()
            .filter_map(|(name, prov)| prov.map(|p| (name, p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
        Ok(AstNode::list(call.args.to_vec(), call.span))
    }

    #[test]
    fn lookup_walks_parents_and_respects_unbound() {
        let mut root = Environment::new();
        root.define_macro("m", MacroTransformer::Native(identity), MacroProvenance::Core);
        root.bind_value("x", AstNode::number(1.0, Span::default()));

        let mut child = root.child();
        assert!(child.is_macro("m"));
        child.define("m", Binding::Unbound);
        assert!(!child.is_macro("m"));
        assert!(root.is_macro("m"));
        assert!(child.lookup_value("x").is_some());
    }

    #[test]
    fn with_binding_leaves_original_untouched() {
        let env = Environment::new();
        let extended = env.with_binding("y", Binding::Value(AstNode::nil(Span::default())));
        assert!(env.lookup("y").is_none());
        assert!(extended.lookup_value("y").is_some());
    }

    #[test]
    fn macro_names_hide_shadowed_entries() {
        let mut root = Environment::new();
        root.define_macro("a", MacroTransformer::Native(identity), MacroProvenance::Core);
        root.define_macro("b", MacroTransformer::Native(identity), MacroProvenance::Core);
        let mut child = root.child();
        child.define("b", Binding::Unbound);
        child.define_macro("c", MacroTransformer::Native(identity), MacroProvenance::User);
        let names: Vec<String> = child.macro_names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
    }
}
