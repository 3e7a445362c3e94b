//! Macro expansion to a fixed point.
//!
//! A list whose head names a macro in the current environment is replaced by
//! the transformer's output, which is expanded again. Other lists have their
//! children expanded. `quote` and `quasiquote` forms are data and are left
//! alone, as are vectors, maps and sets; the lowerer expands collection
//! elements when it reaches them.
//!
//! ## Recursion and Expansion
//!
//! Every replacement is re-expanded one level deeper. Once the depth reaches
//! the configured limit the expansion is reported as non-terminating instead
//! of overflowing the stack.

use crate::ast::{AstNode, Expr};
use crate::errors::{ExpansionFailure, HqlError, SourceContext};
use crate::macros::env::{
    Binding, Environment, MacroBinding, MacroCall, MacroProvenance, MacroTransformer,
};
use crate::macros::template::{is_macro_definition, parse_macro_definition};
use serde::Serialize;
use std::sync::Arc;

/// Default bound on nested macro invocations.
pub const MAX_EXPANSION_DEPTH: usize = 128;

/// One macro invocation, as recorded for `hql macrotrace`.
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionStep {
    pub macro_name: String,
    pub provenance: MacroProvenance,
    pub depth: usize,
    pub input: AstNode,
    pub output: AstNode,
}

/// Result of expanding one top-level form.
#[derive(Debug, Clone)]
pub enum TopLevel {
    /// An ordinary form, fully expanded.
    Form(AstNode),
    /// A `defmacro` that was registered in the module environment.
    MacroDefinition(String),
}

pub struct Expander {
    source: SourceContext,
    max_depth: usize,
    trace: Option<Vec<ExpansionStep>>,
    expansions: usize,
}

// =============================
// Public API for macro expansion
// =============================

impl Expander {
    pub fn new(source: SourceContext) -> Self {
        Self {
            source,
            max_depth: MAX_EXPANSION_DEPTH,
            trace: None,
            expansions: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Records every invocation; read back with [`Expander::take_trace`].
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled.then(Vec::new);
        self
    }

    /// Number of macro invocations performed so far.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn source(&self) -> &SourceContext {
        &self.source
    }

    /// Expands every macro call in `node`.
    pub fn expand(&mut self, node: &AstNode, env: &Environment<'_>) -> Result<AstNode, HqlError> {
        self.expand_at(node, env, 0)
    }

    /// Expands a top-level form of a module.
    ///
    /// Macro definitions, whether written directly or produced by another
    /// macro, are registered in `env` and produce no form.
    pub fn expand_top_level(
        &mut self,
        node: &AstNode,
        env: &mut Environment<'_>,
    ) -> Result<TopLevel, HqlError> {
        let expanded = if is_macro_definition(node) {
            node.clone()
        } else {
            self.expand(node, env)?
        };

        if !is_macro_definition(&expanded) {
            return Ok(TopLevel::Form(expanded));
        }

        let template = parse_macro_definition(&expanded, &self.source)?;
        let name = template.name.clone();
        tracing::debug!(macro_name = %name, file = %self.source.name, "registered user macro");
        *env = env.with_binding(
            name.clone(),
            Binding::Macro(MacroBinding {
                transformer: MacroTransformer::Template(Arc::new(template)),
                provenance: MacroProvenance::User,
            }),
        );
        Ok(TopLevel::MacroDefinition(name))
    }

    fn expand_at(
        &mut self,
        node: &AstNode,
        env: &Environment<'_>,
        depth: usize,
    ) -> Result<AstNode, HqlError> {
        let Expr::List(items) = &*node.value else {
            return Ok(node.clone());
        };
        let Some(head) = items.first().and_then(|h| h.as_symbol()) else {
            return self.expand_children(node, items, env, depth);
        };
        if head == "quote" || head == "quasiquote" {
            return Ok(node.clone());
        }
        let Some(binding) = env.lookup_macro(head) else {
            return self.expand_children(node, items, env, depth);
        };

        if depth >= self.max_depth {
            return Err(self.source.expansion_error(
                head,
                ExpansionFailure::NonTerminating {
                    limit: self.max_depth,
                },
                node.span,
            ));
        }

        let call = MacroCall {
            name: head,
            args: &items[1..],
            span: node.span,
        };
        let replacement = binding.transformer.invoke(&call, env).map_err(|e| {
            self.source
                .expansion_error(head, ExpansionFailure::TransformerThrew(e.0), node.span)
        })?;

        self.expansions += 1;
        tracing::trace!(macro_name = head, depth, "{} => {}", node, replacement);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(ExpansionStep {
                macro_name: head.to_string(),
                provenance: binding.provenance,
                depth,
                input: node.clone(),
                output: replacement.clone(),
            });
        }

        self.expand_at(&replacement, env, depth + 1)
    }

    fn expand_children(
        &mut self,
        node: &AstNode,
        items: &[AstNode],
        env: &Environment<'_>,
        depth: usize,
    ) -> Result<AstNode, HqlError> {
        let expanded = items
            .iter()
            .map(|item| self.expand_at(item, env, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AstNode::list(expanded, node.span))
    }
}

/// Expands `node` with default settings and an anonymous source.
pub fn expand(node: &AstNode, env: &Environment<'_>) -> Result<AstNode, HqlError> {
    Expander::new(SourceContext::fallback("macro expansion")).expand(node, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::root;
    use crate::syntax::parse_str;

    fn expand_src(src: &str) -> Result<String, HqlError> {
        let node = parse_str(src).unwrap().remove(0);
        expand(&node, root()).map(|n| n.to_string())
    }

    #[test]
    fn non_macro_forms_are_untouched() {
        assert_eq!(expand_src("(f 1 (g 2))").unwrap(), "(f 1 (g 2))");
        assert_eq!(expand_src("'(when a b)").unwrap(), "(quote (when a b))");
        assert_eq!(expand_src("[(when a b)]").unwrap(), "[(when a b)]");
    }

    #[test]
    fn replacements_are_expanded_again() {
        assert_eq!(
            expand_src("(when (and a b) c)").unwrap(),
            "(if (if a b a) c nil)"
        );
    }

    #[test]
    fn expansion_is_idempotent() {
        let once = expand_src("(cond (a (unless b 1)) (else (-> x f)))").unwrap();
        let twice = expand_src(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn self_reproducing_macro_hits_the_depth_limit() {
        let src = "(defmacro forever () `(forever))";
        let forms = parse_str(src).unwrap();
        let mut env = root().child();
        let mut expander =
            Expander::new(SourceContext::from_file("t.hql", src)).with_max_depth(16);
        expander.expand_top_level(&forms[0], &mut env).unwrap();

        let call = parse_str("(forever)").unwrap().remove(0);
        let err = expander.expand(&call, &env).unwrap_err();
        match err {
            HqlError::MacroExpansion { reason, .. } => {
                assert_eq!(reason, ExpansionFailure::NonTerminating { limit: 16 })
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trace_records_provenance() {
        let src = "(defmacro double (x) `(* ~x 2))";
        let forms = parse_str(src).unwrap();
        let mut env = root().child();
        let mut expander = Expander::new(SourceContext::from_file("t.hql", src)).with_trace(true);
        expander.expand_top_level(&forms[0], &mut env).unwrap();

        let call = parse_str("(when ok (double 5))").unwrap().remove(0);
        let out = expander.expand(&call, &env).unwrap();
        assert_eq!(out.to_string(), "(if ok (* 5 2) nil)");

        let trace = expander.take_trace();
        let names: Vec<_> = trace
            .iter()
            .map(|s| (s.macro_name.as_str(), s.provenance))
            .collect();
        assert_eq!(
            names,
            vec![("when", MacroProvenance::Core), ("double", MacroProvenance::User)]
        );
    }
}
