//! User-defined macros.
//!
//! Parses `(defmacro name (params) body...)` and its alias
//! `(macro name [params] body...)` into a [`MacroTemplate`], and instantiates
//! templates by binding the unevaluated arguments in a child environment and
//! running the body through the macro-time evaluator.

use crate::ast::{AstNode, Span};
use crate::errors::{HqlError, SourceContext};
use crate::macros::env::{Environment, MacroCall, TransformError};
use crate::macros::eval::MacroEvaluator;
use std::collections::HashSet;

/// Head symbols that introduce a macro definition.
pub const MACRO_DEFINITION_FORMS: [&str; 2] = ["defmacro", "macro"];

/// A declarative macro: parameters plus body forms evaluated at expansion time.
#[derive(Debug, Clone)]
pub struct MacroTemplate {
    pub name: String,
    pub params: Vec<String>,
    /// Collects the remaining arguments, written `& rest`.
    pub rest: Option<String>,
    pub body: Vec<AstNode>,
    pub span: Span,
}

// =============================
// Macro Definition Parsing
// =============================

/// Returns true if the given expression is a macro definition form.
pub fn is_macro_definition(expr: &AstNode) -> bool {
    expr.head_symbol()
        .is_some_and(|head| MACRO_DEFINITION_FORMS.contains(&head))
}

/// Parses a macro definition AST node into a [`MacroTemplate`].
pub fn parse_macro_definition(
    expr: &AstNode,
    source: &SourceContext,
) -> Result<MacroTemplate, HqlError> {
    let Some(items) = expr.as_list() else {
        return Err(source.malformed("defmacro", "must be a list", expr.span));
    };
    let form = items.first().and_then(|h| h.as_symbol()).unwrap_or("defmacro");
    if items.len() < 3 {
        return Err(source.malformed(
            form,
            format!(
                "expected ({} name (params) body...), got {} element(s)",
                form,
                items.len()
            ),
            expr.span,
        ));
    }
    let Some(name) = items[1].as_symbol() else {
        return Err(source.malformed(form, "macro name must be a symbol", items[1].span));
    };
    let Some(param_nodes) = items[2].as_sequence() else {
        return Err(source.malformed(
            form,
            "parameter list must be a list or vector",
            items[2].span,
        ));
    };

    let (params, rest) = parse_macro_params(param_nodes)
        .map_err(|msg| source.malformed(form, msg, items[2].span))?;

    Ok(MacroTemplate {
        name: name.to_string(),
        params,
        rest,
        body: items[3..].to_vec(),
        span: expr.span,
    })
}

fn parse_macro_params(nodes: &[AstNode]) -> Result<(Vec<String>, Option<String>), String> {
    let mut params = Vec::new();
    let mut rest = None;
    let mut seen = HashSet::new();
    let mut iter = nodes.iter();

    while let Some(node) = iter.next() {
        let Some(name) = node.as_symbol() else {
            return Err(format!("parameter must be a symbol, got {}", node.value.kind_name()));
        };
        if name == "&" {
            let Some(rest_name) = iter.next().and_then(|n| n.as_symbol()) else {
                return Err("'&' must be followed by a rest parameter name".to_string());
            };
            if iter.next().is_some() {
                return Err("rest parameter must be the last parameter".to_string());
            }
            if !seen.insert(rest_name.to_string()) {
                return Err(format!("duplicate parameter name '{}'", rest_name));
            }
            rest = Some(rest_name.to_string());
            break;
        }
        if !seen.insert(name.to_string()) {
            return Err(format!("duplicate parameter name '{}'", name));
        }
        params.push(name.to_string());
    }

    Ok((params, rest))
}

// =============================
// Instantiation
// =============================

impl MacroTemplate {
    /// Expands one call of this macro.
    pub fn instantiate(
        &self,
        call: &MacroCall<'_>,
        env: &Environment<'_>,
    ) -> Result<AstNode, TransformError> {
        self.check_arity(call.args.len())?;

        let mut scope = env.child();
        for (param, arg) in self.params.iter().zip(call.args) {
            scope.bind_value(param.clone(), arg.clone());
        }
        if let Some(rest) = &self.rest {
            let extra = call.args[self.params.len()..].to_vec();
            scope.bind_value(rest.clone(), AstNode::list(extra, call.span));
        }

        let evaluator = MacroEvaluator::new(call.span);
        let mut result = AstNode::nil(call.span);
        for form in &self.body {
            result = evaluator.eval(form, &scope)?;
        }
        Ok(result)
    }

    fn check_arity(&self, args_len: usize) -> Result<(), TransformError> {
        let required = self.params.len();
        if args_len < required || (args_len > required && self.rest.is_none()) {
            let expected = if self.rest.is_some() {
                format!("at least {}", required)
            } else {
                format!("exactly {}", required)
            };
            return Err(TransformError::new(format!(
                "macro '{}' expects {} argument{}, got {}",
                self.name,
                expected,
                if required == 1 { "" } else { "s" },
                args_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_str;

    fn template(src: &str) -> MacroTemplate {
        let node = parse_str(src).unwrap().remove(0);
        parse_macro_definition(&node, &SourceContext::from_file("t.hql", src)).unwrap()
    }

    #[test]
    fn parses_params_and_rest() {
        let t = template("(defmacro my-when (test & body) `(if ~test (do ~@body) nil))");
        assert_eq!(t.name, "my-when");
        assert_eq!(t.params, vec!["test".to_string()]);
        assert_eq!(t.rest.as_deref(), Some("body"));
        assert_eq!(t.body.len(), 1);
    }

    #[test]
    fn vector_params_via_macro_alias() {
        let t = template("(macro twice [x] `(do ~x ~x))");
        assert_eq!(t.params, vec!["x".to_string()]);
    }

    #[test]
    fn rejects_duplicate_params() {
        let src = "(defmacro bad (a a) a)";
        let node = parse_str(src).unwrap().remove(0);
        let err = parse_macro_definition(&node, &SourceContext::from_file("t.hql", src));
        assert!(err.unwrap_err().to_string().contains("duplicate parameter name 'a'"));
    }

    #[test]
    fn arity_is_checked_on_instantiation() {
        let t = template("(defmacro double (x) `(* ~x 2))");
        let env = Environment::new();
        let call = MacroCall {
            name: "double",
            args: &[],
            span: Span::default(),
        };
        let err = t.instantiate(&call, &env).unwrap_err();
        assert_eq!(err.0, "macro 'double' expects exactly 1 argument, got 0");
    }
}
