//! Function parameter lists.
//!
//! `[a b = 10 & more]`: plain names, `name = default` pairs and a trailing
//! rest parameter. Lists `(a b)` are accepted as well as vectors.

use crate::ast::AstNode;
use crate::lower::ir::IrNode;
use serde::Serialize;
use std::collections::HashSet;

/// A parsed parameter list with its defaults still as source forms.
#[derive(Debug, Clone)]
pub struct ParamList {
    pub params: Vec<ParamSpec>,
    pub rest: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<AstNode>,
}

/// What callers need to know about a function: parameter names and
/// lowered defaults, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FnSignature {
    pub params: Vec<String>,
    pub defaults: Vec<Option<IrNode>>,
    pub rest: Option<String>,
}

impl FnSignature {
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    pub fn default_at(&self, index: usize) -> Option<&IrNode> {
        self.defaults.get(index).and_then(Option::as_ref)
    }

    /// The value a caller passes for an omitted parameter: literal defaults
    /// are copied, other defaults become `undefined` so the callee's own
    /// default applies. `None` when the parameter has no default.
    pub fn call_site_default(&self, index: usize) -> Option<IrNode> {
        self.default_at(index).map(|default| match default {
            IrNode::Literal { .. } => default.clone(),
            _ => IrNode::undefined(),
        })
    }

    /// True if the default of `index` is copied to call sites.
    pub fn has_literal_default(&self, index: usize) -> bool {
        matches!(self.default_at(index), Some(IrNode::Literal { .. }))
    }
}

impl ParamList {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.rest.as_deref())
    }
}

/// Parses a parameter list. Errors are plain messages; callers attach the
/// form and span.
pub fn parse_params(node: &AstNode) -> Result<ParamList, String> {
    let Some(items) = node.as_sequence() else {
        return Err(format!(
            "parameters must be a vector or list, got {}",
            node.value.kind_name()
        ));
    };

    let mut params = Vec::new();
    let mut rest = None;
    let mut seen = HashSet::new();
    let mut i = 0;

    while i < items.len() {
        let Some(name) = items[i].as_symbol() else {
            return Err(format!(
                "parameter must be a symbol, got {}",
                items[i].value.kind_name()
            ));
        };

        if name == "&" {
            let Some(rest_name) = items.get(i + 1).and_then(|n| n.as_symbol()) else {
                return Err("'&' must be followed by a rest parameter name".to_string());
            };
            if i + 2 != items.len() {
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

        let has_default = items.get(i + 1).and_then(|n| n.as_symbol()) == Some("=");
        if has_default {
            let Some(default) = items.get(i + 2) else {
                return Err(format!("parameter '{}' is missing its default value", name));
            };
            params.push(ParamSpec {
                name: name.to_string(),
                default: Some(default.clone()),
            });
            i += 3;
        } else {
            params.push(ParamSpec {
                name: name.to_string(),
                default: None,
            });
            i += 1;
        }
    }

    Ok(ParamList { params, rest })
}
