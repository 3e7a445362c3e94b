//! Call lowering: named arguments, default substitution and dot chains.

use crate::ast::AstNode;
use crate::errors::HqlError;
use crate::lower::ir::IrNode;
use crate::lower::lowerer::{lower_dotted, LowerCx, Lowerer};
use crate::lower::params::FnSignature;

/// Placeholder argument that asks for the parameter's default.
pub const PLACEHOLDER: &str = "_";

/// `.name` in method position.
fn method_name(node: &AstNode) -> Option<&str> {
    node.as_symbol()
        .and_then(|s| s.strip_prefix('.'))
        .filter(|m| !m.is_empty() && !m.contains('.'))
}

/// `name:` in argument position.
fn named_key(node: &AstNode) -> Option<&str> {
    node.as_symbol()
        .and_then(|s| s.strip_suffix(':'))
        .filter(|k| !k.is_empty())
}

/// `obj.method` in head position, split at the last dot.
fn dotted_head(name: &str) -> Option<(&str, &str)> {
    if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return None;
    }
    name.rsplit_once('.')
}

impl Lowerer {
    pub(crate) fn lower_call(
        &mut self,
        node: &AstNode,
        items: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let head = &items[0];
        let args = &items[1..];

        // (.method obj args...)
        if let Some(method) = method_name(head) {
            let Some((receiver, rest)) = args.split_first() else {
                return Err(self.source.malformed(
                    method,
                    format!("(.{} target args...) needs a target", method),
                    node.span,
                ));
            };
            let target = self.lower_expr(receiver, cx)?;
            return Ok(IrNode::MethodCall {
                target: Box::new(target),
                method: method.to_string(),
                args: self.lower_body(rest, cx)?,
            });
        }

        // (xs .filter f .map g)
        if args.first().and_then(method_name).is_some() {
            return self.lower_chain(head, args, cx);
        }

        // (obj.method args...)
        if let Some(name) = head.as_symbol() {
            if !self.is_local(name) && !self.scope.definitions.contains(name) {
                if let Some((receiver, method)) = dotted_head(name) {
                    return Ok(IrNode::MethodCall {
                        target: Box::new(lower_dotted(receiver)),
                        method: method.to_string(),
                        args: self.lower_body(args, cx)?,
                    });
                }
            }
        }

        let callee_name = head.as_symbol().unwrap_or("<expression>").to_string();
        let callee = self.lower_expr(head, cx)?;
        let signature = head
            .as_symbol()
            .filter(|name| !self.is_local(name))
            .and_then(|name| self.scope.signatures.get(name))
            .cloned();

        let is_named = args.iter().any(|a| named_key(a).is_some());
        if is_named {
            return self.lower_named_call(node, &callee_name, callee, args, signature.as_ref(), cx);
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            if self.is_placeholder(arg) {
                let default = signature.as_ref().and_then(|s| s.call_site_default(i));
                lowered.push(default.unwrap_or_else(IrNode::undefined));
            } else {
                lowered.push(self.lower_expr(arg, cx)?);
            }
        }
        if let Some(signature) = &signature {
            let given = lowered.len();
            for i in args.len()..signature.params.len() {
                match signature.call_site_default(i) {
                    Some(default) => lowered.push(default),
                    None => break,
                }
            }
            // Omitted trailing arguments already get the callee's default.
            while lowered.len() > given && lowered.last() == Some(&IrNode::undefined()) {
                lowered.pop();
            }
        }
        Ok(IrNode::call(callee, lowered))
    }

    fn is_placeholder(&self, node: &AstNode) -> bool {
        node.as_symbol() == Some(PLACEHOLDER) && !self.is_local(PLACEHOLDER)
    }

    fn lower_named_call(
        &mut self,
        node: &AstNode,
        callee_name: &str,
        callee: IrNode,
        args: &[AstNode],
        signature: Option<&FnSignature>,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        if args.len() % 2 != 0 || args.iter().step_by(2).any(|a| named_key(a).is_none()) {
            return Err(self.source.ambiguous_arguments(callee_name, node.span));
        }

        let mut named_args: Vec<(String, IrNode)> = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks(2) {
            let key = named_key(&pair[0]).unwrap_or_default();
            if let Some(signature) = signature {
                if signature.position_of(key).is_none() {
                    return Err(self.source.malformed(
                        callee_name,
                        format!("'{}' has no parameter named '{}'", callee_name, key),
                        pair[0].span,
                    ));
                }
            }
            if named_args.iter().any(|(k, _)| k == key) {
                return Err(self.source.malformed(
                    callee_name,
                    format!("argument '{}' given twice", key),
                    pair[0].span,
                ));
            }
            let value = if self.is_placeholder(&pair[1]) {
                signature
                    .and_then(|s| s.position_of(key).and_then(|i| s.call_site_default(i)))
                    .unwrap_or_else(IrNode::undefined)
            } else {
                self.lower_expr(&pair[1], cx)?
            };
            named_args.push((key.to_string(), value));
        }

        if let Some(signature) = signature {
            for (i, param) in signature.params.iter().enumerate() {
                if named_args.iter().any(|(k, _)| k == param) {
                    continue;
                }
                if signature.has_literal_default(i) {
                    if let Some(default) = signature.call_site_default(i) {
                        named_args.push((param.clone(), default));
                    }
                }
            }
        }

        Ok(IrNode::Call {
            callee: Box::new(callee),
            args: Vec::new(),
            named_args,
        })
    }

    /// Each `.name` segment calls a method on the result so far with the
    /// arguments up to the next segment.
    fn lower_chain(
        &mut self,
        receiver: &AstNode,
        segments: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let mut current = self.lower_expr(receiver, cx)?;
        let mut i = 0;
        while i < segments.len() {
            let Some(method) = method_name(&segments[i]) else {
                return Err(self.source.malformed(
                    "method chain",
                    format!("expected .method, got {}", segments[i].value.pretty()),
                    segments[i].span,
                ));
            };
            let end = segments[i + 1..]
                .iter()
                .position(|s| method_name(s).is_some())
                .map_or(segments.len(), |p| i + 1 + p);
            let args = self.lower_body(&segments[i + 1..end], cx)?;
            current = IrNode::MethodCall {
                target: Box::new(current),
                method: method.to_string(),
                args,
            };
            i = end;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Span};

    fn sym(s: &str) -> AstNode {
        AstNode::symbol(s, Span::default())
    }

    #[test]
    fn recognizes_call_syntax() {
        assert_eq!(method_name(&sym(".map")), Some("map"));
        assert_eq!(method_name(&sym(".")), None);
        assert_eq!(method_name(&sym("a.b")), None);
        assert_eq!(named_key(&sym("x:")), Some("x"));
        assert_eq!(named_key(&sym(":")), None);
        assert_eq!(dotted_head("console.log"), Some(("console", "log")));
        assert_eq!(dotted_head("a.b.c"), Some(("a.b", "c")));
        assert_eq!(dotted_head("plain"), None);
        assert!(matches!(&*sym("x").value, Expr::Symbol(_)));
    }
}
