//! Quasiquote templates with nesting levels.
//!
//! A template is walked at a level that starts at 1. A nested `quasiquote`
//! raises the level and stays in the output as data; `unquote` and
//! `unquote-splicing` are evaluated only at level 1 and otherwise lower the
//! level by one and are kept.

use crate::ast::{AstNode, Expr};
use crate::macros::env::{Environment, TransformError};
use crate::macros::eval::{sequence_items, MacroEvaluator};

/// Processes a quasiquote template against `env`.
///
/// When `node` is itself a `(quasiquote X)` form, `X` is the template.
pub fn eval_quasiquote(
    node: &AstNode,
    level: usize,
    env: &Environment<'_>,
) -> Result<AstNode, TransformError> {
    let evaluator = MacroEvaluator::new(node.span);
    let template = match node.as_list() {
        Some([head, inner]) if head.as_symbol() == Some("quasiquote") => inner,
        _ => node,
    };
    process(template, level.max(1), env, &evaluator)
}

pub(crate) fn process(
    node: &AstNode,
    level: usize,
    env: &Environment<'_>,
    evaluator: &MacroEvaluator,
) -> Result<AstNode, TransformError> {
    match &*node.value {
        Expr::List(items) => match unquote_form(node) {
            Some(("quasiquote", inner)) => {
                let inner = process(inner, level + 1, env, evaluator)?;
                Ok(AstNode::form("quasiquote", [inner], node.span))
            }
            Some(("unquote", inner)) if level == 1 => evaluator.eval(inner, env),
            Some(("unquote-splicing", _)) if level == 1 => Err(TransformError::new(
                "unquote-splicing used outside of a list",
            )),
            Some((head, inner)) => {
                let inner = process(inner, level - 1, env, evaluator)?;
                Ok(AstNode::form(head, [inner], node.span))
            }
            None => Ok(AstNode::list(
                process_items(items, level, env, evaluator)?,
                node.span,
            )),
        },
        Expr::Vector(items) => Ok(AstNode::vector(
            process_items(items, level, env, evaluator)?,
            node.span,
        )),
        Expr::Set(items) => Ok(AstNode::new(
            Expr::Set(process_items(items, level, env, evaluator)?),
            node.span,
        )),
        Expr::Map(entries) => {
            let entries = entries
                .iter()
                .map(|(k, v)| {
                    Ok((
                        process(k, level, env, evaluator)?,
                        process(v, level, env, evaluator)?,
                    ))
                })
                .collect::<Result<Vec<_>, TransformError>>()?;
            Ok(AstNode::new(Expr::Map(entries), node.span))
        }
        Expr::Symbol(_) | Expr::Literal(_) => Ok(node.clone()),
    }
}

fn process_items(
    items: &[AstNode],
    level: usize,
    env: &Environment<'_>,
    evaluator: &MacroEvaluator,
) -> Result<Vec<AstNode>, TransformError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match unquote_form(item) {
            Some(("unquote-splicing", inner)) if level == 1 => {
                let spliced = evaluator.eval(inner, env)?;
                let elements = sequence_items(&spliced).map_err(|_| {
                    TransformError::new(format!(
                        "unquote-splicing expects a list or vector, got {}",
                        spliced.value.kind_name()
                    ))
                })?;
                out.extend(elements.iter().cloned());
            }
            _ => out.push(process(item, level, env, evaluator)?),
        }
    }
    Ok(out)
}

/// Splits `(quasiquote x)`, `(unquote x)` and `(unquote-splicing x)`.
fn unquote_form(node: &AstNode) -> Option<(&'static str, &AstNode)> {
    let [head, inner] = node.as_list()? else {
        return None;
    };
    let head = match head.as_symbol()? {
        "quasiquote" => "quasiquote",
        "unquote" => "unquote",
        "unquote-splicing" => "unquote-splicing",
        _ => return None,
    };
    Some((head, inner))
}
