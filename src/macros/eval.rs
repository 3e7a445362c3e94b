//! Macro-time evaluator.
//!
//! Template macro bodies run here, over syntax rather than runtime values:
//! arguments arrive unevaluated and every result is itself a node. The
//! evaluator knows a handful of special forms and a fixed set of data
//! helpers; everything else is an error raised back to the expander as a
//! [`TransformError`].

use crate::ast::{AstNode, Expr, Literal, Span};
use crate::macros::env::{Environment, TransformError};
use crate::macros::quasiquote;
use std::cell::Cell;

/// Helpers callable from a macro body.
pub const MACRO_TIME_BUILTINS: &[&str] = &[
    "list", "vector", "cons", "concat", "first", "rest", "second", "nth", "count", "empty?",
    "symbol?", "list?", "vector?", "string?", "number?", "nil?", "=", "not=", "+", "-", "*", "/",
    "<", ">", "<=", ">=", "str", "symbol", "keyword", "name", "gensym", "throw",
];

pub struct MacroEvaluator {
    seed: usize,
    counter: Cell<usize>,
}

impl MacroEvaluator {
    /// Gensyms are derived from the call site so repeated compiles agree.
    pub fn new(call_site: Span) -> Self {
        Self {
            seed: call_site.start,
            counter: Cell::new(0),
        }
    }

    pub fn eval(&self, node: &AstNode, env: &Environment<'_>) -> Result<AstNode, TransformError> {
        match &*node.value {
            Expr::Literal(_) => Ok(node.clone()),
            Expr::Symbol(name) => env
                .lookup_value(name)
                .cloned()
                .ok_or_else(|| TransformError::new(format!("unbound symbol '{}' at macro time", name))),
            Expr::Vector(items) => Ok(AstNode::vector(self.eval_all(items, env)?, node.span)),
            Expr::Set(items) => Ok(AstNode::new(Expr::Set(self.eval_all(items, env)?), node.span)),
            Expr::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((self.eval(k, env)?, self.eval(v, env)?)))
                    .collect::<Result<Vec<_>, TransformError>>()?;
                Ok(AstNode::new(Expr::Map(entries), node.span))
            }
            Expr::List(items) if items.is_empty() => Ok(node.clone()),
            Expr::List(items) => self.eval_list(node, items, env),
        }
    }

    fn eval_all(
        &self,
        items: &[AstNode],
        env: &Environment<'_>,
    ) -> Result<Vec<AstNode>, TransformError> {
        items.iter().map(|item| self.eval(item, env)).collect()
    }

    fn eval_list(
        &self,
        node: &AstNode,
        items: &[AstNode],
        env: &Environment<'_>,
    ) -> Result<AstNode, TransformError> {
        let Some(head) = items[0].as_symbol() else {
            return Err(TransformError::new(format!(
                "cannot call {} at macro time",
                items[0].value.kind_name()
            )));
        };
        let args = &items[1..];

        match head {
            "quote" => single_arg("quote", args).cloned(),
            "quasiquote" => {
                let template = single_arg("quasiquote", args)?;
                quasiquote::process(template, 1, env, self)
            }
            "if" => {
                if !(2..=3).contains(&args.len()) {
                    return Err(TransformError::new("if expects a test, a then branch and an optional else branch"));
                }
                if self.eval(&args[0], env)?.is_truthy() {
                    self.eval(&args[1], env)
                } else if let Some(otherwise) = args.get(2) {
                    self.eval(otherwise, env)
                } else {
                    Ok(AstNode::nil(node.span))
                }
            }
            "do" => self.eval_body(args, env, node.span),
            "let" => self.eval_let(args, env, node.span),
            _ if MACRO_TIME_BUILTINS.contains(&head) => {
                let values = self.eval_all(args, env)?;
                self.apply_builtin(head, &values, node.span)
            }
            _ => Err(TransformError::new(format!(
                "'{}' is not available at macro time",
                head
            ))),
        }
    }

    fn eval_body(
        &self,
        body: &[AstNode],
        env: &Environment<'_>,
        span: Span,
    ) -> Result<AstNode, TransformError> {
        let mut result = AstNode::nil(span);
        for form in body {
            result = self.eval(form, env)?;
        }
        Ok(result)
    }

    fn eval_let(
        &self,
        args: &[AstNode],
        env: &Environment<'_>,
        span: Span,
    ) -> Result<AstNode, TransformError> {
        let Some(bindings) = args.first().and_then(|b| b.as_sequence()) else {
            return Err(TransformError::new("let expects a binding vector"));
        };
        if bindings.len() % 2 != 0 {
            return Err(TransformError::new("let bindings must come in name/value pairs"));
        }
        let mut scope = env.child();
        for pair in bindings.chunks(2) {
            let Some(name) = pair[0].as_symbol() else {
                return Err(TransformError::new("let binding name must be a symbol"));
            };
            let value = self.eval(&pair[1], &scope)?;
            scope.bind_value(name, value);
        }
        self.eval_body(&args[1..], &scope, span)
    }

    pub(crate) fn gensym(&self, prefix: &str) -> String {
        let n = self.counter.get();
        self.counter.set(n + 1);
        format!("{}__{}_{}", prefix, self.seed, n)
    }

    // =============================
    // Builtins
    // =============================

    fn apply_builtin(
        &self,
        name: &str,
        args: &[AstNode],
        span: Span,
    ) -> Result<AstNode, TransformError> {
        match name {
            "list" => Ok(AstNode::list(args.to_vec(), span)),
            "vector" => Ok(AstNode::vector(args.to_vec(), span)),
            "cons" => {
                let [head, tail] = exact::<2>(name, args)?;
                let mut items = vec![head.clone()];
                items.extend(sequence_items(tail)?.iter().cloned());
                Ok(AstNode::list(items, span))
            }
            "concat" => {
                let mut items = Vec::new();
                for arg in args {
                    items.extend(sequence_items(arg)?.iter().cloned());
                }
                Ok(AstNode::list(items, span))
            }
            "first" => {
                let [seq] = exact::<1>(name, args)?;
                Ok(sequence_items(seq)?
                    .first()
                    .cloned()
                    .unwrap_or_else(|| AstNode::nil(span)))
            }
            "second" => {
                let [seq] = exact::<1>(name, args)?;
                Ok(sequence_items(seq)?
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| AstNode::nil(span)))
            }
            "rest" => {
                let [seq] = exact::<1>(name, args)?;
                let items = sequence_items(seq)?;
                Ok(AstNode::list(items.iter().skip(1).cloned().collect(), span))
            }
            "nth" => {
                let [seq, index] = exact::<2>(name, args)?;
                let index = as_number(index)?;
                if index < 0.0 || index.fract() != 0.0 {
                    return Err(TransformError::new(format!("nth: invalid index {}", index)));
                }
                Ok(sequence_items(seq)?
                    .get(index as usize)
                    .cloned()
                    .unwrap_or_else(|| AstNode::nil(span)))
            }
            "count" => {
                let [value] = exact::<1>(name, args)?;
                let count = match &*value.value {
                    Expr::Literal(Literal::String(s)) => s.chars().count(),
                    Expr::Map(entries) => entries.len(),
                    Expr::Set(items) => items.len(),
                    _ => sequence_items(value)?.len(),
                };
                Ok(AstNode::number(count as f64, span))
            }
            "empty?" => {
                let [value] = exact::<1>(name, args)?;
                Ok(AstNode::boolean(sequence_items(value)?.is_empty(), span))
            }
            "symbol?" | "list?" | "vector?" | "string?" | "number?" | "nil?" => {
                let [value] = exact::<1>(name, args)?;
                let result = match (name, &*value.value) {
                    ("symbol?", Expr::Symbol(_)) => true,
                    ("list?", Expr::List(_)) => true,
                    ("vector?", Expr::Vector(_)) => true,
                    ("string?", Expr::Literal(Literal::String(_))) => true,
                    ("number?", Expr::Literal(Literal::Number(_))) => true,
                    ("nil?", Expr::Literal(Literal::Nil)) => true,
                    _ => false,
                };
                Ok(AstNode::boolean(result, span))
            }
            "=" | "not=" => {
                let all_equal = args
                    .windows(2)
                    .all(|pair| pair[0].value.pretty() == pair[1].value.pretty());
                Ok(AstNode::boolean(all_equal == (name == "="), span))
            }
            "+" | "-" | "*" | "/" => arithmetic(name, args, span),
            "<" | ">" | "<=" | ">=" => {
                let numbers = args.iter().map(as_number).collect::<Result<Vec<_>, _>>()?;
                let holds = numbers.windows(2).all(|w| match name {
                    "<" => w[0] < w[1],
                    ">" => w[0] > w[1],
                    "<=" => w[0] <= w[1],
                    _ => w[0] >= w[1],
                });
                Ok(AstNode::boolean(holds, span))
            }
            "str" => Ok(AstNode::string(
                args.iter().map(display_text).collect::<String>(),
                span,
            )),
            "symbol" => {
                let [value] = exact::<1>(name, args)?;
                Ok(AstNode::symbol(display_text(value), span))
            }
            "keyword" => {
                let [value] = exact::<1>(name, args)?;
                Ok(AstNode::literal(Literal::Keyword(display_text(value)), span))
            }
            "name" => {
                let [value] = exact::<1>(name, args)?;
                Ok(AstNode::string(display_text(value), span))
            }
            "gensym" => {
                let prefix = args.first().map_or_else(|| "g".to_string(), display_text);
                Ok(AstNode::symbol(self.gensym(&prefix), span))
            }
            "throw" => Err(TransformError::new(
                args.iter().map(display_text).collect::<Vec<_>>().join(" "),
            )),
            _ => Err(TransformError::new(format!("unknown macro-time builtin '{}'", name))),
        }
    }
}

fn single_arg<'a>(form: &str, args: &'a [AstNode]) -> Result<&'a AstNode, TransformError> {
    match args {
        [only] => Ok(only),
        _ => Err(TransformError::new(format!(
            "{} expects exactly 1 argument, got {}",
            form,
            args.len()
        ))),
    }
}

fn exact<'a, const N: usize>(
    name: &str,
    args: &'a [AstNode],
) -> Result<&'a [AstNode; N], TransformError> {
    args.try_into().map_err(|_| {
        TransformError::new(format!(
            "{} expects {} argument{}, got {}",
            name,
            N,
            if N == 1 { "" } else { "s" },
            args.len()
        ))
    })
}

/// Elements of a list or vector; `nil` is the empty sequence.
pub(crate) fn sequence_items(node: &AstNode) -> Result<&[AstNode], TransformError> {
    match &*node.value {
        Expr::List(items) | Expr::Vector(items) => Ok(items),
        Expr::Literal(Literal::Nil) => Ok(&[]),
        other => Err(TransformError::new(format!(
            "expected a list or vector, got {}",
            other.kind_name()
        ))),
    }
}

fn as_number(node: &AstNode) -> Result<f64, TransformError> {
    match &*node.value {
        Expr::Literal(Literal::Number(n)) => Ok(*n),
        other => Err(TransformError::new(format!(
            "expected a number, got {}",
            other.kind_name()
        ))),
    }
}

/// Text of a node as `str` sees it: strings unquoted, nil empty.
fn display_text(node: &AstNode) -> String {
    match &*node.value {
        Expr::Literal(Literal::String(s)) => s.clone(),
        Expr::Literal(Literal::Keyword(k)) => k.clone(),
        Expr::Literal(Literal::Nil) => String::new(),
        other => other.pretty(),
    }
}

fn arithmetic(op: &str, args: &[AstNode], span: Span) -> Result<AstNode, TransformError> {
    let numbers = args.iter().map(as_number).collect::<Result<Vec<_>, _>>()?;
    let result: f64 = match (op, numbers.as_slice()) {
        ("+", ns) => ns.iter().sum(),
        ("*", ns) => ns.iter().product(),
        (_, []) => {
            return Err(TransformError::new(format!("{} expects at least 1 argument", op)))
        }
        ("-", [only]) => -only,
        ("/", [only]) => divide(1.0, *only)?,
        ("-", [first, rest @ ..]) => rest.iter().fold(*first, |acc, n| acc - n),
        (_, [first, rest @ ..]) => rest
            .iter()
            .try_fold(*first, |acc, n| divide(acc, *n))?,
    };
    Ok(AstNode::number(result, span))
}

fn divide(lhs: f64, rhs: f64) -> Result<f64, TransformError> {
    if rhs == 0.0 {
        return Err(TransformError::new("division by zero at macro time"));
    }
    Ok(lhs / rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_str;

    fn eval_str(src: &str) -> Result<AstNode, TransformError> {
        let node = parse_str(src).unwrap().remove(0);
        let env = Environment::new();
        MacroEvaluator::new(Span::default()).eval(&node, &env)
    }

    #[test]
    fn data_helpers() {
        assert_eq!(eval_str("(cons 1 '(2 3))").unwrap().to_string(), "(1 2 3)");
        assert_eq!(eval_str("(concat '(a) '[b] nil)").unwrap().to_string(), "(a b)");
        assert_eq!(eval_str("(rest '(a b c))").unwrap().to_string(), "(b c)");
        assert_eq!(eval_str("(count [1 2 3])").unwrap().to_string(), "3");
        assert_eq!(eval_str("(str \"a\" 1 :k)").unwrap().to_string(), "\"a1k\"");
    }

    #[test]
    fn special_forms() {
        assert_eq!(eval_str("(let [x 2 y (* x 3)] (+ x y))").unwrap().to_string(), "8");
        assert_eq!(eval_str("(if nil 1 2)").unwrap().to_string(), "2");
        assert_eq!(eval_str("(if (symbol? 'a) 'yes)").unwrap().to_string(), "yes");
    }

    #[test]
    fn gensym_is_deterministic() {
        let env = Environment::new();
        let node = parse_str("(list (gensym \"t\") (gensym \"t\"))").unwrap().remove(0);
        let a = MacroEvaluator::new(Span::new(7, 9)).eval(&node, &env).unwrap();
        let b = MacroEvaluator::new(Span::new(7, 9)).eval(&node, &env).unwrap();
        assert_eq!(a.to_string(), "(t__7_0 t__7_1)");
        assert_eq!(a, b);
    }

    #[test]
    fn errors_surface_as_transform_errors() {
        assert_eq!(
            eval_str("(throw \"bad\" 'input)").unwrap_err().0,
            "bad input"
        );
        assert!(eval_str("undefined-thing").unwrap_err().0.contains("unbound symbol"));
        assert!(eval_str("(println 1)").unwrap_err().0.contains("not available"));
    }
}
