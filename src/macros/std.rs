//! Core macros of the root environment.
//!
//! Every macro here rewrites its call into the primitive forms the lowerer
//! understands (`if`, `fn`, `def`, `do`) or into other core macros, which the
//! expander then expands in turn.

use crate::ast::{AstNode, Expr, Literal, Span};
use crate::macros::env::{Environment, MacroCall, MacroProvenance, MacroTransformer, TransformError};
use crate::macros::eval::MacroEvaluator;
use std::collections::HashSet;

// ===================================================================================================
// REGISTRY: Standard Macro Registration
// ===================================================================================================

/// Registers all core macros in the given environment.
pub fn register_std_macros(env: &mut Environment<'_>) {
    let core: [(&str, crate::macros::env::MacroFn); 10] = [
        // Definitions and scoping
        ("defn", expand_defn),
        ("let", expand_let),
        // Control flow
        ("cond", expand_cond),
        ("when", expand_when),
        ("unless", expand_unless),
        // Logic
        ("and", expand_and),
        ("or", expand_or),
        ("not", expand_not),
        // Threading
        ("->", expand_thread_first),
        ("->>", expand_thread_last),
    ];
    for (name, func) in core {
        env.define_macro(name, MacroTransformer::Native(func), MacroProvenance::Core);
    }
}

// ===================================================================================================
// HELPERS
// ===================================================================================================

fn expect_min_args(call: &MacroCall<'_>, min: usize) -> Result<(), TransformError> {
    if call.args.len() < min {
        return Err(TransformError::new(format!(
            "{} expects at least {} argument{}, got {}",
            call.name,
            min,
            if min == 1 { "" } else { "s" },
            call.args.len()
        )));
    }
    Ok(())
}

/// `nil` for no forms, the form itself for one, `(do ...)` otherwise.
fn body_form(forms: &[AstNode], span: Span) -> AstNode {
    match forms {
        [] => AstNode::nil(span),
        [only] => only.clone(),
        _ => AstNode::form("do", forms.iter().cloned(), span),
    }
}

fn if_form(test: AstNode, then: AstNode, otherwise: AstNode, span: Span) -> AstNode {
    AstNode::form("if", [test, then, otherwise], span)
}

/// `((fn [param] body) value)`
fn iife(param: AstNode, body: AstNode, value: AstNode, span: Span) -> AstNode {
    let func = AstNode::form("fn", [AstNode::vector(vec![param], span), body], span);
    AstNode::list(vec![func, value], span)
}

fn is_atom(node: &AstNode) -> bool {
    matches!(&*node.value, Expr::Symbol(_) | Expr::Literal(_))
}

// ===================================================================================================
// DEFINITIONS
// ===================================================================================================

/// `(defn name [params] body...)` => `(fn name [params] body...)`
pub fn expand_defn(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    expect_min_args(call, 2)?;
    if call.args[0].as_symbol().is_none() {
        return Err(TransformError::new("defn expects a function name"));
    }
    if call.args[1].as_sequence().is_none() {
        return Err(TransformError::new("defn expects a parameter list or vector"));
    }
    Ok(AstNode::form("fn", call.args.iter().cloned(), call.span))
}

/// `(let name value)` defines a module binding; `(let [a 1 b 2] body...)`
/// opens nested scopes, one immediately-invoked function per binding.
pub fn expand_let(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    expect_min_args(call, 1)?;
    if let [name, value] = call.args {
        if name.as_symbol().is_some() {
            return Ok(AstNode::form("def", [name.clone(), value.clone()], call.span));
        }
    }

    let Some(bindings) = call.args[0].as_sequence() else {
        return Err(TransformError::new(
            "let expects a name and a value, or a binding vector",
        ));
    };
    if bindings.len() % 2 != 0 {
        return Err(TransformError::new("let bindings must come in name/value pairs"));
    }
    if bindings
        .chunks(2)
        .any(|pair| pair[0].as_symbol().is_none())
    {
        return Err(TransformError::new("let binding name must be a symbol"));
    }

    let body = &call.args[1..];
    if bindings.is_empty() {
        return Ok(AstNode::form("do", body.iter().cloned(), call.span));
    }

    let mut result = body_form(body, call.span);
    for pair in bindings.chunks(2).rev() {
        result = iife(pair[0].clone(), result, pair[1].clone(), call.span);
    }
    Ok(result)
}

// ===================================================================================================
// CONTROL FLOW
// ===================================================================================================

fn is_default_test(test: &AstNode) -> bool {
    match &*test.value {
        Expr::Symbol(s) => s == "else",
        Expr::Literal(Literal::Bool(true)) => true,
        Expr::Literal(Literal::Keyword(k)) => k == "else",
        _ => false,
    }
}

/// `(cond (c1 e1) (c2 e2) ... (cn en))` => `(if c1 e1 (if c2 e2 ... en))`
///
/// The final clause supplies the last else branch. A lone clause that is not
/// a default gets a `nil` else branch.
pub fn expand_cond(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    let mut clauses = Vec::with_capacity(call.args.len());
    for clause in call.args {
        match clause.as_sequence() {
            Some([test, body @ ..]) if !body.is_empty() => {
                clauses.push((test.clone(), body_form(body, clause.span)));
            }
            _ => {
                return Err(TransformError::new(format!(
                    "cond clause must be a (test body...) list, got {}",
                    clause
                )))
            }
        }
    }

    let Some((last_test, last_body)) = clauses.pop() else {
        return Ok(AstNode::nil(call.span));
    };
    let mut result = if clauses.is_empty() && !is_default_test(&last_test) {
        if_form(last_test, last_body, AstNode::nil(call.span), call.span)
    } else {
        last_body
    };
    for (test, body) in clauses.into_iter().rev() {
        result = if_form(test, body, result, call.span);
    }
    Ok(result)
}

/// `(when test body...)` => `(if test (do body...) nil)`
pub fn expand_when(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    expect_min_args(call, 1)?;
    let body = body_form(&call.args[1..], call.span);
    Ok(if_form(call.args[0].clone(), body, AstNode::nil(call.span), call.span))
}

/// `(unless test body...)` => `(if test nil (do body...))`
pub fn expand_unless(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    expect_min_args(call, 1)?;
    let body = body_form(&call.args[1..], call.span);
    Ok(if_form(call.args[0].clone(), AstNode::nil(call.span), body, call.span))
}

// ===================================================================================================
// LOGIC
// ===================================================================================================

pub fn expand_not(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    let [value] = call.args else {
        return Err(TransformError::new(format!(
            "not expects exactly 1 argument, got {}",
            call.args.len()
        )));
    };
    Ok(if_form(
        value.clone(),
        AstNode::boolean(false, call.span),
        AstNode::boolean(true, call.span),
        call.span,
    ))
}

/// A gensym for a temporary of `call` that no symbol in its arguments uses.
fn fresh_temp(call: &MacroCall<'_>) -> String {
    let mut used = HashSet::new();
    for arg in call.args {
        collect_symbols(arg, &mut used);
    }
    let evaluator = MacroEvaluator::new(call.span);
    loop {
        let name = evaluator.gensym(call.name);
        if !used.contains(name.as_str()) {
            return name;
        }
    }
}

fn collect_symbols<'a>(node: &'a AstNode, out: &mut HashSet<&'a str>) {
    match &*node.value {
        Expr::Symbol(name) => {
            out.insert(name.as_str());
        }
        Expr::Literal(_) => {}
        Expr::List(items) | Expr::Vector(items) | Expr::Set(items) => {
            items.iter().for_each(|item| collect_symbols(item, out));
        }
        Expr::Map(entries) => {
            for (key, value) in entries {
                collect_symbols(key, out);
                collect_symbols(value, out);
            }
        }
    }
}

/// Short-circuit fold shared by `and` and `or`. Non-atomic operands are
/// bound once through an immediately-invoked function so they are evaluated
/// a single time.
fn expand_logical(call: &MacroCall<'_>, is_and: bool) -> AstNode {
    let span = call.span;
    match call.args {
        [] if is_and => AstNode::boolean(true, span),
        [] => AstNode::nil(span),
        [only] => only.clone(),
        [first, rest @ ..] => {
            let tail = AstNode::form(call.name, rest.iter().cloned(), span);
            let branch = |value: AstNode| {
                if is_and {
                    if_form(value.clone(), tail.clone(), value, span)
                } else {
                    if_form(value.clone(), value, tail.clone(), span)
                }
            };
            if is_atom(first) {
                branch(first.clone())
            } else {
                let temp = AstNode::symbol(fresh_temp(call), span);
                iife(temp.clone(), branch(temp), first.clone(), span)
            }
        }
    }
}

pub fn expand_and(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    Ok(expand_logical(call, true))
}

pub fn expand_or(call: &MacroCall<'_>, _env: &Environment<'_>) -> Result<AstNode, TransformError> {
    Ok(expand_logical(call, false))
}

// ===================================================================================================
// THREADING
// ===================================================================================================

fn thread(call: &MacroCall<'_>, first: bool) -> Result<AstNode, TransformError> {
    expect_min_args(call, 1)?;
    let mut result = call.args[0].clone();
    for step in &call.args[1..] {
        result = match &*step.value {
            Expr::List(items) if !items.is_empty() => {
                let mut threaded = Vec::with_capacity(items.len() + 1);
                if first {
                    threaded.push(items[0].clone());
                    threaded.push(result);
                    threaded.extend(items[1..].iter().cloned());
                } else {
                    threaded.extend(items.iter().cloned());
                    threaded.push(result);
                }
                AstNode::list(threaded, step.span)
            }
            Expr::Symbol(_) => AstNode::list(vec![step.clone(), result], step.span),
            _ => {
                return Err(TransformError::new(format!(
                    "{} form must be a list or symbol, got {}",
                    call.name,
                    step.value.kind_name()
                )))
            }
        };
    }
    Ok(result)
}

/// `(-> x (f a) g)` => `(g (f x a))`
pub fn expand_thread_first(
    call: &MacroCall<'_>,
    _env: &Environment<'_>,
) -> Result<AstNode, TransformError> {
    thread(call, true)
}

/// `(->> x (f a) g)` => `(g (f a x))`
pub fn expand_thread_last(
    call: &MacroCall<'_>,
    _env: &Environment<'_>,
) -> Result<AstNode, TransformError> {
    thread(call, false)
}
