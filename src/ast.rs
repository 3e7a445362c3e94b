//! AST module for the HQL language
//!
//! This module provides the surface syntax tree produced by the reader and
//! consumed by the macro expander, the import resolver and the lowerer.
//! Nodes are immutable; transformations build new nodes and share unchanged
//! subtrees through `Arc`.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a byte span in the source code.
///
/// # Examples
///
/// ```rust
/// use hql::ast::Span;
/// let span = Span { start: 0, end: 5 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithSpan<T> {
    pub value: T,
    pub span: Span,
}

/// Canonical AST node type with shared ownership for cheap rebuilding.
pub type AstNode = WithSpan<Arc<Expr>>;

/// Literal atoms of the surface language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
    /// `:name`, stored without the leading colon.
    Keyword(String),
}

/// The core AST node for HQL expressions.
///
/// Quote, quasiquote, unquote and unquote-splicing have no variant of their
/// own: they are lists headed by the symbols `quote`, `quasiquote`, `unquote`
/// and `unquote-splicing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Symbol(String),
    Literal(Literal),
    List(Vec<AstNode>),
    Vector(Vec<AstNode>),
    Map(Vec<(AstNode, AstNode)>),
    Set(Vec<AstNode>),
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Expr {
    /// Short name of the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Symbol(_) => "symbol",
            Expr::Literal(Literal::Number(_)) => "number",
            Expr::Literal(Literal::String(_)) => "string",
            Expr::Literal(Literal::Bool(_)) => "boolean",
            Expr::Literal(Literal::Nil) => "nil",
            Expr::Literal(Literal::Keyword(_)) => "keyword",
            Expr::List(_) => "list",
            Expr::Vector(_) => "vector",
            Expr::Map(_) => "map",
            Expr::Set(_) => "set",
        }
    }

    /// Pretty-prints the expression as surface syntax.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hql::ast::{AstNode, Span};
    /// let span = Span::default();
    /// let node = AstNode::list(
    ///     vec![AstNode::symbol("+", span), AstNode::number(1.0, span), AstNode::number(2.5, span)],
    ///     span,
    /// );
    /// assert_eq!(node.value.pretty(), "(+ 1 2.5)");
    /// ```
    pub fn pretty(&self) -> String {
        match self {
            Expr::Symbol(s) => s.clone(),
            Expr::Literal(lit) => lit.to_string(),
            Expr::List(items) => format!("({})", Self::pretty_seq(items)),
            Expr::Vector(items) => format!("[{}]", Self::pretty_seq(items)),
            Expr::Set(items) => format!("#[{}]", Self::pretty_seq(items)),
            Expr::Map(entries) => {
                let inner = entries
                    .iter()
                    .map(|(k, v)| format!("{} {}", k.value.pretty(), v.value.pretty()))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{{{}}}", inner)
            }
        }
    }

    fn pretty_seq(items: &[AstNode]) -> String {
        items
            .iter()
            .map(|e| e.value.pretty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", format_number(*n)),
            Literal::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Nil => write!(f, "nil"),
            Literal::Keyword(k) => write!(f, ":{}", k),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty())
    }
}

impl fmt::Display for WithSpan<Arc<Expr>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value.pretty())
    }
}

// ============================================================================
// NODE CONSTRUCTORS AND ACCESSORS
// ============================================================================

impl WithSpan<Arc<Expr>> {
    pub fn new(expr: Expr, span: Span) -> Self {
        WithSpan {
            value: Arc::new(expr),
            span,
        }
    }

    pub fn symbol(name: impl Into<String>, span: Span) -> Self {
        Self::new(Expr::Symbol(name.into()), span)
    }

    pub fn list(items: Vec<AstNode>, span: Span) -> Self {
        Self::new(Expr::List(items), span)
    }

    pub fn vector(items: Vec<AstNode>, span: Span) -> Self {
        Self::new(Expr::Vector(items), span)
    }

    pub fn literal(lit: Literal, span: Span) -> Self {
        Self::new(Expr::Literal(lit), span)
    }

    pub fn number(n: f64, span: Span) -> Self {
        Self::literal(Literal::Number(n), span)
    }

    pub fn string(s: impl Into<String>, span: Span) -> Self {
        Self::literal(Literal::String(s.into()), span)
    }

    pub fn boolean(b: bool, span: Span) -> Self {
        Self::literal(Literal::Bool(b), span)
    }

    pub fn nil(span: Span) -> Self {
        Self::literal(Literal::Nil, span)
    }

    /// Builds `(head items...)`.
    pub fn form(head: &str, rest: impl IntoIterator<Item = AstNode>, span: Span) -> Self {
        let mut items = vec![Self::symbol(head, span)];
        items.extend(rest);
        Self::list(items, span)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &*self.value {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstNode]> {
        match &*self.value {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a list or vector.
    pub fn as_sequence(&self) -> Option<&[AstNode]> {
        match &*self.value {
            Expr::List(items) | Expr::Vector(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &*self.value {
            Expr::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Head symbol of a non-empty list.
    pub fn head_symbol(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }

    /// True when this node is a list headed by `name`.
    pub fn is_form(&self, name: &str) -> bool {
        self.head_symbol() == Some(name)
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.value, Expr::Literal(Literal::Nil))
    }

    /// Truthiness at macro time: only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(
            &*self.value,
            Expr::Literal(Literal::Nil) | Expr::Literal(Literal::Bool(false))
        )
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Integral floats print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_prints_collections() {
        let span = Span::default();
        let map = AstNode::new(
            Expr::Map(vec![(
                AstNode::literal(Literal::Keyword("a".into()), span),
                AstNode::string("x\"y", span),
            )]),
            span,
        );
        assert_eq!(map.to_string(), r#"{:a "x\"y"}"#);
        let set = AstNode::new(Expr::Set(vec![AstNode::number(1.0, span)]), span);
        assert_eq!(set.to_string(), "#[1]");
    }

    #[test]
    fn head_symbol_and_truthiness() {
        let span = Span::default();
        let node = AstNode::form("quote", [AstNode::symbol("x", span)], span);
        assert!(node.is_form("quote"));
        assert!(!AstNode::nil(span).is_truthy());
        assert!(!AstNode::boolean(false, span).is_truthy());
        assert!(AstNode::number(0.0, span).is_truthy());
    }

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(4, 6).merge(Span::new(1, 5));
        assert_eq!(merged, Span::new(1, 6));
    }
}
