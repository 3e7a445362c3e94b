//! HQL Parser
//!
//! Converts HQL source code into AST nodes with source location tracking.
//! This parser is purely syntactic: reader shorthands (`'x`, `` `x ``, `~x`,
//! `~@x`) become ordinary lists headed by `quote`, `quasiquote`, `unquote`
//! and `unquote-splicing`, and nothing here knows about macros.

use crate::ast::{AstNode, Expr, Literal, Span};
use crate::errors::{HqlError, SourceContext};
use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct HqlParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse HQL source code into top-level AST nodes.
pub fn parse(source_text: &str, source: &SourceContext) -> Result<Vec<AstNode>, HqlError> {
    if source_text.trim().is_empty() {
        return Ok(vec![]);
    }

    let mut pairs = HqlParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source_text, source))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_ast_node(p, source))
        .collect()
}

/// Parse with an anonymous source context; convenient for tests and the REPL.
pub fn parse_str(source_text: &str) -> Result<Vec<AstNode>, HqlError> {
    parse(source_text, &SourceContext::from_file("<input>", source_text))
}

/// Wrap multiple AST nodes in a `(do ...)` form if needed.
pub fn wrap_in_do(nodes: Vec<AstNode>) -> AstNode {
    if nodes.len() == 1 {
        if let Some(node) = nodes.into_iter().next() {
            return node;
        }
        return AstNode::nil(Span::default());
    }
    let span = calculate_span(&nodes);
    AstNode::form("do", nodes, span)
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>, source: &SourceContext) -> Result<AstNode, HqlError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::number => {
            let text = pair.as_str();
            let value = text
                .parse::<f64>()
                .map_err(|_| source.parse_error(format!("invalid number '{}'", text), span))?;
            Ok(AstNode::number(value, span))
        }

        Rule::boolean => Ok(AstNode::boolean(pair.as_str() == "true", span)),

        Rule::nil => Ok(AstNode::nil(span)),

        Rule::string => {
            let inner = pair.into_inner().next().map_or("", |p| p.as_str());
            let content = unescape_string(inner)
                .map_err(|msg| source.parse_error(msg, span))?;
            Ok(AstNode::string(content, span))
        }

        Rule::keyword => {
            let name = &pair.as_str()[1..];
            Ok(AstNode::literal(Literal::Keyword(name.to_string()), span))
        }

        Rule::symbol => Ok(AstNode::symbol(pair.as_str(), span)),

        Rule::list => Ok(AstNode::list(build_children(pair, source)?, span)),

        Rule::vector => Ok(AstNode::vector(build_children(pair, source)?, span)),

        Rule::set => Ok(AstNode::new(Expr::Set(build_children(pair, source)?), span)),

        Rule::map => {
            let entries = pair
                .into_inner()
                .map(|entry| build_map_entry(entry, source))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AstNode::new(Expr::Map(entries), span))
        }

        Rule::quote => build_reader_macro(pair, "quote", source),
        Rule::quasiquote => build_reader_macro(pair, "quasiquote", source),
        Rule::unquote => build_reader_macro(pair, "unquote", source),
        Rule::unquote_splicing => build_reader_macro(pair, "unquote-splicing", source),

        rule => Err(source.parse_error(format!("unsupported rule: {:?}", rule), span)),
    }
}

fn build_children(pair: Pair<Rule>, source: &SourceContext) -> Result<Vec<AstNode>, HqlError> {
    pair.into_inner()
        .map(|p| build_ast_node(p, source))
        .collect()
}

/// `'x` becomes `(quote x)`, and likewise for the other shorthands.
fn build_reader_macro(
    pair: Pair<Rule>,
    head: &str,
    source: &SourceContext,
) -> Result<AstNode, HqlError> {
    let span = get_span(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| source.parse_error(format!("missing form after {}", head), span))?;
    let quoted = build_ast_node(inner, source)?;
    Ok(AstNode::form(head, [quoted], span))
}

/// Map keys written `"name":` or `name:` are normalized to string keys.
fn build_map_entry(
    entry: Pair<Rule>,
    source: &SourceContext,
) -> Result<(AstNode, AstNode), HqlError> {
    let span = get_span(&entry);
    let mut inner = entry.into_inner();
    let (Some(key_pair), Some(value_pair)) = (inner.next(), inner.next()) else {
        return Err(source.parse_error("map entry needs a key and a value", span));
    };

    let key = if key_pair.as_rule() == Rule::json_key {
        let key_span = get_span(&key_pair);
        let string_pair = key_pair
            .into_inner()
            .next()
            .ok_or_else(|| source.parse_error("empty map key", key_span))?;
        let text = string_pair.into_inner().next().map_or("", |p| p.as_str());
        let content = unescape_string(text).map_err(|msg| source.parse_error(msg, key_span))?;
        AstNode::string(content, key_span)
    } else {
        let node = build_ast_node(key_pair, source)?;
        match node.as_symbol() {
            Some(name) if name.len() > 1 && name.ends_with(':') => {
                AstNode::string(&name[..name.len() - 1], node.span)
            }
            _ => node,
        }
    };

    let value = build_ast_node(value_pair, source)?;
    Ok((key, value))
}

// ============================================================================
// UTILITIES
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn calculate_span(nodes: &[AstNode]) -> Span {
    match (nodes.first(), nodes.last()) {
        (Some(first), Some(last)) => first.span.merge(last.span),
        _ => Span::default(),
    }
}

fn unescape_string(inner: &str) -> Result<String, String> {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => return Err(format!("unknown escape sequence '\\{}'", other)),
            None => return Err("dangling backslash in string".to_string()),
        }
    }

    Ok(result)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(error: Error<Rule>, text: &str, source: &SourceContext) -> HqlError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
        pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
    };

    let message = match unbalanced_delimiter(text) {
        Some(message) => message,
        None => error.variant.message().into_owned(),
    };

    source.parse_error(message, span)
}

/// Scans for an unclosed or stray delimiter, skipping strings and comments.
fn unbalanced_delimiter(text: &str) -> Option<String> {
    let mut stack = Vec::new();
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => loop {
                match chars.next() {
                    Some('\\') => {
                        chars.next();
                    }
                    Some('"') => break,
                    Some(_) => {}
                    None => return Some("missing closing quote".to_string()),
                }
            },
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Some(format!("unexpected closing '{}'", ch));
                }
            }
            _ => {}
        }
    }
    stack.pop().map(|open| {
        let close = match open {
            '(' => ')',
            '[' => ']',
            _ => '}',
        };
        format!("missing closing '{}'", close)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(parse_str("").unwrap().is_empty());
        assert!(parse_str("  ; only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_reader_shorthands_become_lists() {
        let nodes = parse_str("`(a ~x ~@ys 'z)").unwrap();
        assert_eq!(
            nodes[0].to_string(),
            "(quasiquote (a (unquote x) (unquote-splicing ys) (quote z)))"
        );
    }

    #[test]
    fn test_literals() {
        let nodes = parse_str(r#"42 -1.5 "hi\n" true nil :kw"#).unwrap();
        let rendered: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(rendered, vec!["42", "-1.5", "\"hi\\n\"", "true", "nil", ":kw"]);
    }

    #[test]
    fn test_map_keys_are_normalized() {
        let nodes = parse_str(r#"{"name": "Ada", age: 36, :k 1}"#).unwrap();
        assert_eq!(nodes[0].to_string(), r#"{"name" "Ada" "age" 36 :k 1}"#);
    }

    #[test]
    fn test_named_argument_symbols_survive() {
        let nodes = parse_str("(f x: 1 y: 2)").unwrap();
        let items = nodes[0].as_list().unwrap();
        assert_eq!(items[1].as_symbol(), Some("x:"));
    }

    #[test]
    fn test_unmatched_paren() {
        let err = parse_str("(a b").unwrap_err();
        assert!(err.to_string().contains("missing closing ')'"), "{}", err);
    }

    #[test]
    fn test_spans_cover_source() {
        let nodes = parse_str("  (f 1)").unwrap();
        assert_eq!(nodes[0].span, Span::new(2, 7));
    }
}
