//! Local JavaScript modules.
//!
//! JS sources are never parsed as HQL. Their static `import`/`export ... from`
//! statements are scanned so dependencies (HQL or JS) resolve through the
//! same cache, and their `export` declarations form the export table. The
//! text itself is embedded verbatim.

use crate::ast::Span;
use crate::errors::{ImportFailure, SourceContext};
use crate::lower::ir::{EmbeddedBody, JsImportBinding};
use crate::modules::cache::{ExportKind, ExportTable, ExportedBinding, ResolvedModule};
use crate::modules::resolver::{resolve_specifier, ModuleHost};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*(?:import|export)\s+(?:[\w$*{},\s]+?\s+from\s+)?["']([^"'\n]+)["']"#)
        .expect("js import pattern is valid")
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*export\s+(?:async\s+)?(?:class\s+|function\s*\*?\s*)([A-Za-z_$][\w$]*)",
    )
    .expect("js export pattern is valid")
});

/// `export const a = 1, b = 2`: the declarator list up to the end of the
/// statement or line.
static EXPORT_VARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+(?:const|let|var)\s+([^;\n]+)")
        .expect("js export declaration pattern is valid")
});

static DECLARATOR_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_$][\w$]*)").expect("js declarator pattern is valid")
});

static EXPORT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s*\{([^}]*)\}").expect("js export list pattern is valid")
});

static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s+default\b").expect("js default export pattern is valid")
});

/// A static import found in JS text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsImport {
    pub specifier: String,
    pub span: Span,
}

/// Static `import ... from "x"`, `import "x"` and `export ... from "x"`
/// statements, in source order.
pub fn scan_imports(text: &str) -> Vec<JsImport> {
    IMPORT_FROM
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| JsImport {
            specifier: m.as_str().to_string(),
            span: Span::new(m.start(), m.end()),
        })
        .collect()
}

/// Exported names, deduplicated and sorted.
pub fn scan_exports(text: &str) -> Vec<String> {
    let mut names: Vec<String> = EXPORT_DECL
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();

    for caps in EXPORT_VARS.captures_iter(text) {
        names.extend(declarator_names(&caps[1]));
    }

    for caps in EXPORT_LIST.captures_iter(text) {
        for entry in caps[1].split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let exported = entry.rsplit(" as ").next().unwrap_or(entry).trim();
            names.push(exported.to_string());
        }
    }

    if EXPORT_DEFAULT.is_match(text) {
        names.push("default".to_string());
    }

    names.sort();
    names.dedup();
    names
}

/// Bound names of a declarator list such as `a = f(1, 2), b = [3, 4]`.
/// Commas nested in brackets or strings do not split declarators;
/// destructuring patterns are skipped.
fn declarator_names(list: &str) -> Vec<String> {
    let mut declarators = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                declarators.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    declarators.push(&list[start..]);

    declarators
        .into_iter()
        .filter_map(|d| DECLARATOR_NAME.captures(d))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Builds the cache entry of a JS module whose text has been read.
pub fn build_js_module(
    host: &mut dyn ModuleHost,
    path: &Path,
    text: String,
) -> Result<ResolvedModule, ImportFailure> {
    let source = SourceContext::from_file(path.display().to_string(), text.as_str());
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut imports = Vec::new();
    let mut dependencies = Vec::new();
    for import in scan_imports(&text) {
        let (key, _, _) = resolve_specifier(host, &import.specifier, dir, &source, import.span)
            .map_err(|error| ImportFailure::DependencyFailed {
                cause: Box::new(error),
            })?;
        imports.push(JsImportBinding {
            specifier: import.specifier,
            module_key: key.to_string(),
        });
        dependencies.push(key);
    }

    let exports = scan_exports(&text);
    let table: BTreeMap<String, ExportedBinding> = exports
        .iter()
        .map(|name| {
            (
                name.clone(),
                ExportedBinding {
                    local_name: name.clone(),
                    kind: ExportKind::Value {
                        pure: false,
                        signature: None,
                    },
                },
            )
        })
        .collect();

    tracing::debug!(
        module = %path.display(),
        imports = imports.len(),
        exports = exports.len(),
        "scanned js module"
    );

    Ok(ResolvedModule {
        exports: ExportTable::Table(table),
        body: Some(EmbeddedBody::Js {
            source: text,
            imports,
            exports,
        }),
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
import { helper } from "./helper.hql";
import * as path from 'jsr:@std/path';
import "./polyfill.js";
export { format } from "./format.js";

export const VERSION = "1.0";
export let width = max(1, 2), height = [3, 4], label = "a, b";
export async function load(url) { return fetch(url); }
export function* ids() { yield 1; }
export class Store {}
const a = 1, b = 2;
export { a, b as beta };
export default Store;
// import "./not-at-line-start.js" is ignored by the anchor
"#;

    #[test]
    fn finds_static_imports_in_order() {
        let specs: Vec<_> = scan_imports(SAMPLE).into_iter().map(|i| i.specifier).collect();
        assert_eq!(
            specs,
            vec!["./helper.hql", "jsr:@std/path", "./polyfill.js", "./format.js"]
        );
    }

    #[test]
    fn every_declarator_is_exported() {
        assert_eq!(declarator_names("a = 1, b = 2"), vec!["a", "b"]);
        assert_eq!(declarator_names("f = g(x, y), { z } = o, n"), vec!["f", "n"]);
    }

    #[test]
    fn finds_exported_names() {
        assert_eq!(
            scan_exports(SAMPLE),
            vec![
                "Store", "VERSION", "a", "beta", "default", "format", "height", "ids", "label",
                "load", "width"
            ]
        );
    }
}
