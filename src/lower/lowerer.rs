//! AST to IR lowering.
//!
//! Forms arrive macro-expanded, except for the elements of vectors, maps and
//! sets, which are expanded here just before they are lowered. Any
//! macro-headed list that still reaches the lowerer is a compiler bug and is
//! reported as an internal invariant violation.

use crate::ast::{AstNode, Expr, Literal, Span};
use crate::errors::{HqlError, SourceContext};
use crate::lower::ir::{
    CollectionKind, ExportEntry, FunctionDef, ImportRefEntry, IrLiteral, IrNode,
};
use crate::lower::params::{parse_params, FnSignature, ParamList};
use crate::lower::purity::{first_violation, PurityEnv};
use crate::macros::{Environment, Expander, MacroProvenance};
use crate::modules::cache::ExportKind;
use crate::modules::resolver::{ImportBinding, ResolvedImport};
use crate::modules::specifier::sanitize_identifier;
use std::collections::{HashMap, HashSet};

/// What lowering needs from the expansion stage.
pub struct LowerCx<'a, 'e> {
    pub expander: &'a mut Expander,
    pub env: &'a Environment<'e>,
}

/// Module-level facts gathered while lowering, kept across forms.
#[derive(Debug, Default, Clone)]
pub struct ModuleScope {
    pub definitions: HashSet<String>,
    pub signatures: HashMap<String, FnSignature>,
    pub pure_functions: HashSet<String>,
    pub aliases: HashSet<String>,
    pub import_refs: Vec<ImportRefEntry>,
    pub exports: Vec<ExportEntry>,
    /// `(export-name, local-name)` of exported macros.
    pub macro_exports: Vec<(String, String)>,
}

pub struct Lowerer {
    pub(crate) source: SourceContext,
    pub(crate) scope: ModuleScope,
    pure_builtins: HashSet<String>,
    locals: Vec<HashSet<String>>,
    /// Binding count of each enclosing `loop`.
    loops: Vec<usize>,
}

const TOP_LEVEL_ONLY: [&str; 4] = ["import", "export", "defmacro", "macro"];

impl Lowerer {
    pub fn new(source: SourceContext, pure_builtins: impl IntoIterator<Item = String>) -> Self {
        Self {
            source,
            scope: ModuleScope::default(),
            pure_builtins: pure_builtins.into_iter().collect(),
            locals: Vec::new(),
            loops: Vec::new(),
        }
    }

    pub fn scope(&self) -> &ModuleScope {
        &self.scope
    }

    /// Source used for diagnostics of subsequent forms.
    pub fn set_source(&mut self, source: SourceContext) {
        self.source = source;
    }

    // =============================
    // Declarations
    // =============================

    /// Records the names, signatures and purity of a top-level definition
    /// before any form is lowered, so calls may precede definitions.
    pub fn declare(&mut self, form: &AstNode, cx: &mut LowerCx<'_, '_>) {
        let Some(items) = form.as_list() else {
            return;
        };
        match form.head_symbol() {
            Some("export") if items.len() == 2 => self.declare(&items[1], cx),
            Some("fn" | "fx") => {
                if let Some(name) = items.get(1).and_then(|n| n.as_symbol()) {
                    self.declare_function(name, form, cx);
                }
            }
            Some("def" | "var") => {
                let Some(name) = items.get(1).and_then(|n| n.as_symbol()) else {
                    return;
                };
                self.scope.definitions.insert(name.to_string());
                if let Some(value) = items.get(2) {
                    if value.is_form("fn") || value.is_form("fx") {
                        self.declare_function(name, value, cx);
                    }
                }
            }
            _ => {}
        }
    }

    fn declare_function(&mut self, name: &str, func: &AstNode, cx: &mut LowerCx<'_, '_>) {
        self.scope.definitions.insert(name.to_string());
        if func.is_form("fx") {
            self.scope.pure_functions.insert(name.to_string());
        }
        let Some((_, params_node, _)) = split_function(func) else {
            return;
        };
        let Ok(params) = parse_params(params_node) else {
            return;
        };
        if let Ok(signature) = self.signature_of(&params, cx) {
            self.scope.signatures.insert(name.to_string(), signature);
        }
    }

    fn signature_of(
        &mut self,
        params: &ParamList,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<FnSignature, HqlError> {
        let mut defaults = Vec::with_capacity(params.params.len());
        for param in &params.params {
            defaults.push(match &param.default {
                Some(default) => Some(self.lower_expanded(default, cx)?),
                None => None,
            });
        }
        Ok(FnSignature {
            params: params.params.iter().map(|p| p.name.clone()).collect(),
            defaults,
            rest: params.rest.clone(),
        })
    }

    // =============================
    // Top level
    // =============================

    /// Lowers one expanded top-level form.
    pub fn lower_top_level(
        &mut self,
        form: &AstNode,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<Vec<IrNode>, HqlError> {
        if form.is_form("export") {
            return self.lower_export(form, cx);
        }
        Ok(vec![self.lower_expr(form, cx)?])
    }

    /// Lowers a resolved import into its `ImportRef` and local bindings.
    pub fn lower_import(&mut self, import: &ResolvedImport) -> Vec<IrNode> {
        let base = match &import.binding {
            ImportBinding::Namespace(name) => sanitize_identifier(name),
            _ => import.kind.alias_base(&import.key),
        };
        let alias = self.unique_alias(&base);
        self.scope.import_refs.push(ImportRefEntry {
            alias: alias.clone(),
            module_key: import.key.to_string(),
            embedded: import.kind.is_local(),
        });

        let mut nodes = vec![IrNode::ImportRef {
            alias: alias.clone(),
            module_key: import.key.to_string(),
        }];

        match &import.binding {
            ImportBinding::SideEffect => {}
            ImportBinding::Namespace(name) => {
                self.scope.definitions.insert(name.clone());
                if *name != alias {
                    nodes.push(IrNode::Binding {
                        name: name.clone(),
                        value: Box::new(IrNode::identifier(&alias)),
                        mutable: false,
                    });
                }
            }
            ImportBinding::Named(names) => {
                for named in names {
                    let export = import.exports().and_then(|e| e.get(&named.name));
                    match export.map(|e| &e.kind) {
                        Some(ExportKind::Macro(_)) => continue,
                        Some(ExportKind::Value { pure, signature }) => {
                            if *pure {
                                self.scope.pure_functions.insert(named.local.clone());
                            }
                            if let Some(signature) = signature {
                                self.scope
                                    .signatures
                                    .insert(named.local.clone(), signature.clone());
                            }
                        }
                        None => {}
                    }
                    self.scope.definitions.insert(named.local.clone());
                    nodes.push(IrNode::Binding {
                        name: named.local.clone(),
                        value: Box::new(IrNode::property(IrNode::identifier(&alias), &named.name)),
                        mutable: false,
                    });
                }
            }
        }
        nodes
    }

    fn unique_alias(&mut self, base: &str) -> String {
        let mut alias = base.to_string();
        let mut n = 2;
        while self.scope.aliases.contains(&alias) {
            alias = format!("{}_{}", base, n);
            n += 1;
        }
        self.scope.aliases.insert(alias.clone());
        alias
    }

    fn lower_export(
        &mut self,
        form: &AstNode,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<Vec<IrNode>, HqlError> {
        let items = form.as_list().unwrap_or_default();
        let [_, target] = items else {
            return Err(self.source.malformed(
                "export",
                "expected (export name), (export [names]) or (export (def ...))",
                form.span,
            ));
        };

        if let Some(name) = target.as_symbol() {
            return self.export_name(name, name, target.span, cx).map(|n| n.into_iter().collect());
        }

        if let Expr::Vector(names) = &*target.value {
            let mut nodes = Vec::new();
            let mut i = 0;
            while i < names.len() {
                let Some(local) = names[i].as_symbol() else {
                    return Err(self.source.malformed("export", "exported names must be symbols", names[i].span));
                };
                let mut exported = local;
                if names.get(i + 1).and_then(|n| n.as_symbol()) == Some("as") {
                    let Some(alias) = names.get(i + 2).and_then(|n| n.as_symbol()) else {
                        return Err(self.source.malformed("export", format!("'{} as' needs a name", local), names[i].span));
                    };
                    exported = alias;
                    i += 2;
                }
                nodes.extend(self.export_name(local, exported, names[i].span, cx)?);
                i += 1;
            }
            return Ok(nodes);
        }

        let declared = match target.head_symbol() {
            Some("def" | "var" | "fn" | "fx") => target
                .as_list()
                .and_then(|items| items.get(1))
                .and_then(|n| n.as_symbol()),
            _ => None,
        };
        let Some(name) = declared else {
            return Err(self.source.malformed(
                "export",
                "only names and named def, var, fn or fx declarations can be exported",
                target.span,
            ));
        };
        let name = name.to_string();
        let declaration = self.lower_expr(target, cx)?;
        let mut nodes = vec![declaration];
        nodes.extend(self.export_name(&name, &name, target.span, cx)?);
        Ok(nodes)
    }

    fn export_name(
        &mut self,
        local: &str,
        exported: &str,
        span: Span,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<Option<IrNode>, HqlError> {
        if self.scope.definitions.contains(local) {
            self.scope.exports.push(ExportEntry {
                local_name: local.to_string(),
                export_name: exported.to_string(),
            });
            return Ok(Some(IrNode::ExportRef {
                local_name: local.to_string(),
                export_name: exported.to_string(),
            }));
        }
        match cx.env.lookup_macro(local) {
            Some(binding) if binding.provenance != MacroProvenance::Core => {
                self.scope
                    .macro_exports
                    .push((exported.to_string(), local.to_string()));
                Ok(None)
            }
            _ => Err(self.source.malformed(
                "export",
                format!("cannot export '{}': it is not defined in this module", local),
                span,
            )),
        }
    }

    // =============================
    // Expressions
    // =============================

    /// Expands a form that the expander has not walked yet, then lowers it.
    pub(crate) fn lower_expanded(
        &mut self,
        node: &AstNode,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let expanded = cx.expander.expand(node, cx.env)?;
        self.lower_expr(&expanded, cx)
    }

    pub fn lower_expr(&mut self, node: &AstNode, cx: &mut LowerCx<'_, '_>) -> Result<IrNode, HqlError> {
        match &*node.value {
            Expr::Literal(lit) => Ok(IrNode::literal(lower_literal(lit))),
            Expr::Symbol(name) => self.lower_symbol(name, node.span, cx),
            Expr::Vector(items) => self.lower_collection(CollectionKind::Array, items, cx),
            Expr::Set(items) => self.lower_collection(CollectionKind::Set, items, cx),
            Expr::Map(entries) => {
                let mut items = Vec::with_capacity(entries.len() * 2);
                for (key, value) in entries {
                    items.push(self.lower_expanded(key, cx)?);
                    items.push(self.lower_expanded(value, cx)?);
                }
                Ok(IrNode::CollectionLit {
                    kind: CollectionKind::Map,
                    items,
                })
            }
            Expr::List(items) if items.is_empty() => Ok(IrNode::empty_sequence()),
            Expr::List(items) => self.lower_list(node, items, cx),
        }
    }

    fn lower_collection(
        &mut self,
        kind: CollectionKind,
        items: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        if items.is_empty() && kind == CollectionKind::Array {
            return Ok(IrNode::empty_sequence());
        }
        let items = items
            .iter()
            .map(|item| self.lower_expanded(item, cx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IrNode::CollectionLit { kind, items })
    }

    pub(crate) fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|frame| frame.contains(name))
    }

    /// True when `name` refers to a macro rather than a value.
    pub(crate) fn names_macro(&self, name: &str, cx: &LowerCx<'_, '_>) -> bool {
        !self.is_local(name) && !self.scope.definitions.contains(name) && cx.env.is_macro(name)
    }

    fn bind_local(&mut self, name: &str) {
        if let Some(frame) = self.locals.last_mut() {
            frame.insert(name.to_string());
        }
    }

    fn lower_symbol(
        &mut self,
        name: &str,
        span: Span,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        if self.names_macro(name, cx) {
            return Err(self.source.malformed(
                name,
                format!("macro '{}' cannot be used as a value", name),
                span,
            ));
        }
        Ok(lower_dotted(name))
    }

    fn lower_list(
        &mut self,
        node: &AstNode,
        items: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let Some(head) = items[0].as_symbol() else {
            return self.lower_call(node, items, cx);
        };
        let args = &items[1..];

        match head {
            "def" | "var" => self.lower_binding(node, head, args, cx),
            "set!" => self.lower_assign(node, args, cx),
            "fn" | "fx" => self.lower_function(node, cx),
            "if" => self.lower_if(node, args, cx),
            "do" => Ok(IrNode::Sequence {
                body: self.lower_body(args, cx)?,
            }),
            "loop" => self.lower_loop(node, args, cx),
            "recur" => self.lower_recur(node, args, cx),
            "quote" => match args {
                [datum] => Ok(quote_data(datum)),
                _ => Err(self.source.malformed("quote", "expects exactly one form", node.span)),
            },
            "quasiquote" => match args {
                [template] => self.lower_quasi(template, 1, cx),
                _ => Err(self.source.malformed("quasiquote", "expects exactly one form", node.span)),
            },
            _ if TOP_LEVEL_ONLY.contains(&head) && !self.is_local(head) => Err(self.source.malformed(
                head,
                "only allowed at module top level",
                node.span,
            )),
            _ if self.names_macro(head, cx) => Err(self.source.internal(
                format!("macro form '{}' survived expansion", head),
                node.span,
            )),
            _ => self.lower_call(node, items, cx),
        }
    }

    pub(crate) fn lower_body(
        &mut self,
        forms: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<Vec<IrNode>, HqlError> {
        forms.iter().map(|form| self.lower_expr(form, cx)).collect()
    }

    fn lower_binding(
        &mut self,
        node: &AstNode,
        head: &str,
        args: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let mutable = head == "var";
        let (name, value) = match args {
            [name, value] => (name, Some(value)),
            [name] if mutable => (name, None),
            _ => {
                return Err(self.source.malformed(
                    head,
                    format!("expected ({} name value)", head),
                    node.span,
                ))
            }
        };
        let Some(name) = name.as_symbol() else {
            return Err(self.source.malformed(head, "binding name must be a symbol", name.span));
        };
        let value = match value {
            Some(value) => self.lower_expr(value, cx)?,
            None => IrNode::undefined(),
        };
        if self.locals.is_empty() {
            self.scope.definitions.insert(name.to_string());
        } else {
            self.bind_local(name);
        }
        Ok(IrNode::Binding {
            name: name.to_string(),
            value: Box::new(value),
            mutable,
        })
    }

    fn lower_assign(
        &mut self,
        node: &AstNode,
        args: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let [target, value] = args else {
            return Err(self.source.malformed("set!", "expected (set! target value)", node.span));
        };
        let target = self.lower_expr(target, cx)?;
        if !matches!(target, IrNode::Identifier { .. } | IrNode::PropertyAccess { .. }) {
            return Err(self.source.malformed(
                "set!",
                "target must be a name or a property",
                node.span,
            ));
        }
        Ok(IrNode::Assign {
            target: Box::new(target),
            value: Box::new(self.lower_expr(value, cx)?),
        })
    }

    fn lower_function(&mut self, node: &AstNode, cx: &mut LowerCx<'_, '_>) -> Result<IrNode, HqlError> {
        let form = node.head_symbol().unwrap_or("fn");
        let Some((name, params_node, body)) = split_function(node) else {
            return Err(self.source.malformed(
                form,
                format!("expected ({} name? [params] body...)", form),
                node.span,
            ));
        };
        let params = parse_params(params_node)
            .map_err(|msg| self.source.malformed(form, msg, params_node.span))?;

        let mut defaults = Vec::new();
        for param in &params.params {
            if let Some(default) = &param.default {
                defaults.push((param.name.clone(), self.lower_expanded(default, cx)?));
            }
        }

        if let Some(name) = name {
            if !self.locals.is_empty() {
                self.bind_local(name);
            }
        }

        let mut frame: HashSet<String> = params.names().map(str::to_string).collect();
        frame.extend(name.map(str::to_string));
        self.locals.push(frame);
        let saved_loops = std::mem::take(&mut self.loops);
        let body = self.lower_body(body, cx);
        self.loops = saved_loops;
        self.locals.pop();

        let def = FunctionDef {
            name: name.map(str::to_string),
            params: params.params.iter().map(|p| p.name.clone()).collect(),
            defaults,
            rest: params.rest.clone(),
            pure: form == "fx",
            body: body?,
        };

        if def.pure {
            let env = PurityEnv {
                pure_functions: Some(&self.scope.pure_functions),
                extra_builtins: Some(&self.pure_builtins),
            };
            if let Some(symbol) = first_violation(&def, &env) {
                return Err(self.source.purity_error(
                    name.unwrap_or("<anonymous>"),
                    &symbol,
                    node.span,
                ));
            }
        }
        Ok(IrNode::FunctionDef(def))
    }

    fn lower_if(
        &mut self,
        node: &AstNode,
        args: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let (cond, then, otherwise) = match args {
            [cond, then] => (cond, then, None),
            [cond, then, otherwise] => (cond, then, Some(otherwise)),
            _ => {
                return Err(self.source.malformed(
                    "if",
                    "expected (if test then else?)",
                    node.span,
                ))
            }
        };
        Ok(IrNode::If {
            cond: Box::new(self.lower_expr(cond, cx)?),
            then: Box::new(self.lower_expr(then, cx)?),
            otherwise: Box::new(match otherwise {
                Some(otherwise) => self.lower_expr(otherwise, cx)?,
                None => IrNode::null(),
            }),
        })
    }

    fn lower_loop(
        &mut self,
        node: &AstNode,
        args: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let Some(pairs) = args.first().and_then(|b| b.as_sequence()) else {
            return Err(self.source.malformed("loop", "expected (loop [name value ...] body...)", node.span));
        };
        if pairs.len() % 2 != 0 {
            return Err(self.source.malformed("loop", "bindings must come in name/value pairs", node.span));
        }

        self.locals.push(HashSet::new());
        let result = self.lower_loop_body(pairs, &args[1..], cx);
        self.locals.pop();
        result
    }

    fn lower_loop_body(
        &mut self,
        pairs: &[AstNode],
        body: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let mut bindings = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            let Some(name) = pair[0].as_symbol() else {
                return Err(self.source.malformed("loop", "binding name must be a symbol", pair[0].span));
            };
            let value = self.lower_expanded(&pair[1], cx)?;
            self.bind_local(name);
            bindings.push((name.to_string(), value));
        }
        self.loops.push(bindings.len());
        let body = self.lower_body(body, cx);
        self.loops.pop();
        Ok(IrNode::Loop {
            bindings,
            body: body?,
        })
    }

    fn lower_recur(
        &mut self,
        node: &AstNode,
        args: &[AstNode],
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let Some(&arity) = self.loops.last() else {
            return Err(self.source.malformed("recur", "recur outside of loop", node.span));
        };
        if args.len() != arity {
            return Err(self.source.malformed(
                "recur",
                format!("loop has {} binding(s), recur passed {}", arity, args.len()),
                node.span,
            ));
        }
        Ok(IrNode::Recur {
            args: self.lower_body(args, cx)?,
        })
    }

    /// Runtime quasiquote: data, with level-1 `unquote` holes lowered as
    /// expressions. Nested quasiquotes raise the level and stay data.
    fn lower_quasi(
        &mut self,
        node: &AstNode,
        level: usize,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        match &*node.value {
            Expr::List(items) => match items.as_slice() {
                [head, inner] if head.as_symbol() == Some("quasiquote") => {
                    let inner = self.lower_quasi(inner, level + 1, cx)?;
                    Ok(quoted_form("quasiquote", inner))
                }
                [head, inner] if head.as_symbol() == Some("unquote") && level == 1 => {
                    self.lower_expanded(inner, cx)
                }
                [head, _] if head.as_symbol() == Some("unquote-splicing") && level == 1 => {
                    Err(self.source.malformed(
                        "unquote-splicing",
                        "splicing is only supported inside macro templates",
                        node.span,
                    ))
                }
                [head, inner]
                    if matches!(head.as_symbol(), Some("unquote" | "unquote-splicing")) =>
                {
                    let name = head.as_symbol().unwrap_or("unquote");
                    let inner = self.lower_quasi(inner, level - 1, cx)?;
                    Ok(quoted_form(name, inner))
                }
                _ => self.lower_quasi_items(CollectionKind::Array, items, level, cx),
            },
            Expr::Vector(items) => self.lower_quasi_items(CollectionKind::Array, items, level, cx),
            Expr::Set(items) => self.lower_quasi_items(CollectionKind::Set, items, level, cx),
            Expr::Map(entries) => {
                let mut items = Vec::with_capacity(entries.len() * 2);
                for (key, value) in entries {
                    items.push(self.lower_quasi(key, level, cx)?);
                    items.push(self.lower_quasi(value, level, cx)?);
                }
                Ok(IrNode::CollectionLit {
                    kind: CollectionKind::Map,
                    items,
                })
            }
            Expr::Symbol(_) | Expr::Literal(_) => Ok(quote_data(node)),
        }
    }

    fn lower_quasi_items(
        &mut self,
        kind: CollectionKind,
        items: &[AstNode],
        level: usize,
        cx: &mut LowerCx<'_, '_>,
    ) -> Result<IrNode, HqlError> {
        let items = items
            .iter()
            .map(|item| self.lower_quasi(item, level, cx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IrNode::CollectionLit { kind, items })
    }
}

/// `(head inner)` as quoted data, with `inner` already lowered.
fn quoted_form(head: &str, inner: IrNode) -> IrNode {
    IrNode::CollectionLit {
        kind: CollectionKind::Array,
        items: vec![IrNode::literal(IrLiteral::String(head.to_string())), inner],
    }
}

// =============================
// Helpers
// =============================

/// `(fn name? params body...)` split into its parts.
fn split_function(node: &AstNode) -> Option<(Option<&str>, &AstNode, &[AstNode])> {
    let items = node.as_list()?;
    match items.get(1)?.as_symbol() {
        Some(name) => Some((Some(name), items.get(2)?, &items[3..])),
        None => Some((None, &items[1], &items[2..])),
    }
}

fn lower_literal(lit: &Literal) -> IrLiteral {
    match lit {
        Literal::Number(n) => IrLiteral::Number(*n),
        Literal::String(s) => IrLiteral::String(s.clone()),
        Literal::Bool(b) => IrLiteral::Bool(*b),
        Literal::Nil => IrLiteral::Null,
        Literal::Keyword(k) => IrLiteral::Keyword(k.clone()),
    }
}

/// `a.b.c` becomes nested property access; other symbols are identifiers.
pub(crate) fn lower_dotted(name: &str) -> IrNode {
    let is_dotted = name.len() > 1
        && name.contains('.')
        && !name.starts_with('.')
        && !name.ends_with('.')
        && !name.contains("..");
    if !is_dotted {
        return IrNode::identifier(name);
    }
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or(name);
    parts.fold(IrNode::identifier(first), IrNode::property)
}

/// Quoted data: symbols become strings, lists and vectors become arrays.
pub(crate) fn quote_data(node: &AstNode) -> IrNode {
    match &*node.value {
        Expr::Symbol(name) => IrNode::literal(IrLiteral::String(name.clone())),
        Expr::Literal(lit) => IrNode::literal(lower_literal(lit)),
        Expr::List(items) | Expr::Vector(items) => IrNode::CollectionLit {
            kind: CollectionKind::Array,
            items: items.iter().map(quote_data).collect(),
        },
        Expr::Set(items) => IrNode::CollectionLit {
            kind: CollectionKind::Set,
            items: items.iter().map(quote_data).collect(),
        },
        Expr::Map(entries) => IrNode::CollectionLit {
            kind: CollectionKind::Map,
            items: entries
                .iter()
                .flat_map(|(k, v)| [quote_data(k), quote_data(v)])
                .collect(),
        },
    }
}
