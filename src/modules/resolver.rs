//! Import resolution.
//!
//! Recognizes the import forms left after macro expansion, classifies their
//! specifiers, and makes sure every local dependency is compiled exactly once
//! per cache. A dependency that is still in progress when it is imported
//! again (an import cycle) resolves to a forward placeholder: the importer
//! gets a reference to the module without its export table.

use crate::ast::{AstNode, Span};
use crate::errors::{HqlError, ImportFailure, SourceContext};
use crate::modules::cache::{ExportTable, ModuleCache, ModuleState, ResolvedModule};
use crate::modules::loader::SourceLoader;
use crate::modules::specifier::{classify, ModuleKey, ModuleKind, Specifier};
use std::path::Path;
use std::sync::Arc;

/// The compilation host the resolver calls back into.
pub trait ModuleHost {
    fn loader(&self) -> &dyn SourceLoader;
    fn cache(&mut self) -> &mut ModuleCache;
    /// Reads and compiles a local module that is not cached yet.
    fn build_local(
        &mut self,
        key: &ModuleKey,
        path: &Path,
        kind: &ModuleKind,
    ) -> Result<ResolvedModule, ImportFailure>;
}

// =============================
// Import forms
// =============================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    pub name: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `(import "spec")`
    SideEffect,
    /// `(import name "spec")`
    Namespace(String),
    /// `(import [a b as c] "spec")`
    Named(Vec<NamedImport>),
}

#[derive(Debug, Clone)]
pub struct ImportForm {
    pub binding: ImportBinding,
    pub binding_node: Option<AstNode>,
    pub specifier: String,
    pub span: Span,
}

/// Recognizes an import form. Returns `None` for anything that is not
/// headed by `import`.
pub fn parse_import_form(
    node: &AstNode,
    source: &SourceContext,
) -> Result<Option<ImportForm>, HqlError> {
    let Some(items) = node.as_list() else {
        return Ok(None);
    };
    if items.first().and_then(|h| h.as_symbol()) != Some("import") {
        return Ok(None);
    }
    let malformed = |msg: &str| source.malformed("import", msg, node.span);

    let args = &items[1..];
    let (binding_node, spec_node) = match args {
        [spec] => (None, spec),
        [binding, spec] => (Some(binding), spec),
        [binding, from, spec] if from.as_symbol() == Some("from") => (Some(binding), spec),
        _ => {
            return Err(malformed(
                "expected (import \"spec\"), (import name from \"spec\") or (import [names] from \"spec\")",
            ))
        }
    };
    let Some(specifier) = spec_node.as_string() else {
        return Err(malformed("the module specifier must be a string"));
    };

    let binding = match binding_node {
        None => ImportBinding::SideEffect,
        Some(node) => match (node.as_symbol(), node.as_sequence()) {
            (Some(name), _) => ImportBinding::Namespace(name.to_string()),
            (None, Some(names)) => ImportBinding::Named(
                parse_named_imports(names).map_err(|msg| malformed(&msg))?,
            ),
            _ => return Err(malformed("import binding must be a symbol or a vector of names")),
        },
    };

    Ok(Some(ImportForm {
        binding,
        binding_node: binding_node.cloned(),
        specifier: specifier.to_string(),
        span: node.span,
    }))
}

fn parse_named_imports(names: &[AstNode]) -> Result<Vec<NamedImport>, String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < names.len() {
        let Some(name) = names[i].as_symbol() else {
            return Err("imported names must be symbols".to_string());
        };
        if names.get(i + 1).and_then(|n| n.as_symbol()) == Some("as") {
            let Some(local) = names.get(i + 2).and_then(|n| n.as_symbol()) else {
                return Err(format!("'{} as' must be followed by a local name", name));
            };
            out.push(NamedImport {
                name: name.to_string(),
                local: local.to_string(),
            });
            i += 3;
        } else {
            out.push(NamedImport {
                name: name.to_string(),
                local: name.to_string(),
            });
            i += 1;
        }
    }
    Ok(out)
}

// =============================
// Resolution
// =============================

#[derive(Debug, Clone)]
pub enum ImportTarget {
    Ready(Arc<ResolvedModule>),
    /// The module is still being compiled further up the import chain.
    Pending,
}

#[derive(Debug, Clone)]
pub struct ResolvedImport {
    /// The import rewritten to `(import <binding> "<module-key>")`.
    pub form: AstNode,
    pub binding: ImportBinding,
    pub key: ModuleKey,
    pub kind: ModuleKind,
    pub target: ImportTarget,
    pub span: Span,
}

impl ResolvedImport {
    /// Export table of the target, unless it is still pending.
    pub fn exports(&self) -> Option<&ExportTable> {
        match &self.target {
            ImportTarget::Ready(module) => Some(&module.exports),
            ImportTarget::Pending => None,
        }
    }
}

/// Resolves one top-level form if it is an import; other forms yield `None`.
pub fn resolve_import(
    node: &AstNode,
    current_file: &Path,
    host: &mut dyn ModuleHost,
    source: &SourceContext,
) -> Result<Option<ResolvedImport>, HqlError> {
    let Some(form) = parse_import_form(node, source)? else {
        return Ok(None);
    };
    let importer_dir = current_file.parent().unwrap_or_else(|| Path::new("."));
    let (key, kind, target) =
        resolve_specifier(host, &form.specifier, importer_dir, source, form.span)?;

    if let (ImportBinding::Named(names), ImportTarget::Ready(module)) = (&form.binding, &target) {
        if let Some(missing) = names.iter().find(|n| !module.exports.permits(&n.name)) {
            return Err(source.import_error(
                &form.specifier,
                ImportFailure::UnknownExport {
                    name: missing.name.clone(),
                },
                form.span,
            ));
        }
    }

    let key_node = AstNode::string(key.as_str(), form.span);
    let rewritten = AstNode::form(
        "import",
        form.binding_node.into_iter().chain(std::iter::once(key_node)),
        form.span,
    );

    Ok(Some(ResolvedImport {
        form: rewritten,
        binding: form.binding,
        key,
        kind,
        target,
        span: form.span,
    }))
}

/// Classifies `specifier` and brings its module into the cache.
pub fn resolve_specifier(
    host: &mut dyn ModuleHost,
    specifier: &str,
    importer_dir: &Path,
    source: &SourceContext,
    span: Span,
) -> Result<(ModuleKey, ModuleKind, ImportTarget), HqlError> {
    let classified = classify(specifier, importer_dir, host.loader())
        .map_err(|failure| source.import_error(specifier, failure, span))?;
    let key = classified.key();

    match classified {
        Specifier::Foreign { kind, .. } => {
            let module = match host.cache().resolved(&key) {
                Some(module) => module,
                None => {
                    tracing::debug!(module = %key, "foreign module left to the runtime");
                    let cache = host.cache();
                    cache.begin(key.clone(), kind.clone());
                    cache.complete(&key, ResolvedModule::opaque())
                }
            };
            Ok((key, kind, ImportTarget::Ready(module)))
        }
        Specifier::Local { path, kind } => {
            let cached = match host.cache().state(&key) {
                ModuleState::Resolved(module) => Some(Ok(ImportTarget::Ready(Arc::clone(module)))),
                ModuleState::InProgress => {
                    tracing::debug!(module = %key, "import cycle, using forward placeholder");
                    Some(Ok(ImportTarget::Pending))
                }
                ModuleState::Failed(error) => Some(Err(error.clone())),
                ModuleState::NotStarted => None,
            };

            let target = match cached {
                Some(Ok(target)) => target,
                Some(Err(error)) => {
                    return Err(source.import_error(
                        specifier,
                        ImportFailure::DependencyFailed {
                            cause: Box::new(error),
                        },
                        span,
                    ))
                }
                None => {
                    host.cache().begin(key.clone(), kind.clone());
                    match host.build_local(&key, &path, &kind) {
                        Ok(module) => ImportTarget::Ready(host.cache().complete(&key, module)),
                        Err(failure) => {
                            let error = source.import_error(specifier, failure, span);
                            host.cache().fail(&key, error.clone());
                            return Err(error);
                        }
                    }
                }
            };
            Ok((key, kind, target))
        }
    }
}
