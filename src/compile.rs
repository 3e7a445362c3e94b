//! The compilation pipeline.
//!
//! Parse, expand, resolve imports and lower one module. Local dependencies
//! are compiled through the same pipeline on first import and memoized in
//! the [`ModuleCache`] of the compilation.

use crate::ast::AstNode;
use crate::config::CompileOptions;
use crate::errors::{HqlError, ImportFailure, SourceContext};
use crate::lower::ir::{source_hash, EmbeddedBody, EmbeddedModule, IrModule, IrNode};
use crate::lower::{LowerCx, Lowerer};
use crate::macros::{
    self, Binding, Environment, ExpansionStep, Expander, MacroBinding, MacroProvenance, TopLevel,
};
use crate::modules::cache::{ExportKind, ExportTable, ExportedBinding, ModuleCache, ResolvedModule};
use crate::modules::js::build_js_module;
use crate::modules::loader::{FsLoader, SourceLoader};
use crate::modules::resolver::{resolve_import, ImportBinding, ModuleHost, ResolvedImport};
use crate::modules::specifier::{ModuleKey, ModuleKind};
use crate::syntax::parse;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub forms: usize,
    pub failed_forms: usize,
    pub expansions: usize,
    /// Modules known to the cache after this compilation.
    pub modules: usize,
    /// Files read through the cache.
    pub reads: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub ir: IrModule,
    /// Per-form errors; the forms that raised them are missing from `ir`.
    pub diagnostics: Vec<HqlError>,
    pub stats: CompileStats,
    pub exports: ExportTable,
    /// Macro invocations of this module, when tracing is enabled.
    pub expansion_trace: Vec<ExpansionStep>,
}

impl CompiledModule {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// `"N of M forms failed"`, if any did.
    pub fn failure_summary(&self) -> Option<String> {
        (!self.diagnostics.is_empty()).then(|| {
            format!(
                "{} of {} forms failed",
                self.stats.failed_forms, self.stats.forms
            )
        })
    }
}

/// A module after macro expansion and import resolution.
#[derive(Debug, Clone)]
pub struct ExpandedModule {
    pub forms: Vec<AstNode>,
    pub diagnostics: Vec<HqlError>,
    pub trace: Vec<ExpansionStep>,
    /// Macros visible at the end of the module.
    pub macros: Vec<(String, MacroProvenance)>,
}

/// Compiles `source` as the module at `file_path` with default options,
/// reading dependencies from disk into `cache`.
pub fn compile_module(
    source: &str,
    file_path: &Path,
    cache: &mut ModuleCache,
) -> Result<CompiledModule, HqlError> {
    Compiler::new(CompileOptions::default()).compile_source(source, file_path, cache)
}

pub struct Compiler {
    options: CompileOptions,
    loader: Box<dyn SourceLoader>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self::with_loader(options, FsLoader)
    }

    pub fn with_loader(options: CompileOptions, loader: impl SourceLoader + 'static) -> Self {
        Self {
            options,
            loader: Box::new(loader),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn loader(&self) -> &dyn SourceLoader {
        &*self.loader
    }

    /// Reads and compiles the entry module at `path` with a fresh cache.
    pub fn compile_file(&self, path: &Path) -> Result<CompiledModule, HqlError> {
        let mut cache = ModuleCache::new();
        self.compile_file_with(path, &mut cache)
    }

    pub fn compile_file_with(
        &self,
        path: &Path,
        cache: &mut ModuleCache,
    ) -> Result<CompiledModule, HqlError> {
        let text = self
            .loader
            .read(path)
            .map_err(|e| HqlError::io(path.display().to_string(), &e))?;
        cache.record_read();
        self.compile_source(&text, path, cache)
    }

    /// Expands the module at `path` without lowering it. Imports are
    /// resolved so imported macros take part in the expansion.
    pub fn expand_file(&self, path: &Path) -> Result<ExpandedModule, HqlError> {
        let text = self
            .loader
            .read(path)
            .map_err(|e| HqlError::io(path.display().to_string(), &e))?;
        let path = self.loader.canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut cache = ModuleCache::new();
        cache.record_read();
        cache.begin(ModuleKey::from_path(&path), ModuleKind::LocalHql);

        let source = SourceContext::from_file(path.display().to_string(), text.as_str());
        let forms = parse(&text, &source)?;
        let mut env = macros::root().child();
        let mut expander = Expander::new(source.clone())
            .with_max_depth(self.options.max_expansion_depth)
            .with_trace(true);
        let mut diagnostics = Vec::new();
        let mut host = ModuleCompiler {
            loader: &*self.loader,
            options: &self.options,
            cache: &mut cache,
        };
        let prepared = prepare_forms(
            &mut host,
            &forms,
            &path,
            &source,
            &mut env,
            &mut expander,
            &mut diagnostics,
        )?;

        Ok(ExpandedModule {
            forms: prepared.iter().map(|p| p.node().clone()).collect(),
            diagnostics,
            trace: expander.take_trace(),
            macros: env.macro_names(),
        })
    }

    /// Compiles `text` as the entry module at `path`.
    pub fn compile_source(
        &self,
        text: &str,
        path: &Path,
        cache: &mut ModuleCache,
    ) -> Result<CompiledModule, HqlError> {
        let path = self.loader.canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let key = ModuleKey::from_path(&path);
        cache.begin(key.clone(), ModuleKind::LocalHql);

        let mut host = ModuleCompiler {
            loader: &*self.loader,
            options: &self.options,
            cache,
        };
        let unit = match host.compile_unit(text, &path) {
            Ok(unit) => unit,
            Err(error) => {
                host.cache.fail(&key, error.clone());
                return Err(error);
            }
        };

        let mut seen = HashSet::from([key.clone()]);
        let embedded = collect_embedded(host.cache, &mut seen, &unit.dependencies);
        let mut ir = unit.ir;
        ir.embedded = embedded;

        match unit.diagnostics.first() {
            Some(first) => host.cache.fail(&key, first.clone()),
            None => {
                host.cache.complete(
                    &key,
                    ResolvedModule {
                        exports: unit.exports.clone(),
                        body: None,
                        dependencies: unit.dependencies.clone(),
                    },
                );
            }
        }

        let stats = CompileStats {
            forms: unit.forms,
            failed_forms: unit.diagnostics.len(),
            expansions: unit.expansions,
            modules: host.cache.len(),
            reads: host.cache.reads(),
        };
        tracing::info!(
            module = %key,
            forms = stats.forms,
            failed = stats.failed_forms,
            modules = stats.modules,
            "compiled module"
        );

        Ok(CompiledModule {
            ir,
            diagnostics: unit.diagnostics,
            stats,
            exports: unit.exports,
            expansion_trace: unit.trace,
        })
    }
}

// =============================
// Per-module compilation
// =============================

/// Output of compiling one HQL module.
pub(crate) struct Unit {
    pub ir: IrModule,
    pub diagnostics: Vec<HqlError>,
    pub exports: ExportTable,
    pub dependencies: Vec<ModuleKey>,
    pub forms: usize,
    pub expansions: usize,
    pub trace: Vec<ExpansionStep>,
}

/// The [`ModuleHost`] of a compilation: owns nothing, borrows the loader,
/// options and cache for as long as the entry module is being compiled.
pub(crate) struct ModuleCompiler<'a> {
    pub loader: &'a dyn SourceLoader,
    pub options: &'a CompileOptions,
    pub cache: &'a mut ModuleCache,
}

impl ModuleHost for ModuleCompiler<'_> {
    fn loader(&self) -> &dyn SourceLoader {
        self.loader
    }

    fn cache(&mut self) -> &mut ModuleCache {
        self.cache
    }

    fn build_local(
        &mut self,
        key: &ModuleKey,
        path: &Path,
        kind: &ModuleKind,
    ) -> Result<ResolvedModule, ImportFailure> {
        let text = self
            .loader
            .read(path)
            .map_err(|e| ImportFailure::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        self.cache.record_read();
        tracing::debug!(module = %key, "read module source");

        if matches!(kind, ModuleKind::LocalJs) {
            return build_js_module(self, path, text);
        }

        let unit = self
            .compile_unit(&text, path)
            .map_err(|error| ImportFailure::DependencyFailed {
                cause: Box::new(error),
            })?;
        if let Some(first) = unit.diagnostics.into_iter().next() {
            return Err(ImportFailure::DependencyFailed {
                cause: Box::new(first),
            });
        }
        Ok(ResolvedModule {
            exports: unit.exports,
            body: Some(EmbeddedBody::Hql { module: unit.ir }),
            dependencies: unit.dependencies,
        })
    }
}

impl ModuleCompiler<'_> {
    pub(crate) fn compile_unit(&mut self, text: &str, path: &Path) -> Result<Unit, HqlError> {
        let source = SourceContext::from_file(path.display().to_string(), text);
        let forms = parse(text, &source)?;

        let mut env = macros::root().child();
        let mut expander = Expander::new(source.clone())
            .with_max_depth(self.options.max_expansion_depth)
            .with_trace(self.options.trace_expansion);
        let mut lowerer = Lowerer::new(source.clone(), self.options.pure_builtins.iter().cloned());
        let mut diagnostics = Vec::new();

        let body = compile_forms(
            self,
            &forms,
            path,
            &source,
            &mut env,
            &mut expander,
            &mut lowerer,
            &mut diagnostics,
        )?;

        let exports = export_table(&lowerer, &env);
        let dependencies = local_dependencies(&lowerer);
        let scope = lowerer.scope();
        Ok(Unit {
            ir: IrModule {
                path: path.display().to_string(),
                source_hash: source_hash(text),
                body,
                exports: scope.exports.clone(),
                import_refs: scope.import_refs.clone(),
                embedded: Vec::new(),
            },
            diagnostics,
            exports,
            dependencies,
            forms: forms.len(),
            expansions: expander.expansions(),
            trace: expander.take_trace(),
        })
    }
}

/// A top-level form after expansion and import resolution.
pub(crate) enum Prepared {
    Form(AstNode),
    Import(ResolvedImport),
}

impl Prepared {
    /// The form as it stands after this stage; imports carry their module key.
    pub fn node(&self) -> &AstNode {
        match self {
            Prepared::Form(form) => form,
            Prepared::Import(import) => &import.form,
        }
    }
}

/// Expands every top-level form and resolves the imports among them.
///
/// Fatal errors are returned; the others are pushed to `diagnostics` and
/// the failing form is skipped.
pub(crate) fn prepare_forms(
    host: &mut ModuleCompiler<'_>,
    forms: &[AstNode],
    path: &Path,
    source: &SourceContext,
    env: &mut Environment<'static>,
    expander: &mut Expander,
    diagnostics: &mut Vec<HqlError>,
) -> Result<Vec<Prepared>, HqlError> {
    let mut prepared = Vec::with_capacity(forms.len());
    for form in forms {
        let expanded = match expander.expand_top_level(form, env) {
            Ok(TopLevel::Form(expanded)) => expanded,
            Ok(TopLevel::MacroDefinition(_)) => continue,
            Err(error) => {
                collect(error, source, diagnostics)?;
                continue;
            }
        };
        match resolve_import(&expanded, path, &mut *host, source)? {
            Some(import) => {
                bind_imported_macros(&import, env);
                prepared.push(Prepared::Import(import));
            }
            None => prepared.push(Prepared::Form(expanded)),
        }
    }
    Ok(prepared)
}

/// Runs expansion, import resolution and lowering over `forms`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compile_forms(
    host: &mut ModuleCompiler<'_>,
    forms: &[AstNode],
    path: &Path,
    source: &SourceContext,
    env: &mut Environment<'static>,
    expander: &mut Expander,
    lowerer: &mut Lowerer,
    diagnostics: &mut Vec<HqlError>,
) -> Result<Vec<IrNode>, HqlError> {
    let prepared = prepare_forms(host, forms, path, source, env, expander, diagnostics)?;

    let mut cx = LowerCx {
        expander,
        env: &*env,
    };
    for item in &prepared {
        if let Prepared::Form(form) = item {
            lowerer.declare(form, &mut cx);
        }
    }

    let mut body = Vec::new();
    for item in &prepared {
        match item {
            Prepared::Import(import) => body.extend(lowerer.lower_import(import)),
            Prepared::Form(form) => match lowerer.lower_top_level(form, &mut cx) {
                Ok(nodes) => body.extend(nodes),
                Err(error) => collect(error, source, diagnostics)?,
            },
        }
    }
    Ok(body)
}

fn collect(
    error: HqlError,
    source: &SourceContext,
    diagnostics: &mut Vec<HqlError>,
) -> Result<(), HqlError> {
    if error.is_fatal() {
        return Err(error);
    }
    tracing::warn!(file = %source.name, error = %error, "form failed");
    diagnostics.push(error);
    Ok(())
}

fn bind_imported_macros(import: &ResolvedImport, env: &mut Environment<'static>) {
    let (ImportBinding::Named(names), Some(exports)) = (&import.binding, import.exports()) else {
        return;
    };
    for named in names {
        if let Some(ExportedBinding {
            kind: ExportKind::Macro(transformer),
            ..
        }) = exports.get(&named.name)
        {
            *env = env.with_binding(
                named.local.clone(),
                Binding::Macro(MacroBinding {
                    transformer: transformer.clone(),
                    provenance: MacroProvenance::Imported,
                }),
            );
        }
    }
}

fn export_table(lowerer: &Lowerer, env: &Environment<'_>) -> ExportTable {
    let scope = lowerer.scope();
    let mut table = BTreeMap::new();
    for entry in &scope.exports {
        table.insert(
            entry.export_name.clone(),
            ExportedBinding {
                local_name: entry.local_name.clone(),
                kind: ExportKind::Value {
                    pure: scope.pure_functions.contains(&entry.local_name),
                    signature: scope.signatures.get(&entry.local_name).cloned(),
                },
            },
        );
    }
    for (exported, local) in &scope.macro_exports {
        if let Some(binding) = env.lookup_macro(local) {
            table.insert(
                exported.clone(),
                ExportedBinding {
                    local_name: local.clone(),
                    kind: ExportKind::Macro(binding.transformer.clone()),
                },
            );
        }
    }
    ExportTable::Table(table)
}

fn local_dependencies(lowerer: &Lowerer) -> Vec<ModuleKey> {
    let mut seen = HashSet::new();
    lowerer
        .scope()
        .import_refs
        .iter()
        .filter(|r| r.embedded && seen.insert(r.module_key.clone()))
        .map(|r| ModuleKey::new(r.module_key.as_str()))
        .collect()
}

/// Every resolved local module reachable from `deps`, dependencies first.
/// Keys in `seen` are skipped; every emitted key is added to it.
pub(crate) fn collect_embedded(
    cache: &ModuleCache,
    seen: &mut HashSet<ModuleKey>,
    deps: &[ModuleKey],
) -> Vec<EmbeddedModule> {
    fn visit(
        cache: &ModuleCache,
        key: &ModuleKey,
        seen: &mut HashSet<ModuleKey>,
        out: &mut Vec<EmbeddedModule>,
    ) {
        if !seen.insert(key.clone()) {
            return;
        }
        let Some(module) = cache.resolved(key) else {
            return;
        };
        for dep in &module.dependencies {
            visit(cache, dep, seen, out);
        }
        if let Some(body) = &module.body {
            out.push(EmbeddedModule {
                key: key.to_string(),
                body: body.clone(),
            });
        }
    }

    let mut out = Vec::new();
    for dep in deps {
        visit(cache, dep, seen, &mut out);
    }
    out
}
