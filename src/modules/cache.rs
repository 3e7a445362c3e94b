//! The per-compilation module cache.
//!
//! One [`ModuleRecord`] per [`ModuleKey`]. Records are created when a module
//! is first discovered, move through `InProgress` to `Resolved` or `Failed`,
//! and are never removed while the cache lives.

use crate::errors::HqlError;
use crate::lower::ir::EmbeddedBody;
use crate::lower::params::FnSignature;
use crate::macros::MacroTransformer;
use crate::modules::specifier::{ModuleKey, ModuleKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ExportKind {
    Value {
        pure: bool,
        signature: Option<FnSignature>,
    },
    Macro(MacroTransformer),
}

#[derive(Debug, Clone)]
pub struct ExportedBinding {
    pub local_name: String,
    pub kind: ExportKind,
}

#[derive(Debug, Clone)]
pub enum ExportTable {
    Table(BTreeMap<String, ExportedBinding>),
    /// Foreign modules: names are only known at run time.
    Opaque,
}

impl ExportTable {
    pub fn get(&self, name: &str) -> Option<&ExportedBinding> {
        match self {
            ExportTable::Table(table) => table.get(name),
            ExportTable::Opaque => None,
        }
    }

    /// Whether `name` may be imported. Opaque tables accept anything.
    pub fn permits(&self, name: &str) -> bool {
        match self {
            ExportTable::Table(table) => table.contains_key(name),
            ExportTable::Opaque => true,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            ExportTable::Table(table) => table.keys().map(String::as_str).collect(),
            ExportTable::Opaque => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub exports: ExportTable,
    /// Embedded body of a local module; `None` for foreign modules.
    pub body: Option<EmbeddedBody>,
    pub dependencies: Vec<ModuleKey>,
}

impl ResolvedModule {
    pub fn opaque() -> Self {
        Self {
            exports: ExportTable::Opaque,
            body: None,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ModuleState {
    NotStarted,
    InProgress,
    Resolved(Arc<ResolvedModule>),
    Failed(HqlError),
}

impl ModuleState {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleState::NotStarted => "not-started",
            ModuleState::InProgress => "in-progress",
            ModuleState::Resolved(_) => "resolved",
            ModuleState::Failed(_) => "failed",
        }
    }
}

const NOT_STARTED: &ModuleState = &ModuleState::NotStarted;

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub key: ModuleKey,
    pub kind: ModuleKind,
    pub state: ModuleState,
}

#[derive(Debug, Default)]
pub struct ModuleCache {
    records: HashMap<ModuleKey, ModuleRecord>,
    discovery_order: Vec<ModuleKey>,
    completion_order: Vec<ModuleKey>,
    reads: usize,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&ModuleRecord> {
        self.records.get(key)
    }

    /// State of `key`; unknown keys have not started.
    pub fn state(&self, key: &ModuleKey) -> &ModuleState {
        self.records
            .get(key)
            .map_or(NOT_STARTED, |r| &r.state)
    }

    /// The resolved module for `key`, if it has finished.
    pub fn resolved(&self, key: &ModuleKey) -> Option<Arc<ResolvedModule>> {
        match self.state(key) {
            ModuleState::Resolved(module) => Some(Arc::clone(module)),
            _ => None,
        }
    }

    /// Marks `key` as in progress, creating its record on first discovery.
    pub fn begin(&mut self, key: ModuleKey, kind: ModuleKind) {
        tracing::debug!(module = %key, "module in progress");
        if !self.records.contains_key(&key) {
            self.discovery_order.push(key.clone());
        }
        self.records.insert(
            key.clone(),
            ModuleRecord {
                key,
                kind,
                state: ModuleState::InProgress,
            },
        );
    }

    pub fn complete(&mut self, key: &ModuleKey, module: ResolvedModule) -> Arc<ResolvedModule> {
        let module = Arc::new(module);
        self.set_state(key, ModuleState::Resolved(Arc::clone(&module)));
        self.completion_order.push(key.clone());
        tracing::debug!(module = %key, "module resolved");
        module
    }

    pub fn fail(&mut self, key: &ModuleKey, error: HqlError) {
        tracing::debug!(module = %key, error = %error, "module failed");
        self.set_state(key, ModuleState::Failed(error));
    }

    fn set_state(&mut self, key: &ModuleKey, state: ModuleState) {
        if let Some(record) = self.records.get_mut(key) {
            record.state = state;
        }
    }

    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    /// Files read through this cache.
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys in the order they were first seen.
    pub fn discovery_order(&self) -> &[ModuleKey] {
        &self.discovery_order
    }

    /// Keys in the order they finished resolving.
    pub fn completion_order(&self) -> &[ModuleKey] {
        &self.completion_order
    }

    /// Records in discovery order.
    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.discovery_order
            .iter()
            .filter_map(|key| self.records.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_and_ordering() {
        let mut cache = ModuleCache::new();
        let a = ModuleKey::new("/a.hql");
        let b = ModuleKey::new("/b.hql");
        assert!(matches!(cache.state(&a), ModuleState::NotStarted));

        cache.begin(a.clone(), ModuleKind::LocalHql);
        cache.begin(b.clone(), ModuleKind::LocalHql);
        assert!(matches!(cache.state(&a), ModuleState::InProgress));

        cache.complete(&b, ResolvedModule::opaque());
        cache.complete(&a, ResolvedModule::opaque());
        assert_eq!(cache.discovery_order(), &[a.clone(), b.clone()]);
        assert_eq!(cache.completion_order(), &[b.clone(), a.clone()]);
        assert!(cache.resolved(&a).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_remembered() {
        let mut cache = ModuleCache::new();
        let key = ModuleKey::new("/bad.hql");
        cache.begin(key.clone(), ModuleKind::LocalHql);
        cache.fail(
            &key,
            HqlError::Config {
                message: "boom".into(),
            },
        );
        assert_eq!(cache.state(&key).label(), "failed");
        assert!(cache.resolved(&key).is_none());
    }
}
