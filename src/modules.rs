//! Module resolution: specifiers, loading, the module cache and JS modules.

pub mod cache;
pub mod js;
pub mod loader;
pub mod resolver;
pub mod specifier;

pub use cache::{ExportKind, ExportTable, ExportedBinding, ModuleCache, ModuleState, ResolvedModule};
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use resolver::{resolve_import, ImportBinding, ImportTarget, ModuleHost, ResolvedImport};
pub use specifier::{classify, ModuleKey, ModuleKind, Specifier};
