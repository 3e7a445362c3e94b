//! AST to IR lowering and the IR itself.

mod calls;
pub mod ir;
pub mod lowerer;
pub mod params;
pub mod purity;

pub use ir::{
    source_hash, CollectionKind, EmbeddedBody, EmbeddedModule, ExportEntry, FunctionDef,
    ImportRefEntry, IrLiteral, IrModule, IrNode,
};
pub use lowerer::{LowerCx, Lowerer, ModuleScope};
pub use params::{parse_params, FnSignature, ParamList};
pub use purity::{first_violation, free_identifiers, PurityEnv};
