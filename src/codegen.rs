//! The contract between the front end and code generators.
//!
//! Generators only ever see [`IrModule`]s. The crate ships one generator that
//! renders the IR as JSON, which is what external JavaScript emitters read.

use crate::config::TargetDialect;
use crate::errors::HqlError;
use crate::lower::ir::IrModule;
use serde::Serialize;

pub trait CodeGenerator {
    fn render(&self, module: &IrModule, target: TargetDialect) -> Result<String, HqlError>;
}

/// Renders `{ "target": ..., "module": ... }` as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct IrJsonRenderer {
    pub pretty: bool,
}

#[derive(Serialize)]
struct Envelope<'a> {
    target: TargetDialect,
    module: &'a IrModule,
}

impl CodeGenerator for IrJsonRenderer {
    fn render(&self, module: &IrModule, target: TargetDialect) -> Result<String, HqlError> {
        let envelope = Envelope { target, module };
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&envelope)
        } else {
            serde_json::to_string(&envelope)
        };
        rendered.map_err(|e| HqlError::Config {
            message: format!("cannot serialize IR for {}: {}", module.path, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::ir::{source_hash, IrLiteral, IrNode};

    #[test]
    fn renders_target_and_module() {
        let module = IrModule {
            path: "main.hql".into(),
            source_hash: source_hash("1"),
            body: vec![IrNode::literal(IrLiteral::Number(1.0))],
            exports: vec![],
            import_refs: vec![],
            embedded: vec![],
        };
        let json = IrJsonRenderer::default()
            .render(&module, TargetDialect::CommonJs)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"], "commonjs");
        assert_eq!(value["module"]["path"], "main.hql");
        assert_eq!(value["module"]["body"][0]["node"], "Literal");
    }
}
