//! Target-agnostic intermediate representation.
//!
//! Produced by the lowerer, consumed only by code generators. Every node is
//! serde-serializable so generators outside this crate can read it as JSON.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum IrLiteral {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
    Keyword(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Array,
    /// Items alternate key, value.
    Map,
    Set,
}

/// A function definition. `defaults` lists the parameters that have one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub defaults: Vec<(String, IrNode)>,
    pub rest: Option<String>,
    pub pure: bool,
    pub body: Vec<IrNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum IrNode {
    Literal {
        value: IrLiteral,
    },
    Identifier {
        name: String,
    },
    Binding {
        name: String,
        value: Box<IrNode>,
        mutable: bool,
    },
    Assign {
        target: Box<IrNode>,
        value: Box<IrNode>,
    },
    FunctionDef(FunctionDef),
    Call {
        callee: Box<IrNode>,
        args: Vec<IrNode>,
        named_args: Vec<(String, IrNode)>,
    },
    If {
        cond: Box<IrNode>,
        then: Box<IrNode>,
        #[serde(rename = "else")]
        otherwise: Box<IrNode>,
    },
    Sequence {
        body: Vec<IrNode>,
    },
    Loop {
        bindings: Vec<(String, IrNode)>,
        body: Vec<IrNode>,
    },
    Recur {
        args: Vec<IrNode>,
    },
    CollectionLit {
        kind: CollectionKind,
        items: Vec<IrNode>,
    },
    PropertyAccess {
        target: Box<IrNode>,
        key: String,
    },
    MethodCall {
        target: Box<IrNode>,
        method: String,
        args: Vec<IrNode>,
    },
    ImportRef {
        alias: String,
        module_key: String,
    },
    ExportRef {
        local_name: String,
        export_name: String,
    },
}

impl IrNode {
    pub fn literal(value: IrLiteral) -> Self {
        IrNode::Literal { value }
    }

    pub fn null() -> Self {
        Self::literal(IrLiteral::Null)
    }

    pub fn undefined() -> Self {
        Self::literal(IrLiteral::Undefined)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        IrNode::Identifier { name: name.into() }
    }

    pub fn call(callee: IrNode, args: Vec<IrNode>) -> Self {
        IrNode::Call {
            callee: Box::new(callee),
            args,
            named_args: Vec::new(),
        }
    }

    pub fn property(target: IrNode, key: impl Into<String>) -> Self {
        IrNode::PropertyAccess {
            target: Box::new(target),
            key: key.into(),
        }
    }

    pub fn empty_sequence() -> Self {
        IrNode::CollectionLit {
            kind: CollectionKind::Array,
            items: Vec::new(),
        }
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + match self {
            IrNode::Literal { .. }
            | IrNode::Identifier { .. }
            | IrNode::ImportRef { .. }
            | IrNode::ExportRef { .. } => 0,
            IrNode::Binding { value, .. } => value.size(),
            IrNode::Assign { target, value } => target.size() + value.size(),
            IrNode::FunctionDef(def) => {
                def.defaults.iter().map(|(_, d)| d.size()).sum::<usize>() + total(&def.body)
            }
            IrNode::Call {
                callee,
                args,
                named_args,
            } => {
                callee.size()
                    + total(args)
                    + named_args.iter().map(|(_, a)| a.size()).sum::<usize>()
            }
            IrNode::If {
                cond,
                then,
                otherwise,
            } => cond.size() + then.size() + otherwise.size(),
            IrNode::Sequence { body } | IrNode::Recur { args: body } => total(body),
            IrNode::CollectionLit { items, .. } => total(items),
            IrNode::Loop { bindings, body } => {
                bindings.iter().map(|(_, v)| v.size()).sum::<usize>() + total(body)
            }
            IrNode::PropertyAccess { target, .. } => target.size(),
            IrNode::MethodCall { target, args, .. } => target.size() + total(args),
        }
    }
}

fn total(nodes: &[IrNode]) -> usize {
    nodes.iter().map(IrNode::size).sum()
}

/// One import of the module, by generated alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRefEntry {
    pub alias: String,
    pub module_key: String,
    /// False for npm, jsr and remote modules, which are left to the runtime.
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    pub local_name: String,
    pub export_name: String,
}

/// A JavaScript import statement inside an embedded JS module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsImportBinding {
    pub specifier: String,
    pub module_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbeddedBody {
    Hql {
        module: IrModule,
    },
    Js {
        source: String,
        imports: Vec<JsImportBinding>,
        exports: Vec<String>,
    },
}

/// A local dependency inlined into the importing unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedModule {
    pub key: String,
    pub body: EmbeddedBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrModule {
    pub path: String,
    /// Hex SHA-256 of the module source.
    pub source_hash: String,
    pub body: Vec<IrNode>,
    pub exports: Vec<ExportEntry>,
    pub import_refs: Vec<ImportRefEntry>,
    /// Every local module reachable from this one, dependencies first.
    pub embedded: Vec<EmbeddedModule>,
}

/// Hex-encoded SHA-256 of `source`.
pub fn source_hash(source: &str) -> String {
    use sha2::{Digest, Sha256};

    Sha256::digest(source.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let hash = source_hash("(def x 1)");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, source_hash("(def x 1)"));
        assert_ne!(hash, source_hash("(def x 2)"));
    }

    #[test]
    fn serializes_with_node_tags() {
        let node = IrNode::call(
            IrNode::identifier("*"),
            vec![
                IrNode::literal(IrLiteral::Number(5.0)),
                IrNode::literal(IrLiteral::Number(2.0)),
            ],
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["node"], "Call");
        assert_eq!(json["callee"]["name"], "*");
        assert_eq!(json["args"][1]["value"]["value"], 2.0);
        assert_eq!(node.size(), 4);
    }
}
