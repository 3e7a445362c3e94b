//! Purity checking for `fx` functions.
//!
//! Runs on the lowered body: every identifier that is not bound inside the
//! function must be a global builtin, a configured pure builtin, a pure
//! function of the module or its imports, or one of the control keywords.

use crate::lower::ir::{FunctionDef, IrNode};
use std::collections::HashSet;

/// Globals an `fx` body may reference without losing purity.
pub const GLOBAL_BUILTINS: &[&str] = &[
    // operators
    "+", "-", "*", "/", "%", "**", "=", "==", "===", "!=", "!==", "not=", "<", ">", "<=", ">=",
    "&&", "||", "!",
    // data helpers
    "str", "list", "vector", "hash-map", "hash-set", "get", "nth", "first", "second", "rest",
    "last", "count", "empty?", "nil?", "cons", "concat", "conj", "assoc", "dissoc", "keys",
    "vals", "range", "map", "filter", "reduce", "some", "every", "identity", "inc", "dec",
    "abs", "min", "max", "mod", "even?", "odd?", "zero?", "pos?", "neg?", "symbol", "keyword",
    "name", "typeof", "instanceof", "in",
    // JS globals with pure members
    "Math", "Number", "String", "Array", "Object", "JSON", "Boolean", "BigInt", "parseInt",
    "parseFloat", "isNaN", "isFinite", "undefined", "null", "NaN", "Infinity",
];

/// Control keywords never reported as free references.
pub const CONTROL_KEYWORDS: [&str; 12] = [
    "loop", "recur", "if", "fn", "fx", "let", "do", "def", "var", "set!", "return", "quote",
];

/// Names a pure function may reference besides its own bindings.
#[derive(Debug, Default, Clone)]
pub struct PurityEnv<'a> {
    pub pure_functions: Option<&'a HashSet<String>>,
    pub extra_builtins: Option<&'a HashSet<String>>,
}

impl PurityEnv<'_> {
    pub fn allows(&self, name: &str) -> bool {
        CONTROL_KEYWORDS.contains(&name)
            || GLOBAL_BUILTINS.contains(&name)
            || self.extra_builtins.is_some_and(|set| set.contains(name))
            || self.pure_functions.is_some_and(|set| set.contains(name))
    }
}

/// The first external reference `def` is not allowed to make.
pub fn first_violation(def: &FunctionDef, env: &PurityEnv<'_>) -> Option<String> {
    free_identifiers(def)
        .into_iter()
        .find(|name| !env.allows(name))
}

/// Identifiers referenced but not bound inside `def`, in order of first use.
pub fn free_identifiers(def: &FunctionDef) -> Vec<String> {
    let mut walker = FreeVars::default();
    walker.function(def);
    walker.free
}

#[derive(Default)]
struct FreeVars {
    scopes: Vec<HashSet<String>>,
    free: Vec<String>,
}

impl FreeVars {
    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn reference(&mut self, name: &str) {
        if !self.is_bound(name) && !self.free.iter().any(|f| f == name) {
            self.free.push(name.to_string());
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        for (_, default) in &def.defaults {
            self.node(default);
        }
        let mut scope: HashSet<String> = def.params.iter().cloned().collect();
        scope.extend(def.rest.iter().cloned());
        scope.extend(def.name.iter().cloned());
        // declarations in the body are visible throughout it
        scope.extend(declared_names(&def.body));
        self.scopes.push(scope);
        self.nodes(&def.body);
        self.scopes.pop();
    }

    fn nodes(&mut self, nodes: &[IrNode]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &IrNode) {
        match node {
            IrNode::Literal { .. } | IrNode::ImportRef { .. } | IrNode::ExportRef { .. } => {}
            IrNode::Identifier { name } => self.reference(name),
            IrNode::Binding { name, value, .. } => {
                self.node(value);
                self.bind(name);
            }
            IrNode::Assign { target, value } => {
                self.node(target);
                self.node(value);
            }
            IrNode::FunctionDef(def) => self.function(def),
            IrNode::Call {
                callee,
                args,
                named_args,
            } => {
                self.node(callee);
                self.nodes(args);
                for (_, arg) in named_args {
                    self.node(arg);
                }
            }
            IrNode::If {
                cond,
                then,
                otherwise,
            } => {
                self.node(cond);
                self.node(then);
                self.node(otherwise);
            }
            IrNode::Sequence { body } => self.nodes(body),
            IrNode::Loop { bindings, body } => {
                self.scopes.push(HashSet::new());
                for (name, value) in bindings {
                    self.node(value);
                    self.bind(name);
                }
                self.nodes(body);
                self.scopes.pop();
            }
            IrNode::Recur { args } => self.nodes(args),
            IrNode::CollectionLit { items, .. } => self.nodes(items),
            IrNode::PropertyAccess { target, .. } => self.node(target),
            IrNode::MethodCall { target, args, .. } => {
                self.node(target);
                self.nodes(args);
            }
        }
    }
}

fn declared_names(body: &[IrNode]) -> Vec<String> {
    body.iter()
        .filter_map(|node| match node {
            IrNode::Binding { name, .. } => Some(name.clone()),
            IrNode::FunctionDef(FunctionDef {
                name: Some(name), ..
            }) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::ir::IrLiteral;

    fn def(params: &[&str], body: Vec<IrNode>) -> FunctionDef {
        FunctionDef {
            name: Some("f".into()),
            params: params.iter().map(|p| p.to_string()).collect(),
            defaults: vec![],
            rest: None,
            pure: true,
            body,
        }
    }

    fn add(a: IrNode, b: IrNode) -> IrNode {
        IrNode::call(IrNode::identifier("+"), vec![a, b])
    }

    #[test]
    fn params_and_builtins_are_allowed() {
        let f = def(&["x"], vec![add(IrNode::identifier("x"), IrNode::literal(IrLiteral::Number(1.0)))]);
        assert_eq!(free_identifiers(&f), vec!["+".to_string()]);
        assert_eq!(first_violation(&f, &PurityEnv::default()), None);
    }

    #[test]
    fn external_reference_is_reported() {
        let f = def(&["x"], vec![add(IrNode::identifier("x"), IrNode::identifier("y"))]);
        assert_eq!(first_violation(&f, &PurityEnv::default()), Some("y".to_string()));

        let pure: HashSet<String> = ["y".to_string()].into_iter().collect();
        let env = PurityEnv {
            pure_functions: Some(&pure),
            extra_builtins: None,
        };
        assert_eq!(first_violation(&f, &env), None);
    }

    #[test]
    fn loop_bindings_and_locals_are_bound() {
        let body = vec![
            IrNode::Binding {
                name: "acc".into(),
                value: Box::new(IrNode::literal(IrLiteral::Number(0.0))),
                mutable: false,
            },
            IrNode::Loop {
                bindings: vec![("i".into(), IrNode::identifier("n"))],
                body: vec![IrNode::Recur {
                    args: vec![add(IrNode::identifier("i"), IrNode::identifier("acc"))],
                }],
            },
        ];
        let f = def(&["n"], body);
        assert_eq!(first_violation(&f, &PurityEnv::default()), None);
    }
}
