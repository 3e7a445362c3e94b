//! Import resolution across in-memory and on-disk module trees.

mod common;

use common::{compile_files, ENTRY};
use hql::errors::{ErrorCategory, HqlError, ImportFailure};
use hql::lower::{EmbeddedBody, IrNode};
use hql::{CompileOptions, Compiler};

fn import_failure(err: &HqlError) -> &ImportFailure {
    match err {
        HqlError::ImportResolution { reason, .. } => reason,
        other => panic!("expected an import error, got {other}"),
    }
}

fn embedded_keys(module: &hql::CompiledModule) -> Vec<&str> {
    module.ir.embedded.iter().map(|m| m.key.as_str()).collect()
}

#[test]
fn import_cycle_reads_each_file_once() {
    let compiled = compile_files(
        &[
            (
                "/app/main.hql",
                r#"(import [g] from "./b.hql") (defn f [x] (g x)) (export f)"#,
            ),
            (
                "/app/b.hql",
                r#"(import [f] from "./main.hql") (defn g [x] x) (export g)"#,
            ),
        ],
        ENTRY,
    )
    .unwrap();

    assert!(compiled.is_clean());
    assert_eq!(compiled.stats.reads, 2);
    assert_eq!(compiled.stats.modules, 2);
    assert_eq!(embedded_keys(&compiled), vec!["/app/b.hql"]);

    // b saw main as a forward placeholder and binds f lazily.
    let EmbeddedBody::Hql { module } = &compiled.ir.embedded[0].body else {
        panic!("expected an HQL module");
    };
    assert!(module.body.contains(&IrNode::Binding {
        name: "f".into(),
        value: Box::new(IrNode::property(IrNode::identifier("main"), "f")),
        mutable: false,
    }));
}

#[test]
fn shared_dependency_is_compiled_once() {
    let compiled = compile_files(
        &[
            (
                "/app/main.hql",
                r#"(import "./b.hql") (import "./c.hql")"#,
            ),
            ("/app/b.hql", r#"(import [d] from "./d.hql") (def b d) (export b)"#),
            ("/app/c.hql", r#"(import [d] from "./d.hql") (def c d) (export c)"#),
            ("/app/d.hql", "(def d 1) (export d)"),
        ],
        ENTRY,
    )
    .unwrap();

    assert_eq!(compiled.stats.reads, 4);
    assert_eq!(
        embedded_keys(&compiled),
        vec!["/app/d.hql", "/app/b.hql", "/app/c.hql"]
    );
}

#[test]
fn private_default_does_not_leak_into_importer() {
    let compiled = compile_files(
        &[
            (
                "/app/main.hql",
                r#"(import [scale] from "./lib.hql") (scale 3) (scale 3 _)"#,
            ),
            (
                "/app/lib.hql",
                "(def base 10) (fn scale [x k = base] (* x k)) (export scale)",
            ),
        ],
        ENTRY,
    )
    .unwrap();

    assert!(compiled.is_clean());
    let three = IrNode::literal(hql::lower::IrLiteral::Number(3.0));
    let calls: Vec<_> = compiled
        .ir
        .body
        .iter()
        .filter(|n| matches!(n, IrNode::Call { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            &IrNode::call(IrNode::identifier("scale"), vec![three.clone()]),
            &IrNode::call(IrNode::identifier("scale"), vec![three, IrNode::undefined()]),
        ]
    );
}

#[test]
fn foreign_aliases_are_disambiguated() {
    let compiled = compile_files(
        &[(
            ENTRY,
            r#"(import lodash from "npm:lodash")
               (import [chunk] from "npm:lodash@4")
               (import path from "jsr:@std/path")"#,
        )],
        ENTRY,
    )
    .unwrap();

    let refs: Vec<_> = compiled
        .ir
        .import_refs
        .iter()
        .map(|r| (r.alias.as_str(), r.module_key.as_str(), r.embedded))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("lodash", "npm:lodash", false),
            ("lodash_2", "npm:lodash@4", false),
            ("path", "jsr:@std/path", false),
        ]
    );
    assert!(compiled.ir.body.contains(&IrNode::Binding {
        name: "chunk".into(),
        value: Box::new(IrNode::property(IrNode::identifier("lodash_2"), "chunk")),
        mutable: false,
    }));
    assert!(compiled.ir.embedded.is_empty());
}

#[test]
fn js_and_hql_modules_import_each_other() {
    let compiled = compile_files(
        &[
            ("/app/main.hql", r#"(import [greet] from "./util.js") (greet "ada")"#),
            (
                "/app/util.js",
                "import { helper } from \"./helper.hql\";\nexport function greet(name) { return helper(name); }\n",
            ),
            ("/app/helper.hql", "(defn helper [s] s) (export helper)"),
        ],
        ENTRY,
    )
    .unwrap();

    assert!(compiled.is_clean());
    assert_eq!(
        embedded_keys(&compiled),
        vec!["/app/helper.hql", "/app/util.js"]
    );
    match &compiled.ir.embedded[1].body {
        EmbeddedBody::Js {
            imports, exports, ..
        } => {
            assert_eq!(imports[0].module_key, "/app/helper.hql");
            assert_eq!(exports, &vec!["greet".to_string()]);
        }
        other => panic!("expected a JS module, got {other:?}"),
    }
}

#[test]
fn imported_macros_expand_in_the_importer() {
    let compiled = compile_files(
        &[
            (
                "/app/main.hql",
                r#"(import [twice] from "./macros.hql") (twice 3)"#,
            ),
            (
                "/app/macros.hql",
                "(defmacro twice [x] `(* ~x 2)) (export twice)",
            ),
        ],
        ENTRY,
    )
    .unwrap();

    assert!(compiled.is_clean(), "{:?}", compiled.diagnostics);
    assert_eq!(
        compiled.ir.body.last(),
        Some(&IrNode::call(
            IrNode::identifier("*"),
            vec![common::num(3.0), common::num(2.0)]
        ))
    );
}

#[test]
fn missing_module_is_not_found() {
    let err = compile_files(&[(ENTRY, r#"(import x from "./missing.hql")"#)], ENTRY).unwrap_err();
    assert!(matches!(import_failure(&err), ImportFailure::NotFound { .. }));
    assert!(err.is_fatal());
}

#[test]
fn bare_specifier_is_invalid() {
    let err = compile_files(&[(ENTRY, r#"(import x from "lodash")"#)], ENTRY).unwrap_err();
    assert!(matches!(
        import_failure(&err),
        ImportFailure::InvalidSpecifier { .. }
    ));
}

#[test]
fn private_bindings_are_not_importable() {
    let err = compile_files(
        &[
            (ENTRY, r#"(import [secret] from "./b.hql")"#),
            ("/app/b.hql", "(def secret 1) (def shown 2) (export shown)"),
        ],
        ENTRY,
    )
    .unwrap_err();
    assert!(matches!(
        import_failure(&err),
        ImportFailure::UnknownExport { name } if name == "secret"
    ));
}

#[test]
fn broken_dependency_fails_the_importer() {
    let err = compile_files(
        &[
            (ENTRY, r#"(import [g] from "./b.hql")"#),
            ("/app/b.hql", "(defn g [x]"),
        ],
        ENTRY,
    )
    .unwrap_err();
    match import_failure(&err) {
        ImportFailure::DependencyFailed { cause } => {
            assert_eq!(cause.category(), ErrorCategory::Parse)
        }
        other => panic!("expected DependencyFailed, got {other}"),
    }
}

#[test]
fn modules_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("lib")).unwrap();
    std::fs::write(
        dir.path().join("main.hql"),
        r#"(import [area] from "./lib/geometry.hql") (area 2)"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("lib/geometry.hql"),
        "(fx area [r = 1] (* r r)) (export area)",
    )
    .unwrap();

    let compiled = Compiler::new(CompileOptions::default())
        .compile_file(&dir.path().join("main.hql"))
        .unwrap();
    assert!(compiled.is_clean(), "{:?}", compiled.diagnostics);
    assert_eq!(compiled.stats.reads, 2);
    assert_eq!(compiled.ir.embedded.len(), 1);
    assert!(compiled.ir.embedded[0].key.ends_with("geometry.hql"));
    assert_eq!(compiled.exports.names(), Vec::<&str>::new());
}
