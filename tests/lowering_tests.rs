//! AST to IR lowering through the full pipeline.

mod common;

use common::{compile_files_with, compile_str, ident, lower_ok, num, ENTRY};
use hql::errors::{ErrorCategory, HqlError};
use hql::lower::{CollectionKind, FunctionDef, IrLiteral, IrNode};
use hql::CompileOptions;

fn string(s: &str) -> IrNode {
    IrNode::literal(IrLiteral::String(s.into()))
}

fn single(src: &str) -> IrNode {
    let mut body = lower_ok(src);
    assert_eq!(body.len(), 1, "{body:?}");
    body.remove(0)
}

fn function(node: &IrNode) -> &FunctionDef {
    match node {
        IrNode::FunctionDef(def) => def,
        IrNode::Binding { value, .. } => function(value),
        other => panic!("expected a function, got {other:?}"),
    }
}

#[test]
fn macro_call_lowers_to_plain_call() {
    let body = lower_ok("(defmacro double [x] `(* ~x 2)) (double 5)");
    assert_eq!(body, vec![IrNode::call(ident("*"), vec![num(5.0), num(2.0)])]);
}

#[test]
fn cond_lowers_to_nested_ifs() {
    let node = single(r#"(cond ((> x 0) "pos") ((< x 0) "neg") (else "zero"))"#);
    let expected = IrNode::If {
        cond: Box::new(IrNode::call(ident(">"), vec![ident("x"), num(0.0)])),
        then: Box::new(string("pos")),
        otherwise: Box::new(IrNode::If {
            cond: Box::new(IrNode::call(ident("<"), vec![ident("x"), num(0.0)])),
            then: Box::new(string("neg")),
            otherwise: Box::new(string("zero")),
        }),
    };
    assert_eq!(node, expected);
}

#[test]
fn empty_cond_is_null() {
    assert_eq!(single("(cond)"), IrNode::null());
}

#[test]
fn if_without_else_gets_null() {
    let node = single("(if ok 1)");
    assert!(matches!(node, IrNode::If { otherwise, .. } if *otherwise == IrNode::null()));
}

#[test]
fn bindings_and_assignment() {
    let body = lower_ok("(def a 1) (var b) (set! b 2)");
    assert_eq!(
        body,
        vec![
            IrNode::Binding {
                name: "a".into(),
                value: Box::new(num(1.0)),
                mutable: false
            },
            IrNode::Binding {
                name: "b".into(),
                value: Box::new(IrNode::undefined()),
                mutable: true
            },
            IrNode::Assign {
                target: Box::new(ident("b")),
                value: Box::new(num(2.0))
            },
        ]
    );
}

#[test]
fn pure_function_rejects_free_variables() {
    let compiled = compile_str("(def rate 2) (fx scale [x] (* x rate))").unwrap();
    assert_eq!(compiled.diagnostics.len(), 1);
    match &compiled.diagnostics[0] {
        HqlError::PureFunctionViolation {
            function_name,
            offending_symbol,
            ..
        } => {
            assert_eq!(function_name, "scale");
            assert_eq!(offending_symbol, "rate");
        }
        other => panic!("expected a purity violation, got {other}"),
    }
    assert_eq!(
        compiled.failure_summary().as_deref(),
        Some("1 of 2 forms failed")
    );
}

#[test]
fn pure_function_accepts_params_builtins_and_pure_calls() {
    let body = lower_ok(
        "(fx square [x] (* x x))
         (fx sum-squares [a b] (+ (square a) (square b)))
         (fx count-down [n] (loop [i n acc 0] (if (<= i 0) acc (recur (- i 1) (+ acc i)))))",
    );
    assert_eq!(body.len(), 3);
    assert!(body.iter().all(|n| function(n).pure));

    let count_down = function(&body[2]);
    assert!(matches!(
        &count_down.body[0],
        IrNode::Loop { bindings, .. } if bindings.len() == 2
    ));
}

#[test]
fn configured_pure_builtins_are_allowed() {
    let options = CompileOptions {
        pure_builtins: vec!["clamp".into()],
        ..CompileOptions::default()
    };
    let compiled =
        compile_files_with(&[(ENTRY, "(fx f [x] (clamp x 0 1))")], ENTRY, options).unwrap();
    assert!(compiled.is_clean());
}

#[test]
fn recur_is_checked() {
    let compiled = compile_str("(recur 1) (loop [i 0] (recur 1 2))").unwrap();
    assert_eq!(compiled.diagnostics.len(), 2);
    assert!(compiled
        .diagnostics
        .iter()
        .all(|d| matches!(d, HqlError::MalformedForm { form, .. } if form == "recur")));
}

#[test]
fn named_arguments() {
    let body = lower_ok("(fn greet [name greeting = \"hi\"] greeting) (greet name: \"ada\")");
    assert_eq!(
        body[1],
        IrNode::Call {
            callee: Box::new(ident("greet")),
            args: vec![],
            named_args: vec![
                ("name".into(), string("ada")),
                ("greeting".into(), string("hi")),
            ],
        }
    );
}

#[test]
fn mixing_positional_and_named_is_ambiguous() {
    let compiled = compile_str("(fn f [x y] x) (f 1 y: 2)").unwrap();
    assert_eq!(compiled.diagnostics.len(), 1);
    assert!(matches!(
        &compiled.diagnostics[0],
        HqlError::AmbiguousArguments { callee, .. } if callee == "f"
    ));
    assert_eq!(compiled.diagnostics[0].category(), ErrorCategory::Lowering);
}

#[test]
fn unknown_named_argument_is_rejected() {
    let compiled = compile_str("(fn f [x] x) (f z: 1)").unwrap();
    assert!(matches!(
        &compiled.diagnostics[..],
        [HqlError::MalformedForm { message, .. }] if message.contains("no parameter named 'z'")
    ));
}

#[test]
fn defaults_fill_omitted_and_placeholder_arguments() {
    let body = lower_ok("(fn area [w = 1 h = 2] (* w h)) (area) (area _ 5) (other _)");
    assert_eq!(body[1], IrNode::call(ident("area"), vec![num(1.0), num(2.0)]));
    assert_eq!(body[2], IrNode::call(ident("area"), vec![num(1.0), num(5.0)]));
    assert_eq!(body[3], IrNode::call(ident("other"), vec![IrNode::undefined()]));
}

#[test]
fn computed_defaults_are_left_to_the_callee() {
    let body = lower_ok(
        "(fn g [x y = (* x 2) z = 7] (+ x y z))
         (def x 100)
         (g 5)
         (g 5 _ 1)
         (g x: 5)",
    );
    assert_eq!(body[2], IrNode::call(ident("g"), vec![num(5.0), IrNode::undefined(), num(7.0)]));
    assert_eq!(body[3], IrNode::call(ident("g"), vec![num(5.0), IrNode::undefined(), num(1.0)]));
    assert_eq!(
        body[4],
        IrNode::Call {
            callee: Box::new(ident("g")),
            args: vec![],
            named_args: vec![("x".into(), num(5.0)), ("z".into(), num(7.0))],
        }
    );

    let def = function(&body[0]);
    assert_eq!(def.defaults[0].0, "y");
    assert_eq!(
        def.defaults[0].1,
        IrNode::call(ident("*"), vec![ident("x"), num(2.0)])
    );
}

#[test]
fn omitted_trailing_computed_default_is_dropped() {
    let body = lower_ok("(fn h [a b = (list a)] b) (h 1)");
    assert_eq!(body[1], IrNode::call(ident("h"), vec![num(1.0)]));
}

#[test]
fn calls_may_precede_definitions() {
    let body = lower_ok("(f) (fn f [x = 3] x)");
    assert_eq!(body[0], IrNode::call(ident("f"), vec![num(3.0)]));
}

#[test]
fn dot_notation() {
    let body = lower_ok(
        "(console.log \"hi\")
         (.push items 1)
         (xs .filter even? .map inc)
         js.Math.PI",
    );
    assert_eq!(
        body[0],
        IrNode::MethodCall {
            target: Box::new(ident("console")),
            method: "log".into(),
            args: vec![string("hi")],
        }
    );
    assert_eq!(
        body[1],
        IrNode::MethodCall {
            target: Box::new(ident("items")),
            method: "push".into(),
            args: vec![num(1.0)],
        }
    );
    assert_eq!(
        body[2],
        IrNode::MethodCall {
            target: Box::new(IrNode::MethodCall {
                target: Box::new(ident("xs")),
                method: "filter".into(),
                args: vec![ident("even?")],
            }),
            method: "map".into(),
            args: vec![ident("inc")],
        }
    );
    assert_eq!(
        body[3],
        IrNode::property(IrNode::property(ident("js"), "Math"), "PI")
    );
}

#[test]
fn empty_list_and_vector_are_the_same_sequence() {
    let body = lower_ok("() []");
    assert_eq!(body[0], IrNode::empty_sequence());
    assert_eq!(body[0], body[1]);
}

#[test]
fn collection_elements_are_expanded() {
    let node = single("[(when a 1) #[b] {\"k\": (not c)}]");
    let IrNode::CollectionLit { kind, items } = node else {
        panic!("expected a collection");
    };
    assert_eq!(kind, CollectionKind::Array);
    assert!(matches!(items[0], IrNode::If { .. }));
    assert!(matches!(
        &items[1],
        IrNode::CollectionLit { kind: CollectionKind::Set, .. }
    ));
    assert!(matches!(
        &items[2],
        IrNode::CollectionLit { kind: CollectionKind::Map, items } if matches!(items[1], IrNode::If { .. })
    ));
}

#[test]
fn loop_binding_values_are_expanded() {
    let body = lower_ok("(fn f [a b] (loop [x (and a b)] x))");
    let def = function(&body[0]);
    let IrNode::Loop { bindings, .. } = &def.body[0] else {
        panic!("expected a loop, got {:?}", def.body);
    };
    assert_eq!(
        bindings[0],
        (
            "x".to_string(),
            IrNode::If {
                cond: Box::new(ident("a")),
                then: Box::new(ident("b")),
                otherwise: Box::new(ident("a")),
            }
        )
    );
}

#[test]
fn quasiquote_respects_nesting_levels() {
    let array = |items: Vec<IrNode>| IrNode::CollectionLit {
        kind: CollectionKind::Array,
        items,
    };
    let body = lower_ok("(def x 1) `(a ~x) `(a `(b ~x)) `(a `(b ~~x))");
    assert_eq!(body[1], array(vec![string("a"), ident("x")]));
    assert_eq!(
        body[2],
        array(vec![
            string("a"),
            array(vec![
                string("quasiquote"),
                array(vec![string("b"), array(vec![string("unquote"), string("x")])]),
            ]),
        ])
    );
    assert_eq!(
        body[3],
        array(vec![
            string("a"),
            array(vec![
                string("quasiquote"),
                array(vec![string("b"), array(vec![string("unquote"), ident("x")])]),
            ]),
        ])
    );
}

#[test]
fn quote_lowers_to_data() {
    assert_eq!(
        single("'(a 1)"),
        IrNode::CollectionLit {
            kind: CollectionKind::Array,
            items: vec![string("a"), num(1.0)],
        }
    );
}

#[test]
fn exports_are_recorded() {
    let compiled = compile_str("(def a 1) (export (fn b [] a)) (export [a as alpha])").unwrap();
    assert!(compiled.is_clean());
    let names: Vec<_> = compiled
        .ir
        .exports
        .iter()
        .map(|e| (e.local_name.as_str(), e.export_name.as_str()))
        .collect();
    assert_eq!(names, vec![("b", "b"), ("a", "alpha")]);
    assert_eq!(compiled.exports.names(), vec!["alpha", "b"]);
}

#[test]
fn form_errors_are_collected_per_form() {
    let compiled = compile_str("(def ok 1) (export missing) (if) (def fine 2) (when)").unwrap();
    assert_eq!(compiled.stats.forms, 5);
    assert_eq!(compiled.stats.failed_forms, 3);
    assert_eq!(compiled.ir.body.len(), 2);
    assert_eq!(compiled.failure_summary().as_deref(), Some("3 of 5 forms failed"));
}

#[test]
fn misplaced_forms_are_malformed() {
    let compiled = compile_str("(fn f [] (import x \"./y.hql\")) (def g when)").unwrap();
    assert_eq!(compiled.diagnostics.len(), 2);
    assert!(compiled
        .diagnostics
        .iter()
        .all(|d| d.category() == ErrorCategory::Lowering));
}

#[test]
fn parse_errors_are_fatal() {
    let err = compile_str("(def x").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Parse);
}

#[test]
fn ir_module_metadata() {
    let compiled = compile_str("(def x 1)").unwrap();
    assert_eq!(compiled.ir.path, ENTRY);
    assert_eq!(compiled.ir.source_hash, hql::lower::source_hash("(def x 1)"));
    let json = serde_json::to_value(&compiled.ir).unwrap();
    assert_eq!(json["body"][0]["node"], "Binding");
}
