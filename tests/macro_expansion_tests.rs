//! Macro expander contract tests.

use hql::errors::{ErrorCategory, HqlError, SourceContext};
use hql::macros::{self, Environment, Expander, MacroProvenance, TopLevel};
use hql::syntax::parse;

/// Expands every top-level form of `src` in a fresh module environment.
fn expand_module(src: &str) -> Result<Vec<String>, HqlError> {
    let source = SourceContext::from_file("test.hql", src);
    let mut env = macros::root().child();
    let mut expander = Expander::new(source.clone());
    let mut out = Vec::new();
    for form in parse(src, &source)? {
        if let TopLevel::Form(node) = expander.expand_top_level(&form, &mut env)? {
            out.push(node.to_string());
        }
    }
    Ok(out)
}

fn expand_one(src: &str) -> String {
    expand_module(src).unwrap().pop().unwrap()
}

#[test]
fn quasiquote_substitutes_unquoted_parameters() {
    let out = expand_one("(defmacro m [x] `(a ~x c)) (m 42)");
    assert_eq!(out, "(a 42 c)");
}

#[test]
fn unquote_splicing_flattens_lists() {
    let out = expand_one("(defmacro wrap [& xs] `(start ~@xs end)) (wrap 1 2 3)");
    assert_eq!(out, "(start 1 2 3 end)");
}

#[test]
fn user_macro_round_trip() {
    let out = expand_one("(defmacro double [x] `(* ~x 2)) (double 5)");
    assert_eq!(out, "(* 5 2)");
}

#[test]
fn macros_expand_inside_nested_forms() {
    let out = expand_one("(def f (fn [x] (when (> x 0) (print x))))");
    assert_eq!(out, "(def f (fn [x] (if (> x 0) (print x) nil)))");
}

#[test]
fn threading_expands_to_plain_calls() {
    assert_eq!(expand_one("(-> 5 (+ 1) (* 2))"), "(* (+ 5 1) 2)");
    assert_eq!(expand_one("(->> xs (map f) (filter g))"), "(filter g (map f xs))");
}

#[test]
fn cond_and_empty_cond() {
    assert_eq!(
        expand_one("(cond ((= x 1) \"one\") (else \"many\"))"),
        r#"(if (= x 1) "one" "many")"#
    );
    assert_eq!(expand_one("(cond)"), "nil");
}

#[test]
fn expansion_is_idempotent() {
    let src = "(defn f [x] (unless (and a b) (-> x (g 1))))";
    let once = expand_module(src).unwrap();
    let twice = expand_module(&once.join("\n")).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn quoted_forms_are_not_expanded() {
    assert_eq!(expand_one("'(when a b)"), "(quote (when a b))");
}

#[test]
fn self_recursive_macro_is_non_terminating() {
    let err = expand_module("(defmacro forever [x] `(forever ~x)) (forever 1)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Macro);
    assert!(err.to_string().contains("did not terminate"), "{err}");
    assert!(!err.is_fatal());
}

#[test]
fn transformer_errors_name_the_macro() {
    let err = expand_module("(defmacro one [x] x) (one)").unwrap_err();
    assert!(err.to_string().contains("macro expansion of 'one' failed"), "{err}");
}

#[test]
fn lexical_shadowing_in_child_scopes() {
    let root = macros::root();
    let mut module = root.child();
    assert!(module.is_macro("when"));
    module.define("when", macros::Binding::Unbound);
    assert!(!module.is_macro("when"));
    assert!(root.is_macro("when"));

    let fresh: Environment<'_> = root.child();
    let names = fresh.macro_names();
    assert!(names.contains(&("cond".to_string(), MacroProvenance::Core)));
}
