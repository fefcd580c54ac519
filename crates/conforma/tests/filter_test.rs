//! Filter registration and execution through the pipeline.

use std::sync::Arc;

use conforma::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

// ============================================================================
// REGISTRATION FORMS
// ============================================================================

#[test]
fn every_step_form_is_accepted() {
    let mut form = Conforma::from_data(json!({
        "value1": 123,
        "value2": "TEST",
        "value3": "TEST",
        "value4": "TEST",
        "value5": "TEST",
        "value6": "TEST"
    }));
    form.filter("value1", "string")
        .unwrap()
        .filter("value2", ["string", "lowerCase"])
        .unwrap()
        .filter(
            "value3",
            FilterStep::inline(|v| json!(format!("{}TEST", v.as_str().unwrap_or_default()))),
        )
        .unwrap()
        .filter("value4", "int")
        .unwrap()
        .filter("value5", json!(["lowerCase", {"stringLength": 3}]))
        .unwrap()
        .filter("value6", json!({"stringLength": 2}))
        .unwrap()
        .filter("value7", ["string", "lowerCase"])
        .unwrap();

    assert_eq!(
        form.get_clean_data(),
        json!({
            "value1": "123",
            "value2": "test",
            "value3": "TESTTEST",
            "value4": 0,
            "value5": "tes",
            "value6": "TE",
            "value7": ""
        })
    );
}

#[test]
fn comma_separated_names_are_not_split() {
    let mut form = Conforma::new();
    let err = form.filter("a", "trim,int").unwrap_err();
    assert_eq!(err, ConfigError::UnknownFilter("trim,int".into()));
}

#[test]
fn unknown_filter_fails_at_registration() {
    let mut form = Conforma::from_data(json!({"value1": 123}));
    let err = form.filter("value1", "unknown").unwrap_err();

    assert_eq!(err, ConfigError::UnknownFilter("unknown".into()));
    assert_eq!(err.to_string(), r#"filter "unknown" not available"#);
}

#[test]
fn failed_registration_leaves_chain_untouched() {
    let mut form = Conforma::from_data(json!({"a": " x "}));
    assert!(form.filter("a", ["trim", "nope"]).is_err());
    assert_eq!(form.get_clean_data(), json!({"a": " x "}));
}

#[test]
fn steps_accumulate_across_calls() {
    let mut form = Conforma::from_data(json!({"a": "  Hello "}));
    form.filter("a", "trim").unwrap().filter("a", "upperCase").unwrap();
    assert_eq!(form.get_clean_data(), json!({"a": "HELLO"}));
}

#[test]
fn nested_paths_are_filtered_in_place() {
    let mut form = Conforma::from_data(json!({"value4": {"value1": "  x  "}}));
    form.filter("value4.value1", "trim").unwrap();
    assert_eq!(form.get_clean_data(), json!({"value4": {"value1": "x"}}));
}

#[test]
fn custom_registry_filters() {
    let mut registry = Registry::builtin();
    registry
        .filters
        .register("double", |v: Value, _: Option<&Value>| {
            json!(v.as_i64().unwrap_or_default() * 2)
        });

    let mut form = Conforma::with_registry(Arc::new(registry));
    form.set_data(json!({"n": "21"}))
        .filter("n", ["int", "double"])
        .unwrap();
    assert_eq!(form.get_clean_data(), json!({"n": 42}));
}

// ============================================================================
// BUILT-IN FILTERS IN CONTEXT
// ============================================================================

#[rstest]
#[case("trim", json!("  a b  "), json!("a b"))]
#[case("int", json!("12abc"), json!(12))]
#[case("float", json!("1.5kg"), json!(1.5))]
#[case("bool", json!("yes"), json!(true))]
#[case("bool", json!("off"), json!(false))]
#[case("digit", json!("a1b2.3"), json!("12.3"))]
#[case("escapeHtml", json!("<b>"), json!("&lt;b&gt;"))]
#[case("stripHtmlTags", json!(r#"before <div name="foo">tag</div> after"#), json!("before tag after"))]
#[case("uniqueList", json!(["123", "123", 123, "foo", "bar", "foo"]), json!(["123", 123, "foo", "bar"]))]
#[case("object", json!("{\"foo\": \"bar\"}"), json!({}))]
fn builtin_filter(#[case] name: &str, #[case] input: Value, #[case] expected: Value) {
    let mut form = Conforma::from_data(json!({"field": input}));
    form.filter("field", name).unwrap();
    assert_eq!(form.get_clean_data()["field"], expected);
}

#[rstest]
#[case(json!("{}"), json!({}))]
#[case(json!("{foo: \"bar\"}"), json!({}))]
#[case(json!("{\"foo\": \"bar\"}"), json!({"foo": "bar"}))]
#[case(json!({"foo": "bar"}), json!({"foo": "bar"}))]
#[case(json!(true), json!({}))]
#[case(json!(12345), json!({}))]
#[case(json!(null), json!({}))]
fn object_filter_with_copy(#[case] input: Value, #[case] expected: Value) {
    let mut form = Conforma::from_data(json!({"field": input}));
    form.filter("field", json!({"object": true})).unwrap();
    assert_eq!(form.get_clean_data()["field"], expected);
}

// ============================================================================
// DROP
// ============================================================================

#[test]
fn drop_removes_paths_after_filtering() {
    let mut form = Conforma::new();
    form.filter("value1", "object")
        .unwrap()
        .filter("value1.child", "string")
        .unwrap()
        .filter("value2", "string")
        .unwrap()
        .filter("value3", "object")
        .unwrap()
        .filter("value3.child", "string")
        .unwrap()
        .filter("value3.child2", "string")
        .unwrap()
        .filter("value3.child3", "string")
        .unwrap();
    form.drop_fields("value1.child, value2")
        .drop_fields(["value3.child", "value3.child3"]);

    assert_eq!(
        form.get_clean_data(),
        json!({"value1": {}, "value3": {"child2": ""}})
    );
}

#[test]
fn drop_list_applies_on_every_run() {
    let mut form = Conforma::from_data(json!({"secret": "x", "keep": 1}));
    form.drop_fields("secret");
    assert_eq!(form.get_clean_data(), json!({"keep": 1}));

    form.set_data(json!({"secret": "again"}));
    assert_eq!(form.get_clean_data(), json!({"keep": 1}));
}
