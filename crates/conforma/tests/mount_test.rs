//! Child pipelines mounted as validators of a parent field.

use conforma::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn person(description: Value, street: Value) -> Value {
    json!({
        "name": "Alexander",
        "description": description,
        "address": {"city": "Gießen", "zip": 12345, "street": street}
    })
}

fn address() -> conforma::ValidatorFn {
    mounted(|value| {
        let mut child = Conforma::from_data(value);
        child
            .filter("city", "upperCase")?
            .validate("street", "notEmpty")?
            .validate("city", "required")?;
        Ok(child)
    })
}

#[tokio::test]
async fn child_failures_are_flattened_into_parent() {
    let mut form = Conforma::from_data(person(json!(2), Value::Null));
    form.validate("description", "alpha")
        .unwrap()
        .validate("address", address())
        .unwrap();

    let err = form.execute().await.unwrap_err();

    let fields: Vec<_> = err
        .field_errors()
        .map(|e| (e.field.to_string(), e.message.to_string()))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("description".to_string(), "only.alpha.allowed".to_string()),
            ("address.street".to_string(), "not.empty".to_string()),
        ]
    );

    let payloads: Vec<_> = err.data_payloads().cloned().collect();
    assert_eq!(
        payloads,
        vec![json!({"address": {"city": "GIESSEN", "zip": 12345, "street": null}})]
    );
    assert_eq!(err.len(), 3);
}

#[tokio::test]
async fn child_data_is_merged_into_parent() {
    let mut form = Conforma::from_data(person(json!("test"), json!("Main Street")));
    form.validate("description", "alpha")
        .unwrap()
        .validate("address", address())
        .unwrap();

    let data = form.execute().await.unwrap();
    assert_eq!(
        data["address"],
        json!({"city": "GIESSEN", "zip": 12345, "street": "Main Street"})
    );
    assert_eq!(data["name"], json!("Alexander"));
}

#[tokio::test]
async fn parent_namespace_prefixes_child_fields() {
    let mut form = Conforma::from_data(person(json!("test"), json!("")));
    form.namespace("form").validate("address", address()).unwrap();

    let err = form.execute().await.unwrap_err();

    assert_eq!(
        err.field_errors().next().map(|e| e.field.to_string()),
        Some("form.address.street".into())
    );
    assert_eq!(
        err.data_payloads().next().and_then(|d| d.pointer("/address/city")),
        Some(&json!("GIESSEN"))
    );
}

#[tokio::test]
async fn absent_field_mounts_an_empty_child() {
    let mut form = Conforma::new();
    form.validate("address", address()).unwrap();

    let err = form.execute().await.unwrap_err();
    let fields: Vec<_> = err.field_errors().map(|e| e.field.to_string()).collect();
    assert_eq!(fields, vec!["address.street"]);
    assert_eq!(
        err.data_payloads().next(),
        Some(&json!({"address": {"city": ""}}))
    );
}

#[tokio::test]
async fn builder_errors_become_field_failures() {
    let broken = mounted(|value| {
        let mut child = Conforma::from_data(value);
        child.filter("x", "noSuchFilter")?;
        Ok(child)
    });

    let mut form = Conforma::from_data(json!({"nested": {}}));
    form.validate("nested", broken).unwrap();

    let err = form.execute().await.unwrap_err();
    assert_eq!(err.field("nested").map(|e| e.message.to_string()), Some("validator.fault".into()));
}

#[tokio::test]
async fn mount_nests_under_namespace() {
    let mut child = Conforma::from_data(json!({"city": "bonn"}));
    child.namespace("address").filter("city", "upperCase").unwrap();

    assert_eq!(
        child.mount().await,
        Outcome::Data(json!({"address": {"city": "BONN"}}))
    );
}

#[tokio::test]
async fn failed_mount_carries_current_data() {
    let mut child = Conforma::from_data(json!({"city": ""}));
    child.namespace("address").validate("city", "notEmpty").unwrap();

    let Outcome::Nested(err) = child.mount().await else {
        panic!("expected a nested failure");
    };
    assert_eq!(
        err.field("address.city").map(|e| e.message.to_string()),
        Some("not.empty".into())
    );
    assert_eq!(err.data_payloads().next(), Some(&json!({"address": {"city": ""}})));
}
