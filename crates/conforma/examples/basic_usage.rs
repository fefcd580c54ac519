//! Filter, reshape and validate a form submission.
//!
//! Run with `RUST_LOG=conforma=debug` to see the pipeline spans.

use conforma::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut form = Conforma::new();
    form.set_data(json!({
        "value1": "123",
        "value2": "yes",
        "nested": {
            "value1": "email(at)localhost",
            "value2": "Hänsel und Gretel ",
            "value4": "SOME TRASH"
        },
        "trashValue": "foobar"
    }))
    .defaults(json!({
        "value1": 1,
        "value3": "foobar",
        "nested": {"value3": "   <html>Hello World!</html>"}
    }))
    .conform(json!({
        "value1": null,
        "value2": null,
        "nested": {"value1": null, "value2": null, "value3": null}
    }))?
    .filter("value1", "int")?
    .filter("value2", "bool")?
    .filter("nested.value2", ["trim", "upperCase"])?
    .filter("nested.value3", ["string", "trim", "escapeHtml"])?
    .validate("nested.value1", ["email", "required"])?
    .validate("nested.value2", json!({"alpha": true}))?;

    form.execute_with(|result| match result {
        Ok(data) => println!("Data: {data:#}"),
        Err(err) => println!("Error: {err}"),
    })
    .await
    .ok();

    // A single custom check, without the rest of the form.
    let mut single = Conforma::from_data(json!({"value1": "123", "value2": "test"}));
    single
        .filter("value1", "int")?
        .filter(
            "value2",
            FilterStep::inline(|v| json!(v.as_str().unwrap_or_default().to_uppercase())),
        )?
        .validate(
            "value1",
            ValidatorSpec::inline(|check| {
                let n = check.value.as_ref().and_then(serde_json::Value::as_i64).unwrap_or_default();
                (100 < n && n < 200).then(|| check.fail("My individual error"))
            }),
        )?;

    match single.execute().await {
        Ok(data) => println!("Data: {data}"),
        Err(err) => println!("Error: {}", err.to_json_value()),
    }

    Ok(())
}
