//! Validate a nested address with its own pipeline.

use conforma::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt().init();

    let address = mounted(|value| {
        let mut child = Conforma::from_data(value);
        child
            .filter("city", "upperCase")?
            .validate("street", "notEmpty")?
            .validate("city", "required")?;
        Ok(child)
    });

    let mut form = Conforma::from_data(json!({
        "name": "Alexander",
        "description": 2,
        "address": {"city": "Gießen", "zip": 12345, "street": null}
    }));
    form.validate("description", "alpha")?
        .validate("address", address)?;

    match form.execute().await {
        Ok(data) => println!("{data:#}"),
        Err(err) => {
            for failure in &err.errors {
                println!("{failure}");
            }
            println!("document after filtering: {:#}", form.get_data());
        }
    }

    Ok(())
}
