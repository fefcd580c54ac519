//! The conformance pipeline
//!
//! [`Conforma`] owns one document and the filter and validator registrations
//! made against it. [`Conforma::execute`] runs, in order:
//!
//! 1. every filter chain, in field registration order;
//! 2. the drop list;
//! 3. every validator of every field, concurrently;
//! 4. aggregation: data payloads are merged into the document, failures are
//!    collected into one [`StructuralError`].
//!
//! A failed run leaves the document filtered; nothing is rolled back.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{ConfigError, Failure, StructuralError};
use crate::filter::{FilterChain, FilterSteps, PathList};
use crate::merge::{conform_shape, merge_keep_existing, merge_prefer_incoming};
use crate::path;
use crate::registry::Registry;
use crate::validator::{Outcome, ValidatorChain, ValidatorSpecs, dns};

/// Argument of [`Conforma::conform`].
#[derive(Debug, Clone, PartialEq)]
pub enum Conform {
    /// Reduce the document to the shape of this object.
    Template(Value),
    /// Arm or disarm conform-by-filter for the next filter run.
    Filtered(bool),
}

impl From<Value> for Conform {
    fn from(template: Value) -> Self {
        Self::Template(template)
    }
}

impl From<bool> for Conform {
    fn from(enabled: bool) -> Self {
        Self::Filtered(enabled)
    }
}

/// A conformance pipeline over one document.
///
/// # Examples
///
/// ```
/// use conforma::Conforma;
/// use serde_json::json;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let mut form = Conforma::from_data(json!({"value1": "123", "value2": "yes"}));
/// form.filter("value1", "int")?.filter("value2", "bool")?;
///
/// let data = form.execute().await.unwrap();
/// assert_eq!(data, json!({"value1": 123, "value2": true}));
/// # Ok::<(), conforma::ConfigError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Conforma {
    registry: Arc<Registry>,
    config: PipelineConfig,
    data: Value,
    filters: FilterChain,
    validators: ValidatorChain,
    namespace: Option<String>,
}

impl Default for Conforma {
    fn default() -> Self {
        Self::new()
    }
}

impl Conforma {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// An empty pipeline over the built-in registry.
    pub fn new() -> Self {
        Self::with_registry_and_config(Registry::shared_builtin(), PipelineConfig::default())
    }

    /// An empty pipeline resolving names against `registry`.
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self::with_registry_and_config(registry, PipelineConfig::default())
    }

    /// An empty pipeline over the built-in registry, with `config`.
    ///
    /// The built-in `emailMx` check uses `config`'s lookup deadline.
    pub fn with_config(config: PipelineConfig) -> Self {
        let registry = if config.mx_timeout() == PipelineConfig::default().mx_timeout() {
            Registry::shared_builtin()
        } else {
            Arc::new(Registry::builtin().with_mx_resolver(dns::default_resolver(), config.mx_timeout()))
        };
        Self::with_registry_and_config(registry, config)
    }

    /// An empty pipeline with an explicit registry and config.
    ///
    /// The registry's own `emailMx` deadline is left as it is.
    pub fn with_registry_and_config(registry: Arc<Registry>, config: PipelineConfig) -> Self {
        Self {
            validators: ValidatorChain::new().catch_panics(config.catch_panics),
            registry,
            config,
            data: empty_object(),
            filters: FilterChain::new(),
            namespace: None,
        }
    }

    /// A pipeline over the built-in registry, seeded with `data`.
    pub fn from_data(data: Value) -> Self {
        let mut pipeline = Self::new();
        pipeline.set_data(data);
        pipeline
    }

    /// Clears the document, every registration, the namespace and the
    /// conform mode. Registry and config are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.data = empty_object();
        self.filters = FilterChain::new();
        self.validators = ValidatorChain::new().catch_panics(self.config.catch_panics);
        self.namespace = None;
        self
    }

    /// The registry names are resolved against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The pipeline settings.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // DATA
    // ========================================================================

    /// Deep-merges `data` into the document; `data` wins on conflicts.
    ///
    /// Anything but an object is ignored.
    pub fn set_data(&mut self, data: Value) -> &mut Self {
        if data.is_object() {
            self.data = merge_prefer_incoming(&self.data, &data);
        } else if !data.is_null() {
            tracing::debug!(kind = crate::value::value_type_name(&data), "ignoring non-object data");
        }
        self
    }

    /// Deep-merges `defaults` into the document; the document wins on
    /// conflicts.
    ///
    /// Anything but an object is ignored.
    pub fn defaults(&mut self, defaults: Value) -> &mut Self {
        if defaults.is_object() {
            self.data = merge_keep_existing(&self.data, &defaults);
        } else if !defaults.is_null() {
            tracing::debug!(kind = crate::value::value_type_name(&defaults), "ignoring non-object defaults");
        }
        self
    }

    /// Reduces the document to a shape, or toggles conform-by-filter.
    ///
    /// - an object template replaces the document with
    ///   [`conform_shape`]`(document, template)`;
    /// - `true` makes the next filter run keep only filter-registered fields;
    /// - `null`, `{}` or any other value is a [`ConfigError::EmptyConform`].
    pub fn conform(&mut self, conform: impl Into<Conform>) -> Result<&mut Self, ConfigError> {
        match conform.into() {
            Conform::Template(template @ Value::Object(_)) if !is_empty_object(&template) => {
                self.data = conform_shape(&self.data, &template);
            }
            Conform::Template(_) => return Err(ConfigError::EmptyConform),
            Conform::Filtered(enabled) => self.filters.set_conform(enabled),
        }
        Ok(self)
    }

    /// An independent copy of the document.
    pub fn get_data(&self) -> Value {
        self.data.clone()
    }

    /// Runs the filters and the drop list, then returns a copy of the
    /// document.
    pub fn get_clean_data(&mut self) -> Value {
        self.filters.run(&mut self.data);
        self.get_data()
    }

    /// Reads one path of the document.
    pub fn get_value(&self, path: &str) -> Option<&Value> {
        path::get(&self.data, path)
    }

    /// Moves `src` to `dest`, or merges it into the root when `dest` is
    /// `None`.
    pub fn move_path(&mut self, src: &str, dest: Option<&str>) -> &mut Self {
        path::move_path(&mut self.data, src, dest);
        self
    }

    /// Deletes one path of the document.
    pub fn remove(&mut self, path: &str) -> &mut Self {
        path::delete(&mut self.data, path);
        self
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Appends filter steps to `field`.
    pub fn filter(
        &mut self,
        field: impl Into<String>,
        steps: impl Into<FilterSteps>,
    ) -> Result<&mut Self, ConfigError> {
        self.filters.register(&self.registry.filters, field, steps)?;
        Ok(self)
    }

    /// Registers validators for `field`.
    pub fn validate(
        &mut self,
        field: impl Into<String>,
        specs: impl Into<ValidatorSpecs>,
    ) -> Result<&mut Self, ConfigError> {
        self.validators
            .register(&self.registry.validators, field, specs, None)?;
        Ok(self)
    }

    /// Registers validators for `field` with an override message.
    pub fn validate_with_message(
        &mut self,
        field: impl Into<String>,
        specs: impl Into<ValidatorSpecs>,
        message: &str,
    ) -> Result<&mut Self, ConfigError> {
        self.validators
            .register(&self.registry.validators, field, specs, Some(message))?;
        Ok(self)
    }

    /// Adds paths to delete after every filter run.
    pub fn drop_fields(&mut self, paths: impl Into<PathList>) -> &mut Self {
        self.filters.drop_fields(paths);
        self
    }

    /// Sets the prefix of reported field names and the key [`mount`] nests
    /// data under.
    ///
    /// [`mount`]: Conforma::mount
    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Filters, validates and aggregates.
    ///
    /// Returns the clean document, or every failure in registration order.
    pub async fn execute(&mut self) -> Result<Value, StructuralError> {
        let span = tracing::debug_span!(
            "conforma.execute",
            namespace = self.namespace.as_deref().unwrap_or_default()
        );
        self.run().instrument(span).await
    }

    /// Like [`execute`](Self::execute), also handing the result to `callback`
    /// exactly once before returning it.
    pub async fn execute_with<F>(&mut self, callback: F) -> Result<Value, StructuralError>
    where
        F: FnOnce(&Result<Value, StructuralError>),
    {
        let result = self.execute().await;
        callback(&result);
        result
    }

    /// Runs the pipeline as a child of another one.
    ///
    /// Never fails: success yields [`Outcome::Data`], failure
    /// [`Outcome::Nested`] with the current document appended to the
    /// failures. Both are nested under the namespace, if any.
    pub async fn mount(&mut self) -> Outcome {
        let key = self.namespace.clone();
        self.mount_at(key.as_deref().unwrap_or_default()).await
    }

    /// [`mount`](Self::mount), nesting data under `key` instead of the
    /// namespace. An empty key nests nothing.
    pub(crate) async fn mount_at(&mut self, key: &str) -> Outcome {
        match self.execute().await {
            Ok(data) => Outcome::Data(nest(key, data)),
            Err(mut error) => {
                error.push(Failure::Data(nest(key, self.get_data())));
                Outcome::Nested(error)
            }
        }
    }

    async fn run(&mut self) -> Result<Value, StructuralError> {
        self.filters.run(&mut self.data);
        tracing::debug!("filters applied");

        let outcomes = self
            .validators
            .run(&self.data, self.namespace.as_deref())
            .await;

        let mut failures = Vec::new();
        let mut payloads = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Pass => {}
                Outcome::Fail(error) => failures.push(Failure::Field(error)),
                Outcome::Nested(error) => failures.extend(error.errors),
                Outcome::Data(data) => payloads.push(data),
            }
        }

        tracing::debug!(
            failures = failures.len(),
            payloads = payloads.len(),
            "validation finished"
        );

        for payload in payloads {
            self.set_data(payload);
        }

        if failures.is_empty() {
            Ok(self.get_data())
        } else {
            Err(StructuralError::new(
                self.config.aggregate_message.clone(),
                failures,
            ))
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

fn nest(key: &str, data: Value) -> Value {
    if key.is_empty() {
        return data;
    }
    let mut nested = empty_object();
    path::set(&mut nested, key, data);
    nested
}
