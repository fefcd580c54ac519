//! Per-field validation chains
//!
//! A [`ValidatorChain`] maps field paths to named slots, each holding an
//! ordered list of validator functions and an optional message override.
//! Running the chain launches every applicable check of every field at once
//! and joins them; results come back in registration order.
//!
//! Two names are markers rather than checks:
//!
//! - `required`: an absent field reports `required` and nothing else. A
//!   present field, even `""`, skips the required check.
//! - `empty`: an empty field (see [`is_empty`](crate::value::is_empty)) is
//!   not validated at all, unless the field also has a `notEmpty` slot.
//!
//! Validators never see the live document. Each [`Check`] carries a shared
//! snapshot, and the only way to feed data back is [`Outcome::Data`].

mod builtins;
pub mod dns;

pub use builtins::{ValidatorFactory, ValidatorRegistry};

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::error::{ConfigError, StructuralError, ValidationError, ValidatorFault};
use crate::path;
use crate::pipeline::Conforma;
use crate::value::is_empty;

/// Future returned by a validator.
pub type CheckFuture = BoxFuture<'static, Result<Outcome, ValidatorFault>>;

/// A resolved validator function.
pub type ValidatorFn = Arc<dyn Fn(Check) -> CheckFuture + Send + Sync>;

const REQUIRED: &str = "required";
const EMPTY: &str = "empty";
const NOT_EMPTY: &str = "notEmpty";

// ============================================================================
// CHECK & OUTCOME
// ============================================================================

/// Everything a validator gets to look at.
#[derive(Debug, Clone)]
pub struct Check {
    /// Qualified field name, namespace included.
    pub field: String,
    /// Field path within this pipeline's document, without namespace.
    pub path: String,
    /// Current field value; `None` when absent.
    pub value: Option<Value>,
    /// Message override registered for this slot.
    pub message: Option<String>,
    /// Read-only snapshot of the whole document.
    pub document: Arc<Value>,
}

impl Check {
    /// Reads another path of the document snapshot.
    ///
    /// Paths are relative to the document root and never namespaced.
    pub fn sibling(&self, path: &str) -> Option<&Value> {
        path::get(&self.document, path)
    }

    /// Builds a failure for this field.
    ///
    /// Uses the slot's override message when there is one, `code` otherwise,
    /// and attaches the current value.
    pub fn fail(&self, code: impl Into<Cow<'static, str>>) -> ValidationError {
        let message = match &self.message {
            Some(message) => Cow::Owned(message.clone()),
            None => code.into(),
        };
        ValidationError::new(self.field.clone(), message).with_value_opt(self.value.clone())
    }
}

/// What a single check resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to report.
    Pass,
    /// One failed field.
    Fail(ValidationError),
    /// The failure of a mounted child pipeline.
    Nested(StructuralError),
    /// Data to merge into the parent document.
    Data(Value),
}

impl Outcome {
    /// Returns true for [`Outcome::Pass`].
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl From<Option<ValidationError>> for Outcome {
    fn from(error: Option<ValidationError>) -> Self {
        error.map_or(Self::Pass, Self::Fail)
    }
}

/// Wraps a synchronous check into a [`ValidatorFn`].
pub fn sync_validator<F>(check: F) -> ValidatorFn
where
    F: Fn(&Check) -> Option<ValidationError> + Send + Sync + 'static,
{
    Arc::new(move |input: Check| futures::future::ready(Ok(check(&input).into())).boxed())
}

/// Wraps an asynchronous check into a [`ValidatorFn`].
pub fn async_validator<F, Fut>(check: F) -> ValidatorFn
where
    F: Fn(Check) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, ValidatorFault>> + Send + 'static,
{
    Arc::new(move |input: Check| check(input).boxed())
}

/// A validator that runs a child pipeline over the field value.
///
/// `builder` receives the field value (`{}` when absent) and returns the
/// configured child. The child is namespaced with the qualified field name,
/// so its failures read `address.street`, and its data is nested under the
/// field path so it merges back into place. A builder error is reported as a
/// [`ValidatorFault`].
///
/// # Examples
///
/// ```
/// use conforma::{Conforma, validator};
///
/// let address = validator::mounted(|value| {
///     let mut child = Conforma::from_data(value);
///     child.filter("city", "upperCase")?.validate("street", "notEmpty")?;
///     Ok(child)
/// });
///
/// let mut form = Conforma::new();
/// form.validate("address", address).unwrap();
/// ```
pub fn mounted<F>(builder: F) -> ValidatorFn
where
    F: Fn(Value) -> Result<Conforma, ConfigError> + Send + Sync + 'static,
{
    let builder = Arc::new(builder);
    Arc::new(move |check: Check| {
        let builder = Arc::clone(&builder);
        async move {
            let value = check
                .value
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            let mut child = builder(value).map_err(|e| ValidatorFault::Other(e.to_string()))?;
            child.namespace(check.field);
            Ok(child.mount_at(&check.path).await)
        }
        .boxed()
    })
}

// ============================================================================
// SPECS
// ============================================================================

/// One unresolved validator spec.
#[derive(Clone)]
pub enum ValidatorSpec {
    /// A registry name, or one of the markers `required` and `empty`.
    Named(String),
    /// A registry name with parameters and an optional message override.
    Keyed {
        /// Registry name.
        name: String,
        /// Parameters handed to the factory.
        params: Value,
        /// Override for this slot's failure message.
        message: Option<String>,
    },
    /// A caller-supplied check.
    Inline(ValidatorFn),
    /// An object that does not name exactly one validator.
    Malformed(Value),
}

impl ValidatorSpec {
    /// A registry validator without parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// A registry validator with parameters.
    pub fn with_params(name: impl Into<String>, params: Value) -> Self {
        Self::Keyed {
            name: name.into(),
            params,
            message: None,
        }
    }

    /// Attaches a message override to a keyed spec.
    ///
    /// A plain name becomes keyed with `null` parameters. Other specs are
    /// returned unchanged.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Named(name) => Self::Keyed {
                name,
                params: Value::Null,
                message: Some(message.into()),
            },
            Self::Keyed { name, params, .. } => Self::Keyed {
                name,
                params,
                message: Some(message.into()),
            },
            other => other,
        }
    }

    /// A synchronous inline check.
    pub fn inline<F>(check: F) -> Self
    where
        F: Fn(&Check) -> Option<ValidationError> + Send + Sync + 'static,
    {
        Self::Inline(sync_validator(check))
    }

    /// An asynchronous inline check.
    pub fn inline_async<F, Fut>(check: F) -> Self
    where
        F: Fn(Check) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, ValidatorFault>> + Send + 'static,
    {
        Self::Inline(async_validator(check))
    }
}

impl fmt::Debug for ValidatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Keyed {
                name,
                params,
                message,
            } => f
                .debug_struct("Keyed")
                .field("name", name)
                .field("params", params)
                .field("message", message)
                .finish(),
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Malformed(value) => f.debug_tuple("Malformed").field(value).finish(),
        }
    }
}

/// An ordered list of specs, as accepted by [`ValidatorChain::register`].
///
/// Built from a name, a [`ValidatorSpec`], a [`ValidatorFn`], a JSON value
/// (`"alpha"`, `{"length": {"min": 3}, "msg": "too short"}` or an array of
/// those) or a list of any of these.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSpecs(pub Vec<ValidatorSpec>);

impl ValidatorSpecs {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::String(name) => Self::from(name),
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            Value::Object(mut map) => {
                let message = ["msg", "message"]
                    .iter()
                    .filter_map(|key| map.remove(*key))
                    .find_map(|v| v.as_str().map(str::to_string));

                if map.len() == 1 {
                    Self(
                        map.into_iter()
                            .map(|(name, params)| ValidatorSpec::Keyed {
                                name,
                                params,
                                message: message.clone(),
                            })
                            .collect(),
                    )
                } else {
                    Self(vec![ValidatorSpec::Malformed(Value::Object(map))])
                }
            }
            other => Self(vec![ValidatorSpec::Malformed(other)]),
        }
    }
}

impl FromIterator<ValidatorSpecs> for ValidatorSpecs {
    fn from_iter<I: IntoIterator<Item = ValidatorSpecs>>(iter: I) -> Self {
        Self(iter.into_iter().flat_map(|specs| specs.0).collect())
    }
}

impl From<&str> for ValidatorSpecs {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<String> for ValidatorSpecs {
    fn from(name: String) -> Self {
        if name.is_empty() {
            Self::default()
        } else {
            Self(vec![ValidatorSpec::Named(name)])
        }
    }
}

impl From<ValidatorSpec> for ValidatorSpecs {
    fn from(spec: ValidatorSpec) -> Self {
        Self(vec![spec])
    }
}

impl From<ValidatorFn> for ValidatorSpecs {
    fn from(check: ValidatorFn) -> Self {
        Self(vec![ValidatorSpec::Inline(check)])
    }
}

impl From<Value> for ValidatorSpecs {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl<T: Into<ValidatorSpecs>> From<Vec<T>> for ValidatorSpecs {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<ValidatorSpecs>, const N: usize> From<[T; N]> for ValidatorSpecs {
    fn from(items: [T; N]) -> Self {
        items.into_iter().map(Into::into).collect()
    }
}

// ============================================================================
// CHAIN
// ============================================================================

#[derive(Clone, Default)]
struct Slot {
    message: Option<String>,
    checks: Vec<ValidatorFn>,
}

#[derive(Clone)]
struct RequiredCheck {
    message: Option<String>,
    check: ValidatorFn,
}

enum Registration {
    Required(RequiredCheck),
    Empty,
    Slot {
        name: String,
        message: Option<String>,
        check: ValidatorFn,
    },
}

/// Ordered per-field validator registrations.
#[derive(Clone)]
pub struct ValidatorChain {
    fields: IndexMap<String, IndexMap<String, Slot>>,
    required: IndexMap<String, RequiredCheck>,
    empty: IndexSet<String>,
    inline_count: usize,
    catch_panics: bool,
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self {
            fields: IndexMap::new(),
            required: IndexMap::new(),
            empty: IndexSet::new(),
            inline_count: 0,
            catch_panics: true,
        }
    }
}

impl ValidatorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a panicking check is reported as a failure (the default)
    /// or resumed.
    #[must_use = "builder methods must be chained or built"]
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Registers specs for `field`.
    ///
    /// `message` overrides the failure message of every slot registered by
    /// this call, unless a keyed spec brings its own. Either every spec
    /// resolves and is registered, or none is.
    pub fn register(
        &mut self,
        registry: &ValidatorRegistry,
        field: impl Into<String>,
        specs: impl Into<ValidatorSpecs>,
        message: Option<&str>,
    ) -> Result<(), ConfigError> {
        let field = field.into();
        let specs = specs.into();
        if field.is_empty() || specs.0.is_empty() {
            return Ok(());
        }

        let registrations = specs
            .0
            .into_iter()
            .map(|spec| self.resolve(registry, spec, message))
            .collect::<Result<Vec<_>, _>>()?;

        let slots = self.fields.entry(field.clone()).or_default();
        for registration in registrations {
            match registration {
                Registration::Required(required) => {
                    self.required.insert(field.clone(), required);
                }
                Registration::Empty => {
                    self.empty.insert(field.clone());
                }
                Registration::Slot {
                    name,
                    message,
                    check,
                } => {
                    let slot = slots.entry(name).or_default();
                    if message.is_some() {
                        slot.message = message;
                    }
                    slot.checks.push(check);
                }
            }
        }

        tracing::trace!(field = %field, slots = slots.len(), "validator registered");
        Ok(())
    }

    /// Registered field paths, in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Slot names of `field`, in registration order.
    pub fn slots(&self, field: &str) -> Vec<&str> {
        self.fields
            .get(field)
            .map(|slots| slots.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if `field` is marked required.
    pub fn is_required(&self, field: &str) -> bool {
        self.required.contains_key(field)
    }

    /// Returns true if `field` is exempt from validation when empty.
    pub fn allows_empty(&self, field: &str) -> bool {
        self.empty.contains(field)
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Runs every applicable check concurrently and returns their outcomes
    /// in registration order.
    ///
    /// `namespace` only prefixes the field names reported to validators and
    /// in failures. Faults and panics become failures of their field.
    pub async fn run(&self, document: &Value, namespace: Option<&str>) -> Vec<Outcome> {
        let snapshot = Arc::new(document.clone());
        let mut pending = Vec::new();

        for (field, slots) in &self.fields {
            let qualified = match namespace {
                Some(ns) => format!("{ns}.{field}"),
                None => field.clone(),
            };
            let value = path::get(document, field).cloned();

            let check = |message: Option<String>| Check {
                field: qualified.clone(),
                path: field.clone(),
                value: value.clone(),
                message,
                document: Arc::clone(&snapshot),
            };

            if let Some(required) = self.required.get(field).filter(|_| value.is_none()) {
                tracing::trace!(field = %qualified, "required field absent");
                pending.push(self.settle(required.check.clone(), check(required.message.clone())));
                continue;
            }

            if self.empty.contains(field)
                && is_empty(value.as_ref())
                && !slots.contains_key(NOT_EMPTY)
            {
                tracing::trace!(field = %qualified, "empty field skipped");
                continue;
            }

            for slot in slots.values() {
                for validator in &slot.checks {
                    pending.push(self.settle(Arc::clone(validator), check(slot.message.clone())));
                }
            }
        }

        tracing::debug!(checks = pending.len(), "validators scheduled");
        futures::future::join_all(pending).await
    }

    fn settle(&self, validator: ValidatorFn, check: Check) -> BoxFuture<'static, Outcome> {
        let field = check.field.clone();
        let value = check.value.clone();
        let message = check.message.clone();
        let catch_panics = self.catch_panics;

        async move {
            // Invoke inside the future so synchronous panics are caught too.
            let invocation = async move { validator(check).await };
            let result = if catch_panics {
                match AssertUnwindSafe(invocation).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(field = %field, "validator panicked");
                        return Outcome::Fail(
                            ValidationError::new(field, "validator.panicked").with_value_opt(value),
                        );
                    }
                }
            } else {
                invocation.await
            };

            match result {
                Ok(Outcome::Fail(error)) => Outcome::Fail(match message {
                    Some(message) => error.with_message(message),
                    None => error,
                }),
                Ok(outcome) => outcome,
                Err(fault) => {
                    tracing::warn!(field = %field, error = %fault, "validator faulted");
                    Outcome::Fail(ValidationError::new(field, fault.code()).with_value_opt(value))
                }
            }
        }
        .boxed()
    }

    fn resolve(
        &mut self,
        registry: &ValidatorRegistry,
        spec: ValidatorSpec,
        message: Option<&str>,
    ) -> Result<Registration, ConfigError> {
        let call_message = message.map(str::to_string);

        let (name, params, message) = match spec {
            ValidatorSpec::Named(name) => (name, None, call_message),
            ValidatorSpec::Keyed {
                name,
                params,
                message,
            } => (
                name,
                Some(params).filter(|p| !p.is_null()),
                message.or(call_message),
            ),
            ValidatorSpec::Inline(check) => {
                self.inline_count += 1;
                return Ok(Registration::Slot {
                    name: format!("inline#{}", self.inline_count),
                    message: call_message,
                    check,
                });
            }
            ValidatorSpec::Malformed(value) => {
                return Err(ConfigError::malformed(
                    "validator",
                    format!("expected a name or a single-key object, got {value}"),
                ));
            }
        };

        if name == EMPTY {
            return Ok(Registration::Empty);
        }

        let check = registry.build(&name, params.as_ref())?;
        if name == REQUIRED {
            Ok(Registration::Required(RequiredCheck { message, check }))
        } else {
            Ok(Registration::Slot {
                name,
                message,
                check,
            })
        }
    }
}

impl fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorChain")
            .field(
                "fields",
                &self
                    .fields
                    .iter()
                    .map(|(field, slots)| (field, slots.keys().collect::<Vec<_>>()))
                    .collect::<Vec<_>>(),
            )
            .field("required", &self.required.keys().collect::<Vec<_>>())
            .field("empty", &self.empty)
            .finish()
    }
}
