//! Per-field transformation chains
//!
//! A [`FilterChain`] maps field paths to ordered steps. Running it folds each
//! field's current value through its steps in registration order and writes
//! the result back, creating the field if it was absent.
//!
//! Steps are resolved against a [`FilterRegistry`] when they are registered,
//! so an unknown filter name is reported immediately rather than on the first
//! run.
//!
//! # Examples
//!
//! ```
//! use conforma::filter::{FilterChain, FilterRegistry, FilterStep};
//! use serde_json::json;
//!
//! let registry = FilterRegistry::new();
//! let mut chain = FilterChain::new();
//! chain.register(&registry, "name", ["trim", "lowerCase"]).unwrap();
//! chain
//!     .register(&registry, "code", json!({"stringLength": 3}))
//!     .unwrap();
//! chain
//!     .register(&registry, "tag", FilterStep::inline(|v| json!(format!("#{}", v.as_str().unwrap_or("")))))
//!     .unwrap();
//!
//! let mut doc = json!({"name": "  ALICE ", "code": "ABCDEF", "tag": "x"});
//! chain.run(&mut doc);
//! assert_eq!(doc, json!({"name": "alice", "code": "ABC", "tag": "#x"}));
//! ```

mod builtins;

pub use builtins::{FilterFn, FilterRegistry};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::path;

/// A closure usable as an inline filter step.
pub type InlineFilter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

// ============================================================================
// STEPS
// ============================================================================

/// One unresolved filter step.
#[derive(Clone)]
pub enum FilterStep {
    /// A registry filter, with optional parameters.
    Named {
        /// Registry name.
        name: String,
        /// Parameters handed to the filter.
        params: Option<Value>,
    },
    /// A caller-supplied transformation.
    Inline(InlineFilter),
    /// A keyed object that does not name exactly one filter.
    Malformed(Value),
}

impl FilterStep {
    /// A registry filter without parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            params: None,
        }
    }

    /// A registry filter with parameters.
    pub fn named_with(name: impl Into<String>, params: Value) -> Self {
        Self::Named {
            name: name.into(),
            params: Some(params),
        }
    }

    /// An inline transformation.
    pub fn inline<F>(filter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(filter))
    }
}

impl fmt::Debug for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, params } => f
                .debug_struct("Named")
                .field("name", name)
                .field("params", params)
                .finish(),
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Malformed(value) => f.debug_tuple("Malformed").field(value).finish(),
        }
    }
}

/// An ordered list of steps, as accepted by [`FilterChain::register`].
///
/// Built from a name, a [`FilterStep`], a JSON value (`"trim"`,
/// `{"stringLength": 3}` or an array of those) or a list of any of these.
/// Lists are flattened in order.
#[derive(Debug, Clone, Default)]
pub struct FilterSteps(pub Vec<FilterStep>);

impl FilterSteps {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::String(name) => Self::from(name),
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            Value::Object(map) if map.len() == 1 => Self(
                map.into_iter()
                    .map(|(name, params)| FilterStep::named_with(name, params))
                    .collect(),
            ),
            other => Self(vec![FilterStep::Malformed(other)]),
        }
    }
}

impl FromIterator<FilterSteps> for FilterSteps {
    fn from_iter<I: IntoIterator<Item = FilterSteps>>(iter: I) -> Self {
        Self(iter.into_iter().flat_map(|steps| steps.0).collect())
    }
}

impl From<&str> for FilterSteps {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<String> for FilterSteps {
    fn from(name: String) -> Self {
        if name.is_empty() {
            Self::default()
        } else {
            Self(vec![FilterStep::named(name)])
        }
    }
}

impl From<FilterStep> for FilterSteps {
    fn from(step: FilterStep) -> Self {
        Self(vec![step])
    }
}

impl From<Value> for FilterSteps {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl<T: Into<FilterSteps>> From<Vec<T>> for FilterSteps {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<FilterSteps>, const N: usize> From<[T; N]> for FilterSteps {
    fn from(items: [T; N]) -> Self {
        items.into_iter().map(Into::into).collect()
    }
}

/// A list of paths to delete, as accepted by [`FilterChain::drop_fields`].
///
/// Strings are split on commas; entries are trimmed and empty ones ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(pub Vec<String>);

impl From<&str> for PathList {
    fn from(paths: &str) -> Self {
        Self(
            paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<String> for PathList {
    fn from(paths: String) -> Self {
        Self::from(paths.as_str())
    }
}

impl<T: AsRef<str>> From<Vec<T>> for PathList {
    fn from(items: Vec<T>) -> Self {
        Self(
            items
                .iter()
                .flat_map(|item| Self::from(item.as_ref()).0)
                .collect(),
        )
    }
}

impl<T: AsRef<str>, const N: usize> From<[T; N]> for PathList {
    fn from(items: [T; N]) -> Self {
        Self::from(Vec::from(items))
    }
}

// ============================================================================
// CHAIN
// ============================================================================

#[derive(Clone)]
enum Resolved {
    Registered {
        name: String,
        filter: FilterFn,
        params: Option<Value>,
    },
    Inline(InlineFilter),
}

impl Resolved {
    fn apply(&self, value: Value) -> Value {
        match self {
            Self::Registered { filter, params, .. } => filter(value, params.as_ref()),
            Self::Inline(filter) => filter(value),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Registered { name, .. } => name,
            Self::Inline(_) => "inline",
        }
    }
}

/// Ordered per-field filter registrations plus the drop list.
#[derive(Clone, Default)]
pub struct FilterChain {
    fields: IndexMap<String, Vec<Resolved>>,
    drop: Vec<String>,
    conform: bool,
}

impl FilterChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends steps to `field`.
    ///
    /// Either every step resolves and is appended, or none is.
    pub fn register(
        &mut self,
        registry: &FilterRegistry,
        field: impl Into<String>,
        steps: impl Into<FilterSteps>,
    ) -> Result<(), ConfigError> {
        let field = field.into();
        let steps = steps.into();
        if field.is_empty() || steps.0.is_empty() {
            return Ok(());
        }

        let resolved = steps
            .0
            .into_iter()
            .map(|step| resolve(registry, step))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!(
            field = %field,
            steps = ?resolved.iter().map(Resolved::name).collect::<Vec<_>>(),
            "filter registered"
        );
        self.fields.entry(field).or_default().extend(resolved);
        Ok(())
    }

    /// Adds paths to delete after every filter run.
    pub fn drop_fields(&mut self, paths: impl Into<PathList>) {
        for path in paths.into().0 {
            if !self.drop.contains(&path) {
                self.drop.push(path);
            }
        }
    }

    /// Arms the one-shot conform mode for the next run.
    pub fn set_conform(&mut self, enabled: bool) {
        self.conform = enabled;
    }

    /// Returns true if the next run will conform the document.
    pub fn conform_armed(&self) -> bool {
        self.conform
    }

    /// Registered field paths, in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Paths deleted after every run.
    pub fn dropped(&self) -> &[String] {
        &self.drop
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.drop.is_empty()
    }

    /// Applies every field's steps, then the drop list.
    ///
    /// In conform mode the document is first reduced to the registered
    /// fields, copied over from the current data.
    pub fn run(&mut self, document: &mut Value) {
        if std::mem::take(&mut self.conform) {
            let raw = std::mem::replace(document, Value::Object(Map::new()));
            for field in self.fields.keys() {
                if let Some(value) = path::get(&raw, field) {
                    path::set(document, field, value.clone());
                }
            }
            tracing::debug!(fields = self.fields.len(), "document conformed to filtered fields");
        }

        for (field, steps) in &self.fields {
            let current = path::get(document, field).cloned();
            let absent = current.is_none();
            let filtered = steps
                .iter()
                .fold(current.unwrap_or(Value::Null), |value, step| step.apply(value));
            tracing::trace!(field = %field, steps = steps.len(), "field filtered");
            // An absent field that is still null after the steps stays absent.
            if absent && filtered.is_null() {
                continue;
            }
            path::set(document, field, filtered);
        }

        for dropped in &self.drop {
            path::delete(document, dropped);
        }
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field(
                "fields",
                &self
                    .fields
                    .iter()
                    .map(|(field, steps)| (field, steps.iter().map(Resolved::name).collect::<Vec<_>>()))
                    .collect::<Vec<_>>(),
            )
            .field("drop", &self.drop)
            .field("conform", &self.conform)
            .finish()
    }
}

fn resolve(registry: &FilterRegistry, step: FilterStep) -> Result<Resolved, ConfigError> {
    match step {
        FilterStep::Named { name, params } => match registry.get(&name) {
            Some(filter) => Ok(Resolved::Registered {
                filter: Arc::clone(filter),
                name,
                params,
            }),
            None => Err(ConfigError::UnknownFilter(name)),
        },
        FilterStep::Inline(filter) => Ok(Resolved::Inline(filter)),
        FilterStep::Malformed(value) => Err(ConfigError::malformed(
            "filter",
            format!("expected a name or a single-key object, got {value}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chain() -> (FilterRegistry, FilterChain) {
        (FilterRegistry::new(), FilterChain::new())
    }

    #[test]
    fn steps_run_in_order() {
        let (registry, mut chain) = chain();
        chain
            .register(&registry, "v", vec![json!("lowerCase"), json!({"stringLength": 3})])
            .unwrap();

        let mut doc = json!({"v": "TEST"});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"v": "tes"}));
    }

    #[test]
    fn absent_fields_are_created() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "a.b", ["string", "lowerCase"]).unwrap();

        let mut doc = json!({});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"a": {"b": ""}}));
    }

    #[test]
    fn absent_fields_left_null_stay_absent() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "birthday", "date").unwrap();
        chain.register(&registry, "name", "stringLength").unwrap();

        let mut doc = json!({"kept": null});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"kept": null}));
    }

    #[test]
    fn registrations_accumulate() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "v", "trim").unwrap();
        chain.register(&registry, "v", "upperCase").unwrap();

        let mut doc = json!({"v": " ab "});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"v": "AB"}));
    }

    #[test]
    fn unknown_filter_fails_at_registration() {
        let (registry, mut chain) = chain();
        let err = chain
            .register(&registry, "v", ["trim", "unknown"])
            .unwrap_err();

        assert_eq!(err, ConfigError::UnknownFilter("unknown".into()));
        assert!(chain.fields().next().is_none());
    }

    #[test]
    fn malformed_keyed_step() {
        let (registry, mut chain) = chain();
        let err = chain
            .register(&registry, "v", json!({"trim": null, "int": null}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedStep { kind: "filter", .. }));
    }

    #[test]
    fn empty_steps_are_ignored() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "v", "").unwrap();
        chain.register(&registry, "v", Value::Null).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn drop_lists() {
        assert_eq!(
            PathList::from("a.b, c,, "),
            PathList(vec!["a.b".into(), "c".into()])
        );
        assert_eq!(
            PathList::from(["x", "y,z"]),
            PathList(vec!["x".into(), "y".into(), "z".into()])
        );
    }

    #[test]
    fn drop_runs_after_filters() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "value1", "object").unwrap();
        chain.register(&registry, "value1.child", "string").unwrap();
        chain.register(&registry, "value2", "string").unwrap();
        chain.drop_fields("value1.child, value2");

        let mut doc = json!({});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"value1": {}}));

        chain.run(&mut doc);
        assert_eq!(doc, json!({"value1": {}}));
    }

    #[test]
    fn conform_mode_keeps_only_filtered_fields() {
        let (registry, mut chain) = chain();
        chain.register(&registry, "keep", "trim").unwrap();
        chain.register(&registry, "nested.keep", "int").unwrap();
        chain.set_conform(true);

        let mut doc = json!({"keep": " x ", "other": 1, "nested": {"keep": "5", "other": 2}});
        chain.run(&mut doc);
        assert_eq!(doc, json!({"keep": "x", "nested": {"keep": 5}}));
        assert!(!chain.conform_armed());
    }
}
