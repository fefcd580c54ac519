//! The function tables a pipeline resolves names against

use std::sync::Arc;
use std::time::Duration;

use crate::filter::FilterRegistry;
use crate::validator::ValidatorRegistry;
use crate::validator::dns::MxResolver;

/// Filters and validators available to a pipeline.
///
/// Pipelines hold it behind an [`Arc`], so one registry can serve any number
/// of pipelines.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use conforma::{Conforma, Registry};
/// use serde_json::{Value, json};
///
/// let mut registry = Registry::builtin();
/// registry.filters.register("slug", |value: Value, _: Option<&Value>| {
///     json!(value.as_str().unwrap_or_default().to_lowercase().replace(' ', "-"))
/// });
///
/// let mut form = Conforma::with_registry(Arc::new(registry));
/// form.set_data(json!({"title": "Hello World"}));
/// form.filter("title", "slug").unwrap();
/// assert_eq!(form.get_clean_data(), json!({"title": "hello-world"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Filter functions by name.
    pub filters: FilterRegistry,
    /// Validator factories by name.
    pub validators: ValidatorRegistry,
}

impl Registry {
    /// All built-in filters and validators.
    pub fn builtin() -> Self {
        Self {
            filters: FilterRegistry::new(),
            validators: ValidatorRegistry::new(),
        }
    }

    /// No functions at all.
    pub fn empty() -> Self {
        Self {
            filters: FilterRegistry::empty(),
            validators: ValidatorRegistry::empty(),
        }
    }

    /// Replaces the resolver and deadline used by `emailMx`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_mx_resolver(mut self, resolver: Arc<dyn MxResolver>, timeout: Duration) -> Self {
        self.validators = self.validators.with_mx_resolver(resolver, timeout);
        self
    }

    /// Shared handle to the built-in registry.
    pub fn shared_builtin() -> Arc<Self> {
        static BUILTIN: std::sync::LazyLock<Arc<Registry>> =
            std::sync::LazyLock::new(|| Arc::new(Registry::builtin()));
        Arc::clone(&BUILTIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_everything() {
        let registry = Registry::builtin();
        for name in ["int", "bool", "string", "trim", "url", "date", "uniqueList", "digit"] {
            assert!(registry.filters.has(name), "missing filter {name}");
        }
        for name in ["required", "notEmpty", "email", "emailMx", "alpha", "alnum", "length", "inList"] {
            assert!(registry.validators.has(name), "missing validator {name}");
        }
    }

    #[test]
    fn empty_has_nothing() {
        let registry = Registry::empty();
        assert!(registry.filters.names().is_empty());
        assert!(registry.validators.names().is_empty());
    }

    #[test]
    fn shared_builtin_is_shared() {
        assert!(Arc::ptr_eq(&Registry::shared_builtin(), &Registry::shared_builtin()));
    }
}
