//! Validator registry and the built-in validators
//!
//! A registry entry is a factory: it takes the registered parameters and returns
//! a ready [`ValidatorFn`], or rejects the parameters with
//! [`ConfigError::InvalidParams`]. Factories run once, at registration.
//!
//! Failures use machine-readable message keys:
//!
//! | Validator  | Key                                              |
//! |------------|--------------------------------------------------|
//! | `required` | `required`                                       |
//! | `notEmpty` | `not.empty`                                      |
//! | `email`    | `email.invalid.format`                           |
//! | `emailMx`  | `email.mx.missing`, `email.mx.lookup.failed`     |
//! | `alpha`    | `only.alpha.allowed`                             |
//! | `alnum`    | `only.alnum.allowed`                             |
//! | `number`   | `number.invalid`                                 |
//! | `equals`   | `equals.mismatch`                                |
//! | `compare`  | `compare.mismatch`                               |
//! | `contains` | `contains.missing`                               |
//! | `isDate`   | `date.invalid`                                   |
//! | `inList`   | `in.list.missing`                                |
//! | `length`   | `length.invalid` (with `min` / `max`)            |
//! | `objectId` | `object.id.invalid`                              |
//!
//! String validators read an absent field as `""` and other non-strings in
//! their display form.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::FutureExt;
use regex::Regex;
use serde_json::Value;

use super::dns::{self, MxResolver};
use super::{Check, Outcome, ValidatorFn, sync_validator};
use crate::error::{ConfigError, ValidationError, ValidatorFault};
use crate::temporal;
use crate::value::{is_empty, to_display_string};

/// Builds a validator from its spec parameters.
pub type ValidatorFactory =
    Arc<dyn Fn(Option<&Value>) -> Result<ValidatorFn, ConfigError> + Send + Sync>;

/// Default deadline of a single MX lookup.
pub const DEFAULT_MX_TIMEOUT: Duration = Duration::from_millis(5000);

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap()
});

static ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\p{L}+$").unwrap());
static ALPHA_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}+(?:\s\p{L}+)*$").unwrap());
static ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}]+$").unwrap());
static ALNUM_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}]+(?:\s[\p{L}\p{N}]+)*$").unwrap());
static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

// ============================================================================
// REGISTRY
// ============================================================================

/// Named table of validator factories.
///
/// # Examples
///
/// ```
/// use conforma::validator::ValidatorRegistry;
///
/// let mut registry = ValidatorRegistry::new();
/// registry.register_check("even", |check| {
///     let even = check.value.as_ref().and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0);
///     (!even).then(|| check.fail("number.not.even"))
/// });
///
/// assert!(registry.has("even"));
/// assert!(registry.build("even", None).is_ok());
/// assert!(registry.build("odd", None).is_err());
/// ```
#[derive(Clone)]
pub struct ValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl ValidatorRegistry {
    /// Creates a registry with all built-in validators and the default MX
    /// resolver.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_presence_validators();
        registry.register_format_validators();
        registry.register_comparison_validators();
        registry.register_mx(dns::default_resolver(), DEFAULT_MX_TIMEOUT);

        registry
    }

    /// Creates a registry without any validators.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Replaces the resolver and deadline used by `emailMx`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_mx_resolver(mut self, resolver: Arc<dyn MxResolver>, timeout: Duration) -> Self {
        self.register_mx(resolver, timeout);
        self
    }

    /// Registers a factory, replacing any previous one of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&Value>) -> Result<ValidatorFn, ConfigError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Registers a parameterless synchronous check.
    pub fn register_check<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&Check) -> Option<ValidationError> + Send + Sync + 'static,
    {
        let check = sync_validator(check);
        self.register(name, move |_| Ok(Arc::clone(&check)));
    }

    /// Builds the validator `name` with `params`.
    pub fn build(&self, name: &str, params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownValidator(name.to_string()))?;
        factory(params)
    }

    /// Check if a validator exists
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Get all validator names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    // Registration methods for each category

    fn register_presence_validators(&mut self) {
        self.register_check("required", |check| {
            check.value.is_none().then(|| check.fail("required"))
        });
        self.register_check("notEmpty", |check| {
            is_empty(check.value.as_ref()).then(|| check.fail("not.empty"))
        });
    }

    fn register_format_validators(&mut self) {
        self.register_check("email", |check| {
            (!EMAIL_REGEX.is_match(&text(check))).then(|| check.fail("email.invalid.format"))
        });
        self.register("alpha", |params| {
            let regex = if is_true(params) { &ALPHA_SPACED } else { &ALPHA };
            Ok(pattern(regex, "only.alpha.allowed"))
        });
        self.register("alnum", |params| {
            let regex = if is_true(params) { &ALNUM_SPACED } else { &ALNUM };
            Ok(pattern(regex, "only.alnum.allowed"))
        });
        self.register_check("number", |check| {
            (!is_number(check.value.as_ref())).then(|| check.fail("number.invalid"))
        });
        self.register_check("objectId", |check| {
            (!OBJECT_ID.is_match(&text(check))).then(|| check.fail("object.id.invalid"))
        });
        self.register("isDate", is_date);
        self.register("length", length);
    }

    fn register_comparison_validators(&mut self) {
        self.register("equals", equals);
        self.register("compare", compare);
        self.register("contains", contains);
        self.register("inList", in_list);
    }

    fn register_mx(&mut self, resolver: Arc<dyn MxResolver>, timeout: Duration) {
        self.register("emailMx", move |_| Ok(email_mx(Arc::clone(&resolver), timeout)));
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}

// ============================================================================
// FACTORIES
// ============================================================================

fn pattern(regex: &'static LazyLock<Regex>, code: &'static str) -> ValidatorFn {
    sync_validator(move |check| (!regex.is_match(&text(check))).then(|| check.fail(code)))
}

fn is_date(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let format = match params {
        None | Some(Value::Null) => None,
        Some(Value::String(format)) => Some(format.clone()),
        Some(other) => {
            return Err(ConfigError::invalid_params(
                "isDate",
                format!("expected a format string, got {other}"),
            ));
        }
    };

    Ok(sync_validator(move |check| {
        temporal::parse_date(&text(check), format.as_deref())
            .is_none()
            .then(|| check.fail("date.invalid"))
    }))
}

fn length(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let bound = |key: &str| params.and_then(|p| p.get(key)).and_then(Value::as_i64);
    let (min, max) = match params {
        Some(Value::Number(n)) => (None, n.as_i64()),
        _ => (bound("min"), bound("max")),
    };

    if min.is_none() && max.is_none() {
        return Err(ConfigError::invalid_params(
            "length",
            "expected {\"min\": n} and/or {\"max\": n}",
        ));
    }

    Ok(sync_validator(move |check| {
        let len = match &check.value {
            None => 0,
            Some(Value::String(s)) => s.chars().count(),
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(other) => to_display_string(other).chars().count(),
        } as i64;

        let too_short = min.is_some_and(|min| len < min);
        let too_long = max.is_some_and(|max| len > max);
        (too_short || too_long).then(|| check.fail("length.invalid").with_bounds(min, max))
    }))
}

fn equals(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let expected = params
        .cloned()
        .ok_or_else(|| ConfigError::invalid_params("equals", "expected a value to compare with"))?;

    Ok(sync_validator(move |check| {
        (!loosely_equal(check.value.as_ref(), Some(&expected))).then(|| check.fail("equals.mismatch"))
    }))
}

fn compare(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let other = params
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::invalid_params("compare", "expected the path of another field"))?;

    Ok(sync_validator(move |check| {
        (check.value.as_ref() != check.sibling(&other)).then(|| check.fail("compare.mismatch"))
    }))
}

fn contains(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let needle = params
        .filter(|p| !p.is_null())
        .cloned()
        .ok_or_else(|| ConfigError::invalid_params("contains", "expected a value to look for"))?;

    Ok(sync_validator(move |check| {
        let found = match &check.value {
            Some(Value::Array(items)) => items.iter().any(|item| loosely_equal(Some(item), Some(&needle))),
            Some(value) => to_display_string(value).contains(&to_display_string(&needle)),
            None => false,
        };
        (!found).then(|| check.fail("contains.missing"))
    }))
}

fn in_list(params: Option<&Value>) -> Result<ValidatorFn, ConfigError> {
    let list = params
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| ConfigError::invalid_params("inList", "expected a list of allowed values"))?;

    Ok(sync_validator(move |check| {
        let listed = list.iter().any(|allowed| loosely_equal(check.value.as_ref(), Some(allowed)));
        (!listed).then(|| check.fail("in.list.missing"))
    }))
}

fn email_mx(resolver: Arc<dyn MxResolver>, timeout: Duration) -> ValidatorFn {
    Arc::new(move |check: Check| {
        let resolver = Arc::clone(&resolver);
        async move {
            let address = text(&check).into_owned();
            let Some(domain) = address.rsplit_once('@').map(|(_, d)| d.trim()).filter(|d| !d.is_empty())
            else {
                return Ok(Outcome::Fail(check.fail("email.mx.missing")));
            };

            let lookup = tokio::time::timeout(timeout, resolver.lookup_mx(domain))
                .await
                .map_err(|_| ValidatorFault::Timeout {
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })?;

            match lookup {
                Ok(hosts) if hosts.is_empty() => Ok(Outcome::Fail(check.fail("email.mx.missing"))),
                Ok(_) => Ok(Outcome::Pass),
                Err(fault) => {
                    tracing::debug!(domain, error = %fault, "MX lookup failed");
                    Ok(Outcome::Fail(check.fail("email.mx.lookup.failed")))
                }
            }
        }
        .boxed()
    })
}

// ============================================================================
// HELPERS
// ============================================================================

fn text(check: &Check) -> Cow<'_, str> {
    match &check.value {
        None => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s),
        Some(other) => Cow::Owned(to_display_string(other)),
    }
}

fn is_true(params: Option<&Value>) -> bool {
    matches!(params, Some(Value::Bool(true)))
}

fn is_number(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(_)) => true,
        Some(Value::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s.parse::<f64>().is_ok_and(f64::is_finite)
        }
        _ => false,
    }
}

/// Strict equality, or equal display forms when both sides are scalars.
fn loosely_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if a == b => true,
        (Some(a), Some(b)) if is_scalar(a) && is_scalar(b) => {
            to_display_string(a) == to_display_string(b)
        }
        (None, None) => true,
        _ => false,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::dns::StaticResolver;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    async fn run(registry: &ValidatorRegistry, name: &str, params: Option<Value>, value: Option<Value>) -> Outcome {
        let validator = registry.build(name, params.as_ref()).unwrap();
        let check = Check {
            field: "field".into(),
            path: "field".into(),
            value,
            message: None,
            document: Arc::new(json!({"password": "secret"})),
        };
        validator(check).await.unwrap()
    }

    async fn message(name: &str, params: Option<Value>, value: Option<Value>) -> Option<String> {
        match run(&ValidatorRegistry::new(), name, params, value).await {
            Outcome::Fail(error) => Some(error.message.into_owned()),
            _ => None,
        }
    }

    #[rstest]
    #[case("alpha", None, json!("testäöü"), None)]
    #[case("alpha", None, json!("TEST123"), Some("only.alpha.allowed"))]
    #[case("alpha", None, json!("test me"), Some("only.alpha.allowed"))]
    #[case("alpha", Some(json!(true)), json!("test me äöü"), None)]
    #[case("alpha", None, json!(2), Some("only.alpha.allowed"))]
    #[case("alnum", None, json!("TEST123"), None)]
    #[case("alnum", None, json!("TEST-123"), Some("only.alnum.allowed"))]
    #[case("email", None, json!("user@example.com"), None)]
    #[case("email", None, json!("email(at)localhost"), Some("email.invalid.format"))]
    #[case("number", None, json!("12.5"), None)]
    #[case("number", None, json!(3), None)]
    #[case("number", None, json!("12a"), Some("number.invalid"))]
    #[case("objectId", None, json!("507f1f77bcf86cd799439011"), None)]
    #[case("objectId", None, json!("507f1f77"), Some("object.id.invalid"))]
    #[case("notEmpty", None, json!("0"), Some("not.empty"))]
    #[case("notEmpty", None, json!(" "), None)]
    #[case("isDate", None, json!("2015-12-23"), None)]
    #[case("isDate", Some(json!("DD.MM.YYYY")), json!("23.12.2015"), None)]
    #[case("isDate", Some(json!("DD.MM.YYYY")), json!("123abra"), Some("date.invalid"))]
    #[case("equals", Some(json!("yes")), json!("yes"), None)]
    #[case("equals", Some(json!(5)), json!("5"), None)]
    #[case("equals", Some(json!("yes")), json!("no"), Some("equals.mismatch"))]
    #[case("compare", Some(json!("password")), json!("secret"), None)]
    #[case("compare", Some(json!("password")), json!("other"), Some("compare.mismatch"))]
    #[case("contains", Some(json!("@")), json!("a@b"), None)]
    #[case("contains", Some(json!("x")), json!(["x", "y"]), None)]
    #[case("contains", Some(json!("z")), json!("abc"), Some("contains.missing"))]
    #[case("inList", Some(json!(["a", "b"])), json!("b"), None)]
    #[case("inList", Some(json!(["a", "b"])), json!("c"), Some("in.list.missing"))]
    #[tokio::test]
    async fn builtin_vectors(
        #[case] name: &str,
        #[case] params: Option<Value>,
        #[case] value: Value,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(message(name, params, Some(value)).await.as_deref(), expected);
    }

    #[tokio::test]
    async fn required_only_fails_when_absent() {
        assert_eq!(message("required", None, None).await.as_deref(), Some("required"));
        assert_eq!(message("required", None, Some(json!(""))).await, None);
    }

    #[tokio::test]
    async fn length_carries_bounds() {
        let outcome = run(
            &ValidatorRegistry::new(),
            "length",
            Some(json!({"min": 3, "max": 5})),
            Some(json!("al")),
        )
        .await;

        match outcome {
            Outcome::Fail(error) => {
                assert_eq!(error.message, "length.invalid");
                assert_eq!((error.min, error.max), (Some(3), Some(5)));
                assert_eq!(error.value, Some(json!("al")));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[rstest]
    #[case("inList", Some(json!("a")))]
    #[case("inList", None)]
    #[case("length", Some(json!({})))]
    #[case("compare", None)]
    #[case("equals", None)]
    #[case("isDate", Some(json!(5)))]
    fn bad_params_are_rejected(#[case] name: &str, #[case] params: Option<Value>) {
        let registry = ValidatorRegistry::new();
        let err = registry.build(name, params.as_ref()).err();
        assert!(matches!(err, Some(ConfigError::InvalidParams { .. })), "{name}: {err:?}");
    }

    #[tokio::test]
    async fn email_mx_uses_resolver() {
        let resolver = StaticResolver::new()
            .with_domain("example.com", ["mx1.example.com"])
            .with_domain("nomail.example", Vec::<String>::new());
        let registry = ValidatorRegistry::new().with_mx_resolver(Arc::new(resolver), DEFAULT_MX_TIMEOUT);

        let ok = run(&registry, "emailMx", None, Some(json!("me@example.com"))).await;
        assert!(ok.is_pass());

        let missing = run(&registry, "emailMx", None, Some(json!("me@nomail.example"))).await;
        assert!(matches!(missing, Outcome::Fail(e) if e.message == "email.mx.missing"));

        let failed = run(&registry, "emailMx", None, Some(json!("me@unknown.example"))).await;
        assert!(matches!(failed, Outcome::Fail(e) if e.message == "email.mx.lookup.failed"));

        let no_domain = run(&registry, "emailMx", None, Some(json!("nobody"))).await;
        assert!(matches!(no_domain, Outcome::Fail(e) if e.message == "email.mx.missing"));
    }
}
