//! Error types for configuration mistakes and validation failures
//!
//! Three distinct kinds live here:
//!
//! - [`ConfigError`]: programmer errors (unknown filter or validator names,
//!   malformed steps, an empty conform template). Raised at registration time.
//! - [`ValidationError`]: a data-quality failure on one field. Never raised,
//!   always collected.
//! - [`StructuralError`]: the aggregate returned by a failed
//!   [`Conforma::execute`](crate::Conforma::execute). Its `errors` list holds
//!   only leaf failures and data payloads; nesting is impossible by type.
//!
//! [`ValidatorFault`] covers infrastructure trouble inside a check (DNS,
//! timeouts). The validator chain converts it into a [`ValidationError`].
//!
//! All message fields carry machine-readable keys such as `only.alpha.allowed`
//! so callers can localize them.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// CONFIGURATION ERROR
// ============================================================================

/// A programmer error detected while a pipeline is being set up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A filter step names a function the registry does not know.
    #[error("filter \"{0}\" not available")]
    UnknownFilter(String),

    /// A validator spec names a function the registry does not know.
    #[error("validator \"{0}\" not available")]
    UnknownValidator(String),

    /// A keyed step or spec is not a single-key object.
    #[error("malformed {kind}: {detail}")]
    MalformedStep {
        /// `filter` or `validator`.
        kind: &'static str,
        /// What was wrong with it.
        detail: String,
    },

    /// A validator factory rejected its parameters.
    #[error("invalid parameters for validator \"{name}\": {reason}")]
    InvalidParams {
        /// Validator name.
        name: String,
        /// Why the parameters were rejected.
        reason: String,
    },

    /// `conform` was called with nothing to conform to.
    #[error("conform empty value")]
    EmptyConform,

    /// A configuration document could not be parsed.
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

impl ConfigError {
    pub(crate) fn malformed(kind: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedStep {
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_params(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// A failure of one field, as reported to the caller.
///
/// Serializes to `{"field", "message", "value", "min"?, "max"?}`. `value` is
/// omitted when the field was absent.
///
/// # Examples
///
/// ```
/// use conforma::ValidationError;
/// use serde_json::json;
///
/// let error = ValidationError::new("user.name", "length.invalid")
///     .with_value(json!("al"))
///     .with_bounds(Some(3), Some(20));
///
/// assert_eq!(error.min, Some(3));
/// assert_eq!(error.to_string(), "[user.name] length.invalid");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Qualified field path, namespace included.
    pub field: Cow<'static, str>,

    /// Message key, or the override registered for the validator slot.
    pub message: Cow<'static, str>,

    /// The offending value; `None` when the field was absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Lower bound, for range-like checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    /// Upper bound, for range-like checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl ValidationError {
    /// Creates a failure for `field` with a message key.
    pub fn new(field: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
            min: None,
            max: None,
        }
    }

    /// Creates the failure reported for an absent required field.
    pub fn required(field: impl Into<Cow<'static, str>>) -> Self {
        Self::new(field, "required")
    }

    /// Attaches the offending value.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches an optional offending value.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value_opt(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// Attaches lower and upper bounds.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_bounds(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Replaces the message key.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;

        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, " (min={min}, max={max})"),
            (Some(min), None) => write!(f, " (min={min})"),
            (None, Some(max)) => write!(f, " (max={max})"),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// FAILURE ENTRY
// ============================================================================

/// One entry of a [`StructuralError`].
///
/// `Data` entries come from mounted child pipelines: the child's current data,
/// nested under its namespace, travels next to its leaf failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Failure {
    /// A leaf failure of one field.
    Field(ValidationError),
    /// A data payload carried by a failed child pipeline.
    Data(Value),
}

impl Failure {
    /// Returns the leaf failure, if this entry is one.
    #[must_use]
    pub fn as_field(&self) -> Option<&ValidationError> {
        match self {
            Self::Field(error) => Some(error),
            Self::Data(_) => None,
        }
    }

    /// Returns the data payload, if this entry is one.
    #[must_use]
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(data) => Some(data),
            Self::Field(_) => None,
        }
    }
}

impl From<ValidationError> for Failure {
    fn from(error: ValidationError) -> Self {
        Self::Field(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(error) => error.fmt(f),
            Self::Data(data) => write!(f, "data: {data}"),
        }
    }
}

// ============================================================================
// STRUCTURAL ERROR
// ============================================================================

/// The aggregate failure of a pipeline run.
///
/// Serializes to `{"message", "errors": [...]}`. Entries keep the order in
/// which their fields and validators were registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralError {
    /// Summary message.
    pub message: Cow<'static, str>,
    /// Flattened failures, leaf errors and data payloads only.
    pub errors: Vec<Failure>,
}

impl StructuralError {
    /// Creates an aggregate with the given entries.
    pub fn new(message: impl Into<Cow<'static, str>>, errors: Vec<Failure>) -> Self {
        Self {
            message: message.into(),
            errors,
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, failure: impl Into<Failure>) {
        self.errors.push(failure.into());
    }

    /// Returns the number of entries, data payloads included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over leaf failures only.
    pub fn field_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter_map(Failure::as_field)
    }

    /// Iterates over data payloads only.
    pub fn data_payloads(&self) -> impl Iterator<Item = &Value> {
        self.errors.iter().filter_map(Failure::as_data)
    }

    /// Returns the first leaf failure reported for `field`.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&ValidationError> {
        self.field_errors().find(|e| e.field == field)
    }

    /// Converts the aggregate to its wire shape.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} error(s)):", self.message, self.errors.len())?;
        for (i, failure) in self.errors.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for StructuralError {}

// ============================================================================
// VALIDATOR FAULT
// ============================================================================

/// Infrastructure trouble inside a validator.
///
/// Never reaches the caller as an error: the validator chain turns it into a
/// [`ValidationError`] keyed by [`ValidatorFault::code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidatorFault {
    /// A DNS lookup failed.
    #[error("lookup of {domain} failed: {reason}")]
    Resolve {
        /// Domain that was looked up.
        domain: String,
        /// Resolver error text.
        reason: String,
    },

    /// A check exceeded its own deadline.
    #[error("check timed out after {after_ms} ms")]
    Timeout {
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// Anything else a custom validator wants to report.
    #[error("{0}")]
    Other(String),
}

impl ValidatorFault {
    /// Message key used when the fault is reported as a field failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolve { .. } => "validator.fault.resolve",
            Self::Timeout { .. } => "validator.fault.timeout",
            Self::Other(_) => "validator.fault",
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn validation_error_wire_shape() {
        let error = ValidationError::new("name", "length.invalid")
            .with_value(json!("al"))
            .with_bounds(Some(3), None);

        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"field": "name", "message": "length.invalid", "value": "al", "min": 3})
        );
    }

    #[test]
    fn absent_value_is_omitted() {
        let error = ValidationError::required("email");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"field": "email", "message": "required"})
        );
    }

    #[test]
    fn structural_error_wire_shape() {
        let error = StructuralError::new(
            "failed",
            vec![
                ValidationError::required("address.street").into(),
                Failure::Data(json!({"address": {"city": "X"}})),
            ],
        );

        assert_eq!(
            error.to_json_value(),
            json!({
                "message": "failed",
                "errors": [
                    {"field": "address.street", "message": "required"},
                    {"address": {"city": "X"}}
                ]
            })
        );
        assert_eq!(error.field_errors().count(), 1);
        assert_eq!(error.data_payloads().count(), 1);
    }

    #[test]
    fn field_lookup() {
        let mut error = StructuralError::new("failed", Vec::new());
        error.push(ValidationError::new("a", "x"));
        error.push(ValidationError::new("b", "y"));

        assert_eq!(error.field("b").map(|e| e.message.as_ref()), Some("y"));
        assert!(error.field("c").is_none());
    }

    #[test]
    fn display_lists_entries() {
        let error = StructuralError::new("failed", vec![ValidationError::required("a").into()]);
        let text = error.to_string();
        assert!(text.contains("failed (1 error(s))"));
        assert!(text.contains("[a] required"));
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::UnknownFilter("unknown".into()).to_string(),
            "filter \"unknown\" not available"
        );
        assert_eq!(ConfigError::EmptyConform.to_string(), "conform empty value");
    }

    #[test]
    fn fault_codes() {
        let fault = ValidatorFault::Timeout { after_ms: 10 };
        assert_eq!(fault.code(), "validator.fault.timeout");
        assert_eq!(fault.to_string(), "check timed out after 10 ms");
    }
}
