//! Filter registry and the built-in filters
//!
//! Every filter has the shape `fn(value, params) -> value` and is total: it
//! never fails, whatever it is handed. Absent fields arrive as `Value::Null`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::temporal;
use crate::value::{number_as_f64, number_from_f64, parse_float_prefix, parse_int_prefix, to_display_string};

/// A registered filter function.
pub type FilterFn = Arc<dyn Fn(Value, Option<&Value>) -> Value + Send + Sync>;

/// Named table of filter functions.
///
/// [`FilterRegistry::new`] comes loaded with the built-ins; custom filters can
/// be added or override built-ins with [`FilterRegistry::register`].
///
/// # Examples
///
/// ```
/// use conforma::filter::FilterRegistry;
/// use serde_json::{Value, json};
///
/// let mut registry = FilterRegistry::new();
/// registry.register("double", |value: Value, _: Option<&Value>| {
///     json!(value.as_i64().unwrap_or(0) * 2)
/// });
///
/// assert!(registry.has("double"));
/// assert!(registry.has("trim"));
/// ```
#[derive(Clone)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    /// Creates a registry with all built-in filters.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_scalar_filters();
        registry.register_text_filters();
        registry.register_structured_filters();

        registry
    }

    /// Creates a registry without any filters.
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Registers a filter, replacing any previous one of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(Value, Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Looks up a filter by name.
    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    /// Check if a filter exists
    pub fn has(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Get all filter names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.keys().cloned().collect();
        names.sort();
        names
    }

    // Registration methods for each category

    fn register_scalar_filters(&mut self) {
        self.register("int", int);
        self.register("float", float);
        self.register("bool", bool);
        self.register("digit", digit);
    }

    fn register_text_filters(&mut self) {
        self.register("string", string);
        self.register("trim", trim);
        self.register("lowerCase", lower_case);
        self.register("upperCase", upper_case);
        self.register("escapeHtml", escape_html);
        self.register("unescapeHtml", unescape_html);
        self.register("stripHtml", strip_html);
        self.register("stripHtmlTags", strip_html);
        self.register("addSlashes", add_slashes);
        self.register("addslashes", add_slashes);
        self.register("email", email);
        self.register("url", url);
        self.register("date", date);
        self.register("stringLength", string_length);
    }

    fn register_structured_filters(&mut self) {
        self.register("object", object);
        self.register("array", array);
        self.register("uniqueList", unique_list);
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

// ============================================================================
// SCALAR FILTERS
// ============================================================================

/// Leading integer of the value; `0` when there is none.
pub fn int(value: Value, _params: Option<&Value>) -> Value {
    let parsed = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| number_as_f64(n).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int_prefix(s),
        Value::Array(_) => parse_int_prefix(&to_display_string(&value)),
        _ => None,
    };
    Value::from(parsed.unwrap_or(0))
}

/// Leading decimal of the value; `0` when there is none.
pub fn float(value: Value, _params: Option<&Value>) -> Value {
    match value {
        Value::Number(_) => value,
        Value::String(s) => parse_float_prefix(&s).map_or(Value::from(0), number_from_f64),
        Value::Array(_) => {
            parse_float_prefix(&to_display_string(&value)).map_or(Value::from(0), number_from_f64)
        }
        _ => Value::from(0),
    }
}

/// `true` for `true`, `1` and the strings `true`, `yes`, `on`, `1` (any case).
pub fn bool(value: Value, _params: Option<&Value>) -> Value {
    let truthy = match &value {
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "on" | "1"
        ),
        Value::Bool(b) => *b,
        Value::Number(n) => number_as_f64(n) == Some(1.0),
        _ => false,
    };
    Value::Bool(truthy)
}

/// Keeps only ASCII digits and dots of the stringified value.
pub fn digit(value: Value, _params: Option<&Value>) -> Value {
    let text = to_display_string(&value);
    Value::String(
        text.chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect(),
    )
}

// ============================================================================
// TEXT FILTERS
// ============================================================================

static NON_TEXT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)<script\b[^>]*>.*?</script\s*>",
        r"|<style\b[^>]*>.*?</style\s*>",
        r"|<textarea\b[^>]*>.*?</textarea\s*>",
        r"|<option\b[^>]*>.*?</option\s*>",
        r"|<noscript\b[^>]*>.*?</noscript\s*>",
    ))
    .unwrap()
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*|!--.*?--)[^>]*>").unwrap());

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(lt|gt|quot|apos|amp|#39|#x27|#34);").unwrap());

static EMAIL_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}._\-@]").unwrap());

/// Stringifies the value; with a truthy parameter, trims and strips markup.
pub fn string(value: Value, params: Option<&Value>) -> Value {
    let text = to_display_string(&value);
    if params.is_some_and(is_truthy) {
        Value::String(sanitize(text.trim(), &[]))
    } else {
        Value::String(text)
    }
}

/// Trims surrounding whitespace.
pub fn trim(value: Value, _params: Option<&Value>) -> Value {
    Value::String(to_display_string(&value).trim().to_string())
}

pub fn lower_case(value: Value, _params: Option<&Value>) -> Value {
    Value::String(to_display_string(&value).to_lowercase())
}

pub fn upper_case(value: Value, _params: Option<&Value>) -> Value {
    Value::String(to_display_string(&value).to_uppercase())
}

/// Escapes `& < > " '` as entities.
pub fn escape_html(value: Value, _params: Option<&Value>) -> Value {
    Value::String(escape(&to_display_string(&value), true))
}

/// Reverses [`escape_html`].
pub fn unescape_html(value: Value, _params: Option<&Value>) -> Value {
    Value::String(unescape(&to_display_string(&value)))
}

/// Removes markup, keeping text content.
///
/// Script, style and similar elements are dropped with their content. Text is
/// entity-escaped. `{"allowedTags": ["b", "i"]}` keeps the listed tags.
pub fn strip_html(value: Value, params: Option<&Value>) -> Value {
    let allowed: Vec<&str> = params
        .and_then(|p| p.get("allowedTags"))
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    Value::String(sanitize(&to_display_string(&value), &allowed))
}

/// Backslash-escapes `\`, `"` and `'`; NUL becomes `\0`.
pub fn add_slashes(value: Value, _params: Option<&Value>) -> Value {
    let text = to_display_string(&value);
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' | '"' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    Value::String(out)
}

/// Lowercases and keeps letters, digits, `.`, `_`, `-` and `@`.
///
/// `googlemail.com` is normalized to `gmail.com`.
pub fn email(value: Value, _params: Option<&Value>) -> Value {
    let lowered = to_display_string(&value).to_lowercase();
    let cleaned = EMAIL_DISALLOWED.replace_all(&lowered, "");
    Value::String(cleaned.replacen("googlemail.com", "gmail.com", 1))
}

/// Normalizes an absolute URL.
///
/// With `{"allowedFields": [...]}` only the named components survive
/// (`protocol`, `auth`, `host`, `hostname`, `port`, `pathname`, `search`,
/// `query`, `hash`). Relative input is kept, with unsafe characters
/// percent-encoded.
pub fn url(value: Value, params: Option<&Value>) -> Value {
    let text = to_display_string(&value);

    let Ok(parsed) = Url::parse(text.trim()) else {
        return Value::String(escape_url_chars(&text));
    };

    let fields: Option<Vec<&str>> = params
        .and_then(|p| p.get("allowedFields"))
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect());

    match fields {
        Some(fields) => Value::String(format_url_fields(&parsed, &fields)),
        None => Value::String(parsed.to_string()),
    }
}

/// Parses a date with an optional moment-style format.
///
/// Falsy input (`null`, `""`, `0`, `false`) passes through unchanged.
/// Numbers are epoch milliseconds. Unparseable input becomes `null`.
pub fn date(value: Value, params: Option<&Value>) -> Value {
    if !is_truthy(&value) {
        return value;
    }

    let parsed = match &value {
        Value::Number(n) => n
            .as_i64()
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        other => temporal::parse_date(
            &to_display_string(other),
            params.and_then(Value::as_str),
        ),
    };

    parsed.map_or(Value::Null, |dt| Value::String(temporal::format_date(&dt)))
}

/// Truncates the stringified value to `params` characters.
///
/// Without a positive limit the value is returned untouched.
pub fn string_length(value: Value, params: Option<&Value>) -> Value {
    let Some(max) = params.and_then(Value::as_u64).filter(|&max| max > 0) else {
        return value;
    };
    let max = usize::try_from(max).unwrap_or(usize::MAX);

    Value::String(to_display_string(&value).chars().take(max).collect())
}

// ============================================================================
// STRUCTURED FILTERS
// ============================================================================

/// Coerces to an object.
///
/// Without a truthy parameter the result is always `{}`. With one, objects
/// are kept and strings holding a JSON object are parsed; everything else
/// becomes `{}`.
pub fn object(value: Value, params: Option<&Value>) -> Value {
    if !params.is_some_and(is_truthy) {
        return Value::Object(Map::new());
    }

    match value {
        Value::Object(_) => value,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => Value::Object(Map::new()),
        },
        _ => Value::Object(Map::new()),
    }
}

/// Coerces to an array.
///
/// Without a truthy parameter the result is always `[]`. With one, arrays are
/// kept, `null` becomes `[]` and any other value is wrapped.
pub fn array(value: Value, params: Option<&Value>) -> Value {
    if !params.is_some_and(is_truthy) {
        return Value::Array(Vec::new());
    }

    match value {
        Value::Array(_) => value,
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}

/// Removes duplicate array items, keeping first occurrences.
///
/// Items compare strictly: `"123"` and `123` are distinct.
pub fn unique_list(value: Value, _params: Option<&Value>) -> Value {
    let Value::Array(items) = value else {
        return value;
    };

    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    Value::Array(unique)
}

// ============================================================================
// HELPERS
// ============================================================================

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => number_as_f64(n).is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn escape(text: &str, apostrophe: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' if apostrophe => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| match &caps[1] {
            "lt" => "<",
            "gt" => ">",
            "quot" | "#34" => "\"",
            "apos" | "#39" | "#x27" => "'",
            _ => "&",
        })
        .into_owned()
}

fn sanitize(html: &str, allowed: &[&str]) -> String {
    let html = NON_TEXT_ELEMENT.replace_all(html, "");
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in TAG.captures_iter(&html) {
        let Some(tag) = caps.get(0) else { continue };
        out.push_str(&escape(&unescape(&html[last..tag.start()]), false));
        last = tag.end();

        let name = caps[2].to_ascii_lowercase();
        if allowed.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
            out.push('<');
            out.push_str(&caps[1]);
            out.push_str(&name);
            out.push('>');
        }
    }

    out.push_str(&escape(&unescape(&html[last..]), false));
    out
}

fn escape_url_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' | '}' | '|' | '\\' | '^' | '`' | '\'' | '"' | '<' | '>' | ' ' | '\t' | '\r'
            | '\n' => out.push_str(&format!("%{:02X}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

fn format_url_fields(url: &Url, fields: &[&str]) -> String {
    let has = |name: &str| fields.contains(&name);
    let mut out = String::new();

    if has("protocol") {
        out.push_str(url.scheme());
        out.push(':');
    }

    let mut host = String::new();
    if let Some(hostname) = url.host_str().filter(|_| has("host") || has("hostname")) {
        host.push_str(hostname);
        if let Some(port) = url.port().filter(|_| has("host") || has("port")) {
            host.push_str(&format!(":{port}"));
        }
    }

    if !host.is_empty() {
        out.push_str("//");
        if has("auth") && !url.username().is_empty() {
            out.push_str(url.username());
            if let Some(password) = url.password() {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }
        out.push_str(&host);
    }

    if has("pathname") || has("path") {
        out.push_str(url.path());
    }
    if let Some(query) = url
        .query()
        .filter(|_| has("search") || has("query") || has("path"))
    {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = url.fragment().filter(|_| has("hash")) {
        out.push('#');
        out.push_str(fragment);
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================
