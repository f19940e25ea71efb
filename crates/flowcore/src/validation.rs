//! Structural validation of node configuration.
//!
//! A [`Schema`] mirrors the shape of the configuration it checks. Schemas
//! can be built in code or deserialized from their JSON form:
//!
//! ```json
//! { "type": "object", "required": ["path"],
//!   "properties": { "path": { "type": "string", "minLength": 1 } } }
//! ```
//!
//! Validation is pure: it never mutates the value and `default` is
//! advisory metadata only, it is not injected into the value.

use crate::ConfigurationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative description of an acceptable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSchema", into = "RawSchema")]
pub struct Schema {
    pub kind: SchemaKind,
    /// Reject `null`, missing and empty-string values.
    pub required: bool,
    pub default: Option<Value>,
    pub enumeration: Option<Vec<Value>>,
    pub description: Option<String>,
}

/// The closed set of schema variants, each with its own constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String(StringRules),
    Number(NumberRules),
    Boolean,
    Object(ObjectRules),
    Array(ArrayRules),
    Any,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberRules {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRules {
    /// Property names that must be present as keys.
    pub required: Vec<String>,
    pub properties: IndexMap<String, Schema>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayRules {
    pub items: Option<Box<Schema>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl SchemaKind {
    /// Name used in type-mismatch messages, `None` for `Any`.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            SchemaKind::String(_) => Some("string"),
            SchemaKind::Number(_) => Some("number"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Object(_) => Some("object"),
            SchemaKind::Array(_) => Some("array"),
            SchemaKind::Any => None,
        }
    }
}

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            enumeration: None,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::of(SchemaKind::String(StringRules::default()))
    }

    pub fn number() -> Self {
        Self::of(SchemaKind::Number(NumberRules::default()))
    }

    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }

    pub fn object() -> Self {
        Self::of(SchemaKind::Object(ObjectRules::default()))
    }

    pub fn array(items: Schema) -> Self {
        Self::of(SchemaKind::Array(ArrayRules {
            items: Some(Box::new(items)),
            ..ArrayRules::default()
        }))
    }

    pub fn any() -> Self {
        Self::of(SchemaKind::Any)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enumeration = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Minimum length for strings (in characters) and arrays (in items).
    pub fn min_length(mut self, n: usize) -> Self {
        match &mut self.kind {
            SchemaKind::String(rules) => rules.min_length = Some(n),
            SchemaKind::Array(rules) => rules.min_length = Some(n),
            _ => {}
        }
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        match &mut self.kind {
            SchemaKind::String(rules) => rules.max_length = Some(n),
            SchemaKind::Array(rules) => rules.max_length = Some(n),
            _ => {}
        }
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        if let SchemaKind::String(rules) = &mut self.kind {
            rules.pattern = Some(pattern.into());
        }
        self
    }

    pub fn minimum(mut self, min: f64) -> Self {
        if let SchemaKind::Number(rules) = &mut self.kind {
            rules.minimum = Some(min);
        }
        self
    }

    pub fn maximum(mut self, max: f64) -> Self {
        if let SchemaKind::Number(rules) = &mut self.kind {
            rules.maximum = Some(max);
        }
        self
    }

    /// Declare a nested property. Has no effect on non-object schemas.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let SchemaKind::Object(rules) = &mut self.kind {
            rules.properties.insert(name.into(), schema);
        }
        self
    }

    /// Require the given keys to be present on an object value.
    pub fn require<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let SchemaKind::Object(rules) = &mut self.kind {
            rules.required.extend(names.into_iter().map(Into::into));
        }
        self
    }

    pub fn validate(&self, value: &Value) -> ValidationResult {
        validate(value, self)
    }
}

/// Outcome of a validation pass. Valid exactly when no errors were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    /// Convert into the error raised by node construction.
    pub fn into_result(self, kind: &str) -> Result<(), ConfigurationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigurationError {
                kind: kind.to_string(),
                errors: self.errors,
            })
        }
    }
}

/// Validate `value` against `schema` from the root path.
pub fn validate(value: &Value, schema: &Schema) -> ValidationResult {
    validate_at(Some(value), schema, "")
}

/// Validate a possibly-missing value, reporting errors relative to `path`.
pub fn validate_at(value: Option<&Value>, schema: &Schema, path: &str) -> ValidationResult {
    let mut visitor = Visitor { errors: Vec::new() };
    visitor.visit(value, schema, path);
    ValidationResult {
        errors: visitor.errors,
    }
}

struct Visitor {
    errors: Vec<String>,
}

impl Visitor {
    fn visit(&mut self, value: Option<&Value>, schema: &Schema, path: &str) {
        let name = label(path);

        if schema.required && is_blank(value) {
            self.errors.push(format!("{} is required", name));
            return;
        }

        let Some(value) = value.filter(|v| !v.is_null()) else {
            return;
        };

        if let Some(expected) = schema.kind.type_name() {
            let actual = type_name(value);
            if expected != actual {
                self.errors
                    .push(format!("{} must be of type {}, got {}", name, expected, actual));
                return;
            }
        }

        match &schema.kind {
            SchemaKind::String(rules) => self.visit_string(value, rules, name),
            SchemaKind::Number(rules) => self.visit_number(value, rules, name),
            SchemaKind::Object(rules) => self.visit_object(value, rules, path),
            SchemaKind::Array(rules) => self.visit_array(value, rules, path, name),
            SchemaKind::Boolean | SchemaKind::Any => {}
        }

        if let Some(allowed) = &schema.enumeration {
            if !allowed.iter().any(|candidate| same_value(candidate, value)) {
                let listed: Vec<String> = allowed.iter().map(display_value).collect();
                self.errors
                    .push(format!("{} must be one of: {}", name, listed.join(", ")));
            }
        }
    }

    fn visit_string(&mut self, value: &Value, rules: &StringRules, name: &str) {
        let Some(s) = value.as_str() else { return };
        let len = s.chars().count();

        if let Some(min) = rules.min_length {
            if len < min {
                self.errors
                    .push(format!("{} must be at least {} characters long", name, min));
            }
        }
        if let Some(max) = rules.max_length {
            if len > max {
                self.errors
                    .push(format!("{} must be at most {} characters long", name, max));
            }
        }
        if let Some(pattern) = &rules.pattern {
            // Unparseable patterns are skipped, not reported.
            match regex::Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    self.errors
                        .push(format!("{} must match pattern {}", name, pattern));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Ignoring invalid pattern '{}': {}", pattern, e),
            }
        }
    }

    fn visit_number(&mut self, value: &Value, rules: &NumberRules, name: &str) {
        let Some(n) = value.as_f64().filter(|n| !n.is_nan()) else {
            self.errors.push(format!("{} must be a valid number", name));
            return;
        };

        if let Some(min) = rules.minimum {
            if n < min {
                self.errors.push(format!("{} must be at least {}", name, min));
            }
        }
        if let Some(max) = rules.maximum {
            if n > max {
                self.errors.push(format!("{} must be at most {}", name, max));
            }
        }
    }

    fn visit_object(&mut self, value: &Value, rules: &ObjectRules, path: &str) {
        let Some(map) = value.as_object() else { return };

        for key in &rules.required {
            if !map.contains_key(key) {
                self.errors.push(format!("{} is required", join(path, key)));
            }
        }
        for (key, schema) in &rules.properties {
            self.visit(map.get(key), schema, &join(path, key));
        }
    }

    fn visit_array(&mut self, value: &Value, rules: &ArrayRules, path: &str, name: &str) {
        let Some(items) = value.as_array() else { return };

        if let Some(min) = rules.min_length {
            if items.len() < min {
                self.errors
                    .push(format!("{} must have at least {} items", name, min));
            }
        }
        if let Some(max) = rules.max_length {
            if items.len() > max {
                self.errors
                    .push(format!("{} must have at most {} items", name, max));
            }
        }
        if let Some(schema) = &rules.items {
            for (i, item) in items.iter().enumerate() {
                self.visit(Some(item), schema, &format!("{}[{}]", path, i));
            }
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn label(path: &str) -> &str {
    if path.is_empty() {
        "value"
    } else {
        path
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Runtime type name of a JSON value, arrays distinguished from objects.
/// JSON equality, except numbers compare by value so `1` matches `1.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// JSON representation of a schema.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SchemaType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    #[default]
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRequired {
    Flag(bool),
    Names(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "type", default)]
    ty: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required: Option<RawRequired>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    enumeration: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<IndexMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<Schema>>,
}

impl From<RawSchema> for Schema {
    fn from(raw: RawSchema) -> Self {
        let (required, required_names) = match raw.required {
            Some(RawRequired::Flag(flag)) => (flag, Vec::new()),
            Some(RawRequired::Names(names)) => (false, names),
            None => (false, Vec::new()),
        };

        let kind = match raw.ty {
            SchemaType::String => SchemaKind::String(StringRules {
                min_length: raw.min_length,
                max_length: raw.max_length,
                pattern: raw.pattern,
            }),
            SchemaType::Number => SchemaKind::Number(NumberRules {
                minimum: raw.minimum,
                maximum: raw.maximum,
            }),
            SchemaType::Boolean => SchemaKind::Boolean,
            SchemaType::Object => SchemaKind::Object(ObjectRules {
                required: required_names,
                properties: raw.properties.unwrap_or_default(),
            }),
            SchemaType::Array => SchemaKind::Array(ArrayRules {
                items: raw.items,
                min_length: raw.min_length,
                max_length: raw.max_length,
            }),
            SchemaType::Any => SchemaKind::Any,
        };

        Schema {
            kind,
            required,
            default: raw.default,
            enumeration: raw.enumeration,
            description: raw.description,
        }
    }
}

impl From<Schema> for RawSchema {
    fn from(schema: Schema) -> Self {
        let mut raw = RawSchema {
            required: schema.required.then_some(RawRequired::Flag(true)),
            default: schema.default,
            enumeration: schema.enumeration,
            description: schema.description,
            ..RawSchema::default()
        };

        match schema.kind {
            SchemaKind::String(rules) => {
                raw.ty = SchemaType::String;
                raw.min_length = rules.min_length;
                raw.max_length = rules.max_length;
                raw.pattern = rules.pattern;
            }
            SchemaKind::Number(rules) => {
                raw.ty = SchemaType::Number;
                raw.minimum = rules.minimum;
                raw.maximum = rules.maximum;
            }
            SchemaKind::Boolean => raw.ty = SchemaType::Boolean,
            SchemaKind::Object(rules) => {
                raw.ty = SchemaType::Object;
                if !rules.required.is_empty() {
                    raw.required = Some(RawRequired::Names(rules.required));
                }
                if !rules.properties.is_empty() {
                    raw.properties = Some(rules.properties);
                }
            }
            SchemaKind::Array(rules) => {
                raw.ty = SchemaType::Array;
                raw.items = rules.items;
                raw.min_length = rules.min_length;
                raw.max_length = rules.max_length;
            }
            SchemaKind::Any => raw.ty = SchemaType::Any,
        }
        raw
    }
}
