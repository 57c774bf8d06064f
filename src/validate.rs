//! Instance Validation
//!
//! Walks a JSON instance alongside the compiled descriptor. No per-schema
//! Rust types are generated at runtime; every check is a match on
//! [`CompiledType`].
//!
//! Union variants are tried in declaration order and the first one that
//! accepts the instance wins. Paths in reports are JSON pointers into the
//! instance (`""` is the instance itself).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::compiler::CompiledSchema;
use crate::schema::json_kind;
use crate::types::{CompiledType, Constraints, PrimitiveKind, Record, StringFormat};

/// Relative tolerance for `multipleOf` with a fractional divisor
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Errors
// =============================================================================

/// A single validation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: &'static str,
    },

    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: String },

    #[error("{path}: unexpected field '{field}'")]
    UnexpectedField { path: String, field: String },

    #[error("{path}: {value} is not one of [{allowed}]")]
    NotAllowed {
        path: String,
        value: String,
        allowed: String,
    },

    #[error("{path}: {keyword} violated: {message}")]
    Constraint {
        path: String,
        keyword: &'static str,
        message: String,
    },

    #[error("{path}: matches none of [{}]", .attempted.join(", "))]
    UnionMismatch { path: String, attempted: Vec<String> },

    #[error("{path}: type {name} is unresolved")]
    Unresolved { path: String, name: String },
}

impl ValidationError {
    pub fn path(&self) -> &str {
        match self {
            Self::TypeMismatch { path, .. }
            | Self::MissingField { path, .. }
            | Self::UnexpectedField { path, .. }
            | Self::NotAllowed { path, .. }
            | Self::Constraint { path, .. }
            | Self::UnionMismatch { path, .. }
            | Self::Unresolved { path, .. } => path,
        }
    }
}

/// Every failure found in one instance
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance failed validation with {} error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

// =============================================================================
// Validator
// =============================================================================

/// Descriptor-driven validator for one compiled schema
#[derive(Debug, Clone, Copy)]
pub struct Validator<'s> {
    schema: &'s CompiledSchema,
}

impl<'s> Validator<'s> {
    pub fn new(schema: &'s CompiledSchema) -> Self {
        Self { schema }
    }

    /// Validate against the root type
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationReport> {
        self.validate_type(&CompiledType::Named(self.schema.root_id()), instance)
    }

    /// Validate against an arbitrary type of this schema
    pub fn validate_type(&self, ty: &CompiledType, instance: &Value) -> Result<(), ValidationReport> {
        let mut errors = Vec::new();
        self.check(ty, instance, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { errors })
        }
    }

    /// Validate against a named type of this schema
    pub fn validate_named(&self, name: &str, instance: &Value) -> Result<(), ValidationReport> {
        match self.schema.cache().id_of(name) {
            Some(id) => self.validate_type(&CompiledType::Named(id), instance),
            None => Err(ValidationReport {
                errors: vec![ValidationError::Unresolved {
                    path: String::new(),
                    name: name.to_string(),
                }],
            }),
        }
    }

    /// Index of the first variant that accepts `instance`
    pub fn select_variant(&self, variants: &[CompiledType], instance: &Value) -> Option<usize> {
        variants.iter().position(|variant| {
            let mut scratch = Vec::new();
            self.check(variant, instance, "", &mut scratch);
            scratch.is_empty()
        })
    }

    /// Validate, then fill defaults for absent optional fields
    pub fn instantiate(&self, instance: &Value) -> Result<Value, ValidationReport> {
        self.validate(instance)?;
        Ok(self.fill(&CompiledType::Named(self.schema.root_id()), instance))
    }

    /// Short label used when naming union variants
    pub fn label(&self, ty: &CompiledType) -> String {
        match ty {
            CompiledType::Named(id) => self
                .schema
                .name_of(*id)
                .map(String::from)
                .unwrap_or_else(|| id.to_string()),
            CompiledType::Record(record) => record.name.clone(),
            CompiledType::Primitive { kind, .. } => kind.as_str().to_string(),
            CompiledType::Literal(_) => "enum".to_string(),
            CompiledType::ArrayOf { element, .. } => format!("array of {}", self.label(element)),
            CompiledType::Union(variants) => variants
                .iter()
                .map(|v| self.label(v))
                .collect::<Vec<_>>()
                .join(" | "),
            CompiledType::Optional(inner) => format!("optional {}", self.label(inner)),
            CompiledType::Pending(name) => name.clone(),
            CompiledType::Dynamic => "any".to_string(),
        }
    }

    fn check(&self, ty: &CompiledType, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        match ty {
            CompiledType::Dynamic => {}
            CompiledType::Named(id) => match self.schema.cache().get_by_id(*id) {
                Some(target) => self.check(target, value, path, errors),
                None => errors.push(ValidationError::Unresolved {
                    path: path.to_string(),
                    name: id.to_string(),
                }),
            },
            CompiledType::Pending(name) => errors.push(ValidationError::Unresolved {
                path: path.to_string(),
                name: name.clone(),
            }),
            CompiledType::Optional(inner) => {
                if !value.is_null() {
                    self.check(inner, value, path, errors);
                }
            }
            CompiledType::Primitive { kind, constraints } => {
                if !kind_matches(*kind, value) {
                    errors.push(ValidationError::TypeMismatch {
                        path: path.to_string(),
                        expected: kind.as_str().to_string(),
                        found: json_kind(value),
                    });
                    return;
                }
                check_constraints(constraints, value, path, errors);
            }
            CompiledType::Literal(values) => {
                if !values.iter().any(|allowed| literal_eq(allowed, value)) {
                    errors.push(ValidationError::NotAllowed {
                        path: path.to_string(),
                        value: value.to_string(),
                        allowed: values.iter().map(Value::to_string).collect::<Vec<_>>().join(", "),
                    });
                }
            }
            CompiledType::ArrayOf {
                element,
                min_items,
                max_items,
            } => {
                let Some(items) = value.as_array() else {
                    errors.push(ValidationError::TypeMismatch {
                        path: path.to_string(),
                        expected: "array".to_string(),
                        found: json_kind(value),
                    });
                    return;
                };
                let len = items.len() as u64;
                if let Some(min) = min_items.filter(|min| len < *min) {
                    errors.push(constraint(path, "minItems", format!("expected at least {} items, found {}", min, len)));
                }
                if let Some(max) = max_items.filter(|max| len > *max) {
                    errors.push(constraint(path, "maxItems", format!("expected at most {} items, found {}", max, len)));
                }
                for (i, item) in items.iter().enumerate() {
                    self.check(element, item, &format!("{}/{}", path, i), errors);
                }
            }
            CompiledType::Record(record) => self.check_record(record, value, path, errors),
            CompiledType::Union(variants) => {
                if self.select_variant(variants, value).is_none() {
                    errors.push(ValidationError::UnionMismatch {
                        path: path.to_string(),
                        attempted: variants.iter().map(|v| self.label(v)).collect(),
                    });
                }
            }
        }
    }

    fn check_record(&self, record: &Record, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        let Some(object) = value.as_object() else {
            errors.push(ValidationError::TypeMismatch {
                path: path.to_string(),
                expected: record.name.clone(),
                found: json_kind(value),
            });
            return;
        };

        for field in &record.fields {
            match object.get(&field.name) {
                Some(field_value) => {
                    let field_path = format!("{}/{}", path, escape_pointer(&field.name));
                    self.check(&field.ty, field_value, &field_path, errors);
                }
                None if field.required => errors.push(ValidationError::MissingField {
                    path: path.to_string(),
                    field: field.name.clone(),
                }),
                None => {}
            }
        }

        if record.closed {
            for key in object.keys().filter(|key| !record.has_field(key)) {
                errors.push(ValidationError::UnexpectedField {
                    path: path.to_string(),
                    field: key.clone(),
                });
            }
        }
    }

    fn fill(&self, ty: &CompiledType, value: &Value) -> Value {
        match ty {
            CompiledType::Named(id) => match self.schema.cache().get_by_id(*id) {
                Some(target) => self.fill(target, value),
                None => value.clone(),
            },
            CompiledType::Optional(inner) if !value.is_null() => self.fill(inner, value),
            CompiledType::Record(record) => match value.as_object() {
                Some(object) => Value::Object(self.fill_record(record, object)),
                None => value.clone(),
            },
            CompiledType::ArrayOf { element, .. } => match value.as_array() {
                Some(items) => Value::Array(items.iter().map(|item| self.fill(element, item)).collect()),
                None => value.clone(),
            },
            CompiledType::Union(variants) => match self.select_variant(variants, value) {
                Some(index) => self.fill(&variants[index], value),
                None => value.clone(),
            },
            _ => value.clone(),
        }
    }

    fn fill_record(&self, record: &Record, object: &Map<String, Value>) -> Map<String, Value> {
        let mut filled = object.clone();
        for field in &record.fields {
            match object.get(&field.name) {
                Some(field_value) => {
                    let value = self.fill(&field.ty, field_value);
                    filled.insert(field.name.clone(), value);
                }
                None => {
                    if let Some(default) = &field.default {
                        filled.insert(field.name.clone(), default.clone());
                    }
                }
            }
        }
        filled
    }
}

// =============================================================================
// Scalar Checks
// =============================================================================

fn constraint(path: &str, keyword: &'static str, message: String) -> ValidationError {
    ValidationError::Constraint {
        path: path.to_string(),
        keyword,
        message,
    }
}

fn kind_matches(kind: PrimitiveKind, value: &Value) -> bool {
    match kind {
        PrimitiveKind::String => value.is_string(),
        PrimitiveKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => true,
            Value::Number(n) => n.as_f64().map_or(false, |f| f.is_finite() && f.fract() == 0.0),
            _ => false,
        },
        PrimitiveKind::Number => value.is_number(),
        PrimitiveKind::Boolean => value.is_boolean(),
        PrimitiveKind::Null => value.is_null(),
    }
}

/// Numbers compare by value so `1` matches a literal `1.0`
fn literal_eq(allowed: &Value, value: &Value) -> bool {
    match (allowed, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => allowed == value,
    }
}

fn check_constraints(constraints: &Constraints, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    if let Some(text) = value.as_str() {
        let len = text.chars().count() as u64;
        if let Some(min) = constraints.min_length.filter(|min| len < *min) {
            errors.push(constraint(path, "minLength", format!("expected at least {} characters, found {}", min, len)));
        }
        if let Some(max) = constraints.max_length.filter(|max| len > *max) {
            errors.push(constraint(path, "maxLength", format!("expected at most {} characters, found {}", max, len)));
        }
        if let Some(pattern) = &constraints.pattern {
            if !pattern.is_match(text) {
                errors.push(constraint(path, "pattern", format!("'{}' does not match {}", text, pattern.as_str())));
            }
        }
        if let Some(format) = &constraints.format {
            if !format_matches(format, text) {
                errors.push(constraint(path, "format", format!("'{}' is not a valid {}", text, format.as_str())));
            }
        }
        return;
    }

    let Some(number) = value.as_f64() else { return };
    if let Some(min) = constraints.minimum.filter(|min| number < *min) {
        errors.push(constraint(path, "minimum", format!("{} is less than {}", number, min)));
    }
    if let Some(max) = constraints.maximum.filter(|max| number > *max) {
        errors.push(constraint(path, "maximum", format!("{} is greater than {}", number, max)));
    }
    if let Some(min) = constraints.exclusive_minimum.filter(|min| number <= *min) {
        errors.push(constraint(path, "exclusiveMinimum", format!("{} is not greater than {}", number, min)));
    }
    if let Some(max) = constraints.exclusive_maximum.filter(|max| number >= *max) {
        errors.push(constraint(path, "exclusiveMaximum", format!("{} is not less than {}", number, max)));
    }
    if let Some(k) = constraints.multiple_of {
        if !is_multiple_of(number, k) {
            errors.push(constraint(path, "multipleOf", format!("{} is not a multiple of {}", number, k)));
        }
    }
}

/// Exact for integral operands; relative tolerance otherwise
pub fn is_multiple_of(value: f64, divisor: f64) -> bool {
    if divisor <= 0.0 || !divisor.is_finite() || !value.is_finite() {
        return false;
    }
    if value.fract() == 0.0 && divisor.fract() == 0.0 {
        return value % divisor == 0.0;
    }
    let quotient = value / divisor;
    (quotient - quotient.round()).abs() < MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0)
}

fn format_matches(format: &StringFormat, text: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    static UUID: OnceLock<Option<Regex>> = OnceLock::new();
    static URI: OnceLock<Option<Regex>> = OnceLock::new();

    fn regex_matches(cell: &OnceLock<Option<Regex>>, source: &str, text: &str) -> bool {
        cell.get_or_init(|| Regex::new(source).ok())
            .as_ref()
            .map_or(true, |re| re.is_match(text))
    }

    match format {
        StringFormat::Email => regex_matches(&EMAIL, r"^[^@\s]+@[^@\s]+\.[^@\s]+$", text),
        StringFormat::Uuid => regex_matches(
            &UUID,
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            text,
        ),
        StringFormat::Uri => regex_matches(&URI, r"^[a-zA-Z][a-zA-Z0-9+.\-]*:[^\s]+$", text),
        StringFormat::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        // Timestamps without an offset are accepted as local times
        StringFormat::DateTime => {
            DateTime::parse_from_rfc3339(text).is_ok()
                || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        StringFormat::Other(_) => true,
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_value;
    use serde_json::json;

    #[test]
    fn test_multiple_of_integer_and_fractional() {
        assert!(is_multiple_of(50.0, 5.0));
        assert!(!is_multiple_of(42.0, 5.0));
        assert!(is_multiple_of(19.99, 0.01));
        assert!(is_multiple_of(0.3, 0.1));
        assert!(!is_multiple_of(0.35, 0.1));
        assert!(is_multiple_of(0.0, 0.25));
    }

    #[test]
    fn test_formats() {
        assert!(format_matches(&StringFormat::Email, "user@example.com"));
        assert!(!format_matches(&StringFormat::Email, "not-an-email"));
        assert!(format_matches(&StringFormat::Uuid, "123e4567-e89b-12d3-a456-426614174000"));
        assert!(!format_matches(&StringFormat::Uuid, "123e4567"));
        assert!(format_matches(&StringFormat::Date, "2025-01-15"));
        assert!(!format_matches(&StringFormat::Date, "2025-13-40"));
        assert!(format_matches(&StringFormat::DateTime, "2025-01-15T10:30:00Z"));
        assert!(format_matches(&StringFormat::DateTime, "2025-01-15T10:30:00"));
        assert!(!format_matches(&StringFormat::DateTime, "yesterday"));
        assert!(format_matches(&StringFormat::Other("hostname".into()), "anything"));
    }

    #[test]
    fn test_integer_accepts_zero_fraction() {
        assert!(kind_matches(PrimitiveKind::Integer, &json!(3)));
        assert!(kind_matches(PrimitiveKind::Integer, &json!(3.0)));
        assert!(!kind_matches(PrimitiveKind::Integer, &json!(3.5)));
        assert!(kind_matches(PrimitiveKind::Number, &json!(3)));
    }

    #[test]
    fn test_string_constraints_report_paths() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "username": {"type": "string", "minLength": 3, "pattern": "^@"}
                },
                "required": ["username"]
            }),
            "Profile",
        )
        .unwrap();

        let report = schema.validate(&json!({"username": "ab"})).unwrap_err();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|e| e.path() == "/username"));
        assert!(schema.validate(&json!({"username": "@bob"})).is_ok());
    }

    #[test]
    fn test_closed_record_rejects_extra_keys() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}},
                "additionalProperties": false
            }),
            "Closed",
        )
        .unwrap();

        match schema.validate(&json!({"a": 1, "b": 2})) {
            Err(report) => assert_eq!(
                report.errors,
                vec![ValidationError::UnexpectedField { path: String::new(), field: "b".into() }]
            ),
            Ok(()) => panic!("Expected extra key to be rejected"),
        }
    }

    #[test]
    fn test_literal_with_null() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"unit": {"type": ["string", "null"], "enum": ["F", "C", null]}},
                "required": ["unit"]
            }),
            "Weather",
        )
        .unwrap();
        assert!(schema.validate(&json!({"unit": null})).is_ok());
        assert!(schema.validate(&json!({"unit": "C"})).is_ok());
        assert!(schema.validate(&json!({"unit": "K"})).is_err());
    }

    #[test]
    fn test_instantiate_fills_defaults() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "nickname": {"type": "string"},
                    "level": {"type": "integer", "default": 1},
                    "pet": {
                        "type": "object",
                        "properties": {"species": {"type": "string"}, "age": {"type": "integer"}}
                    }
                },
                "required": ["name"]
            }),
            "Player",
        )
        .unwrap();

        let filled = schema
            .validator()
            .instantiate(&json!({"name": "Ada", "pet": {"species": "cat"}}))
            .unwrap();
        assert_eq!(
            filled,
            json!({
                "name": "Ada",
                "pet": {"species": "cat", "age": null},
                "nickname": null,
                "level": 1
            })
        );
    }

    #[test]
    fn test_validate_named() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"home": {"$ref": "#/$defs/Address"}},
                "$defs": {"Address": {"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]}}
            }),
            "Person",
        )
        .unwrap();
        let validator = schema.validator();
        assert!(validator.validate_named("Address", &json!({"city": "Oslo"})).is_ok());
        assert!(validator.validate_named("Address", &json!({})).is_err());
        assert!(validator.validate_named("Nope", &json!({})).is_err());
    }
}
