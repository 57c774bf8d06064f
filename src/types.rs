//! Compiled Type Model
//!
//! The descriptor tree produced by the compiler. Records live exactly once in
//! the compilation cache; every use site refers to them through a
//! [`CompiledType::Named`] link, which is how sharing and recursion are
//! represented without self-referential ownership.

use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Type Identity
// =============================================================================

/// Index of a named type in the compilation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Primitive Kinds
// =============================================================================

/// JSON primitive kind of a compiled scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
    /// The absence marker; `null` alternatives compile to this
    Null,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Constraints
// =============================================================================

/// A compiled regular expression that remembers its source
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Unanchored search, matching JSON Schema `pattern` semantics
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// String `format` values understood by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Uuid,
    Date,
    DateTime,
    Uri,
    /// Carried through to exports but not checked
    Other(String),
}

impl StringFormat {
    pub fn from_name(name: &str) -> Self {
        match name {
            "email" => Self::Email,
            "uuid" => Self::Uuid,
            "date" => Self::Date,
            "date-time" => Self::DateTime,
            "uri" => Self::Uri,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Uuid => "uuid",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Uri => "uri",
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Serialize for StringFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Validation constraints attached to a primitive type or a field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// One `keyword: value` line per constraint, in keyword order
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(pattern) = &self.pattern {
            lines.push(format!("pattern: `{}`", pattern.as_str()));
        }
        if let Some(format) = &self.format {
            lines.push(format!("format: {}", format.as_str()));
        }
        let bounds = [
            ("minLength", self.min_length.map(|v| v as f64)),
            ("maxLength", self.max_length.map(|v| v as f64)),
            ("minimum", self.minimum),
            ("maximum", self.maximum),
            ("exclusiveMinimum", self.exclusive_minimum),
            ("exclusiveMaximum", self.exclusive_maximum),
            ("multipleOf", self.multiple_of),
            ("minItems", self.min_items.map(|v| v as f64)),
            ("maxItems", self.max_items.map(|v| v as f64)),
        ];
        for (keyword, value) in bounds {
            if let Some(value) = value {
                lines.push(format!("{}: {}", keyword, value));
            }
        }
        lines
    }
}

// =============================================================================
// Compiled Types
// =============================================================================

/// A compiled, validating type descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompiledType {
    Primitive {
        kind: PrimitiveKind,
        constraints: Constraints,
    },
    /// Enumerated literal values, in declaration order
    Literal(Vec<Value>),
    ArrayOf {
        element: Box<CompiledType>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },
    Record(Record),
    /// Alternatives in declaration order; the first match wins
    Union(Vec<CompiledType>),
    Optional(Box<CompiledType>),
    /// Link to a named type in the compilation cache
    Named(TypeId),
    /// Recursion placeholder; never survives finalize
    Pending(String),
    /// Unconstrained value (unknown or unsupported schema node)
    Dynamic,
}

impl CompiledType {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive {
            kind,
            constraints: Constraints::default(),
        }
    }

    pub fn null() -> Self {
        Self::primitive(PrimitiveKind::Null)
    }

    /// Wrap in `Optional` unless already optional
    pub fn optional(inner: CompiledType) -> Self {
        match inner {
            Self::Optional(_) => inner,
            other => Self::Optional(Box::new(other)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Primitive { kind: PrimitiveKind::Null, .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// True if a placeholder occurs anywhere in this tree
    pub fn contains_pending(&self) -> bool {
        match self {
            Self::Pending(_) => true,
            Self::ArrayOf { element, .. } => element.contains_pending(),
            Self::Record(record) => record.fields.iter().any(|f| f.ty.contains_pending()),
            Self::Union(variants) => variants.iter().any(CompiledType::contains_pending),
            Self::Optional(inner) => inner.contains_pending(),
            _ => false,
        }
    }

    /// Collect every named link reachable without crossing into other slots
    pub fn links(&self, out: &mut Vec<TypeId>) {
        match self {
            Self::Named(id) => out.push(*id),
            Self::ArrayOf { element, .. } => element.links(out),
            Self::Record(record) => {
                for field in &record.fields {
                    field.ty.links(out);
                }
            }
            Self::Union(variants) => {
                for variant in variants {
                    variant.links(out);
                }
            }
            Self::Optional(inner) => inner.links(out),
            _ => {}
        }
    }

    /// Constraints a field of this type carries
    pub fn constraints(&self) -> Constraints {
        match self {
            Self::Primitive { constraints, .. } => constraints.clone(),
            Self::ArrayOf {
                min_items,
                max_items,
                ..
            } => Constraints {
                min_items: *min_items,
                max_items: *max_items,
                ..Constraints::default()
            },
            Self::Optional(inner) => inner.constraints(),
            Self::Union(variants) => variants
                .iter()
                .find(|v| !v.is_null())
                .map(CompiledType::constraints)
                .unwrap_or_default(),
            _ => Constraints::default(),
        }
    }
}

/// A named object type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    /// Fields in schema declaration order
    pub fields: Vec<Field>,
    /// Rejects keys that are not declared fields (`additionalProperties: false`)
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// A record field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: CompiledType,
    pub required: bool,
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value filled in when the field is absent; `null` unless the schema
    /// declares its own default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_does_not_nest() {
        let ty = CompiledType::optional(CompiledType::optional(CompiledType::primitive(
            PrimitiveKind::String,
        )));
        match ty {
            CompiledType::Optional(inner) => assert!(matches!(*inner, CompiledType::Primitive { .. })),
            other => panic!("Expected Optional, got {:?}", other),
        }
    }

    #[test]
    fn test_contains_pending_nested() {
        let ty = CompiledType::Union(vec![
            CompiledType::null(),
            CompiledType::ArrayOf {
                element: Box::new(CompiledType::Pending("Node".into())),
                min_items: None,
                max_items: None,
            },
        ]);
        assert!(ty.contains_pending());
        assert!(!CompiledType::Dynamic.contains_pending());
    }

    #[test]
    fn test_pattern_equality_uses_source() {
        let a = Pattern::new("^@[a-z]+$").unwrap();
        let b = Pattern::new("^@[a-z]+$").unwrap();
        assert_eq!(a, b);
        assert!(a.is_match("@user"));
        assert!(Pattern::new("(unclosed").is_err());
    }

    #[test]
    fn test_constraints_describe() {
        let c = Constraints {
            min_length: Some(3),
            multiple_of: Some(0.5),
            ..Constraints::default()
        };
        assert_eq!(c.describe(), vec!["minLength: 3", "multipleOf: 0.5"]);
        assert!(Constraints::default().is_empty());
    }

    #[test]
    fn test_field_constraints_from_optional_union() {
        let string = CompiledType::Primitive {
            kind: PrimitiveKind::String,
            constraints: Constraints {
                max_length: Some(5),
                ..Constraints::default()
            },
        };
        let ty = CompiledType::optional(CompiledType::Union(vec![CompiledType::null(), string]));
        assert_eq!(ty.constraints().max_length, Some(5));
    }
}
