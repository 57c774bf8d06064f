//! Schema Document Parsing
//!
//! Turns raw JSON into [`SchemaNode`] trees. Only the keywords the compiler
//! models are interpreted; anything else (`title`, `$schema`, `examples`,
//! vendor extensions) is metadata and ignored.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::checksum::Fingerprint;
use crate::error::{CompileError, Result};
use crate::types::PrimitiveKind;

// =============================================================================
// Scalar Kinds
// =============================================================================

/// A `type` keyword value naming a scalar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Known(PrimitiveKind),
    /// Forward-compatible kind the compiler does not model
    Unknown(String),
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Self {
        PrimitiveKind::from_name(name)
            .map(Self::Known)
            .unwrap_or_else(|| Self::Unknown(name.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Known(PrimitiveKind::Null))
    }
}

// =============================================================================
// Validation Keywords
// =============================================================================

/// Raw validation keywords of a string or numeric node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keywords {
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
}

impl Keywords {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let mut keywords = Self {
            pattern: obj.get("pattern").and_then(|v| v.as_str()).map(String::from),
            format: obj.get("format").and_then(|v| v.as_str()).map(String::from),
            min_length: obj.get("minLength").and_then(|v| v.as_u64()),
            max_length: obj.get("maxLength").and_then(|v| v.as_u64()),
            minimum: obj.get("minimum").and_then(|v| v.as_f64()),
            maximum: obj.get("maximum").and_then(|v| v.as_f64()),
            exclusive_minimum: obj.get("exclusiveMinimum").and_then(|v| v.as_f64()),
            exclusive_maximum: obj.get("exclusiveMaximum").and_then(|v| v.as_f64()),
            multiple_of: obj.get("multipleOf").and_then(|v| v.as_f64()),
        };

        // Draft-04 boolean form: `"exclusiveMinimum": true` qualifies `minimum`
        if obj.get("exclusiveMinimum").and_then(|v| v.as_bool()) == Some(true) {
            keywords.exclusive_minimum = keywords.minimum.take();
        }
        if obj.get("exclusiveMaximum").and_then(|v| v.as_bool()) == Some(true) {
            keywords.exclusive_maximum = keywords.maximum.take();
        }

        keywords
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// Schema Nodes
// =============================================================================

/// Shape of a schema node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Primitive(ScalarKind),
    /// Ordered literal values (`enum`, or a single `const`)
    Enum(Vec<Value>),
    Array {
        items: Option<Box<SchemaNode>>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },
    Object {
        properties: IndexMap<String, SchemaNode>,
        required: IndexSet<String>,
        additional_properties: bool,
    },
    AnyOf(Vec<SchemaNode>),
    Ref(String),
    /// `"type": ["string", "null"]` over scalar kinds
    TypeUnion(Vec<ScalarKind>),
    /// `true` or `{}`: any value
    Any,
    /// A node shaped only by a keyword outside the supported subset
    Unsupported(String),
}

/// One node of a schema document
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub keywords: Keywords,
}

impl SchemaNode {
    /// A node with no metadata
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            default: None,
            keywords: Keywords::default(),
        }
    }

    /// Parse a node; `path` is the JSON pointer used in error messages
    pub fn from_json(value: &Value, path: &str) -> Result<Self> {
        let obj = match value {
            Value::Bool(true) => return Ok(Self::new(NodeKind::Any)),
            Value::Bool(false) => return Ok(Self::new(NodeKind::Unsupported("false".into()))),
            Value::Object(obj) => obj,
            other => {
                return Err(invalid(
                    path,
                    format!("expected an object or boolean, found {}", json_kind(other)),
                ))
            }
        };

        let kind = detect_kind(obj, path)?;

        let mut node = Self {
            kind,
            title: obj.get("title").and_then(|v| v.as_str()).map(String::from),
            description: obj.get("description").and_then(|v| v.as_str()).map(String::from),
            default: obj.get("default").cloned(),
            keywords: Keywords::from_object(obj),
        };

        // Single-member allOf is the common "ref with description" idiom
        if let Some([only]) = obj.get("allOf").and_then(|v| v.as_array()).map(Vec::as_slice) {
            if matches!(node.kind, NodeKind::Unsupported(_)) {
                let inner = Self::from_json(only, &format!("{}/allOf/0", path))?;
                node.kind = inner.kind;
                if node.keywords.is_empty() {
                    node.keywords = inner.keywords;
                }
                node.description = node.description.take().or(inner.description);
            }
        }

        Ok(node)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.kind, NodeKind::Ref(_))
    }
}

fn detect_kind(obj: &Map<String, Value>, path: &str) -> Result<NodeKind> {
    if let Some(pointer) = obj.get("$ref") {
        let pointer = pointer
            .as_str()
            .ok_or_else(|| invalid(path, "$ref must be a string"))?;
        return Ok(NodeKind::Ref(pointer.to_string()));
    }

    for keyword in ["anyOf", "oneOf"] {
        if let Some(alternatives) = obj.get(keyword) {
            let alternatives = alternatives
                .as_array()
                .ok_or_else(|| invalid(path, format!("{} must be an array", keyword)))?;
            let nodes = alternatives
                .iter()
                .enumerate()
                .map(|(i, alt)| SchemaNode::from_json(alt, &format!("{}/{}/{}", path, keyword, i)))
                .collect::<Result<Vec<_>>>()?;
            return Ok(NodeKind::AnyOf(nodes));
        }
    }

    if let Some(values) = obj.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| invalid(path, "enum must be an array"))?;
        return Ok(NodeKind::Enum(values.clone()));
    }

    if let Some(value) = obj.get("const") {
        return Ok(NodeKind::Enum(vec![value.clone()]));
    }

    for keyword in ["allOf", "not", "if"] {
        if obj.contains_key(keyword) {
            return Ok(NodeKind::Unsupported(keyword.to_string()));
        }
    }

    match obj.get("type") {
        Some(Value::String(name)) => detect_typed(name, obj, path),
        Some(Value::Array(names)) => {
            let names = names
                .iter()
                .map(|n| n.as_str().ok_or_else(|| invalid(path, "type list must contain strings")))
                .collect::<Result<Vec<_>>>()?;
            detect_type_list(&names, obj, path)
        }
        Some(_) => Err(invalid(path, "type must be a string or a list of strings")),
        None if obj.contains_key("properties") => detect_typed("object", obj, path),
        None if obj.contains_key("items") => detect_typed("array", obj, path),
        None => Ok(NodeKind::Any),
    }
}

fn detect_typed(name: &str, obj: &Map<String, Value>, path: &str) -> Result<NodeKind> {
    match name {
        "object" => {
            let mut properties = IndexMap::new();
            if let Some(props) = obj.get("properties") {
                let props = props
                    .as_object()
                    .ok_or_else(|| invalid(path, "properties must be an object"))?;
                for (prop, schema) in props {
                    let child = SchemaNode::from_json(schema, &format!("{}/properties/{}", path, prop))?;
                    properties.insert(prop.clone(), child);
                }
            }

            let required = obj
                .get("required")
                .and_then(|v| v.as_array())
                .map(|names| names.iter().filter_map(|n| n.as_str()).map(String::from).collect())
                .unwrap_or_default();

            let additional_properties = obj
                .get("additionalProperties")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);

            Ok(NodeKind::Object {
                properties,
                required,
                additional_properties,
            })
        }
        "array" => {
            let items = match obj.get("items") {
                None => None,
                Some(items) if items.is_object() || items.is_boolean() => Some(Box::new(
                    SchemaNode::from_json(items, &format!("{}/items", path))?,
                )),
                Some(_) => return Ok(NodeKind::Unsupported("tuple items".into())),
            };
            Ok(NodeKind::Array {
                items,
                min_items: obj.get("minItems").and_then(|v| v.as_u64()),
                max_items: obj.get("maxItems").and_then(|v| v.as_u64()),
            })
        }
        scalar => Ok(NodeKind::Primitive(ScalarKind::from_name(scalar))),
    }
}

fn detect_type_list(names: &[&str], obj: &Map<String, Value>, path: &str) -> Result<NodeKind> {
    match names {
        [] => return Err(invalid(path, "type list must not be empty")),
        [single] => return detect_typed(single, obj, path),
        _ => {}
    }

    if names.iter().all(|n| *n != "object" && *n != "array") {
        return Ok(NodeKind::TypeUnion(
            names.iter().map(|n| ScalarKind::from_name(n)).collect(),
        ));
    }

    // Structured members: one alternative per listed type, sharing the keywords
    let alternatives = names
        .iter()
        .map(|name| {
            let mut single = obj.clone();
            single.insert("type".to_string(), Value::String(name.to_string()));
            SchemaNode::from_json(&Value::Object(single), path)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(NodeKind::AnyOf(alternatives))
}

fn invalid(path: &str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidSchema {
        path: if path.is_empty() { "#".to_string() } else { format!("#{}", path) },
        reason: reason.into(),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Reference Targets
// =============================================================================

/// Where a `$ref` pointer leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// `#`, the document root
    Root,
    /// `#/$defs/<name>` or `#/definitions/<name>`
    Definition(String),
    /// Anything else (remote documents, deep pointers)
    External(String),
}

impl RefTarget {
    pub fn parse(pointer: &str) -> Self {
        if pointer == "#" || pointer == "#/" {
            return Self::Root;
        }
        for prefix in ["#/$defs/", "#/definitions/"] {
            if let Some(name) = pointer.strip_prefix(prefix) {
                if !name.is_empty() && !name.contains('/') {
                    return Self::Definition(name.replace("~1", "/").replace("~0", "~"));
                }
            }
        }
        Self::External(pointer.to_string())
    }
}

// =============================================================================
// Schema Document
// =============================================================================

/// Named definitions of one document, in declaration order
pub type Definitions = IndexMap<String, SchemaNode>;

/// A parsed schema document: root node plus its definitions table
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub root: SchemaNode,
    pub definitions: Definitions,
    fingerprint: Fingerprint,
}

impl SchemaDocument {
    pub fn from_json(value: &Value) -> Result<Self> {
        let root = SchemaNode::from_json(value, "")?;

        let mut definitions = Definitions::new();
        // `$defs` wins over legacy `definitions` on a name clash
        for keyword in ["definitions", "$defs"] {
            let Some(table) = value.get(keyword) else { continue };
            let table = table
                .as_object()
                .ok_or_else(|| invalid("", format!("{} must be an object", keyword)))?;
            for (name, schema) in table {
                let node = SchemaNode::from_json(schema, &format!("/{}/{}", keyword, name))?;
                definitions.insert(name.clone(), node);
            }
        }

        Ok(Self {
            root,
            definitions,
            fingerprint: Fingerprint::of_json(value),
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn definition(&self, name: &str) -> Option<&SchemaNode> {
        self.definitions.get(name)
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
