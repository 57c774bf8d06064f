//! JSON Schema Export
//!
//! Lowers a compiled schema back into a self-contained draft-07 document.
//! The root slot is inlined at the top level; every other named type lands
//! under `definitions` and is linked with `$ref`. This is the form handed to
//! a generation call as its response format.

use serde_json::{json, Map, Number, Value};

use crate::compiler::CompiledSchema;
use crate::types::{CompiledType, Constraints, Record, TypeId};

/// Export `schema` as a JSON Schema document
pub fn to_json_schema(schema: &CompiledSchema) -> Value {
    let exporter = Exporter { schema };

    let mut document = match schema.cache().get_by_id(schema.root_id()) {
        Some(CompiledType::Named(target)) => exporter.link(*target),
        Some(root) => exporter.lower(root),
        None => json!({}),
    };

    let mut definitions = Map::new();
    for (id, name, slot) in schema.cache().iter() {
        if id == schema.root_id() {
            continue;
        }
        if let Some(ty) = slot.ready() {
            definitions.insert(name.to_string(), exporter.lower(ty));
        }
    }

    if let Value::Object(object) = &mut document {
        if !definitions.is_empty() {
            object.insert("definitions".to_string(), Value::Object(definitions));
        }
    }
    document
}

struct Exporter<'s> {
    schema: &'s CompiledSchema,
}

impl Exporter<'_> {
    fn link(&self, id: TypeId) -> Value {
        if id == self.schema.root_id() {
            return json!({"$ref": "#"});
        }
        match self.schema.name_of(id) {
            Some(name) => json!({"$ref": format!("#/definitions/{}", escape_pointer(name))}),
            None => json!({}),
        }
    }

    fn lower(&self, ty: &CompiledType) -> Value {
        match ty {
            CompiledType::Primitive { kind, constraints } => {
                let mut object = Map::new();
                object.insert("type".to_string(), json!(kind.as_str()));
                write_constraints(&mut object, constraints);
                Value::Object(object)
            }
            CompiledType::Literal(values) => json!({"enum": values}),
            CompiledType::ArrayOf {
                element,
                min_items,
                max_items,
            } => {
                let mut object = Map::new();
                object.insert("type".to_string(), json!("array"));
                object.insert("items".to_string(), self.lower(element));
                if let Some(min) = min_items {
                    object.insert("minItems".to_string(), json!(min));
                }
                if let Some(max) = max_items {
                    object.insert("maxItems".to_string(), json!(max));
                }
                Value::Object(object)
            }
            CompiledType::Record(record) => self.lower_record(record),
            CompiledType::Union(variants) => {
                json!({"anyOf": variants.iter().map(|v| self.lower(v)).collect::<Vec<_>>()})
            }
            CompiledType::Optional(inner) => json!({"anyOf": [self.lower(inner), {"type": "null"}]}),
            CompiledType::Named(id) => self.link(*id),
            // Finalized schemas never contain placeholders
            CompiledType::Pending(_) | CompiledType::Dynamic => json!({}),
        }
    }

    fn lower_record(&self, record: &Record) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &record.fields {
            let mut property = self.lower(&field.ty);
            if let Value::Object(object) = &mut property {
                if let Some(description) = &field.description {
                    object.insert("description".to_string(), json!(description));
                }
                if let Some(default) = &field.default {
                    object.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(field.name.clone(), property);
            if field.required {
                required.push(json!(field.name));
            }
        }

        let mut object = Map::new();
        object.insert("type".to_string(), json!("object"));
        object.insert("title".to_string(), json!(record.name));
        if let Some(description) = &record.description {
            object.insert("description".to_string(), json!(description));
        }
        object.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            object.insert("required".to_string(), Value::Array(required));
        }
        if record.closed {
            object.insert("additionalProperties".to_string(), json!(false));
        }
        Value::Object(object)
    }
}

fn write_constraints(object: &mut Map<String, Value>, constraints: &Constraints) {
    if let Some(pattern) = &constraints.pattern {
        object.insert("pattern".to_string(), json!(pattern.as_str()));
    }
    if let Some(format) = &constraints.format {
        object.insert("format".to_string(), json!(format.as_str()));
    }
    if let Some(min) = constraints.min_length {
        object.insert("minLength".to_string(), json!(min));
    }
    if let Some(max) = constraints.max_length {
        object.insert("maxLength".to_string(), json!(max));
    }
    let numeric = [
        ("minimum", constraints.minimum),
        ("maximum", constraints.maximum),
        ("exclusiveMinimum", constraints.exclusive_minimum),
        ("exclusiveMaximum", constraints.exclusive_maximum),
        ("multipleOf", constraints.multiple_of),
    ];
    for (keyword, value) in numeric {
        if let Some(value) = value.and_then(number) {
            object.insert(keyword.to_string(), Value::Number(value));
        }
    }
}

/// Integral bounds are written as integers so `0` does not become `0.0`
fn number(value: f64) -> Option<Number> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(Number::from(value as i64))
    } else {
        Number::from_f64(value)
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_value;

    #[test]
    fn test_export_record_with_definitions() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "home": {"$ref": "#/$defs/Address"}
                },
                "required": ["name"],
                "$defs": {"Address": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}},
                    "required": ["city"],
                    "additionalProperties": false
                }}
            }),
            "Person",
        )
        .unwrap();

        let exported = schema.to_json_schema();
        assert_eq!(exported["type"], "object");
        assert_eq!(exported["title"], "Person");
        assert_eq!(exported["required"], json!(["name"]));
        assert_eq!(exported["properties"]["name"]["minLength"], json!(1));
        assert_eq!(
            exported["properties"]["home"]["anyOf"][0]["$ref"],
            "#/definitions/Address"
        );
        assert_eq!(exported["properties"]["home"]["default"], Value::Null);
        assert_eq!(exported["definitions"]["Address"]["additionalProperties"], false);
    }

    #[test]
    fn test_root_recursion_exports_hash_ref() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "children": {"type": "array", "items": {"$ref": "#"}}
                },
                "required": ["children"]
            }),
            "Component",
        )
        .unwrap();

        let exported = schema.to_json_schema();
        assert_eq!(exported["properties"]["children"]["items"]["$ref"], "#");
        assert!(exported.get("definitions").is_none());
    }

    #[test]
    fn test_integral_bounds_stay_integers() {
        assert_eq!(number(0.0), Some(Number::from(0)));
        assert_eq!(number(0.01).and_then(|n| n.as_f64()), Some(0.01));
    }
}
