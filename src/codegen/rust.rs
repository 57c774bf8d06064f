//! Rust Code Emitter
//!
//! Renders Regions as Rust items. Inline enums and unions have no slot of
//! their own, so they are hoisted into helper items named after the field
//! that holds them.

use std::collections::HashSet;

use serde_json::Value;

use super::names::{field_ident, to_pascal_case};
use super::{unique_name, CodegenContext, Region};
use crate::types::{CompiledType, Field, PrimitiveKind, Record, TypeId};

const DERIVES: &str = "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n";

// =============================================================================
// Emitter
// =============================================================================

/// Stateful emitter; collects hoisted helper items while rendering regions
pub struct Emitter<'c, 's> {
    ctx: &'c CodegenContext<'s>,
    taken: HashSet<String>,
    helpers: Vec<String>,
}

impl<'c, 's> Emitter<'c, 's> {
    pub fn new(ctx: &'c CodegenContext<'s>) -> Self {
        Self {
            taken: ctx.taken_names(),
            ctx,
            helpers: Vec::new(),
        }
    }

    /// Hoisted helper items rendered so far
    pub fn take_helpers(&mut self) -> Vec<String> {
        std::mem::take(&mut self.helpers)
    }

    /// Emit Rust code for one Region
    pub fn emit_region(&mut self, region: &Region<'_>) -> String {
        let mut output = String::new();
        output.push_str(&format!("/// {}\n", region.schema_name));

        match region.ty {
            CompiledType::Record(record) => self.emit_struct(&mut output, region, record),
            CompiledType::Union(variants) => {
                self.emit_union(&mut output, &region.rust_name, region.id, variants)
            }
            CompiledType::Literal(values) if is_string_enum(values) => {
                emit_enum(&mut output, &region.rust_name, values)
            }
            ty if region.needs_newtype() => {
                let inner = self.type_expr(ty, region.id, &format!("{}Value", region.rust_name), false);
                output.push_str(DERIVES);
                output.push_str("#[serde(transparent)]\n");
                output.push_str(&format!("pub struct {}(pub {});\n", region.rust_name, inner));
            }
            ty => {
                let target = self.type_expr(ty, region.id, &format!("{}Value", region.rust_name), false);
                output.push_str(&format!("pub type {} = {};\n", region.rust_name, target));
            }
        }

        output
    }

    // =========================================================================
    // Struct Emission
    // =========================================================================

    fn emit_struct(&mut self, output: &mut String, region: &Region<'_>, record: &Record) {
        if let Some(description) = &record.description {
            output.push_str("///\n");
            push_doc(output, "", description);
        }
        output.push_str(DERIVES);
        if record.closed {
            output.push_str("#[serde(deny_unknown_fields)]\n");
        }
        output.push_str(&format!("pub struct {} {{\n", region.rust_name));
        for field in &record.fields {
            self.emit_field(output, region, field);
        }
        output.push_str("}\n");
    }

    fn emit_field(&mut self, output: &mut String, region: &Region<'_>, field: &Field) {
        if let Some(description) = &field.description {
            push_doc(output, "    ", description);
        }
        let constraints = field.constraints.describe();
        if !constraints.is_empty() {
            if field.description.is_some() {
                output.push_str("    ///\n");
            }
            for line in constraints {
                output.push_str(&format!("    /// - {}\n", line));
            }
        }

        let ident = field_ident(&field.name);
        if ident.trim_start_matches("r#") != field.name {
            output.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(&field.name)));
        }

        let hint = format!("{}_{}", region.rust_name, field.name);
        let rust_type = self.type_expr(&field.ty, region.id, &to_pascal_case(&hint), false);
        if !field.required && rust_type.starts_with("Option<") {
            output.push_str("    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n");
        }

        output.push_str(&format!("    pub {}: {},\n", ident, rust_type));
    }

    // =========================================================================
    // Union Emission
    // =========================================================================

    fn emit_union(&mut self, output: &mut String, name: &str, owner: TypeId, variants: &[CompiledType]) {
        output.push_str(DERIVES);
        output.push_str("#[serde(untagged)]\n");
        output.push_str(&format!("pub enum {} {{\n", name));

        let mut seen = HashSet::new();
        for (index, variant) in variants.iter().enumerate() {
            let variant_name = unique_name(&self.variant_name(variant, index), &seen);
            seen.insert(variant_name.clone());
            if variant.is_null() {
                output.push_str(&format!("    {},\n", variant_name));
            } else {
                let hint = format!("{}{}", name, variant_name);
                let rust_type = self.type_expr(variant, owner, &hint, false);
                output.push_str(&format!("    {}({}),\n", variant_name, rust_type));
            }
        }

        output.push_str("}\n");
    }

    fn variant_name(&self, variant: &CompiledType, index: usize) -> String {
        match variant {
            CompiledType::Named(id) => self
                .ctx
                .rust_name(*id)
                .map(String::from)
                .unwrap_or_else(|| format!("Variant{}", index)),
            CompiledType::Primitive { kind, .. } => to_pascal_case(kind.as_str()),
            CompiledType::ArrayOf { .. } => "List".to_string(),
            CompiledType::Optional(inner) => self.variant_name(inner, index),
            _ => format!("Variant{}", index),
        }
    }

    // =========================================================================
    // Type Expressions
    // =========================================================================

    /// Rust type for `ty` as used inside `owner`; `hint` names any helper
    /// item that has to be hoisted
    fn type_expr(&mut self, ty: &CompiledType, owner: TypeId, hint: &str, in_vec: bool) -> String {
        match ty {
            CompiledType::Primitive { kind, .. } => primitive(*kind).to_string(),
            CompiledType::Literal(values) if is_string_enum(values) => {
                let name = self.claim(hint);
                let mut item = String::new();
                emit_enum(&mut item, &name, values);
                self.helpers.push(item);
                name
            }
            CompiledType::Literal(_) | CompiledType::Dynamic | CompiledType::Pending(_) => {
                "serde_json::Value".to_string()
            }
            CompiledType::ArrayOf { element, .. } => {
                format!("Vec<{}>", self.type_expr(element, owner, &format!("{}Item", hint), true))
            }
            CompiledType::Optional(inner) => {
                format!("Option<{}>", self.type_expr(inner, owner, hint, in_vec))
            }
            CompiledType::Named(target) => {
                let name = self
                    .ctx
                    .rust_name(*target)
                    .map(String::from)
                    .unwrap_or_else(|| "serde_json::Value".to_string());
                if !in_vec && self.ctx.needs_boxing(owner, *target) {
                    format!("Box<{}>", name)
                } else {
                    name
                }
            }
            CompiledType::Union(variants) => {
                let name = self.claim(hint);
                let mut item = String::new();
                self.emit_union(&mut item, &name, owner, variants);
                self.helpers.push(item);
                name
            }
            // Records always live in their own slot
            CompiledType::Record(record) => to_pascal_case(&record.name),
        }
    }

    fn claim(&mut self, hint: &str) -> String {
        let name = unique_name(hint, &self.taken);
        self.taken.insert(name.clone());
        name
    }
}

// =============================================================================
// Enum Emission
// =============================================================================

fn emit_enum(output: &mut String, name: &str, values: &[Value]) {
    output.push_str(DERIVES);
    output.push_str(&format!("pub enum {} {{\n", name));

    let mut seen = HashSet::new();
    for value in values {
        let Some(text) = value.as_str() else { continue };
        let variant = unique_name(&to_pascal_case(text), &seen);
        seen.insert(variant.clone());
        if variant != text {
            output.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(text)));
        }
        output.push_str(&format!("    {},\n", variant));
    }

    output.push_str("}\n");
}

// =============================================================================
// Helper Utilities
// =============================================================================

fn is_string_enum(values: &[Value]) -> bool {
    !values.is_empty() && values.iter().all(Value::is_string)
}

fn primitive(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::String => "String",
        PrimitiveKind::Integer => "i64",
        PrimitiveKind::Number => "f64",
        PrimitiveKind::Boolean => "bool",
        PrimitiveKind::Null => "()",
    }
}

fn push_doc(output: &mut String, indent: &str, text: &str) {
    for line in text.lines() {
        if line.trim().is_empty() {
            output.push_str(&format!("{}///\n", indent));
        } else {
            output.push_str(&format!("{}/// {}\n", indent, line.trim_end()));
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use crate::codegen::generate_rust;
    use crate::compiler::compile_value;
    use serde_json::json;

    #[test]
    fn test_struct_fields_and_renames() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "description": "A person",
                "properties": {
                    "firstName": {"type": "string", "minLength": 1},
                    "type": {"type": "string"},
                    "age": {"type": "integer"}
                },
                "required": ["firstName", "type"],
                "additionalProperties": false
            }),
            "Person",
        )
        .unwrap();

        let code = generate_rust(&schema).code;
        assert!(code.contains("#[serde(deny_unknown_fields)]\npub struct Person {"));
        assert!(code.contains("    #[serde(rename = \"firstName\")]\n    pub first_name: String,"));
        assert!(code.contains("    /// - minLength: 1\n"));
        assert!(code.contains("    pub r#type: String,"));
        assert!(code.contains(
            "    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n    pub age: Option<i64>,"
        ));
    }

    #[test]
    fn test_self_recursion_is_boxed() {
        let schema = compile_value(
            &json!({
                "$ref": "#/definitions/Node",
                "definitions": {"Node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "integer"},
                        "next": {"anyOf": [{"$ref": "#/definitions/Node"}, {"type": "null"}]}
                    },
                    "required": ["value"]
                }}
            }),
            "LinkedList",
        )
        .unwrap();

        let code = generate_rust(&schema).code;
        assert!(code.contains("pub next: Option<Box<Node>>,"));
        assert!(code.contains("pub type LinkedList = Node;"));
    }

    #[test]
    fn test_vec_provides_indirection() {
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

        let code = generate_rust(&schema).code;
        assert!(code.contains("pub children: Vec<Component>,"));
    }

    #[test]
    fn test_union_becomes_untagged_enum() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "id": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
                },
                "required": ["id"]
            }),
            "Key",
        )
        .unwrap();

        let code = generate_rust(&schema).code;
        assert!(code.contains("pub id: KeyId,"));
        assert!(code.contains("#[serde(untagged)]\npub enum KeyId {\n    String(String),\n    Integer(i64),\n}"));
    }

    #[test]
    fn test_recursive_array_alias_becomes_newtype() {
        let schema = compile_value(
            &json!({
                "$ref": "#/definitions/Tree",
                "definitions": {"Tree": {"type": "array", "items": {"$ref": "#/definitions/Tree"}}}
            }),
            "Forest",
        )
        .unwrap();

        let code = generate_rust(&schema).code;
        assert!(code.contains("#[serde(transparent)]\npub struct Tree(pub Vec<Tree>);"));
    }
}
