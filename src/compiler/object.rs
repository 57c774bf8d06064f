//! Object Model Builder

use serde_json::Value;
use tracing::debug;

use super::Compiler;
use crate::error::{CompileError, Result};
use crate::schema::{NodeKind, SchemaNode};
use crate::types::{CompiledType, Field, Record};

impl<'a> Compiler<'a> {
    /// Build an inline object under a fresh name derived from `suggested`
    pub fn build_object(&mut self, node: &SchemaNode, suggested: &str) -> Result<CompiledType> {
        let name = self.fresh_name(suggested);
        self.build_record(node, &name)
    }

    /// Build the record for `name` into its cache slot and return a link to it
    ///
    /// The slot is marked pending before any property is compiled. Properties
    /// keep declaration order; child records are named `<name>_<property>`
    /// unless the property is a reference. Optional fields are wrapped in
    /// `Optional` and default to the schema's `default`, or `null`.
    pub(crate) fn build_record(&mut self, node: &SchemaNode, name: &str) -> Result<CompiledType> {
        let NodeKind::Object {
            properties,
            required,
            additional_properties,
        } = &node.kind
        else {
            return Err(CompileError::UnsupportedNodeShape {
                name: name.to_string(),
                expected: "object",
            });
        };

        let id = self.cache.reserve(name);

        let mut fields = Vec::with_capacity(properties.len());
        for (property, child) in properties {
            let ty = self.compile(child, &format!("{}_{}", name, property))?;
            let constraints = ty.constraints();
            let is_required = required.contains(property);

            let (ty, default) = if is_required {
                (ty, None)
            } else {
                (
                    CompiledType::optional(ty),
                    Some(child.default.clone().unwrap_or(Value::Null)),
                )
            };

            fields.push(Field {
                name: property.clone(),
                ty,
                required: is_required,
                constraints,
                description: child.description.clone(),
                default,
            });
        }

        // Required keys without a property schema still have to be present
        for missing in required.iter().filter(|r| !properties.contains_key(*r)) {
            debug!(record = name, field = %missing, "Required key has no property schema");
            fields.push(Field {
                name: missing.clone(),
                ty: CompiledType::Dynamic,
                required: true,
                constraints: Default::default(),
                description: None,
                default: None,
            });
        }

        self.cache.store(
            name,
            CompiledType::Record(Record {
                name: name.to_string(),
                fields,
                closed: !additional_properties,
                description: node.description.clone(),
            }),
        );

        Ok(CompiledType::Named(id))
    }
}
