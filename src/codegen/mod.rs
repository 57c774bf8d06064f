//! Code Generation
//!
//! Renders a compiled schema as Rust source with serde derives.
//!
//! Architecture:
//! - CodegenContext: built once per schema; fixes the Rust name of every slot
//! - Region: one slot plus everything the emitter needs to render it
//! - rust: the emitter, which never looks at the source document
//!
//! Links inside a recursion group are boxed unless a `Vec` already provides
//! the indirection.

pub mod names;
pub mod rust;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::compiler::{CompiledSchema, Slot};
use crate::types::{CompiledType, TypeId};

use names::to_pascal_case;

// =============================================================================
// Region
// =============================================================================

/// One named type to emit
#[derive(Debug, Clone)]
pub struct Region<'s> {
    pub id: TypeId,
    /// Cache name, as written in the source document
    pub schema_name: &'s str,
    /// Rust type name to generate
    pub rust_name: String,
    pub ty: &'s CompiledType,
    /// Recursion group id, when the type is part of a cycle
    pub scc_group: Option<usize>,
}

impl Region<'_> {
    /// Recursive slots that are not records or enums need a nominal wrapper,
    /// since `type A = Vec<A>` is not a valid Rust item
    pub fn needs_newtype(&self) -> bool {
        self.scc_group.is_some()
            && !matches!(
                self.ty,
                CompiledType::Record(_) | CompiledType::Union(_) | CompiledType::Literal(_)
            )
    }
}

// =============================================================================
// CodegenContext
// =============================================================================

/// Immutable codegen context
pub struct CodegenContext<'s> {
    schema: &'s CompiledSchema,
    rust_names: HashMap<TypeId, String>,
}

impl<'s> CodegenContext<'s> {
    pub fn build(schema: &'s CompiledSchema) -> Self {
        let mut rust_names = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();

        for (id, name, _) in schema.cache().iter() {
            let mut base = to_pascal_case(name);
            if conflicts_with_prelude(&base) {
                base.push_str("Type");
            }
            let rust_name = unique_name(&base, &taken);
            if rust_name != base {
                debug!(schema_name = name, rust_name = %rust_name, "Renamed to avoid a collision");
            }
            taken.insert(rust_name.clone());
            rust_names.insert(id, rust_name);
        }

        Self { schema, rust_names }
    }

    pub fn schema(&self) -> &'s CompiledSchema {
        self.schema
    }

    pub fn rust_name(&self, id: TypeId) -> Option<&str> {
        self.rust_names.get(&id).map(String::as_str)
    }

    /// True when a link from `owner` to `target` must be boxed
    pub fn needs_boxing(&self, owner: TypeId, target: TypeId) -> bool {
        self.schema.recursion().same_group(owner, target)
    }

    /// Every Rust name already claimed by a slot
    pub fn taken_names(&self) -> HashSet<String> {
        self.rust_names.values().cloned().collect()
    }

    /// Regions in cache order; the root slot comes first
    pub fn regions(&self) -> Vec<Region<'s>> {
        self.schema
            .cache()
            .iter()
            .filter_map(|(id, name, slot)| match slot {
                Slot::Ready(ty) => Some(Region {
                    id,
                    schema_name: name,
                    rust_name: self.rust_names.get(&id).cloned().unwrap_or_else(|| to_pascal_case(name)),
                    ty,
                    scc_group: self.schema.recursion().group_of(id).map(|g| g.id),
                }),
                Slot::Pending => None,
            })
            .collect()
    }
}

fn conflicts_with_prelude(name: &str) -> bool {
    matches!(
        name,
        "String" | "Vec" | "Option" | "Result" | "Box" | "Value" | "Some" | "None" | "Ok" | "Err" |
        "Debug" | "Clone" | "PartialEq" | "Serialize" | "Deserialize" | "Default"
    )
}

/// `base`, or `base2`, `base3`, ... when already taken
pub(crate) fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

// =============================================================================
// Generated Output
// =============================================================================

/// Output from code generation
#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    /// Generated code as a string
    pub code: String,
    /// Number of top-level items generated, helpers included
    pub type_count: usize,
}

// =============================================================================
// Public API
// =============================================================================

/// Generate Rust source for every named type in `schema`
pub fn generate_rust(schema: &CompiledSchema) -> GeneratedOutput {
    let ctx = CodegenContext::build(schema);
    let mut emitter = rust::Emitter::new(&ctx);

    let mut output = String::new();
    output.push_str(&format!(
        "//! Types for `{}` generated from a JSON schema - DO NOT EDIT\n",
        schema.root_name()
    ));
    output.push_str(&format!("//!\n//! Schema fingerprint: {}\n\n", schema.fingerprint().short()));
    output.push_str("use serde::{Deserialize, Serialize};\n\n");

    let mut type_count = 0;
    for region in ctx.regions() {
        output.push_str(&emitter.emit_region(&region));
        output.push('\n');
        type_count += 1;
    }
    for helper in emitter.take_helpers() {
        output.push_str(&helper);
        output.push('\n');
        type_count += 1;
    }

    debug!(root = schema.root_name(), type_count, "Generated Rust source");

    GeneratedOutput {
        code: output,
        type_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_value;
    use serde_json::json;

    #[test]
    fn test_prelude_names_are_suffixed() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"v": {"$ref": "#/definitions/Option"}},
                "definitions": {"Option": {"type": "object", "properties": {}}}
            }),
            "Holder",
        )
        .unwrap();

        let ctx = CodegenContext::build(&schema);
        let id = schema.cache().id_of("Option").unwrap();
        assert_eq!(ctx.rust_name(id), Some("OptionType"));
    }

    #[test]
    fn test_colliding_names_get_numbered() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {
                    "a": {"$ref": "#/definitions/user_info"},
                    "b": {"$ref": "#/definitions/UserInfo"}
                },
                "definitions": {
                    "user_info": {"type": "object", "properties": {}},
                    "UserInfo": {"type": "object", "properties": {"x": {"type": "string"}}}
                }
            }),
            "Pair",
        )
        .unwrap();

        let ctx = CodegenContext::build(&schema);
        let mut names: Vec<_> = ctx.regions().into_iter().map(|r| r.rust_name).collect();
        names.sort();
        assert_eq!(names, vec!["Pair", "UserInfo", "UserInfo2"]);
    }

    #[test]
    fn test_generate_counts_types() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"mode": {"enum": ["fast", "slow"]}},
                "required": ["mode"]
            }),
            "Settings",
        )
        .unwrap();

        let output = generate_rust(&schema);
        assert_eq!(output.type_count, 2);
        assert!(output.code.contains("pub struct Settings"));
        assert!(output.code.contains("pub enum SettingsMode"));
    }
}
