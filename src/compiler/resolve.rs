//! Reference Resolver
//!
//! Every named type goes through [`Compiler::resolve_named`]: the slot is
//! reserved before the definition body is compiled, so a reference back to
//! it from inside the body sees `Pending` instead of recursing.

use tracing::debug;

use super::{Compiler, Slot};
use crate::error::{CompileError, Result};
use crate::schema::{NodeKind, RefTarget, SchemaNode};
use crate::types::CompiledType;

impl<'a> Compiler<'a> {
    /// Resolve a `$ref` pointer
    pub fn resolve(&mut self, pointer: &str) -> Result<CompiledType> {
        match RefTarget::parse(pointer) {
            RefTarget::Root => {
                let (name, node) = self
                    .root
                    .clone()
                    .ok_or(CompileError::RootRecursionUnsupported)?;
                self.resolve_named(&name, node)
            }
            RefTarget::Definition(name) => {
                let definitions = self.definitions;
                let node = definitions
                    .get(&name)
                    .ok_or_else(|| CompileError::DefinitionNotFound { name: name.clone() })?;
                self.resolve_named(&name, node)
            }
            RefTarget::External(pointer) => Err(CompileError::DefinitionNotFound { name: pointer }),
        }
    }

    /// Cached link for `name`, compiling `node` into its slot on first use
    pub(crate) fn resolve_named(&mut self, name: &str, node: &SchemaNode) -> Result<CompiledType> {
        if let Some((id, slot)) = self.cache.lookup(name) {
            return Ok(match slot {
                Slot::Pending => {
                    debug!(name, "Reference to type under construction");
                    CompiledType::Pending(name.to_string())
                }
                Slot::Ready(_) => CompiledType::Named(id),
            });
        }

        debug!(name, "Compiling definition");
        let id = self.cache.reserve(name);

        let ty = match &node.kind {
            NodeKind::Object { .. } => self.build_record(node, name)?,
            _ => self.compile(node, name)?,
        };

        // Records store themselves; everything else lands here
        if self.cache.is_pending(name) {
            self.cache.store(name, ty);
        }

        Ok(CompiledType::Named(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Definitions, SchemaDocument};
    use crate::types::PrimitiveKind;
    use serde_json::json;

    fn document(value: serde_json::Value) -> SchemaDocument {
        SchemaDocument::from_json(&value).unwrap()
    }

    #[test]
    fn test_missing_definition() {
        let doc = document(json!({"$defs": {}}));
        let mut compiler = Compiler::new(&doc.definitions);
        match compiler.resolve("#/$defs/Ghost") {
            Err(CompileError::DefinitionNotFound { name }) => assert_eq!(name, "Ghost"),
            other => panic!("Expected DefinitionNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_external_pointer_is_not_found() {
        let definitions = Definitions::new();
        let mut compiler = Compiler::new(&definitions);
        assert!(matches!(
            compiler.resolve("https://example.com/schema.json"),
            Err(CompileError::DefinitionNotFound { .. })
        ));
    }

    #[test]
    fn test_root_reference_without_root() {
        let definitions = Definitions::new();
        let mut compiler = Compiler::new(&definitions);
        match compiler.resolve("#") {
            Err(CompileError::RootRecursionUnsupported) => {}
            other => panic!("Expected RootRecursionUnsupported, got {:?}", other),
        }
    }

    #[test]
    fn test_second_reference_hits_cache() {
        let doc = document(json!({"$defs": {"Age": {"type": "integer"}}}));
        let mut compiler = Compiler::new(&doc.definitions);

        let first = compiler.resolve("#/$defs/Age").unwrap();
        let second = compiler.resolve("#/definitions/Age").unwrap();
        assert_eq!(first, second);
        assert_eq!(compiler.cache().len(), 1);
        assert_eq!(
            compiler.cache().get("Age"),
            Some(&CompiledType::primitive(PrimitiveKind::Integer))
        );
    }

    #[test]
    fn test_self_reference_yields_pending() {
        let doc = document(json!({"$defs": {
            "Node": {
                "type": "object",
                "properties": {"next": {"$ref": "#/$defs/Node"}},
                "required": ["next"]
            }
        }}));
        let mut compiler = Compiler::new(&doc.definitions);
        compiler.resolve("#/$defs/Node").unwrap();

        match compiler.cache().get("Node") {
            Some(CompiledType::Record(record)) => {
                assert_eq!(record.fields[0].ty, CompiledType::Pending("Node".into()));
            }
            other => panic!("Expected Record, got {:?}", other),
        }
    }
}
