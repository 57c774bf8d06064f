//! Union Composer

use super::Compiler;
use crate::diagnostics::{DiagnosticCode, DiagnosticItem};
use crate::error::Result;
use crate::schema::{NodeKind, SchemaNode};
use crate::types::CompiledType;

impl<'a> Compiler<'a> {
    /// Compile an `anyOf` list
    ///
    /// Alternatives keep declaration order, which is also the tie-break when
    /// an instance matches more than one of them. Inline alternatives are
    /// named `<base_name>Option<i>`. A single alternative collapses to
    /// itself; `[T, null]` stays a `Union` until finalize rewrites it to
    /// `Optional(T)`.
    pub fn compose_any_of(&mut self, alternatives: &[SchemaNode], base_name: &str) -> Result<CompiledType> {
        if alternatives.is_empty() {
            self.note(DiagnosticItem::new(
                base_name,
                DiagnosticCode::EmptyUnion,
                "anyOf has no alternatives; value is unconstrained",
            ));
            return Ok(CompiledType::Dynamic);
        }

        let mut variants = Vec::with_capacity(alternatives.len());
        for (i, alternative) in alternatives.iter().enumerate() {
            let variant = match &alternative.kind {
                NodeKind::Primitive(kind) if kind.is_null() => CompiledType::null(),
                NodeKind::Ref(pointer) => self.resolve(pointer)?,
                _ => self.compile(alternative, &format!("{}Option{}", base_name, i))?,
            };
            variants.push(variant);
        }

        if variants.len() == 1 {
            return Ok(variants.remove(0));
        }
        Ok(CompiledType::Union(variants))
    }
}
