//! Type Compiler
//!
//! Recursive descent from [`SchemaNode`] to [`CompiledType`]. The pieces:
//!
//! - `constraints`: keyword extraction for scalars
//! - `resolve`: `$ref` handling and the pending-slot recursion guard
//! - `union`: `anyOf` composition
//! - `object`: record construction
//! - `finalize`: placeholder fixup once the descent is done
//!
//! ```text
//! SchemaDocument ──compile──▶ CompilationCache (Pending/Ready slots)
//!                                   │
//!                                finalize
//!                                   ▼
//!                             CompiledSchema
//! ```

mod cache;
pub mod constraints;
mod finalize;
mod object;
mod resolve;
mod union;

pub use cache::{CompilationCache, Slot};
pub use finalize::finalize;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{self, RecursionAnalysis};
use crate::checksum::Fingerprint;
use crate::config::CompilerSettings;
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
use crate::error::{CompileError, Result};
use crate::schema::{Definitions, NodeKind, ScalarKind, SchemaDocument, SchemaNode};
use crate::types::{CompiledType, Record, TypeId};
use crate::validate::{ValidationReport, Validator};

// =============================================================================
// Options
// =============================================================================

/// Per-request compiler options
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// Fail with [`CompileError::StrictMode`] when any warning is produced
    pub strict: bool,
    /// Reject documents with more definitions than this
    pub max_definitions: Option<usize>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::from(&CompilerSettings::default())
    }
}

impl From<&CompilerSettings> for CompilerOptions {
    fn from(settings: &CompilerSettings) -> Self {
        Self {
            strict: settings.strict,
            max_definitions: settings.max_definitions,
        }
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Single-use compiler over one definitions table
pub struct Compiler<'a> {
    definitions: &'a Definitions,
    root: Option<(String, &'a SchemaNode)>,
    cache: CompilationCache,
    diagnostics: Diagnostics,
}

impl<'a> Compiler<'a> {
    pub fn new(definitions: &'a Definitions) -> Self {
        Self {
            definitions,
            root: None,
            cache: CompilationCache::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Register the document root so `#` references resolve to `name`
    pub fn with_root(mut self, name: impl Into<String>, node: &'a SchemaNode) -> Self {
        self.root = Some((name.into(), node));
        self
    }

    /// Compile one node; `name` seeds the names of any records created
    pub fn compile(&mut self, node: &SchemaNode, name: &str) -> Result<CompiledType> {
        match &node.kind {
            NodeKind::Ref(pointer) => self.resolve(pointer),
            NodeKind::AnyOf(alternatives) => self.compose_any_of(alternatives, name),
            NodeKind::Enum(values) => Ok(CompiledType::Literal(values.clone())),
            NodeKind::TypeUnion(kinds) => self.compile_type_union(node, kinds, name),
            NodeKind::Object { .. } => self.build_object(node, name),
            NodeKind::Array {
                items,
                min_items,
                max_items,
            } => {
                let element = match items {
                    Some(items) => self.compile(items, &format!("{}_item", name))?,
                    None => {
                        self.note(DiagnosticItem::new(
                            name,
                            DiagnosticCode::MissingItems,
                            "array has no items schema; elements are unconstrained",
                        ));
                        CompiledType::Dynamic
                    }
                };
                Ok(CompiledType::ArrayOf {
                    element: Box::new(element),
                    min_items: *min_items,
                    max_items: *max_items,
                })
            }
            NodeKind::Primitive(kind) => Ok(self.compile_scalar(kind, node, name)),
            NodeKind::Any => Ok(CompiledType::Dynamic),
            NodeKind::Unsupported(keyword) => {
                self.note(DiagnosticItem::new(
                    name,
                    DiagnosticCode::UnsupportedKeyword,
                    format!("'{}' is not supported; value is unconstrained", keyword),
                ));
                Ok(CompiledType::Dynamic)
            }
        }
    }

    pub fn cache(&self) -> &CompilationCache {
        &self.cache
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (CompilationCache, Diagnostics) {
        (self.cache, self.diagnostics)
    }

    fn compile_scalar(&mut self, kind: &ScalarKind, node: &SchemaNode, name: &str) -> CompiledType {
        match kind {
            ScalarKind::Known(kind) => {
                let mut found = Diagnostics::new();
                let constraints = constraints::extract(*kind, &node.keywords, name, &mut found);
                for item in found.items() {
                    self.note(item.clone());
                }
                CompiledType::Primitive {
                    kind: *kind,
                    constraints,
                }
            }
            ScalarKind::Unknown(kind) => {
                self.note(DiagnosticItem::new(
                    name,
                    DiagnosticCode::UnknownKind,
                    format!("unknown type '{}'; value is unconstrained", kind),
                ));
                CompiledType::Dynamic
            }
        }
    }

    fn compile_type_union(
        &mut self,
        node: &SchemaNode,
        kinds: &[ScalarKind],
        name: &str,
    ) -> Result<CompiledType> {
        let mut variants: Vec<CompiledType> = kinds
            .iter()
            .map(|kind| {
                if kind.is_null() {
                    CompiledType::null()
                } else {
                    self.compile_scalar(kind, node, name)
                }
            })
            .collect();

        match variants.len() {
            0 => Err(CompileError::UnsupportedNodeShape {
                name: name.to_string(),
                expected: "non-empty type list",
            }),
            1 => Ok(variants.remove(0)),
            _ => Ok(CompiledType::Union(variants)),
        }
    }

    /// Record a diagnostic, logging warnings as they happen
    pub(crate) fn note(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Warning => {
                warn!(type_name = %item.type_name, code = %item.code, "{}", item.message)
            }
            Severity::Info => {
                debug!(type_name = %item.type_name, code = %item.code, "{}", item.message)
            }
        }
        self.diagnostics.push(item);
    }

    /// A name for a synthesized record that collides with neither the cache
    /// nor any definition
    pub(crate) fn fresh_name(&self, base: &str) -> String {
        let taken = |candidate: &str| {
            self.cache.contains(candidate) || self.definitions.contains_key(candidate)
        };
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

// =============================================================================
// Compiled Schema
// =============================================================================

static DYNAMIC: CompiledType = CompiledType::Dynamic;

/// Result of compiling one document: the root type plus every named type
/// reached from it
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root_name: String,
    root_id: TypeId,
    cache: CompilationCache,
    diagnostics: Diagnostics,
    recursion: RecursionAnalysis,
    fingerprint: Fingerprint,
}

impl CompiledSchema {
    /// Name of the root slot (may carry a suffix if it clashed with a definition)
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn root_id(&self) -> TypeId {
        self.root_id
    }

    /// The root type, with aliases followed
    pub fn root(&self) -> &CompiledType {
        match self.cache.get_by_id(self.root_id) {
            Some(ty) => self.resolve(ty),
            None => &DYNAMIC,
        }
    }

    /// The root record, when the root is an object
    pub fn root_record(&self) -> Option<&Record> {
        match self.root() {
            CompiledType::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn cache(&self) -> &CompilationCache {
        &self.cache
    }

    /// Named type by cache name, with aliases followed
    pub fn get(&self, name: &str) -> Option<&CompiledType> {
        self.cache.get(name).map(|ty| self.resolve(ty))
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        match self.get(name)? {
            CompiledType::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Follow `Named` links until a structural type is reached
    pub fn resolve<'s>(&'s self, ty: &'s CompiledType) -> &'s CompiledType {
        let mut current = ty;
        for _ in 0..=self.cache.len() {
            match current {
                CompiledType::Named(id) => match self.cache.get_by_id(*id) {
                    Some(next) => current = next,
                    None => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Display name of a named type
    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.cache.name_of(id)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn recursion(&self) -> &RecursionAnalysis {
        &self.recursion
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn validator(&self) -> Validator<'_> {
        Validator::new(self)
    }

    /// Validate an instance against the root type
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), ValidationReport> {
        self.validator().validate(instance)
    }

    /// Lower back to a self-contained JSON Schema document
    pub fn to_json_schema(&self) -> Value {
        crate::export::to_json_schema(self)
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Compile a parsed document with default options
pub fn compile(document: &SchemaDocument, root_name: &str) -> Result<CompiledSchema> {
    compile_with(document, root_name, &CompilerOptions::default())
}

/// Parse and compile a JSON schema value with default options
pub fn compile_value(value: &Value, root_name: &str) -> Result<CompiledSchema> {
    let document = SchemaDocument::from_json(value)?;
    compile(&document, root_name)
}

/// Compile a parsed document
pub fn compile_with(
    document: &SchemaDocument,
    root_name: &str,
    options: &CompilerOptions,
) -> Result<CompiledSchema> {
    if let Some(limit) = options.max_definitions {
        if document.definitions.len() > limit {
            return Err(CompileError::TooManyDefinitions {
                count: document.definitions.len(),
                limit,
            });
        }
    }

    let root_slot = root_slot_name(document, root_name);
    if root_slot != root_name {
        debug!(requested = root_name, actual = %root_slot, "Root name clashes with a definition");
    }

    let mut compiler = Compiler::new(&document.definitions).with_root(root_slot.clone(), &document.root);
    let root_link = compiler.resolve_named(&root_slot, &document.root)?;
    let root_id = match root_link {
        CompiledType::Named(id) => id,
        other => {
            return Err(CompileError::UnsupportedNodeShape {
                name: format!("{} ({:?})", root_slot, other),
                expected: "named root slot",
            })
        }
    };

    let (mut cache, mut diagnostics) = compiler.into_parts();
    finalize(&mut cache)?;

    for name in document.definitions.keys() {
        if !cache.contains(name) {
            diagnostics.push(DiagnosticItem::new(
                name.as_str(),
                DiagnosticCode::UnreachableDefinition,
                "definition is not referenced from the root",
            ));
        }
    }

    if options.strict && diagnostics.has_warnings() {
        let count = diagnostics.warnings().count();
        let report = diagnostics
            .warnings()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CompileError::StrictMode { count, report });
    }

    let recursion = analysis::analyze(&cache);

    info!(
        root = %root_slot,
        types = cache.len(),
        recursive_groups = recursion.groups.len(),
        warnings = diagnostics.warnings().count(),
        fingerprint = document.fingerprint().short(),
        "Compiled schema"
    );

    Ok(CompiledSchema {
        root_name: root_slot,
        root_id,
        cache,
        diagnostics,
        recursion,
        fingerprint: document.fingerprint().clone(),
    })
}

/// The root gets its own slot; it only shares a definition's name when it is
/// that definition
fn root_slot_name(document: &SchemaDocument, root_name: &str) -> String {
    if !document.definitions.contains_key(root_name) {
        return root_name.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", root_name, n))
        .find(|candidate| !document.definitions.contains_key(candidate))
        .unwrap_or_else(|| root_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;
    use serde_json::json;

    #[test]
    fn test_primitive_root() {
        let schema = compile_value(&json!({"type": "integer", "minimum": 0}), "Age").unwrap();
        match schema.root() {
            CompiledType::Primitive { kind, constraints } => {
                assert_eq!(*kind, PrimitiveKind::Integer);
                assert_eq!(constraints.minimum, Some(0.0));
            }
            other => panic!("Expected Primitive, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_degrades_to_dynamic() {
        let schema = compile_value(
            &json!({"type": "object", "properties": {"blob": {"type": "binary"}}}),
            "Upload",
        )
        .unwrap();
        let record = schema.root_record().unwrap();
        assert_eq!(record.fields[0].ty, CompiledType::optional(CompiledType::Dynamic));
        assert_eq!(schema.diagnostics().with_code(DiagnosticCode::UnknownKind).count(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_warnings() {
        let document = SchemaDocument::from_json(&json!({
            "type": "object",
            "properties": {"x": {"allOf": [{"type": "string"}, {"maxLength": 2}]}}
        }))
        .unwrap();
        let options = CompilerOptions { strict: true, ..CompilerOptions::default() };
        match compile_with(&document, "Root", &options) {
            Err(CompileError::StrictMode { count, report }) => {
                assert_eq!(count, 1);
                assert!(report.contains("W005"));
            }
            other => panic!("Expected StrictMode, got {:?}", other),
        }
        assert!(compile(&document, "Root").is_ok());
    }

    #[test]
    fn test_definition_limit() {
        let document = SchemaDocument::from_json(&json!({
            "$defs": {"A": {"type": "string"}, "B": {"type": "string"}}
        }))
        .unwrap();
        let options = CompilerOptions { max_definitions: Some(1), ..CompilerOptions::default() };
        match compile_with(&document, "Root", &options) {
            Err(CompileError::TooManyDefinitions { count: 2, limit: 1 }) => {}
            other => panic!("Expected TooManyDefinitions, got {:?}", other),
        }
    }

    #[test]
    fn test_default_options_apply_configured_limit() {
        assert_eq!(CompilerOptions::default().max_definitions, Some(512));

        let defs: serde_json::Map<String, Value> = (0..513)
            .map(|i| (format!("D{}", i), json!({"type": "string"})))
            .collect();
        match compile_value(&json!({"type": "string", "$defs": defs}), "Root") {
            Err(CompileError::TooManyDefinitions { count: 513, limit: 512 }) => {}
            other => panic!("Expected TooManyDefinitions, got {:?}", other),
        }
    }

    #[test]
    fn test_root_name_clash_with_definition() {
        let schema = compile_value(
            &json!({
                "type": "object",
                "properties": {"inner": {"$ref": "#/$defs/Box"}},
                "required": ["inner"],
                "$defs": {"Box": {"type": "object", "properties": {"v": {"type": "integer"}}}}
            }),
            "Box",
        )
        .unwrap();
        assert_eq!(schema.root_name(), "Box_2");
        assert!(schema.record("Box").is_some());
        assert_eq!(schema.root_record().map(|r| r.name.as_str()), Some("Box_2"));
    }

    #[test]
    fn test_unreachable_definition_is_info() {
        let schema = compile_value(
            &json!({"type": "string", "$defs": {"Unused": {"type": "integer"}}}),
            "Root",
        )
        .unwrap();
        assert!(!schema.diagnostics().has_warnings());
        assert_eq!(
            schema.diagnostics().with_code(DiagnosticCode::UnreachableDefinition).count(),
            1
        );
        assert!(schema.get("Unused").is_none());
    }

    #[test]
    fn test_fresh_name_skips_definitions() {
        let definitions: Definitions = [(
            "Order_item".to_string(),
            SchemaNode::new(NodeKind::Any),
        )]
        .into_iter()
        .collect();
        let compiler = Compiler::new(&definitions);
        assert_eq!(compiler.fresh_name("Order_item"), "Order_item_2");
        assert_eq!(compiler.fresh_name("Order_note"), "Order_note");
    }
}
