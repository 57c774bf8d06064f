//! Schema Store
//!
//! Named JSON schemas grouped under namespaces, and the lookup that turns a
//! schema name into a compiled response format.
//!
//! Lookup order for a user is `[user_id, "schemas"]`, then the global
//! `["schemas"]` namespace. A miss everywhere is not fatal for response
//! formatting: the caller falls back to plain text output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::compiler::{compile_with, CompiledSchema, CompilerOptions};
use crate::config::StoreSettings;
use crate::error::{CompileError, Result};
use crate::schema::SchemaDocument;
use crate::validate::ValidationReport;

// =============================================================================
// Namespace
// =============================================================================

/// Ordered path segments, e.g. `["u42", "schemas"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(Vec<String>);

impl Namespace {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Segments become directory names, so each must pass the name check
    pub fn check(&self) -> Result<()> {
        self.0.iter().try_for_each(|segment| check_name(segment))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

// =============================================================================
// Store Trait
// =============================================================================

/// Source of stored schema documents
pub trait SchemaStore {
    /// Raw schema stored under `name`, if any
    fn fetch_schema(&self, namespace: &Namespace, name: &str) -> Result<Option<Value>>;

    /// Names stored in `namespace`, sorted
    fn list_schemas(&self, namespace: &Namespace) -> Result<Vec<String>>;
}

/// Names become file names, so path syntax is rejected
fn check_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.starts_with('.') {
        "starts with '.'"
    } else {
        return Ok(());
    };
    Err(CompileError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<(Namespace, String), Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `schema` under `name`, replacing any previous entry
    pub fn put(&mut self, namespace: Namespace, name: &str, schema: Value) -> Result<()> {
        namespace.check()?;
        check_name(name)?;
        self.entries.insert((namespace, name.to_string()), schema);
        Ok(())
    }

    /// Remove an entry; returns whether it existed
    pub fn delete(&mut self, namespace: &Namespace, name: &str) -> bool {
        self.entries.remove(&(namespace.clone(), name.to_string())).is_some()
    }
}

impl SchemaStore for InMemoryStore {
    fn fetch_schema(&self, namespace: &Namespace, name: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(&(namespace.clone(), name.to_string())).cloned())
    }

    fn list_schemas(&self, namespace: &Namespace) -> Result<Vec<String>> {
        Ok(self
            .entries
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect())
    }
}

// =============================================================================
// Directory Store
// =============================================================================

/// Files laid out as `<root>/<segment>/.../<name>.json`
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &Namespace) -> Result<PathBuf> {
        namespace.check()?;
        Ok(namespace
            .segments()
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment)))
    }

    fn schema_path(&self, namespace: &Namespace, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.namespace_dir(namespace)?.join(format!("{}.json", name)))
    }

    /// Write `schema` as pretty JSON, creating the namespace directory
    pub fn put(&self, namespace: &Namespace, name: &str, schema: &Value) -> Result<()> {
        let path = self.schema_path(namespace, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(schema)?)?;
        debug!(path = %path.display(), "Stored schema");
        Ok(())
    }

    /// Remove a stored schema; returns whether it existed
    pub fn delete(&self, namespace: &Namespace, name: &str) -> Result<bool> {
        let path = self.schema_path(namespace, name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}

impl SchemaStore for DirectoryStore {
    fn fetch_schema(&self, namespace: &Namespace, name: &str) -> Result<Option<Value>> {
        let path = self.schema_path(namespace, name)?;
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list_schemas(&self, namespace: &Namespace) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
            .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Fetch `name` for `user_id` along the configured search path and compile it
///
/// A failure in any namespace but the last is logged and the search moves
/// on; the last namespace's error is returned as is.
pub fn load_compiled(
    store: &dyn SchemaStore,
    settings: &StoreSettings,
    user_id: Option<&str>,
    name: &str,
    options: &CompilerOptions,
) -> Result<CompiledSchema> {
    let search_path = settings.search_path(user_id);
    let last = search_path.len().saturating_sub(1);

    for (index, namespace) in search_path.iter().enumerate() {
        match load_from(store, namespace, name, options) {
            Ok(Some(schema)) => return Ok(schema),
            Ok(None) => debug!(schema = name, namespace = %namespace, "Schema not in namespace"),
            Err(e) if index < last => {
                debug!(schema = name, namespace = %namespace, error = %e, "Skipping namespace")
            }
            Err(e) => return Err(e),
        }
    }

    Err(CompileError::SchemaNotFound {
        name: name.to_string(),
        searched: search_path
            .iter()
            .map(Namespace::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

fn load_from(
    store: &dyn SchemaStore,
    namespace: &Namespace,
    name: &str,
    options: &CompilerOptions,
) -> Result<Option<CompiledSchema>> {
    namespace.check()?;
    let Some(raw) = store.fetch_schema(namespace, name)? else {
        return Ok(None);
    };
    debug!(schema = name, namespace = %namespace, "Found stored schema");
    let document = SchemaDocument::from_json(&raw)?;
    compile_with(&document, name, options).map(Some)
}

// =============================================================================
// Response Format
// =============================================================================

/// How a generation call should shape its output
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// Structured output checked against a compiled schema
    Typed(Box<CompiledSchema>),
    /// Free text
    Plain,
}

impl ResponseFormat {
    /// Typed when `name` resolves and compiles; plain otherwise
    pub fn resolve(
        store: &dyn SchemaStore,
        settings: &StoreSettings,
        user_id: Option<&str>,
        name: Option<&str>,
        options: &CompilerOptions,
    ) -> Self {
        let Some(name) = name else {
            return ResponseFormat::Plain;
        };
        match load_compiled(store, settings, user_id, name, options) {
            Ok(schema) => ResponseFormat::Typed(Box::new(schema)),
            Err(e) => {
                warn!(schema = name, error = %e, "Falling back to plain output");
                ResponseFormat::Plain
            }
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, ResponseFormat::Typed(_))
    }

    pub fn schema(&self) -> Option<&CompiledSchema> {
        match self {
            ResponseFormat::Typed(schema) => Some(&**schema),
            ResponseFormat::Plain => None,
        }
    }

    /// JSON Schema to hand to the generation call
    pub fn json_schema(&self) -> Option<Value> {
        self.schema().map(CompiledSchema::to_json_schema)
    }

    /// Check a structured response, filling defaults for absent optional fields
    pub fn accept(&self, output: Value) -> std::result::Result<Value, ValidationReport> {
        match self {
            ResponseFormat::Typed(schema) => schema.validator().instantiate(&output),
            ResponseFormat::Plain => Ok(output),
        }
    }
}
