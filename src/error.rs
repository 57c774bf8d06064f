//! Error types for schema compilation

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Schema compilation errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Definition not found: {name}")]
    DefinitionNotFound { name: String },

    #[error("Root reference '#' used without a registered root type")]
    RootRecursionUnsupported,

    /// Internal invariant violation: a node reached a sub-compiler that
    /// cannot handle its shape.
    #[error("Unsupported node shape for {name}: expected {expected}")]
    UnsupportedNodeShape { name: String, expected: &'static str },

    /// Internal invariant violation: a placeholder survived compilation.
    #[error("Unresolved placeholder after compilation: {name}")]
    UnresolvedPlaceholder { name: String },

    #[error("Definition {name} only refers to itself through aliases")]
    AliasCycle { name: String },

    #[error("Finalize did not reach a fixed point after {passes} passes")]
    FinalizeDiverged { passes: usize },

    #[error("Invalid schema at {path}: {reason}")]
    InvalidSchema { path: String, reason: String },

    #[error("Too many definitions: {count} exceeds the limit of {limit}")]
    TooManyDefinitions { count: usize, limit: usize },

    #[error("Strict mode rejected {count} warning(s):\n{report}")]
    StrictMode { count: usize, report: String },

    #[error("Schema not found: {name} (searched {searched})")]
    SchemaNotFound { name: String, searched: String },

    #[error("Invalid schema name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
