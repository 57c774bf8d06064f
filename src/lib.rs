//! Typed Schemas
//!
//! Compiles JSON-Schema documents into validating type descriptors that a
//! structured-output call can be checked against.
//!
//! ## Features
//!
//! - **Recursion Safe**: self, mutual and root (`"#"`) references compile to
//!   links between named types, never to unbounded trees
//! - **Constraint Aware**: patterns, formats, bounds and `multipleOf` are kept
//!   on every primitive and enforced by the validator
//! - **Best Effort**: unsupported keywords degrade to unconstrained values
//!   with a diagnostic, or fail outright in strict mode
//! - **Round Trips**: compiled schemas export back to JSON Schema and render
//!   as serde-ready Rust types
//!
//! ## Architecture
//!
//! ```text
//! JSON ──parse──▶ SchemaDocument ──compile──▶ CompilationCache
//!                                                  │ finalize
//!                                                  ▼
//!   store ──lookup──▶ ResponseFormat ◀──── CompiledSchema ──▶ validate
//!                                                  │
//!                                        export / codegen
//! ```

pub mod analysis;
pub mod checksum;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod schema;
pub mod store;
pub mod types;
pub mod validate;

pub use checksum::Fingerprint;
pub use compiler::{compile, compile_value, compile_with, CompilationCache, CompiledSchema, CompilerOptions};
pub use config::Settings;
pub use diagnostics::{DiagnosticCode, Diagnostics};
pub use error::{CompileError, Result};
pub use schema::SchemaDocument;
pub use store::{DirectoryStore, InMemoryStore, Namespace, ResponseFormat, SchemaStore};
pub use types::{CompiledType, Field, PrimitiveKind, Record, TypeId};
pub use validate::{ValidationError, ValidationReport};
