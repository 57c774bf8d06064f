//! Diagnostics
//!
//! Best-effort compilation never fails on an unknown leaf; it downgrades the
//! leaf and records why here. Callers inspect the list (or enable strict
//! mode) to decide whether the typing is good enough.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// `type` names a kind the compiler does not model
    UnknownKind,
    /// `format` is not one of the checked formats
    UnknownFormat,
    /// `pattern` is not a valid regular expression
    InvalidPattern,
    /// A constraint value that can never be satisfied as written
    InvalidConstraint,
    /// Node uses a keyword outside the supported subset
    UnsupportedKeyword,
    /// `anyOf` with no alternatives
    EmptyUnion,
    /// Array without an `items` schema
    MissingItems,
    /// Definition never reached from the root
    UnreachableDefinition,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownKind => "W001",
            Self::UnknownFormat => "W002",
            Self::InvalidPattern => "W003",
            Self::InvalidConstraint => "W004",
            Self::UnsupportedKeyword => "W005",
            Self::EmptyUnion => "W006",
            Self::MissingItems => "I001",
            Self::UnreachableDefinition => "I002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownKind
            | Self::UnknownFormat
            | Self::InvalidPattern
            | Self::InvalidConstraint
            | Self::UnsupportedKeyword
            | Self::EmptyUnion => Severity::Warning,

            Self::MissingItems | Self::UnreachableDefinition => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Type (or synthesized type name) the diagnostic is about
    pub type_name: String,
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(type_name: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.type_name
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from one compilation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|d| d.severity() == Severity::Warning)
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |d| d.code == code)
    }

    /// Format all diagnostics, one per line
    pub fn format_all(&self) -> String {
        self.items
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_split() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticItem::new("Root", DiagnosticCode::MissingItems, "no items"));
        assert!(!diags.has_warnings());

        diags.push(DiagnosticItem::new("Root_tags", DiagnosticCode::UnknownKind, "kind 'tuple'"));
        assert!(diags.has_warnings());
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::MissingItems).count(), 1);
    }

    #[test]
    fn test_display_with_context() {
        let item = DiagnosticItem::new("User", DiagnosticCode::InvalidPattern, "bad regex")
            .with_context("pattern: (unclosed");
        let text = item.to_string();
        assert!(text.starts_with("[W003] warning: bad regex (User)"));
        assert!(text.contains("\n  - pattern: (unclosed"));
    }
}
