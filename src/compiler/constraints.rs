//! Constraint Extractor
//!
//! Maps the validation keywords of a scalar node onto [`Constraints`]. String
//! keywords only apply to strings and numeric keywords only to numbers; a
//! keyword on the wrong kind is metadata and dropped silently.

use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::schema::Keywords;
use crate::types::{Constraints, Pattern, PrimitiveKind, StringFormat};

/// Extract the constraints for a scalar of `kind`
///
/// Problems that would make a keyword unusable (a regex that does not
/// compile, a non-positive `multipleOf`) drop that keyword and record a
/// warning against `type_name`.
pub fn extract(
    kind: PrimitiveKind,
    keywords: &Keywords,
    type_name: &str,
    diagnostics: &mut Diagnostics,
) -> Constraints {
    let mut constraints = Constraints::default();

    match kind {
        PrimitiveKind::String => {
            if let Some(source) = &keywords.pattern {
                match Pattern::new(source) {
                    Ok(pattern) => constraints.pattern = Some(pattern),
                    Err(err) => diagnostics.push(
                        DiagnosticItem::new(
                            type_name,
                            DiagnosticCode::InvalidPattern,
                            "pattern is not a valid regular expression and is ignored",
                        )
                        .with_context(format!("pattern: {}", source))
                        .with_context(err.to_string()),
                    ),
                }
            }

            if let Some(name) = &keywords.format {
                let format = StringFormat::from_name(name);
                if !format.is_known() {
                    diagnostics.push(DiagnosticItem::new(
                        type_name,
                        DiagnosticCode::UnknownFormat,
                        format!("format '{}' is not checked", name),
                    ));
                }
                constraints.format = Some(format);
            }

            constraints.min_length = keywords.min_length;
            constraints.max_length = keywords.max_length;
        }
        PrimitiveKind::Integer | PrimitiveKind::Number => {
            constraints.minimum = keywords.minimum;
            constraints.maximum = keywords.maximum;
            constraints.exclusive_minimum = keywords.exclusive_minimum;
            constraints.exclusive_maximum = keywords.exclusive_maximum;

            match keywords.multiple_of {
                Some(k) if k > 0.0 && k.is_finite() => constraints.multiple_of = Some(k),
                Some(k) => diagnostics.push(DiagnosticItem::new(
                    type_name,
                    DiagnosticCode::InvalidConstraint,
                    format!("multipleOf must be positive, got {}; ignored", k),
                )),
                None => {}
            }
        }
        PrimitiveKind::Boolean | PrimitiveKind::Null => {}
    }

    constraints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_keywords() {
        let keywords = Keywords {
            pattern: Some("^@[a-zA-Z0-9_]+$".into()),
            format: Some("email".into()),
            min_length: Some(3),
            max_length: Some(20),
            minimum: Some(1.0),
            ..Keywords::default()
        };
        let mut diags = Diagnostics::new();
        let c = extract(PrimitiveKind::String, &keywords, "User_handle", &mut diags);

        assert_eq!(c.pattern.as_ref().map(Pattern::as_str), Some("^@[a-zA-Z0-9_]+$"));
        assert_eq!(c.format, Some(StringFormat::Email));
        assert_eq!((c.min_length, c.max_length), (Some(3), Some(20)));
        assert_eq!(c.minimum, None);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_numeric_keywords() {
        let keywords = Keywords {
            exclusive_minimum: Some(0.0),
            multiple_of: Some(0.01),
            pattern: Some("x".into()),
            ..Keywords::default()
        };
        let mut diags = Diagnostics::new();
        let c = extract(PrimitiveKind::Number, &keywords, "Product_price", &mut diags);

        assert_eq!(c.exclusive_minimum, Some(0.0));
        assert_eq!(c.multiple_of, Some(0.01));
        assert!(c.pattern.is_none());
    }

    #[test]
    fn test_bad_keywords_become_warnings() {
        let keywords = Keywords {
            pattern: Some("(unclosed".into()),
            format: Some("hostname-ish".into()),
            ..Keywords::default()
        };
        let mut diags = Diagnostics::new();
        let c = extract(PrimitiveKind::String, &keywords, "T", &mut diags);

        assert!(c.pattern.is_none());
        assert_eq!(c.format, Some(StringFormat::Other("hostname-ish".into())));
        assert_eq!(diags.with_code(DiagnosticCode::InvalidPattern).count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::UnknownFormat).count(), 1);
    }

    #[test]
    fn test_non_positive_multiple_of_dropped() {
        let keywords = Keywords {
            multiple_of: Some(0.0),
            ..Keywords::default()
        };
        let mut diags = Diagnostics::new();
        let c = extract(PrimitiveKind::Integer, &keywords, "T", &mut diags);
        assert_eq!(c.multiple_of, None);
        assert!(diags.has_warnings());
    }
}
