//! Identifier Rendering
//!
//! Schema names come from property keys and definition names, which may hold
//! characters Rust identifiers cannot (`$`, `.`, spaces, leading digits).
//! Type names get PascalCase; field names get snake_case and fall back to raw
//! identifiers for keywords.

/// Convert to a PascalCase type name
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;
    let is_all_caps = s.chars().any(|c| c.is_ascii_alphabetic())
        && s.chars().all(|c| !c.is_ascii_lowercase());

    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else if is_all_caps {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    if result.is_empty() {
        return "Unnamed".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, 'T');
    }
    if result == "Self" {
        result.push('_');
    }
    result
}

/// Convert to a snake_case field name
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;

    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_lower = false;
        }
    }

    let trimmed = result.trim_end_matches('_');
    let mut result = if trimmed.is_empty() { "field".to_string() } else { trimmed.to_string() };
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Field identifier, escaping keywords as raw identifiers
pub fn field_ident(s: &str) -> String {
    let snake = to_snake_case(s);
    match snake.as_str() {
        // Not allowed as raw identifiers
        "self" | "super" | "crate" => format!("{}_", snake),
        _ if is_rust_keyword(&snake) => format!("r#{}", snake),
        _ => snake,
    }
}

fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "async" | "await" | "break" | "const" | "continue" | "crate" | "dyn" |
        "else" | "enum" | "extern" | "false" | "fn" | "for" | "if" | "impl" |
        "in" | "let" | "loop" | "match" | "mod" | "move" | "mut" | "pub" |
        "ref" | "return" | "self" | "static" | "struct" | "super" |
        "trait" | "true" | "type" | "unsafe" | "use" | "where" | "while" |
        "abstract" | "become" | "box" | "do" | "final" | "macro" | "override" |
        "priv" | "try" | "typeof" | "unsized" | "virtual" | "yield"
    )
}
