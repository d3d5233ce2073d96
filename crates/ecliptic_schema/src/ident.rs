//! Strict identifier validation for table and column names.

use std::sync::OnceLock;

use regex::Regex;

use crate::SchemaError;

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// Whether a name is usable as a table or column identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    ident_re().is_match(name)
}

/// Validate an identifier, returning it on success.
pub fn ensure_identifier(name: &str) -> Result<&str, SchemaError> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quote a validated identifier for embedding in SQL.
///
/// Callers must validate first; validated identifiers cannot contain quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

/// Escape `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(is_valid_identifier("users"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("Table_2"));
    }

    #[test]
    fn rejects_hostile_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("users; DROP TABLE users"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("a.b"));
        assert!(!is_valid_identifier("*"));
    }

    #[test]
    fn like_escaping_covers_wildcards() {
        assert_eq!(escape_like("my_table"), "my\\_table");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("plain"), "plain");
    }
}
