use std::sync::LazyLock;
use regex::Regex;
use crate::util::error;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Checks that a database, table or column name is safe to interpolate into SQL.
/// Names are quoted wherever they are rendered, but quoting alone does not make arbitrary text safe,
/// so only letters, digits and underscores are accepted, with no leading digit.
pub fn validate(kind: &str, name: &str) -> Result<(), error::Error> {
    if name.is_empty() {
        return Err(error::Error::ValidationError(format!("{kind} name cannot be empty.")));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(error::Error::ValidationError(format!(
            "'{name}' is not a valid {}. Use letters, digits and underscores, and do not start with a digit.",
            kind.to_lowercase()
        )));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(error::Error::ValidationError(format!("'{name}' is reserved for internal use by SQLite.")));
    }
    return Ok(());
}

/// Quotes an identifier for use in generated SQL.
pub fn quote(name: &str) -> String {
    return format!("\"{name}\"");
}

/// Quotes a list of identifiers and joins them with commas.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    return names.iter()
        .map(|n| quote(n.as_ref()))
        .collect::<Vec<String>>()
        .join(", ");
}
