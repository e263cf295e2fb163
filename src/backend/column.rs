use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::backend::column_type::DeclaredType;
use crate::util::{error, identifier};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
/// The referenced side of a foreign key.
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> ForeignKeyRef {
        return ForeignKeyRef { table: table.into(), column: column.into() };
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
/// Logical description of one column of a table.
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_autoincrement: bool,
    #[serde(default)]
    pub is_not_null: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>
}

impl ColumnDefinition {
    /// A nullable, unconstrained column.
    pub fn new(name: impl Into<String>, declared_type: DeclaredType) -> ColumnDefinition {
        return ColumnDefinition {
            name: name.into(),
            declared_type,
            is_primary_key: false,
            is_autoincrement: false,
            is_not_null: false,
            is_unique: false,
            foreign_key: None
        };
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.is_autoincrement = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef::new(table, column));
        self
    }

    /// Whether NULL is rejected, either explicitly or because the column is part of the primary key.
    pub fn enforces_not_null(&self) -> bool {
        return self.is_not_null || self.is_primary_key;
    }

    /// Whether duplicates are rejected, either explicitly or because the column alone is the primary key.
    pub fn enforces_unique(&self, primary_key_len: usize) -> bool {
        return self.is_unique || (self.is_primary_key && primary_key_len == 1);
    }
}

/// Returns the names of the primary key columns, in declaration order.
pub fn primary_key_names(columns: &[ColumnDefinition]) -> Vec<&str> {
    return columns.iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.as_str())
        .collect();
}

/// Checks the shape rules every table definition must satisfy before any DDL is rendered from it.
pub fn validate_definitions(columns: &[ColumnDefinition]) -> Result<(), error::Error> {
    if columns.is_empty() {
        return Err(error::Error::ValidationError(String::from("A table must have at least one column.")));
    }

    let mut seen: HashSet<String> = HashSet::new();
    for col in columns.iter() {
        identifier::validate("Column", &col.name)?;
        // SQLite compares identifiers case-insensitively
        if !seen.insert(col.name.to_ascii_lowercase()) {
            return Err(error::Error::ValidationError(format!("Column '{}' is defined more than once.", col.name)));
        }
        if let Some(fk) = &col.foreign_key {
            identifier::validate("Table", &fk.table)?;
            identifier::validate("Column", &fk.column)?;
        }
    }

    let pk_count = columns.iter().filter(|c| c.is_primary_key).count();
    for col in columns.iter().filter(|c| c.is_autoincrement) {
        if !col.is_primary_key {
            return Err(error::Error::ValidationError(format!(
                "Column '{}' cannot be AUTOINCREMENT because it is not the primary key.", col.name
            )));
        }
        if col.declared_type != DeclaredType::Integer {
            return Err(error::Error::ValidationError(format!(
                "Column '{}' cannot be AUTOINCREMENT because only INTEGER primary keys can autoincrement.", col.name
            )));
        }
        if pk_count != 1 {
            return Err(error::Error::ValidationError(format!(
                "Column '{}' cannot be AUTOINCREMENT because the primary key spans {pk_count} columns.", col.name
            )));
        }
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ColumnDefinition {
        ColumnDefinition::new("id", DeclaredType::Integer).primary_key().autoincrement()
    }

    #[test]
    fn accepts_common_shapes() {
        validate_definitions(&[id(), ColumnDefinition::new("name", DeclaredType::Text).not_null()]).unwrap();
        validate_definitions(&[
            ColumnDefinition::new("a", DeclaredType::Integer).primary_key(),
            ColumnDefinition::new("b", DeclaredType::Text).primary_key(),
        ]).unwrap();
        validate_definitions(&[ColumnDefinition::new("note", DeclaredType::Text)]).unwrap();
    }

    #[test]
    fn rejects_empty_and_duplicate_columns() {
        assert!(validate_definitions(&[]).is_err());
        let dup = [id(), ColumnDefinition::new("ID", DeclaredType::Text)];
        assert!(matches!(validate_definitions(&dup), Err(error::Error::ValidationError(m)) if m.contains("more than once")));
    }

    #[test]
    fn rejects_misplaced_autoincrement() {
        let not_pk = [ColumnDefinition::new("n", DeclaredType::Integer).autoincrement()];
        assert!(validate_definitions(&not_pk).is_err());

        let text_pk = [ColumnDefinition::new("code", DeclaredType::Text).primary_key().autoincrement()];
        assert!(validate_definitions(&text_pk).is_err());

        let composite = [id(), ColumnDefinition::new("b", DeclaredType::Integer).primary_key()];
        assert!(validate_definitions(&composite).is_err());
    }

    #[test]
    fn rejects_unsafe_reference_names() {
        let cols = [ColumnDefinition::new("p", DeclaredType::Integer).references("x; DROP", "id")];
        assert!(validate_definitions(&cols).is_err());
    }

    #[test]
    fn implied_constraints() {
        let pk = ColumnDefinition::new("id", DeclaredType::Integer).primary_key();
        assert!(pk.enforces_not_null());
        assert!(pk.enforces_unique(1));
        assert!(!pk.enforces_unique(2));
    }

    #[test]
    fn json_flags_default_to_false() {
        let col: ColumnDefinition = serde_json::from_str(r#"{"name": "email", "type": "TEXT", "is_unique": true}"#).unwrap();
        assert_eq!(col, ColumnDefinition::new("email", DeclaredType::Text).unique());
    }
}
