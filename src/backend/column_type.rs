use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use crate::util::error;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
/// The declared type (affinity) of a column.
pub enum DeclaredType {
    Integer,
    Text,
    Real,
    Blob,
    Numeric,
}

impl DeclaredType {
    /// Every type offered to callers, in display order.
    pub const ALL: [DeclaredType; 5] = [
        DeclaredType::Integer,
        DeclaredType::Text,
        DeclaredType::Real,
        DeclaredType::Blob,
        DeclaredType::Numeric,
    ];

    /// Gets the keyword used for this type in a column declaration.
    pub fn get_sqlite_type(&self) -> &'static str {
        return match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Numeric => "NUMERIC",
        }
    }

    /// Converts a declared type read back from the catalog.
    /// Types outside the vocabulary are mapped by SQLite's own affinity rules.
    pub fn from_database(declared: &str) -> DeclaredType {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.contains("INT") {
            return Self::Integer;
        }
        if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            return Self::Text;
        }
        if upper.is_empty() || upper.contains("BLOB") {
            return Self::Blob;
        }
        if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            return Self::Real;
        }
        return Self::Numeric;
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.get_sqlite_type())
    }
}

impl FromStr for DeclaredType {
    type Err = error::Error;

    /// Parses a type name as typed by a user; only the exact vocabulary is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match DeclaredType::ALL.iter().find(|t| t.get_sqlite_type() == upper) {
            Some(t) => { return Ok(*t); },
            None => {
                return Err(error::Error::ValidationError(format!(
                    "'{s}' is not a supported column type. Use one of INTEGER, TEXT, REAL, BLOB, NUMERIC."
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_mapping() {
        assert_eq!(DeclaredType::from_database("INTEGER"), DeclaredType::Integer);
        assert_eq!(DeclaredType::from_database("bigint"), DeclaredType::Integer);
        assert_eq!(DeclaredType::from_database("VARCHAR(20)"), DeclaredType::Text);
        assert_eq!(DeclaredType::from_database(""), DeclaredType::Blob);
        assert_eq!(DeclaredType::from_database("double precision"), DeclaredType::Real);
        assert_eq!(DeclaredType::from_database("DECIMAL(10,2)"), DeclaredType::Numeric);
    }

    #[test]
    fn parse_user_input() {
        assert_eq!("text".parse::<DeclaredType>().unwrap(), DeclaredType::Text);
        assert!("VARCHAR".parse::<DeclaredType>().is_err());
    }

    #[test]
    fn serde_uses_sql_keywords() {
        assert_eq!(serde_json::to_string(&DeclaredType::Numeric).unwrap(), "\"NUMERIC\"");
        assert_eq!(serde_json::from_str::<DeclaredType>("\"REAL\"").unwrap(), DeclaredType::Real);
    }
}
