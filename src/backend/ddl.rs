use crate::backend::column::{self, ColumnDefinition};
use crate::util::identifier::{quote, quote_list};

/// Renders the CREATE TABLE statement for a list of column definitions.
///
/// A lone primary key column is declared inline (with AUTOINCREMENT if requested); a key spanning
/// several columns becomes a trailing `PRIMARY KEY (...)` clause in declaration order. Foreign keys
/// are always trailing clauses, placed after the composite key. Names are quoted but not otherwise
/// escaped, so they must already have passed identifier validation.
pub fn render_create_table(table_name: &str, columns: &[ColumnDefinition]) -> String {
    let pk_names = column::primary_key_names(columns);
    let inline_pk = pk_names.len() == 1;

    let mut clauses: Vec<String> = Vec::new();
    let mut fk_clauses: Vec<String> = Vec::new();
    for col in columns.iter() {
        let mut parts: Vec<String> = vec![quote(&col.name), col.declared_type.to_string()];
        if col.is_primary_key && inline_pk {
            parts.push(String::from("PRIMARY KEY"));
            if col.is_autoincrement {
                parts.push(String::from("AUTOINCREMENT"));
            }
        }
        if col.is_not_null {
            parts.push(String::from("NOT NULL"));
        }
        if col.is_unique {
            parts.push(String::from("UNIQUE"));
        }
        clauses.push(parts.join(" "));

        if let Some(fk) = &col.foreign_key {
            fk_clauses.push(render_foreign_key_clause(&col.name, &fk.table, &fk.column));
        }
    }

    if pk_names.len() > 1 {
        clauses.push(format!("PRIMARY KEY ({})", quote_list(&pk_names)));
    }
    clauses.extend(fk_clauses);

    return format!("CREATE TABLE {} (\n  {}\n)", quote(table_name), clauses.join(",\n  "));
}

/// Renders a table-level foreign key clause.
pub fn render_foreign_key_clause(column: &str, ref_table: &str, ref_column: &str) -> String {
    return format!("FOREIGN KEY ({}) REFERENCES {}({})", quote(column), quote(ref_table), quote(ref_column));
}

/// Renders a single column declaration for `ALTER TABLE ... ADD COLUMN`.
/// A foreign key is declared inline here, since ADD COLUMN cannot carry table-level clauses.
pub fn render_column_clause(col: &ColumnDefinition) -> String {
    let mut parts: Vec<String> = vec![quote(&col.name), col.declared_type.to_string()];
    if col.is_not_null {
        parts.push(String::from("NOT NULL"));
    }
    if col.is_unique {
        parts.push(String::from("UNIQUE"));
    }
    if let Some(fk) = &col.foreign_key {
        parts.push(format!("REFERENCES {}({})", quote(&fk.table), quote(&fk.column)));
    }
    return parts.join(" ");
}

/// Adds a foreign key clause to a stored CREATE TABLE statement, just before its final closing parenthesis.
/// Everything else in the declaration is kept byte for byte. Returns `None` if the statement has no closing parenthesis.
pub fn inject_foreign_key(create_sql: &str, column: &str, ref_table: &str, ref_column: &str) -> Option<String> {
    let closing_paren_index = create_sql.rfind(')')?;
    return Some(format!(
        "{},\n  {}{}",
        &create_sql[..closing_paren_index],
        render_foreign_key_clause(column, ref_table, ref_column),
        &create_sql[closing_paren_index..]
    ));
}
