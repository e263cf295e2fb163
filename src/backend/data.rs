use std::collections::HashSet;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::backend::db::{self, Database};
use crate::backend::schema;
use crate::util::error;
use crate::util::identifier::{quote, quote_list};

/// Every row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>
}

#[derive(Serialize)]
/// JSON-friendly rendition of [`TableData`].
pub struct TableDataView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>
}

impl TableData {
    pub fn to_view(&self) -> TableDataView {
        return TableDataView {
            headers: self.headers.clone(),
            rows: self.rows.iter()
                .map(|row| row.iter().map(value_to_json).collect())
                .collect()
        };
    }
}

/// Inserts a row. Columns left out of `values` take their declared defaults.
/// Returns the rowid of the new row.
#[tracing::instrument(skip(db, values), fields(db = %db.name()))]
pub fn insert(db: &Database, table_name: &str, values: &[(String, Value)]) -> Result<i64, error::Error> {
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let row_id = insert_with(&conn, table_name, values)?;
    info!(table = %table_name, row_id, "inserted row");
    return Ok(row_id);
}

/// Inserts a row on an already open connection or transaction.
pub(crate) fn insert_with(conn: &Connection, table_name: &str, values: &[(String, Value)]) -> Result<i64, error::Error> {
    let insert_cmd = if values.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES;", quote(table_name))
    } else {
        let names: Vec<&str> = values.iter().map(|(name, _)| name.as_str()).collect();
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        format!("INSERT INTO {} ({}) VALUES ({});", quote(table_name), quote_list(&names), placeholders.join(", "))
    };
    conn.execute(&insert_cmd, params_from_iter(values.iter().map(|(_, v)| v)))?;
    return Ok(conn.last_insert_rowid());
}

/// Updates the row identified by its primary key.
#[tracing::instrument(skip(db, key, values), fields(db = %db.name()))]
pub fn update(db: &Database, table_name: &str, key: &[(String, Value)], values: &[(String, Value)]) -> Result<(), error::Error> {
    if values.is_empty() {
        return Err(error::Error::ValidationError(String::from("No values were given to update.")));
    }
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let where_clause = key_filter(&conn, table_name, key, values.len())?;

    let assignments: Vec<String> = values.iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ?{}", quote(name), i + 1))
        .collect();
    let update_cmd = format!("UPDATE {} SET {} WHERE {where_clause};", quote(table_name), assignments.join(", "));
    debug!(sql = %update_cmd, "updating row");

    let params = values.iter().chain(key.iter()).map(|(_, v)| v);
    let changed = conn.execute(&update_cmd, params_from_iter(params))?;
    if changed == 0 {
        return Err(row_not_found());
    }
    info!(table = %table_name, "updated row");
    return Ok(());
}

/// Deletes the row identified by its primary key.
#[tracing::instrument(skip(db, key), fields(db = %db.name()))]
pub fn delete(db: &Database, table_name: &str, key: &[(String, Value)]) -> Result<(), error::Error> {
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let where_clause = key_filter(&conn, table_name, key, 0)?;

    let delete_cmd = format!("DELETE FROM {} WHERE {where_clause};", quote(table_name));
    let changed = conn.execute(&delete_cmd, params_from_iter(key.iter().map(|(_, v)| v)))?;
    if changed == 0 {
        return Err(row_not_found());
    }
    info!(table = %table_name, "deleted row");
    return Ok(());
}

fn row_not_found() -> error::Error {
    return error::Error::NotFoundError(String::from("Row not found. It may have been deleted by another user."));
}

/// Builds the WHERE clause matching a primary key. The key must name every primary key column exactly once.
/// Placeholders are numbered after the first `offset` parameters.
fn key_filter(conn: &Connection, table_name: &str, key: &[(String, Value)], offset: usize) -> Result<String, error::Error> {
    let pk_columns = schema::read_primary_key_columns(conn, table_name)?;
    if pk_columns.is_empty() {
        return Err(error::Error::ValidationError(format!(
            "Table '{table_name}' has no primary key, so its rows cannot be identified."
        )));
    }

    let expected: HashSet<String> = pk_columns.iter().map(|c| c.to_ascii_lowercase()).collect();
    let given: HashSet<String> = key.iter().map(|(name, _)| name.to_ascii_lowercase()).collect();
    if given.len() != key.len() || given != expected {
        return Err(error::Error::ValidationError(format!(
            "Rows of '{table_name}' are identified by ({}).", pk_columns.join(", ")
        )));
    }

    let conditions: Vec<String> = key.iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ?{}", quote(name), offset + i + 1))
        .collect();
    return Ok(conditions.join(" AND "));
}

/// Reads every row of a table.
#[tracing::instrument(skip(db), fields(db = %db.name()))]
pub fn select_all(db: &Database, table_name: &str) -> Result<TableData, error::Error> {
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    return select_all_with(&conn, table_name);
}

pub(crate) fn select_all_with(conn: &Connection, table_name: &str) -> Result<TableData, error::Error> {
    let select_cmd = format!("SELECT * FROM {};", quote(table_name));
    let stmt = conn.prepare(&select_cmd)?;
    let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    drop(stmt);

    let width = headers.len();
    let mut rows: Vec<Vec<Value>> = Vec::new();
    db::query_iterate(conn, &select_cmd, [],
        &mut |row| {
            let mut values: Vec<Value> = Vec::with_capacity(width);
            for i in 0..width {
                values.push(row.get::<_, Value>(i)?);
            }
            rows.push(values);
            return Ok(());
        }
    )?;
    return Ok(TableData { headers, rows });
}

/// Distinct values of a column in ascending order, offered as choices for foreign keys that reference it.
/// Returns an empty list if the values cannot be read.
pub fn parent_values(db: &Database, table_name: &str, column_name: &str) -> Vec<Value> {
    let read = || -> Result<Vec<Value>, error::Error> {
        let conn = db.open()?;
        // An unknown double-quoted name would otherwise be read as a string literal
        if !schema::read_columns(&conn, table_name)?.iter().any(|c| c.name.eq_ignore_ascii_case(column_name)) {
            return Err(error::Error::NotFoundError(format!("Column '{column_name}' not found in '{table_name}'.")));
        }
        let mut values: Vec<Value> = Vec::new();
        let select_cmd = format!(
            "SELECT DISTINCT {col} FROM {} WHERE {col} IS NOT NULL ORDER BY {col};",
            quote(table_name),
            col = quote(column_name)
        );
        db::query_iterate(&conn, &select_cmd, [],
            &mut |row| {
                values.push(row.get::<_, Value>(0)?);
                return Ok(());
            }
        )?;
        return Ok(values);
    };

    match read() {
        Ok(values) => values,
        Err(e) => {
            warn!(db = %db.name(), table = %table_name, column = %column_name, error = %e, "could not read parent values");
            Vec::new()
        }
    }
}

/// The text shown for a value, or `None` for NULL. Blobs are shown as lowercase hex.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(hex::encode(b))
    }
}

/// Converts a JSON scalar into the value bound to a statement.
/// Booleans become 0 or 1, and arrays or objects are stored as their JSON text.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => {
            match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => match n.as_f64() {
                    Some(f) => Value::Real(f),
                    None => Value::Text(n.to_string())
                }
            }
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string())
    }
}

/// Converts a value read from a table into JSON. Blobs become hex strings.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Blob(_) => serde_json::Value::from(display_value(value).unwrap_or_default())
    }
}

/// Parses a JSON object into column/value pairs, sorted by column name.
pub fn values_from_json(json: &str) -> Result<Vec<(String, Value)>, error::Error> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    return Ok(map.iter().map(|(name, v)| (name.clone(), json_to_value(v))).collect());
}
