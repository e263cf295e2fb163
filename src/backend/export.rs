use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use rusqlite::types::Value;
use rusqlite::Connection;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;
use crate::backend::data::{self, display_value};
use crate::backend::db::{self, Database};
use crate::backend::schema;
use crate::util::error;
use crate::util::identifier::{self, quote};

/// Renders the whole database as SQL statements that rebuild it when replayed in order.
pub fn dump(db: &Database) -> Result<Vec<String>, error::Error> {
    let conn = db.open()?;
    return dump_with(&conn);
}

fn dump_with(conn: &Connection) -> Result<Vec<String>, error::Error> {
    // Rows are replayed table by table, before the tables they reference may exist
    let mut lines: Vec<String> = vec![String::from("PRAGMA foreign_keys=OFF;"), String::from("BEGIN TRANSACTION;")];

    // Step 1: tables, each followed by its rows
    let mut tables: Vec<(String, String)> = Vec::new();
    db::query_iterate(conn,
        "SELECT name, sql FROM sqlite_master WHERE sql NOT NULL AND type = 'table' ORDER BY name;",
        [],
        &mut |row| {
            tables.push((row.get(0)?, row.get(1)?));
            return Ok(());
        }
    )?;

    let mut has_sequence = false;
    for (name, sql) in tables.iter() {
        if name == "sqlite_sequence" {
            has_sequence = true;
            continue;
        }
        if name.starts_with("sqlite_") {
            continue;
        }
        lines.push(format!("{sql};"));
        insert_statements(conn, name, &mut lines)?;
    }

    // Step 2: AUTOINCREMENT counters, once every table they refer to exists
    if has_sequence {
        lines.push(String::from("DELETE FROM \"sqlite_sequence\";"));
        insert_statements(conn, "sqlite_sequence", &mut lines)?;
    }

    // Step 3: indexes, triggers and views
    db::query_iterate(conn,
        "SELECT sql FROM sqlite_master WHERE sql NOT NULL AND type IN ('index', 'trigger', 'view');",
        [],
        &mut |row| {
            lines.push(format!("{};", row.get::<_, String>(0)?));
            return Ok(());
        }
    )?;

    lines.push(String::from("COMMIT;"));
    return Ok(lines);
}

/// Appends one INSERT statement per row, with every value rendered as an SQL literal by SQLite itself.
fn insert_statements(conn: &Connection, table_name: &str, lines: &mut Vec<String>) -> Result<(), error::Error> {
    let columns = schema::read_columns(conn, table_name)?;
    let literals: Vec<String> = columns.iter()
        .map(|c| format!("'||quote({})||'", quote(&c.name.replace('"', "\"\""))))
        .collect();
    let select_cmd = format!(
        "SELECT 'INSERT INTO {table} VALUES({})' FROM {table};",
        literals.join(","),
        table = quote(&table_name.replace('"', "\"\""))
    );
    db::query_iterate(conn, &select_cmd, [],
        &mut |row| {
            lines.push(format!("{};", row.get::<_, String>(0)?));
            return Ok(());
        }
    )?;
    return Ok(());
}

/// Writes the dump to a file, one statement per line, after a comment noting when it was taken.
#[tracing::instrument(skip(db, path), fields(db = %db.name(), path = %path.display()))]
pub fn write_dump(db: &Database, path: &Path) -> Result<usize, error::Error> {
    let lines = dump(db)?;
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;

    let file = File::create(path).map_err(|e| error::Error::io(format!("Could not create '{}'", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    let write_error = |e| error::Error::io(format!("Could not write '{}'", path.display()), e);
    writeln!(writer, "-- Dump of database '{}' taken {timestamp}", db.name()).map_err(write_error)?;
    for line in lines.iter() {
        writeln!(writer, "{line}").map_err(write_error)?;
    }
    writer.flush().map_err(write_error)?;

    info!(statements = lines.len(), "wrote SQL dump");
    return Ok(lines.len());
}

/// Writes a table to a CSV file with a header row. NULL becomes an empty field. Returns the number of rows written.
#[tracing::instrument(skip(db, path), fields(db = %db.name(), path = %path.display()))]
pub fn export_csv(db: &Database, table_name: &str, path: &Path) -> Result<usize, error::Error> {
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let table = data::select_all_with(&conn, table_name)?;

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in table.rows.iter() {
        writer.write_record(row.iter().map(|v| display_value(v).unwrap_or_default()))?;
    }
    writer.flush().map_err(|e| error::Error::io(format!("Could not write '{}'", path.display()), e))?;

    info!(table = %table_name, rows = table.rows.len(), "exported CSV");
    return Ok(table.rows.len());
}

/// Inserts every record of a CSV file into a table, all or nothing.
/// The header row names the target columns; empty fields are stored as NULL.
#[tracing::instrument(skip(db, path), fields(db = %db.name(), path = %path.display()))]
pub fn import_csv(db: &Database, table_name: &str, path: &Path) -> Result<usize, error::Error> {
    let mut conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let columns = schema::read_columns(&conn, table_name)?;

    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| String::from(h.trim())).collect();
    for header in headers.iter() {
        identifier::validate("Column", header)?;
        if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(header)) {
            return Err(error::Error::NotFoundError(format!("Column '{header}' not found in '{table_name}'.")));
        }
    }

    // Dropping the transaction without committing rolls everything back
    let trans = conn.transaction()?;
    let mut count: usize = 0;
    for record in reader.records() {
        let record = record?;
        let values: Vec<(String, Value)> = headers.iter()
            .zip(record.iter())
            .map(|(name, field)| {
                let value = match field {
                    "" => Value::Null,
                    text => Value::Text(String::from(text))
                };
                (name.clone(), value)
            })
            .collect();
        data::insert_with(&trans, table_name, &values)?;
        count += 1;
    }
    trans.commit()?;

    info!(table = %table_name, rows = count, "imported CSV");
    return Ok(count);
}
