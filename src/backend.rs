pub mod column;
pub mod column_type;
pub mod data;
pub mod db;
pub mod ddl;
pub mod export;
pub mod schema;
pub mod table;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use rusqlite::types::Value;
use tracing::info;
use crate::util::config::Config;
use crate::util::{error, identifier};
use column::ColumnDefinition;
use db::Database;

// Every name that reaches generated SQL passes through `identifier::validate` in this module first.

/// Resolves an existing database by name.
fn open_database(config: &Config, db_name: &str) -> Result<Database, error::Error> {
    identifier::validate("Database", db_name)?;
    let db = Database::locate(config, db_name);
    if !db.exists() {
        return Err(error::Error::NotFoundError(format!("Database '{db_name}' not found.")));
    }
    return Ok(db);
}

/// Resolves an existing database and checks the table name.
fn open_table(config: &Config, db_name: &str, table_name: &str) -> Result<Database, error::Error> {
    let db = open_database(config, db_name)?;
    identifier::validate("Table", table_name)?;
    return Ok(db);
}

fn validate_names(values: &[(String, Value)]) -> Result<(), error::Error> {
    for (name, _) in values.iter() {
        identifier::validate("Column", name)?;
    }
    return Ok(());
}

/// Lists the databases in the data directory.
pub fn get_database_list(config: &Config) -> Result<Vec<String>, error::Error> {
    return db::list(config);
}

/// Create a database.
pub fn create_database(config: &Config, db_name: &str) -> Result<String, error::Error> {
    identifier::validate("Database", db_name)?;
    db::create(config, db_name)?;
    return Ok(format!("Database '{db_name}' created successfully."));
}

/// Delete a database and its files.
pub fn delete_database(config: &Config, db_name: &str) -> Result<String, error::Error> {
    identifier::validate("Database", db_name)?;
    db::delete(config, db_name)?;
    return Ok(format!("Database '{db_name}' deleted successfully."));
}

/// Write an SQL dump of a database. Without an explicit path the dump lands in the export directory.
pub fn export_database(config: &Config, db_name: &str, path: Option<PathBuf>) -> Result<String, error::Error> {
    let db = open_database(config, db_name)?;
    let path = match path {
        Some(p) => p,
        None => {
            config.ensure_dirs()?;
            config.export_path(format!("{db_name}_dump.sql"))
        }
    };
    export::write_dump(&db, &path)?;
    return Ok(format!("Database successfully dumped to {}", path.display()));
}

pub fn get_table_list(config: &Config, db_name: &str) -> Result<Vec<String>, error::Error> {
    let db = open_database(config, db_name)?;
    return Ok(schema::list_tables(&db));
}

/// Get the column definitions of a table.
pub fn get_table_columns(config: &Config, db_name: &str, table_name: &str) -> Result<Vec<ColumnDefinition>, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    return Ok(schema::columns(&db, table_name));
}

/// Get the columns of a table that a foreign key may reference.
pub fn get_foreign_key_targets(config: &Config, db_name: &str, table_name: &str) -> Result<BTreeSet<String>, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    return Ok(schema::valid_foreign_key_targets(&db, table_name));
}

/// Create a table.
pub fn create_table(config: &Config, db_name: &str, table_name: &str, columns: &[ColumnDefinition]) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    table::create(&db, table_name, columns)?;
    return Ok(format!("Table '{table_name}' created successfully."));
}

/// Drop a table.
pub fn delete_table(config: &Config, db_name: &str, table_name: &str) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    table::delete(&db, table_name)?;
    return Ok(format!("Table '{table_name}' deleted successfully."));
}

/// Add a column to a table.
pub fn add_column(config: &Config, db_name: &str, table_name: &str, column_def: &ColumnDefinition) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    table::add_column(&db, table_name, column_def)?;
    return Ok(format!("Column '{}' added to '{table_name}'.", column_def.name));
}

/// Remove a column from a table.
pub fn remove_column(config: &Config, db_name: &str, table_name: &str, column_name: &str) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    identifier::validate("Column", column_name)?;
    table::remove_column(&db, table_name, column_name)?;
    return Ok(format!("Column '{column_name}' removed successfully."));
}

/// Add a foreign key to an existing column.
pub fn add_foreign_key(config: &Config, db_name: &str, table_name: &str, column_name: &str, target_table: &str, target_column: &str) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    identifier::validate("Column", column_name)?;
    identifier::validate("Table", target_table)?;
    identifier::validate("Column", target_column)?;
    table::add_foreign_key(&db, table_name, column_name, target_table, target_column)?;
    return Ok(format!("Foreign key added: '{table_name}.{column_name}' now references '{target_table}.{target_column}'."));
}

/// Get every row of a table.
pub fn get_table_data(config: &Config, db_name: &str, table_name: &str) -> Result<data::TableData, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    return data::select_all(&db, table_name);
}

/// Insert a row.
pub fn insert_row(config: &Config, db_name: &str, table_name: &str, values: &[(String, Value)]) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    validate_names(values)?;
    let row_id = data::insert(&db, table_name, values)?;
    return Ok(format!("Row inserted with rowid {row_id}."));
}

/// Update the row with the given primary key.
pub fn update_row(config: &Config, db_name: &str, table_name: &str, key: &[(String, Value)], values: &[(String, Value)]) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    validate_names(key)?;
    validate_names(values)?;
    data::update(&db, table_name, key, values)?;
    return Ok(String::from("Row updated successfully."));
}

/// Delete the row with the given primary key.
pub fn delete_row(config: &Config, db_name: &str, table_name: &str, key: &[(String, Value)]) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    validate_names(key)?;
    data::delete(&db, table_name, key)?;
    return Ok(String::from("Row deleted successfully."));
}

/// Get the values a foreign key referencing the given column may take.
pub fn get_parent_values(config: &Config, db_name: &str, table_name: &str, column_name: &str) -> Result<Vec<Value>, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    identifier::validate("Column", column_name)?;
    return Ok(data::parent_values(&db, table_name, column_name));
}

/// Export a table to CSV. Without an explicit path the file lands in the export directory.
pub fn export_table_csv(config: &Config, db_name: &str, table_name: &str, path: Option<PathBuf>) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    let path = match path {
        Some(p) => p,
        None => {
            config.ensure_dirs()?;
            config.export_path(format!("{db_name}_{table_name}.csv"))
        }
    };
    let count = export::export_csv(&db, table_name, &path)?;
    return Ok(format!("Exported {count} row(s) to {}", path.display()));
}

/// Import the rows of a CSV file into a table.
pub fn import_table_csv(config: &Config, db_name: &str, table_name: &str, path: &Path) -> Result<String, error::Error> {
    let db = open_table(config, db_name, table_name)?;
    let count = export::import_csv(&db, table_name, path)?;
    info!(db = %db_name, table = %table_name, rows = count, "import finished");
    return Ok(format!("Imported {count} row(s) into '{table_name}'."));
}
