//! Reads table structure back out of the SQLite catalog.
//!
//! The `read_*` functions work on any open connection (including one inside a migration's
//! transaction) and propagate errors. The public functions taking a [`Database`] open their own
//! connection and return an empty result when the catalog cannot be read, logging the failure.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use rusqlite::{params, Connection, OptionalExtension};
use sqlparser::ast::{ColumnOption, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use tracing::{trace, warn};
use crate::backend::column::{ColumnDefinition, ForeignKeyRef};
use crate::backend::column_type::DeclaredType;
use crate::backend::db::{self, Database};
use crate::util::error;

/// An index on a table, as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub is_unique: bool,
    /// `c` for CREATE INDEX, `u` for a UNIQUE constraint, `pk` for a PRIMARY KEY constraint.
    pub origin: String,
    pub is_partial: bool,
    pub columns: Vec<String>,
    /// The CREATE INDEX statement; `None` for indexes SQLite creates automatically.
    pub sql: Option<String>
}

impl IndexInfo {
    /// Whether the index makes a single column unique on its own.
    pub fn is_single_column_unique(&self) -> bool {
        return self.is_unique && !self.is_partial && self.columns.len() == 1;
    }
}

/// Runs a read and swaps any failure for an empty result.
fn or_empty<T: Default>(db: &Database, what: &str, table: Option<&str>, read: impl FnOnce(&Connection) -> Result<T, error::Error>) -> T {
    let result = db.open().and_then(|conn| read(&conn));
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(db = %db.name(), table = table.unwrap_or(""), error = %e, "could not read {what}");
            T::default()
        }
    }
}

/// Lists the user tables of a database, in alphabetical order.
pub fn list_tables(db: &Database) -> Vec<String> {
    return or_empty(db, "table list", None, read_table_names);
}

/// Gets the current column definitions of a table.
pub fn columns(db: &Database, table: &str) -> Vec<ColumnDefinition> {
    return or_empty(db, "columns", Some(table), |conn| read_columns(conn, table));
}

/// Gets the columns of a table that another table's foreign key may reference.
pub fn valid_foreign_key_targets(db: &Database, table: &str) -> BTreeSet<String> {
    return or_empty(db, "foreign key targets", Some(table), |conn| read_valid_foreign_key_targets(conn, table));
}

/// Gets the primary key columns of a table, ordered by their position in the key.
pub fn primary_key_columns(db: &Database, table: &str) -> Vec<String> {
    return or_empty(db, "primary key", Some(table), |conn| read_primary_key_columns(conn, table));
}

/// Gets the foreign keys of a table, keyed by the referencing column.
pub fn foreign_keys(db: &Database, table: &str) -> BTreeMap<String, ForeignKeyRef> {
    return or_empty(db, "foreign keys", Some(table), |conn| read_foreign_keys(conn, table));
}

/// Gets the declared type of a single column.
pub fn column_type(db: &Database, table: &str, column: &str) -> Option<DeclaredType> {
    return or_empty(db, "column type", Some(table), |conn| {
        let declared: Option<String> = conn.query_row(
            "SELECT type FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0)
        ).optional()?;
        return Ok(declared.map(|d| DeclaredType::from_database(&d)));
    });
}

pub fn read_table_names(conn: &Connection) -> Result<Vec<String>, error::Error> {
    let mut names: Vec<String> = Vec::new();
    db::query_iterate(conn,
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name;",
        [],
        &mut |row| {
            names.push(row.get(0)?);
            return Ok(());
        }
    )?;
    return Ok(names);
}

/// Gets the stored CREATE TABLE statement of a table, or `None` if no such table exists.
pub fn table_sql(conn: &Connection, table: &str) -> Result<Option<String>, error::Error> {
    let sql = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get::<_, Option<String>>(0)
    ).optional()?;
    return Ok(sql.flatten());
}

/// Fails with a not-found error unless the table exists.
pub fn require_table(conn: &Connection, table: &str) -> Result<String, error::Error> {
    match table_sql(conn, table)? {
        Some(sql) => { return Ok(sql); },
        None => {
            return Err(error::Error::NotFoundError(format!("Table '{table}' not found.")));
        }
    }
}

pub fn read_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnDefinition>, error::Error> {
    trace!(table, "reading column information");

    // Base column information
    let mut defs: Vec<ColumnDefinition> = Vec::new();
    let mut pk_types: Vec<DeclaredType> = Vec::new();
    db::query_iterate(conn,
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid;",
        params![table],
        &mut |row| {
            let declared_type = DeclaredType::from_database(&row.get::<_, String>(1)?);
            let is_primary_key = row.get::<_, i64>(3)? > 0;
            if is_primary_key {
                pk_types.push(declared_type);
            }
            defs.push(ColumnDefinition {
                name: row.get(0)?,
                declared_type,
                is_primary_key,
                is_autoincrement: false,
                is_not_null: row.get::<_, i64>(2)? != 0,
                is_unique: false,
                foreign_key: None
            });
            return Ok(());
        }
    )?;

    // Autoincrement only exists on a lone INTEGER primary key
    if pk_types == [DeclaredType::Integer] {
        if let Some(sql) = table_sql(conn, table)? {
            if declares_autoincrement(&sql) {
                if let Some(pk) = defs.iter_mut().find(|d| d.is_primary_key) {
                    pk.is_autoincrement = true;
                }
            }
        }
    }

    // Unique constraints
    for index in read_indexes(conn, table)? {
        if index.origin != "pk" && index.is_single_column_unique() {
            if let Some(def) = defs.iter_mut().find(|d| d.name == index.columns[0]) {
                def.is_unique = true;
            }
        }
    }

    // Foreign keys
    let mut fks = read_foreign_keys(conn, table)?;
    for def in defs.iter_mut() {
        def.foreign_key = fks.remove(&def.name);
    }

    return Ok(defs);
}

pub fn read_primary_key_columns(conn: &Connection, table: &str) -> Result<Vec<String>, error::Error> {
    let mut names: Vec<String> = Vec::new();
    db::query_iterate(conn,
        "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk;",
        params![table],
        &mut |row| {
            names.push(row.get(0)?);
            return Ok(());
        }
    )?;
    return Ok(names);
}

pub fn read_foreign_keys(conn: &Connection, table: &str) -> Result<BTreeMap<String, ForeignKeyRef>, error::Error> {
    let mut fks: BTreeMap<String, ForeignKeyRef> = BTreeMap::new();
    db::query_iterate(conn,
        "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq;",
        params![table],
        &mut |row| {
            let from: String = row.get(0)?;
            let ref_table: String = row.get(1)?;
            // "to" is NULL when the reference names no column and so targets the parent's primary key
            let ref_column: Option<String> = row.get(2)?;
            let ref_column = match ref_column {
                Some(c) => c,
                None => read_primary_key_columns(conn, &ref_table)?.into_iter().next().unwrap_or_default()
            };
            fks.insert(from, ForeignKeyRef::new(ref_table, ref_column));
            return Ok(());
        }
    )?;
    return Ok(fks);
}

pub fn read_indexes(conn: &Connection, table: &str) -> Result<Vec<IndexInfo>, error::Error> {
    let mut indexes: Vec<IndexInfo> = Vec::new();
    db::query_iterate(conn,
        "SELECT l.name, l.\"unique\", l.origin, l.partial, m.sql
        FROM pragma_index_list(?1) l
        LEFT JOIN sqlite_master m ON m.type = 'index' AND m.name = l.name
        ORDER BY l.seq;",
        params![table],
        &mut |row| {
            indexes.push(IndexInfo {
                name: row.get(0)?,
                is_unique: row.get::<_, i64>(1)? != 0,
                origin: row.get(2)?,
                is_partial: row.get::<_, i64>(3)? != 0,
                columns: Vec::new(),
                sql: row.get(4)?
            });
            return Ok(());
        }
    )?;

    let mut columns_by_index: HashMap<String, Vec<String>> = HashMap::new();
    for index in indexes.iter() {
        let mut columns: Vec<String> = Vec::new();
        db::query_iterate(conn,
            "SELECT name FROM pragma_index_info(?1) ORDER BY seqno;",
            params![index.name],
            &mut |row| {
                // Expression columns have no name
                if let Some(name) = row.get::<_, Option<String>>(0)? {
                    columns.push(name);
                }
                return Ok(());
            }
        )?;
        columns_by_index.insert(index.name.clone(), columns);
    }
    for index in indexes.iter_mut() {
        index.columns = columns_by_index.remove(&index.name).unwrap_or_default();
    }
    return Ok(indexes);
}

pub fn read_valid_foreign_key_targets(conn: &Connection, table: &str) -> Result<BTreeSet<String>, error::Error> {
    let mut targets: BTreeSet<String> = read_primary_key_columns(conn, table)?.into_iter().collect();
    for index in read_indexes(conn, table)? {
        // Indexes backing the primary key are already covered above
        if index.origin == "pk" {
            continue;
        }
        if index.is_single_column_unique() {
            targets.insert(index.columns[0].clone());
        }
    }
    return Ok(targets);
}

/// Finds a table whose foreign key references the given column, if any.
pub fn find_referencing_table(conn: &Connection, table: &str, column: &str) -> Result<Option<String>, error::Error> {
    for other_table in read_table_names(conn)? {
        for (from, fk) in read_foreign_keys(conn, &other_table)? {
            let same_table = other_table.eq_ignore_ascii_case(table);
            // A column's own reference disappears along with the column
            if same_table && from.eq_ignore_ascii_case(column) {
                continue;
            }
            if fk.table.eq_ignore_ascii_case(table) && fk.column.eq_ignore_ascii_case(column) {
                return Ok(Some(other_table));
            }
        }
    }
    return Ok(None);
}

/// Checks whether a CREATE TABLE statement declares an AUTOINCREMENT column.
/// The statement is parsed, so the keyword inside a quoted name, a string literal or a comment does not count.
/// A statement the parser does not understand is treated as having no AUTOINCREMENT column.
pub fn declares_autoincrement(sql: &str) -> bool {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(s) => s,
        Err(e) => {
            trace!(error = %e, "could not parse table declaration");
            return false;
        }
    };

    return statements.iter().any(|statement| {
        match statement {
            Statement::CreateTable(create) => {
                create.columns.iter()
                    .flat_map(|column| column.options.iter())
                    .any(|option| match &option.option {
                        // SQLite's AUTOINCREMENT has no dedicated option in the AST
                        ColumnOption::DialectSpecific(tokens) => tokens.iter()
                            .any(|token| matches!(token, Token::Word(word) if word.keyword == Keyword::AUTOINCREMENT)),
                        _ => false
                    })
            },
            _ => false
        }
    });
}
