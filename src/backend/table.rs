//! Table-level schema changes.
//!
//! SQLite cannot drop a column that other schema objects depend on, nor add a foreign key to an
//! existing table, so those changes rebuild the table: the live table is renamed out of the way,
//! a replacement is created under the original name, the rows are copied across and the old
//! table is dropped, all inside one transaction. Foreign key enforcement is switched off for the
//! rebuild and always switched back on before the connection is released.

use std::fmt;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, error, info, warn};
use crate::backend::column::{self, ColumnDefinition};
use crate::backend::db::{self, Database};
use crate::backend::{ddl, schema};
use crate::util::error;
use crate::util::identifier::{quote, quote_list};

/// Progress of a table rebuild, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ForeignKeysDisabled,
    InTransaction,
    Renamed,
    Created,
    Copied,
    DroppedTemp,
    Committed,
    RolledBack,
    ForeignKeysRestored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ForeignKeysDisabled => "foreign keys disabled",
            Self::InTransaction => "in transaction",
            Self::Renamed => "renamed",
            Self::Created => "created",
            Self::Copied => "copied",
            Self::DroppedTemp => "dropped temporary table",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::ForeignKeysRestored => "foreign keys restored",
        };
        f.write_str(name)
    }
}

/// Everything a table rebuild needs to know.
pub struct Rebuild<'a> {
    pub table: &'a str,
    /// The CREATE TABLE statement for the replacement table.
    pub create_sql: String,
    /// Columns copied from the old table into the replacement, by name.
    pub copy_columns: Vec<String>,
    /// Decides which of the table's explicit indexes are re-created on the replacement.
    pub keep_index: Box<dyn Fn(&schema::IndexInfo) -> bool + 'a>,
    /// When set, the rebuild is rolled back if existing rows violate the foreign key declared on this column.
    pub check_foreign_key: Option<&'a str>
}

struct Tracker<'a> {
    table: &'a str,
    stage: Stage
}

impl Tracker<'_> {
    fn advance(&mut self, stage: Stage) {
        debug!(table = %self.table, from = %self.stage, to = %stage, "rebuild stage");
        self.stage = stage;
    }
}

/// Rebuilds a table according to the plan. Either the whole rebuild is committed or none of it is.
pub fn rebuild(conn: &mut Connection, plan: &Rebuild) -> Result<(), error::Error> {
    let mut tracker = Tracker { table: plan.table, stage: Stage::Idle };

    // Renaming must not rewrite other tables' REFERENCES clauses to point at the temporary name
    let outcome = suspend_foreign_keys(conn).and_then(|()| {
        tracker.advance(Stage::ForeignKeysDisabled);
        run_in_transaction(conn, plan, &mut tracker)
    });

    // Always runs, whatever happened above
    let restored = restore_foreign_keys(conn);
    if restored.is_ok() {
        tracker.advance(Stage::ForeignKeysRestored);
    }
    tracker.advance(Stage::Idle);

    match (outcome, restored) {
        (Err(e), Err(restore_error)) => {
            error!(table = %plan.table, error = %restore_error, "could not re-enable foreign keys after a failed rebuild");
            return Err(e);
        },
        (Err(e), Ok(())) => { return Err(e); },
        (Ok(()), Err(restore_error)) => { return Err(restore_error); },
        (Ok(()), Ok(())) => { return Ok(()); }
    }
}

fn suspend_foreign_keys(conn: &Connection) -> Result<(), error::Error> {
    conn.pragma_update(None, "foreign_keys", false)?;
    conn.pragma_update(None, "legacy_alter_table", true)?;
    return Ok(());
}

fn restore_foreign_keys(conn: &Connection) -> Result<(), error::Error> {
    // Both are attempted even if the first fails
    let legacy = conn.pragma_update(None, "legacy_alter_table", false);
    conn.pragma_update(None, "foreign_keys", true)?;
    legacy?;
    return Ok(());
}

fn run_in_transaction(conn: &mut Connection, plan: &Rebuild, tracker: &mut Tracker) -> Result<(), error::Error> {
    let trans = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tracker.advance(Stage::InTransaction);

    match rebuild_steps(&trans, plan, tracker) {
        Ok(()) => {
            trans.commit()?;
            tracker.advance(Stage::Committed);
            return Ok(());
        },
        Err(e) => {
            warn!(table = %plan.table, stage = %tracker.stage, error = %e, "rebuild failed, rolling back");
            if let Err(rollback_error) = trans.rollback() {
                error!(table = %plan.table, error = %rollback_error, "rollback failed");
            }
            tracker.advance(Stage::RolledBack);
            return Err(e);
        }
    }
}

fn rebuild_steps(trans: &Transaction, plan: &Rebuild, tracker: &mut Tracker) -> Result<(), error::Error> {
    let table = plan.table;

    // Capture the index definitions while they still name the live table
    let indexes: Vec<String> = schema::read_indexes(trans, table)?
        .into_iter()
        .filter(|index| index.sql.is_some() && (plan.keep_index)(index))
        .filter_map(|index| index.sql)
        .collect();
    let triggers = read_triggers(trans, table)?;
    let sequence = read_sequence(trans, table)?;

    // Move the live table out of the way
    let temp_table = temporary_table_name(trans, table)?;
    trans.execute(&format!("ALTER TABLE {} RENAME TO {};", quote(table), quote(&temp_table)), [])?;
    tracker.advance(Stage::Renamed);

    // Create the replacement table
    debug!(table, sql = %plan.create_sql, "creating replacement table");
    trans.execute(&plan.create_sql, [])?;
    tracker.advance(Stage::Created);

    // Copy over the data
    let column_list = quote_list(&plan.copy_columns);
    trans.execute(
        &format!("INSERT INTO {} ({column_list}) SELECT {column_list} FROM {};", quote(table), quote(&temp_table)),
        []
    )?;
    tracker.advance(Stage::Copied);

    // Drop the old table, then put its indexes and triggers back on the replacement
    trans.execute(&format!("DROP TABLE {};", quote(&temp_table)), [])?;
    tracker.advance(Stage::DroppedTemp);
    for index_sql in indexes.iter() {
        trans.execute(index_sql, [])?;
    }
    for trigger_sql in triggers.iter() {
        trans.execute(trigger_sql, [])?;
    }
    if let Some(seq) = sequence {
        restore_sequence(trans, table, seq)?;
    }

    if let Some(column) = plan.check_foreign_key {
        check_foreign_key(trans, table, column)?;
    }
    return Ok(());
}

/// The CREATE TRIGGER statements attached to a table.
fn read_triggers(conn: &Connection, table: &str) -> Result<Vec<String>, error::Error> {
    let mut triggers: Vec<String> = Vec::new();
    db::query_iterate(conn,
        "SELECT sql FROM sqlite_master WHERE type = 'trigger' AND tbl_name = ?1 COLLATE NOCASE AND sql NOT NULL;",
        params![table],
        &mut |row| {
            triggers.push(row.get(0)?);
            return Ok(());
        }
    )?;
    return Ok(triggers);
}

/// The AUTOINCREMENT high-water mark of a table, if SQLite keeps one for it.
fn read_sequence(conn: &Connection, table: &str) -> Result<Option<i64>, error::Error> {
    if schema::table_sql(conn, "sqlite_sequence")?.is_none() {
        return Ok(None);
    }
    let seq = conn.query_row(
        "SELECT seq FROM sqlite_sequence WHERE name = ?1 COLLATE NOCASE;",
        params![table],
        |row| row.get::<_, i64>(0)
    ).optional()?;
    return Ok(seq);
}

/// Carries the high-water mark over to the replacement table, so ids of deleted rows are never handed out again.
/// Dropping the renamed table took the original counter with it.
fn restore_sequence(conn: &Connection, table: &str, seq: i64) -> Result<(), error::Error> {
    let updated = conn.execute(
        "UPDATE sqlite_sequence SET seq = max(seq, ?2) WHERE name = ?1;",
        params![table, seq]
    )?;
    if updated == 0 {
        // Nothing was copied, so the replacement has no counter yet
        conn.execute("INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2);", params![table, seq])?;
    }
    return Ok(());
}

/// Picks a name for the renamed table that no schema object uses yet.
fn temporary_table_name(conn: &Connection, table: &str) -> Result<String, error::Error> {
    loop {
        let candidate = format!("{table}_old_{:08x}", rand::random::<u32>());
        let taken: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE)",
            params![candidate],
            |row| row.get(0)
        )?;
        if !taken {
            return Ok(candidate);
        }
    }
}

/// Fails if any existing row violates the foreign key declared on the given column.
fn check_foreign_key(conn: &Connection, table: &str, column: &str) -> Result<(), error::Error> {
    let violations: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_foreign_key_check(?1) c
        WHERE c.fkid IN (SELECT id FROM pragma_foreign_key_list(?1) WHERE \"from\" = ?2 COLLATE NOCASE)",
        params![table, column],
        |row| row.get(0)
    )?;
    if violations > 0 {
        return Err(error::Error::ConstraintViolation(format!(
            "{violations} existing row(s) in '{table}' have a '{column}' value with no matching parent row."
        )));
    }
    return Ok(());
}

/// Checks that a foreign key points at an existing column that is a primary key or unique.
/// `pending` holds the columns of a table that is being created, for self-references.
fn validate_reference(conn: &Connection, table: &str, col: &ColumnDefinition, pending: &[ColumnDefinition]) -> Result<(), error::Error> {
    let fk = match &col.foreign_key {
        Some(fk) => fk,
        None => { return Ok(()); }
    };

    if fk.table.eq_ignore_ascii_case(table) && !pending.is_empty() {
        let pk_len = column::primary_key_names(pending).len();
        let target = pending.iter().find(|c| c.name.eq_ignore_ascii_case(&fk.column));
        return match target {
            Some(t) if t.enforces_unique(pk_len) => Ok(()),
            _ => Err(error::Error::ValidationError(format!(
                "Column '{}' cannot reference '{}.{}' because it is not a primary key or unique column.",
                col.name, fk.table, fk.column
            )))
        };
    }

    if schema::table_sql(conn, &fk.table)?.is_none() {
        return Err(error::Error::ValidationError(format!(
            "Cannot create foreign key: the referenced table '{}' does not exist.", fk.table
        )));
    }
    // A member of a composite primary key is only a valid parent key if it is also unique on its own
    let pk_columns = schema::read_primary_key_columns(conn, &fk.table)?;
    let is_sole_key = pk_columns.len() == 1 && pk_columns[0].eq_ignore_ascii_case(&fk.column);
    let is_unique = schema::read_indexes(conn, &fk.table)?
        .iter()
        .any(|index| index.is_single_column_unique() && index.columns[0].eq_ignore_ascii_case(&fk.column));
    if !is_sole_key && !is_unique {
        return Err(error::Error::ValidationError(format!(
            "Column '{}' cannot reference '{}.{}' because it is not a primary key or unique column.",
            col.name, fk.table, fk.column
        )));
    }
    return Ok(());
}

/// Creates a new table.
#[tracing::instrument(skip(db, columns), fields(db = %db.name()))]
pub fn create(db: &Database, table_name: &str, columns: &[ColumnDefinition]) -> Result<(), error::Error> {
    column::validate_definitions(columns)?;

    let conn = db.open()?;
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = ?1 COLLATE NOCASE)",
        params![table_name],
        |row| row.get(0)
    )?;
    if exists {
        return Err(error::Error::ValidationError(format!("Table '{table_name}' already exists.")));
    }
    for col in columns.iter() {
        validate_reference(&conn, table_name, col, columns)?;
    }

    let sql = ddl::render_create_table(table_name, columns);
    debug!(%sql, "creating table");
    conn.execute(&sql, [])?;
    info!(table = %table_name, "created table");
    return Ok(());
}

/// Drops a table and all of its rows.
#[tracing::instrument(skip(db), fields(db = %db.name()))]
pub fn delete(db: &Database, table_name: &str) -> Result<(), error::Error> {
    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    conn.execute(&format!("DROP TABLE {};", quote(table_name)), [])?;
    info!(table = %table_name, "dropped table");
    return Ok(());
}

/// Appends a column to a table.
#[tracing::instrument(skip(db, column_def), fields(db = %db.name(), column = %column_def.name))]
pub fn add_column(db: &Database, table_name: &str, column_def: &ColumnDefinition) -> Result<(), error::Error> {
    column::validate_definitions(std::slice::from_ref(column_def))?;
    if column_def.is_primary_key || column_def.is_autoincrement {
        return Err(error::Error::ValidationError(String::from("A primary key column cannot be added to an existing table.")));
    }
    if column_def.is_unique {
        return Err(error::Error::ValidationError(String::from("A UNIQUE column cannot be added to an existing table.")));
    }
    if column_def.is_not_null {
        return Err(error::Error::ValidationError(String::from("A NOT NULL column cannot be added to an existing table without a default value.")));
    }

    let conn = db.open()?;
    schema::require_table(&conn, table_name)?;
    let existing = schema::read_columns(&conn, table_name)?;
    if existing.iter().any(|c| c.name.eq_ignore_ascii_case(&column_def.name)) {
        return Err(error::Error::ValidationError(format!("Column '{}' already exists in '{table_name}'.", column_def.name)));
    }
    validate_reference(&conn, table_name, column_def, &[])?;

    let sql = format!("ALTER TABLE {} ADD COLUMN {};", quote(table_name), ddl::render_column_clause(column_def));
    conn.execute(&sql, [])?;
    info!(table = %table_name, "added column");
    return Ok(());
}

/// Adds a foreign key to an existing table by rebuilding it with an amended declaration.
#[tracing::instrument(skip(db), fields(db = %db.name()))]
pub fn add_foreign_key(db: &Database, table_name: &str, column_name: &str, target_table: &str, target_column: &str) -> Result<(), error::Error> {
    let mut conn = db.open()?;

    let original_sql = schema::require_table(&conn, table_name)?;
    let columns = schema::read_columns(&conn, table_name)?;
    let column_def = match columns.iter().find(|c| c.name.eq_ignore_ascii_case(column_name)) {
        Some(c) => c,
        None => {
            return Err(error::Error::NotFoundError(format!("Column '{column_name}' not found in '{table_name}'.")));
        }
    };
    if let Some(existing) = &column_def.foreign_key {
        return Err(error::Error::ValidationError(format!(
            "Column '{}' already references '{}.{}'.", column_def.name, existing.table, existing.column
        )));
    }

    let create_sql = match ddl::inject_foreign_key(&original_sql, &column_def.name, target_table, target_column) {
        Some(sql) => sql,
        None => {
            return Err(error::Error::ValidationError(format!("The declaration of '{table_name}' could not be amended.")));
        }
    };

    let plan = Rebuild {
        table: table_name,
        create_sql,
        copy_columns: columns.iter().map(|c| c.name.clone()).collect(),
        keep_index: Box::new(|_: &schema::IndexInfo| true),
        check_foreign_key: Some(column_name)
    };
    rebuild(&mut conn, &plan)?;
    info!(table = %table_name, column = %column_name, references = %format!("{target_table}.{target_column}"), "added foreign key");
    return Ok(());
}

/// Removes a column from a table by rebuilding the table without it.
#[tracing::instrument(skip(db), fields(db = %db.name()))]
pub fn remove_column(db: &Database, table_name: &str, column_to_remove: &str) -> Result<(), error::Error> {
    let mut conn = db.open()?;

    // Pre-flight checks, before any transaction is opened
    schema::require_table(&conn, table_name)?;
    let full_defs = schema::read_columns(&conn, table_name)?;
    let target = match full_defs.iter().find(|d| d.name.eq_ignore_ascii_case(column_to_remove)) {
        Some(d) => d.name.clone(),
        None => {
            return Err(error::Error::NotFoundError(format!("Column '{column_to_remove}' not found in '{table_name}'.")));
        }
    };
    if full_defs.iter().any(|d| d.name == target && d.is_primary_key) {
        warn!(table = %table_name, column = %target, "refusing to remove a primary key column");
        return Err(error::Error::ValidationError(String::from("Cannot remove a column that is part of the primary key.")));
    }
    if let Some(other_table) = schema::find_referencing_table(&conn, table_name, &target)? {
        warn!(table = %table_name, column = %target, referenced_by = %other_table, "refusing to remove a referenced column");
        return Err(error::Error::ValidationError(format!(
            "Cannot remove column '{target}' because it is referenced by a foreign key in table '{other_table}'."
        )));
    }
    let new_defs: Vec<ColumnDefinition> = full_defs.into_iter().filter(|d| d.name != target).collect();
    if new_defs.is_empty() {
        return Err(error::Error::ValidationError(String::from("Cannot remove the last column from a table.")));
    }

    let removed = target.clone();
    let plan = Rebuild {
        table: table_name,
        create_sql: ddl::render_create_table(table_name, &new_defs),
        copy_columns: new_defs.iter().map(|d| d.name.clone()).collect(),
        // Single-column unique indexes come back as inline UNIQUE in the synthesized declaration
        keep_index: Box::new(move |index: &schema::IndexInfo| {
            !index.columns.iter().any(|c| c.eq_ignore_ascii_case(&removed)) && !index.is_single_column_unique()
        }),
        check_foreign_key: None
    };
    rebuild(&mut conn, &plan)?;
    info!(table = %table_name, column = %target, "removed column");
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{column_type::DeclaredType, db};
    use crate::util::config::Config;
    use pretty_assertions::assert_eq;

    fn setup(sql: &str) -> (tempfile::TempDir, Database) {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::new(tmp.path().join("databases"), tmp.path().join("exports"));
        let db = db::create(&config, "test").unwrap();
        db.open().unwrap().execute_batch(sql).unwrap();
        (tmp, db)
    }

    fn foreign_keys_enabled(conn: &Connection) -> bool {
        conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap()
    }

    fn row_count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn failed_copy_leaves_table_untouched() {
        let (_tmp, db) = setup("
            CREATE TABLE t (id INTEGER PRIMARY KEY, n TEXT);
            INSERT INTO t (n) VALUES ('one'), ('two');
        ");
        let mut conn = db.open().unwrap();
        let before = schema::read_columns(&conn, "t").unwrap();

        // A STRICT INTEGER column refuses the TEXT values during the copy
        let plan = Rebuild {
            table: "t",
            create_sql: String::from("CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"n\" INTEGER) STRICT"),
            copy_columns: vec![String::from("id"), String::from("n")],
            keep_index: Box::new(|_: &schema::IndexInfo| true),
            check_foreign_key: None
        };
        assert!(rebuild(&mut conn, &plan).is_err());

        assert_eq!(schema::read_columns(&conn, "t").unwrap(), before);
        assert_eq!(row_count(&conn, "t"), 2);
        assert_eq!(schema::read_table_names(&conn).unwrap(), vec!["t"]);
        assert!(foreign_keys_enabled(&conn));
    }

    #[test]
    fn failed_foreign_key_check_rolls_back() {
        let (_tmp, db) = setup("
            CREATE TABLE parent (id INTEGER PRIMARY KEY);
            CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER);
            INSERT INTO parent (id) VALUES (1);
            INSERT INTO child (parent_id) VALUES (1), (7);
        ");
        let err = add_foreign_key(&db, "child", "parent_id", "parent", "id").unwrap_err();
        assert!(matches!(err, error::Error::ConstraintViolation(_)), "{err:?}");

        let conn = db.open().unwrap();
        assert!(schema::read_foreign_keys(&conn, "child").unwrap().is_empty());
        assert_eq!(row_count(&conn, "child"), 2);
        assert_eq!(schema::read_table_names(&conn).unwrap(), vec!["child", "parent"]);
    }

    #[test]
    fn reference_to_non_unique_column_rolls_back() {
        let (_tmp, db) = setup("
            CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT);
            CREATE TABLE child (id INTEGER PRIMARY KEY, parent_name TEXT);
        ");
        assert!(add_foreign_key(&db, "child", "parent_name", "parent", "name").is_err());
        let conn = db.open().unwrap();
        assert!(schema::read_foreign_keys(&conn, "child").unwrap().is_empty());
        assert!(foreign_keys_enabled(&conn));
    }

    #[test]
    fn explicit_indexes_survive_rebuilds() {
        let (_tmp, db) = setup("
            CREATE TABLE t (id INTEGER PRIMARY KEY, a TEXT, b TEXT, c TEXT);
            CREATE INDEX t_a ON t (a);
            CREATE INDEX t_bc ON t (b, c);
        ");
        remove_column(&db, "t", "c").unwrap();

        let conn = db.open().unwrap();
        let names: Vec<String> = schema::read_indexes(&conn, "t").unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["t_a"]);
    }

    #[test]
    fn create_rejects_bad_references() {
        let (_tmp, db) = setup("CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT);");
        let missing_table = [ColumnDefinition::new("p", DeclaredType::Integer).references("nowhere", "id")];
        assert!(matches!(create(&db, "c1", &missing_table), Err(error::Error::ValidationError(_))));

        let not_unique = [ColumnDefinition::new("p", DeclaredType::Text).references("parent", "name")];
        assert!(matches!(create(&db, "c2", &not_unique), Err(error::Error::ValidationError(_))));

        let self_ref = [
            ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
            ColumnDefinition::new("manager_id", DeclaredType::Integer).references("staff", "id"),
        ];
        create(&db, "staff", &self_ref).unwrap();

        assert!(matches!(create(&db, "PARENT", &self_ref), Err(error::Error::ValidationError(_))));
    }

    #[test]
    fn add_column_rules() {
        let (_tmp, db) = setup("
            CREATE TABLE parent (id INTEGER PRIMARY KEY);
            CREATE TABLE child (id INTEGER PRIMARY KEY);
        ");
        add_column(&db, "child", &ColumnDefinition::new("parent_id", DeclaredType::Integer).references("parent", "id")).unwrap();
        let conn = db.open().unwrap();
        assert_eq!(schema::read_foreign_keys(&conn, "child").unwrap()["parent_id"].table, "parent");

        for bad in [
            ColumnDefinition::new("x", DeclaredType::Integer).primary_key(),
            ColumnDefinition::new("x", DeclaredType::Text).unique(),
            ColumnDefinition::new("x", DeclaredType::Text).not_null(),
            ColumnDefinition::new("parent_id", DeclaredType::Integer),
        ] {
            assert!(matches!(add_column(&db, "child", &bad), Err(error::Error::ValidationError(_))), "{bad:?}");
        }
        assert!(matches!(
            add_column(&db, "missing", &ColumnDefinition::new("x", DeclaredType::Text)),
            Err(error::Error::NotFoundError(_))
        ));
    }

    #[test]
    fn drop_missing_table_is_not_found() {
        let (_tmp, db) = setup("CREATE TABLE t (id INTEGER PRIMARY KEY);");
        assert!(matches!(delete(&db, "nope"), Err(error::Error::NotFoundError(_))));
        delete(&db, "t").unwrap();
        assert!(schema::read_table_names(&db.open().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn composite_key_members_are_not_parent_keys() {
        let (_tmp, db) = setup("
            CREATE TABLE p (a INTEGER, b INTEGER, code TEXT, PRIMARY KEY (a, b));
            CREATE UNIQUE INDEX p_b ON p (b);
        ");
        let to_member = [
            ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
            ColumnDefinition::new("pa", DeclaredType::Integer).references("p", "a"),
        ];
        assert!(matches!(create(&db, "c", &to_member), Err(error::Error::ValidationError(_))));
        assert!(matches!(
            add_column(&db, "p", &ColumnDefinition::new("pa", DeclaredType::Integer).references("p", "a")),
            Err(error::Error::ValidationError(_))
        ));

        // A member with its own unique index is a usable parent key
        let to_unique_member = [
            ColumnDefinition::new("id", DeclaredType::Integer).primary_key(),
            ColumnDefinition::new("pb", DeclaredType::Integer).references("p", "b"),
        ];
        create(&db, "c", &to_unique_member).unwrap();
        let conn = db.open().unwrap();
        conn.execute_batch("INSERT INTO p (a, b) VALUES (1, 2); INSERT INTO c (pb) VALUES (2);").unwrap();
        assert!(conn.execute("INSERT INTO c (pb) VALUES (9)", []).is_err());
    }

    #[test]
    fn autoincrement_counter_survives_rebuild() {
        let (_tmp, db) = setup("
            CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, extra TEXT);
            CREATE TABLE e (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, extra TEXT);
            INSERT INTO t (name) VALUES ('a'), ('b'), ('c');
            DELETE FROM t WHERE id = 3;
            INSERT INTO e (name) VALUES ('a'), ('b');
            DELETE FROM e;
        ");
        remove_column(&db, "t", "extra").unwrap();
        remove_column(&db, "e", "extra").unwrap();

        let conn = db.open().unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('d')", []).unwrap();
        assert_eq!(conn.last_insert_rowid(), 4);
        conn.execute("INSERT INTO e (name) VALUES ('c')", []).unwrap();
        assert_eq!(conn.last_insert_rowid(), 3);
    }

    #[test]
    fn triggers_survive_rebuild() {
        let (_tmp, db) = setup("
            CREATE TABLE log (id INTEGER PRIMARY KEY, msg TEXT);
            CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, extra TEXT);
            CREATE TRIGGER t_audit AFTER INSERT ON t BEGIN INSERT INTO log (msg) VALUES (NEW.name); END;
        ");
        remove_column(&db, "t", "extra").unwrap();

        let conn = db.open().unwrap();
        let triggers = read_triggers(&conn, "t").unwrap();
        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].starts_with("CREATE TRIGGER t_audit"));
        conn.execute("INSERT INTO t (name) VALUES ('x')", []).unwrap();
        assert_eq!(row_count(&conn, "log"), 1);
    }
}
