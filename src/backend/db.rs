use std::fs;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OpenFlags, Params, Row};
use tracing::{debug, info};
use crate::util::config::Config;
use crate::util::error;

/// A named database file under the configured data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    name: String,
    path: PathBuf
}

impl Database {
    /// Locates the database with the given name. The file is not required to exist.
    pub fn locate(config: &Config, name: &str) -> Database {
        return Database {
            name: String::from(name),
            path: config.database_path(name)
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        return self.path.is_file();
    }

    /// Opens a connection to an existing database file with foreign key enforcement on.
    pub fn open(&self) -> Result<Connection, error::Error> {
        if !self.exists() {
            return Err(error::Error::NotFoundError(format!("Database '{}' not found.", self.name)));
        }
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI)?;
        configure(&conn)?;
        debug!(db = %self.name, "opened connection");
        return Ok(conn);
    }
}

/// Applies the per-connection settings every operation relies on.
fn configure(conn: &Connection) -> Result<(), error::Error> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    return Ok(());
}

/// Lists the names of all databases in the data directory, sorted alphabetically.
pub fn list(config: &Config) -> Result<Vec<String>, error::Error> {
    config.ensure_dirs()?;
    let entries = fs::read_dir(&config.data_dir)
        .map_err(|e| error::Error::io(format!("Could not read '{}'", config.data_dir.display()), e))?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| error::Error::io("Could not read directory entry", e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "db") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(String::from(stem));
            }
        }
    }
    names.sort();
    return Ok(names);
}

/// Creates a new, empty database file.
pub fn create(config: &Config, name: &str) -> Result<Database, error::Error> {
    config.ensure_dirs()?;
    let db = Database::locate(config, name);
    if db.path.exists() {
        return Err(error::Error::ValidationError(format!("Database '{name}' already exists.")));
    }

    let conn = Connection::open_with_flags(&db.path, OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)?;
    configure(&conn)?;
    conn.close().map_err(|(_, e)| error::Error::from(e))?;

    info!(db = %name, path = %db.path.display(), "created database");
    return Ok(db);
}

/// Deletes a database file, along with any journal files SQLite left next to it.
pub fn delete(config: &Config, name: &str) -> Result<(), error::Error> {
    let db = Database::locate(config, name);
    if !db.exists() {
        return Err(error::Error::NotFoundError(format!("Database '{name}' not found.")));
    }

    fs::remove_file(&db.path).map_err(|e| error::Error::io_on_delete(&db.path, e))?;
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side_file = db.path.clone().into_os_string();
        side_file.push(suffix);
        let side_file = PathBuf::from(side_file);
        if side_file.exists() {
            fs::remove_file(&side_file).map_err(|e| error::Error::io_on_delete(&side_file, e))?;
        }
    }

    info!(db = %name, "deleted database");
    return Ok(());
}

/// Convenience method to execute a query that returns multiple rows, then execute a function for each row.
pub fn query_iterate<P: Params, F: FnMut(&Row<'_>) -> Result<(), error::Error>>(conn: &Connection, sql: &str, p: P, f: &mut F) -> Result<(), error::Error> {
    // Prepare a statement
    let mut stmt = conn.prepare(sql)?;

    // Execute the statement to query rows
    let mut rows = stmt.query(p)?;
    loop {
        let row = match rows.next()? {
            Some(r) => r,
            None => { break; }
        };
        f(row)?;
    }
    return Ok(());
}
