//! Command-line interface over the backend commands.

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use crate::backend::{self, column::ColumnDefinition, data};
use crate::util::config::Config;
use crate::util::error;

/// Create, inspect and edit local SQLite databases.
#[derive(Parser, Debug)]
#[command(name = "db-manager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the database files.
    #[arg(long, env = "DB_MANAGER_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory that exports are written to when no path is given.
    #[arg(long, env = "DB_MANAGER_EXPORT_DIR", global = true)]
    pub export_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the databases in the data directory.
    Databases,

    /// Create an empty database.
    CreateDb { name: String },

    /// Delete a database file.
    DeleteDb { name: String },

    /// Write an SQL dump of a database.
    Dump {
        db: String,
        /// Output file (defaults to <export-dir>/<db>_dump.sql).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the tables of a database.
    Tables { db: String },

    /// Print the column definitions of a table as JSON.
    Describe { db: String, table: String },

    /// List the columns of a table that a foreign key may reference.
    FkTargets { db: String, table: String },

    /// Create a table from a JSON array of column definitions.
    CreateTable {
        db: String,
        table: String,
        /// e.g. '[{"name": "id", "type": "INTEGER", "is_primary_key": true}]'
        #[arg(long)]
        columns: String,
    },

    /// Drop a table and all of its rows.
    DropTable { db: String, table: String },

    /// Add a column from a JSON column definition.
    AddColumn {
        db: String,
        table: String,
        #[arg(long)]
        column: String,
    },

    /// Remove a column, rebuilding the table.
    RemoveColumn { db: String, table: String, column: String },

    /// Make an existing column reference another table's column.
    AddForeignKey {
        db: String,
        table: String,
        column: String,
        ref_table: String,
        ref_column: String,
    },

    /// Print every row of a table as JSON.
    Rows { db: String, table: String },

    /// Insert a row given as a JSON object of column values.
    Insert {
        db: String,
        table: String,
        #[arg(long, default_value = "{}")]
        values: String,
    },

    /// Update the row whose primary key matches --key.
    Update {
        db: String,
        table: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        values: String,
    },

    /// Delete the row whose primary key matches --key.
    DeleteRow {
        db: String,
        table: String,
        #[arg(long)]
        key: String,
    },

    /// List the distinct values of a column that foreign keys may point at.
    ParentValues { db: String, table: String, column: String },

    /// Export a table to CSV.
    ExportCsv {
        db: String,
        table: String,
        /// Output file (defaults to <export-dir>/<db>_<table>.csv).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import the rows of a CSV file into a table.
    ImportCsv { db: String, table: String, input: PathBuf },
}

/// Runs one command and renders its result as the text to print.
pub fn execute(command: Commands, config: &Config) -> Result<String, error::Error> {
    match command {
        Commands::Databases => {
            return Ok(backend::get_database_list(config)?.join("\n"));
        },
        Commands::CreateDb { name } => {
            return backend::create_database(config, &name);
        },
        Commands::DeleteDb { name } => {
            return backend::delete_database(config, &name);
        },
        Commands::Dump { db, output } => {
            return backend::export_database(config, &db, output);
        },
        Commands::Tables { db } => {
            return Ok(backend::get_table_list(config, &db)?.join("\n"));
        },
        Commands::Describe { db, table } => {
            let columns = backend::get_table_columns(config, &db, &table)?;
            return Ok(serde_json::to_string_pretty(&columns)?);
        },
        Commands::FkTargets { db, table } => {
            let targets: Vec<String> = backend::get_foreign_key_targets(config, &db, &table)?.into_iter().collect();
            return Ok(targets.join("\n"));
        },
        Commands::CreateTable { db, table, columns } => {
            let columns: Vec<ColumnDefinition> = serde_json::from_str(&columns)?;
            return backend::create_table(config, &db, &table, &columns);
        },
        Commands::DropTable { db, table } => {
            return backend::delete_table(config, &db, &table);
        },
        Commands::AddColumn { db, table, column } => {
            let column: ColumnDefinition = serde_json::from_str(&column)?;
            return backend::add_column(config, &db, &table, &column);
        },
        Commands::RemoveColumn { db, table, column } => {
            return backend::remove_column(config, &db, &table, &column);
        },
        Commands::AddForeignKey { db, table, column, ref_table, ref_column } => {
            return backend::add_foreign_key(config, &db, &table, &column, &ref_table, &ref_column);
        },
        Commands::Rows { db, table } => {
            let table_data = backend::get_table_data(config, &db, &table)?;
            return Ok(serde_json::to_string_pretty(&table_data.to_view())?);
        },
        Commands::Insert { db, table, values } => {
            return backend::insert_row(config, &db, &table, &data::values_from_json(&values)?);
        },
        Commands::Update { db, table, key, values } => {
            return backend::update_row(config, &db, &table, &data::values_from_json(&key)?, &data::values_from_json(&values)?);
        },
        Commands::DeleteRow { db, table, key } => {
            return backend::delete_row(config, &db, &table, &data::values_from_json(&key)?);
        },
        Commands::ParentValues { db, table, column } => {
            let values: Vec<serde_json::Value> = backend::get_parent_values(config, &db, &table, &column)?
                .iter()
                .map(data::value_to_json)
                .collect();
            return Ok(serde_json::to_string(&values)?);
        },
        Commands::ExportCsv { db, table, output } => {
            return backend::export_table_csv(config, &db, &table, output);
        },
        Commands::ImportCsv { db, table, input } => {
            return backend::import_table_csv(config, &db, &table, &input);
        }
    }
}
