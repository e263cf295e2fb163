use std::fs;
use std::path::{Path, PathBuf};
use crate::util::error;

/// Name of the folder created inside the platform data directory.
const APP_DIR_NAME: &str = "DatabaseManager";

/// Name of the folder created inside the user's documents for exports.
const EXPORT_DIR_NAME: &str = "DatabaseManagerExports";

/// Where database files live and where exports are written by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub export_dir: PathBuf
}

impl Config {
    /// Builds a configuration rooted at explicit directories.
    pub fn new(data_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Config {
        return Config {
            data_dir: data_dir.into(),
            export_dir: export_dir.into()
        };
    }

    /// Builds a configuration from optional overrides, falling back to the platform's standard directories.
    pub fn resolve(data_dir: Option<PathBuf>, export_dir: Option<PathBuf>) -> Result<Config, error::Error> {
        let data_dir = match data_dir {
            Some(d) => d,
            None => {
                let base = dirs::data_dir()
                    .or_else(dirs::home_dir)
                    .ok_or_else(|| error::Error::ConfigError(String::from("Unable to determine a data directory; pass --data-dir.")))?;
                base.join(APP_DIR_NAME).join("databases")
            }
        };
        let export_dir = match export_dir {
            Some(d) => d,
            None => {
                match dirs::document_dir().or_else(dirs::home_dir) {
                    Some(base) => base.join(EXPORT_DIR_NAME),
                    None => data_dir.join("exports")
                }
            }
        };
        return Ok(Config { data_dir, export_dir });
    }

    /// Creates the data and export directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<(), error::Error> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| error::Error::io(format!("Could not create data directory '{}'", self.data_dir.display()), e))?;
        fs::create_dir_all(&self.export_dir)
            .map_err(|e| error::Error::io(format!("Could not create export directory '{}'", self.export_dir.display()), e))?;
        return Ok(());
    }

    /// The path of the file backing the database with the given name.
    pub fn database_path(&self, db_name: &str) -> PathBuf {
        return self.data_dir.join(format!("{db_name}.db"));
    }

    /// The default destination for an export file with the given name.
    pub fn export_path<P: AsRef<Path>>(&self, file_name: P) -> PathBuf {
        return self.export_dir.join(file_name);
    }
}
