//! Named input registers.
//!
//! A register holds the text of one statement or script. The CLI reads a
//! register by name and submits its contents to the session.

use crate::error::{Result, ScratchError};
use std::path::{Path, PathBuf};

/// A source of named text registers.
pub trait InputSource {
    /// Returns the contents of register `name`.
    fn read(&self, name: &str) -> Result<String>;
}

/// Registers stored as files in one directory, one file per register.
#[derive(Debug, Clone)]
pub struct FileRegisters {
    dir: PathBuf,
}

impl FileRegisters {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the default register directory for the current platform.
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgscratch")
            .join("registers")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(ScratchError::config(format!(
                "Invalid register name '{name}'"
            )));
        }
        Ok(self.dir.join(name))
    }
}

impl InputSource for FileRegisters {
    fn read(&self, name: &str) -> Result<String> {
        let path = self.path_for(name)?;
        std::fs::read_to_string(&path).map_err(|e| {
            ScratchError::config(format!(
                "Cannot read register '{name}' from {}: {e}",
                path.display()
            ))
        })
    }
}
