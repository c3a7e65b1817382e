//! Command-line argument parsing for pgscratch.

use clap::Parser;
use pgscratch::config::{Config, SessionConfig};
use pgscratch::input::FileRegisters;
use std::path::PathBuf;

/// An interactive scratchpad SQL session for PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "pgscratch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Connection string or local database name (falls back to DATABASE_URL)
    #[arg(value_name = "DATABASE")]
    pub database: Option<String>,

    /// Connection string or local database name
    #[arg(long = "db", value_name = "URL", conflicts_with = "database")]
    pub db: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", env = "PGSCRATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run one statement and exit
    #[arg(short = 'e', long, value_name = "TEXT", conflicts_with = "register")]
    pub execute: Option<String>,

    /// Run the contents of a register and exit
    #[arg(short = 'r', long, value_name = "NAME")]
    pub register: Option<String>,

    /// Directory holding register files
    #[arg(long, value_name = "DIR")]
    pub registers: Option<PathBuf>,

    /// Render results as compact lines instead of tables
    #[arg(long)]
    pub compact: bool,

    /// Render timestamps in full
    #[arg(long)]
    pub full_timestamps: bool,

    /// Append output to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run non-SQL input through `sh -c`
    #[arg(long)]
    pub shell: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the explicit connection string, if one was given.
    pub fn connection_string(&self) -> Option<&str> {
        self.database.as_deref().or(self.db.as_deref())
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns the register directory to use.
    pub fn registers_dir(&self) -> PathBuf {
        self.registers
            .clone()
            .unwrap_or_else(FileRegisters::default_dir)
    }

    /// True when no one-shot statement was requested.
    pub fn is_interactive(&self) -> bool {
        self.execute.is_none() && self.register.is_none()
    }

    /// Applies flag overrides on top of the configured session defaults.
    pub fn apply_overrides(&self, settings: &mut SessionConfig) {
        if self.compact {
            settings.pretty = false;
        }
        if self.full_timestamps {
            settings.show_full_timestamps = true;
        }
        if self.shell {
            settings.shell_escape = true;
        }
    }
}
