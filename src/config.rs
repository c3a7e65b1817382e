//! Configuration management for pgscratch.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named database connections and session defaults.

use crate::error::{Result, ScratchError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Row cap appended to unbounded selects.
pub const DEFAULT_IMPLICIT_LIMIT: u32 = 200;

/// Environment variable holding the connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Main configuration structure for pgscratch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session behavior defaults.
    #[serde(default)]
    pub session: SessionConfig,

    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

/// Session behavior defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Row cap appended to selects without an explicit `limit`.
    #[serde(default = "default_implicit_limit")]
    pub implicit_limit: u32,

    /// Render results as aligned tables (true) or compact lines (false).
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Render timestamps in full instead of date-only.
    #[serde(default)]
    pub show_full_timestamps: bool,

    /// Extra host names treated as local development targets.
    #[serde(default)]
    pub local_hosts: Vec<String>,

    /// Run non-SQL input through `sh -c`.
    #[serde(default)]
    pub shell_escape: bool,
}

fn default_implicit_limit() -> u32 {
    DEFAULT_IMPLICIT_LIMIT
}

fn default_pretty() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            implicit_limit: default_implicit_limit(),
            pretty: default_pretty(),
            show_full_timestamps: false,
            local_hosts: Vec::new(),
            shell_escape: false,
        }
    }
}

/// A named connection in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection string, or a bare local database name.
    pub url: String,

    /// Treat this connection as local regardless of its host.
    #[serde(default)]
    pub local: bool,
}

/// A fully resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Connection string handed to the driver.
    pub url: String,

    /// Whether destructive statements are allowed against this target.
    pub is_local: bool,
}

impl ConnectionTarget {
    /// Resolves a raw connection string.
    ///
    /// A value without a `postgres://` or `postgresql://` scheme is taken as
    /// the name of a local database.
    pub fn resolve(raw: &str, local_hosts: &[String]) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScratchError::config("Connection string is empty"));
        }

        let url = if has_postgres_scheme(raw) {
            raw.to_string()
        } else {
            format!("postgres://localhost/{raw}?sslmode=disable")
        };

        let parsed = Url::parse(&url)
            .map_err(|e| ScratchError::config(format!("Invalid connection string: {e}")))?;
        let is_local = is_local_host(parsed.host_str(), local_hosts);

        Ok(Self { url, is_local })
    }

    /// Marks the target as local.
    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    /// Returns a display-safe string (password masked) for UI purposes.
    pub fn display_string(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                // Only fails for URLs that cannot carry credentials.
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

fn has_postgres_scheme(raw: &str) -> bool {
    raw.starts_with("postgres://") || raw.starts_with("postgresql://")
}

fn is_local_host(host: Option<&str>, local_hosts: &[String]) -> bool {
    match host {
        // No host means a unix socket on this machine.
        None | Some("") => true,
        Some(host) => {
            matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
                || local_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgscratch")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScratchError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ScratchError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionConfig> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }

    /// Resolves the connection target with precedence:
    /// 1. explicit connection string
    /// 2. named connection from config
    /// 3. `DATABASE_URL`
    /// 4. default connection from config
    pub fn resolve_target(
        &self,
        explicit: Option<&str>,
        name: Option<&str>,
    ) -> Result<ConnectionTarget> {
        let local_hosts = &self.session.local_hosts;

        if let Some(raw) = explicit {
            return ConnectionTarget::resolve(raw, local_hosts);
        }

        if let Some(name) = name {
            let conn = self.get_connection(Some(name)).ok_or_else(|| {
                ScratchError::config(format!("Connection '{name}' not found in config file"))
            })?;
            return connection_target(conn, local_hosts);
        }

        if let Ok(raw) = std::env::var(DATABASE_URL_ENV) {
            return ConnectionTarget::resolve(&raw, local_hosts);
        }

        match self.get_connection(None) {
            Some(conn) => connection_target(conn, local_hosts),
            None => Err(ScratchError::config(format!(
                "No database configured. Pass a connection string, set {DATABASE_URL_ENV}, \
                 or add [connections.default] to the config file"
            ))),
        }
    }
}

fn connection_target(conn: &ConnectionConfig, local_hosts: &[String]) -> Result<ConnectionTarget> {
    let target = ConnectionTarget::resolve(&conn.url, local_hosts)?;
    Ok(if conn.local { target.local() } else { target })
}
