//! Server configuration.
//!
//! `ServerConfig` is what callers hand to the server context. The YAML file it
//! points at is Dolt's own `sql-server` config; only the `listener` section is
//! interpreted here, everything else is passed through untouched.

pub mod duration;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;

/// Options for running a Dolt SQL server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// User the client pool connects as
    pub user: String,
    pub password: Option<String>,
    /// Path to the YAML server file
    pub config: PathBuf,
    /// Path or name of the dolt binary
    pub dolt_binary: PathBuf,
    /// Passed to `dolt sql-server --loglevel`
    pub log_level: Option<String>,
    /// How long the process must stay up after spawning to count as started
    pub startup_grace: Duration,
    /// Deadline for `verify_connection`
    pub verify_timeout: Duration,
    /// How long `stop_server` waits after SIGTERM before killing
    pub stop_timeout: Duration,
}

impl ServerConfig {
    pub fn new(user: impl Into<String>, config: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            password: None,
            config: config.into(),
            dolt_binary: PathBuf::from("dolt"),
            log_level: None,
            startup_grace: Duration::from_millis(500),
            verify_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_dolt_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.dolt_binary = binary.into();
        self
    }

    /// Check required fields and load the server file.
    pub fn load(&self) -> Result<ServerFile> {
        if self.user.trim().is_empty() {
            return Err(Error::Config("user must not be empty".to_string()));
        }
        if self.config.as_os_str().is_empty() {
            return Err(Error::Config("config path must not be empty".to_string()));
        }
        ServerFile::read(&self.config)
    }
}

/// Dolt `sql-server` YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFile {
    /// Required; a file without it is rejected
    pub listener: Option<ListenerConfig>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: None,
            other: BTreeMap::new(),
        }
    }
}

impl ServerFile {
    /// Read and validate a server file.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read server file {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate server file contents; the error is a bare message.
    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        let file: ServerFile =
            serde_yaml::from_str(contents).map_err(|e| format!("invalid YAML: {e}"))?;
        match &file.listener {
            None => return Err("missing required 'listener' section".to_string()),
            Some(listener) if listener.max_connections == Some(0) => {
                return Err("listener.max_connections must be positive".to_string())
            }
            Some(_) => {}
        }
        Ok(file)
    }

    /// The listener section. Present on every validated file.
    pub fn listener(&self) -> ListenerConfig {
        self.listener.clone().unwrap_or_default()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}
