use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

/// A Dolt repository on disk.
#[derive(Debug, Clone)]
pub struct Dolt {
    repo_dir: PathBuf,
    binary: PathBuf,
}

impl Dolt {
    /// Handle for an existing repository; nothing is checked until used.
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            binary: PathBuf::from("dolt"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run `dolt init` in `repo_dir`, creating the directory if needed.
    pub async fn init(repo_dir: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Result<Self> {
        let dolt = Self::new(repo_dir).with_binary(binary);
        tokio::fs::create_dir_all(&dolt.repo_dir).await?;

        let output = Command::new(&dolt.binary)
            .arg("init")
            .current_dir(&dolt.repo_dir)
            .output()
            .await
            .map_err(|e| {
                Error::ServerStart(format!("cannot run {}: {e}", dolt.binary.display()))
            })?;
        if !output.status.success() {
            return Err(Error::ServerStart(format!(
                "dolt init failed in {}: {}",
                dolt.repo_dir.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!("Initialised Dolt repository in {}", dolt.repo_dir.display());
        Ok(dolt)
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// The repository's `.dolt` metadata directory.
    pub fn dolt_dir(&self) -> PathBuf {
        self.repo_dir.join(".dolt")
    }

    /// SQL database name the server exposes for this repository.
    pub fn database_name(&self) -> String {
        self.repo_dir
            .file_name()
            .map(|name| name.to_string_lossy().replace('-', "_"))
            .unwrap_or_default()
    }

    /// Fail unless the directory holds an initialised repository.
    pub fn validate(&self) -> Result<()> {
        if !self.dolt_dir().is_dir() {
            return Err(Error::Config(format!(
                "{} is not a Dolt repository",
                self.repo_dir.display()
            )));
        }
        if self.database_name().is_empty() {
            return Err(Error::Config(format!(
                "cannot derive a database name from {}",
                self.repo_dir.display()
            )));
        }
        Ok(())
    }
}
