//! Per-repository server lock file.
//!
//! On unix the claim is an advisory `flock` on the lock file, held for the
//! life of the [`RepoLock`]. The kernel drops it when the holder exits, so a
//! lock file left by a crashed session never blocks a new one.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = "dolt-sync-server.lock";

/// Exclusive claim on a repository for one server session. Removed on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    // released when the file closes, after `Drop` unlinks the path
    _file: File,
}

impl RepoLock {
    /// Lock the lock file in `dolt_dir` and record this process id in it.
    pub fn acquire(dolt_dir: &Path) -> Result<Self> {
        let path = dolt_dir.join(LOCK_FILE);
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            if !try_lock(&file)? {
                let holder = read_holder(&path)
                    .map(|pid| format!("pid {pid}"))
                    .unwrap_or_else(|| "unknown pid".to_string());
                return Err(Error::ServerStart(format!(
                    "repository is locked by a running server session ({holder}, {})",
                    path.display()
                )));
            }

            // the previous holder unlinks the file before unlocking it
            if !is_current(&file, &path)? {
                debug!("Server lock {} was replaced, retrying", path.display());
                continue;
            }

            if let Some(pid) = read_holder(&path) {
                warn!(pid, "Reclaiming server lock {} from an exited session", path.display());
            }
            return Self::claim(path, file);
        }
    }

    fn claim(path: PathBuf, mut file: File) -> Result<Self> {
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released server lock {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove server lock {}: {e}", self.path.display()),
        }
    }
}

fn read_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Take an exclusive lock without blocking. `Ok(false)` means another open
/// file holds it.
#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and open for the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<bool> {
    Ok(true)
}

/// Whether `file` is still the one at `path`.
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, _path: &Path) -> std::io::Result<bool> {
    Ok(true)
}
