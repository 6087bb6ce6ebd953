//! Dolt repositories and the `dolt sql-server` that serves them
//!
//! A [`DoltSqlServerContext`] owns one server process for one repository.
//! While it runs, the repository is locked against other contexts in this
//! or any other process (see [`LOCK_FILE`]). Everything else here talks to
//! the running server over the MySQL protocol:
//!
//! - commit history and commit creation through `dolt_log` / `DOLT_COMMIT`
//! - row diffs between revisions through `DOLT_DIFF()`
//! - writes that land as one commit, or not at all

mod commit;
mod diff;
mod lock;
mod repo;
mod server;
mod write;

pub use commit::{commit, head, log, Commit};
pub use diff::read_table_diff;
pub use lock::{RepoLock, LOCK_FILE};
pub use repo::Dolt;
pub use server::{DoltSqlServerContext, ServerState};
pub use write::DoltTargetWriter;
