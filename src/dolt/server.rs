//! `dolt sql-server` supervision
//!
//! A [`DoltSqlServerContext`] owns at most one running server process for one
//! repository. The lifecycle is
//!
//! ```text
//! Stopped -> Starting -> Running -> Stopping -> Stopped
//! ```
//!
//! A failed start returns to `Stopped` and releases everything it acquired.
//! Dropping the context kills a still-running child and removes the lock.

use super::lock::RepoLock;
use super::repo::Dolt;
use crate::config::{ListenerConfig, ServerConfig};
use crate::connection::{query_error, MySqlConnection, SqlConnection};
use crate::error::{Error, Result};
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lines of server output kept for error reports.
const OUTPUT_TAIL_LINES: usize = 50;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Shared ring buffer of recent server output.
#[derive(Debug, Clone, Default)]
struct OutputTail(Arc<Mutex<VecDeque<String>>>);

impl OutputTail {
    fn push(&self, line: String) {
        if let Ok(mut lines) = self.0.lock() {
            if lines.len() == OUTPUT_TAIL_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn render(&self) -> String {
        self.0
            .lock()
            .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

/// A spawned server and everything tied to its lifetime.
struct ServerProcess {
    child: Child,
    pool: Pool,
    listener: ListenerConfig,
    output: OutputTail,
    output_tasks: Vec<JoinHandle<()>>,
    _lock: RepoLock,
}

impl ServerProcess {
    fn address(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

pub struct DoltSqlServerContext {
    dolt: Dolt,
    config: ServerConfig,
    state: ServerState,
    server: Option<ServerProcess>,
}

impl DoltSqlServerContext {
    pub fn new(dolt: Dolt, config: ServerConfig) -> Self {
        Self {
            dolt,
            config,
            state: ServerState::Stopped,
            server: None,
        }
    }

    pub fn dolt(&self) -> &Dolt {
        &self.dolt
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running && self.server.is_some()
    }

    /// Address of the running server's listener.
    pub fn address(&self) -> Option<String> {
        self.server.as_ref().map(ServerProcess::address)
    }

    /// Spawn `dolt sql-server` for the repository.
    ///
    /// Configuration is validated before anything else. The call fails fast
    /// if this context already has a session, another live process holds the
    /// repository, the listener port is taken, or the process exits during
    /// the startup grace period.
    pub async fn start_server(&mut self) -> Result<()> {
        let server_file = self.config.load()?;
        self.dolt.validate()?;

        if self.state != ServerState::Stopped || self.server.is_some() {
            return Err(Error::ServerStart(format!(
                "a server session for {} is already {:?}",
                self.dolt.repo_dir().display(),
                self.state
            )));
        }

        self.state = ServerState::Starting;
        match self.spawn(server_file.listener()).await {
            Ok(server) => {
                info!(
                    "Started dolt sql-server for {} on {}",
                    self.dolt.repo_dir().display(),
                    server.address()
                );
                self.server = Some(server);
                self.state = ServerState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = ServerState::Stopped;
                Err(e)
            }
        }
    }

    async fn spawn(&self, listener: ListenerConfig) -> Result<ServerProcess> {
        let lock = RepoLock::acquire(&self.dolt.dolt_dir())?;

        if let Err(e) = tokio::net::TcpListener::bind((listener.host.as_str(), listener.port)).await
        {
            return Err(Error::ServerStart(format!(
                "cannot bind {}:{}: {e}",
                listener.host, listener.port
            )));
        }

        let mut command = Command::new(self.config.dolt_binary.as_path());
        command
            .arg("sql-server")
            .arg("--config")
            .arg(&self.config.config)
            .current_dir(self.dolt.repo_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(level) = &self.config.log_level {
            command.arg("--loglevel").arg(level);
        }

        debug!("Spawning {:?}", command.as_std());
        let mut child = command.spawn().map_err(|e| {
            Error::ServerStart(format!(
                "cannot spawn {}: {e}",
                self.config.dolt_binary.display()
            ))
        })?;

        let output = OutputTail::default();
        let mut output_tasks = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            output_tasks.push(capture(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            output_tasks.push(capture(stderr, output.clone()));
        }

        if let Ok(status) = tokio::time::timeout(self.config.startup_grace, child.wait()).await {
            // let the readers drain what the process printed
            for task in output_tasks {
                let _ = task.await;
            }
            let status = status.map(|s| s.to_string()).unwrap_or_else(|e| e.to_string());
            return Err(Error::ServerStart(format!(
                "dolt sql-server exited during startup ({status}):\n{}",
                output.render()
            )));
        }

        let pool = Pool::new(self.pool_opts(&listener));
        Ok(ServerProcess {
            child,
            pool,
            listener,
            output,
            output_tasks,
            _lock: lock,
        })
    }

    /// Pool options for the spawned server. Connections stay on the TCP
    /// listener this context started, never a local MySQL socket.
    fn pool_opts(&self, listener: &ListenerConfig) -> Opts {
        let max = listener.max_connections.unwrap_or(10).max(1) as usize;
        let constraints = PoolConstraints::new(0, max).unwrap_or_default();
        OptsBuilder::default()
            .ip_or_hostname(listener.host.clone())
            .tcp_port(listener.port)
            .prefer_socket(false)
            .user(Some(self.config.user.clone()))
            .pass(self.config.password.clone())
            .db_name(Some(self.dolt.database_name()))
            .pool_opts(PoolOpts::default().with_constraints(constraints))
            .into()
    }

    /// Wait until the server accepts a connection.
    ///
    /// Retries with exponential backoff until `verify_timeout` elapses. Each
    /// attempt is bounded by the time left, so a listener that accepts and
    /// never answers cannot hold the call past the deadline. Fails
    /// immediately if the session is not running or the process has exited.
    pub async fn verify_connection(&mut self) -> Result<()> {
        let deadline = self.config.verify_timeout;
        let Some(server) = self.server.as_mut().filter(|_| self.state == ServerState::Running)
        else {
            return Err(Error::Connection {
                address: self.dolt.repo_dir().display().to_string(),
                attempts: 0,
                elapsed: Duration::ZERO,
                last_error: "server is not running".to_string(),
            });
        };

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        let mut attempts = 0u32;
        let last_error = loop {
            attempts += 1;
            let pool = &server.pool;
            let attempt = async {
                match pool.get_conn().await {
                    Ok(conn) => MySqlConnection::from(conn)
                        .ping()
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                }
            };
            let remaining = deadline.saturating_sub(started.elapsed());
            let error = match tokio::time::timeout(remaining, attempt).await {
                Ok(Ok(())) => {
                    info!(
                        "Connected to dolt sql-server at {} after {} attempt(s)",
                        server.address(),
                        attempts
                    );
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => format!("timed out after {:?} without a handshake", started.elapsed()),
            };
            debug!("Connection attempt {} failed: {}", attempts, error);

            if let Ok(Some(status)) = server.child.try_wait() {
                break format!("server exited ({status}): {}", server.output.render());
            }
            if started.elapsed() + backoff >= deadline {
                break error;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        };

        Err(Error::Connection {
            address: server.address(),
            attempts,
            elapsed: started.elapsed(),
            last_error,
        })
    }

    /// Stop the server. Calling it with no running server is a no-op.
    pub async fn stop_server(&mut self) -> Result<()> {
        let Some(mut server) = self.server.take() else {
            debug!("No server running for {}", self.dolt.repo_dir().display());
            self.state = ServerState::Stopped;
            return Ok(());
        };
        self.state = ServerState::Stopping;

        if let Err(e) = server.pool.clone().disconnect().await {
            warn!("Failed to disconnect pool: {e}");
        }

        terminate(&mut server.child);
        match tokio::time::timeout(self.config.stop_timeout, server.child.wait()).await {
            Ok(Ok(status)) => debug!("dolt sql-server exited: {status}"),
            Ok(Err(e)) => warn!("Failed to wait for dolt sql-server: {e}"),
            Err(_) => {
                warn!(
                    "dolt sql-server did not exit within {:?}, killing it",
                    self.config.stop_timeout
                );
                if let Err(e) = server.child.kill().await {
                    warn!("Failed to kill dolt sql-server: {e}");
                }
            }
        }
        for task in server.output_tasks.drain(..) {
            task.abort();
        }

        info!("Stopped dolt sql-server for {}", self.dolt.repo_dir().display());
        drop(server);
        self.state = ServerState::Stopped;
        Ok(())
    }

    /// A pooled connection to the running server.
    pub async fn connection(&self) -> Result<MySqlConnection> {
        let server = self.server.as_ref().ok_or_else(|| Error::Connection {
            address: self.dolt.repo_dir().display().to_string(),
            attempts: 0,
            elapsed: Duration::ZERO,
            last_error: "server is not running".to_string(),
        })?;
        server
            .pool
            .get_conn()
            .await
            .map(MySqlConnection::from)
            .map_err(|e| query_error("COM_CONNECT", e))
    }
}

impl Drop for DoltSqlServerContext {
    fn drop(&mut self) {
        if let Some(mut server) = self.server.take() {
            warn!(
                "Server context for {} dropped while running, killing dolt sql-server",
                self.dolt.repo_dir().display()
            );
            if let Err(e) = server.child.start_kill() {
                debug!("Failed to kill dolt sql-server: {e}");
            }
            for task in server.output_tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Forward a child's output to the log and the tail buffer.
fn capture<R>(stream: R, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "dolt_sql_server", "{line}");
            tail.push(line);
        }
    })
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Some(pid) = child.id().and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: pid belongs to a child we have not yet reaped.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        debug!(
            "SIGTERM to {pid} failed: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
