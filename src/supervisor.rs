//! Background server lifecycle: start, stop, status and restart.
//!
//! A missing server, a stale record or a refused connection is a state the
//! supervisor reports, never a failure. Only spawning, preparing the profile
//! and a start that never becomes ready are errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::ControlClient;
use crate::config::{self, Paths};
use crate::errors::{Error, Result};
use crate::profile::ProfileStore;

/// Pause before re-reading a record that failed to parse mid-write
const RECORD_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Persisted description of the server started on a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub pid: u32,
    pub port: u16,
    pub profile: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    AlreadyRunning { port: u16, profile: Option<String>, pid: Option<u32> },
    Started { port: u16, profile: String, pid: u32, log: PathBuf },
    TimedOut { port: u16, log: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    NotRunning { port: u16 },
    Stopped { port: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    Running {
        port: u16,
        url: Option<String>,
        pid: Option<u32>,
        profile: Option<String>,
    },
    Stopped { port: u16 },
}

impl SessionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running { .. })
    }
}

pub struct Supervisor {
    paths: Paths,
    program: PathBuf,
}

impl Supervisor {
    /// Supervise servers spawned from the current executable
    pub fn new(paths: Paths) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| Error::infrastructure(format!("Cannot locate the webpilot binary: {}", e)))?;
        Ok(Self::with_program(paths, program))
    }

    pub fn with_program(paths: Paths, program: impl Into<PathBuf>) -> Self {
        Self {
            paths,
            program: program.into(),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    // Session records

    pub fn write_record(&self, record: &SessionRecord) -> Result<()> {
        let dir = self.paths.sessions_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::infrastructure(format!("Cannot create {}: {}", dir.display(), e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| Error::infrastructure(format!("Cannot write session record: {}", e)))?;
        tmp.write_all(serde_json::to_string_pretty(record)?.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| Error::infrastructure(format!("Cannot write session record: {}", e)))?;
        let target = self.paths.session_record(record.port);
        tmp.persist(&target).map_err(|e| {
            Error::infrastructure(format!("Cannot replace {}: {}", target.display(), e))
        })?;
        debug!("Wrote session record {}", target.display());
        Ok(())
    }

    pub async fn read_record(&self, port: u16) -> Option<SessionRecord> {
        let path = self.paths.session_record(port);
        for attempt in 0..2 {
            let contents = match fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    return None;
                }
            };
            match serde_json::from_str(&contents) {
                Ok(record) => return Some(record),
                Err(e) if attempt == 0 => {
                    debug!("Session record unreadable ({}), retrying", e);
                    tokio::time::sleep(RECORD_RETRY_DELAY).await;
                }
                Err(e) => warn!("Ignoring corrupt session record {}: {}", path.display(), e),
            }
        }
        None
    }

    pub fn remove_record(&self, port: u16) {
        let path = self.paths.session_record(port);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed session record {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
        }
    }

    /// Every record on disk, live or stale
    pub async fn records(&self) -> Vec<SessionRecord> {
        let Ok(entries) = fs::read_dir(self.paths.sessions_dir()) else {
            return Vec::new();
        };
        let ports: Vec<u16> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                name.to_str()?
                    .strip_prefix("session-")?
                    .strip_suffix(".json")?
                    .parse()
                    .ok()
            })
            .collect();
        let mut records = Vec::with_capacity(ports.len());
        for port in ports {
            if let Some(record) = self.read_record(port).await {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.port);
        records
    }

    // Lifecycle

    pub async fn status(&self, port: u16) -> SessionStatus {
        let Ok(client) = ControlClient::new(port) else {
            return SessionStatus::Stopped { port };
        };
        match client.status().await {
            Ok(reply) => {
                let record = self.read_record(port).await;
                let text = |key: &str| reply.get(key).and_then(|v| v.as_str()).map(str::to_string);
                SessionStatus::Running {
                    port,
                    url: text("url"),
                    pid: reply
                        .get("pid")
                        .and_then(|v| v.as_u64())
                        .and_then(|pid| u32::try_from(pid).ok())
                        .or(record.as_ref().map(|r| r.pid)),
                    profile: text("profile").or(record.map(|r| r.profile)),
                }
            }
            Err(e) => {
                debug!("{}", e);
                SessionStatus::Stopped { port }
            }
        }
    }

    pub async fn start(&self, port: u16, profile: &str, headless: bool) -> Result<StartOutcome> {
        if let SessionStatus::Running { pid, profile, .. } = self.status(port).await {
            info!("Session already running on port {}", port);
            return Ok(StartOutcome::AlreadyRunning { port, profile, pid });
        }

        let store = ProfileStore::new(self.paths.profiles_dir())
            .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
        store
            .ensure(profile)
            .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;

        let log = self.paths.server_log(port);
        let mut child = self.spawn_server(port, profile, headless, &log)?;
        let pid = child.id();
        info!("Spawned server pid {} on port {} (log {})", pid, port, log.display());

        self.write_record(&SessionRecord {
            pid,
            port,
            profile: profile.to_string(),
            started_at: Utc::now(),
        })?;

        let client = ControlClient::new(port)?;
        for _ in 0..config::START_POLL_ATTEMPTS {
            tokio::time::sleep(config::START_POLL_INTERVAL).await;
            if client.is_alive().await {
                info!("Session ready on port {}", port);
                return Ok(StartOutcome::Started {
                    port,
                    profile: profile.to_string(),
                    pid,
                    log,
                });
            }
            if let Ok(Some(exit)) = child.try_wait() {
                self.remove_record(port);
                return Err(Error::infrastructure(format!(
                    "Server exited during startup ({}). See {}",
                    exit,
                    log.display()
                )));
            }
        }

        warn!("Server on port {} did not become ready", port);
        Ok(StartOutcome::TimedOut { port, log })
    }

    fn spawn_server(&self, port: u16, profile: &str, headless: bool, log: &Path) -> Result<std::process::Child> {
        let logs = self.paths.logs_dir();
        fs::create_dir_all(&logs)
            .map_err(|e| Error::infrastructure(format!("Cannot create {}: {}", logs.display(), e)))?;
        let out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .map_err(|e| Error::infrastructure(format!("Cannot open {}: {}", log.display(), e)))?;
        let err = out
            .try_clone()
            .map_err(|e| Error::infrastructure(format!("Cannot open {}: {}", log.display(), e)))?;

        let mut command = Command::new(&self.program);
        command
            .arg("server")
            .arg("--port")
            .arg(port.to_string())
            .arg("--profile")
            .arg(profile)
            .env("WEBPILOT_HOME", self.paths.root())
            .stdin(Stdio::null())
            .stdout(out)
            .stderr(err);
        if headless {
            command.arg("--headless");
        }

        // Detach into a new session so the server outlives the calling terminal
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no parent state
            unsafe {
                command.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(std::io::Error::from)
                });
            }
        }

        command.spawn().map_err(|e| {
            Error::infrastructure(format!(
                "Failed to spawn {}: {}",
                self.program.display(),
                e
            ))
        })
    }

    pub async fn stop(&self, port: u16) -> Result<StopOutcome> {
        let client = ControlClient::new(port)?;
        if !client.is_alive().await {
            self.remove_record(port);
            return Ok(StopOutcome::NotRunning { port });
        }

        // Any reply, or a dropped connection, counts as accepted
        if let Err(e) = client.shutdown().await {
            debug!("Shutdown request ended with: {}", e);
        }
        for _ in 0..config::START_POLL_ATTEMPTS {
            if !client.is_alive().await {
                break;
            }
            tokio::time::sleep(config::START_POLL_INTERVAL).await;
        }
        self.remove_record(port);
        info!("Stopped session on port {}", port);
        Ok(StopOutcome::Stopped { port })
    }

    pub async fn restart(&self, port: u16, profile: &str, headless: bool) -> Result<StartOutcome> {
        self.stop(port).await?;
        tokio::time::sleep(config::RESTART_SETTLE).await;
        self.start(port, profile, headless).await
    }

    /// Delete a profile unless a live server is using it.
    pub async fn delete_profile(&self, name: &str) -> Result<()> {
        for record in self.records().await {
            if record.profile == name && self.status(record.port).await.is_running() {
                return Err(Error::usage(format!(
                    "Profile '{}' is in use by the session on port {}; stop it first",
                    name, record.port
                )));
            }
        }
        let store = ProfileStore::new(self.paths.profiles_dir())
            .map_err(|e| Error::infrastructure(format!("{:#}", e)))?;
        if !store.exists(name) {
            return Err(Error::not_found(format!("Profile '{}' does not exist", name)));
        }
        store
            .delete(name)
            .map_err(|e| Error::infrastructure(format!("{:#}", e)))
    }
}

#[cfg(test)]
#[path = "supervisor_test.rs"]
mod supervisor_test;
