//! Defaults and on-disk layout shared by the server, the supervisor and the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the command server listens on unless `--port`/`WEBPILOT_PORT` says otherwise
pub const DEFAULT_PORT: u16 = 9876;

/// Profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

/// Viewport restored by `emulate --reset` and used for fresh sessions
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 720);

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Poll interval used while waiting for element or page conditions
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Quiet period without in-flight requests that counts as network idle
pub const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);

/// Readiness polling done by `session start`
pub const START_POLL_ATTEMPTS: u32 = 40;
pub const START_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause between stop and start in `session restart`
pub const RESTART_SETTLE: Duration = Duration::from_secs(1);

/// Resolved state directory layout (`$WEBPILOT_HOME` or the platform data dir)
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the state root from the environment
    pub fn from_env() -> Self {
        if let Some(home) = std::env::var_os("WEBPILOT_HOME").filter(|v| !v.is_empty()) {
            return Self::new(PathBuf::from(home));
        }

        let root = dirs::data_local_dir()
            .map(|dir| dir.join("webpilot"))
            .or_else(|| dirs::home_dir().map(|home| home.join(".webpilot")))
            .unwrap_or_else(|| std::env::temp_dir().join("webpilot"));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn session_record(&self, port: u16) -> PathBuf {
        self.sessions_dir().join(format!("session-{port}.json"))
    }

    pub fn server_log(&self, port: u16) -> PathBuf {
        self.logs_dir().join(format!("server-{port}.log"))
    }
}

/// Expand `~/` and make relative paths absolute against the current directory.
pub fn resolve_path(raw: &str) -> PathBuf {
    let expanded = if raw == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw))
    } else if let Some(rest) = raw.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(raw),
        }
    } else {
        PathBuf::from(raw)
    };

    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_layout_under_root() {
        let paths = Paths::new("/tmp/wp");
        assert_eq!(paths.profiles_dir(), PathBuf::from("/tmp/wp/profiles"));
        assert_eq!(
            paths.session_record(9876),
            PathBuf::from("/tmp/wp/sessions/session-9876.json")
        );
        assert_eq!(paths.server_log(1), PathBuf::from("/tmp/wp/logs/server-1.log"));
    }

    #[test]
    #[serial]
    fn test_home_override() {
        // SAFETY: serialized with the other environment tests
        unsafe { std::env::set_var("WEBPILOT_HOME", "/tmp/webpilot-home-test") };
        let paths = Paths::from_env();
        unsafe { std::env::remove_var("WEBPILOT_HOME") };
        assert_eq!(paths.root(), Path::new("/tmp/webpilot-home-test"));
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/abs/file.png"), PathBuf::from("/abs/file.png"));

        let relative = resolve_path("shots/a.png");
        assert!(relative.is_absolute());
        assert!(relative.ends_with("shots/a.png"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_path("~/x.txt"), home.join("x.txt"));
        }
    }
}
