use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy shared by the command server, the handlers and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or conflicting command parameters (exit code 3)
    #[error("{0}")]
    Usage(String),
    /// Element, tab, frame, cookie or device does not exist (exit code 2)
    #[error("{0}")]
    NotFound(String),
    /// A wait or actionability condition was not met in time (exit code 5)
    #[error("Timed out: {0}")]
    Timeout(String),
    /// Failure reported by the browser engine (exit code 4)
    #[error("{0}")]
    Engine(String),
    /// Server unreachable, spawn failure, port in use (exit code 1)
    #[error("{0}")]
    Infrastructure(String),
}

impl Error {
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Error::Infrastructure(msg.into())
    }

    /// Tag carried in the `kind` field of a failed command reply
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Usage(_) => "usage",
            Error::NotFound(_) => "not_found",
            Error::Timeout(_) => "timeout",
            Error::Engine(_) => "engine",
            Error::Infrastructure(_) => "infrastructure",
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Infrastructure(_) => 1,
            Error::NotFound(_) => 2,
            Error::Usage(_) => 3,
            Error::Engine(_) => 4,
            Error::Timeout(_) => 5,
        }
    }

    /// Rebuild an error from a `{error, kind}` reply produced by [`Error::kind`].
    pub fn from_reply(kind: Option<&str>, message: &str) -> Self {
        let message = message.to_string();
        match kind {
            Some("usage") | Some("unknown_action") => Error::Usage(message),
            Some("not_found") => Error::NotFound(message),
            // The server already prefixed the message
            Some("timeout") => Error::Timeout(
                message
                    .strip_prefix("Timed out: ")
                    .map(str::to_string)
                    .unwrap_or(message),
            ),
            Some("infrastructure") => Error::Infrastructure(message),
            _ => Error::Engine(message),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        match err {
            chromiumoxide::error::CdpError::Timeout => Error::Timeout(err.to_string()),
            other => Error::Engine(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Engine(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Engine(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            Error::usage("u"),
            Error::not_found("n"),
            Error::timeout("t"),
            Error::engine("e"),
            Error::infrastructure("i"),
        ];
        let mut codes: Vec<i32> = errors.iter().map(Error::exit_code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_reply_round_trip_keeps_kind() {
        for err in [
            Error::usage("missing selector"),
            Error::not_found("no tab 4"),
            Error::timeout("selector #x visible"),
            Error::engine("detached frame"),
        ] {
            let rebuilt = Error::from_reply(Some(err.kind()), &err.to_string());
            assert_eq!(rebuilt.kind(), err.kind());
            assert_eq!(rebuilt.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_unknown_action_maps_to_usage() {
        let err = Error::from_reply(Some("unknown_action"), "Unknown action: fly");
        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(err.exit_code(), 3);
    }
}
