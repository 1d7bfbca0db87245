use serde_json::Value;
use tracing::debug;

use crate::client::ControlClient;
use crate::config::resolve_path;
use crate::errors::{Error, Result};
use crate::protocol::{Command, Envelope, ParseError};

fn absolute(raw: &str) -> String {
    resolve_path(raw).display().to_string()
}

/// Rewrite file arguments against the caller's working directory.
///
/// The server runs detached with its own working directory, so relative
/// paths must be resolved before they leave the CLI.
pub fn absolutize(command: &mut Command) {
    match command {
        Command::Screenshot(p) => p.path = Some(absolute(p.path_or_default())),
        Command::Download(p) => {
            p.output = p.output.as_deref().map(absolute);
            p.dir = p.dir.as_deref().map(absolute);
        }
        Command::Upload(p) => {
            p.files = p.files.iter().map(|f| absolute(f)).collect();
        }
        Command::Cookies(p) => p.file = p.file.as_deref().map(absolute),
        _ => {}
    }
}

/// Validate locally, then run `command` on the server at `port`.
pub async fn handle_action(port: u16, mut command: Command) -> Result<Value> {
    command.validate()?;
    absolutize(&mut command);
    debug!("Sending {} to port {}", command.action(), port);
    ControlClient::new(port)?.command(&command).await
}

/// `webpilot send <action> [params-json]`
pub async fn handle_send(port: u16, action: String, params: Option<String>) -> Result<Value> {
    let params = match params {
        Some(raw) => serde_json::from_str::<Value>(&raw)
            .map_err(|e| Error::usage(format!("params must be JSON: {}", e)))?,
        None => Value::Null,
    };
    let command = Command::from_envelope(Envelope { action, params }).map_err(|e| match e {
        ParseError::UnknownAction(action) => Error::usage(format!(
            "Unknown action: {} (expected one of {})",
            action,
            Command::ACTIONS.join(", ")
        )),
        ParseError::Params(err) => err,
    })?;
    handle_action(port, command).await
}
