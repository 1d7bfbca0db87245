//! HTTP client for a running command server.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::protocol::{Command, Envelope};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Bound for the control endpoints; `/command` waits as long as the handler does
const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ControlClient {
    port: u16,
    base: String,
    http: reqwest::Client,
}

impl ControlClient {
    pub fn new(port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::infrastructure(format!("Cannot build HTTP client: {}", e)))?;
        Ok(Self {
            port,
            base: format!("http://127.0.0.1:{}", port),
            http,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn unreachable(&self, err: reqwest::Error) -> Error {
        if err.is_connect() || err.is_timeout() {
            Error::infrastructure(format!(
                "No session server on port {} ({}). Start one with `webpilot session start`",
                self.port, err
            ))
        } else {
            Error::infrastructure(format!("Request to port {} failed: {}", self.port, err))
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::infrastructure(format!("Malformed reply from port {}: {}", self.port, e)))
    }

    /// `GET /status`
    pub async fn status(&self) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/status", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.read_json(response).await
    }

    /// Whether anything answers `/status` on the port
    pub async fn is_alive(&self) -> bool {
        self.status().await.is_ok()
    }

    /// `POST /shutdown`
    pub async fn shutdown(&self) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/shutdown", self.base))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.read_json(response).await
    }

    /// Post a raw envelope; `{success: false}` replies become errors.
    pub async fn send(&self, envelope: &Envelope) -> Result<Value> {
        debug!("POST /command {}", envelope.action);
        let response = self
            .http
            .post(format!("{}/command", self.base))
            .json(envelope)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let reply = self.read_json(response).await?;

        if reply.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(reply);
        }
        let message = reply
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("command failed without an error message");
        Err(Error::from_reply(reply.get("kind").and_then(Value::as_str), message))
    }

    pub async fn command(&self, command: &Command) -> Result<Value> {
        // Adjacent tagging already produces the {action, params} envelope
        let envelope: Envelope = serde_json::from_value(serde_json::to_value(command)?)?;
        self.send(&envelope).await
    }
}
