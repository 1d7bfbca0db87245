//! # webpilot
#![allow(clippy::uninlined_format_args)]
//!
//! Long-lived browser session controller, driven over a local HTTP command
//! protocol. Designed for scripts and LLM agents that need a browser which
//! stays logged in between commands.
//!
//! ## Architecture
//!
//! - The **session server** (`webpilot server`) owns one Chromium instance
//!   over CDP and answers `GET /status`, `POST /shutdown` and
//!   `POST /command` on `127.0.0.1:<port>`. Commands run one at a time.
//! - The **supervisor** (`webpilot session ...`) starts the server detached,
//!   records it under `$WEBPILOT_HOME/sessions/` and stops it again.
//! - Every other subcommand is a thin client: it validates its arguments,
//!   sends one `{action, params}` envelope and prints the JSON reply.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Start a session with a persistent profile
//! webpilot session start --profile work
//!
//! # Drive the page
//! webpilot navigate https://example.com
//! webpilot click --text "More information"
//! webpilot type --selector "input[name=q]" --text "rust" --submit
//! webpilot snapshot --text
//!
//! # Raw protocol access
//! webpilot send wait '{"selector": "#results", "timeout": 10000}'
//!
//! # Stop the session
//! webpilot session stop
//! ```
//!
//! Replies always carry `success`. Failures add `error` and a `kind`
//! (`usage`, `not_found`, `timeout`, `engine`, `infrastructure` or
//! `unknown_action`), and the CLI exits with a matching status code.
//!
//! ## Environment
//!
//! - `WEBPILOT_HOME`: state directory (profiles, session records, logs)
//! - `WEBPILOT_PORT`: default server port (9876)
//! - `WEBPILOT_PROFILE`: default profile name
//! - `RUST_LOG`: log filter, logs always go to stderr

/// HTTP client for the command protocol
pub mod client;

/// CLI subcommand handlers
pub mod commands;

/// Constants and state directory layout
pub mod config;

/// Browser engine boundary and the CDP driver
pub mod engine;

/// Error kinds shared by the server and the CLI
pub mod errors;

/// One handler per protocol action
pub mod handlers;

/// Persistent browser profiles
pub mod profile;

/// Wire envelope and typed commands
pub mod protocol;

/// The HTTP command server
pub mod server;

/// Per-browser session state
pub mod session;

/// Background server lifecycle
pub mod supervisor;

pub use errors::{Error, Result};
pub use protocol::{Command, Envelope};
pub use session::SessionState;
