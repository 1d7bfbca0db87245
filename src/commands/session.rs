use clap::Subcommand;
use serde_json::Value;

use super::reply;
use crate::config::{self, Paths};
use crate::errors::{Error, Result};
use crate::profile;
use crate::supervisor::{StartOutcome, Supervisor};

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Start the session server in the background
    Start {
        /// Browser profile to use
        #[arg(long, env = "WEBPILOT_PROFILE", default_value = config::DEFAULT_PROFILE)]
        profile: String,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },

    /// Stop the session server
    Stop,

    /// Show whether a session server is running
    Status,

    /// Stop, then start the session server
    Restart {
        /// Browser profile to use
        #[arg(long, env = "WEBPILOT_PROFILE", default_value = config::DEFAULT_PROFILE)]
        profile: String,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },
}

fn started(outcome: StartOutcome) -> Result<Value> {
    match outcome {
        StartOutcome::TimedOut { port, log } => Err(Error::infrastructure(format!(
            "Session server on port {} did not become ready. See {}",
            port,
            log.display()
        ))),
        outcome => reply(outcome),
    }
}

pub async fn handle_session(paths: Paths, port: u16, command: SessionCommands) -> Result<Value> {
    let supervisor = Supervisor::new(paths)?;

    match command {
        SessionCommands::Start { profile, headless } => {
            profile::validate_name(&profile).map_err(|e| Error::usage(e.to_string()))?;
            started(supervisor.start(port, &profile, headless).await?)
        }
        SessionCommands::Stop => reply(supervisor.stop(port).await?),
        SessionCommands::Status => reply(supervisor.status(port).await),
        SessionCommands::Restart { profile, headless } => {
            profile::validate_name(&profile).map_err(|e| Error::usage(e.to_string()))?;
            started(supervisor.restart(port, &profile, headless).await?)
        }
    }
}
