#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webpilot::commands::profile::ProfileCommands;
use webpilot::commands::session::SessionCommands;
use webpilot::commands::{action, profile, session};
use webpilot::config::{self, Paths};
use webpilot::errors::Error;
use webpilot::protocol::Command;
use webpilot::server::{self, ServerOptions};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "webpilot")]
#[command(about = "Drive a long-lived browser session over a local command server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Port of the session server
    #[arg(long, global = true, env = "WEBPILOT_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session server in the foreground
    Server {
        /// Browser profile to use
        #[arg(long, env = "WEBPILOT_PROFILE", default_value = config::DEFAULT_PROFILE)]
        profile: String,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,
    },

    /// Manage the background session server
    #[command(subcommand)]
    Session(SessionCommands),

    /// Manage browser profiles
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Send a raw action with JSON params
    Send {
        /// Action name
        action: String,

        /// Params as a JSON object
        params: Option<String>,
    },

    #[command(flatten)]
    Action(Command),
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(None) => std::process::exit(EXIT_SUCCESS),
        Ok(Some(output)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string())
            );
            std::process::exit(EXIT_SUCCESS)
        }
        Err(err) => {
            let (message, kind, code) = match err.downcast_ref::<Error>() {
                Some(e) => (e.to_string(), e.kind(), e.exit_code()),
                None => (format!("{:#}", err), "infrastructure", EXIT_FAILURE),
            };

            // JSON on stdout for callers, a plain line on stderr for humans
            let error_json = json!({
                "success": false,
                "error": message,
                "kind": kind,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&error_json).unwrap_or_else(|_| "{}".to_string())
            );
            eprintln!("Error: {}", message);
            std::process::exit(code);
        }
    }
}

async fn run() -> Result<Option<Value>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "webpilot=debug" } else { "webpilot=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let paths = Paths::from_env();
    let port = cli.port;

    let output = match cli.command {
        Commands::Server { profile, headless } => {
            server::run(ServerOptions {
                port,
                profile,
                headless,
                paths,
            })
            .await?;
            return Ok(None);
        }
        Commands::Session(command) => session::handle_session(paths, port, command).await?,
        Commands::Profile(command) => profile::handle_profile(paths, command).await?,
        Commands::Send { action: name, params } => action::handle_send(port, name, params).await?,
        Commands::Action(command) => action::handle_action(port, command).await?,
    };

    Ok(Some(output))
}
