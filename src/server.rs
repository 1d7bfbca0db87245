//! HTTP command server.
//!
//! One browser session lives behind a `tokio::sync::Mutex`, so commands run
//! one at a time in arrival order while the listener keeps accepting
//! connections. Every reply to `/command` is HTTP 200; failures are reported
//! in the body as `{success: false, error, kind}`.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Map, Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::config::Paths;
use crate::engine::cdp::{CdpDriver, LaunchOptions};
use crate::errors::{Error, Result};
use crate::handlers;
use crate::profile::ProfileStore;
use crate::protocol::{Command, Envelope, ParseError};
use crate::session::SessionState;

/// Time given to the `/shutdown` reply before teardown starts
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// How `webpilot server` was invoked
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub profile: String,
    pub headless: bool,
    pub paths: Paths,
}

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<SessionState>>,
    /// URL of the active tab after the last command, served while busy
    last_url: Arc<std::sync::Mutex<Option<String>>>,
    profile: Arc<str>,
    pid: u32,
    shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(session: SessionState) -> Self {
        let profile: Arc<str> = Arc::from(session.profile_name());
        Self {
            session: Arc::new(Mutex::new(session)),
            last_url: Arc::new(std::sync::Mutex::new(None)),
            profile,
            pid: std::process::id(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn remember_url(&self, url: Option<String>) {
        if let Some(url) = url
            && let Ok(mut last) = self.last_url.lock()
        {
            *last = Some(url);
        }
    }

    fn cached_url(&self) -> Option<String> {
        self.last_url.lock().ok().and_then(|last| last.clone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/shutdown", post(shutdown))
        .route("/command", post(command))
        .with_state(state)
}

fn failure(kind: &str, error: impl Into<String>) -> Value {
    json!({ "success": false, "error": error.into(), "kind": kind })
}

fn error_reply(err: &Error) -> Value {
    failure(err.kind(), err.to_string())
}

/// `{success: true}` merged with the handler's result fields
fn success_reply(result: Value) -> Value {
    let mut reply = Map::new();
    reply.insert("success".to_string(), Value::Bool(true));
    match result {
        Value::Object(fields) => reply.extend(fields),
        Value::Null => {}
        other => {
            reply.insert("result".to_string(), other);
        }
    }
    Value::Object(reply)
}

async fn status(State(app): State<AppState>) -> Json<Value> {
    // A running command holds the session; answer from the cache instead of queueing
    let url = match app.session.try_lock() {
        Ok(session) => {
            let url = session.current_url().await;
            app.remember_url(url.clone());
            url.or_else(|| app.cached_url())
        }
        Err(_) => {
            debug!("Session busy, reporting cached URL");
            app.cached_url()
        }
    };

    Json(json!({
        "success": true,
        "status": "running",
        "url": url,
        "profile": &*app.profile,
        "pid": app.pid,
    }))
}

async fn shutdown(State(app): State<AppState>) -> Json<Value> {
    info!("Shutdown requested");
    let notify = app.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        notify.notify_one();
    });
    Json(json!({ "success": true, "message": "Server shutting down" }))
}

async fn command(State(app): State<AppState>, body: Bytes) -> Json<Value> {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Rejected malformed command body: {}", e);
            return Json(failure(
                "usage",
                format!("Request body must be a JSON object with an \"action\" field: {}", e),
            ));
        }
    };

    let command = match Command::from_envelope(envelope) {
        Ok(command) => command,
        Err(ParseError::UnknownAction(action)) => {
            warn!("Unknown action '{}'", action);
            return Json(failure("unknown_action", format!("Unknown action: {}", action)));
        }
        Err(ParseError::Params(err)) => {
            warn!("{}", err);
            return Json(error_reply(&err));
        }
    };

    let action = command.action();
    let started = Instant::now();
    let mut session = app.session.lock().await;
    let result = handlers::dispatch(&mut session, command).await;
    app.remember_url(session.current_url().await);
    drop(session);
    let elapsed = started.elapsed().as_millis();

    match result {
        Ok(result) => {
            info!("{} succeeded in {}ms", action, elapsed);
            Json(success_reply(result))
        }
        Err(err) => {
            warn!("{} failed in {}ms ({}): {}", action, elapsed, err.kind(), err);
            Json(error_reply(&err))
        }
    }
}

/// Resolves on `/shutdown`, Ctrl-C or SIGTERM
async fn shutdown_signal(notify: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = notify.notified() => {}
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Serve `session` on `listener` until shut down, then close the browser.
pub async fn serve(listener: TcpListener, session: SessionState) -> Result<()> {
    let app = AppState::new(session);
    let local = listener
        .local_addr()
        .map_err(|e| Error::infrastructure(format!("Listener has no address: {}", e)))?;
    info!("Command server listening on http://{}", local);

    axum::serve(listener, router(app.clone()))
        .with_graceful_shutdown(shutdown_signal(app.shutdown.clone()))
        .await
        .map_err(|e| Error::infrastructure(format!("Command server failed: {}", e)))?;

    info!("Stopping session");
    let mut session = app.session.lock().await;
    if let Err(e) = session.shutdown().await {
        warn!("Browser did not close cleanly: {}", e);
    }
    info!("Command server stopped");
    Ok(())
}

/// Launch the browser for `options.profile` and serve it on localhost.
pub async fn run(options: ServerOptions) -> Result<()> {
    let infra = |e: anyhow::Error| Error::infrastructure(format!("{:#}", e));
    let store = ProfileStore::new(options.paths.profiles_dir()).map_err(infra)?;
    store.ensure(&options.profile).map_err(infra)?;
    let preferences = store.preferences(&options.profile).map_err(infra)?;

    // Bind first so a taken port fails before a browser is started
    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::infrastructure(format!("Cannot listen on {}: {}", addr, e)))?;

    let driver = CdpDriver::launch(LaunchOptions {
        user_data_dir: store.user_data_dir(&options.profile),
        headless: options.headless,
        locale: preferences.locale,
        timezone: preferences.timezone,
    })
    .await?;

    let mut session = SessionState::new(Arc::new(driver), options.profile.as_str(), Some(store));
    let page = session.page().await?;
    info!("Session ready on profile '{}' (tab {})", options.profile, page);

    serve(listener, session).await
}

#[cfg(test)]
#[path = "server_test.rs"]
mod server_test;
