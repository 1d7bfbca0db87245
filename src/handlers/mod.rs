//! One handler per [`Command`] variant.
//!
//! Handlers receive the session `&mut`, drive the browser through
//! [`Driver`](crate::engine::Driver) and return the JSON object that becomes
//! the success reply (the server adds `success: true`).

pub mod capture;
pub mod cookies;
pub mod dialog;
pub mod emulate;
pub mod files;
pub mod interact;
pub mod navigate;
pub mod observe;
pub mod storage;
pub mod tabs;

use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config;
use crate::engine::{Driver, ElementState, Target};
use crate::errors::{Error, Result};
use crate::protocol::{Command, Locator};
use crate::session::SessionState;

/// Validate `command` and run its handler against the session.
pub async fn dispatch(state: &mut SessionState, command: Command) -> Result<Value> {
    command.validate()?;
    match command {
        Command::Navigate(p) => navigate::handle_navigate(state, p).await,
        Command::Click(p) => interact::handle_click(state, p).await,
        Command::Type(p) => interact::handle_type(state, p).await,
        Command::Mouse(p) => interact::handle_mouse(state, p).await,
        Command::Select(p) => interact::handle_select(state, p).await,
        Command::Scroll(p) => interact::handle_scroll(state, p).await,
        Command::Upload(p) => files::handle_upload(state, p).await,
        Command::Download(p) => files::handle_download(state, p).await,
        Command::Snapshot(p) => observe::handle_snapshot(state, p).await,
        Command::Screenshot(p) => observe::handle_screenshot(state, p).await,
        Command::Wait(p) => observe::handle_wait(state, p).await,
        Command::Check(p) => observe::handle_check(state, p).await,
        Command::Execute(p) => observe::handle_execute(state, p).await,
        Command::Tabs(p) => tabs::handle_tabs(state, p).await,
        Command::Frame(p) => tabs::handle_frame(state, p).await,
        Command::Network(p) => capture::handle_network(state, p).await,
        Command::Console(p) => capture::handle_console(state, p).await,
        Command::Emulate(p) => emulate::handle_emulate(state, p).await,
        Command::Cookies(p) => cookies::handle_cookies(state, p).await,
        Command::Storage(p) => storage::handle_storage(state, p).await,
        Command::Dialog(p) => dialog::handle_dialog(state, p).await,
    }
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

/// Poll `locator` until some match satisfies `ready`, returning its index.
async fn wait_for_element(
    driver: &dyn Driver,
    target: &Target,
    locator: &Locator,
    timeout: Duration,
    condition: &str,
    ready: impl Fn(&ElementState) -> bool,
) -> Result<(usize, ElementState)> {
    let deadline = Instant::now() + timeout;
    let mut last_error = None;
    loop {
        match polled(driver.query(target, locator).await)? {
            Ok(elements) => {
                if let Some(found) = elements.into_iter().enumerate().find(|(_, e)| ready(e)) {
                    return Ok(found);
                }
            }
            Err(message) => last_error = Some(message),
        }
        if Instant::now() >= deadline {
            let mut message = format!("{} {} within {}ms", locator, condition, timeout.as_millis());
            if let Some(last) = last_error {
                message.push_str(&format!(" (last engine error: {})", last));
            }
            return Err(Error::timeout(message));
        }
        sleep(config::POLL_INTERVAL).await;
    }
}

/// Split a poll result into fatal errors and engine errors that only mean
/// "not yet", such as a context torn down by an in-flight navigation.
fn polled<T>(result: Result<T>) -> Result<std::result::Result<T, String>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(Error::Engine(message)) => {
            debug!("Poll hit an engine error, retrying: {}", message);
            Ok(Err(message))
        }
        Err(other) => Err(other),
    }
}

fn actionable(element: &ElementState) -> bool {
    element.visible && element.enabled
}

#[cfg(test)]
#[path = "../handlers_test.rs"]
mod handlers_test;
