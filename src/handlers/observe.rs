//! snapshot, screenshot, wait, check and execute

use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::{millis, polled, wait_for_element};
use crate::config::{self, resolve_path};
use crate::engine::{AxEntry, ContentKind, Driver, Rect, ScreenshotSpec, Target};
use crate::errors::{Error, Result};
use crate::protocol::{
    CheckKind, CheckParams, ExecuteParams, Locator, ScreenshotParams, SnapshotParams, WaitParams,
};
use crate::session::SessionState;

/// Indented `- role "name"` outline
pub fn render_outline(entries: &[AxEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let indent = "  ".repeat(entry.depth);
            if entry.name.is_empty() {
                format!("{}- {}", indent, entry.role)
            } else {
                format!("{}- {} \"{}\"", indent, entry.role, entry.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle_snapshot(state: &mut SessionState, params: SnapshotParams) -> Result<Value> {
    let target = state.target().await?;
    let driver = state.driver();
    let selector = params.selector.as_deref();

    if params.html {
        let content = driver.content(&target, selector, ContentKind::Html).await?;
        return Ok(json!({ "format": "html", "content": content }));
    }
    if params.text {
        let content = driver.content(&target, selector, ContentKind::Text).await?;
        return Ok(json!({ "format": "text", "content": content }));
    }

    let failure = match driver.accessibility_tree(&target, selector).await {
        Ok(entries) if !entries.is_empty() => {
            return Ok(json!({
                "format": "accessibility",
                "content": render_outline(&entries),
            }));
        }
        Ok(_) => "empty accessibility tree".to_string(),
        Err(Error::Engine(message)) => message,
        Err(other) => return Err(other),
    };

    warn!("Accessibility snapshot unavailable ({}), using visible text", failure);
    let content = driver.content(&target, selector, ContentKind::Text).await?;
    Ok(json!({
        "format": "accessibility",
        "fallback": true,
        "content": content,
    }))
}

pub async fn handle_screenshot(state: &mut SessionState, params: ScreenshotParams) -> Result<Value> {
    let format = params.validate()?;
    let path = resolve_path(params.path_or_default());
    let target = state.target().await?;
    let driver = state.driver();

    let clip = match &params.selector {
        Some(selector) => Some(element_clip(driver.as_ref(), &target, selector).await?),
        None => None,
    };
    let spec = ScreenshotSpec {
        format,
        quality: params.quality,
        full_page: params.full_page,
        clip,
    };
    let bytes = driver.screenshot(&target.page, &spec).await?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &bytes)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(json!({
        "path": path.display().to_string(),
        "bytes": bytes.len(),
        "format": format,
    }))
}

/// Element box in document coordinates of the top-level page
async fn element_clip(driver: &dyn Driver, target: &Target, selector: &str) -> Result<Rect> {
    let locator = Locator::Css(selector.to_string());
    let (index, _) = wait_for_element(
        driver,
        target,
        &locator,
        config::DEFAULT_ACTION_TIMEOUT,
        "to be visible",
        |e| e.visible,
    )
    .await?;
    driver.scroll_into_view(target, &locator, index).await?;

    let bounds = driver
        .query(target, &locator)
        .await?
        .get(index)
        .and_then(|e| e.bounds)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::not_found(format!("{} has no layout box", locator)))?;
    let scroll = driver.scroll_metrics(&Target::main(target.page.clone())).await?;
    Ok(Rect {
        x: bounds.x + scroll.scroll_x,
        y: bounds.y + scroll.scroll_y,
        ..bounds
    })
}

async fn until_selector(driver: &dyn Driver, target: &Target, selector: &str, hidden: bool) -> Result<()> {
    let locator = Locator::Css(selector.to_string());
    loop {
        let Ok(elements) = polled(driver.query(target, &locator).await)? else {
            sleep(config::POLL_INTERVAL).await;
            continue;
        };
        let satisfied = if hidden {
            elements.iter().all(|e| !e.visible)
        } else {
            elements.iter().any(|e| e.visible)
        };
        if satisfied {
            return Ok(());
        }
        sleep(config::POLL_INTERVAL).await;
    }
}

async fn until_text(driver: &dyn Driver, target: &Target, text: &str) -> Result<()> {
    loop {
        let content = polled(driver.content(target, None, ContentKind::Text).await)?;
        if content.is_ok_and(|c| c.contains(text)) {
            return Ok(());
        }
        sleep(config::POLL_INTERVAL).await;
    }
}

fn describe_conditions(params: &WaitParams) -> String {
    let mut conditions = Vec::new();
    if let Some(ms) = params.ms {
        conditions.push(format!("{}ms delay", ms));
    }
    if params.network_idle {
        conditions.push("network idle".to_string());
    }
    if let Some(selector) = &params.selector {
        let state = if params.hidden { "hidden" } else { "visible" };
        conditions.push(format!("selector '{}' {}", selector, state));
    }
    if let Some(text) = &params.text {
        conditions.push(format!("text '{}'", text));
    }
    conditions.join(" or ")
}

pub async fn handle_wait(state: &mut SessionState, params: WaitParams) -> Result<Value> {
    let target = state.target().await?;
    let driver = state.driver();
    let driver = driver.as_ref();
    let limit = millis(params.timeout, config::DEFAULT_WAIT_TIMEOUT);
    let started = Instant::now();

    let selector = params.selector.clone().unwrap_or_default();
    let text = params.text.clone().unwrap_or_default();
    let race = async {
        tokio::select! {
            _ = sleep(Duration::from_millis(params.ms.unwrap_or(0))), if params.ms.is_some() => Ok("ms"),
            idle = driver.wait_for_network_idle(&target.page, config::NETWORK_IDLE_QUIET, limit), if params.network_idle => {
                idle.map(|_| "networkIdle")
            }
            found = until_selector(driver, &target, &selector, params.hidden), if params.selector.is_some() => {
                found.map(|_| "selector")
            }
            found = until_text(driver, &target, &text), if params.text.is_some() => found.map(|_| "text"),
            else => Err(Error::usage("wait: no condition given")),
        }
    };

    let condition = tokio::time::timeout(limit, race).await.map_err(|_| {
        Error::timeout(format!(
            "wait for {} not met within {}ms",
            describe_conditions(&params),
            limit.as_millis()
        ))
    })??;

    Ok(json!({
        "condition": condition,
        "elapsedMs": started.elapsed().as_millis() as u64,
    }))
}

pub async fn handle_check(state: &mut SessionState, params: CheckParams) -> Result<Value> {
    let Some(selector) = params.selector else {
        return Err(Error::usage("check: --selector is required"));
    };
    let target = state.target().await?;
    let driver = state.driver();
    let elements = driver.query(&target, &Locator::Css(selector.clone())).await?;
    let first = elements.first();
    let expected = params.expected.clone().unwrap_or_default();
    let missing = || format!("no element matches '{}'", selector);

    let (passed, details) = match params.kind {
        CheckKind::Exists => (
            !elements.is_empty(),
            format!("{} element(s) match '{}'", elements.len(), selector),
        ),
        CheckKind::Visible => match first {
            Some(e) => (e.visible, format!("element is {}", if e.visible { "visible" } else { "hidden" })),
            None => (false, missing()),
        },
        CheckKind::Hidden => match first {
            Some(e) => (!e.visible, format!("element is {}", if e.visible { "visible" } else { "hidden" })),
            None => (true, format!("{}, treated as hidden", missing())),
        },
        CheckKind::Enabled | CheckKind::Disabled => match first {
            Some(e) => (
                e.enabled == (params.kind == CheckKind::Enabled),
                format!("element is {}", if e.enabled { "enabled" } else { "disabled" }),
            ),
            None => (false, missing()),
        },
        CheckKind::Checked | CheckKind::Unchecked => match first {
            Some(e) => (
                e.checked == (params.kind == CheckKind::Checked),
                format!("element is {}", if e.checked { "checked" } else { "unchecked" }),
            ),
            None => (false, missing()),
        },
        CheckKind::Text => match first {
            Some(e) => (
                e.text.contains(&expected),
                format!("text is '{}', expected it to contain '{}'", e.text, expected),
            ),
            None => (false, missing()),
        },
        CheckKind::Value => match first {
            Some(e) => {
                let actual = e.value.clone().unwrap_or_default();
                (
                    e.value.as_deref() == Some(expected.as_str()),
                    format!("value is '{}', expected '{}'", actual, expected),
                )
            }
            None => (false, missing()),
        },
        CheckKind::Count => {
            let wanted: usize = expected.trim().parse().map_err(|_| {
                Error::usage(format!("check count: --expected must be an integer, got '{}'", expected))
            })?;
            (
                elements.len() == wanted,
                format!("{} element(s) match, expected {}", elements.len(), wanted),
            )
        }
    };

    Ok(json!({
        "passed": passed,
        "details": details,
        "kind": params.kind,
        "selector": selector,
    }))
}

/// Scripts with a statement-level `return` run as an async function body.
pub fn wrap_script(script: &str) -> String {
    if has_return_statement(script) {
        format!("(async () => {{\n{}\n}})()", script)
    } else {
        script.to_string()
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Finds a `return` keyword outside string literals and comments.
fn has_return_statement(script: &str) -> bool {
    let chars: Vec<char> = script.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            c if is_ident(c) => {
                let start = i;
                while i < chars.len() && is_ident(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let preceded_by_dot = start > 0 && chars[start - 1] == '.';
                let follows = chars.get(i).copied();
                let statement_like = follows.is_none_or(|next| {
                    next.is_whitespace() || matches!(next, ';' | '(' | '{' | '[' | '\'' | '"' | '`' | '}')
                });
                if word == "return" && !preceded_by_dot && statement_like {
                    return true;
                }
            }
            _ => i += 1,
        }
    }
    false
}

pub async fn handle_execute(state: &mut SessionState, params: ExecuteParams) -> Result<Value> {
    let Some(script) = params.script else {
        return Err(Error::usage("execute: script is required"));
    };
    let target = state.target().await?;
    let driver = state.driver();
    let result = driver.evaluate(&target, &wrap_script(&script)).await?;
    Ok(json!({ "result": result }))
}
