//! upload and download

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::interact::{ClickOptions, click_element};
use super::{millis, wait_for_element};
use crate::config::{self, resolve_path};
use crate::engine::{DownloadState, EngineEvent};
use crate::errors::{Error, Result};
use crate::protocol::{DownloadMode, DownloadParams, Locator, UploadParams};
use crate::session::SessionState;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn handle_upload(state: &mut SessionState, params: UploadParams) -> Result<Value> {
    let Some(selector) = params.selector else {
        return Err(Error::usage("upload: --selector is required"));
    };
    let files: Vec<PathBuf> = params.files.iter().map(|f| resolve_path(f)).collect();
    if let Some(missing) = files.iter().find(|f| !f.is_file()) {
        return Err(Error::not_found(format!("File not found: {}", missing.display())));
    }

    let target = state.target().await?;
    let driver = state.driver();
    let timeout = millis(params.timeout, config::DEFAULT_ACTION_TIMEOUT);
    wait_for_element(
        driver.as_ref(),
        &target,
        &Locator::Css(selector.clone()),
        timeout,
        "to exist",
        |_| true,
    )
    .await?;

    driver.set_input_files(&target, &selector, &files).await?;
    info!("Attached {} file(s) to {}", files.len(), selector);
    Ok(json!({
        "selector": selector,
        "files": files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
    }))
}

pub async fn handle_download(state: &mut SessionState, params: DownloadParams) -> Result<Value> {
    let mode = params.validate()?;
    let wait = millis(params.timeout, config::DEFAULT_NAVIGATION_TIMEOUT);

    match mode {
        DownloadMode::Url { url, output } => {
            let driver = state.driver();
            let body = driver.fetch(&url).await?;
            let path = resolve_path(&output);
            ensure_parent(&path)?;
            std::fs::write(&path, &body.bytes)?;
            info!("Saved {} ({} bytes) to {}", url, body.bytes.len(), path.display());
            Ok(json!({
                "path": path.display().to_string(),
                "bytes": body.bytes.len(),
                "status": body.status,
            }))
        }
        DownloadMode::Click { target: locator, dir } => {
            let dir = resolve_path(&dir);
            std::fs::create_dir_all(&dir)?;

            let target = state.target().await?;
            let driver = state.driver();
            driver.set_download_dir(&target.page, &dir).await?;

            // Subscribe before clicking so the download start is not missed
            let mut events = driver.events();
            let options = ClickOptions {
                timeout: config::DEFAULT_ACTION_TIMEOUT.min(wait),
                ..ClickOptions::default()
            };
            click_element(driver.as_ref(), &target, &locator, &options).await?;

            // Chromium reports downloads per frame, so the first start
            // after the click is ours whichever page it names
            let finished = async move {
                let mut started: Option<(String, String, String)> = None;
                loop {
                    let event = match events.recv().await {
                        Ok(event) => event,
                        Err(RecvError::Lagged(missed)) => {
                            warn!("Missed {} engine events while waiting for a download", missed);
                            continue;
                        }
                        Err(RecvError::Closed) => {
                            return Err(Error::engine("Browser closed while waiting for the download"));
                        }
                    };
                    match event {
                        EngineEvent::DownloadStarted {
                            page: from,
                            guid,
                            url,
                            suggested_filename,
                        } if started.is_none() => {
                            debug!("Download of {} started as {} (from {})", url, suggested_filename, from);
                            started = Some((guid, url, suggested_filename));
                        }
                        EngineEvent::DownloadProgress { guid, state, .. } => {
                            let Some((ref expected, _, _)) = started else {
                                continue;
                            };
                            if &guid != expected {
                                continue;
                            }
                            match state {
                                DownloadState::Completed => {
                                    return started.ok_or_else(|| Error::engine("Download vanished"));
                                }
                                DownloadState::Canceled => {
                                    return Err(Error::engine("Download was canceled"));
                                }
                                DownloadState::InProgress => {}
                            }
                        }
                        _ => {}
                    }
                }
            };

            let (_, url, filename) = timeout(wait, finished).await.map_err(|_| {
                Error::timeout(format!(
                    "download after clicking {} did not finish within {}ms",
                    locator,
                    wait.as_millis()
                ))
            })??;

            let path = dir.join(&filename);
            info!("Downloaded {} to {}", url, path.display());
            Ok(json!({
                "path": path.display().to_string(),
                "suggestedFilename": filename,
                "url": url,
            }))
        }
    }
}
