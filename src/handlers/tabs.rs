//! Tab table and frame selection

use serde_json::{Value, json};
use tracing::info;

use super::navigate::normalize_url;
use crate::config;
use crate::engine::FrameInfo;
use crate::errors::{Error, Result};
use crate::protocol::{FrameAction, FrameParams, FrameSelector, LoadState, TabsAction, TabsParams};
use crate::session::SessionState;

fn out_of_range(what: &str, index: usize, len: usize) -> Error {
    if len == 0 {
        Error::not_found(format!("{} index {} out of range (none open)", what, index))
    } else {
        Error::not_found(format!(
            "{} index {} out of range (0..{})",
            what,
            index,
            len - 1
        ))
    }
}

pub async fn handle_tabs(state: &mut SessionState, params: TabsParams) -> Result<Value> {
    let driver = state.driver();

    match params.action {
        TabsAction::List => {
            let active = state.page().await?;
            let pages = driver.pages().await?;
            let tabs: Vec<Value> = pages
                .iter()
                .enumerate()
                .map(|(index, page)| {
                    json!({
                        "index": index,
                        "url": page.url,
                        "title": page.title,
                        "active": page.id == active,
                    })
                })
                .collect();
            Ok(json!({ "tabs": tabs, "count": tabs.len() }))
        }
        TabsAction::New => {
            let page = driver.new_page(None).await?;
            if let Some(viewport) = state.viewport() {
                driver.emulate_viewport(&page, Some(viewport)).await?;
            }
            if let Some(url) = &params.url {
                driver
                    .navigate(&page, &normalize_url(url), LoadState::Load, config::DEFAULT_NAVIGATION_TIMEOUT)
                    .await?;
            }
            driver.bring_to_front(&page).await?;
            state.set_active_page(page.clone());

            let pages = driver.pages().await?;
            let index = pages.iter().position(|p| p.id == page).unwrap_or(pages.len());
            let info = driver.page_info(&page).await?;
            info!("Opened tab {} at {}", index, info.url);
            Ok(json!({ "index": index, "url": info.url, "title": info.title }))
        }
        TabsAction::Switch => {
            let index = params
                .index
                .ok_or_else(|| Error::usage("tabs switch: --index is required"))?;
            let pages = driver.pages().await?;
            let page = pages.get(index).ok_or_else(|| out_of_range("Tab", index, pages.len()))?;

            driver.bring_to_front(&page.id).await?;
            state.set_active_page(page.id.clone());
            info!("Switched to tab {} ({})", index, page.url);
            Ok(json!({ "index": index, "url": page.url, "title": page.title }))
        }
        TabsAction::Close => {
            let active = state.page().await?;
            let pages = driver.pages().await?;
            let index = match params.index {
                Some(index) => index,
                None => pages.iter().position(|p| p.id == active).unwrap_or(0),
            };
            let closing = pages.get(index).ok_or_else(|| out_of_range("Tab", index, pages.len()))?;

            // Closing the last window ends a headed browser, so the
            // replacement tab has to exist first
            if pages.len() == 1 {
                info!("Closing the last tab, opening a blank one first");
                let replacement = driver.new_page(None).await?;
                if let Some(viewport) = state.viewport() {
                    driver.emulate_viewport(&replacement, Some(viewport)).await?;
                }
                state.set_active_page(replacement);
            }
            driver.close_page(&closing.id).await?;
            info!("Closed tab {} ({})", index, closing.url);

            // Revalidation promotes another tab when the active one closed
            let now_active = state.page().await?;
            if closing.id == active {
                driver.bring_to_front(&now_active).await?;
            }
            let remaining = driver.pages().await?;
            let active_index = remaining.iter().position(|p| p.id == now_active);
            Ok(json!({
                "closed": index,
                "active": active_index,
                "count": remaining.len(),
            }))
        }
    }
}

fn frame_json(index: usize, frame: &FrameInfo) -> Value {
    json!({ "index": index, "name": frame.name, "url": frame.url })
}

pub async fn handle_frame(state: &mut SessionState, params: FrameParams) -> Result<Value> {
    let selector = params.validate()?;
    let driver = state.driver();

    match params.action {
        FrameAction::List => {
            let target = state.target().await?;
            let frames = driver.frames(&target.page).await?;
            let listed: Vec<Value> = frames
                .iter()
                .enumerate()
                .map(|(index, frame)| frame_json(index, frame))
                .collect();
            let active = target
                .frame
                .and_then(|id| frames.iter().position(|f| f.id == id));
            Ok(json!({ "frames": listed, "count": listed.len(), "active": active }))
        }
        FrameAction::Switch => {
            let page = state.page().await?;
            let frames = driver.frames(&page).await?;
            let selector = selector.ok_or_else(|| {
                Error::usage("frame switch: one of --index, --name, --url is required")
            })?;

            let found = match &selector {
                FrameSelector::Index(index) => frames
                    .get(*index)
                    .map(|frame| (*index, frame))
                    .ok_or_else(|| out_of_range("Frame", *index, frames.len())),
                FrameSelector::Name(name) => frames
                    .iter()
                    .enumerate()
                    .find(|(_, f)| &f.name == name)
                    .ok_or_else(|| no_frame(&format!("name '{}'", name), &frames)),
                FrameSelector::Url(fragment) => frames
                    .iter()
                    .enumerate()
                    .find(|(_, f)| f.url.contains(fragment.as_str()))
                    .ok_or_else(|| no_frame(&format!("URL containing '{}'", fragment), &frames)),
            };
            let (index, frame) = found?;
            state.set_active_frame(frame.clone());
            Ok(json!({ "frame": "iframe", "index": index, "name": frame.name, "url": frame.url }))
        }
        FrameAction::Main => {
            state.reset_frame();
            Ok(json!({ "frame": "main" }))
        }
        FrameAction::Current => {
            let target = state.target().await?;
            let Some(frame_id) = target.frame else {
                return Ok(json!({ "frame": "main" }));
            };
            let frames = driver.frames(&target.page).await?;
            let index = frames.iter().position(|f| f.id == frame_id);
            let frame = state.active_frame();
            Ok(json!({
                "frame": "iframe",
                "index": index,
                "name": frame.map(|f| f.name.clone()),
                "url": frame.map(|f| f.url.clone()),
            }))
        }
    }
}

fn no_frame(wanted: &str, frames: &[FrameInfo]) -> Error {
    if frames.is_empty() {
        return Error::not_found(format!("No frame with {}: the page has no iframes", wanted));
    }
    let available: Vec<String> = frames
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}: name '{}' url {}", i, f.name, f.url))
        .collect();
    Error::not_found(format!(
        "No frame with {} (available: {})",
        wanted,
        available.join("; ")
    ))
}
