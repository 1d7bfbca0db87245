use serde_json::{Value, json};
use tracing::info;

use super::millis;
use crate::config;
use crate::engine::HistoryStep;
use crate::errors::Result;
use crate::protocol::NavigateParams;
use crate::session::SessionState;

/// Add `https://` to bare hosts such as `example.com/path`
pub fn normalize_url(url: &str) -> String {
    let has_scheme = url.contains("://")
        || ["about:", "data:", "file:", "javascript:", "chrome:"]
            .iter()
            .any(|prefix| url.starts_with(prefix));
    if has_scheme {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

pub async fn handle_navigate(state: &mut SessionState, params: NavigateParams) -> Result<Value> {
    let page = state.page().await?;
    let driver = state.driver();
    let wait = params.wait_until.unwrap_or_default();
    let timeout = millis(params.timeout, config::DEFAULT_NAVIGATION_TIMEOUT);

    if let Some(url) = &params.url {
        let url = normalize_url(url);
        info!("Navigating to {} (wait until {})", url, wait);
        driver.navigate(&page, &url, wait, timeout).await?;
    } else {
        let step = if params.back {
            HistoryStep::Back
        } else if params.forward {
            HistoryStep::Forward
        } else {
            HistoryStep::Reload
        };
        info!("History {:?}", step);
        driver.history(&page, step, wait, timeout).await?;
    }

    // The new document has new frames
    state.reset_frame();

    let info = driver.page_info(&page).await?;
    Ok(json!({ "url": info.url, "title": info.title }))
}
