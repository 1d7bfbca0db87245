//! Browser engine boundary.
//!
//! Handlers never speak CDP directly; they go through [`Driver`], which the
//! server holds as an `Arc<dyn Driver>`. The production implementation lives
//! in [`cdp`].

pub mod cdp;
pub mod devices;
#[cfg(test)]
pub mod fake;
mod scripts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::errors::Result;
use crate::protocol::{ImageFormat, LoadState, Locator, MouseButton, OptionChoice, ScrollEdge};

/// Stable identifier of a tab (the CDP target id)
pub type PageId = String;

/// Identifier of a frame inside a page
pub type FrameId = String;

/// The document a handler operates on: a page and, optionally, one of its iframes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub page: PageId,
    pub frame: Option<FrameId>,
}

impl Target {
    pub fn main(page: PageId) -> Self {
        Self { page, frame: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    #[serde(skip)]
    pub id: PageId,
    pub url: String,
    pub title: String,
}

/// A non-main frame of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    #[serde(skip)]
    pub id: FrameId,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Snapshot of one matched element, bounds in top-level viewport coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    pub tag: String,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
    pub text: String,
    pub value: Option<String>,
    pub bounds: Option<Rect>,
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Back,
    Forward,
    Reload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollOp {
    Edge(ScrollEdge),
    By { dx: f64, dy: f64 },
    IntoView(Locator),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Text,
}

/// One line of the rendered accessibility outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxEntry {
    pub depth: usize,
    pub role: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ScreenshotSpec {
    pub format: ImageFormat,
    pub quality: Option<u8>,
    pub full_page: bool,
    pub clip: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Seconds since the Unix epoch; `None` for session cookies
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

/// A cookie to create; `url` is used when no domain is known
#[derive(Debug, Clone, PartialEq)]
pub struct NewCookie {
    pub record: CookieRecord,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    Local,
    Session,
}

impl StorageArea {
    pub fn js_name(self) -> &'static str {
        match self {
            StorageArea::Local => "localStorage",
            StorageArea::Session => "sessionStorage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Get(String),
    Set(String, String),
    Delete(String),
    List,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub index: usize,
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Move,
    Down,
    Up,
    Wheel,
}

/// Raw mouse event in top-level viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseInput {
    pub kind: MouseEventKind,
    pub x: f64,
    pub y: f64,
    pub button: Option<MouseButton>,
    pub click_count: u32,
    pub delta_x: f64,
    pub delta_y: f64,
}

impl MouseInput {
    pub fn moved(x: f64, y: f64) -> Self {
        Self {
            kind: MouseEventKind::Move,
            x,
            y,
            button: None,
            click_count: 0,
            delta_x: 0.0,
            delta_y: 0.0,
        }
    }

    pub fn button(kind: MouseEventKind, x: f64, y: f64, button: MouseButton, count: u32) -> Self {
        Self {
            kind,
            x,
            y,
            button: Some(button),
            click_count: count,
            delta_x: 0.0,
            delta_y: 0.0,
        }
    }

    pub fn wheel(x: f64, y: f64, delta_x: f64, delta_y: f64) -> Self {
        Self {
            kind: MouseEventKind::Wheel,
            x,
            y,
            button: None,
            click_count: 0,
            delta_x,
            delta_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub mobile: bool,
    pub touch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ViewportSpec {
    pub fn desktop(width: u32, height: u32, scale: f64) -> Self {
        Self {
            width,
            height,
            scale,
            mobile: false,
            touch: false,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBody {
    pub status: u16,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Alert,
    Confirm,
    Prompt,
    Beforeunload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    InProgress,
    Completed,
    Canceled,
}

/// Events published by the engine to every subscriber
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Request {
        page: PageId,
        id: String,
        method: String,
        url: String,
        resource_type: Option<String>,
    },
    Response {
        page: PageId,
        id: String,
        status: i64,
        status_text: String,
        mime_type: String,
    },
    RequestFailed {
        page: PageId,
        id: String,
        error: String,
    },
    Console {
        page: PageId,
        level: String,
        text: String,
    },
    PageError {
        page: PageId,
        message: String,
    },
    Dialog {
        page: PageId,
        kind: DialogKind,
        message: String,
        default_prompt: Option<String>,
    },
    DownloadStarted {
        page: PageId,
        guid: String,
        url: String,
        suggested_filename: String,
    },
    DownloadProgress {
        page: PageId,
        guid: String,
        state: DownloadState,
    },
}

/// Cookie domain match, treating a leading dot as "this domain and subdomains"
pub fn domain_matches(cookie_domain: &str, wanted: &str) -> bool {
    let cookie = cookie_domain.trim_start_matches('.');
    let wanted = wanted.trim_start_matches('.');
    cookie.eq_ignore_ascii_case(wanted)
        || cookie
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", wanted.to_ascii_lowercase()))
}

/// Everything the command handlers need from a browser.
///
/// All coordinates are CSS pixels relative to the top-level viewport. Element
/// operations take an `index` into the list returned by [`Driver::query`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Subscribe to engine events from all tracked pages
    fn events(&self) -> broadcast::Receiver<EngineEvent>;

    /// Route dialogs of `page` to a listener instead of auto-dismissing them
    fn route_dialogs(&self, page: &PageId, to_listener: bool);

    // Pages

    /// Open pages in creation order
    async fn pages(&self) -> Result<Vec<PageInfo>>;
    async fn new_page(&self, url: Option<&str>) -> Result<PageId>;
    async fn close_page(&self, page: &PageId) -> Result<()>;
    async fn bring_to_front(&self, page: &PageId) -> Result<()>;
    async fn page_info(&self, page: &PageId) -> Result<PageInfo>;

    // Navigation

    async fn navigate(&self, page: &PageId, url: &str, wait: LoadState, timeout: Duration) -> Result<()>;
    async fn history(&self, page: &PageId, step: HistoryStep, wait: LoadState, timeout: Duration) -> Result<()>;
    async fn wait_for_network_idle(&self, page: &PageId, quiet: Duration, timeout: Duration) -> Result<()>;

    // Frames and script

    /// Frames below the main frame, depth-first
    async fn frames(&self, page: &PageId) -> Result<Vec<FrameInfo>>;
    /// Evaluate an expression and return its JSON value (promises are awaited)
    async fn evaluate(&self, target: &Target, expression: &str) -> Result<Value>;

    // Elements

    async fn query(&self, target: &Target, locator: &Locator) -> Result<Vec<ElementState>>;
    async fn scroll_into_view(&self, target: &Target, locator: &Locator, index: usize) -> Result<()>;
    async fn dom_click(&self, target: &Target, locator: &Locator, index: usize) -> Result<()>;
    /// Focus a field, optionally clearing its current value
    async fn focus(&self, target: &Target, selector: &str, clear: bool) -> Result<()>;
    async fn select_options(&self, target: &Target, selector: &str) -> Result<Vec<SelectOption>>;
    async fn choose_option(&self, target: &Target, selector: &str, choice: &OptionChoice) -> Result<SelectOption>;
    async fn set_input_files(&self, target: &Target, selector: &str, files: &[PathBuf]) -> Result<()>;
    async fn scroll(&self, target: &Target, op: &ScrollOp) -> Result<ScrollMetrics>;
    async fn scroll_metrics(&self, target: &Target) -> Result<ScrollMetrics>;

    // Observation

    async fn accessibility_tree(&self, target: &Target, selector: Option<&str>) -> Result<Vec<AxEntry>>;
    async fn content(&self, target: &Target, selector: Option<&str>, kind: ContentKind) -> Result<String>;
    async fn screenshot(&self, page: &PageId, spec: &ScreenshotSpec) -> Result<Vec<u8>>;

    // Input

    async fn mouse(&self, page: &PageId, input: MouseInput) -> Result<()>;
    async fn press_key(&self, page: &PageId, key: &str) -> Result<()>;
    async fn insert_text(&self, page: &PageId, text: &str) -> Result<()>;

    // Context state

    async fn cookies(&self) -> Result<Vec<CookieRecord>>;
    async fn set_cookies(&self, cookies: &[NewCookie]) -> Result<()>;
    /// Delete matching cookies, returning how many were removed
    async fn delete_cookies(&self, name: &str, domain: Option<&str>) -> Result<usize>;
    async fn clear_cookies(&self) -> Result<()>;
    async fn storage(&self, target: &Target, area: StorageArea, op: &StorageOp) -> Result<Value>;

    // Emulation

    /// `None` restores the default desktop viewport and user agent
    async fn emulate_viewport(&self, page: &PageId, spec: Option<&ViewportSpec>) -> Result<()>;
    async fn set_geolocation(&self, page: &PageId, location: Geolocation) -> Result<()>;

    // Network

    /// Replace the context-wide set of blocked URL globs; empty unblocks everything
    async fn set_blocked(&self, patterns: &[String]) -> Result<()>;
    /// Fetch a URL with the context's cookies
    async fn fetch(&self, url: &str) -> Result<FetchedBody>;
    async fn set_download_dir(&self, page: &PageId, dir: &Path) -> Result<()>;

    // Dialogs and lifecycle

    async fn respond_dialog(&self, page: &PageId, accept: bool, prompt_text: Option<String>) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches(".example.com", "example.com"));
        assert!(domain_matches("www.Example.com", "example.com"));
        assert!(!domain_matches("example.org", "example.com"));
        assert!(!domain_matches("badexample.com", "example.com"));
    }

    #[test]
    fn test_rect_center() {
        let rect = Rect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 50.0,
        };
        assert_eq!(rect.center(), (60.0, 45.0));
        assert!(!rect.is_empty());
        assert!(Rect::default().is_empty());
    }
}
