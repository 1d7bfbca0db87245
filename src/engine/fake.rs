//! In-memory driver for unit tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use super::{
    AxEntry, ContentKind, CookieRecord, DownloadState, Driver, ElementState, EngineEvent,
    FetchedBody, FrameId, FrameInfo, Geolocation, HistoryStep, MouseEventKind, MouseInput,
    NewCookie, PageId, PageInfo, Rect, ScreenshotSpec, ScrollMetrics, ScrollOp, SelectOption,
    StorageArea, StorageOp, Target, ViewportSpec, domain_matches,
};
use crate::errors::{Error, Result};
use crate::protocol::{LoadState, Locator, OptionChoice, ScrollEdge};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub selector: String,
    pub frame: Option<FrameId>,
    pub state: ElementState,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub url: String,
    pub title: String,
    pub frames: Vec<FrameInfo>,
    pub elements: Vec<FakeElement>,
    pub html: String,
    pub text: String,
    pub scroll: ScrollMetrics,
    /// Heights reported by successive scrolls to the bottom
    pub growth: VecDeque<f64>,
    back: Vec<String>,
    forward: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    pages: Vec<(PageId, FakePage)>,
    next_id: u32,
    calls: Vec<String>,
    cookies: Vec<CookieRecord>,
    storage: BTreeMap<(PageId, &'static str), BTreeMap<String, String>>,
    blocked: Vec<String>,
    dialog_routes: HashSet<PageId>,
    dialog_responses: Vec<(PageId, bool, Option<String>)>,
    viewports: Vec<(PageId, Option<ViewportSpec>)>,
    uploads: Vec<PathBuf>,
    download_dir: Option<PathBuf>,
    pending_download: Option<(String, Vec<u8>)>,
    download_source: Option<PageId>,
    urls: BTreeMap<String, FetchedBody>,
    typed: String,
    keys: Vec<String>,
    mouse: Vec<MouseInput>,
    evaluate_result: Option<Value>,
    exits_with_last_tab: bool,
    exited: bool,
    failing_polls: u32,
}

pub struct FakeDriver {
    state: Mutex<FakeState>,
    events: broadcast::Sender<EngineEvent>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    /// A browser with a single blank tab (`page-1`)
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        let driver = Self {
            state: Mutex::new(FakeState::default()),
            events,
        };
        driver.open("about:blank");
        driver
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn open(&self, url: &str) -> PageId {
        self.with(|s| {
            s.next_id += 1;
            let id = format!("page-{}", s.next_id);
            s.pages.push((
                id.clone(),
                FakePage {
                    url: url.to_string(),
                    scroll: ScrollMetrics {
                        scroll_height: 720.0,
                        viewport_height: 720.0,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            ));
            id
        })
    }

    fn record(&self, call: impl Into<String>) {
        let call = call.into();
        self.with(|s| s.calls.push(call));
    }

    fn page_mut<R>(&self, id: &PageId, f: impl FnOnce(&mut FakePage) -> R) -> Result<R> {
        self.with(|s| {
            s.pages
                .iter_mut()
                .find(|(pid, _)| pid == id)
                .map(|(_, page)| f(page))
                .ok_or_else(|| Error::not_found(format!("Tab {} is no longer open", id)))
        })
    }

    fn matching(&self, target: &Target, locator: &Locator) -> Result<Vec<FakeElement>> {
        self.page_mut(&target.page, |page| {
            page.elements
                .iter()
                .filter(|e| e.frame == target.frame)
                .filter(|e| match locator {
                    Locator::Css(css) => &e.selector == css,
                    Locator::Text(text) => e.state.text.contains(text.as_str()),
                })
                .cloned()
                .collect()
        })
    }

    fn nth(&self, target: &Target, locator: &Locator, index: usize) -> Result<FakeElement> {
        self.matching(target, locator)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::not_found(format!("No element matches {}", locator)))
    }

    // Test setup helpers

    pub fn add_element(&self, page: &str, frame: Option<&str>, selector: &str, state: ElementState) {
        self.page_mut(&page.to_string(), |p| {
            p.elements.push(FakeElement {
                selector: selector.to_string(),
                frame: frame.map(str::to_string),
                state,
                options: Vec::new(),
            })
        })
        .unwrap();
    }

    pub fn add_select(&self, page: &str, selector: &str, options: &[(&str, &str)]) {
        self.page_mut(&page.to_string(), |p| {
            p.elements.push(FakeElement {
                selector: selector.to_string(),
                frame: None,
                state: visible_element("select", ""),
                options: options
                    .iter()
                    .enumerate()
                    .map(|(index, (value, label))| SelectOption {
                        index,
                        value: value.to_string(),
                        label: label.to_string(),
                        selected: index == 0,
                    })
                    .collect(),
            })
        })
        .unwrap();
    }

    pub fn add_frame(&self, page: &str, id: &str, name: &str, url: &str) {
        self.page_mut(&page.to_string(), |p| {
            p.frames.push(FrameInfo {
                id: id.to_string(),
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .unwrap();
    }

    pub fn remove_frames(&self, page: &str) {
        self.page_mut(&page.to_string(), |p| p.frames.clear()).unwrap();
    }

    pub fn set_text(&self, page: &str, text: &str) {
        self.page_mut(&page.to_string(), |p| p.text = text.to_string())
            .unwrap();
    }

    pub fn set_growth(&self, page: &str, heights: &[f64]) {
        self.page_mut(&page.to_string(), |p| p.growth = heights.iter().copied().collect())
            .unwrap();
    }

    /// Close a tab behind the session's back, as a page script would
    pub fn drop_page(&self, page: &str) {
        self.with(|s| s.pages.retain(|(id, _)| id != page));
    }

    pub fn serve(&self, url: &str, status: u16, body: &[u8]) {
        self.with(|s| {
            s.urls.insert(
                url.to_string(),
                FetchedBody {
                    status,
                    bytes: body.to_vec(),
                },
            )
        });
    }

    /// The next mouse release triggers a download of `filename`
    pub fn arm_download(&self, filename: &str, body: &[u8]) {
        self.with(|s| s.pending_download = Some((filename.to_string(), body.to_vec())));
    }

    /// Report armed downloads as coming from `source`, as Chromium does for
    /// a download started inside an iframe
    pub fn report_downloads_from(&self, source: &str) {
        self.with(|s| s.download_source = Some(source.to_string()));
    }

    pub fn set_evaluate_result(&self, value: Value) {
        self.with(|s| s.evaluate_result = Some(value));
    }

    /// Behave like a headed browser: closing the last tab ends the process
    pub fn exit_with_last_tab(&self) {
        self.with(|s| s.exits_with_last_tab = true);
    }

    /// The next `n` queries or content reads fail as if a navigation tore
    /// down the execution context
    pub fn fail_next_polls(&self, n: u32) {
        self.with(|s| s.failing_polls = n);
    }

    fn alive(&self) -> Result<()> {
        if self.with(|s| s.exited) {
            return Err(Error::engine("Browser closed: the connection to Chromium was lost"));
        }
        Ok(())
    }

    fn poll_failure(&self) -> Result<()> {
        let fail = self.with(|s| {
            let fail = s.failing_polls > 0;
            s.failing_polls = s.failing_polls.saturating_sub(1);
            fail
        });
        if fail {
            return Err(Error::engine(
                "Execution context was destroyed, most likely because of a navigation.",
            ));
        }
        Ok(())
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    // Inspection helpers

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.with(|s| s.pages.iter().map(|(id, _)| id.clone()).collect())
    }

    pub fn url_of(&self, page: &str) -> String {
        self.page_mut(&page.to_string(), |p| p.url.clone()).unwrap()
    }

    pub fn blocked(&self) -> Vec<String> {
        self.with(|s| s.blocked.clone())
    }

    pub fn dialog_routed(&self, page: &str) -> bool {
        self.with(|s| s.dialog_routes.contains(page))
    }

    pub fn dialog_responses(&self) -> Vec<(PageId, bool, Option<String>)> {
        self.with(|s| s.dialog_responses.clone())
    }

    pub fn viewports(&self) -> Vec<(PageId, Option<ViewportSpec>)> {
        self.with(|s| s.viewports.clone())
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.with(|s| s.uploads.clone())
    }

    pub fn typed(&self) -> String {
        self.with(|s| s.typed.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.with(|s| s.keys.clone())
    }

    pub fn mouse_events(&self) -> Vec<MouseInput> {
        self.with(|s| s.mouse.clone())
    }

    pub fn storage_items(&self, page: &str, session: bool) -> BTreeMap<String, String> {
        let area = if session { "session" } else { "local" };
        self.with(|s| s.storage.get(&(page.to_string(), area)).cloned().unwrap_or_default())
    }

    pub fn element_value(&self, page: &str, selector: &str) -> Option<String> {
        self.page_mut(&page.to_string(), |p| {
            p.elements
                .iter()
                .find(|e| e.selector == selector)
                .and_then(|e| e.state.value.clone())
        })
        .unwrap()
    }
}

/// A visible, enabled element with a 100x20 box at the origin
pub fn visible_element(tag: &str, text: &str) -> ElementState {
    ElementState {
        tag: tag.to_string(),
        visible: true,
        enabled: true,
        checked: false,
        text: text.to_string(),
        value: None,
        bounds: Some(Rect {
            x: 10.0,
            y: 10.0,
            width: 100.0,
            height: 20.0,
        }),
        multiple: false,
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn route_dialogs(&self, page: &PageId, to_listener: bool) {
        self.with(|s| {
            if to_listener {
                s.dialog_routes.insert(page.clone());
            } else {
                s.dialog_routes.remove(page);
            }
        });
    }

    async fn pages(&self) -> Result<Vec<PageInfo>> {
        self.alive()?;
        Ok(self.with(|s| {
            s.pages
                .iter()
                .map(|(id, p)| PageInfo {
                    id: id.clone(),
                    url: p.url.clone(),
                    title: p.title.clone(),
                })
                .collect()
        }))
    }

    async fn new_page(&self, url: Option<&str>) -> Result<PageId> {
        self.alive()?;
        let id = self.open(url.unwrap_or("about:blank"));
        self.record(format!("new_page {}", id));
        Ok(id)
    }

    async fn close_page(&self, page: &PageId) -> Result<()> {
        self.page_mut(page, |_| ())?;
        self.record(format!("close_page {}", page));
        self.with(|s| {
            s.pages.retain(|(id, _)| id != page);
            if s.exits_with_last_tab && s.pages.is_empty() {
                s.exited = true;
            }
        });
        Ok(())
    }

    async fn bring_to_front(&self, page: &PageId) -> Result<()> {
        self.alive()?;
        self.record(format!("bring_to_front {}", page));
        Ok(())
    }

    async fn page_info(&self, page: &PageId) -> Result<PageInfo> {
        self.alive()?;
        self.page_mut(page, |p| PageInfo {
            id: page.clone(),
            url: p.url.clone(),
            title: p.title.clone(),
        })
    }

    async fn navigate(&self, page: &PageId, url: &str, wait: LoadState, _timeout: Duration) -> Result<()> {
        if url.contains("unreachable") {
            return Err(Error::engine(format!(
                "Navigation to {} failed: net::ERR_NAME_NOT_RESOLVED",
                url
            )));
        }
        self.record(format!("navigate {} {} {}", page, url, wait));
        self.page_mut(page, |p| {
            let previous = std::mem::replace(&mut p.url, url.to_string());
            p.back.push(previous);
            p.forward.clear();
            p.title = format!("Title of {}", url);
        })
    }

    async fn history(&self, page: &PageId, step: HistoryStep, _wait: LoadState, _timeout: Duration) -> Result<()> {
        self.record(format!("history {} {:?}", page, step));
        self.page_mut(page, |p| match step {
            HistoryStep::Reload => Ok(()),
            HistoryStep::Back => {
                let url = p
                    .back
                    .pop()
                    .ok_or_else(|| Error::not_found("No history entry to go back"))?;
                let current = std::mem::replace(&mut p.url, url);
                p.forward.push(current);
                Ok(())
            }
            HistoryStep::Forward => {
                let url = p
                    .forward
                    .pop()
                    .ok_or_else(|| Error::not_found("No history entry to go forward"))?;
                let current = std::mem::replace(&mut p.url, url);
                p.back.push(current);
                Ok(())
            }
        })?
    }

    async fn wait_for_network_idle(&self, page: &PageId, _quiet: Duration, _timeout: Duration) -> Result<()> {
        self.record(format!("network_idle {}", page));
        Ok(())
    }

    async fn frames(&self, page: &PageId) -> Result<Vec<FrameInfo>> {
        self.page_mut(page, |p| p.frames.clone())
    }

    async fn evaluate(&self, target: &Target, expression: &str) -> Result<Value> {
        self.record(format!("evaluate {:?} {}", target.frame, expression));
        if expression.contains("throw") {
            return Err(Error::engine("Script error: Error: boom"));
        }
        Ok(self.with(|s| s.evaluate_result.clone()).unwrap_or(Value::Null))
    }

    async fn query(&self, target: &Target, locator: &Locator) -> Result<Vec<ElementState>> {
        if let Locator::Css(css) = locator
            && css.starts_with("!!")
        {
            return Err(Error::usage(format!("Invalid selector: {}", css)));
        }
        self.poll_failure()?;
        Ok(self
            .matching(target, locator)?
            .into_iter()
            .map(|e| e.state)
            .collect())
    }

    async fn scroll_into_view(&self, target: &Target, locator: &Locator, index: usize) -> Result<()> {
        self.nth(target, locator, index)?;
        self.record(format!("scroll_into_view {}", locator));
        Ok(())
    }

    async fn dom_click(&self, target: &Target, locator: &Locator, index: usize) -> Result<()> {
        self.nth(target, locator, index)?;
        self.record(format!("dom_click {}", locator));
        Ok(())
    }

    async fn focus(&self, target: &Target, selector: &str, clear: bool) -> Result<()> {
        self.nth(target, &Locator::Css(selector.to_string()), 0)?;
        self.record(format!("focus {} clear={}", selector, clear));
        self.page_mut(&target.page, |p| {
            if let Some(el) = p.elements.iter_mut().find(|e| e.selector == selector) {
                if clear {
                    el.state.value = Some(String::new());
                }
            }
        })
    }

    async fn select_options(&self, target: &Target, selector: &str) -> Result<Vec<SelectOption>> {
        let el = self.nth(target, &Locator::Css(selector.to_string()), 0)?;
        if el.state.tag != "select" {
            return Err(Error::not_found(format!("Element '{}' is not a <select>", selector)));
        }
        Ok(el.options)
    }

    async fn choose_option(&self, target: &Target, selector: &str, choice: &OptionChoice) -> Result<SelectOption> {
        let options = self.select_options(target, selector).await?;
        let pick = options
            .iter()
            .find(|o| match choice {
                OptionChoice::Value(v) => &o.value == v,
                OptionChoice::Label(l) => &o.label == l,
                OptionChoice::Index(i) => o.index == *i,
            })
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No option matching {:?} in {}", choice, selector)))?;
        self.page_mut(&target.page, |p| {
            if let Some(el) = p.elements.iter_mut().find(|e| e.selector == selector) {
                for option in &mut el.options {
                    option.selected = option.index == pick.index;
                }
            }
        })?;
        Ok(SelectOption {
            selected: true,
            ..pick
        })
    }

    async fn set_input_files(&self, target: &Target, selector: &str, files: &[PathBuf]) -> Result<()> {
        self.nth(target, &Locator::Css(selector.to_string()), 0)?;
        self.with(|s| s.uploads.extend(files.iter().cloned()));
        Ok(())
    }

    async fn scroll(&self, target: &Target, op: &ScrollOp) -> Result<ScrollMetrics> {
        if let ScrollOp::IntoView(locator) = op {
            self.nth(target, locator, 0)?;
        }
        self.record(format!("scroll {:?}", op));
        self.page_mut(&target.page, |p| {
            match op {
                ScrollOp::Edge(ScrollEdge::Top) => p.scroll.scroll_y = 0.0,
                ScrollOp::Edge(ScrollEdge::Bottom) => {
                    if let Some(height) = p.growth.pop_front() {
                        p.scroll.scroll_height = height;
                    }
                    p.scroll.scroll_y = (p.scroll.scroll_height - p.scroll.viewport_height).max(0.0);
                }
                ScrollOp::By { dx, dy } => {
                    p.scroll.scroll_x += dx;
                    p.scroll.scroll_y += dy;
                }
                ScrollOp::IntoView(_) => {}
            }
            p.scroll
        })
    }

    async fn scroll_metrics(&self, target: &Target) -> Result<ScrollMetrics> {
        self.page_mut(&target.page, |p| p.scroll)
    }

    async fn accessibility_tree(&self, target: &Target, selector: Option<&str>) -> Result<Vec<AxEntry>> {
        if let Some(selector) = selector {
            self.nth(target, &Locator::Css(selector.to_string()), 0)?;
        }
        self.page_mut(&target.page, |p| {
            if p.text.contains("no-ax") {
                return Err(Error::engine("Accessibility domain unavailable"));
            }
            let mut entries = vec![AxEntry {
                depth: 0,
                role: "document".into(),
                name: p.title.clone(),
            }];
            entries.extend(p.elements.iter().filter(|e| e.frame == target.frame).map(|e| AxEntry {
                depth: 1,
                role: e.state.tag.clone(),
                name: e.state.text.clone(),
            }));
            Ok(entries)
        })?
    }

    async fn content(&self, target: &Target, selector: Option<&str>, kind: ContentKind) -> Result<String> {
        self.poll_failure()?;
        if let Some(selector) = selector {
            let el = self.nth(target, &Locator::Css(selector.to_string()), 0)?;
            return Ok(match kind {
                ContentKind::Html => format!("<{0}>{1}</{0}>", el.state.tag, el.state.text),
                ContentKind::Text => el.state.text,
            });
        }
        self.page_mut(&target.page, |p| match kind {
            ContentKind::Html => {
                if p.html.is_empty() {
                    format!("<html><body>{}</body></html>", p.text)
                } else {
                    p.html.clone()
                }
            }
            ContentKind::Text => p.text.clone(),
        })
    }

    async fn screenshot(&self, page: &PageId, spec: &ScreenshotSpec) -> Result<Vec<u8>> {
        self.record(format!(
            "screenshot {} {:?} full={} clip={}",
            page,
            spec.format,
            spec.full_page,
            spec.clip.is_some()
        ));
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn mouse(&self, page: &PageId, input: MouseInput) -> Result<()> {
        self.page_mut(page, |_| ())?;
        self.with(|s| s.mouse.push(input));
        if input.kind == MouseEventKind::Up {
            let pending = self.with(|s| {
                let dir = s.download_dir.clone();
                let source = s.download_source.clone().unwrap_or_else(|| page.clone());
                s.pending_download.take().map(|d| (d, dir, source))
            });
            if let Some(((filename, body), dir, source)) = pending {
                if let Some(dir) = dir {
                    std::fs::write(dir.join(&filename), body)?;
                }
                self.emit(EngineEvent::DownloadStarted {
                    page: source.clone(),
                    guid: "download-1".into(),
                    url: format!("https://files.test/{}", filename),
                    suggested_filename: filename,
                });
                self.emit(EngineEvent::DownloadProgress {
                    page: source,
                    guid: "download-1".into(),
                    state: DownloadState::Completed,
                });
            }
        }
        Ok(())
    }

    async fn press_key(&self, page: &PageId, key: &str) -> Result<()> {
        self.page_mut(page, |_| ())?;
        self.with(|s| s.keys.push(key.to_string()));
        Ok(())
    }

    async fn insert_text(&self, page: &PageId, text: &str) -> Result<()> {
        self.page_mut(page, |_| ())?;
        self.with(|s| s.typed.push_str(text));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        Ok(self.with(|s| s.cookies.clone()))
    }

    async fn set_cookies(&self, cookies: &[NewCookie]) -> Result<()> {
        self.with(|s| {
            for cookie in cookies {
                let mut record = cookie.record.clone();
                if record.domain.is_empty()
                    && let Some(host) = cookie
                        .url
                        .as_deref()
                        .and_then(|u| url::Url::parse(u).ok())
                        .and_then(|u| u.host_str().map(str::to_string))
                {
                    record.domain = host;
                }
                if record.path.is_empty() {
                    record.path = "/".into();
                }
                s.cookies.retain(|c| {
                    !(c.name == record.name && c.domain == record.domain && c.path == record.path)
                });
                s.cookies.push(record);
            }
        });
        Ok(())
    }

    async fn delete_cookies(&self, name: &str, domain: Option<&str>) -> Result<usize> {
        Ok(self.with(|s| {
            let before = s.cookies.len();
            s.cookies.retain(|c| {
                !(c.name == name && domain.is_none_or(|d| domain_matches(&c.domain, d)))
            });
            before - s.cookies.len()
        }))
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.with(|s| s.cookies.clear());
        Ok(())
    }

    async fn storage(&self, target: &Target, area: StorageArea, op: &StorageOp) -> Result<Value> {
        let key = (
            target.page.clone(),
            match area {
                StorageArea::Local => "local",
                StorageArea::Session => "session",
            },
        );
        Ok(self.with(|s| {
            let store = s.storage.entry(key).or_default();
            match op {
                StorageOp::Get(k) => store.get(k).map(|v| json!(v)).unwrap_or(Value::Null),
                StorageOp::Set(k, v) => {
                    store.insert(k.clone(), v.clone());
                    json!(v)
                }
                StorageOp::Delete(k) => json!(store.remove(k).is_some()),
                StorageOp::List => json!(store),
                StorageOp::Clear => {
                    let count = store.len();
                    store.clear();
                    json!(count)
                }
            }
        }))
    }

    async fn emulate_viewport(&self, page: &PageId, spec: Option<&ViewportSpec>) -> Result<()> {
        self.page_mut(page, |_| ())?;
        self.with(|s| s.viewports.push((page.clone(), spec.cloned())));
        Ok(())
    }

    async fn set_geolocation(&self, page: &PageId, location: Geolocation) -> Result<()> {
        self.record(format!(
            "geolocation {} {} {}",
            page, location.latitude, location.longitude
        ));
        Ok(())
    }

    async fn set_blocked(&self, patterns: &[String]) -> Result<()> {
        self.with(|s| s.blocked = patterns.to_vec());
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        let body = self
            .with(|s| s.urls.get(url).cloned())
            .ok_or_else(|| Error::engine(format!("Request to {} failed: connection refused", url)))?;
        if body.status >= 400 {
            return Err(Error::engine(format!("HTTP {} fetching {}", body.status, url)));
        }
        Ok(body)
    }

    async fn set_download_dir(&self, page: &PageId, dir: &Path) -> Result<()> {
        self.record(format!("download_dir {}", page));
        self.with(|s| s.download_dir = Some(dir.to_path_buf()));
        Ok(())
    }

    async fn respond_dialog(&self, page: &PageId, accept: bool, prompt_text: Option<String>) -> Result<()> {
        self.with(|s| s.dialog_responses.push((page.clone(), accept, prompt_text)));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.record("shutdown");
        Ok(())
    }
}
