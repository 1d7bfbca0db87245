//! Chromium driver over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::{
    accessibility, browser as cdp_browser, dom, emulation, fetch, input, network,
    page as cdp_page,
};
use chromiumoxide::cdp::js_protocol::runtime;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use dashmap::{DashMap, DashSet};
use futures::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scripts;
use super::{
    AxEntry, ContentKind, CookieRecord, Driver, ElementState, EngineEvent, FetchedBody,
    FrameInfo, Geolocation, HistoryStep, MouseEventKind, MouseInput, NewCookie, PageId,
    PageInfo, ScreenshotSpec, ScrollMetrics, ScrollOp, SelectOption, StorageArea, StorageOp,
    Target, ViewportSpec, domain_matches,
};
use super::{DialogKind, DownloadState};
use crate::config;
use crate::errors::{Error, Result};
use crate::protocol::{ImageFormat, LoadState, Locator, MouseButton, OptionChoice};

const EVENT_CAPACITY: usize = 4096;
const ISOLATED_WORLD: &str = "webpilot";
/// How long a frame's page world may take to announce itself
const CONTEXT_WAIT: Duration = Duration::from_millis(500);

/// Browser launch settings
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Applied to every page at attach time
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Default)]
struct InFlight {
    requests: HashSet<String>,
    last_activity: Option<Instant>,
}

impl InFlight {
    /// Track a request. Returns `false` when the id is already in flight,
    /// which is how redirect hops arrive.
    fn begin(&mut self, request: &str, now: Instant) -> bool {
        self.last_activity = Some(now);
        self.requests.insert(request.to_string())
    }

    fn settle(&mut self, request: &str, now: Instant) {
        self.requests.remove(request);
        self.last_activity = Some(now);
    }

    /// Quiet time so far, zero while anything is in flight
    fn idle(&self, now: Instant) -> Duration {
        if !self.requests.is_empty() {
            return Duration::ZERO;
        }
        self.last_activity
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::MAX)
    }
}

/// `(page, frame)`
type FrameKey = (PageId, String);

/// State shared with the per-page event pumps
struct Shared {
    events: broadcast::Sender<EngineEvent>,
    inflight: DashMap<PageId, InFlight>,
    dialog_routes: DashSet<PageId>,
    /// Page world of each frame, as announced by `Runtime.executionContextCreated`
    frame_contexts: DashMap<FrameKey, runtime::ExecutionContextId>,
    /// Our isolated world in each frame
    worlds: DashMap<FrameKey, runtime::ExecutionContextId>,
}

impl Shared {
    fn new(events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            events,
            inflight: DashMap::new(),
            dialog_routes: DashSet::new(),
            frame_contexts: DashMap::new(),
            worlds: DashMap::new(),
        }
    }

    fn forget_page(&self, page: &PageId) {
        self.inflight.remove(page);
        self.dialog_routes.remove(page);
        self.forget_contexts(page);
    }

    /// Every context of the page is gone, as after a navigation
    fn forget_contexts(&self, page: &PageId) {
        self.frame_contexts.retain(|(owner, _), _| owner != page);
        self.worlds.retain(|(owner, _), _| owner != page);
    }

    fn forget_context(&self, page: &PageId, context: runtime::ExecutionContextId) {
        self.frame_contexts
            .retain(|(owner, _), id| !(owner == page && *id == context));
        self.worlds
            .retain(|(owner, _), id| !(owner == page && *id == context));
    }

    fn forget_frame(&self, page: &PageId, frame: &str) {
        let key = (page.clone(), frame.to_string());
        self.frame_contexts.remove(&key);
        self.worlds.remove(&key);
    }

    /// Page owning `frame`. Unknown frames map to themselves, which is right
    /// for a main frame since it shares its target's id.
    fn frame_owner(&self, frame: &str) -> PageId {
        self.frame_contexts
            .iter()
            .find(|entry| entry.key().1 == frame)
            .map(|entry| entry.key().0.clone())
            .unwrap_or_else(|| frame.to_string())
    }
}

/// Which world a frame script runs in
#[derive(Debug, Clone, Copy, PartialEq)]
enum Realm {
    /// The document's own globals, for user scripts
    Page,
    /// Our isolated world, for the helper scripts
    Isolated,
}

struct TrackedPage {
    id: PageId,
    page: Page,
    pump: JoinHandle<()>,
}

pub struct CdpDriver {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    pages: Mutex<Vec<TrackedPage>>,
    shared: Arc<Shared>,
    downloads: JoinHandle<()>,
    /// Closed tabs whose targets the browser may still list
    closing: DashSet<PageId>,
    blocked: std::sync::Mutex<Vec<String>>,
    options: LaunchOptions,
    default_user_agent: String,
    http: reqwest::Client,
}

impl CdpDriver {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let (width, height) = config::DEFAULT_VIEWPORT;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&options.user_data_dir)
            .window_size(width, height)
            .viewport(None)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(chrome) = std::env::var_os("CHROME") {
            builder = builder.chrome_executable(PathBuf::from(chrome));
        }
        let browser_config = builder
            .build()
            .map_err(|e| Error::infrastructure(format!("Invalid browser configuration: {}", e)))?;

        info!(
            "Launching browser (profile dir {}, headless: {})",
            options.user_data_dir.display(),
            options.headless
        );
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::infrastructure(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("CDP handler error: {}", err);
                }
            }
            debug!("CDP handler finished");
        });

        let default_user_agent = browser.version().await?.user_agent;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared::new(events));
        let downloads = tokio::spawn(run_download_pump(
            shared.clone(),
            subscribe_downloads(&browser).await?,
        ));
        let driver = Self {
            browser: Mutex::new(browser),
            handler,
            pages: Mutex::new(Vec::new()),
            shared,
            downloads,
            closing: DashSet::new(),
            blocked: std::sync::Mutex::new(Vec::new()),
            options,
            default_user_agent,
            http: reqwest::Client::new(),
        };

        // The initial tab shows up shortly after launch
        for _ in 0..5 {
            if !driver.pages().await?.is_empty() {
                return Ok(driver);
            }
            tokio::time::sleep(config::POLL_INTERVAL).await;
        }
        driver.new_page(None).await?;
        Ok(driver)
    }

    /// Sync the tracked list with the browser, keeping creation order.
    async fn refresh(&self) -> Result<()> {
        let live = self.browser.lock().await.pages().await?;
        let live_ids: HashSet<PageId> = live.iter().map(page_id).collect();

        let mut tracked = self.pages.lock().await;
        tracked.retain(|t| {
            let keep = live_ids.contains(&t.id);
            if !keep {
                t.pump.abort();
                self.shared.forget_page(&t.id);
            }
            keep
        });
        self.closing.retain(|id| live_ids.contains(id));
        for page in live {
            let id = page_id(&page);
            if self.closing.contains(&id) {
                debug!("Skipping tab {} while it closes", id);
                continue;
            }
            if !tracked.iter().any(|t| t.id == id) {
                let pump = self.attach(&id, &page).await?;
                tracked.push(TrackedPage { id, page, pump });
            }
        }
        Ok(())
    }

    /// Enable the domains we listen on and start the event pump for a page.
    async fn attach(&self, id: &PageId, page: &Page) -> Result<JoinHandle<()>> {
        // Listen first: re-enabling Runtime replays the existing contexts
        let events = subscribe(page).await?;
        page.execute(network::EnableParams::default()).await?;
        page.execute(runtime::DisableParams::default()).await?;
        page.execute(runtime::EnableParams::default()).await?;
        page.execute(cdp_page::EnableParams::default()).await?;

        let patterns = self.blocked_patterns();
        if !patterns.is_empty() {
            apply_blocking(page, &patterns).await?;
        }
        if let Some(locale) = &self.options.locale {
            let params = emulation::SetLocaleOverrideParams::builder()
                .locale(locale.clone())
                .build();
            if let Err(err) = page.execute(params).await {
                warn!("Could not apply locale {}: {}", locale, err);
            }
        }
        if let Some(timezone) = &self.options.timezone
            && let Err(err) = page
                .execute(emulation::SetTimezoneOverrideParams::new(timezone.clone()))
                .await
        {
            warn!("Could not apply timezone {}: {}", timezone, err);
        }

        debug!("Attached event pump to page {}", id);
        Ok(tokio::spawn(run_pump(
            page.clone(),
            id.clone(),
            self.shared.clone(),
            events,
        )))
    }

    async fn page(&self, id: &PageId) -> Result<Page> {
        if let Some(page) = self.find_tracked(id).await {
            return Ok(page);
        }
        self.refresh().await?;
        self.find_tracked(id)
            .await
            .ok_or_else(|| Error::not_found(format!("Tab {} is no longer open", id)))
    }

    async fn find_tracked(&self, id: &PageId) -> Option<Page> {
        self.pages
            .lock()
            .await
            .iter()
            .find(|t| &t.id == id)
            .map(|t| t.page.clone())
    }

    /// Any open page, for context-wide commands that still need a session
    async fn any_page(&self) -> Result<Page> {
        if let Some(t) = self.pages.lock().await.first() {
            return Ok(t.page.clone());
        }
        self.refresh().await?;
        self.pages
            .lock()
            .await
            .first()
            .map(|t| t.page.clone())
            .ok_or_else(|| Error::engine("No open page"))
    }

    fn blocked_patterns(&self) -> Vec<String> {
        self.blocked
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    async fn evaluate_in(
        &self,
        page: &Page,
        expression: &str,
        context: Option<runtime::ExecutionContextId>,
        by_value: bool,
    ) -> Result<runtime::RemoteObject> {
        let mut builder = runtime::EvaluateParams::builder()
            .expression(expression)
            .return_by_value(by_value)
            .await_promise(true)
            .user_gesture(true);
        if let Some(context) = context {
            builder = builder.context_id(context);
        }
        let params = builder.build().map_err(Error::engine)?;
        let reply = page.execute(params).await?;
        if let Some(details) = &reply.exception_details {
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            if message.contains("Invalid selector") {
                return Err(Error::usage(first_line(&message)));
            }
            return Err(Error::engine(format!(
                "Script error: {}",
                first_line(&message)
            )));
        }
        Ok(reply.result.result.clone())
    }

    async fn world(&self, page: &Page, key: &FrameKey) -> Result<runtime::ExecutionContextId> {
        if let Some(id) = self.shared.worlds.get(key) {
            return Ok(*id);
        }
        let params = cdp_page::CreateIsolatedWorldParams::builder()
            .frame_id(cdp_page::FrameId::new(key.1.clone()))
            .world_name(ISOLATED_WORLD)
            .build()
            .map_err(Error::engine)?;
        let reply = page.execute(params).await?;
        let id = reply.execution_context_id;
        self.shared.worlds.insert(key.clone(), id);
        Ok(id)
    }

    /// The frame's own page world, once its pump has seen it created
    async fn page_world(&self, key: &FrameKey) -> Option<runtime::ExecutionContextId> {
        let deadline = Instant::now() + CONTEXT_WAIT;
        loop {
            if let Some(id) = self.shared.frame_contexts.get(key) {
                return Some(*id);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(config::POLL_INTERVAL).await;
        }
    }

    async fn context(&self, page: &Page, key: &FrameKey, realm: Realm) -> Result<runtime::ExecutionContextId> {
        if realm == Realm::Page {
            if let Some(id) = self.page_world(key).await {
                return Ok(id);
            }
            warn!(
                "No page world seen for frame {}, running the script isolated",
                key.1
            );
        }
        self.world(page, key).await
    }

    /// Evaluate in the target document, retrying once on a stale context.
    async fn remote(
        &self,
        target: &Target,
        expression: &str,
        by_value: bool,
        realm: Realm,
    ) -> Result<runtime::RemoteObject> {
        let page = self.page(&target.page).await?;
        let Some(frame) = &target.frame else {
            return self.evaluate_in(&page, expression, None, by_value).await;
        };

        let key = (target.page.clone(), frame.clone());
        let context = self.context(&page, &key, realm).await?;
        match self.evaluate_in(&page, expression, Some(context), by_value).await {
            Err(Error::Engine(msg)) if msg.contains("context") => {
                debug!("Context {:?} for frame {} went stale", context, frame);
                self.shared.forget_context(&target.page, context);
                let context = self.context(&page, &key, realm).await?;
                self.evaluate_in(&page, expression, Some(context), by_value)
                    .await
            }
            other => other,
        }
    }

    /// Run a helper script and decode its `{ok}` payload.
    async fn script<T: DeserializeOwned>(&self, target: &Target, expression: String) -> Result<T> {
        let object = self.remote(target, &expression, true, Realm::Isolated).await?;
        let ok = scripts::unwrap_reply(object.value.unwrap_or(Value::Null))?;
        Ok(serde_json::from_value(ok)?)
    }

    async fn element_object(&self, target: &Target, selector: &str) -> Result<runtime::RemoteObjectId> {
        let object = self
            .remote(target, &scripts::element(selector), false, Realm::Isolated)
            .await?;
        object
            .object_id
            .ok_or_else(|| Error::not_found(format!("No element matches selector '{}'", selector)))
    }

    /// Top-left corner of a frame's content box in top-level viewport coordinates
    async fn frame_offset(&self, page: &Page, frame: &str) -> Result<(f64, f64)> {
        let owner = page
            .execute(dom::GetFrameOwnerParams::new(cdp_page::FrameId::new(frame)))
            .await?;
        let model = page
            .execute(
                dom::GetBoxModelParams::builder()
                    .backend_node_id(owner.backend_node_id.clone())
                    .build(),
            )
            .await?;
        let quad = model.model.content.inner();
        match (quad.first(), quad.get(1)) {
            (Some(x), Some(y)) => Ok((*x, *y)),
            _ => Err(Error::engine(format!("Frame {} has no layout box", frame))),
        }
    }

    async fn wait_loaded(
        &self,
        id: &PageId,
        mut load: BoxStream<'static, ()>,
        mut dom_ready: BoxStream<'static, ()>,
        wait: LoadState,
        same_document: bool,
        timeout: Duration,
    ) -> Result<()> {
        if same_document {
            return Ok(());
        }
        let started = Instant::now();
        match wait {
            LoadState::Commit => {}
            LoadState::Domcontentloaded => {
                dom_ready.next().await;
            }
            LoadState::Load => {
                load.next().await;
            }
            LoadState::Networkidle => {
                load.next().await;
                let remaining = timeout.saturating_sub(started.elapsed());
                self.wait_for_network_idle(id, config::NETWORK_IDLE_QUIET, remaining)
                    .await?;
            }
        }
        Ok(())
    }

    async fn load_streams(&self, page: &Page) -> Result<(BoxStream<'static, ()>, BoxStream<'static, ()>)> {
        let load = page
            .event_listener::<cdp_page::EventLoadEventFired>()
            .await?
            .map(|_| ())
            .boxed();
        let dom_ready = page
            .event_listener::<cdp_page::EventDomContentEventFired>()
            .await?
            .map(|_| ())
            .boxed();
        Ok((load, dom_ready))
    }

    fn idle_for(&self, id: &PageId) -> Duration {
        self.shared
            .inflight
            .get(id)
            .map(|state| state.idle(Instant::now()))
            .unwrap_or(Duration::MAX)
    }
}

fn page_id(page: &Page) -> PageId {
    page.target_id().inner().clone()
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or(message).to_string()
}

async fn apply_blocking(page: &Page, patterns: &[String]) -> Result<()> {
    if patterns.is_empty() {
        page.execute(fetch::DisableParams::default()).await?;
        return Ok(());
    }
    let patterns = patterns
        .iter()
        .map(|p| fetch::RequestPattern::builder().url_pattern(p.clone()).build())
        .collect::<Vec<_>>();
    page.execute(fetch::EnableParams::builder().patterns(patterns).build())
        .await?;
    Ok(())
}

enum Pumped {
    Request(Arc<network::EventRequestWillBeSent>),
    Response(Arc<network::EventResponseReceived>),
    Finished(Arc<network::EventLoadingFinished>),
    Failed(Arc<network::EventLoadingFailed>),
    Console(Arc<runtime::EventConsoleApiCalled>),
    Exception(Arc<runtime::EventExceptionThrown>),
    Dialog(Arc<cdp_page::EventJavascriptDialogOpening>),
    ContextCreated(Arc<runtime::EventExecutionContextCreated>),
    ContextDestroyed(Arc<runtime::EventExecutionContextDestroyed>),
    ContextsCleared(Arc<runtime::EventExecutionContextsCleared>),
    FrameDetached(Arc<cdp_page::EventFrameDetached>),
    Paused(Arc<fetch::EventRequestPaused>),
}

async fn subscribe(page: &Page) -> Result<BoxStream<'static, Pumped>> {
    let streams: Vec<BoxStream<'static, Pumped>> = vec![
        page.event_listener::<network::EventRequestWillBeSent>().await?.map(Pumped::Request).boxed(),
        page.event_listener::<network::EventResponseReceived>().await?.map(Pumped::Response).boxed(),
        page.event_listener::<network::EventLoadingFinished>().await?.map(Pumped::Finished).boxed(),
        page.event_listener::<network::EventLoadingFailed>().await?.map(Pumped::Failed).boxed(),
        page.event_listener::<runtime::EventConsoleApiCalled>().await?.map(Pumped::Console).boxed(),
        page.event_listener::<runtime::EventExceptionThrown>().await?.map(Pumped::Exception).boxed(),
        page.event_listener::<cdp_page::EventJavascriptDialogOpening>().await?.map(Pumped::Dialog).boxed(),
        page.event_listener::<runtime::EventExecutionContextCreated>().await?.map(Pumped::ContextCreated).boxed(),
        page.event_listener::<runtime::EventExecutionContextDestroyed>().await?.map(Pumped::ContextDestroyed).boxed(),
        page.event_listener::<runtime::EventExecutionContextsCleared>().await?.map(Pumped::ContextsCleared).boxed(),
        page.event_listener::<cdp_page::EventFrameDetached>().await?.map(Pumped::FrameDetached).boxed(),
        page.event_listener::<fetch::EventRequestPaused>().await?.map(Pumped::Paused).boxed(),
    ];
    Ok(futures::stream::select_all(streams).boxed())
}

fn remote_text(object: &runtime::RemoteObject) -> String {
    match &object.value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => object
            .description
            .clone()
            .unwrap_or_else(|| format!("{:?}", object.r#type).to_lowercase()),
    }
}

async fn run_pump(page: Page, id: PageId, shared: Arc<Shared>, mut events: BoxStream<'static, Pumped>) {
    let publish = |event: EngineEvent| {
        let _ = shared.events.send(event);
    };

    while let Some(event) = events.next().await {
        match event {
            Pumped::Request(ev) => {
                let rid = ev.request_id.inner().clone();
                let fresh = shared
                    .inflight
                    .entry(id.clone())
                    .or_default()
                    .begin(&rid, Instant::now());
                // Redirect hops reuse the request id; only the first hop is a new request
                if fresh && ev.redirect_response.is_none() {
                    publish(EngineEvent::Request {
                        page: id.clone(),
                        id: rid,
                        method: ev.request.method.clone(),
                        url: ev.request.url.clone(),
                        resource_type: ev.r#type.as_ref().map(|t| format!("{:?}", t).to_lowercase()),
                    });
                }
            }
            Pumped::Response(ev) => publish(EngineEvent::Response {
                page: id.clone(),
                id: ev.request_id.inner().clone(),
                status: ev.response.status,
                status_text: ev.response.status_text.clone(),
                mime_type: ev.response.mime_type.clone(),
            }),
            Pumped::Finished(ev) => settle(&shared, &id, ev.request_id.inner()),
            Pumped::Failed(ev) => {
                settle(&shared, &id, ev.request_id.inner());
                publish(EngineEvent::RequestFailed {
                    page: id.clone(),
                    id: ev.request_id.inner().clone(),
                    error: ev.error_text.clone(),
                });
            }
            Pumped::Console(ev) => publish(EngineEvent::Console {
                page: id.clone(),
                level: format!("{:?}", ev.r#type).to_lowercase(),
                text: ev.args.iter().map(remote_text).collect::<Vec<_>>().join(" "),
            }),
            Pumped::Exception(ev) => {
                let details = &ev.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                publish(EngineEvent::PageError {
                    page: id.clone(),
                    message,
                });
            }
            Pumped::Dialog(ev) => {
                let kind = match ev.r#type {
                    cdp_page::DialogType::Alert => DialogKind::Alert,
                    cdp_page::DialogType::Confirm => DialogKind::Confirm,
                    cdp_page::DialogType::Prompt => DialogKind::Prompt,
                    cdp_page::DialogType::Beforeunload => DialogKind::Beforeunload,
                };
                if !shared.dialog_routes.contains(&id) {
                    debug!("Dismissing unhandled {:?} dialog on {}", kind, id);
                    if let Ok(params) = cdp_page::HandleJavaScriptDialogParams::builder()
                        .accept(false)
                        .build()
                        && let Err(err) = page.execute(params).await
                    {
                        warn!("Failed to dismiss dialog: {}", err);
                    }
                }
                publish(EngineEvent::Dialog {
                    page: id.clone(),
                    kind,
                    message: ev.message.clone(),
                    default_prompt: ev.default_prompt.clone(),
                });
            }
            Pumped::ContextCreated(ev) => {
                if let Some(frame) = default_context_frame(ev.context.aux_data.as_ref()) {
                    shared.frame_contexts.insert((id.clone(), frame), ev.context.id);
                }
            }
            Pumped::ContextDestroyed(ev) => shared.forget_context(&id, ev.execution_context_id),
            Pumped::ContextsCleared(_) => shared.forget_contexts(&id),
            Pumped::FrameDetached(ev) => shared.forget_frame(&id, ev.frame_id.inner()),
            Pumped::Paused(ev) => {
                debug!("Blocking {}", ev.request.url);
                let params = fetch::FailRequestParams::new(
                    ev.request_id.clone(),
                    network::ErrorReason::BlockedByClient,
                );
                if let Err(err) = page.execute(params).await {
                    warn!("Failed to block {}: {}", ev.request.url, err);
                }
            }
        }
    }
    debug!("Event pump for page {} ended", id);
}

fn settle(shared: &Shared, page: &PageId, request: &str) {
    if let Some(mut state) = shared.inflight.get_mut(page) {
        state.settle(request, Instant::now());
    }
}

/// Frame whose page world a context is, from `auxData`. Isolated worlds
/// report `isDefault: false`.
fn default_context_frame(aux: Option<&Value>) -> Option<String> {
    let aux = aux?;
    if aux.get("isDefault").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    aux.get("frameId").and_then(Value::as_str).map(str::to_string)
}

enum Downloaded {
    Begin(Arc<cdp_browser::EventDownloadWillBegin>),
    Progress(Arc<cdp_browser::EventDownloadProgress>),
}

async fn subscribe_downloads(browser: &Browser) -> Result<BoxStream<'static, Downloaded>> {
    let streams: Vec<BoxStream<'static, Downloaded>> = vec![
        browser.event_listener::<cdp_browser::EventDownloadWillBegin>().await?.map(Downloaded::Begin).boxed(),
        browser.event_listener::<cdp_browser::EventDownloadProgress>().await?.map(Downloaded::Progress).boxed(),
    ];
    Ok(futures::stream::select_all(streams).boxed())
}

fn download_state(state: &cdp_browser::DownloadProgressState) -> DownloadState {
    match state {
        cdp_browser::DownloadProgressState::InProgress => DownloadState::InProgress,
        cdp_browser::DownloadProgressState::Completed => DownloadState::Completed,
        cdp_browser::DownloadProgressState::Canceled => DownloadState::Canceled,
    }
}

/// Browser-wide download events, tagged with the page that started them
async fn run_download_pump(shared: Arc<Shared>, mut events: BoxStream<'static, Downloaded>) {
    let mut owners: HashMap<String, PageId> = HashMap::new();
    while let Some(event) = events.next().await {
        match event {
            Downloaded::Begin(ev) => {
                let page = shared.frame_owner(ev.frame_id.inner());
                owners.insert(ev.guid.clone(), page.clone());
                let _ = shared.events.send(EngineEvent::DownloadStarted {
                    page,
                    guid: ev.guid.clone(),
                    url: ev.url.clone(),
                    suggested_filename: ev.suggested_filename.clone(),
                });
            }
            Downloaded::Progress(ev) => {
                let state = download_state(&ev.state);
                let page = if state == DownloadState::InProgress {
                    owners.get(&ev.guid).cloned()
                } else {
                    owners.remove(&ev.guid)
                };
                let _ = shared.events.send(EngineEvent::DownloadProgress {
                    page: page.unwrap_or_default(),
                    guid: ev.guid.clone(),
                    state,
                });
            }
        }
    }
    debug!("Download event pump ended");
}

fn flatten_frames(tree: &cdp_page::FrameTree, out: &mut Vec<FrameInfo>) {
    for child in tree.child_frames.iter().flatten() {
        out.push(FrameInfo {
            id: child.frame.id.inner().clone(),
            name: child.frame.name.clone().unwrap_or_default(),
            url: child.frame.url.clone(),
        });
        flatten_frames(child, out);
    }
}

fn ax_text(value: &Option<accessibility::AxValue>) -> String {
    value
        .as_ref()
        .and_then(|v| v.value.as_ref())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// Render the semantic outline below `root`, skipping ignored and purely
/// structural nodes without dropping their children.
fn flatten_ax(nodes: &[accessibility::AxNode], root: Option<&accessibility::AxNode>) -> Vec<AxEntry> {
    let by_id: HashMap<&str, &accessibility::AxNode> =
        nodes.iter().map(|n| (n.node_id.inner().as_str(), n)).collect();
    let mut out = Vec::new();
    let root = root.or_else(|| nodes.iter().find(|n| n.parent_id.is_none()));
    let Some(root) = root else {
        return out;
    };

    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let role = ax_text(&node.role);
        let name = ax_text(&node.name);
        let transparent = node.ignored
            || matches!(role.as_str(), "none" | "generic" | "InlineTextBox" | "LineBreak")
            || (role == "StaticText" && name.trim().is_empty());
        let child_depth = if transparent {
            depth
        } else {
            let role = match role.as_str() {
                "RootWebArea" => "document".to_string(),
                "StaticText" => "text".to_string(),
                _ => role,
            };
            out.push(AxEntry {
                depth,
                role,
                name: name.trim().to_string(),
            });
            depth + 1
        };
        if let Some(children) = &node.child_ids {
            for child in children.iter().rev() {
                if let Some(child) = by_id.get(child.inner().as_str()) {
                    stack.push((*child, child_depth));
                }
            }
        }
    }
    out
}

fn cookie_record(cookie: &network::Cookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        expires: (!cookie.session && cookie.expires > 0.0).then_some(cookie.expires),
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.as_ref().map(|s| match s {
            network::CookieSameSite::Strict => "Strict".to_string(),
            network::CookieSameSite::Lax => "Lax".to_string(),
            network::CookieSameSite::None => "None".to_string(),
        }),
    }
}

fn cookie_param(cookie: &NewCookie) -> Result<network::CookieParam> {
    let record = &cookie.record;
    let mut builder = network::CookieParam::builder()
        .name(record.name.clone())
        .value(record.value.clone())
        .http_only(record.http_only)
        .secure(record.secure);
    if !record.domain.is_empty() {
        builder = builder.domain(record.domain.clone());
    } else if let Some(url) = &cookie.url {
        builder = builder.url(url.clone());
    }
    if !record.path.is_empty() {
        builder = builder.path(record.path.clone());
    }
    if let Some(expires) = record.expires {
        builder = builder.expires(network::TimeSinceEpoch::new(expires));
    }
    match record.same_site.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("strict") => {
            builder = builder.same_site(network::CookieSameSite::Strict)
        }
        Some(s) if s.eq_ignore_ascii_case("lax") => {
            builder = builder.same_site(network::CookieSameSite::Lax)
        }
        Some(s) if s.eq_ignore_ascii_case("none") => {
            builder = builder.same_site(network::CookieSameSite::None)
        }
        _ => {}
    }
    builder.build().map_err(Error::engine)
}

/// `(key, code, windowsVirtualKeyCode, text)` for the named keys `type --key` accepts
fn key_definition(key: &str) -> Option<(&'static str, &'static str, i64, Option<&'static str>)> {
    let def = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => ("Enter", "Enter", 13, Some("\r")),
        "tab" => ("Tab", "Tab", 9, None),
        "escape" | "esc" => ("Escape", "Escape", 27, None),
        "backspace" => ("Backspace", "Backspace", 8, None),
        "delete" => ("Delete", "Delete", 46, None),
        "space" | " " => (" ", "Space", 32, Some(" ")),
        "arrowup" | "up" => ("ArrowUp", "ArrowUp", 38, None),
        "arrowdown" | "down" => ("ArrowDown", "ArrowDown", 40, None),
        "arrowleft" | "left" => ("ArrowLeft", "ArrowLeft", 37, None),
        "arrowright" | "right" => ("ArrowRight", "ArrowRight", 39, None),
        "home" => ("Home", "Home", 36, None),
        "end" => ("End", "End", 35, None),
        "pageup" => ("PageUp", "PageUp", 33, None),
        "pagedown" => ("PageDown", "PageDown", 34, None),
        _ => return None,
    };
    Some(def)
}

/// Names accepted by `type --key`
pub const KEY_NAMES: &[&str] = &[
    "Enter", "Tab", "Escape", "Backspace", "Delete", "Space", "ArrowUp", "ArrowDown",
    "ArrowLeft", "ArrowRight", "Home", "End", "PageUp", "PageDown",
];

#[async_trait]
impl Driver for CdpDriver {
    fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    fn route_dialogs(&self, page: &PageId, to_listener: bool) {
        if to_listener {
            self.shared.dialog_routes.insert(page.clone());
        } else {
            self.shared.dialog_routes.remove(page);
        }
    }

    async fn pages(&self) -> Result<Vec<PageInfo>> {
        self.refresh().await?;
        let tracked: Vec<(PageId, Page)> = self
            .pages
            .lock()
            .await
            .iter()
            .map(|t| (t.id.clone(), t.page.clone()))
            .collect();

        let mut infos = Vec::with_capacity(tracked.len());
        for (id, page) in tracked {
            infos.push(PageInfo {
                id,
                url: page.url().await?.unwrap_or_default(),
                title: page.get_title().await?.unwrap_or_default(),
            });
        }
        Ok(infos)
    }

    async fn new_page(&self, url: Option<&str>) -> Result<PageId> {
        let page = self
            .browser
            .lock()
            .await
            .new_page(url.unwrap_or("about:blank"))
            .await?;
        let id = page_id(&page);
        let pump = self.attach(&id, &page).await?;
        let mut tracked = self.pages.lock().await;
        if let Some(existing) = tracked.iter_mut().find(|t| t.id == id) {
            existing.pump.abort();
            existing.pump = pump;
        } else {
            tracked.push(TrackedPage {
                id: id.clone(),
                page,
                pump,
            });
        }
        info!("Opened tab {}", id);
        Ok(id)
    }

    async fn close_page(&self, id: &PageId) -> Result<()> {
        let page = self.page(id).await?;
        // The target outlives Page.close for a moment; keep refresh off it
        self.closing.insert(id.clone());
        if let Err(err) = page.close().await {
            self.closing.remove(id);
            return Err(err.into());
        }
        let mut tracked = self.pages.lock().await;
        if let Some(pos) = tracked.iter().position(|t| &t.id == id) {
            let removed = tracked.remove(pos);
            removed.pump.abort();
        }
        self.shared.forget_page(id);
        info!("Closed tab {}", id);
        Ok(())
    }

    async fn bring_to_front(&self, id: &PageId) -> Result<()> {
        let page = self.page(id).await?;
        page.execute(cdp_page::BringToFrontParams::default()).await?;
        Ok(())
    }

    async fn page_info(&self, id: &PageId) -> Result<PageInfo> {
        let page = self.page(id).await?;
        Ok(PageInfo {
            id: id.clone(),
            url: page.url().await?.unwrap_or_default(),
            title: page.get_title().await?.unwrap_or_default(),
        })
    }

    async fn navigate(&self, id: &PageId, url: &str, wait: LoadState, timeout: Duration) -> Result<()> {
        let page = self.page(id).await?;
        let run = async {
            let (load, dom_ready) = self.load_streams(&page).await?;
            let reply = page.execute(cdp_page::NavigateParams::new(url)).await?;
            if let Some(error) = &reply.error_text {
                return Err(Error::engine(format!("Navigation to {} failed: {}", url, error)));
            }
            let same_document = reply.loader_id.is_none();
            self.wait_loaded(id, load, dom_ready, wait, same_document, timeout)
                .await
        };
        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| Error::timeout(format!("navigation to {} did not reach '{}'", url, wait)))?
    }

    async fn history(&self, id: &PageId, step: HistoryStep, wait: LoadState, timeout: Duration) -> Result<()> {
        let page = self.page(id).await?;
        let run = async {
            let (load, dom_ready) = self.load_streams(&page).await?;
            match step {
                HistoryStep::Reload => {
                    page.execute(cdp_page::ReloadParams::default()).await?;
                }
                HistoryStep::Back | HistoryStep::Forward => {
                    let history = page
                        .execute(cdp_page::GetNavigationHistoryParams::default())
                        .await?;
                    let target = if step == HistoryStep::Back {
                        history.current_index - 1
                    } else {
                        history.current_index + 1
                    };
                    let entry = usize::try_from(target)
                        .ok()
                        .and_then(|i| history.entries.get(i))
                        .ok_or_else(|| {
                            Error::not_found(format!(
                                "No history entry to go {}",
                                if step == HistoryStep::Back { "back" } else { "forward" }
                            ))
                        })?;
                    page.execute(cdp_page::NavigateToHistoryEntryParams::new(entry.id))
                        .await?;
                }
            }
            self.wait_loaded(id, load, dom_ready, wait, false, timeout)
                .await
        };
        tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| Error::timeout(format!("history navigation did not reach '{}'", wait)))?
    }

    async fn wait_for_network_idle(&self, id: &PageId, quiet: Duration, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.idle_for(id) >= quiet {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout("network idle"));
            }
            tokio::time::sleep(config::POLL_INTERVAL).await;
        }
    }

    async fn frames(&self, id: &PageId) -> Result<Vec<FrameInfo>> {
        let page = self.page(id).await?;
        let tree = page.execute(cdp_page::GetFrameTreeParams::default()).await?;
        let mut frames = Vec::new();
        flatten_frames(&tree.frame_tree, &mut frames);
        Ok(frames)
    }

    async fn evaluate(&self, target: &Target, expression: &str) -> Result<Value> {
        let object = self.remote(target, expression, true, Realm::Page).await?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    async fn query(&self, target: &Target, locator: &Locator) -> Result<Vec<ElementState>> {
        let mut elements: Vec<ElementState> = self.script(target, scripts::query(locator)).await?;
        if let Some(frame) = &target.frame {
            let page = self.page(&target.page).await?;
            let (dx, dy) = self.frame_offset(&page, frame).await?;
            for bounds in elements.iter_mut().filter_map(|e| e.bounds.as_mut()) {
                bounds.x += dx;
                bounds.y += dy;
            }
        }
        Ok(elements)
    }

    async fn scroll_into_view(&self, target: &Target, locator: &Locator, index: usize) -> Result<()> {
        let _: Value = self
            .script(target, scripts::scroll_into_view(locator, index))
            .await?;
        Ok(())
    }

    async fn dom_click(&self, target: &Target, locator: &Locator, index: usize) -> Result<()> {
        let _: Value = self.script(target, scripts::dom_click(locator, index)).await?;
        Ok(())
    }

    async fn focus(&self, target: &Target, selector: &str, clear: bool) -> Result<()> {
        let _: Value = self.script(target, scripts::focus(selector, clear)).await?;
        Ok(())
    }

    async fn select_options(&self, target: &Target, selector: &str) -> Result<Vec<SelectOption>> {
        self.script(target, scripts::select_options(selector)).await
    }

    async fn choose_option(&self, target: &Target, selector: &str, choice: &OptionChoice) -> Result<SelectOption> {
        self.script(target, scripts::choose_option(selector, choice))
            .await
    }

    async fn set_input_files(&self, target: &Target, selector: &str, files: &[PathBuf]) -> Result<()> {
        let object = self.element_object(target, selector).await?;
        let page = self.page(&target.page).await?;
        let files = files
            .iter()
            .map(|f| f.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let params = dom::SetFileInputFilesParams::builder()
            .files(files)
            .object_id(object)
            .build()
            .map_err(Error::engine)?;
        page.execute(params).await?;
        Ok(())
    }

    async fn scroll(&self, target: &Target, op: &ScrollOp) -> Result<ScrollMetrics> {
        self.script(target, scripts::scroll(op)).await
    }

    async fn scroll_metrics(&self, target: &Target) -> Result<ScrollMetrics> {
        self.script(target, scripts::scroll_metrics()).await
    }

    async fn accessibility_tree(&self, target: &Target, selector: Option<&str>) -> Result<Vec<AxEntry>> {
        let page = self.page(&target.page).await?;
        let scope = match selector {
            Some(selector) => {
                let object = self.element_object(target, selector).await?;
                let node = page
                    .execute(dom::DescribeNodeParams::builder().object_id(object).build())
                    .await?;
                Some(node.node.backend_node_id.clone())
            }
            None => None,
        };

        let mut params = accessibility::GetFullAxTreeParams::builder();
        if let Some(frame) = &target.frame {
            params = params.frame_id(cdp_page::FrameId::new(frame.clone()));
        }
        let tree = page.execute(params.build()).await?;
        let root = match &scope {
            Some(backend) => Some(
                tree.nodes
                    .iter()
                    .find(|n| n.backend_dom_node_id.as_ref() == Some(backend))
                    .ok_or_else(|| Error::engine("Element is not in the accessibility tree"))?,
            ),
            None => None,
        };
        Ok(flatten_ax(&tree.nodes, root))
    }

    async fn content(&self, target: &Target, selector: Option<&str>, kind: ContentKind) -> Result<String> {
        self.script(target, scripts::content(selector, kind)).await
    }

    async fn screenshot(&self, id: &PageId, spec: &ScreenshotSpec) -> Result<Vec<u8>> {
        let page = self.page(id).await?;
        let format = match spec.format {
            ImageFormat::Png => cdp_page::CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => cdp_page::CaptureScreenshotFormat::Jpeg,
            ImageFormat::Webp => cdp_page::CaptureScreenshotFormat::Webp,
        };
        let mut builder = ScreenshotParams::builder()
            .format(format)
            .full_page(spec.full_page);
        if let Some(quality) = spec.quality
            && spec.format != ImageFormat::Png
        {
            builder = builder.quality(i64::from(quality));
        }
        if let Some(clip) = spec.clip {
            builder = builder.clip(cdp_page::Viewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            });
        }
        Ok(page.screenshot(builder.build()).await?)
    }

    async fn mouse(&self, id: &PageId, event: MouseInput) -> Result<()> {
        let page = self.page(id).await?;
        let kind = match event.kind {
            MouseEventKind::Move => input::DispatchMouseEventType::MouseMoved,
            MouseEventKind::Down => input::DispatchMouseEventType::MousePressed,
            MouseEventKind::Up => input::DispatchMouseEventType::MouseReleased,
            MouseEventKind::Wheel => input::DispatchMouseEventType::MouseWheel,
        };
        let button = match event.button {
            None => input::MouseButton::None,
            Some(MouseButton::Left) => input::MouseButton::Left,
            Some(MouseButton::Right) => input::MouseButton::Right,
            Some(MouseButton::Middle) => input::MouseButton::Middle,
        };
        let mut builder = input::DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(event.x)
            .y(event.y)
            .button(button)
            .click_count(i64::from(event.click_count));
        if event.kind == MouseEventKind::Wheel {
            builder = builder.delta_x(event.delta_x).delta_y(event.delta_y);
        }
        page.execute(builder.build().map_err(Error::engine)?).await?;
        Ok(())
    }

    async fn press_key(&self, id: &PageId, key: &str) -> Result<()> {
        let (key_name, code, vk, text) = key_definition(key).ok_or_else(|| {
            Error::usage(format!(
                "Unknown key '{}' (known: {})",
                key,
                KEY_NAMES.join(", ")
            ))
        })?;
        let page = self.page(id).await?;

        let mut down = input::DispatchKeyEventParams::builder()
            .r#type(if text.is_some() {
                input::DispatchKeyEventType::KeyDown
            } else {
                input::DispatchKeyEventType::RawKeyDown
            })
            .key(key_name)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk);
        if let Some(text) = text {
            down = down.text(text).unmodified_text(text);
        }
        page.execute(down.build().map_err(Error::engine)?).await?;

        let up = input::DispatchKeyEventParams::builder()
            .r#type(input::DispatchKeyEventType::KeyUp)
            .key(key_name)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk)
            .build()
            .map_err(Error::engine)?;
        page.execute(up).await?;
        Ok(())
    }

    async fn insert_text(&self, id: &PageId, text: &str) -> Result<()> {
        let page = self.page(id).await?;
        page.execute(input::InsertTextParams::new(text)).await?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let page = self.any_page().await?;
        let reply = page.execute(network::GetAllCookiesParams::default()).await?;
        Ok(reply.cookies.iter().map(cookie_record).collect())
    }

    async fn set_cookies(&self, cookies: &[NewCookie]) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let params = cookies.iter().map(cookie_param).collect::<Result<Vec<_>>>()?;
        let page = self.any_page().await?;
        page.execute(network::SetCookiesParams::new(params)).await?;
        Ok(())
    }

    async fn delete_cookies(&self, name: &str, domain: Option<&str>) -> Result<usize> {
        let matching: Vec<CookieRecord> = self
            .cookies()
            .await?
            .into_iter()
            .filter(|c| c.name == name && domain.is_none_or(|d| domain_matches(&c.domain, d)))
            .collect();
        let page = self.any_page().await?;
        for cookie in &matching {
            let params = network::DeleteCookiesParams::builder()
                .name(cookie.name.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .build()
                .map_err(Error::engine)?;
            page.execute(params).await?;
        }
        Ok(matching.len())
    }

    async fn clear_cookies(&self) -> Result<()> {
        let page = self.any_page().await?;
        page.execute(network::ClearBrowserCookiesParams::default())
            .await?;
        Ok(())
    }

    async fn storage(&self, target: &Target, area: StorageArea, op: &StorageOp) -> Result<Value> {
        self.script(target, scripts::storage(area, op)).await
    }

    async fn emulate_viewport(&self, id: &PageId, spec: Option<&ViewportSpec>) -> Result<()> {
        let page = self.page(id).await?;
        let (width, height) = config::DEFAULT_VIEWPORT;
        let desktop = ViewportSpec::desktop(width, height, 1.0);
        let spec = spec.unwrap_or(&desktop);

        page.execute(emulation::SetDeviceMetricsOverrideParams::new(
            i64::from(spec.width),
            i64::from(spec.height),
            spec.scale,
            spec.mobile,
        ))
        .await?;
        page.execute(emulation::SetTouchEmulationEnabledParams::new(spec.touch))
            .await?;
        let user_agent = spec
            .user_agent
            .clone()
            .unwrap_or_else(|| self.default_user_agent.clone());
        page.execute(emulation::SetUserAgentOverrideParams::new(user_agent))
            .await?;
        Ok(())
    }

    async fn set_geolocation(&self, id: &PageId, location: Geolocation) -> Result<()> {
        let grant = cdp_browser::GrantPermissionsParams::builder()
            .permissions(vec![cdp_browser::PermissionType::Geolocation])
            .build()
            .map_err(Error::engine)?;
        self.browser.lock().await.execute(grant).await?;

        let page = self.page(id).await?;
        page.execute(
            emulation::SetGeolocationOverrideParams::builder()
                .latitude(location.latitude)
                .longitude(location.longitude)
                .accuracy(location.accuracy)
                .build(),
        )
        .await?;
        Ok(())
    }

    async fn set_blocked(&self, patterns: &[String]) -> Result<()> {
        if let Ok(mut blocked) = self.blocked.lock() {
            *blocked = patterns.to_vec();
        }
        let pages: Vec<Page> = self
            .pages
            .lock()
            .await
            .iter()
            .map(|t| t.page.clone())
            .collect();
        for page in pages {
            apply_blocking(&page, patterns).await?;
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        let page = self.any_page().await?;
        let cookies = page
            .execute(
                network::GetCookiesParams::builder()
                    .urls(vec![url.to_string()])
                    .build(),
            )
            .await?;
        let header = cookies
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.default_user_agent);
        if !header.is_empty() {
            request = request.header(reqwest::header::COOKIE, header);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::engine(format!("Request to {} failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::engine(format!("HTTP {} fetching {}", status, url)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::engine(format!("Reading {} failed: {}", url, e)))?;
        Ok(FetchedBody {
            status: status.as_u16(),
            bytes: bytes.to_vec(),
        })
    }

    /// Downloads are browser-wide; `id` only names the tab for the log.
    async fn set_download_dir(&self, id: &PageId, dir: &Path) -> Result<()> {
        let params = cdp_browser::SetDownloadBehaviorParams::builder()
            .behavior(cdp_browser::SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .events_enabled(true)
            .build()
            .map_err(Error::engine)?;
        self.browser.lock().await.execute(params).await?;
        debug!("Downloads from {} now go to {}", id, dir.display());
        Ok(())
    }

    async fn respond_dialog(&self, id: &PageId, accept: bool, prompt_text: Option<String>) -> Result<()> {
        let page = self.page(id).await?;
        let mut builder = cdp_page::HandleJavaScriptDialogParams::builder().accept(accept);
        if let Some(text) = prompt_text {
            builder = builder.prompt_text(text);
        }
        page.execute(builder.build().map_err(Error::engine)?).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        for tracked in self.pages.lock().await.drain(..) {
            tracked.pump.abort();
        }
        self.downloads.abort();
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            warn!("Browser close failed: {}", err);
        }
        if let Err(err) = browser.wait().await {
            warn!("Waiting for browser exit failed: {}", err);
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}
