//! Command envelope and per-action parameters.
//!
//! Every action accepted by `POST /command` is a variant of [`Command`]. The
//! parameter structs double as clap argument groups, so the CLI subcommands
//! and the wire format are the same types.

use clap::{Args, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::{Error, Result};

/// `{action, params}` body posted to `/command`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// Why an envelope could not become a [`Command`]
#[derive(Debug)]
pub enum ParseError {
    UnknownAction(String),
    Params(Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownAction(action) => write!(f, "Unknown action: {}", action),
            ParseError::Params(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
#[serde(tag = "action", content = "params", rename_all = "lowercase")]
pub enum Command {
    /// Open a URL or move through history in the active tab
    Navigate(NavigateParams),
    /// Click an element or a point
    Click(ClickParams),
    /// Fill a field or press a key
    Type(TypeParams),
    /// Accessibility outline, HTML or text of the page
    Snapshot(SnapshotParams),
    /// Save a screenshot of the page or an element
    Screenshot(ScreenshotParams),
    /// Wait for a delay, network idle, a selector or text
    Wait(WaitParams),
    /// Evaluate JavaScript in the active frame
    Execute(ExecuteParams),
    /// Download by URL or by clicking a link
    Download(DownloadParams),
    /// Attach files to a file input
    Upload(UploadParams),
    /// List, open, switch or close tabs
    Tabs(TabsParams),
    /// Capture or block network requests
    Network(NetworkParams),
    /// Capture console messages
    Console(ConsoleParams),
    /// Emulate a device, viewport, location, locale or timezone
    Emulate(EmulateParams),
    /// Select the iframe commands operate on
    Frame(FrameParams),
    /// Scroll the page, an element, or until content stops loading
    Scroll(ScrollParams),
    /// Hover, drag, move or wheel the mouse
    Mouse(MouseParams),
    /// List or choose options of a native <select>
    Select(SelectParams),
    /// Read and write cookies of the browser context
    Cookies(CookiesParams),
    /// Read and write localStorage or sessionStorage
    Storage(StorageParams),
    /// Set how JavaScript dialogs are answered
    Dialog(DialogParams),
    /// Assert element state without failing the command
    Check(CheckParams),
}

fn parse_params<T: DeserializeOwned>(action: &str, params: Value) -> Result<T, ParseError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| ParseError::Params(Error::usage(format!("Invalid params for {}: {}", action, e))))
}

impl Command {
    pub const ACTIONS: [&'static str; 21] = [
        "navigate",
        "click",
        "type",
        "snapshot",
        "screenshot",
        "wait",
        "execute",
        "download",
        "upload",
        "tabs",
        "network",
        "console",
        "emulate",
        "frame",
        "scroll",
        "mouse",
        "select",
        "cookies",
        "storage",
        "dialog",
        "check",
    ];

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ParseError> {
        let Envelope { action, params } = envelope;
        let a = action.as_str();
        Ok(match a {
            "navigate" => Command::Navigate(parse_params(a, params)?),
            "click" => Command::Click(parse_params(a, params)?),
            "type" => Command::Type(parse_params(a, params)?),
            "snapshot" => Command::Snapshot(parse_params(a, params)?),
            "screenshot" => Command::Screenshot(parse_params(a, params)?),
            "wait" => Command::Wait(parse_params(a, params)?),
            "execute" => Command::Execute(parse_params(a, params)?),
            "download" => Command::Download(parse_params(a, params)?),
            "upload" => Command::Upload(parse_params(a, params)?),
            "tabs" => Command::Tabs(parse_params(a, params)?),
            "network" => Command::Network(parse_params(a, params)?),
            "console" => Command::Console(parse_params(a, params)?),
            "emulate" => Command::Emulate(parse_params(a, params)?),
            "frame" => Command::Frame(parse_params(a, params)?),
            "scroll" => Command::Scroll(parse_params(a, params)?),
            "mouse" => Command::Mouse(parse_params(a, params)?),
            "select" => Command::Select(parse_params(a, params)?),
            "cookies" => Command::Cookies(parse_params(a, params)?),
            "storage" => Command::Storage(parse_params(a, params)?),
            "dialog" => Command::Dialog(parse_params(a, params)?),
            "check" => Command::Check(parse_params(a, params)?),
            _ => return Err(ParseError::UnknownAction(action)),
        })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::Navigate(_) => "navigate",
            Command::Click(_) => "click",
            Command::Type(_) => "type",
            Command::Snapshot(_) => "snapshot",
            Command::Screenshot(_) => "screenshot",
            Command::Wait(_) => "wait",
            Command::Execute(_) => "execute",
            Command::Download(_) => "download",
            Command::Upload(_) => "upload",
            Command::Tabs(_) => "tabs",
            Command::Network(_) => "network",
            Command::Console(_) => "console",
            Command::Emulate(_) => "emulate",
            Command::Frame(_) => "frame",
            Command::Scroll(_) => "scroll",
            Command::Mouse(_) => "mouse",
            Command::Select(_) => "select",
            Command::Cookies(_) => "cookies",
            Command::Storage(_) => "storage",
            Command::Dialog(_) => "dialog",
            Command::Check(_) => "check",
        }
    }

    /// Reject missing or conflicting parameters before anything reaches the browser.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Navigate(p) => p.validate(),
            Command::Click(p) => p.validate(),
            Command::Type(p) => p.validate(),
            Command::Snapshot(p) => p.validate(),
            Command::Screenshot(p) => p.validate().map(|_| ()),
            Command::Wait(p) => p.validate(),
            Command::Execute(p) => p.validate(),
            Command::Download(p) => p.validate().map(|_| ()),
            Command::Upload(p) => p.validate(),
            Command::Tabs(p) => p.validate(),
            Command::Network(p) => p.validate(),
            Command::Console(_) => Ok(()),
            Command::Emulate(p) => p.validate(),
            Command::Frame(p) => p.validate().map(|_| ()),
            Command::Scroll(p) => p.validate().map(|_| ()),
            Command::Mouse(p) => p.validate(),
            Command::Select(p) => p.validate().map(|_| ()),
            Command::Cookies(p) => p.validate(),
            Command::Storage(p) => p.validate(),
            Command::Dialog(p) => p.validate(),
            Command::Check(p) => p.validate(),
        }
    }
}

/// Require exactly one of the named options.
fn exactly_one(action: &str, options: &[(&str, bool)]) -> Result<()> {
    let names: Vec<&str> = options.iter().map(|(name, _)| *name).collect();
    let given: Vec<&str> = options
        .iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| *name)
        .collect();

    match given.len() {
        1 => Ok(()),
        0 => Err(Error::usage(format!(
            "{}: one of {} is required",
            action,
            names.join(", ")
        ))),
        _ => Err(Error::usage(format!(
            "{}: only one of {} may be given (got {})",
            action,
            names.join(", "),
            given.join(", ")
        ))),
    }
}

fn require<'a, T>(action: &str, name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| Error::usage(format!("{}: {} is required", action, name)))
}

fn both_or_neither(action: &str, a: (&str, bool), b: (&str, bool)) -> Result<()> {
    if a.1 != b.1 {
        return Err(Error::usage(format!(
            "{}: {} and {} must be given together",
            action, a.0, b.0
        )));
    }
    Ok(())
}

/// Page readiness milestone awaited after navigation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// The load event fired
    #[default]
    Load,
    /// DOMContentLoaded fired
    Domcontentloaded,
    /// No network activity for a quiet period
    Networkidle,
    /// Navigation committed, nothing else awaited
    Commit,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Load => "load",
            LoadState::Domcontentloaded => "domcontentloaded",
            LoadState::Networkidle => "networkidle",
            LoadState::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigateParams {
    /// URL to open in the active tab
    pub url: Option<String>,

    /// Go back in history
    #[arg(long)]
    pub back: bool,

    /// Go forward in history
    #[arg(long)]
    pub forward: bool,

    /// Reload the current page
    #[arg(long)]
    pub reload: bool,

    /// Milestone to wait for
    #[arg(long, value_enum)]
    pub wait_until: Option<LoadState>,

    /// Navigation timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl NavigateParams {
    fn validate(&self) -> Result<()> {
        exactly_one(
            "navigate",
            &[
                ("url", self.url.is_some()),
                ("--back", self.back),
                ("--forward", self.forward),
                ("--reload", self.reload),
            ],
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct ClickParams {
    /// CSS selector of the element to click
    #[arg(long)]
    pub selector: Option<String>,

    /// Visible text (partial match) of the element to click
    #[arg(long)]
    pub text: Option<String>,

    /// Absolute X coordinate (requires --y)
    #[arg(long)]
    pub x: Option<f64>,

    /// Absolute Y coordinate (requires --x)
    #[arg(long)]
    pub y: Option<f64>,

    /// Mouse button
    #[arg(long, value_enum)]
    pub button: Option<MouseButton>,

    /// Click count (2 for double-click)
    #[arg(long)]
    pub count: Option<u32>,

    /// Delay between mouse down and up, in milliseconds
    #[arg(long)]
    pub delay: Option<u64>,

    /// Skip visibility and actionability checks
    #[arg(long)]
    pub force: bool,

    /// How long to wait for the target, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ClickParams {
    fn validate(&self) -> Result<()> {
        both_or_neither("click", ("--x", self.x.is_some()), ("--y", self.y.is_some()))?;
        exactly_one(
            "click",
            &[
                ("--selector", self.selector.is_some()),
                ("--text", self.text.is_some()),
                ("--x/--y", self.x.is_some()),
            ],
        )?;
        if self.count == Some(0) {
            return Err(Error::usage("click: --count must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeParams {
    /// Named key to press (Enter, Tab, Escape, ...)
    #[arg(long)]
    pub key: Option<String>,

    /// CSS selector of the field to fill
    #[arg(long)]
    pub selector: Option<String>,

    /// Text to type into the field
    #[arg(long)]
    pub text: Option<String>,

    /// Clear the field before typing
    #[arg(long)]
    pub clear: bool,

    /// Press Enter after typing
    #[arg(long)]
    pub submit: bool,

    /// How long to wait for the field, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl TypeParams {
    fn validate(&self) -> Result<()> {
        both_or_neither(
            "type",
            ("--selector", self.selector.is_some()),
            ("--text", self.text.is_some()),
        )?;
        exactly_one(
            "type",
            &[
                ("--key", self.key.is_some()),
                ("--selector/--text", self.selector.is_some()),
            ],
        )?;
        if self.key.is_some() && (self.clear || self.submit) {
            return Err(Error::usage(
                "type: --clear and --submit only apply with --selector/--text",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MouseAction {
    Hover,
    Drag,
    Move,
    Wheel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct MouseParams {
    /// Mouse gesture to perform
    #[arg(value_enum)]
    pub action: MouseAction,

    /// Element to hover
    #[serde(default)]
    #[arg(long)]
    pub selector: Option<String>,

    /// Drag source selector
    #[serde(default)]
    #[arg(long)]
    pub from: Option<String>,

    /// Drag destination selector
    #[serde(default)]
    #[arg(long)]
    pub to: Option<String>,

    /// X coordinate
    #[serde(default)]
    #[arg(long)]
    pub x: Option<f64>,

    /// Y coordinate
    #[serde(default)]
    #[arg(long)]
    pub y: Option<f64>,

    /// Horizontal wheel delta
    #[serde(default)]
    #[arg(long, allow_hyphen_values = true)]
    pub dx: Option<f64>,

    /// Vertical wheel delta
    #[serde(default)]
    #[arg(long, allow_hyphen_values = true)]
    pub dy: Option<f64>,

    /// Intermediate mouse moves used while dragging
    #[serde(default)]
    #[arg(long)]
    pub steps: Option<u32>,

    /// How long to wait for target elements, in milliseconds
    #[serde(default)]
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl MouseParams {
    fn validate(&self) -> Result<()> {
        both_or_neither("mouse", ("--x", self.x.is_some()), ("--y", self.y.is_some()))?;
        match self.action {
            MouseAction::Hover => exactly_one(
                "mouse hover",
                &[
                    ("--selector", self.selector.is_some()),
                    ("--x/--y", self.x.is_some()),
                ],
            ),
            MouseAction::Drag => {
                require("mouse drag", "--from", &self.from)?;
                require("mouse drag", "--to", &self.to)?;
                Ok(())
            }
            MouseAction::Move => {
                if self.x.is_none() {
                    return Err(Error::usage("mouse move: --x and --y are required"));
                }
                Ok(())
            }
            MouseAction::Wheel => {
                if self.dx.is_none() && self.dy.is_none() {
                    return Err(Error::usage("mouse wheel: --dx or --dy is required"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectParams {
    /// CSS selector of the <select> element
    #[arg(long)]
    pub selector: Option<String>,

    /// List options instead of choosing one
    #[arg(long)]
    pub list: bool,

    /// Choose the option with this value
    #[arg(long)]
    pub value: Option<String>,

    /// Choose the option with this visible label
    #[arg(long)]
    pub label: Option<String>,

    /// Choose the option at this index
    #[arg(long)]
    pub index: Option<usize>,

    /// How long to wait for the element, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// How a `select` call picks its option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "option", rename_all = "lowercase")]
pub enum OptionChoice {
    Value(String),
    Label(String),
    Index(usize),
}

impl SelectParams {
    /// Returns `None` for `--list`, or the single selection strategy.
    pub fn validate(&self) -> Result<Option<OptionChoice>> {
        require("select", "--selector", &self.selector)?;
        exactly_one(
            "select",
            &[
                ("--list", self.list),
                ("--value", self.value.is_some()),
                ("--label", self.label.is_some()),
                ("--index", self.index.is_some()),
            ],
        )?;
        Ok(if let Some(value) = &self.value {
            Some(OptionChoice::Value(value.clone()))
        } else if let Some(label) = &self.label {
            Some(OptionChoice::Label(label.clone()))
        } else {
            self.index.map(OptionChoice::Index)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScrollEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct ScrollParams {
    /// Scroll to the top or bottom edge
    #[arg(long, value_enum)]
    pub to: Option<ScrollEdge>,

    /// Scroll this element into view
    #[arg(long)]
    pub selector: Option<String>,

    /// Scroll horizontally by pixels (can be negative)
    #[arg(long, allow_hyphen_values = true)]
    pub dx: Option<f64>,

    /// Scroll vertically by pixels (can be negative)
    #[arg(long, allow_hyphen_values = true)]
    pub dy: Option<f64>,

    /// Keep scrolling to the bottom while the page grows
    #[arg(long)]
    pub infinite: bool,

    /// Maximum scroll attempts in infinite mode
    #[arg(long)]
    pub max: Option<u32>,

    /// Pause after each infinite-mode scroll, in milliseconds
    #[arg(long)]
    pub delay: Option<u64>,
}

/// Validated scroll request
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollRequest {
    Edge(ScrollEdge),
    IntoView(String),
    By { dx: f64, dy: f64 },
    Infinite { max: u32, delay_ms: u64 },
}

impl ScrollParams {
    pub fn validate(&self) -> Result<ScrollRequest> {
        let by = self.dx.is_some() || self.dy.is_some();
        exactly_one(
            "scroll",
            &[
                ("--to", self.to.is_some()),
                ("--selector", self.selector.is_some()),
                ("--dx/--dy", by),
                ("--infinite", self.infinite),
            ],
        )?;
        Ok(if let Some(edge) = self.to {
            ScrollRequest::Edge(edge)
        } else if let Some(selector) = &self.selector {
            ScrollRequest::IntoView(selector.clone())
        } else if by {
            ScrollRequest::By {
                dx: self.dx.unwrap_or(0.0),
                dy: self.dy.unwrap_or(0.0),
            }
        } else {
            ScrollRequest::Infinite {
                max: self.max.unwrap_or(10),
                delay_ms: self.delay.unwrap_or(1000),
            }
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadParams {
    /// CSS selector of the file input
    #[arg(long)]
    pub selector: Option<String>,

    /// Files to attach (absolute, ~/ or relative paths)
    #[arg(long = "file", num_args = 1..)]
    pub files: Vec<String>,

    /// How long to wait for the input, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl UploadParams {
    fn validate(&self) -> Result<()> {
        require("upload", "--selector", &self.selector)?;
        if self.files.is_empty() {
            return Err(Error::usage("upload: at least one --file is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadParams {
    /// URL to fetch with the browser's cookies
    #[arg(long)]
    pub url: Option<String>,

    /// Exact output path for --url mode
    #[arg(long, short)]
    pub output: Option<String>,

    /// Element whose click triggers the download
    #[arg(long)]
    pub selector: Option<String>,

    /// Visible text of the element whose click triggers the download
    #[arg(long)]
    pub text: Option<String>,

    /// Directory receiving click-mode downloads
    #[arg(long)]
    pub dir: Option<String>,

    /// How long to wait for the download, in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Validated download mode
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadMode {
    Url { url: String, output: String },
    Click { target: Locator, dir: String },
}

impl DownloadParams {
    pub fn validate(&self) -> Result<DownloadMode> {
        let click = self.selector.is_some() || self.text.is_some();
        exactly_one(
            "download",
            &[("--url", self.url.is_some()), ("--selector/--text", click)],
        )?;

        if let Some(url) = &self.url {
            let output = require("download --url", "--output", &self.output)?;
            if self.dir.is_some() {
                return Err(Error::usage("download: --dir only applies to click mode"));
            }
            url::Url::parse(url)
                .map_err(|e| Error::usage(format!("download: invalid --url {}: {}", url, e)))?;
            return Ok(DownloadMode::Url {
                url: url.clone(),
                output: output.clone(),
            });
        }

        exactly_one(
            "download",
            &[
                ("--selector", self.selector.is_some()),
                ("--text", self.text.is_some()),
            ],
        )?;
        let dir = require("download --selector/--text", "--dir", &self.dir)?;
        if self.output.is_some() {
            return Err(Error::usage("download: --output only applies to --url mode"));
        }
        let target = match (&self.selector, &self.text) {
            (Some(selector), _) => Locator::Css(selector.clone()),
            (None, Some(text)) => Locator::Text(text.clone()),
            (None, None) => return Err(Error::usage("download: --selector or --text is required")),
        };
        Ok(DownloadMode::Click {
            target,
            dir: dir.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotParams {
    /// Return the full HTML instead of the accessibility tree
    #[arg(long)]
    pub html: bool,

    /// Return the visible text only
    #[arg(long)]
    pub text: bool,

    /// Limit the snapshot to this element
    #[arg(long)]
    pub selector: Option<String>,
}

impl SnapshotParams {
    fn validate(&self) -> Result<()> {
        if self.html && self.text {
            return Err(Error::usage("snapshot: --html and --text are exclusive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// Output path; the extension picks the format (png, jpg, jpeg, webp)
    #[arg(long, short)]
    pub path: Option<String>,

    /// Capture the whole scrollable page
    #[arg(long)]
    pub full_page: bool,

    /// Capture only this element
    #[arg(long)]
    pub selector: Option<String>,

    /// JPEG/WebP quality (0-100)
    #[arg(long)]
    pub quality: Option<u8>,
}

impl ScreenshotParams {
    pub fn path_or_default(&self) -> &str {
        self.path.as_deref().unwrap_or("screenshot.png")
    }

    pub fn validate(&self) -> Result<ImageFormat> {
        if self.full_page && self.selector.is_some() {
            return Err(Error::usage(
                "screenshot: --full-page and --selector are exclusive",
            ));
        }
        if let Some(quality) = self.quality
            && quality > 100
        {
            return Err(Error::usage("screenshot: --quality must be 0-100"));
        }

        let path = self.path_or_default();
        let extension = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("png") => Ok(ImageFormat::Png),
            Some("jpg") | Some("jpeg") => Ok(ImageFormat::Jpeg),
            Some("webp") => Ok(ImageFormat::Webp),
            _ => Err(Error::usage(format!(
                "screenshot: cannot infer image format from '{}' (use .png, .jpg, .jpeg or .webp)",
                path
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct WaitParams {
    /// Fixed delay in milliseconds
    #[arg(long)]
    pub ms: Option<u64>,

    /// Wait until the network is idle
    #[arg(long)]
    pub network_idle: bool,

    /// Wait until this selector is visible
    #[arg(long)]
    pub selector: Option<String>,

    /// With --selector, wait until it is hidden instead
    #[arg(long)]
    pub hidden: bool,

    /// Wait until this text appears on the page
    #[arg(long)]
    pub text: Option<String>,

    /// Overall timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl WaitParams {
    fn validate(&self) -> Result<()> {
        if self.hidden && self.selector.is_none() {
            return Err(Error::usage("wait: --hidden requires --selector"));
        }
        if self.ms.is_none() && !self.network_idle && self.selector.is_none() && self.text.is_none()
        {
            return Err(Error::usage(
                "wait: one of --ms, --network-idle, --selector, --text is required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecuteParams {
    /// JavaScript expression or function body to evaluate in the active frame
    pub script: Option<String>,
}

impl ExecuteParams {
    fn validate(&self) -> Result<()> {
        let script = require("execute", "script", &self.script)?;
        if script.trim().is_empty() {
            return Err(Error::usage("execute: script is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TabsAction {
    #[default]
    List,
    New,
    Switch,
    Close,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct TabsParams {
    #[arg(value_enum)]
    pub action: TabsAction,

    /// Tab index for switch/close
    #[arg(long)]
    pub index: Option<usize>,

    /// URL to open in a new tab
    #[arg(long)]
    pub url: Option<String>,
}

impl TabsParams {
    fn validate(&self) -> Result<()> {
        match self.action {
            TabsAction::Switch => {
                require("tabs switch", "--index", &self.index)?;
            }
            TabsAction::New => {
                if self.index.is_some() {
                    return Err(Error::usage("tabs new: --index is not accepted"));
                }
            }
            TabsAction::List | TabsAction::Close => {}
        }
        if self.url.is_some() && self.action != TabsAction::New {
            return Err(Error::usage("tabs: --url only applies to 'new'"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrameAction {
    List,
    Switch,
    Main,
    #[default]
    Current,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct FrameParams {
    #[arg(value_enum)]
    pub action: FrameAction,

    /// Frame index as reported by `frame list`
    #[arg(long)]
    pub index: Option<usize>,

    /// Frame name attribute
    #[arg(long)]
    pub name: Option<String>,

    /// Substring of the frame URL
    #[arg(long)]
    pub url: Option<String>,
}

/// How `frame switch` resolves its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSelector {
    Index(usize),
    Name(String),
    Url(String),
}

impl FrameParams {
    pub fn validate(&self) -> Result<Option<FrameSelector>> {
        if self.action != FrameAction::Switch {
            if self.index.is_some() || self.name.is_some() || self.url.is_some() {
                return Err(Error::usage(
                    "frame: --index/--name/--url only apply to 'switch'",
                ));
            }
            return Ok(None);
        }
        exactly_one(
            "frame switch",
            &[
                ("--index", self.index.is_some()),
                ("--name", self.name.is_some()),
                ("--url", self.url.is_some()),
            ],
        )?;
        Ok(Some(if let Some(index) = self.index {
            FrameSelector::Index(index)
        } else if let Some(name) = &self.name {
            FrameSelector::Name(name.clone())
        } else {
            FrameSelector::Url(self.url.clone().unwrap_or_default())
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAction {
    Start,
    Stop,
    Block,
    Unblock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    #[arg(value_enum)]
    pub action: NetworkAction,

    /// URL glob to block (e.g. "*.png", "*://ads.example.com/*")
    #[serde(default)]
    #[arg(long)]
    pub pattern: Option<String>,
}

impl NetworkParams {
    fn validate(&self) -> Result<()> {
        match self.action {
            NetworkAction::Block => {
                let pattern = require("network block", "--pattern", &self.pattern)?;
                if pattern.trim().is_empty() {
                    return Err(Error::usage("network block: --pattern is empty"));
                }
                Ok(())
            }
            _ if self.pattern.is_some() => Err(Error::usage(
                "network: --pattern only applies to 'block'",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleParams {
    #[arg(value_enum)]
    pub action: CaptureAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
#[serde(default, rename_all = "camelCase")]
pub struct EmulateParams {
    /// Named device profile (e.g. "iPhone 13", "Pixel 7")
    #[arg(long)]
    pub device: Option<String>,

    /// Viewport width in CSS pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Viewport height in CSS pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Device scale factor for an explicit viewport
    #[arg(long)]
    pub scale: Option<f64>,

    /// Geolocation latitude
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Geolocation longitude
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    /// Geolocation accuracy in meters
    #[arg(long)]
    pub accuracy: Option<f64>,

    /// Locale (takes effect after a session restart)
    #[arg(long)]
    pub locale: Option<String>,

    /// IANA timezone (takes effect after a session restart)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Restore the default desktop viewport
    #[arg(long)]
    pub reset: bool,
}

impl EmulateParams {
    fn validate(&self) -> Result<()> {
        both_or_neither(
            "emulate",
            ("--width", self.width.is_some()),
            ("--height", self.height.is_some()),
        )?;
        both_or_neither(
            "emulate",
            ("--latitude", self.latitude.is_some()),
            ("--longitude", self.longitude.is_some()),
        )?;

        let viewport = self.width.is_some();
        let geolocation = self.latitude.is_some();
        let anything = self.device.is_some()
            || viewport
            || geolocation
            || self.locale.is_some()
            || self.timezone.is_some();

        if self.reset {
            if anything || self.scale.is_some() || self.accuracy.is_some() {
                return Err(Error::usage("emulate: --reset cannot be combined with other settings"));
            }
            return Ok(());
        }
        if !anything {
            return Err(Error::usage(
                "emulate: give --device, --width/--height, --latitude/--longitude, --locale, --timezone or --reset",
            ));
        }
        if self.device.is_some() && viewport {
            return Err(Error::usage("emulate: --device and --width/--height are exclusive"));
        }
        if self.scale.is_some() && !viewport {
            return Err(Error::usage("emulate: --scale requires --width/--height"));
        }
        if self.accuracy.is_some() && !geolocation {
            return Err(Error::usage("emulate: --accuracy requires --latitude/--longitude"));
        }
        if let Some(lat) = self.latitude
            && !(-90.0..=90.0).contains(&lat)
        {
            return Err(Error::usage("emulate: --latitude must be within -90..90"));
        }
        if let Some(lon) = self.longitude
            && !(-180.0..=180.0).contains(&lon)
        {
            return Err(Error::usage("emulate: --longitude must be within -180..180"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CookiesAction {
    List,
    Get,
    Set,
    Delete,
    Clear,
    Export,
    Import,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct CookiesParams {
    #[arg(value_enum)]
    pub action: CookiesAction,

    /// Cookie name
    #[serde(default)]
    #[arg(long)]
    pub name: Option<String>,

    /// Cookie value
    #[serde(default)]
    #[arg(long)]
    pub value: Option<String>,

    /// Cookie domain (list: filter by domain)
    #[serde(default)]
    #[arg(long)]
    pub domain: Option<String>,

    /// Cookie path
    #[serde(default)]
    #[arg(long)]
    pub path: Option<String>,

    /// Expiry in days from now
    #[serde(default)]
    #[arg(long)]
    pub expires_days: Option<f64>,

    /// JSON file for export/import
    #[serde(default)]
    #[arg(long)]
    pub file: Option<String>,
}

impl CookiesParams {
    fn validate(&self) -> Result<()> {
        match self.action {
            CookiesAction::Get | CookiesAction::Delete => {
                require("cookies", "--name", &self.name)?;
            }
            CookiesAction::Set => {
                require("cookies set", "--name", &self.name)?;
                require("cookies set", "--value", &self.value)?;
            }
            CookiesAction::Export | CookiesAction::Import => {
                require("cookies", "--file", &self.file)?;
            }
            CookiesAction::List | CookiesAction::Clear => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageAction {
    Get,
    Set,
    Delete,
    List,
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct StorageParams {
    #[arg(value_enum)]
    pub action: StorageAction,

    /// Storage key
    #[serde(default)]
    #[arg(long)]
    pub key: Option<String>,

    /// Value to store (always a string)
    #[serde(default)]
    #[arg(long)]
    pub value: Option<String>,

    /// Use sessionStorage instead of localStorage
    #[serde(default)]
    #[arg(long)]
    pub session: bool,
}

impl StorageParams {
    fn validate(&self) -> Result<()> {
        match self.action {
            StorageAction::Get | StorageAction::Delete => {
                require("storage", "--key", &self.key)?;
            }
            StorageAction::Set => {
                require("storage set", "--key", &self.key)?;
                require("storage set", "--value", &self.value)?;
            }
            StorageAction::List | StorageAction::Clear => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DialogMode {
    Off,
    Accept,
    Dismiss,
    Fill,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct DialogParams {
    #[arg(value_enum)]
    pub mode: DialogMode,

    /// Prompt answer for 'fill'
    #[serde(default)]
    #[arg(long)]
    pub text: Option<String>,
}

impl DialogParams {
    fn validate(&self) -> Result<()> {
        match (self.mode, &self.text) {
            (DialogMode::Fill, None) => Err(Error::usage("dialog fill: --text is required")),
            (DialogMode::Fill, Some(_)) => Ok(()),
            (_, Some(_)) => Err(Error::usage("dialog: --text only applies to 'fill'")),
            (_, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Exists,
    Visible,
    Hidden,
    Enabled,
    Disabled,
    Checked,
    Unchecked,
    Text,
    Value,
    Count,
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(rename_all = "camelCase")]
pub struct CheckParams {
    /// Assertion to evaluate
    #[arg(value_enum)]
    pub kind: CheckKind,

    /// CSS selector the assertion applies to
    #[serde(default)]
    #[arg(long)]
    pub selector: Option<String>,

    /// Expected text (contains), value (exact) or count (exact)
    #[serde(default)]
    #[arg(long)]
    pub expected: Option<String>,
}

impl CheckParams {
    fn validate(&self) -> Result<()> {
        require("check", "--selector", &self.selector)?;
        match self.kind {
            CheckKind::Text | CheckKind::Value => {
                require("check", "--expected", &self.expected)?;
            }
            CheckKind::Count => {
                let expected = require("check count", "--expected", &self.expected)?;
                expected.trim().parse::<usize>().map_err(|_| {
                    Error::usage(format!(
                        "check count: --expected must be a non-negative integer, got '{}'",
                        expected
                    ))
                })?;
            }
            _ => {
                if self.expected.is_some() {
                    return Err(Error::usage(
                        "check: --expected only applies to text, value and count",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Element target shared by several handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    Text(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "selector '{}'", selector),
            Locator::Text(text) => write!(f, "text '{}'", text),
        }
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;
