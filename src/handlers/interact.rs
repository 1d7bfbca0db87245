//! click, type, mouse, select and scroll

use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{actionable, millis, wait_for_element};
use crate::config;
use crate::engine::{Driver, MouseEventKind, MouseInput, PageId, ScrollOp, Target};
use crate::errors::{Error, Result};
use crate::protocol::{
    ClickParams, Locator, MouseAction, MouseButton, MouseParams, ScrollEdge, ScrollParams,
    ScrollRequest, SelectParams, TypeParams,
};
use crate::session::SessionState;

/// Press options shared by `click` and click-mode `download`
#[derive(Debug, Clone, Copy)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub count: u32,
    pub delay: Duration,
    pub force: bool,
    pub timeout: Duration,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            count: 1,
            delay: Duration::ZERO,
            force: false,
            timeout: config::DEFAULT_ACTION_TIMEOUT,
        }
    }
}

async fn press_at(driver: &dyn Driver, page: &PageId, x: f64, y: f64, options: &ClickOptions) -> Result<()> {
    driver.mouse(page, MouseInput::moved(x, y)).await?;
    for n in 1..=options.count {
        driver
            .mouse(page, MouseInput::button(MouseEventKind::Down, x, y, options.button, n))
            .await?;
        if !options.delay.is_zero() {
            sleep(options.delay).await;
        }
        driver
            .mouse(page, MouseInput::button(MouseEventKind::Up, x, y, options.button, n))
            .await?;
    }
    Ok(())
}

/// Viewport center of the `index`-th match after scrolling it into view
async fn element_center(driver: &dyn Driver, target: &Target, locator: &Locator, index: usize) -> Result<Option<(f64, f64)>> {
    driver.scroll_into_view(target, locator, index).await?;
    let elements = driver.query(target, locator).await?;
    Ok(elements
        .get(index)
        .and_then(|e| e.bounds)
        .filter(|b| !b.is_empty())
        .map(|b| b.center()))
}

/// Wait for `locator` to be actionable (or merely present when forced) and click it.
pub async fn click_element(driver: &dyn Driver, target: &Target, locator: &Locator, options: &ClickOptions) -> Result<()> {
    let (index, _) = if options.force {
        wait_for_element(driver, target, locator, options.timeout, "to exist", |_| true).await?
    } else {
        wait_for_element(
            driver,
            target,
            locator,
            options.timeout,
            "to be visible and enabled",
            actionable,
        )
        .await?
    };

    match element_center(driver, target, locator, index).await? {
        Some((x, y)) => {
            debug!("Clicking {} at ({:.0}, {:.0})", locator, x, y);
            press_at(driver, &target.page, x, y, options).await
        }
        None if options.force => {
            debug!("{} has no layout box, falling back to a DOM click", locator);
            driver.dom_click(target, locator, index).await
        }
        None => Err(Error::not_found(format!("{} has no clickable area", locator))),
    }
}

pub async fn handle_click(state: &mut SessionState, params: ClickParams) -> Result<Value> {
    let target = state.target().await?;
    let driver = state.driver();
    let options = ClickOptions {
        button: params.button.unwrap_or_default(),
        count: params.count.unwrap_or(1),
        delay: Duration::from_millis(params.delay.unwrap_or(0)),
        force: params.force,
        timeout: millis(params.timeout, config::DEFAULT_ACTION_TIMEOUT),
    };

    if let (Some(x), Some(y)) = (params.x, params.y) {
        press_at(driver.as_ref(), &target.page, x, y, &options).await?;
        return Ok(json!({
            "clicked": { "x": x, "y": y },
            "button": options.button,
            "count": options.count,
        }));
    }

    let locator = match (params.selector, params.text) {
        (Some(selector), _) => Locator::Css(selector),
        (None, Some(text)) => Locator::Text(text),
        (None, None) => return Err(Error::usage("click: --selector, --text or --x/--y is required")),
    };
    click_element(driver.as_ref(), &target, &locator, &options).await?;
    info!("Clicked {}", locator);
    Ok(json!({
        "clicked": locator.to_string(),
        "button": options.button,
        "count": options.count,
    }))
}

pub async fn handle_type(state: &mut SessionState, params: TypeParams) -> Result<Value> {
    let target = state.target().await?;
    let driver = state.driver();

    if let Some(key) = params.key {
        driver.press_key(&target.page, &key).await?;
        return Ok(json!({ "pressed": key }));
    }

    let (Some(selector), Some(text)) = (params.selector, params.text) else {
        return Err(Error::usage("type: --key or --selector/--text is required"));
    };
    let timeout = millis(params.timeout, config::DEFAULT_ACTION_TIMEOUT);
    let locator = Locator::Css(selector.clone());
    wait_for_element(driver.as_ref(), &target, &locator, timeout, "to be editable", actionable).await?;

    driver.focus(&target, &selector, params.clear).await?;
    driver.insert_text(&target.page, &text).await?;
    if params.submit {
        driver.press_key(&target.page, "Enter").await?;
    }
    Ok(json!({
        "typed": text,
        "selector": selector,
        "cleared": params.clear,
        "submitted": params.submit,
    }))
}

/// Center of a visible element matched by CSS selector
async fn visible_center(driver: &dyn Driver, target: &Target, selector: &str, timeout: Duration) -> Result<(f64, f64)> {
    let locator = Locator::Css(selector.to_string());
    let (index, _) = wait_for_element(driver, target, &locator, timeout, "to be visible", |e| e.visible).await?;
    element_center(driver, target, &locator, index)
        .await?
        .ok_or_else(|| Error::not_found(format!("{} has no layout box", locator)))
}

pub async fn handle_mouse(state: &mut SessionState, params: MouseParams) -> Result<Value> {
    let target = state.target().await?;
    let driver = state.driver();
    let driver = driver.as_ref();
    let page = &target.page;
    let timeout = millis(params.timeout, config::DEFAULT_ACTION_TIMEOUT);

    match params.action {
        MouseAction::Hover => {
            let (x, y) = match (&params.selector, params.x, params.y) {
                (Some(selector), _, _) => visible_center(driver, &target, selector, timeout).await?,
                (None, Some(x), Some(y)) => (x, y),
                _ => return Err(Error::usage("mouse hover: --selector or --x/--y is required")),
            };
            driver.mouse(page, MouseInput::moved(x, y)).await?;
            Ok(json!({ "action": "hover", "x": x, "y": y }))
        }
        MouseAction::Drag => {
            let (Some(from), Some(to)) = (&params.from, &params.to) else {
                return Err(Error::usage("mouse drag: --from and --to are required"));
            };
            let (sx, sy) = visible_center(driver, &target, from, timeout).await?;
            driver.mouse(page, MouseInput::moved(sx, sy)).await?;
            driver
                .mouse(page, MouseInput::button(MouseEventKind::Down, sx, sy, MouseButton::Left, 1))
                .await?;

            let (tx, ty) = visible_center(driver, &target, to, timeout).await?;
            let steps = params.steps.unwrap_or(10).max(1);
            for step in 1..=steps {
                let t = f64::from(step) / f64::from(steps);
                driver
                    .mouse(page, MouseInput::moved(sx + (tx - sx) * t, sy + (ty - sy) * t))
                    .await?;
            }
            driver
                .mouse(page, MouseInput::button(MouseEventKind::Up, tx, ty, MouseButton::Left, 1))
                .await?;
            Ok(json!({ "action": "drag", "from": from, "to": to, "steps": steps }))
        }
        MouseAction::Move => {
            let (Some(x), Some(y)) = (params.x, params.y) else {
                return Err(Error::usage("mouse move: --x and --y are required"));
            };
            driver.mouse(page, MouseInput::moved(x, y)).await?;
            Ok(json!({ "action": "move", "x": x, "y": y }))
        }
        MouseAction::Wheel => {
            let (width, height) = state
                .viewport()
                .map(|v| (v.width, v.height))
                .unwrap_or(config::DEFAULT_VIEWPORT);
            let x = params.x.unwrap_or(f64::from(width) / 2.0);
            let y = params.y.unwrap_or(f64::from(height) / 2.0);
            let dx = params.dx.unwrap_or(0.0);
            let dy = params.dy.unwrap_or(0.0);
            driver.mouse(page, MouseInput::wheel(x, y, dx, dy)).await?;
            Ok(json!({ "action": "wheel", "dx": dx, "dy": dy }))
        }
    }
}

pub async fn handle_select(state: &mut SessionState, params: SelectParams) -> Result<Value> {
    let choice = params.validate()?;
    let Some(selector) = params.selector else {
        return Err(Error::usage("select: --selector is required"));
    };
    let target = state.target().await?;
    let driver = state.driver();
    let timeout = millis(params.timeout, config::DEFAULT_ACTION_TIMEOUT);

    let (_, element) = wait_for_element(
        driver.as_ref(),
        &target,
        &Locator::Css(selector.clone()),
        timeout,
        "to exist",
        |_| true,
    )
    .await?;
    if element.tag != "select" {
        return Err(Error::not_found(format!(
            "'{}' is a <{}>, not a native <select>",
            selector, element.tag
        )));
    }

    match choice {
        None => {
            let options = driver.select_options(&target, &selector).await?;
            Ok(json!({ "selector": selector, "options": options }))
        }
        Some(choice) => {
            let selected = driver.choose_option(&target, &selector, &choice).await?;
            info!("Selected '{}' in {}", selected.label, selector);
            Ok(json!({ "selector": selector, "selected": selected }))
        }
    }
}

pub async fn handle_scroll(state: &mut SessionState, params: ScrollParams) -> Result<Value> {
    let request = params.validate()?;
    let target = state.target().await?;
    let driver = state.driver();

    let (scrolled, op) = match request {
        ScrollRequest::Infinite { max, delay_ms } => {
            return infinite_scroll(driver.as_ref(), &target, max, Duration::from_millis(delay_ms)).await;
        }
        ScrollRequest::Edge(edge) => (json!(edge), ScrollOp::Edge(edge)),
        ScrollRequest::IntoView(selector) => {
            let locator = Locator::Css(selector.clone());
            wait_for_element(
                driver.as_ref(),
                &target,
                &locator,
                config::DEFAULT_ACTION_TIMEOUT,
                "to exist",
                |_| true,
            )
            .await?;
            (json!(selector), ScrollOp::IntoView(locator))
        }
        ScrollRequest::By { dx, dy } => (json!({ "dx": dx, "dy": dy }), ScrollOp::By { dx, dy }),
    };

    let metrics = driver.scroll(&target, &op).await?;
    Ok(json!({
        "scrolled": scrolled,
        "scrollX": metrics.scroll_x,
        "scrollY": metrics.scroll_y,
        "scrollHeight": metrics.scroll_height,
    }))
}

/// Scroll to the bottom until the page stops growing or `max` attempts are spent.
async fn infinite_scroll(driver: &dyn Driver, target: &Target, max: u32, delay: Duration) -> Result<Value> {
    let mut height = driver.scroll_metrics(target).await?.scroll_height;
    let mut iterations = 0u32;
    let mut attempts = 0u32;

    while attempts < max {
        attempts += 1;
        driver.scroll(target, &ScrollOp::Edge(ScrollEdge::Bottom)).await?;
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let grown = driver.scroll_metrics(target).await?.scroll_height;
        if grown <= height {
            break;
        }
        debug!("Page grew from {} to {}px", height, grown);
        height = grown;
        iterations += 1;
    }

    info!("Infinite scroll: {} growth iterations in {} attempts", iterations, attempts);
    Ok(json!({
        "scrolled": "infinite",
        "iterations": iterations,
        "attempts": attempts,
        "scrollHeight": height,
    }))
}
