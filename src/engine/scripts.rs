//! Page-side JavaScript used by the CDP driver.
//!
//! Every script is an expression that evaluates to `{ok: value}` or
//! `{notFound: message}`. Arguments are injected as a JSON literal bound to
//! `args`, so selectors never need quoting.

use serde_json::{Value, json};

use crate::errors::{Error, Result};
use crate::protocol::{Locator, OptionChoice, ScrollEdge};

use super::{ContentKind, ScrollOp, StorageArea, StorageOp};

const PRELUDE: &str = r#"
const find = (loc) => {
  if (loc.css !== undefined) {
    try {
      return Array.from(document.querySelectorAll(loc.css));
    } catch (e) {
      throw new Error('Invalid selector: ' + loc.css);
    }
  }
  if (!document.body) return [];
  const skip = ['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE'];
  const label = (el) => {
    const own = el.innerText || el.textContent || '';
    if (el.tagName === 'INPUT' && ['button', 'submit', 'reset'].includes(el.type)) {
      return own + ' ' + (el.value || '');
    }
    return own;
  };
  const hits = Array.from(document.body.querySelectorAll('*'))
    .filter((el) => !skip.includes(el.tagName) && label(el).includes(loc.text));
  return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
};
const nth = (loc, index) => {
  const all = find(loc);
  if (index >= all.length) {
    const what = loc.css !== undefined ? "selector '" + loc.css + "'" : "text '" + loc.text + "'";
    return { missing: 'No element matches ' + what + (index > 0 ? ' at index ' + index : '') };
  }
  return { el: all[index] };
};
const one = (selector) => nth({ css: selector }, 0);
const describe = (el) => {
  const r = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  const visible = r.width > 0 && r.height > 0 &&
    style.visibility !== 'hidden' && style.display !== 'none';
  const disabled = el.disabled === true || el.closest('fieldset[disabled]') !== null ||
    el.getAttribute('aria-disabled') === 'true';
  return {
    tag: el.tagName.toLowerCase(),
    visible,
    enabled: !disabled,
    checked: el.checked === true || el.getAttribute('aria-checked') === 'true',
    text: (el.innerText || el.textContent || '').trim(),
    value: 'value' in el && el.value !== undefined ? String(el.value) : null,
    bounds: { x: r.x, y: r.y, width: r.width, height: r.height },
    multiple: el.multiple === true,
  };
};
const metrics = () => {
  const root = document.scrollingElement || document.documentElement;
  return {
    scrollX: window.scrollX,
    scrollY: window.scrollY,
    scrollHeight: root ? root.scrollHeight : 0,
    viewportHeight: window.innerHeight,
  };
};
"#;

fn wrap(args: Value, body: &str) -> String {
    format!("(() => {{\n{PRELUDE}\nconst args = {args};\n{body}\n}})()")
}

fn locator_json(locator: &Locator) -> Value {
    match locator {
        Locator::Css(css) => json!({ "css": css }),
        Locator::Text(text) => json!({ "text": text }),
    }
}

/// Unpack an `{ok}` / `{notFound}` reply
pub fn unwrap_reply(reply: Value) -> Result<Value> {
    match reply {
        Value::Object(mut map) => {
            if let Some(Value::String(msg)) = map.remove("notFound") {
                return Err(Error::not_found(msg));
            }
            Ok(map.remove("ok").unwrap_or(Value::Null))
        }
        other => Err(Error::engine(format!("Unexpected script reply: {}", other))),
    }
}

pub fn query(locator: &Locator) -> String {
    wrap(
        json!({ "loc": locator_json(locator) }),
        "return { ok: find(args.loc).map(describe) };",
    )
}

pub fn scroll_into_view(locator: &Locator, index: usize) -> String {
    wrap(
        json!({ "loc": locator_json(locator), "index": index }),
        r#"
const hit = nth(args.loc, args.index);
if (hit.missing) return { notFound: hit.missing };
hit.el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
return { ok: true };
"#,
    )
}

pub fn dom_click(locator: &Locator, index: usize) -> String {
    wrap(
        json!({ "loc": locator_json(locator), "index": index }),
        r#"
const hit = nth(args.loc, args.index);
if (hit.missing) return { notFound: hit.missing };
hit.el.click();
return { ok: true };
"#,
    )
}

pub fn focus(selector: &str, clear: bool) -> String {
    wrap(
        json!({ "selector": selector, "clear": clear }),
        r#"
const hit = one(args.selector);
if (hit.missing) return { notFound: hit.missing };
const el = hit.el;
el.scrollIntoView({ block: 'center', behavior: 'instant' });
el.focus();
if (args.clear) {
  if ('value' in el) {
    el.value = '';
  } else if (el.isContentEditable) {
    el.textContent = '';
  }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
}
if (typeof el.setSelectionRange === 'function') {
  try {
    const end = (el.value || '').length;
    el.setSelectionRange(end, end);
  } catch (e) {}
}
return { ok: true };
"#,
    )
}

const READ_OPTIONS: &str = r#"
const hit = one(args.selector);
if (hit.missing) return { notFound: hit.missing };
const el = hit.el;
if (el.tagName !== 'SELECT') return { notFound: "Element '" + args.selector + "' is not a <select>" };
const options = () => Array.from(el.options).map((o, index) => ({
  index,
  value: o.value,
  label: (o.label || o.text || '').trim(),
  selected: o.selected,
}));
"#;

pub fn select_options(selector: &str) -> String {
    wrap(
        json!({ "selector": selector }),
        &format!("{READ_OPTIONS}\nreturn {{ ok: options() }};"),
    )
}

pub fn choose_option(selector: &str, choice: &OptionChoice) -> String {
    let (by, wanted) = match choice {
        OptionChoice::Value(v) => ("value", json!(v)),
        OptionChoice::Label(l) => ("label", json!(l)),
        OptionChoice::Index(i) => ("index", json!(i)),
    };
    wrap(
        json!({ "selector": selector, "by": by, "wanted": wanted }),
        &format!(
            "{READ_OPTIONS}\n{}",
            r#"
const all = options();
const pick = all.find((o) => o[args.by] === args.wanted);
if (!pick) return { notFound: 'No option with ' + args.by + ' ' + JSON.stringify(args.wanted) + ' in ' + args.selector };
el.selectedIndex = pick.index;
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return { ok: { ...pick, selected: true } };
"#
        ),
    )
}

pub fn scroll(op: &ScrollOp) -> String {
    let args = match op {
        ScrollOp::Edge(ScrollEdge::Top) => json!({ "mode": "top" }),
        ScrollOp::Edge(ScrollEdge::Bottom) => json!({ "mode": "bottom" }),
        ScrollOp::By { dx, dy } => json!({ "mode": "by", "dx": dx, "dy": dy }),
        ScrollOp::IntoView(locator) => json!({ "mode": "into", "loc": locator_json(locator) }),
    };
    wrap(
        args,
        r#"
const root = document.scrollingElement || document.documentElement;
if (args.mode === 'top') {
  window.scrollTo(window.scrollX, 0);
} else if (args.mode === 'bottom') {
  window.scrollTo(window.scrollX, root.scrollHeight);
} else if (args.mode === 'by') {
  window.scrollBy(args.dx, args.dy);
} else {
  const hit = nth(args.loc, 0);
  if (hit.missing) return { notFound: hit.missing };
  hit.el.scrollIntoView({ block: 'center', behavior: 'instant' });
}
return { ok: metrics() };
"#,
    )
}

pub fn scroll_metrics() -> String {
    wrap(json!({}), "return { ok: metrics() };")
}

pub fn content(selector: Option<&str>, kind: ContentKind) -> String {
    let kind = match kind {
        ContentKind::Html => "html",
        ContentKind::Text => "text",
    };
    wrap(
        json!({ "selector": selector, "kind": kind }),
        r#"
let el = args.kind === 'html' ? document.documentElement : document.body;
if (args.selector !== null) {
  const hit = one(args.selector);
  if (hit.missing) return { notFound: hit.missing };
  el = hit.el;
}
if (!el) return { ok: '' };
return { ok: args.kind === 'html' ? el.outerHTML : (el.innerText || el.textContent || '') };
"#,
    )
}

/// Bare element reference for CDP calls that need a remote object
pub fn element(selector: &str) -> String {
    format!(
        "(() => {{\n{PRELUDE}\nconst hit = one({});\nreturn hit.el || null;\n}})()",
        json!(selector)
    )
}

pub fn storage(area: StorageArea, op: &StorageOp) -> String {
    let args = match op {
        StorageOp::Get(key) => json!({ "op": "get", "key": key }),
        StorageOp::Set(key, value) => json!({ "op": "set", "key": key, "value": value }),
        StorageOp::Delete(key) => json!({ "op": "delete", "key": key }),
        StorageOp::List => json!({ "op": "list" }),
        StorageOp::Clear => json!({ "op": "clear" }),
    };
    let body = format!(
        r#"
const store = window.{};
switch (args.op) {{
  case 'get': return {{ ok: store.getItem(args.key) }};
  case 'set': store.setItem(args.key, args.value); return {{ ok: args.value }};
  case 'delete': {{
    const existed = store.getItem(args.key) !== null;
    store.removeItem(args.key);
    return {{ ok: existed }};
  }}
  case 'list': {{
    const items = {{}};
    for (let i = 0; i < store.length; i++) {{
      const key = store.key(i);
      items[key] = store.getItem(key);
    }}
    return {{ ok: items }};
  }}
  default: {{
    const count = store.length;
    store.clear();
    return {{ ok: count }};
  }}
}}
"#,
        area.js_name()
    );
    wrap(args, &body)
}
