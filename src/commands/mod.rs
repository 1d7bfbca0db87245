//! CLI subcommand handlers.
//!
//! Each handler returns the JSON document the binary prints on stdout.

pub mod action;
pub mod profile;
pub mod session;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Result;

/// Serialize `value` as a `{success: true, ...}` reply
pub(crate) fn reply(value: impl Serialize) -> Result<Value> {
    let mut out = Map::new();
    out.insert("success".to_string(), Value::Bool(true));
    match serde_json::to_value(value)? {
        Value::Object(fields) => out.extend(fields),
        Value::Null => {}
        other => {
            out.insert("result".to_string(), other);
        }
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
