use serde_json::{Value, json};

use crate::engine::{StorageArea, StorageOp};
use crate::errors::{Error, Result};
use crate::protocol::{StorageAction, StorageParams};
use crate::session::SessionState;

pub async fn handle_storage(state: &mut SessionState, params: StorageParams) -> Result<Value> {
    let area = if params.session {
        StorageArea::Session
    } else {
        StorageArea::Local
    };
    let key = || {
        params
            .key
            .clone()
            .ok_or_else(|| Error::usage("storage: --key is required"))
    };
    let op = match params.action {
        StorageAction::Get => StorageOp::Get(key()?),
        StorageAction::Set => StorageOp::Set(
            key()?,
            params
                .value
                .clone()
                .ok_or_else(|| Error::usage("storage set: --value is required"))?,
        ),
        StorageAction::Delete => StorageOp::Delete(key()?),
        StorageAction::List => StorageOp::List,
        StorageAction::Clear => StorageOp::Clear,
    };

    let target = state.target().await?;
    let result = state.driver().storage(&target, area, &op).await?;
    let storage = area.js_name();

    Ok(match op {
        StorageOp::Get(key) => json!({ "storage": storage, "key": key, "value": result }),
        StorageOp::Set(key, value) => json!({ "storage": storage, "key": key, "value": value }),
        StorageOp::Delete(key) => json!({ "storage": storage, "key": key, "deleted": result }),
        StorageOp::List => {
            let count = result.as_object().map_or(0, |items| items.len());
            json!({ "storage": storage, "items": result, "count": count })
        }
        StorageOp::Clear => json!({ "storage": storage, "cleared": result }),
    })
}
