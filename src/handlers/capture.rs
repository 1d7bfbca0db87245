//! network and console capture

use serde_json::{Value, json};
use tracing::info;

use crate::errors::{Error, Result};
use crate::protocol::{CaptureAction, ConsoleParams, NetworkAction, NetworkParams};
use crate::session::SessionState;

pub async fn handle_network(state: &mut SessionState, params: NetworkParams) -> Result<Value> {
    match params.action {
        NetworkAction::Start => {
            let events = state.driver().events();
            state.network.start(events);
            info!("Network capture started");
            Ok(json!({ "capturing": true }))
        }
        NetworkAction::Stop => {
            let entries = state
                .network
                .stop()
                .await
                .map(|log| log.into_entries())
                .unwrap_or_default();
            info!("Network capture stopped with {} entries", entries.len());
            Ok(json!({ "capturing": false, "count": entries.len(), "entries": entries }))
        }
        NetworkAction::Block => {
            let pattern = params
                .pattern
                .ok_or_else(|| Error::usage("network block: --pattern is required"))?;
            let added = state.block(&pattern).await?;
            Ok(json!({ "pattern": pattern, "added": added, "blocked": state.blocked() }))
        }
        NetworkAction::Unblock => {
            let removed = state.unblock_all().await?;
            Ok(json!({ "removed": removed, "blocked": state.blocked() }))
        }
    }
}

pub async fn handle_console(state: &mut SessionState, params: ConsoleParams) -> Result<Value> {
    match params.action {
        CaptureAction::Start => {
            let events = state.driver().events();
            state.console.start(events);
            info!("Console capture started");
            Ok(json!({ "capturing": true }))
        }
        CaptureAction::Stop => {
            let entries = state
                .console
                .stop()
                .await
                .map(|log| log.into_entries())
                .unwrap_or_default();
            Ok(json!({ "capturing": false, "count": entries.len(), "entries": entries }))
        }
    }
}
