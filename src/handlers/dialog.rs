use serde_json::{Value, json};
use tracing::info;

use crate::errors::Result;
use crate::protocol::DialogParams;
use crate::session::SessionState;
use crate::session::dialog::DialogPolicy;

pub async fn handle_dialog(state: &mut SessionState, params: DialogParams) -> Result<Value> {
    let policy = DialogPolicy::from_mode(params.mode, params.text);
    let mode = policy.name();
    state.set_dialog_policy(policy.clone()).await?;
    info!("Dialog policy set to '{}'", mode);

    Ok(match policy {
        DialogPolicy::Fill(text) => json!({ "mode": mode, "text": text }),
        _ => json!({ "mode": mode }),
    })
}
