use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{DialogKind, Driver, EngineEvent, PageId};
use crate::protocol::DialogMode;

/// How native alert/confirm/prompt dialogs are answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "text", rename_all = "lowercase")]
pub enum DialogPolicy {
    Off,
    Accept,
    Dismiss,
    Fill(String),
}

impl DialogPolicy {
    pub fn from_mode(mode: DialogMode, text: Option<String>) -> Self {
        match mode {
            DialogMode::Off => DialogPolicy::Off,
            DialogMode::Accept => DialogPolicy::Accept,
            DialogMode::Dismiss => DialogPolicy::Dismiss,
            DialogMode::Fill => DialogPolicy::Fill(text.unwrap_or_default()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DialogPolicy::Off => "off",
            DialogPolicy::Accept => "accept",
            DialogPolicy::Dismiss => "dismiss",
            DialogPolicy::Fill(_) => "fill",
        }
    }

    /// `(accept, prompt text)` for a dialog of `kind`
    fn answer(&self, kind: DialogKind, default_prompt: Option<String>) -> (bool, Option<String>) {
        match self {
            DialogPolicy::Off | DialogPolicy::Dismiss => (false, None),
            DialogPolicy::Accept => (true, default_prompt.filter(|_| kind == DialogKind::Prompt)),
            DialogPolicy::Fill(text) => match kind {
                DialogKind::Prompt => (true, Some(text.clone())),
                _ => (true, None),
            },
        }
    }
}

/// The single dialog handler installed on a page.
///
/// Dropping the listener stops its task and hands the page's dialogs back to
/// the engine default.
pub struct DialogListener {
    page: PageId,
    driver: Arc<dyn Driver>,
    task: JoinHandle<()>,
}

impl DialogListener {
    pub fn install(driver: Arc<dyn Driver>, page: PageId, policy: DialogPolicy) -> Self {
        let mut events = driver.events();
        driver.route_dialogs(&page, true);
        info!("Dialog policy '{}' installed on {}", policy.name(), page);

        let task = {
            let driver = driver.clone();
            let page = page.clone();
            tokio::spawn(async move {
                loop {
                    let event = match events.recv().await {
                        Ok(event) => event,
                        Err(RecvError::Lagged(missed)) => {
                            warn!("Dialog listener lagged by {} events", missed);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    let EngineEvent::Dialog {
                        page: from,
                        kind,
                        message,
                        default_prompt,
                    } = event
                    else {
                        continue;
                    };
                    if from != page {
                        continue;
                    }
                    let (accept, text) = policy.answer(kind, default_prompt);
                    debug!(
                        "{:?} dialog '{}' on {}: accept={}",
                        kind, message, page, accept
                    );
                    if let Err(err) = driver.respond_dialog(&page, accept, text).await {
                        warn!("Failed to answer dialog: {}", err);
                    }
                }
            })
        };

        Self { page, driver, task }
    }

    pub fn page(&self) -> &PageId {
        &self.page
    }
}

impl Drop for DialogListener {
    fn drop(&mut self) {
        self.task.abort();
        self.driver.route_dialogs(&self.page, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        let fill = DialogPolicy::Fill("Ada".into());
        assert_eq!(fill.answer(DialogKind::Prompt, None), (true, Some("Ada".into())));
        assert_eq!(fill.answer(DialogKind::Confirm, None), (true, None));

        assert_eq!(
            DialogPolicy::Accept.answer(DialogKind::Prompt, Some("x".into())),
            (true, Some("x".into()))
        );
        assert_eq!(
            DialogPolicy::Accept.answer(DialogKind::Alert, Some("x".into())),
            (true, None)
        );
        assert_eq!(
            DialogPolicy::Dismiss.answer(DialogKind::Confirm, None),
            (false, None)
        );
    }
}
