//! Mutable state shared by every command handler.
//!
//! The server owns exactly one [`SessionState`] behind a mutex and hands it
//! `&mut` to each handler, so active tab, active frame, dialog policy and
//! capture buffers only change one command at a time.

pub mod capture;
pub mod dialog;

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{Driver, FrameInfo, PageId, Target, ViewportSpec};
use crate::errors::Result;
use crate::profile::ProfileStore;
use capture::{Capture, ConsoleLog, NetworkLog};
use dialog::{DialogListener, DialogPolicy};

pub struct SessionState {
    driver: Arc<dyn Driver>,
    active_page: Option<PageId>,
    active_frame: Option<FrameInfo>,
    dialog_policy: DialogPolicy,
    dialog_listener: Option<DialogListener>,
    pub network: Capture<NetworkLog>,
    pub console: Capture<ConsoleLog>,
    blocked: BTreeSet<String>,
    viewport: Option<ViewportSpec>,
    profile: String,
    profiles: Option<ProfileStore>,
}

impl SessionState {
    pub fn new(driver: Arc<dyn Driver>, profile: impl Into<String>, profiles: Option<ProfileStore>) -> Self {
        Self {
            driver,
            active_page: None,
            active_frame: None,
            dialog_policy: DialogPolicy::Off,
            dialog_listener: None,
            network: Capture::default(),
            console: Capture::default(),
            blocked: BTreeSet::new(),
            viewport: None,
            profile: profile.into(),
            profiles,
        }
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    pub fn profiles(&self) -> Option<&ProfileStore> {
        self.profiles.as_ref()
    }

    /// The active tab, revalidated against the browser.
    ///
    /// A tab that was closed behind our back is replaced by the most recently
    /// listed one, or by a fresh blank tab when none are left.
    pub async fn page(&mut self) -> Result<PageId> {
        let pages = self.driver.pages().await?;
        if let Some(active) = &self.active_page
            && pages.iter().any(|p| &p.id == active)
        {
            return Ok(active.clone());
        }

        let next = match pages.last() {
            Some(page) => page.id.clone(),
            None => {
                info!("No tabs left, opening a blank one");
                self.driver.new_page(None).await?
            }
        };
        if let Some(gone) = &self.active_page {
            warn!("Active tab {} is gone, switching to {}", gone, next);
        }
        self.set_active_page(next.clone());
        Ok(next)
    }

    /// The tab id without revalidation, for cheap status reads
    pub fn active_page_id(&self) -> Option<&PageId> {
        self.active_page.as_ref()
    }

    /// Make `page` active. The frame always resets to main and the dialog
    /// listener follows the page.
    pub fn set_active_page(&mut self, page: PageId) {
        if self.active_frame.take().is_some() {
            debug!("Active frame reset to main");
        }
        self.active_page = Some(page.clone());
        self.attach_dialog_listener(&page);
    }

    fn attach_dialog_listener(&mut self, page: &PageId) {
        if self.dialog_policy == DialogPolicy::Off {
            self.dialog_listener = None;
            return;
        }
        if self
            .dialog_listener
            .as_ref()
            .is_some_and(|listener| listener.page() == page)
        {
            return;
        }
        // Dropping un-routes the old page, so it must happen before installing
        self.dialog_listener = None;
        self.dialog_listener = Some(DialogListener::install(
            self.driver.clone(),
            page.clone(),
            self.dialog_policy.clone(),
        ));
    }

    /// Page and frame element commands operate on.
    ///
    /// A selected frame that no longer exists falls back to the main frame.
    pub async fn target(&mut self) -> Result<Target> {
        let page = self.page().await?;
        let Some(selected) = self.active_frame.clone() else {
            return Ok(Target::main(page));
        };

        let frames = self.driver.frames(&page).await?;
        match frames.into_iter().find(|f| f.id == selected.id) {
            Some(current) => {
                let frame = current.id.clone();
                self.active_frame = Some(current);
                Ok(Target {
                    page,
                    frame: Some(frame),
                })
            }
            None => {
                warn!(
                    "Frame '{}' ({}) is detached, resetting to main frame",
                    selected.name, selected.url
                );
                self.active_frame = None;
                Ok(Target::main(page))
            }
        }
    }

    pub fn active_frame(&self) -> Option<&FrameInfo> {
        self.active_frame.as_ref()
    }

    pub fn set_active_frame(&mut self, frame: FrameInfo) {
        info!("Switched to frame '{}' ({})", frame.name, frame.url);
        self.active_frame = Some(frame);
    }

    pub fn reset_frame(&mut self) {
        self.active_frame = None;
    }

    pub fn dialog_policy(&self) -> &DialogPolicy {
        &self.dialog_policy
    }

    /// Replace the dialog policy, keeping at most one listener installed.
    pub async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> Result<()> {
        self.dialog_listener = None;
        self.dialog_policy = policy;
        let page = self.page().await?;
        self.attach_dialog_listener(&page);
        Ok(())
    }

    pub fn has_dialog_listener(&self) -> bool {
        self.dialog_listener.is_some()
    }

    pub fn blocked(&self) -> &BTreeSet<String> {
        &self.blocked
    }

    /// Add a blocked URL glob; returns `false` if it was already blocked.
    pub async fn block(&mut self, pattern: &str) -> Result<bool> {
        if self.blocked.contains(pattern) {
            return Ok(false);
        }
        let mut next = self.blocked.clone();
        next.insert(pattern.to_string());
        let patterns: Vec<String> = next.iter().cloned().collect();
        self.driver.set_blocked(&patterns).await?;
        self.blocked = next;
        Ok(true)
    }

    /// Remove every blocking rule, returning how many there were.
    pub async fn unblock_all(&mut self) -> Result<usize> {
        self.driver.set_blocked(&[]).await?;
        let count = self.blocked.len();
        self.blocked.clear();
        Ok(count)
    }

    pub fn viewport(&self) -> Option<&ViewportSpec> {
        self.viewport.as_ref()
    }

    pub fn set_viewport(&mut self, viewport: Option<ViewportSpec>) {
        self.viewport = viewport;
    }

    /// URL of the active tab, without switching tabs
    pub async fn current_url(&self) -> Option<String> {
        let page = self.active_page.as_ref()?;
        self.driver.page_info(page).await.ok().map(|info| info.url)
    }

    /// Stop captures and listeners, then close the browser.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.network.abort();
        self.console.abort();
        self.dialog_listener = None;
        self.driver.shutdown().await
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
