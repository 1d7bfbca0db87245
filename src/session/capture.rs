//! Network and console capture buffers.
//!
//! A capture is a collector task fed by a fresh engine event subscription.
//! Only one generation is live per buffer: starting again discards the old
//! task and its entries.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::EngineEvent;

/// Something that folds engine events into a buffer
pub trait Collector: Default + Send + 'static {
    fn collect(&mut self, event: EngineEvent);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Generation<T> {
    stop: oneshot::Sender<()>,
    task: JoinHandle<T>,
}

pub struct Capture<T: Collector> {
    live: Option<Generation<T>>,
}

impl<T: Collector> Default for Capture<T> {
    fn default() -> Self {
        Self { live: None }
    }
}

impl<T: Collector> Capture<T> {
    pub fn is_active(&self) -> bool {
        self.live.is_some()
    }

    /// Begin a new generation on `events`, discarding any previous one.
    pub fn start(&mut self, events: broadcast::Receiver<EngineEvent>) {
        if let Some(previous) = self.live.take() {
            debug!("Restarting capture, discarding the previous buffer");
            previous.task.abort();
        }
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(collect_until(events, stopped));
        self.live = Some(Generation { stop, task });
    }

    /// End the live generation and hand back its buffer.
    ///
    /// Returns `None` when nothing was capturing.
    pub async fn stop(&mut self) -> Option<T> {
        let generation = self.live.take()?;
        let _ = generation.stop.send(());
        match generation.task.await {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                warn!("Capture task failed: {}", err);
                Some(T::default())
            }
        }
    }

    pub fn abort(&mut self) {
        if let Some(generation) = self.live.take() {
            generation.task.abort();
        }
    }
}

impl<T: Collector> Drop for Capture<T> {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn collect_until<T: Collector>(
    mut events: broadcast::Receiver<EngineEvent>,
    mut stopped: oneshot::Receiver<()>,
) -> T {
    let mut buffer = T::default();
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => buffer.collect(event),
                Err(RecvError::Lagged(missed)) => warn!("Capture lagged, {} events lost", missed),
                Err(RecvError::Closed) => return buffer,
            },
            _ = &mut stopped => break,
        }
    }

    // Events published before the stop request are still queued
    loop {
        match events.try_recv() {
            Ok(event) => buffer.collect(event),
            Err(TryRecvError::Lagged(missed)) => warn!("Capture lagged, {} events lost", missed),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    buffer
}

/// One request with its response or failure folded in
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct NetworkLog {
    entries: Vec<NetworkEntry>,
    by_id: HashMap<String, usize>,
}

impl NetworkLog {
    pub fn into_entries(self) -> Vec<NetworkEntry> {
        self.entries
    }
}

impl Collector for NetworkLog {
    fn collect(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Request {
                id,
                method,
                url,
                resource_type,
                ..
            } => {
                if self.by_id.contains_key(&id) {
                    return;
                }
                self.by_id.insert(id, self.entries.len());
                self.entries.push(NetworkEntry {
                    method,
                    url,
                    resource_type,
                    status: None,
                    status_text: None,
                    mime_type: None,
                    failure: None,
                    timestamp: Utc::now().to_rfc3339(),
                });
            }
            EngineEvent::Response {
                id,
                status,
                status_text,
                mime_type,
                ..
            } => {
                if let Some(entry) = self.by_id.get(&id).and_then(|&i| self.entries.get_mut(i)) {
                    entry.status = Some(status);
                    entry.status_text = Some(status_text);
                    entry.mime_type = Some(mime_type);
                }
            }
            EngineEvent::RequestFailed { id, error, .. } => {
                if let Some(entry) = self.by_id.get(&id).and_then(|&i| self.entries.get_mut(i)) {
                    entry.failure = Some(error);
                }
            }
            _ => {}
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct ConsoleLog {
    entries: Vec<ConsoleEntry>,
}

impl ConsoleLog {
    pub fn into_entries(self) -> Vec<ConsoleEntry> {
        self.entries
    }
}

impl Collector for ConsoleLog {
    fn collect(&mut self, event: EngineEvent) {
        let (level, text) = match event {
            EngineEvent::Console { level, text, .. } => (level, text),
            EngineEvent::PageError { message, .. } => ("pageerror".to_string(), message),
            _ => return,
        };
        self.entries.push(ConsoleEntry {
            level,
            text,
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
