//! Dispatch lifecycle observation.
//!
//! The dispatcher reports what it does through a [`DispatchObserver`]. Observers are
//! purely observational: nothing they do feeds back into dispatch decisions.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`DispatchEvent`] | Lifecycle points of one dispatch |
//! | [`TracingObserver`] | Default; emits `tracing` events |
//! | [`NoopObserver`] | Discards everything |
//! | [`RecordingObserver`] | Keeps events in memory for assertions |

use crate::types::TargetKind;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A request is about to be sent. `attempt` is 0 for the first send, 1 for the retry.
    RequestBuilt {
        request_id: String,
        target: TargetKind,
        url: String,
        header_names: Vec<String>,
        attempt: u32,
    },
    ResponseReceived {
        request_id: String,
        status: u16,
        attempt: u32,
    },
    TransportFailed {
        request_id: String,
        error: String,
        attempt: u32,
    },
    /// A 401 was answered with a forced refresh.
    RetryTriggered { request_id: String },
    /// The forced refresh produced no usable credentials.
    RefreshUnavailable { request_id: String },
}

impl DispatchEvent {
    pub fn request_id(&self) -> &str {
        match self {
            DispatchEvent::RequestBuilt { request_id, .. }
            | DispatchEvent::ResponseReceived { request_id, .. }
            | DispatchEvent::TransportFailed { request_id, .. }
            | DispatchEvent::RetryTriggered { request_id }
            | DispatchEvent::RefreshUnavailable { request_id } => request_id,
        }
    }
}

pub trait DispatchObserver: Send + Sync {
    fn on_event(&self, event: &DispatchEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {
    fn on_event(&self, _event: &DispatchEvent) {}
}

pub fn noop_observer() -> Arc<dyn DispatchObserver> {
    Arc::new(NoopObserver)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn on_event(&self, event: &DispatchEvent) {
        match event {
            DispatchEvent::RequestBuilt {
                request_id,
                target,
                url,
                header_names,
                attempt,
            } => debug!(
                request_id = request_id.as_str(),
                target = target.as_str(),
                url = url.as_str(),
                headers = header_names.join(",").as_str(),
                attempt,
                "upstream request built"
            ),
            DispatchEvent::ResponseReceived {
                request_id,
                status,
                attempt,
            } => info!(
                request_id = request_id.as_str(),
                http_status = status,
                attempt,
                "upstream response received"
            ),
            DispatchEvent::TransportFailed {
                request_id,
                error,
                attempt,
            } => warn!(
                request_id = request_id.as_str(),
                error = error.as_str(),
                attempt,
                "upstream request failed"
            ),
            DispatchEvent::RetryTriggered { request_id } => info!(
                request_id = request_id.as_str(),
                "upstream returned 401; refreshing credentials and retrying"
            ),
            DispatchEvent::RefreshUnavailable { request_id } => warn!(
                request_id = request_id.as_str(),
                "credential refresh unavailable; surfacing original 401"
            ),
        }
    }
}

/// In-memory observer for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<RwLock<Vec<DispatchEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DispatchObserver for RecordingObserver {
    fn on_event(&self, event: &DispatchEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event.clone());
        }
    }
}
