//! Hand-off point for icon extraction

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Receives icon requests after games are added or refreshed
///
/// Requests are fire-and-forget; a sink must not block the scan.
pub trait IconSink: Send + Sync {
    fn request_icon(&self, game_id: i64, source: &Path);
}

/// Sink that drops every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIconSink;

impl IconSink for NoopIconSink {
    fn request_icon(&self, _game_id: i64, _source: &Path) {}
}

/// Sink that remembers requests, for tests
#[derive(Debug, Default, Clone)]
pub struct RecordingIconSink {
    requests: Arc<Mutex<Vec<(i64, String)>>>,
}

impl RecordingIconSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<(i64, String)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl IconSink for RecordingIconSink {
    fn request_icon(&self, game_id: i64, source: &Path) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((game_id, source.to_string_lossy().into_owned()));
        }
    }
}
