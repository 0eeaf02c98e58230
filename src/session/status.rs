use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Terminal and in-flight states of the most recent encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Success,
    Failed,
}

impl EncodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for EncodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and detail as one consistent value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: EncodeStatus,
    pub detail: String,
}

/// Shared `(status, detail)` cell written by finalize and by the recovery thread.
///
/// Both halves are always replaced together under one lock.
#[derive(Clone, Debug, Default)]
pub struct StatusCell {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: EncodeStatus, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(%status, %detail, "encode status");
        *self.lock() = StatusSnapshot { status, detail };
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    pub fn status(&self) -> EncodeStatus {
        self.lock().status
    }

    pub fn detail(&self) -> String {
        self.lock().detail.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        // A writer that panicked still left a whole snapshot behind.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/status.rs"]
mod tests;
