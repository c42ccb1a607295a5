//! Per-turn record of tool invocations.
//!
//! A [`UsageLog`] is a cheap handle onto a shared, append-only list. The tool
//! surface records one entry per call; the session loop snapshots and resets
//! it once per conversational turn. Tools never reset it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
    /// The call's arguments as received.
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct UsageLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn record(&self, tool_name: &str, metadata: serde_json::Value) {
        trace!(tool = tool_name, "audit record");
        self.entries.lock().push(AuditEntry {
            tool_name: tool_name.to_string(),
            timestamp: Utc::now(),
            metadata,
        });
    }

    /// Copy of every entry so far, in call order.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
