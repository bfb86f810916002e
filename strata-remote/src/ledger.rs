//! Call ledger.
//!
//! An optional, append-only diagnostic record of outbound calls. Every
//! aspect is independently toggled through [`LedgerOptions`]: whether
//! cache-served calls are recorded, whether oversized request bodies are
//! truncated, and whether response bodies are kept at all.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use strata_core::config::LedgerOptions;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLogEntry {
    pub endpoint: String,
    pub request: String,
    pub response: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Whether the call was answered from cache rather than the wire.
    pub cache_served: bool,
}

/// Append-only call log.
#[derive(Debug, Default)]
pub struct CallLedger {
    entries: Mutex<Vec<CallLogEntry>>,
}

impl CallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call, honoring every toggle in `options`.
    pub fn record(
        &self,
        options: &LedgerOptions,
        endpoint: &str,
        request: &str,
        response: Option<&str>,
        cache_served: bool,
    ) {
        if !options.enabled {
            return;
        }
        if cache_served && !options.log_cache_hits {
            return;
        }

        let request = match options.max_request_len {
            Some(max) => truncate_utf8(request, max),
            None => request.to_string(),
        };
        let response = if options.include_response {
            response.map(str::to_string)
        } else {
            None
        };

        let entry = CallLogEntry {
            endpoint: endpoint.to_string(),
            request,
            response,
            timestamp: Utc::now(),
            cache_served,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn entries(&self) -> Vec<CallLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

// =============================================================================
// TESTS
// =============================================================================
