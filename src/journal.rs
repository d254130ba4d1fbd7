//! Request journal.
//!
//! Every served request is snapshotted into a [`LoggedRequest`] and kept
//! according to the journal capacity:
//!
//! - `None`: unbounded, everything since the last reset
//! - `Some(0)`: disabled, recording is a no-op and queries fail
//! - `Some(n)`: the `n` most recent requests
//!
//! Capacity can change while requests are flowing. The swap and reload
//! happen under the same lock that `record` takes, so no entry is lost or
//! duplicated.

use crate::error::{ConfigurationError, JournalDisabledError};
use crate::http::{parameter_from, parse_query, HttpHeader, HttpHeaders, HttpParameter, Request, RequestMethod};
use crate::matcher::RequestPattern;
use crate::notifier::{Notifier, TracingNotifier};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable snapshot of a served request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedRequest {
    pub url: String,
    pub method: RequestMethod,
    pub headers: HttpHeaders,
    pub body: String,
    pub logged_date: DateTime<Utc>,
}

impl LoggedRequest {
    pub fn create_from(request: &dyn Request) -> Self {
        Self {
            url: request.url().to_string(),
            method: request.method(),
            headers: request.all_headers().clone(),
            body: request.body_as_string().to_string(),
            logged_date: Utc::now(),
        }
    }
}

impl Request for LoggedRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> RequestMethod {
        self.method
    }

    fn header(&self, name: &str) -> HttpHeader {
        self.headers.get(name)
    }

    fn all_headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn parameter(&self, name: &str) -> HttpParameter {
        parameter_from(&parse_query(&self.url), name)
    }

    fn body(&self) -> &[u8] {
        self.body.as_bytes()
    }

    fn body_as_string(&self) -> &str {
        &self.body
    }
}

/// Reject negative capacities.
pub fn validate_capacity(capacity: Option<i32>) -> Result<Option<usize>, ConfigurationError> {
    match capacity {
        Some(n) if n < 0 => Err(ConfigurationError::NegativeJournalCapacity(n)),
        Some(n) => Ok(Some(n as usize)),
        None => Ok(None),
    }
}

/// Storage strategy behind the journal.
#[derive(Debug)]
enum JournalStore {
    Disabled,
    Bounded {
        capacity: usize,
        entries: VecDeque<Arc<LoggedRequest>>,
    },
    Unbounded(Vec<Arc<LoggedRequest>>),
}

impl JournalStore {
    fn for_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            None => JournalStore::Unbounded(Vec::new()),
            Some(0) => JournalStore::Disabled,
            Some(capacity) => JournalStore::Bounded {
                capacity,
                entries: VecDeque::with_capacity(capacity),
            },
        }
    }

    fn is_disabled(&self) -> bool {
        matches!(self, JournalStore::Disabled)
    }

    fn record(&mut self, entry: Arc<LoggedRequest>) {
        match self {
            JournalStore::Disabled => {}
            JournalStore::Bounded { capacity, entries } => {
                while entries.len() >= *capacity {
                    entries.pop_front();
                }
                entries.push_back(entry);
            }
            JournalStore::Unbounded(entries) => entries.push(entry),
        }
    }

    /// Everything currently held, oldest first.
    fn retained(&self) -> Vec<Arc<LoggedRequest>> {
        match self {
            JournalStore::Disabled => Vec::new(),
            JournalStore::Bounded { entries, .. } => entries.iter().cloned().collect(),
            JournalStore::Unbounded(entries) => entries.clone(),
        }
    }

    /// Take over entries from a previous store, keeping the most recent
    /// ones that fit.
    fn load(&mut self, previous: Vec<Arc<LoggedRequest>>) {
        for entry in previous {
            self.record(entry);
        }
    }

    fn reset(&mut self) {
        match self {
            JournalStore::Disabled => {}
            JournalStore::Bounded { entries, .. } => entries.clear(),
            JournalStore::Unbounded(entries) => entries.clear(),
        }
    }
}

#[derive(Debug)]
struct JournalState {
    capacity: Option<usize>,
    store: JournalStore,
}

/// Thread-safe journal of served requests.
pub struct RequestJournal {
    state: Mutex<JournalState>,
    notifier: Arc<dyn Notifier>,
}

impl Default for RequestJournal {
    fn default() -> Self {
        Self::unbounded(Arc::new(TracingNotifier))
    }
}

impl RequestJournal {
    pub fn new(
        capacity: Option<i32>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigurationError> {
        let capacity = validate_capacity(capacity)?;
        Ok(Self::with_capacity(capacity, notifier))
    }

    pub fn unbounded(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_capacity(None, notifier)
    }

    fn with_capacity(capacity: Option<usize>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: Mutex::new(JournalState {
                capacity,
                store: JournalStore::for_capacity(capacity),
            }),
            notifier,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.state.lock().capacity
    }

    pub fn record(&self, request: &dyn Request) {
        if self.state.lock().store.is_disabled() {
            return;
        }
        // Snapshot outside the lock. A capacity change in between is fine:
        // the entry lands in whichever store is current.
        let entry = Arc::new(LoggedRequest::create_from(request));
        self.state.lock().store.record(entry);
    }

    // Matching runs outside the lock on a snapshot.
    fn snapshot(&self) -> Result<Vec<Arc<LoggedRequest>>, JournalDisabledError> {
        let state = self.state.lock();
        if state.store.is_disabled() {
            return Err(JournalDisabledError);
        }
        Ok(state.store.retained())
    }

    fn is_match(&self, pattern: &RequestPattern, entry: &LoggedRequest) -> bool {
        pattern.is_matched_by(entry, self.notifier.as_ref()).matched
    }

    pub fn count_matching(&self, pattern: &RequestPattern) -> Result<usize, JournalDisabledError> {
        let entries = self.snapshot()?;
        Ok(entries
            .iter()
            .filter(|entry| self.is_match(pattern, entry))
            .count())
    }

    /// Matching requests, oldest first.
    pub fn find_matching(
        &self,
        pattern: &RequestPattern,
    ) -> Result<Vec<Arc<LoggedRequest>>, JournalDisabledError> {
        let entries = self.snapshot()?;
        Ok(entries
            .into_iter()
            .filter(|entry| self.is_match(pattern, entry))
            .collect())
    }

    pub fn reset(&self) {
        self.state.lock().store.reset();
        debug!("Request journal reset");
    }

    /// Switch storage strategy, carrying over as much history as the new
    /// one can hold. A no-op when the capacity is unchanged.
    pub fn set_capacity(&self, capacity: Option<i32>) -> Result<(), ConfigurationError> {
        let capacity = validate_capacity(capacity)?;
        let mut state = self.state.lock();
        if state.capacity == capacity {
            return Ok(());
        }

        let previous = state.store.retained();
        let mut store = JournalStore::for_capacity(capacity);
        store.load(previous);

        info!(
            from = ?state.capacity,
            to = ?capacity,
            retained = store.retained().len(),
            "Request journal capacity changed"
        );
        state.capacity = capacity;
        state.store = store;
        Ok(())
    }
}
