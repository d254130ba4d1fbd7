//! Stub server facade.
//!
//! Ties the registry, resolver and journal together behind the operations a
//! transport adapter or admin API needs.

use crate::config::{GlobalSettings, StubServerConfig};
use crate::error::{ConfigurationError, JournalDisabledError};
use crate::http::Request;
use crate::journal::{LoggedRequest, RequestJournal};
use crate::matcher::RequestPattern;
use crate::notifier::{Notifier, TracingNotifier};
use crate::response::ResponseDefinition;
use crate::stubbing::{StubMapping, StubRegistry};
use crate::template::ResponseResolver;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// In-process stub server.
///
/// Serves stubbed responses for requests handed over by a transport and
/// records every request in the journal.
pub struct StubServer {
    registry: StubRegistry,
    journal: RequestJournal,
    resolver: ResponseResolver,
    settings: RwLock<GlobalSettings>,
    /// Total requests served.
    requests_total: AtomicU64,
    /// Requests that matched a stub.
    requests_matched: AtomicU64,
    /// Requests that fell through to the not-configured response.
    requests_unmatched: AtomicU64,
}

impl StubServer {
    /// Create a server that reports diagnostics through `tracing`.
    pub fn new(settings: GlobalSettings) -> Result<Self, ConfigurationError> {
        Self::with_notifier(settings, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(
        settings: GlobalSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigurationError> {
        let journal = RequestJournal::new(settings.journal_capacity, notifier.clone())?;

        info!(
            journal_capacity = ?settings.journal_capacity,
            fixed_delay = ?settings.fixed_delay,
            "Stub server initialized"
        );

        Ok(Self {
            registry: StubRegistry::new(notifier),
            journal,
            resolver: ResponseResolver::new(),
            settings: RwLock::new(settings),
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        StubServerConfig::from_yaml(yaml)?.into_server()
    }

    /// Get total requests served.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Resolve the response for `request` and record it in the journal.
    pub fn serve_stub_for(&self, request: &dyn Request) -> ResponseDefinition {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let served = self.registry.serve_for(request);
        self.journal.record(request);

        match &served.mapping {
            Some(mapping) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                info!(
                    stub_id = ?mapping.id,
                    method = %request.method(),
                    url = %request.url(),
                    "Request matched stub"
                );
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                info!(
                    method = %request.method(),
                    url = %request.url(),
                    "No stub matched request"
                );
            }
        }

        let response = self.resolver.resolve(served.response(), &served.groups);
        match self.settings.read().fixed_delay {
            Some(delay) if response.fixed_delay_milliseconds().is_none() => {
                debug!(delay_ms = delay, "Applying global fixed delay");
                response.with_fixed_delay(delay)
            }
            _ => response,
        }
    }

    pub fn add_stub_mapping(&self, mapping: StubMapping) -> Arc<StubMapping> {
        self.registry.add_mapping(mapping)
    }

    /// Registered mappings, most recently added first.
    pub fn list_all_stub_mappings(&self) -> Vec<Arc<StubMapping>> {
        self.registry.get_all()
    }

    /// Drop every mapping and scenario, and clear the journal.
    pub fn reset_mappings(&self) {
        self.registry.reset();
        self.journal.reset();
    }

    pub fn reset_scenarios(&self) {
        self.registry.reset_scenarios();
    }

    pub fn reset_requests_journal(&self) {
        self.journal.reset();
    }

    pub fn count_requests_matching(
        &self,
        pattern: &RequestPattern,
    ) -> Result<usize, JournalDisabledError> {
        self.journal.count_matching(pattern)
    }

    pub fn find_requests_matching(
        &self,
        pattern: &RequestPattern,
    ) -> Result<Vec<Arc<LoggedRequest>>, JournalDisabledError> {
        self.journal.find_matching(pattern)
    }

    pub fn global_settings(&self) -> GlobalSettings {
        self.settings.read().clone()
    }

    /// Replace the global settings. The journal is resized first so an
    /// invalid capacity leaves everything unchanged.
    pub fn update_global_settings(&self, settings: GlobalSettings) -> Result<(), ConfigurationError> {
        let mut current = self.settings.write();
        self.journal.set_capacity(settings.journal_capacity)?;
        info!(
            journal_capacity = ?settings.journal_capacity,
            fixed_delay = ?settings.fixed_delay,
            "Global settings updated"
        );
        *current = settings;
        Ok(())
    }
}
