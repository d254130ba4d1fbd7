//! Stub mappings, scenarios and the registry that serves them.
//!
//! The registry keeps mappings in insertion order behind a copy-on-write
//! snapshot, so `serve_for` iterates a stable list while `add_mapping` and
//! `reset` publish a new one. The most recently added matching mapping
//! wins.

use crate::http::Request;
use crate::matcher::RequestPattern;
use crate::notifier::{Notifier, TracingNotifier};
use crate::response::ResponseDefinition;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use uuid::Uuid;

/// One stub rule: a request pattern and the response to serve for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubMapping {
    /// Assigned on registration when missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    pub request: RequestPattern,

    #[serde(default)]
    pub response: ResponseDefinition,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,

    /// Only eligible while the scenario is in this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scenario_state: Option<String>,

    /// Scenario state to move to after serving this mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_scenario_state: Option<String>,

    /// Registration order; higher means more recent
    #[serde(skip)]
    pub insertion_index: u64,
}

impl StubMapping {
    pub fn new(request: RequestPattern, response: ResponseDefinition) -> Self {
        Self {
            id: None,
            request,
            response,
            scenario_name: None,
            required_scenario_state: None,
            new_scenario_state: None,
            insertion_index: 0,
        }
    }

    pub fn in_scenario(mut self, name: impl Into<String>) -> Self {
        self.scenario_name = Some(name.into());
        self
    }

    pub fn when_scenario_state_is(mut self, state: impl Into<String>) -> Self {
        self.required_scenario_state = Some(state.into());
        self
    }

    pub fn will_set_state_to(mut self, state: impl Into<String>) -> Self {
        self.new_scenario_state = Some(state.into());
        self
    }
}

/// A named workflow whose state gates which mappings are eligible.
#[derive(Debug)]
pub struct Scenario {
    name: String,
    state: Mutex<String>,
}

impl Scenario {
    pub const STARTED: &'static str = "Started";

    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(Self::STARTED.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> String {
        self.state.lock().clone()
    }

    fn is_in(&self, state: &str) -> bool {
        *self.state.lock() == state
    }

    /// Move to `new_state`, but only if the current state still equals
    /// `required` (when given). The check and the write happen under one
    /// lock.
    fn transition(&self, required: Option<&str>, new_state: &str) -> bool {
        let mut state = self.state.lock();
        if required.is_some_and(|required| *state != required) {
            return false;
        }
        *state = new_state.to_string();
        true
    }

    fn reset(&self) {
        *self.state.lock() = Self::STARTED.to_string();
    }
}

/// Stored mapping with its scenario resolved.
#[derive(Debug, Clone)]
struct RegisteredMapping {
    mapping: Arc<StubMapping>,
    scenario: Option<Arc<Scenario>>,
}

impl RegisteredMapping {
    fn is_eligible(&self) -> bool {
        match (&self.scenario, &self.mapping.required_scenario_state) {
            (Some(scenario), Some(required)) => scenario.is_in(required),
            _ => true,
        }
    }
}

/// Result of serving a request.
#[derive(Debug, Clone)]
pub struct ServedStub {
    /// Matched mapping, `None` when nothing matched
    pub mapping: Option<Arc<StubMapping>>,
    pub groups: Vec<String>,
}

impl ServedStub {
    fn no_match() -> Self {
        Self {
            mapping: None,
            groups: Vec::new(),
        }
    }

    pub fn response(&self) -> &ResponseDefinition {
        match &self.mapping {
            Some(mapping) => &mapping.response,
            None => not_configured_response(),
        }
    }

    pub fn was_matched(&self) -> bool {
        self.mapping.is_some()
    }
}

fn not_configured_response() -> &'static ResponseDefinition {
    static NOT_CONFIGURED: OnceLock<ResponseDefinition> = OnceLock::new();
    NOT_CONFIGURED.get_or_init(ResponseDefinition::not_configured)
}

/// Ordered store of stub mappings.
pub struct StubRegistry {
    mappings: RwLock<Arc<Vec<RegisteredMapping>>>,
    scenarios: Mutex<HashMap<String, Arc<Scenario>>>,
    next_index: AtomicU64,
    notifier: Arc<dyn Notifier>,
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }
}

impl StubRegistry {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            mappings: RwLock::new(Arc::new(Vec::new())),
            scenarios: Mutex::new(HashMap::new()),
            next_index: AtomicU64::new(0),
            notifier,
        }
    }

    /// Register a mapping, creating its scenario on first mention.
    /// Returns the stored mapping with its id and insertion index set.
    pub fn add_mapping(&self, mut mapping: StubMapping) -> Arc<StubMapping> {
        let id = *mapping.id.get_or_insert_with(Uuid::new_v4);

        // Scenario lock first, then mappings; `reset` takes them in the
        // same order.
        let mut scenarios = self.scenarios.lock();
        let scenario = mapping.scenario_name.as_ref().map(|name| {
            scenarios
                .entry(name.clone())
                .or_insert_with(|| {
                    debug!(scenario = %name, "Scenario created");
                    Arc::new(Scenario::new(name.as_str()))
                })
                .clone()
        });

        let mut mappings = self.mappings.write();
        mapping.insertion_index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let mapping = Arc::new(mapping);
        // Copies only while a `serve_for` still holds the old snapshot.
        Arc::make_mut(&mut *mappings).push(RegisteredMapping {
            mapping: mapping.clone(),
            scenario,
        });

        debug!(stub_id = %id, total = mappings.len(), "Stub mapping added");
        mapping
    }

    /// Find the mapping for `request`. Scenario transitions happen here,
    /// before the caller sees the response.
    pub fn serve_for(&self, request: &dyn Request) -> ServedStub {
        let snapshot = self.mappings.read().clone();

        for registered in snapshot.iter().rev() {
            if !registered.is_eligible() {
                continue;
            }
            let result = registered
                .mapping
                .request
                .is_matched_by(request, self.notifier.as_ref());
            if !result.matched {
                continue;
            }
            if !self.apply_transition(registered) {
                continue;
            }
            debug!(
                stub_id = ?registered.mapping.id,
                url = %request.url(),
                groups = result.groups.len(),
                "Request matched stub"
            );
            return ServedStub {
                mapping: Some(registered.mapping.clone()),
                groups: result.groups,
            };
        }

        self.notifier
            .info(&format!("No mapping found matching URL {}", request.url()));
        ServedStub::no_match()
    }

    // False when another request moved the scenario on first.
    fn apply_transition(&self, registered: &RegisteredMapping) -> bool {
        let (Some(scenario), Some(new_state)) =
            (&registered.scenario, &registered.mapping.new_scenario_state)
        else {
            return true;
        };
        let required = registered.mapping.required_scenario_state.as_deref();
        if !scenario.transition(required, new_state) {
            debug!(
                scenario = %scenario.name(),
                "Scenario moved on concurrently, skipping stub"
            );
            return false;
        }
        info!(
            scenario = %scenario.name(),
            from = required.unwrap_or("*"),
            to = %new_state,
            "Scenario state changed"
        );
        true
    }

    /// Remove all mappings and scenarios.
    pub fn reset(&self) {
        let mut scenarios = self.scenarios.lock();
        let mut mappings = self.mappings.write();
        *mappings = Arc::new(Vec::new());
        scenarios.clear();
        info!("Stub mappings reset");
    }

    /// Return every scenario to its initial state.
    pub fn reset_scenarios(&self) {
        let scenarios = self.scenarios.lock();
        for scenario in scenarios.values() {
            scenario.reset();
        }
        info!(scenarios = scenarios.len(), "Scenarios reset");
    }

    /// All mappings, most recently added first.
    pub fn get_all(&self) -> Vec<Arc<StubMapping>> {
        let snapshot = self.mappings.read().clone();
        snapshot
            .iter()
            .rev()
            .map(|registered| registered.mapping.clone())
            .collect()
    }

    pub fn scenario(&self, name: &str) -> Option<Arc<Scenario>> {
        self.scenarios.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.mappings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
