//! Configuration for the stub server.
//!
//! A configuration file holds the stub mappings to preload and the global
//! settings. Mappings use the same camelCase wire format as the admin
//! surface.

use crate::error::ConfigurationError;
use crate::journal::validate_capacity;
use crate::server::StubServer;
use crate::stubbing::StubMapping;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration for the stub server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StubServerConfig {
    /// Stub mappings, registered in file order (later entries win)
    #[serde(default)]
    pub mappings: Vec<StubMapping>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl StubServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.settings.validate()?;

        let mut seen_ids = HashSet::new();
        for (i, mapping) in self.mappings.iter().enumerate() {
            if let Some(id) = mapping.id {
                if !seen_ids.insert(id) {
                    anyhow::bail!("Mapping {}: duplicate id {}", i, id);
                }
            }
            let has_state = mapping.required_scenario_state.is_some()
                || mapping.new_scenario_state.is_some();
            if has_state && mapping.scenario_name.is_none() {
                anyhow::bail!(
                    "Mapping {}: scenario state given without a scenarioName",
                    i
                );
            }
        }
        Ok(())
    }

    /// Build a server with every mapping registered.
    pub fn into_server(self) -> anyhow::Result<StubServer> {
        let server = StubServer::new(self.settings)?;
        for mapping in self.mappings {
            server.add_stub_mapping(mapping);
        }
        Ok(server)
    }
}

/// Global settings, changeable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalSettings {
    /// Delay added to every response that has none of its own (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_delay: Option<u64>,

    /// Journal capacity: absent for unbounded, 0 to disable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_capacity: Option<i32>,
}

impl GlobalSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_capacity(self.journal_capacity).map(|_| ())
    }
}
