//! Connector manifest: the ordered list of connector registrations.
//!
//! The manifest is a YAML document with a single `connectors` sequence.
//! Order matters: the daemon creates registrations, and the scheduler visits
//! them, in manifest order.
//!
//! ```yaml
//! connectors:
//!   - name: files
//!     service_marker: files-integrator
//!     provider: command
//!     min_seconds_between_refresh: 60
//!     properties:
//!       refresh: ./sync-files.sh
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for one hosted connector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Unique connector name within the daemon.
    pub name: String,
    /// Marker of the integration service the connector belongs to.
    pub service_marker: String,
    /// Name of the provider that builds connector instances.
    pub provider: String,
    /// Minimum number of seconds between scheduled refreshes.
    ///
    /// Zero disables scheduled refreshes after the first one.
    #[serde(default)]
    pub min_seconds_between_refresh: u64,
    /// Whether the connector needs a dedicated thread calling `engage`.
    #[serde(default)]
    pub uses_blocking_calls: bool,
    /// Provider-specific settings.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ConnectorConfig {
    /// Builds a configuration with no refresh interval and no properties.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        service_marker: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_marker: service_marker.into(),
            provider: provider.into(),
            min_seconds_between_refresh: 0,
            uses_blocking_calls: false,
            properties: BTreeMap::new(),
        }
    }

    /// Sets the minimum interval between scheduled refreshes.
    #[must_use]
    pub const fn with_min_seconds_between_refresh(mut self, seconds: u64) -> Self {
        self.min_seconds_between_refresh = seconds;
        self
    }

    /// Marks the connector as requiring an `engage` thread.
    #[must_use]
    pub const fn with_blocking_calls(mut self) -> Self {
        self.uses_blocking_calls = true;
        self
    }

    /// Adds a provider-specific property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Looks up a provider-specific property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Errors raised while loading or validating a connector manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read connector manifest '{path}': {source}")]
    Read {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The manifest was not valid YAML or did not match the schema.
    #[error("failed to parse connector manifest: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },
    /// The manifest lists no connectors.
    #[error("connector manifest does not configure any connectors")]
    NoConnectors,
    /// A required field was blank.
    #[error("connector #{index} has a blank {field}")]
    BlankField {
        /// Zero-based position of the offending entry.
        index: usize,
        /// Name of the blank field.
        field: &'static str,
    },
    /// Two entries share a connector name.
    #[error("connector name '{name}' is configured more than once")]
    DuplicateName {
        /// Repeated connector name.
        name: String,
    },
}

/// Ordered connector registrations loaded from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorManifest {
    #[serde(default)]
    connectors: Vec<ConnectorConfig>,
}

impl ConnectorManifest {
    /// Builds a manifest from registrations, validating them.
    ///
    /// # Errors
    ///
    /// Returns the first [`ManifestError`] reported by [`Self::validate`].
    pub fn new(connectors: Vec<ConnectorConfig>) -> Result<Self, ManifestError> {
        let manifest = Self { connectors };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses and validates a manifest held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] when `text` is not a manifest
    /// document, or any error reported by [`Self::validate`].
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_saphyr::from_str(text).map_err(|error| ManifestError::Parse {
            message: error.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Loads the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Read`] when the file cannot be read, and
    /// otherwise fails as [`Self::from_yaml_str`] does.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Checks that the manifest is usable by the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NoConnectors`] for an empty manifest,
    /// [`ManifestError::BlankField`] when a required field of a registration
    /// is blank, and [`ManifestError::DuplicateName`] when two registrations
    /// share a name.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.connectors.is_empty() {
            return Err(ManifestError::NoConnectors);
        }
        let mut seen = HashSet::new();
        for (index, connector) in self.connectors.iter().enumerate() {
            let fields = [
                ("name", &connector.name),
                ("service_marker", &connector.service_marker),
                ("provider", &connector.provider),
            ];
            for (field, value) in fields {
                if value.trim().is_empty() {
                    return Err(ManifestError::BlankField { index, field });
                }
            }
            if !seen.insert(connector.name.as_str()) {
                return Err(ManifestError::DuplicateName {
                    name: connector.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Registrations in manifest order.
    #[must_use]
    pub fn connectors(&self) -> &[ConnectorConfig] {
        &self.connectors
    }

    /// Consumes the manifest, yielding its registrations.
    #[must_use]
    pub fn into_connectors(self) -> Vec<ConnectorConfig> {
        self.connectors
    }
}
