//! Inputs of the `metrics/collect` task, as written in the experiment's task spec.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::{null_as_default, CollectError, Result};

/// A version of the service to send load to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSpec {
    /// Must be unique within one task.
    pub name: String,
    /// Requests per second; the configured default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectInputs {
    /// How long each load-generator run lasts, e.g. `"5s"` or `"1m30s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub versions: Vec<VersionSpec>,
    /// JSON document to send as the request body of every query.
    #[serde(rename = "payloadURL", default, skip_serializing_if = "Option::is_none")]
    pub payload_url: Option<String>,
    /// Generate load without reading or writing the experiment's stored results.
    #[serde(default)]
    pub load_only: bool,
}

impl CollectInputs {
    /// Decode the task's `with` block.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CollectError::Config(e.to_string()))
    }

    /// Fill in a missing duration and any missing per-version request rate.
    pub fn apply_defaults(&mut self, time: &str, qps: f64) {
        if self.time.is_none() {
            self.time = Some(time.to_string());
        }
        for version in &mut self.versions {
            version.qps.get_or_insert(qps);
        }
    }

    /// Structural checks that do not depend on configuration.
    pub fn validate(&self) -> Result<()> {
        if self.versions.is_empty() {
            return Err(CollectError::Config("at least one version is required".into()));
        }

        let mut seen = HashSet::new();
        for version in &self.versions {
            if version.name.is_empty() {
                return Err(CollectError::Config("version name must not be empty".into()));
            }
            if !seen.insert(version.name.as_str()) {
                return Err(CollectError::Config(format!("duplicate version name: {}", version.name)));
            }
            if version.url.is_empty() {
                return Err(CollectError::Config(format!("version {} has no url", version.name)));
            }
            if let Some(qps) = version.qps {
                if !qps.is_finite() || qps <= 0.0 {
                    return Err(CollectError::Config(format!(
                        "version {} has invalid qps {qps}",
                        version.name
                    )));
                }
            }
        }

        if matches!(&self.payload_url, Some(url) if url.is_empty()) {
            return Err(CollectError::Config("payloadURL must not be empty".into()));
        }
        Ok(())
    }
}
