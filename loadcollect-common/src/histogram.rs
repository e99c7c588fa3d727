//! Latency histograms and status-code tallies reported by the load generator,
//! plus the additive merge that folds one run into the cumulative result set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{null_as_default, CollectError, Result};

/// One latency bucket: `count` requests took between `start` and `end` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DurationSample {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DurationHistogram {
    pub count: u64,
    pub max: f64,
    pub sum: f64,
    /// Append-only. Buckets from different runs are kept side by side even when
    /// their ranges coincide.
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<DurationSample>,
}

impl DurationHistogram {
    pub fn absorb(&mut self, incoming: DurationHistogram) {
        self.count += incoming.count;
        self.max = self.max.max(incoming.max);
        self.sum += incoming.sum;
        self.data.extend(incoming.data);
    }
}

/// Result of a single load-generator run against one version.
///
/// Only the two fields below are read from the generator's JSON report; everything
/// else it writes is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionResult {
    pub duration_histogram: DurationHistogram,
    /// Status code (as a string) → number of responses.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ret_codes: BTreeMap<String, u64>,
}

impl VersionResult {
    /// Add `incoming` to this result. Status codes missing from `incoming` keep
    /// their current tally.
    pub fn absorb(&mut self, incoming: VersionResult) {
        self.duration_histogram.absorb(incoming.duration_histogram);
        for (code, count) in incoming.ret_codes {
            *self.ret_codes.entry(code).or_insert(0) += count;
        }
    }
}

/// Per-version running totals across every collection run of an experiment.
///
/// Serializes as a plain JSON object keyed by version name, which is also the
/// form persisted on the experiment record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(BTreeMap<String, VersionResult>);

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, version: &str) -> Option<&VersionResult> {
        self.0.get(version)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionResult)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fold `incoming` into the entry for `version`, inserting it unchanged if the
    /// version has no entry yet.
    pub fn absorb(&mut self, version: &str, incoming: VersionResult) {
        match self.0.get_mut(version) {
            Some(existing) => existing.absorb(incoming),
            None => {
                self.0.insert(version.to_string(), incoming);
            }
        }
    }

    /// Decode the persisted form. A stored `null` decodes to an empty set.
    pub fn decode(blob: &str) -> Result<Self> {
        serde_json::from_str::<Option<ResultSet>>(blob)
            .map(Option::unwrap_or_default)
            .map_err(|e| CollectError::Persistence(format!("cannot decode stored results: {e}")))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CollectError::Persistence(format!("cannot encode results: {e}")))
    }
}

impl FromIterator<(String, VersionResult)> for ResultSet {
    fn from_iter<I: IntoIterator<Item = (String, VersionResult)>>(iter: I) -> Self {
        ResultSet(iter.into_iter().collect())
    }
}

/// Merge one run's result for `version` into `existing` and return the updated set.
///
/// `count`, `max`, `sum` and status-code tallies are order independent. The order of
/// `data` follows merge order, so it is not deterministic under concurrent merges.
pub fn merge(mut existing: ResultSet, version: &str, incoming: VersionResult) -> ResultSet {
    existing.absorb(version, incoming);
    existing
}
