use loadcollect_common::{CollectError, Result};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::context::ExperimentRef;

/// Where an experiment's aggregated results live between collection runs.
///
/// The blob is the JSON encoding of a `ResultSet`; stores treat it as opaque.
pub trait ExperimentStore: Send + Sync {
    /// Returns `None` when nothing has been stored for `experiment` yet.
    fn load(&self, experiment: &ExperimentRef) -> Result<Option<String>>;

    fn store(&self, experiment: &ExperimentRef, blob: &str) -> Result<()>;
}

/// Keeps one JSON file per experiment at `<root>/<namespace>/<name>.json`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Namespace and name must each be a single path component, so every
    /// experiment stays under the root.
    pub fn path_for(&self, experiment: &ExperimentRef) -> Result<PathBuf> {
        check_component("namespace", &experiment.namespace)?;
        check_component("name", &experiment.name)?;
        Ok(self
            .root
            .join(&experiment.namespace)
            .join(format!("{}.json", experiment.name)))
    }
}

fn check_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(CollectError::Persistence(format!("invalid experiment {what}: {value:?}")));
    }
    Ok(())
}

impl ExperimentStore for FileStore {
    fn load(&self, experiment: &ExperimentRef) -> Result<Option<String>> {
        let path = self.path_for(experiment)?;
        match std::fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CollectError::Persistence(format!("cannot read {}: {e}", path.display()))),
        }
    }

    /// Written to a temp file beside the target and renamed over it, so readers
    /// never observe a half-written blob.
    fn store(&self, experiment: &ExperimentRef, blob: &str) -> Result<()> {
        let path = self.path_for(experiment)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let fail = |what: &str, e: std::io::Error| {
            CollectError::Persistence(format!("cannot {what} {}: {e}", path.display()))
        };

        std::fs::create_dir_all(dir).map_err(|e| fail("create directory for", e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail("stage", e))?;
        tmp.write_all(blob.as_bytes()).map_err(|e| fail("write", e))?;
        tmp.persist(&path).map_err(|e| fail("replace", e.error))?;
        Ok(())
    }
}

/// In-process store, handy for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<ExperimentRef, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, experiment: &ExperimentRef) -> Option<String> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).get(experiment).cloned()
    }

    pub fn insert(&self, experiment: ExperimentRef, blob: impl Into<String>) {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).insert(experiment, blob.into());
    }
}

impl ExperimentStore for MemoryStore {
    fn load(&self, experiment: &ExperimentRef) -> Result<Option<String>> {
        Ok(self.get(experiment))
    }

    fn store(&self, experiment: &ExperimentRef, blob: &str) -> Result<()> {
        self.insert(experiment.clone(), blob);
        Ok(())
    }
}
