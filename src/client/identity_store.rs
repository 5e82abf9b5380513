use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::ids::WorkflowId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.display().to_string(),
        source,
    }
}

/// Persisted workflow identity, one value per project name. Written on a
/// fresh start and cleared once that workflow reaches a terminal state.
pub trait IdentityStore {
    fn load(&self, project_name: &str) -> Result<Option<WorkflowId>, StoreError>;

    fn save(&mut self, project_name: &str, workflow_id: &WorkflowId) -> Result<(), StoreError>;

    fn clear(&mut self, project_name: &str) -> Result<(), StoreError>;

    fn entries(&self) -> Result<BTreeMap<String, WorkflowId>, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryIdentityStore {
    workflows: BTreeMap<String, WorkflowId>,
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, project_name: &str) -> Result<Option<WorkflowId>, StoreError> {
        Ok(self.workflows.get(project_name).cloned())
    }

    fn save(&mut self, project_name: &str, workflow_id: &WorkflowId) -> Result<(), StoreError> {
        self.workflows
            .insert(project_name.to_string(), workflow_id.clone());
        Ok(())
    }

    fn clear(&mut self, project_name: &str) -> Result<(), StoreError> {
        self.workflows.remove(project_name);
        Ok(())
    }

    fn entries(&self) -> Result<BTreeMap<String, WorkflowId>, StoreError> {
        Ok(self.workflows.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct PersistedIdentities {
    #[serde(default)]
    workflows: BTreeMap<String, WorkflowId>,
}

/// JSON file under the state root; re-read on every call so separate
/// client processes observe each other's writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PersistedIdentities, StoreError> {
        if !self.path.exists() {
            return Ok(PersistedIdentities::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| io_error(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(PersistedIdentities::default());
        }
        serde_json::from_str(&raw).map_err(|e| json_error(&self.path, e))
    }

    fn write(&self, state: &PersistedIdentities) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(state).map_err(|e| json_error(&self.path, e))?;
        atomic_write_file(&self.path, &body).map_err(|e| io_error(&self.path, e))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, project_name: &str) -> Result<Option<WorkflowId>, StoreError> {
        Ok(self.read()?.workflows.remove(project_name))
    }

    fn save(&mut self, project_name: &str, workflow_id: &WorkflowId) -> Result<(), StoreError> {
        let mut state = self.read()?;
        state
            .workflows
            .insert(project_name.to_string(), workflow_id.clone());
        self.write(&state)
    }

    fn clear(&mut self, project_name: &str) -> Result<(), StoreError> {
        let mut state = self.read()?;
        if state.workflows.remove(project_name).is_none() {
            return Ok(());
        }
        self.write(&state)
    }

    fn entries(&self) -> Result<BTreeMap<String, WorkflowId>, StoreError> {
        Ok(self.read()?.workflows)
    }
}
