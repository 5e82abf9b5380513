use super::session::StageState;
use crate::config::{Settings, WORKFLOW_ID_PLACEHOLDER};
use crate::shared::ids::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StatusQueryError {
    #[error("status query request failed: {0}")]
    Request(String),
    #[error("status query returned http {status}")]
    Http { status: u16 },
    #[error("status query response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStageStatus {
    pub status: StageState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Body of `GET /status/{workflow_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatusReport {
    pub status: RemoteStatus,
    #[serde(default)]
    pub agent_statuses: BTreeMap<String, RemoteStageStatus>,
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
}

impl WorkflowStatusReport {
    /// Only running or completed workflows are worth re-attaching to.
    pub fn is_resumable(&self) -> bool {
        matches!(self.status, RemoteStatus::Running | RemoteStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusLookup {
    Found(WorkflowStatusReport),
    /// The engine does not know the workflow (never started or expired).
    Absent,
}

/// One-shot side channel asking the engine about a workflow.
pub trait StatusQuery {
    fn workflow_status(&self, workflow_id: &WorkflowId) -> Result<StatusLookup, StatusQueryError>;
}

#[derive(Debug, Clone)]
pub struct HttpStatusClient {
    base_url: String,
    path: String,
    agent: ureq::Agent,
}

impl HttpStatusClient {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.base_url.clone(),
            settings.status_query.path.clone(),
            Duration::from_millis(settings.status_query.timeout_ms),
        )
    }

    pub fn endpoint(&self, workflow_id: &WorkflowId) -> String {
        let path = self.path.replace(
            WORKFLOW_ID_PLACEHOLDER,
            &urlencoding::encode(workflow_id.as_str()),
        );
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl StatusQuery for HttpStatusClient {
    fn workflow_status(&self, workflow_id: &WorkflowId) -> Result<StatusLookup, StatusQueryError> {
        let url = self.endpoint(workflow_id);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(StatusLookup::Absent),
            Err(ureq::Error::Status(status, _)) => return Err(StatusQueryError::Http { status }),
            Err(err) => return Err(StatusQueryError::Request(err.to_string())),
        };
        let report = response
            .into_json::<WorkflowStatusReport>()
            .map_err(|e| StatusQueryError::Decode(e.to_string()))?;
        Ok(StatusLookup::Found(report))
    }
}
