use super::session::StageState;
use crate::shared::ids::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const INBOUND_TYPES: [&str; 4] = ["progress", "complete", "error", "reconnect_ack"];

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("inbound frame is not valid json: {0}")]
    InvalidJson(String),
    #[error("inbound frame is missing a string `type` field")]
    MissingType,
    #[error("inbound frame has unrecognized type `{0}`")]
    UnknownType(String),
    #[error("inbound `{kind}` frame is malformed: {reason}")]
    Malformed { kind: String, reason: String },
    #[error("failed to encode outbound directive: {0}")]
    Encode(String),
}

/// Engine → client events; a closed set keyed by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Progress(ProgressEvent),
    Complete(CompleteEvent),
    Error(ErrorEvent),
    ReconnectAck(ReconnectAckEvent),
}

/// Stage states the engine may report; `pending` is never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
}

impl From<ProgressStatus> for StageState {
    fn from(status: ProgressStatus) -> Self {
        match status {
            ProgressStatus::Running => StageState::Running,
            ProgressStatus::Completed => StageState::Completed,
            ProgressStatus::Failed => StageState::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub status: ProgressStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompleteEvent {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorEvent {
    #[serde(default = "default_error_message")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectAckEvent {
    #[serde(default)]
    pub message: Option<String>,
}

fn default_error_message() -> String {
    "workflow failed without a reason".to_string()
}

/// Client → engine directives; exactly one is sent per successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundDirective {
    Start {
        project_name: String,
        transcript: String,
    },
    Reconnect {
        workflow_id: WorkflowId,
    },
}

impl OutboundDirective {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Reconnect { .. } => "reconnect",
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|err| ProtocolError::Encode(err.to_string()))
    }
}

/// Parses one text frame, separating unknown `type`s from broken payloads.
pub fn parse_inbound(text: &str) -> Result<InboundEvent, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| ProtocolError::InvalidJson(err.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_string();
    if !INBOUND_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|err| ProtocolError::Malformed {
        kind,
        reason: err.to_string(),
    })
}
