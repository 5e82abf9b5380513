use super::metrics::{
    estimated_seconds_remaining, format_elapsed, format_remaining, progress_percentage,
};
use crate::shared::ids::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct StageStatus {
    pub state: StageState,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEntry {
    pub stage: String,
    pub status: StageStatus,
}

/// Stage statuses keyed by stage, kept in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(transparent)]
pub struct StageBoard {
    entries: Vec<StageEntry>,
}

impl StageBoard {
    /// Last write wins; a new stage is appended after every stage seen so far.
    pub fn upsert(&mut self, stage: &str, status: StageStatus) {
        match self.entries.iter_mut().find(|entry| entry.stage == stage) {
            Some(entry) => entry.status = status,
            None => self.entries.push(StageEntry {
                stage: stage.to_string(),
                status,
            }),
        }
    }

    pub fn get(&self, stage: &str) -> Option<&StageStatus> {
        self.entries
            .iter()
            .find(|entry| entry.stage == stage)
            .map(|entry| &entry.status)
    }

    pub fn state_of(&self, stage: &str) -> StageState {
        self.get(stage).map(|status| status.state).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageEntry> {
        self.entries.iter()
    }

    pub fn count_in(&self, state: StageState) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status.state == state)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl Severity {
    pub fn for_stage_state(state: StageState) -> Self {
        match state {
            StageState::Failed => Self::Error,
            StageState::Completed => Self::Success,
            StageState::Pending | StageState::Running => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunicationEntry {
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub body: String,
    pub timestamp: String,
    pub severity: Severity,
}

impl CommunicationEntry {
    pub fn new(
        origin: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: None,
            body: body.into(),
            timestamp: timestamp.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub results: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Completed(WorkflowResult),
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    None,
    Completed,
    Failed,
}

/// Connection state and terminal outcome as one value: a finished workflow
/// can only hold or have released its connection, never be reconnecting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Live(ConnectionState),
    Finished { outcome: Terminal, link: Link },
}

impl Phase {
    pub fn connection_state(&self) -> ConnectionState {
        match self {
            Self::Live(state) => *state,
            Self::Finished {
                link: Link::Open, ..
            } => ConnectionState::Connected,
            Self::Finished {
                link: Link::Closed,
                ..
            } => ConnectionState::Disconnected,
        }
    }

    pub fn terminal_kind(&self) -> TerminalKind {
        match self {
            Self::Live(_) => TerminalKind::None,
            Self::Finished {
                outcome: Terminal::Completed(_),
                ..
            } => TerminalKind::Completed,
            Self::Finished {
                outcome: Terminal::Failed { .. },
                ..
            } => TerminalKind::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Clears itself once the connection is restored.
    Transient,
    /// Retries are exhausted; the workflow may still be running remotely.
    Permanent,
    /// The engine reported the workflow as failed.
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub(crate) workflow_id: Option<WorkflowId>,
    pub(crate) stages: StageBoard,
    pub(crate) current_stage: Option<String>,
    pub(crate) log: Vec<CommunicationEntry>,
    pub(crate) phase: Phase,
    pub(crate) notice: Option<Notice>,
    pub(crate) started_at: Option<String>,
    pub(crate) elapsed_seconds: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            workflow_id: None,
            stages: StageBoard::default(),
            current_stage: None,
            log: Vec::new(),
            phase: Phase::Live(ConnectionState::Disconnected),
            notice: None,
            started_at: None,
            elapsed_seconds: 0,
        }
    }
}

impl SessionState {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id: Some(workflow_id),
            ..Self::default()
        }
    }

    pub fn workflow_id(&self) -> Option<&WorkflowId> {
        self.workflow_id.as_ref()
    }

    pub fn stages(&self) -> &StageBoard {
        &self.stages
    }

    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    pub fn log(&self) -> &[CommunicationEntry] {
        &self.log
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.phase.connection_state()
    }

    pub fn terminal(&self) -> TerminalKind {
        self.phase.terminal_kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Populated only once the workflow completed.
    pub fn result(&self) -> Option<&WorkflowResult> {
        match &self.phase {
            Phase::Finished {
                outcome: Terminal::Completed(result),
                ..
            } => Some(result),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn started_at(&self) -> Option<&str> {
        self.started_at.as_deref()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub(crate) fn push_entry(&mut self, entry: CommunicationEntry) {
        self.log.push(entry);
    }

    /// For a finished workflow only the open/closed link is tracked.
    pub(crate) fn set_connection(&mut self, state: ConnectionState) {
        match &mut self.phase {
            Phase::Live(current) => *current = state,
            Phase::Finished { link, .. } => {
                *link = if state == ConnectionState::Connected {
                    Link::Open
                } else {
                    Link::Closed
                };
            }
        }
    }

    pub(crate) fn finish(&mut self, outcome: Terminal) {
        let link = match self.phase.connection_state() {
            ConnectionState::Connected => Link::Open,
            _ => Link::Closed,
        };
        self.phase = Phase::Finished { outcome, link };
    }

    pub(crate) fn clear_transient_notice(&mut self) {
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.kind == NoticeKind::Transient)
        {
            self.notice = None;
        }
    }
}

/// Read-only view handed to observers, with the derived progress figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session: SessionState,
    pub progress_percentage: u8,
    pub estimated_seconds_remaining: Option<u64>,
    pub elapsed_label: String,
    pub remaining_label: String,
}

impl SessionSnapshot {
    pub fn capture(session: &SessionState, total_stages: usize) -> Self {
        let remaining =
            estimated_seconds_remaining(&session.stages, session.elapsed_seconds, total_stages);
        Self {
            session: session.clone(),
            progress_percentage: progress_percentage(&session.stages, total_stages),
            estimated_seconds_remaining: remaining,
            elapsed_label: format_elapsed(session.elapsed_seconds),
            remaining_label: format_remaining(remaining),
        }
    }
}
