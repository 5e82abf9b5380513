use super::backoff::ReconnectPolicy;
use super::identity_store::IdentityStore;
use super::protocol::OutboundDirective;
use super::session::{
    CommunicationEntry, ConnectionState, Notice, NoticeKind, SessionSnapshot, SessionState,
    Severity, StageStatus, Terminal, WorkflowResult,
};
use super::stages::{canonical_stage_key, pipeline_position};
use super::status_query::{RemoteStatus, WorkflowStatusReport};
use super::translator::{translate_frame, Translation, ORCHESTRATOR_ORIGIN, SYSTEM_ORIGIN};
use super::transport::{socket_url, Connection, ConnectionEvent, Transport};
use super::ClientError;
use crate::config::Settings;
use crate::shared::ids::WorkflowId;
use crate::shared::logging::EventLog;
use serde_json::Value;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const ELAPSED_TICK: Duration = Duration::from_secs(1);
const MAX_FRAMES_PER_PUMP: usize = 64;
const RESTORED_MESSAGE: &str = "Workflow state restored successfully";
const RECONNECTED_MESSAGE: &str = "Connection restored successfully";
const EXHAUSTED_MESSAGE: &str = "Connection lost. Maximum reconnection attempts reached. Workflow may still be running in the background.";

pub(crate) fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// What the caller wants run: the project and, for a fresh start, its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowIntent {
    pub project_name: String,
    pub transcript: Option<String>,
}

impl WorkflowIntent {
    pub fn start(project_name: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            transcript: Some(transcript.into()),
        }
    }

    pub fn resume(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            transcript: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub base_url: String,
    pub socket_path: String,
    pub policy: ReconnectPolicy,
    pub total_stages: usize,
    pub idle_poll: Duration,
}

impl ManagerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            socket_path: settings.connection.socket_path.clone(),
            policy: ReconnectPolicy::from_config(&settings.connection),
            total_stages: settings.pipeline.total_stages,
            idle_poll: Duration::from_millis(settings.connection.idle_poll_ms),
        }
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenReason {
    Fresh,
    Restore,
    Retry { attempt: u32 },
}

#[derive(Debug, Clone, Copy)]
struct PendingOpen {
    at: Instant,
    reason: OpenReason,
}

#[derive(Debug, Clone, Copy)]
struct ElapsedClock {
    started: Instant,
    next_tick: Instant,
}

impl ElapsedClock {
    fn starting_at(now: Instant) -> Self {
        Self {
            started: now,
            next_tick: now + ELAPSED_TICK,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveWorkflow {
    workflow_id: WorkflowId,
    intent: WorkflowIntent,
}

/// Owns the persistent connection for one workflow attempt and the session
/// state it feeds. Effects happen only inside `begin`, `hydrate`, `pump`
/// and `end`, one event at a time.
pub struct ConnectionManager<T: Transport, S: IdentityStore> {
    transport: T,
    store: S,
    options: ManagerOptions,
    log: EventLog,
    session: SessionState,
    connection: Option<T::Connection>,
    active: Option<ActiveWorkflow>,
    workflow_started: bool,
    reconnect_attempts: u32,
    pending_open: Option<PendingOpen>,
    clock: Option<ElapsedClock>,
    subscribers: Vec<Sender<SessionSnapshot>>,
}

impl<T: Transport, S: IdentityStore> ConnectionManager<T, S> {
    pub fn new(transport: T, store: S, options: ManagerOptions) -> Self {
        Self {
            transport,
            store,
            options,
            log: EventLog::disabled(),
            session: SessionState::default(),
            connection: None,
            active: None,
            workflow_started: false,
            reconnect_attempts: 0,
            pending_open: None,
            clock: None,
            subscribers: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(&self.session, self.options.total_stages)
    }

    /// Receives the current snapshot right away, then one after every change.
    pub fn subscribe(&mut self) -> Receiver<SessionSnapshot> {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(self.snapshot());
        self.subscribers.push(sender);
        receiver
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// When the next open (initial or retry) is due, if one is scheduled.
    pub fn next_open_at(&self) -> Option<Instant> {
        self.pending_open.map(|pending| pending.at)
    }

    /// Nothing left to do: no open scheduled, and either no live connection
    /// or a workflow that is already terminal.
    pub fn is_settled(&self) -> bool {
        self.pending_open.is_none() && (self.connection.is_none() || self.session.is_terminal())
    }

    /// Replaces the session with the engine's snapshot of `workflow_id`.
    /// Returns whether that snapshot is already terminal. Whatever the
    /// manager was following before is dropped along with its timers.
    pub fn hydrate(&mut self, workflow_id: WorkflowId, report: &WorkflowStatusReport) -> bool {
        self.release_connection();
        self.reset_attempt();

        let mut session = SessionState::new(workflow_id.clone());

        let mut stages: Vec<_> = report
            .agent_statuses
            .iter()
            .map(|(wire, status)| (canonical_stage_key(wire), status))
            .collect();
        stages.sort_by_key(|(key, _)| pipeline_position(key).unwrap_or(usize::MAX));
        for (key, status) in stages {
            session.stages.upsert(
                &key,
                StageStatus {
                    state: status.status,
                    message: status.message.clone(),
                    timestamp: status.timestamp.clone(),
                },
            );
        }
        session.current_stage = report.current_agent.as_deref().map(canonical_stage_key);

        let terminal = report.status == RemoteStatus::Completed;
        if terminal {
            session.current_stage = None;
            session.finish(Terminal::Completed(WorkflowResult {
                project_name: None,
                workflow_id: Some(workflow_id.to_string()),
                status: Some("completed".to_string()),
                results: report.results.clone().unwrap_or(Value::Null),
            }));
        }

        self.log.info(
            "session.hydrated",
            &format!(
                "restored workflow {workflow_id} with {} stages ({:?})",
                session.stages.len(),
                report.status
            ),
        );
        self.session = session;
        self.notify();
        terminal
    }

    /// Starts (`resuming=false`) or re-attaches to (`resuming=true`) a
    /// workflow. Tears down any previous connection and retry timer; the
    /// connection itself opens on the next `pump`.
    pub fn begin(
        &mut self,
        workflow_id: WorkflowId,
        intent: WorkflowIntent,
        resuming: bool,
        now: Instant,
    ) -> Result<(), ClientError> {
        if !resuming && intent.transcript.is_none() {
            return Err(ClientError::MissingStartPayload {
                workflow_id: workflow_id.to_string(),
            });
        }

        self.release_connection();
        self.pending_open = None;

        if !resuming || self.session.workflow_id() != Some(&workflow_id) {
            self.reset_attempt();
            self.session = SessionState::new(workflow_id.clone());
        }
        if resuming {
            self.workflow_started = true;
        }
        if self.session.started_at.is_none() {
            self.session.started_at = Some(now_stamp());
        }
        if self.clock.is_none() && !self.session.is_terminal() {
            self.clock = Some(ElapsedClock::starting_at(now));
        }

        self.session.set_connection(ConnectionState::Connecting);
        self.log.info(
            "workflow.begin",
            &format!(
                "{} workflow {workflow_id} for project `{}`",
                if resuming { "resuming" } else { "starting" },
                intent.project_name
            ),
        );
        self.active = Some(ActiveWorkflow {
            workflow_id,
            intent,
        });
        self.pending_open = Some(PendingOpen {
            at: now,
            reason: if resuming {
                OpenReason::Restore
            } else {
                OpenReason::Fresh
            },
        });
        self.notify();
        Ok(())
    }

    /// Closes the connection and cancels both timers. The persisted identity
    /// is left alone.
    pub fn end(&mut self) {
        self.release_connection();
        self.reset_attempt();
        self.active = None;
        if !self.session.is_terminal() {
            self.session.set_connection(ConnectionState::Disconnected);
            self.session.clear_transient_notice();
        }
        self.log.info("connection.end", "workflow connection released");
        self.notify();
    }

    /// Processes everything due at `now`: a scheduled open, queued inbound
    /// frames and the elapsed-time tick. Returns whether the session changed.
    pub fn pump(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Some(pending) = self.pending_open {
            if now >= pending.at {
                self.pending_open = None;
                self.open(pending.reason, now);
                changed = true;
            }
        }
        changed |= self.drain_inbound(now);
        changed |= self.tick(now);

        if changed {
            self.notify();
        }
        changed
    }

    /// Blocking driver: pumps until the manager settles.
    pub fn run_until_settled(&mut self) -> SessionSnapshot {
        loop {
            self.pump(Instant::now());
            if self.is_settled() {
                break;
            }
            thread::sleep(self.options.idle_poll);
        }
        self.snapshot()
    }

    fn open(&mut self, reason: OpenReason, now: Instant) {
        let Some(workflow_id) = self.active.as_ref().map(|active| active.workflow_id.clone())
        else {
            return;
        };
        let url = socket_url(&self.options.base_url, &self.options.socket_path, &workflow_id);
        self.log
            .info("connection.open", &format!("connecting to {url} ({reason:?})"));

        match self.transport.open(&url) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.on_open(reason, now);
            }
            Err(err) => {
                self.log.warn("connection.open_failed", &err.to_string());
                self.on_unexpected_close(now, Some(err.to_string()));
            }
        }
    }

    fn on_open(&mut self, reason: OpenReason, now: Instant) {
        let Some(active) = self.active.clone() else {
            self.release_connection();
            return;
        };
        self.session.set_connection(ConnectionState::Connected);
        self.session.clear_transient_notice();

        let resuming = reason == OpenReason::Restore
            || (self.reconnect_attempts > 0 && self.workflow_started);
        let directive = if resuming {
            OutboundDirective::Reconnect {
                workflow_id: active.workflow_id.clone(),
            }
        } else {
            let Some(transcript) = active.intent.transcript.clone() else {
                self.log.error(
                    "connection.directive",
                    &format!("workflow {} has no transcript to start", active.workflow_id),
                );
                self.release_connection();
                self.session.set_connection(ConnectionState::Disconnected);
                return;
            };
            OutboundDirective::Start {
                project_name: active.intent.project_name.clone(),
                transcript,
            }
        };

        let sent = directive
            .to_json()
            .map_err(|err| err.to_string())
            .and_then(|body| match self.connection.as_mut() {
                Some(connection) => connection.send_text(&body).map_err(|err| err.to_string()),
                None => Err("connection released before directive was sent".to_string()),
            });
        if let Err(reason) = sent {
            self.log.warn("connection.send_failed", &reason);
            self.on_unexpected_close(now, Some(reason));
            return;
        }

        self.workflow_started = true;
        self.log.info(
            "connection.directive",
            &format!(
                "sent `{}` for workflow {}",
                directive.name(),
                active.workflow_id
            ),
        );

        let stamp = now_stamp();
        let entry = match reason {
            OpenReason::Fresh => CommunicationEntry::new(
                ORCHESTRATOR_ORIGIN,
                format!(
                    "Starting workflow for project: {}",
                    active.intent.project_name
                ),
                stamp,
                Severity::Info,
            ),
            OpenReason::Restore => {
                CommunicationEntry::new(SYSTEM_ORIGIN, RESTORED_MESSAGE, stamp, Severity::Success)
            }
            OpenReason::Retry { .. } => CommunicationEntry::new(
                SYSTEM_ORIGIN,
                RECONNECTED_MESSAGE,
                stamp,
                Severity::Success,
            ),
        };
        self.session.push_entry(entry);
    }

    fn drain_inbound(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for _ in 0..MAX_FRAMES_PER_PUMP {
            let Some(connection) = self.connection.as_mut() else {
                break;
            };
            let Some(event) = connection.poll_event() else {
                break;
            };
            changed = true;
            match event {
                ConnectionEvent::Text(text) => self.on_frame(&text, now),
                ConnectionEvent::Closed { reason } => {
                    self.on_unexpected_close(now, reason);
                    break;
                }
            }
        }
        changed
    }

    fn on_frame(&mut self, text: &str, now: Instant) {
        match translate_frame(&mut self.session, text, &now_stamp()) {
            Translation::Applied => {}
            Translation::Rejected(err) => self.log.warn("protocol.violation", &err.to_string()),
            Translation::Terminal => self.on_terminal(now),
        }
    }

    fn on_terminal(&mut self, now: Instant) {
        if let Some(clock) = self.clock.take() {
            self.session.elapsed_seconds = now.saturating_duration_since(clock.started).as_secs();
        }
        self.reconnect_attempts = 0;
        self.workflow_started = false;
        self.pending_open = None;

        if let Some(active) = &self.active {
            if let Err(err) = self.store.clear(&active.intent.project_name) {
                self.log.error(
                    "identity.clear_failed",
                    &format!(
                        "failed to clear persisted workflow for `{}`: {err}",
                        active.intent.project_name
                    ),
                );
            }
        }
        self.release_connection();
        self.log.info(
            "workflow.terminal",
            &format!("workflow reached {:?}", self.session.terminal()),
        );
    }

    fn on_unexpected_close(&mut self, now: Instant, reason: Option<String>) {
        self.release_connection();
        self.log.warn(
            "connection.closed",
            reason.as_deref().unwrap_or("connection closed by peer"),
        );
        if self.session.is_terminal() {
            return;
        }

        let max_attempts = self.options.policy.max_attempts();
        if self.workflow_started
            && self.active.is_some()
            && self.options.policy.allows(self.reconnect_attempts)
        {
            let delay = self.options.policy.delay_for(self.reconnect_attempts);
            self.reconnect_attempts += 1;
            let attempt = self.reconnect_attempts;
            let seconds = (delay.as_millis() + 500) / 1000;
            self.session.set_connection(ConnectionState::Reconnecting);
            self.session.notice = Some(Notice::new(
                NoticeKind::Transient,
                format!(
                    "Connection lost. Reconnecting in {seconds}s... (Attempt {attempt}/{max_attempts})"
                ),
            ));
            self.pending_open = Some(PendingOpen {
                at: now + delay,
                reason: OpenReason::Retry { attempt },
            });
            self.log.warn(
                "connection.retry_scheduled",
                &format!(
                    "attempt {attempt}/{max_attempts} in {}ms",
                    delay.as_millis()
                ),
            );
        } else if self.reconnect_attempts >= max_attempts {
            self.session.set_connection(ConnectionState::Disconnected);
            self.session.notice = Some(Notice::new(NoticeKind::Permanent, EXHAUSTED_MESSAGE));
            self.log.error(
                "connection.retries_exhausted",
                &format!("gave up after {max_attempts} reconnect attempts"),
            );
        } else {
            self.session.set_connection(ConnectionState::Disconnected);
            self.log.info(
                "connection.not_reconnecting",
                "workflow was never started on this connection",
            );
        }
    }

    fn tick(&mut self, now: Instant) -> bool {
        if self.session.is_terminal() {
            self.clock = None;
            return false;
        }
        let Some(clock) = self.clock.as_mut() else {
            return false;
        };
        if now < clock.next_tick {
            return false;
        }
        clock.next_tick = now + ELAPSED_TICK;
        let elapsed = now.saturating_duration_since(clock.started).as_secs();
        if elapsed == self.session.elapsed_seconds {
            return false;
        }
        self.session.elapsed_seconds = elapsed;
        true
    }

    /// Drops per-attempt bookkeeping: retry timer, elapsed clock, counter.
    fn reset_attempt(&mut self) {
        self.pending_open = None;
        self.clock = None;
        self.reconnect_attempts = 0;
        self.workflow_started = false;
    }

    fn release_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if self.session.is_terminal() {
            self.session.set_connection(ConnectionState::Disconnected);
        }
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}

impl<T: Transport, S: IdentityStore> Drop for ConnectionManager<T, S> {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}
