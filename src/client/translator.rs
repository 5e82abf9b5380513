use super::protocol::{
    parse_inbound, CompleteEvent, InboundEvent, ProgressEvent, ProtocolError,
};
use super::session::{
    CommunicationEntry, Notice, NoticeKind, SessionState, Severity, StageState, StageStatus,
    Terminal, WorkflowResult,
};
use super::stages::{canonical_stage_key, stage_display_name};

pub const ORCHESTRATOR_ORIGIN: &str = "Orchestrator";
pub const SYSTEM_ORIGIN: &str = "System";

const COMPLETE_MESSAGE: &str = "All agents completed successfully!";
const FAILURE_TIP: &str =
    "Tip: You can restart the workflow or check the logs for more details.";
const DEFAULT_ACK_MESSAGE: &str = "Reconnected to workflow";

/// What applying one inbound frame did to the session.
#[derive(Debug)]
pub enum Translation {
    Applied,
    /// The workflow reached `completed` or `failed`.
    Terminal,
    /// The frame was logged as a protocol violation and otherwise ignored.
    Rejected(ProtocolError),
}

pub fn translate_frame(session: &mut SessionState, text: &str, now_stamp: &str) -> Translation {
    match parse_inbound(text) {
        Ok(event) => apply_event(session, event, now_stamp),
        Err(err) => {
            session.push_entry(CommunicationEntry::new(
                SYSTEM_ORIGIN,
                format!("Error parsing message from server: {err}"),
                now_stamp,
                Severity::Error,
            ));
            Translation::Rejected(err)
        }
    }
}

pub fn apply_event(session: &mut SessionState, event: InboundEvent, now_stamp: &str) -> Translation {
    match event {
        InboundEvent::Progress(progress) => {
            apply_progress(session, progress, now_stamp);
            Translation::Applied
        }
        InboundEvent::Complete(complete) => {
            apply_complete(session, complete, now_stamp);
            Translation::Terminal
        }
        InboundEvent::Error(error) => {
            session.finish(Terminal::Failed {
                message: error.message.clone(),
            });
            session.notice = Some(Notice::new(NoticeKind::Failure, error.message.clone()));
            session.push_entry(CommunicationEntry::new(
                SYSTEM_ORIGIN,
                format!("Error: {}", error.message),
                now_stamp,
                Severity::Error,
            ));
            session.push_entry(CommunicationEntry::new(
                SYSTEM_ORIGIN,
                FAILURE_TIP,
                now_stamp,
                Severity::Info,
            ));
            Translation::Terminal
        }
        InboundEvent::ReconnectAck(ack) => {
            session.push_entry(CommunicationEntry::new(
                SYSTEM_ORIGIN,
                ack.message
                    .unwrap_or_else(|| DEFAULT_ACK_MESSAGE.to_string()),
                now_stamp,
                Severity::Info,
            ));
            Translation::Applied
        }
    }
}

fn apply_progress(session: &mut SessionState, progress: ProgressEvent, now_stamp: &str) {
    let key = canonical_stage_key(&progress.stage);
    let state = StageState::from(progress.status);
    let timestamp = progress
        .timestamp
        .unwrap_or_else(|| now_stamp.to_string());

    // Only this stage is written. A stage the engine left `running` stays so
    // until the engine reports otherwise; `current_stage` tracks the latest.
    if state == StageState::Running {
        session.current_stage = Some(key.clone());
    }
    session.stages.upsert(
        &key,
        StageStatus {
            state,
            message: progress.message.clone(),
            timestamp: timestamp.clone(),
        },
    );
    session.push_entry(CommunicationEntry::new(
        stage_display_name(&key),
        progress.message,
        timestamp,
        Severity::for_stage_state(state),
    ));
}

fn apply_complete(session: &mut SessionState, complete: CompleteEvent, now_stamp: &str) {
    session.finish(Terminal::Completed(WorkflowResult {
        project_name: complete.project_name,
        workflow_id: complete.workflow_id,
        status: complete.status,
        results: complete.results,
    }));
    session.current_stage = None;
    session.push_entry(CommunicationEntry::new(
        ORCHESTRATOR_ORIGIN,
        COMPLETE_MESSAGE,
        now_stamp,
        Severity::Success,
    ));
}
