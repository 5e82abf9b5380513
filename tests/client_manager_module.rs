use serde_json::Value;
use stagewire::client::{
    Connection, ConnectionEvent, ConnectionManager, ConnectionState, IdentityStore,
    ManagerOptions, MemoryIdentityStore, NoticeKind, RemoteStageStatus, RemoteStatus, StageState,
    TerminalKind, Transport, TransportError, WorkflowIntent, WorkflowStatusReport,
};
use stagewire::shared::ids::WorkflowId;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Wire {
    opened: Vec<String>,
    sent: Vec<String>,
    inbound: VecDeque<ConnectionEvent>,
    refuse_opens: bool,
    closed: usize,
}

#[derive(Clone, Default)]
struct FakeTransport(Rc<RefCell<Wire>>);

struct FakeConnection(Rc<RefCell<Wire>>);

impl Transport for FakeTransport {
    type Connection = FakeConnection;

    fn open(&mut self, url: &str) -> Result<FakeConnection, TransportError> {
        let mut wire = self.0.borrow_mut();
        wire.opened.push(url.to_string());
        if wire.refuse_opens {
            return Err(TransportError::Open {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(FakeConnection(self.0.clone()))
    }
}

impl Connection for FakeConnection {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.0.borrow_mut().sent.push(text.to_string());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<ConnectionEvent> {
        self.0.borrow_mut().inbound.pop_front()
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed += 1;
    }
}

type TestManager = ConnectionManager<FakeTransport, MemoryIdentityStore>;

const PROJECT: &str = "Acme Portal";

fn wf_123() -> WorkflowId {
    WorkflowId::parse("wf_123").expect("workflow id")
}

fn manager() -> (TestManager, Rc<RefCell<Wire>>) {
    let transport = FakeTransport::default();
    let wire = transport.0.clone();
    let mut store = MemoryIdentityStore::default();
    store.save(PROJECT, &wf_123()).expect("save identity");
    let manager = ConnectionManager::new(transport, store, ManagerOptions::default());
    (manager, wire)
}

fn started(now: Instant) -> (TestManager, Rc<RefCell<Wire>>) {
    let (mut manager, wire) = manager();
    manager
        .begin(
            wf_123(),
            WorkflowIntent::start(PROJECT, "kickoff call notes"),
            false,
            now,
        )
        .expect("begin");
    manager.pump(now);
    (manager, wire)
}

fn push_text(wire: &Rc<RefCell<Wire>>, text: &str) {
    wire.borrow_mut()
        .inbound
        .push_back(ConnectionEvent::Text(text.to_string()));
}

fn push_close(wire: &Rc<RefCell<Wire>>) {
    wire.borrow_mut()
        .inbound
        .push_back(ConnectionEvent::Closed { reason: None });
}

fn sent_json(wire: &Rc<RefCell<Wire>>, index: usize) -> Value {
    serde_json::from_str(&wire.borrow().sent[index]).expect("sent directive json")
}

#[test]
fn client_manager_module_fresh_start_sends_start_and_announces() {
    let now = Instant::now();
    let (manager, wire) = started(now);

    assert_eq!(wire.borrow().opened, vec!["ws://localhost:8001/api/ws/wf_123"]);
    let directive = sent_json(&wire, 0);
    assert_eq!(directive["action"], "start");
    assert_eq!(directive["project_name"], PROJECT);
    assert_eq!(directive["transcript"], "kickoff call notes");

    let session = manager.session();
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log()[0].origin, "Orchestrator");
    assert_eq!(
        session.log()[0].body,
        "Starting workflow for project: Acme Portal"
    );
    assert!(session.started_at().is_some());
}

#[test]
fn client_manager_module_running_progress_becomes_current_stage() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);

    push_text(
        &wire,
        r#"{"type":"progress","stage":"transcript","status":"running","message":"Parsing"}"#,
    );
    assert!(manager.pump(now));

    let session = manager.session();
    assert_eq!(session.current_stage(), Some("transcript"));
    assert_eq!(session.stages().state_of("transcript"), StageState::Running);
    assert_eq!(session.log().last().expect("entry").origin, "TranscriptAgent");
}

#[test]
fn client_manager_module_fourth_retry_waits_eight_seconds() {
    let mut now = Instant::now();
    let (mut manager, wire) = started(now);

    for _ in 0..3 {
        push_close(&wire);
        manager.pump(now);
        now = manager.next_open_at().expect("retry scheduled");
        manager.pump(now);
        assert!(manager.is_connected());
    }
    assert_eq!(manager.reconnect_attempts(), 3);

    push_close(&wire);
    manager.pump(now);
    assert_eq!(manager.reconnect_attempts(), 4);
    assert_eq!(
        manager.next_open_at(),
        Some(now + Duration::from_millis(8000))
    );
    let session = manager.session();
    assert_eq!(session.connection_state(), ConnectionState::Reconnecting);
    let notice = session.notice().expect("retry notice");
    assert_eq!(notice.kind, NoticeKind::Transient);
    assert_eq!(
        notice.message,
        "Connection lost. Reconnecting in 8s... (Attempt 4/5)"
    );
}

#[test]
fn client_manager_module_retry_reopen_sends_reconnect() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);

    push_close(&wire);
    manager.pump(now);
    let retry_at = manager.next_open_at().expect("retry scheduled");
    assert_eq!(retry_at, now + Duration::from_millis(1000));
    manager.pump(retry_at);

    let directive = sent_json(&wire, 1);
    assert_eq!(directive["action"], "reconnect");
    assert_eq!(directive["workflow_id"], "wf_123");
    let session = manager.session();
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert!(session.notice().is_none());
    assert_eq!(
        session.log().last().expect("entry").body,
        "Connection restored successfully"
    );
}

#[test]
fn client_manager_module_gives_up_after_five_retries() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    wire.borrow_mut().refuse_opens = true;

    push_close(&wire);
    manager.pump(now);
    for _ in 0..10 {
        let Some(at) = manager.next_open_at() else {
            break;
        };
        manager.pump(at);
    }

    assert_eq!(manager.reconnect_attempts(), 5);
    assert_eq!(wire.borrow().opened.len(), 6);
    assert!(manager.is_settled());
    let session = manager.session();
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(session.terminal(), TerminalKind::None);
    let notice = session.notice().expect("exhausted notice");
    assert_eq!(notice.kind, NoticeKind::Permanent);
    assert!(notice.message.contains("Maximum reconnection attempts reached"));
}

#[test]
fn client_manager_module_never_retries_a_connection_that_never_started() {
    let now = Instant::now();
    let (mut manager, wire) = manager();
    wire.borrow_mut().refuse_opens = true;
    manager
        .begin(wf_123(), WorkflowIntent::start(PROJECT, "notes"), false, now)
        .expect("begin");
    manager.pump(now);

    assert_eq!(manager.reconnect_attempts(), 0);
    assert!(manager.is_settled());
    assert_eq!(
        manager.session().connection_state(),
        ConnectionState::Disconnected
    );
}

#[test]
fn client_manager_module_complete_clears_identity_and_stops_retrying() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    push_close(&wire);
    manager.pump(now);
    let retry_at = manager.next_open_at().expect("retry");
    manager.pump(retry_at);
    assert_eq!(manager.reconnect_attempts(), 1);

    push_text(
        &wire,
        r#"{"type":"complete","project_name":"Acme Portal","workflow_id":"wf_123","status":"completed","results":{"prd":"prd.md"}}"#,
    );
    push_close(&wire);
    manager.pump(retry_at);

    assert_eq!(manager.reconnect_attempts(), 0);
    assert!(manager.is_settled());
    assert_eq!(manager.store().load(PROJECT).expect("load"), None);
    let session = manager.session();
    assert_eq!(session.terminal(), TerminalKind::Completed);
    assert_eq!(session.current_stage(), None);
    assert_eq!(
        session.result().expect("result").results["prd"],
        "prd.md"
    );
    assert_eq!(
        session.log().last().expect("entry").body,
        "All agents completed successfully!"
    );
}

#[test]
fn client_manager_module_error_event_fails_workflow_with_tip() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);

    push_text(&wire, r#"{"type":"error","message":"LLM quota exceeded"}"#);
    manager.pump(now);

    assert_eq!(manager.store().load(PROJECT).expect("load"), None);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert!(manager.next_open_at().is_none());
    let session = manager.session();
    assert_eq!(session.terminal(), TerminalKind::Failed);
    assert_eq!(
        session.notice().expect("failure notice").kind,
        NoticeKind::Failure
    );
    let bodies: Vec<_> = session.log().iter().map(|entry| entry.body.as_str()).collect();
    assert_eq!(
        &bodies[bodies.len() - 2..],
        [
            "Error: LLM quota exceeded",
            "Tip: You can restart the workflow or check the logs for more details."
        ]
    );
}

#[test]
fn client_manager_module_end_cancels_pending_retry_and_keeps_identity() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    push_close(&wire);
    manager.pump(now);
    assert!(manager.next_open_at().is_some());

    manager.end();

    assert!(manager.next_open_at().is_none());
    assert!(manager.is_settled());
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(manager.store().load(PROJECT).expect("load"), Some(wf_123()));
    let session = manager.session();
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(session.notice().is_none());

    manager.pump(now + Duration::from_secs(30));
    assert_eq!(wire.borrow().opened.len(), 1);
}

#[test]
fn client_manager_module_ticks_elapsed_time_until_terminal() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);

    manager.pump(now + Duration::from_secs(3));
    assert_eq!(manager.session().elapsed_seconds(), 3);
    assert_eq!(manager.snapshot().elapsed_label, "00:03");

    push_text(&wire, r#"{"type":"complete","results":{}}"#);
    manager.pump(now + Duration::from_secs(65));
    manager.pump(now + Duration::from_secs(90));
    assert_eq!(manager.session().elapsed_seconds(), 65);
    assert_eq!(manager.snapshot().elapsed_label, "01:05");
}

#[test]
fn client_manager_module_subscribers_see_each_change() {
    let now = Instant::now();
    let (mut manager, wire) = manager();
    let updates = manager.subscribe();
    let initial = updates.try_recv().expect("initial snapshot");
    assert_eq!(initial.session.workflow_id(), None);

    manager
        .begin(wf_123(), WorkflowIntent::start(PROJECT, "notes"), false, now)
        .expect("begin");
    manager.pump(now);
    push_text(
        &wire,
        r#"{"type":"progress","stage":"storage","status":"completed","message":"Stored"}"#,
    );
    manager.pump(now);

    let latest = updates.try_iter().last().expect("snapshot after change");
    assert_eq!(latest.session.stages().state_of("storage"), StageState::Completed);
    assert_eq!(latest.progress_percentage, 8);
}

#[test]
fn client_manager_module_restore_hydrates_and_sends_reconnect() {
    let now = Instant::now();
    let (mut manager, wire) = manager();
    let mut agent_statuses = BTreeMap::new();
    agent_statuses.insert(
        "transcript".to_string(),
        RemoteStageStatus {
            status: StageState::Running,
            message: "Parsing".to_string(),
            timestamp: "t2".to_string(),
        },
    );
    agent_statuses.insert(
        "storage".to_string(),
        RemoteStageStatus {
            status: StageState::Completed,
            message: "Stored".to_string(),
            timestamp: "t1".to_string(),
        },
    );
    let report = WorkflowStatusReport {
        status: RemoteStatus::Running,
        agent_statuses,
        current_agent: Some("transcript".to_string()),
        results: None,
    };

    assert!(!manager.hydrate(wf_123(), &report));
    manager
        .begin(wf_123(), WorkflowIntent::resume(PROJECT), true, now)
        .expect("begin resume");
    manager.pump(now);

    let directive = sent_json(&wire, 0);
    assert_eq!(directive["action"], "reconnect");
    let session = manager.session();
    let order: Vec<_> = session.stages().iter().map(|entry| entry.stage.as_str()).collect();
    assert_eq!(order, ["storage", "transcript"]);
    assert_eq!(session.current_stage(), Some("transcript"));
    assert_eq!(
        session.log().last().expect("entry").body,
        "Workflow state restored successfully"
    );
}

#[test]
fn client_manager_module_fresh_begin_requires_transcript() {
    let (mut manager, wire) = manager();
    let err = manager
        .begin(wf_123(), WorkflowIntent::resume(PROJECT), false, Instant::now())
        .expect_err("missing transcript");
    assert!(err.to_string().contains("wf_123"));
    assert!(wire.borrow().opened.is_empty());
}

fn running_report() -> WorkflowStatusReport {
    WorkflowStatusReport {
        status: RemoteStatus::Running,
        agent_statuses: BTreeMap::new(),
        current_agent: None,
        results: None,
    }
}

#[test]
fn client_manager_module_resuming_another_workflow_restarts_elapsed_clock() {
    let t0 = Instant::now();
    let (mut manager, wire) = started(t0);
    let later = t0 + Duration::from_secs(100);
    manager.pump(later);
    assert_eq!(manager.session().elapsed_seconds(), 100);

    let other = WorkflowId::parse("wf_other").expect("id");
    manager.hydrate(other.clone(), &running_report());
    manager
        .begin(other.clone(), WorkflowIntent::resume(PROJECT), true, later)
        .expect("begin resume");
    manager.pump(later + Duration::from_secs(2));

    let session = manager.session();
    assert_eq!(session.workflow_id(), Some(&other));
    assert_eq!(session.elapsed_seconds(), 2);
    assert!(session.started_at().is_some());
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(wire.borrow().closed, 1);
    assert_eq!(
        wire.borrow().opened.last().map(String::as_str),
        Some("ws://localhost:8001/api/ws/wf_other")
    );
}

#[test]
fn client_manager_module_begin_closes_the_previous_connection_first() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    assert_eq!(wire.borrow().closed, 0);

    manager
        .begin(
            WorkflowId::parse("wf_456").expect("id"),
            WorkflowIntent::start(PROJECT, "second call notes"),
            false,
            now,
        )
        .expect("second begin");
    assert_eq!(wire.borrow().closed, 1);
    assert!(!manager.is_connected());

    manager.pump(now);
    assert_eq!(wire.borrow().opened.len(), 2);
    assert_eq!(wire.borrow().closed, 1);
    assert!(manager.is_connected());
    assert_eq!(manager.session().log().len(), 1);
}

#[test]
fn client_manager_module_end_stops_the_elapsed_ticker() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    manager.pump(now + Duration::from_secs(3));
    assert_eq!(manager.session().elapsed_seconds(), 3);

    manager.end();
    assert_eq!(wire.borrow().closed, 1);
    manager.pump(now + Duration::from_secs(60));
    assert_eq!(manager.session().elapsed_seconds(), 3);
}

#[test]
fn client_manager_module_run_until_settled_returns_on_terminal_event() {
    let now = Instant::now();
    let (mut manager, wire) = started(now);
    push_text(&wire, r#"{"type":"complete","results":{}}"#);

    let snapshot = manager.run_until_settled();

    assert_eq!(snapshot.session.terminal(), TerminalKind::Completed);
    assert!(manager.is_settled());
    assert_eq!(wire.borrow().closed, 1);
}
