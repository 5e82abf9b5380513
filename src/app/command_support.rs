use crate::client::{
    ConnectionManager, FileIdentityStore, ManagerOptions, Reconciliation, SessionSnapshot,
    Severity, TerminalKind, TungsteniteTransport,
};
use crate::config::{
    bootstrap_state_root, default_state_root_path, load_global_settings, ConfigError, Settings,
    StatePaths,
};
use crate::shared::logging::EventLog;

pub type CliManager = ConnectionManager<TungsteniteTransport, FileIdentityStore>;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn ensure_state_root() -> Result<StatePaths, String> {
    let root = default_state_root_path().map_err(map_config_err)?;
    let paths = StatePaths::new(root);
    bootstrap_state_root(&paths).map_err(map_config_err)?;
    Ok(paths)
}

pub fn load_settings() -> Result<Settings, String> {
    load_global_settings().map_err(map_config_err)
}

pub fn identity_store(paths: &StatePaths) -> FileIdentityStore {
    FileIdentityStore::new(paths.identities_file())
}

pub fn build_manager(settings: &Settings, paths: &StatePaths) -> CliManager {
    ConnectionManager::new(
        TungsteniteTransport,
        identity_store(paths),
        ManagerOptions::from_settings(settings),
    )
    .with_log(EventLog::to_file(paths.client_log_path()))
}

pub fn describe_reconciliation(project_name: &str, decision: &Reconciliation) -> String {
    match decision {
        Reconciliation::Fresh { workflow_id } => {
            format!("starting workflow {workflow_id} for project `{project_name}`")
        }
        Reconciliation::Restored {
            workflow_id,
            status,
        } => format!(
            "resuming workflow {workflow_id} for project `{project_name}` (engine reports {status:?})"
        ),
        Reconciliation::ReplacedStale { stale, workflow_id } => format!(
            "workflow {stale} is no longer known to the engine; starting {workflow_id} for project `{project_name}`"
        ),
        Reconciliation::FallbackFresh {
            stale,
            workflow_id,
            reason,
        } => format!(
            "could not check workflow {stale} ({reason}); starting {workflow_id} for project `{project_name}`"
        ),
    }
}

pub fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "-",
        Severity::Success => "+",
        Severity::Error => "!",
    }
}

pub fn format_entry(entry: &crate::client::CommunicationEntry) -> String {
    format!(
        "{} [{}] {}: {}",
        severity_marker(entry.severity),
        entry.timestamp,
        entry.origin,
        entry.body
    )
}

pub fn render_summary(snapshot: &SessionSnapshot) -> String {
    let session = &snapshot.session;
    let mut lines = vec![
        format!(
            "workflow: {}",
            session
                .workflow_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("outcome: {:?}", session.terminal()),
        format!("connection: {:?}", session.connection_state()),
        format!("progress: {}%", snapshot.progress_percentage),
        format!("elapsed: {}", snapshot.elapsed_label),
    ];
    if session.terminal() == TerminalKind::None {
        lines.push(format!("remaining: {}", snapshot.remaining_label));
    }
    if let Some(notice) = session.notice() {
        lines.push(format!("notice: {}", notice.message));
    }
    lines.push("stages:".to_string());
    for entry in session.stages().iter() {
        lines.push(format!("  {}: {}", entry.stage, entry.status.state));
    }
    if let Some(result) = session.result() {
        if let Some(keys) = result.results.as_object().map(|map| {
            map.keys().cloned().collect::<Vec<_>>().join(", ")
        }) {
            lines.push(format!("results: {keys}"));
        }
    }
    lines.join("\n")
}
