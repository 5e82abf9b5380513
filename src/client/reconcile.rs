use super::identity_store::IdentityStore;
use super::manager::{ConnectionManager, WorkflowIntent};
use super::status_query::{RemoteStatus, StatusLookup, StatusQuery};
use super::transport::Transport;
use super::ClientError;
use crate::shared::ids::WorkflowId;
use std::time::Instant;

/// Which way the start-versus-resume decision went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing was persisted for the project.
    Fresh { workflow_id: WorkflowId },
    /// The engine still knows the persisted workflow; re-attached to it.
    Restored {
        workflow_id: WorkflowId,
        status: RemoteStatus,
    },
    /// The engine reported the persisted workflow absent, expired or failed.
    ReplacedStale {
        stale: WorkflowId,
        workflow_id: WorkflowId,
    },
    /// The status query itself failed; treated as a new workflow.
    FallbackFresh {
        stale: WorkflowId,
        workflow_id: WorkflowId,
        reason: String,
    },
}

impl Reconciliation {
    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            Self::Fresh { workflow_id }
            | Self::Restored { workflow_id, .. }
            | Self::ReplacedStale { workflow_id, .. }
            | Self::FallbackFresh { workflow_id, .. } => workflow_id,
        }
    }

    pub fn resumed(&self) -> bool {
        matches!(self, Self::Restored { .. })
    }
}

/// Decides between `start` and `resume` for `intent.project_name` and
/// calls `begin` on the manager accordingly.
pub fn reconcile<T, S, Q>(
    manager: &mut ConnectionManager<T, S>,
    query: &Q,
    intent: WorkflowIntent,
    now: Instant,
) -> Result<Reconciliation, ClientError>
where
    T: Transport,
    S: IdentityStore,
    Q: StatusQuery + ?Sized,
{
    let Some(stale) = manager.store().load(&intent.project_name)? else {
        if intent.transcript.is_none() {
            return Err(ClientError::NoPersistedWorkflow {
                project_name: intent.project_name,
            });
        }
        let workflow_id = start_fresh(manager, intent, now)?;
        return Ok(Reconciliation::Fresh { workflow_id });
    };

    match query.workflow_status(&stale) {
        Ok(StatusLookup::Found(report)) if report.is_resumable() => {
            let status = report.status;
            if manager.hydrate(stale.clone(), &report) {
                manager.store_mut().clear(&intent.project_name)?;
            }
            manager.begin(stale.clone(), intent, true, now)?;
            Ok(Reconciliation::Restored {
                workflow_id: stale,
                status,
            })
        }
        Ok(_) => {
            manager.store_mut().clear(&intent.project_name)?;
            ensure_start_payload(&intent, &stale)?;
            let workflow_id = start_fresh(manager, intent, now)?;
            Ok(Reconciliation::ReplacedStale { stale, workflow_id })
        }
        Err(err) => {
            ensure_start_payload(&intent, &stale)?;
            manager.store_mut().clear(&intent.project_name)?;
            let workflow_id = start_fresh(manager, intent, now)?;
            Ok(Reconciliation::FallbackFresh {
                stale,
                workflow_id,
                reason: err.to_string(),
            })
        }
    }
}

/// Starting over needs the input payload; a resume-only intent stops here.
fn ensure_start_payload(intent: &WorkflowIntent, stale: &WorkflowId) -> Result<(), ClientError> {
    if intent.transcript.is_some() {
        return Ok(());
    }
    Err(ClientError::MissingStartPayload {
        workflow_id: stale.to_string(),
    })
}

fn start_fresh<T: Transport, S: IdentityStore>(
    manager: &mut ConnectionManager<T, S>,
    intent: WorkflowIntent,
    now: Instant,
) -> Result<WorkflowId, ClientError> {
    let workflow_id = WorkflowId::generate(chrono::Utc::now().timestamp_millis())
        .map_err(ClientError::IdGeneration)?;
    manager
        .store_mut()
        .save(&intent.project_name, &workflow_id)?;
    manager.begin(workflow_id.clone(), intent, false, now)?;
    Ok(workflow_id)
}
