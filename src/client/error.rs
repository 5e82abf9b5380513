use super::identity_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("workflow `{workflow_id}` cannot start without a transcript")]
    MissingStartPayload { workflow_id: String },
    #[error("failed to generate workflow id: {0}")]
    IdGeneration(String),
    #[error("no persisted workflow for project `{project_name}`")]
    NoPersistedWorkflow { project_name: String },
    #[error("persisted identity store failed: {0}")]
    Store(#[from] StoreError),
}
