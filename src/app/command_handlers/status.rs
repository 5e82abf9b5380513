use crate::app::command_support::load_settings;
use crate::client::{HttpStatusClient, StatusLookup, StatusQuery};
use crate::shared::ids::WorkflowId;

pub fn cmd_status(args: &[String]) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: status <workflow_id>".to_string());
    }
    let workflow_id = WorkflowId::parse(&args[0])?;
    let settings = load_settings()?;
    let query = HttpStatusClient::from_settings(&settings);
    match query
        .workflow_status(&workflow_id)
        .map_err(|e| e.to_string())?
    {
        StatusLookup::Found(report) => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("failed to encode status report: {e}")),
        StatusLookup::Absent => Ok(format!("workflow {workflow_id} is not known to the engine")),
    }
}
