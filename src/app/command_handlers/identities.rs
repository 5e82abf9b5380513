use crate::app::command_support::{ensure_state_root, identity_store};
use crate::client::IdentityStore;

pub fn cmd_identities(args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err("usage: identities <list|forget> ...".to_string());
    }

    let paths = ensure_state_root()?;
    let mut store = identity_store(&paths);
    match args[0].as_str() {
        "list" => {
            if args.len() != 1 {
                return Err("usage: identities list".to_string());
            }
            let entries = store.entries().map_err(|e| e.to_string())?;
            if entries.is_empty() {
                return Ok("no persisted workflows".to_string());
            }
            Ok(entries
                .iter()
                .map(|(project, workflow_id)| format!("{project}\t{workflow_id}"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "forget" => {
            if args.len() != 2 {
                return Err("usage: identities forget <project>".to_string());
            }
            let existing = store.load(&args[1]).map_err(|e| e.to_string())?;
            let Some(workflow_id) = existing else {
                return Ok(format!("no persisted workflow for project `{}`", args[1]));
            };
            store.clear(&args[1]).map_err(|e| e.to_string())?;
            Ok(format!(
                "forgot workflow {workflow_id} for project `{}`",
                args[1]
            ))
        }
        other => Err(format!("unknown identities subcommand `{other}`")),
    }
}
