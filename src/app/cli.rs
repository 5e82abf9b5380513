#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    Resume,
    Status,
    Identities,
    Config,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "resume" => CliVerb::Resume,
        "status" => CliVerb::Status,
        "identities" => CliVerb::Identities,
        "config" => CliVerb::Config,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  run <project> <transcript_file|->    Start or resume the project's workflow and follow it"
            .to_string(),
        "  resume <project>                     Re-attach to the project's persisted workflow"
            .to_string(),
        "  status <workflow_id>                 Ask the engine for a workflow's current status"
            .to_string(),
        "  identities list                      Show persisted workflow ids per project".to_string(),
        "  identities forget <project>          Drop the persisted workflow id of a project"
            .to_string(),
        "  config show|path                     Print effective settings or the config path"
            .to_string(),
    ]
}

pub fn help_text() -> String {
    cli_help_lines().join("\n")
}
