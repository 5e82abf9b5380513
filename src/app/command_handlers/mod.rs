use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod config;
pub mod identities;
pub mod status;
pub mod workflow;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Run => workflow::cmd_run(&args[1..]),
        CliVerb::Resume => workflow::cmd_resume(&args[1..]),
        CliVerb::Status => status::cmd_status(&args[1..]),
        CliVerb::Identities => identities::cmd_identities(&args[1..]),
        CliVerb::Config => config::cmd_config(&args[1..]),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
