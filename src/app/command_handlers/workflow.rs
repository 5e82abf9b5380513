use crate::app::command_support::{
    build_manager, describe_reconciliation, ensure_state_root, format_entry, load_settings,
    render_summary,
};
use crate::client::{reconcile, HttpStatusClient, NoticeKind, TerminalKind, WorkflowIntent};
use std::fs;
use std::io::Read;
use std::thread;
use std::time::Instant;

pub fn cmd_run(args: &[String]) -> Result<String, String> {
    if args.len() != 2 {
        return Err("usage: run <project> <transcript_file|->".to_string());
    }
    let transcript = read_transcript(&args[1])?;
    if transcript.trim().is_empty() {
        return Err("transcript must be non-empty".to_string());
    }
    follow(WorkflowIntent::start(args[0].clone(), transcript))
}

pub fn cmd_resume(args: &[String]) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: resume <project>".to_string());
    }
    follow(WorkflowIntent::resume(args[0].clone()))
}

fn read_transcript(source: &str) -> Result<String, String> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .map_err(|e| format!("failed to read transcript from stdin: {e}"))?;
        return Ok(body);
    }
    fs::read_to_string(source).map_err(|e| format!("failed to read transcript {source}: {e}"))
}

/// Reconciles, then streams log entries and notices until the workflow
/// settles. A failed or unreachable workflow is reported as an error.
fn follow(intent: WorkflowIntent) -> Result<String, String> {
    let settings = load_settings()?;
    let paths = ensure_state_root()?;
    let query = HttpStatusClient::from_settings(&settings);
    let mut manager = build_manager(&settings, &paths);
    let project_name = intent.project_name.clone();

    let updates = manager.subscribe();
    let printer = thread::spawn(move || {
        let mut printed = 0;
        let mut last_notice: Option<String> = None;
        for snapshot in updates {
            for entry in snapshot.session.log().iter().skip(printed) {
                println!("{}", format_entry(entry));
            }
            printed = snapshot.session.log().len();
            let notice = snapshot
                .session
                .notice()
                .map(|notice| notice.message.clone());
            if notice != last_notice {
                if let Some(message) = &notice {
                    eprintln!("{message}");
                }
                last_notice = notice;
            }
        }
    });

    let decision = reconcile(&mut manager, &query, intent, Instant::now())
        .map_err(|e| e.to_string())?;
    println!("{}", describe_reconciliation(&project_name, &decision));

    let snapshot = manager.run_until_settled();
    drop(manager);
    let _ = printer.join();

    let summary = render_summary(&snapshot);
    let unreachable = snapshot
        .session
        .notice()
        .is_some_and(|notice| notice.kind == NoticeKind::Permanent);
    if snapshot.session.terminal() == TerminalKind::Failed || unreachable {
        return Err(summary);
    }
    Ok(summary)
}
