use super::session::{StageBoard, StageState};

fn completed_stages(board: &StageBoard, total_stages: usize) -> usize {
    board.count_in(StageState::Completed).min(total_stages)
}

/// Share of the declared pipeline that completed, rounded to a whole percent.
pub fn progress_percentage(board: &StageBoard, total_stages: usize) -> u8 {
    if total_stages == 0 {
        return 0;
    }
    let completed = completed_stages(board, total_stages);
    let percent = (100.0 * completed as f64 / total_stages as f64).round();
    percent as u8
}

/// Average time per completed stage times the stages still to run. `None`
/// until at least one stage completed and some time has elapsed.
pub fn estimated_seconds_remaining(
    board: &StageBoard,
    elapsed_seconds: u64,
    total_stages: usize,
) -> Option<u64> {
    let completed = completed_stages(board, total_stages);
    if completed == 0 || elapsed_seconds == 0 {
        return None;
    }
    let per_stage = elapsed_seconds as f64 / completed as f64;
    let remaining = total_stages.saturating_sub(completed);
    Some((per_stage * remaining as f64).round() as u64)
}

pub fn format_elapsed(elapsed_seconds: u64) -> String {
    format!("{:02}:{:02}", elapsed_seconds / 60, elapsed_seconds % 60)
}

pub fn format_remaining(remaining_seconds: Option<u64>) -> String {
    let Some(seconds) = remaining_seconds else {
        return "Calculating...".to_string();
    };
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    if minutes > 0 {
        format!("~{minutes}m {seconds}s")
    } else {
        format!("~{seconds}s")
    }
}
