use stagewire::client::metrics::{
    estimated_seconds_remaining, format_elapsed, format_remaining, progress_percentage,
};
use stagewire::client::{StageBoard, StageState, StageStatus};

fn completed(board: &mut StageBoard, stage: &str) {
    board.upsert(
        stage,
        StageStatus {
            state: StageState::Completed,
            message: String::new(),
            timestamp: String::new(),
        },
    );
}

#[test]
fn client_progress_metrics_module_rounds_against_declared_pipeline() {
    let mut board = StageBoard::default();
    assert_eq!(progress_percentage(&board, 12), 0);
    for stage in ["storage", "transcript", "researcher"] {
        completed(&mut board, stage);
    }
    assert_eq!(progress_percentage(&board, 12), 25);
    assert_eq!(estimated_seconds_remaining(&board, 90, 12), Some(270));
    assert_eq!(format_remaining(Some(270)), "~4m 30s");
}

#[test]
fn client_progress_metrics_module_estimate_waits_for_first_completion() {
    let board = StageBoard::default();
    assert_eq!(estimated_seconds_remaining(&board, 120, 12), None);
    assert_eq!(format_remaining(None), "Calculating...");
    assert_eq!(format_elapsed(0), "00:00");
    assert_eq!(format_elapsed(754), "12:34");
}

#[test]
fn client_progress_metrics_module_extra_stages_cap_at_full() {
    let mut board = StageBoard::default();
    for idx in 0..14 {
        completed(&mut board, &format!("stage_{idx}"));
    }
    assert_eq!(progress_percentage(&board, 12), 100);
    assert_eq!(estimated_seconds_remaining(&board, 600, 12), Some(0));
    assert_eq!(format_remaining(Some(0)), "~0s");
}
