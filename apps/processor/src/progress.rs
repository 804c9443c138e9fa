use indicatif::{ProgressBar, ProgressStyle};
use resume_processor::pipeline::stages::estimated_total_secs;
use resume_processor::{RunPhase, RunSnapshot};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Terminal view of a run: one bar from 0 to 100 percent, the current
/// message and the elapsed clock.
pub struct CliProgress {
    pb: ProgressBar,
    task: JoinHandle<()>,
}

impl CliProgress {
    pub fn spawn(mut snapshots: watch::Receiver<RunSnapshot>) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {prefix} {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        let view = pb.clone();
        let task = tokio::spawn(async move {
            let estimate = estimated_total_secs();
            let mut shown: Vec<&'static str> = Vec::new();
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                for insight in snapshot.stage_status.insights() {
                    if !shown.contains(&insight) {
                        view.println(format!("  * {insight}"));
                        shown.push(insight);
                    }
                }
                view.set_position(snapshot.progress_percentage.round() as u64);
                view.set_prefix(format!("{}s / ~{estimate}s", snapshot.elapsed_seconds));
                let message = match (&snapshot.phase, &snapshot.error_message) {
                    (RunPhase::Error, Some(error)) => {
                        format!("{} failed: {error}", snapshot.current_stage())
                    }
                    _ => snapshot.current_message.clone(),
                };
                view.set_message(message);
                if snapshot.phase == RunPhase::Completed {
                    view.finish();
                    break;
                }
            }
        });

        Self { pb, task }
    }

    pub fn finish(self) {
        self.task.abort();
        if !self.pb.is_finished() {
            self.pb.abandon();
        }
    }
}
