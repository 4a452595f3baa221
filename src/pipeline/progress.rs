use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::RedubError;

use super::run::{PipelineRun, Stage};

/// Receives one discrete step per pipeline stage.
pub trait ProgressSink: Send + Sync {
    fn stage_started(&self, stage: Stage, step: usize, total: usize);

    fn stage_finished(&self, stage: Stage, elapsed: Duration);

    fn run_finished(&self, _run: &PipelineRun) {}

    fn run_failed(&self, _stage: Stage, _error: &RedubError) {}
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn stage_started(&self, _stage: Stage, _step: usize, _total: usize) {}

    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
}

/// Terminal progress bar advancing one tick per stage.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new(total_stages: usize) -> Self {
        let bar = ProgressBar::new(total_stages as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressSink for ConsoleProgress {
    fn stage_started(&self, stage: Stage, step: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(step.saturating_sub(1) as u64);
        self.bar.set_message(format!("{stage}..."));
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        self.bar.inc(1);
        self.bar
            .set_message(format!("✓ {stage} ({:.1}s)", elapsed.as_secs_f64()));
    }

    fn run_finished(&self, run: &PipelineRun) {
        let target = run
            .final_video()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.bar.finish_with_message(format!("✓ Done: {target}"));
    }

    fn run_failed(&self, stage: Stage, error: &RedubError) {
        self.bar
            .abandon_with_message(format!("✗ {stage} failed ({})", error.kind()));
    }
}
