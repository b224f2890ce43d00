// ui.rs

use crate::pattern::STEPS_PER_BAR;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

fn step_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:40.cyan}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("⣀⣤⣦⣶⣷⣿ ")
}

fn loop_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:20.white/black}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▊ ")
}

/// Terminal display of playback position: one bar for the current pass
/// through the pattern, one for completed passes
pub struct StepProgress {
    #[allow(dead_code)]
    multi_progress: MultiProgress,
    step_pb: ProgressBar,
    loop_pb: ProgressBar,
    length: usize,
    loops_done: u64,
}

impl StepProgress {
    pub fn new(length: usize, loops: u32) -> Self {
        Self::with_draw_target(length, loops, ProgressDrawTarget::stderr())
    }

    /// A progress display that draws nothing, for tests and quiet runs
    pub fn hidden(length: usize, loops: u32) -> Self {
        Self::with_draw_target(length, loops, ProgressDrawTarget::hidden())
    }

    fn with_draw_target(length: usize, loops: u32, target: ProgressDrawTarget) -> Self {
        let multi_progress = MultiProgress::with_draw_target(target);

        let step_pb = multi_progress.add(ProgressBar::new(length as u64));
        step_pb.set_style(step_style());
        step_pb.set_prefix("Step");

        let loop_pb = multi_progress.add(ProgressBar::new(u64::from(loops)));
        loop_pb.set_style(loop_style());
        loop_pb.set_prefix("Loop");

        Self {
            multi_progress,
            step_pb,
            loop_pb,
            length,
            loops_done: 0,
        }
    }

    /// Records that `step` has sounded. Returns the number of completed
    /// passes so far.
    pub fn on_step(&mut self, step: usize) -> u64 {
        let position = step as u64 + 1;
        self.step_pb.set_position(position);
        self.step_pb
            .set_message(format!("bar {}", step / STEPS_PER_BAR + 1));

        if step + 1 == self.length {
            self.loops_done += 1;
            self.loop_pb.set_position(self.loops_done);
        }
        self.loops_done
    }

    pub fn loops_done(&self) -> u64 {
        self.loops_done
    }

    pub fn finish(&self) {
        self.step_pb.finish_and_clear();
        self.loop_pb.finish();
    }
}
