use std::collections::VecDeque;

use crate::config::sanitize_budget_ms;

/// Number of tick durations kept for the rolling average.
pub const FRAME_SAMPLE_WINDOW: usize = 30;

/// Rolling record of per-tick wall time.
#[derive(Clone, Debug)]
pub(crate) struct FrameTimer {
    budget_ms: f32,
    samples: VecDeque<f32>,
}

impl FrameTimer {
    pub(crate) fn new(budget_ms: f32) -> Self {
        Self {
            budget_ms: sanitize_budget_ms(budget_ms),
            samples: VecDeque::with_capacity(FRAME_SAMPLE_WINDOW),
        }
    }

    /// Stores a sample, returning whether it exceeded the budget.
    pub(crate) fn record(&mut self, frame_time_ms: f32) -> bool {
        if self.samples.len() == FRAME_SAMPLE_WINDOW {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(frame_time_ms);
        frame_time_ms > self.budget_ms
    }

    pub(crate) fn average_ms(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f32>() / self.samples.len() as f32)
    }

    pub(crate) const fn budget_ms(&self) -> f32 {
        self.budget_ms
    }
}
