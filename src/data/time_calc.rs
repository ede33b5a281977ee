use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Wall-clock time spent in each stage of one image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTiming {
    pub preprocess: Duration,
    pub inference: Duration,
    pub postprocess: Duration,
    pub visualization: Duration,
    pub total: Duration,
}

/// Checkpoint timer that fills an [`ImageTiming`] stage by stage.
#[derive(Debug)]
pub struct TimeCalc {
    start: Instant,
    last: Instant,
    timing: ImageTiming,
}

impl Default for TimeCalc {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            timing: ImageTiming::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Inference,
    Postprocess,
    Visualization,
}

impl TimeCalc {
    pub fn start() -> Self {
        Default::default()
    }

    /// Attributes the time since the previous checkpoint to `stage`.
    pub fn lap(&mut self, stage: Stage) -> Duration {
        let now = Instant::now();
        let d = now - self.last;
        self.last = now;
        match stage {
            Stage::Preprocess => self.timing.preprocess += d,
            Stage::Inference => self.timing.inference += d,
            Stage::Postprocess => self.timing.postprocess += d,
            Stage::Visualization => self.timing.visualization += d,
        }
        d
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(mut self) -> ImageTiming {
        self.timing.total = self.start.elapsed();
        self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laps_add_up_to_at_most_total() {
        let mut t = TimeCalc::start();
        std::thread::sleep(Duration::from_millis(2));
        t.lap(Stage::Preprocess);
        t.lap(Stage::Inference);
        let timing = t.finish();
        assert!(timing.preprocess >= Duration::from_millis(2));
        assert!(timing.preprocess + timing.inference <= timing.total);
    }

    #[test]
    fn elapsed_runs_from_start() {
        let mut t = TimeCalc::start();
        std::thread::sleep(Duration::from_millis(2));
        let lap = t.lap(Stage::Postprocess);
        assert!(t.elapsed() >= lap);
        assert!(t.elapsed() >= Duration::from_millis(2));
    }
}
