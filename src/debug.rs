use std::time::{Duration, Instant};

/// Times the stages of one readback and logs them as a single line when dropped.
pub(crate) struct ReadbackTimer {
    label: String,
    started: Instant,
    last_mark: Instant,
    stages: Vec<(&'static str, Duration)>,
}

impl ReadbackTimer {
    pub fn start(label: String) -> Self {
        let now = Instant::now();
        Self {
            label,
            started: now,
            last_mark: now,
            stages: Vec::new(),
        }
    }

    /// Closes the stage that ran since the previous mark (or since the start).
    pub fn mark(&mut self, stage: &'static str) {
        let now = Instant::now();
        self.stages.push((stage, now - self.last_mark));
        self.last_mark = now;
    }

    fn summary(&self) -> String {
        let stages = self
            .stages
            .iter()
            .map(|(stage, duration)| format!("{stage} {:.3}ms", as_millis(*duration)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{} took {:.3}ms [{stages}]",
            self.label,
            as_millis(self.started.elapsed())
        )
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl Drop for ReadbackTimer {
    fn drop(&mut self) {
        log::debug!("{}", self.summary());
    }
}
