use chrono::{DateTime, Utc};
use log::info;

/// Measures one pipeline stage of one request and logs how long it took.
pub struct StageTimer<'a> {
    stage: &'static str,
    request_id: &'a str,
    started: DateTime<Utc>,
}

impl<'a> StageTimer<'a> {
    pub fn start(stage: &'static str, request_id: &'a str) -> Self {
        info!("[{}] {}: starting", request_id, stage);

        StageTimer {
            stage,
            request_id,
            started: Utc::now(),
        }
    }

    /// Stop the timer, returning the elapsed milliseconds
    pub fn finish(self) -> i64 {
        let elapsed = (Utc::now() - self.started).num_milliseconds();
        info!(
            "[{}] {} duration: {} msec",
            self.request_id, self.stage, elapsed
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::StageTimer;

    #[test]
    fn elapsed_is_never_negative() {
        let t = StageTimer::start("Testing", "req-1");
        assert!(t.finish() >= 0);
    }
}
