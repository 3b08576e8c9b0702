//! Monotonic progress reporting.

/// Filters percentage updates so observers only see increases.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    last: Option<f32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a new percentage.
    ///
    /// Returns the clamped value when it is the first report or higher than
    /// the last one reported.
    pub fn update(&mut self, percentage: f32) -> Option<f32> {
        let value = percentage.clamp(0.0, 100.0);
        match self.last {
            Some(last) if value <= last => None,
            _ => {
                self.last = Some(value);
                Some(value)
            }
        }
    }

    /// Last percentage reported.
    pub fn last(&self) -> Option<f32> {
        self.last
    }

    /// Forget the last report, e.g. when a new session starts.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
