use std::time::Duration;

/// Fixed-capacity ring of recent interest tick durations.
#[derive(Debug, Clone)]
pub struct TickTimer {
    history: Vec<Duration>,
    index: usize,
    filled: bool,
}

impl TickTimer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "timer capacity must be positive");
        Self {
            history: vec![Duration::ZERO; capacity],
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.index] = dt;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn recorded(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.index]
        }
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    pub fn average(&self) -> Duration {
        let samples = self.recorded();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or(Duration::ZERO)
    }
}
