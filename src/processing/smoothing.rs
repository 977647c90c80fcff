use std::collections::{HashMap, VecDeque};

/// Per-beacon moving average over recent RSSI readings
#[derive(Debug, Clone)]
pub struct RssiSmoother {
    /// Number of readings averaged per beacon
    window_size: usize,
    history: HashMap<String, VecDeque<i32>>,
}

impl Default for RssiSmoother {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RssiSmoother {
    /// A window of 1 passes readings through unchanged
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            history: HashMap::new(),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Record a reading and return the smoothed RSSI for that beacon
    pub fn push(&mut self, address: &str, rssi: i32) -> f64 {
        let window = self.window_size;
        let samples = self
            .history
            .entry(address.to_string())
            .or_insert_with(|| VecDeque::with_capacity(window));
        samples.push_back(rssi);
        while samples.len() > window {
            samples.pop_front();
        }
        samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
    }

    /// Forget a beacon's history, e.g. after it leaves the registry
    pub fn forget(&mut self, address: &str) {
        self.history.remove(address);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_of_one_passes_through() {
        let mut smoother = RssiSmoother::new(1);
        assert_eq!(smoother.push("A", -60), -60.0);
        assert_eq!(smoother.push("A", -70), -70.0);
    }

    #[test]
    fn test_moving_average() {
        let mut smoother = RssiSmoother::new(3);
        assert_eq!(smoother.push("A", -60), -60.0);
        assert_eq!(smoother.push("A", -66), -63.0);
        assert_eq!(smoother.push("A", -63), -63.0);
        // Oldest sample (-60) drops out
        assert_eq!(smoother.push("A", -72), -67.0);
    }

    #[test]
    fn test_beacons_are_independent() {
        let mut smoother = RssiSmoother::new(4);
        smoother.push("A", -50);
        assert_eq!(smoother.push("B", -80), -80.0);
        smoother.forget("A");
        assert_eq!(smoother.push("A", -70), -70.0);
    }

    #[test]
    fn test_zero_window_clamped() {
        assert_eq!(RssiSmoother::new(0).window_size(), 1);
    }
}
