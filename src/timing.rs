// src/timing.rs
//
// Green duration policy: more observed vehicles buy more green time,
// clamped to the configured bounds. Emergency greens ignore the count.

use crate::types::{SignalMode, TimingConfig};

#[derive(Debug, Clone)]
pub struct TimingPolicy {
    config: TimingConfig,
}

impl TimingPolicy {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Deterministic and total: any count maps to a valid duration.
    pub fn green_duration(&self, vehicle_count: u32, mode: SignalMode) -> f64 {
        match mode {
            SignalMode::Emergency => self.config.emergency_green_seconds,
            SignalMode::Normal => {
                let raw = self.config.base_seconds
                    + vehicle_count as f64 * self.config.per_vehicle_seconds;
                // not `clamp`: a misconfigured min > max must not panic
                raw.max(self.config.min_green_seconds)
                    .min(self.config.max_green_seconds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TimingPolicy {
        TimingPolicy::new(TimingConfig::default())
    }

    #[test]
    fn test_normal_duration_within_bounds() {
        let policy = policy();
        for count in 0..200 {
            let duration = policy.green_duration(count, SignalMode::Normal);
            assert!(duration >= 15.0, "count {count} gave {duration}");
            assert!(duration <= 60.0, "count {count} gave {duration}");
        }
    }

    #[test]
    fn test_normal_duration_monotonic() {
        let policy = policy();
        let mut previous = 0.0;
        for count in 0..100 {
            let duration = policy.green_duration(count, SignalMode::Normal);
            assert!(duration >= previous, "duration decreased at count {count}");
            previous = duration;
        }
    }

    #[test]
    fn test_normal_duration_values() {
        let policy = policy();
        // base 15 + 2 per vehicle, clamped to [15, 60]
        assert_eq!(policy.green_duration(0, SignalMode::Normal), 15.0);
        assert_eq!(policy.green_duration(5, SignalMode::Normal), 25.0);
        assert_eq!(policy.green_duration(10, SignalMode::Normal), 35.0);
        assert_eq!(policy.green_duration(20, SignalMode::Normal), 55.0);
        assert_eq!(policy.green_duration(30, SignalMode::Normal), 60.0);
        assert_eq!(policy.green_duration(1000, SignalMode::Normal), 60.0);
    }

    #[test]
    fn test_emergency_duration_fixed() {
        let policy = policy();
        for count in [0, 1, 15, 80, 10_000] {
            assert_eq!(policy.green_duration(count, SignalMode::Emergency), 45.0);
        }
    }
}
