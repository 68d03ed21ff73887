//! Time-driven removal of records whose lifetime has elapsed.

use super::handle::KnowledgeHandle;
use super::store::KnowledgeStore;
use crate::config::MIN_EXPIRATION_INTERVAL_SECS;

/// Interval accumulator: sweeps run at most once per `interval` of simulated time.
#[derive(Debug, Clone)]
pub struct ExpirationSweeper {
    interval: f64,
    accumulator: f64,
}

impl ExpirationSweeper {
    pub fn new(interval: f64) -> Self {
        let interval = if interval >= MIN_EXPIRATION_INTERVAL_SECS {
            interval
        } else {
            MIN_EXPIRATION_INTERVAL_SECS
        };
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Adds `delta` seconds. Returns true (and resets) once the interval is reached.
    pub fn advance(&mut self, delta: f64) -> bool {
        if delta > 0.0 {
            self.accumulator += delta;
        }
        if self.accumulator < self.interval {
            return false;
        }
        self.accumulator = 0.0;
        true
    }
}

impl KnowledgeStore {
    /// Host tick. Runs a sweep when the configured interval has elapsed; returns records removed.
    pub fn tick(&mut self, delta_seconds: f64) -> usize {
        if self.sweeper.advance(delta_seconds) {
            self.sweep_expired()
        } else {
            0
        }
    }

    /// Removes every expired record now. Collects first, then removes.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.now();
        let mut expired: Vec<KnowledgeHandle> = self
            .records
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.handle)
            .collect();
        expired.sort();

        for handle in &expired {
            self.remove(*handle);
        }
        if !expired.is_empty() {
            tracing::info!(
                target: "worldlore::expiration",
                removed = expired.len(),
                remaining = self.records.len(),
                now,
                "expired knowledge swept"
            );
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_fires_once_per_interval() {
        let mut sweeper = ExpirationSweeper::new(5.0);
        assert!(!sweeper.advance(2.5));
        assert!(!sweeper.advance(2.0));
        assert!(sweeper.advance(0.5));
        assert!(!sweeper.advance(4.0));
        assert!(!sweeper.advance(-10.0));
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(ExpirationSweeper::new(0.0).interval(), MIN_EXPIRATION_INTERVAL_SECS);
    }
}
