// src/driver.rs
//
// Fixed-cadence execution harness: turns wall time into `tick` calls.

use crate::scheduler::Intersection;
use crate::types::DriverConfig;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

pub struct Driver {
    intersection: Intersection,
    tick_interval: Duration,
}

impl Driver {
    pub fn new(intersection: Intersection, config: &DriverConfig) -> Self {
        let secs = config.tick_interval_secs;
        let secs = if secs.is_finite() && secs > 0.0 {
            secs
        } else {
            warn!("tick interval {secs}s is not usable, falling back to 1s");
            1.0
        };
        Self {
            intersection,
            tick_interval: Duration::from_secs_f64(secs),
        }
    }

    /// Ticks the intersection until shutdown is signalled. Cooperative:
    /// an in-flight tick always completes, no further ticks are issued,
    /// and the last snapshot stays queryable.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick completes immediately; consume it so
        // the countdown only advances by real elapsed time
        interval.tick().await;
        let mut last_tick = Instant::now();

        info!("driver ticking every {:.1}s", self.tick_interval.as_secs_f64());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // measured, not the nominal period: a delayed tick must
                    // not leave logical time behind the clock
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;
                    if let Err(err) = self.intersection.tick(elapsed) {
                        error!("tick rejected: {err}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("driver stopped");
    }
}
