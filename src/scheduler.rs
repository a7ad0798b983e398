// src/scheduler.rs
//
// The per-intersection state machine. Owns all lane state, the active
// lane pointer and phase countdown, and the emergency-override protocol.
// Time is fed in through `tick` as logical elapsed seconds, so the
// machine itself is deterministic; wall timestamps are only stamped on
// segment boundaries for the persisted records.

use crate::error::ControlError;
use crate::recorder::CycleRecorder;
use crate::timing::TimingPolicy;
use crate::types::{
    CycleRecord, LaneState, Phase, SchedulerSnapshot, SignalMode, Statistics, TimingConfig,
    LANE_COUNT, YELLOW_SECONDS,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

fn lane_index(lane: u8) -> Result<usize, ControlError> {
    if (1..=LANE_COUNT as u8).contains(&lane) {
        Ok((lane - 1) as usize)
    } else {
        Err(ControlError::InvalidLane(lane))
    }
}

pub struct SignalScheduler {
    lanes: [LaneState; LANE_COUNT],
    active_lane: u8,
    active_phase: Phase,
    remaining_seconds: f64,
    mode: SignalMode,
    pending_emergency: Option<u8>,
    /// Set by an emergency request for another lane while we are green:
    /// the next tick forces yellow regardless of remaining time.
    truncate_on_next_tick: bool,

    // Logical clock accumulated from ticks, and the bookkeeping for the
    // segment currently in flight.
    clock_seconds: f64,
    segment_started_clock: f64,
    segment_started_at: DateTime<Utc>,
    segment_vehicle_count: u32,
    segment_scheduled_green: f64,

    timing: TimingPolicy,
    stats: Statistics,
}

impl SignalScheduler {
    /// Starts with lane 1 green at the minimum duration, normal mode.
    pub fn new(timing: TimingConfig) -> Self {
        let timing = TimingPolicy::new(timing);
        let mut scheduler = Self {
            lanes: [LaneState::default(); LANE_COUNT],
            active_lane: 1,
            active_phase: Phase::Green,
            remaining_seconds: 0.0,
            mode: SignalMode::Normal,
            pending_emergency: None,
            truncate_on_next_tick: false,
            clock_seconds: 0.0,
            segment_started_clock: 0.0,
            segment_started_at: Utc::now(),
            segment_vehicle_count: 0,
            segment_scheduled_green: 0.0,
            timing,
            stats: Statistics::default(),
        };
        scheduler.start_segment(1, SignalMode::Normal, "startup");
        scheduler
    }

    /// Advances the countdown. Returns the record of a completed
    /// GREEN+YELLOW segment when a lane change happens, so the caller
    /// can hand it off outside the lock.
    pub fn tick(&mut self, elapsed_seconds: f64) -> Result<Option<CycleRecord>, ControlError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(ControlError::InvalidInput(format!(
                "elapsed seconds must be non-negative, got {elapsed_seconds}"
            )));
        }
        self.clock_seconds += elapsed_seconds;

        if self.active_phase == Phase::Green && self.truncate_on_next_tick {
            self.truncate_on_next_tick = false;
            self.enter_yellow("emergency preemption");
            return Ok(None);
        }

        self.remaining_seconds -= elapsed_seconds;
        if self.remaining_seconds > 0.0 {
            return Ok(None);
        }
        self.remaining_seconds = 0.0;

        match self.active_phase {
            Phase::Green => {
                self.enter_yellow("green expired");
                Ok(None)
            }
            Phase::Yellow => Ok(Some(self.advance_lane())),
            // unreachable in practice: the active lane is never red
            Phase::Red => Ok(None),
        }
    }

    /// Stores a fresh observation for the lane. Read at the lane's next
    /// green-duration computation; no immediate phase effect.
    pub fn report_vehicle_count(&mut self, lane: u8, count: i64) -> Result<(), ControlError> {
        let index = lane_index(lane)?;
        let count = u32::try_from(count).map_err(|_| {
            ControlError::InvalidInput(format!(
                "vehicle count for lane {lane} must be a non-negative integer, got {count}"
            ))
        })?;
        self.lanes[index].vehicle_count = count;
        Ok(())
    }

    /// Grants immediate extended priority to a lane. If the lane is
    /// already green it is extended in place; otherwise the request is
    /// held pending and the current green is cut short at the next tick.
    pub fn request_emergency(&mut self, lane: u8) -> Result<(), ControlError> {
        let index = lane_index(lane)?;

        if lane == self.active_lane && self.active_phase == Phase::Green {
            let emergency_green = self.timing.config().emergency_green_seconds;
            match self.mode {
                SignalMode::Emergency => {
                    // already serving an emergency on this lane; extend only
                    self.remaining_seconds = self.remaining_seconds.max(emergency_green);
                }
                SignalMode::Normal => {
                    self.mode = SignalMode::Emergency;
                    self.remaining_seconds = emergency_green;
                    self.stats.emergency_grants += 1;
                }
            }
            self.lanes[index].emergency_requested = false;
            if self.pending_emergency == Some(lane) {
                self.pending_emergency = None;
            }
            warn!(
                "[OVERRIDE] emergency in active lane {lane}, green extended to {:.0}s",
                self.remaining_seconds
            );
            return Ok(());
        }

        // A newer request supersedes a still-pending one.
        if let Some(previous) = self.pending_emergency {
            if previous != lane {
                self.lanes[(previous - 1) as usize].emergency_requested = false;
            }
        }
        self.lanes[index].emergency_requested = true;
        self.pending_emergency = Some(lane);
        // an in-progress emergency green is served to completion; only a
        // normal green gets cut short
        if self.active_phase == Phase::Green && self.mode == SignalMode::Normal {
            self.truncate_on_next_tick = true;
        }
        warn!(
            "[OVERRIDE] emergency requested for lane {lane}, preempting lane {}",
            self.active_lane
        );
        Ok(())
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let mut lane_phases = [Phase::Red; LANE_COUNT];
        lane_phases[(self.active_lane - 1) as usize] = self.active_phase;
        let mut vehicle_counts = [0u32; LANE_COUNT];
        for (slot, lane) in vehicle_counts.iter_mut().zip(self.lanes.iter()) {
            *slot = lane.vehicle_count;
        }
        SchedulerSnapshot {
            active_lane: self.active_lane,
            active_phase: self.active_phase,
            remaining_seconds: self.remaining_seconds,
            mode: self.mode,
            pending_emergency: self.pending_emergency,
            lane_phases,
            vehicle_counts,
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    fn enter_yellow(&mut self, reason: &str) {
        self.active_phase = Phase::Yellow;
        self.remaining_seconds = YELLOW_SECONDS;
        info!(
            "lane {} GREEN -> YELLOW ({YELLOW_SECONDS:.0}s buffer, {reason})",
            self.active_lane
        );
    }

    /// Completes the yellow phase: emits the record for the finished
    /// segment, selects the next lane, and starts its green.
    fn advance_lane(&mut self) -> CycleRecord {
        let finished = self.active_lane;
        let record = CycleRecord {
            lane_id: finished,
            vehicle_count: self.segment_vehicle_count,
            duration_seconds: self.clock_seconds - self.segment_started_clock,
            mode: self.mode,
            start_time: self.segment_started_at,
            end_time: Utc::now(),
        };

        self.stats.cycles_completed += 1;
        if self.mode == SignalMode::Normal {
            let saved = self.timing.config().max_green_seconds - self.segment_scheduled_green;
            self.stats.wait_seconds_saved += saved.max(0.0);
        }

        // Emergency-pending wins unless it names the lane just vacated;
        // in that case the request stays pending until actually served.
        let (next, mode, reason) = match self.pending_emergency {
            Some(lane) if lane != finished => {
                self.pending_emergency = None;
                self.lanes[(lane - 1) as usize].emergency_requested = false;
                self.stats.emergency_grants += 1;
                (lane, SignalMode::Emergency, "emergency override")
            }
            _ => (
                (finished % LANE_COUNT as u8) + 1,
                SignalMode::Normal,
                "normal cycle",
            ),
        };
        self.start_segment(next, mode, reason);
        record
    }

    fn start_segment(&mut self, lane: u8, mode: SignalMode, reason: &str) {
        let count = self.lanes[(lane - 1) as usize].vehicle_count;
        let duration = self.timing.green_duration(count, mode);
        let from = self.active_lane;
        self.active_lane = lane;
        self.active_phase = Phase::Green;
        self.mode = mode;
        self.remaining_seconds = duration;
        self.truncate_on_next_tick = false;
        self.segment_started_clock = self.clock_seconds;
        self.segment_started_at = Utc::now();
        self.segment_vehicle_count = count;
        self.segment_scheduled_green = duration;
        info!(
            "lane {from} -> lane {lane} GREEN for {duration:.0}s ({count} vehicles, {mode:?}, {reason})"
        );
    }
}

/// Cloneable handle for one intersection. All public operations go
/// through a single mutex; record emission happens after the lock is
/// released so a slow sink can never stall ticking.
#[derive(Clone)]
pub struct Intersection {
    scheduler: Arc<Mutex<SignalScheduler>>,
    recorder: CycleRecorder,
}

impl Intersection {
    pub fn new(timing: TimingConfig, recorder: CycleRecorder) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(SignalScheduler::new(timing))),
            recorder,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SignalScheduler> {
        // The scheduler never panics mid-transition, so a poisoned lock
        // still holds consistent state.
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick(&self, elapsed_seconds: f64) -> Result<(), ControlError> {
        let completed = self.lock().tick(elapsed_seconds)?;
        if let Some(record) = completed {
            self.recorder.record(record);
        }
        Ok(())
    }

    pub fn report_vehicle_count(&self, lane: u8, count: i64) -> Result<(), ControlError> {
        self.lock().report_vehicle_count(lane, count)
    }

    pub fn request_emergency(&self, lane: u8) -> Result<(), ControlError> {
        self.lock().request_emergency(lane)
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.lock().snapshot()
    }

    pub fn statistics(&self) -> Statistics {
        self.lock().statistics()
    }
}
