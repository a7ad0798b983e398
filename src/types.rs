use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed number of lanes at the intersection.
pub const LANE_COUNT: usize = 4;

/// Duration of the yellow buffer between green and red. Fixed by design,
/// not configuration: it is purely a transition buffer.
pub const YELLOW_SECONDS: f64 = 3.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub driver: DriverConfig,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub base_seconds: f64,
    pub per_vehicle_seconds: f64,
    pub min_green_seconds: f64,
    pub max_green_seconds: f64,
    pub emergency_green_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_seconds: 15.0,
            per_vehicle_seconds: 2.0,
            min_green_seconds: 15.0,
            max_green_seconds: 60.0,
            emergency_green_seconds: 45.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub tick_interval_secs: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub queue_capacity: usize,
    pub output_path: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            output_path: "data/cycles.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Signal phase of a single lane. At any instant exactly one lane is
/// non-red; the rest are held at red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "RED")]
    Red,
    #[serde(rename = "GREEN")]
    Green,
    #[serde(rename = "YELLOW")]
    Yellow,
}

/// Operating mode of the current green segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalMode {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "EMERGENCY")]
    Emergency,
}

/// Per-lane inputs. The vehicle count is written by the detection
/// collaborator; the emergency flag by an operator/override input. The
/// scheduler only ever clears a consumed emergency flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaneState {
    pub vehicle_count: u32,
    pub emergency_requested: bool,
}

/// Immutable snapshot of one completed GREEN+YELLOW segment, handed to
/// the persistence collaborator. Field names are the stable persisted
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub lane_id: u8,
    pub vehicle_count: u32,
    pub duration_seconds: f64,
    pub mode: SignalMode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Read-only copy of the scheduler state, enough to render
/// "lane X, phase Y, N seconds remaining, mode Z" for all lanes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub active_lane: u8,
    pub active_phase: Phase,
    pub remaining_seconds: f64,
    pub mode: SignalMode,
    pub pending_emergency: Option<u8>,
    pub lane_phases: [Phase; LANE_COUNT],
    pub vehicle_counts: [u32; LANE_COUNT],
}

/// Running totals since startup. Wait saved compares each granted green
/// against the fixed maximum a static timer would have used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub cycles_completed: u64,
    pub emergency_grants: u64,
    pub wait_seconds_saved: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_record_field_names() {
        let record = CycleRecord {
            lane_id: 3,
            vehicle_count: 12,
            duration_seconds: 39.0,
            mode: SignalMode::Emergency,
            start_time: Utc::now(),
            end_time: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"lane_id\":3"));
        assert!(json.contains("\"vehicle_count\":12"));
        assert!(json.contains("\"duration_seconds\":39.0"));
        assert!(json.contains("\"mode\":\"EMERGENCY\""));
        assert!(json.contains("\"start_time\""));
        assert!(json.contains("\"end_time\""));
    }

    #[test]
    fn test_phase_and_mode_stable_names() {
        assert_eq!(serde_json::to_string(&Phase::Green).unwrap(), "\"GREEN\"");
        assert_eq!(serde_json::to_string(&Phase::Yellow).unwrap(), "\"YELLOW\"");
        assert_eq!(serde_json::to_string(&Phase::Red).unwrap(), "\"RED\"");
        assert_eq!(
            serde_json::to_string(&SignalMode::Normal).unwrap(),
            "\"NORMAL\""
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.timing.base_seconds, 15.0);
        assert_eq!(config.timing.max_green_seconds, 60.0);
        assert_eq!(config.driver.tick_interval_secs, 1.0);
        assert_eq!(config.recorder.queue_capacity, 64);
    }
}
