// src/commands.rs
//
// Line protocol for the detection and operator collaborators, read from
// stdin so the core runs standalone. One command per line; a malformed
// line is reported and never stops the loop.

use crate::error::ControlError;
use crate::scheduler::Intersection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Count { lane: u8, count: i64 },
    Emergency { lane: u8 },
    Status,
    Stats,
    Quit,
}

fn parse_lane(token: &str) -> Result<u8, ControlError> {
    token
        .parse()
        .map_err(|_| ControlError::InvalidInput(format!("lane id must be 1-4, got {token:?}")))
}

/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_command(line: &str) -> Result<Option<Command>, ControlError> {
    let mut tokens = line.split_whitespace();
    let Some(keyword) = tokens.next() else {
        return Ok(None);
    };
    if keyword.starts_with('#') {
        return Ok(None);
    }

    let mut arg = |name: &str| {
        tokens
            .next()
            .ok_or_else(|| ControlError::InvalidInput(format!("{keyword}: missing {name}")))
    };

    let command = match keyword.to_ascii_lowercase().as_str() {
        "count" => {
            let lane = parse_lane(arg("lane")?)?;
            let token = arg("count")?;
            let count = token.parse().map_err(|_| {
                ControlError::InvalidInput(format!("count must be an integer, got {token:?}"))
            })?;
            Command::Count { lane, count }
        }
        "emergency" | "em" => Command::Emergency {
            lane: parse_lane(arg("lane")?)?,
        },
        "status" => Command::Status,
        "stats" => Command::Stats,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(ControlError::InvalidInput(format!(
                "unknown command {other:?} (try: count <lane> <n>, emergency <lane>, status, stats, quit)"
            )))
        }
    };
    Ok(Some(command))
}

/// Applies stdin commands to the intersection until EOF or `quit`.
pub async fn run_command_feed(intersection: Intersection, shutdown: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("command feed ready: count <lane> <n> | emergency <lane> | status | stats | quit");

    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Count { lane, count })) => {
                if let Err(err) = intersection.report_vehicle_count(lane, count) {
                    warn!("count rejected: {err}");
                }
            }
            Ok(Some(Command::Emergency { lane })) => {
                if let Err(err) = intersection.request_emergency(lane) {
                    warn!("emergency rejected: {err}");
                }
            }
            Ok(Some(Command::Status)) => {
                let snap = intersection.snapshot();
                info!(
                    "lane {} {:?}, {:.0}s remaining, {:?} mode, pending emergency: {:?}",
                    snap.active_lane,
                    snap.active_phase,
                    snap.remaining_seconds,
                    snap.mode,
                    snap.pending_emergency
                );
            }
            Ok(Some(Command::Stats)) => {
                let stats = intersection.statistics();
                info!(
                    "{} cycles completed, {} emergency grants, {:.0}s wait saved",
                    stats.cycles_completed, stats.emergency_grants, stats.wait_seconds_saved
                );
            }
            Ok(Some(Command::Quit)) => {
                info!("quit requested");
                let _ = shutdown.send(true);
                break;
            }
            Err(err) => warn!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_commands() {
        assert_eq!(
            parse_command("count 2 17").unwrap(),
            Some(Command::Count { lane: 2, count: 17 })
        );
        assert_eq!(
            parse_command("  EMERGENCY 3 ").unwrap(),
            Some(Command::Emergency { lane: 3 })
        );
        assert_eq!(parse_command("status").unwrap(), Some(Command::Status));
        assert_eq!(parse_command("stats").unwrap(), Some(Command::Stats));
        assert_eq!(parse_command("quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_blank_and_comment_lines() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# a comment").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse_command("count").is_err());
        assert!(parse_command("count 1").is_err());
        assert!(parse_command("count one 5").is_err());
        assert!(parse_command("count 1 many").is_err());
        assert!(parse_command("emergency").is_err());
        assert!(parse_command("launch 1").is_err());
    }

    #[test]
    fn test_parse_negative_count_passes_through() {
        // validation of the value itself belongs to the scheduler
        assert_eq!(
            parse_command("count 1 -5").unwrap(),
            Some(Command::Count { lane: 1, count: -5 })
        );
    }
}
