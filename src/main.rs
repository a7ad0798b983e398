// src/main.rs

mod commands;
mod config;
mod driver;
mod error;
mod recorder;
mod scheduler;
mod timing;
mod types;

use anyhow::Result;
use driver::Driver;
use recorder::{run_jsonl_sink, CycleRecorder};
use scheduler::Intersection;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use types::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, load_error) = match Config::load("config.yaml") {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "traffic_signal_control={}",
                    config.logging.level
                ))
            }),
        )
        .init();

    info!("🚦 Traffic Signal Control starting");
    if let Some(err) = load_error {
        warn!("config.yaml not loaded ({err:#}), using defaults");
    }
    info!(
        "Timing: base {:.0}s + {:.0}s/vehicle, green [{:.0}s, {:.0}s], emergency {:.0}s",
        config.timing.base_seconds,
        config.timing.per_vehicle_seconds,
        config.timing.min_green_seconds,
        config.timing.max_green_seconds,
        config.timing.emergency_green_seconds
    );

    let (recorder, record_rx) = CycleRecorder::new(config.recorder.queue_capacity);
    let sink_task = tokio::spawn(run_jsonl_sink(
        record_rx,
        PathBuf::from(&config.recorder.output_path),
    ));

    let intersection = Intersection::new(config.timing.clone(), recorder.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver_task = tokio::spawn(Driver::new(intersection.clone(), &config.driver).run(shutdown_rx.clone()));
    let feed_task = tokio::spawn(commands::run_command_feed(
        intersection.clone(),
        shutdown_tx.clone(),
    ));

    let mut shutdown_watch = shutdown_rx;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
        _ = shutdown_watch.changed() => {}
    }

    driver_task.await?;
    feed_task.abort();

    let snap = intersection.snapshot();
    let stats = intersection.statistics();
    info!(
        "Final state: lane {} {:?}, {:.0}s remaining, {:?} mode",
        snap.active_lane, snap.active_phase, snap.remaining_seconds, snap.mode
    );
    info!(
        "{} cycles completed, {} emergency grants, {:.0}s wait saved, {} record(s) dropped",
        stats.cycles_completed,
        stats.emergency_grants,
        stats.wait_seconds_saved,
        recorder.dropped()
    );

    // closing every sender lets the sink drain and exit
    drop(intersection);
    drop(recorder);
    sink_task.await??;

    info!("✓ Shutdown complete");
    Ok(())
}
