use anyhow::{Context, Result};
use rollcall_core::{Catalog, RandomDraw, Roster};
use rollcall_hw::{CaptureController, SimulatedSource, V4l2Source, VideoSource};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use dbus_interface::{AttendanceService, BUS_NAME, OBJECT_PATH};

fn video_source(device: &str) -> Box<dyn VideoSource> {
    match device {
        "sim" => Box::new(SimulatedSource::default()),
        "sim-denied" => Box::new(SimulatedSource::denied()),
        path => Box::new(V4l2Source::new(path)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::from_env();
    let roster = match &config.roster_path {
        Some(path) => Roster::load(path)?,
        None => Roster::embedded().context("embedded roster")?,
    };

    let controller = CaptureController::new(video_source(&config.camera_device), Catalog::default());
    let engine = engine::spawn_engine(config.engine(), controller, roster, Box::new(RandomDraw::new()));

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(?event, "session event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, AttendanceService::new(engine.clone()))?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(
        bus = BUS_NAME,
        camera = %config.camera_device,
        "rollcalld ready"
    );

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");
    engine.shutdown().await;

    Ok(())
}
