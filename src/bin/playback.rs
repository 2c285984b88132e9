use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use position_arbiter::arbiter::PositionArbiter;
use position_arbiter::listener::PositionListener;
use position_arbiter::playback::PlaybackOptions;
use position_arbiter::route::{Route, RouteSection};
use position_arbiter::sample::{GeoCoordinates, PositionSample};
use position_arbiter::sensor::SensorHub;
use position_arbiter::{DEFAULT_NOTIFICATION_INTERVAL_MS, DEFAULT_SPEED_FACTOR};
use tokio::sync::mpsc;
use tracing::info;

struct LogListener {
    done: mpsc::UnboundedSender<()>,
}

impl PositionListener for LogListener {
    fn on_position_update(&self, sample: PositionSample) {
        info!(
            lat = sample.coordinates.latitude,
            lon = sample.coordinates.longitude,
            bearing = sample.bearing_deg,
            speed_mps = sample.speed_mps,
            "simulated position"
        );
    }

    fn on_timeout(&self) {
        info!("playback feed signaled timeout");
        let _ = self.done.send(());
    }
}

/// A short drive through downtown San Francisco, two legs.
fn demo_route() -> Route {
    Route::new(vec![
        RouteSection::new(
            vec![
                GeoCoordinates::new(37.7749, -122.4194),
                GeoCoordinates::new(37.7769, -122.4170),
                GeoCoordinates::new(37.7790, -122.4150),
            ],
            Duration::from_secs(120),
        ),
        RouteSection::new(
            vec![
                GeoCoordinates::new(37.7790, -122.4150),
                GeoCoordinates::new(37.7805, -122.4120),
            ],
            Duration::from_secs(60),
        ),
    ])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let speed_factor = std::env::var("SPEED_FACTOR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SPEED_FACTOR);
    let notification_interval_ms = std::env::var("NOTIFY_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_NOTIFICATION_INTERVAL_MS);
    let options = PlaybackOptions {
        speed_factor,
        notification_interval_ms,
    };

    let hub = Arc::new(SensorHub::new());
    let mut arbiter = PositionArbiter::with_options(hub, options);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    arbiter.set_listener(Arc::new(LogListener { done: done_tx }));

    arbiter.start();
    arbiter.enable_simulated_playback(&demo_route())?;
    info!(
        speed_factor,
        notification_interval_ms, "playing back demo route"
    );

    // The playback feed signals timeout when the route is exhausted.
    done_rx.recv().await;
    arbiter.stop();
    info!("route completed");
    Ok(())
}
