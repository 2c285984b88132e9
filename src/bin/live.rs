use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use position_arbiter::arbiter::PositionArbiter;
use position_arbiter::listener::PositionListener;
use position_arbiter::sample::{GeoCoordinates, PositionSample};
use position_arbiter::sensor::SensorHub;
use position_arbiter::unix_time_ms;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Logs everything the arbiter forwards to its registered listener.
struct LogListener;

impl PositionListener for LogListener {
    fn on_position_update(&self, sample: PositionSample) {
        info!(
            lat = sample.coordinates.latitude,
            lon = sample.coordinates.longitude,
            speed_mps = sample.speed_mps,
            "position update"
        );
    }

    fn on_timeout(&self) {
        warn!("no fresh position, signal lost?");
    }
}

/// Auxiliary observer on the raw sensor path.
struct RawSensorLog;

impl PositionListener for RawSensorLog {
    fn on_position_update(&self, sample: PositionSample) {
        debug!(
            lat = sample.coordinates.latitude,
            lon = sample.coordinates.longitude,
            "raw sensor fix"
        );
    }

    fn on_timeout(&self) {}
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let hub = Arc::new(SensorHub::new());
    let mut arbiter = PositionArbiter::new(hub.clone());
    arbiter.set_listener(Arc::new(LogListener));
    arbiter.add_auxiliary_listener(Arc::new(RawSensorLog));
    arbiter.start();

    info!("live positioning demo: jittered fixes at 1 Hz with a signal gap");

    // Synthetic GPS driver standing in for the platform's position engine.
    let driver = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(1));
        for second in 0..15u32 {
            ticker.tick().await;

            // Drop fixes for a while to trip the staleness check.
            if (6..10).contains(&second) {
                continue;
            }

            let jitter_lat: f64 = rand::random_range(-1.0e-4..1.0e-4);
            let jitter_lon: f64 = rand::random_range(-1.0e-4..1.0e-4);
            let fix = PositionSample::new(
                GeoCoordinates::new(37.7749 + jitter_lat, -122.4194 + jitter_lon),
                unix_time_ms(),
            )
            .with_speed(1.4);
            hub.publish(fix);
        }
    });
    driver.await?;

    arbiter.stop();
    info!("demo finished");
    Ok(())
}
