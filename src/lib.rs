pub mod arbiter;
pub mod listener;
pub mod playback;
pub mod route;
pub mod sample;
pub mod sensor;
pub mod state_machine;

use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// A live position older than this window counts as stale and triggers a
/// timeout signal to the registered listener.
pub const LIVENESS_WINDOW: Duration = Duration::from_secs(2);

/// Cadence of the periodic staleness check while the arbiter is started.
pub const LIVENESS_TICK_PERIOD: Duration = Duration::from_millis(500);

/// Default playback speed multiplier relative to the route's nominal travel
/// speed.
pub const DEFAULT_SPEED_FACTOR: f64 = 10.0;

/// Default interval between simulated position notifications.
pub const DEFAULT_NOTIFICATION_INTERVAL_MS: u64 = 100;

/// Milliseconds since the Unix epoch, as carried by [`sample::PositionSample`]
/// timestamps.
pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
