use thiserror::Error;

use crate::playback::error::PlaybackError;

/// Errors returned by `enable_simulated_playback`.
///
/// Either variant leaves the arbiter in its prior mode. `InvalidRoute` is the
/// recoverable validation case; `FeedConstruction` means the playback
/// generator rejected its inputs, which is a fatal configuration error the
/// host is expected to surface as a hard failure rather than retry.
#[derive(Debug, Error)]
pub enum EnablePlaybackError {
    /// The route has no traversable sections.
    #[error("route has no traversable sections")]
    InvalidRoute,

    /// The playback generator rejected the route or options.
    #[error("failed to construct playback feed")]
    FeedConstruction(#[source] PlaybackError),
}
