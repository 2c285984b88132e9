use thiserror::Error;

/// Errors rejecting the construction of a route playback feed.
///
/// `EmptyRoute` is the recoverable validation case a caller can hit with
/// ordinary input. The remaining variants mean the route or options data is
/// malformed and the host configuration is broken.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The route has no traversable sections.
    #[error("route has no traversable sections")]
    EmptyRoute,

    /// A section polyline has fewer than two geometry points.
    #[error("route section {index} has fewer than two geometry points")]
    DegenerateSection { index: usize },

    /// A section polyline contains a non-finite coordinate.
    #[error("route section {index} contains a non-finite coordinate")]
    InvalidGeometry { index: usize },

    /// A section carries a zero travel duration.
    #[error("route section {index} has a zero duration")]
    ZeroDuration { index: usize },

    /// The playback speed factor is zero, negative, or non-finite.
    #[error("speed factor must be positive and finite, got {0}")]
    InvalidSpeedFactor(f64),

    /// The notification interval is zero.
    #[error("notification interval must be non-zero")]
    ZeroNotificationInterval,
}
