use crate::sample::PositionSample;

/// Receiver of forwarded position updates and liveness-timeout signals.
///
/// This is both the interface the consumer (e.g. a navigation engine)
/// registers on the arbiter and the delegate interface the feeds use to
/// deliver into the arbiter. Implementations are invoked from runner tasks
/// and must be `Send + Sync`; interior state goes behind a lock.
pub trait PositionListener: Send + Sync {
    /// A new position sample from the currently active feed.
    fn on_position_update(&self, sample: PositionSample);

    /// No position has arrived within the expected freshness window.
    fn on_timeout(&self);
}
