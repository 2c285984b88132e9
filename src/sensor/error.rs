//! Error types for sensor listener management.

use crate::sensor::ListenerId;

/// Indicates that no auxiliary listener is registered under the given id.
#[derive(Debug, thiserror::Error)]
#[error("no auxiliary listener registered under {listener_id}")]
pub struct ListenerNotFound {
    pub listener_id: ListenerId,
}
