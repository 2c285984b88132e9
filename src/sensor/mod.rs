pub mod error;

use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::listener::PositionListener;
use crate::sample::PositionSample;

use self::error::ListenerNotFound;

/// Handle to an auxiliary listener registration on a sensor subsystem.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sensor-derived positioning subsystem the arbiter consumes.
///
/// `start_locating`/`stop_locating` control delivery to a single primary
/// listener (the arbiter's live feed). Auxiliary listeners receive every raw
/// sample the subsystem produces regardless of the primary subscription,
/// which is what lets diagnostics overlays observe the sensor while the
/// arbiter forwards simulated playback.
pub trait SensorPositioning: Send + Sync {
    fn start_locating(&self, listener: Arc<dyn PositionListener>);
    fn stop_locating(&self);
    fn add_listener(&self, listener: Arc<dyn PositionListener>) -> ListenerId;
    fn remove_listener(&self, listener_id: &ListenerId) -> Result<(), ListenerNotFound>;
}

/// Reference in-process implementation of [`SensorPositioning`].
///
/// The host's position driver pushes fixes in through [`publish`], and the
/// hub fans them out to the primary listener (while locating) and to every
/// auxiliary listener.
///
/// [`publish`]: SensorHub::publish
pub struct SensorHub {
    primary: Mutex<Option<Arc<dyn PositionListener>>>,
    auxiliary: DashMap<ListenerId, Arc<dyn PositionListener>, ahash::RandomState>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self {
            primary: Mutex::new(None),
            auxiliary: DashMap::default(),
        }
    }

    /// Deliver a raw sensor fix to all current listeners.
    pub fn publish(&self, sample: PositionSample) {
        let primary = self
            .primary
            .lock()
            .expect("sensor primary lock poisoned")
            .clone();
        if let Some(listener) = primary {
            listener.on_position_update(sample.clone());
        }

        for entry in self.auxiliary.iter() {
            entry.value().on_position_update(sample.clone());
        }
    }

    pub fn auxiliary_count(&self) -> usize {
        self.auxiliary.len()
    }

    pub fn is_locating(&self) -> bool {
        self.primary
            .lock()
            .expect("sensor primary lock poisoned")
            .is_some()
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPositioning for SensorHub {
    fn start_locating(&self, listener: Arc<dyn PositionListener>) {
        debug!("sensor hub locating started");
        *self.primary.lock().expect("sensor primary lock poisoned") = Some(listener);
    }

    fn stop_locating(&self) {
        debug!("sensor hub locating stopped");
        *self.primary.lock().expect("sensor primary lock poisoned") = None;
    }

    fn add_listener(&self, listener: Arc<dyn PositionListener>) -> ListenerId {
        let listener_id = ListenerId::generate();
        self.auxiliary.insert(listener_id, listener);
        listener_id
    }

    fn remove_listener(&self, listener_id: &ListenerId) -> Result<(), ListenerNotFound> {
        self.auxiliary
            .remove(listener_id)
            .map(|_| ())
            .ok_or(ListenerNotFound {
                listener_id: *listener_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::GeoCoordinates;

    struct Recorder {
        samples: Mutex<Vec<PositionSample>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.samples.lock().unwrap().len()
        }
    }

    impl PositionListener for Recorder {
        fn on_position_update(&self, sample: PositionSample) {
            self.samples.lock().unwrap().push(sample);
        }

        fn on_timeout(&self) {}
    }

    fn fix(ts: u64) -> PositionSample {
        PositionSample::new(GeoCoordinates::new(37.7749, -122.4194), ts)
    }

    #[test]
    fn test_primary_receives_only_while_locating() {
        let hub = SensorHub::new();
        let recorder = Recorder::new();

        hub.publish(fix(1));
        assert_eq!(recorder.count(), 0);

        hub.start_locating(recorder.clone());
        assert!(hub.is_locating());
        hub.publish(fix(2));
        assert_eq!(recorder.count(), 1);

        hub.stop_locating();
        hub.publish(fix(3));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_auxiliary_fanout_and_removal() {
        let hub = SensorHub::new();
        let first = Recorder::new();
        let second = Recorder::new();

        let first_id = hub.add_listener(first.clone());
        let _second_id = hub.add_listener(second.clone());
        assert_eq!(hub.auxiliary_count(), 2);

        hub.publish(fix(1));
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);

        hub.remove_listener(&first_id).unwrap();
        hub.publish(fix(2));
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 2);
    }

    #[test]
    fn test_remove_unknown_listener_errors() {
        let hub = SensorHub::new();
        let unknown = ListenerId::generate();

        let result = hub.remove_listener(&unknown);
        assert!(matches!(result, Err(ListenerNotFound { .. })));
    }

    #[test]
    fn test_auxiliary_receives_independent_of_locating() {
        let hub = SensorHub::new();
        let aux = Recorder::new();
        hub.add_listener(aux.clone());

        // No primary subscription at all.
        hub.publish(fix(1));
        assert_eq!(aux.count(), 1);
    }
}
