//! The position source arbiter: one active feed, one registered listener.
//!
//! [`ArbiterMachine`] holds the pure arbitration logic; [`ArbiterContext`]
//! wraps it for delivery from runner tasks; [`PositionArbiter`] is the
//! service the host drives, owning the sensor subscription, the optional
//! playback feed, and the liveness ticker.

pub mod error;
pub mod machine;

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::listener::PositionListener;
use crate::playback::{PlaybackOptions, RoutePlayback};
use crate::route::Route;
use crate::sample::PositionSample;
use crate::sensor::error::ListenerNotFound;
use crate::sensor::{ListenerId, SensorPositioning};
use crate::state_machine::StateMachine;
use crate::{LIVENESS_TICK_PERIOD, unix_time_ms};

use self::error::EnablePlaybackError;
use self::machine::{ArbiterInput, ArbiterMachine, ArbiterMode, ArbiterOutput, FeedKind};

/// Shared wrapper around the arbitration machine and the registered
/// listener.
///
/// The machine lock is held only for the duration of a state transition and
/// released before any listener callback, so a listener is free to call back
/// into arbiter queries.
pub struct ArbiterContext {
    machine: Mutex<ArbiterMachine>,
    listener: Mutex<Option<Arc<dyn PositionListener>>>,
}

impl fmt::Debug for ArbiterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbiterContext")
            .field("machine", &"<ArbiterMachine>")
            .finish()
    }
}

impl ArbiterContext {
    fn new() -> Self {
        Self {
            machine: Mutex::new(ArbiterMachine::new()),
            listener: Mutex::new(None),
        }
    }

    /// Process one input and deliver any resulting outputs to the registered
    /// listener, if there is one.
    fn dispatch(&self, input: ArbiterInput) {
        let outputs = {
            let mut machine = self.machine.lock().expect("arbiter machine lock poisoned");
            machine.process_input(input);
            let mut outputs = Vec::new();
            while let Some(output) = machine.poll_output() {
                outputs.push(output);
            }
            outputs
        };

        if outputs.is_empty() {
            return;
        }

        let listener = self
            .listener
            .lock()
            .expect("arbiter listener lock poisoned")
            .clone();

        for output in outputs {
            match output {
                ArbiterOutput::Forward(sample) => {
                    if let Some(listener) = &listener {
                        listener.on_position_update(sample);
                    }
                }
                ArbiterOutput::Timeout => {
                    warn!("position timeout detected");
                    if let Some(listener) = &listener {
                        listener.on_timeout();
                    }
                }
            }
        }
    }

    fn set_listener(&self, listener: Arc<dyn PositionListener>) {
        *self
            .listener
            .lock()
            .expect("arbiter listener lock poisoned") = Some(listener);
    }

    fn clear_listener(&self) {
        *self
            .listener
            .lock()
            .expect("arbiter listener lock poisoned") = None;
    }

    fn mode(&self) -> ArbiterMode {
        self.machine
            .lock()
            .expect("arbiter machine lock poisoned")
            .mode()
    }

    fn selected_feed(&self) -> FeedKind {
        self.machine
            .lock()
            .expect("arbiter machine lock poisoned")
            .selected_feed()
    }

    fn last_known_position(&self) -> Option<PositionSample> {
        self.machine
            .lock()
            .expect("arbiter machine lock poisoned")
            .last_known()
            .cloned()
    }
}

/// Delivers live sensor fixes into the arbiter. The live sensor path has no
/// timeout signal of its own; staleness is the liveness ticker's job.
struct LiveFeedAdapter {
    ctx: Arc<ArbiterContext>,
}

impl PositionListener for LiveFeedAdapter {
    fn on_position_update(&self, sample: PositionSample) {
        self.ctx.dispatch(ArbiterInput::LiveSample(sample));
    }

    fn on_timeout(&self) {}
}

/// Delivers simulated playback output into the arbiter.
struct SimulatedFeedAdapter {
    ctx: Arc<ArbiterContext>,
}

impl PositionListener for SimulatedFeedAdapter {
    fn on_position_update(&self, sample: PositionSample) {
        self.ctx.dispatch(ArbiterInput::SimulatedSample(sample));
    }

    fn on_timeout(&self) {
        self.ctx.dispatch(ArbiterInput::SimulatedTimeout);
    }
}

/// Presents a single stable position-update interface to a consumer
/// regardless of whether positions originate from the live sensor subsystem
/// or from simulated route playback.
///
/// Not internally synchronized for concurrent command use: commands take
/// `&mut self` and are expected to be issued from one owning context, while
/// feed callbacks arrive on runner tasks and funnel through the shared
/// [`ArbiterContext`].
pub struct PositionArbiter {
    ctx: Arc<ArbiterContext>,
    sensor: Arc<dyn SensorPositioning>,
    playback: Option<RoutePlayback>,
    playback_options: PlaybackOptions,
    ticker: Option<JoinHandle<()>>,
}

impl PositionArbiter {
    pub fn new(sensor: Arc<dyn SensorPositioning>) -> Self {
        Self::with_options(sensor, PlaybackOptions::default())
    }

    pub fn with_options(sensor: Arc<dyn SensorPositioning>, options: PlaybackOptions) -> Self {
        Self {
            ctx: Arc::new(ArbiterContext::new()),
            sensor,
            playback: None,
            playback_options: options,
            ticker: None,
        }
    }

    /// Register the listener receiving forwarded samples and timeout
    /// signals. Last registration wins.
    pub fn set_listener(&self, listener: Arc<dyn PositionListener>) {
        self.ctx.set_listener(listener);
    }

    /// Unregister the listener; subsequent updates are dropped.
    pub fn clear_listener(&self) {
        self.ctx.clear_listener();
    }

    pub fn mode(&self) -> ArbiterMode {
        self.ctx.mode()
    }

    /// The most recently forwarded sample, regardless of which feed produced
    /// it.
    pub fn last_known_position(&self) -> Option<PositionSample> {
        self.ctx.last_known_position()
    }

    /// Activate the selected feed kind (default live) and begin the periodic
    /// liveness check. No-op if already started.
    pub fn start(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        info!("position arbiter starting");

        self.sensor.start_locating(Arc::new(LiveFeedAdapter {
            ctx: Arc::clone(&self.ctx),
        }));
        self.ctx.dispatch(ArbiterInput::Start);

        if self.ctx.selected_feed() == FeedKind::Simulated {
            if let Some(playback) = &mut self.playback {
                playback.start(Arc::new(SimulatedFeedAdapter {
                    ctx: Arc::clone(&self.ctx),
                }));
            }
        }

        let ctx = Arc::clone(&self.ctx);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = interval(LIVENESS_TICK_PERIOD);
            loop {
                ticker.tick().await;
                ctx.dispatch(ArbiterInput::Tick {
                    now_ms: unix_time_ms(),
                });
            }
        }));
    }

    /// Deactivate the active feed and halt the liveness check. Idempotent;
    /// the selected feed kind is retained so a later `start` resumes it.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.sensor.stop_locating();
        if let Some(playback) = &mut self.playback {
            playback.stop();
        }
        self.ctx.dispatch(ArbiterInput::Stop);
        info!("position arbiter stopped");
    }

    /// Switch to simulated playback of `route`.
    ///
    /// The new feed is constructed before the previous one is stopped, so a
    /// failure leaves the arbiter in its prior mode. On success the previous
    /// simulated feed (if any) is stopped, the mode becomes
    /// [`ArbiterMode::RunningSimulated`], and the new feed starts emitting.
    /// The sensor subscription is left in place; live samples arriving while
    /// simulated mode is active are discarded by the mode gate.
    pub fn enable_simulated_playback(&mut self, route: &Route) -> Result<(), EnablePlaybackError> {
        if route.is_empty() {
            return Err(EnablePlaybackError::InvalidRoute);
        }

        let mut playback = RoutePlayback::new(route, self.playback_options)
            .map_err(EnablePlaybackError::FeedConstruction)?;

        if let Some(mut previous) = self.playback.take() {
            previous.stop();
        }

        // Mode switches before the feed starts so its first samples pass the
        // gate.
        self.ctx.dispatch(ArbiterInput::SelectSimulated);
        playback.start(Arc::new(SimulatedFeedAdapter {
            ctx: Arc::clone(&self.ctx),
        }));
        self.playback = Some(playback);

        info!(
            sections = route.section_count(),
            speed_factor = self.playback_options.speed_factor,
            "simulated playback enabled"
        );
        Ok(())
    }

    /// Switch back to the live sensor feed, discarding any simulated feed.
    /// Idempotent. The live feed resumes through whatever subscription is
    /// already held on the sensor subsystem.
    pub fn enable_live_positioning(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
            debug!("simulated playback discarded");
        }
        self.ctx.dispatch(ArbiterInput::SelectLive);
        info!("live positioning enabled");
    }

    /// Register an additional observer on the underlying sensor subsystem.
    /// Auxiliary listeners receive raw sensor samples independent of the
    /// arbitration mode.
    pub fn add_auxiliary_listener(&self, listener: Arc<dyn PositionListener>) -> ListenerId {
        self.sensor.add_listener(listener)
    }

    /// Unregister an auxiliary observer.
    pub fn remove_auxiliary_listener(
        &self,
        listener_id: &ListenerId,
    ) -> Result<(), ListenerNotFound> {
        self.sensor.remove_listener(listener_id)
    }
}

impl Drop for PositionArbiter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::error::PlaybackError;
    use crate::route::RouteSection;
    use crate::sample::GeoCoordinates;
    use crate::sensor::SensorHub;
    use std::time::Duration;

    struct Recorder {
        samples: Mutex<Vec<PositionSample>>,
        timeouts: Mutex<usize>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(Vec::new()),
                timeouts: Mutex::new(0),
            })
        }

        fn samples(&self) -> Vec<PositionSample> {
            self.samples.lock().unwrap().clone()
        }

        fn timeout_count(&self) -> usize {
            *self.timeouts.lock().unwrap()
        }
    }

    impl PositionListener for Recorder {
        fn on_position_update(&self, sample: PositionSample) {
            self.samples.lock().unwrap().push(sample);
        }

        fn on_timeout(&self) {
            *self.timeouts.lock().unwrap() += 1;
        }
    }

    fn live_fix(ts: u64) -> PositionSample {
        PositionSample::new(GeoCoordinates::new(37.7749, -122.4194), ts)
    }

    /// A route long enough that playback does not finish during a test.
    fn long_route() -> Route {
        Route::new(vec![RouteSection::new(
            vec![GeoCoordinates::new(0.0, 0.0), GeoCoordinates::new(0.0, 0.1)],
            Duration::from_secs(1_000),
        )])
    }

    fn arbiter_with_hub() -> (PositionArbiter, Arc<SensorHub>, Arc<Recorder>) {
        let hub = Arc::new(SensorHub::new());
        let arbiter = PositionArbiter::new(hub.clone());
        let recorder = Recorder::new();
        arbiter.set_listener(recorder.clone());
        (arbiter, hub, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_live_samples_and_tracks_last_known() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();
        assert_eq!(arbiter.mode(), ArbiterMode::RunningLive);

        let now = unix_time_ms();
        hub.publish(live_fix(now));
        hub.publish(live_fix(now + 100));

        assert_eq!(recorder.samples().len(), 2);
        assert_eq!(
            arbiter.last_known_position().unwrap().timestamp_ms,
            now + 100
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_listener_drops_updates_without_error() {
        let hub = Arc::new(SensorHub::new());
        let mut arbiter = PositionArbiter::new(hub.clone());
        arbiter.start();

        hub.publish(live_fix(unix_time_ms()));
        assert!(arbiter.last_known_position().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_listener_registration_wins() {
        let (mut arbiter, hub, first) = arbiter_with_hub();
        let second = Recorder::new();
        arbiter.set_listener(second.clone());
        arbiter.start();

        hub.publish(live_fix(unix_time_ms()));

        assert_eq!(first.samples().len(), 0);
        assert_eq!(second.samples().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_live_sample_never_leaks_after_switch() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();

        let now = unix_time_ms();
        hub.publish(live_fix(now));
        assert_eq!(recorder.samples().len(), 1);

        arbiter.enable_simulated_playback(&long_route()).unwrap();
        assert_eq!(arbiter.mode(), ArbiterMode::RunningSimulated);

        // An in-flight live fix arriving after the switch completes.
        let stale = GeoCoordinates::new(37.7749, -122.4194);
        hub.publish(live_fix(now + 2_000));

        // Let the playback feed tick a few times.
        tokio::time::sleep(Duration::from_millis(350)).await;

        let samples = recorder.samples();
        assert!(samples.len() > 1, "expected simulated samples");
        assert!(
            samples[1..].iter().all(|s| s.coordinates != stale),
            "stale live sample leaked to the listener"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_timeout_refires_while_stale() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();

        // A fix already older than the liveness window.
        hub.publish(live_fix(unix_time_ms().saturating_sub(5_000)));

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert!(
            recorder.timeout_count() >= 2,
            "expected repeated timeout signals, got {}",
            recorder.timeout_count()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_arbiter_timeout_in_simulated_mode() {
        let (mut arbiter, _hub, recorder) = arbiter_with_hub();
        arbiter.start();
        arbiter.enable_simulated_playback(&long_route()).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.timeout_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_route_leaves_mode_unchanged() {
        let (mut arbiter, _hub, _recorder) = arbiter_with_hub();
        arbiter.start();

        let result = arbiter.enable_simulated_playback(&Route::new(Vec::new()));
        assert!(matches!(result, Err(EnablePlaybackError::InvalidRoute)));
        assert_eq!(arbiter.mode(), ArbiterMode::RunningLive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_construction_failure_leaves_mode_unchanged() {
        let (mut arbiter, _hub, _recorder) = arbiter_with_hub();
        arbiter.start();

        let malformed = Route::new(vec![RouteSection::new(
            vec![GeoCoordinates::new(0.0, 0.0)],
            Duration::from_secs(10),
        )]);
        let result = arbiter.enable_simulated_playback(&malformed);
        assert!(matches!(
            result,
            Err(EnablePlaybackError::FeedConstruction(
                PlaybackError::DegenerateSection { .. }
            ))
        ));
        assert_eq!(arbiter.mode(), ArbiterMode::RunningLive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_start_resumes_simulated_mode() {
        let (mut arbiter, _hub, _recorder) = arbiter_with_hub();
        arbiter.start();
        arbiter.enable_simulated_playback(&long_route()).unwrap();

        arbiter.stop();
        assert_eq!(arbiter.mode(), ArbiterMode::Stopped);

        arbiter.start();
        assert_eq!(arbiter.mode(), ArbiterMode::RunningSimulated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_live_is_idempotent() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();
        arbiter.enable_live_positioning();
        arbiter.enable_live_positioning();
        assert_eq!(arbiter.mode(), ArbiterMode::RunningLive);

        hub.publish(live_fix(unix_time_ms()));
        assert_eq!(recorder.samples().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auxiliary_listener_bypasses_mode_gate() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();
        arbiter.enable_simulated_playback(&long_route()).unwrap();

        let aux = Recorder::new();
        let aux_id = arbiter.add_auxiliary_listener(aux.clone());

        hub.publish(live_fix(unix_time_ms()));
        assert_eq!(aux.samples().len(), 1);
        // The primary listener saw nothing: the live path is gated out.
        assert!(recorder.samples().is_empty());

        arbiter.remove_auxiliary_listener(&aux_id).unwrap();
        hub.publish(live_fix(unix_time_ms()));
        assert_eq!(aux.samples().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_back_to_live_discards_playback() {
        let (mut arbiter, hub, recorder) = arbiter_with_hub();
        arbiter.start();
        arbiter.enable_simulated_playback(&long_route()).unwrap();
        arbiter.enable_live_positioning();
        assert_eq!(arbiter.mode(), ArbiterMode::RunningLive);

        let now = unix_time_ms();
        hub.publish(live_fix(now));
        assert_eq!(
            recorder.samples().last().unwrap().timestamp_ms,
            now,
            "live fix should be forwarded after switching back"
        );
    }
}
