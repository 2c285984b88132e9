//! Simulated route playback: fake position fixes generated from route
//! geometry.
//!
//! The pure [`PlaybackMachine`] maps accumulated playback time onto the route
//! timeline and interpolates a position; the [`RoutePlayback`] runner owns
//! the tokio ticker task and delivers the machine's output to a
//! [`PositionListener`] delegate.

pub mod error;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

use crate::listener::PositionListener;
use crate::route::Route;
use crate::sample::{GeoCoordinates, PositionSample, haversine_m, initial_bearing_deg, interpolate};
use crate::state_machine::StateMachine;
use crate::{DEFAULT_NOTIFICATION_INTERVAL_MS, DEFAULT_SPEED_FACTOR, unix_time_ms};

use self::error::PlaybackError;

/// Options for a simulated playback feed.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackOptions {
    /// Multiplier applied to the route's nominal travel speed.
    pub speed_factor: f64,
    /// Interval between emitted position notifications.
    pub notification_interval_ms: u64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed_factor: DEFAULT_SPEED_FACTOR,
            notification_interval_ms: DEFAULT_NOTIFICATION_INTERVAL_MS,
        }
    }
}

/// Per-section data precomputed at construction so ticks stay cheap.
#[derive(Debug, Clone)]
struct SectionTimeline {
    /// Nominal route time at which this section begins.
    start_ms: u64,
    duration_ms: u64,
    length_m: f64,
    geometry: Vec<GeoCoordinates>,
    /// Cumulative polyline distance at each vertex.
    cumulative_m: Vec<f64>,
}

/// Pure interpolation core of the simulated feed.
///
/// Driven by tick inputs carrying the runner's clock reading. Accumulates
/// elapsed playback time across ticks, holds it across suspend/resume, and
/// emits one terminal timeout once the route is exhausted.
#[derive(Debug)]
pub struct PlaybackMachine {
    timeline: Vec<SectionTimeline>,
    total_duration_ms: u64,
    speed_factor: f64,
    elapsed_ms: u64,
    last_tick_ms: Option<u64>,
    finished: bool,
    pending: VecDeque<PlaybackOutput>,
}

pub enum PlaybackInput {
    /// Advance playback to the runner's current clock reading.
    Tick { now_ms: u64 },
    /// Pause accumulation; the next tick re-anchors the clock instead of
    /// counting the gap as traveled time.
    Suspend,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutput {
    Sample(PositionSample),
    /// The route is exhausted; no further samples will be produced.
    Timeout,
}

impl PlaybackMachine {
    pub fn new(route: &Route, options: PlaybackOptions) -> Result<Self, PlaybackError> {
        if route.is_empty() {
            return Err(PlaybackError::EmptyRoute);
        }
        if !options.speed_factor.is_finite() || options.speed_factor <= 0.0 {
            return Err(PlaybackError::InvalidSpeedFactor(options.speed_factor));
        }
        if options.notification_interval_ms == 0 {
            return Err(PlaybackError::ZeroNotificationInterval);
        }

        let mut timeline = Vec::with_capacity(route.section_count());
        let mut start_ms = 0u64;
        for (index, section) in route.sections().iter().enumerate() {
            let geometry = section.geometry().to_vec();
            if geometry.len() < 2 {
                return Err(PlaybackError::DegenerateSection { index });
            }
            if geometry.iter().any(|c| !c.is_finite()) {
                return Err(PlaybackError::InvalidGeometry { index });
            }
            let duration_ms = section.duration().as_millis() as u64;
            if duration_ms == 0 {
                return Err(PlaybackError::ZeroDuration { index });
            }

            let mut cumulative_m = Vec::with_capacity(geometry.len());
            let mut total = 0.0;
            cumulative_m.push(0.0);
            for pair in geometry.windows(2) {
                total += haversine_m(pair[0], pair[1]);
                cumulative_m.push(total);
            }

            timeline.push(SectionTimeline {
                start_ms,
                duration_ms,
                length_m: total,
                geometry,
                cumulative_m,
            });
            start_ms += duration_ms;
        }

        Ok(Self {
            timeline,
            total_duration_ms: start_ms,
            speed_factor: options.speed_factor,
            elapsed_ms: 0,
            last_tick_ms: None,
            finished: false,
            pending: VecDeque::new(),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Playback time accumulated so far, in real (unscaled) milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    fn tick(&mut self, now_ms: u64) {
        if self.finished {
            return;
        }

        match self.last_tick_ms {
            // First tick after construction or resume anchors the clock.
            None => self.last_tick_ms = Some(now_ms),
            Some(last) => {
                self.elapsed_ms += now_ms.saturating_sub(last);
                self.last_tick_ms = Some(now_ms);
            }
        }

        let route_ms = (self.elapsed_ms as f64 * self.speed_factor) as u64;
        if route_ms >= self.total_duration_ms {
            let sample = self.sample_at(self.total_duration_ms, now_ms);
            self.pending.push_back(PlaybackOutput::Sample(sample));
            self.pending.push_back(PlaybackOutput::Timeout);
            self.finished = true;
            return;
        }

        let sample = self.sample_at(route_ms, now_ms);
        self.pending.push_back(PlaybackOutput::Sample(sample));
    }

    fn suspend(&mut self) {
        self.last_tick_ms = None;
    }

    fn poll(&mut self) -> Option<PlaybackOutput> {
        self.pending.pop_front()
    }

    /// Interpolate the position at the given nominal route time.
    fn sample_at(&self, route_ms: u64, now_ms: u64) -> PositionSample {
        let section = self
            .timeline
            .iter()
            .rev()
            .find(|s| route_ms >= s.start_ms)
            .unwrap_or(&self.timeline[0]);

        let into_section_ms = route_ms.saturating_sub(section.start_ms).min(section.duration_ms);
        let fraction = into_section_ms as f64 / section.duration_ms as f64;
        let target_m = fraction * section.length_m;

        // Simulated ground speed: nominal section speed scaled by the factor.
        let speed_mps =
            section.length_m / (section.duration_ms as f64 / 1000.0) * self.speed_factor;

        let (coordinates, bearing_deg) = locate_on_polyline(section, target_m);

        let mut sample = PositionSample::new(coordinates, now_ms).with_speed(speed_mps);
        if let Some(bearing) = bearing_deg {
            sample = sample.with_bearing(bearing);
        }
        sample
    }
}

/// Walk the section polyline to the vertex pair containing `target_m` and
/// interpolate within it. Returns the coordinate and the segment bearing.
fn locate_on_polyline(section: &SectionTimeline, target_m: f64) -> (GeoCoordinates, Option<f64>) {
    if section.length_m == 0.0 {
        // Degenerate geometry where all vertices coincide.
        return (section.geometry[0], None);
    }

    let target = target_m.clamp(0.0, section.length_m);
    for i in 0..section.geometry.len() - 1 {
        let seg_start = section.cumulative_m[i];
        let seg_end = section.cumulative_m[i + 1];
        if target > seg_end {
            continue;
        }

        let a = section.geometry[i];
        let b = section.geometry[i + 1];
        let seg_len = seg_end - seg_start;
        if seg_len == 0.0 {
            continue;
        }
        let fraction = (target - seg_start) / seg_len;
        return (interpolate(a, b, fraction), Some(initial_bearing_deg(a, b)));
    }

    let last = section.geometry[section.geometry.len() - 1];
    let prev = section.geometry[section.geometry.len() - 2];
    (last, Some(initial_bearing_deg(prev, last)))
}

impl StateMachine for PlaybackMachine {
    type Input = PlaybackInput;
    type Output = PlaybackOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            PlaybackInput::Tick { now_ms } => self.tick(now_ms),
            PlaybackInput::Suspend => self.suspend(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.poll()
    }
}

/// Runner for a simulated playback feed bound to one route and one option
/// set.
///
/// `start` spawns the ticker task delivering into the provided delegate;
/// `stop` aborts the task and suspends the machine so a later `start`
/// resumes from the same route position.
pub struct RoutePlayback {
    machine: Arc<Mutex<PlaybackMachine>>,
    notification_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl RoutePlayback {
    pub fn new(route: &Route, options: PlaybackOptions) -> Result<Self, PlaybackError> {
        let machine = PlaybackMachine::new(route, options)?;
        Ok(Self {
            machine: Arc::new(Mutex::new(machine)),
            notification_interval: Duration::from_millis(options.notification_interval_ms),
            task: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the ticker task. No-op if already running.
    pub fn start(&mut self, delegate: Arc<dyn PositionListener>) {
        if self.task.is_some() {
            return;
        }

        let machine = Arc::clone(&self.machine);
        let period = self.notification_interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let now_ms = unix_time_ms();

                let (outputs, finished) = {
                    let mut machine = machine.lock().expect("playback machine lock poisoned");
                    machine.process_input(PlaybackInput::Tick { now_ms });
                    let mut outputs = Vec::new();
                    while let Some(output) = machine.poll_output() {
                        outputs.push(output);
                    }
                    (outputs, machine.is_finished())
                };

                for output in outputs {
                    match output {
                        PlaybackOutput::Sample(sample) => delegate.on_position_update(sample),
                        PlaybackOutput::Timeout => delegate.on_timeout(),
                    }
                }

                if finished {
                    debug!("route playback exhausted");
                    break;
                }
            }
        }));
    }

    /// Abort the ticker task and suspend playback time. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.machine
            .lock()
            .expect("playback machine lock poisoned")
            .process_input(PlaybackInput::Suspend);
    }
}

impl Drop for RoutePlayback {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
