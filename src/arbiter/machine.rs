//! Pure arbitration core: mode gating, last-known tracking, staleness
//! detection.

use std::collections::VecDeque;

use crate::LIVENESS_WINDOW;
use crate::sample::PositionSample;
use crate::state_machine::StateMachine;

/// Which feed kind the arbiter forwards from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Live,
    Simulated,
}

/// Externally observable arbiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterMode {
    Stopped,
    RunningLive,
    RunningSimulated,
}

/// The arbitration state machine.
///
/// Samples are tagged by origin on input and forwarded only when the origin
/// matches the running feed kind, so a sample from the inactive feed can
/// never leak to the listener. The selected kind survives a stop, which is
/// what makes `stop` followed by `start` resume the previous mode.
///
/// Staleness is judged against tick inputs carrying the runner's clock:
/// in live mode a timeout output is produced on every tick for which the
/// last-known sample is older than [`LIVENESS_WINDOW`]. Simulated mode skips
/// the check because the playback feed owns its own timeout semantics.
#[derive(Debug)]
pub struct ArbiterMachine {
    running: bool,
    selected: FeedKind,
    last_known: Option<PositionSample>,
    /// Monotonicity guard for the current feed tenure; reset on feed switch
    /// because a new feed may carry a new time base.
    watermark_ms: Option<u64>,
    pending: VecDeque<ArbiterOutput>,
}

pub enum ArbiterInput {
    /// Activate the selected feed kind.
    Start,
    /// Deactivate; the selected kind is retained for a later start.
    Stop,
    /// Switch selection to the live feed.
    SelectLive,
    /// Switch selection to a (started) simulated feed.
    SelectSimulated,
    /// A sample delivered by the live sensor path.
    LiveSample(PositionSample),
    /// A sample delivered by the simulated playback path.
    SimulatedSample(PositionSample),
    /// The simulated feed's own timeout signal.
    SimulatedTimeout,
    /// Periodic liveness check at the runner's current clock reading.
    Tick { now_ms: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterOutput {
    /// Forward this sample to the registered listener.
    Forward(PositionSample),
    /// Signal a liveness timeout to the registered listener.
    Timeout,
}

impl ArbiterMachine {
    pub fn new() -> Self {
        Self {
            running: false,
            selected: FeedKind::Live,
            last_known: None,
            watermark_ms: None,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> ArbiterMode {
        if !self.running {
            return ArbiterMode::Stopped;
        }
        match self.selected {
            FeedKind::Live => ArbiterMode::RunningLive,
            FeedKind::Simulated => ArbiterMode::RunningSimulated,
        }
    }

    pub fn selected_feed(&self) -> FeedKind {
        self.selected
    }

    pub fn last_known(&self) -> Option<&PositionSample> {
        self.last_known.as_ref()
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn select_live(&mut self) {
        if self.selected != FeedKind::Live {
            self.watermark_ms = None;
        }
        self.selected = FeedKind::Live;
    }

    fn select_simulated(&mut self) {
        // Enabling playback always starts the simulated feed, so selection
        // implies running.
        self.watermark_ms = None;
        self.selected = FeedKind::Simulated;
        self.running = true;
    }

    fn live_sample(&mut self, sample: PositionSample) {
        if self.mode() == ArbiterMode::RunningLive {
            self.accept(sample);
        }
    }

    fn simulated_sample(&mut self, sample: PositionSample) {
        if self.mode() == ArbiterMode::RunningSimulated {
            self.accept(sample);
        }
    }

    fn accept(&mut self, sample: PositionSample) {
        if let Some(watermark) = self.watermark_ms {
            if sample.timestamp_ms < watermark {
                // Out-of-order within the current feed tenure.
                return;
            }
        }
        self.watermark_ms = Some(sample.timestamp_ms);
        self.last_known = Some(sample.clone());
        self.pending.push_back(ArbiterOutput::Forward(sample));
    }

    fn simulated_timeout(&mut self) {
        if self.mode() == ArbiterMode::RunningSimulated {
            self.pending.push_back(ArbiterOutput::Timeout);
        }
    }

    fn tick(&mut self, now_ms: u64) {
        if self.mode() != ArbiterMode::RunningLive {
            return;
        }
        let Some(last) = &self.last_known else {
            // No sample yet to judge staleness against.
            return;
        };
        if now_ms.saturating_sub(last.timestamp_ms) > LIVENESS_WINDOW.as_millis() as u64 {
            // Re-fires on every tick while the condition persists.
            self.pending.push_back(ArbiterOutput::Timeout);
        }
    }
}

impl Default for ArbiterMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for ArbiterMachine {
    type Input = ArbiterInput;
    type Output = ArbiterOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            ArbiterInput::Start => self.start(),
            ArbiterInput::Stop => self.stop(),
            ArbiterInput::SelectLive => self.select_live(),
            ArbiterInput::SelectSimulated => self.select_simulated(),
            ArbiterInput::LiveSample(sample) => self.live_sample(sample),
            ArbiterInput::SimulatedSample(sample) => self.simulated_sample(sample),
            ArbiterInput::SimulatedTimeout => self.simulated_timeout(),
            ArbiterInput::Tick { now_ms } => self.tick(now_ms),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
