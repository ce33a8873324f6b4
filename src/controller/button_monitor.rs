use chrono::Local;
use statum::{machine, state};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hardware::{HardwareFault, InputSignal, OutputLevel, PinHandle};

// Capacity of the transition broadcast; slow subscribers lag, the loop never blocks
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Last confirmed, debounced state of the button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub is_pressed: bool,
}

impl ControllerState {
    /// Output level that mirrors this state.
    pub fn output_level(&self) -> OutputLevel {
        OutputLevel::from(self.is_pressed)
    }
}

/// Confirmed change of the latched state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    Pressed,
    Released,
}

impl TransitionEvent {
    pub fn output_level(&self) -> OutputLevel {
        match self {
            TransitionEvent::Pressed => OutputLevel::On,
            TransitionEvent::Released => OutputLevel::Off,
        }
    }

    pub fn notice(&self) -> &'static str {
        match self {
            TransitionEvent::Pressed => "Button Pressed - Buzzer ON",
            TransitionEvent::Released => "Button Released - Buzzer OFF",
        }
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notice())
    }
}

/// Decide the transition caused by `reading` given the latched state.
///
/// Returns `None` when the reading agrees with the latch, which is what makes
/// repeated identical readings no-ops.
pub fn next_transition(latched: ControllerState, reading: InputSignal) -> Option<TransitionEvent> {
    match (latched.is_pressed, reading) {
        (false, InputSignal::Active) => Some(TransitionEvent::Pressed),
        (true, InputSignal::Inactive) => Some(TransitionEvent::Released),
        _ => None,
    }
}

// Monitor settings
#[derive(Clone, Debug)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub stats_interval_secs: i64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100, // longer than typical contact bounce
            stats_interval_secs: 30,
        }
    }
}

// Monitor errors
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Hardware fault: {0}")]
    Hardware(#[from] HardwareFault),

    #[error("Monitor task failed: {0}")]
    TaskFailed(String),
}

/// Running totals kept by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub presses: u64,
    pub releases: u64,
}

/// Result of a loop that ended through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: CycleStats,
    pub final_state: ControllerState,
}

// Phases of one poll cycle
#[state]
#[derive(Debug, Clone)]
pub enum CycleState {
    Sampling,
    Evaluating(InputSignal),
}

#[machine]
#[derive(Debug)]
pub struct ButtonMonitor<S: CycleState> {
    // Acquired button and buzzer lines
    pins: PinHandle,

    settings: MonitorSettings,

    // Latched debounced state
    latch: ControllerState,

    // Transition broadcast
    event_sender: broadcast::Sender<TransitionEvent>,

    stats: CycleStats,
}

// Available in all phases
impl<S: CycleState> ButtonMonitor<S> {
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.event_sender.subscribe()
    }

    // Sender clone for handles that outlive the move into a task
    pub fn event_sender(&self) -> broadcast::Sender<TransitionEvent> {
        self.event_sender.clone()
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        self.latch
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    // Release the pins before handing the fault upward
    fn fail(mut self, fault: HardwareFault) -> ControllerError {
        error!("Hardware fault, stopping monitor: {}", fault);
        self.pins.release();
        ControllerError::Hardware(fault)
    }
}

impl ButtonMonitor<Sampling> {
    pub fn create(pins: PinHandle, settings: Option<MonitorSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        info!("Creating Button Monitor with settings: {:?}", settings);

        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self::new(
            pins,
            settings,
            ControllerState::default(),
            event_sender,
            CycleStats::default(),
        )
    }

    /// Read the input once.
    pub fn sample(mut self) -> Result<ButtonMonitor<Evaluating>, ControllerError> {
        match self.pins.read_input() {
            Ok(reading) => {
                debug!("Sampled input: {:?}", reading);
                Ok(self.transition_with(reading))
            }
            Err(fault) => Err(self.fail(fault)),
        }
    }

    /// Run one full cycle without sleeping.
    pub fn poll_once(self) -> Result<(Self, Option<TransitionEvent>), ControllerError> {
        self.sample()?.evaluate()
    }

    /// Poll until `cancel` fires or the hardware faults.
    ///
    /// The pins are released exactly once before this returns, on both paths.
    pub async fn run_until_cancelled(
        self,
        cancel: CancellationToken,
    ) -> Result<RunSummary, ControllerError> {
        let period = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let stats_window = chrono::Duration::seconds(self.settings.stats_interval_secs);
        info!("Starting monitor loop with {}ms interval", period.as_millis());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut monitor = self;
        let mut window_start = Local::now();
        let mut window_base = monitor.stats;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Exiting...");
                    return Ok(monitor.shutdown());
                }
                _ = ticker.tick() => {}
            }

            let (next, _) = monitor.poll_once()?;
            monitor = next;

            let now = Local::now();
            if now - window_start > stats_window {
                let stats = monitor.stats;
                info!(
                    "Monitor stats: {} cycles, {} presses, {} releases in {} seconds",
                    stats.cycles - window_base.cycles,
                    stats.presses - window_base.presses,
                    stats.releases - window_base.releases,
                    (now - window_start).num_seconds()
                );
                window_start = now;
                window_base = stats;
            }
        }
    }

    /// Release the pins and report what the loop did.
    pub fn shutdown(mut self) -> RunSummary {
        self.pins.release();
        let summary = RunSummary {
            stats: self.stats,
            final_state: self.latch,
        };
        info!(
            "Monitor stopped after {} cycles ({} presses, {} releases)",
            summary.stats.cycles, summary.stats.presses, summary.stats.releases
        );
        summary
    }
}

impl ButtonMonitor<Evaluating> {
    /// Apply at most one transition for the sampled reading.
    pub fn evaluate(
        mut self,
    ) -> Result<(ButtonMonitor<Sampling>, Option<TransitionEvent>), ControllerError> {
        let reading = match self.get_state_data() {
            Some(reading) => *reading,
            None => {
                warn!("No reading in evaluating phase, skipping cycle");
                return Ok((self.transition(), None));
            }
        };

        self.stats.cycles += 1;

        let Some(event) = next_transition(self.latch, reading) else {
            debug!("Reading matches latched state, nothing to do");
            return Ok((self.transition(), None));
        };

        if let Err(fault) = self.pins.write_output(event.output_level()) {
            return Err(self.fail(fault));
        }

        self.latch.is_pressed = matches!(event, TransitionEvent::Pressed);
        match event {
            TransitionEvent::Pressed => self.stats.presses += 1,
            TransitionEvent::Released => self.stats.releases += 1,
        }

        info!("{}", event.notice());
        if self.event_sender.send(event).is_err() {
            debug!("No subscribers for transition event");
        }

        Ok((self.transition(), Some(event)))
    }
}
