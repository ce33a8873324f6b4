//! Monitor Handle - lifecycle management for the button monitor task
//!
//! Spawns the polling loop as a tokio task and gives the caller the two things
//! it needs afterwards: a way to observe transitions and a way to wait for the
//! loop to end.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::button_monitor::{
    ButtonMonitor, ControllerError, MonitorSettings, RunSummary, TransitionEvent,
};
use crate::hardware::PinHandle;

/// Handle for a spawned button monitor.
///
/// The monitor owns the pins for its whole life. When the task finishes, for
/// whatever reason, the pins have already been released.
pub struct MonitorHandle {
    event_sender: broadcast::Sender<TransitionEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RunSummary, ControllerError>>,
}

impl MonitorHandle {
    /// Spawn the monitor loop on the current runtime.
    ///
    /// # Arguments
    ///
    /// * `pins` - Acquired button and buzzer lines, moved into the task
    /// * `settings` - Optional configuration; uses defaults if None
    /// * `cancel` - Token that stops the loop at the next cycle boundary
    pub fn spawn(
        pins: PinHandle,
        settings: Option<MonitorSettings>,
        cancel: CancellationToken,
    ) -> Self {
        info!("Spawning Button Monitor with settings: {:?}", settings);

        let monitor = ButtonMonitor::create(pins, settings);
        let event_sender = monitor.event_sender();

        let task = tokio::spawn(monitor.run_until_cancelled(cancel.clone()));
        debug!("Monitor task spawned");

        Self {
            event_sender,
            cancel,
            task,
        }
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        debug!("New subscriber to transition events");
        self.event_sender.subscribe()
    }

    /// Ask the loop to stop after the current cycle.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to end.
    pub async fn join(self) -> Result<RunSummary, ControllerError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ControllerError::TaskFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::{Exhausted, SimulatedBackend, SimulatedHardware};
    use crate::hardware::{HardwareBackend, InputSignal, OutputLevel, PinAssignment};
    use InputSignal::{Active, Inactive};

    fn acquire(hardware: SimulatedHardware) -> PinHandle {
        SimulatedBackend::new(hardware)
            .acquire(PinAssignment {
                input_pin: 26,
                output_pin: 13,
            })
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_monitor_reports_transitions() {
        let cancel = CancellationToken::new();
        let (hw, probe) = SimulatedHardware::new(vec![Inactive, Active, Active, Inactive]);
        let pins = acquire(hw.on_exhausted(Exhausted::Cancel(cancel.clone())));

        let handle = MonitorHandle::spawn(pins, None, cancel);
        let mut events = handle.subscribe();
        let summary = handle.join().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), TransitionEvent::Pressed);
        assert_eq!(events.recv().await.unwrap(), TransitionEvent::Released);
        assert_eq!(probe.writes(), vec![OutputLevel::On, OutputLevel::Off]);
        assert_eq!(summary.stats.presses, 1);
        assert_eq!(probe.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_through_handle() {
        let (hw, probe) = SimulatedHardware::new(vec![Active]);
        let handle = MonitorHandle::spawn(acquire(hw), None, CancellationToken::new());

        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        handle.cancel();
        let summary = handle.join().await.unwrap();

        assert!(summary.final_state.is_pressed);
        assert_eq!(probe.writes(), vec![OutputLevel::On]);
        assert_eq!(probe.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fault_surfaces_through_join() {
        let (hw, probe) = SimulatedHardware::new(vec![Inactive; 3]);
        let pins = acquire(hw.on_exhausted(Exhausted::Fault));

        let handle = MonitorHandle::spawn(pins, None, CancellationToken::new());
        let result = handle.join().await;

        assert!(matches!(result, Err(ControllerError::Hardware(_))));
        assert_eq!(probe.reads(), 4);
        assert_eq!(probe.releases(), 1);
    }
}
