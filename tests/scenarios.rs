//! End-to-end scenarios against the simulated backend.

use buzzbutton::controller::{ButtonMonitor, ControllerError, MonitorHandle, TransitionEvent};
use buzzbutton::hardware::simulated::{Exhausted, SimulatedBackend, SimulatedHardware};
use buzzbutton::hardware::{HardwareBackend, InputSignal, OutputLevel, PinAssignment};
use tokio_util::sync::CancellationToken;

use InputSignal::{Active, Inactive};

const PINS: PinAssignment = PinAssignment {
    input_pin: 26,
    output_pin: 13,
};

async fn run_script(
    script: Vec<InputSignal>,
) -> (Vec<TransitionEvent>, Vec<OutputLevel>, usize) {
    let cancel = CancellationToken::new();
    let (hw, probe) = SimulatedHardware::new(script);
    let pins = SimulatedBackend::new(hw.on_exhausted(Exhausted::Cancel(cancel.clone())))
        .acquire(PINS)
        .unwrap();

    let handle = MonitorHandle::spawn(pins, None, cancel);
    let mut rx = handle.subscribe();
    handle.join().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (events, probe.writes(), probe.releases())
}

#[tokio::test(start_paused = true)]
async fn press_then_release() {
    let (events, writes, releases) =
        run_script(vec![Inactive, Inactive, Active, Active, Inactive]).await;

    assert_eq!(events, vec![TransitionEvent::Pressed, TransitionEvent::Released]);
    assert_eq!(writes, vec![OutputLevel::On, OutputLevel::Off]);
    assert_eq!(releases, 1);
}

#[tokio::test(start_paused = true)]
async fn held_from_start() {
    let (events, writes, releases) = run_script(vec![Active, Active, Active]).await;

    assert_eq!(events, vec![TransitionEvent::Pressed]);
    assert_eq!(writes, vec![OutputLevel::On]);
    assert_eq!(releases, 1);
}

#[tokio::test(start_paused = true)]
async fn fault_on_third_read_stops_after_cleanup() {
    let (hw, probe) = SimulatedHardware::new(vec![Inactive, Active, Inactive, Active, Inactive]);
    let pins = SimulatedBackend::new(hw.fault_on_read(3))
        .acquire(PINS)
        .unwrap();

    let result = MonitorHandle::spawn(pins, None, CancellationToken::new())
        .join()
        .await;

    assert!(matches!(result, Err(ControllerError::Hardware(_))));
    assert_eq!(probe.reads(), 3);
    assert_eq!(probe.writes(), vec![OutputLevel::On]);
    assert_eq!(probe.releases(), 1);
}

#[test]
fn chatter_within_latched_side_is_ignored() {
    let (hw, probe) = SimulatedHardware::new(vec![Active, Active, Active, Active, Inactive, Inactive]);
    let pins = SimulatedBackend::new(hw).acquire(PINS).unwrap();
    let mut monitor = ButtonMonitor::create(pins, None);

    let mut events = Vec::new();
    for _ in 0..6 {
        let (next, event) = monitor.poll_once().unwrap();
        events.extend(event);
        monitor = next;
    }

    assert_eq!(events, vec![TransitionEvent::Pressed, TransitionEvent::Released]);
    assert_eq!(probe.writes().len(), 2);

    let summary = monitor.shutdown();
    assert_eq!(summary.stats.cycles, 6);
    assert_eq!(probe.releases(), 1);
}
