//! Scripted hardware backend.
//!
//! Replays a fixed sequence of input readings and records everything the
//! controller does to the output line. A [`SimulationProbe`] stays with the
//! caller after the hardware has been moved into a monitor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    check_assignment, HardwareBackend, HardwareFault, HardwareInterface, InputSignal, OutputLevel,
    PinAssignment, PinHandle,
};

/// What the simulation does once every scripted reading has been consumed.
#[derive(Debug, Clone)]
pub enum Exhausted {
    /// Keep returning the last scripted reading
    Hold,
    /// Fail every further read
    Fault,
    /// Request shutdown and keep returning the last reading
    Cancel(CancellationToken),
}

#[derive(Debug, Default)]
struct SimulationLog {
    writes: Vec<OutputLevel>,
    level: Option<OutputLevel>,
    reads: usize,
    releases: usize,
}

/// Read-only view on a running simulation.
#[derive(Debug, Clone)]
pub struct SimulationProbe {
    log: Arc<Mutex<SimulationLog>>,
}

impl SimulationProbe {
    fn log(&self) -> MutexGuard<'_, SimulationLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every level written to the output, in order.
    pub fn writes(&self) -> Vec<OutputLevel> {
        self.log().writes.clone()
    }

    /// Current level of the output line, `None` before the first write.
    pub fn output_level(&self) -> Option<OutputLevel> {
        self.log().level
    }

    pub fn reads(&self) -> usize {
        self.log().reads
    }

    pub fn releases(&self) -> usize {
        self.log().releases
    }
}

pub struct SimulatedHardware {
    script: VecDeque<InputSignal>,
    last: InputSignal,
    on_exhausted: Exhausted,
    fault_on_read: Option<usize>,
    fault_on_write: Option<usize>,
    log: Arc<Mutex<SimulationLog>>,
}

impl SimulatedHardware {
    pub fn new(script: impl IntoIterator<Item = InputSignal>) -> (Self, SimulationProbe) {
        let log = Arc::new(Mutex::new(SimulationLog::default()));
        let hardware = Self {
            script: script.into_iter().collect(),
            last: InputSignal::Inactive,
            on_exhausted: Exhausted::Hold,
            fault_on_read: None,
            fault_on_write: None,
            log: log.clone(),
        };
        (hardware, SimulationProbe { log })
    }

    pub fn on_exhausted(mut self, behaviour: Exhausted) -> Self {
        self.on_exhausted = behaviour;
        self
    }

    /// Fail the n-th read (1-based).
    pub fn fault_on_read(mut self, n: usize) -> Self {
        self.fault_on_read = Some(n);
        self
    }

    /// Fail the n-th write (1-based).
    pub fn fault_on_write(mut self, n: usize) -> Self {
        self.fault_on_write = Some(n);
        self
    }

    fn log(&self) -> MutexGuard<'_, SimulationLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl HardwareInterface for SimulatedHardware {
    fn read_input(&mut self) -> Result<InputSignal, HardwareFault> {
        let read_no = {
            let mut log = self.log();
            log.reads += 1;
            log.reads
        };

        if self.fault_on_read == Some(read_no) {
            return Err(HardwareFault::Io {
                pin: 0,
                reason: format!("injected fault on read {}", read_no),
            });
        }

        match self.script.pop_front() {
            Some(signal) => {
                self.last = signal;
                Ok(signal)
            }
            None => match &self.on_exhausted {
                Exhausted::Hold => Ok(self.last),
                Exhausted::Fault => Err(HardwareFault::Io {
                    pin: 0,
                    reason: "input script exhausted".to_string(),
                }),
                Exhausted::Cancel(token) => {
                    debug!("Input script exhausted, requesting shutdown");
                    token.cancel();
                    Ok(self.last)
                }
            },
        }
    }

    fn write_output(&mut self, level: OutputLevel) -> Result<(), HardwareFault> {
        let fault_on_write = self.fault_on_write;
        let mut log = self.log();
        if fault_on_write == Some(log.writes.len() + 1) {
            return Err(HardwareFault::Io {
                pin: 0,
                reason: "injected fault on write".to_string(),
            });
        }
        log.writes.push(level);
        log.level = Some(level);
        Ok(())
    }

    fn release(&mut self) {
        let mut log = self.log();
        log.releases += 1;
        log.level = Some(OutputLevel::Off);
    }
}

/// Backend that hands out a single [`SimulatedHardware`].
pub struct SimulatedBackend {
    hardware: Mutex<Option<SimulatedHardware>>,
}

impl SimulatedBackend {
    pub fn new(hardware: SimulatedHardware) -> Self {
        Self {
            hardware: Mutex::new(Some(hardware)),
        }
    }
}

impl HardwareBackend for SimulatedBackend {
    fn acquire(&self, pins: PinAssignment) -> Result<PinHandle, HardwareFault> {
        check_assignment(pins)?;
        let hardware = self
            .hardware
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(HardwareFault::Io {
                pin: pins.input_pin,
                reason: "simulated pins already acquired".to_string(),
            })?;
        Ok(PinHandle::new(pins, Box::new(hardware)))
    }
}
