//! # Hardware Interface
//!
//! Narrow boundary between the debounce controller and the physical pins.
//! The controller only ever sees a normalised [`InputSignal`] and issues an
//! [`OutputLevel`]; pin numbers and electrical polarity stay behind this module.
//!
//! ```text
//! HardwareBackend ──acquire──► PinHandle ──► ButtonMonitor
//!                              (releases exactly once)
//! ```
//!
//! Two backends exist:
//! - [`gpio::RppalBackend`] - Raspberry Pi GPIO through `rppal`
//! - [`simulated::SimulatedBackend`] - scripted readings for tests

pub mod gpio;
pub mod simulated;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Normalised state of the input line for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    /// Button held down
    Active,
    /// Button released
    Inactive,
}

impl InputSignal {
    pub fn is_active(self) -> bool {
        matches!(self, InputSignal::Active)
    }
}

impl From<bool> for InputSignal {
    fn from(active: bool) -> Self {
        if active {
            InputSignal::Active
        } else {
            InputSignal::Inactive
        }
    }
}

/// Logical level of the output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputLevel {
    On,
    Off,
}

impl From<bool> for OutputLevel {
    fn from(on: bool) -> Self {
        if on {
            OutputLevel::On
        } else {
            OutputLevel::Off
        }
    }
}

impl From<OutputLevel> for bool {
    fn from(level: OutputLevel) -> Self {
        matches!(level, OutputLevel::On)
    }
}

/// BCM line numbers for the button and the buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignment {
    pub input_pin: u8,
    pub output_pin: u8,
}

/// Errors raised while touching the pins. Always fatal to the control loop.
#[derive(Debug, thiserror::Error)]
pub enum HardwareFault {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Pins are not acquired")]
    NotAcquired,

    #[error("I/O error on pin {pin}: {reason}")]
    Io { pin: u8, reason: String },

    #[error("Input and output both assigned to pin {0}")]
    PinConflict(u8),
}

/// Operations the controller consumes from an acquired set of pins.
pub trait HardwareInterface: Send {
    /// Read the current normalised state of the input line.
    fn read_input(&mut self) -> Result<InputSignal, HardwareFault>;

    /// Drive the output line. Writing the same level twice has no extra effect.
    fn write_output(&mut self, level: OutputLevel) -> Result<(), HardwareFault>;

    /// Return the pins to the platform with the output switched off.
    fn release(&mut self);
}

/// Platform that can hand out a [`PinHandle`].
pub trait HardwareBackend {
    fn acquire(&self, pins: PinAssignment) -> Result<PinHandle, HardwareFault>;
}

/// Scoped ownership of acquired pins.
///
/// Release runs exactly once: either through [`PinHandle::release`] or when
/// the handle is dropped on any other exit path.
pub struct PinHandle {
    pins: PinAssignment,
    inner: Option<Box<dyn HardwareInterface>>,
}

impl PinHandle {
    pub fn new(pins: PinAssignment, interface: Box<dyn HardwareInterface>) -> Self {
        debug!("Pins acquired: {:?}", pins);
        Self {
            pins,
            inner: Some(interface),
        }
    }

    pub fn pins(&self) -> PinAssignment {
        self.pins
    }

    pub fn is_acquired(&self) -> bool {
        self.inner.is_some()
    }

    pub fn read_input(&mut self) -> Result<InputSignal, HardwareFault> {
        self.inner
            .as_mut()
            .ok_or(HardwareFault::NotAcquired)?
            .read_input()
    }

    pub fn write_output(&mut self, level: OutputLevel) -> Result<(), HardwareFault> {
        self.inner
            .as_mut()
            .ok_or(HardwareFault::NotAcquired)?
            .write_output(level)
    }

    /// Release the pins now. Later calls and the eventual drop are no-ops.
    pub fn release(&mut self) {
        match self.inner.take() {
            Some(mut interface) => {
                interface.release();
                info!(
                    "Released GPIO pins (input {}, output {})",
                    self.pins.input_pin, self.pins.output_pin
                );
            }
            None => debug!("Pins already released"),
        }
    }
}

impl Drop for PinHandle {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!("Pin handle dropped while still acquired, releasing");
            self.release();
        }
    }
}

impl std::fmt::Debug for PinHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinHandle")
            .field("pins", &self.pins)
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

/// Reject assignments that would drive the button line.
pub fn check_assignment(pins: PinAssignment) -> Result<(), HardwareFault> {
    if pins.input_pin == pins.output_pin {
        return Err(HardwareFault::PinConflict(pins.input_pin));
    }
    Ok(())
}
