//! Raspberry Pi GPIO backend on top of `rppal`.
//!
//! The button is wired active-low against the internal pull-up, so a `Low`
//! level on the input line means the button is pressed. The buzzer line is
//! driven low at acquisition and again at release.

use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::{debug, info};

use super::{
    check_assignment, HardwareBackend, HardwareFault, HardwareInterface, InputSignal, OutputLevel,
    PinAssignment, PinHandle,
};

/// Acquires BCM-numbered pins from `/dev/gpiomem`.
#[derive(Debug, Default)]
pub struct RppalBackend;

impl RppalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl HardwareBackend for RppalBackend {
    fn acquire(&self, pins: PinAssignment) -> Result<PinHandle, HardwareFault> {
        check_assignment(pins)?;

        info!("Opening GPIO peripheral");
        let gpio = Gpio::new()?;

        debug!("Configuring BCM {} as input with pull-up", pins.input_pin);
        let input = gpio.get(pins.input_pin)?.into_input_pullup();

        debug!("Configuring BCM {} as output, initially low", pins.output_pin);
        let mut output = gpio.get(pins.output_pin)?.into_output_low();
        output.set_reset_on_drop(true);

        Ok(PinHandle::new(
            pins,
            Box::new(RppalPins {
                input: Some(input),
                output: Some(output),
            }),
        ))
    }
}

struct RppalPins {
    input: Option<InputPin>,
    output: Option<OutputPin>,
}

impl HardwareInterface for RppalPins {
    fn read_input(&mut self) -> Result<InputSignal, HardwareFault> {
        let input = self.input.as_ref().ok_or(HardwareFault::NotAcquired)?;
        // active-low
        Ok(InputSignal::from(input.is_low()))
    }

    fn write_output(&mut self, level: OutputLevel) -> Result<(), HardwareFault> {
        let output = self.output.as_mut().ok_or(HardwareFault::NotAcquired)?;
        match level {
            OutputLevel::On => output.set_high(),
            OutputLevel::Off => output.set_low(),
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut output) = self.output.take() {
            output.set_low();
            debug!("Buzzer line driven low, restoring pin {}", output.pin());
        }
        if let Some(input) = self.input.take() {
            debug!("Restoring input pin {}", input.pin());
        }
    }
}
