//! Debounced button-to-buzzer control loop.
//!
//! ```text
//! config ──► hardware (PinHandle) ──► controller (ButtonMonitor) ──► TransitionEvent
//! ```

pub mod config;
pub mod controller;
pub mod hardware;
