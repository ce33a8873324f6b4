//! Controller subsystem for debounced button handling
//!
//! Turns a polled, noisy input line into clean press/release transitions and
//! mirrors them on the buzzer output:
//!
//! 1. [`button_monitor`] - Typestate poll cycle and debounce latch
//! 2. [`monitor_handle`] - Task spawning, subscriptions and lifecycle
//!
//! # Architecture
//!
//! ```text
//! PinHandle ──► Sampling ──► Evaluating ──► (write output, emit event)
//!                  ▲                                   │
//!                  └────────── poll interval ◄─────────┘
//! ```
//!
//! The loop runs on a single task with a fixed 100ms interval by default. The
//! interval itself is the debounce: a reading only matters when it differs
//! from the latched state.

pub mod button_monitor;
pub mod monitor_handle;

pub use button_monitor::{
    next_transition, ButtonMonitor, ControllerError, ControllerState, CycleStats,
    MonitorSettings, RunSummary, TransitionEvent,
};
pub use monitor_handle::MonitorHandle;
