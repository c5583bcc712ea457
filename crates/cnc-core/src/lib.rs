//! # CNC Controller Core
//!
//! The runtime half of the motion controller: one [`Machine`] value groups
//! the settings, the look-ahead planner with its block ring, the stepper
//! engine and the system state, and exposes
//!
//! - the plan-side operations upstream producers call
//!   ([`Machine::plan_buffer_line`], [`Machine::plan_synchronize`], …),
//! - the interrupt bodies the timer glue calls
//!   ([`Machine::step_interrupt`], [`Machine::pulse_reset_interrupt`]),
//! - the runtime control surface ([`Machine::execute_runtime`],
//!   [`Machine::realtime_command`], cycle start / feed hold / reset).
//!
//! Hardware lives behind the [`hal::MachinePort`] trait; a simulator or the
//! real timer/GPIO glue implements it. On hardware the one active machine
//! would sit in a `critical_section::Mutex<RefCell<Machine>>` static shared
//! between the foreground loop and the two timer interrupts.

pub mod error;
pub mod hal;
pub mod machine;
pub mod protocol;
pub mod report;
pub mod settings;
pub mod stepper;
pub mod system;

pub use error::{Alarm, StatusError};
pub use hal::MachinePort;
pub use machine::Machine;
pub use report::{Feedback, Reporter, TextReporter};
pub use settings::Settings;
pub use system::{ExecFlags, MachineState, SystemState};
