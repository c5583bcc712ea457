//! Simulation harness for the CNC controller core.
//!
//! Runs the machine entirely off-hardware: [`SimPort`] implements the
//! hardware seam with a cycle-counted virtual clock and two emulated
//! timers, and [`SimMachine`] advances the world event by event while
//! servicing the foreground poll loop in between — the same interleaving
//! the real firmware sees, but deterministic and steppable from tests.
//!
//! Every step pulse is recorded into a serde-serializable [`trace::StepTrace`]
//! for analysis and CI validation.

pub mod harness;
pub mod port;
pub mod trace;

pub use harness::SimMachine;
pub use port::SimPort;
pub use trace::{PulseEdge, StepTrace};
