//! Hardware seam between the machine core and the platform.
//!
//! The core drives three step lines, three direction lines, one
//! stepper-enable line and two timers through this trait. Step and
//! direction bits handed to the port are already XOR-masked with the
//! configured invert mask, and the enable level already honors the
//! invert-enable flag, so implementations write levels to pins verbatim.
//!
//! Timing discipline expected from implementations:
//! - The **step timer** is periodic; its interrupt calls
//!   [`crate::Machine::step_interrupt`]. Reload values are machine cycles.
//! - The **pulse reset timer** is a one-shot armed from inside the step
//!   interrupt; it runs at strictly higher priority and calls
//!   [`crate::Machine::pulse_reset_interrupt`] so the step pulse width is
//!   honored even while the step interrupt is still executing.

use motion::N_AXIS;

pub trait MachinePort {
    /// Drive the direction lines (`*_DIRECTION_BIT` layout, invert applied).
    fn write_direction_bits(&mut self, bits: u8);

    /// Drive the step lines (`*_STEP_BIT` layout, invert applied).
    fn write_step_bits(&mut self, bits: u8);

    /// Drive the stepper-enable line. The level is physical.
    fn write_stepper_disable(&mut self, level: bool);

    /// Program the periodic step timer reload, in machine cycles.
    fn step_timer_set_cycles(&mut self, cycles: u32);

    fn step_timer_enable(&mut self);

    fn step_timer_disable(&mut self);

    /// Arm the one-shot pulse reset timer to fire after `cycles`.
    fn arm_pulse_reset(&mut self, cycles: u32);

    /// Foreground busy-wait; interrupts keep running underneath.
    fn delay_ms(&mut self, ms: u16);
}

/// Convert a step-space position to millimetres for reporting.
pub fn mm_from_steps(position: &[i32; N_AXIS], steps_per_mm: &[f32; N_AXIS]) -> [f32; N_AXIS] {
    [
        position[0] as f32 / steps_per_mm[0],
        position[1] as f32 / steps_per_mm[1],
        position[2] as f32 / steps_per_mm[2],
    ]
}
