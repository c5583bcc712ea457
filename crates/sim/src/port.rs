//! Virtual-clock implementation of the machine's hardware seam.
//!
//! Models the two timers the core expects: a periodic step timer and a
//! one-shot pulse-reset timer at higher priority. Deadlines are absolute
//! cycle counts on a shared virtual clock; the harness dispatches whichever
//! is due first, pulse-reset winning ties exactly like the hardware
//! priority scheme.

use cnc_core::MachinePort;
use motion::STEP_MASK;

use crate::trace::{PulseEdge, StepTrace};

#[derive(Debug)]
pub struct SimPort {
    pub cpu_hz: u32,
    /// Virtual time in machine cycles.
    pub now: u64,

    pub(crate) step_timer_enabled: bool,
    pub(crate) step_reload: u32,
    pub(crate) next_step_deadline: Option<u64>,
    pub(crate) pulse_deadline: Option<u64>,

    /// Latest pin levels, invert mask already applied by the core.
    pub step_bits: u8,
    pub direction_bits: u8,
    pub stepper_disable_level: bool,

    /// Step-line level when no pulse is asserted (the invert mask).
    idle_step_bits: u8,
    pub trace: StepTrace,
}

impl SimPort {
    pub fn new(cpu_hz: u32, invert_mask: u8) -> Self {
        let idle_step_bits = invert_mask & STEP_MASK;
        Self {
            cpu_hz,
            now: 0,
            step_timer_enabled: false,
            step_reload: 0,
            next_step_deadline: None,
            pulse_deadline: None,
            step_bits: idle_step_bits,
            direction_bits: 0,
            stepper_disable_level: false,
            idle_step_bits,
            trace: StepTrace::default(),
        }
    }

    /// Absolute time of the next pending timer event, if any.
    pub(crate) fn next_event(&self) -> Option<(SimEvent, u64)> {
        let step = self
            .step_timer_enabled
            .then_some(self.next_step_deadline)
            .flatten();
        match (self.pulse_deadline, step) {
            (None, None) => None,
            (Some(p), None) => Some((SimEvent::PulseReset, p)),
            (None, Some(s)) => Some((SimEvent::StepTimer, s)),
            // Pulse reset preempts on ties: strictly higher priority.
            (Some(p), Some(s)) if p <= s => Some((SimEvent::PulseReset, p)),
            (_, Some(s)) => Some((SimEvent::StepTimer, s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SimEvent {
    StepTimer,
    PulseReset,
}

impl MachinePort for SimPort {
    fn write_direction_bits(&mut self, bits: u8) {
        self.direction_bits = bits;
    }

    fn write_step_bits(&mut self, bits: u8) {
        let asserted = bits ^ self.idle_step_bits;
        if asserted != 0 {
            self.trace.record(PulseEdge {
                t_cycles: self.now,
                step_bits: asserted,
                direction_bits: self.direction_bits,
            });
        }
        self.step_bits = bits;
    }

    fn write_stepper_disable(&mut self, level: bool) {
        self.stepper_disable_level = level;
    }

    fn step_timer_set_cycles(&mut self, cycles: u32) {
        // Takes effect at the next reload, like a hardware load register.
        self.step_reload = cycles.max(1);
    }

    fn step_timer_enable(&mut self) {
        self.step_timer_enabled = true;
        self.next_step_deadline = Some(self.now + self.step_reload.max(1) as u64);
    }

    fn step_timer_disable(&mut self) {
        self.step_timer_enabled = false;
        self.next_step_deadline = None;
    }

    fn arm_pulse_reset(&mut self, cycles: u32) {
        self.pulse_deadline = Some(self.now + cycles.max(1) as u64);
    }

    fn delay_ms(&mut self, ms: u16) {
        self.now += u64::from(ms) * u64::from(self.cpu_hz) / 1000;
    }
}
