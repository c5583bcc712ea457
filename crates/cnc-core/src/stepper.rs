//! Step executor: the step-timer and pulse-reset interrupt bodies.
//!
//! The step interrupt is the workhorse. At entry it drives the output bits
//! computed by the *previous* invocation — direction lines first, then the
//! step lines — and arms the higher-priority pulse-reset one-shot that
//! deasserts the step lines after the configured pulse width. It then pops
//! or continues the tail block, runs the Bresenham tracer and the trapezoid
//! rate controller from the `motion` crate, and finally XORs the invert
//! mask into the bits for the next pulse.
//!
//! Everything on this path is integer arithmetic; planning floats never
//! enter interrupt context.

use motion::block::{DIRECTION_MASK, STEP_MASK};
use motion::{bresenham, profile, StepperRuntime};
use motion::{RateChange, ACCELERATION_TICKS_PER_SECOND, MINIMUM_STEPS_PER_MINUTE, N_AXIS};

use crate::hal::MachinePort;
use crate::machine::Machine;
use crate::settings::STEPPER_IDLE_LOCK_KEEP_ENABLED;
use crate::system::{ExecFlags, MachineState};

/// Stepper execution state. The runtime half (`rt`) is owned by the step
/// interrupt; the rest is the timer-glue bookkeeping around it.
pub(crate) struct StepperEngine {
    pub rt: StepperRuntime,
    /// Bits to pulse on the next interrupt entry (invert mask applied).
    pub out_bits: u8,
    /// Reentrancy latch for the step interrupt.
    pub busy: bool,
    /// Step timer enabled.
    pub active: bool,
    /// Tail block is checked out and being traced.
    pub has_block: bool,
    /// Pulse width in machine cycles.
    pub step_pulse_cycles: u32,
    /// Machine cycles per virtual acceleration tick.
    pub cycles_per_accel_tick: u32,
}

impl StepperEngine {
    pub fn new(cpu_hz: u32) -> Self {
        Self {
            rt: StepperRuntime::default(),
            out_bits: 0,
            busy: false,
            active: false,
            has_block: false,
            step_pulse_cycles: 0,
            cycles_per_accel_tick: cpu_hz / ACCELERATION_TICKS_PER_SECOND,
        }
    }
}

impl Machine {
    /// Enable the stepper drivers and, when a cycle is running, the step
    /// timer. Re-reads the pulse width so settings changes apply.
    pub fn st_wake_up(&mut self, port: &mut impl MachinePort) {
        // Enabled level is the inverse of the disable polarity.
        port.write_stepper_disable(self.settings.flags.invert_step_enable);
        if self.sys.state == MachineState::Cycle {
            self.st.out_bits = self.settings.invert_mask;
            // One-shot reload is a straight µs→cycles conversion.
            self.st.step_pulse_cycles =
                self.settings.pulse_microseconds as u32 * (self.cpu_hz / 1_000_000);
            port.step_timer_enable();
            self.st.active = true;
        }
    }

    /// Stop the step timer and, unless configured to stay locked, release
    /// the drivers after the idle-lock dwell so the axes settle.
    pub fn st_go_idle(&mut self, port: &mut impl MachinePort) {
        port.step_timer_disable();
        self.st.active = false;
        let alarm_pending = self.sys.exec.snapshot() & ExecFlags::ALARM != 0;
        if self.settings.stepper_idle_lock_ms != STEPPER_IDLE_LOCK_KEEP_ENABLED || alarm_pending {
            port.delay_ms(self.settings.stepper_idle_lock_ms as u16);
            port.write_stepper_disable(!self.settings.flags.invert_step_enable);
        }
    }

    /// Clear the stepper subsystem after reset. In-flight motion is
    /// abandoned, not decelerated.
    pub fn st_reset(&mut self, port: &mut impl MachinePort) {
        port.step_timer_disable();
        self.st.active = false;
        self.st.rt = StepperRuntime::default();
        self.st.has_block = false;
        self.st.busy = false;
        self.st.out_bits = self.settings.invert_mask;
        self.set_step_events_per_minute(port, MINIMUM_STEPS_PER_MINUTE);
    }

    /// Begin executing queued blocks. No-op unless queued.
    pub fn st_cycle_start(&mut self, port: &mut impl MachinePort) {
        if self.sys.state == MachineState::Queued {
            self.sys.state = MachineState::Cycle;
            tracing::debug!("cycle start");
            self.st_wake_up(port);
        }
    }

    /// Begin a feed hold: the trapezoid generator switches to a pure
    /// deceleration ramp. No-op outside a running cycle.
    pub fn st_feed_hold(&mut self) {
        if self.sys.state == MachineState::Cycle {
            self.sys.state = MachineState::Hold;
            // A resume must be explicit.
            self.sys.auto_start = false;
            tracing::debug!("feed hold");
        }
    }

    /// After a completed feed hold, re-plan the partially executed block
    /// from a standstill over its remaining step events. Bresenham state is
    /// untouched, so the path resumes exactly where it stopped.
    pub fn st_cycle_reinitialize(&mut self, port: &mut impl MachinePort) {
        if self.st.has_block {
            let remaining = {
                let block = self.ring.tail().expect("claimed block at tail");
                block.step_event_count - self.st.rt.step_events_completed
            };
            self.planner.cycle_reinitialize(&mut self.ring, remaining);
            self.st.rt.trapezoid_adjusted_rate = 0;
            self.set_step_events_per_minute(port, 0);
            self.st.rt.trapezoid_tick_cycle_counter = self.st.cycles_per_accel_tick / 2;
            self.st.rt.step_events_completed = 0;
            self.sys.state = MachineState::Queued;
            tracing::debug!(remaining, "cycle reinitialized after hold");
        } else {
            self.sys.state = MachineState::Idle;
        }
    }

    /// The step-timer interrupt body.
    pub fn step_interrupt(&mut self, port: &mut impl MachinePort) {
        // Guard against retriggering while still executing.
        if self.st.busy {
            return;
        }

        // Drive the bits computed last time: direction a moment before the
        // step edge, then arm the pulse-width one-shot.
        port.write_direction_bits(self.st.out_bits & DIRECTION_MASK);
        port.write_step_bits(self.st.out_bits & STEP_MASK);
        port.arm_pulse_reset(self.st.step_pulse_cycles);

        self.st.busy = true;

        if !self.st.has_block {
            // Anything in the buffer? If so, set up the next motion.
            if self.ring.claim_tail().is_some() {
                self.st.has_block = true;
                let block = *self.ring.tail().expect("claimed block at tail");
                if self.sys.state == MachineState::Cycle {
                    // During feed hold, leave rate and tick counter alone:
                    // deceleration continues smoothly across block
                    // boundaries.
                    self.st.rt.trapezoid_adjusted_rate = block.initial_rate;
                    self.set_step_events_per_minute(port, block.initial_rate);
                    // Start halfway for the midpoint rule.
                    self.st.rt.trapezoid_tick_cycle_counter = self.st.cycles_per_accel_tick / 2;
                }
                self.st.rt.load_block(&block);
            } else {
                self.st_go_idle(port);
                self.sys.exec.set(ExecFlags::CYCLE_STOP);
            }
        }

        if self.st.has_block {
            let block = *self.ring.tail().expect("claimed block at tail");

            let step_bits = bresenham::step_event(&mut self.st.rt, &block);
            self.st.out_bits = block.direction_bits | step_bits;

            let delta = bresenham::position_delta(step_bits, block.direction_bits);
            for axis in 0..N_AXIS {
                self.sys.position[axis] += delta[axis];
            }

            if self.st.rt.step_events_completed < block.step_event_count {
                let feed_hold = self.sys.state == MachineState::Hold;
                match profile::rate_tick(
                    &mut self.st.rt,
                    &block,
                    self.st.cycles_per_accel_tick,
                    feed_hold,
                ) {
                    RateChange::Unchanged => {}
                    RateChange::Adjusted(rate) => self.set_step_events_per_minute(port, rate),
                    RateChange::HoldComplete => {
                        // Keep the block claimed: the Bresenham state must
                        // survive the hold for an exact resume.
                        self.st_go_idle(port);
                        self.sys.exec.set(ExecFlags::CYCLE_STOP);
                    }
                }
            } else {
                // Block finished; release it and pop the next on the
                // following tick.
                self.st.has_block = false;
                self.plan_discard_current_block();
            }
        }

        self.st.out_bits ^= self.settings.invert_mask;
        self.st.busy = false;
    }

    /// The pulse-reset interrupt body: deassert the step lines, leaving the
    /// direction lines untouched. Runs at higher priority than the step
    /// interrupt.
    pub fn pulse_reset_interrupt(&self, port: &mut impl MachinePort) {
        port.write_step_bits(self.settings.invert_mask & STEP_MASK);
    }

    /// Clamp and install a step rate: reprogram the timer and remember the
    /// reload for the emulated acceleration tick.
    pub(crate) fn set_step_events_per_minute(
        &mut self,
        port: &mut impl MachinePort,
        steps_per_minute: u32,
    ) {
        let clamped = steps_per_minute.max(MINIMUM_STEPS_PER_MINUTE);
        self.st.rt.cycles_per_step_event = ((self.cpu_hz as u64 * 60) / clamped as u64) as u32;
        port.step_timer_set_cycles(self.st.rt.cycles_per_step_event);
    }
}
