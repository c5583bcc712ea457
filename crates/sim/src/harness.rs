//! Scenario driver around one machine and its virtual port.
//!
//! The harness owns the event loop: dispatch the earliest pending timer
//! interrupt, then let the foreground poll run — the same
//! interrupt/foreground interleaving a firmware main loop sees. The
//! blocking plan semantics (`plan_buffer_line` spin-waits on a full ring,
//! `plan_synchronize` spins until drained) live here: the harness retries
//! `WouldBlock` results while stepping the interrupt side forward.

use anyhow::{bail, Result};
use cnc_core::{Machine, MachineState, Settings, TextReporter};
use motion::{PlanOutcome, N_AXIS};

use crate::port::{SimEvent, SimPort};

/// Default guard against runaway simulations.
const MAX_EVENTS: u64 = 50_000_000;

pub struct SimMachine {
    pub machine: Machine,
    pub port: SimPort,
    reporter: TextReporter<Vec<u8>>,
    events_dispatched: u64,
}

impl SimMachine {
    /// Boot a machine: construction plus the first service pass (the reset
    /// path), leaving it in Idle — or Alarm when homing is enabled.
    pub fn boot(settings: Settings, cpu_hz: u32) -> Self {
        let invert_mask = settings.invert_mask;
        let mut sim = Self {
            machine: Machine::new(settings, cpu_hz),
            port: SimPort::new(cpu_hz, invert_mask),
            reporter: TextReporter::new(Vec::new()),
            events_dispatched: 0,
        };
        sim.service();
        tracing::debug!(state = ?sim.state(), "simulated machine booted");
        sim
    }

    /// One foreground poll.
    pub fn service(&mut self) {
        self.machine.service(&mut self.port, &mut self.reporter);
    }

    /// Dispatch the earliest pending timer interrupt. Returns false when
    /// no timer is armed.
    pub fn step_once(&mut self) -> bool {
        let Some((event, at)) = self.port.next_event() else {
            return false;
        };
        self.events_dispatched += 1;
        self.port.now = self.port.now.max(at);
        match event {
            SimEvent::PulseReset => {
                self.port.pulse_deadline = None;
                self.machine.pulse_reset_interrupt(&mut self.port);
            }
            SimEvent::StepTimer => {
                self.machine.step_interrupt(&mut self.port);
                // Periodic reload with whatever rate the interrupt installed.
                if self.port.step_timer_enabled {
                    self.port.next_step_deadline =
                        Some(self.port.now + u64::from(self.port.step_reload.max(1)));
                }
            }
        }
        true
    }

    /// Advance until `predicate` holds, servicing the foreground between
    /// interrupts.
    pub fn run_until(&mut self, mut predicate: impl FnMut(&Machine) -> bool) -> Result<()> {
        loop {
            if predicate(&self.machine) {
                return Ok(());
            }
            self.service();
            if predicate(&self.machine) {
                return Ok(());
            }
            if !self.step_once() {
                self.service();
                if predicate(&self.machine) {
                    return Ok(());
                }
                bail!("simulation stalled with no pending timer events");
            }
            if self.events_dispatched > MAX_EVENTS {
                bail!("simulation exceeded {MAX_EVENTS} events");
            }
        }
    }

    /// Run until the queue has drained and the machine is back in Idle.
    pub fn run_until_idle(&mut self) -> Result<()> {
        self.run_until(|m| {
            m.ring().is_empty() && !m.stepper_active() && m.state() == MachineState::Idle
        })
    }

    /// Blocking plan call: spins on a full ring while the stepper drains
    /// blocks underneath.
    pub fn plan_line(&mut self, target_mm: [f32; N_AXIS], feed_rate: f32) -> Result<PlanOutcome> {
        loop {
            match self.machine.plan_buffer_line(&target_mm, feed_rate, false) {
                Ok(outcome) => return Ok(outcome),
                Err(nb::Error::Other(error)) => bail!("planner rejected move: {error}"),
                Err(nb::Error::WouldBlock) => {
                    // Ring full: let the machine make progress.
                    self.service();
                    if !self.step_once() {
                        bail!("ring full but the stepper is idle; nothing can drain");
                    }
                    if self.events_dispatched > MAX_EVENTS {
                        bail!("simulation exceeded {MAX_EVENTS} events");
                    }
                }
            }
        }
    }

    /// Spin until the plan is fully executed and the steppers are idle.
    pub fn synchronize(&mut self) -> Result<()> {
        loop {
            self.service();
            if self.machine.plan_synchronize().is_ok() {
                // One more poll so a pending cycle-stop settles the state.
                self.service();
                return Ok(());
            }
            if !self.step_once() {
                self.service();
                if self.machine.plan_synchronize().is_ok() {
                    return Ok(());
                }
                bail!("synchronize stalled with motion pending");
            }
            if self.events_dispatched > MAX_EVENTS {
                bail!("simulation exceeded {MAX_EVENTS} events");
            }
        }
    }

    /// Realtime cycle start (`~`) plus a service pass.
    pub fn cycle_start(&mut self) {
        self.machine.realtime_command(b'~');
        self.service();
    }

    /// Realtime feed hold (`!`) plus a service pass.
    pub fn feed_hold(&mut self) {
        self.machine.realtime_command(b'!');
        self.service();
    }

    /// Realtime status query (`?`) plus a service pass.
    pub fn status_query(&mut self) {
        self.machine.realtime_command(b'?');
        self.service();
    }

    /// Realtime soft reset (`0x18`): one poll to latch the abort, one to
    /// run the reset path.
    pub fn soft_reset(&mut self) {
        self.machine.realtime_command(0x18);
        self.service();
        self.service();
    }

    pub fn position(&self) -> [i32; N_AXIS] {
        self.machine.sys.position_snapshot()
    }

    pub fn state(&self) -> MachineState {
        self.machine.state()
    }

    /// Everything the reporter has written so far.
    pub fn host_output(&self) -> String {
        String::from_utf8_lossy(self.reporter.get_ref()).into_owned()
    }
}
