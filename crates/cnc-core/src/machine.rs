//! The machine context: every core subsystem behind one value.
//!
//! Settings, system state, the planner and the stepper engine are fields of
//! one [`Machine`] passed by reference to every operation — no module-level
//! singletons. Interrupt bodies are plain methods; whoever owns the timers
//! (hardware glue or the simulator) calls them.

use core::convert::Infallible;

use motion::{Block, BlockRing, PlanOutcome, Planner, PlannerError, StepperRuntime, N_AXIS};

use crate::error::StatusError;
use crate::hal::{mm_from_steps, MachinePort};
use crate::report::Reporter;
use crate::settings::Settings;
use crate::stepper::StepperEngine;
use crate::system::{MachineState, SystemState};

pub struct Machine {
    pub settings: Settings,
    pub sys: SystemState,
    pub(crate) planner: Planner,
    pub(crate) ring: BlockRing,
    pub(crate) st: StepperEngine,
    /// Active work-coordinate offset for reporting, mm.
    pub(crate) work_offset: [f32; N_AXIS],
    pub(crate) cpu_hz: u32,
}

impl Machine {
    /// A machine fresh off power-up: state Init, abort latched so the first
    /// [`Machine::service`] call runs the reset path.
    pub fn new(settings: Settings, cpu_hz: u32) -> Self {
        let work_offset = settings.coord_systems[0];
        Self {
            settings,
            sys: SystemState::new(),
            planner: Planner::new(),
            ring: BlockRing::new(),
            st: StepperEngine::new(cpu_hz),
            work_offset,
            cpu_hz,
        }
    }

    /// Restore every invariant after reset/abort: in-flight blocks are
    /// dropped without deceleration, planner and stepper state cleared,
    /// positions re-synced. Power-up with homing enabled locks into Alarm
    /// until the machine is homed.
    pub fn reset_after_abort(&mut self, port: &mut impl MachinePort, reporter: &mut impl Reporter) {
        tracing::info!(state = ?self.sys.state, "resetting system");
        self.plan_reset();
        self.st_reset(port);
        self.sys.exec.clear_all();
        let _ = self.sys.alarm.take();
        self.sys_sync_current_position();
        self.sys.abort = false;
        self.sys.auto_start = self.settings.flags.auto_start;

        reporter.startup_banner();
        if self.sys.state == MachineState::Init && self.settings.flags.homing_enable {
            self.sys.state = MachineState::Alarm;
        }
        if self.sys.state == MachineState::Alarm {
            reporter.feedback_message(crate::report::Feedback::AlarmLock);
        } else {
            self.sys.state = MachineState::Idle;
        }
    }

    /// Append a linear move to the plan.
    ///
    /// Non-blocking: a full ring yields `nb::Error::WouldBlock`, which is
    /// backpressure rather than an error — the caller's poll loop retries
    /// while the stepper drains. Zero-length moves report
    /// [`PlanOutcome::Dropped`] and queue nothing. Rejected outright in the
    /// Alarm state; in Check mode the move is validated and dropped.
    pub fn plan_buffer_line(
        &mut self,
        target_mm: &[f32; N_AXIS],
        feed_rate: f32,
        invert_feed: bool,
    ) -> nb::Result<PlanOutcome, StatusError> {
        match self.sys.state {
            MachineState::Alarm => return Err(nb::Error::Other(StatusError::AlarmLock)),
            MachineState::Check => return Ok(PlanOutcome::Dropped),
            _ => {}
        }
        let config = self.settings.planner_config();
        match self
            .planner
            .plan_buffer_line(&mut self.ring, &config, target_mm, feed_rate, invert_feed)
        {
            Ok(PlanOutcome::Enqueued) => {
                tracing::debug!(?target_mm, feed_rate, "queued motion block");
                if self.sys.state == MachineState::Idle {
                    self.sys.state = MachineState::Queued;
                }
                Ok(PlanOutcome::Enqueued)
            }
            Ok(PlanOutcome::Dropped) => Ok(PlanOutcome::Dropped),
            Err(PlannerError::RingFull) => Err(nb::Error::WouldBlock),
        }
    }

    /// Complete once the ring has drained and the stepper has gone idle.
    /// Spin in the caller's poll loop while this yields `WouldBlock`.
    pub fn plan_synchronize(&self) -> nb::Result<(), Infallible> {
        if self.ring.is_empty() && !self.st.active {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Drop all queued blocks and planner state. Only sane together with
    /// [`Machine::st_reset`]; part of the abort path.
    pub fn plan_reset(&mut self) {
        self.ring.clear();
        self.planner.reset();
    }

    /// The block currently at the ring tail, if any.
    pub fn current_block(&self) -> Option<&Block> {
        self.ring.tail()
    }

    /// Release the finished tail block. Interrupt-facing; the step
    /// interrupt calls this when a block's last event has executed.
    pub fn plan_discard_current_block(&mut self) {
        self.ring.discard_tail();
    }

    /// Align the planner with the machine's actual position. Called after
    /// reset and after homing, with the ring empty.
    pub fn sys_sync_current_position(&mut self) {
        let position = self.sys.position_snapshot();
        self.planner.sync_position(&position);
    }

    /// Install the work-coordinate offset used for `WPos` reporting.
    pub fn set_work_offset(&mut self, offset_mm: [f32; N_AXIS]) {
        self.work_offset = offset_mm;
    }

    /// Select one of the stored coordinate systems as the work offset.
    pub fn select_coord_system(&mut self, index: usize) -> Result<(), StatusError> {
        let offset = self
            .settings
            .coord_systems
            .get(index)
            .copied()
            .ok_or(StatusError::UnsupportedStatement)?;
        self.work_offset = offset;
        Ok(())
    }

    /// Answer a `?` query with machine and work positions.
    pub fn report_realtime_status(&mut self, reporter: &mut impl Reporter) {
        let machine_pos = mm_from_steps(&self.sys.position_snapshot(), &self.settings.steps_per_mm);
        let work_pos = [
            machine_pos[0] - self.work_offset[0],
            machine_pos[1] - self.work_offset[1],
            machine_pos[2] - self.work_offset[2],
        ];
        reporter.realtime_status(
            self.sys.state,
            machine_pos,
            work_pos,
            self.settings.flags.report_inches,
        );
    }

    // --- Introspection for harnesses and tests ---

    pub fn state(&self) -> MachineState {
        self.sys.state
    }

    pub fn ring(&self) -> &BlockRing {
        &self.ring
    }

    pub fn stepper_runtime(&self) -> &StepperRuntime {
        &self.st.rt
    }

    /// Whether the step timer is running.
    pub fn stepper_active(&self) -> bool {
        self.st.active
    }
}
