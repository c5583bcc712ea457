//! Runtime control: the foreground poll loop and the realtime hooks.
//!
//! Interrupts and the serial layer never change the machine state
//! themselves — they raise bits in the `execute` bitset, and the foreground
//! loop applies them here, one poll at a time, in a fixed priority order.

use motion::N_AXIS;

use crate::error::{Alarm, StatusError};
use crate::hal::MachinePort;
use crate::machine::Machine;
use crate::report::{Feedback, Reporter};
use crate::system::{ExecFlags, MachineState};

impl Machine {
    /// One turn of the main loop: run the reset path while abort is
    /// latched, otherwise service pending runtime events.
    pub fn service(&mut self, port: &mut impl MachinePort, reporter: &mut impl Reporter) {
        if self.sys.abort {
            self.reset_after_abort(port, reporter);
        } else {
            self.execute_runtime(port, reporter);
        }
    }

    /// Emit the startup greeting. Grouped with the reset path; the line
    /// buffer and startup scripts live in the serial collaborator.
    pub fn protocol_init(&mut self, reporter: &mut impl Reporter) {
        reporter.startup_banner();
    }

    /// Handle a single-byte realtime command. These bypass the line buffer
    /// and may be called from any context: they only touch atomics.
    /// Returns false for bytes that are not realtime commands.
    pub fn realtime_command(&self, byte: u8) -> bool {
        match byte {
            b'~' => self.sys.exec.set(ExecFlags::CYCLE_START),
            b'!' => self.sys.exec.set(ExecFlags::FEED_HOLD),
            b'?' => self.sys.exec.set(ExecFlags::STATUS_REPORT),
            0x18 => {
                // Soft reset. Killing a live cycle loses position: latch an
                // alarm so the operator knows the machine must be re-homed.
                if matches!(
                    self.sys.state,
                    MachineState::Cycle | MachineState::Hold | MachineState::Homing
                ) {
                    self.sys.alarm.raise(Alarm::AbortCycle);
                    self.sys.exec.set(ExecFlags::ALARM);
                }
                self.sys.exec.set(ExecFlags::RESET);
            }
            _ => return false,
        }
        true
    }

    /// Service the pending runtime events. Each bit is cleared once
    /// handled; the reset bit short-circuits the rest of the poll.
    pub fn execute_runtime(&mut self, port: &mut impl MachinePort, reporter: &mut impl Reporter) {
        let exec = self.sys.exec.snapshot();
        if exec != 0 {
            if exec & ExecFlags::ALARM != 0 {
                self.sys.state = MachineState::Alarm;
                if let Some(alarm) = self.sys.alarm.take() {
                    tracing::warn!(%alarm, "alarm");
                    reporter.alarm_message(alarm);
                }
                self.sys.exec.clear(ExecFlags::ALARM);
            }
            if exec & ExecFlags::RESET != 0 {
                // Cleared wholesale by the reset path.
                self.sys.abort = true;
                return;
            }
            if exec & ExecFlags::STATUS_REPORT != 0 {
                self.report_realtime_status(reporter);
                self.sys.exec.clear(ExecFlags::STATUS_REPORT);
            }
            if exec & ExecFlags::FEED_HOLD != 0 {
                self.st_feed_hold();
                self.sys.exec.clear(ExecFlags::FEED_HOLD);
            }
            if exec & ExecFlags::CYCLE_START != 0 {
                self.st_cycle_start(port);
                self.sys.exec.clear(ExecFlags::CYCLE_START);
            }
            if exec & ExecFlags::CYCLE_STOP != 0 {
                self.st_cycle_reinitialize(port);
                self.sys.exec.clear(ExecFlags::CYCLE_STOP);
            }
        }

        // Planner auto-start: kick the cycle whenever work is waiting.
        if self.sys.auto_start
            && self.sys.state == MachineState::Queued
            && !self.ring.is_empty()
        {
            self.st_cycle_start(port);
        }
    }

    /// Hard-limit interrupt hook (debouncing lives with the switch
    /// collaborator). Motion is killed immediately — no deceleration — and
    /// the foreground locks into Alarm at its next poll.
    pub fn hard_limit_interrupt(&mut self, port: &mut impl MachinePort) {
        if !self.settings.flags.hard_limits {
            return;
        }
        port.step_timer_disable();
        self.st.active = false;
        self.sys.alarm.raise(Alarm::HardLimit);
        self.sys.exec.set(ExecFlags::ALARM);
    }

    /// Toggle g-code check mode. Leaving check mode soft-resets so parser
    /// and planner state cannot leak into real motion.
    pub fn toggle_check_mode(&mut self, reporter: &mut impl Reporter) -> Result<(), StatusError> {
        match self.sys.state {
            MachineState::Check => {
                reporter.feedback_message(Feedback::CheckModeDisabled);
                self.sys.exec.set(ExecFlags::RESET);
                Ok(())
            }
            MachineState::Idle => {
                self.sys.state = MachineState::Check;
                reporter.feedback_message(Feedback::CheckModeEnabled);
                Ok(())
            }
            MachineState::Alarm => Err(StatusError::AlarmLock),
            _ => Err(StatusError::SystemBusy),
        }
    }

    /// Lift the alarm lock without homing. The position is not trusted
    /// afterwards, hence the caution message.
    pub fn unlock(&mut self, reporter: &mut impl Reporter) -> Result<(), StatusError> {
        if self.sys.state == MachineState::Alarm {
            self.sys.state = MachineState::Idle;
            reporter.feedback_message(Feedback::UnlockCaution);
        }
        Ok(())
    }

    /// Enter the homing cycle. The cycle motion itself is driven by the
    /// homing collaborator; the core only owns the state transitions.
    pub fn start_homing(&mut self) -> Result<(), StatusError> {
        if !self.settings.flags.homing_enable {
            return Err(StatusError::SettingDisabled);
        }
        match self.sys.state {
            MachineState::Idle | MachineState::Alarm => {
                self.sys.state = MachineState::Homing;
                tracing::debug!("homing cycle started");
                Ok(())
            }
            _ => Err(StatusError::SystemBusy),
        }
    }

    /// Finish the homing cycle at a known machine position.
    pub fn homing_complete(
        &mut self,
        machine_position: [i32; N_AXIS],
        reporter: &mut impl Reporter,
    ) {
        self.sys.position = machine_position;
        self.sys_sync_current_position();
        self.sys.state = MachineState::Idle;
        reporter.feedback_message(Feedback::HomingComplete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TextReporter;
    use crate::settings::Settings;

    /// Port double that remembers only what the FSM tests need.
    #[derive(Default)]
    struct NullPort {
        step_timer_enabled: bool,
    }

    impl MachinePort for NullPort {
        fn write_direction_bits(&mut self, _bits: u8) {}
        fn write_step_bits(&mut self, _bits: u8) {}
        fn write_stepper_disable(&mut self, _level: bool) {}
        fn step_timer_set_cycles(&mut self, _cycles: u32) {}
        fn step_timer_enable(&mut self) {
            self.step_timer_enabled = true;
        }
        fn step_timer_disable(&mut self) {
            self.step_timer_enabled = false;
        }
        fn arm_pulse_reset(&mut self, _cycles: u32) {}
        fn delay_ms(&mut self, _ms: u16) {}
    }

    fn test_reporter() -> TextReporter<Vec<u8>> {
        TextReporter::new(Vec::new())
    }

    fn booted_machine(port: &mut NullPort) -> Machine {
        let mut machine = Machine::new(Settings::default(), 80_000_000);
        let mut reporter = test_reporter();
        machine.service(port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Idle);
        machine
    }

    #[test]
    fn boot_with_homing_enabled_locks_into_alarm() {
        let mut settings = Settings::default();
        settings.flags.homing_enable = true;
        let mut machine = Machine::new(settings, 80_000_000);
        let mut port = NullPort::default();
        let mut reporter = test_reporter();
        machine.service(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Alarm);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("'$H'|'$X' to unlock"));
    }

    #[test]
    fn queued_blocks_plus_cycle_start_run_the_timer() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        machine.sys.auto_start = false;
        machine
            .plan_buffer_line(&[1.0, 0.0, 0.0], 300.0, false)
            .unwrap();
        assert_eq!(machine.state(), MachineState::Queued);

        assert!(machine.realtime_command(b'~'));
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Cycle);
        assert!(port.step_timer_enabled);
    }

    #[test]
    fn auto_start_kicks_queued_work() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        machine
            .plan_buffer_line(&[1.0, 0.0, 0.0], 300.0, false)
            .unwrap();
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Cycle);
    }

    #[test]
    fn feed_hold_only_pauses_a_running_cycle() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        assert!(machine.realtime_command(b'!'));
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        // Idle machine: the hold is a no-op.
        assert_eq!(machine.state(), MachineState::Idle);
    }

    #[test]
    fn soft_reset_during_cycle_raises_abort_alarm() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        machine
            .plan_buffer_line(&[5.0, 0.0, 0.0], 300.0, false)
            .unwrap();
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Cycle);

        assert!(machine.realtime_command(0x18));
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Alarm);
        assert!(machine.sys.abort);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("ALARM: Abort during cycle"));

        // The reset path lands back in Alarm: position is untrusted.
        let mut reporter = test_reporter();
        machine.service(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Alarm);

        // Motion is rejected until unlocked.
        let err = machine
            .plan_buffer_line(&[1.0, 0.0, 0.0], 300.0, false)
            .unwrap_err();
        assert_eq!(err, nb::Error::Other(StatusError::AlarmLock));
        machine.unlock(&mut reporter).unwrap();
        assert_eq!(machine.state(), MachineState::Idle);
    }

    #[test]
    fn check_mode_drops_moves_and_resets_on_exit() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        let mut reporter = test_reporter();
        machine.toggle_check_mode(&mut reporter).unwrap();
        assert_eq!(machine.state(), MachineState::Check);

        let outcome = machine
            .plan_buffer_line(&[5.0, 0.0, 0.0], 300.0, false)
            .unwrap();
        assert_eq!(outcome, motion::PlanOutcome::Dropped);
        assert!(machine.ring().is_empty());

        machine.toggle_check_mode(&mut reporter).unwrap();
        machine.execute_runtime(&mut port, &mut reporter);
        assert!(machine.sys.abort);
    }

    #[test]
    fn homing_requires_the_feature_flag() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        assert_eq!(machine.start_homing(), Err(StatusError::SettingDisabled));

        machine.settings.flags.homing_enable = true;
        machine.start_homing().unwrap();
        assert_eq!(machine.state(), MachineState::Homing);

        let mut reporter = test_reporter();
        machine.homing_complete([0, 0, 0], &mut reporter);
        assert_eq!(machine.state(), MachineState::Idle);
    }

    #[test]
    fn hard_limit_kills_the_timer_and_locks_alarm() {
        let mut port = NullPort::default();
        let mut machine = booted_machine(&mut port);
        machine.settings.flags.hard_limits = true;
        machine
            .plan_buffer_line(&[5.0, 0.0, 0.0], 300.0, false)
            .unwrap();
        let mut reporter = test_reporter();
        machine.execute_runtime(&mut port, &mut reporter);
        assert!(port.step_timer_enabled);

        machine.hard_limit_interrupt(&mut port);
        assert!(!port.step_timer_enabled);
        machine.execute_runtime(&mut port, &mut reporter);
        assert_eq!(machine.state(), MachineState::Alarm);
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("ALARM: Hard limit"));
    }
}
