//! System state shared between the foreground loop and interrupt context.

use core::sync::atomic::{AtomicU8, Ordering};

use motion::N_AXIS;

use crate::error::Alarm;

/// Overall machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum MachineState {
    /// Power-up, position unknown.
    Init,
    /// Nothing queued, steppers idle.
    Idle,
    /// Blocks queued but the cycle has not been started.
    Queued,
    /// Executing queued blocks.
    Cycle,
    /// Feed hold: decelerating to a controlled stop.
    Hold,
    /// Homing cycle in progress (driven by an external collaborator).
    Homing,
    /// Locked out after an alarm; only unlock and homing are accepted.
    Alarm,
    /// G-code check mode: moves are parsed and dropped.
    Check,
}

/// Pending runtime events, OR-set from any context (including interrupts)
/// and cleared bit-by-bit by the foreground loop only.
#[derive(Debug, Default)]
pub struct ExecFlags(AtomicU8);

impl ExecFlags {
    pub const CYCLE_START: u8 = 1 << 0;
    pub const FEED_HOLD: u8 = 1 << 1;
    pub const CYCLE_STOP: u8 = 1 << 2;
    pub const RESET: u8 = 1 << 3;
    pub const STATUS_REPORT: u8 = 1 << 4;
    pub const ALARM: u8 = 1 << 5;

    pub fn set(&self, bits: u8) {
        self.0.fetch_or(bits, Ordering::AcqRel);
    }

    pub fn clear(&self, bits: u8) {
        self.0.fetch_and(!bits, Ordering::AcqRel);
    }

    pub fn clear_all(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn snapshot(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

/// Alarm cause codes carried through an atomic so interrupt-side hooks can
/// record the cause before raising `ExecFlags::ALARM`.
const ALARM_NONE: u8 = 0;
const ALARM_HARD_LIMIT: u8 = 1;
const ALARM_ABORT_CYCLE: u8 = 2;

#[derive(Debug, Default)]
pub struct AlarmLatch(AtomicU8);

impl AlarmLatch {
    pub fn raise(&self, alarm: Alarm) {
        let code = match alarm {
            Alarm::HardLimit => ALARM_HARD_LIMIT,
            Alarm::AbortCycle => ALARM_ABORT_CYCLE,
        };
        self.0.store(code, Ordering::Release);
    }

    pub fn take(&self) -> Option<Alarm> {
        match self.0.swap(ALARM_NONE, Ordering::AcqRel) {
            ALARM_HARD_LIMIT => Some(Alarm::HardLimit),
            ALARM_ABORT_CYCLE => Some(Alarm::AbortCycle),
            _ => None,
        }
    }
}

/// Shared machine state.
///
/// `position` is written only by the step interrupt; foreground readers use
/// [`SystemState::position_snapshot`] so a three-word read cannot tear under
/// a live interrupt.
#[derive(Debug)]
pub struct SystemState {
    pub state: MachineState,
    /// Latched by reset/abort; the main loop reinitializes when set.
    pub abort: bool,
    /// Start cycles automatically whenever blocks are queued.
    pub auto_start: bool,
    /// Machine position in steps, absolute.
    pub position: [i32; N_AXIS],
    pub exec: ExecFlags,
    pub alarm: AlarmLatch,
}

impl SystemState {
    pub fn new() -> Self {
        Self {
            state: MachineState::Init,
            abort: true,
            auto_start: false,
            position: [0; N_AXIS],
            exec: ExecFlags::default(),
            alarm: AlarmLatch::default(),
        }
    }

    /// Torn-read-free copy of the machine position.
    pub fn position_snapshot(&self) -> [i32; N_AXIS] {
        critical_section::with(|_| self.position)
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_flags_accumulate_and_clear_independently() {
        let exec = ExecFlags::default();
        exec.set(ExecFlags::CYCLE_START);
        exec.set(ExecFlags::STATUS_REPORT);
        assert_eq!(
            exec.snapshot(),
            ExecFlags::CYCLE_START | ExecFlags::STATUS_REPORT
        );
        exec.clear(ExecFlags::CYCLE_START);
        assert_eq!(exec.snapshot(), ExecFlags::STATUS_REPORT);
    }

    #[test]
    fn alarm_latch_is_take_once() {
        let latch = AlarmLatch::default();
        latch.raise(Alarm::HardLimit);
        assert_eq!(latch.take(), Some(Alarm::HardLimit));
        assert_eq!(latch.take(), None);
    }
}
