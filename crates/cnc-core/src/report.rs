//! Host-facing reporting.
//!
//! Every host line is answered with exactly one `ok` or `error: <msg>`
//! line; everything else the machine volunteers (alarms, feedback,
//! realtime status) goes through the same capability trait so a different
//! wire format only has to supply another implementation.

use std::io::Write;

use motion::N_AXIS;

use crate::error::{Alarm, StatusError};
use crate::settings::Settings;
use crate::system::MachineState;

const MM_PER_INCH: f32 = 25.4;

/// Operator feedback messages, `[...]`-bracketed on the text protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Alarm lock active after power-up with homing enabled.
    AlarmLock,
    /// Alarm lock lifted without homing; position is not trusted.
    UnlockCaution,
    CheckModeEnabled,
    CheckModeDisabled,
    HomingComplete,
}

impl Feedback {
    fn text(self) -> &'static str {
        match self {
            Feedback::AlarmLock => "'$H'|'$X' to unlock",
            Feedback::UnlockCaution => "Caution: Unlocked",
            Feedback::CheckModeEnabled => "Enabled",
            Feedback::CheckModeDisabled => "Disabled",
            Feedback::HomingComplete => "Homing complete",
        }
    }
}

/// Capability interface for everything the core tells the host.
pub trait Reporter {
    /// Close out one host line: `ok` or `error: <msg>`.
    fn status_message(&mut self, result: Result<(), StatusError>);

    /// Asynchronous alarm announcement.
    fn alarm_message(&mut self, alarm: Alarm);

    /// Non-error operator feedback.
    fn feedback_message(&mut self, feedback: Feedback);

    /// Realtime status for the `?` query. Positions are millimetres;
    /// `report_inches` selects the display unit.
    fn realtime_status(
        &mut self,
        state: MachineState,
        machine_pos_mm: [f32; N_AXIS],
        work_pos_mm: [f32; N_AXIS],
        report_inches: bool,
    );

    /// Full `$n=value (description)` settings listing.
    fn settings_dump(&mut self, settings: &Settings);

    /// Greeting after reset.
    fn startup_banner(&mut self);
}

/// Plain-text reporter writing the classic serial protocol.
///
/// Write failures are swallowed: there is no one to report a broken
/// reporting channel to.
#[derive(Debug)]
pub struct TextReporter<W: Write> {
    out: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Borrow the underlying writer, e.g. to inspect captured output.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn state_name(state: MachineState) -> &'static str {
        match state {
            MachineState::Init => "Init",
            MachineState::Idle => "Idle",
            MachineState::Queued => "Queue",
            MachineState::Cycle => "Run",
            MachineState::Hold => "Hold",
            MachineState::Homing => "Home",
            MachineState::Alarm => "Alarm",
            MachineState::Check => "Check",
        }
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn status_message(&mut self, result: Result<(), StatusError>) {
        let _ = match result {
            Ok(()) => write!(self.out, "ok\r\n"),
            Err(error) => write!(self.out, "error: {error}\r\n"),
        };
    }

    fn alarm_message(&mut self, alarm: Alarm) {
        let _ = write!(self.out, "ALARM: {alarm}\r\n");
    }

    fn feedback_message(&mut self, feedback: Feedback) {
        let _ = write!(self.out, "[{}]\r\n", feedback.text());
    }

    fn realtime_status(
        &mut self,
        state: MachineState,
        machine_pos_mm: [f32; N_AXIS],
        work_pos_mm: [f32; N_AXIS],
        report_inches: bool,
    ) {
        let scale = if report_inches { 1.0 / MM_PER_INCH } else { 1.0 };
        let _ = write!(
            self.out,
            "<{},MPos:{:.3},{:.3},{:.3},WPos:{:.3},{:.3},{:.3}>\r\n",
            Self::state_name(state),
            machine_pos_mm[0] * scale,
            machine_pos_mm[1] * scale,
            machine_pos_mm[2] * scale,
            work_pos_mm[0] * scale,
            work_pos_mm[1] * scale,
            work_pos_mm[2] * scale,
        );
    }

    fn settings_dump(&mut self, settings: &Settings) {
        for (number, value, description) in settings.dump_rows() {
            let _ = write!(self.out, "${number}={value:.3} ({description})\r\n");
        }
    }

    fn startup_banner(&mut self) {
        let _ = write!(
            self.out,
            "\r\ncnc-core {} ['$' for help]\r\n",
            env!("CARGO_PKG_VERSION")
        );
    }
}
