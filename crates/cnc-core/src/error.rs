//! Error taxonomy surfaced to the host.
//!
//! Synchronous rejections become `error: <msg>` lines; asynchronous alarms
//! become `ALARM: <msg>` lines and force the machine into the Alarm state.

use thiserror::Error;

/// Synchronous command rejections. Returned to the caller; nothing is
/// enqueued and nothing is retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    // Upstream g-code parser rejections, surfaced through the same channel.
    #[error("Bad number format")]
    BadNumberFormat,
    #[error("Expected command letter")]
    ExpectedCommandLetter,
    #[error("Unsupported statement")]
    UnsupportedStatement,
    #[error("Modal group violation")]
    ModalGroupViolation,
    #[error("Invalid arc radius")]
    InvalidArcRadius,

    // Settings rejections.
    #[error("Setting disabled")]
    SettingDisabled,
    #[error("Unknown setting")]
    UnknownSetting,
    #[error("Value < 0.0")]
    NegativeValue,
    #[error("Step pulse must be >= 3 microseconds")]
    PulseTooShort,
    #[error("Failed to read settings; restoring defaults")]
    SettingsReadFail,

    // State rejections.
    #[error("Busy or queued")]
    SystemBusy,
    #[error("Alarm lock")]
    AlarmLock,
}

/// Asynchronous alarms. Motion halts immediately, the state machine locks
/// in Alarm, and the operator must reset or home to continue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    #[error("Hard limit")]
    HardLimit,
    #[error("Abort during cycle")]
    AbortCycle,
}
