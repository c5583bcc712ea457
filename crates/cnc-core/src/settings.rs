//! Typed machine settings.
//!
//! The persistence layout (EEPROM, file, …) belongs to an external
//! collaborator; the struct derives serde so any format works, and the core
//! only ever goes through the typed accessors. The numbered setter mirrors
//! the host-facing `$n=value` surface.

use motion::{PlannerConfig, N_AXIS};
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Shortest step pulse the drivers are guaranteed to register.
pub const MIN_PULSE_MICROSECONDS: u8 = 3;

/// Idle-lock sentinel: keep the steppers energized forever.
pub const STEPPER_IDLE_LOCK_KEEP_ENABLED: u8 = 0xFF;

/// Coordinate system slots: G54..G59 plus the G28 and G30 home positions.
pub const N_COORDINATE_SYSTEMS: usize = 8;
pub const COORD_G28: usize = 6;
pub const COORD_G30: usize = 7;

/// Feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFlags {
    /// Start the cycle automatically when blocks are queued.
    pub auto_start: bool,
    /// Report positions in inches instead of millimetres.
    pub report_inches: bool,
    /// Hard limit switches wired and armed.
    pub hard_limits: bool,
    /// Homing required after power-up and alarm.
    pub homing_enable: bool,
    /// Stepper-enable line is active-high instead of active-low.
    pub invert_step_enable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomingSettings {
    /// Locating feed once a switch is found, mm/min.
    pub feed_rate: f32,
    /// Search feed toward the switches, mm/min.
    pub seek_rate: f32,
    /// Switch debounce delay, ms.
    pub debounce_ms: u16,
    /// Pull-off distance after locating, mm.
    pub pulloff_mm: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Steps per millimetre, per axis.
    pub steps_per_mm: [f32; N_AXIS],
    /// Acceleration per axis, mm/s² as entered by the operator.
    pub acceleration: [f32; N_AXIS],
    /// Default feed rate for moves without one, mm/min.
    pub default_feed_rate: f32,
    /// Rapid (seek) rate, mm/min.
    pub default_seek_rate: f32,
    /// Junction deviation, mm.
    pub junction_deviation: f32,
    /// Step pulse width, µs.
    pub pulse_microseconds: u8,
    /// Delay before unlocking idle steppers, ms; 0xFF keeps them enabled.
    pub stepper_idle_lock_ms: u8,
    /// Invert mask over the step/direction output bits.
    pub invert_mask: u8,
    pub flags: SettingsFlags,
    pub homing: HomingSettings,
    /// Work coordinate systems G54..G59 and the G28/G30 positions, mm.
    pub coord_systems: [[f32; N_AXIS]; N_COORDINATE_SYSTEMS],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            steps_per_mm: [250.0; N_AXIS],
            acceleration: [10.0; N_AXIS],
            default_feed_rate: 250.0,
            default_seek_rate: 500.0,
            junction_deviation: 0.05,
            pulse_microseconds: 10,
            stepper_idle_lock_ms: 25,
            invert_mask: 0,
            flags: SettingsFlags {
                auto_start: true,
                report_inches: false,
                hard_limits: false,
                homing_enable: false,
                invert_step_enable: false,
            },
            homing: HomingSettings {
                feed_rate: 25.0,
                seek_rate: 250.0,
                debounce_ms: 100,
                pulloff_mm: 1.0,
            },
            coord_systems: [[0.0; N_AXIS]; N_COORDINATE_SYSTEMS],
        }
    }
}

impl Settings {
    /// Acceleration for one axis in the planner's mm/min² units.
    pub fn acceleration_mm_min2(&self, axis: usize) -> f32 {
        self.acceleration[axis] * 60.0 * 60.0
    }

    /// Limits bundle handed to the planner.
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            steps_per_mm: self.steps_per_mm,
            acceleration: [
                self.acceleration_mm_min2(0),
                self.acceleration_mm_min2(1),
                self.acceleration_mm_min2(2),
            ],
            junction_deviation: self.junction_deviation,
        }
    }

    /// Apply a host `$n=value` assignment with validation.
    pub fn set_numbered(&mut self, number: u32, value: f32) -> Result<(), StatusError> {
        if value < 0.0 {
            return Err(StatusError::NegativeValue);
        }
        match number {
            0..=2 => self.steps_per_mm[number as usize] = value,
            3..=5 => self.acceleration[(number - 3) as usize] = value,
            6 => self.default_feed_rate = value,
            7 => self.default_seek_rate = value,
            8 => self.junction_deviation = value,
            9 => {
                if (value as u8) < MIN_PULSE_MICROSECONDS {
                    return Err(StatusError::PulseTooShort);
                }
                self.pulse_microseconds = value as u8;
            }
            10 => self.stepper_idle_lock_ms = value as u8,
            11 => self.invert_mask = value as u8,
            12 => self.flags.auto_start = value != 0.0,
            13 => self.flags.report_inches = value != 0.0,
            14 => self.flags.hard_limits = value != 0.0,
            15 => self.flags.homing_enable = value != 0.0,
            16 => self.flags.invert_step_enable = value != 0.0,
            17 => self.homing.feed_rate = value,
            18 => self.homing.seek_rate = value,
            19 => self.homing.debounce_ms = value as u16,
            20 => self.homing.pulloff_mm = value,
            _ => return Err(StatusError::UnknownSetting),
        }
        Ok(())
    }

    /// `(index, value, description)` rows for the settings dump, in `$n`
    /// order.
    pub fn dump_rows(&self) -> Vec<(u32, f32, &'static str)> {
        vec![
            (0, self.steps_per_mm[0], "x, step/mm"),
            (1, self.steps_per_mm[1], "y, step/mm"),
            (2, self.steps_per_mm[2], "z, step/mm"),
            (3, self.acceleration[0], "x accel, mm/sec^2"),
            (4, self.acceleration[1], "y accel, mm/sec^2"),
            (5, self.acceleration[2], "z accel, mm/sec^2"),
            (6, self.default_feed_rate, "default feed, mm/min"),
            (7, self.default_seek_rate, "default seek, mm/min"),
            (8, self.junction_deviation, "cornering junction deviation, mm"),
            (9, self.pulse_microseconds as f32, "step pulse, usec"),
            (
                10,
                self.stepper_idle_lock_ms as f32,
                "step idle delay, msec",
            ),
            (11, self.invert_mask as f32, "step port invert mask"),
            (12, bool_row(self.flags.auto_start), "auto start enable, bool"),
            (13, bool_row(self.flags.report_inches), "report inches, bool"),
            (14, bool_row(self.flags.hard_limits), "hard limits enable, bool"),
            (15, bool_row(self.flags.homing_enable), "homing cycle enable, bool"),
            (
                16,
                bool_row(self.flags.invert_step_enable),
                "invert step enable, bool",
            ),
            (17, self.homing.feed_rate, "homing feed, mm/min"),
            (18, self.homing.seek_rate, "homing seek, mm/min"),
            (19, self.homing.debounce_ms as f32, "homing debounce, msec"),
            (20, self.homing.pulloff_mm, "homing pull-off, mm"),
        ]
    }
}

fn bool_row(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_setter_round_trips() {
        let mut settings = Settings::default();
        settings.set_numbered(0, 80.0).unwrap();
        settings.set_numbered(5, 25.0).unwrap();
        settings.set_numbered(12, 0.0).unwrap();
        assert_eq!(settings.steps_per_mm[0], 80.0);
        assert_eq!(settings.acceleration[2], 25.0);
        assert!(!settings.flags.auto_start);
    }

    #[test]
    fn negative_values_are_rejected() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.set_numbered(0, -1.0),
            Err(StatusError::NegativeValue)
        );
    }

    #[test]
    fn short_pulses_are_rejected() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.set_numbered(9, 2.0),
            Err(StatusError::PulseTooShort)
        );
        settings.set_numbered(9, 3.0).unwrap();
        assert_eq!(settings.pulse_microseconds, 3);
    }

    #[test]
    fn unknown_settings_are_rejected() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.set_numbered(99, 1.0),
            Err(StatusError::UnknownSetting)
        );
    }

    #[test]
    fn planner_config_converts_acceleration_units() {
        let settings = Settings::default();
        let config = settings.planner_config();
        // 10 mm/s² is 36000 mm/min².
        assert_eq!(config.acceleration[0], 36_000.0);
        assert_eq!(config.steps_per_mm, settings.steps_per_mm);
    }
}
