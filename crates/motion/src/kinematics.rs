//! Kinematic conversion from millimetre targets to step space.
//!
//! Three independent cartesian axes: each stepper maps directly to one
//! machine axis through its steps/mm scale.

use crate::block::direction_bit;
use crate::math::{roundf, sqrtf};
use crate::{MINIMUM_PLANNER_SPEED, N_AXIS};

/// A move converted into step space, ready for planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveVector {
    /// Absolute step position of the target, per axis.
    pub target_steps: [i32; N_AXIS],
    /// Unsigned step counts per axis.
    pub steps: [u32; N_AXIS],
    /// Per-axis sign bitmap (`*_DIRECTION_BIT`).
    pub direction_bits: u8,
    /// Maximum of `steps`; the dominant-axis event count.
    pub step_event_count: u32,
    /// Euclidean length of the cartesian move in mm.
    pub millimeters: f32,
    /// Unit vector of the cartesian move.
    pub unit_vec: [f32; N_AXIS],
}

/// Convert a millimetre target into per-axis step deltas relative to the
/// planner's current step position.
///
/// Returns `None` when the target rounds to the current position on every
/// axis; such moves are dropped upstream without planning.
pub fn convert_target(
    target_mm: &[f32; N_AXIS],
    position_steps: &[i32; N_AXIS],
    steps_per_mm: &[f32; N_AXIS],
) -> Option<MoveVector> {
    let mut target_steps = [0i32; N_AXIS];
    let mut steps = [0u32; N_AXIS];
    let mut delta_mm = [0f32; N_AXIS];
    let mut direction_bits = 0u8;
    let mut step_event_count = 0u32;

    for axis in 0..N_AXIS {
        target_steps[axis] = roundf(target_mm[axis] * steps_per_mm[axis]) as i32;
        let delta = target_steps[axis] - position_steps[axis];
        steps[axis] = delta.unsigned_abs();
        step_event_count = step_event_count.max(steps[axis]);
        if delta < 0 {
            direction_bits |= direction_bit(axis);
        }
        delta_mm[axis] = delta as f32 / steps_per_mm[axis];
    }

    if step_event_count == 0 {
        return None;
    }

    let millimeters = sqrtf(
        delta_mm[0] * delta_mm[0] + delta_mm[1] * delta_mm[1] + delta_mm[2] * delta_mm[2],
    );
    let unit_vec = [
        delta_mm[0] / millimeters,
        delta_mm[1] / millimeters,
        delta_mm[2] / millimeters,
    ];

    Some(MoveVector {
        target_steps,
        steps,
        direction_bits,
        step_event_count,
        millimeters,
        unit_vec,
    })
}

/// Cruise speed in mm/min for a move of the given length.
///
/// In inverse-feed mode the feed value means "complete the move in 1/F
/// minutes", so the speed scales with the move length.
pub fn nominal_speed(millimeters: f32, feed_rate: f32, invert_feed: bool) -> f32 {
    let speed = if invert_feed {
        millimeters * feed_rate
    } else {
        feed_rate
    };
    if speed < MINIMUM_PLANNER_SPEED {
        MINIMUM_PLANNER_SPEED
    } else {
        speed
    }
}
