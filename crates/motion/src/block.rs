//! The motion block: one planned linear segment.

use crate::N_AXIS;

/// Step output bits, one per axis.
pub const X_STEP_BIT: u8 = 1 << 0;
pub const Y_STEP_BIT: u8 = 1 << 1;
pub const Z_STEP_BIT: u8 = 1 << 2;

/// Direction output bits, one per axis. A set bit means the axis moves in
/// the negative direction.
pub const X_DIRECTION_BIT: u8 = 1 << 3;
pub const Y_DIRECTION_BIT: u8 = 1 << 4;
pub const Z_DIRECTION_BIT: u8 = 1 << 5;

pub const STEP_MASK: u8 = X_STEP_BIT | Y_STEP_BIT | Z_STEP_BIT;
pub const DIRECTION_MASK: u8 = X_DIRECTION_BIT | Y_DIRECTION_BIT | Z_DIRECTION_BIT;

/// Step bit for the given axis index.
#[inline]
pub const fn step_bit(axis: usize) -> u8 {
    X_STEP_BIT << axis
}

/// Direction bit for the given axis index.
#[inline]
pub const fn direction_bit(axis: usize) -> u8 {
    X_DIRECTION_BIT << axis
}

/// One planned linear move between two points.
///
/// Planning fields (speeds, lengths) are `f32` in mm and mm²/min²; execution
/// fields (rates, thresholds) are integers in steps/min and step events, so
/// the interrupt side never needs float arithmetic. Once the planner has
/// frozen a block and the stepper has claimed it, nothing may rewrite it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// Unsigned step counts per axis.
    pub steps: [u32; N_AXIS],
    /// Maximum of `steps`; the Bresenham event count.
    pub step_event_count: u32,
    /// Per-axis sign bitmap (`*_DIRECTION_BIT`).
    pub direction_bits: u8,

    /// Euclidean length of the cartesian move, planning only.
    pub millimeters: f32,
    /// Speed at the block start, squared (mm²/min²).
    pub entry_speed_sqr: f32,
    /// Junction-limited ceiling for `entry_speed_sqr`.
    pub max_entry_speed_sqr: f32,
    /// Cruise speed, squared.
    pub nominal_speed_sqr: f32,
    /// Acceleration for this block in mm/min², limited per axis.
    pub acceleration: f32,

    /// Step rate at cruise speed, steps/min.
    pub nominal_rate: u32,
    /// Step rate at the block start.
    pub initial_rate: u32,
    /// Step rate at the block end.
    pub final_rate: u32,
    /// Rate added/removed per acceleration tick.
    pub rate_delta: u32,
    /// Accelerate while `step_events_completed` is below this.
    pub accelerate_until: u32,
    /// Decelerate once `step_events_completed` reaches this.
    pub decelerate_after: u32,

    /// Entry speed changed; trapezoid needs refreezing.
    pub recalculate: bool,
    /// Block is long enough to reach nominal speed from the planner floor,
    /// so its entry speed is never constrained by successors.
    pub nominal_length: bool,
}

impl Block {
    /// Signed step delta of this block along one axis.
    pub fn signed_steps(&self, axis: usize) -> i32 {
        if self.direction_bits & direction_bit(axis) != 0 {
            -(self.steps[axis] as i32)
        } else {
            self.steps[axis] as i32
        }
    }
}
